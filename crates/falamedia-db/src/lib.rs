//! FalaMedia DB Library
//!
//! Postgres implementation of the binding contract: the single-row update
//! that commits a resolved image URL into its owning record.

pub mod bindings;

pub use bindings::BindingRepository;
