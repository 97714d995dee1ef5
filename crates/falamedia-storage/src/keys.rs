//! Shared storage-key construction for all backends.
//!
//! Key format: `profile_photos/{owner_key}_{epoch_millis}.{ext}` for
//! user/child avatars; `vocabulary_images/{owner_key}/{slug}.{ext}` for
//! vocabulary items. Deterministic string construction, no I/O.

use falamedia_core::{OwnerKind, OwnerReference};

use crate::traits::{StorageError, StorageResult};

/// Build the storage key for an owner's image.
///
/// `item_name` is required for vocabulary items (it becomes the slugged
/// final segment) and ignored otherwise. `epoch_millis` keys avatar uploads;
/// two uploads for the same owner collide only within the same millisecond,
/// which is accepted: the path is owner-traceable by design, not
/// content-addressed.
pub fn object_key(
    owner: &OwnerReference,
    item_name: Option<&str>,
    epoch_millis: i64,
    ext: &str,
) -> StorageResult<String> {
    validate_owner_key(&owner.key)?;

    match owner.kind {
        OwnerKind::UserProfile | OwnerKind::ChildProfile => Ok(format!(
            "{}/{}_{}.{}",
            owner.kind.scope(),
            owner.key,
            epoch_millis,
            ext
        )),
        OwnerKind::VocabularyItem => {
            let name = item_name.ok_or_else(|| {
                StorageError::InvalidKey(format!(
                    "vocabulary item {} has no item name for its image path",
                    owner.key
                ))
            })?;
            let slugged = slug(name);
            if slugged.is_empty() {
                return Err(StorageError::InvalidKey(format!(
                    "item name {:?} produces an empty path segment",
                    name
                )));
            }
            Ok(format!(
                "{}/{}/{}.{}",
                owner.kind.scope(),
                owner.key,
                slugged,
                ext
            ))
        }
    }
}

fn validate_owner_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty owner key".to_string()));
    }
    if key.contains("..") || key.contains('/') {
        return Err(StorageError::InvalidKey(format!(
            "owner key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

/// Normalize an item name for use as a path segment: lowercase, whitespace
/// collapsed to underscores, punctuation dropped. Letters and digits are
/// kept including accented ones, so Portuguese item names stay legible in
/// paths ("Minha Família" → `minha_família`).
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !last_was_sep {
                out.push('_');
                last_was_sep = true;
            }
            continue;
        }
        for lc in c.to_lowercase() {
            if lc.is_alphanumeric() || lc == '_' || lc == '-' {
                out.push(lc);
                last_was_sep = false;
            }
        }
    }
    out.trim_end_matches('_').to_string()
}
