//! Camera/library permission handling.
//!
//! The broker asks the host once and remembers a positive grant for the
//! process lifetime; a denial is deliberately not cached so a later run can
//! re-prompt. The host dialog is the only suspension point, and the user
//! declining yields `false`, never an error.

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Host seam for the OS permission dialogs.
#[async_trait]
pub trait PermissionHost: Send + Sync {
    /// Drive the camera and photo-library permission prompts.
    /// Returns whether both grants were given.
    async fn request_access(&self) -> bool;

    /// Report the current grant without prompting, when the host can tell.
    /// `None` means unknown (the broker then trusts its cache).
    async fn current_grant(&self) -> Option<bool> {
        None
    }
}

/// Host for platforms without permission dialogs (tests, CLI, web).
pub struct AlwaysGranted;

#[async_trait]
impl PermissionHost for AlwaysGranted {
    async fn request_access(&self) -> bool {
        true
    }

    async fn current_grant(&self) -> Option<bool> {
        Some(true)
    }
}

/// Obtains and remembers camera/library access for the process lifetime.
pub struct PermissionBroker {
    host: std::sync::Arc<dyn PermissionHost>,
    granted: Mutex<bool>,
}

impl PermissionBroker {
    pub fn new(host: std::sync::Arc<dyn PermissionHost>) -> Self {
        Self {
            host,
            granted: Mutex::new(false),
        }
    }

    /// Ensure camera/library access, prompting the host only when needed.
    pub async fn ensure(&self) -> bool {
        let mut granted = self.granted.lock().await;

        if *granted {
            // Re-prompt only if the host reports the grant revoked.
            match self.host.current_grant().await {
                Some(false) => {
                    tracing::info!("permission grant revoked by host, re-requesting");
                }
                _ => return true,
            }
        }

        let result = self.host.request_access().await;
        *granted = result;
        if !result {
            tracing::info!("camera/library permission denied by user");
        }
        result
    }
}
