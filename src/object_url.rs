//! Display handle (object URL) lifecycle tracking.
//!
//! Images read back from the history store are handed to the presentation
//! layer as short `blob:` handles instead of raw bytes. A handle stays
//! resolvable until it is revoked, so every handle must be released exactly
//! once: leaking handles keeps image buffers alive for the whole session,
//! and releasing twice is a bookkeeping defect.
//!
//! The registry is an ordinary owned value scoped to one UI session. It is
//! drained when dropped, so a session that forgets to call
//! [`ObjectUrlRegistry::revoke_all`] still releases everything at teardown.

use crate::models::ImageBlob;
use log::debug;
use std::collections::HashMap;
use uuid::Uuid;

/// Origin used in minted handles when none is configured.
pub const DEFAULT_ORIGIN: &str = "product-studio";

/// Scheme prefix of every minted handle.
pub const OBJECT_URL_SCHEME: &str = "blob:";

/// Registry of live display handles and the image data they resolve to.
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    /// Origin embedded in minted handles (`blob:<origin>/<uuid>`).
    origin: String,

    /// Live handles and the blob each one resolves to.
    live: HashMap<String, ImageBlob>,

    /// Handles in registration order, oldest first.
    order: Vec<String>,

    /// Total number of handles released over the registry's lifetime.
    revoked_total: usize,
}

impl ObjectUrlRegistry {
    /// Creates an empty registry using [`DEFAULT_ORIGIN`].
    pub fn new() -> Self {
        Self::with_origin(DEFAULT_ORIGIN)
    }

    /// Creates an empty registry that mints handles under `origin`.
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            live: HashMap::new(),
            order: Vec::new(),
            revoked_total: 0,
        }
    }

    /// Mints a fresh handle for `blob` and tracks it.
    ///
    /// # Returns
    ///
    /// The new handle, e.g. `blob:product-studio/9b2c...`.
    pub fn create_object_url(&mut self, blob: &ImageBlob) -> String {
        let handle = format!("{}{}/{}", OBJECT_URL_SCHEME, self.origin, Uuid::new_v4());
        self.track(handle.clone(), blob.clone());
        handle
    }

    /// Registers `handle` as live, resolving to `blob`.
    ///
    /// Tracking an already tracked handle is a no-op and keeps the blob it
    /// was first registered with.
    ///
    /// # Returns
    ///
    /// `true` if the handle was newly tracked, `false` if it already was.
    pub fn track(&mut self, handle: impl Into<String>, blob: ImageBlob) -> bool {
        let handle = handle.into();
        if self.live.contains_key(&handle) {
            return false;
        }
        self.order.push(handle.clone());
        self.live.insert(handle, blob);
        true
    }

    /// Releases a handle and the image data behind it.
    ///
    /// Revoking an untracked handle (never tracked, or already revoked) is a
    /// no-op.
    ///
    /// # Returns
    ///
    /// `true` if the handle was live and has now been released.
    pub fn revoke(&mut self, handle: &str) -> bool {
        if self.live.remove(handle).is_none() {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|h| h == handle) {
            self.order.remove(pos);
        }
        self.revoked_total += 1;
        true
    }

    /// Releases every live handle.
    ///
    /// # Returns
    ///
    /// The number of handles released.
    pub fn revoke_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        self.order.clear();
        self.revoked_total += count;
        count
    }

    /// Looks up the image data behind a live handle.
    pub fn resolve(&self, handle: &str) -> Option<&ImageBlob> {
        self.live.get(handle)
    }

    /// Checks whether a handle is currently live.
    pub fn is_tracked(&self, handle: &str) -> bool {
        self.live.contains_key(handle)
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live handles in registration order (oldest first).
    pub fn live_handles(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of handles released since the registry was created.
    pub fn revoked_count(&self) -> usize {
        self.revoked_total
    }

    /// Origin embedded in minted handles.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectUrlRegistry {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            debug!(
                "Releasing {} object URL(s) still live at registry teardown",
                self.live.len()
            );
        }
        self.revoke_all();
    }
}
