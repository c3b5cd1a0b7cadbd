//! Scoped ownership of uploaded media handles.

use super::{GenerationBackend, MediaHandle};
use crate::error::Result;
use std::path::Path;
use tracing::{debug, warn};

/// Handles uploaded by one stage, released together when the stage is done.
///
/// `release_all` consumes the set, so a handle cannot be released twice.
/// Callers must reach `release_all` on every exit path once the first
/// upload has succeeded.
#[must_use = "uploaded media must be released with release_all"]
pub struct MediaUploads {
    handles: Vec<MediaHandle>,
}

impl MediaUploads {
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    /// Upload `path` and keep its handle.
    pub async fn upload(&mut self, backend: &dyn GenerationBackend, path: &Path) -> Result<MediaHandle> {
        let handle = backend.upload_media(path).await?;
        debug!("Uploaded {} as {}", path.display(), handle.name);
        self.handles.push(handle.clone());
        Ok(handle)
    }

    pub fn handles(&self) -> &[MediaHandle] {
        &self.handles
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Release every handle once. Failures are logged, never returned.
    pub async fn release_all(self, backend: &dyn GenerationBackend) {
        for handle in &self.handles {
            if let Err(e) = backend.release_media(handle).await {
                warn!("Failed to release uploaded media {}: {}", handle.name, e);
            }
        }
    }
}

impl Default for MediaUploads {
    fn default() -> Self {
        Self::new()
    }
}
