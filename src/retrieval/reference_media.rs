//! Session-scoped storage for downloaded reference recordings.

use crate::error::{Result, SpeakeasyError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A session's reference recordings and the directory holding them.
///
/// The directory is `<root>/<session_id>`. Anything already at that path is
/// purged when the store is prepared, and the directory is removed again by
/// [`ReferenceMedia::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct ReferenceMedia {
    dir: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl ReferenceMedia {
    /// Create an empty session directory under `root`.
    pub fn prepare(root: &Path, session_id: &str) -> Result<Self> {
        let dir = root.join(session_id);

        if dir.exists() {
            debug!("Purging stale reference media at {}", dir.display());
            std::fs::remove_dir_all(&dir).map_err(|e| {
                SpeakeasyError::Cleanup(format!("cannot purge {}: {}", dir.display(), e))
            })?;
        }
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            files: Vec::new(),
            released: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Downloaded files, in download order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File stem for the example at `index` in the download order.
    ///
    /// Stems follow the example, not the number of files stored, so a failed
    /// download never hands its stem to the next example.
    pub fn stem_for(index: usize) -> String {
        format!("ref_{:02}", index)
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    /// Remove the session directory and everything in it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_dir(&self.dir)
    }
}

impl Drop for ReferenceMedia {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_dir(&self.dir) {
            warn!("{}", e);
        }
    }
}

fn remove_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!("Removed reference media at {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SpeakeasyError::Cleanup(format!(
            "cannot remove {}: {}",
            dir.display(),
            e
        ))),
    }
}
