use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;

/// Scratch directory owned by a single request. The directory and
/// everything in it are removed when the workspace is dropped.
pub struct Workspace {
  id: Uuid,
  path: PathBuf,
}

impl Workspace {
  pub async fn create(base_dir: impl AsRef<Path>) -> Result<Self> {
    let id = Uuid::new_v4();
    let path = base_dir.as_ref().join(format!("temp_{id}"));

    tokio::fs::create_dir_all(base_dir.as_ref()).await?;
    tokio::fs::create_dir(&path).await?;
    info!(request_id = %id, "created workspace {}", path.display());

    Ok(Self { id, path })
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Removes whatever a previous attempt left behind.
  pub async fn clear(&self) -> Result<()> {
    let mut entries = tokio::fs::read_dir(&self.path).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if entry.file_type().await?.is_dir() {
        tokio::fs::remove_dir_all(&path).await?;
      } else {
        tokio::fs::remove_file(&path).await?;
      }
      debug!(request_id = %self.id, "removed leftover {}", path.display());
    }
    Ok(())
  }
}

impl Drop for Workspace {
  fn drop(&mut self) {
    match std::fs::remove_dir_all(&self.path) {
      Ok(()) => {
        info!(request_id = %self.id, "cleaned up {}", self.path.display())
      }
      Err(e) => warn!(
        request_id = %self.id,
        "failed to clean up {}: {}",
        self.path.display(),
        e
      ),
    }
  }
}
