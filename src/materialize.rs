use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  extractor::{Metadata, Mode},
  workspace::Workspace,
  Error, Result,
};

const DEFAULT_TITLE: &str = "download";

// leftovers yt-dlp may write next to the real output
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "json"];

static UNSAFE_TITLE_CHARS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[^\w\-_. ]").unwrap());

pub fn sanitize_title(title: &str) -> String {
  UNSAFE_TITLE_CHARS.replace_all(title, "_").into_owned()
}

/// A finished extraction: the file yt-dlp produced and its display title.
#[derive(Debug)]
pub struct ExtractionResult {
  pub title: String,
  pub file_path: PathBuf,
}

impl ExtractionResult {
  pub async fn locate(
    workspace: &Workspace,
    mode: Mode,
    metadata: &Metadata,
  ) -> Result<Self> {
    let file_path = find_output(workspace.path(), mode).await?;
    let title = match metadata.title.as_deref() {
      Some(title) if !title.trim().is_empty() => sanitize_title(title),
      _ => DEFAULT_TITLE.to_string(),
    };

    Ok(Self { title, file_path })
  }
}

async fn find_output(dir: &Path, mode: Mode) -> Result<PathBuf> {
  let mut candidates = Vec::new();
  let mut entries = tokio::fs::read_dir(dir).await?;

  while let Some(entry) = entries.next_entry().await? {
    if !entry.file_type().await?.is_file() {
      continue;
    }
    let path = entry.path();
    let ext = path
      .extension()
      .map(|e| e.to_string_lossy().to_lowercase())
      .unwrap_or_default();

    let wanted = match mode {
      Mode::Audio => ext == "mp3",
      // the container is picked by yt-dlp, take whatever it produced
      Mode::Video => !PARTIAL_EXTENSIONS.contains(&ext.as_str()),
    };
    if wanted {
      candidates.push(path);
    }
  }

  match candidates.len() {
    0 => Err(Error::OutputNotFound),
    1 => Ok(candidates.remove(0)),
    n => {
      warn!("expected a single output in {}: {:?}", dir.display(), candidates);
      Err(Error::AmbiguousOutput(n))
    }
  }
}

// extension of the produced file when it differs from what the mode serves
fn container_mismatch(path: &Path, mode: Mode) -> Option<String> {
  let ext = path.extension()?.to_string_lossy().to_lowercase();
  (ext != mode.extension()).then_some(ext)
}

/// Copy of a finished download that lives outside the workspace while it
/// is streamed to the client. Removed from disk on drop.
#[derive(Debug)]
pub struct MaterializedOutput {
  path: PathBuf,
  filename: String,
  mode: Mode,
}

impl MaterializedOutput {
  pub async fn copy_from(
    result: &ExtractionResult,
    mode: Mode,
    request_id: Uuid,
    output_dir: impl AsRef<Path>,
  ) -> Result<Self> {
    let ext = mode.extension();
    if let Some(produced) = container_mismatch(&result.file_path, mode) {
      warn!(%request_id, "yt-dlp produced {produced}, serving it as {ext}");
    }
    // the title only goes into Content-Disposition, it can exceed the
    // file name limit of the output filesystem
    let filename = format!("{}.{ext}", result.title);
    let path = output_dir.as_ref().join(format!("{request_id}.{ext}"));

    tokio::fs::create_dir_all(output_dir.as_ref()).await?;
    // construct first so a failed copy still cleans up a partial file
    let output = Self {
      path,
      filename,
      mode,
    };
    tokio::fs::copy(&result.file_path, &output.path).await?;
    info!(%request_id, "materialized {}", output.path.display());

    Ok(output)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Name offered to the client.
  pub fn filename(&self) -> &str {
    &self.filename
  }

  pub fn mime_type(&self) -> &'static str {
    self.mode.mime_type()
  }
}

impl Drop for MaterializedOutput {
  fn drop(&mut self) {
    if !self.path.exists() {
      return;
    }

    if let Err(e) = std::fs::remove_file(&self.path) {
      warn!("failed to delete file {}: {}", self.path.display(), e);
    } else {
      info!("deleted file: {}", self.path.display());
    }
  }
}
