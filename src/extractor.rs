mod options;
mod ytdlp;

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;

pub use options::{ExtractionOptions, Mode, Variant};
pub use ytdlp::Ytdlp;

/// Metadata reported by a successful extraction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub ext: Option<String>,
}

#[async_trait]
pub trait Extractor: Send + Sync {
  /// Downloads `url` into `out_dir` using a single option variant.
  ///
  /// `Ok(None)` means the tool finished without reporting any metadata.
  async fn extract(
    &self,
    url: &str,
    options: &ExtractionOptions,
    variant: &Variant,
    out_dir: &Path,
  ) -> Result<Option<Metadata>>;
}
