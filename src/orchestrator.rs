//! Drives the extractor through the fallback ladder and the retry loop.
//!
//! A request runs the ladder top to bottom. Upstream failures (the site
//! changed something, the player response could not be parsed) move on
//! to the next variant, and so does an empty result. When the ladder is
//! exhausted on an upstream failure, or the failure looks like a network
//! hiccup, the whole ladder is retried after a delay of
//! `attempt * backoff_unit`. Any other failure, including a ladder that
//! only produced empty results, is returned immediately.

use tracing::{error, info, warn};

use crate::{
  config::RetryPolicy,
  error::Recovery,
  extractor::{ExtractionOptions, Extractor, Metadata},
  workspace::Workspace,
  Error, Result,
};

pub async fn download(
  extractor: &dyn Extractor,
  url: &str,
  options: &ExtractionOptions,
  workspace: &Workspace,
  policy: &RetryPolicy,
) -> Result<Metadata> {
  let request_id = workspace.id();
  let mut attempt = 1;

  loop {
    match run_ladder(extractor, url, options, workspace).await {
      Ok(metadata) => {
        if attempt > 1 {
          info!(%request_id, attempt, "download succeeded after retry");
        }
        return Ok(metadata);
      }
      Err(e)
        if e.is_retryable() && attempt < policy.max_attempts =>
      {
        let delay = policy.delay_after(attempt);
        warn!(
          %request_id,
          attempt,
          max_attempts = policy.max_attempts,
          delay_ms = delay.as_millis() as u64,
          "download failed, retrying: {}",
          e
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => {
        error!(%request_id, attempt, "download failed: {:?}", e);
        return Err(e);
      }
    }
  }
}

async fn run_ladder(
  extractor: &dyn Extractor,
  url: &str,
  options: &ExtractionOptions,
  workspace: &Workspace,
) -> Result<Metadata> {
  let request_id = workspace.id();
  let mut last_err = None;

  for variant in &options.variants {
    workspace.clear().await?;
    info!(%request_id, variant = variant.label, "extracting {}", url);

    let err = match extractor
      .extract(url, options, variant, workspace.path())
      .await
    {
      Ok(Some(metadata)) => {
        info!(
          %request_id,
          variant = variant.label,
          video_id = ?metadata.id,
          ext = ?metadata.ext,
          "extraction finished"
        );
        return Ok(metadata);
      }
      Ok(None) => Error::EmptyExtraction,
      Err(e) => e,
    };

    if err.recovery() != Recovery::Fallback {
      return Err(err);
    }

    warn!(
      %request_id,
      variant = variant.label,
      "variant failed, trying next one: {:?}",
      err
    );
    last_err = Some(err);
  }

  Err(last_err.unwrap_or(Error::EmptyExtraction))
}
