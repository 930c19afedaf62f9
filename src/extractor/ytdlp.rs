use std::{ffi::OsString, path::Path, process::Stdio};

use async_trait::async_trait;
use itertools::Itertools;
use tokio::{process::Command, sync::Semaphore};
use tracing::{debug, info};

use crate::{
  config::{redact_proxy, YtdlpConfig},
  Error, Result,
};

use super::{ExtractionOptions, Extractor, Metadata, Mode, Variant};

const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

// run yt-dlp command line to download the media into a directory.
// requires yt-dlp (and ffmpeg for audio conversion) to be installed.
pub struct Ytdlp {
  program: OsString,
  // ensure only a limited set of ytdlp processes at a time
  permits: Semaphore,
}

impl Ytdlp {
  pub fn new(config: &YtdlpConfig) -> Self {
    Self {
      program: config.path.clone().into_os_string(),
      permits: Semaphore::new(config.concurrency),
    }
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn extract(
    &self,
    url: &str,
    options: &ExtractionOptions,
    variant: &Variant,
    out_dir: &Path,
  ) -> Result<Option<Metadata>> {
    let args = build_args(url, options, variant, out_dir);
    debug!(
      "running {} {}",
      self.program.to_string_lossy(),
      args.iter().map(|a| a.to_string_lossy()).join(" ")
    );
    if let Some(proxy) = &options.proxy {
      info!("using proxy: {}", redact_proxy(proxy));
    }

    let mut cmd = Command::new(&self.program);
    cmd
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      // a request dropped by a disconnected client stops yt-dlp instead of
      // letting the download run to completion server-side
      .kill_on_drop(true);

    let _guard = self
      .permits
      .acquire()
      .await
      .map_err(|e| Error::Server(e.to_string()))?;
    let output = cmd.spawn()?.wait_with_output().await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() || stderr.contains("ERROR:") {
      return Err(Error::from_extraction(error_message(
        &stderr,
        output.status.code(),
      )));
    }

    Ok(parse_metadata(&output.stdout))
  }
}

fn build_args(
  url: &str,
  options: &ExtractionOptions,
  variant: &Variant,
  out_dir: &Path,
) -> Vec<OsString> {
  let mut args: Vec<OsString> = [
    "--quiet",
    "--no-warnings",
    "--no-progress",
    "--no-color",
    "--no-playlist",
    "--no-check-certificates",
    "--geo-bypass",
    "--no-mtime",
    // print the info json of the downloaded video, still downloading it
    "--dump-json",
    "--no-simulate",
  ]
  .into_iter()
  .map(OsString::from)
  .collect();

  push(&mut args, "--socket-timeout", options.socket_timeout.as_secs());
  push(&mut args, "--retries", options.retries);
  push(&mut args, "--format", &variant.format);
  for (name, value) in &options.headers {
    push(&mut args, "--add-header", format!("{name}:{value}"));
  }
  if let Some(extractor_args) = variant.extractor_args {
    push(&mut args, "--extractor-args", extractor_args);
  }
  if let Some(proxy) = &options.proxy {
    push(&mut args, "--proxy", proxy);
  }

  match options.mode {
    Mode::Audio => {
      args.push("--extract-audio".into());
      push(&mut args, "--audio-format", "mp3");
      push(&mut args, "--audio-quality", "320K");
    }
    Mode::Video => push(&mut args, "--merge-output-format", "mp4"),
  }

  if variant.force_generic {
    args.push("--force-generic-extractor".into());
  }

  args.push("--output".into());
  args.push(out_dir.join(OUTPUT_TEMPLATE).into_os_string());
  args.push("--".into());
  args.push(url.into());
  args
}

fn push(args: &mut Vec<OsString>, flag: &str, value: impl ToString) {
  args.push(flag.into());
  args.push(value.to_string().into());
}

// yt-dlp prints one json object per downloaded video.
fn parse_metadata(stdout: &[u8]) -> Option<Metadata> {
  String::from_utf8_lossy(stdout)
    .lines()
    .rev()
    .find_map(|line| serde_json::from_str::<Metadata>(line.trim()).ok())
}

fn error_message(stderr: &str, code: Option<i32>) -> String {
  let errors = stderr
    .lines()
    .filter(|line| line.contains("ERROR:"))
    .join("\n");

  match (errors.is_empty(), stderr.trim().is_empty()) {
    (false, _) => errors,
    (true, false) => stderr.trim().to_string(),
    (true, true) => format!("yt-dlp exited with status {code:?}"),
  }
}
