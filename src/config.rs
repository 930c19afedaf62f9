use std::{net::SocketAddr, path::PathBuf, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_YTDLP_PATH: &str = "yt-dlp";

/// Service settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: SocketAddr,
  pub ytdlp: YtdlpConfig,
  pub retry: RetryPolicy,
  /// parent directory of the per-request workspaces
  pub temp_dir: PathBuf,
  /// where finished files wait while they are streamed
  pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct YtdlpConfig {
  pub path: PathBuf,
  pub proxy: Option<String>,
  pub concurrency: usize,
  pub socket_timeout: Duration,
  pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  /// delay before attempt n+1 is `n * backoff_unit`
  pub backoff_unit: Duration,
}

impl RetryPolicy {
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.backoff_unit * attempt
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let bind_addr = parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?;
    let temp_dir = lookup("DOWNLOAD_TEMP_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(std::env::temp_dir);
    let output_dir = lookup("DOWNLOAD_OUTPUT_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|| temp_dir.join("youtube-download-output"));

    let ytdlp = YtdlpConfig {
      path: lookup("YTDLP_PATH")
        .unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string())
        .into(),
      proxy: lookup("YTDLP_PROXY").filter(|s| !s.is_empty()),
      concurrency: parse_or(&lookup, "YTDLP_CONCURRENCY", "4")?,
      socket_timeout: Duration::from_secs(parse_or(
        &lookup,
        "YTDLP_SOCKET_TIMEOUT",
        "60",
      )?),
      retries: parse_or(&lookup, "YTDLP_RETRIES", "10")?,
    };

    let retry = RetryPolicy {
      max_attempts: parse_or(&lookup, "DOWNLOAD_MAX_ATTEMPTS", "3")?,
      backoff_unit: Duration::from_millis(parse_or(
        &lookup,
        "DOWNLOAD_BACKOFF_MS",
        "2000",
      )?),
    };

    if ytdlp.concurrency == 0 {
      return Err(Error::Config("YTDLP_CONCURRENCY", "must be positive".into()));
    }
    if retry.max_attempts == 0 {
      return Err(Error::Config(
        "DOWNLOAD_MAX_ATTEMPTS",
        "must be positive".into(),
      ));
    }

    Ok(Self {
      bind_addr,
      ytdlp,
      retry,
      temp_dir,
      output_dir,
    })
  }
}

fn parse_or<T>(
  lookup: &impl Fn(&str) -> Option<String>,
  key: &'static str,
  default: &str,
) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  let value = lookup(key).unwrap_or_else(|| default.to_string());
  value
    .trim()
    .parse()
    .map_err(|e: T::Err| Error::Config(key, format!("{value:?}: {e}")))
}

// used to remove cred info from proxy url before printing
static AUTH_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());

pub fn redact_proxy(proxy: &str) -> String {
  AUTH_REGEX.replace(proxy, "//<REDACTED>@").into_owned()
}
