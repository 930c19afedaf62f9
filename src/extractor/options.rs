use std::{fmt, str::FromStr, time::Duration};

use crate::{config::YtdlpConfig, Error};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_PLAYER_CLIENTS: &str =
  "youtube:player_client=android,web;player_skip=webpage,configs";
const ALTERNATE_PLAYER_CLIENTS: &str = "youtube:player_client=ios";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Video,
  Audio,
}

impl Mode {
  pub fn extension(self) -> &'static str {
    match self {
      Mode::Video => "mp4",
      Mode::Audio => "mp3",
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      Mode::Video => "video/mp4",
      Mode::Audio => "audio/mpeg",
    }
  }
}

impl FromStr for Mode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "video" => Ok(Mode::Video),
      "audio" => Ok(Mode::Audio),
      other => Err(Error::InvalidFormat(other.to_string())),
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mode::Video => f.write_str("video"),
      Mode::Audio => f.write_str("audio"),
    }
  }
}

/// One rung of the fallback ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
  pub label: &'static str,
  pub format: String,
  pub extractor_args: Option<&'static str>,
  pub force_generic: bool,
}

/// Everything one request passes to the extraction tool. Built once per
/// request and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
  pub mode: Mode,
  pub variants: Vec<Variant>,
  pub headers: Vec<(&'static str, &'static str)>,
  pub socket_timeout: Duration,
  pub retries: u32,
  pub proxy: Option<String>,
}

impl ExtractionOptions {
  pub fn for_mode(mode: Mode, ytdlp: &YtdlpConfig) -> Self {
    let (best, simplified) = match mode {
      Mode::Audio => ("bestaudio/best", "bestaudio"),
      Mode::Video => {
        ("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best", "best")
      }
    };

    let variants = vec![
      Variant {
        label: "standard",
        format: best.into(),
        extractor_args: Some(DEFAULT_PLAYER_CLIENTS),
        force_generic: false,
      },
      Variant {
        label: "simplified-format",
        format: simplified.into(),
        extractor_args: Some(DEFAULT_PLAYER_CLIENTS),
        force_generic: false,
      },
      Variant {
        label: "alternate-client",
        format: simplified.into(),
        extractor_args: Some(ALTERNATE_PLAYER_CLIENTS),
        force_generic: false,
      },
      Variant {
        label: "generic",
        format: "best".into(),
        extractor_args: None,
        force_generic: true,
      },
    ];

    Self {
      mode,
      variants,
      headers: vec![
        ("User-Agent", USER_AGENT),
        (
          "Accept",
          "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("DNT", "1"),
      ],
      socket_timeout: ytdlp.socket_timeout,
      retries: ytdlp.retries,
      proxy: ytdlp.proxy.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Config;

  fn ytdlp_config() -> YtdlpConfig {
    Config::from_lookup(|_| None).unwrap().ytdlp
  }

  #[test]
  fn test_mode_from_str() {
    assert_eq!("video".parse::<Mode>().unwrap(), Mode::Video);
    assert_eq!("audio".parse::<Mode>().unwrap(), Mode::Audio);
    assert!(matches!(
      "flac".parse::<Mode>(),
      Err(Error::InvalidFormat(f)) if f == "flac"
    ));
  }

  #[test]
  fn test_ladder_starts_with_best_format() {
    let audio = ExtractionOptions::for_mode(Mode::Audio, &ytdlp_config());
    assert_eq!(audio.variants[0].format, "bestaudio/best");

    let video = ExtractionOptions::for_mode(Mode::Video, &ytdlp_config());
    assert!(video.variants[0].format.starts_with("bestvideo[ext=mp4]"));
    assert_eq!(video.variants[1].format, "best");
  }

  #[test]
  fn test_ladder_ends_with_generic_extractor() {
    let options = ExtractionOptions::for_mode(Mode::Video, &ytdlp_config());
    let labels: Vec<_> = options.variants.iter().map(|v| v.label).collect();
    assert_eq!(
      labels,
      ["standard", "simplified-format", "alternate-client", "generic"]
    );
    assert!(options.variants.last().unwrap().force_generic);
  }
}
