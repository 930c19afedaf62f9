use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::classify::{classify, Failure};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("Invalid YouTube URL format")]
  InvalidUrl,
  #[error("Missing query parameter: {0}")]
  MissingParam(&'static str),
  #[error("Invalid format {0:?}, expected \"video\" or \"audio\"")]
  InvalidFormat(String),
  #[error("Invalid query string: {0}")]
  InvalidQuery(String),
  #[error("Video is unavailable or private")]
  Unavailable(String),
  #[error("Age-restricted video")]
  AgeRestricted(String),
  #[error("YouTube is not responding properly, please try again later")]
  UpstreamUnstable(String),
  #[error("Network error while contacting YouTube, please try again later")]
  TransientNetwork(String),
  #[error("Could not extract video information")]
  EmptyExtraction,
  #[error("Downloaded file not found")]
  OutputNotFound,
  #[error("Extraction produced {0} candidate files, expected exactly one")]
  AmbiguousOutput(usize),
  #[error("Error downloading video: {0}")]
  Extraction(String),
  #[error("Invalid configuration for {0}: {1}")]
  Config(&'static str, String),
  #[error("IO error: {0}")]
  IO(#[from] std::io::Error),
  #[error("Server error: {0}")]
  Server(String),
}

/// What the download orchestrator may do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
  /// try the next variant of the ladder
  Fallback,
  /// back off and run the ladder again
  Retry,
  None,
}

impl Error {
  /// Builds the error for a failed extraction from the tool's message.
  pub fn from_extraction(message: impl Into<String>) -> Self {
    let message = message.into();
    match classify(&message) {
      Failure::Unavailable => Error::Unavailable(message),
      Failure::AgeRestricted => Error::AgeRestricted(message),
      Failure::UpstreamUnstable => Error::UpstreamUnstable(message),
      Failure::TransientNetwork => Error::TransientNetwork(message),
      Failure::Internal => Error::Extraction(message),
    }
  }

  pub fn recovery(&self) -> Recovery {
    match self {
      Error::UpstreamUnstable(_) | Error::EmptyExtraction => Recovery::Fallback,
      Error::TransientNetwork(_) => Recovery::Retry,
      _ => Recovery::None,
    }
  }

  /// Whether the whole ladder may be run again after this failure.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Error::UpstreamUnstable(_) | Error::TransientNetwork(_))
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      Error::InvalidUrl
      | Error::MissingParam(_)
      | Error::InvalidFormat(_)
      | Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
      Error::AgeRestricted(_) => StatusCode::FORBIDDEN,
      Error::Unavailable(_) | Error::EmptyExtraction => StatusCode::NOT_FOUND,
      Error::UpstreamUnstable(_) | Error::TransientNetwork(_) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      Error::OutputNotFound
      | Error::AmbiguousOutput(_)
      | Error::Extraction(_)
      | Error::Config(..)
      | Error::IO(_)
      | Error::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

#[derive(Serialize)]
struct ErrorBody {
  detail: String,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      error!(status = status.as_u16(), "request failed: {:?}", self);
    } else {
      warn!(status = status.as_u16(), "request rejected: {}", self);
    }

    let body = ErrorBody {
      detail: self.to_string(),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extraction_errors_map_to_status() {
    let cases = [
      ("ERROR: [youtube] x: Video unavailable", StatusCode::NOT_FOUND),
      (
        "ERROR: Sign in to confirm your age. This video may be inappropriate",
        StatusCode::FORBIDDEN,
      ),
      (
        "ERROR: Unable to extract uploader id",
        StatusCode::SERVICE_UNAVAILABLE,
      ),
      (
        "ERROR: [Errno 104] Connection reset by peer",
        StatusCode::SERVICE_UNAVAILABLE,
      ),
      ("ERROR: something odd", StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (message, status) in cases {
      assert_eq!(Error::from_extraction(message).status_code(), status);
    }
  }

  #[test]
  fn test_only_upstream_and_network_failures_recover() {
    assert_eq!(
      Error::from_extraction("Failed to extract any player response")
        .recovery(),
      Recovery::Fallback
    );
    assert_eq!(
      Error::from_extraction("Connection refused").recovery(),
      Recovery::Retry
    );
    assert_eq!(
      Error::from_extraction("Video unavailable").recovery(),
      Recovery::None
    );
    assert_eq!(Error::InvalidUrl.recovery(), Recovery::None);
    assert_eq!(Error::OutputNotFound.recovery(), Recovery::None);
  }

  #[test]
  fn test_empty_extraction_falls_back_but_is_not_retried() {
    assert_eq!(Error::EmptyExtraction.recovery(), Recovery::Fallback);
    assert!(!Error::EmptyExtraction.is_retryable());
    assert!(Error::from_extraction("Connection refused").is_retryable());
    assert!(Error::from_extraction("Unable to extract title").is_retryable());
    assert!(!Error::from_extraction("Video unavailable").is_retryable());
  }

  #[test]
  fn test_internal_error_keeps_raw_message() {
    let err = Error::from_extraction("ERROR: ffmpeg not found");
    assert_eq!(
      err.to_string(),
      "Error downloading video: ERROR: ffmpeg not found"
    );
  }
}
