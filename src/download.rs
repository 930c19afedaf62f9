use async_trait::async_trait;
use axum::{
  body::StreamBody,
  extract::{FromRequestParts, Query, State},
  http::header,
  response::IntoResponse,
};
use serde::Deserialize;
use tokio::fs::File;
use tracing::info;

use crate::{
  extractor::{ExtractionOptions, Mode},
  materialize::{ExtractionResult, MaterializedOutput},
  orchestrator,
  util::{content_disposition, FileStream},
  workspace::Workspace,
  youtube_url::is_valid_youtube_url,
  AppState, Error, Result,
};

/// A validated `/download` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
  pub source_url: String,
  pub mode: Mode,
}

impl DownloadRequest {
  pub fn parse(url: Option<&str>, format: Option<&str>) -> Result<Self> {
    let source_url = url
      .map(str::trim)
      .filter(|url| !url.is_empty())
      .ok_or(Error::MissingParam("url"))?;
    if !is_valid_youtube_url(source_url) {
      return Err(Error::InvalidUrl);
    }
    let mode = format.unwrap_or("video").parse()?;

    Ok(Self {
      source_url: source_url.to_string(),
      mode,
    })
  }
}

#[derive(Deserialize)]
struct DownloadQuery {
  url: Option<String>,
  format: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for DownloadRequest
where
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut http::request::Parts,
    state: &S,
  ) -> Result<Self, Self::Rejection> {
    let Query(query) =
      Query::<DownloadQuery>::from_request_parts(parts, state)
        .await
        .map_err(|e| Error::InvalidQuery(e.to_string()))?;

    Self::parse(query.url.as_deref(), query.format.as_deref())
  }
}

#[axum::debug_handler]
pub async fn get_download(
  State(state): State<AppState>,
  request: DownloadRequest,
) -> Result<impl IntoResponse> {
  let output = fetch(&state, &request).await?;
  let file = File::open(output.path()).await?;

  let headers = [
    (header::CONTENT_TYPE, output.mime_type().to_string()),
    (
      header::CONTENT_DISPOSITION,
      content_disposition(output.filename()),
    ),
  ];
  info!("streaming {} as {}", output.path().display(), output.filename());

  Ok((headers, StreamBody::new(FileStream::new(file, output))))
}

/// Downloads the requested media and copies it out of its workspace. The
/// workspace is gone by the time this returns, on every path.
pub async fn fetch(
  state: &AppState,
  request: &DownloadRequest,
) -> Result<MaterializedOutput> {
  let config = &state.config;
  let workspace = Workspace::create(&config.temp_dir).await?;
  info!(
    request_id = %workspace.id(),
    mode = %request.mode,
    "downloading {}",
    request.source_url
  );

  let options = ExtractionOptions::for_mode(request.mode, &config.ytdlp);
  let metadata = orchestrator::download(
    state.extractor.as_ref(),
    &request.source_url,
    &options,
    &workspace,
    &config.retry,
  )
  .await?;

  let result =
    ExtractionResult::locate(&workspace, request.mode, &metadata).await?;
  MaterializedOutput::copy_from(
    &result,
    request.mode,
    workspace.id(),
    &config.output_dir,
  )
  .await
}

#[cfg(test)]
mod tests {
  use std::{path::Path, sync::Arc, time::Duration};

  use axum::{
    body::{Body, BoxBody, HttpBody},
    http::{Request, Response, StatusCode},
    Router,
  };
  use tempfile::TempDir;
  use tower::ServiceExt;

  use super::*;
  use crate::{
    extractor::{Extractor, Metadata, Variant},
    router, Config,
  };

  const VIDEO_URL: &str =
    "https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ";

  // Writes a fake output file the way yt-dlp would, or fails with the
  // given message.
  struct StubExtractor {
    title: Option<&'static str>,
    error: Option<&'static str>,
  }

  #[async_trait]
  impl Extractor for StubExtractor {
    async fn extract(
      &self,
      _url: &str,
      options: &ExtractionOptions,
      _variant: &Variant,
      out_dir: &Path,
    ) -> Result<Option<Metadata>> {
      if let Some(error) = self.error {
        return Err(Error::from_extraction(error));
      }
      let ext = options.mode.extension();
      std::fs::write(out_dir.join(format!("dQw4w9WgXcQ.{ext}")), b"media")?;
      Ok(Some(Metadata {
        id: Some("dQw4w9WgXcQ".into()),
        title: self.title.map(String::from),
        ext: Some(ext.into()),
      }))
    }
  }

  struct TestApp {
    router: Router,
    dir: TempDir,
  }

  impl TestApp {
    fn new(extractor: StubExtractor) -> Self {
      let dir = tempfile::tempdir().unwrap();
      let mut config = Config::from_lookup(|_| None).unwrap();
      config.temp_dir = dir.path().join("work");
      config.output_dir = dir.path().join("out");
      config.retry.max_attempts = 2;
      config.retry.backoff_unit = Duration::from_millis(1);

      let state = AppState {
        config: Arc::new(config),
        extractor: Arc::new(extractor),
      };
      Self {
        router: router(state),
        dir,
      }
    }

    async fn get(&self, uri: &str) -> Response<BoxBody> {
      let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
      self.router.clone().oneshot(request).await.unwrap()
    }

    fn files_in(&self, sub: &str) -> usize {
      std::fs::read_dir(self.dir.path().join(sub))
        .map(|entries| entries.count())
        .unwrap_or(0)
    }
  }

  fn header<'a>(response: &'a Response<BoxBody>, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
  }

  async fn read_body(response: Response<BoxBody>) -> Vec<u8> {
    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
      bytes.extend_from_slice(&chunk.unwrap());
    }
    bytes
  }

  #[test]
  fn test_parse_request() {
    let url = "https://youtu.be/dQw4w9WgXcQ";
    let request = DownloadRequest::parse(Some(url), None).unwrap();
    assert_eq!(request.mode, Mode::Video);

    let request = DownloadRequest::parse(Some(url), Some("audio")).unwrap();
    assert_eq!(request.mode, Mode::Audio);

    assert!(matches!(
      DownloadRequest::parse(None, None),
      Err(Error::MissingParam("url"))
    ));
    assert!(matches!(
      DownloadRequest::parse(Some("https://example.com"), None),
      Err(Error::InvalidUrl)
    ));
    assert!(matches!(
      DownloadRequest::parse(Some(url), Some("gif")),
      Err(Error::InvalidFormat(_))
    ));
  }

  #[tokio::test]
  async fn test_audio_download() {
    let app = TestApp::new(StubExtractor {
      title: Some("Foo/Bar: Baz?"),
      error: None,
    });

    let response = app
      .get(&format!("/download?url={VIDEO_URL}&format=audio"))
      .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "audio/mpeg");
    assert_eq!(
      header(&response, "content-disposition"),
      "attachment; filename*=utf-8''Foo_Bar_%20Baz_.mp3"
    );
    // workspace is gone, the materialized copy waits for the stream
    assert_eq!(app.files_in("work"), 0);
    assert_eq!(app.files_in("out"), 1);

    assert_eq!(read_body(response).await, b"media");
    assert_eq!(app.files_in("out"), 0);
  }

  #[tokio::test]
  async fn test_video_download() {
    let app = TestApp::new(StubExtractor {
      title: Some("Clip"),
      error: None,
    });

    let response = app
      .get(&format!("/download?url={VIDEO_URL}&format=video"))
      .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "video/mp4");
    assert_eq!(
      header(&response, "content-disposition"),
      "attachment; filename=\"Clip.mp4\""
    );

    read_body(response).await;
    assert_eq!(app.files_in("work"), 0);
    assert_eq!(app.files_in("out"), 0);
  }

  #[tokio::test]
  async fn test_output_removed_when_client_aborts() {
    let app = TestApp::new(StubExtractor {
      title: None,
      error: None,
    });

    let response = app.get(&format!("/download?url={VIDEO_URL}")).await;
    assert_eq!(
      header(&response, "content-disposition"),
      "attachment; filename=\"download.mp4\""
    );
    assert_eq!(app.files_in("out"), 1);

    drop(response);
    assert_eq!(app.files_in("out"), 0);
  }

  #[tokio::test]
  async fn test_error_statuses() {
    let cases = [
      ("ERROR: Video unavailable", StatusCode::NOT_FOUND),
      ("ERROR: Sign in to confirm your age", StatusCode::FORBIDDEN),
      ("ERROR: Unable to extract", StatusCode::SERVICE_UNAVAILABLE),
      ("ERROR: Connection refused", StatusCode::SERVICE_UNAVAILABLE),
      ("ERROR: boom", StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (error, status) in cases {
      let app = TestApp::new(StubExtractor {
        title: None,
        error: Some(error),
      });

      let response = app
        .get(&format!("/download?url={VIDEO_URL}&format=audio"))
        .await;

      assert_eq!(response.status(), status, "{error}");
      assert_eq!(app.files_in("work"), 0, "orphaned workspace for {error}");
      assert_eq!(app.files_in("out"), 0);

      let body: serde_json::Value =
        serde_json::from_slice(&read_body(response).await).unwrap();
      assert!(body["detail"].is_string());
    }
  }

  #[tokio::test]
  async fn test_invalid_input_rejected() {
    let app = TestApp::new(StubExtractor {
      title: None,
      error: None,
    });

    let bad_format = format!("/download?url={VIDEO_URL}&format=flac");
    for uri in [
      "/download",
      "/download?url=https%3A%2F%2Fvimeo.com%2F123&format=audio",
      "/download?url=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXc",
      bad_format.as_str(),
    ] {
      let response = app.get(uri).await;
      assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    // rejected before any workspace was created
    assert!(!app.dir.path().join("work").exists());
  }
}
