use std::{
  io,
  pin::Pin,
  task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::materialize::MaterializedOutput;

/// Streams a materialized file and owns it, so the file is deleted as soon
/// as the response body is dropped, whether it was fully sent or the
/// client went away.
pub struct FileStream {
  stream: ReaderStream<File>,
  _output: MaterializedOutput,
}

impl FileStream {
  pub fn new(file: File, output: MaterializedOutput) -> Self {
    FileStream {
      stream: ReaderStream::new(file),
      _output: output,
    }
  }
}

impl Stream for FileStream {
  type Item = io::Result<Bytes>;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    Pin::new(&mut self.stream).poll_next(cx)
  }
}
