mod file_stream;

pub use file_stream::FileStream;

// RFC 6266 Content-Disposition, with the RFC 5987 form for names that
// need escaping.
pub fn content_disposition(filename: &str) -> String {
  let encoded = urlencoding::encode(filename);
  if encoded == filename {
    format!("attachment; filename=\"{filename}\"")
  } else {
    format!("attachment; filename*=utf-8''{encoded}")
  }
}
