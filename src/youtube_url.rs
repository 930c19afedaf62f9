use once_cell::sync::Lazy;
use regex::Regex;

// scheme and www are optional; the video id is exactly 11 characters and
// may only be followed by more query parameters or a fragment.
static YOUTUBE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%?/#]{11})([&?#].*)?$",
  )
  .unwrap()
});

pub fn is_valid_youtube_url(url: &str) -> bool {
  YOUTUBE_URL_REGEX.is_match(url)
}
