// Maps the free-text failure reported by yt-dlp onto the handful of
// outcomes the service distinguishes. Rules are checked in order and the
// first substring found wins.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
  Unavailable,
  AgeRestricted,
  UpstreamUnstable,
  TransientNetwork,
  Internal,
}

const RULES: &[(&str, Failure)] = &[
  ("Video unavailable", Failure::Unavailable),
  ("Sign in to confirm your age", Failure::AgeRestricted),
  (
    "Failed to extract any player response",
    Failure::UpstreamUnstable,
  ),
  ("Unable to extract", Failure::UpstreamUnstable),
  ("Connection refused", Failure::TransientNetwork),
  ("Connection reset", Failure::TransientNetwork),
];

pub fn classify(message: &str) -> Failure {
  RULES
    .iter()
    .find(|(signal, _)| message.contains(signal))
    .map(|(_, failure)| *failure)
    .unwrap_or(Failure::Internal)
}
