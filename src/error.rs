// Error taxonomy. Only CaptureError is meant for the user's eyes; decode and
// analysis failures are recoverable and stay local to the pipeline (logged,
// previous segments untouched).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available — is a microphone connected?")]
    NoInputDevice,

    #[error("a recording is already in progress")]
    Busy,

    #[error("capture did not complete within {0:.1}s")]
    Timeout(f64),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed wav data: {0}")]
    Wav(#[from] hound::Error),

    #[error("capture contains no audio frames")]
    Empty,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis server returned status {0}")]
    Status(u16),

    #[error("malformed analysis response: {0}")]
    Malformed(String),
}
