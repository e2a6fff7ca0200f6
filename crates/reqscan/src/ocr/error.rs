use std::fmt;

/// Failure of a single recognition backend call or engine initialization.
///
/// Never crosses the pipeline boundary; the pipeline records it and moves on to the next
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Engine missing or refused to start
    Unavailable(String),
    /// Frame could not be handed to the engine
    InvalidInput(String),
    /// Engine ran and failed
    ProcessingFailed(String),
    /// Engine output could not be interpreted
    MalformedOutput(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid backend input: {}", msg),
            Self::ProcessingFailed(msg) => write!(f, "Recognition failed: {}", msg),
            Self::MalformedOutput(msg) => write!(f, "Malformed backend output: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Storage failure inside the OCR result cache.
///
/// Read-side failures degrade to a miss; write-side failures are reported as events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Io(String),
    Encode(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Cache I/O error: {}", msg),
            Self::Encode(msg) => write!(f, "Cache encoding error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}
