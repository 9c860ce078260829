use thiserror::Error;

/// Failures the watch loop knows how to classify.
///
/// `CaptureUnavailable` and `RecognitionFailure` are recovered inside the
/// loop; `ConfigurationInvalid` is only ever returned before a run starts.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("text recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("invalid {field}: {reason}")]
    ConfigurationInvalid { field: &'static str, reason: String },

    #[error("watch already running")]
    AlreadyRunning,
}

impl WatchError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        WatchError::ConfigurationInvalid {
            field,
            reason: reason.into(),
        }
    }
}
