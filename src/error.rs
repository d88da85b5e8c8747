use thiserror::Error;

/// Errors raised by the local audio devices (capture and playback)
#[derive(Debug, Error)]
pub enum AudioError {
    /// Microphone access was refused
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// Device could not be opened or has gone away
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// WAV read/write failure in the file-backed devices
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Operation attempted on a device that was already closed
    #[error("Audio device already closed")]
    Closed,
}

/// Errors surfaced by the voice session engine
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone access refused; terminal for the session
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// Remote transport or protocol fault; terminal for the session
    #[error("Channel error: {0}")]
    Channel(String),

    /// Remote side invoked a tool this session does not provide
    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    /// A single cleanup step failed; logged and never propagated
    #[error("Teardown step '{step}' failed: {reason}")]
    TeardownFailure { step: &'static str, reason: String },

    /// Local audio failure outside permission handling
    #[error(transparent)]
    Audio(AudioError),

    /// A session is already open on this engine instance
    #[error("A voice session is already active")]
    AlreadyActive,

    /// Invalid session or model configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::PermissionDenied(reason) => SessionError::PermissionDenied(reason),
            other => SessionError::Audio(other),
        }
    }
}

impl SessionError {
    /// Build a teardown failure for the named cleanup step
    pub fn teardown(step: &'static str, reason: impl ToString) -> Self {
        SessionError::TeardownFailure {
            step,
            reason: reason.to_string(),
        }
    }
}
