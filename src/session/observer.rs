use super::state::SessionState;
use super::stats::TranscriptEntry;

/// Callbacks the engine exposes to the UI that owns it
///
/// Called from the session task; implementations must not block.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, _state: SessionState) {}

    fn on_transcript_appended(&self, _entry: &TranscriptEntry) {}

    /// The model asked to switch to tab `tab_id` (not validated)
    fn on_navigate_requested(&self, _tab_id: &str) {}

    /// The model asked to generate an image from `prompt`
    fn on_generate_requested(&self, _prompt: &str) {}

    /// A user-visible error message
    fn on_error(&self, _message: &str) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
