use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::state::SessionState;

/// Who spoke a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

/// One completed turn of speech, in conversational order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,

    /// Concatenated transcript fragments of the turn
    pub text: String,

    /// When the turn completed
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Statistics about the current (or last) voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Identifier of the session, if one was ever started
    pub session_id: Option<String>,

    /// Lifecycle state at the time of the snapshot
    pub state: SessionState,

    /// When the session started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session started
    pub duration_secs: f64,

    /// Microphone frames handed to the channel
    pub frames_sent: usize,

    /// Microphone frames the channel could not take
    pub frames_dropped: usize,

    /// Model audio chunks scheduled for playback
    pub chunks_played: usize,

    pub turns_completed: usize,

    /// Tool invocations acknowledged
    pub tool_calls: usize,

    pub interruptions: usize,

    pub transcript_entries: usize,
}

/// Counters updated by the running session
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub frames_sent: AtomicUsize,
    pub frames_dropped: AtomicUsize,
    pub chunks_played: AtomicUsize,
    pub turns_completed: AtomicUsize,
    pub tool_calls: AtomicUsize,
    pub interruptions: AtomicUsize,
}

impl SessionCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        for counter in [
            &self.frames_sent,
            &self.frames_dropped,
            &self.chunks_played,
            &self.turns_completed,
            &self.tool_calls,
            &self.interruptions,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}
