use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::session::{SessionObserver, SessionState, TranscriptEntry};

/// Oldest events are discarded past this many
pub const MAX_EVENTS: usize = 1000;

/// Something the UI would have been told
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEventKind {
    StateChanged { state: SessionState },
    TranscriptAppended { entry: TranscriptEntry },
    NavigateRequested { tab: String },
    GenerateRequested { prompt: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UiEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: UiEventKind,
}

/// Session observer that records notifications for HTTP clients
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<VecDeque<UiEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: UiEventKind) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(UiEvent {
            timestamp: Utc::now(),
            kind,
        });
    }

    /// All recorded events, oldest first
    pub fn snapshot(&self) -> Vec<UiEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().cloned().collect()
    }
}

impl SessionObserver for EventLog {
    fn on_state_change(&self, state: SessionState) {
        self.push(UiEventKind::StateChanged { state });
    }

    fn on_transcript_appended(&self, entry: &TranscriptEntry) {
        self.push(UiEventKind::TranscriptAppended {
            entry: entry.clone(),
        });
    }

    fn on_navigate_requested(&self, tab_id: &str) {
        self.push(UiEventKind::NavigateRequested {
            tab: tab_id.to_string(),
        });
    }

    fn on_generate_requested(&self, prompt: &str) {
        self.push(UiEventKind::GenerateRequested {
            prompt: prompt.to_string(),
        });
    }

    fn on_error(&self, message: &str) {
        self.push(UiEventKind::Error {
            message: message.to_string(),
        });
    }
}
