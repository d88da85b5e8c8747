//! Voice session management
//!
//! This module provides the `SessionEngine` that manages:
//! - Microphone capture and upstream audio streaming
//! - Gapless playback of model speech, with barge-in
//! - Turn-based transcript accumulation
//! - Tool invocation dispatch and acknowledgement
//! - Session lifecycle state and statistics

mod config;
mod engine;
mod observer;
#[allow(clippy::module_inception)]
mod session;
mod state;
mod stats;

pub use config::{SessionProfile, SessionVariant, COMPANION_VOICE, DEFAULT_MODEL, PLAYBACK_SAMPLE_RATE};
pub use engine::SessionEngine;
pub use observer::{NoopObserver, SessionObserver};
pub use session::{MICROPHONE_ERROR, SESSION_ERROR};
pub use state::SessionState;
pub use stats::{SessionStats, Speaker, TranscriptEntry};
