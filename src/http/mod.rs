//! HTTP API server for controlling the voice session
//!
//! This module provides a REST API around one `SessionEngine`:
//! - POST /session/start - Start a session
//! - POST /session/stop - Stop the session
//! - GET /session/status - Lifecycle state and statistics
//! - GET /session/transcript - Completed turns so far
//! - GET /session/events - Notifications the UI would receive
//! - GET /health - Health check

mod events;
mod handlers;
mod routes;
mod state;

pub use events::{EventLog, UiEvent, UiEventKind, MAX_EVENTS};
pub use routes::create_router;
pub use state::AppState;
