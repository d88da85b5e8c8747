use super::events::EventLog;
use crate::session::SessionEngine;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single voice session engine of this process
    pub engine: Arc<SessionEngine>,

    /// Observer the engine reports to
    pub events: Arc<EventLog>,
}

impl AppState {
    pub fn new(engine: Arc<SessionEngine>, events: Arc<EventLog>) -> Self {
        Self { engine, events }
    }
}
