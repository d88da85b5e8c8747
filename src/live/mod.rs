//! Remote model channel capability
//!
//! The session engine never talks to the network directly. It opens a
//! channel through an injected [`LiveConnector`] and then:
//! - pushes audio and tool responses through the returned [`LiveChannel`]
//! - consumes [`ChannelEvent`]s (open, messages, error, close) from a receiver

pub mod client;
pub mod config;
pub mod messages;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SessionError;

pub use client::GeminiLiveConnector;
pub use config::{FunctionDeclaration, LiveConfig, ResponseModality, Schema, SchemaType};
pub use messages::{Blob, ClientMessage, FunctionCall, FunctionResponse, ServerContent, ServerMessage};

/// Events delivered by an open channel, in arrival order
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The remote side accepted the session
    Open,
    /// A streamed model message
    Message(ServerMessage),
    /// Transport or protocol failure; no further events follow
    Error(String),
    /// The channel closed; no further events follow
    Close(Option<String>),
}

/// Sending half of an open model channel
///
/// Sends never block. Audio is lossy: a send that cannot be queued is
/// reported as an error and not retried.
pub trait LiveChannel: Send + Sync {
    /// Queue one encoded microphone frame
    fn send_audio(&self, chunk: Blob) -> Result<(), SessionError>;

    /// Queue the acknowledgement of a tool invocation
    fn send_tool_response(&self, response: FunctionResponse) -> Result<(), SessionError>;

    /// Request the channel to close; completion is not awaited
    fn close(&self) -> Result<(), SessionError>;
}

/// A channel handle plus the stream of events it produces
pub struct LiveConnection {
    pub channel: Box<dyn LiveChannel>,
    pub events: mpsc::Receiver<ChannelEvent>,
}

/// Capability to open a bidirectional model session
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Begin opening a session; [`ChannelEvent::Open`] arrives once the
    /// remote side has accepted it.
    async fn open(&self, model: &str, config: &LiveConfig) -> Result<LiveConnection, SessionError>;
}
