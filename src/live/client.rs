//! WebSocket implementation of the model channel

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::config::LiveConfig;
use super::messages::{Blob, ClientMessage, FunctionResponse, RealtimeInput, ServerMessage, Setup, ToolResponse};
use super::{ChannelEvent, LiveChannel, LiveConnection, LiveConnector};
use crate::error::SessionError;

/// Default bidirectional endpoint of the model service
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Opens model sessions over a WebSocket
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    /// Bound of the lossy audio queue
    audio_queue_capacity: usize,
}

impl GeminiLiveConnector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            audio_queue_capacity: 32,
        }
    }

    pub fn with_audio_queue_capacity(mut self, capacity: usize) -> Self {
        self.audio_queue_capacity = capacity.max(1);
        self
    }

    fn build_ws_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.api_key)
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn open(&self, model: &str, config: &LiveConfig) -> Result<LiveConnection, SessionError> {
        if self.api_key.is_empty() {
            return Err(SessionError::Config("model API key is not set".to_string()));
        }

        let setup = ClientMessage::Setup(Setup::new(model, config));
        let (audio_tx, audio_rx) = mpsc::channel(self.audio_queue_capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let close = Arc::new(Notify::new());

        info!("Opening model session for {}", model);

        let url = self.build_ws_url();
        let close_signal = Arc::clone(&close);
        tokio::spawn(async move {
            run_connection(url, setup, audio_rx, control_rx, close_signal, events_tx).await;
        });

        Ok(LiveConnection {
            channel: Box::new(WsChannel {
                audio_tx,
                control_tx,
                close,
            }),
            events: events_rx,
        })
    }
}

/// Sending half handed to the engine
struct WsChannel {
    /// Bounded; full queue drops the frame
    audio_tx: mpsc::Sender<ClientMessage>,
    /// Unbounded; acknowledgements are never dropped
    control_tx: mpsc::UnboundedSender<ClientMessage>,
    close: Arc<Notify>,
}

impl LiveChannel for WsChannel {
    fn send_audio(&self, chunk: Blob) -> Result<(), SessionError> {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![chunk],
        });

        self.audio_tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::Channel("audio queue full".to_string()),
            TrySendError::Closed(_) => SessionError::Channel("channel closed".to_string()),
        })
    }

    fn send_tool_response(&self, response: FunctionResponse) -> Result<(), SessionError> {
        let msg = ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![response],
        });

        self.control_tx
            .send(msg)
            .map_err(|_| SessionError::Channel("channel closed".to_string()))
    }

    fn close(&self) -> Result<(), SessionError> {
        self.close.notify_one();
        Ok(())
    }
}

async fn run_connection(
    url: String,
    setup: ClientMessage,
    mut audio_rx: mpsc::Receiver<ClientMessage>,
    mut control_rx: mpsc::UnboundedReceiver<ClientMessage>,
    close: Arc<Notify>,
    events_tx: mpsc::Sender<ChannelEvent>,
) {
    // Connect, unless the engine gives up first
    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
        _ = close.notified() => {
            info!("Session closed before the connection was established");
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to model service: {}", e);
            let _ = events_tx.send(ChannelEvent::Error(e.to_string())).await;
            return;
        }
    };

    info!("Connected to model service");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    if let Err(e) = send_message(&mut ws_sink, &setup).await {
        let _ = events_tx.send(ChannelEvent::Error(e)).await;
        return;
    }

    let mut opened = false;

    loop {
        tokio::select! {
            biased;

            _ = close.notified() => {
                debug!("Closing model channel");
                let _ = ws_sink.send(Message::Close(None)).await;
                let _ = ws_sink.close().await;
                let _ = events_tx.send(ChannelEvent::Close(None)).await;
                break;
            }

            Some(msg) = control_rx.recv() => {
                if let Err(e) = send_message(&mut ws_sink, &msg).await {
                    let _ = events_tx.send(ChannelEvent::Error(e)).await;
                    break;
                }
            }

            Some(msg) = audio_rx.recv() => {
                if let Err(e) = send_message(&mut ws_sink, &msg).await {
                    let _ = events_tx.send(ChannelEvent::Error(e)).await;
                    break;
                }
            }

            incoming = ws_stream.next() => {
                let payload = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.to_vec(),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        info!("Model channel closed by server: {:?}", reason);
                        let _ = events_tx.send(ChannelEvent::Close(reason)).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        let _ = events_tx.send(ChannelEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        let _ = events_tx.send(ChannelEvent::Close(None)).await;
                        break;
                    }
                };

                let msg = match serde_json::from_slice::<ServerMessage>(&payload) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Failed to parse server message: {}", e);
                        continue;
                    }
                };

                if msg.setup_complete.is_some() && !opened {
                    opened = true;
                    if events_tx.send(ChannelEvent::Open).await.is_err() {
                        break;
                    }
                }

                if events_tx.send(ChannelEvent::Message(msg)).await.is_err() {
                    // Engine is gone
                    break;
                }
            }
        }
    }
}

async fn send_message<S>(sink: &mut S, msg: &ClientMessage) -> Result<(), String>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(msg).map_err(|e| format!("Failed to serialize message: {}", e))?;

    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| format!("Failed to send WebSocket message: {}", e))
}
