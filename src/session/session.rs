use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::engine::Shared;
use super::state::SessionState;
use super::stats::{SessionCounters, Speaker, TranscriptEntry};
use crate::audio::codec::{bytes_to_portable_text, float_to_pcm_bytes, pcm_bytes_to_float, pcm_mime_type, portable_text_to_bytes};
use crate::audio::{AudioFrame, CaptureBackend, PlaybackScheduler, UnitId};
use crate::error::SessionError;
use crate::live::messages::{Blob, FunctionCall, FunctionResponse, ServerContent, ServerMessage};
use crate::live::{ChannelEvent, LiveChannel};
use crate::tools::{ToolDispatcher, FUNCTION_NOT_FOUND};

/// Message shown when the microphone cannot be acquired or started
pub const MICROPHONE_ERROR: &str = "Could not start the microphone. Please grant permission.";

/// Message shown when the session fails after it was opened
pub const SESSION_ERROR: &str = "An error occurred during the session.";

/// Why a session ended
#[derive(Debug)]
pub(crate) enum Outcome {
    /// User stop or engine teardown
    Stopped,
    /// Remote channel closed
    Closed(Option<String>),
    /// Unrecoverable error
    Failed(SessionError),
}

/// One active voice conversation
///
/// Owns the channel, the capture backend and the playback scheduler for
/// its whole lifetime and releases all of them in [`Session::teardown`].
pub(crate) struct Session {
    id: String,
    channel: Box<dyn LiveChannel>,
    capture: Box<dyn CaptureBackend>,
    playback: PlaybackScheduler,
    dispatcher: ToolDispatcher,
    shared: Arc<Shared>,
    /// User speech fragments of the current turn
    input_transcript: String,
    /// Model speech fragments of the current turn
    output_transcript: String,
}

impl Session {
    pub fn new(
        id: String,
        channel: Box<dyn LiveChannel>,
        capture: Box<dyn CaptureBackend>,
        playback: PlaybackScheduler,
        dispatcher: ToolDispatcher,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            channel,
            capture,
            playback,
            dispatcher,
            shared,
            input_transcript: String::new(),
            output_transcript: String::new(),
        }
    }

    /// Drive the session until it is stopped, closed or fails
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ChannelEvent>,
        mut ended_rx: mpsc::UnboundedReceiver<UnitId>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        info!("Session {} waiting for channel", self.id);

        let mut frames: Option<mpsc::Receiver<AudioFrame>> = None;

        let outcome = loop {
            tokio::select! {
                // Fires on explicit stop and when the engine is dropped
                _ = &mut stop_rx => break Outcome::Stopped,

                event = events.recv() => {
                    let event = event.unwrap_or(ChannelEvent::Close(None));
                    if let Some(outcome) = self.handle_event(event, &mut frames).await {
                        break outcome;
                    }
                }

                Some(frame) = next_frame(&mut frames) => self.handle_frame(frame),

                Some(id) = ended_rx.recv() => self.handle_unit_ended(id),
            }
        };

        drop(frames);
        self.teardown().await;
        self.finish(outcome).await;
    }

    pub(crate) async fn handle_event(
        &mut self,
        event: ChannelEvent,
        frames: &mut Option<mpsc::Receiver<AudioFrame>>,
    ) -> Option<Outcome> {
        match event {
            ChannelEvent::Open => match self.activate().await {
                Ok(Some(rx)) => {
                    *frames = Some(rx);
                    None
                }
                Ok(None) => None,
                Err(e) => Some(Outcome::Failed(e)),
            },
            ChannelEvent::Message(msg) => {
                self.handle_message(msg).await;
                None
            }
            ChannelEvent::Error(reason) => Some(Outcome::Failed(SessionError::Channel(reason))),
            ChannelEvent::Close(reason) => Some(Outcome::Closed(reason)),
        }
    }

    /// Channel is open: go active and start the capture graph
    async fn activate(&mut self) -> Result<Option<mpsc::Receiver<AudioFrame>>, SessionError> {
        if self.shared.current_state() == SessionState::Active {
            warn!("Session {} received a second open signal", self.id);
            return Ok(None);
        }

        self.shared.set_state(SessionState::Active);

        let rx = self.capture.start().await?;
        info!("Session {} active, capturing from {}", self.id, self.capture.name());

        Ok(Some(rx))
    }

    /// Encode one captured frame and hand it to the channel
    ///
    /// Sends are fire-and-forget; a rejected frame is dropped, not retried.
    pub(crate) fn handle_frame(&mut self, frame: AudioFrame) {
        if self.shared.current_state() != SessionState::Active {
            return;
        }

        let chunk = Blob {
            mime_type: pcm_mime_type(frame.sample_rate),
            data: bytes_to_portable_text(&float_to_pcm_bytes(&frame.samples)),
        };

        let counters = &self.shared.counters;
        match self.channel.send_audio(chunk) {
            Ok(()) => SessionCounters::bump(&counters.frames_sent),
            Err(e) => {
                SessionCounters::bump(&counters.frames_dropped);
                warn!("Dropped audio frame {}: {}", frame.sequence, e);
            }
        }
    }

    pub(crate) fn handle_unit_ended(&mut self, id: UnitId) {
        if self.playback.unit_ended(id) {
            debug!("Playback unit {} finished", id);
        }
    }

    pub(crate) async fn handle_message(&mut self, msg: ServerMessage) {
        if self.shared.current_state() != SessionState::Active {
            debug!("Ignoring server message outside the active state");
            return;
        }

        if let Some(tool_call) = msg.tool_call {
            for call in tool_call.function_calls {
                self.answer_tool_call(call);
            }
        }

        if let Some(content) = msg.server_content {
            self.handle_content(content).await;
        }

        if let Some(cancellation) = msg.tool_call_cancellation {
            info!("Server cancelled tool calls {:?}", cancellation.ids);
        }

        if let Some(go_away) = msg.go_away {
            warn!(
                "Server will close the session soon (time left: {})",
                go_away.time_left.as_deref().unwrap_or("unknown")
            );
        }
    }

    async fn handle_content(&mut self, content: ServerContent) {
        if let Some(fragment) = &content.output_transcription {
            self.output_transcript.push_str(&fragment.text);
        }
        if let Some(fragment) = &content.input_transcription {
            self.input_transcript.push_str(&fragment.text);
        }

        if content.turn_complete {
            self.flush_turn().await;
        }

        for chunk in content.audio_chunks() {
            self.play_chunk(chunk);
        }

        if content.interrupted {
            let stopped = self.playback.interrupt();
            SessionCounters::bump(&self.shared.counters.interruptions);
            info!("Model interrupted, stopped {} playback units", stopped);
        }
    }

    /// Emit one transcript entry per non-empty accumulator (user first)
    async fn flush_turn(&mut self) {
        let input = std::mem::take(&mut self.input_transcript);
        let output = std::mem::take(&mut self.output_transcript);

        if !input.is_empty() {
            self.shared.append_transcript(TranscriptEntry::new(Speaker::User, input)).await;
        }
        if !output.is_empty() {
            self.shared.append_transcript(TranscriptEntry::new(Speaker::Model, output)).await;
        }

        SessionCounters::bump(&self.shared.counters.turns_completed);
    }

    fn play_chunk(&mut self, chunk: &Blob) {
        let bytes = match portable_text_to_bytes(&chunk.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Discarding undecodable audio chunk: {}", e);
                return;
            }
        };

        let samples = pcm_bytes_to_float(&bytes, 1)
            .into_iter()
            .next()
            .unwrap_or_default();
        if samples.is_empty() {
            return;
        }

        match self.playback.schedule(samples) {
            Ok(_) => SessionCounters::bump(&self.shared.counters.chunks_played),
            Err(e) => warn!("Failed to schedule model audio: {}", e),
        }
    }

    /// Apply a tool invocation and send exactly one acknowledgement
    fn answer_tool_call(&mut self, call: FunctionCall) {
        let result = match self.dispatcher.dispatch(&call.name, &call.args) {
            Ok(result) => result,
            Err(e) => {
                warn!("{}", e);
                FUNCTION_NOT_FOUND.to_string()
            }
        };

        let response = FunctionResponse::new(call.id, call.name, result);
        match self.channel.send_tool_response(response) {
            Ok(()) => SessionCounters::bump(&self.shared.counters.tool_calls),
            Err(e) => warn!("Failed to acknowledge tool call: {}", e),
        }
    }

    /// Release everything the session owns
    ///
    /// Every step runs even if an earlier one failed.
    pub(crate) async fn teardown(&mut self) {
        info!("Tearing down session {}", self.id);

        if let Err(e) = self.channel.close() {
            warn!("{}", SessionError::teardown("close_channel", e));
        }

        if let Err(e) = self.capture.stop().await {
            warn!("{}", SessionError::teardown("stop_capture", e));
        }

        if let Err(e) = self.playback.stop_all() {
            warn!("{}", SessionError::teardown("close_output", e));
        }
    }

    async fn finish(&self, outcome: Outcome) {
        self.shared.mark_ended().await;
        match outcome {
            Outcome::Stopped => {
                info!("Session {} stopped", self.id);
                self.shared.set_state(SessionState::Idle);
            }
            Outcome::Closed(reason) => {
                info!(
                    "Session {} closed by remote ({})",
                    self.id,
                    reason.as_deref().unwrap_or("no reason")
                );
                self.shared.set_state(SessionState::Idle);
            }
            Outcome::Failed(err) => {
                let message = match err {
                    SessionError::PermissionDenied(_) | SessionError::Audio(_) => MICROPHONE_ERROR,
                    _ => SESSION_ERROR,
                };
                self.shared.fail(message, &err);
            }
        }
    }
}

/// Next captured frame; pends forever once capture has no source
async fn next_frame(frames: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    let frame = match frames.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    };

    if frame.is_none() {
        debug!("Capture source ended");
        *frames = None;
    }

    frame
}
