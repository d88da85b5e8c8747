// Shared fakes for session engine integration tests
//
// The fakes stand in for the remote model, the microphone and the output
// context so the engine can be driven deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use live_voice::audio::{AudioDevices, AudioFrame, CaptureBackend, CaptureConfig, PlaybackDevice, UnitId};
use live_voice::live::messages::{Blob, Content, FunctionCall, Part, ServerContent, ServerMessage, ToolCall, Transcription};
use live_voice::live::{ChannelEvent, FunctionResponse, LiveChannel, LiveConfig, LiveConnection, LiveConnector};
use live_voice::{AudioError, SessionError, SessionObserver, SessionState, TranscriptEntry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Remote model
// ============================================================================

/// What the fake remote side has seen, plus a handle to push events
#[derive(Default)]
pub struct Remote {
    events: Mutex<Option<mpsc::Sender<ChannelEvent>>>,
    pub models: Mutex<Vec<String>>,
    pub configs: Mutex<Vec<LiveConfig>>,
    pub audio: Mutex<Vec<Blob>>,
    pub acks: Mutex<Vec<FunctionResponse>>,
    pub closes: AtomicUsize,
    pub reject_audio: AtomicBool,
}

impl Remote {
    pub async fn emit(&self, event: ChannelEvent) {
        let tx = self.events.lock().unwrap().clone().expect("channel was never opened");
        tx.send(event).await.expect("session stopped listening");
    }

    pub async fn message(&self, msg: ServerMessage) {
        self.emit(ChannelEvent::Message(msg)).await;
    }

    pub async fn content(&self, content: ServerContent) {
        self.message(ServerMessage {
            server_content: Some(content),
            ..ServerMessage::default()
        })
        .await;
    }

    pub fn open_count(&self) -> usize {
        self.models.lock().unwrap().len()
    }

    pub fn ack_count(&self) -> usize {
        self.acks.lock().unwrap().len()
    }
}

struct FakeChannel {
    remote: Arc<Remote>,
}

impl LiveChannel for FakeChannel {
    fn send_audio(&self, chunk: Blob) -> Result<(), SessionError> {
        if self.remote.reject_audio.load(Ordering::SeqCst) {
            return Err(SessionError::Channel("audio queue full".to_string()));
        }
        self.remote.audio.lock().unwrap().push(chunk);
        Ok(())
    }

    fn send_tool_response(&self, response: FunctionResponse) -> Result<(), SessionError> {
        self.remote.acks.lock().unwrap().push(response);
        Ok(())
    }

    fn close(&self) -> Result<(), SessionError> {
        self.remote.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnector {
    pub remote: Arc<Remote>,
    pub refuse: Option<String>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(Remote::default()),
            refuse: None,
        }
    }

    pub fn refusing(reason: &str) -> Self {
        Self {
            remote: Arc::new(Remote::default()),
            refuse: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn open(&self, model: &str, config: &LiveConfig) -> Result<LiveConnection, SessionError> {
        if let Some(reason) = &self.refuse {
            return Err(SessionError::Channel(reason.clone()));
        }

        let (tx, rx) = mpsc::channel(32);
        *self.remote.events.lock().unwrap() = Some(tx);
        self.remote.models.lock().unwrap().push(model.to_string());
        self.remote.configs.lock().unwrap().push(config.clone());

        Ok(LiveConnection {
            channel: Box::new(FakeChannel {
                remote: self.remote.clone(),
            }),
            events: rx,
        })
    }
}

// ============================================================================
// Local audio
// ============================================================================

/// Fake microphone: push frames in, observe acquisition and release
#[derive(Default)]
pub struct Microphone {
    tx: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    pub acquired: AtomicUsize,
    pub started: AtomicBool,
    pub released: AtomicBool,
}

impl Microphone {
    pub async fn speak(&self, sequence: u64) {
        let tx = self.tx.lock().unwrap().clone().expect("capture not started");
        let frame = AudioFrame {
            samples: vec![0.1; 4096],
            sample_rate: 16000,
            sequence,
            timestamp_ms: sequence * 256,
        };
        tx.send(frame).await.expect("capture consumer gone");
    }
}

struct FakeCapture {
    mic: Arc<Microphone>,
}

#[async_trait]
impl CaptureBackend for FakeCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        let (tx, rx) = mpsc::channel(16);
        *self.mic.tx.lock().unwrap() = Some(tx);
        self.mic.started.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        self.mic.tx.lock().unwrap().take();
        self.mic.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.mic.tx.lock().unwrap().is_some()
    }

    fn name(&self) -> &str {
        "fake-mic"
    }
}

/// A unit as the output context saw it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub id: UnitId,
    pub start_at: f64,
    pub duration: f64,
}

/// Output context with a hand-driven clock
#[derive(Default)]
pub struct Loudspeaker {
    now: Mutex<f64>,
    ended_tx: Mutex<Option<mpsc::UnboundedSender<UnitId>>>,
    pub scheduled: Mutex<Vec<Scheduled>>,
    pub stopped: Mutex<Vec<UnitId>>,
    pub closed: AtomicBool,
}

impl Loudspeaker {
    pub fn set_time(&self, secs: f64) {
        *self.now.lock().unwrap() = secs;
    }

    /// Report `id` as played to completion
    pub fn finish(&self, id: UnitId) {
        if let Some(tx) = self.ended_tx.lock().unwrap().as_ref() {
            let _ = tx.send(id);
        }
    }

    pub fn scheduled(&self) -> Vec<Scheduled> {
        self.scheduled.lock().unwrap().clone()
    }
}

struct FakeOutput {
    speaker: Arc<Loudspeaker>,
    sample_rate: u32,
}

impl PlaybackDevice for FakeOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        *self.speaker.now.lock().unwrap()
    }

    fn schedule(&mut self, id: UnitId, samples: Vec<f32>, start_at: f64) -> Result<(), AudioError> {
        self.speaker.scheduled.lock().unwrap().push(Scheduled {
            id,
            start_at,
            duration: samples.len() as f64 / self.sample_rate as f64,
        });
        Ok(())
    }

    fn stop(&mut self, id: UnitId) -> Result<(), AudioError> {
        self.speaker.stopped.lock().unwrap().push(id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.speaker.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeDevices {
    pub mic: Arc<Microphone>,
    pub speaker: Arc<Loudspeaker>,
    pub deny_microphone: bool,
    pub stall_microphone: bool,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            mic: Arc::new(Microphone::default()),
            speaker: Arc::new(Loudspeaker::default()),
            deny_microphone: false,
            stall_microphone: false,
        }
    }

    pub fn denying() -> Self {
        Self {
            deny_microphone: true,
            ..Self::new()
        }
    }

    /// Microphone access that the user never answers
    pub fn stalling() -> Self {
        Self {
            stall_microphone: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl AudioDevices for FakeDevices {
    async fn request_microphone(&self, _config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>, AudioError> {
        if self.deny_microphone {
            return Err(AudioError::PermissionDenied("user dismissed the prompt".to_string()));
        }
        if self.stall_microphone {
            std::future::pending::<()>().await;
        }
        self.mic.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeCapture { mic: self.mic.clone() }))
    }

    fn open_output(
        &self,
        sample_rate: u32,
        ended_tx: mpsc::UnboundedSender<UnitId>,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        *self.speaker.ended_tx.lock().unwrap() = Some(ended_tx);
        self.speaker.closed.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeOutput {
            speaker: self.speaker.clone(),
            sample_rate,
        }))
    }
}

// ============================================================================
// UI
// ============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub states: Mutex<Vec<SessionState>>,
    pub transcript: Mutex<Vec<TranscriptEntry>>,
    pub navigations: Mutex<Vec<String>>,
    pub generations: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().unwrap().clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_change(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_transcript_appended(&self, entry: &TranscriptEntry) {
        self.transcript.lock().unwrap().push(entry.clone());
    }

    fn on_navigate_requested(&self, tab_id: &str) {
        self.navigations.lock().unwrap().push(tab_id.to_string());
    }

    fn on_generate_requested(&self, prompt: &str) {
        self.generations.lock().unwrap().push(prompt.to_string());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

// ============================================================================
// Message builders
// ============================================================================

pub fn input_fragment(text: &str) -> ServerContent {
    ServerContent {
        input_transcription: Some(Transcription { text: text.to_string() }),
        ..ServerContent::default()
    }
}

pub fn output_fragment(text: &str) -> ServerContent {
    ServerContent {
        output_transcription: Some(Transcription { text: text.to_string() }),
        ..ServerContent::default()
    }
}

pub fn turn_complete() -> ServerContent {
    ServerContent {
        turn_complete: true,
        ..ServerContent::default()
    }
}

pub fn interrupted() -> ServerContent {
    ServerContent {
        interrupted: true,
        ..ServerContent::default()
    }
}

/// Model speech of `secs` seconds of silence at 24 kHz
pub fn speech(secs: f64) -> ServerContent {
    let samples = (secs * 24000.0) as usize;
    ServerContent {
        model_turn: Some(Content {
            role: Some("model".to_string()),
            parts: vec![Part {
                text: None,
                inline_data: Some(Blob {
                    mime_type: "audio/pcm;rate=24000".to_string(),
                    data: live_voice::audio::codec::bytes_to_portable_text(&vec![0u8; samples * 2]),
                }),
            }],
        }),
        ..ServerContent::default()
    }
}

pub fn tool_call(calls: &[(&str, &str, serde_json::Value)]) -> ServerMessage {
    ServerMessage {
        tool_call: Some(ToolCall {
            function_calls: calls
                .iter()
                .map(|(id, name, args)| FunctionCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    args: args.clone(),
                })
                .collect(),
        }),
        ..ServerMessage::default()
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Poll `check` until it holds, failing the test after a second
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}
