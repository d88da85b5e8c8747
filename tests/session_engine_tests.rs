// Integration tests for the voice session engine
//
// The engine is driven through fake connector, devices and observer; the
// remote side pushes events exactly as the live channel would.

mod common;

use common::*;
use live_voice::live::ChannelEvent;
use live_voice::session::{MICROPHONE_ERROR, SESSION_ERROR};
use live_voice::{SessionEngine, SessionError, SessionProfile, SessionState, Speaker};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Arc<SessionEngine>,
    remote: Arc<Remote>,
    devices: Arc<FakeDevices>,
    ui: Arc<RecordingObserver>,
}

fn harness_with(profile: SessionProfile, connector: FakeConnector, devices: FakeDevices) -> Harness {
    let remote = connector.remote.clone();
    let devices = Arc::new(devices);
    let ui = Arc::new(RecordingObserver::default());
    let engine = Arc::new(SessionEngine::new(
        profile,
        Arc::new(connector),
        devices.clone(),
        ui.clone(),
    ));

    Harness {
        engine,
        remote,
        devices,
        ui,
    }
}

fn companion() -> Harness {
    harness_with(SessionProfile::companion(), FakeConnector::new(), FakeDevices::new())
}

fn assistant() -> Harness {
    harness_with(SessionProfile::assistant(), FakeConnector::new(), FakeDevices::new())
}

impl Harness {
    /// Start and wait for the channel to open
    async fn open(&self) {
        self.engine.start().await.expect("start failed");
        self.remote.emit(ChannelEvent::Open).await;
        eventually("active state", || self.engine.state() == SessionState::Active).await;
    }
}

#[tokio::test]
async fn test_lifecycle_idle_connecting_active_idle() {
    let h = companion();
    assert_eq!(h.engine.state(), SessionState::Idle);

    h.engine.start().await.unwrap();
    assert_eq!(h.engine.state(), SessionState::Connecting);
    assert_eq!(h.devices.mic.acquired.load(Ordering::SeqCst), 1);
    assert!(!h.devices.mic.started.load(Ordering::SeqCst));

    h.remote.emit(ChannelEvent::Open).await;
    eventually("capture start", || h.devices.mic.started.load(Ordering::SeqCst)).await;
    assert_eq!(h.engine.state(), SessionState::Active);

    let stats = h.engine.stop().await;
    assert_eq!(stats.state, SessionState::Idle);
    assert!(stats.session_id.is_some());

    assert_eq!(
        h.ui.states(),
        vec![SessionState::Connecting, SessionState::Active, SessionState::Idle]
    );
    assert!(h.devices.mic.released.load(Ordering::SeqCst));
    assert!(h.devices.speaker.closed.load(Ordering::SeqCst));
    assert_eq!(h.remote.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_channel_opened_with_profile_options() {
    let h = companion();
    h.engine.start().await.unwrap();

    assert_eq!(*h.remote.models.lock().unwrap(), vec![live_voice::session::DEFAULT_MODEL]);
    let config = h.remote.configs.lock().unwrap()[0].clone();
    assert!(config.input_transcription);
    assert!(config.output_transcription);
    assert_eq!(config.voice.as_deref(), Some("Zephyr"));

    h.engine.stop().await;
}

#[tokio::test]
async fn test_captured_frames_stream_upstream() {
    let h = companion();
    h.open().await;

    for sequence in 0..3 {
        h.devices.mic.speak(sequence).await;
    }
    eventually("three frames sent", || h.remote.audio.lock().unwrap().len() == 3).await;

    let audio = h.remote.audio.lock().unwrap().clone();
    assert!(audio.iter().all(|chunk| chunk.mime_type == "audio/pcm;rate=16000"));

    h.remote.reject_audio.store(true, Ordering::SeqCst);
    h.devices.mic.speak(3).await;

    for _ in 0..200 {
        if h.engine.stats().await.frames_dropped == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let stats = h.engine.stop().await;
    assert_eq!(stats.frames_sent, 3);
    assert_eq!(stats.frames_dropped, 1);
}

#[tokio::test]
async fn test_fragments_become_one_entry_on_turn_complete() {
    let h = companion();
    h.open().await;

    h.remote.content(input_fragment("Hel")).await;
    h.remote.content(input_fragment("lo")).await;
    h.remote.content(output_fragment("Hi, how ")).await;
    h.remote.content(output_fragment("are you?")).await;
    h.remote.content(turn_complete()).await;

    eventually("two entries", || h.ui.transcript().len() == 2).await;

    let transcript = h.engine.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].speaker, Speaker::User);
    assert_eq!(transcript[0].text, "Hello");
    assert_eq!(transcript[1].speaker, Speaker::Model);
    assert_eq!(transcript[1].text, "Hi, how are you?");

    let stats = h.engine.stop().await;
    assert_eq!(stats.turns_completed, 1);
    assert_eq!(stats.transcript_entries, 2);
}

#[tokio::test]
async fn test_messages_before_open_are_ignored() {
    let h = companion();
    h.engine.start().await.unwrap();

    h.remote.content(input_fragment("too early")).await;
    h.remote.emit(ChannelEvent::Open).await;
    h.remote.content(turn_complete()).await;
    h.remote.content(input_fragment("now")).await;
    h.remote.content(turn_complete()).await;

    eventually("one entry", || !h.ui.transcript().is_empty()).await;
    let transcript = h.engine.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, "now");

    h.engine.stop().await;
}

#[tokio::test]
async fn test_model_speech_is_gapless() {
    let h = companion();
    h.open().await;

    h.remote.content(speech(1.0)).await;
    h.remote.content(speech(0.5)).await;
    eventually("two units", || h.devices.speaker.scheduled().len() == 2).await;

    let units = h.devices.speaker.scheduled();
    assert_eq!(units[0].start_at, 0.0);
    assert_eq!(units[1].start_at, units[0].start_at + units[0].duration);

    // Clock ran past the cursor: next unit starts now
    h.devices.speaker.finish(units[0].id);
    h.devices.speaker.finish(units[1].id);
    h.devices.speaker.set_time(3.0);
    h.remote.content(speech(0.1)).await;
    eventually("third unit", || h.devices.speaker.scheduled().len() == 3).await;
    assert_eq!(h.devices.speaker.scheduled()[2].start_at, 3.0);

    let stats = h.engine.stop().await;
    assert_eq!(stats.chunks_played, 3);
}

#[tokio::test]
async fn test_interruption_stops_speech_and_resets_cursor() {
    let h = companion();
    h.open().await;

    h.remote.content(speech(2.0)).await;
    eventually("unit scheduled", || h.devices.speaker.scheduled().len() == 1).await;

    h.devices.speaker.set_time(0.5);
    h.remote.content(interrupted()).await;
    eventually("unit stopped", || !h.devices.speaker.stopped.lock().unwrap().is_empty()).await;

    let first = h.devices.speaker.scheduled()[0];
    assert_eq!(*h.devices.speaker.stopped.lock().unwrap(), vec![first.id]);
    assert_eq!(h.engine.state(), SessionState::Active);

    h.remote.content(speech(0.2)).await;
    eventually("next unit", || h.devices.speaker.scheduled().len() == 2).await;
    assert_eq!(h.devices.speaker.scheduled()[1].start_at, 0.5);

    let stats = h.engine.stop().await;
    assert_eq!(stats.interruptions, 1);
}

#[tokio::test]
async fn test_assistant_tools_are_applied_and_acknowledged() {
    let h = assistant();
    h.open().await;

    h.remote
        .message(tool_call(&[
            ("call-1", "navigate", json!({"tab": "studio"})),
            ("call-2", "generateImage", json!({"prompt": "a red fox"})),
            ("call-3", "deleteEverything", json!({})),
        ]))
        .await;

    eventually("three acks", || h.remote.ack_count() == 3).await;

    let acks = h.remote.acks.lock().unwrap().clone();
    let results: Vec<(&str, &str, Option<&str>)> = acks
        .iter()
        .map(|ack| (ack.id.as_str(), ack.name.as_str(), ack.result()))
        .collect();
    assert_eq!(
        results,
        vec![
            ("call-1", "navigate", Some("OK")),
            ("call-2", "generateImage", Some("OK")),
            ("call-3", "deleteEverything", Some("Function not found")),
        ]
    );
    assert_eq!(*h.ui.navigations.lock().unwrap(), vec!["studio"]);
    assert_eq!(*h.ui.generations.lock().unwrap(), vec!["a red fox"]);

    let stats = h.engine.stop().await;
    assert_eq!(stats.tool_calls, 3);
}

#[tokio::test]
async fn test_companion_answers_tool_calls_with_not_found() {
    let h = companion();
    h.open().await;

    h.remote
        .message(tool_call(&[("x", "navigate", json!({"tab": "studio"}))]))
        .await;
    eventually("ack", || h.remote.ack_count() == 1).await;

    assert_eq!(h.remote.acks.lock().unwrap()[0].result(), Some("Function not found"));
    assert!(h.ui.navigations.lock().unwrap().is_empty());

    h.engine.stop().await;
}

#[tokio::test]
async fn test_stop_while_connecting_releases_microphone() {
    let h = companion();
    h.engine.start().await.unwrap();
    assert_eq!(h.engine.state(), SessionState::Connecting);

    h.engine.stop().await;

    assert_eq!(h.engine.state(), SessionState::Idle);
    assert!(h.devices.mic.released.load(Ordering::SeqCst));
    assert!(!h.devices.mic.started.load(Ordering::SeqCst));
    assert!(h.devices.speaker.closed.load(Ordering::SeqCst));
    assert_eq!(h.remote.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_microphone_denied_enters_error() {
    let h = harness_with(SessionProfile::companion(), FakeConnector::new(), FakeDevices::denying());

    let result = h.engine.start().await;

    assert!(matches!(result, Err(SessionError::PermissionDenied(_))));
    assert_eq!(h.engine.state(), SessionState::Error);
    assert_eq!(*h.ui.errors.lock().unwrap(), vec![MICROPHONE_ERROR]);
    assert_eq!(h.remote.open_count(), 0);
}

#[tokio::test]
async fn test_refused_channel_releases_devices() {
    let h = harness_with(
        SessionProfile::companion(),
        FakeConnector::refusing("handshake failed"),
        FakeDevices::new(),
    );

    let result = h.engine.start().await;

    assert!(matches!(result, Err(SessionError::Channel(_))));
    assert_eq!(h.engine.state(), SessionState::Error);
    assert!(h.devices.mic.released.load(Ordering::SeqCst));
    assert!(h.devices.speaker.closed.load(Ordering::SeqCst));
    assert_eq!(*h.ui.errors.lock().unwrap(), vec![SESSION_ERROR]);
}

#[tokio::test]
async fn test_remote_close_returns_to_idle() {
    let h = companion();
    h.open().await;

    h.remote.emit(ChannelEvent::Close(Some("bye".to_string()))).await;
    eventually("idle", || h.engine.state() == SessionState::Idle).await;

    assert!(h.devices.mic.released.load(Ordering::SeqCst));
    assert!(h.devices.speaker.closed.load(Ordering::SeqCst));
    assert!(h.ui.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_error_enters_error_state() {
    let h = companion();
    h.open().await;

    h.remote.emit(ChannelEvent::Error("socket reset".to_string())).await;
    eventually("error", || h.engine.state() == SessionState::Error).await;

    assert_eq!(*h.ui.errors.lock().unwrap(), vec![SESSION_ERROR]);
    assert!(h.devices.mic.released.load(Ordering::SeqCst));
    assert_eq!(h.remote.closes.load(Ordering::SeqCst), 1);

    let stats = h.engine.stop().await;
    assert_eq!(stats.state, SessionState::Idle);
    assert_eq!(h.engine.state(), SessionState::Idle);

    h.engine.start().await.unwrap();
    assert_eq!(h.engine.state(), SessionState::Connecting);
    assert_eq!(h.remote.open_count(), 2);
    assert!(h.engine.transcript().await.is_empty());
    assert_eq!(h.engine.stats().await.transcript_entries, 0);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_retry_after_error_starts_fresh_session() {
    let h = companion();
    h.open().await;

    h.remote.content(output_fragment("before the fault")).await;
    h.remote.content(turn_complete()).await;
    eventually("entry", || h.ui.transcript().len() == 1).await;
    let first = h.engine.stats().await.session_id;

    h.remote.emit(ChannelEvent::Error("socket reset".to_string())).await;
    eventually("error", || h.engine.state() == SessionState::Error).await;

    h.engine.start().await.unwrap();
    assert_eq!(h.engine.state(), SessionState::Connecting);
    assert_eq!(h.remote.open_count(), 2);
    assert!(h.engine.transcript().await.is_empty());
    assert_ne!(h.engine.stats().await.session_id, first);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_stop_is_immediate_while_microphone_is_pending() {
    let h = harness_with(SessionProfile::companion(), FakeConnector::new(), FakeDevices::stalling());

    let engine = h.engine.clone();
    let starting = tokio::spawn(async move { engine.start().await });
    eventually("connecting", || h.engine.state() == SessionState::Connecting).await;

    let stats = tokio::time::timeout(Duration::from_secs(2), h.engine.stop())
        .await
        .expect("stop waited for the microphone");
    assert_eq!(stats.state, SessionState::Idle);
    assert_eq!(h.engine.state(), SessionState::Idle);

    let result = tokio::time::timeout(Duration::from_secs(2), starting)
        .await
        .expect("start was not cancelled")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(h.engine.state(), SessionState::Idle);
    assert_eq!(h.remote.open_count(), 0);
    assert!(h.ui.errors.lock().unwrap().is_empty());
    assert_eq!(
        h.ui.states(),
        vec![SessionState::Connecting, SessionState::Idle]
    );
}

#[tokio::test]
async fn test_second_start_is_rejected_while_starting() {
    let h = harness_with(SessionProfile::companion(), FakeConnector::new(), FakeDevices::stalling());

    let engine = h.engine.clone();
    let starting = tokio::spawn(async move { engine.start().await });
    eventually("connecting", || h.engine.state() == SessionState::Connecting).await;

    assert!(matches!(h.engine.start().await, Err(SessionError::AlreadyActive)));

    h.engine.stop().await;
    assert!(starting.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_duration_is_frozen_after_stop() {
    let h = companion();
    h.open().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stopped = h.engine.stop().await;
    assert!(stopped.duration_secs > 0.0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.stats().await.duration_secs, stopped.duration_secs);
}

#[tokio::test]
async fn test_duration_is_frozen_after_remote_close() {
    let h = companion();
    h.open().await;

    h.remote.emit(ChannelEvent::Close(None)).await;
    eventually("idle", || h.engine.state() == SessionState::Idle).await;

    let closed = h.engine.stats().await.duration_secs;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.stats().await.duration_secs, closed);
}

#[tokio::test]
async fn test_second_start_is_rejected_while_open() {
    let h = companion();
    h.open().await;

    assert!(matches!(h.engine.start().await, Err(SessionError::AlreadyActive)));
    assert_eq!(h.remote.open_count(), 1);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_restart_after_close_clears_transcript() {
    let h = companion();
    h.open().await;

    h.remote.content(input_fragment("first")).await;
    h.remote.content(turn_complete()).await;
    eventually("entry", || h.ui.transcript().len() == 1).await;

    h.remote.emit(ChannelEvent::Close(None)).await;
    eventually("idle", || h.engine.state() == SessionState::Idle).await;
    assert_eq!(h.engine.transcript().await.len(), 1);

    h.open().await;
    assert!(h.engine.transcript().await.is_empty());
    assert_eq!(h.remote.open_count(), 2);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_toggle_starts_and_stops() {
    let h = companion();

    assert_eq!(h.engine.toggle().await.unwrap(), SessionState::Connecting);
    assert_eq!(h.engine.toggle().await.unwrap(), SessionState::Idle);
    assert!(h.devices.mic.released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_dropping_engine_releases_devices() {
    let h = companion();
    h.open().await;

    let Harness {
        engine, devices, ..
    } = h;
    drop(engine);

    eventually("microphone released", || devices.mic.released.load(Ordering::SeqCst)).await;
    eventually("output closed", || devices.speaker.closed.load(Ordering::SeqCst)).await;
}
