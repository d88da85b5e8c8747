use chrono::{DateTime, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::config::SessionProfile;
use super::observer::SessionObserver;
use super::session::{Session, MICROPHONE_ERROR, SESSION_ERROR};
use super::state::SessionState;
use super::stats::{SessionCounters, SessionStats, TranscriptEntry};
use crate::audio::{AudioDevices, CaptureBackend, PlaybackScheduler};
use crate::error::SessionError;
use crate::live::LiveConnector;
use crate::tools::ToolDispatcher;

/// Identity of the current (or last) session
#[derive(Debug, Clone)]
struct SessionInfo {
    id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

/// State shared between the engine and its running session task
pub(crate) struct Shared {
    state: watch::Sender<SessionState>,
    pub transcript: Mutex<Vec<TranscriptEntry>>,
    pub counters: SessionCounters,
    observer: Arc<dyn SessionObserver>,
    info: Mutex<Option<SessionInfo>>,
}

impl Shared {
    pub fn new(observer: Arc<dyn SessionObserver>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            state,
            transcript: Mutex::new(Vec::new()),
            counters: SessionCounters::default(),
            observer,
            info: Mutex::new(None),
        }
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Publish a state change; repeated states are not re-announced
    pub fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Session state: {} -> {}", previous, state);
            self.observer.on_state_change(state);
        }
    }

    /// Surface a user-visible error and enter the error state
    pub fn fail(&self, message: &str, err: &SessionError) {
        error!("{}: {}", message, err);
        self.observer.on_error(message);
        self.set_state(SessionState::Error);
    }

    pub async fn append_transcript(&self, entry: TranscriptEntry) {
        info!("[{:?}] {}", entry.speaker, entry.text);
        self.transcript.lock().await.push(entry.clone());
        self.observer.on_transcript_appended(&entry);
    }

    /// Freeze the session duration; later calls keep the first end time
    pub async fn mark_ended(&self) {
        if let Some(info) = self.info.lock().await.as_mut() {
            info.ended_at.get_or_insert_with(Utc::now);
        }
    }

    async fn stats(&self) -> SessionStats {
        let info = self.info.lock().await.clone();
        let transcript_entries = self.transcript.lock().await.len();
        let c = &self.counters;

        SessionStats {
            session_id: info.as_ref().map(|i| i.id.clone()),
            state: self.current_state(),
            started_at: info.as_ref().map(|i| i.started_at),
            duration_secs: info
                .map(|i| {
                    let until = i.ended_at.unwrap_or_else(Utc::now);
                    (until - i.started_at).num_milliseconds() as f64 / 1000.0
                })
                .unwrap_or(0.0),
            frames_sent: c.frames_sent.load(Ordering::SeqCst),
            frames_dropped: c.frames_dropped.load(Ordering::SeqCst),
            chunks_played: c.chunks_played.load(Ordering::SeqCst),
            turns_completed: c.turns_completed.load(Ordering::SeqCst),
            tool_calls: c.tool_calls.load(Ordering::SeqCst),
            interruptions: c.interruptions.load(Ordering::SeqCst),
            transcript_entries,
        }
    }
}

/// Handle to a spawned session task
struct RunningSession {
    id: String,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// The engine's single session slot
enum Slot {
    /// `start` is still acquiring devices or opening the channel
    Starting {
        id: String,
        stop_tx: oneshot::Sender<()>,
    },
    Running(RunningSession),
}

/// Owns at most one voice session at a time
///
/// `start` acquires the microphone and output, opens the channel and
/// hands everything to a session task. All channel events, captured frames
/// and playback completions for a session are handled on that one task.
/// Dropping the engine stops the running session.
pub struct SessionEngine {
    profile: SessionProfile,
    connector: Arc<dyn LiveConnector>,
    devices: Arc<dyn AudioDevices>,
    shared: Arc<Shared>,
    running: Mutex<Option<Slot>>,
}

impl SessionEngine {
    pub fn new(
        profile: SessionProfile,
        connector: Arc<dyn LiveConnector>,
        devices: Arc<dyn AudioDevices>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            profile,
            connector,
            devices,
            shared: Arc::new(Shared::new(observer)),
            running: Mutex::new(None),
        }
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    pub fn state(&self) -> SessionState {
        self.shared.current_state()
    }

    /// Watch lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Start a new session
    ///
    /// Clears the previous transcript. Device and channel failures put the
    /// engine in the error state and are also returned. A `stop` issued
    /// while devices or the channel are still pending cancels the start,
    /// which then returns `Ok` with the engine idle.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (id, mut stop_rx) = {
            let mut running = self.running.lock().await;

            match running.take() {
                Some(Slot::Running(previous))
                    if previous.task.is_finished() || !self.shared.current_state().is_open() =>
                {
                    // Session ended on its own (remote close or error)
                    let _ = previous.task.await;
                }
                Some(busy) => {
                    *running = Some(busy);
                    warn!("Session already running");
                    return Err(SessionError::AlreadyActive);
                }
                None => {}
            }

            let id = Uuid::new_v4().to_string();
            info!("Starting {:?} session {}", self.profile.variant, id);

            self.shared.transcript.lock().await.clear();
            self.shared.counters.reset();
            *self.shared.info.lock().await = Some(SessionInfo {
                id: id.clone(),
                started_at: Utc::now(),
                ended_at: None,
            });
            self.shared.set_state(SessionState::Connecting);

            let (stop_tx, stop_rx) = oneshot::channel();
            *running = Some(Slot::Starting {
                id: id.clone(),
                stop_tx,
            });
            (id, stop_rx)
        };

        let capture = tokio::select! {
            _ = &mut stop_rx => {
                info!("Session {} stopped while waiting for the microphone", id);
                return Ok(());
            }
            result = self.devices.request_microphone(&self.profile.capture) => match result {
                Ok(capture) => capture,
                Err(e) => return self.abandon_start(&id, MICROPHONE_ERROR, e.into()).await,
            },
        };

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let output = match self
            .devices
            .open_output(self.profile.playback_sample_rate, ended_tx)
        {
            Ok(output) => output,
            Err(e) => {
                release_microphone(capture).await;
                return self.abandon_start(&id, SESSION_ERROR, e.into()).await;
            }
        };
        let mut playback = PlaybackScheduler::new(output);

        let opened = tokio::select! {
            _ = &mut stop_rx => None,
            result = self.connector.open(&self.profile.model, &self.profile.live) => Some(result),
        };
        let connection = match opened {
            Some(Ok(connection)) => connection,
            failed => {
                release_microphone(capture).await;
                close_output(&mut playback);
                return match failed {
                    Some(Err(e)) => self.abandon_start(&id, SESSION_ERROR, e).await,
                    _ => {
                        info!("Session {} stopped while opening the channel", id);
                        Ok(())
                    }
                };
            }
        };

        let dispatcher = ToolDispatcher::new(
            &self.profile.live.function_declarations,
            self.shared.observer.clone(),
        );
        let mut session = Session::new(
            id.clone(),
            connection.channel,
            capture,
            playback,
            dispatcher,
            self.shared.clone(),
        );

        let mut running = self.running.lock().await;
        match running.take() {
            Some(Slot::Starting {
                id: pending,
                stop_tx,
            }) if pending == id => {
                let task = tokio::spawn(session.run(connection.events, ended_rx, stop_rx));
                *running = Some(Slot::Running(RunningSession { id, stop_tx, task }));
            }
            other => {
                *running = other;
                drop(running);
                info!("Session {} stopped before it could run", id);
                session.teardown().await;
            }
        }
        Ok(())
    }

    /// Give up a start that failed
    ///
    /// Reports the failure only while the pending slot is still ours; a
    /// concurrent `stop` has already put the engine back to idle.
    async fn abandon_start(
        &self,
        id: &str,
        message: &str,
        err: SessionError,
    ) -> Result<(), SessionError> {
        {
            let mut running = self.running.lock().await;
            match running.take() {
                Some(Slot::Starting { id: pending, .. }) if pending == id => {}
                other => {
                    *running = other;
                    info!("Session {} stopped before failing: {}", id, err);
                    return Ok(());
                }
            }
        }

        self.shared.mark_ended().await;
        self.shared.fail(message, &err);
        Err(err)
    }

    /// Stop the current session and release all resources
    ///
    /// Safe to call in any state, including while `start` is still
    /// acquiring devices. Returns the final statistics.
    pub async fn stop(&self) -> SessionStats {
        let previous = self.running.lock().await.take();

        match previous {
            Some(Slot::Starting { id, stop_tx }) => {
                info!("Cancelling session {} while starting", id);
                let _ = stop_tx.send(());
            }
            Some(Slot::Running(session)) => {
                info!("Stopping session {}", session.id);
                let _ = session.stop_tx.send(());
                if let Err(e) = session.task.await {
                    error!("Session task failed: {}", e);
                }
            }
            None => {}
        }

        self.shared.mark_ended().await;
        self.shared.set_state(SessionState::Idle);
        self.shared.stats().await
    }

    /// Start when idle or errored, stop when a session is open
    pub async fn toggle(&self) -> Result<SessionState, SessionError> {
        if self.state().is_open() {
            self.stop().await;
        } else {
            self.start().await?;
        }
        Ok(self.state())
    }

    /// Completed turns of the current (or last) session
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.transcript.lock().await.clone()
    }

    pub async fn stats(&self) -> SessionStats {
        self.shared.stats().await
    }
}

async fn release_microphone(mut capture: Box<dyn CaptureBackend>) {
    if let Err(e) = capture.stop().await {
        warn!("{}", SessionError::teardown("release_microphone", e));
    }
}

fn close_output(playback: &mut PlaybackScheduler) {
    if let Err(e) = playback.stop_all() {
        warn!("{}", SessionError::teardown("close_output", e));
    }
}
