pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod live;
pub mod session;
pub mod tools;

pub use audio::{AudioDevices, AudioFrame, CaptureBackend, FileAudioDevices, PlaybackDevice, PlaybackScheduler};
pub use config::Config;
pub use error::{AudioError, SessionError};
pub use http::{create_router, AppState, EventLog};
pub use live::{ChannelEvent, GeminiLiveConnector, LiveChannel, LiveConfig, LiveConnection, LiveConnector};
pub use session::{
    SessionEngine, SessionObserver, SessionProfile, SessionState, SessionStats, SessionVariant, Speaker,
    TranscriptEntry,
};
pub use tools::{MainTab, ToolDispatcher};
