pub mod backend;
pub mod codec;
pub mod file;
pub mod playback;
pub mod resample;

pub use backend::{AudioDevices, AudioFrame, CaptureBackend, CaptureConfig};
pub use file::{load_wav_mono, FileAudioDevices, WavCaptureBackend, WavPlaybackDevice};
pub use playback::{PlaybackDevice, PlaybackScheduler, PlaybackUnit, UnitId};
