use async_trait::async_trait;
use tokio::sync::mpsc;

use super::playback::{PlaybackDevice, UnitId};
use crate::error::AudioError;

/// One block of captured microphone audio (mono float samples)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Float samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Capture order, starting at 0
    pub sequence: u64,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of the frame in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for the capture graph
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate frames are delivered at (converted if the source differs)
    pub sample_rate: u32,
    /// Samples per delivered frame
    pub frame_size: usize,
    /// Capacity of the frame channel handed to the engine
    pub channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Rate the model accepts for input audio
            frame_size: 4096,
            channel_capacity: 64,
        }
    }
}

/// Microphone capture backend
///
/// Acquiring the backend corresponds to being granted microphone access.
/// `start` builds the capture graph; `stop` tears it down and releases the
/// device handle. `stop` must be safe to call on a backend that never started.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver delivering frames in capture order
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), AudioError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Host audio capability injected into the session engine
#[async_trait]
pub trait AudioDevices: Send + Sync {
    /// Request microphone access
    ///
    /// Fails with [`AudioError::PermissionDenied`] when access is refused.
    async fn request_microphone(
        &self,
        config: &CaptureConfig,
    ) -> Result<Box<dyn CaptureBackend>, AudioError>;

    /// Open the output context at `sample_rate`
    ///
    /// The device reports every finished or stopped unit on `ended_tx`.
    fn open_output(
        &self,
        sample_rate: u32,
        ended_tx: mpsc::UnboundedSender<UnitId>,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError>;
}
