//! WAV-file-backed audio devices for headless sessions.
//!
//! A WAV file stands in for the microphone (delivered in real-time-paced
//! frames) and model speech is rendered onto a timeline that is written
//! out as a WAV file when the output context closes.

use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::backend::{AudioDevices, AudioFrame, CaptureBackend, CaptureConfig};
use super::playback::{PlaybackDevice, UnitId};
use super::resample::{downmix_to_mono, resample_linear};
use crate::error::AudioError;

/// Audio devices backed by WAV files
#[derive(Debug, Clone)]
pub struct FileAudioDevices {
    /// WAV file played into the session as microphone input
    pub input_path: PathBuf,
    /// WAV file the model's speech is rendered to
    pub output_path: PathBuf,
    /// Deliver frames at real-time cadence (disable for batch use)
    pub realtime: bool,
}

impl FileAudioDevices {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            realtime: true,
        }
    }
}

#[async_trait]
impl AudioDevices for FileAudioDevices {
    async fn request_microphone(
        &self,
        config: &CaptureConfig,
    ) -> Result<Box<dyn CaptureBackend>, AudioError> {
        let backend = WavCaptureBackend::open(&self.input_path, config.clone(), self.realtime)?;
        Ok(Box::new(backend))
    }

    fn open_output(
        &self,
        sample_rate: u32,
        ended_tx: mpsc::UnboundedSender<UnitId>,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        let device = WavPlaybackDevice::new(self.output_path.clone(), sample_rate, ended_tx);
        Ok(Box::new(device))
    }
}

/// Load a WAV file as mono float samples at `target_rate`
pub fn load_wav_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    let reader = WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            AudioError::PermissionDenied(format!("{}: {}", path.display(), io))
        }
        hound::Error::IoError(io) => {
            AudioError::DeviceUnavailable(format!("{}: {}", path.display(), io))
        }
        other => AudioError::Wav(other),
    })?;

    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono = downmix_to_mono(&interleaved, spec.channels);
    let converted = resample_linear(&mono, spec.sample_rate, target_rate);

    info!(
        "Loaded capture input {}: {}Hz {}ch -> {} samples at {}Hz",
        path.display(),
        spec.sample_rate,
        spec.channels,
        converted.len(),
        target_rate
    );

    Ok(converted)
}

/// Capture backend that replays a WAV file as microphone frames
pub struct WavCaptureBackend {
    name: String,
    config: CaptureConfig,
    samples: Arc<Vec<f32>>,
    realtime: bool,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl WavCaptureBackend {
    /// Open the file; this is the point where "microphone access" is granted
    pub fn open(path: &Path, config: CaptureConfig, realtime: bool) -> Result<Self, AudioError> {
        let samples = load_wav_mono(path, config.sample_rate)?;

        Ok(Self {
            name: format!("wav:{}", path.display()),
            config,
            samples: Arc::new(samples),
            realtime,
            task: None,
            capturing: false,
        })
    }

    /// Backend over in-memory samples already at the capture rate
    pub fn from_samples(samples: Vec<f32>, config: CaptureConfig, realtime: bool) -> Self {
        Self {
            name: "memory".to_string(),
            config,
            samples: Arc::new(samples),
            realtime,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait]
impl CaptureBackend for WavCaptureBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.capturing {
            return Err(AudioError::DeviceUnavailable(format!(
                "{} is already capturing",
                self.name
            )));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let samples = Arc::clone(&self.samples);
        let frame_size = self.config.frame_size.max(1);
        let sample_rate = self.config.sample_rate.max(1);
        let realtime = self.realtime;

        let task = tokio::spawn(async move {
            let frame_period = Duration::from_secs_f64(frame_size as f64 / sample_rate as f64);
            let mut ticker = tokio::time::interval(frame_period);

            for (sequence, chunk) in samples.chunks(frame_size).enumerate() {
                if realtime {
                    ticker.tick().await;
                }

                // The capture graph always delivers full blocks
                let mut block = chunk.to_vec();
                block.resize(frame_size, 0.0);

                let frame = AudioFrame {
                    samples: block,
                    sample_rate,
                    sequence: sequence as u64,
                    timestamp_ms: (sequence * frame_size) as u64 * 1000 / sample_rate as u64,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        self.capturing = true;

        info!("Capture started on {}", self.name);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        if self.capturing {
            info!("Capture stopped on {}", self.name);
        }
        self.capturing = false;

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A scheduled unit; samples are kept until close renders the file
struct RenderedUnit {
    start_at: f64,
    samples: Vec<f32>,
    fired: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

/// Output device that renders scheduled units to a WAV file on close
pub struct WavPlaybackDevice {
    path: PathBuf,
    sample_rate: u32,
    origin: Instant,
    ended_tx: mpsc::UnboundedSender<UnitId>,
    units: HashMap<UnitId, RenderedUnit>,
    closed: bool,
}

impl WavPlaybackDevice {
    pub fn new(path: PathBuf, sample_rate: u32, ended_tx: mpsc::UnboundedSender<UnitId>) -> Self {
        Self {
            path,
            sample_rate: sample_rate.max(1),
            origin: Instant::now(),
            ended_tx,
            units: HashMap::new(),
            closed: false,
        }
    }

    fn fire_ended(fired: &AtomicBool, ended_tx: &mpsc::UnboundedSender<UnitId>, id: UnitId) {
        if !fired.swap(true, Ordering::SeqCst) {
            // Receiver may already be gone during teardown
            let _ = ended_tx.send(id);
        }
    }

    /// Drop the timer handles of units that already ended
    fn reap_timers(&mut self) {
        for unit in self.units.values_mut() {
            if unit.fired.load(Ordering::SeqCst) {
                unit.timer = None;
            }
        }
    }

    /// Cut a unit at the current clock position and signal its end
    fn halt(&mut self, id: UnitId) {
        let now = self.current_time();
        let sample_rate = self.sample_rate as f64;

        if let Some(unit) = self.units.get_mut(&id) {
            if let Some(timer) = unit.timer.take() {
                timer.abort();
            }

            if !unit.fired.load(Ordering::SeqCst) {
                let played = ((now - unit.start_at).max(0.0) * sample_rate) as usize;
                unit.samples.truncate(played);
            }

            Self::fire_ended(&unit.fired, &self.ended_tx, id);
        }
    }

    fn render(&self) -> Vec<f32> {
        let sample_rate = self.sample_rate as f64;
        let placed: Vec<(usize, &[f32])> = self
            .units
            .values()
            .map(|u| ((u.start_at * sample_rate).round() as usize, u.samples.as_slice()))
            .collect();

        let total = placed
            .iter()
            .map(|(start, samples)| start + samples.len())
            .max()
            .unwrap_or(0);

        let mut timeline = vec![0.0f32; total];
        for (start, samples) in placed {
            for (slot, sample) in timeline[start..start + samples.len()].iter_mut().zip(samples) {
                *slot += *sample;
            }
        }

        timeline
    }
}

impl PlaybackDevice for WavPlaybackDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, id: UnitId, samples: Vec<f32>, start_at: f64) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        self.reap_timers();

        let duration = samples.len() as f64 / self.sample_rate as f64;
        let end_at = self.origin + Duration::from_secs_f64((start_at + duration).max(0.0));
        let fired = Arc::new(AtomicBool::new(false));

        let timer = {
            let fired = Arc::clone(&fired);
            let ended_tx = self.ended_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(end_at).await;
                Self::fire_ended(&fired, &ended_tx, id);
            })
        };

        self.units.insert(
            id,
            RenderedUnit {
                start_at,
                samples,
                fired,
                timer: Some(timer),
            },
        );

        Ok(())
    }

    fn stop(&mut self, id: UnitId) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        self.halt(id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in ids {
            self.halt(id);
        }

        let timeline = self.render();
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(&self.path, spec)?;
        for sample in &timeline {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;

        info!(
            "Rendered {:.1}s of model speech to {}",
            timeline.len() as f64 / self.sample_rate as f64,
            self.path.display()
        );

        Ok(())
    }
}

impl Drop for WavPlaybackDevice {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("Failed to close playback device on drop: {}", e);
            }
        }
    }
}
