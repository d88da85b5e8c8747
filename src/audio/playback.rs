//! Playback side of the audio bridge.
//!
//! The [`PlaybackScheduler`] keeps model speech gapless: every unit starts
//! where the previous one ends, unless an interruption resets the cursor.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::AudioError;

/// Identifier of a scheduled playback unit
pub type UnitId = u64;

/// Output audio device with its own monotonically advancing clock
pub trait PlaybackDevice: Send + Sync {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Current time of the playback clock in seconds
    fn current_time(&self) -> f64;

    /// Schedule `samples` to start at `start_at` on the playback clock
    ///
    /// The device must report `id` on its ended channel exactly once, when
    /// the unit finishes or is stopped.
    fn schedule(&mut self, id: UnitId, samples: Vec<f32>, start_at: f64)
        -> Result<(), AudioError>;

    /// Stop a scheduled or playing unit immediately
    fn stop(&mut self, id: UnitId) -> Result<(), AudioError>;

    /// Close the output context and release the device
    fn close(&mut self) -> Result<(), AudioError>;
}

/// A chunk of model speech placed on the playback timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUnit {
    pub id: UnitId,
    /// Start time on the playback clock (seconds)
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl PlaybackUnit {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Schedules decoded output audio back-to-back on a playback device
pub struct PlaybackScheduler {
    device: Box<dyn PlaybackDevice>,
    /// Where the next unit starts; only reset by an interruption
    next_start_time: f64,
    /// Units scheduled but not yet ended
    scheduled: BTreeMap<UnitId, PlaybackUnit>,
    next_id: UnitId,
    closed: bool,
}

impl PlaybackScheduler {
    pub fn new(device: Box<dyn PlaybackDevice>) -> Self {
        Self {
            device,
            next_start_time: 0.0,
            scheduled: BTreeMap::new(),
            next_id: 0,
            closed: false,
        }
    }

    /// Schedule a unit at the running cursor (never in the past)
    pub fn schedule(&mut self, samples: Vec<f32>) -> Result<PlaybackUnit, AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }

        let sample_rate = self.device.sample_rate().max(1);
        let duration = samples.len() as f64 / sample_rate as f64;
        let start = self.next_start_time.max(self.device.current_time());

        let id = self.next_id;
        self.next_id += 1;

        self.device.schedule(id, samples, start)?;

        let unit = PlaybackUnit {
            id,
            start,
            duration,
        };
        self.next_start_time = unit.end();
        self.scheduled.insert(id, unit);

        debug!(
            "Scheduled playback unit {} at {:.3}s ({:.3}s long)",
            id, start, duration
        );

        Ok(unit)
    }

    /// Record that a unit finished; returns false if it was not tracked
    pub fn unit_ended(&mut self, id: UnitId) -> bool {
        self.scheduled.remove(&id).is_some()
    }

    /// Stop every scheduled unit and reset the cursor to zero
    ///
    /// Returns the number of units that were stopped.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.scheduled.len();

        for id in self.scheduled.keys() {
            if let Err(e) = self.device.stop(*id) {
                warn!("Failed to stop playback unit {}: {}", id, e);
            }
        }

        self.scheduled.clear();
        self.next_start_time = 0.0;

        stopped
    }

    /// Halt all playback and close the output device; idempotent
    pub fn stop_all(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Ok(());
        }

        self.interrupt();
        self.closed = true;
        self.device.close()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_scheduled(&self, id: UnitId) -> bool {
        self.scheduled.contains_key(&id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
