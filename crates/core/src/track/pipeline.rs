//! The per-track worker loop.
//!
//! ```text
//! loop {
//!     encoder.read(buf)        InsufficientBuffer -> grow buf, retry
//!     sampler.next()           media clock ticks for this unit
//!     sink.write_sample(..)
//! }
//! ```
//!
//! The loop exits on the first error. What happens next depends on the
//! track state at that moment: if the track was stopped the exit is silent,
//! otherwise the track ends and its ended handler fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{LocalTrack, Sample, TrackShared, TrackState, release_device, release_encoder};
use crate::codec::Encoder;
use crate::driver::Driver;
use crate::error::{MediaError, Result};
use crate::media_devices::MediaDevicesConfig;
use crate::prop::Media;

/// Media clock ticks per emitted unit.
#[derive(Debug, Clone)]
pub(crate) enum Sampler {
    /// Fixed count per buffer: sample rate times buffer latency.
    Audio { samples: u32 },
    /// Wall-clock time since the previous unit, scaled to the clock rate.
    Video {
        clock_rate: f64,
        last: Option<Instant>,
    },
}

impl Sampler {
    pub(crate) fn audio(props: &Media) -> Self {
        let samples = samples_for(props.audio.sample_rate, props.audio.latency);
        Self::Audio { samples }
    }

    pub(crate) fn video(clock_rate: u32) -> Self {
        Self::Video {
            clock_rate: clock_rate as f64,
            last: None,
        }
    }

    pub(crate) fn next(&mut self) -> u32 {
        self.next_at(Instant::now())
    }

    fn next_at(&mut self, now: Instant) -> u32 {
        match self {
            Self::Audio { samples } => *samples,
            Self::Video { clock_rate, last } => {
                let ticks = match last {
                    Some(prev) => (now.saturating_duration_since(*prev).as_secs_f64() * *clock_rate).round() as u32,
                    None => 0,
                };
                *last = Some(now);
                ticks
            }
        }
    }
}

fn samples_for(sample_rate: u32, latency: Duration) -> u32 {
    (sample_rate as f64 * latency.as_secs_f64()).round() as u32
}

pub(crate) struct Pipeline {
    shared: Arc<TrackShared>,
    driver: Arc<dyn Driver>,
    encoder: Arc<Mutex<Box<dyn Encoder>>>,
    sink: Arc<dyn LocalTrack>,
    sampler: Sampler,
    buffer: Vec<u8>,
    growth_factor: usize,
}

impl Pipeline {
    pub(crate) fn new(
        shared: Arc<TrackShared>,
        driver: Arc<dyn Driver>,
        encoder: Arc<Mutex<Box<dyn Encoder>>>,
        sink: Arc<dyn LocalTrack>,
        sampler: Sampler,
        config: &MediaDevicesConfig,
    ) -> Self {
        Self {
            shared,
            driver,
            encoder,
            sink,
            sampler,
            buffer: vec![0; config.initial_buffer_size],
            growth_factor: config.buffer_growth_factor.max(1),
        }
    }

    /// Worker entry point.
    pub(crate) fn run(mut self) {
        let err = self.pump();
        self.finish(err);
    }

    /// Move units from encoder to sink until something fails.
    fn pump(&mut self) -> MediaError {
        let mut emitted: u64 = 0;
        loop {
            let n = match self.encode_next() {
                Ok(n) => n,
                Err(e) => return e,
            };

            // `Track::stop` takes the emit lock before leaving `Running`, so
            // a sample is never handed over once the track is stopped.
            let emit = self.shared.emit.lock();
            if !self.shared.is_running() {
                return MediaError::Closed;
            }
            let samples = self.sampler.next();
            let sample = Sample {
                data: &self.buffer[..n],
                samples,
            };
            let written = self.sink.write_sample(sample);
            drop(emit);

            if let Err(e) = written {
                return e;
            }
            emitted += 1;
            tracing::trace!(track_id = %self.shared.id(), bytes = n, samples, emitted, "sample written");
        }
    }

    /// Read one encoded unit into `self.buffer`, growing it as the encoder asks.
    ///
    /// The state is checked under the encoder lock, so no read starts once
    /// the track has left `Running`.
    fn encode_next(&mut self) -> Result<usize> {
        loop {
            let result = {
                let mut encoder = self.encoder.lock();
                if !self.shared.is_running() {
                    return Err(MediaError::Closed);
                }
                encoder.read(&mut self.buffer)
            };
            match result {
                Err(MediaError::InsufficientBuffer { required }) => self.grow(required)?,
                other => return other,
            }
        }
    }

    fn grow(&mut self, required: usize) -> Result<()> {
        if required <= self.buffer.len() {
            return Err(MediaError::Encoder(format!(
                "encoder asked for {required} bytes with {} available",
                self.buffer.len()
            )));
        }
        let size = required.saturating_mul(self.growth_factor);
        tracing::debug!(
            track_id = %self.shared.id(),
            old_size = self.buffer.len(),
            new_size = size,
            required,
            "growing encoder buffer"
        );
        self.buffer.resize(size, 0);
        Ok(())
    }

    fn finish(self, err: MediaError) {
        if !self.shared.leave_running(TrackState::Ended) {
            tracing::debug!(track_id = %self.shared.id(), reason = %err, "track loop exited after stop");
            return;
        }

        tracing::info!(track_id = %self.shared.id(), reason = %err, "track ended");
        release_encoder(&self.encoder, self.shared.id());
        release_device(&self.driver, self.shared.id());
        self.shared.fire_ended(err);
    }
}
