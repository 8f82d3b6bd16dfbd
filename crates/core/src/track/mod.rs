//! Media tracks.
//!
//! A [`Track`] owns one opened device, one encoder, and the worker thread
//! that moves encoded units from the encoder to the track's sink.
//!
//! ## Track lifecycle
//!
//! ```text
//! Created  -> Opened      device acquired (may fail: nothing else happens)
//! Opened   -> Running     encoder built, worker started
//! Running  -> Stopped     Track::stop (no callback)
//! Running  -> Ended       read/encode/sink failure (callback fires once)
//! ```
//!
//! `Stopped` and `Ended` are terminal. A stopped track cannot be restarted;
//! request a new one from [`MediaDevices`](crate::MediaDevices).
//!
//! ## Stop vs. end of stream
//!
//! [`Track::stop`] marks the track `Stopped` *before* releasing the device.
//! Whatever error the worker then observes (usually end of stream from the
//! closed device) is treated as a clean exit. An error observed while the
//! track is still `Running`, including a spontaneous end of stream, ends
//! the track and is reported through [`Track::on_ended`].

pub mod pipeline;

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::codec::{CodecDescriptor, Encoder};
use crate::constraints::MediaTrackConstraints;
use crate::driver::Driver;
use crate::error::{MediaError, Result};
use crate::media_devices::MediaDevicesConfig;
use crate::prop::{Media, MediaKind};
use crate::selector::Selection;
use pipeline::{Pipeline, Sampler};

/// Lifecycle state of a [`Track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Device and codec chosen, nothing acquired.
    Created,
    /// Device held exclusively.
    Opened,
    /// Worker running.
    Running,
    /// Stopped by the caller.
    Stopped,
    /// Terminated by a runtime failure.
    Ended,
}

impl TrackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Ended)
    }
}

/// One encoded unit handed to a [`LocalTrack`].
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub data: &'a [u8],
    /// Media clock ticks covered by this unit.
    pub samples: u32,
}

/// The transport-side consumer of a track's encoded units.
pub trait LocalTrack: Send + Sync {
    fn write_sample(&self, sample: Sample<'_>) -> Result<()>;
    fn codec(&self) -> &CodecDescriptor;
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
}

/// Factory for track sinks.
///
/// Arguments: payload type, random SSRC, device ID, kind name, codec.
pub type TrackGenerator = Arc<
    dyn Fn(u8, u32, &str, &str, &CodecDescriptor) -> Result<Box<dyn LocalTrack>> + Send + Sync,
>;

type EndedHandler = Box<dyn FnOnce(MediaError) + Send>;

/// Single-slot delivery of the terminal error.
enum EndedSlot {
    /// Not ended yet; the latest registered handler, if any.
    Waiting(Option<EndedHandler>),
    /// Ended before anyone registered; held for the first registration.
    Unclaimed(MediaError),
    Delivered,
}

/// State shared between a [`Track`] and its worker.
pub(crate) struct TrackShared {
    id: String,
    kind: MediaKind,
    state: RwLock<TrackState>,
    /// Held by the worker across the state check and the sink hand-off.
    emit: Mutex<()>,
    ended: Mutex<EndedSlot>,
}

impl TrackShared {
    fn new(id: String, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            state: RwLock::new(TrackState::Created),
            emit: Mutex::new(()),
            ended: Mutex::new(EndedSlot::Waiting(None)),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> TrackState {
        *self.state.read()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == TrackState::Running
    }

    fn set_state(&self, state: TrackState) {
        let mut current = self.state.write();
        tracing::debug!(track_id = %self.id, kind = %self.kind, old_state = ?*current, new_state = ?state, "state transition");
        *current = state;
    }

    /// Move from `Running` to `to`. Returns `false` if the track already
    /// left `Running`; exactly one of stop and end wins.
    pub(crate) fn leave_running(&self, to: TrackState) -> bool {
        let mut current = self.state.write();
        if *current != TrackState::Running {
            return false;
        }
        tracing::debug!(track_id = %self.id, kind = %self.kind, old_state = ?*current, new_state = ?to, "state transition");
        *current = to;
        true
    }

    fn on_ended(&self, handler: EndedHandler) {
        let mut slot = self.ended.lock();
        match std::mem::replace(&mut *slot, EndedSlot::Delivered) {
            EndedSlot::Waiting(_) => *slot = EndedSlot::Waiting(Some(handler)),
            EndedSlot::Unclaimed(err) => {
                drop(slot);
                handler(err);
            }
            EndedSlot::Delivered => {
                tracing::debug!(track_id = %self.id, "ended handler registered after delivery, ignored");
            }
        }
    }

    /// Deliver the terminal error. Only the first call has any effect.
    pub(crate) fn fire_ended(&self, err: MediaError) {
        let mut slot = self.ended.lock();
        match std::mem::replace(&mut *slot, EndedSlot::Delivered) {
            EndedSlot::Waiting(Some(handler)) => {
                drop(slot);
                handler(err);
            }
            EndedSlot::Waiting(None) => *slot = EndedSlot::Unclaimed(err),
            previous => *slot = previous,
        }
    }
}

/// A media track: device, encoder, and the worker pumping between them.
pub struct Track {
    shared: Arc<TrackShared>,
    driver: Arc<dyn Driver>,
    encoder: Arc<Mutex<Box<dyn Encoder>>>,
    sink: Arc<dyn LocalTrack>,
    codec: CodecDescriptor,
    properties: Media,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Track {
    /// Open the selected device and start encoding.
    ///
    /// On failure every resource acquired so far is released before the
    /// error is returned; no worker is left running.
    pub(crate) fn open(
        kind: MediaKind,
        selection: Selection,
        constraints: &MediaTrackConstraints,
        generator: &TrackGenerator,
        config: &MediaDevicesConfig,
    ) -> Result<Self> {
        let Selection {
            driver,
            codec,
            properties,
            ..
        } = selection;
        let descriptor = codec.descriptor.clone();
        let device_id = driver.id().to_string();

        let ssrc = rand::random::<u32>();
        let sink: Arc<dyn LocalTrack> = Arc::from(generator(
            descriptor.payload_type,
            ssrc,
            &device_id,
            kind.as_str(),
            &descriptor,
        )?);

        let shared = Arc::new(TrackShared::new(sink.id().to_string(), kind));

        driver.open().map_err(|e| match e {
            busy @ MediaError::DeviceBusy(_) => busy,
            other => MediaError::DeviceOpen {
                device_id: device_id.clone(),
                reason: other.to_string(),
            },
        })?;
        shared.set_state(TrackState::Opened);

        let encoder = match build_encoder(kind, &driver, &codec, &properties, constraints) {
            Ok(encoder) => encoder,
            Err(e) => {
                release_device(&driver, shared.id());
                return Err(e);
            }
        };
        let encoder = Arc::new(Mutex::new(encoder));

        let sampler = match kind {
            MediaKind::Video => Sampler::video(if descriptor.clock_rate > 0 {
                descriptor.clock_rate
            } else {
                config.video_clock_rate
            }),
            MediaKind::Audio => Sampler::audio(&properties),
        };

        let pipeline = Pipeline::new(
            shared.clone(),
            driver.clone(),
            encoder.clone(),
            sink.clone(),
            sampler,
            config,
        );

        shared.set_state(TrackState::Running);
        let worker = thread::Builder::new()
            .name(format!("{}-{}-{}", config.thread_name_prefix, kind, ssrc))
            .spawn(move || pipeline.run());

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                shared.set_state(TrackState::Stopped);
                release_encoder(&encoder, shared.id());
                release_device(&driver, shared.id());
                return Err(e.into());
            }
        };

        tracing::info!(
            track_id = %shared.id(),
            %kind,
            device_id = %device_id,
            codec = %descriptor.name,
            "track started"
        );

        Ok(Self {
            shared,
            driver,
            encoder,
            sink,
            codec: descriptor,
            properties,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the track and release the device and encoder.
    ///
    /// Once this returns, the worker has exited and no further sample
    /// reaches the sink. Called from the worker itself (from the sink or an
    /// ended handler), it does not wait; the worker sees `Stopped` before
    /// its next read and exits. Calling it on a track that has already
    /// stopped or ended only waits for the worker.
    pub fn stop(&self) {
        let on_worker = self
            .worker
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id());

        let stopped = if on_worker {
            self.shared.leave_running(TrackState::Stopped)
        } else {
            let _emit = self.shared.emit.lock();
            self.shared.leave_running(TrackState::Stopped)
        };

        if stopped {
            // Closing the device unblocks the worker's read; it then sees
            // `Stopped` and exits without firing the ended handler.
            release_device(&self.driver, self.shared.id());
            release_encoder(&self.encoder, self.shared.id());
            tracing::info!(track_id = %self.shared.id(), kind = %self.shared.kind, "track stopped");
        }

        if on_worker {
            // The handle stays in place for a later `stop` from another thread.
            return;
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(track_id = %self.shared.id(), "track worker panicked");
            }
        }
    }

    /// Register the handler for a runtime failure.
    ///
    /// The handler runs at most once, on the worker thread. Registering
    /// again before the track ends replaces the previous handler. If the
    /// track already ended and its error has not been delivered yet, the
    /// handler runs immediately on the calling thread.
    pub fn on_ended<F>(&self, handler: F)
    where
        F: FnOnce(MediaError) + Send + 'static,
    {
        self.shared.on_ended(Box::new(handler));
    }

    pub fn id(&self) -> &str {
        self.shared.id()
    }

    pub fn kind(&self) -> MediaKind {
        self.shared.kind
    }

    pub fn state(&self) -> TrackState {
        self.shared.state()
    }

    pub fn codec(&self) -> &CodecDescriptor {
        &self.codec
    }

    pub fn device_id(&self) -> &str {
        self.driver.id()
    }

    /// Properties the device and encoder were configured with.
    pub fn properties(&self) -> &Media {
        &self.properties
    }

    /// The sink this track writes to.
    pub fn local_track(&self) -> &Arc<dyn LocalTrack> {
        &self.sink
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("device_id", &self.device_id())
            .field("codec", &self.codec.name)
            .finish()
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_encoder(
    kind: MediaKind,
    driver: &Arc<dyn Driver>,
    codec: &crate::codec::RegisteredCodec,
    properties: &Media,
    constraints: &MediaTrackConstraints,
) -> Result<Box<dyn Encoder>> {
    match kind {
        MediaKind::Video => {
            let mut source = driver.video_record(properties)?;
            if let Some(transform) = &constraints.video_transform {
                source = transform(source);
            }
            codec.build_video(source, properties)
        }
        MediaKind::Audio => {
            let mut source = driver.audio_record(properties)?;
            if let Some(transform) = &constraints.audio_transform {
                source = transform(source);
            }
            codec.build_audio(source, properties)
        }
    }
}

pub(crate) fn release_device(driver: &Arc<dyn Driver>, track_id: &str) {
    if let Err(e) = driver.close() {
        tracing::warn!(track_id, device_id = driver.id(), error = %e, "device close failed");
    }
}

pub(crate) fn release_encoder(encoder: &Mutex<Box<dyn Encoder>>, track_id: &str) {
    if let Err(e) = encoder.lock().close() {
        tracing::warn!(track_id, error = %e, "encoder close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared() -> TrackShared {
        let s = TrackShared::new("t".into(), MediaKind::Video);
        s.set_state(TrackState::Running);
        s
    }

    #[test]
    fn ended_fires_once() {
        let s = shared();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        s.on_ended(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        s.fire_ended(MediaError::EndOfStream);
        s.fire_ended(MediaError::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latest_handler_wins() {
        let s = shared();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        s.on_ended(Box::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        let g = second.clone();
        s.on_ended(Box::new(move |_| {
            g.fetch_add(1, Ordering::SeqCst);
        }));

        s.fire_ended(MediaError::EndOfStream);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unclaimed_error_goes_to_first_late_handler() {
        let s = shared();
        s.fire_ended(MediaError::Sink("gone".into()));

        let got = Arc::new(Mutex::new(None));
        let g = got.clone();
        s.on_ended(Box::new(move |e| *g.lock() = Some(e.to_string())));
        assert_eq!(got.lock().as_deref(), Some("sink error: gone"));

        // Already delivered: a second late handler never runs.
        let late = Arc::new(AtomicUsize::new(0));
        let l = late.clone();
        s.on_ended(Box::new(move |_| {
            l.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn only_one_terminal_transition() {
        let s = shared();
        assert!(s.leave_running(TrackState::Stopped));
        assert!(!s.leave_running(TrackState::Ended));
        assert_eq!(s.state(), TrackState::Stopped);
        assert!(s.state().is_terminal());
    }
}
