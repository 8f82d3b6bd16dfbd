//! The caller-facing entry point.
//!
//! [`MediaDevices`] ties the registries together:
//!
//! ```text
//! MediaStreamConstraints
//!   -> selector::select       (every enabled kind: driver, codec, properties)
//!   -> Track::open            (sink, device, source, encoder, worker)
//!   -> MediaStream            (one Track per enabled kind)
//! ```
//!
//! A request either yields every requested track or none: when a later
//! kind fails to open, tracks already started for the same request are
//! stopped before the error is returned.

use std::sync::Arc;

use crate::codec::{CodecRegistry, VIDEO_CLOCK_RATE};
use crate::constraints::MediaStreamConstraints;
use crate::driver::DriverRegistry;
use crate::error::Result;
use crate::prop::MediaKind;
use crate::selector;
use crate::track::{Track, TrackGenerator};

/// Tuning knobs for track workers.
#[derive(Debug, Clone)]
pub struct MediaDevicesConfig {
    /// Initial size of each track's encoder output buffer, in bytes.
    pub initial_buffer_size: usize,
    /// When an encoder needs `n` bytes, the buffer grows to `n * factor`.
    /// Values below 1 act as 1.
    pub buffer_growth_factor: usize,
    /// Clock rate for video codecs whose descriptor leaves it at zero.
    pub video_clock_rate: u32,
    /// Worker threads are named `<prefix>-<kind>-<ssrc>`.
    pub thread_name_prefix: String,
}

impl Default for MediaDevicesConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 1024,
            buffer_growth_factor: 2,
            video_clock_rate: VIDEO_CLOCK_RATE,
            thread_name_prefix: "track".to_string(),
        }
    }
}

/// One entry per (device, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: MediaKind,
    pub label: String,
}

/// The tracks produced by one [`MediaDevices::get_user_media`] call.
///
/// Tracks stop when their last handle is dropped. Clone the `Arc`s out of
/// [`get_tracks`](Self::get_tracks) to keep a track past the stream.
#[derive(Debug, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<Track>>,
}

impl MediaStream {
    pub fn get_tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.iter().filter(|t| t.kind() == MediaKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.iter().filter(|t| t.kind() == MediaKind::Audio)
    }

    pub fn into_tracks(self) -> Vec<Arc<Track>> {
        self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Provisions media tracks from registered drivers and codecs.
pub struct MediaDevices {
    codecs: Arc<CodecRegistry>,
    drivers: Arc<DriverRegistry>,
    generator: TrackGenerator,
    config: MediaDevicesConfig,
}

impl MediaDevices {
    pub fn new(
        codecs: Arc<CodecRegistry>,
        drivers: Arc<DriverRegistry>,
        generator: TrackGenerator,
    ) -> Self {
        Self::with_config(codecs, drivers, generator, MediaDevicesConfig::default())
    }

    pub fn with_config(
        codecs: Arc<CodecRegistry>,
        drivers: Arc<DriverRegistry>,
        generator: TrackGenerator,
        config: MediaDevicesConfig,
    ) -> Self {
        Self {
            codecs,
            drivers,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &MediaDevicesConfig {
        &self.config
    }

    /// Select, open, and start one track per enabled kind.
    ///
    /// Every enabled kind is selected before any device is opened, so a
    /// selection error holds no resources. Video is opened before audio;
    /// an open failure stops the tracks already started by this call, so
    /// an error leaves nothing running.
    pub fn get_user_media(&self, constraints: MediaStreamConstraints) -> Result<MediaStream> {
        let requested = [
            (MediaKind::Video, constraints.video),
            (MediaKind::Audio, constraints.audio),
        ];

        let mut selections = Vec::new();
        for (kind, track_constraints) in requested {
            let Some(track_constraints) = track_constraints.filter(|c| c.enabled) else {
                continue;
            };
            let selection = selector::select(kind, &self.codecs, &self.drivers, &track_constraints)?;
            selections.push((kind, selection, track_constraints));
        }

        let mut tracks: Vec<Arc<Track>> = Vec::with_capacity(selections.len());
        for (kind, selection, track_constraints) in selections {
            match Track::open(kind, selection, &track_constraints, &self.generator, &self.config) {
                Ok(track) => tracks.push(Arc::new(track)),
                Err(e) => {
                    tracing::warn!(%kind, error = %e, rolled_back = tracks.len(), "get_user_media failed");
                    for track in &tracks {
                        track.stop();
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(tracks = tracks.len(), "get_user_media complete");
        Ok(MediaStream { tracks })
    }

    /// List registered devices, one entry per supported kind.
    pub fn enumerate_devices(&self) -> Vec<MediaDeviceInfo> {
        self.drivers
            .iter()
            .flat_map(|driver| {
                let info = driver.info();
                let device_id = driver.id().to_string();
                info.kinds.into_iter().map(move |kind| MediaDeviceInfo {
                    device_id: device_id.clone(),
                    kind,
                    label: info.label.clone(),
                })
            })
            .collect()
    }
}
