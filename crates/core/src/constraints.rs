//! Caller-authored constraints for a media request.
//!
//! Every field starts unconstrained (`None`). Setters record an ideal value;
//! nothing is validated here beyond what the field types enforce. Whether a
//! codec name exists, or whether any device can meet the ideal values, is
//! decided later by the [`selector`](crate::selector).
//!
//! ```
//! use mediadevices::{MediaStreamConstraints, MediaTrackConstraints};
//!
//! let constraints = MediaStreamConstraints::new()
//!     .video(
//!         MediaTrackConstraints::new()
//!             .codec_name("VP8")
//!             .width(640)
//!             .height(480)
//!             .bit_rate(100_000),
//!     )
//!     .audio(MediaTrackConstraints::new().codec_name("opus").bit_rate(32_000));
//!
//! assert!(constraints.video.as_ref().is_some_and(|v| v.enabled));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::io::{AudioSource, AudioTransform, VideoSource, VideoTransform};
use crate::prop::fitness::Comparisons;
use crate::prop::{FrameFormat, Media, format_name};

/// Desired properties for one track.
#[derive(Clone)]
pub struct MediaTrackConstraints {
    /// Whether a track should be provisioned at all. Defaults to `true`.
    pub enabled: bool,
    pub codec_name: Option<String>,
    pub device_id: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub frame_format: Option<FrameFormat>,

    pub channel_count: Option<u16>,
    pub sample_rate: Option<u32>,
    pub sample_size: Option<u16>,
    pub latency: Option<Duration>,

    pub bit_rate: Option<u32>,
    pub quality: Option<u8>,
    pub key_frame_interval: Option<u32>,

    pub video_transform: Option<VideoTransform>,
    pub audio_transform: Option<AudioTransform>,
}

impl Default for MediaTrackConstraints {
    fn default() -> Self {
        Self {
            enabled: true,
            codec_name: None,
            device_id: None,
            width: None,
            height: None,
            frame_rate: None,
            frame_format: None,
            channel_count: None,
            sample_rate: None,
            sample_size: None,
            latency: None,
            bit_rate: None,
            quality: None,
            key_frame_interval: None,
            video_transform: None,
            audio_transform: None,
        }
    }
}

impl MediaTrackConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn codec_name(mut self, name: impl Into<String>) -> Self {
        self.codec_name = Some(name.into());
        self
    }

    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn frame_rate(mut self, fps: f32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn frame_format(mut self, format: FrameFormat) -> Self {
        self.frame_format = Some(format);
        self
    }

    pub fn channel_count(mut self, channels: u16) -> Self {
        self.channel_count = Some(channels);
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn sample_size(mut self, bits: u16) -> Self {
        self.sample_size = Some(bits);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn bit_rate(mut self, bps: u32) -> Self {
        self.bit_rate = Some(bps);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn key_frame_interval(mut self, frames: u32) -> Self {
        self.key_frame_interval = Some(frames);
        self
    }

    /// Wrap the device's video source before it is handed to the encoder.
    pub fn video_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Box<dyn VideoSource>) -> Box<dyn VideoSource> + Send + Sync + 'static,
    {
        self.video_transform = Some(Arc::new(transform));
        self
    }

    /// Wrap the device's audio source before it is handed to the encoder.
    pub fn audio_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Box<dyn AudioSource>) -> Box<dyn AudioSource> + Send + Sync + 'static,
    {
        self.audio_transform = Some(Arc::new(transform));
        self
    }

    /// Distance between a candidate's properties and these constraints.
    ///
    /// Only constrained device fields take part; codec settings are applied
    /// to the winner afterwards and never influence ranking.
    pub fn fitness_distance(&self, actual: &Media) -> f64 {
        let mut cmps = Comparisons::new();
        cmps.add_constrained(actual.video.width, self.width);
        cmps.add_constrained(actual.video.height, self.height);
        cmps.add_constrained(actual.video.frame_rate, self.frame_rate);
        cmps.add_constrained(
            format_name(actual.video.frame_format),
            self.frame_format.map(|f| f.as_str()),
        );
        cmps.add_constrained(actual.audio.channel_count, self.channel_count);
        cmps.add_constrained(actual.audio.sample_rate, self.sample_rate);
        cmps.add_constrained(actual.audio.sample_size, self.sample_size);
        cmps.add_constrained(
            actual.audio.latency.as_secs_f64(),
            self.latency.map(|l| l.as_secs_f64()),
        );

        // Device IDs are opaque labels; "0" and "front" are both just names.
        let device = match &self.device_id {
            Some(id) if *id != actual.device_id => 1.0,
            _ => 0.0,
        };
        cmps.fitness_distance() + device
    }
}

impl fmt::Debug for MediaTrackConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrackConstraints")
            .field("enabled", &self.enabled)
            .field("codec_name", &self.codec_name)
            .field("device_id", &self.device_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_rate", &self.frame_rate)
            .field("frame_format", &self.frame_format)
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("sample_size", &self.sample_size)
            .field("latency", &self.latency)
            .field("bit_rate", &self.bit_rate)
            .field("quality", &self.quality)
            .field("key_frame_interval", &self.key_frame_interval)
            .field("video_transform", &self.video_transform.is_some())
            .field("audio_transform", &self.audio_transform.is_some())
            .finish()
    }
}

/// Constraints for a whole media request. A `None` kind is not requested.
#[derive(Debug, Clone, Default)]
pub struct MediaStreamConstraints {
    pub video: Option<MediaTrackConstraints>,
    pub audio: Option<MediaTrackConstraints>,
}

impl MediaStreamConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(mut self, constraints: MediaTrackConstraints) -> Self {
        self.video = Some(constraints);
        self
    }

    pub fn audio(mut self, constraints: MediaTrackConstraints) -> Self {
        self.audio = Some(constraints);
        self
    }
}
