//! Media properties.
//!
//! A [`Media`] value is an immutable snapshot of one stream configuration a
//! device can produce (or has been asked to produce). Drivers publish their
//! candidate configurations as `Media` values; the selector scores them
//! with [`fitness`] and hands the winner to the driver and encoder.

pub mod fitness;

use std::fmt;
use std::time::Duration;

use crate::constraints::MediaTrackConstraints;
use fitness::Comparisons;

/// Kind of media carried by a device, codec, or track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel layout of a raw video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    /// Planar YUV 4:2:0 (Y, then U, then V). Accepted by most encoders.
    I420,
    /// Semi-planar YUV 4:2:0 with interleaved UV.
    Nv12,
    /// Semi-planar YUV 4:2:0 with interleaved VU.
    Nv21,
    /// Packed YUV 4:2:2, Y0 U Y1 V.
    Yuy2,
    /// Packed YUV 4:2:2, U Y0 V Y1.
    Uyvy,
    /// Packed 8-bit RGBA.
    Rgba,
    /// Motion JPEG, one JPEG image per frame.
    Mjpeg,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::I420 => "I420",
            Self::Nv12 => "NV12",
            Self::Nv21 => "NV21",
            Self::Yuy2 => "YUY2",
            Self::Uyvy => "UYVY",
            Self::Rgba => "RGBA",
            Self::Mjpeg => "MJPEG",
        }
    }

    /// Size in bytes of one uncompressed frame, or `None` for compressed formats.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            Self::I420 | Self::Nv12 | Self::Nv21 => Some(pixels + pixels / 2),
            Self::Yuy2 | Self::Uyvy => Some(pixels * 2),
            Self::Rgba => Some(pixels * 4),
            Self::Mjpeg => None,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Video {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,
    pub frame_format: Option<FrameFormat>,
}

/// Audio properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audio {
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Bits per sample.
    pub sample_size: u16,
    /// Duration of audio carried by one buffer.
    pub latency: Duration,
}

/// Encoding properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Codec {
    pub codec_name: String,
    /// Target bitrate in bps.
    pub bit_rate: u32,
    /// Quality of the encoding, 0-9. Larger values give higher quality at
    /// higher CPU cost; the exact meaning depends on the codec.
    pub quality: u8,
    /// Expected interval between key frames, in frames.
    pub key_frame_interval: u32,
}

/// A full description of one stream configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Media {
    pub device_id: String,
    pub video: Video,
    pub audio: Audio,
    pub codec: Codec,
}

impl Media {
    /// Distance between these (actual) properties and `ideal`, comparing
    /// every video and audio field. Lower is better, `0.0` is an exact match.
    pub fn fitness_distance(&self, ideal: &Media) -> f64 {
        let mut cmps = Comparisons::new();
        cmps.add(self.video.width, ideal.video.width);
        cmps.add(self.video.height, ideal.video.height);
        cmps.add(self.video.frame_rate, ideal.video.frame_rate);
        cmps.add(
            format_name(self.video.frame_format),
            format_name(ideal.video.frame_format),
        );
        cmps.add(self.audio.channel_count, ideal.audio.channel_count);
        cmps.add(self.audio.sample_rate, ideal.audio.sample_rate);
        cmps.add(self.audio.sample_size, ideal.audio.sample_size);
        cmps.add(
            self.audio.latency.as_secs_f64(),
            ideal.audio.latency.as_secs_f64(),
        );
        cmps.fitness_distance()
    }

    /// Overlay the caller's constraints onto selected device properties.
    ///
    /// Codec settings always come from the constraints. Device fields keep
    /// the value the device reported and only fall back to the constraint
    /// when the device left them unset.
    pub fn merge(&mut self, constraints: &MediaTrackConstraints) {
        if let Some(name) = &constraints.codec_name {
            self.codec.codec_name = name.clone();
        }
        if let Some(bit_rate) = constraints.bit_rate {
            self.codec.bit_rate = bit_rate;
        }
        if let Some(quality) = constraints.quality {
            self.codec.quality = quality;
        }
        if let Some(interval) = constraints.key_frame_interval {
            self.codec.key_frame_interval = interval;
        }

        fill(&mut self.video.width, constraints.width);
        fill(&mut self.video.height, constraints.height);
        if self.video.frame_rate == 0.0 {
            if let Some(rate) = constraints.frame_rate {
                self.video.frame_rate = rate;
            }
        }
        if self.video.frame_format.is_none() {
            self.video.frame_format = constraints.frame_format;
        }

        fill(&mut self.audio.channel_count, constraints.channel_count);
        fill(&mut self.audio.sample_rate, constraints.sample_rate);
        fill(&mut self.audio.sample_size, constraints.sample_size);
        if self.audio.latency.is_zero() {
            if let Some(latency) = constraints.latency {
                self.audio.latency = latency;
            }
        }
    }
}

/// Textual form used when comparing an optional frame format.
pub(crate) fn format_name(format: Option<FrameFormat>) -> &'static str {
    format.map(|f| f.as_str()).unwrap_or("")
}

fn fill<T: Copy + Default + PartialEq>(field: &mut T, value: Option<T>) {
    if *field == T::default() {
        if let Some(value) = value {
            *field = value;
        }
    }
}
