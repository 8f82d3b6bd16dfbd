//! Raw media sources.
//!
//! Drivers hand out blocking, pull-based sources: every `read` call blocks
//! until the next frame (or buffer of samples) is available. A source that
//! has been closed, or whose device ran dry, returns
//! [`MediaError::EndOfStream`](crate::MediaError::EndOfStream).

use std::sync::Arc;

use crate::error::Result;
use crate::prop::FrameFormat;

/// One uncompressed video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

/// A buffer of interleaved `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples, `frames() * channels` long.
    pub data: Vec<f32>,
}

impl AudioBuffer {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels as usize
        }
    }
}

/// Blocking source of raw video frames.
pub trait VideoSource: Send {
    fn read(&mut self) -> Result<VideoFrame>;
}

/// Blocking source of raw audio buffers.
pub trait AudioSource: Send {
    fn read(&mut self) -> Result<AudioBuffer>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn read(&mut self) -> Result<VideoFrame> {
        (**self).read()
    }
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read(&mut self) -> Result<AudioBuffer> {
        (**self).read()
    }
}

/// Adapts a closure into a [`VideoSource`].
///
/// ```
/// use mediadevices::io::{VideoFrame, VideoSource, VideoSourceFn};
/// use mediadevices::prop::FrameFormat;
///
/// let mut source = VideoSourceFn(|| {
///     Ok(VideoFrame { width: 2, height: 2, format: FrameFormat::Rgba, data: vec![0; 16] })
/// });
/// assert_eq!(source.read().unwrap().data.len(), 16);
/// ```
pub struct VideoSourceFn<F>(pub F);

impl<F> VideoSource for VideoSourceFn<F>
where
    F: FnMut() -> Result<VideoFrame> + Send,
{
    fn read(&mut self) -> Result<VideoFrame> {
        (self.0)()
    }
}

/// Adapts a closure into an [`AudioSource`].
pub struct AudioSourceFn<F>(pub F);

impl<F> AudioSource for AudioSourceFn<F>
where
    F: FnMut() -> Result<AudioBuffer> + Send,
{
    fn read(&mut self) -> Result<AudioBuffer> {
        (self.0)()
    }
}

/// Wraps a device's video source before it reaches the encoder.
pub type VideoTransform = Arc<dyn Fn(Box<dyn VideoSource>) -> Box<dyn VideoSource> + Send + Sync>;

/// Wraps a device's audio source before it reaches the encoder.
pub type AudioTransform = Arc<dyn Fn(Box<dyn AudioSource>) -> Box<dyn AudioSource> + Send + Sync>;
