//! Encoders and the codec registry.
//!
//! An [`Encoder`] is a pull-based byte source: it owns the raw source it
//! encodes, and each [`read`](Encoder::read) pulls as much raw media as it
//! needs to produce the next encoded unit.
//!
//! Output buffers are owned by the caller. When a unit does not fit, the
//! encoder returns [`MediaError::InsufficientBuffer`] with the size it
//! needs and keeps the unit for the next call. The caller grows its buffer
//! and retries; nothing is lost.
//!
//! Codecs are registered by name in a [`CodecRegistry`], together with a
//! [`CodecDescriptor`] that the transport layer uses to describe the track.

pub mod raw;

use std::fmt;
use std::sync::Arc;

use crate::error::{MediaError, Result};
use crate::io::{AudioSource, VideoSource};
use crate::prop::{Media, MediaKind};

/// Default RTP clock rate for video codecs (RFC 3551 §5).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Transport-facing description of a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Codec name, matched against [`MediaTrackConstraints::codec_name`](crate::MediaTrackConstraints::codec_name).
    pub name: String,
    pub kind: MediaKind,
    /// RTP payload type. Dynamic types use 96–127.
    pub payload_type: u8,
    /// Media clock rate in Hz.
    pub clock_rate: u32,
    /// Audio channel count; `0` for video.
    pub channels: u16,
}

impl CodecDescriptor {
    pub fn video(name: &str, payload_type: u8) -> Self {
        Self {
            name: name.to_string(),
            kind: MediaKind::Video,
            payload_type,
            clock_rate: VIDEO_CLOCK_RATE,
            channels: 0,
        }
    }

    pub fn audio(name: &str, payload_type: u8, clock_rate: u32, channels: u16) -> Self {
        Self {
            name: name.to_string(),
            kind: MediaKind::Audio,
            payload_type,
            clock_rate,
            channels,
        }
    }
}

/// A running encoder.
pub trait Encoder: Send {
    /// Write the next encoded unit into `buf`, returning its length.
    ///
    /// Returns [`MediaError::InsufficientBuffer`] if the unit does not fit,
    /// and [`MediaError::EndOfStream`] once the underlying source is done.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release encoder resources. Subsequent reads return [`MediaError::Closed`].
    fn close(&mut self) -> Result<()>;
}

pub type VideoEncoderBuilder =
    Arc<dyn Fn(Box<dyn VideoSource>, &Media) -> Result<Box<dyn Encoder>> + Send + Sync>;

pub type AudioEncoderBuilder =
    Arc<dyn Fn(Box<dyn AudioSource>, &Media) -> Result<Box<dyn Encoder>> + Send + Sync>;

/// Constructor for an encoder of one media kind.
#[derive(Clone)]
pub enum EncoderBuilder {
    Video(VideoEncoderBuilder),
    Audio(AudioEncoderBuilder),
}

impl EncoderBuilder {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video(_) => MediaKind::Video,
            Self::Audio(_) => MediaKind::Audio,
        }
    }
}

impl fmt::Debug for EncoderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncoderBuilder::{}", self.kind())
    }
}

/// A codec entry: descriptor plus encoder builder.
#[derive(Debug, Clone)]
pub struct RegisteredCodec {
    pub descriptor: CodecDescriptor,
    builder: EncoderBuilder,
}

impl RegisteredCodec {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> MediaKind {
        self.descriptor.kind
    }

    pub fn build_video(&self, source: Box<dyn VideoSource>, props: &Media) -> Result<Box<dyn Encoder>> {
        match &self.builder {
            EncoderBuilder::Video(build) => build(source, props),
            EncoderBuilder::Audio(_) => Err(MediaError::Encoder(format!(
                "{} is not a video codec",
                self.descriptor.name
            ))),
        }
    }

    pub fn build_audio(&self, source: Box<dyn AudioSource>, props: &Media) -> Result<Box<dyn Encoder>> {
        match &self.builder {
            EncoderBuilder::Audio(build) => build(source, props),
            EncoderBuilder::Video(_) => Err(MediaError::Encoder(format!(
                "{} is not an audio codec",
                self.descriptor.name
            ))),
        }
    }
}

/// Registry of encoders, keyed by kind and name.
///
/// Populated at startup, then shared behind an `Arc` and treated as
/// read-only while tracks run.
#[derive(Debug, Default, Clone)]
pub struct CodecRegistry {
    codecs: Vec<RegisteredCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a video encoder. The descriptor's kind is forced to video.
    pub fn register_video<F>(&mut self, mut descriptor: CodecDescriptor, builder: F)
    where
        F: Fn(Box<dyn VideoSource>, &Media) -> Result<Box<dyn Encoder>> + Send + Sync + 'static,
    {
        descriptor.kind = MediaKind::Video;
        self.insert(RegisteredCodec {
            descriptor,
            builder: EncoderBuilder::Video(Arc::new(builder)),
        });
    }

    /// Register an audio encoder. The descriptor's kind is forced to audio.
    pub fn register_audio<F>(&mut self, mut descriptor: CodecDescriptor, builder: F)
    where
        F: Fn(Box<dyn AudioSource>, &Media) -> Result<Box<dyn Encoder>> + Send + Sync + 'static,
    {
        descriptor.kind = MediaKind::Audio;
        self.insert(RegisteredCodec {
            descriptor,
            builder: EncoderBuilder::Audio(Arc::new(builder)),
        });
    }

    fn insert(&mut self, codec: RegisteredCodec) {
        tracing::info!(
            codec = %codec.descriptor.name,
            kind = %codec.descriptor.kind,
            payload_type = codec.descriptor.payload_type,
            "codec registered"
        );

        match self
            .codecs
            .iter()
            .position(|c| c.kind() == codec.kind() && c.name() == codec.name())
        {
            Some(pos) => self.codecs[pos] = codec,
            None => self.codecs.push(codec),
        }
    }

    /// Look up a codec by kind and exact name.
    pub fn find(&self, kind: MediaKind, name: &str) -> Option<&RegisteredCodec> {
        self.codecs
            .iter()
            .find(|c| c.kind() == kind && c.name() == name)
    }

    /// Registered codecs of one kind, in registration order.
    pub fn codecs_for(&self, kind: MediaKind) -> impl Iterator<Item = &RegisteredCodec> {
        self.codecs.iter().filter(move |c| c.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_video(_: Box<dyn VideoSource>, _: &Media) -> Result<Box<dyn Encoder>> {
        Err(MediaError::Encoder("null".into()))
    }

    fn null_audio(_: Box<dyn AudioSource>, _: &Media) -> Result<Box<dyn Encoder>> {
        Err(MediaError::Encoder("null".into()))
    }

    #[test]
    fn lookup_is_scoped_by_kind() {
        let mut registry = CodecRegistry::new();
        registry.register_video(CodecDescriptor::video("VP8", 96), null_video);
        registry.register_audio(CodecDescriptor::audio("opus", 111, 48_000, 2), null_audio);

        assert!(registry.find(MediaKind::Video, "VP8").is_some());
        assert!(registry.find(MediaKind::Audio, "VP8").is_none());
        assert!(registry.find(MediaKind::Audio, "opus").is_some());
        assert!(registry.find(MediaKind::Video, "vp8").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn kind_follows_builder() {
        let mut registry = CodecRegistry::new();
        // Descriptor claims audio, but the builder is a video builder.
        registry.register_video(CodecDescriptor::audio("odd", 100, 8000, 1), null_video);
        let codec = registry.find(MediaKind::Video, "odd").unwrap();
        assert_eq!(codec.kind(), MediaKind::Video);
    }

    #[test]
    fn reregistering_replaces() {
        let mut registry = CodecRegistry::new();
        registry.register_video(CodecDescriptor::video("VP8", 96), null_video);
        registry.register_video(CodecDescriptor::video("VP8", 98), null_video);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.find(MediaKind::Video, "VP8").unwrap().descriptor.payload_type,
            98
        );
    }

    #[test]
    fn wrong_kind_build_is_rejected() {
        let mut registry = CodecRegistry::new();
        registry.register_audio(CodecDescriptor::audio("opus", 111, 48_000, 2), null_audio);
        let codec = registry.find(MediaKind::Audio, "opus").unwrap();

        let source = crate::io::VideoSourceFn(|| Err(MediaError::EndOfStream));
        let err = codec.build_video(Box::new(source), &Media::default()).err();
        assert!(matches!(err, Some(MediaError::Encoder(_))));
    }

    #[test]
    fn codecs_for_kind_in_order() {
        let mut registry = CodecRegistry::new();
        registry.register_video(CodecDescriptor::video("VP8", 96), null_video);
        registry.register_audio(CodecDescriptor::audio("opus", 111, 48_000, 2), null_audio);
        registry.register_video(CodecDescriptor::video("H264", 102), null_video);

        let names: Vec<&str> = registry
            .codecs_for(MediaKind::Video)
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["VP8", "H264"]);
    }
}
