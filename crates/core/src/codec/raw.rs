//! Uncompressed reference encoders.
//!
//! - [`RawVideoEncoder`] emits each frame's bytes unchanged.
//! - [`PcmEncoder`] converts `f32` samples to interleaved signed 16-bit
//!   little-endian PCM ("L16").
//!
//! Both reject a zero bit rate at build time, and both hold on to a unit
//! that did not fit the caller's buffer until a large enough buffer comes
//! along.

use crate::codec::{CodecDescriptor, CodecRegistry, Encoder};
use crate::error::{MediaError, Result};
use crate::io::{AudioSource, VideoSource};
use crate::prop::Media;

pub const RAW_VIDEO: &str = "rawvideo";
pub const PCM: &str = "L16";

/// Register [`RAW_VIDEO`] and [`PCM`] with their default descriptors.
pub fn register(registry: &mut CodecRegistry) {
    registry.register_video(CodecDescriptor::video(RAW_VIDEO, 96), build_raw_video);
    registry.register_audio(CodecDescriptor::audio(PCM, 97, 48_000, 2), build_pcm);
}

fn check_bit_rate(props: &Media) -> Result<()> {
    if props.codec.bit_rate == 0 {
        return Err(MediaError::Encoder(format!(
            "{}: bit rate must be non-zero",
            props.codec.codec_name
        )));
    }
    Ok(())
}

pub fn build_raw_video(source: Box<dyn VideoSource>, props: &Media) -> Result<Box<dyn Encoder>> {
    check_bit_rate(props)?;
    Ok(Box::new(RawVideoEncoder::new(source)))
}

pub fn build_pcm(source: Box<dyn AudioSource>, props: &Media) -> Result<Box<dyn Encoder>> {
    check_bit_rate(props)?;
    Ok(Box::new(PcmEncoder::new(source)))
}

/// Copies a unit into `buf`, or reports the size it needs and keeps it.
fn drain(pending: &mut Option<Vec<u8>>, buf: &mut [u8]) -> Result<usize> {
    let Some(unit) = pending.as_ref() else {
        return Ok(0);
    };
    if unit.len() > buf.len() {
        return Err(MediaError::InsufficientBuffer {
            required: unit.len(),
        });
    }
    let n = unit.len();
    buf[..n].copy_from_slice(unit);
    *pending = None;
    Ok(n)
}

pub struct RawVideoEncoder {
    source: Option<Box<dyn VideoSource>>,
    pending: Option<Vec<u8>>,
}

impl RawVideoEncoder {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        Self {
            source: Some(source),
            pending: None,
        }
    }
}

impl Encoder for RawVideoEncoder {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let source = self.source.as_mut().ok_or(MediaError::Closed)?;
        if self.pending.is_none() {
            self.pending = Some(source.read()?.data);
        }
        drain(&mut self.pending, buf)
    }

    fn close(&mut self) -> Result<()> {
        self.source = None;
        self.pending = None;
        Ok(())
    }
}

pub struct PcmEncoder {
    source: Option<Box<dyn AudioSource>>,
    pending: Option<Vec<u8>>,
}

impl PcmEncoder {
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            source: Some(source),
            pending: None,
        }
    }
}

impl Encoder for PcmEncoder {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let source = self.source.as_mut().ok_or(MediaError::Closed)?;
        if self.pending.is_none() {
            let samples = source.read()?.data;
            let mut bytes = Vec::with_capacity(samples.len() * 2);
            for s in samples {
                let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            self.pending = Some(bytes);
        }
        drain(&mut self.pending, buf)
    }

    fn close(&mut self) -> Result<()> {
        self.source = None;
        self.pending = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{AudioBuffer, AudioSourceFn, VideoFrame, VideoSourceFn};
    use crate::prop::FrameFormat;

    fn counting_video() -> Box<dyn VideoSource> {
        let mut n = 0u8;
        Box::new(VideoSourceFn(move || {
            n += 1;
            Ok(VideoFrame {
                width: 2,
                height: 2,
                format: FrameFormat::Rgba,
                data: vec![n; 16],
            })
        }))
    }

    fn props(bit_rate: u32) -> Media {
        let mut media = Media::default();
        media.codec.codec_name = RAW_VIDEO.into();
        media.codec.bit_rate = bit_rate;
        media
    }

    #[test]
    fn zero_bit_rate_rejected() {
        assert!(matches!(
            build_raw_video(counting_video(), &props(0)).err(),
            Some(MediaError::Encoder(_))
        ));
    }

    #[test]
    fn small_buffer_keeps_pending_frame() {
        let mut enc = build_raw_video(counting_video(), &props(1)).unwrap();

        let mut small = [0u8; 4];
        assert!(matches!(
            enc.read(&mut small),
            Err(MediaError::InsufficientBuffer { required: 16 })
        ));

        // The same frame (not the next one) comes out once the buffer fits.
        let mut big = [0u8; 32];
        assert_eq!(enc.read(&mut big).unwrap(), 16);
        assert_eq!(&big[..16], &[1u8; 16]);

        assert_eq!(enc.read(&mut big).unwrap(), 16);
        assert_eq!(big[0], 2);
    }

    #[test]
    fn closed_encoder_reports_closed() {
        let mut enc = RawVideoEncoder::new(counting_video());
        enc.close().unwrap();
        assert!(matches!(enc.read(&mut [0u8; 64]), Err(MediaError::Closed)));
    }

    #[test]
    fn source_errors_pass_through() {
        let source = VideoSourceFn(|| Err(MediaError::EndOfStream));
        let mut enc = RawVideoEncoder::new(Box::new(source));
        assert!(matches!(
            enc.read(&mut [0u8; 64]),
            Err(MediaError::EndOfStream)
        ));
    }

    #[test]
    fn pcm_converts_to_l16() {
        let source = AudioSourceFn(|| {
            Ok(AudioBuffer {
                channels: 1,
                sample_rate: 8000,
                data: vec![0.0, 1.0, -1.0, 2.0],
            })
        });
        let mut enc = PcmEncoder::new(Box::new(source));
        let mut buf = [0u8; 8];
        assert_eq!(enc.read(&mut buf).unwrap(), 8);

        let samples: Vec<i16> = buf
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX]);
    }

    #[test]
    fn register_adds_both_codecs() {
        let mut registry = CodecRegistry::new();
        register(&mut registry);
        assert!(registry.find(crate::prop::MediaKind::Video, RAW_VIDEO).is_some());
        assert!(registry.find(crate::prop::MediaKind::Audio, PCM).is_some());
    }
}
