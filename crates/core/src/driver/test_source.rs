//! Synthetic capture devices.
//!
//! [`VideoTestDriver`] produces a moving gradient and [`AudioTestDriver`] a
//! 440 Hz sine tone. Both pace their output in real time (frame rate for
//! video, buffer latency for audio) and behave like real hardware with
//! respect to exclusivity and shutdown:
//!
//! - a second `open` fails with [`MediaError::DeviceBusy`];
//! - `close` wakes any blocked read, which returns [`MediaError::EndOfStream`];
//! - an optional frame limit ends the stream on its own, as an unplugged
//!   device would.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{Driver, DriverInfo};
use crate::error::{MediaError, Result};
use crate::io::{AudioBuffer, AudioSource, VideoFrame, VideoSource};
use crate::prop::{Audio, FrameFormat, Media, MediaKind, Video};

const DEFAULT_FRAME_RATE: f32 = 30.0;
const DEFAULT_LATENCY: Duration = Duration::from_millis(20);
const TONE_HZ: f32 = 440.0;

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    /// Bumped on every `open` so sources from an earlier session stay dead.
    session: u64,
}

/// Open/close state shared between a driver and the sources it hands out.
#[derive(Debug, Default)]
struct DeviceHandle {
    state: Mutex<DeviceState>,
    closed: Condvar,
}

impl DeviceHandle {
    fn open(&self, id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        if state.open {
            return Err(MediaError::DeviceBusy(id.to_string()));
        }
        state.open = true;
        state.session += 1;
        tracing::debug!(device_id = id, session = state.session, "test device opened");
        Ok(state.session)
    }

    fn close(&self, id: &str) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            tracing::debug!(device_id = id, session = state.session, "test device closed");
        }
        self.closed.notify_all();
    }

    fn current_session(&self) -> Option<u64> {
        let state = self.state.lock();
        state.open.then_some(state.session)
    }

    /// Block until `deadline`, or fail early if the device gets closed.
    fn wait_until(&self, session: u64, deadline: Instant) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if !state.open || state.session != session {
                return Err(MediaError::EndOfStream);
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            self.closed.wait_until(&mut state, deadline);
        }
    }
}

/// Read pacing and the optional spontaneous end of stream.
#[derive(Debug)]
struct Clock {
    interval: Duration,
    next: Instant,
    remaining: Option<u64>,
}

impl Clock {
    fn new(interval: Duration, limit: Option<u64>) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
            remaining: limit,
        }
    }

    fn tick(&mut self, device: &DeviceHandle, session: u64) -> Result<()> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(MediaError::EndOfStream);
            }
            *remaining -= 1;
        }
        device.wait_until(session, self.next)?;
        self.next += self.interval;
        Ok(())
    }
}

/// A synthetic camera.
pub struct VideoTestDriver {
    id: String,
    label: String,
    properties: Vec<Media>,
    frame_limit: Option<u64>,
    device: Arc<DeviceHandle>,
}

impl VideoTestDriver {
    /// Create a camera offering 640x480 and 1280x720 I420 at 30 fps.
    pub fn new(id: &str) -> Self {
        let properties = [(640, 480), (1280, 720)]
            .into_iter()
            .map(|(width, height)| Media {
                device_id: id.to_string(),
                video: Video {
                    width,
                    height,
                    frame_rate: DEFAULT_FRAME_RATE,
                    frame_format: Some(FrameFormat::I420),
                },
                ..Default::default()
            })
            .collect();

        Self {
            id: id.to_string(),
            label: format!("Video test source {id}"),
            properties,
            frame_limit: None,
            device: Arc::default(),
        }
    }

    /// Replace the advertised configurations. The device ID is filled in.
    pub fn with_properties(mut self, properties: Vec<Video>) -> Self {
        self.properties = properties
            .into_iter()
            .map(|video| Media {
                device_id: self.id.clone(),
                video,
                ..Default::default()
            })
            .collect();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// End every recording after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }
}

impl Driver for VideoTestDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> DriverInfo {
        DriverInfo {
            label: self.label.clone(),
            kinds: vec![MediaKind::Video],
        }
    }

    fn open(&self) -> Result<()> {
        self.device.open(&self.id).map(|_| ())
    }

    fn close(&self) -> Result<()> {
        self.device.close(&self.id);
        Ok(())
    }

    fn properties(&self) -> Vec<Media> {
        self.properties.clone()
    }

    fn video_record(&self, props: &Media) -> Result<Box<dyn VideoSource>> {
        let session = self.device.current_session().ok_or(MediaError::Closed)?;

        let format = props.video.frame_format.unwrap_or(FrameFormat::I420);
        if !matches!(format, FrameFormat::I420 | FrameFormat::Rgba) {
            return Err(MediaError::Device(format!(
                "test source cannot produce {format}"
            )));
        }

        let fps = if props.video.frame_rate.is_finite() && props.video.frame_rate > 0.0 {
            props.video.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        };
        let interval = Duration::try_from_secs_f32(1.0 / fps)
            .map_err(|e| MediaError::Device(format!("frame rate {fps} out of range: {e}")))?;

        Ok(Box::new(GradientSource {
            device: self.device.clone(),
            session,
            clock: Clock::new(interval, self.frame_limit),
            width: props.video.width,
            height: props.video.height,
            format,
            tick: 0,
        }))
    }
}

struct GradientSource {
    device: Arc<DeviceHandle>,
    session: u64,
    clock: Clock,
    width: u32,
    height: u32,
    format: FrameFormat,
    tick: u32,
}

impl VideoSource for GradientSource {
    fn read(&mut self) -> Result<VideoFrame> {
        self.clock.tick(&self.device, self.session)?;
        self.tick = self.tick.wrapping_add(1);

        let (w, h, t) = (self.width as usize, self.height as usize, self.tick as usize);
        let data = match self.format {
            FrameFormat::Rgba => {
                let mut data = Vec::with_capacity(w * h * 4);
                for y in 0..h {
                    for x in 0..w {
                        data.extend_from_slice(&[(x + t) as u8, (y + t) as u8, 128, 255]);
                    }
                }
                data
            }
            _ => {
                let chroma = (w / 2) * (h / 2);
                let mut data = Vec::with_capacity(w * h + chroma * 2);
                for y in 0..h {
                    data.extend((0..w).map(|x| (x + y + t) as u8));
                }
                data.resize(w * h + chroma * 2, 128);
                data
            }
        };

        Ok(VideoFrame {
            width: self.width,
            height: self.height,
            format: self.format,
            data,
        })
    }
}

/// A synthetic microphone.
pub struct AudioTestDriver {
    id: String,
    label: String,
    properties: Vec<Media>,
    frame_limit: Option<u64>,
    device: Arc<DeviceHandle>,
}

impl AudioTestDriver {
    /// Create a microphone offering 48 kHz stereo in 20 ms buffers.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: format!("Audio test source {id}"),
            properties: vec![Media {
                device_id: id.to_string(),
                audio: Audio {
                    channel_count: 2,
                    sample_rate: 48_000,
                    sample_size: 32,
                    latency: DEFAULT_LATENCY,
                },
                ..Default::default()
            }],
            frame_limit: None,
            device: Arc::default(),
        }
    }

    /// Replace the advertised configurations. The device ID is filled in.
    pub fn with_properties(mut self, properties: Vec<Audio>) -> Self {
        self.properties = properties
            .into_iter()
            .map(|audio| Media {
                device_id: self.id.clone(),
                audio,
                ..Default::default()
            })
            .collect();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// End every recording after `buffers` buffers.
    pub fn with_frame_limit(mut self, buffers: u64) -> Self {
        self.frame_limit = Some(buffers);
        self
    }
}

impl Driver for AudioTestDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> DriverInfo {
        DriverInfo {
            label: self.label.clone(),
            kinds: vec![MediaKind::Audio],
        }
    }

    fn open(&self) -> Result<()> {
        self.device.open(&self.id).map(|_| ())
    }

    fn close(&self) -> Result<()> {
        self.device.close(&self.id);
        Ok(())
    }

    fn properties(&self) -> Vec<Media> {
        self.properties.clone()
    }

    fn audio_record(&self, props: &Media) -> Result<Box<dyn AudioSource>> {
        let session = self.device.current_session().ok_or(MediaError::Closed)?;

        let latency = if props.audio.latency.is_zero() {
            DEFAULT_LATENCY
        } else {
            props.audio.latency
        };
        let sample_rate = props.audio.sample_rate.max(1);
        let channels = props.audio.channel_count.max(1);
        let frames = ((sample_rate as f64 * latency.as_secs_f64()).round() as usize).max(1);

        Ok(Box::new(ToneSource {
            device: self.device.clone(),
            session,
            clock: Clock::new(latency, self.frame_limit),
            channels,
            sample_rate,
            frames,
            phase: 0.0,
        }))
    }
}

struct ToneSource {
    device: Arc<DeviceHandle>,
    session: u64,
    clock: Clock,
    channels: u16,
    sample_rate: u32,
    frames: usize,
    phase: f32,
}

impl AudioSource for ToneSource {
    fn read(&mut self) -> Result<AudioBuffer> {
        self.clock.tick(&self.device, self.session)?;

        let step = TAU * TONE_HZ / self.sample_rate as f32;
        let mut data = Vec::with_capacity(self.frames * self.channels as usize);
        for _ in 0..self.frames {
            let sample = self.phase.sin() * 0.5;
            data.extend(std::iter::repeat_n(sample, self.channels as usize));
            self.phase = (self.phase + step) % TAU;
        }

        Ok(AudioBuffer {
            channels: self.channels,
            sample_rate: self.sample_rate,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fast_video() -> VideoTestDriver {
        VideoTestDriver::new("cam").with_properties(vec![Video {
            width: 4,
            height: 2,
            frame_rate: 200.0,
            frame_format: Some(FrameFormat::I420),
        }])
    }

    #[test]
    fn open_is_exclusive() {
        let d = fast_video();
        d.open().unwrap();
        assert!(matches!(d.open(), Err(MediaError::DeviceBusy(_))));
        d.close().unwrap();
        d.open().unwrap();
        d.close().unwrap();
    }

    #[test]
    fn unrepresentable_frame_rate_is_a_device_error() {
        let d = VideoTestDriver::new("cam").with_properties(vec![Video {
            width: 4,
            height: 2,
            frame_rate: 1e-40,
            frame_format: Some(FrameFormat::I420),
        }]);
        d.open().unwrap();
        let props = d.properties().remove(0);
        assert!(matches!(d.video_record(&props).err(), Some(MediaError::Device(_))));
        d.close().unwrap();
    }

    #[test]
    fn record_requires_open_device() {
        let d = fast_video();
        let props = d.properties().remove(0);
        assert!(matches!(d.video_record(&props).err(), Some(MediaError::Closed)));
    }

    #[test]
    fn gradient_frames_have_expected_size() {
        let d = fast_video();
        d.open().unwrap();
        let props = d.properties().remove(0);
        let mut source = d.video_record(&props).unwrap();
        let frame = source.read().unwrap();
        assert_eq!(frame.format, FrameFormat::I420);
        assert_eq!(Some(frame.data.len()), FrameFormat::I420.frame_size(4, 2));
        d.close().unwrap();
    }

    #[test]
    fn rgba_frames() {
        let d = VideoTestDriver::new("cam");
        d.open().unwrap();
        let mut props = d.properties().remove(0);
        props.video = Video {
            width: 3,
            height: 3,
            frame_rate: 500.0,
            frame_format: Some(FrameFormat::Rgba),
        };
        let frame = d.video_record(&props).unwrap().read().unwrap();
        assert_eq!(frame.data.len(), 3 * 3 * 4);
        d.close().unwrap();
    }

    #[test]
    fn close_wakes_blocked_read() {
        let d = Arc::new(VideoTestDriver::new("cam").with_properties(vec![Video {
            width: 2,
            height: 2,
            frame_rate: 0.1, // one frame every ten seconds
            frame_format: Some(FrameFormat::I420),
        }]));
        d.open().unwrap();
        let props = d.properties().remove(0);
        let mut source = d.video_record(&props).unwrap();

        let closer = {
            let d = d.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                d.close().unwrap();
            })
        };

        let started = Instant::now();
        assert!(matches!(source.read(), Err(MediaError::EndOfStream)));
        assert!(started.elapsed() < Duration::from_secs(5));
        closer.join().unwrap();
    }

    #[test]
    fn stale_source_stays_closed_after_reopen() {
        let d = fast_video();
        d.open().unwrap();
        let props = d.properties().remove(0);
        let mut old = d.video_record(&props).unwrap();
        d.close().unwrap();
        d.open().unwrap();
        assert!(matches!(old.read(), Err(MediaError::EndOfStream)));
        d.close().unwrap();
    }

    #[test]
    fn frame_limit_ends_stream() {
        let d = fast_video().with_frame_limit(2);
        d.open().unwrap();
        let props = d.properties().remove(0);
        let mut source = d.video_record(&props).unwrap();
        assert!(source.read().is_ok());
        assert!(source.read().is_ok());
        assert!(matches!(source.read(), Err(MediaError::EndOfStream)));
        d.close().unwrap();
    }

    #[test]
    fn tone_buffer_matches_latency() {
        let d = AudioTestDriver::new("mic").with_properties(vec![Audio {
            channel_count: 2,
            sample_rate: 8000,
            sample_size: 32,
            latency: Duration::from_millis(10),
        }]);
        d.open().unwrap();
        let props = d.properties().remove(0);
        let buf = d.audio_record(&props).unwrap().read().unwrap();
        assert_eq!(buf.channels, 2);
        assert_eq!(buf.frames(), 80);
        assert!(buf.data.iter().all(|s| s.abs() <= 0.5));
        d.close().unwrap();
    }

    #[test]
    fn kinds_are_advertised() {
        assert!(VideoTestDriver::new("v").supports(MediaKind::Video));
        assert!(!VideoTestDriver::new("v").supports(MediaKind::Audio));
        assert!(AudioTestDriver::new("a").supports(MediaKind::Audio));
    }
}
