//! Stop semantics against an encoder that never blocks.
//!
//! The sink looks up its own track through a weak handle, so it can observe
//! the track state at the moment of each hand-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mediadevices::driver::test_source::VideoTestDriver;
use mediadevices::io::VideoSource;
use mediadevices::{
    CodecDescriptor, CodecRegistry, DriverRegistry, Encoder, LocalTrack, Media, MediaDevices,
    MediaKind, MediaStreamConstraints, MediaTrackConstraints, Result, Sample, Track,
    TrackGenerator, TrackState,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// One byte per read, immediately.
struct Burst;

impl Encoder for Burst {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf[0] = 0xab;
        Ok(1)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Observed {
    track: Mutex<Weak<Track>>,
    /// Hand-offs made while the sink could see its track.
    seen: AtomicUsize,
    /// Hand-offs made while the track was already stopped.
    after_stop: AtomicUsize,
}

struct WatchingTrack {
    codec: CodecDescriptor,
    observed: Arc<Observed>,
    /// Stop the track from inside the sink on this hand-off.
    stop_at: Option<usize>,
}

impl LocalTrack for WatchingTrack {
    fn write_sample(&self, _sample: Sample<'_>) -> Result<()> {
        let track = self.observed.track.lock().upgrade();
        let Some(track) = track else {
            return Ok(());
        };
        let seen = self.observed.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if track.state() == TrackState::Stopped {
            self.observed.after_stop.fetch_add(1, Ordering::SeqCst);
        }
        if self.stop_at == Some(seen) {
            track.stop();
        }
        Ok(())
    }

    fn codec(&self) -> &CodecDescriptor {
        &self.codec
    }

    fn id(&self) -> &str {
        "watching"
    }

    fn kind(&self) -> MediaKind {
        self.codec.kind
    }
}

fn burst_devices(observed: Arc<Observed>, stop_at: Option<usize>) -> MediaDevices {
    let mut codecs = CodecRegistry::new();
    codecs.register_video(
        CodecDescriptor::video("burst", 100),
        |_: Box<dyn VideoSource>, _: &Media| Ok(Box::new(Burst) as Box<dyn Encoder>),
    );

    let mut drivers = DriverRegistry::new();
    drivers.register(Arc::new(VideoTestDriver::new("cam0")));

    let generator: TrackGenerator = Arc::new(
        move |_: u8, _: u32, _: &str, _: &str, codec: &CodecDescriptor| {
            Ok(Box::new(WatchingTrack {
                codec: codec.clone(),
                observed: observed.clone(),
                stop_at,
            }) as Box<dyn LocalTrack>)
        },
    );

    MediaDevices::new(Arc::new(codecs), Arc::new(drivers), generator)
}

fn burst_request() -> MediaStreamConstraints {
    MediaStreamConstraints::new().video(
        MediaTrackConstraints::new()
            .codec_name("burst")
            .bit_rate(1),
    )
}

#[test]
fn no_hand_off_after_stopped() {
    let observed = Arc::new(Observed::default());
    let devices = burst_devices(observed.clone(), None);

    for _ in 0..100 {
        let stream = devices.get_user_media(burst_request()).unwrap();
        let track = stream.get_tracks()[0].clone();
        *observed.track.lock() = Arc::downgrade(&track);

        thread::sleep(Duration::from_micros(200));
        track.stop();
        assert_eq!(track.state(), TrackState::Stopped);
    }

    assert!(observed.seen.load(Ordering::SeqCst) > 0);
    assert_eq!(observed.after_stop.load(Ordering::SeqCst), 0);
}

#[test]
fn sink_can_stop_its_own_track() {
    let observed = Arc::new(Observed::default());
    let devices = burst_devices(observed.clone(), Some(5));

    let stream = devices.get_user_media(burst_request()).unwrap();
    let track = stream.get_tracks()[0].clone();
    *observed.track.lock() = Arc::downgrade(&track);

    let deadline = Instant::now() + TIMEOUT;
    while track.state() != TrackState::Stopped {
        assert!(Instant::now() < deadline, "track never stopped itself");
        thread::sleep(Duration::from_millis(1));
    }

    // A second stop from the owning thread still waits for the worker,
    // which drops its handle on the sink when it exits.
    track.stop();
    assert_eq!(Arc::strong_count(track.local_track()), 1);

    assert_eq!(observed.seen.load(Ordering::SeqCst), 5);
    assert_eq!(observed.after_stop.load(Ordering::SeqCst), 0);
}
