use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use mediadevices::codec::raw::{self, PCM, RAW_VIDEO};
use mediadevices::driver::test_source::{AudioTestDriver, VideoTestDriver};
use mediadevices::{
    CodecDescriptor, CodecRegistry, DriverRegistry, LocalTrack, MediaDevices, MediaDevicesConfig,
    MediaKind, MediaStreamConstraints, MediaTrackConstraints, Result, Sample, TrackGenerator,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mediadevices",
    about = "Capture and encode synthetic media, then report what the tracks produced"
)]
struct Args {
    /// Ideal video width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Ideal video height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Video bit rate (bps); 0 is rejected by the encoder
    #[arg(long, default_value_t = 100_000)]
    video_bit_rate: u32,

    /// Audio bit rate (bps); 0 is rejected by the encoder
    #[arg(long, default_value_t = 32_000)]
    audio_bit_rate: u32,

    /// Do not request a video track
    #[arg(long)]
    no_video: bool,

    /// Do not request an audio track
    #[arg(long)]
    no_audio: bool,

    /// End the synthetic streams after this many frames/buffers
    #[arg(long)]
    frame_limit: Option<u64>,

    /// How long to run before stopping the tracks (seconds)
    #[arg(long, short, default_value_t = 3)]
    duration: u64,

    /// Initial encoder output buffer size (bytes)
    #[arg(long, default_value_t = 1024)]
    buffer_size: usize,
}

#[derive(Debug, Default)]
struct Stats {
    samples: u64,
    bytes: u64,
    ticks: u64,
}

/// Sink that only counts what it receives.
struct CountingTrack {
    id: String,
    codec: CodecDescriptor,
    stats: Arc<Mutex<Stats>>,
}

impl LocalTrack for CountingTrack {
    fn write_sample(&self, sample: Sample<'_>) -> Result<()> {
        let mut stats = self.stats.lock();
        stats.samples += 1;
        stats.bytes += sample.data.len() as u64;
        stats.ticks += u64::from(sample.samples);
        Ok(())
    }

    fn codec(&self) -> &CodecDescriptor {
        &self.codec
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.codec.kind
    }
}

type StatsTable = Arc<Mutex<Vec<(String, Arc<Mutex<Stats>>)>>>;

fn counting_generator(table: StatsTable) -> TrackGenerator {
    Arc::new(
        move |payload_type: u8, ssrc: u32, device_id: &str, kind: &str, codec: &CodecDescriptor| {
            let id = format!("{kind}-{device_id}-{ssrc:08x}");
            tracing::debug!(track_id = %id, payload_type, codec = %codec.name, "sink created");

            let stats = Arc::new(Mutex::new(Stats::default()));
            table.lock().push((id.clone(), stats.clone()));
            Ok(Box::new(CountingTrack {
                id,
                codec: codec.clone(),
                stats,
            }) as Box<dyn LocalTrack>)
        },
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut video = VideoTestDriver::new("video0");
    let mut audio = AudioTestDriver::new("audio0");
    if let Some(limit) = args.frame_limit {
        video = video.with_frame_limit(limit);
        audio = audio.with_frame_limit(limit);
    }
    let mut drivers = DriverRegistry::new();
    drivers.register(Arc::new(video));
    drivers.register(Arc::new(audio));

    let mut codecs = CodecRegistry::new();
    raw::register(&mut codecs);

    let table = StatsTable::default();
    let config = MediaDevicesConfig {
        initial_buffer_size: args.buffer_size,
        ..MediaDevicesConfig::default()
    };
    let devices = MediaDevices::with_config(
        Arc::new(codecs),
        Arc::new(drivers),
        counting_generator(table.clone()),
        config,
    );

    for device in devices.enumerate_devices() {
        println!("{:<6} {:<8} {}", device.kind.as_str(), device.device_id, device.label);
    }

    let mut constraints = MediaStreamConstraints::new();
    if !args.no_video {
        constraints = constraints.video(
            MediaTrackConstraints::new()
                .codec_name(RAW_VIDEO)
                .width(args.width)
                .height(args.height)
                .bit_rate(args.video_bit_rate),
        );
    }
    if !args.no_audio {
        constraints = constraints.audio(
            MediaTrackConstraints::new()
                .codec_name(PCM)
                .bit_rate(args.audio_bit_rate),
        );
    }

    let stream = match devices.get_user_media(constraints) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to get user media: {}", e);
            std::process::exit(1);
        }
    };

    for track in stream.get_tracks() {
        let id = track.id().to_string();
        track.on_ended(move |err| {
            tracing::warn!(track_id = %id, error = %err, "track ended");
        });
        let props = track.properties();
        let shape = match track.kind() {
            MediaKind::Video => format!("{}x{}", props.video.width, props.video.height),
            MediaKind::Audio => format!("{} Hz x{}", props.audio.sample_rate, props.audio.channel_count),
        };
        println!(
            "started {} track {} on {} ({shape})",
            track.kind(),
            track.id(),
            track.device_id()
        );
    }

    thread::sleep(Duration::from_secs(args.duration));

    for track in stream.get_tracks() {
        track.stop();
    }

    for (id, stats) in table.lock().iter() {
        let stats = stats.lock();
        println!(
            "{id}: {} samples, {} bytes, {} clock ticks",
            stats.samples, stats.bytes, stats.ticks
        );
    }
}
