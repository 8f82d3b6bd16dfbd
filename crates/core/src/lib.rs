//! Capture-device selection and encoding pipelines.
//!
//! Register drivers and codecs, describe what you want with
//! [`MediaStreamConstraints`], and [`MediaDevices::get_user_media`] picks
//! the closest device configuration, opens it, and starts a worker that
//! feeds encoded samples into a [`LocalTrack`] of your choosing.

pub mod codec;
pub mod constraints;
pub mod driver;
pub mod error;
pub mod io;
pub mod media_devices;
pub mod prop;
pub mod selector;
pub mod track;

pub use codec::{CodecDescriptor, CodecRegistry, Encoder};
pub use constraints::{MediaStreamConstraints, MediaTrackConstraints};
pub use driver::{Driver, DriverInfo, DriverRegistry};
pub use error::{MediaError, Result};
pub use media_devices::{MediaDeviceInfo, MediaDevices, MediaDevicesConfig, MediaStream};
pub use prop::{Media, MediaKind};
pub use track::{LocalTrack, Sample, Track, TrackGenerator, TrackState};
