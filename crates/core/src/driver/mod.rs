//! Capture device drivers.
//!
//! A [`Driver`] wraps one physical (or synthetic) capture device. It
//! advertises the media kinds it can record through [`DriverInfo::kinds`]
//! and exposes one factory method per kind. Selection checks the kind set;
//! it never probes a driver by trying to record from it.
//!
//! ## Lifecycle
//!
//! ```text
//! properties()   -> candidate configurations (no device held)
//! open()         -> device held exclusively
//! *_record(p)    -> blocking raw source for configuration `p`
//! close()        -> device released; blocked reads return EndOfStream
//! ```

pub mod test_source;

use std::sync::Arc;

use crate::error::{MediaError, Result};
use crate::io::{AudioSource, VideoSource};
use crate::prop::{Media, MediaKind};

/// Static description of a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Human-readable device name.
    pub label: String,
    /// Media kinds this device can record.
    pub kinds: Vec<MediaKind>,
}

/// A capture device.
///
/// Methods take `&self` so that a track can close the device from the
/// caller's thread while its worker is blocked in a read.
pub trait Driver: Send + Sync {
    /// Stable, unique device identifier.
    fn id(&self) -> &str;

    fn info(&self) -> DriverInfo;

    /// Acquire the device. Fails with [`MediaError::DeviceBusy`] if it is
    /// already open.
    fn open(&self) -> Result<()>;

    /// Release the device. Any source it handed out must stop blocking and
    /// return [`MediaError::EndOfStream`].
    fn close(&self) -> Result<()>;

    /// Configurations the device can deliver, best first.
    fn properties(&self) -> Vec<Media>;

    fn video_record(&self, _props: &Media) -> Result<Box<dyn VideoSource>> {
        Err(MediaError::Unsupported {
            device_id: self.id().to_string(),
            kind: MediaKind::Video,
        })
    }

    fn audio_record(&self, _props: &Media) -> Result<Box<dyn AudioSource>> {
        Err(MediaError::Unsupported {
            device_id: self.id().to_string(),
            kind: MediaKind::Audio,
        })
    }

    fn supports(&self, kind: MediaKind) -> bool {
        self.info().kinds.contains(&kind)
    }
}

/// Registry of available drivers, in registration order.
///
/// Populate it at startup, then share it behind an `Arc`; it is never
/// mutated while tracks are running, so lookups take no lock.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. A driver with the same ID is replaced in place,
    /// keeping its original enumeration position.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        let info = driver.info();
        tracing::info!(device_id = driver.id(), label = %info.label, kinds = ?info.kinds, "device registered");

        match self.drivers.iter().position(|d| d.id() == driver.id()) {
            Some(pos) => self.drivers[pos] = driver,
            None => self.drivers.push(driver),
        }
    }

    /// Look up a driver by ID.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.iter().find(|d| d.id() == id).cloned()
    }

    /// Drivers that record `kind`, in registration order.
    pub fn drivers_for(&self, kind: MediaKind) -> impl Iterator<Item = &Arc<dyn Driver>> {
        self.drivers.iter().filter(move |d| d.supports(kind))
    }

    /// All drivers, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Driver>> {
        self.drivers.iter()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        id: &'static str,
        label: &'static str,
        kinds: Vec<MediaKind>,
    }

    impl Driver for Dummy {
        fn id(&self) -> &str {
            self.id
        }

        fn info(&self) -> DriverInfo {
            DriverInfo {
                label: self.label.to_string(),
                kinds: self.kinds.clone(),
            }
        }

        fn open(&self) -> Result<()> {
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }

        fn properties(&self) -> Vec<Media> {
            Vec::new()
        }
    }

    fn dummy(id: &'static str, kinds: &[MediaKind]) -> Arc<dyn Driver> {
        Arc::new(Dummy {
            id,
            label: id,
            kinds: kinds.to_vec(),
        })
    }

    #[test]
    fn drivers_filtered_by_kind_in_order() {
        let mut registry = DriverRegistry::new();
        registry.register(dummy("mic", &[MediaKind::Audio]));
        registry.register(dummy("cam0", &[MediaKind::Video]));
        registry.register(dummy("cam1", &[MediaKind::Video, MediaKind::Audio]));

        let video: Vec<&str> = registry
            .drivers_for(MediaKind::Video)
            .map(|d| d.id())
            .collect();
        assert_eq!(video, vec!["cam0", "cam1"]);

        let audio: Vec<&str> = registry
            .drivers_for(MediaKind::Audio)
            .map(|d| d.id())
            .collect();
        assert_eq!(audio, vec!["mic", "cam1"]);
    }

    #[test]
    fn register_replaces_same_id_in_place() {
        let mut registry = DriverRegistry::new();
        registry.register(dummy("a", &[MediaKind::Video]));
        registry.register(dummy("b", &[MediaKind::Video]));
        registry.register(Arc::new(Dummy {
            id: "a",
            label: "replacement",
            kinds: vec![MediaKind::Video],
        }));

        assert_eq!(registry.len(), 2);
        let first = registry.iter().next().unwrap();
        assert_eq!(first.info().label, "replacement");
    }

    #[test]
    fn unsupported_kind_is_an_error() {
        let d = dummy("mic", &[MediaKind::Audio]);
        let err = d.video_record(&Media::default()).err().unwrap();
        assert!(matches!(
            err,
            MediaError::Unsupported {
                kind: MediaKind::Video,
                ..
            }
        ));
    }

    #[test]
    fn get_by_id() {
        let mut registry = DriverRegistry::new();
        registry.register(dummy("cam0", &[MediaKind::Video]));
        assert!(registry.get("cam0").is_some());
        assert!(registry.get("cam9").is_none());
        assert!(!registry.is_empty());
    }
}
