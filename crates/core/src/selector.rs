//! Device and codec selection.
//!
//! [`select`] turns one kind's constraints into a concrete
//! `(driver, codec, properties)` choice:
//!
//! 1. Resolve the requested codec name for the kind.
//! 2. Enumerate every configuration of every driver that records the kind,
//!    in registration order.
//! 3. Score each configuration with
//!    [`MediaTrackConstraints::fitness_distance`].
//! 4. Keep the lowest score. Only a strictly lower score displaces the
//!    current best, so ties go to the first candidate enumerated.
//!
//! Selection never opens a device.

use std::sync::Arc;

use crate::codec::{CodecRegistry, RegisteredCodec};
use crate::constraints::MediaTrackConstraints;
use crate::driver::{Driver, DriverRegistry};
use crate::error::{MediaError, Result};
use crate::prop::{Media, MediaKind};

/// One configuration considered during selection.
pub struct Candidate<'a> {
    pub driver: &'a Arc<dyn Driver>,
    pub properties: Media,
    pub distance: f64,
}

/// The winning device, codec, and the properties to record and encode with.
#[derive(Clone)]
pub struct Selection {
    pub driver: Arc<dyn Driver>,
    pub codec: RegisteredCodec,
    pub properties: Media,
    pub distance: f64,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("driver", &self.driver.id())
            .field("codec", &self.codec.descriptor.name)
            .field("properties", &self.properties)
            .field("distance", &self.distance)
            .finish()
    }
}

/// Enumerate and score every configuration of every driver for `kind`.
pub fn candidates<'a>(
    kind: MediaKind,
    drivers: &'a DriverRegistry,
    constraints: &MediaTrackConstraints,
) -> Vec<Candidate<'a>> {
    drivers
        .drivers_for(kind)
        .flat_map(|driver| {
            driver.properties().into_iter().map(move |properties| {
                let mut distance = constraints.fitness_distance(&properties);
                // NaN never compares lower, so it would pin the first candidate.
                if distance.is_nan() {
                    distance = f64::INFINITY;
                }
                tracing::debug!(
                    device_id = driver.id(),
                    %kind,
                    width = properties.video.width,
                    height = properties.video.height,
                    sample_rate = properties.audio.sample_rate,
                    distance,
                    "candidate scored"
                );
                Candidate {
                    driver,
                    properties,
                    distance,
                }
            })
        })
        .collect()
}

/// Pick the best device and codec for `kind`.
pub fn select(
    kind: MediaKind,
    codecs: &CodecRegistry,
    drivers: &DriverRegistry,
    constraints: &MediaTrackConstraints,
) -> Result<Selection> {
    let name = constraints
        .codec_name
        .as_deref()
        .ok_or(MediaError::CodecUnspecified(kind))?;
    let codec = codecs
        .find(kind, name)
        .ok_or_else(|| MediaError::CodecNotRegistered {
            kind,
            name: name.to_string(),
        })?;

    let mut best: Option<Candidate<'_>> = None;
    for candidate in candidates(kind, drivers, constraints) {
        if best
            .as_ref()
            .is_none_or(|b| candidate.distance < b.distance)
        {
            best = Some(candidate);
        }
    }

    let best = best.ok_or(MediaError::NoDevice(kind))?;
    let mut properties = best.properties;
    properties.merge(constraints);

    tracing::debug!(
        device_id = best.driver.id(),
        codec = name,
        distance = best.distance,
        "candidate selected"
    );

    Ok(Selection {
        driver: best.driver.clone(),
        codec: codec.clone(),
        properties,
        distance: best.distance,
    })
}
