//! Error types for the media devices library.

use crate::prop::MediaKind;

/// Errors that can occur while selecting, opening, or running media tracks.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Selection**: [`CodecUnspecified`](Self::CodecUnspecified),
///   [`CodecNotRegistered`](Self::CodecNotRegistered),
///   [`NoDevice`](Self::NoDevice). Returned synchronously from
///   [`MediaDevices::get_user_media`](crate::MediaDevices::get_user_media).
/// - **Acquisition**: [`DeviceOpen`](Self::DeviceOpen),
///   [`DeviceBusy`](Self::DeviceBusy), [`Unsupported`](Self::Unsupported),
///   and [`Encoder`](Self::Encoder) when raised by an encoder builder.
/// - **Sizing**: [`InsufficientBuffer`](Self::InsufficientBuffer) is a
///   negotiation between the pipeline and an encoder and never reaches
///   the caller.
/// - **Runtime**: [`EndOfStream`](Self::EndOfStream),
///   [`Device`](Self::Device), [`Encoder`](Self::Encoder),
///   [`Sink`](Self::Sink), [`Closed`](Self::Closed). Delivered through
///   [`Track::on_ended`](crate::Track::on_ended).
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Underlying I/O error (e.g. the worker thread could not be spawned).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The constraints for an enabled track did not name a codec.
    #[error("no codec name given for {0} track")]
    CodecUnspecified(MediaKind),

    /// The requested codec is not registered for the requested kind.
    #[error("codec {name} is not registered for {kind}")]
    CodecNotRegistered { kind: MediaKind, name: String },

    /// No registered driver can supply media of the requested kind.
    #[error("no {0} device available")]
    NoDevice(MediaKind),

    /// The driver refused to open.
    #[error("failed to open device {device_id}: {reason}")]
    DeviceOpen { device_id: String, reason: String },

    /// The device is already held by another track.
    #[error("device {0} is already open")]
    DeviceBusy(String),

    /// The device does not record the requested kind.
    #[error("device {device_id} does not support {kind}")]
    Unsupported { device_id: String, kind: MediaKind },

    /// A device failed while producing raw media.
    #[error("device error: {0}")]
    Device(String),

    /// An encoder could not be built or failed while encoding.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// The output buffer handed to an encoder is smaller than `required` bytes.
    #[error("insufficient buffer: {required} bytes required")]
    InsufficientBuffer { required: usize },

    /// The source reached the end of its stream.
    #[error("end of stream")]
    EndOfStream,

    /// Read from a source or encoder that has already been closed.
    #[error("closed")]
    Closed,

    /// The track sink rejected an encoded sample.
    #[error("sink error: {0}")]
    Sink(String),
}

impl MediaError {
    /// Whether this error marks the regular end of a source rather than a fault.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Closed)
    }
}

/// Convenience alias for `Result<T, MediaError>`.
pub type Result<T> = std::result::Result<T, MediaError>;
