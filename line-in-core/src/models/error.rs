use thiserror::Error;

/// Errors that can occur while opening or running a capture stream.
///
/// Fatal errors end the stream: after an error has been delivered through
/// the sink's error channel, no further data follows. Ring overruns are not
/// errors; they are counted in [`CaptureDiagnostics`](crate::CaptureDiagnostics).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The device is missing or could not be claimed at open time.
    /// Not retried automatically.
    #[error("input device unavailable")]
    DeviceUnavailable,

    /// The device rejected the requested sample rate / channel / bit-depth
    /// combination at open time. Not retried automatically.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The device disconnected or failed mid-capture. Surfaced exactly once
    /// as a stream error; the caller must open a new session.
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// An operation was attempted outside its legal lifecycle state.
    #[error("invalid state for {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The configuration itself is malformed (rejected before touching
    /// the device).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A backend failure that is not device absence (stream construction,
    /// thread spawn, host quirks).
    #[error("backend error: {0}")]
    Backend(String),
}
