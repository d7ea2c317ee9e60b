use serde::{Deserialize, Serialize};

/// The input device backing a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Backend identifier, usable as `CaptureConfig::device_id`.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the system default input.
    pub is_default: bool,
}

/// Counters for debugging a capture session.
///
/// Overruns are the normal signal of a consumer that is slower than the
/// device; they never end the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDiagnostics {
    /// Frames the device callback deposited into the ring.
    pub frames_captured: u64,
    /// Frames delivered to the consumer sink.
    pub frames_delivered: u64,
    /// Frames evicted from the ring because the consumer fell behind.
    pub overruns: u64,
}
