use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::FrameFormat;

/// Extra slots on top of the latency budget so a briefly stalled consumer
/// does not immediately evict.
const RING_SAFETY_MARGIN: usize = 2;

/// Configuration for a capture stream.
///
/// The defaults mirror what a line-in style capture has always meant:
/// the system default input at 44100 Hz, stereo, 16-bit signed little-endian
/// PCM, cut into 8192-byte frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Specific input device ID, or None for the system default.
    pub device_id: Option<String>,

    /// Requested sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Number of interleaved channels (default: 2). Valid values: 1, 2.
    pub channels: u16,

    /// Output bit depth (default: 16). Valid values: 16, 24, 32.
    pub bit_depth: u16,

    /// Payload size of each delivered frame in bytes (default: 8192).
    /// Must be a multiple of the format's block align.
    pub frame_bytes: usize,

    /// Latency budget the ring is sized to absorb before evicting
    /// (default: 500 ms).
    pub latency_ms: u64,

    /// Discard frames still queued in the ring when the stream is closed,
    /// instead of delivering them in a final drain (default: false).
    pub discard_on_close: bool,
}

impl CaptureConfig {
    pub fn format(&self) -> FrameFormat {
        FrameFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bit_depth,
        }
    }

    /// Ring capacity in frames: the latency budget divided by the frame
    /// duration, plus a safety margin.
    pub fn ring_capacity(&self) -> usize {
        let frame = self.format().duration_of(self.frame_bytes);
        if frame.is_zero() {
            return 2;
        }
        let budget = Duration::from_millis(self.latency_ms).as_secs_f64() / frame.as_secs_f64();
        (budget.ceil() as usize + RING_SAFETY_MARGIN).max(2)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.frame_bytes == 0 {
            return Err("frame size must be positive".into());
        }
        if self.frame_bytes % self.format().block_align() != 0 {
            return Err(format!(
                "frame size {} is not a multiple of block align {}",
                self.frame_bytes,
                self.format().block_align()
            ));
        }
        if self.latency_ms == 0 {
            return Err("latency budget must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            sample_rate: 44100,
            channels: 2,
            bit_depth: 16,
            frame_bytes: 8192,
            latency_ms: 500,
            discard_on_close: false,
        }
    }
}
