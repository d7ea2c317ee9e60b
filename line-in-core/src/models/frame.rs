use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PCM format of a capture stream: sample rate, interleaved channel count,
/// and bit depth of the signed little-endian output samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Interleaved channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Output bit depth. Valid values: 16, 24, 32.
    pub bit_depth: u16,
}

impl FrameFormat {
    /// Bytes per single sample (one channel).
    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth as usize / 8
    }

    /// Bytes per interleaved sample frame (all channels at one instant).
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// Bytes produced per second of capture.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }

    /// Wall-clock duration represented by `payload_len` bytes of PCM.
    pub fn duration_of(&self, payload_len: usize) -> Duration {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(payload_len as f64 / bps as f64)
    }
}

/// One slice of captured audio: an immutable byte buffer of interleaved PCM
/// plus the sequence number assigned when the frame was cut from the device
/// stream.
///
/// The payload is reference-counted so a frame can be handed to a consumer
/// without copying; cloning a frame clones the handle, not the bytes.
/// Sequence numbers are monotonically increasing per session and make ring
/// evictions visible as gaps on the consumer side.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    seq: u64,
    data: Arc<[u8]>,
}

impl AudioFrame {
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self {
            seq,
            data: data.into(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
