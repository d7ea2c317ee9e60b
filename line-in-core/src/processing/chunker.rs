use crate::models::frame::AudioFrame;

/// Cuts the device's variably sized byte chunks into fixed-size frames.
///
/// The device callback hands over whatever the OS buffered; consumers are
/// promised frames of exactly `frame_bytes`. The chunker accumulates the
/// remainder between callbacks and stamps each emitted frame with the next
/// sequence number. Lives entirely in the device callback context, so it
/// allocates only the frames it emits.
#[derive(Debug)]
pub struct FrameChunker {
    frame_bytes: usize,
    pending: Vec<u8>,
    next_seq: u64,
}

impl FrameChunker {
    pub fn new(frame_bytes: usize) -> Self {
        assert!(frame_bytes > 0, "frame size must be positive");
        Self {
            frame_bytes,
            pending: Vec::with_capacity(frame_bytes),
            next_seq: 0,
        }
    }

    /// Absorb a device chunk, returning every complete frame it closes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let mut rest = bytes;

        while !rest.is_empty() {
            let want = self.frame_bytes - self.pending.len();
            let take = want.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.frame_bytes {
                let payload = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_bytes),
                );
                frames.push(AudioFrame::new(self.next_seq, payload));
                self.next_seq += 1;
            }
        }
        frames
    }

    /// Bytes buffered toward the next frame. A partial tail shorter than
    /// one frame is dropped when capture stops, like the in-flight device
    /// read it came from.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}
