use crate::models::frame::AudioFrame;

/// Fixed-capacity circular buffer of captured frames.
///
/// Single producer (the device callback context), single consumer (the drain
/// thread). Wrap in `Arc<parking_lot::Mutex<FrameRing>>` for cross-thread
/// access; every operation holds the lock for O(1) work per frame, so
/// neither side ever waits on the other beyond that bounded hold.
///
/// Overflow policy: `write` never blocks. When full, the oldest unread frame
/// is evicted and the overrun counter increments — ordering is preserved,
/// the loss is observable through the counter and the sequence-number gap.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<Option<AudioFrame>>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
    overruns: u64,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
            overruns: 0,
        }
    }

    /// Producer side. Never blocks; evicts the oldest frame when full. O(1).
    pub fn write(&mut self, frame: AudioFrame) {
        if self.available == self.capacity {
            self.slots[self.read_index] = None;
            self.read_index = (self.read_index + 1) % self.capacity;
            self.available -= 1;
            self.overruns += 1;
        }

        self.slots[self.write_index] = Some(frame);
        self.write_index = (self.write_index + 1) % self.capacity;
        self.available += 1;
    }

    /// Consumer side. Removes and returns up to `max_frames` frames, oldest
    /// first. An empty ring yields an empty vec, not an error.
    pub fn drain(&mut self, max_frames: usize) -> Vec<AudioFrame> {
        let to_read = max_frames.min(self.available);
        let mut frames = Vec::with_capacity(to_read);
        for _ in 0..to_read {
            let frame = self.slots[self.read_index]
                .take()
                .expect("occupied slot within available range");
            frames.push(frame);
            self.read_index = (self.read_index + 1) % self.capacity;
        }
        self.available -= to_read;
        frames
    }

    /// Frames currently queued; non-blocking, for backpressure decisions.
    pub fn pending_count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Total frames evicted due to overflow since construction.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all queued frames without delivering them. Overrun count stays.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(seq, vec![seq as u8; 4])
    }

    fn seqs(frames: &[AudioFrame]) -> Vec<u64> {
        frames.iter().map(|f| f.seq()).collect()
    }

    #[test]
    fn fifo_without_overflow() {
        let mut ring = FrameRing::new(8);
        for seq in 0..5 {
            ring.write(frame(seq));
        }

        assert_eq!(ring.pending_count(), 5);
        assert_eq!(seqs(&ring.drain(5)), vec![0, 1, 2, 3, 4]);
        assert!(ring.is_empty());
        assert_eq!(ring.overruns(), 0);
    }

    #[test]
    fn drain_partial() {
        let mut ring = FrameRing::new(8);
        for seq in 0..5 {
            ring.write(frame(seq));
        }

        assert_eq!(seqs(&ring.drain(3)), vec![0, 1, 2]);
        assert_eq!(ring.pending_count(), 2);

        // request more than available
        assert_eq!(seqs(&ring.drain(10)), vec![3, 4]);
        assert!(ring.is_empty());
    }

    #[test]
    fn drain_empty_is_not_an_error() {
        let mut ring = FrameRing::new(4);
        assert!(ring.drain(4).is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_and_counts() {
        let mut ring = FrameRing::new(4);
        // N = 7 writes into C = 4 with no drains: exactly 3 evictions
        for seq in 0..7 {
            ring.write(frame(seq));
        }

        assert_eq!(ring.overruns(), 3);
        assert_eq!(ring.pending_count(), 4);
        assert_eq!(seqs(&ring.drain(4)), vec![3, 4, 5, 6]);
    }

    #[test]
    fn wraparound_preserves_order() {
        let mut ring = FrameRing::new(4);
        ring.write(frame(0));
        ring.write(frame(1));
        ring.write(frame(2));
        ring.drain(2); // read_index = 2

        ring.write(frame(3));
        ring.write(frame(4));
        ring.write(frame(5)); // wraps

        assert_eq!(ring.pending_count(), 4);
        assert_eq!(seqs(&ring.drain(4)), vec![2, 3, 4, 5]);
    }

    #[test]
    fn interleaved_writes_and_drains_never_reorder() {
        let mut ring = FrameRing::new(3);
        let mut seen = Vec::new();
        let mut next = 0u64;

        for round in 0..6 {
            for _ in 0..=round % 3 {
                ring.write(frame(next));
                next += 1;
            }
            seen.extend(seqs(&ring.drain(2)));
        }
        seen.extend(seqs(&ring.drain(usize::MAX)));

        // evictions may drop frames, but the survivors stay strictly increasing
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn clear_keeps_overrun_count() {
        let mut ring = FrameRing::new(2);
        for seq in 0..4 {
            ring.write(frame(seq));
        }
        assert_eq!(ring.overruns(), 2);

        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.drain(4).is_empty());
        assert_eq!(ring.overruns(), 2);
    }
}
