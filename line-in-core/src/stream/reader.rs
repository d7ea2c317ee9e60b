use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::models::frame::AudioFrame;
use crate::stream::adapter::StreamAdapter;
use crate::traits::frame_sink::FrameSink;

/// Frames the reader keeps buffered before reporting saturation. The drain
/// thread pauses past this point and backpressure moves into the ring.
const READER_QUEUE_FRAMES: usize = 8;

struct Queue {
    frames: VecDeque<AudioFrame>,
    ended: bool,
    error: Option<CaptureError>,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// The sink half of [`FrameReader`]: receives frames from the drain thread
/// and wakes any blocked `read` call.
struct ReaderSink {
    shared: Arc<Shared>,
}

impl FrameSink for ReaderSink {
    fn accept(&self, frame: AudioFrame) -> bool {
        let mut queue = self.shared.queue.lock();
        queue.frames.push_back(frame);
        self.shared.available.notify_one();
        queue.frames.len() < READER_QUEUE_FRAMES
    }

    fn on_error(&self, error: &CaptureError) {
        let mut queue = self.shared.queue.lock();
        queue.error = Some(error.clone());
        self.shared.available.notify_all();
    }

    fn on_end(&self) {
        let mut queue = self.shared.queue.lock();
        queue.ended = true;
        self.shared.available.notify_all();
    }
}

/// Receiving half of the reader wiring, created before the adapter exists
/// (the adapter is constructed around the sink half). Turned into a
/// [`FrameReader`] once the adapter it should pull on is available.
pub(crate) struct ReaderChannel {
    shared: Arc<Shared>,
}

impl ReaderChannel {
    pub(crate) fn new() -> (Self, Arc<dyn FrameSink>) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                frames: VecDeque::new(),
                ended: false,
                error: None,
            }),
            available: Condvar::new(),
        });
        let sink = Arc::new(ReaderSink {
            shared: Arc::clone(&shared),
        });
        (Self { shared }, sink)
    }

    pub(crate) fn into_reader(self, adapter: Arc<StreamAdapter>) -> FrameReader {
        FrameReader {
            shared: self.shared,
            adapter,
            leftover: Vec::new(),
            leftover_pos: 0,
        }
    }
}

/// Blocking byte view over a capture stream.
///
/// `read` pulls frames through the adapter as its internal queue drains and
/// blocks while the device has produced nothing new. Frame boundaries are
/// invisible: bytes arrive in capture order, partially consumed frames carry
/// over to the next call.
///
/// End and error follow `std::io` conventions: `Ok(0)` once the stream
/// ended, `ErrorKind::BrokenPipe` wrapping the [`CaptureError`] after a
/// fatal capture failure (sticky — subsequent reads keep failing).
pub struct FrameReader {
    shared: Arc<Shared>,
    adapter: Arc<StreamAdapter>,
    leftover: Vec<u8>,
    leftover_pos: usize,
}

impl FrameReader {
    fn next_frame(&self) -> io::Result<Option<AudioFrame>> {
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(frame) = queue.frames.pop_front() {
                return Ok(Some(frame));
            }
            if let Some(ref error) = queue.error {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, error.clone()));
            }
            if queue.ended {
                return Ok(None);
            }
            // Queue is dry and the stream is live: pull and wait. A refusal
            // means close/error is in flight; the flags above resolve it.
            let _ = self.adapter.request(READER_QUEUE_FRAMES);
            self.shared.available.wait(&mut queue);
        }
    }
}

impl Read for FrameReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.leftover_pos < self.leftover.len() {
                let n = (self.leftover.len() - self.leftover_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.leftover[self.leftover_pos..self.leftover_pos + n]);
                self.leftover_pos += n;
                return Ok(n);
            }

            match self.next_frame()? {
                Some(frame) => {
                    self.leftover.clear();
                    self.leftover.extend_from_slice(frame.data());
                    self.leftover_pos = 0;
                }
                None => return Ok(0),
            }
        }
    }
}
