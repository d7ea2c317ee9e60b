use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::device::{CaptureDiagnostics, DeviceInfo};
use crate::models::error::CaptureError;
use crate::models::frame::{AudioFrame, FrameFormat};
use crate::models::state::SessionState;
use crate::processing::frame_ring::FrameRing;
use crate::stream::adapter::{AdapterState, StreamAdapter};
use crate::stream::reader::{FrameReader, ReaderChannel};
use crate::traits::frame_sink::FrameSink;
use crate::traits::frame_source::FrameSource;

/// Internal sink the device writes into: gate check, ring write, wake the
/// drain thread. Runs in the device callback context, so every step is O(1)
/// with bounded lock holds.
struct RingSink {
    ring: Arc<Mutex<FrameRing>>,
    adapter: Arc<StreamAdapter>,
    accepting: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
}

impl FrameSink for RingSink {
    fn accept(&self, frame: AudioFrame) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            // stale callback after close/error: nothing it writes may be
            // observed downstream
            return false;
        }
        self.ring.lock().write(frame);
        self.captured.fetch_add(1, Ordering::Relaxed);
        self.adapter.notify_deposit();
        true
    }

    fn on_error(&self, error: &CaptureError) {
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        self.adapter.raise_error(error.clone());
    }
}

/// Lifecycle controller for one capture stream.
///
/// Generic over the device backend via [`FrameSource`]. Owns construction
/// order (device opened by the backend, ring sized to the latency budget,
/// adapter attached last) and teardown in reverse (adapter refuses pulls,
/// device stops and blocks out its callbacks, drain thread joins, ring is
/// discarded). Exactly one session exists per device handle; the ring and
/// adapter only ever hold shared references.
pub struct CaptureSession<S: FrameSource> {
    source: S,
    format: FrameFormat,
    info: DeviceInfo,
    state: Mutex<SessionState>,
    ring: Arc<Mutex<FrameRing>>,
    adapter: Arc<StreamAdapter>,
    accepting: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
    drain_handle: Option<thread::JoinHandle<()>>,
}

impl<S: FrameSource> CaptureSession<S> {
    /// Build a session around an opened device, delivering to `sink`.
    /// The stream is not capturing yet; call [`start`](Self::start).
    pub fn open(
        source: S,
        config: CaptureConfig,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidConfig)?;

        let ring = Arc::new(Mutex::new(FrameRing::new(config.ring_capacity())));
        let accepting = Arc::new(AtomicBool::new(true));
        let adapter = Arc::new(StreamAdapter::new(
            Arc::clone(&ring),
            sink,
            Arc::clone(&accepting),
            config.discard_on_close,
        ));

        let format = source.format();
        let info = source.device_info();
        log::debug!(
            "capture session opening: device '{}', {} Hz, {} ch, {}-bit, ring capacity {}",
            info.name,
            format.sample_rate,
            format.channels,
            format.bit_depth,
            config.ring_capacity(),
        );

        Ok(Self {
            source,
            format,
            info,
            state: Mutex::new(SessionState::Opening),
            ring,
            adapter,
            accepting,
            captured: Arc::new(AtomicU64::new(0)),
            drain_handle: None,
        })
    }

    /// Like [`open`](Self::open), but wired to an internal sink exposed as
    /// a blocking [`FrameReader`].
    pub fn open_reader(
        source: S,
        config: CaptureConfig,
    ) -> Result<(Self, FrameReader), CaptureError> {
        let (channel, sink) = ReaderChannel::new();
        let session = Self::open(source, config, sink)?;
        let reader = channel.into_reader(Arc::clone(&session.adapter));
        Ok((session, reader))
    }

    /// Start capturing. Transitions: opening → capturing.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        {
            let state = self.state.lock();
            if *state != SessionState::Opening {
                return Err(CaptureError::InvalidState {
                    operation: "start",
                    state: state.name(),
                });
            }
        }

        // drain thread first, so deposits are serviced from the first frame
        let runner = Arc::clone(&self.adapter);
        let handle = thread::Builder::new()
            .name("line-in-drain".into())
            .spawn(move || runner.run())
            .map_err(|e| CaptureError::Backend(format!("failed to spawn drain thread: {}", e)))?;
        self.drain_handle = Some(handle);

        let ring_sink = Arc::new(RingSink {
            ring: Arc::clone(&self.ring),
            adapter: Arc::clone(&self.adapter),
            accepting: Arc::clone(&self.accepting),
            captured: Arc::clone(&self.captured),
        });

        if let Err(error) = self.source.start(ring_sink) {
            self.accepting.store(false, Ordering::Release);
            self.adapter.finish();
            if let Some(handle) = self.drain_handle.take() {
                let _ = handle.join();
            }
            *self.state.lock() = SessionState::Closed;
            return Err(error);
        }

        *self.state.lock() = SessionState::Capturing;
        log::debug!("capture session started: device '{}'", self.info.name);
        Ok(())
    }

    /// Consumer pull: deliver up to `max_frames` frames to the sink.
    pub fn request(&self, max_frames: usize) -> Result<(), CaptureError> {
        self.adapter.request(max_frames)
    }

    /// Stop capturing and release everything. Safe to call from the
    /// consumer context at any time; idempotent. After this returns, no
    /// frame written by a late device callback is observable.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Closed | SessionState::Stopping => return Ok(()),
                _ => *state = SessionState::Stopping,
            }
        }

        // order matters: gate shut, pulls refused, then the blocking device
        // stop guarantees no callback outlives it
        self.accepting.store(false, Ordering::Release);
        self.adapter.finish();
        let stop_result = self.source.stop();

        if let Some(handle) = self.drain_handle.take() {
            let _ = handle.join();
        }
        self.ring.lock().clear();

        *self.state.lock() = SessionState::Closed;
        log::debug!("capture session closed: device '{}'", self.info.name);
        stop_result
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn stream_state(&self) -> AdapterState {
        self.adapter.state()
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Frames queued in the ring, awaiting delivery.
    pub fn pending_frames(&self) -> usize {
        self.ring.lock().pending_count()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            frames_captured: self.captured.load(Ordering::Relaxed),
            frames_delivered: self.adapter.frames_delivered(),
            overruns: self.ring.lock().overruns(),
        }
    }
}

impl<S: FrameSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
