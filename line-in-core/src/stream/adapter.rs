use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::processing::frame_ring::FrameRing;
use crate::traits::frame_sink::FrameSink;

/// Stream adapter state machine.
///
/// ```text
///              pull                 ring empty (interest kept)
/// idle ───────────────→ draining ──────────────────────────→ idle
///   ↑                      │ sink saturated
///   │        pull          ↓
///   └────────────────── paused
///
/// draining/paused/idle ──(device error)──→ errored → ended
/// draining/paused/idle ──(close)──→ ended
/// ```
/// `Ended` is terminal; nothing is delivered past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Idle,
    Draining,
    Paused,
    Ended,
    Errored,
}

impl AdapterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Errored)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Draining => "draining",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Errored => "errored",
        }
    }
}

struct Inner {
    state: AdapterState,
    /// A pull is outstanding: deposits should be delivered without waiting
    /// for another request.
    interest: bool,
    /// Frames the current pull may still deliver.
    budget: usize,
    error: Option<CaptureError>,
    closing: bool,
}

enum Action {
    Deliver,
    Fail(CaptureError),
    Finish,
}

/// Drains the capture ring toward a consumer [`FrameSink`], pull-driven.
///
/// The adapter itself is passive; [`StreamAdapter::run`] is executed by the
/// session's drain thread and parks on a condvar until a pull request, a
/// ring deposit, an error, or close gives it work. Frames are delivered
/// outside every lock, so the device callback is never blocked behind a
/// slow consumer.
pub struct StreamAdapter {
    ring: Arc<Mutex<FrameRing>>,
    sink: Arc<dyn FrameSink>,
    inner: Mutex<Inner>,
    wakeup: Condvar,
    /// Shared with the session's ring sink: once false, producer writes are
    /// refused. The adapter closes it when the stream reaches a terminal
    /// state so a stale device callback cannot be observed afterwards.
    gate: Arc<AtomicBool>,
    delivered: AtomicU64,
    discard_on_close: bool,
}

impl StreamAdapter {
    pub fn new(
        ring: Arc<Mutex<FrameRing>>,
        sink: Arc<dyn FrameSink>,
        gate: Arc<AtomicBool>,
        discard_on_close: bool,
    ) -> Self {
        Self {
            ring,
            sink,
            inner: Mutex::new(Inner {
                state: AdapterState::Idle,
                interest: false,
                budget: 0,
                error: None,
                closing: false,
            }),
            wakeup: Condvar::new(),
            gate,
            delivered: AtomicU64::new(0),
            discard_on_close,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.inner.lock().state
    }

    pub fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Consumer pull: deliver up to `max_frames` queued frames. If the ring
    /// empties first, the remaining budget stays primed and later deposits
    /// are delivered without a new request. Refused once the stream is
    /// closing or ended.
    pub fn request(&self, max_frames: usize) -> Result<(), CaptureError> {
        if max_frames == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() || inner.closing {
            return Err(CaptureError::InvalidState {
                operation: "pull",
                state: if inner.closing {
                    "stopping"
                } else {
                    inner.state.name()
                },
            });
        }
        inner.state = AdapterState::Draining;
        inner.interest = true;
        inner.budget = max_frames;
        self.wakeup.notify_all();
        Ok(())
    }

    /// Producer notification: a frame landed in the ring. Called from the
    /// device callback context; must stay cheap.
    pub fn notify_deposit(&self) {
        self.wakeup.notify_all();
    }

    /// Asynchronous device failure. The first error wins; it is delivered
    /// to the sink exactly once by the drain thread.
    pub fn raise_error(&self, error: CaptureError) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() || inner.error.is_some() {
            return;
        }
        inner.error = Some(error);
        self.wakeup.notify_all();
    }

    /// Begin shutdown: refuse further pulls and let the drain thread run
    /// the final drain. The caller joins the drain thread afterwards.
    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        inner.closing = true;
        self.wakeup.notify_all();
    }

    /// Drain loop, run by the session's drain thread. Returns when the
    /// stream reaches `Ended`.
    pub fn run(&self) {
        let mut logged_overruns = 0u64;
        loop {
            let action = {
                let mut inner = self.inner.lock();
                loop {
                    if inner.state == AdapterState::Ended {
                        return;
                    }
                    if let Some(error) = inner.error.take() {
                        // commit before releasing the lock so a second
                        // raise_error cannot queue a duplicate
                        inner.state = AdapterState::Errored;
                        break Action::Fail(error);
                    }
                    if inner.closing {
                        break Action::Finish;
                    }
                    if inner.interest && inner.budget > 0 && !self.ring.lock().is_empty() {
                        break Action::Deliver;
                    }
                    self.wakeup.wait(&mut inner);
                }
            };

            match action {
                Action::Deliver => {
                    let Some(frame) = self.ring.lock().drain(1).pop() else {
                        continue;
                    };
                    let more = self.sink.accept(frame);
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    self.warn_on_overrun(&mut logged_overruns);

                    let mut inner = self.inner.lock();
                    if inner.state.is_terminal() {
                        continue;
                    }
                    inner.budget = inner.budget.saturating_sub(1);
                    if !more {
                        // saturated: remaining frames stay queued for the next pull
                        inner.state = AdapterState::Paused;
                        inner.interest = false;
                        inner.budget = 0;
                    } else if inner.budget == 0 {
                        inner.state = AdapterState::Idle;
                        inner.interest = false;
                    } else if self.ring.lock().is_empty() {
                        // primed: the next deposit resumes delivery
                        inner.state = AdapterState::Idle;
                    }
                }
                Action::Fail(error) => {
                    self.gate.store(false, Ordering::Release);
                    log::error!("capture stream failed: {}", error);
                    self.sink.on_error(&error);
                    self.inner.lock().state = AdapterState::Ended;
                    self.sink.on_end();
                    return;
                }
                Action::Finish => {
                    self.gate.store(false, Ordering::Release);
                    if !self.discard_on_close {
                        self.final_drain();
                    }
                    self.ring.lock().clear();
                    self.warn_on_overrun(&mut logged_overruns);
                    self.inner.lock().state = AdapterState::Ended;
                    self.sink.on_end();
                    return;
                }
            }
        }
    }

    /// Deliver whatever is still queued, in order. A sink that reports
    /// saturation here forfeits the remainder.
    fn final_drain(&self) {
        loop {
            let Some(frame) = self.ring.lock().drain(1).pop() else {
                return;
            };
            let more = self.sink.accept(frame);
            self.delivered.fetch_add(1, Ordering::Relaxed);
            if !more {
                return;
            }
        }
    }

    fn warn_on_overrun(&self, logged: &mut u64) {
        let overruns = self.ring.lock().overruns();
        if overruns > *logged {
            log::warn!(
                "capture ring overrun: {} frame(s) evicted (consumer too slow)",
                overruns - *logged
            );
            *logged = overruns;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::AudioFrame;
    use std::thread;
    use std::time::{Duration, Instant};

    struct CollectSink {
        frames: Mutex<Vec<AudioFrame>>,
        accept_limit: AtomicU64,
    }

    impl CollectSink {
        fn new(limit: u64) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                accept_limit: AtomicU64::new(limit),
            })
        }

        fn count(&self) -> usize {
            self.frames.lock().len()
        }
    }

    impl FrameSink for CollectSink {
        fn accept(&self, frame: AudioFrame) -> bool {
            let mut frames = self.frames.lock();
            frames.push(frame);
            (frames.len() as u64) < self.accept_limit.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        ring: Arc<Mutex<FrameRing>>,
        adapter: Arc<StreamAdapter>,
        sink: Arc<CollectSink>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl Fixture {
        fn new(capacity: usize, accept_limit: u64) -> Self {
            let ring = Arc::new(Mutex::new(FrameRing::new(capacity)));
            let sink = CollectSink::new(accept_limit);
            let gate = Arc::new(AtomicBool::new(true));
            let adapter = Arc::new(StreamAdapter::new(
                Arc::clone(&ring),
                sink.clone() as Arc<dyn FrameSink>,
                gate,
                false,
            ));
            let runner = Arc::clone(&adapter);
            let handle = thread::spawn(move || runner.run());
            Self {
                ring,
                adapter,
                sink,
                handle: Some(handle),
            }
        }

        fn deposit(&self, seq: u64) {
            self.ring.lock().write(AudioFrame::new(seq, vec![0u8; 8]));
            self.adapter.notify_deposit();
        }

        fn wait_for(&self, count: usize) {
            let deadline = Instant::now() + Duration::from_secs(2);
            while self.sink.count() < count {
                assert!(Instant::now() < deadline, "timed out waiting for delivery");
                thread::sleep(Duration::from_millis(2));
            }
        }

        fn wait_for_state(&self, state: AdapterState) {
            let deadline = Instant::now() + Duration::from_secs(2);
            while self.adapter.state() != state {
                assert!(Instant::now() < deadline, "timed out waiting for state");
                thread::sleep(Duration::from_millis(2));
            }
        }

        fn shutdown(mut self) -> Vec<u64> {
            self.adapter.finish();
            if let Some(handle) = self.handle.take() {
                handle.join().unwrap();
            }
            self.sink.frames.lock().iter().map(|f| f.seq()).collect()
        }
    }

    #[test]
    fn pull_drains_in_order() {
        let fx = Fixture::new(8, u64::MAX);
        for seq in 0..4 {
            fx.deposit(seq);
        }
        fx.adapter.request(4).unwrap();
        fx.wait_for(4);
        fx.wait_for_state(AdapterState::Idle);
        assert_eq!(fx.shutdown(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn primed_interest_delivers_later_deposits() {
        let fx = Fixture::new(8, u64::MAX);
        // pull before any data arrives
        fx.adapter.request(2).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(fx.sink.count(), 0);

        fx.deposit(0);
        fx.wait_for(1);
        fx.deposit(1);
        fx.wait_for(2);

        // budget exhausted: the third deposit waits for a new pull
        fx.deposit(2);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.sink.count(), 2);
        assert_eq!(fx.adapter.state(), AdapterState::Idle);

        fx.adapter.request(1).unwrap();
        fx.wait_for(3);
        assert_eq!(fx.shutdown(), vec![0, 1, 2]);
    }

    #[test]
    fn saturated_sink_pauses_delivery() {
        let fx = Fixture::new(8, 2);
        for seq in 0..5 {
            fx.deposit(seq);
        }
        fx.adapter.request(5).unwrap();
        fx.wait_for(2);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.sink.count(), 2);
        assert_eq!(fx.adapter.state(), AdapterState::Paused);
        assert_eq!(fx.ring.lock().pending_count(), 3);

        // resume: queued frames come out first, in original order
        fx.sink.accept_limit.store(u64::MAX, Ordering::SeqCst);
        fx.adapter.request(10).unwrap();
        fx.wait_for(5);
        assert_eq!(fx.shutdown(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn error_is_delivered_once_then_ends() {
        struct EventSink {
            errors: Mutex<Vec<CaptureError>>,
            ends: AtomicU64,
        }
        impl FrameSink for EventSink {
            fn accept(&self, _frame: AudioFrame) -> bool {
                true
            }
            fn on_error(&self, error: &CaptureError) {
                self.errors.lock().push(error.clone());
            }
            fn on_end(&self) {
                self.ends.fetch_add(1, Ordering::SeqCst);
            }
        }

        let ring = Arc::new(Mutex::new(FrameRing::new(4)));
        let sink = Arc::new(EventSink {
            errors: Mutex::new(Vec::new()),
            ends: AtomicU64::new(0),
        });
        let gate = Arc::new(AtomicBool::new(true));
        let adapter = Arc::new(StreamAdapter::new(
            Arc::clone(&ring),
            sink.clone() as Arc<dyn FrameSink>,
            Arc::clone(&gate),
            false,
        ));
        let runner = Arc::clone(&adapter);
        let handle = thread::spawn(move || runner.run());

        adapter.raise_error(CaptureError::DeviceLost("unplugged".into()));
        adapter.raise_error(CaptureError::DeviceLost("again".into()));
        handle.join().unwrap();

        assert_eq!(
            sink.errors.lock().as_slice(),
            &[CaptureError::DeviceLost("unplugged".into())]
        );
        assert_eq!(sink.ends.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.state(), AdapterState::Ended);
        assert!(!gate.load(Ordering::SeqCst));
        assert!(matches!(
            adapter.request(1),
            Err(CaptureError::InvalidState { .. })
        ));
    }

    #[test]
    fn finish_runs_final_drain_then_refuses_pulls() {
        let fx = Fixture::new(8, u64::MAX);
        for seq in 0..3 {
            fx.deposit(seq);
        }
        // never pulled: close still delivers what was captured
        let adapter = Arc::clone(&fx.adapter);
        let seqs = fx.shutdown();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(matches!(
            adapter.request(1),
            Err(CaptureError::InvalidState { .. })
        ));
    }
}
