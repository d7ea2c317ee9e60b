use crate::models::error::CaptureError;
use crate::models::frame::AudioFrame;

/// Receiving end of a capture stream.
///
/// A sink is wired to its source at construction time; neither side exposes
/// anything beyond these entry points. All methods are called from the
/// delivering thread (the session's drain thread for consumer sinks, the OS
/// audio thread for the session's internal ring sink) — implementations must
/// not block for unbounded time.
pub trait FrameSink: Send + Sync {
    /// Deliver one frame. Returning `false` signals saturation: the caller
    /// stops delivering and the remaining frames stay queued, in order,
    /// until the next pull.
    fn accept(&self, frame: AudioFrame) -> bool;

    /// A fatal capture error. Called at most once per session; the stream
    /// is over and no frame follows, only the end notification.
    fn on_error(&self, _error: &CaptureError) {}

    /// The stream ended. Called at most once — after the final drain on an
    /// explicit close, or immediately after a fatal error.
    fn on_end(&self) {}
}
