use std::sync::Arc;

use crate::models::device::DeviceInfo;
use crate::models::error::CaptureError;
use crate::models::frame::FrameFormat;
use crate::traits::frame_sink::FrameSink;

/// A device-side producer of audio frames.
///
/// Implementations own the OS-level device session: opening happens in the
/// backend's constructor, so a constructed source already holds the claimed
/// device. The capture core drives it through this interface only.
pub trait FrameSource: Send {
    /// Start capturing, delivering frames to `sink` from the device's own
    /// callback context. The callback must do minimal work — no I/O, no
    /// unbounded allocation, no lock shared with consumer logic beyond the
    /// sink's bounded sections.
    ///
    /// Fails with `InvalidState` if already started.
    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), CaptureError>;

    /// Stop capturing and release the device. Blocks until in-flight
    /// callback invocations have completed: after this returns, the sink
    /// sees no further `accept` from this source. Idempotent.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// The resolved device backing this source.
    fn device_info(&self) -> DeviceInfo;

    /// The PCM format of the frames this source produces.
    fn format(&self) -> FrameFormat;
}
