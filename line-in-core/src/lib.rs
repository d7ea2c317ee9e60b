//! # line-in-core
//!
//! Platform-agnostic core of a line-in style capture stream: turns a
//! device backend's callback-driven buffers into a pull-driven,
//! backpressure-aware stream of fixed-size PCM frames.
//!
//! Device backends implement the [`FrameSource`] trait and plug into the
//! generic [`CaptureSession`]; consumers receive frames through a
//! [`FrameSink`] they control, or read raw bytes off a blocking
//! [`FrameReader`].
//!
//! ## Architecture
//!
//! ```text
//! line-in-core (this crate)
//! ├── traits/       ← FrameSource, FrameSink
//! ├── models/       ← CaptureConfig, CaptureError, SessionState, AudioFrame, DeviceInfo
//! ├── processing/   ← FrameRing, FrameChunker, PCM sample conversion
//! ├── stream/       ← StreamAdapter (pull state machine), FrameReader
//! └── session/      ← CaptureSession (lifecycle controller)
//! ```
//!
//! Data flow:
//!
//! ```text
//! [device callback] → chunker → FrameRing ─(drain thread)→ StreamAdapter → FrameSink
//! ```
//!
//! The device callback never blocks on consumer logic; a slow consumer
//! costs evicted frames (counted as overruns), never audio-thread stalls.

pub mod models;
pub mod processing;
pub mod session;
pub mod stream;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::CaptureConfig;
pub use models::device::{CaptureDiagnostics, DeviceInfo};
pub use models::error::CaptureError;
pub use models::frame::{AudioFrame, FrameFormat};
pub use models::state::SessionState;
pub use processing::chunker::FrameChunker;
pub use processing::frame_ring::FrameRing;
pub use session::capture::CaptureSession;
pub use stream::adapter::{AdapterState, StreamAdapter};
pub use stream::reader::FrameReader;
pub use traits::frame_sink::FrameSink;
pub use traits::frame_source::FrameSource;
