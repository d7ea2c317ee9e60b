//! # line-in-cpal
//!
//! cpal backend for line-in: exposes an audio input device as a readable
//! stream of raw PCM frames.
//!
//! Provides:
//! - [`LineIn`] — the entry point; opens a device and returns a capturing
//!   stream that implements `std::io::Read`
//! - [`CpalSource`] — the [`FrameSource`] implementation, usable directly
//!   with `line_in_core::CaptureSession` for custom wiring
//!
//! ## Usage
//! ```ignore
//! use std::io::Read;
//! use line_in_cpal::{CaptureConfig, LineIn};
//!
//! // default device, 44100 Hz, stereo, 16-bit PCM
//! let mut stream = LineIn::open(CaptureConfig::default())?;
//!
//! let mut pcm = [0u8; 8192];
//! let n = stream.read(&mut pcm)?;
//! // ... feed `pcm[..n]` to an encoder, a socket, a meter ...
//!
//! stream.close()?;
//! ```
//!
//! Consumers that want frame-level delivery instead of bytes implement
//! [`FrameSink`] and use [`LineIn::open_with_sink`]; the sink's `accept`
//! return value is the backpressure signal.

pub mod device;

use std::io::{self, Read};
use std::sync::Arc;

use line_in_core::{CaptureSession, FrameReader};

pub use device::CpalSource;
pub use line_in_core::{
    AdapterState, CaptureConfig, CaptureDiagnostics, CaptureError, DeviceInfo, FrameFormat,
    FrameSink, FrameSource, SessionState,
};

/// A capturing audio input stream.
///
/// Opening claims the device, starts capture, and returns a handle that is
/// both the lifecycle controller and (unless wired to a custom sink) a
/// blocking `std::io::Read` over the captured PCM bytes. Dropping the
/// handle closes the stream.
pub struct LineIn {
    session: CaptureSession<CpalSource>,
    reader: Option<FrameReader>,
}

impl LineIn {
    /// Open the configured input device and start capturing, delivering
    /// bytes through this handle's `Read` implementation.
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        let source = CpalSource::open(&config)?;
        let (mut session, reader) = CaptureSession::open_reader(source, config)?;
        session.start()?;
        Ok(Self {
            session,
            reader: Some(reader),
        })
    }

    /// Open the configured input device and start capturing, delivering
    /// frames to `sink`. Pulls are issued with [`request`](Self::request).
    pub fn open_with_sink(
        config: CaptureConfig,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self, CaptureError> {
        let source = CpalSource::open(&config)?;
        let mut session = CaptureSession::open(source, config, sink)?;
        session.start()?;
        Ok(Self {
            session,
            reader: None,
        })
    }

    /// Pull: deliver up to `max_frames` captured frames to the sink.
    pub fn request(&self, max_frames: usize) -> Result<(), CaptureError> {
        self.session.request(max_frames)
    }

    /// Stop capturing and release the device. Safe at any time, idempotent;
    /// queued frames are delivered in a final drain unless the config says
    /// to discard them.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        self.session.close()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stream_state(&self) -> AdapterState {
        self.session.stream_state()
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.session.device_info()
    }

    pub fn format(&self) -> FrameFormat {
        self.session.format()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.session.diagnostics()
    }
}

impl Read for LineIn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream was opened with a custom sink; read through the sink instead",
            )),
        }
    }
}
