//! cpal input-device capture source.
//!
//! Opens an input device (system default or by name), negotiates a
//! capturable sample format, and delivers fixed-size PCM frames to a
//! [`FrameSink`] from the OS audio callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use line_in_core::processing::pcm;
use line_in_core::{
    CaptureConfig, CaptureError, DeviceInfo, FrameChunker, FrameFormat, FrameSink, FrameSource,
};

/// Capture source backed by a cpal input device.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated capture
/// thread for its whole life; `stop` joins that thread, which is what makes
/// the blocking-stop contract hold — once `stop` returns, the stream has
/// been dropped and no data callback can fire.
pub struct CpalSource {
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    sample_format: SampleFormat,
    format: FrameFormat,
    frame_bytes: usize,
    info: DeviceInfo,
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<()>>,
}

impl CpalSource {
    /// Claim an input device for `config`.
    ///
    /// Returns `DeviceUnavailable` when no matching device exists or the
    /// device cannot be queried (typically: claimed exclusively elsewhere),
    /// and `UnsupportedFormat` when the device cannot satisfy the requested
    /// rate/channel combination with a capturable sample format.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidConfig)?;

        let host = cpal::default_host();
        let (device, is_default) = match config.device_id {
            Some(ref id) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|_| CaptureError::DeviceUnavailable)?;
                let device = devices
                    .find(|d| d.name().map(|name| &name == id).unwrap_or(false))
                    .ok_or(CaptureError::DeviceUnavailable)?;
                (device, false)
            }
            None => (
                host.default_input_device()
                    .ok_or(CaptureError::DeviceUnavailable)?,
                true,
            ),
        };
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown input".to_string());

        let sample_format = negotiate_sample_format(&device, config, &name)?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        log::debug!(
            "claimed input device '{}' ({:?} samples at {} Hz, {} ch)",
            name,
            sample_format,
            config.sample_rate,
            config.channels,
        );

        Ok(Self {
            device,
            stream_config,
            sample_format,
            format: config.format(),
            frame_bytes: config.frame_bytes,
            info: DeviceInfo {
                // cpal exposes no stable ID separate from the name
                id: name.clone(),
                name,
                is_default,
            },
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: None,
        })
    }
}

impl FrameSource for CpalSource {
    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::InvalidState {
                operation: "start",
                state: "capturing",
            });
        }

        let running = Arc::clone(&self.running);
        let device = self.device.clone();
        let stream_config = self.stream_config.clone();
        let sample_format = self.sample_format;
        let bit_depth = self.format.bit_depth;
        let frame_bytes = self.frame_bytes;

        // The stream must be built and dropped on the thread that owns it;
        // startup errors come back over a one-shot handshake.
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("line-in-capture".into())
            .spawn(move || {
                let stream = match build_stream(
                    &device,
                    &stream_config,
                    sample_format,
                    bit_depth,
                    frame_bytes,
                    sink,
                ) {
                    Ok(stream) => stream,
                    Err(error) => {
                        let _ = ready_tx.send(Err(error));
                        return;
                    }
                };

                if let Err(error) = stream.play() {
                    let _ = ready_tx.send(Err(map_play_error(error)));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::SeqCst) {
                    thread::park_timeout(Duration::from_millis(50));
                }
                // dropping the stream stops the data callbacks
                drop(stream);
            })
            .map_err(|e| {
                CaptureError::Backend(format!("failed to spawn capture thread: {}", e))
            })?;
        self.capture_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                self.abort_capture_thread();
                Err(error)
            }
            Err(_) => {
                self.abort_capture_thread();
                Err(CaptureError::Backend(
                    "capture thread exited during startup".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.abort_capture_thread();
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn format(&self) -> FrameFormat {
        self.format
    }
}

impl CpalSource {
    fn abort_capture_thread(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.abort_capture_thread();
    }
}

/// Pick a capturable sample format for the requested rate and channels,
/// preferring Float32 (the shared-mode native format on the major hosts).
fn negotiate_sample_format(
    device: &cpal::Device,
    config: &CaptureConfig,
    name: &str,
) -> Result<SampleFormat, CaptureError> {
    let requested_rate = cpal::SampleRate(config.sample_rate);
    let supported = device.supported_input_configs().map_err(|e| match e {
        cpal::SupportedStreamConfigsError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        other => CaptureError::Backend(other.to_string()),
    })?;

    let mut fallback = None;
    for range in supported {
        if range.channels() != config.channels
            || range.min_sample_rate() > requested_rate
            || range.max_sample_rate() < requested_rate
        {
            continue;
        }
        match range.sample_format() {
            SampleFormat::F32 => return Ok(SampleFormat::F32),
            SampleFormat::I16 => fallback = Some(SampleFormat::I16),
            _ => {}
        }
    }

    fallback.ok_or_else(|| {
        CaptureError::UnsupportedFormat(format!(
            "'{}' cannot capture {} Hz / {} ch",
            name, config.sample_rate, config.channels
        ))
    })
}

/// Build the input stream. The data callback runs on the OS audio thread:
/// convert samples, cut frames, hand them to the sink — nothing else.
fn build_stream(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    bit_depth: u16,
    frame_bytes: usize,
    sink: Arc<dyn FrameSink>,
) -> Result<cpal::Stream, CaptureError> {
    let error_sink = Arc::clone(&sink);
    let on_stream_error = move |error: cpal::StreamError| {
        error_sink.on_error(&map_stream_error(error));
    };

    let mut chunker = FrameChunker::new(frame_bytes);
    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for frame in chunker.push(&pcm::f32_to_pcm(data, bit_depth)) {
                    sink.accept(frame);
                }
            },
            on_stream_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                for frame in chunker.push(&pcm::i16_to_pcm(data, bit_depth)) {
                    sink.accept(frame);
                }
            },
            on_stream_error,
            None,
        ),
        other => {
            return Err(CaptureError::UnsupportedFormat(format!(
                "sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(map_build_error)
}

fn map_stream_error(error: cpal::StreamError) -> CaptureError {
    match error {
        cpal::StreamError::DeviceNotAvailable => {
            CaptureError::DeviceLost("device no longer available".into())
        }
        cpal::StreamError::BackendSpecific { err } => CaptureError::DeviceLost(err.description),
    }
}

fn map_build_error(error: cpal::BuildStreamError) -> CaptureError {
    match error {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        cpal::BuildStreamError::StreamConfigNotSupported => {
            CaptureError::UnsupportedFormat("stream configuration rejected by device".into())
        }
        other => CaptureError::Backend(other.to_string()),
    }
}

fn map_play_error(error: cpal::PlayStreamError) -> CaptureError {
    match error {
        cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        cpal::PlayStreamError::BackendSpecific { err } => CaptureError::Backend(err.description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_errors_map_to_device_lost() {
        assert_eq!(
            map_stream_error(cpal::StreamError::DeviceNotAvailable),
            CaptureError::DeviceLost("device no longer available".into())
        );
    }

    #[test]
    fn build_errors_distinguish_absence_from_format() {
        assert_eq!(
            map_build_error(cpal::BuildStreamError::DeviceNotAvailable),
            CaptureError::DeviceUnavailable
        );
        assert!(matches!(
            map_build_error(cpal::BuildStreamError::StreamConfigNotSupported),
            CaptureError::UnsupportedFormat(_)
        ));
        assert!(matches!(
            map_build_error(cpal::BuildStreamError::InvalidArgument),
            CaptureError::Backend(_)
        ));
    }

    #[test]
    fn play_errors_surface_at_open_time() {
        assert_eq!(
            map_play_error(cpal::PlayStreamError::DeviceNotAvailable),
            CaptureError::DeviceUnavailable
        );
    }

    /// Needs an actual input device; run with `cargo test -- --ignored`
    /// on a machine with one.
    #[test]
    #[ignore]
    fn opens_default_device() {
        let source = CpalSource::open(&CaptureConfig::default()).unwrap();
        let info = source.device_info();
        assert!(info.is_default);
        assert!(!info.name.is_empty());
    }
}
