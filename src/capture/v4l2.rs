//! V4L2 camera backed by a memory-mapped buffer queue.
//!
//! The device is asked for packed 24-bit RGB (`RGB3`) at the configured
//! resolution. `buffer_count` buffers are mapped and queued; each capture
//! waits for the next filled buffer, copies it out, and the stream
//! re-queues it on the following dequeue.

use super::{Camera, CameraError, CaptureConfig, Frame};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::format::FieldOrder;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// Packed RGB24, the only capture format this camera negotiates.
const RGB24: &[u8; 4] = b"RGB3";

/// Camera reading from a V4L2 capture device.
pub struct V4l2Camera {
    stream: Option<Stream<'static>>,
    config: Option<CaptureConfig>,
    sequence: u64,
}

impl V4l2Camera {
    /// Creates an unopened camera.
    pub fn new() -> Self {
        Self {
            stream: None,
            config: None,
            sequence: 0,
        }
    }

    fn open_device(id: &str) -> Result<Device, CameraError> {
        let result = match id.parse::<usize>() {
            Ok(index) => Device::new(index),
            Err(_) => Device::with_path(id),
        };
        result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CameraError::DeviceNotFound(id.to_string()),
            _ => CameraError::OpenFailed(format!("{id}: {e}")),
        })
    }
}

impl Default for V4l2Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for V4l2Camera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let dev = Self::open_device(&config.device)?;
        let fourcc = FourCC::new(RGB24);

        let mut format = dev
            .format()
            .map_err(|e| CameraError::ConfigFailed(format!("query format: {e}")))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = fourcc;
        format.field_order = FieldOrder::Interlaced;

        let format = dev
            .set_format(&format)
            .map_err(|e| CameraError::FormatRejected(e.to_string()))?;

        if format.fourcc != fourcc {
            return Err(CameraError::FormatRejected(format!(
                "driver offered {} instead of RGB3",
                format.fourcc
            )));
        }
        if format.width != config.width || format.height != config.height {
            warn!(
                requested_width = config.width,
                requested_height = config.height,
                width = format.width,
                height = format.height,
                "Driver is sending a different resolution"
            );
            return Err(CameraError::FormatRejected(format!(
                "driver is sending {}x{}, session is fixed at {}x{}",
                format.width, format.height, config.width, config.height
            )));
        }

        let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, config.buffer_count)
            .map_err(|e| CameraError::BufferMapFailed(e.to_string()))?;
        stream.set_timeout(config.timeout());

        info!(
            device = %config.device,
            width = format.width,
            height = format.height,
            buffers = config.buffer_count,
            "V4L2 capture stream started"
        );

        self.stream = Some(stream);
        self.config = Some(config.clone());
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;
        let stream = self.stream.as_mut().ok_or(CameraError::NotInitialized)?;

        let (buf, meta) = stream.next().map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                CameraError::Timeout(config.timeout())
            }
            _ => CameraError::CaptureFailed(e.to_string()),
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        debug!(
            sequence = meta.sequence,
            bytes = used,
            "Dequeued capture buffer"
        );

        self.sequence += 1;
        Ok(Frame::new(
            buf[..used].to_vec(),
            config.width,
            config.height,
            self.sequence,
        ))
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        // Dropping the stream turns streaming off and unmaps the buffers
        self.stream = None;
        self.config = None;
        info!("V4L2 camera closed");
    }
}
