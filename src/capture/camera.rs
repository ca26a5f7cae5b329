//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during camera operations.
///
/// Every variant is fatal for the session.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("device rejected capture format: {0}")]
    FormatRejected(String),
    #[error("failed to map capture buffers: {0}")]
    BufferMapFailed(String),
    #[error("timed out after {0:?} waiting for a frame")]
    Timeout(Duration),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// `capture` blocks until the next filled buffer is available (or the
/// configured timeout expires), copies it out, and returns the buffer to
/// the device queue.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single RGB24 frame.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        (**self).open(config)
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        (**self).capture()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Mock camera that generates synthetic frames.
///
/// By default it renders a bright square sliding across a horizontal
/// gradient, so consecutive frames differ only where the square moved.
/// It can also replay a fixed script of frames, or time out after a number
/// of frames to exercise fatal paths.
#[derive(Debug, Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    script: Option<VecDeque<Vec<u8>>>,
    fail_after: Option<u64>,
}

impl MockCamera {
    /// Creates a mock camera that renders the moving-square scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock camera that returns `frames` (RGB24 bytes) in order,
    /// then times out.
    pub fn scripted(frames: Vec<Vec<u8>>) -> Self {
        Self {
            script: Some(frames.into()),
            ..Self::default()
        }
    }

    /// Makes every capture after the first `frames` time out.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    fn render(config: &CaptureConfig, sequence: u64) -> Vec<u8> {
        let width = config.width as usize;
        let height = config.height as usize;
        let side = (width.min(height) / 8).max(1);
        let left = (sequence as usize * 4) % width;
        let top = height.saturating_sub(side) / 2;

        let mut data = Vec::with_capacity(config.frame_bytes());
        for y in 0..height {
            for x in 0..width {
                let inside = (left..left + side).contains(&x) && (top..top + side).contains(&y);
                let level = if inside {
                    255
                } else {
                    (x * 160 / width) as u8
                };
                data.extend_from_slice(&[level, level, level]);
            }
        }
        data
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        if self.fail_after.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::Timeout(config.timeout()));
        }

        let data = match self.script.as_mut() {
            Some(script) => script
                .pop_front()
                .ok_or(CameraError::Timeout(config.timeout()))?,
            None => Self::render(config, self.sequence),
        };

        self.sequence += 1;
        Ok(Frame::new(data, config.width, config.height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!("MockCamera closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let mut camera = MockCamera::new();
        let config = CaptureConfig::with_dimensions(64, 32);

        assert!(!camera.is_open());

        camera.open(&config).unwrap();
        assert!(camera.is_open());

        let frame = camera.capture().unwrap();
        assert!(frame.matches(64 * 32));
        assert_eq!(frame.sequence(), 1);

        let frame2 = camera.capture().unwrap();
        assert_eq!(frame2.sequence(), 2);
        assert_ne!(frame.data(), frame2.data());

        camera.close();
        assert!(!camera.is_open());
    }

    #[test]
    fn test_capture_without_open() {
        let mut camera = MockCamera::new();
        assert!(matches!(
            camera.capture(),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_scripted_frames_then_timeout() {
        let mut camera = MockCamera::scripted(vec![vec![1; 12], vec![2; 12]]);
        camera.open(&CaptureConfig::with_dimensions(4, 1)).unwrap();

        assert_eq!(camera.capture().unwrap().data(), &[1; 12]);
        assert_eq!(camera.capture().unwrap().data(), &[2; 12]);
        assert!(matches!(camera.capture(), Err(CameraError::Timeout(_))));
    }

    #[test]
    fn test_failing_after() {
        let mut camera = MockCamera::new().failing_after(1);
        camera.open(&CaptureConfig::with_dimensions(8, 8)).unwrap();

        assert!(camera.capture().is_ok());
        assert!(matches!(camera.capture(), Err(CameraError::Timeout(_))));
    }

    #[test]
    fn test_boxed_camera() {
        let mut camera: Box<dyn Camera> = Box::new(MockCamera::new());
        camera.open(&CaptureConfig::with_dimensions(8, 8)).unwrap();

        assert!(camera.is_open());
        assert!(camera.capture().unwrap().matches(64));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut camera = MockCamera::new();
        let config = CaptureConfig::with_dimensions(0, 8);
        assert!(matches!(
            camera.open(&config),
            Err(CameraError::ConfigFailed(_))
        ));
    }
}
