//! Camera input and frame handling.
//!
//! This module provides abstractions for capturing RGB24 frames from a
//! camera and the capture configuration. With the `camera` feature a V4L2
//! implementation is available; [`MockCamera`] always is.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod v4l2;

pub use camera::{Camera, CameraError, MockCamera};
pub use config::CaptureConfig;
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use v4l2::V4l2Camera;
