//! Prometheus metrics for the motion filter.
//!
//! # Metrics Exposed
//!
//! - `motion_filter_frames_processed_total` - Frames processed by the kernel
//! - `motion_filter_kernel_seconds` - Kernel time of the most recent frame
//! - `motion_filter_kernel_seconds_total` - Kernel time summed over all frames
//! - `motion_filter_mean_output_intensity` - Mean of the most recent output image
//! - `motion_filter_active_pixels` - Non-zero pixels in the most recent output image
//! - `motion_filter_lanes` - Parallel kernel lanes
//!
//! With the `metrics` feature, [`MetricsServer`] serves them over HTTP at
//! `/metrics`.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
