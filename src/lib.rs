//! Motion Filter Library
//!
//! Highlights motion in a live video stream. Each frame is converted to
//! intensities, differenced against the previous frame, and smoothed with
//! an exponential (IIR) filter, producing an image that is bright where
//! the scene changed recently and fades to black where it is still.
//!
//! # Architecture
//!
//! ```text
//! capture → convert → store.current → kernel (N lanes) → convert → output
//!                           ↑               │
//!                           └── previous, filter_state ──┘
//! ```
//!
//! The kernel deals the frame out to a fixed set of lanes in interleaved
//! vector groups. Each lane runs a software-pipelined loop that fetches the
//! next group while computing the current one. The first frame of a session
//! runs the cold-start variant, which seeds the filter state; every later
//! frame runs the steady-state variant.
//!
//! # Example
//!
//! ```no_run
//! use motion_filter::{
//!     capture::MockCamera,
//!     config::FileConfig,
//!     driver::FrameDriver,
//! };
//!
//! let config = FileConfig::default();
//! let mut driver = FrameDriver::new(MockCamera::new(), &config).unwrap();
//!
//! let report = driver.run().unwrap();
//! println!("wrote {} frames", report.written);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod convert;
pub mod driver;
pub mod kernel;
pub mod metrics;
pub mod output;
pub mod store;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, Frame, MockCamera};
pub use config::{FileConfig, KernelConfig, OutputConfig};
pub use driver::{DriverError, FrameDriver, FrameReport, RunReport};
pub use kernel::{FrameKernel, LaunchStats, Variant};
pub use output::PpmWriter;
pub use store::FrameStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
