//! Frame driver loop.
//!
//! One iteration acquires a frame, converts it into the store's `current`
//! buffer, runs the kernel (cold-start on the first frame of the session,
//! steady-state afterwards), expands the result to grey RGB and writes it
//! out. The kernel joins every lane before the next frame is acquired.
//!
//! Acquisition and output failures end the run immediately; frames already
//! written stay on disk.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::{Camera, CameraError};
use crate::config::{ConfigError, FileConfig};
use crate::convert;
use crate::kernel::{FrameKernel, KernelError, Variant};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::output::{OutputError, PpmWriter};
use crate::store::FrameStore;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("kernel setup failed: {0}")]
    Kernel(#[from] KernelError),
    #[error("output error: {0}")]
    Output(#[from] OutputError),
    #[error("frame {sequence} has {actual} bytes, expected {expected}")]
    Geometry {
        sequence: u64,
        expected: usize,
        actual: usize,
    },
}

/// Outcome of one processed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Zero-based frame index within the session.
    pub index: u64,
    /// Kernel variant that ran.
    pub variant: Variant,
    /// Wall time spent in the kernel.
    pub kernel_time: Duration,
    /// Mean output intensity.
    pub mean_output: f64,
    /// Pixels with non-zero output.
    pub active_pixels: usize,
    /// File the output was written to.
    pub path: PathBuf,
}

/// Summary of a run so far.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Frames processed.
    pub frames: u64,
    /// Kernel time summed over all frames.
    pub kernel_time: Duration,
    /// Files written.
    pub written: u64,
    /// The most recent frame.
    pub last: Option<FrameReport>,
    /// True if the stop flag ended the run before its frame budget.
    pub stopped: bool,
}

/// Drives capture, kernel and output for one session.
pub struct FrameDriver<C: Camera> {
    camera: C,
    kernel: FrameKernel,
    store: FrameStore,
    writer: PpmWriter,
    frame_bytes: usize,
    frame_count: u32,
    continuous: bool,
    stop: Arc<AtomicBool>,
    metrics: Option<Arc<MetricsRegistry>>,
    report: RunReport,
    rgb: Vec<u8>,
}

impl<C: Camera> FrameDriver<C> {
    /// Validates `config`, opens the camera and allocates the session buffers.
    pub fn new(mut camera: C, config: &FileConfig) -> Result<Self, DriverError> {
        config.validate()?;

        let kernel = FrameKernel::new(&config.kernel)?;
        let writer = PpmWriter::new(
            &config.output.directory,
            config.output.prefix.clone(),
            config.capture.width,
            config.capture.height,
        )?;
        camera.open(&config.capture)?;

        info!(
            width = config.capture.width,
            height = config.capture.height,
            lanes = config.kernel.lanes,
            vector_width = config.kernel.vector_width,
            shift = config.kernel.smoothing_shift,
            "Session started"
        );

        Ok(Self {
            camera,
            kernel,
            store: FrameStore::new(config.capture.width, config.capture.height),
            writer,
            frame_bytes: config.capture.frame_bytes(),
            frame_count: config.output.frame_count,
            continuous: config.output.continuous,
            stop: Arc::new(AtomicBool::new(false)),
            metrics: None,
            report: RunReport::default(),
            rgb: vec![0; config.capture.frame_bytes()],
        })
    }

    /// Publishes per-frame progress to `registry`.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Flag that ends the run after the frame in progress when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The session buffers.
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Progress so far.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Processes one frame.
    pub fn step(&mut self) -> Result<FrameReport, DriverError> {
        let frame = self.camera.capture()?;
        if !frame.matches(self.store.pixel_count()) {
            return Err(DriverError::Geometry {
                sequence: frame.sequence(),
                expected: self.frame_bytes,
                actual: frame.data().len(),
            });
        }

        convert::rgb24_to_intensity(frame.data(), self.store.current_mut());

        let index = self.store.invocations();
        let started = Instant::now();
        let stats = self.kernel.process(&mut self.store);
        let kernel_time = started.elapsed();

        debug!(
            frame = index,
            variant = %stats.variant,
            groups = stats.total_groups(),
            seconds = kernel_time.as_secs_f64(),
            "Kernel finished"
        );

        let output = self.store.current();
        convert::intensity_to_rgb24(output, &mut self.rgb);
        let path = self.writer.write_frame(&self.rgb)?;

        let report = FrameReport {
            index,
            variant: stats.variant,
            kernel_time,
            mean_output: convert::mean_intensity(output),
            active_pixels: output.iter().filter(|&&v| v != 0).count(),
            path,
        };

        info!(
            frame = index,
            path = %report.path.display(),
            sequence = frame.sequence(),
            "Wrote processed frame"
        );

        self.report.frames += 1;
        self.report.kernel_time += kernel_time;
        self.report.written += 1;
        self.report.last = Some(report.clone());

        if let Some(registry) = &self.metrics {
            registry.update(&MetricsSnapshot::from_report(
                &self.report,
                self.kernel.partitioner().num_lanes(),
            ));
        }

        Ok(report)
    }

    /// Processes frames until the frame budget is spent, the stop flag is
    /// set, or an error occurs.
    pub fn run(&mut self) -> Result<RunReport, DriverError> {
        let budget = u64::from(self.frame_count);

        while self.continuous || self.report.frames < budget {
            if self.stop.load(Ordering::SeqCst) {
                warn!(frames = self.report.frames, "Stop requested, ending run");
                self.report.stopped = true;
                break;
            }
            self.step()?;
        }

        info!(
            frames = self.report.frames,
            kernel_seconds = self.report.kernel_time.as_secs_f64(),
            "Run finished"
        );
        Ok(self.report.clone())
    }

    /// Closes the camera and returns it.
    pub fn finish(mut self) -> C {
        self.camera.close();
        self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, MockCamera};
    use crate::config::{KernelConfig, OutputConfig};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "motion-filter-driver-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn config(
        dir: &std::path::Path,
        width: u32,
        height: u32,
        lanes: usize,
        vector_width: usize,
    ) -> FileConfig {
        FileConfig {
            capture: CaptureConfig::with_dimensions(width, height),
            kernel: KernelConfig {
                lanes,
                vector_width,
                smoothing_shift: 1,
            },
            output: OutputConfig {
                directory: dir.to_path_buf(),
                frame_count: 3,
                ..OutputConfig::default()
            },
        }
    }

    /// RGB24 pixels whose luma is exactly `levels`.
    fn rgb_for(levels: &[u8]) -> Vec<u8> {
        // Pure green: 0.587 * g truncates back to the wanted level for these inputs
        levels
            .iter()
            .flat_map(|&l| {
                let g = (0..=255u8)
                    .find(|&g| convert::luma(0, g, 0) == i32::from(l))
                    .unwrap();
                [0, g, 0]
            })
            .collect()
    }

    #[test]
    fn test_two_frame_scenario() {
        let dir = scratch_dir("scenario");
        let camera = MockCamera::scripted(vec![
            rgb_for(&[10, 10, 10, 10]),
            rgb_for(&[12, 10, 8, 10]),
        ]);
        let mut driver = FrameDriver::new(camera, &config(&dir, 4, 1, 1, 4)).unwrap();

        let first = driver.step().unwrap();
        assert_eq!(first.variant, Variant::ColdStart);
        assert_eq!(driver.store().current(), &[10, 10, 10, 10]);

        let second = driver.step().unwrap();
        assert_eq!(second.variant, Variant::SteadyState);
        assert_eq!(driver.store().current(), &[6, 5, 6, 5]);
        assert_eq!(driver.store().filter_state(), &[6, 5, 6, 5]);
        assert_eq!(driver.store().previous(), &[12, 10, 8, 10]);

        let bytes = std::fs::read(dir.join("img001.ppm")).unwrap();
        let mut expected = b"P6\n4 1 255\n".to_vec();
        expected.extend_from_slice(&[6, 6, 6, 5, 5, 5, 6, 6, 6, 5, 5, 5]);
        assert_eq!(bytes, expected);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_writes_frame_budget() {
        let dir = scratch_dir("budget");
        let mut driver = FrameDriver::new(MockCamera::new(), &config(&dir, 64, 16, 2, 16)).unwrap();

        let report = driver.run().unwrap();
        assert_eq!(report.frames, 3);
        assert!(!report.stopped);
        assert_eq!(report.written, 3);
        for name in ["img000.ppm", "img001.ppm", "img002.ppm"] {
            assert!(dir.join(name).exists());
        }
        let last = report.last.unwrap();
        assert_eq!(last.path, dir.join("img002.ppm"));
        // The square moved, so some pixels show motion
        assert!(last.active_pixels > 0);

        let camera = driver.finish();
        assert!(!camera.is_open());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_acquisition_timeout_is_fatal() {
        let dir = scratch_dir("timeout");
        let camera = MockCamera::new().failing_after(1);
        let mut driver = FrameDriver::new(camera, &config(&dir, 32, 2, 2, 16)).unwrap();

        let err = driver.run().unwrap_err();
        assert!(matches!(err, DriverError::Camera(CameraError::Timeout(_))));

        // The frame processed before the failure stays on disk
        assert_eq!(driver.report().frames, 1);
        assert!(dir.join("img000.ppm").exists());
        assert!(!dir.join("img001.ppm").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wrong_frame_size_is_fatal() {
        let dir = scratch_dir("geometry");
        let camera = MockCamera::scripted(vec![vec![0; 9]]);
        let mut driver = FrameDriver::new(camera, &config(&dir, 4, 1, 1, 4)).unwrap();

        assert!(matches!(
            driver.step(),
            Err(DriverError::Geometry {
                expected: 12,
                actual: 9,
                ..
            })
        ));
        assert!(!dir.join("img000.ppm").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stop_flag_ends_continuous_run() {
        let dir = scratch_dir("stop");
        let mut cfg = config(&dir, 32, 2, 2, 16);
        cfg.output.continuous = true;
        let mut driver = FrameDriver::new(MockCamera::new(), &cfg).unwrap();

        driver.step().unwrap();
        driver.stop_handle().store(true, Ordering::SeqCst);

        let report = driver.run().unwrap();
        assert!(report.stopped);
        assert_eq!(report.frames, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_continuous_run_reports_count_and_last_path() {
        let dir = scratch_dir("continuous");
        let mut cfg = config(&dir, 32, 1, 2, 16);
        cfg.output.continuous = true;
        let frames: Vec<Vec<u8>> = (0..50u8).map(|i| vec![i; 32 * 3]).collect();
        let mut driver = FrameDriver::new(MockCamera::scripted(frames), &cfg).unwrap();

        for _ in 0..50 {
            driver.step().unwrap();
        }

        let report = driver.report();
        assert_eq!(report.frames, 50);
        assert_eq!(report.written, 50);
        assert_eq!(
            report.last.as_ref().map(|r| r.path.clone()),
            Some(dir.join("img049.ppm"))
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_geometry_rejected_before_open() {
        let dir = scratch_dir("stride");
        let camera = MockCamera::new();
        let result = FrameDriver::new(camera, &config(&dir, 10, 1, 2, 16));

        assert!(matches!(
            result,
            Err(DriverError::Config(ConfigError::StrideMismatch { .. }))
        ));
    }

    #[test]
    fn test_metrics_follow_progress() {
        let dir = scratch_dir("metrics");
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut driver = FrameDriver::new(MockCamera::new(), &config(&dir, 32, 2, 2, 16))
            .unwrap()
            .with_metrics(Arc::clone(&registry));

        driver.run().unwrap();

        let output = registry.encode().unwrap();
        assert!(output.contains("motion_filter_frames_processed_total 3"));
        assert!(output.contains("motion_filter_lanes 2"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
