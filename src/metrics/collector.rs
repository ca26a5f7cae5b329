//! Metrics collection and registry.

use prometheus::{Counter, Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::driver::RunReport;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of session state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames processed since the session started.
    pub frames_processed: u64,
    /// Kernel time of the most recent frame, in seconds.
    pub last_kernel_seconds: Option<f64>,
    /// Kernel time summed over all frames, in seconds.
    pub total_kernel_seconds: f64,
    /// Mean intensity of the most recent output image.
    pub mean_output_intensity: Option<f64>,
    /// Pixels with non-zero output in the most recent image.
    pub active_pixels: u64,
    /// Lanes the kernel runs on.
    pub lanes: usize,
}

/// Prometheus metrics registry for the motion filter.
pub struct MetricsRegistry {
    registry: Registry,

    // Frame metrics
    frames_processed: IntCounter,
    mean_output_intensity: Gauge,
    active_pixels: IntGauge,

    // Kernel metrics
    kernel_seconds: Gauge,
    kernel_seconds_total: Counter,
    lanes: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all motion filter metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_processed = IntCounter::new(
            "motion_filter_frames_processed_total",
            "Total number of frames processed by the kernel",
        )?;
        let mean_output_intensity = Gauge::new(
            "motion_filter_mean_output_intensity",
            "Mean intensity of the most recent output image",
        )?;
        let active_pixels = IntGauge::new(
            "motion_filter_active_pixels",
            "Pixels with non-zero motion in the most recent output image",
        )?;
        let kernel_seconds = Gauge::new(
            "motion_filter_kernel_seconds",
            "Kernel time spent on the most recent frame",
        )?;
        let kernel_seconds_total = Counter::new(
            "motion_filter_kernel_seconds_total",
            "Kernel time summed over all frames",
        )?;
        let lanes = IntGauge::new("motion_filter_lanes", "Parallel kernel lanes")?;

        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(mean_output_intensity.clone()))?;
        registry.register(Box::new(active_pixels.clone()))?;
        registry.register(Box::new(kernel_seconds.clone()))?;
        registry.register(Box::new(kernel_seconds_total.clone()))?;
        registry.register(Box::new(lanes.clone()))?;

        Ok(Self {
            registry,
            frames_processed,
            mean_output_intensity,
            active_pixels,
            kernel_seconds,
            kernel_seconds_total,
            lanes,
        })
    }

    /// Updates all metrics from a snapshot of session state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // For counters, we need to increment by the difference
        let current_frames = self.frames_processed.get();
        if snapshot.frames_processed > current_frames {
            self.frames_processed
                .inc_by(snapshot.frames_processed - current_frames);
        }

        let current_seconds = self.kernel_seconds_total.get();
        if snapshot.total_kernel_seconds > current_seconds {
            self.kernel_seconds_total
                .inc_by(snapshot.total_kernel_seconds - current_seconds);
        }

        if let Some(seconds) = snapshot.last_kernel_seconds {
            self.kernel_seconds.set(seconds);
        }
        if let Some(mean) = snapshot.mean_output_intensity {
            self.mean_output_intensity.set(mean);
        }
        self.active_pixels.set(snapshot.active_pixels as i64);
        self.lanes.set(snapshot.lanes as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from a driver's progress so far.
    pub fn from_report(report: &RunReport, lanes: usize) -> Self {
        let last = report.last.as_ref();
        Self {
            frames_processed: report.frames,
            last_kernel_seconds: last.map(|f| f.kernel_time.as_secs_f64()),
            total_kernel_seconds: report.kernel_time.as_secs_f64(),
            mean_output_intensity: last.map(|f| f.mean_output),
            active_pixels: last.map_or(0, |f| f.active_pixels as u64),
            lanes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            frames_processed: 5,
            last_kernel_seconds: Some(0.25),
            total_kernel_seconds: 1.5,
            mean_output_intensity: Some(12.5),
            active_pixels: 300,
            lanes: 2,
        };

        registry.update(&snapshot);
        // Counters only move forward
        registry.update(&MetricsSnapshot {
            frames_processed: 3,
            ..snapshot.clone()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("motion_filter_frames_processed_total 5"));
        assert!(output.contains("motion_filter_kernel_seconds_total 1.5"));
        assert!(output.contains("motion_filter_active_pixels 300"));
        assert!(output.contains("motion_filter_lanes 2"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("motion_filter_frames_processed_total"));
        assert!(output.contains("motion_filter_kernel_seconds"));
    }
}
