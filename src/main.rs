//! Motion Filter CLI
//!
//! Captures frames, runs the motion kernel on each, and writes the results
//! as numbered PPM images.

use clap::Parser;
use motion_filter::{
    capture::{Camera, MockCamera},
    config::FileConfig,
    driver::{DriverError, FrameDriver},
    metrics::MetricsRegistry,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "motion-filter")]
#[command(about = "Highlight motion in a live camera stream")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Capture device path or index
    #[arg(short, long)]
    device: Option<String>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Parallel kernel lanes
    #[arg(short, long)]
    lanes: Option<usize>,

    /// Pixels per vector group
    #[arg(long)]
    vector_width: Option<usize>,

    /// IIR smoothing shift
    #[arg(short = 'k', long)]
    shift: Option<u32>,

    /// Number of frames to process
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// Run until interrupted
    #[arg(long)]
    continuous: bool,

    /// Directory for output images
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use the synthetic camera instead of a capture device
    #[arg(long)]
    mock: bool,

    /// Port for the Prometheus endpoint (0 to disable)
    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Cli {
    fn load_config(&self) -> Result<FileConfig, DriverError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        if let Some(device) = &self.device {
            config.capture.device = device.clone();
        }
        if let Some(width) = self.width {
            config.capture.width = width;
        }
        if let Some(height) = self.height {
            config.capture.height = height;
        }
        if let Some(lanes) = self.lanes {
            config.kernel.lanes = lanes;
        }
        if let Some(vector_width) = self.vector_width {
            config.kernel.vector_width = vector_width;
        }
        if let Some(shift) = self.shift {
            config.kernel.smoothing_shift = shift;
        }
        if let Some(frames) = self.frames {
            config.output.frame_count = frames;
        }
        if self.continuous {
            config.output.continuous = true;
        }
        if let Some(output) = &self.output {
            config.output.directory = output.clone();
        }
        if let Some(port) = self.metrics_port {
            config.output.metrics_port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Motion Filter v{}", motion_filter::VERSION);

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = if cli.mock {
        run(MockCamera::new(), &config)
    } else {
        run_device(&config)
    };

    if let Err(e) = result {
        error!("Session failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "camera")]
fn run_device(config: &FileConfig) -> Result<(), DriverError> {
    run(motion_filter::capture::V4l2Camera::new(), config)
}

#[cfg(not(feature = "camera"))]
fn run_device(config: &FileConfig) -> Result<(), DriverError> {
    warn!("Built without the `camera` feature, using the synthetic camera");
    run(MockCamera::new(), config)
}

fn run<C: Camera>(camera: C, config: &FileConfig) -> Result<(), DriverError> {
    let mut driver = FrameDriver::new(camera, config)?;

    match MetricsRegistry::new() {
        Ok(registry) => {
            let registry = Arc::new(registry);
            serve_metrics(config.output.metrics_port, Arc::clone(&registry));
            driver = driver.with_metrics(registry);
        }
        Err(e) => warn!("Metrics disabled: {}", e),
    }

    let stop = driver.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let report = driver.run()?;
    info!(
        "Processed {} frames in {:.3}s of kernel time{}",
        report.frames,
        report.kernel_time.as_secs_f64(),
        if report.stopped { " (interrupted)" } else { "" }
    );

    driver.finish();
    Ok(())
}

#[cfg(feature = "metrics")]
fn serve_metrics(port: u16, registry: Arc<MetricsRegistry>) {
    use motion_filter::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return;
    }
    // Detached: the server lives as long as the process
    MetricsServer::new(MetricsServerConfig::with_port(port), registry).spawn();
}

#[cfg(not(feature = "metrics"))]
fn serve_metrics(_port: u16, _registry: Arc<MetricsRegistry>) {}
