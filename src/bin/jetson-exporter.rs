//! jetson-exporter - Prometheus exporter for NVIDIA Jetson boards.
//!
//! Starts `tegrastats` writing to a log file, waits for the first samples,
//! then serves `/metrics` until interrupted. The log is truncated on a
//! fixed cadence and tegrastats is stopped on exit.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use jetson_exporter::collector::{CommandRunner, FileSystem};
use jetson_exporter::config::ExporterConfig;
use jetson_exporter::exporter::{JetsonExporter, LaunchError, background, server};

/// Prometheus exporter for NVIDIA Jetson tegrastats telemetry.
#[derive(Parser)]
#[command(
    name = "jetson-exporter",
    about = "Prometheus exporter for NVIDIA Jetson tegrastats telemetry",
    version = jetson_exporter::VERSION
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0", env = "JETSON_EXPORTER_BIND")]
    bind: IpAddr,

    /// Port on which metrics are served.
    #[arg(short, long, default_value = "8000", env = "JETSON_EXPORTER_PORT")]
    port: u16,

    /// Sampling interval of tegrastats, in seconds.
    #[arg(short, long, default_value = "1", env = "JETSON_EXPORTER_INTERVAL")]
    interval: u64,

    /// File tegrastats writes its samples to.
    #[arg(long, default_value = "./stats.log", env = "JETSON_EXPORTER_LOGFILE")]
    logfile: PathBuf,

    /// How often the tegrastats log is truncated, in minutes.
    #[arg(
        long,
        default_value = "60",
        env = "JETSON_EXPORTER_CLEANUP_INTERVAL_MINUTES"
    )]
    cleanup_interval_minutes: u64,

    /// Path to the tegrastats binary. Probes the usual locations if unset.
    #[arg(long, value_name = "PATH", env = "JETSON_EXPORTER_TEGRASTATS")]
    tegrastats: Option<PathBuf>,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem.
    #[arg(long, default_value = "/sys")]
    sys_path: PathBuf,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> ExporterConfig {
        ExporterConfig {
            listen: SocketAddr::new(self.bind, self.port),
            interval: Duration::from_secs(self.interval),
            logfile: self.logfile.clone(),
            cleanup_interval: Duration::from_secs(
                self.cleanup_interval_minutes.saturating_mul(60),
            ),
            tegrastats_path: self.tegrastats.clone(),
            proc_path: self.proc_path.clone(),
            sys_path: self.sys_path.clone(),
        }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("jetson_exporter={level}").parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(target_os = "linux")]
fn launch(
    config: &ExporterConfig,
) -> Result<
    JetsonExporter<jetson_exporter::collector::RealFs, jetson_exporter::collector::SystemRunner>,
    LaunchError,
> {
    use jetson_exporter::collector::{RealFs, SystemRunner};
    JetsonExporter::launch(RealFs::new(), SystemRunner::new(), config)
}

/// Off Linux there is no tegrastats; serve a simulated Jetson Nano instead.
#[cfg(not(target_os = "linux"))]
fn launch(
    config: &ExporterConfig,
) -> Result<
    JetsonExporter<jetson_exporter::collector::MockFs, jetson_exporter::collector::MockRunner>,
    LaunchError,
> {
    use jetson_exporter::collector::mock::{MockFs, MockRunner, SCENARIO_LOG};
    warn!("not running on Linux, serving simulated Jetson Nano data");
    let config = ExporterConfig {
        logfile: SCENARIO_LOG.into(),
        tegrastats_path: None,
        proc_path: "/proc".to_string(),
        sys_path: "/sys".into(),
        ..config.clone()
    };
    JetsonExporter::launch(MockFs::jetson_nano(), MockRunner::new(), &config)
}

async fn run<F, R>(exporter: Arc<JetsonExporter<F, R>>, config: ExporterConfig) -> ExitCode
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let s = shutdown.clone();
    // SIGINT, SIGTERM and SIGHUP all end up here
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        s.notify_one();
    }) {
        warn!(error = %e, "failed to set signal handler");
    }

    let warmup = config.warmup();
    info!(
        warmup_ms = warmup.as_millis() as u64,
        "waiting for first tegrastats samples"
    );
    tokio::select! {
        _ = tokio::time::sleep(warmup) => {}
        _ = shutdown.notified() => return ExitCode::SUCCESS,
    }

    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.listen, "listening");

    let cleanup = tokio::spawn(background::cleanup_loop(
        exporter.clone(),
        config.cleanup_interval,
    ));
    let result = server::serve(listener, exporter, async move {
        shutdown.notified().await;
    })
    .await;
    cleanup.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = args.to_config();
    info!(
        version = jetson_exporter::VERSION,
        listen = %config.listen,
        interval_s = args.interval,
        logfile = %config.logfile.display(),
        cleanup_interval_min = args.cleanup_interval_minutes,
        "jetson-exporter starting"
    );

    let exporter = match launch(&config) {
        Ok(exporter) => Arc::new(exporter),
        Err(e) => {
            error!(error = %e, "failed to start exporter");
            return match e {
                LaunchError::Config(_) => ExitCode::from(2),
                LaunchError::Source(_) => ExitCode::FAILURE,
            };
        }
    };

    let code = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run(exporter.clone(), config)),
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            ExitCode::FAILURE
        }
    };

    info!("shutting down");
    exporter.shutdown();
    code
}
