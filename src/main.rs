//! HP 3582A Controller - Command Line Entry Point
//!
//! Runs one operation against the analyzer per invocation. All device work
//! happens on the backend thread; this binary only sends commands and waits
//! for the matching reply.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use hp3582_control::{
    backend::{
        list_ports, AcquisitionRequest, AnalyzerBackend, AxisSource, BackendMessage,
        FrontendReceiver, MeasurementMode, MeasurementRequest, SerialTransport,
        SimulatedAnalyzer, Transport,
    },
    config::{self, AppConfig, AppState, ResolutionStrategy},
    session::CsvExporter,
    types::{AcquisitionResult, Channel, InputSelection, InputSource},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest wait for any single backend operation
const REPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// HP 3582A acquisition and auto-ranging controller
#[derive(Parser, Debug)]
#[command(name = "hp3582")]
#[command(about = "Acquisition and auto-ranging controller for the HP 3582A spectrum analyzer")]
#[command(version)]
struct Args {
    /// Config file (defaults to config.toml in the app data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port, overrides the config file
    #[arg(long, global = true)]
    port: Option<String>,

    /// GPIB address when the port is a GPIB-USB controller
    #[arg(long, global = true)]
    gpib: Option<u8>,

    /// Use the built-in simulated analyzer instead of hardware
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,

    /// Return the analyzer to its power-on settings
    Preset,

    /// Read the front-panel indicators
    Panel {
        /// Apply the panel settings from the config file first
        #[arg(long)]
        apply: bool,

        /// Keep polling the overload status for this many seconds
        #[arg(long, default_value = "0")]
        monitor: u64,
    },

    /// Find the most sensitive non-overloading range on both channels
    Autorange,

    /// Preset, configure the sweep and acquire in one go
    Measure {
        /// Sweep mode (1-4)
        #[arg(long, default_value = "1")]
        md: u8,

        /// Adjust frequency in Hz (0-24999, 0 in modes 1 and 2)
        #[arg(long, default_value = "0")]
        ad: u32,

        /// Span index (1-14)
        #[arg(long, default_value = "14")]
        sp: u8,

        /// Sensitivity for both channels (1-10)
        #[arg(long, default_value = "2")]
        sens: u8,

        /// a, b, bode-full, bode-half, both-full or both-half
        #[arg(short, long, default_value = "bode-full")]
        mode: MeasurementMode,

        /// Measure phase instead of amplitude
        #[arg(long)]
        phase: bool,

        /// Output file name inside the export directory
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Acquire one or two sources with the current settings
    Acquire {
        /// Sources, e.g. `a`, `b-phase`, `transfer`
        #[arg(short, long, num_args = 1..=2, required = true)]
        source: Vec<InputSource>,

        /// full or half
        #[arg(short, long)]
        resolution: Option<ResolutionStrategy>,

        /// Read the axis back from the device
        #[arg(long)]
        device_axis: bool,

        /// Output file name inside the export directory
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();

    let mut config = AppConfig::load_or_default(args.config.as_deref());
    let mut app_state = AppState::load_or_default();

    if args.port.is_some() {
        config.link.port = args.port.clone();
    } else if config.link.port.is_none() {
        config.link.port = app_state.last_port.clone();
    }
    if args.gpib.is_some() {
        config.link.gpib_address = args.gpib;
    }

    if let Command::Ports = args.command {
        let ports = list_ports().context("Failed to enumerate serial ports")?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    let transport: Box<dyn Transport> = if args.simulate {
        tracing::info!("Using simulated analyzer");
        Box::new(SimulatedAnalyzer::new().with_signal(Channel::B, 0.025))
    } else {
        Box::new(SerialTransport::open(&config.link).context("Failed to open the analyzer link")?)
    };

    let exporter = CsvExporter::new(config.acquisition.export_dir.clone());
    let (backend, frontend) = AnalyzerBackend::new(config.clone(), transport);
    let backend_handle = std::thread::spawn(move || backend.run());

    let outcome = run_command(&args.command, &config, &frontend, &exporter, &mut app_state);

    frontend.shutdown();
    if backend_handle.join().is_err() {
        tracing::error!("Backend thread panicked");
    }

    if outcome.is_ok() && !args.simulate {
        app_state.last_port = config.link.port.clone();
    }
    if let Err(e) = app_state.save() {
        tracing::warn!("Failed to save app state: {}", e);
    }

    outcome
}

fn run_command(
    command: &Command,
    config: &AppConfig,
    frontend: &FrontendReceiver,
    exporter: &CsvExporter,
    app_state: &mut AppState,
) -> Result<()> {
    match command {
        Command::Ports => Ok(()),
        Command::Preset => {
            frontend.preset();
            wait_for(frontend, |msg| matches!(msg, BackendMessage::PresetComplete).then_some(()))?;
            println!("Analyzer preset");
            Ok(())
        }
        Command::Panel { apply, monitor } => {
            if *apply {
                frontend.apply_panel(config.panel.clone());
                wait_for(frontend, |msg| matches!(msg, BackendMessage::PanelApplied).then_some(()))?;
            }
            frontend.refresh_panel();
            let snapshot = wait_for(frontend, |msg| match msg {
                BackendMessage::Panel(snapshot) => Some(snapshot),
                _ => None,
            })?;
            println!("Display:              {}", snapshot.alphanumerics);
            println!("Transfer sensitivity: {}", snapshot.transfer_sensitivity);
            println!(
                "Overload:             A={} B={}",
                snapshot.overload.a_overload, snapshot.overload.b_overload
            );
            if *monitor > 0 {
                monitor_status(frontend, Duration::from_secs(*monitor));
            }
            Ok(())
        }
        Command::Autorange => {
            frontend.auto_range();
            let outcome = wait_for(frontend, |msg| match msg {
                BackendMessage::RangingComplete(outcome) => Some(outcome),
                _ => None,
            })?;
            println!("Channel A: level {} ({})", outcome.a.value(), outcome.a.label());
            println!("Channel B: level {} ({})", outcome.b.value(), outcome.b.label());
            app_state.last_sensitivity = Some((outcome.a, outcome.b));
            Ok(())
        }
        Command::Measure {
            md,
            ad,
            sp,
            sens,
            mode,
            phase,
            output,
        } => {
            let request = MeasurementRequest {
                sweep_mode: *md,
                adjust_hz: *ad,
                span: *sp,
                sensitivity: *sens,
                mode: *mode,
                phase: *phase,
            };
            // Reject bad arguments before the device is touched
            request.validate()?;
            frontend.measure(request);
            let result = wait_for_acquisition(frontend)?;
            export(exporter, &result, output.as_deref(), app_state)
        }
        Command::Acquire {
            source,
            resolution,
            device_axis,
            output,
        } => {
            let selection = InputSelection::new(source)?;
            let axis = if *device_axis || config.acquisition.axis_from_device {
                AxisSource::Device
            } else {
                AxisSource::Settings(config.panel.sweep())
            };
            let request = AcquisitionRequest::new(selection)
                .with_resolution(resolution.unwrap_or(config.acquisition.resolution))
                .with_axis(axis);
            frontend.acquire(request);
            let result = wait_for_acquisition(frontend)?;
            export(exporter, &result, output.as_deref(), app_state)
        }
    }
}

/// Block until `select` accepts a message, failing on backend errors
fn wait_for<T>(
    frontend: &FrontendReceiver,
    mut select: impl FnMut(BackendMessage) -> Option<T>,
) -> Result<T> {
    loop {
        let msg = frontend
            .recv_timeout(REPLY_TIMEOUT)
            .ok_or_else(|| anyhow!("Timed out waiting for the analyzer"))?;
        match msg {
            BackendMessage::Error { operation, message } => {
                bail!("{} failed: {}", operation, message)
            }
            BackendMessage::Shutdown => bail!("Backend stopped unexpectedly"),
            BackendMessage::Status(status) if status.any() => {
                eprintln!(
                    "warning: input overload (A={}, B={})",
                    status.a_overload, status.b_overload
                );
            }
            other => {
                if let Some(value) = select(other) {
                    return Ok(value);
                }
            }
        }
    }
}

fn wait_for_acquisition(frontend: &FrontendReceiver) -> Result<AcquisitionResult> {
    wait_for(frontend, |msg| match msg {
        BackendMessage::Acquisition(result) => Some(*result),
        _ => None,
    })
}

fn export(
    exporter: &CsvExporter,
    result: &AcquisitionResult,
    name: Option<&str>,
    app_state: &mut AppState,
) -> Result<()> {
    let path = exporter
        .export(result, name)
        .context("Failed to export measurement")?;
    println!(
        "Wrote {} points ({}) to {}",
        result.len(),
        result
            .traces()
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(", "),
        path.display()
    );
    app_state.last_export = Some(path);
    Ok(())
}

fn monitor_status(frontend: &FrontendReceiver, duration: Duration) {
    frontend.start_monitoring(Duration::from_millis(500));
    let deadline = std::time::Instant::now() + duration;
    while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
        match frontend.recv_timeout(remaining) {
            Some(BackendMessage::Status(status)) => println!(
                "Overload: A={} B={}",
                status.a_overload, status.b_overload
            ),
            Some(BackendMessage::Error { message, .. }) => eprintln!("error: {}", message),
            Some(_) => {}
            None => break,
        }
    }
    frontend.stop_monitoring();
}

/// Install stderr logging plus a daily log file in the app data directory
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hp3582_control=debug"));

    let (file_layer, guard) = match config::app_data_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "hp3582.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
