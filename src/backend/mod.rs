//! Backend module for driving the analyzer
//!
//! This module handles all instrument communication. Long-running work runs
//! on a separate thread and talks to its caller over crossbeam channels.
//!
//! # Architecture
//!
//! - [`BackendCommand`] - Messages sent from the caller to the backend
//! - [`BackendMessage`] - Messages sent from the backend to the caller
//! - [`FrontendReceiver`] - Caller-side handle for sending commands and receiving messages
//! - [`AnalyzerBackend`] - Entry point that owns the worker until it is run
//!
//! # Components
//!
//! - [`Transport`] - Byte-level seam; [`SerialTransport`] for hardware, [`SimulatedAnalyzer`] for tests
//! - [`DeviceLink`] - Command/query channel with settle timing
//! - [`Analyzer`] - Controller tracking [`DeviceState`]
//! - [`auto_range`] - Sensitivity search
//! - [`acquisition`] - Plans and runs multi-sweep acquisitions
//! - [`BackendWorker`] - Command loop on the backend thread
//!
//! # Example
//!
//! ```ignore
//! use hp3582_control::backend::{AnalyzerBackend, BackendMessage, SimulatedAnalyzer};
//! use hp3582_control::config::AppConfig;
//!
//! let (backend, frontend) = AnalyzerBackend::new(AppConfig::default(), Box::new(SimulatedAnalyzer::new()));
//! std::thread::spawn(move || backend.run());
//!
//! frontend.auto_range();
//! for msg in frontend.drain() {
//!     if let BackendMessage::RangingComplete(outcome) = msg {
//!         println!("A={} B={}", outcome.a, outcome.b);
//!     }
//! }
//! ```

pub mod acquisition;
pub mod analyzer;
pub mod commands;
pub mod link;
pub mod ranging;
pub mod serial;
pub mod simulator;
pub mod status;
pub mod transport;
pub mod worker;

pub use acquisition::{acquire, plan, AcquisitionPlan, AcquisitionRequest, AxisSource};
pub use analyzer::{
    Analyzer, DeviceState, MeasurementMode, MeasurementRequest, PanelSnapshot,
    ValidatedMeasurement,
};
pub use commands::Command;
pub use link::{DeviceLink, SettlePolicy};
pub use ranging::{auto_range, OverloadProbe, RangingOutcome};
pub use serial::{list_ports, PortInfo, SerialTransport};
pub use simulator::{SimulatedAnalyzer, SimulatedSignal};
pub use status::OverloadStatus;
pub use transport::{LinkStats, Transport};
pub use worker::BackendWorker;

use crate::config::{AppConfig, PanelSetting, PanelSettings};
use crate::types::{AcquisitionResult, TraceSlot};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Message sent from the caller to the backend
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Return the analyzer to its power-on settings
    Preset,
    /// Apply one knob change
    Apply(PanelSetting),
    /// Apply a whole panel snapshot
    ApplyPanel(PanelSettings),
    /// Apply the panel snapshot from the loaded configuration
    ApplyConfiguredPanel,
    /// Run the sensitivity search
    AutoRange,
    /// Acquire traces
    Acquire(AcquisitionRequest),
    /// One-shot preset, configure and acquire
    Measure(MeasurementRequest),
    /// Read every front-panel indicator
    RefreshPanel,
    /// Read the overload latch once
    PollStatus,
    StoreTrace(TraceSlot),
    RecallTrace { slot: TraceSlot, on: bool },
    /// Arm a single sweep
    Arm,
    /// Poll the overload latch periodically while idle
    StartMonitoring { interval_ms: u64 },
    StopMonitoring,
    /// Request link statistics
    RequestStats,
    /// Shutdown the backend
    Shutdown,
}

/// Message sent from the backend to the caller
#[derive(Debug, Clone)]
pub enum BackendMessage {
    PresetComplete,
    Applied(PanelSetting),
    PanelApplied,
    RangingComplete(RangingOutcome),
    /// Completed acquisition or measurement
    Acquisition(Box<AcquisitionResult>),
    Panel(PanelSnapshot),
    /// Overload indicator update
    Status(OverloadStatus),
    /// A command without a payload finished
    Done,
    Stats(LinkStats),
    /// An operation failed; the device state is unknown until the next preset
    Error { operation: String, message: String },
    /// Backend is shutting down
    Shutdown,
}

/// Caller-side handle to the backend
pub struct FrontendReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<BackendCommand>,
}

impl FrontendReceiver {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Block for the next message, up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BackendMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: BackendCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn preset(&self) {
        let _ = self.command_sender.send(BackendCommand::Preset);
    }

    pub fn apply(&self, setting: PanelSetting) {
        let _ = self.command_sender.send(BackendCommand::Apply(setting));
    }

    pub fn apply_panel(&self, panel: PanelSettings) {
        let _ = self.command_sender.send(BackendCommand::ApplyPanel(panel));
    }

    pub fn auto_range(&self) {
        let _ = self.command_sender.send(BackendCommand::AutoRange);
    }

    pub fn acquire(&self, request: AcquisitionRequest) {
        let _ = self.command_sender.send(BackendCommand::Acquire(request));
    }

    pub fn measure(&self, request: MeasurementRequest) {
        let _ = self.command_sender.send(BackendCommand::Measure(request));
    }

    pub fn refresh_panel(&self) {
        let _ = self.command_sender.send(BackendCommand::RefreshPanel);
    }

    /// Start polling the overload latch every `interval`
    pub fn start_monitoring(&self, interval: Duration) {
        let _ = self.command_sender.send(BackendCommand::StartMonitoring {
            interval_ms: interval.as_millis() as u64,
        });
    }

    pub fn stop_monitoring(&self) {
        let _ = self.command_sender.send(BackendCommand::StopMonitoring);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(BackendCommand::Shutdown);
    }
}

/// The analyzer backend that runs in a separate thread
pub struct AnalyzerBackend {
    config: AppConfig,
    transport: Box<dyn Transport>,
    /// Receiver for commands from the caller
    command_receiver: Receiver<BackendCommand>,
    /// Sender for messages to the caller
    message_sender: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl AnalyzerBackend {
    /// Create a backend over `transport` with communication channels
    pub fn new(config: AppConfig, transport: Box<dyn Transport>) -> (Self, FrontendReceiver) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Acquisitions are few and large; a small queue is plenty
        let (msg_tx, msg_rx) = bounded(1_000);

        let backend = Self {
            config,
            transport,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let frontend = FrontendReceiver {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Run the backend loop until shutdown
    pub fn run(self) {
        let analyzer =
            Analyzer::with_transport(self.transport, self.config.timing.settle_policy());
        let mut worker = BackendWorker::new(
            self.config,
            analyzer,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        worker.run();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
