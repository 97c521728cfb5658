//! Backend Worker Thread Implementation
//!
//! This module contains the loop that owns the [`Analyzer`] and runs on its
//! own thread. It communicates with the caller through crossbeam channels.
//!
//! # Responsibilities
//!
//! - **Command processing**: Runs presets, panel changes, ranging and acquisitions
//! - **Status monitoring**: Optionally polls the overload latch while idle
//! - **Error handling**: Reports failures and re-reads status after each one
//!
//! Operations never overlap: each command runs to completion before the next
//! is taken from the queue. An operation that fails part way leaves the
//! device in whatever state the last successful command produced; a preset
//! is the only way back to a known configuration.

use crate::backend::{Analyzer, BackendCommand, BackendMessage};
use crate::config::AppConfig;
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sleep between loop iterations while idle
const IDLE_TICK: Duration = Duration::from_millis(10);

/// The backend worker that serialises all device access
pub struct BackendWorker {
    /// Application configuration
    config: AppConfig,
    /// Command receiver from the caller
    command_rx: Receiver<BackendCommand>,
    /// Message sender to the caller
    message_tx: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    analyzer: Analyzer,
    /// Periodic status polling interval, `None` when not monitoring
    monitor_interval: Option<Duration>,
    /// Last status poll for rate limiting
    last_poll_time: Instant,
    /// Messages dropped because the queue was full
    dropped_messages: u64,
}

impl BackendWorker {
    /// Create a new backend worker
    pub fn new(
        config: AppConfig,
        analyzer: Analyzer,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            command_rx,
            message_tx,
            running,
            analyzer,
            monitor_interval: None,
            last_poll_time: Instant::now(),
            dropped_messages: 0,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Backend worker started on {}", self.analyzer.describe());

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();

            if let Some(interval) = self.monitor_interval {
                if self.last_poll_time.elapsed() >= interval {
                    self.poll_status();
                    self.last_poll_time = Instant::now();
                }
            }

            std::thread::sleep(IDLE_TICK);
        }

        let _ = self.message_tx.send(BackendMessage::Shutdown);
        tracing::info!("Backend worker stopped");
    }

    /// Process pending commands
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: BackendCommand) {
        match cmd {
            BackendCommand::Preset => {
                let result = self.analyzer.preset();
                self.reply("preset", result, |_| BackendMessage::PresetComplete);
            }
            BackendCommand::Apply(setting) => {
                let result = self.analyzer.apply(&setting);
                self.reply("apply", result, |_| BackendMessage::Applied(setting));
            }
            BackendCommand::ApplyPanel(panel) => {
                let result = self.analyzer.apply_panel(&panel);
                self.reply("apply panel", result, |_| BackendMessage::PanelApplied);
            }
            BackendCommand::ApplyConfiguredPanel => {
                let panel = self.config.panel.clone();
                let result = self.analyzer.apply_panel(&panel);
                self.reply("apply panel", result, |_| BackendMessage::PanelApplied);
            }
            BackendCommand::AutoRange => {
                let result = self.analyzer.auto_range();
                self.reply("auto-range", result, BackendMessage::RangingComplete);
            }
            BackendCommand::Acquire(request) => {
                let result = self.analyzer.acquire(&request);
                self.reply("acquire", result, |r| BackendMessage::Acquisition(Box::new(r)));
            }
            BackendCommand::Measure(request) => {
                let result = self.analyzer.measure(&request);
                self.reply("measure", result, |r| BackendMessage::Acquisition(Box::new(r)));
            }
            BackendCommand::RefreshPanel => {
                let result = self.analyzer.refresh_panel();
                self.reply("refresh panel", result, BackendMessage::Panel);
            }
            BackendCommand::PollStatus => self.poll_status(),
            BackendCommand::StoreTrace(slot) => {
                let result = self.analyzer.store_trace(slot);
                self.reply("store trace", result, |_| BackendMessage::Done);
            }
            BackendCommand::RecallTrace { slot, on } => {
                let result = self.analyzer.recall_trace(slot, on);
                self.reply("recall trace", result, |_| BackendMessage::Done);
            }
            BackendCommand::Arm => {
                let result = self.analyzer.arm();
                self.reply("arm", result, |_| BackendMessage::Done);
            }
            BackendCommand::StartMonitoring { interval_ms } => {
                self.monitor_interval = Some(Duration::from_millis(interval_ms.max(1)));
                self.last_poll_time = Instant::now();
                tracing::debug!("Status monitoring every {} ms", interval_ms);
            }
            BackendCommand::StopMonitoring => {
                self.monitor_interval = None;
            }
            BackendCommand::RequestStats => {
                let stats = self.analyzer.stats().clone();
                self.try_send_message(BackendMessage::Stats(stats));
            }
            BackendCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Read the overload latch and report it
    fn poll_status(&mut self) {
        match self.analyzer.poll_status() {
            Ok(status) => self.try_send_message(BackendMessage::Status(status)),
            Err(e) => {
                tracing::warn!("Status poll failed: {}", e);
                self.try_send_message(BackendMessage::Error {
                    operation: "poll status".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Forward a result; on failure report it and refresh the status indicator
    fn reply<T>(
        &mut self,
        operation: &str,
        result: Result<T>,
        on_ok: impl FnOnce(T) -> BackendMessage,
    ) {
        match result {
            Ok(value) => self.try_send_message(on_ok(value)),
            Err(e) => {
                tracing::error!("{} failed: {}", operation, e);
                self.try_send_message(BackendMessage::Error {
                    operation: operation.to_string(),
                    message: e.to_string(),
                });
                self.poll_status();
            }
        }
    }

    /// Try to send a message, counting it as dropped if the queue is full
    fn try_send_message(&mut self, msg: BackendMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages += 1;
        }
    }
}
