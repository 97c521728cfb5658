//! Simulated analyzer for running without hardware
//!
//! [`SimulatedAnalyzer`] implements [`Transport`] by interpreting the same
//! command grammar a real instrument accepts. It models enough of the device
//! for the controller's engines to behave realistically:
//!
//! - **Sensitivity physics**: each channel carries a signal amplitude in volts
//!   and overloads whenever that amplitude exceeds the full-scale range of the
//!   selected sensitivity level
//! - **Status latch**: `LST0` clears the overload latch, `LST1` queues the
//!   latched status byte for a single-byte read
//! - **Input exposure**: `IMn` and the enable flags decide which sources an
//!   `LDS` read returns; two sources share the sweep's points
//! - **Panel queries**: `LAN`, `LAD`, `LSP` and `LXS` return text replies
//!
//! The simulator is cheap to clone; clones share state, so a test can keep a
//! handle while another clone moves into a [`DeviceLink`](super::DeviceLink).
//!
//! # Example
//!
//! ```ignore
//! use hp3582_control::backend::{SimulatedAnalyzer, DeviceLink, SettlePolicy};
//! use hp3582_control::types::Channel;
//!
//! let sim = SimulatedAnalyzer::new().with_signal(Channel::A, 0.05);
//! let handle = sim.clone();
//! let link = DeviceLink::new(Box::new(sim), SettlePolicy::instant());
//! // ... drive the link ...
//! assert!(handle.history().iter().any(|line| line == "PRS"));
//! ```

use super::transport::Transport;
use crate::error::{AnalyzerError, Result};
use crate::types::{
    Channel, InputSource, SensitivityLevel, SpanIndex, SweepMode, DEFAULT_SWEEP_POINTS,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Three-letter mnemonics; everything else is two letters
const LONG_MNEMONICS: [&str; 7] = ["PRS", "LST", "LDS", "LAN", "LAD", "LSP", "LXS"];

/// Enable-flag mnemonics in canonical source order
const FLAG_MNEMONICS: [&str; 7] = ["AA", "PA", "AB", "PB", "AX", "PX", "CH"];

/// Simulated signal on one input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedSignal {
    /// Peak amplitude in volts
    pub volts: f64,
    /// Phase in degrees
    pub phase_deg: f64,
}

impl Default for SimulatedSignal {
    fn default() -> Self {
        Self {
            volts: 0.05,
            phase_deg: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct SimState {
    sensitivity: [u8; 2],
    signal: [SimulatedSignal; 2],
    input_mode: u8,
    flags: [bool; 7],
    sweep_mode: u8,
    span: u8,
    adjust: u32,
    scale: u8,
    latch: u8,
    pending_lines: VecDeque<String>,
    pending_byte: Option<u8>,
    points: usize,
    history: Vec<String>,
    fail_reads: usize,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            sensitivity: [2, 2],
            signal: [SimulatedSignal::default(); 2],
            input_mode: 1,
            flags: [false; 7],
            sweep_mode: 1,
            span: 14,
            adjust: 0,
            scale: 2,
            latch: 0,
            pending_lines: VecDeque::new(),
            pending_byte: None,
            points: DEFAULT_SWEEP_POINTS,
            history: Vec::new(),
            fail_reads: 0,
        };
        state.preset();
        state
    }

    fn preset(&mut self) {
        self.sensitivity = [2, 2];
        self.input_mode = 1;
        self.flags = [true, false, false, false, false, false, false];
        self.sweep_mode = 1;
        self.span = SpanIndex::WIDEST.value();
        self.adjust = 0;
        self.scale = 2;
        self.latch = 0;
        self.pending_lines.clear();
        self.pending_byte = None;
    }

    fn channel_index(channel: Channel) -> usize {
        match channel {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    fn overload_bits(&self) -> u8 {
        let mut bits = 0;
        for (i, bit) in [(0usize, 4u8), (1, 8)] {
            let full_scale = SensitivityLevel::new(self.sensitivity[i])
                .ok()
                .and_then(|level| level.full_scale_volts());
            if let Some(full_scale) = full_scale {
                if self.signal[i].volts > full_scale {
                    bits |= bit;
                }
            }
        }
        bits
    }

    /// Sources the current mode can expose, in canonical order
    fn exposed(&self) -> Vec<InputSource> {
        InputSource::ALL
            .iter()
            .zip(self.flags)
            .filter(|(_, on)| *on)
            .map(|(source, _)| *source)
            .filter(|source| match (self.input_mode, source.channel()) {
                (1, Some(Channel::A)) => true,
                (3, Some(Channel::B)) => true,
                (2, _) => true,
                _ => false,
            })
            .take(2)
            .collect()
    }

    fn amplitude(&self, volts: f64) -> f64 {
        if self.scale == 1 {
            volts
        } else {
            20.0 * volts.log10()
        }
    }

    fn sample(&self, source: InputSource, i: usize, n: usize) -> f64 {
        // Gentle roll-off shared by both channels so the transfer stays flat
        let x = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
        let shape = 1.0 - 0.5 * x;
        let [a, b] = self.signal;
        match source {
            InputSource::AAmplitude => self.amplitude(a.volts * shape),
            InputSource::BAmplitude => self.amplitude(b.volts * shape),
            InputSource::APhase => a.phase_deg,
            InputSource::BPhase => b.phase_deg,
            InputSource::TransferAmplitude => self.amplitude(b.volts / a.volts),
            InputSource::TransferPhase => b.phase_deg - a.phase_deg,
            InputSource::Coherence => 1.0,
        }
    }

    fn data_reply(&self) -> String {
        let sources = self.exposed();
        if sources.is_empty() {
            return String::new();
        }
        let per_source = self.points / sources.len();
        let values: Vec<String> = sources
            .iter()
            .flat_map(|source| {
                (0..per_source).map(move |i| format!("{:.6}", self.sample(*source, i, per_source)))
            })
            .collect();
        values.join(",")
    }

    fn span_hz(&self) -> f64 {
        SpanIndex::new(self.span)
            .map(crate::analysis::span_hz)
            .unwrap_or(0.0)
    }

    fn alphanumerics(&self) -> String {
        let mode = SweepMode::from_code(self.sweep_mode)
            .map(|m| m.to_string())
            .unwrap_or_default();
        format!(
            "{} ADJ {}HZ SPAN {}HZ",
            mode,
            self.adjust,
            self.span_hz()
        )
    }

    fn transfer_sensitivity(&self) -> String {
        // dBV of level n is 50 - 10n
        let dbv = |level: u8| 50 - 10 * i32::from(level);
        format!("{:+}", dbv(self.sensitivity[1]) - dbv(self.sensitivity[0]))
    }

    fn execute(&mut self, mnemonic: &str, arg: Option<u32>) {
        if let ("AD", Some(hz)) = (mnemonic, arg) {
            self.adjust = hz;
            return;
        }
        let arg_u8 = arg.and_then(|v| u8::try_from(v).ok());
        match (mnemonic, arg_u8) {
            ("PRS", _) => self.preset(),
            ("MD", Some(v)) if (1..=4).contains(&v) => self.sweep_mode = v,
            ("SP", Some(v)) if (1..=14).contains(&v) => self.span = v,
            ("AS", Some(v)) if (1..=10).contains(&v) => {
                self.sensitivity[0] = v;
                self.latch |= self.overload_bits();
            }
            ("BS", Some(v)) if (1..=10).contains(&v) => {
                self.sensitivity[1] = v;
                self.latch |= self.overload_bits();
            }
            ("IM", Some(v)) if (1..=3).contains(&v) => self.input_mode = v,
            ("SC", Some(v)) if (1..=3).contains(&v) => self.scale = v,
            ("LST", Some(0)) => self.latch = self.overload_bits(),
            ("LST", Some(1)) => self.pending_byte = Some(self.latch | self.overload_bits()),
            ("LDS", _) => {
                let reply = self.data_reply();
                self.pending_lines.push_back(reply);
            }
            ("LAN", _) => {
                let reply = self.alphanumerics();
                self.pending_lines.push_back(reply);
            }
            ("LAD", _) => {
                let reply = self.adjust.to_string();
                self.pending_lines.push_back(reply);
            }
            ("LSP", _) => {
                let reply = self.span_hz().to_string();
                self.pending_lines.push_back(reply);
            }
            ("LXS", _) => {
                let reply = self.transfer_sensitivity();
                self.pending_lines.push_back(reply);
            }
            (flag, Some(v)) if v <= 1 && FLAG_MNEMONICS.contains(&flag) => {
                if let Some(i) = FLAG_MNEMONICS.iter().position(|m| *m == flag) {
                    self.flags[i] = v == 1;
                }
            }
            _ => {
                // Averaging, coupling, trace memory and trigger keys have
                // no effect on the simulated data
                tracing::trace!("Simulator ignoring {}{:?}", mnemonic, arg);
            }
        }
    }
}

/// Split one command line into `(mnemonic, argument)` pairs
fn tokenize(line: &str) -> Result<Vec<(String, Option<u32>)>> {
    let bytes = line.trim().as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &bytes[pos..];
        let len = if LONG_MNEMONICS.iter().any(|m| rest.starts_with(m.as_bytes())) {
            3
        } else {
            2
        };
        if rest.len() < len || !rest[..len].iter().all(u8::is_ascii_uppercase) {
            return Err(AnalyzerError::Communication(format!(
                "simulator cannot parse '{}' at offset {}",
                line, pos
            )));
        }
        let mnemonic = String::from_utf8_lossy(&rest[..len]).into_owned();
        pos += len;

        let digits = bytes[pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let arg = if digits > 0 {
            let text = String::from_utf8_lossy(&bytes[pos..pos + digits]);
            Some(text.parse::<u32>().map_err(|_| {
                AnalyzerError::Communication(format!("argument '{}' out of range", text))
            })?)
        } else {
            None
        };
        pos += digits;
        tokens.push((mnemonic, arg));
    }
    Ok(tokens)
}

/// In-process model of the analyzer implementing [`Transport`]
#[derive(Debug, Clone)]
pub struct SimulatedAnalyzer {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAnalyzer {
    /// A freshly preset analyzer with a 50 mV signal on both channels
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the amplitude applied to one input
    pub fn with_signal(self, channel: Channel, volts: f64) -> Self {
        self.set_signal(channel, volts);
        self
    }

    /// Set the phase of one input
    pub fn with_phase(self, channel: Channel, degrees: f64) -> Self {
        self.state().signal[SimState::channel_index(channel)].phase_deg = degrees;
        self
    }

    pub fn set_signal(&self, channel: Channel, volts: f64) {
        self.state().signal[SimState::channel_index(channel)].volts = volts;
    }

    /// Make the next `count` reads fail with a communication error
    pub fn fail_next_reads(&self, count: usize) {
        self.state().fail_reads = count;
    }

    /// Every line written so far, oldest first
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Currently selected sensitivity level of one channel
    pub fn sensitivity(&self, channel: Channel) -> u8 {
        self.state().sensitivity[SimState::channel_index(channel)]
    }

    /// Sources an `LDS` read would return right now
    pub fn exposed_sources(&self) -> Vec<InputSource> {
        self.state().exposed()
    }

    fn take_failure(state: &mut SimState) -> Result<()> {
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(AnalyzerError::Communication(
                "simulated read timeout".to_string(),
            ));
        }
        Ok(())
    }
}

impl Transport for SimulatedAnalyzer {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut state = self.state();
        state.history.push(line.to_string());
        for (mnemonic, arg) in tokenize(line)? {
            state.execute(&mnemonic, arg);
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut state = self.state();
        Self::take_failure(&mut state)?;
        state
            .pending_lines
            .pop_front()
            .ok_or_else(|| AnalyzerError::Communication("read timed out".to_string()))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut state = self.state();
        Self::take_failure(&mut state)?;
        state
            .pending_byte
            .take()
            .ok_or_else(|| AnalyzerError::Communication("status byte not armed".to_string()))
    }

    fn describe(&self) -> String {
        "simulated HP 3582A".to_string()
    }
}
