//! Analyzer controller
//!
//! [`Analyzer`] owns the [`DeviceLink`] and a mirror of what was last
//! commanded ([`DeviceState`]). Every operation validates its arguments
//! before the first command is sent, so an `InvalidParameter` error never
//! leaves the device half configured.
//!
//! # Operations
//!
//! - **Setup**: [`Analyzer::preset`], [`Analyzer::apply`], [`Analyzer::apply_panel`]
//! - **Status**: [`Analyzer::poll_status`], [`Analyzer::refresh_panel`]
//! - **Ranging**: [`Analyzer::auto_range`]
//! - **Acquisition**: [`Analyzer::acquire`], [`Analyzer::measure`]
//! - **Trace memory**: [`Analyzer::store_trace`], [`Analyzer::recall_trace`]

use super::acquisition::{self, AcquisitionRequest, AxisSource};
use super::commands::Command;
use super::link::{DeviceLink, SettlePolicy};
use super::ranging::{self, RangingOutcome};
use super::status::OverloadStatus;
use super::transport::{LinkStats, Transport};
use crate::config::{
    validate_adjust, PanelSetting, PanelSettings, ResolutionStrategy, SweepSettings,
};
use crate::error::{AnalyzerError, Result};
use crate::types::{
    AcquisitionResult, AmplitudeScale, Channel, InputMode, InputSelection, InputSource,
    QuantityKind, SensitivityLevel, SpanIndex, SweepMode, TraceSlot,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Controller-side mirror of the analyzer's settings
///
/// Only reflects what this controller commanded since the last preset. An
/// empty `exposed` list means the displayed inputs are unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub input_mode: InputMode,
    /// Sources an `LDS` read currently returns, in canonical order
    pub exposed: Vec<InputSource>,
    pub sweep: SweepSettings,
    pub sensitivity_a: SensitivityLevel,
    pub sensitivity_b: SensitivityLevel,
    pub amplitude_scale: AmplitudeScale,
}

impl Default for DeviceState {
    /// State right after a preset
    fn default() -> Self {
        Self {
            input_mode: InputMode::ChannelA,
            exposed: vec![InputSource::AAmplitude],
            sweep: SweepSettings::default(),
            sensitivity_a: SensitivityLevel::FLOOR,
            sensitivity_b: SensitivityLevel::FLOOR,
            amplitude_scale: AmplitudeScale::TenDbPerDiv,
        }
    }
}

impl DeviceState {
    /// State of a device this controller has not configured yet
    ///
    /// Another session may have left any inputs exposed, so the first
    /// acquisition always selects its inputs explicitly.
    pub fn unknown() -> Self {
        Self {
            exposed: Vec::new(),
            ..Self::default()
        }
    }

    pub fn sensitivity(&self, channel: Channel) -> SensitivityLevel {
        match channel {
            Channel::A => self.sensitivity_a,
            Channel::B => self.sensitivity_b,
        }
    }

    fn set_sensitivity(&mut self, channel: Channel, level: SensitivityLevel) {
        match channel {
            Channel::A => self.sensitivity_a = level,
            Channel::B => self.sensitivity_b = level,
        }
    }
}

/// Indicator values shown on the front panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    /// Alphanumeric display line
    pub alphanumerics: String,
    pub overload: OverloadStatus,
    /// Transfer-function sensitivity, e.g. `+10dBV`
    pub transfer_sensitivity: String,
}

// ==================== Measurement ====================

/// Which traces a one-shot measurement produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementMode {
    /// Channel A only
    A,
    /// Channel B only
    B,
    /// Transfer function from two full-resolution sweeps
    BodeFull,
    /// Transfer function from one dual sweep
    BodeHalf,
    /// A and B as two traces, two full-resolution sweeps
    BothFull,
    /// A and B as two traces from one dual sweep
    BothHalf,
}

impl MeasurementMode {
    fn resolution(self) -> ResolutionStrategy {
        match self {
            MeasurementMode::BodeHalf | MeasurementMode::BothHalf => ResolutionStrategy::Half,
            _ => ResolutionStrategy::Full,
        }
    }

    /// Selection measured for `kind` (amplitude or phase)
    fn selection(self, kind: QuantityKind) -> Result<InputSelection> {
        let side = |channel| {
            InputSource::on_channel(channel, kind).ok_or_else(|| {
                AnalyzerError::InvalidParameter(format!("{:?} has no per-channel source", kind))
            })
        };
        let transfer = match kind {
            QuantityKind::Phase => InputSource::TransferPhase,
            _ => InputSource::TransferAmplitude,
        };
        match self {
            MeasurementMode::A => Ok(InputSelection::single(side(Channel::A)?)),
            MeasurementMode::B => Ok(InputSelection::single(side(Channel::B)?)),
            MeasurementMode::BodeFull | MeasurementMode::BodeHalf => {
                Ok(InputSelection::single(transfer))
            }
            MeasurementMode::BothFull | MeasurementMode::BothHalf => {
                InputSelection::new(&[side(Channel::A)?, side(Channel::B)?])
            }
        }
    }
}

impl FromStr for MeasurementMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "a" => Ok(MeasurementMode::A),
            "b" => Ok(MeasurementMode::B),
            "bodefull" => Ok(MeasurementMode::BodeFull),
            "bodehalf" => Ok(MeasurementMode::BodeHalf),
            "bothfull" => Ok(MeasurementMode::BothFull),
            "bothhalf" => Ok(MeasurementMode::BothHalf),
            _ => Err(format!(
                "'{}' must be 'a', 'b', 'bode-full', 'bode-half', 'both-full' or 'both-half'",
                s
            )),
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementMode::A => "a",
            MeasurementMode::B => "b",
            MeasurementMode::BodeFull => "bode-full",
            MeasurementMode::BodeHalf => "bode-half",
            MeasurementMode::BothFull => "both-full",
            MeasurementMode::BothHalf => "both-half",
        };
        f.write_str(name)
    }
}

/// Parameters of a one-shot measurement, as raw front-panel numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequest {
    /// Sweep mode code, 1..=4
    pub sweep_mode: u8,
    /// Adjust frequency in Hz, 0..=24999; must be 0 in modes 1 and 2
    pub adjust_hz: u32,
    /// Span index, 1..=14
    pub span: u8,
    /// Sensitivity applied to both channels, 1..=10
    pub sensitivity: u8,
    pub mode: MeasurementMode,
    /// Measure phase instead of amplitude
    pub phase: bool,
}

impl Default for MeasurementRequest {
    fn default() -> Self {
        Self {
            sweep_mode: 1,
            adjust_hz: 0,
            span: 14,
            sensitivity: 2,
            mode: MeasurementMode::BodeFull,
            phase: false,
        }
    }
}

/// A measurement request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMeasurement {
    pub sweep: SweepSettings,
    pub sensitivity: SensitivityLevel,
    pub selection: InputSelection,
    pub resolution: ResolutionStrategy,
}

impl MeasurementRequest {
    /// Check every field; nothing is sent to the device
    pub fn validate(&self) -> Result<ValidatedMeasurement> {
        let mode = SweepMode::from_code(self.sweep_mode)?;
        let adjust_hz = validate_adjust(self.adjust_hz)?;
        let span = SpanIndex::new(self.span)?;
        let sensitivity = SensitivityLevel::new(self.sensitivity).map_err(|_| {
            AnalyzerError::InvalidParameter(format!(
                "SENS must be 1-10, got {}",
                self.sensitivity
            ))
        })?;
        if !mode.uses_adjust() && adjust_hz != 0 {
            return Err(AnalyzerError::InvalidParameter(format!(
                "In MD {} AD must be 0",
                mode.code()
            )));
        }

        let kind = if self.phase {
            QuantityKind::Phase
        } else {
            QuantityKind::Amplitude
        };

        Ok(ValidatedMeasurement {
            sweep: SweepSettings {
                mode,
                span,
                adjust_hz,
            },
            sensitivity,
            selection: self.mode.selection(kind)?,
            resolution: self.mode.resolution(),
        })
    }
}

// ==================== Controller ====================

/// Acquisition and auto-ranging controller for one analyzer
#[derive(Debug)]
pub struct Analyzer {
    link: DeviceLink,
    state: DeviceState,
}

impl Analyzer {
    /// Wrap an open link to a device in an unknown state
    pub fn new(link: DeviceLink) -> Self {
        Self {
            link,
            state: DeviceState::unknown(),
        }
    }

    /// Open a link over `transport` with the given settle policy
    pub fn with_transport(transport: Box<dyn Transport>, settle: SettlePolicy) -> Self {
        Self::new(DeviceLink::new(transport, settle))
    }

    pub fn link(&self) -> &DeviceLink {
        &self.link
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Human-readable description of the underlying transport
    pub fn describe(&self) -> String {
        self.link.describe()
    }

    pub fn stats(&self) -> &LinkStats {
        self.link.stats()
    }

    /// Return the device to its power-on settings
    pub fn preset(&mut self) -> Result<()> {
        self.link.send(&Command::Preset)?;
        self.state = DeviceState::default();
        tracing::info!("Analyzer preset");
        Ok(())
    }

    /// Apply one knob change
    pub fn apply(&mut self, setting: &PanelSetting) -> Result<()> {
        setting.validate()?;
        tracing::debug!("Applying {:?}", setting);

        match setting {
            PanelSetting::SweepMode(mode) => {
                self.link.send(&Command::SweepMode(*mode))?;
                self.state.sweep.mode = *mode;
                self.link.send(&Command::RestartAveraging)?;
            }
            PanelSetting::Span(span) => {
                self.link.send(&Command::Span(*span))?;
                self.state.sweep.span = *span;
                self.link.send(&Command::RestartAveraging)?;
            }
            PanelSetting::Adjust(hz) => {
                self.link.send(&Command::Adjust(*hz))?;
                self.state.sweep.adjust_hz = *hz;
            }
            PanelSetting::Sensitivity(channel, level) => {
                self.link.send(&Command::Sensitivity(*channel, *level))?;
                self.state.set_sensitivity(*channel, *level);
            }
            PanelSetting::Coupling(channel, coupling) => {
                self.link.send(&Command::Coupling(*channel, *coupling))?;
            }
            PanelSetting::Averaging(kind) => self.link.send(&Command::Averaging(*kind))?,
            PanelSetting::AveragingCount(count) => {
                self.link.send(&Command::AveragingCount(*count))?
            }
            PanelSetting::Passband(shape) => self.link.send(&Command::Passband(*shape))?,
            PanelSetting::AmplitudeScale(scale) => {
                self.link.send(&Command::AmplitudeScale(*scale))?;
                self.state.amplitude_scale = *scale;
            }
            PanelSetting::ReferenceLevel(level) => {
                self.link.send(&Command::ReferenceLevel(*level))?
            }
            PanelSetting::NumberShift(on) => self.link.send(&Command::NumberShift(*on))?,
            PanelSetting::FreeRun(on) => self.link.send(&Command::FreeRun(*on))?,
            PanelSetting::Repetitive(on) => self.link.send(&Command::Repetitive(*on))?,
            PanelSetting::Inputs(selection) => self.select_inputs(selection)?,
        }
        Ok(())
    }

    /// Apply a whole panel snapshot, validating it first
    pub fn apply_panel(&mut self, panel: &PanelSettings) -> Result<()> {
        panel.validate()?;
        let settings = panel.to_settings();
        for setting in &settings {
            setting.validate()?;
        }
        for setting in &settings {
            self.apply(setting)?;
        }
        Ok(())
    }

    /// Expose exactly `selection`, switching the input mode as needed
    pub fn select_inputs(&mut self, selection: &InputSelection) -> Result<()> {
        let mode = InputMode::covering(selection.sources());
        self.link.send(&Command::SelectInputs {
            mode,
            sources: selection.sources().to_vec(),
        })?;
        self.state.input_mode = mode;
        self.state.exposed = selection.sources().to_vec();
        Ok(())
    }

    /// Clear the latch, settle and read fresh overload flags
    pub fn poll_status(&mut self) -> Result<OverloadStatus> {
        self.link.send(&Command::ResetStatus)?;
        let status = OverloadStatus::decode(self.link.read_status_byte()?);
        if status.any() {
            tracing::warn!(
                "Input overload: A={} B={}",
                status.a_overload,
                status.b_overload
            );
        }
        Ok(status)
    }

    /// Alphanumeric display line
    pub fn read_alphanumerics(&mut self) -> Result<String> {
        self.link.query_text(&Command::ReadAlphanumerics)
    }

    /// Transfer-function sensitivity with its unit, e.g. `+10dBV`
    pub fn transfer_sensitivity(&mut self) -> Result<String> {
        let value = self.link.query_text(&Command::ReadTransferSensitivity)?;
        Ok(format!("{}dBV", value))
    }

    /// Read every front-panel indicator
    pub fn refresh_panel(&mut self) -> Result<PanelSnapshot> {
        let alphanumerics = self.read_alphanumerics()?;
        let overload = self.poll_status()?;
        let transfer_sensitivity = self.transfer_sensitivity()?;
        Ok(PanelSnapshot {
            alphanumerics,
            overload,
            transfer_sensitivity,
        })
    }

    /// Converge both channels to their most sensitive non-overloading range
    ///
    /// Leaves averaging off and the device at the returned levels.
    pub fn auto_range(&mut self) -> Result<RangingOutcome> {
        let outcome = ranging::auto_range(&mut self.link)?;
        self.state.sensitivity_a = outcome.a;
        self.state.sensitivity_b = outcome.b;
        Ok(outcome)
    }

    /// Acquire the traces described by `request`
    pub fn acquire(&mut self, request: &AcquisitionRequest) -> Result<AcquisitionResult> {
        acquisition::acquire(&mut self.link, &mut self.state, request)
    }

    /// One-shot measurement: preset, configure the sweep, acquire
    ///
    /// The frequency axis is read back from the device.
    pub fn measure(&mut self, request: &MeasurementRequest) -> Result<AcquisitionResult> {
        let validated = request.validate()?;
        tracing::info!(
            "Measuring {} ({}) MD{} AD{} SP{} SENS{}",
            request.mode,
            if request.phase { "phase" } else { "amplitude" },
            request.sweep_mode,
            request.adjust_hz,
            request.span,
            request.sensitivity
        );

        self.preset()?;
        let sweep = validated.sweep;
        self.link.send(&Command::Sequence(vec![
            Command::SweepMode(sweep.mode),
            Command::Adjust(sweep.adjust_hz),
            Command::Span(sweep.span),
            Command::Sensitivities {
                a: validated.sensitivity,
                b: validated.sensitivity,
            },
        ]))?;
        self.state.sweep = sweep;
        self.state.sensitivity_a = validated.sensitivity;
        self.state.sensitivity_b = validated.sensitivity;

        let acquisition = AcquisitionRequest::new(validated.selection)
            .with_resolution(validated.resolution)
            .with_axis(AxisSource::Device);
        self.acquire(&acquisition)
    }

    /// Store the current display in a trace memory
    pub fn store_trace(&mut self, slot: TraceSlot) -> Result<()> {
        self.link.send(&Command::StoreTrace(slot))
    }

    /// Show or hide a stored trace
    pub fn recall_trace(&mut self, slot: TraceSlot, on: bool) -> Result<()> {
        self.link.send(&Command::RecallTrace(slot, on))
    }

    /// Arm a single sweep
    pub fn arm(&mut self) -> Result<()> {
        self.link.send(&Command::Arm)
    }

    pub fn restart_averaging(&mut self) -> Result<()> {
        self.link.send(&Command::RestartAveraging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::simulator::SimulatedAnalyzer;
    use crate::types::Coupling;

    fn analyzer() -> (Analyzer, SimulatedAnalyzer) {
        let sim = SimulatedAnalyzer::new();
        let handle = sim.clone();
        (
            Analyzer::with_transport(Box::new(sim), SettlePolicy::instant()),
            handle,
        )
    }

    #[test]
    fn test_measurement_validation_messages() {
        let bad = |req: MeasurementRequest| req.validate().unwrap_err().to_string();

        assert!(bad(MeasurementRequest {
            sweep_mode: 5,
            ..Default::default()
        })
        .contains("MD must be between 1-4"));
        assert!(bad(MeasurementRequest {
            adjust_hz: 25_000,
            sweep_mode: 3,
            ..Default::default()
        })
        .contains("AD must be between 0-24999"));
        assert!(bad(MeasurementRequest {
            span: 0,
            ..Default::default()
        })
        .contains("SP must be between 1-14"));
        assert!(bad(MeasurementRequest {
            sensitivity: 11,
            ..Default::default()
        })
        .contains("SENS must be 1-10"));
        assert!(bad(MeasurementRequest {
            sweep_mode: 2,
            adjust_hz: 100,
            ..Default::default()
        })
        .contains("AD must be 0"));
    }

    #[test]
    fn test_invalid_measurement_sends_nothing() {
        let (mut analyzer, sim) = analyzer();
        let request = MeasurementRequest {
            span: 15,
            ..Default::default()
        };
        assert!(analyzer.measure(&request).unwrap_err().is_invalid_parameter());
        assert!(sim.history().is_empty());
    }

    #[test]
    fn test_measure_configures_in_one_line() {
        let (mut analyzer, sim) = analyzer();
        let request = MeasurementRequest {
            sweep_mode: 3,
            adjust_hz: 10_000,
            span: 11,
            sensitivity: 4,
            mode: MeasurementMode::A,
            phase: false,
        };
        let result = analyzer.measure(&request).unwrap();

        let history = sim.history();
        assert_eq!(history[0], "PRS");
        assert_eq!(history[1], "MD3AD10000SP11AS4BS4");
        assert_eq!(result.len(), 128);
        assert_eq!(result.frequencies()[0], 8_750.0);
        assert_eq!(result.frequencies()[127], 11_250.0);
    }

    #[test]
    fn test_sweep_changes_restart_averaging() {
        let (mut analyzer, sim) = analyzer();
        analyzer
            .apply(&PanelSetting::SweepMode(SweepMode::ZeroToSpan))
            .unwrap();
        analyzer
            .apply(&PanelSetting::Coupling(Channel::B, Coupling::Dc))
            .unwrap();
        assert_eq!(sim.history(), vec!["MD2", "RE", "BC2"]);
        assert_eq!(analyzer.state().sweep.mode, SweepMode::ZeroToSpan);
    }

    #[test]
    fn test_apply_rejects_bad_adjust_before_sending() {
        let (mut analyzer, sim) = analyzer();
        assert!(analyzer.apply(&PanelSetting::Adjust(40_000)).is_err());
        assert!(sim.history().is_empty());
    }

    #[test]
    fn test_refresh_panel() {
        let (mut analyzer, _sim) = analyzer();
        analyzer
            .apply(&PanelSetting::Sensitivity(
                Channel::A,
                SensitivityLevel::new(3).unwrap(),
            ))
            .unwrap();
        let snapshot = analyzer.refresh_panel().unwrap();
        assert_eq!(snapshot.transfer_sensitivity, "+10dBV");
        assert!(!snapshot.overload.any());
        assert!(snapshot.alphanumerics.contains("SPAN"));
    }

    #[test]
    fn test_fresh_analyzer_selects_inputs_before_reading() {
        let sim = SimulatedAnalyzer::new()
            .with_signal(Channel::A, 0.05)
            .with_signal(Channel::B, 0.02);

        let mut first = Analyzer::with_transport(Box::new(sim.clone()), SettlePolicy::instant());
        first
            .acquire(&AcquisitionRequest::new(InputSelection::single(
                InputSource::TransferAmplitude,
            )))
            .unwrap();
        assert_eq!(sim.exposed_sources(), vec![InputSource::BAmplitude]);

        sim.clear_history();
        let mut second = Analyzer::with_transport(Box::new(sim.clone()), SettlePolicy::instant());
        assert!(second.state().exposed.is_empty());
        let result = second
            .acquire(&AcquisitionRequest::new(InputSelection::single(
                InputSource::AAmplitude,
            )))
            .unwrap();

        let trace = &result.traces()[0];
        assert_eq!(trace.label(), "A Amplitude (dB)");
        assert!((trace.samples[0] - 20.0 * 0.05f64.log10()).abs() < 1e-4);
        let history = sim.history();
        assert!(history[0].starts_with("IM1AA1"));
        assert_eq!(history.last().map(String::as_str), Some("LDS"));
        assert_eq!(second.state().exposed, vec![InputSource::AAmplitude]);
    }

    #[test]
    fn test_measurement_mode_parsing() {
        assert_eq!("bodefull".parse(), Ok(MeasurementMode::BodeFull));
        assert_eq!("both-half".parse(), Ok(MeasurementMode::BothHalf));
        assert_eq!("A".parse(), Ok(MeasurementMode::A));
        assert!("c".parse::<MeasurementMode>().is_err());
    }
}
