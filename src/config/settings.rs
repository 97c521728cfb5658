//! Front-panel settings snapshot
//!
//! These types describe what the caller believes the analyzer's panel is set
//! to. A snapshot can be applied knob by knob through the controller and is
//! the source of the frequency axis when the axis is not read back from the
//! device.
//!
//! # Main Types
//!
//! - [`PanelSettings`] - Every knob the controller can set
//! - [`PanelSetting`] - One knob change
//! - [`SweepSettings`] - The subset that defines the frequency axis
//! - [`ResolutionStrategy`] - How two-channel measurements trade resolution for time

use crate::analysis;
use crate::error::{AnalyzerError, Result};
use crate::types::{
    AmplitudeScale, AveragingCount, AveragingType, Channel, Coupling, InputSelection,
    PassbandShape, ReferenceLevel, SensitivityLevel, SpanIndex, SweepMode, MAX_ADJUST_HZ,
};
use serde::{Deserialize, Serialize};

/// Validate an adjust frequency in Hz
pub fn validate_adjust(hz: u32) -> Result<u32> {
    if hz > MAX_ADJUST_HZ {
        return Err(AnalyzerError::InvalidParameter(format!(
            "AD must be between 0-{}, got {}",
            MAX_ADJUST_HZ, hz
        )));
    }
    Ok(hz)
}

/// How a two-channel measurement is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Two sequential single-channel sweeps, each at full resolution
    #[default]
    Full,
    /// One dual-channel sweep split in half; faster, half the points per channel
    Half,
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ResolutionStrategy::Full),
            "half" => Ok(ResolutionStrategy::Half),
            other => Err(format!("unknown resolution '{}'", other)),
        }
    }
}

/// Sweep parameters that determine the frequency axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub mode: SweepMode,
    pub span: SpanIndex,
    pub adjust_hz: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            mode: SweepMode::Fixed25k,
            span: SpanIndex::WIDEST,
            adjust_hz: 0,
        }
    }
}

impl SweepSettings {
    pub fn new(mode: SweepMode, span: SpanIndex, adjust_hz: u32) -> Result<Self> {
        Ok(Self {
            mode,
            span,
            adjust_hz: validate_adjust(adjust_hz)?,
        })
    }

    /// Span in Hz
    pub fn span_hz(&self) -> f64 {
        analysis::span_hz(self.span)
    }

    /// Frequency axis of `n` points for these settings
    pub fn axis(&self, n: usize) -> Vec<f64> {
        analysis::reconstruct(self.mode, self.span_hz(), f64::from(self.adjust_hz), n)
    }
}

/// One front-panel knob change
#[derive(Debug, Clone, PartialEq)]
pub enum PanelSetting {
    /// Sweep mode; averaging restarts afterwards
    SweepMode(SweepMode),
    /// Span; averaging restarts afterwards
    Span(SpanIndex),
    /// Adjust frequency in Hz
    Adjust(u32),
    Sensitivity(Channel, SensitivityLevel),
    Coupling(Channel, Coupling),
    Averaging(AveragingType),
    AveragingCount(AveragingCount),
    Passband(PassbandShape),
    AmplitudeScale(AmplitudeScale),
    ReferenceLevel(ReferenceLevel),
    NumberShift(bool),
    FreeRun(bool),
    Repetitive(bool),
    /// Displayed input sources
    Inputs(InputSelection),
}

impl PanelSetting {
    /// Reject out-of-range values that the type system does not already exclude
    pub fn validate(&self) -> Result<()> {
        if let PanelSetting::Adjust(hz) = self {
            validate_adjust(*hz)?;
        }
        Ok(())
    }
}

/// Snapshot of every knob the controller drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub sweep_mode: SweepMode,
    pub span: SpanIndex,
    pub adjust_hz: u32,
    pub sensitivity_a: SensitivityLevel,
    pub sensitivity_b: SensitivityLevel,
    pub coupling_a: Coupling,
    pub coupling_b: Coupling,
    pub averaging: AveragingType,
    pub averaging_count: AveragingCount,
    pub passband: PassbandShape,
    pub amplitude_scale: AmplitudeScale,
    pub reference_level: ReferenceLevel,
    pub inputs: InputSelection,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            sweep_mode: SweepMode::Fixed25k,
            span: SpanIndex::WIDEST,
            adjust_hz: 0,
            sensitivity_a: SensitivityLevel::FLOOR,
            sensitivity_b: SensitivityLevel::FLOOR,
            coupling_a: Coupling::Ac,
            coupling_b: Coupling::Ac,
            averaging: AveragingType::Off,
            averaging_count: AveragingCount::Four,
            passband: PassbandShape::Flattop,
            amplitude_scale: AmplitudeScale::TenDbPerDiv,
            reference_level: ReferenceLevel::default(),
            inputs: InputSelection::default(),
        }
    }
}

impl PanelSettings {
    pub fn validate(&self) -> Result<()> {
        validate_adjust(self.adjust_hz)?;
        Ok(())
    }

    /// The sweep part of the snapshot
    pub fn sweep(&self) -> SweepSettings {
        SweepSettings {
            mode: self.sweep_mode,
            span: self.span,
            adjust_hz: self.adjust_hz,
        }
    }

    /// Sensitivity of one channel
    pub fn sensitivity(&self, channel: Channel) -> SensitivityLevel {
        match channel {
            Channel::A => self.sensitivity_a,
            Channel::B => self.sensitivity_b,
        }
    }

    /// Knob changes that bring a freshly preset analyzer to this snapshot
    pub fn to_settings(&self) -> Vec<PanelSetting> {
        vec![
            PanelSetting::SweepMode(self.sweep_mode),
            PanelSetting::Span(self.span),
            PanelSetting::Adjust(self.adjust_hz),
            PanelSetting::Sensitivity(Channel::A, self.sensitivity_a),
            PanelSetting::Sensitivity(Channel::B, self.sensitivity_b),
            PanelSetting::Coupling(Channel::A, self.coupling_a),
            PanelSetting::Coupling(Channel::B, self.coupling_b),
            PanelSetting::Averaging(self.averaging),
            PanelSetting::AveragingCount(self.averaging_count),
            PanelSetting::Passband(self.passband),
            PanelSetting::AmplitudeScale(self.amplitude_scale),
            PanelSetting::ReferenceLevel(self.reference_level),
            PanelSetting::Inputs(self.inputs.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputSource;

    #[test]
    fn test_adjust_validation() {
        assert!(validate_adjust(24_999).is_ok());
        assert!(validate_adjust(25_000).unwrap_err().is_invalid_parameter());
        assert!(PanelSetting::Adjust(30_000).validate().is_err());
        assert!(PanelSetting::FreeRun(true).validate().is_ok());
    }

    #[test]
    fn test_sweep_axis() {
        let sweep =
            SweepSettings::new(SweepMode::Centered, SpanIndex::from_token("1kHz").unwrap(), 5_000)
                .unwrap();
        let axis = sweep.axis(128);
        assert_eq!(axis[0], 4_500.0);
        assert_eq!(axis[127], 5_500.0);
    }

    #[test]
    fn test_defaults_match_preset() {
        let panel = PanelSettings::default();
        assert_eq!(panel.sweep(), SweepSettings::default());
        assert_eq!(panel.sensitivity(Channel::B), SensitivityLevel::FLOOR);
        assert_eq!(panel.inputs.sources(), &[InputSource::AAmplitude]);
    }

    #[test]
    fn test_to_settings_covers_every_knob() {
        let settings = PanelSettings::default().to_settings();
        assert_eq!(settings.len(), 13);
        assert!(settings.iter().all(|s| s.validate().is_ok()));
    }

    #[test]
    fn test_panel_settings_toml_roundtrip() {
        let mut panel = PanelSettings::default();
        panel.sweep_mode = SweepMode::StartAtAdjust;
        panel.adjust_hz = 1_200;
        panel.inputs =
            InputSelection::new(&[InputSource::BPhase, InputSource::APhase]).unwrap();

        let text = toml::to_string(&panel).unwrap();
        let parsed: PanelSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, panel);
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("half".parse::<ResolutionStrategy>(), Ok(ResolutionStrategy::Half));
        assert!("quarter".parse::<ResolutionStrategy>().is_err());
    }
}
