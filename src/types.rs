//! Core data types for the analyzer controller
//!
//! This module contains the value types that flow between the controller,
//! its engines and the callers: channel identities, front-panel enumerations,
//! input selections, traces and acquisition results.
//!
//! # Main Types
//!
//! - [`Channel`] / [`SensitivityLevel`] - Input channels and their full-scale ranges
//! - [`SweepMode`] / [`SpanIndex`] - Frequency sweep configuration
//! - [`InputSource`] / [`InputSelection`] - Which quantities are displayed/read
//! - [`Trace`] - One labelled sequence of samples
//! - [`AcquisitionResult`] - One or two traces sharing a frequency axis
//!
//! # Sensitivity Table
//!
//! Levels map onto a fixed table of input ranges. Level 1 is the calibration
//! position and is never chosen by auto-ranging:
//!
//! | level | range |
//! |---|---|
//! | 1 | CAL |
//! | 2 | 30 V, +30 dBV |
//! | 3 | 10 V, +20 dBV |
//! | ... | ... |
//! | 10 | 3 mV, -50 dBV |

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of samples in one full sweep
pub const DEFAULT_SWEEP_POINTS: usize = 128;

/// Highest frequency of the fixed 0-25 kHz sweep
pub const FIXED_SWEEP_UPPER_HZ: f64 = 25_000.0;

/// Highest frequency accepted by the adjust control
pub const MAX_ADJUST_HZ: u32 = 24_999;

/// Human readable labels for each sensitivity level, indexed by `level - 1`
pub const SENSITIVITY_LABELS: [&str; 10] = [
    "CAL",
    "30 V, +30 dBV",
    "10 V, +20 dBV",
    "3 V, +10 dBV",
    "1 V, +0 dBV",
    ".3 V, -10 dBV",
    ".1 V, -20 dBV",
    "30 mV, -30 dBV",
    "10 mV, -40 dBV",
    "3 mV, -50 dBV",
];

/// Full-scale voltage for levels 2..=10
const FULL_SCALE_VOLTS: [f64; 9] = [30.0, 10.0, 3.0, 1.0, 0.3, 0.1, 0.03, 0.01, 0.003];

/// Span selections in front-panel order, indexed by `span index - 1`
pub const SPAN_TOKENS: [&str; 14] = [
    "1Hz", "2.5Hz", "5Hz", "10Hz", "25Hz", "50Hz", "100Hz", "250Hz", "500Hz", "1kHz", "2.5kHz",
    "5kHz", "10kHz", "25kHz",
];

// ==================== Channels ====================

/// One of the two analyzer inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::A => write!(f, "A"),
            Channel::B => write!(f, "B"),
        }
    }
}

/// Index into the fixed table of input ranges (1..=10)
///
/// Higher levels are more sensitive (smaller full-scale range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SensitivityLevel(u8);

impl SensitivityLevel {
    /// Calibration position
    pub const MIN: u8 = 1;
    /// Most sensitive range (3 mV)
    pub const MAX: u8 = 10;
    /// Least sensitive measuring range; auto-ranging starts here
    pub const FLOOR: SensitivityLevel = SensitivityLevel(2);

    /// Validate and wrap a raw level
    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(AnalyzerError::InvalidParameter(format!(
                "sensitivity must be between {}-{}, got {}",
                Self::MIN,
                Self::MAX,
                level
            )))
        }
    }

    /// Raw level as sent on the wire
    pub fn value(self) -> u8 {
        self.0
    }

    /// Front-panel label for this range
    pub fn label(self) -> &'static str {
        SENSITIVITY_LABELS[(self.0 - 1) as usize]
    }

    /// Full-scale input voltage, `None` for the calibration position
    pub fn full_scale_volts(self) -> Option<f64> {
        match self.0 {
            1 => None,
            n => Some(FULL_SCALE_VOLTS[(n - 2) as usize]),
        }
    }

    /// One step more sensitive, if still in range
    pub fn more_sensitive(self) -> Option<Self> {
        Self::new(self.0 + 1).ok()
    }

    /// One step less sensitive, if still in range
    pub fn less_sensitive(self) -> Option<Self> {
        self.0.checked_sub(1).and_then(|n| Self::new(n).ok())
    }
}

impl Default for SensitivityLevel {
    fn default() -> Self {
        Self::FLOOR
    }
}

impl TryFrom<u8> for SensitivityLevel {
    type Error = AnalyzerError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SensitivityLevel> for u8 {
    fn from(level: SensitivityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Input coupling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coupling {
    #[default]
    Ac,
    Dc,
}

impl Coupling {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Coupling::Ac => 1,
            Coupling::Dc => 2,
        }
    }
}

// ==================== Sweep ====================

/// How the frequency axis of a sweep is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepMode {
    /// 0 to 25 kHz regardless of span
    #[default]
    Fixed25k,
    /// 0 to the selected span
    ZeroToSpan,
    /// Span centred on the adjust frequency
    Centered,
    /// Span starting at the adjust frequency
    StartAtAdjust,
}

impl SweepMode {
    /// Wire code (`MDn`)
    pub fn code(self) -> u8 {
        match self {
            SweepMode::Fixed25k => 1,
            SweepMode::ZeroToSpan => 2,
            SweepMode::Centered => 3,
            SweepMode::StartAtAdjust => 4,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(SweepMode::Fixed25k),
            2 => Ok(SweepMode::ZeroToSpan),
            3 => Ok(SweepMode::Centered),
            4 => Ok(SweepMode::StartAtAdjust),
            _ => Err(AnalyzerError::InvalidParameter(format!(
                "MD must be between 1-4, got {}",
                code
            ))),
        }
    }

    /// Whether the adjust frequency has any effect in this mode
    pub fn uses_adjust(self) -> bool {
        matches!(self, SweepMode::Centered | SweepMode::StartAtAdjust)
    }
}

impl FromStr for SweepMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "fixed" | "0-25k" => Ok(SweepMode::Fixed25k),
            "2" | "span" | "0-span" => Ok(SweepMode::ZeroToSpan),
            "3" | "center" | "centered" => Ok(SweepMode::Centered),
            "4" | "start" => Ok(SweepMode::StartAtAdjust),
            other => Err(format!("unknown sweep mode '{}'", other)),
        }
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::Fixed25k => write!(f, "0-25kHz"),
            SweepMode::ZeroToSpan => write!(f, "0-Span"),
            SweepMode::Centered => write!(f, "Adjust Center, Span"),
            SweepMode::StartAtAdjust => write!(f, "Adjust Start, Span"),
        }
    }
}

/// Span selection (1..=14), see [`SPAN_TOKENS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SpanIndex(u8);

impl SpanIndex {
    /// The widest span (25 kHz), selected by preset
    pub const WIDEST: SpanIndex = SpanIndex(14);

    /// Validate and wrap a span index
    pub fn new(index: u8) -> Result<Self> {
        if (1..=SPAN_TOKENS.len() as u8).contains(&index) {
            Ok(Self(index))
        } else {
            Err(AnalyzerError::InvalidParameter(format!(
                "SP must be between 1-{}, got {}",
                SPAN_TOKENS.len(),
                index
            )))
        }
    }

    /// Look up the index for a front-panel token such as `"2.5kHz"`
    pub fn from_token(token: &str) -> Result<Self> {
        SPAN_TOKENS
            .iter()
            .position(|t| t.eq_ignore_ascii_case(token.trim()))
            .map(|i| Self(i as u8 + 1))
            .ok_or_else(|| AnalyzerError::InvalidParameter(format!("unknown span '{}'", token)))
    }

    /// Raw index as sent on the wire
    pub fn value(self) -> u8 {
        self.0
    }

    /// Front-panel token
    pub fn token(self) -> &'static str {
        SPAN_TOKENS[(self.0 - 1) as usize]
    }
}

impl Default for SpanIndex {
    fn default() -> Self {
        Self::WIDEST
    }
}

impl TryFrom<u8> for SpanIndex {
    type Error = AnalyzerError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SpanIndex> for u8 {
    fn from(span: SpanIndex) -> Self {
        span.0
    }
}

// ==================== Inputs ====================

/// Channel pairing the analyzer digitises (`IMn`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Channel A only
    #[default]
    ChannelA,
    /// Both channels, each at half resolution
    Dual,
    /// Channel B only
    ChannelB,
}

impl InputMode {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            InputMode::ChannelA => 1,
            InputMode::Dual => 2,
            InputMode::ChannelB => 3,
        }
    }

    /// Input mode able to expose every source in `sources`
    pub fn covering(sources: &[InputSource]) -> Self {
        let sides: Vec<Option<Channel>> = sources.iter().map(|s| s.channel()).collect();
        if sides.iter().all(|s| *s == Some(Channel::A)) {
            InputMode::ChannelA
        } else if sides.iter().all(|s| *s == Some(Channel::B)) {
            InputMode::ChannelB
        } else {
            InputMode::Dual
        }
    }
}

/// Which kind of value a source carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuantityKind {
    Amplitude,
    Phase,
    Coherence,
}

/// A displayable/readable signal source, in canonical display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputSource {
    AAmplitude,
    APhase,
    BAmplitude,
    BPhase,
    TransferAmplitude,
    TransferPhase,
    Coherence,
}

impl InputSource {
    /// Every source in canonical order
    pub const ALL: [InputSource; 7] = [
        InputSource::AAmplitude,
        InputSource::APhase,
        InputSource::BAmplitude,
        InputSource::BPhase,
        InputSource::TransferAmplitude,
        InputSource::TransferPhase,
        InputSource::Coherence,
    ];

    /// Channel the source belongs to; `None` for two-channel quantities
    pub fn channel(self) -> Option<Channel> {
        match self {
            InputSource::AAmplitude | InputSource::APhase => Some(Channel::A),
            InputSource::BAmplitude | InputSource::BPhase => Some(Channel::B),
            _ => None,
        }
    }

    /// Kind of value carried by the source
    pub fn kind(self) -> QuantityKind {
        match self {
            InputSource::AAmplitude | InputSource::BAmplitude | InputSource::TransferAmplitude => {
                QuantityKind::Amplitude
            }
            InputSource::APhase | InputSource::BPhase | InputSource::TransferPhase => {
                QuantityKind::Phase
            }
            InputSource::Coherence => QuantityKind::Coherence,
        }
    }

    /// The single-channel source of `kind` on `channel`
    pub fn on_channel(channel: Channel, kind: QuantityKind) -> Option<Self> {
        match (channel, kind) {
            (Channel::A, QuantityKind::Amplitude) => Some(InputSource::AAmplitude),
            (Channel::A, QuantityKind::Phase) => Some(InputSource::APhase),
            (Channel::B, QuantityKind::Amplitude) => Some(InputSource::BAmplitude),
            (Channel::B, QuantityKind::Phase) => Some(InputSource::BPhase),
            (_, QuantityKind::Coherence) => None,
        }
    }

    /// Whether this is a transfer-function quantity
    pub fn is_transfer(self) -> bool {
        matches!(
            self,
            InputSource::TransferAmplitude | InputSource::TransferPhase
        )
    }

    /// Front-panel name
    pub fn name(self) -> &'static str {
        match self {
            InputSource::AAmplitude => "A Amplitude",
            InputSource::APhase => "A Phase",
            InputSource::BAmplitude => "B Amplitude",
            InputSource::BPhase => "B Phase",
            InputSource::TransferAmplitude => "Transfer Amplitude",
            InputSource::TransferPhase => "Transfer Phase",
            InputSource::Coherence => "Coherence",
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "a-amp" | "a-amplitude" => Ok(InputSource::AAmplitude),
            "a-phase" => Ok(InputSource::APhase),
            "b" | "b-amp" | "b-amplitude" => Ok(InputSource::BAmplitude),
            "b-phase" => Ok(InputSource::BPhase),
            "transfer" | "transfer-amp" | "transfer-amplitude" => {
                Ok(InputSource::TransferAmplitude)
            }
            "transfer-phase" => Ok(InputSource::TransferPhase),
            "coherence" => Ok(InputSource::Coherence),
            other => Err(format!("unknown input source '{}'", other)),
        }
    }
}

/// One or two simultaneously active sources, kept in canonical order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<InputSource>", into = "Vec<InputSource>")]
pub struct InputSelection(Vec<InputSource>);

impl InputSelection {
    /// Maximum number of concurrently active sources
    pub const MAX_SOURCES: usize = 2;

    /// Build a selection, rejecting empty, oversized or duplicated sets
    pub fn new(sources: &[InputSource]) -> Result<Self> {
        let mut sorted = sources.to_vec();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != sources.len() {
            return Err(AnalyzerError::InvalidParameter(
                "input selection contains duplicate sources".to_string(),
            ));
        }
        if sorted.is_empty() || sorted.len() > Self::MAX_SOURCES {
            return Err(AnalyzerError::InvalidParameter(format!(
                "input selection must hold 1 or 2 sources, got {}",
                sorted.len()
            )));
        }
        Ok(Self(sorted))
    }

    /// Selection with a single source
    pub fn single(source: InputSource) -> Self {
        Self(vec![source])
    }

    /// Sources in canonical order
    pub fn sources(&self) -> &[InputSource] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, source: InputSource) -> bool {
        self.0.contains(&source)
    }
}

impl Default for InputSelection {
    fn default() -> Self {
        Self::single(InputSource::AAmplitude)
    }
}

impl TryFrom<Vec<InputSource>> for InputSelection {
    type Error = AnalyzerError;

    fn try_from(value: Vec<InputSource>) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<InputSelection> for Vec<InputSource> {
    fn from(selection: InputSelection) -> Self {
        selection.0
    }
}

// ==================== Front-panel settings ====================

/// Vertical display scale (`SCn`); decides the amplitude unit of replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmplitudeScale {
    Linear,
    #[default]
    TenDbPerDiv,
    TwentyDbPerDiv,
}

impl AmplitudeScale {
    pub fn code(self) -> u8 {
        match self {
            AmplitudeScale::Linear => 1,
            AmplitudeScale::TenDbPerDiv => 2,
            AmplitudeScale::TwentyDbPerDiv => 3,
        }
    }

    /// Unit amplitude replies are expressed in
    pub fn unit(self) -> AmplitudeUnit {
        match self {
            AmplitudeScale::Linear => AmplitudeUnit::Volts,
            _ => AmplitudeUnit::Decibels,
        }
    }
}

/// Averaging type (`AVn`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AveragingType {
    #[default]
    Off,
    Rms,
    Time,
    Peak,
}

impl AveragingType {
    pub fn code(self) -> u8 {
        match self {
            AveragingType::Off => 1,
            AveragingType::Rms => 2,
            AveragingType::Time => 3,
            AveragingType::Peak => 4,
        }
    }
}

/// Number of averages (`NUn`): 4/64, 8/128, 16/256, 32/Exp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AveragingCount {
    #[default]
    Four,
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl AveragingCount {
    pub fn code(self) -> u8 {
        match self {
            AveragingCount::Four => 1,
            AveragingCount::Eight => 2,
            AveragingCount::Sixteen => 3,
            AveragingCount::ThirtyTwo => 4,
        }
    }
}

/// Passband (window) shape (`PSn`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassbandShape {
    #[default]
    Flattop,
    Hanning,
    Uniform,
}

impl PassbandShape {
    pub fn code(self) -> u8 {
        match self {
            PassbandShape::Flattop => 1,
            PassbandShape::Hanning => 2,
            PassbandShape::Uniform => 3,
        }
    }
}

impl fmt::Display for PassbandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassbandShape::Flattop => write!(f, "Flattop"),
            PassbandShape::Hanning => write!(f, "Hanning"),
            PassbandShape::Uniform => write!(f, "Uniform"),
        }
    }
}

/// Amplitude reference level in dB: 0 down to -80 in 10 dB steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct ReferenceLevel(i8);

impl ReferenceLevel {
    pub fn new(db: i8) -> Result<Self> {
        if (-80..=0).contains(&db) && db % 10 == 0 {
            Ok(Self(db))
        } else {
            Err(AnalyzerError::InvalidParameter(format!(
                "reference level must be 0 to -80 dB in 10 dB steps, got {}",
                db
            )))
        }
    }

    pub fn db(self) -> i8 {
        self.0
    }

    /// Wire code (`AMn`): 0 dB is 1, -80 dB is 9
    pub fn code(self) -> u8 {
        (self.0 / -10) as u8 + 1
    }
}

impl TryFrom<i8> for ReferenceLevel {
    type Error = AnalyzerError;

    fn try_from(value: i8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ReferenceLevel> for i8 {
    fn from(level: ReferenceLevel) -> Self {
        level.0
    }
}

/// One of the two trace memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceSlot {
    One,
    Two,
}

// ==================== Traces ====================

/// Unit of amplitude samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmplitudeUnit {
    Volts,
    Decibels,
}

/// Semantic label of a trace's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceQuantity {
    Amplitude(AmplitudeUnit),
    Phase,
    Coherence,
}

impl TraceQuantity {
    /// Quantity of `source` under the given amplitude scale
    pub fn for_source(source: InputSource, scale: AmplitudeScale) -> Self {
        match source.kind() {
            QuantityKind::Amplitude => TraceQuantity::Amplitude(scale.unit()),
            QuantityKind::Phase => TraceQuantity::Phase,
            QuantityKind::Coherence => TraceQuantity::Coherence,
        }
    }

    /// Short unit string
    pub fn unit(self) -> &'static str {
        match self {
            TraceQuantity::Amplitude(AmplitudeUnit::Volts) => "V",
            TraceQuantity::Amplitude(AmplitudeUnit::Decibels) => "dB",
            TraceQuantity::Phase => "Deg",
            TraceQuantity::Coherence => "UL",
        }
    }

    /// Axis label including the unit, e.g. `Amplitude (dB)`
    pub fn axis_label(self) -> &'static str {
        match self {
            TraceQuantity::Amplitude(AmplitudeUnit::Volts) => "Amplitude (V)",
            TraceQuantity::Amplitude(AmplitudeUnit::Decibels) => "Amplitude (dB)",
            TraceQuantity::Phase => "Phase (Deg)",
            TraceQuantity::Coherence => "Coherence (UL)",
        }
    }
}

/// Where a trace's samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Derivation {
    /// Raw channel A reply
    ChannelA,
    /// Raw channel B reply
    ChannelB,
    /// Element-wise B / A of two amplitude sweeps
    Ratio,
    /// Element-wise B - A of two phase sweeps
    PhaseDifference,
    /// Computed by the analyzer itself (transfer, coherence)
    Instrument,
}

impl Derivation {
    /// Derivation of a value read directly for `source`
    pub fn direct(source: InputSource) -> Self {
        match source.channel() {
            Some(Channel::A) => Derivation::ChannelA,
            Some(Channel::B) => Derivation::ChannelB,
            None => Derivation::Instrument,
        }
    }
}

/// An ordered sequence of samples with its meaning attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub source: InputSource,
    pub quantity: TraceQuantity,
    pub derivation: Derivation,
    pub samples: Vec<f64>,
}

impl Trace {
    pub fn new(
        source: InputSource,
        quantity: TraceQuantity,
        derivation: Derivation,
        samples: Vec<f64>,
    ) -> Self {
        Self {
            source,
            quantity,
            derivation,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Column label, e.g. `A Amplitude (dB)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.source.name(), self.quantity.unit())
    }
}

/// One or two traces sharing exactly one frequency axis
///
/// The axis always has the same length as every trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionResult {
    traces: Vec<Trace>,
    frequencies: Vec<f64>,
}

impl AcquisitionResult {
    /// Pair traces with an axis, checking the shared-length invariant
    pub fn new(traces: Vec<Trace>, frequencies: Vec<f64>) -> Result<Self> {
        if traces.is_empty() || traces.len() > InputSelection::MAX_SOURCES {
            return Err(AnalyzerError::InvalidParameter(format!(
                "an acquisition holds 1 or 2 traces, got {}",
                traces.len()
            )));
        }
        if let Some(t) = traces.iter().find(|t| t.len() != frequencies.len()) {
            return Err(AnalyzerError::Communication(format!(
                "trace '{}' has {} samples but the axis has {}",
                t.label(),
                t.len(),
                frequencies.len()
            )));
        }
        Ok(Self {
            traces,
            frequencies,
        })
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Number of samples per trace
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// First trace carrying `source`, if any
    pub fn trace(&self, source: InputSource) -> Option<&Trace> {
        self.traces.iter().find(|t| t.source == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitivity_bounds() {
        assert!(SensitivityLevel::new(0).is_err());
        assert!(SensitivityLevel::new(11).is_err());
        assert_eq!(SensitivityLevel::new(10).unwrap().value(), 10);
        assert_eq!(SensitivityLevel::FLOOR.label(), "30 V, +30 dBV");
        assert_eq!(SensitivityLevel::new(1).unwrap().full_scale_volts(), None);
        assert_eq!(
            SensitivityLevel::new(10).unwrap().full_scale_volts(),
            Some(0.003)
        );
    }

    #[test]
    fn test_sensitivity_steps() {
        let top = SensitivityLevel::new(10).unwrap();
        assert!(top.more_sensitive().is_none());
        assert_eq!(top.less_sensitive().unwrap().value(), 9);
        assert!(SensitivityLevel::new(1).unwrap().less_sensitive().is_none());
    }

    #[test]
    fn test_span_tokens() {
        assert_eq!(SpanIndex::WIDEST.token(), "25kHz");
        assert_eq!(SpanIndex::from_token("2.5kHz").unwrap().value(), 11);
        assert!(SpanIndex::new(15).is_err());
        assert!(SpanIndex::from_token("3kHz").is_err());
    }

    #[test]
    fn test_selection_is_canonical() {
        let sel =
            InputSelection::new(&[InputSource::Coherence, InputSource::AAmplitude]).unwrap();
        assert_eq!(
            sel.sources(),
            &[InputSource::AAmplitude, InputSource::Coherence]
        );
    }

    #[test]
    fn test_selection_cardinality() {
        assert!(InputSelection::new(&[]).is_err());
        assert!(InputSelection::new(&[
            InputSource::AAmplitude,
            InputSource::BAmplitude,
            InputSource::Coherence
        ])
        .is_err());
        assert!(InputSelection::new(&[InputSource::APhase, InputSource::APhase]).is_err());
    }

    #[test]
    fn test_input_mode_covering() {
        assert_eq!(
            InputMode::covering(&[InputSource::AAmplitude, InputSource::APhase]),
            InputMode::ChannelA
        );
        assert_eq!(
            InputMode::covering(&[InputSource::BPhase]),
            InputMode::ChannelB
        );
        assert_eq!(
            InputMode::covering(&[InputSource::AAmplitude, InputSource::BAmplitude]),
            InputMode::Dual
        );
        assert_eq!(
            InputMode::covering(&[InputSource::TransferAmplitude]),
            InputMode::Dual
        );
    }

    #[test]
    fn test_reference_level_codes() {
        assert_eq!(ReferenceLevel::new(0).unwrap().code(), 1);
        assert_eq!(ReferenceLevel::new(-80).unwrap().code(), 9);
        assert!(ReferenceLevel::new(-85).is_err());
        assert!(ReferenceLevel::new(10).is_err());
    }

    #[test]
    fn test_trace_label() {
        let trace = Trace::new(
            InputSource::AAmplitude,
            TraceQuantity::Amplitude(AmplitudeUnit::Decibels),
            Derivation::ChannelA,
            vec![0.0; 4],
        );
        assert_eq!(trace.label(), "A Amplitude (dB)");
    }

    #[test]
    fn test_acquisition_result_length_invariant() {
        let trace = Trace::new(
            InputSource::AAmplitude,
            TraceQuantity::Phase,
            Derivation::ChannelA,
            vec![0.0; 4],
        );
        assert!(AcquisitionResult::new(vec![trace.clone()], vec![0.0; 3]).is_err());
        let ok = AcquisitionResult::new(vec![trace], vec![0.0; 4]).unwrap();
        assert_eq!(ok.len(), 4);
    }
}
