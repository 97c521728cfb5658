//! Command encoder for the analyzer's positional text grammar
//!
//! Every string that reaches the instrument is produced here. Commands are
//! two-letter mnemonics followed by a decimal argument (`AS7`, `MD3`) or
//! three-letter words without one (`PRS`, `LDS`). Several commands may be
//! concatenated on one line, which the instrument executes in order.
//!
//! The mapping is pure and total: each [`Command`] encodes to exactly one
//! deterministic string and every argument type is already range-checked by
//! its constructor in [`crate::types`].

use crate::types::{
    AmplitudeScale, AveragingCount, AveragingType, Channel, Coupling, InputMode, InputSource,
    PassbandShape, ReferenceLevel, SensitivityLevel, SpanIndex, SweepMode, TraceSlot,
};
use std::fmt;

/// A single intent understood by the analyzer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Return every front-panel setting to its power-on state (`PRS`)
    Preset,
    /// Frequency sweep mode (`MDn`)
    SweepMode(SweepMode),
    /// Adjust frequency in Hz (`ADn`)
    Adjust(u32),
    /// Frequency span (`SPn`)
    Span(SpanIndex),
    /// Sensitivity of one channel (`ASn` / `BSn`)
    Sensitivity(Channel, SensitivityLevel),
    /// Sensitivity of both channels on one line (`ASnBSn`)
    Sensitivities {
        a: SensitivityLevel,
        b: SensitivityLevel,
    },
    /// Input mode plus the state of every display enable flag
    ///
    /// Sources not listed are explicitly switched off, so the resulting
    /// display state never depends on what was enabled before.
    SelectInputs {
        mode: InputMode,
        sources: Vec<InputSource>,
    },
    /// Averaging type (`AVn`)
    Averaging(AveragingType),
    /// Number of averages (`NUn`)
    AveragingCount(AveragingCount),
    /// Input coupling (`ACn` / `BCn`)
    Coupling(Channel, Coupling),
    /// Passband shape (`PSn`)
    Passband(PassbandShape),
    /// Vertical scale (`SCn`)
    AmplitudeScale(AmplitudeScale),
    /// Amplitude reference level (`AMn`)
    ReferenceLevel(ReferenceLevel),
    /// Number shift key (`SHn`)
    NumberShift(bool),
    /// Free-run trigger (`FRn`)
    FreeRun(bool),
    /// Repetitive sweeps (`RPn`)
    Repetitive(bool),
    /// Restart averaging (`RE`)
    RestartAveraging,
    /// Arm a single sweep (`AR`)
    Arm,
    /// Store the current display in a trace memory (`TS` / `RS`)
    StoreTrace(TraceSlot),
    /// Show or hide a stored trace (`TRn` / `RRn`)
    RecallTrace(TraceSlot, bool),
    /// Clear the status latch (`LST0`)
    ResetStatus,
    /// Request the status byte (`LST1`)
    ArmStatus,
    /// Read the displayed trace data as ASCII (`LDS`)
    ReadData,
    /// Read the alphanumeric display line (`LAN`)
    ReadAlphanumerics,
    /// Read the adjust frequency (`LAD`)
    ReadAdjust,
    /// Read the span in Hz (`LSP`)
    ReadSpan,
    /// Read the transfer-function sensitivity (`LXS`)
    ReadTransferSensitivity,
    /// Several commands sent as one line
    Sequence(Vec<Command>),
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

/// Enable-flag mnemonic for each source
fn source_mnemonic(source: InputSource) -> &'static str {
    match source {
        InputSource::AAmplitude => "AA",
        InputSource::APhase => "PA",
        InputSource::BAmplitude => "AB",
        InputSource::BPhase => "PB",
        InputSource::TransferAmplitude => "AX",
        InputSource::TransferPhase => "PX",
        InputSource::Coherence => "CH",
    }
}

impl Command {
    /// Encode to the wire string (without line terminator)
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut String) {
        use std::fmt::Write;

        // Writing into a String cannot fail
        let _ = match self {
            Command::Preset => write!(out, "PRS"),
            Command::SweepMode(mode) => write!(out, "MD{}", mode.code()),
            Command::Adjust(hz) => write!(out, "AD{}", hz),
            Command::Span(span) => write!(out, "SP{}", span.value()),
            Command::Sensitivity(Channel::A, level) => write!(out, "AS{}", level.value()),
            Command::Sensitivity(Channel::B, level) => write!(out, "BS{}", level.value()),
            Command::Sensitivities { a, b } => write!(out, "AS{}BS{}", a.value(), b.value()),
            Command::SelectInputs { mode, sources } => {
                let _ = write!(out, "IM{}", mode.code());
                for source in InputSource::ALL {
                    let _ = write!(
                        out,
                        "{}{}",
                        source_mnemonic(source),
                        flag(sources.contains(&source))
                    );
                }
                Ok(())
            }
            Command::Averaging(kind) => write!(out, "AV{}", kind.code()),
            Command::AveragingCount(count) => write!(out, "NU{}", count.code()),
            Command::Coupling(Channel::A, coupling) => write!(out, "AC{}", coupling.code()),
            Command::Coupling(Channel::B, coupling) => write!(out, "BC{}", coupling.code()),
            Command::Passband(shape) => write!(out, "PS{}", shape.code()),
            Command::AmplitudeScale(scale) => write!(out, "SC{}", scale.code()),
            Command::ReferenceLevel(level) => write!(out, "AM{}", level.code()),
            Command::NumberShift(on) => write!(out, "SH{}", flag(*on)),
            Command::FreeRun(on) => write!(out, "FR{}", flag(*on)),
            Command::Repetitive(on) => write!(out, "RP{}", flag(*on)),
            Command::RestartAveraging => write!(out, "RE"),
            Command::Arm => write!(out, "AR"),
            Command::StoreTrace(TraceSlot::One) => write!(out, "TS"),
            Command::StoreTrace(TraceSlot::Two) => write!(out, "RS"),
            Command::RecallTrace(TraceSlot::One, on) => write!(out, "TR{}", flag(*on)),
            Command::RecallTrace(TraceSlot::Two, on) => write!(out, "RR{}", flag(*on)),
            Command::ResetStatus => write!(out, "LST0"),
            Command::ArmStatus => write!(out, "LST1"),
            Command::ReadData => write!(out, "LDS"),
            Command::ReadAlphanumerics => write!(out, "LAN"),
            Command::ReadAdjust => write!(out, "LAD"),
            Command::ReadSpan => write!(out, "LSP"),
            Command::ReadTransferSensitivity => write!(out, "LXS"),
            Command::Sequence(commands) => {
                for command in commands {
                    command.encode_into(out);
                }
                Ok(())
            }
        };
    }

    /// Whether the instrument answers this command with a reply
    pub fn expects_reply(&self) -> bool {
        match self {
            Command::ArmStatus
            | Command::ReadData
            | Command::ReadAlphanumerics
            | Command::ReadAdjust
            | Command::ReadSpan
            | Command::ReadTransferSensitivity => true,
            Command::Sequence(commands) => commands.iter().any(Command::expects_reply),
            _ => false,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> SensitivityLevel {
        SensitivityLevel::new(n).unwrap()
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Preset.encode(), "PRS");
        assert_eq!(Command::SweepMode(SweepMode::Centered).encode(), "MD3");
        assert_eq!(Command::Adjust(12_000).encode(), "AD12000");
        assert_eq!(Command::Span(SpanIndex::WIDEST).encode(), "SP14");
        assert_eq!(Command::Averaging(AveragingType::Off).encode(), "AV1");
        assert_eq!(Command::RestartAveraging.encode(), "RE");
        assert_eq!(Command::ReadData.encode(), "LDS");
    }

    #[test]
    fn test_sensitivity_commands() {
        assert_eq!(Command::Sensitivity(Channel::A, level(7)).encode(), "AS7");
        assert_eq!(Command::Sensitivity(Channel::B, level(10)).encode(), "BS10");
        assert_eq!(
            Command::Sensitivities {
                a: level(3),
                b: level(4)
            }
            .encode(),
            "AS3BS4"
        );
    }

    #[test]
    fn test_select_inputs_sets_every_flag() {
        let cmd = Command::SelectInputs {
            mode: InputMode::ChannelB,
            sources: vec![InputSource::BAmplitude],
        };
        assert_eq!(cmd.encode(), "IM3AA0PA0AB1PB0AX0PX0CH0");

        let cmd = Command::SelectInputs {
            mode: InputMode::Dual,
            sources: vec![InputSource::APhase, InputSource::Coherence],
        };
        assert_eq!(cmd.encode(), "IM2AA0PA1AB0PB0AX0PX0CH1");
    }

    #[test]
    fn test_channel_specific_commands() {
        assert_eq!(Command::Coupling(Channel::A, Coupling::Dc).encode(), "AC2");
        assert_eq!(Command::Coupling(Channel::B, Coupling::Ac).encode(), "BC1");
        assert_eq!(Command::StoreTrace(TraceSlot::One).encode(), "TS");
        assert_eq!(Command::StoreTrace(TraceSlot::Two).encode(), "RS");
        assert_eq!(Command::RecallTrace(TraceSlot::One, true).encode(), "TR1");
        assert_eq!(Command::RecallTrace(TraceSlot::Two, false).encode(), "RR0");
    }

    #[test]
    fn test_reference_level_encoding() {
        let cmd = Command::ReferenceLevel(ReferenceLevel::new(-30).unwrap());
        assert_eq!(cmd.encode(), "AM4");
    }

    #[test]
    fn test_sequence_concatenates() {
        let cmd = Command::Sequence(vec![
            Command::Sensitivities {
                a: level(5),
                b: level(6),
            },
            Command::ResetStatus,
        ]);
        assert_eq!(cmd.encode(), "AS5BS6LST0");
        assert!(!cmd.expects_reply());
    }

    #[test]
    fn test_expects_reply() {
        assert!(Command::ReadSpan.expects_reply());
        assert!(Command::ArmStatus.expects_reply());
        assert!(!Command::ResetStatus.expects_reply());
        assert!(!Command::Preset.expects_reply());
    }
}
