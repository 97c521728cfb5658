//! Trace acquisition engine
//!
//! The analyzer exposes at most two sources at a time, in fixed pairings, so
//! some selections need more than one read. A selection is turned into an
//! [`AcquisitionPlan`] first, then executed against the link:
//!
//! | plan | when | reads |
//! |---|---|---|
//! | `Direct` | the device already exposes exactly the selection | one `LDS`, split in half for two sources |
//! | `Transfer` | a lone transfer amplitude/phase not exposed | A side then B side (full) or one dual read (half), then B/A or B-A |
//! | `Pair` | one A-side and one B-side quantity of the same kind | two single-channel reads (full) or one dual read (half) |
//! | `Reconfigure` | anything else | select inputs, settle, then `Direct` |
//!
//! The frequency axis is attached last and always has the trace length.

use super::analyzer::DeviceState;
use super::commands::Command;
use super::link::DeviceLink;
use crate::analysis::{self, phase_difference, ratio, split_halves};
use crate::config::{ResolutionStrategy, SweepSettings};
use crate::error::{AnalyzerError, Result, ResultExt};
use crate::types::{
    AcquisitionResult, Channel, Derivation, InputMode, InputSelection, InputSource, QuantityKind,
    Trace, TraceQuantity,
};

/// Where the frequency axis comes from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AxisSource {
    /// The sweep settings the controller last commanded
    #[default]
    Tracked,
    /// A caller-supplied snapshot
    Settings(SweepSettings),
    /// Read adjust (`LAD`) and span (`LSP`) back from the device
    Device,
}

/// What to acquire and how
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    pub selection: InputSelection,
    pub resolution: ResolutionStrategy,
    pub axis: AxisSource,
}

impl AcquisitionRequest {
    pub fn new(selection: InputSelection) -> Self {
        Self {
            selection,
            resolution: ResolutionStrategy::default(),
            axis: AxisSource::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: ResolutionStrategy) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_axis(mut self, axis: AxisSource) -> Self {
        self.axis = axis;
        self
    }
}

/// Command sequence chosen for a selection
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionPlan {
    /// One read of what is already exposed
    Direct,
    /// Derive a transfer quantity from an A-side and a B-side sweep
    Transfer {
        a: InputSource,
        b: InputSource,
        derived: InputSource,
        resolution: ResolutionStrategy,
    },
    /// Read an A-side and a B-side quantity as two traces
    Pair {
        a: InputSource,
        b: InputSource,
        resolution: ResolutionStrategy,
    },
    /// Expose the selection first, then read it directly
    Reconfigure { mode: InputMode },
}

/// Choose the plan for `selection` given what the device currently exposes
pub fn plan(
    selection: &InputSelection,
    exposed: &[InputSource],
    resolution: ResolutionStrategy,
) -> AcquisitionPlan {
    if selection.sources() == exposed {
        return AcquisitionPlan::Direct;
    }

    match selection.sources() {
        [derived] if derived.is_transfer() => {
            let kind = derived.kind();
            if let (Some(a), Some(b)) = (
                InputSource::on_channel(Channel::A, kind),
                InputSource::on_channel(Channel::B, kind),
            ) {
                return AcquisitionPlan::Transfer {
                    a,
                    b,
                    derived: *derived,
                    resolution,
                };
            }
        }
        [a, b]
            if a.channel() == Some(Channel::A)
                && b.channel() == Some(Channel::B)
                && a.kind() == b.kind() =>
        {
            return AcquisitionPlan::Pair {
                a: *a,
                b: *b,
                resolution,
            };
        }
        _ => {}
    }

    AcquisitionPlan::Reconfigure {
        mode: InputMode::covering(selection.sources()),
    }
}

/// Expose `sources` unless the device already shows exactly them
fn expose(
    link: &mut DeviceLink,
    state: &mut DeviceState,
    mode: InputMode,
    sources: &[InputSource],
) -> Result<()> {
    if state.input_mode == mode && state.exposed == sources {
        return Ok(());
    }
    link.send(&Command::SelectInputs {
        mode,
        sources: sources.to_vec(),
    })?;
    state.input_mode = mode;
    state.exposed = sources.to_vec();
    link.settle();
    Ok(())
}

fn read_data(link: &mut DeviceLink) -> Result<Vec<f64>> {
    link.query_values(&Command::ReadData)
}

/// Read one full-resolution sweep per channel
fn read_sequential(
    link: &mut DeviceLink,
    state: &mut DeviceState,
    a: InputSource,
    b: InputSource,
) -> Result<(Vec<f64>, Vec<f64>)> {
    expose(link, state, InputMode::ChannelA, &[a])?;
    let a_values = read_data(link).context("channel A sweep")?;
    link.settle();
    expose(link, state, InputMode::ChannelB, &[b])?;
    let b_values = read_data(link).context("channel B sweep")?;

    if a_values.len() != b_values.len() {
        return Err(AnalyzerError::Communication(format!(
            "sequential sweeps returned {} and {} samples",
            a_values.len(),
            b_values.len()
        )));
    }
    Ok((a_values, b_values))
}

/// Read both channels in one dual sweep and split it
fn read_dual(
    link: &mut DeviceLink,
    state: &mut DeviceState,
    a: InputSource,
    b: InputSource,
) -> Result<(Vec<f64>, Vec<f64>)> {
    expose(link, state, InputMode::Dual, &[a, b])?;
    let values = read_data(link).context("dual sweep")?;
    split_halves(&values)
}

fn read_pair(
    link: &mut DeviceLink,
    state: &mut DeviceState,
    a: InputSource,
    b: InputSource,
    resolution: ResolutionStrategy,
) -> Result<(Vec<f64>, Vec<f64>)> {
    match resolution {
        ResolutionStrategy::Full => read_sequential(link, state, a, b),
        ResolutionStrategy::Half => read_dual(link, state, a, b),
    }
}

/// Read whatever is exposed and label it with `sources`
fn read_direct(
    link: &mut DeviceLink,
    state: &DeviceState,
    sources: &[InputSource],
) -> Result<Vec<Trace>> {
    let values = read_data(link)?;
    let scale = state.amplitude_scale;
    let direct = |source: InputSource, samples: Vec<f64>| {
        Trace::new(
            source,
            TraceQuantity::for_source(source, scale),
            Derivation::direct(source),
            samples,
        )
    };

    match sources {
        [single] => Ok(vec![direct(*single, values)]),
        [first, second] => {
            let (head, tail) = split_halves(&values)?;
            Ok(vec![direct(*first, head), direct(*second, tail)])
        }
        _ => Err(AnalyzerError::InvalidParameter(format!(
            "cannot read {} sources at once",
            sources.len()
        ))),
    }
}

fn frequency_axis(
    link: &mut DeviceLink,
    state: &DeviceState,
    axis: &AxisSource,
    n: usize,
) -> Result<Vec<f64>> {
    match axis {
        AxisSource::Tracked => Ok(state.sweep.axis(n)),
        AxisSource::Settings(sweep) => Ok(sweep.axis(n)),
        AxisSource::Device => {
            let adjust = first_value(link, &Command::ReadAdjust)?;
            let span = first_value(link, &Command::ReadSpan)?;
            Ok(analysis::reconstruct(state.sweep.mode, span, adjust, n))
        }
    }
}

fn first_value(link: &mut DeviceLink, command: &Command) -> Result<f64> {
    let values = link.query_values(command)?;
    // query_values never returns an empty vector
    Ok(values.first().copied().unwrap_or_default())
}

/// Execute `request` against the link, updating the tracked exposure
pub fn acquire(
    link: &mut DeviceLink,
    state: &mut DeviceState,
    request: &AcquisitionRequest,
) -> Result<AcquisitionResult> {
    let plan = plan(&request.selection, &state.exposed, request.resolution);
    tracing::info!(
        "Acquiring {:?} with plan {:?}",
        request.selection.sources(),
        plan
    );
    let scale = state.amplitude_scale;

    let traces = match plan {
        AcquisitionPlan::Direct => read_direct(link, state, request.selection.sources())?,
        AcquisitionPlan::Reconfigure { mode } => {
            expose(link, state, mode, request.selection.sources())?;
            read_direct(link, state, request.selection.sources())?
        }
        AcquisitionPlan::Transfer {
            a,
            b,
            derived,
            resolution,
        } => {
            let (a_values, b_values) = read_pair(link, state, a, b, resolution)?;
            let (samples, derivation) = match derived.kind() {
                QuantityKind::Phase => (
                    phase_difference(&a_values, &b_values)?,
                    Derivation::PhaseDifference,
                ),
                _ => (ratio(&a_values, &b_values)?, Derivation::Ratio),
            };
            vec![Trace::new(
                derived,
                TraceQuantity::for_source(derived, scale),
                derivation,
                samples,
            )]
        }
        AcquisitionPlan::Pair { a, b, resolution } => {
            let (a_values, b_values) = read_pair(link, state, a, b, resolution)?;
            vec![
                Trace::new(
                    a,
                    TraceQuantity::for_source(a, scale),
                    Derivation::ChannelA,
                    a_values,
                ),
                Trace::new(
                    b,
                    TraceQuantity::for_source(b, scale),
                    Derivation::ChannelB,
                    b_values,
                ),
            ]
        }
    };

    let n = traces.first().map(Trace::len).unwrap_or_default();
    let frequencies = frequency_axis(link, state, &request.axis, n)?;
    AcquisitionResult::new(traces, frequencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::link::SettlePolicy;
    use crate::backend::simulator::SimulatedAnalyzer;
    use crate::types::AmplitudeScale;

    fn selection(sources: &[InputSource]) -> InputSelection {
        InputSelection::new(sources).unwrap()
    }

    #[test]
    fn test_plan_direct_when_exposed() {
        let sel = selection(&[InputSource::AAmplitude, InputSource::BAmplitude]);
        let exposed = [InputSource::AAmplitude, InputSource::BAmplitude];
        assert_eq!(
            plan(&sel, &exposed, ResolutionStrategy::Full),
            AcquisitionPlan::Direct
        );
    }

    #[test]
    fn test_plan_transfer() {
        let sel = selection(&[InputSource::TransferPhase]);
        assert_eq!(
            plan(&sel, &[InputSource::AAmplitude], ResolutionStrategy::Half),
            AcquisitionPlan::Transfer {
                a: InputSource::APhase,
                b: InputSource::BPhase,
                derived: InputSource::TransferPhase,
                resolution: ResolutionStrategy::Half,
            }
        );
    }

    #[test]
    fn test_plan_pair_requires_same_kind() {
        let exposed = [InputSource::AAmplitude];
        let pair = selection(&[InputSource::AAmplitude, InputSource::BAmplitude]);
        assert!(matches!(
            plan(&pair, &exposed, ResolutionStrategy::Full),
            AcquisitionPlan::Pair { .. }
        ));

        let mixed = selection(&[InputSource::AAmplitude, InputSource::BPhase]);
        assert_eq!(
            plan(&mixed, &exposed, ResolutionStrategy::Full),
            AcquisitionPlan::Reconfigure {
                mode: InputMode::Dual
            }
        );
    }

    #[test]
    fn test_plan_reconfigure_single_channel() {
        let sel = selection(&[InputSource::BAmplitude]);
        assert_eq!(
            plan(&sel, &[InputSource::AAmplitude], ResolutionStrategy::Full),
            AcquisitionPlan::Reconfigure {
                mode: InputMode::ChannelB
            }
        );
    }

    #[test]
    fn test_transfer_full_reads_both_channels() {
        let sim = SimulatedAnalyzer::new()
            .with_signal(Channel::A, 2.0)
            .with_signal(Channel::B, 1.0);
        let handle = sim.clone();
        let mut link = DeviceLink::new(Box::new(sim), SettlePolicy::instant());
        let mut state = DeviceState::default();
        state.amplitude_scale = AmplitudeScale::Linear;
        link.send(&Command::AmplitudeScale(AmplitudeScale::Linear))
            .unwrap();

        let request = AcquisitionRequest::new(InputSelection::single(
            InputSource::TransferAmplitude,
        ));
        let result = acquire(&mut link, &mut state, &request).unwrap();

        let trace = &result.traces()[0];
        assert_eq!(trace.derivation, Derivation::Ratio);
        assert_eq!(trace.len(), 128);
        assert!(trace.samples.iter().all(|v| (v - 0.5).abs() < 1e-4));
        // Already exposing A amplitude after preset, so only B is selected
        assert!(handle
            .history()
            .contains(&"IM3AA0PA0AB1PB0AX0PX0CH0".to_string()));
        assert_eq!(state.exposed, vec![InputSource::BAmplitude]);
    }
}
