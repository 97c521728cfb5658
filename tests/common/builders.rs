//! Test data builders for creating test objects

use hp3582_control::types::{
    AcquisitionResult, AmplitudeScale, Derivation, InputSource, Trace, TraceQuantity,
};

/// Builder for creating test Traces
pub struct TraceBuilder {
    source: InputSource,
    scale: AmplitudeScale,
    derivation: Option<Derivation>,
    samples: Vec<f64>,
}

impl TraceBuilder {
    pub fn new(source: InputSource) -> Self {
        Self {
            source,
            scale: AmplitudeScale::TenDbPerDiv,
            derivation: None,
            samples: Vec::new(),
        }
    }

    pub fn scale(mut self, scale: AmplitudeScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn samples(mut self, samples: &[f64]) -> Self {
        self.samples = samples.to_vec();
        self
    }

    /// `n` copies of `value`
    pub fn constant(mut self, value: f64, n: usize) -> Self {
        self.samples = vec![value; n];
        self
    }

    pub fn build(self) -> Trace {
        Trace::new(
            self.source,
            TraceQuantity::for_source(self.source, self.scale),
            self.derivation
                .unwrap_or_else(|| Derivation::direct(self.source)),
            self.samples,
        )
    }
}

/// Pair traces with an evenly spaced axis from 0 to `upper_hz`
pub fn result_with_axis(traces: Vec<Trace>, upper_hz: f64) -> AcquisitionResult {
    let n = traces.first().map(Trace::len).unwrap_or_default();
    let axis = hp3582_control::analysis::linspace(0.0, upper_hz, n);
    AcquisitionResult::new(traces, axis).expect("traces and axis share a length")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_builder() {
        let trace = TraceBuilder::new(InputSource::BAmplitude)
            .scale(AmplitudeScale::Linear)
            .samples(&[1.0, 2.0])
            .build();

        assert_eq!(trace.label(), "B Amplitude (V)");
        assert_eq!(trace.derivation, Derivation::ChannelB);
        assert_eq!(trace.len(), 2);
    }
}
