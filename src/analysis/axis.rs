//! Frequency axis reconstruction
//!
//! The analyzer reports trace data without abscissa values. The axis is
//! rebuilt from the sweep mode, the span and the adjust frequency as a set of
//! evenly spaced points whose first and last values are exactly the sweep
//! bounds.

use crate::error::{AnalyzerError, Result};
use crate::types::{SpanIndex, SweepMode, FIXED_SWEEP_UPPER_HZ};

/// Lower and upper frequency of a sweep in Hz
pub fn sweep_bounds(mode: SweepMode, span_hz: f64, adjust_hz: f64) -> (f64, f64) {
    match mode {
        SweepMode::Fixed25k => (0.0, FIXED_SWEEP_UPPER_HZ),
        SweepMode::ZeroToSpan => (0.0, span_hz),
        SweepMode::Centered => (adjust_hz - span_hz / 2.0, adjust_hz + span_hz / 2.0),
        SweepMode::StartAtAdjust => (adjust_hz, adjust_hz + span_hz),
    }
}

/// `n` evenly spaced values from `lower` to `upper`, both included exactly
pub fn linspace(lower: f64, upper: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let step = (upper - lower) / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| lower + step * i as f64).collect();
            // Accumulated rounding must not move the upper bound
            points[n - 1] = upper;
            points
        }
    }
}

/// Build the frequency axis for a sweep of `n` points
pub fn reconstruct(mode: SweepMode, span_hz: f64, adjust_hz: f64, n: usize) -> Vec<f64> {
    let (lower, upper) = sweep_bounds(mode, span_hz, adjust_hz);
    linspace(lower, upper, n)
}

/// Parse a front-panel span token such as `"2.5kHz"` into Hz
///
/// Accepts an optional `k` multiplier before the `Hz` suffix. Case of the
/// suffix is ignored and surrounding whitespace is trimmed.
pub fn parse_span_token(token: &str) -> Result<f64> {
    let invalid = || AnalyzerError::InvalidParameter(format!("invalid span token '{}'", token));

    let trimmed = token.trim();
    let lower = trimmed.to_ascii_lowercase();
    let body = lower.strip_suffix("hz").ok_or_else(invalid)?;
    let (number, multiplier) = match body.strip_suffix('k') {
        Some(number) => (number, 1_000.0),
        None => (body, 1.0),
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value * multiplier)
}

/// Span in Hz for a span index
pub fn span_hz(span: SpanIndex) -> f64 {
    // Every entry of the span table is a well-formed token
    parse_span_token(span.token()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SPAN_TOKENS;

    #[test]
    fn test_fixed_mode_ignores_span() {
        let axis = reconstruct(SweepMode::Fixed25k, 1_000.0, 5_000.0, 128);
        assert_eq!(axis.len(), 128);
        assert_eq!(axis[0], 0.0);
        assert_eq!(axis[127], 25_000.0);
    }

    #[test]
    fn test_zero_to_span() {
        let axis = reconstruct(SweepMode::ZeroToSpan, 250.0, 0.0, 5);
        assert_eq!(axis, vec![0.0, 62.5, 125.0, 187.5, 250.0]);
    }

    #[test]
    fn test_centered_on_adjust() {
        let axis = reconstruct(SweepMode::Centered, 1_000.0, 10_000.0, 64);
        assert_eq!(axis[0], 9_500.0);
        assert_eq!(axis[63], 10_500.0);
    }

    #[test]
    fn test_start_at_adjust() {
        let axis = reconstruct(SweepMode::StartAtAdjust, 2_500.0, 12_000.0, 128);
        assert_eq!(axis[0], 12_000.0);
        assert_eq!(axis[127], 14_500.0);
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(linspace(0.0, 10.0, 0).is_empty());
        assert_eq!(linspace(3.0, 10.0, 1), vec![3.0]);
    }

    #[test]
    fn test_parse_span_tokens() {
        assert_eq!(parse_span_token("2.5kHz").unwrap(), 2_500.0);
        assert_eq!(parse_span_token("100Hz").unwrap(), 100.0);
        assert_eq!(parse_span_token("25kHz").unwrap(), 25_000.0);
        assert_eq!(parse_span_token("1Hz").unwrap(), 1.0);
        assert_eq!(parse_span_token(" 2.5Hz ").unwrap(), 2.5);
    }

    #[test]
    fn test_parse_span_rejects_garbage() {
        assert!(parse_span_token("").is_err());
        assert!(parse_span_token("kHz").is_err());
        assert!(parse_span_token("25k").is_err());
        assert!(parse_span_token("-5Hz").is_err());
        assert!(parse_span_token("abcHz").is_err());
    }

    #[test]
    fn test_span_table_is_increasing() {
        let spans: Vec<f64> = SPAN_TOKENS
            .iter()
            .map(|t| parse_span_token(t).unwrap())
            .collect();
        assert!(spans.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(span_hz(SpanIndex::WIDEST), 25_000.0);
    }

    use proptest::prelude::*;

    fn any_mode() -> impl Strategy<Value = SweepMode> {
        prop_oneof![
            Just(SweepMode::Fixed25k),
            Just(SweepMode::ZeroToSpan),
            Just(SweepMode::Centered),
            Just(SweepMode::StartAtAdjust),
        ]
    }

    proptest! {
        #[test]
        fn test_axis_monotone_with_exact_endpoints(
            mode in any_mode(),
            span_idx in 1u8..=14,
            adjust in 0u32..=24_999,
            n in 2usize..512,
        ) {
            let span = span_hz(SpanIndex::new(span_idx).unwrap());
            let adjust = adjust as f64;
            let axis = reconstruct(mode, span, adjust, n);
            let (lower, upper) = sweep_bounds(mode, span, adjust);

            prop_assert_eq!(axis.len(), n);
            prop_assert_eq!(axis[0], lower);
            prop_assert_eq!(axis[n - 1], upper);
            prop_assert!(axis.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
