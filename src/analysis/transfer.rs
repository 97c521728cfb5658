//! Element-wise trace derivations
//!
//! Transfer functions are derived from two single-channel sweeps taken over
//! the same axis. Amplitude transfer is B / A, phase transfer is B - A in
//! degrees. Zero denominators are not guarded: IEEE infinities and NaN
//! propagate into the result exactly as computed.

use crate::error::{AnalyzerError, Result};

fn check_lengths(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(AnalyzerError::Communication(format!(
            "sequential reads returned {} and {} samples",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// Element-wise `b / a`
pub fn ratio(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    check_lengths(a, b)?;
    Ok(a.iter().zip(b).map(|(a, b)| b / a).collect())
}

/// Element-wise `b - a`
pub fn phase_difference(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    check_lengths(a, b)?;
    Ok(a.iter().zip(b).map(|(a, b)| b - a).collect())
}

/// Split a dual-source reply into its two positional halves
///
/// The first half belongs to the first source in canonical order.
pub fn split_halves(samples: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if samples.len() % 2 != 0 {
        return Err(AnalyzerError::Communication(format!(
            "dual reply has odd length {}",
            samples.len()
        )));
    }
    let (first, second) = samples.split_at(samples.len() / 2);
    Ok((first.to_vec(), second.to_vec()))
}
