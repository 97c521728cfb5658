//! Auto-ranging engine
//!
//! Finds, per channel, the most sensitive input range that does not overload.
//! Both channels start at the least sensitive measuring range and step up one
//! level per round. A channel that overloads steps back one level and locks;
//! only unlocked channels advance. The search is monotone so it ends within
//! `MAX - FLOOR` rounds, or fails when a channel would go past the most
//! sensitive level without ever overloading.
//!
//! The device interaction sits behind [`OverloadProbe`] so the search itself
//! can be exercised without a link.

use super::commands::Command;
use super::link::DeviceLink;
use super::status::OverloadStatus;
use crate::error::{AnalyzerError, Result};
use crate::types::{AveragingType, Channel, SensitivityLevel};
use serde::{Deserialize, Serialize};

/// Converged sensitivity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangingOutcome {
    pub a: SensitivityLevel,
    pub b: SensitivityLevel,
    /// Rounds taken, each one sensitivity write plus one status read
    pub iterations: u32,
}

impl RangingOutcome {
    pub fn level(&self, channel: Channel) -> SensitivityLevel {
        match channel {
            Channel::A => self.a,
            Channel::B => self.b,
        }
    }
}

/// Device operations the search needs
pub trait OverloadProbe {
    /// Put the device into a state where overload flags are meaningful
    fn prepare(&mut self) -> Result<()>;

    /// Apply both levels, clear the latch, settle and read the status
    fn probe(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<OverloadStatus>;

    /// Leave the device at the converged levels
    fn commit(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<()>;
}

impl OverloadProbe for DeviceLink {
    fn prepare(&mut self) -> Result<()> {
        self.send(&Command::Averaging(AveragingType::Off))?;
        self.send(&Command::Sensitivities {
            a: SensitivityLevel::FLOOR,
            b: SensitivityLevel::FLOOR,
        })
    }

    fn probe(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<OverloadStatus> {
        self.send(&Command::Sequence(vec![
            Command::Sensitivities { a, b },
            Command::ResetStatus,
        ]))?;
        let byte = self.read_status_byte()?;
        Ok(OverloadStatus::decode(byte))
    }

    fn commit(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<()> {
        self.send(&Command::Sensitivities { a, b })
    }
}

/// Search state of one channel
#[derive(Debug, Clone, Copy)]
struct ChannelSearch {
    channel: Channel,
    level: SensitivityLevel,
    locked: bool,
}

impl ChannelSearch {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            level: SensitivityLevel::FLOOR,
            locked: false,
        }
    }

    /// Level to try this round
    fn next(&self) -> Result<SensitivityLevel> {
        if self.locked {
            return Ok(self.level);
        }
        self.level
            .more_sensitive()
            .ok_or(AnalyzerError::RangingBoundsExceeded {
                channel: self.channel,
                level: self.level.value() + 1,
            })
    }

    fn observe(&mut self, tried: SensitivityLevel, overloaded: bool) {
        if self.locked {
            return;
        }
        if overloaded {
            // tried is always one above a level that did not overload
            self.level = tried.less_sensitive().unwrap_or(SensitivityLevel::FLOOR);
            self.locked = true;
            tracing::debug!("Channel {} locked at level {}", self.channel, self.level.value());
        } else {
            self.level = tried;
        }
    }
}

/// Run the search to convergence
pub fn auto_range<P: OverloadProbe + ?Sized>(probe: &mut P) -> Result<RangingOutcome> {
    probe.prepare()?;

    let mut a = ChannelSearch::new(Channel::A);
    let mut b = ChannelSearch::new(Channel::B);
    let mut iterations = 0;

    while !(a.locked && b.locked) {
        // Bounds are checked before anything is sent
        let next_a = a.next()?;
        let next_b = b.next()?;
        iterations += 1;

        let status = probe.probe(next_a, next_b)?;
        if status.any() {
            tracing::debug!(
                "Round {}: A{} B{} overload A={} B={}",
                iterations,
                next_a.value(),
                next_b.value(),
                status.a_overload,
                status.b_overload
            );
        }
        a.observe(next_a, status.a_overload);
        b.observe(next_b, status.b_overload);
    }

    probe.commit(a.level, b.level)?;
    tracing::info!(
        "Auto-ranging converged: A={} ({}), B={} ({}) after {} rounds",
        a.level.value(),
        a.level.label(),
        b.level.value(),
        b.level.label(),
        iterations
    );

    Ok(RangingOutcome {
        a: a.level,
        b: b.level,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake device overloading above a fixed level per channel
    struct ThresholdProbe {
        /// Highest level that does not overload; `None` never overloads
        max_ok: [Option<u8>; 2],
        sent: Vec<(u8, u8)>,
        committed: Option<(u8, u8)>,
    }

    impl ThresholdProbe {
        fn new(a: Option<u8>, b: Option<u8>) -> Self {
            Self {
                max_ok: [a, b],
                sent: Vec::new(),
                committed: None,
            }
        }
    }

    impl OverloadProbe for ThresholdProbe {
        fn prepare(&mut self) -> Result<()> {
            Ok(())
        }

        fn probe(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<OverloadStatus> {
            self.sent.push((a.value(), b.value()));
            let over = |max: Option<u8>, level: SensitivityLevel| {
                max.map(|m| level.value() > m).unwrap_or(false)
            };
            Ok(OverloadStatus {
                a_overload: over(self.max_ok[0], a),
                b_overload: over(self.max_ok[1], b),
            })
        }

        fn commit(&mut self, a: SensitivityLevel, b: SensitivityLevel) -> Result<()> {
            self.committed = Some((a.value(), b.value()));
            Ok(())
        }
    }

    #[test]
    fn test_converges_per_channel() {
        let mut probe = ThresholdProbe::new(Some(5), Some(8));
        let outcome = auto_range(&mut probe).unwrap();
        assert_eq!(outcome.a.value(), 5);
        assert_eq!(outcome.b.value(), 8);
        assert_eq!(probe.committed, Some((5, 8)));
    }

    #[test]
    fn test_locked_channel_does_not_advance() {
        let mut probe = ThresholdProbe::new(Some(3), Some(6));
        auto_range(&mut probe).unwrap();
        // A overloads at 4 in round 2 and stays at 3 afterwards
        assert_eq!(probe.sent[0], (3, 3));
        assert_eq!(probe.sent[1], (4, 4));
        assert!(probe.sent[2..].iter().all(|(a, _)| *a == 3));
        assert_eq!(probe.sent.last(), Some(&(3, 7)));
    }

    #[test]
    fn test_idempotent() {
        let mut first = ThresholdProbe::new(Some(7), Some(7));
        let outcome = auto_range(&mut first).unwrap();
        let mut second = ThresholdProbe::new(Some(7), Some(7));
        let again = auto_range(&mut second).unwrap();
        assert_eq!((outcome.a, outcome.b), (again.a, again.b));
        assert_eq!(first.sent, second.sent);
    }

    #[test]
    fn test_overload_at_first_step_returns_floor() {
        let mut probe = ThresholdProbe::new(Some(2), Some(2));
        let outcome = auto_range(&mut probe).unwrap();
        assert_eq!(outcome.a, SensitivityLevel::FLOOR);
        assert_eq!(outcome.b, SensitivityLevel::FLOOR);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_bound_failure_never_sends_out_of_range() {
        let mut probe = ThresholdProbe::new(Some(4), None);
        let err = auto_range(&mut probe).unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::RangingBoundsExceeded {
                channel: Channel::B,
                level: 11
            }
        ));
        assert!(probe
            .sent
            .iter()
            .all(|(a, b)| (2..=10).contains(a) && (2..=10).contains(b)));
        assert_eq!(probe.sent.last(), Some(&(4, 10)));
        assert!(probe.committed.is_none());
    }

    #[test]
    fn test_iteration_bound() {
        let mut probe = ThresholdProbe::new(Some(10), Some(9));
        // Level 10 never overloads so A must fail
        assert!(auto_range(&mut probe).is_err());
        assert!(probe.sent.len() <= (SensitivityLevel::MAX - SensitivityLevel::FLOOR.value()) as usize);
    }
}
