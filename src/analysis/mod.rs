//! Analysis of acquired traces
//!
//! This module provides the pure numeric parts of an acquisition:
//! - Frequency axis reconstruction from sweep settings
//! - Span token parsing
//! - Transfer-function derivation and dual-reply splitting

pub mod axis;
pub mod transfer;

pub use axis::{linspace, parse_span_token, reconstruct, span_hz, sweep_bounds};
pub use transfer::{phase_difference, ratio, split_halves};
