//! Overload status decoding
//!
//! The analyzer latches input overloads into a status byte. Bit 2 (value 4)
//! flags channel A and bit 3 (value 8) flags channel B; every other bit is
//! ignored. Status is never cached, callers re-read it whenever they need it.

use crate::types::Channel;
use serde::{Deserialize, Serialize};

/// Bit set when channel A overloaded since the latch was cleared
pub const A_OVERLOAD_BIT: u8 = 0b0000_0100;
/// Bit set when channel B overloaded since the latch was cleared
pub const B_OVERLOAD_BIT: u8 = 0b0000_1000;

/// Per-channel overload flags decoded from one status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverloadStatus {
    pub a_overload: bool,
    pub b_overload: bool,
}

impl OverloadStatus {
    /// Decode a raw status byte
    pub fn decode(byte: u8) -> Self {
        Self {
            a_overload: byte & A_OVERLOAD_BIT != 0,
            b_overload: byte & B_OVERLOAD_BIT != 0,
        }
    }

    /// Flag for one channel
    pub fn is_overloaded(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.a_overload,
            Channel::B => self.b_overload,
        }
    }

    pub fn any(&self) -> bool {
        self.a_overload || self.b_overload
    }
}
