//! Transport trait for the instrument bus
//!
//! This module provides a common interface for everything that can carry the
//! analyzer's line protocol: a real serial port (optionally behind a GPIB-USB
//! controller) and the in-process simulator used for testing.

use crate::error::Result;
use std::collections::VecDeque;

/// Size of the rolling window for recent query times
const RECENT_WINDOW_SIZE: usize = 100;

/// Statistics for link operations
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Commands written (including the command half of queries)
    pub commands_sent: u64,
    /// Queries that returned a usable reply
    pub successful_queries: u64,
    /// Writes or reads that failed
    pub failures: u64,
    /// Total bytes written and read
    pub bytes_transferred: u64,
    /// Total time spent waiting for the instrument to settle, in milliseconds
    pub settle_time_ms: u64,
    /// Rolling window of recent query round trips in microseconds
    pub recent_query_times: VecDeque<u64>,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self {
            commands_sent: 0,
            successful_queries: 0,
            failures: 0,
            bytes_transferred: 0,
            settle_time_ms: 0,
            recent_query_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl LinkStats {
    /// Record a successful query with its round-trip time
    pub fn record_query(&mut self, time_us: u64, bytes: u64) {
        self.successful_queries += 1;
        self.bytes_transferred += bytes;
        self.recent_query_times.push_back(time_us);
        if self.recent_query_times.len() > RECENT_WINDOW_SIZE {
            self.recent_query_times.pop_front();
        }
    }

    pub fn record_command(&mut self, bytes: u64) {
        self.commands_sent += 1;
        self.bytes_transferred += bytes;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Average round trip of recent queries in microseconds
    pub fn avg_query_time_us(&self) -> f64 {
        if self.recent_query_times.is_empty() {
            0.0
        } else {
            self.recent_query_times.iter().sum::<u64>() as f64
                / self.recent_query_times.len() as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Line oriented, half-duplex byte channel to the analyzer
///
/// Implementations must be `Send` so the link can move into the backend
/// worker thread. Every method blocks until it completes or its bounded
/// timeout expires, in which case it returns a communication error.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Write one command line; the terminator is appended by the transport
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one reply line with the terminator stripped
    fn read_line(&mut self) -> Result<String>;

    /// Read exactly one raw byte (used for the status byte)
    fn read_byte(&mut self) -> Result<u8>;

    /// Human readable description of the endpoint, e.g. the port name
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> Result<String> {
        (**self).read_line()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
