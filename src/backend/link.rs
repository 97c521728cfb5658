//! Device link: request/response channel with settle semantics
//!
//! The link is the only component that touches the [`Transport`]. It encodes
//! commands, writes them, parses replies and enforces the instrument's settle
//! time. A state-changing command is not complete until the command settle
//! interval has elapsed, so callers never need to sleep themselves.

use super::commands::Command;
use super::transport::{LinkStats, Transport};
use crate::error::{AnalyzerError, Result};
use std::time::{Duration, Instant};

/// Wait the instrument needs after a command before it accepts the next one
pub const DEFAULT_COMMAND_SETTLE: Duration = Duration::from_millis(100);
/// Wait between sequential sweep reads
pub const DEFAULT_SWEEP_SETTLE: Duration = Duration::from_millis(500);

/// Settle intervals applied by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Applied after every state-changing command
    pub command: Duration,
    /// Applied by [`DeviceLink::settle`] between sequential reads
    pub sweep: Duration,
}

impl SettlePolicy {
    pub fn new(command: Duration, sweep: Duration) -> Self {
        Self { command, sweep }
    }

    /// Zero delays; ordering of operations is unchanged
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_SETTLE, DEFAULT_SWEEP_SETTLE)
    }
}

/// Parse an ASCII numeric reply separated by commas and/or whitespace
pub fn parse_values(reply: &str) -> Result<Vec<f64>> {
    let values = reply
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                AnalyzerError::Communication(format!("unparsable value '{}' in reply", token))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.is_empty() {
        return Err(AnalyzerError::Communication("empty reply".to_string()));
    }
    Ok(values)
}

/// Exclusive, blocking channel to one analyzer
pub struct DeviceLink {
    transport: Box<dyn Transport>,
    settle: SettlePolicy,
    stats: LinkStats,
}

impl DeviceLink {
    pub fn new(transport: Box<dyn Transport>, settle: SettlePolicy) -> Self {
        tracing::info!("Opened device link to {}", transport.describe());
        Self {
            transport,
            settle,
            stats: LinkStats::default(),
        }
    }

    /// Endpoint description
    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        self.settle
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    fn write(&mut self, command: &Command) -> Result<()> {
        let line = command.encode();
        tracing::debug!("-> {}", line);
        match self.transport.write_line(&line) {
            Ok(()) => {
                self.stats.record_command(line.len() as u64);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
            self.stats.settle_time_ms += duration.as_millis() as u64;
        }
    }

    /// Transmit a command and block for the command settle interval
    pub fn send(&mut self, command: &Command) -> Result<()> {
        if command.expects_reply() {
            return Err(AnalyzerError::InvalidParameter(format!(
                "{} expects a reply, use a query",
                command
            )));
        }
        self.write(command)?;
        self.wait(self.settle.command);
        Ok(())
    }

    /// Explicit sweep settle between sequential reads
    pub fn settle(&mut self) {
        self.wait(self.settle.sweep);
    }

    fn query_line(&mut self, command: &Command) -> Result<String> {
        if !command.expects_reply() {
            return Err(AnalyzerError::InvalidParameter(format!(
                "{} has no reply to read",
                command
            )));
        }
        let start = Instant::now();
        self.write(command)?;
        match self.transport.read_line() {
            Ok(reply) => {
                tracing::debug!("<- {}", reply);
                self.stats
                    .record_query(start.elapsed().as_micros() as u64, reply.len() as u64);
                Ok(reply)
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Send a query and parse its numeric reply
    pub fn query_values(&mut self, command: &Command) -> Result<Vec<f64>> {
        let reply = self.query_line(command)?;
        parse_values(&reply).map_err(|e| {
            self.stats.record_failure();
            e.with_context(format!("reply to {}", command))
        })
    }

    /// Send a query and return its reply as trimmed text
    pub fn query_text(&mut self, command: &Command) -> Result<String> {
        let reply = self.query_line(command)?;
        Ok(reply.trim().to_string())
    }

    /// Arm the status latch read and return the single raw status byte
    pub fn read_status_byte(&mut self) -> Result<u8> {
        let start = Instant::now();
        self.write(&Command::ArmStatus)?;
        match self.transport.read_byte() {
            Ok(byte) => {
                tracing::debug!("<- status {:#04x}", byte);
                self.stats
                    .record_query(start.elapsed().as_micros() as u64, 1);
                Ok(byte)
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("transport", &self.transport.describe())
            .field("settle", &self.settle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::transport::MockTransport;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn link(mock: MockTransport) -> DeviceLink {
        DeviceLink::new(Box::new(mock), SettlePolicy::instant())
    }

    fn mock() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_describe().return_const("mock".to_string());
        mock
    }

    #[test]
    fn test_parse_values_separators() {
        assert_eq!(parse_values("1.5,2,-3e1").unwrap(), vec![1.5, 2.0, -30.0]);
        assert_eq!(parse_values(" 1  2\t3 ").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_values("1, 2").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_parse_values_failures() {
        assert!(parse_values("").unwrap_err().is_communication());
        assert!(parse_values(" , ").unwrap_err().is_communication());
        assert!(parse_values("1,x,3").unwrap_err().is_communication());
    }

    #[test]
    fn test_reply_expectation_is_checked_before_writing() {
        let mut mock = mock();
        mock.expect_write_line().never();
        mock.expect_read_line().never();

        let mut link = link(mock);
        assert!(link.send(&Command::ReadSpan).unwrap_err().is_invalid_parameter());
        assert!(link
            .query_values(&Command::Preset)
            .unwrap_err()
            .is_invalid_parameter());
        assert_eq!(link.stats().commands_sent, 0);
    }

    #[test]
    fn test_send_writes_encoded_line() {
        let mut mock = mock();
        mock.expect_write_line()
            .with(eq("PRS"))
            .times(1)
            .returning(|_| Ok(()));

        let mut link = link(mock);
        link.send(&Command::Preset).unwrap();
        assert_eq!(link.stats().commands_sent, 1);
    }

    #[test]
    fn test_query_values_writes_then_reads() {
        let mut seq = Sequence::new();
        let mut mock = mock();
        mock.expect_write_line()
            .with(eq("LDS"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_read_line()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("-10.0,-20.5".to_string()));

        let mut link = link(mock);
        assert_eq!(
            link.query_values(&Command::ReadData).unwrap(),
            vec![-10.0, -20.5]
        );
        assert_eq!(link.stats().successful_queries, 1);
    }

    #[test]
    fn test_status_byte_arms_latch_first() {
        let mut seq = Sequence::new();
        let mut mock = mock();
        mock.expect_write_line()
            .with(eq("LST1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_read_byte()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(12));

        let mut link = link(mock);
        assert_eq!(link.read_status_byte().unwrap(), 12);
    }

    #[test]
    fn test_transport_failure_is_counted() {
        let mut mock = mock();
        mock.expect_write_line()
            .returning(|_| Err(AnalyzerError::Communication("timeout".into())));

        let mut link = link(mock);
        let err = link.send(&Command::Arm).unwrap_err();
        assert!(err.is_communication());
        assert_eq!(link.stats().failures, 1);
    }

    #[test]
    fn test_empty_reply_fails() {
        let mut mock = mock();
        mock.expect_write_line().returning(|_| Ok(()));
        mock.expect_read_line().returning(|| Ok(String::new()));

        let mut link = link(mock);
        assert!(link
            .query_values(&Command::ReadSpan)
            .unwrap_err()
            .is_communication());
    }

    #[test]
    fn test_settle_delay_is_honoured() {
        let mut mock = mock();
        mock.expect_write_line().returning(|_| Ok(()));

        let policy = SettlePolicy::new(Duration::from_millis(20), Duration::ZERO);
        let mut link = DeviceLink::new(Box::new(mock), policy);
        let start = Instant::now();
        link.send(&Command::RestartAveraging).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(link.stats().settle_time_ms, 20);
    }
}
