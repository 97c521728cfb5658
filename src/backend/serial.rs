//! Serial transport for real hardware
//!
//! Talks to the analyzer over a serial port, either directly (an HP-IB to
//! RS-232 bridge) or through a Prologix-style GPIB-USB controller, which
//! needs a few `++` setup commands and an explicit read request before each
//! reply.

use super::transport::Transport;
use crate::config::LinkConfig;
use crate::error::{AnalyzerError, Result};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} - {}", self.name, self.description)
        }
    }
}

/// List serial ports visible to the operating system
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let product = usb.product.unwrap_or_default();
                    format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, product)
                        .trim()
                        .to_string()
                }
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                _ => String::new(),
            };
            PortInfo {
                name: port.port_name,
                description,
            }
        })
        .collect())
}

/// Serial connection to one analyzer
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    terminator: String,
    gpib_address: Option<u8>,
}

impl SerialTransport {
    /// Open the configured port and, for a GPIB controller, address the instrument
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let name = config.port.clone().ok_or_else(|| {
            AnalyzerError::Config("no serial port configured (use --port)".to_string())
        })?;

        tracing::info!("Opening {} at {} baud", name, config.baud_rate);
        let port = serialport::new(&name, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()?;

        let mut transport = Self {
            port,
            name,
            terminator: config.terminator.clone(),
            gpib_address: config.gpib_address,
        };

        if let Some(address) = transport.gpib_address {
            tracing::info!("Configuring GPIB controller for address {}", address);
            for setup in [
                "++mode 1".to_string(),
                format!("++addr {}", address),
                "++auto 0".to_string(),
                "++eoi 1".to_string(),
            ] {
                transport.write_raw(&setup)?;
            }
        }

        Ok(transport)
    }

    fn write_raw(&mut self, line: &str) -> Result<()> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(self.terminator.as_bytes());
        self.port.write_all(&bytes).map_err(|e| io_error(&self.name, e))?;
        self.port.flush().map_err(|e| io_error(&self.name, e))
    }

    fn request_reply(&mut self) -> Result<()> {
        if self.gpib_address.is_some() {
            self.write_raw("++read eoi")?;
        }
        Ok(())
    }

    fn read_one(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(1) => return Ok(byte[0]),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(&self.name, e)),
            }
        }
    }
}

fn io_error(port: &str, err: std::io::Error) -> AnalyzerError {
    if err.kind() == ErrorKind::TimedOut {
        AnalyzerError::Communication(format!("{}: read timed out", port))
    } else {
        AnalyzerError::Communication(format!("{}: {}", port, err))
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_raw(line)
    }

    fn read_line(&mut self) -> Result<String> {
        self.request_reply()?;
        let mut buf = Vec::new();
        loop {
            let byte = self.read_one()?;
            if byte == b'\n' {
                break;
            }
            buf.push(byte);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.request_reply()?;
        self.read_one()
    }

    fn describe(&self) -> String {
        match self.gpib_address {
            Some(address) => format!("{} (GPIB {})", self.name, address),
            None => self.name.clone(),
        }
    }
}
