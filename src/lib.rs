//! # hp3582-control: Acquisition and Auto-Ranging Controller
//!
//! Drives an HP 3582A class two-channel spectrum analyzer over a serial link
//! (optionally behind a GPIB-USB controller). The controller configures the
//! instrument, finds the most sensitive non-overloading input range per
//! channel, acquires traces including derived transfer functions, rebuilds
//! the frequency axis and hands back explicit results.
//!
//! ## Architecture
//!
//! - **Backend**: Device link, command encoding, ranging and acquisition; a
//!   worker thread serialises all device access
//! - **Analysis**: Pure functions for the frequency axis and trace arithmetic
//! - **Session**: CSV export of results
//! - **Communication**: Crossbeam channels between the caller and the worker
//!
//! ## Configuration
//!
//! Config and state are stored in the platform-appropriate data directory
//! under `org.hp3582.control`:
//!
//! - **Linux**: `~/.local/share/org.hp3582.control/`
//! - **macOS**: `~/Library/Application Support/org.hp3582.control/`
//! - **Windows**: `%APPDATA%\org.hp3582.control\`
//!
//! ## Example
//!
//! ```ignore
//! use hp3582_control::{
//!     backend::{AcquisitionRequest, Analyzer, SettlePolicy, SimulatedAnalyzer},
//!     types::{InputSelection, InputSource},
//! };
//!
//! let mut analyzer = Analyzer::with_transport(
//!     Box::new(SimulatedAnalyzer::new()),
//!     SettlePolicy::default(),
//! );
//! analyzer.preset()?;
//! let outcome = analyzer.auto_range()?;
//! let selection = InputSelection::single(InputSource::TransferAmplitude);
//! let result = analyzer.acquire(&AcquisitionRequest::new(selection))?;
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{
    AcquisitionRequest, Analyzer, AnalyzerBackend, DeviceLink, MeasurementRequest,
    RangingOutcome, SimulatedAnalyzer,
};
pub use config::{AppConfig, AppState, PanelSettings};
pub use error::{AnalyzerError, Result};
pub use session::CsvExporter;
pub use types::{AcquisitionResult, Channel, InputSelection, InputSource, SensitivityLevel, Trace};
