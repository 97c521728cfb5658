//! CSV export of acquisition results
//!
//! One row per sample, frequency first, comma separated and never quoted:
//!
//! ```text
//! Frequency (Hz),A Amplitude (dB),B Amplitude (dB)
//! 0,-26.02,-32.04
//! ```

use crate::error::{AnalyzerError, Result};
use crate::types::AcquisitionResult;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header of the frequency column
pub const FREQUENCY_HEADER: &str = "Frequency (Hz)";

/// Writes [`AcquisitionResult`]s as delimited text files
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    /// Exporter placing default-named files in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Timestamped default file name, e.g. `data_set_2024-03-01_T14-05-09.csv`
    pub fn default_file_name() -> String {
        chrono::Local::now()
            .format("data_set_%Y-%m-%d_T%H-%M-%S.csv")
            .to_string()
    }

    /// Target path for an optional caller-chosen name
    ///
    /// Names without a `.csv` extension get one appended. Relative names
    /// resolve inside the export directory. Blank names use the default.
    pub fn resolve(&self, name: Option<&str>) -> PathBuf {
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) if name.to_ascii_lowercase().ends_with(".csv") => name.to_string(),
            Some(name) => format!("{}.csv", name),
            None => Self::default_file_name(),
        };
        self.dir.join(name)
    }

    /// Write `result` and return the path written
    pub fn export(&self, result: &AcquisitionResult, name: Option<&str>) -> Result<PathBuf> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnalyzerError::Export(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let file = File::create(&path)
            .map_err(|e| AnalyzerError::Export(format!("Failed to create {:?}: {}", path, e)))?;
        write_csv(file, result)?;

        tracing::info!(
            "Exported {} traces x {} points to {:?}",
            result.traces().len(),
            result.len(),
            path
        );
        Ok(path)
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXPORT_DIR)
    }
}

/// Write `result` to any writer
pub fn write_csv<W: Write>(writer: W, result: &AcquisitionResult) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    let mut header = vec![FREQUENCY_HEADER.to_string()];
    header.extend(result.traces().iter().map(|t| t.label()));
    wtr.write_record(&header)?;

    for (i, frequency) in result.frequencies().iter().enumerate() {
        let mut row = vec![frequency.to_string()];
        row.extend(result.traces().iter().map(|t| t.samples[i].to_string()));
        wtr.write_record(&row)?;
    }

    wtr.flush()
        .map_err(|e| AnalyzerError::Export(format!("Failed to flush export: {}", e)))
}
