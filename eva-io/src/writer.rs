//! Spectrum export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use eva_core::SpectrumSet;

use crate::Result;

/// Output format for [`SpectrumWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `detector,x,y` rows.
    Csv,
    /// Array of spectrum objects (needs the `serde` feature).
    Json,
}

impl ExportFormat {
    /// Picks the format from a file extension, defaulting to CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Writes the current view of a run to disk.
pub struct SpectrumWriter {
    writer: BufWriter<File>,
}

impl SpectrumWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes in the given format.
    ///
    /// # Errors
    /// Returns an error on I/O failure, or for JSON without `serde` support.
    pub fn write(&mut self, spectra: &SpectrumSet, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Csv => self.write_csv(spectra),
            ExportFormat::Json => self.write_json(spectra),
        }
    }

    /// Writes every point as a `detector,x,y` row. Empty spectra add no rows.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    pub fn write_csv(&mut self, spectra: &SpectrumSet) -> Result<()> {
        writeln!(self.writer, "detector,x,y")?;
        for spectrum in spectra {
            for (x, y) in spectrum.x.iter().zip(&spectrum.y) {
                writeln!(self.writer, "{},{x},{y}", spectrum.detector)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the spectra as a JSON array.
    ///
    /// # Errors
    /// Returns an error on I/O or encoding failure.
    #[cfg(feature = "serde")]
    pub fn write_json(&mut self, spectra: &SpectrumSet) -> Result<()> {
        let all: Vec<_> = spectra.iter().collect();
        serde_json::to_writer_pretty(&mut self.writer, &all)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// JSON export is unavailable without the `serde` feature.
    ///
    /// # Errors
    /// Always returns [`crate::Error::InvalidFormat`].
    #[cfg(not(feature = "serde"))]
    pub fn write_json(&mut self, _spectra: &SpectrumSet) -> Result<()> {
        Err(crate::Error::InvalidFormat(
            "JSON export requires the serde feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eva_core::Spectrum;
    use tempfile::NamedTempFile;

    fn spectra() -> SpectrumSet {
        [
            Spectrum::new("GE1", "2630", vec![1.5, 2.5], vec![10.0, 0.25]).unwrap(),
            Spectrum::empty("GE2", "2630"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_write_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = SpectrumWriter::create(file.path()).unwrap();
        writer.write(&spectra(), ExportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["detector,x,y", "GE1,1.5,10", "GE1,2.5,0.25"]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.JSON")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("out.txt")), ExportFormat::Csv);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_write_json() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = SpectrumWriter::create(file.path()).unwrap();
        writer.write_json(&spectra()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["detector"], "GE1");
        assert_eq!(value[0]["y"][1], 0.25);
    }
}
