//! Flat two-column histogram files, one per detector channel.

use std::path::Path;

use eva_core::{CommentData, CorrectionRequest, HistogramRun, Spectrum, SpectrumSet};

use crate::comment::load_comment;
use crate::load::{apply_initial_corrections, LoadFlags, LoadOutcome};
use crate::{Error, Result};

/// Detector names and their file channel codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    channels: Vec<(String, u32)>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new([("GE1", 2099), ("GE2", 3099), ("GE3", 4099), ("GE4", 5099)])
    }
}

impl ChannelMap {
    /// Creates a map from `(detector, code)` pairs, kept in the given order.
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            channels: channels
                .into_iter()
                .map(|(name, code)| (name.into(), code))
                .collect(),
        }
    }

    /// Iterates over `(detector, code)` in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.channels.iter().map(|(name, code)| (name.as_str(), *code))
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if the map has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// File name holding one channel of a run.
    #[must_use]
    pub fn file_name(run_num: &str, code: u32) -> String {
        format!("ral0{run_num}.rooth{code}.dat")
    }
}

/// Reads whitespace-separated `x y` pairs.
///
/// Blank lines and lines starting with `#` are skipped; extra columns are
/// ignored.
///
/// # Errors
/// Returns an error if the file cannot be read or a line does not hold two
/// numbers.
pub fn read_histogram_file(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let text = std::fs::read_to_string(path)?;
    let mut x = Vec::new();
    let mut y = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace().map(str::parse::<f64>);
        match (fields.next(), fields.next()) {
            (Some(Ok(a)), Some(Ok(b))) => {
                x.push(a);
                y.push(b);
            }
            _ => {
                return Err(Error::InvalidFormat(format!(
                    "{}:{}: expected two numeric columns, got '{line}'",
                    path.display(),
                    lineno + 1
                )));
            }
        }
    }
    Ok((x, y))
}

/// Loads a histogram-file run from `dir`.
///
/// Every channel in `channels` gets an entry in the run's raw data, empty if
/// its file is missing or unreadable. Only channels with a file are listed
/// as loaded. `defaults` is applied once before the run is returned.
///
/// # Errors
/// Returns an error only if `defaults` holds invalid parameters.
pub fn load_histogram_run(
    dir: &Path,
    run_num: &str,
    channels: &ChannelMap,
    defaults: &CorrectionRequest,
) -> Result<LoadOutcome<HistogramRun>> {
    let mut raw = SpectrumSet::new();
    let mut loaded = Vec::new();

    for (detector, code) in channels.iter() {
        let path = dir.join(ChannelMap::file_name(run_num, code));
        if !path.is_file() {
            log::debug!("No file for {detector} at {}", path.display());
            raw.insert(Spectrum::empty(detector, run_num));
            continue;
        }
        let spectrum = read_histogram_file(&path)
            .and_then(|(x, y)| Ok(Spectrum::new(detector, run_num, x, y)?));
        match spectrum {
            Ok(spectrum) => {
                log::info!(
                    "Loaded {detector} ({} points) from {}",
                    spectrum.len(),
                    path.display()
                );
                raw.insert(spectrum);
                loaded.push(detector.to_string());
            }
            Err(e) => {
                log::warn!("Skipping {detector}: {e}");
                raw.insert(Spectrum::empty(detector, run_num));
            }
        }
    }

    let comment = load_comment(dir, run_num);
    let comment_not_found = comment.is_none();
    if loaded.is_empty() {
        log::warn!("No histogram files found for run {run_num} in {}", dir.display());
        return Ok(LoadOutcome::nothing_found(comment_not_found));
    }

    let mut flags = LoadFlags {
        comment_not_found,
        ..LoadFlags::default()
    };
    let comment = comment.unwrap_or_else(CommentData::placeholder);

    let mut run = HistogramRun::new(raw, loaded, run_num, comment);
    apply_initial_corrections(&mut run, defaults, &mut flags)?;
    Ok(LoadOutcome {
        run: Some(run),
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_name() {
        assert_eq!(ChannelMap::file_name("2630", 3099), "ral02630.rooth3099.dat");
        let codes: Vec<u32> = ChannelMap::default().iter().map(|(_, c)| c).collect();
        assert_eq!(codes, vec![2099, 3099, 4099, 5099]);
    }

    #[test]
    fn test_read_histogram_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# energy counts").unwrap();
        writeln!(file, "0.5  12").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1.5\t3e1").unwrap();
        let (x, y) = read_histogram_file(file.path()).unwrap();
        assert_eq!(x, vec![0.5, 1.5]);
        assert_eq!(y, vec![12.0, 30.0]);
    }

    #[test]
    fn test_read_histogram_file_rejects_single_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0 2.0").unwrap();
        writeln!(file, "3.0").unwrap();
        let err = read_histogram_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
