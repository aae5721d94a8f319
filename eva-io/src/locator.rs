//! Locates the Nexus file for a run.

use std::path::{Path, PathBuf};

/// Widest zero-padded run number probed.
pub const MAX_RUN_DIGITS: usize = 8;

/// Finds `{prefix}{run}.{extension}` in a directory, where the run number
/// carries an unknown amount of zero-padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NexusLocator {
    dir: PathBuf,
    prefix: String,
    extension: String,
    max_digits: usize,
}

impl NexusLocator {
    /// Creates a locator for `dir` with no prefix and the `nxs` extension.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: String::new(),
            extension: "nxs".to_string(),
            max_digits: MAX_RUN_DIGITS,
        }
    }

    /// Set the file-name prefix (e.g. an instrument name).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the file extension, without the dot.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set the widest padding probed.
    #[must_use]
    pub fn with_max_digits(mut self, max_digits: usize) -> Self {
        self.max_digits = max_digits;
        self
    }

    /// Directory searched.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate paths, narrowest padding first.
    #[must_use]
    pub fn candidates(&self, run_num: &str) -> Vec<PathBuf> {
        let run_num = run_num.trim();
        (run_num.len()..=self.max_digits.max(run_num.len()))
            .map(|width| {
                self.dir.join(format!(
                    "{}{run_num:0>width$}.{}",
                    self.prefix, self.extension
                ))
            })
            .collect()
    }

    /// First candidate that exists on disk.
    #[must_use]
    pub fn locate(&self, run_num: &str) -> Option<PathBuf> {
        self.candidates(run_num).into_iter().find(|path| {
            let exists = path.is_file();
            log::debug!("Probing {} -> {exists}", path.display());
            exists
        })
    }
}
