//! Loader results and the initial correction pass.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use eva_core::{CorrectionRequest, Normalisation, Run};

use crate::Result;

/// What a loader could not find.
///
/// Missing data never aborts a load; callers inspect these flags and decide
/// how to present the degraded result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoadFlags {
    /// None of the configured detector channels had a backing file.
    pub no_files_found: bool,
    /// The run's metadata was missing; placeholders were used.
    pub comment_not_found: bool,
    /// Normalisation by events was requested but impossible, so the run
    /// was corrected without normalisation.
    pub norm_by_spills_error: bool,
}

impl LoadFlags {
    /// True if nothing was missing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !(self.no_files_found || self.comment_not_found || self.norm_by_spills_error)
    }
}

/// A loaded run (or `None` when no data was found) with its flags.
#[derive(Debug)]
pub struct LoadOutcome<R> {
    /// The loaded run, corrected with the loader's defaults.
    pub run: Option<R>,
    /// What was missing while loading.
    pub flags: LoadFlags,
}

impl<R> LoadOutcome<R> {
    pub(crate) fn nothing_found(comment_not_found: bool) -> Self {
        Self {
            run: None,
            flags: LoadFlags {
                no_files_found: true,
                comment_not_found,
                ..LoadFlags::default()
            },
        }
    }
}

/// Applies the default corrections to a freshly loaded run.
///
/// A normalisation failure is absorbed: the flag is raised and the pass is
/// repeated without normalisation.
pub(crate) fn apply_initial_corrections<R: Run>(
    run: &mut R,
    defaults: &CorrectionRequest,
    flags: &mut LoadFlags,
) -> Result<()> {
    match run.set_corrections(defaults.clone()) {
        Ok(()) => Ok(()),
        Err(e) if e.is_normalisation() => {
            log::warn!(
                "Run {}: {e}; loading without normalisation",
                run.run_num()
            );
            flags.norm_by_spills_error = true;
            run.set_corrections(defaults.clone().with_normalisation(Normalisation::None))?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
