//! Serialisable correction defaults.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::corrections::{validate_bin_rate, CorrectionRequest, EnergyCorrections, DEFAULT_BIN};
use crate::error::{Error, Result};
use crate::normalisation::Normalisation;
use crate::run::event::{PlotMode, DEFAULT_PROMPT_LIMIT};

/// The default corrections block, as read from a settings file.
///
/// Enum-valued fields are kept as strings so a bad value is reported as a
/// configuration error on conversion rather than a parse failure of the
/// whole file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CorrectionSettings {
    /// Energy calibration per detector.
    pub detector_specific: EnergyCorrections,
    /// One of `none`, `counts`, `events`.
    pub normalisation: String,
    /// Detectors to normalise; all loaded detectors when absent.
    pub normalise_which: Option<Vec<String>>,
    /// Binning rate.
    pub binning: f64,
    /// Plot mode display name (event runs only).
    pub plot_mode: String,
    pub prompt_limit: f64,
    pub default_bin: usize,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            detector_specific: EnergyCorrections::new(),
            normalisation: Normalisation::None.to_string(),
            normalise_which: None,
            binning: 1.0,
            plot_mode: PlotMode::default().to_string(),
            prompt_limit: DEFAULT_PROMPT_LIMIT,
            default_bin: DEFAULT_BIN,
        }
    }
}

impl CorrectionSettings {
    /// Validates the settings into a full correction request.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for an unknown normalisation or plot
    /// mode, or an out-of-range numeric value.
    pub fn to_request(&self) -> Result<CorrectionRequest> {
        let normalisation: Normalisation = self.normalisation.parse()?;
        let plot_mode: PlotMode = self.plot_mode.parse()?;
        validate_bin_rate(self.binning)?;
        if !(self.prompt_limit.is_finite() && self.prompt_limit > 0.0) {
            return Err(Error::Configuration(format!(
                "prompt limit must be positive, got {}",
                self.prompt_limit
            )));
        }
        if self.default_bin == 0 {
            return Err(Error::Configuration(
                "default bin count must be at least 1".to_string(),
            ));
        }

        let mut request = CorrectionRequest::new()
            .with_energy_corrections(self.detector_specific.clone())
            .with_normalisation(normalisation)
            .with_bin_rate(self.binning)
            .with_plot_mode(plot_mode)
            .with_prompt_limit(self.prompt_limit)
            .with_default_bin(self.default_bin);
        if let Some(which) = &self.normalise_which {
            request = request.with_normalise_which(which.iter().cloned());
        }
        Ok(request)
    }
}
