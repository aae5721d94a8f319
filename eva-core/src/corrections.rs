//! Correction parameters and the shared pipeline stages.
//!
//! The stages are plain functions over a [`SpectrumSet`] so both run
//! variants call the same code in the same order: energy correction,
//! normalisation, binning.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalisation::{normalise_counts, normalise_events, Normalisation};
use crate::rebin::{prebinned_rebin, raw_rebin};
use crate::run::event::PlotMode;
use crate::spectrum::{Spectrum, SpectrumSet};

/// Default number of bins for raw event histograms.
pub const DEFAULT_BIN: usize = 8192;

/// Linear energy calibration for one detector: `x * gradient + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyCorrection {
    /// Multiplicative term.
    pub gradient: f64,
    /// Additive term.
    pub offset: f64,
    /// Whether the correction is applied.
    pub enabled: bool,
}

impl Default for EnergyCorrection {
    fn default() -> Self {
        Self {
            gradient: 1.0,
            offset: 0.0,
            enabled: false,
        }
    }
}

impl EnergyCorrection {
    /// Creates an enabled correction.
    #[must_use]
    pub fn new(gradient: f64, offset: f64) -> Self {
        Self {
            gradient,
            offset,
            enabled: true,
        }
    }

    /// Set whether the correction is applied.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Calibrates values in place.
    pub fn apply(&self, values: &mut [f64]) {
        for v in values {
            *v = *v * self.gradient + self.offset;
        }
    }

    /// Maps a `(lower, upper)` range through the calibration.
    #[must_use]
    pub fn apply_range(&self, (lo, hi): (f64, f64)) -> (f64, f64) {
        let a = lo * self.gradient + self.offset;
        let b = hi * self.gradient + self.offset;
        (a.min(b), a.max(b))
    }
}

/// Per-detector energy corrections.
pub type EnergyCorrections = BTreeMap<String, EnergyCorrection>;

/// Divisors applied by the normalisation stage, per detector.
pub type NormalisationScales = BTreeMap<String, f64>;

/// How the binning stage resamples the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinMethod {
    /// Re-histogram an existing histogram (interpolating when upsampling).
    Prebinned,
    /// Histogram the time-gated event scratch data.
    Raw,
    /// Pass pre-binned 2D data through untouched.
    Hist,
}

impl BinMethod {
    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prebinned => "prebinned",
            Self::Raw => "raw",
            Self::Hist => "hist",
        }
    }
}

impl fmt::Display for BinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prebinned" => Ok(Self::Prebinned),
            "raw" => Ok(Self::Raw),
            "hist" => Ok(Self::Hist),
            other => Err(Error::Configuration(format!(
                "invalid binning method '{other}'"
            ))),
        }
    }
}

/// Parameters for one `set_corrections` pass.
///
/// Every field is optional; `None` keeps the run's current value, so a
/// caller can change just the binning without restating everything else.
/// `plot_mode`, `prompt_limit` and `default_bin` only affect event-file runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionRequest {
    /// Linear calibration per detector.
    pub energy_corrections: Option<EnergyCorrections>,
    /// Normalisation type.
    pub normalisation: Option<Normalisation>,
    /// Detectors the normalisation applies to.
    pub normalise_which: Option<Vec<String>>,
    /// Binning rate; 1.0 keeps the loaded resolution.
    pub bin_rate: Option<f64>,
    /// Raw histogram bin count at a binning rate of 1.
    pub default_bin: Option<usize>,
    /// Event-run view.
    pub plot_mode: Option<PlotMode>,
    /// Event-run prompt/delayed time boundary.
    pub prompt_limit: Option<f64>,
}

impl CorrectionRequest {
    /// A request that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set energy corrections.
    #[must_use]
    pub fn with_energy_corrections(mut self, corrections: EnergyCorrections) -> Self {
        self.energy_corrections = Some(corrections);
        self
    }

    /// Set normalisation type.
    #[must_use]
    pub fn with_normalisation(mut self, normalisation: Normalisation) -> Self {
        self.normalisation = Some(normalisation);
        self
    }

    /// Set which detectors are normalised.
    #[must_use]
    pub fn with_normalise_which<I, S>(mut self, detectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.normalise_which = Some(detectors.into_iter().map(Into::into).collect());
        self
    }

    /// Set binning rate.
    #[must_use]
    pub fn with_bin_rate(mut self, bin_rate: f64) -> Self {
        self.bin_rate = Some(bin_rate);
        self
    }

    /// Set the raw histogram bin count at a binning rate of 1.
    #[must_use]
    pub fn with_default_bin(mut self, default_bin: usize) -> Self {
        self.default_bin = Some(default_bin);
        self
    }

    /// Set plot mode.
    #[must_use]
    pub fn with_plot_mode(mut self, plot_mode: PlotMode) -> Self {
        self.plot_mode = Some(plot_mode);
        self
    }

    /// Set prompt time limit.
    #[must_use]
    pub fn with_prompt_limit(mut self, prompt_limit: f64) -> Self {
        self.prompt_limit = Some(prompt_limit);
        self
    }
}

/// Applies enabled linear calibrations to each detector's `x` axis.
///
/// A detector with no entry is skipped with a warning; the remaining
/// detectors are still corrected.
pub fn apply_energy_corrections(data: &mut SpectrumSet, corrections: &EnergyCorrections) {
    for spectrum in data.iter_mut() {
        match corrections.get(&spectrum.detector) {
            Some(correction) if correction.enabled => correction.apply(&mut spectrum.x),
            Some(_) => {}
            None => log::warn!(
                "No energy correction information found for detector {}. Skipping correction.",
                spectrum.detector
            ),
        }
    }
}

/// Normalises the detectors named in `normalise_which`.
///
/// Detectors outside the subset keep their current values. The event count
/// for each detector comes from `event_count`. Nothing is modified unless
/// every selected detector can be normalised.
///
/// # Errors
/// Returns [`Error::Normalisation`] if an event count is unavailable.
pub fn apply_normalisation<F>(
    data: &mut SpectrumSet,
    normalisation: Normalisation,
    normalise_which: &[String],
    event_count: F,
) -> Result<NormalisationScales>
where
    F: Fn(&Spectrum) -> Result<f64>,
{
    let mut staged = Vec::new();
    let mut scales = NormalisationScales::new();

    for spectrum in data.iter() {
        if !normalise_which.contains(&spectrum.detector) {
            continue;
        }
        match normalisation {
            Normalisation::None => {}
            Normalisation::Counts => {
                let total = spectrum.total();
                if total != 0.0 {
                    scales.insert(spectrum.detector.clone(), total);
                }
                staged.push((spectrum.detector.clone(), normalise_counts(&spectrum.y)));
            }
            Normalisation::Events => {
                let events = event_count(spectrum)?;
                let y = normalise_events(&spectrum.y, events)?;
                scales.insert(spectrum.detector.clone(), events);
                staged.push((spectrum.detector.clone(), y));
            }
        }
    }

    for (detector, y) in staged {
        if let Some(spectrum) = data.get_mut(&detector) {
            spectrum.y = y;
        }
    }
    Ok(scales)
}

/// Checks that a binning rate is usable.
///
/// # Errors
/// Returns [`Error::Configuration`] for non-positive or non-finite rates.
pub fn validate_bin_rate(bin_rate: f64) -> Result<()> {
    if bin_rate.is_finite() && bin_rate > 0.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "binning rate must be positive, got {bin_rate}"
        )))
    }
}

/// Checks that binning `data` at `bin_rate` leaves at least one bin for
/// every non-empty detector.
///
/// Point counts do not change between mode selection and binning, so a run
/// calls this before committing anything from a correction pass.
///
/// # Errors
/// Returns [`Error::Configuration`] for an invalid rate, or a rate that
/// would leave a detector with no bins.
#[allow(clippy::float_cmp)]
pub fn check_binning(
    data: &SpectrumSet,
    method: BinMethod,
    bin_rate: f64,
    default_bin: usize,
) -> Result<()> {
    validate_bin_rate(bin_rate)?;
    if bin_rate == 1.0 {
        return Ok(());
    }

    match method {
        BinMethod::Prebinned => {
            for spectrum in data.iter().filter(|s| !s.is_empty()) {
                if (spectrum.len() as f64 / bin_rate) as usize == 0 {
                    return Err(Error::Configuration(format!(
                        "binning rate {bin_rate} leaves no bins for the {} points of {}",
                        spectrum.len(),
                        spectrum.detector
                    )));
                }
            }
        }
        BinMethod::Raw => {
            let needs_bins = data
                .iter()
                .any(|s| !s.is_empty() && s.events.is_some());
            if needs_bins && raw_bin_count(default_bin, bin_rate) == 0 {
                return Err(Error::Configuration(format!(
                    "binning rate {bin_rate} leaves no bins out of {default_bin}"
                )));
            }
        }
        BinMethod::Hist => {}
    }
    Ok(())
}

fn raw_bin_count(default_bin: usize, bin_rate: f64) -> usize {
    (default_bin as f64 / bin_rate) as usize
}

/// Rebins every non-empty detector according to `method`.
///
/// A `bin_rate` of exactly 1.0 leaves the data untouched. The raw method
/// re-histograms each detector's event scratch data into
/// `default_bin / bin_rate` bins and divides by the detector's entry in
/// `scales`, so normalisation survives the re-histogram.
///
/// # Errors
/// Returns [`Error::Configuration`] for an invalid rate or bin count.
#[allow(clippy::float_cmp)]
pub fn apply_binning(
    data: &mut SpectrumSet,
    method: BinMethod,
    bin_rate: f64,
    default_bin: usize,
    scales: &NormalisationScales,
) -> Result<()> {
    check_binning(data, method, bin_rate, default_bin)?;
    if bin_rate == 1.0 {
        return Ok(());
    }

    match method {
        BinMethod::Prebinned => {
            for spectrum in data.iter_mut() {
                if spectrum.is_empty() {
                    continue;
                }
                let (x, y) = prebinned_rebin(&spectrum.x, &spectrum.y, bin_rate, spectrum.bin_range)?;
                spectrum.x = x;
                spectrum.y = y;
            }
        }
        BinMethod::Raw => {
            let bin_num = raw_bin_count(default_bin, bin_rate);
            for spectrum in data.iter_mut() {
                if spectrum.is_empty() {
                    continue;
                }
                let Some(events) = spectrum.events.as_ref() else {
                    continue;
                };
                let (x, mut y) = raw_rebin(&events.cut_data, bin_num, spectrum.bin_range)?;
                if let Some(scale) = scales.get(&spectrum.detector) {
                    for v in &mut y {
                        *v /= scale;
                    }
                }
                spectrum.x = x;
                spectrum.y = y;
            }
        }
        BinMethod::Hist => {}
    }
    Ok(())
}
