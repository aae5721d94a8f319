//! Runs: one data-taking session across all configured detectors.
//!
//! [`Run`] is the shared contract. The two variants, [`HistogramRun`] and
//! [`EventRun`], each own a [`RunState`] and drive the shared pipeline
//! stages from [`crate::corrections`] in the fixed order
//! (mode selection) → energy correction → normalisation → binning.
//!
//! A run keeps its loaded `raw` spectra untouched. Every correction pass
//! starts from a fresh deep copy of `raw` and replaces `data` wholesale.
//!
//! Runs carry no internal locking. Callers confine mutation of a run to
//! one thread at a time.
//!
//! [`HistogramRun`]: histogram::HistogramRun
//! [`EventRun`]: event::EventRun

pub mod event;
pub mod histogram;

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::corrections::{CorrectionRequest, EnergyCorrections, DEFAULT_BIN};
use crate::error::Result;
use crate::normalisation::Normalisation;
use crate::spectrum::{Spectrum, SpectrumSet};

/// Sent to subscribers after every successful correction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionsUpdated {
    /// Run whose corrections changed.
    pub run_num: String,
}

/// Display strings summarising a run's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSummary {
    /// Free-text run comment or title.
    pub comment: String,
    /// Run start time.
    pub start: String,
    /// Run end time.
    pub end: String,
    /// Recorded event count.
    pub events: String,
    /// Multi-line block combining the fields above with the run number.
    pub run_info: String,
}

/// Correction state shared by both run variants.
#[derive(Debug)]
pub struct RunState {
    pub(crate) run_num: String,
    pub(crate) loaded_detectors: Vec<String>,
    pub(crate) raw: SpectrumSet,
    pub(crate) data: SpectrumSet,
    pub(crate) energy_corrections: EnergyCorrections,
    pub(crate) normalisation: Normalisation,
    pub(crate) normalise_which: Vec<String>,
    pub(crate) bin_rate: f64,
    pub(crate) default_bin: usize,
    subscribers: Vec<Sender<CorrectionsUpdated>>,
}

impl RunState {
    /// Creates the state for freshly loaded spectra.
    ///
    /// `data` starts as a copy of `raw`; all detectors that were loaded are
    /// selected for normalisation.
    #[must_use]
    pub fn new(raw: SpectrumSet, loaded_detectors: Vec<String>, run_num: impl Into<String>) -> Self {
        Self {
            run_num: run_num.into(),
            normalise_which: loaded_detectors.clone(),
            loaded_detectors,
            data: raw.clone(),
            raw,
            energy_corrections: EnergyCorrections::new(),
            normalisation: Normalisation::None,
            bin_rate: 1.0,
            default_bin: DEFAULT_BIN,
            subscribers: Vec::new(),
        }
    }

    /// Run number.
    #[must_use]
    pub fn run_num(&self) -> &str {
        &self.run_num
    }

    /// Detectors for which a backing file was found, in channel order.
    #[must_use]
    pub fn loaded_detectors(&self) -> &[String] {
        &self.loaded_detectors
    }

    /// Current, corrected view.
    #[must_use]
    pub fn data(&self) -> &SpectrumSet {
        &self.data
    }

    /// Borrowed view of the loaded spectra.
    #[must_use]
    pub fn raw(&self) -> &SpectrumSet {
        &self.raw
    }

    /// Energy corrections used by the last pass.
    #[must_use]
    pub fn energy_corrections(&self) -> &EnergyCorrections {
        &self.energy_corrections
    }

    /// Active normalisation.
    #[must_use]
    pub fn normalisation(&self) -> Normalisation {
        self.normalisation
    }

    /// Detectors normalisation applies to.
    #[must_use]
    pub fn normalise_which(&self) -> &[String] {
        &self.normalise_which
    }

    /// Active binning rate.
    #[must_use]
    pub fn bin_rate(&self) -> f64 {
        self.bin_rate
    }

    /// Raw-histogram bin count at a binning rate of 1.
    #[must_use]
    pub fn default_bin(&self) -> usize {
        self.default_bin
    }

    /// Fresh deep copy of `raw` to start a correction pass from.
    pub(crate) fn fresh_data(&self) -> SpectrumSet {
        self.raw.clone()
    }

    /// Merges the stored values with a request's energy and normalisation
    /// parameters, returning what this pass should use.
    pub(crate) fn resolve(
        &self,
        request: &CorrectionRequest,
    ) -> (EnergyCorrections, Normalisation, Vec<String>) {
        (
            request
                .energy_corrections
                .clone()
                .unwrap_or_else(|| self.energy_corrections.clone()),
            request.normalisation.unwrap_or(self.normalisation),
            request
                .normalise_which
                .clone()
                .unwrap_or_else(|| self.normalise_which.clone()),
        )
    }

    /// Records a successful normalisation.
    pub(crate) fn set_normalisation(&mut self, normalisation: Normalisation, which: Vec<String>) {
        if normalisation == Normalisation::None {
            self.reset_normalisation();
        } else {
            self.normalisation = normalisation;
            self.normalise_which = which;
        }
    }

    /// Falls back to no normalisation on every loaded detector.
    pub(crate) fn reset_normalisation(&mut self) {
        self.normalisation = Normalisation::None;
        self.normalise_which = self.loaded_detectors.clone();
    }

    /// Registers a new subscriber.
    pub(crate) fn subscribe(&mut self) -> Receiver<CorrectionsUpdated> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Notifies live subscribers and forgets dropped ones.
    pub(crate) fn notify(&mut self) {
        let event = CorrectionsUpdated {
            run_num: self.run_num.clone(),
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// The shared run contract.
pub trait Run {
    /// Shared correction state.
    fn state(&self) -> &RunState;

    /// Re-derives `data` from `raw` with the requested corrections.
    ///
    /// Omitted parameters reuse the run's stored values. Subscribers are
    /// notified once the pass completes.
    ///
    /// # Errors
    /// Returns a configuration error for invalid parameters, or a
    /// normalisation error if normalisation by events is impossible; in the
    /// latter case the run's normalisation is reset to `none` first.
    fn set_corrections(&mut self, request: CorrectionRequest) -> Result<()>;

    /// Formats the run metadata for display.
    fn read_comment_data(&self) -> CommentSummary;

    /// Subscribes to "corrections updated" events.
    fn subscribe(&mut self) -> Receiver<CorrectionsUpdated>;

    /// Run number.
    fn run_num(&self) -> &str {
        self.state().run_num()
    }

    /// Detectors for which a backing file was found.
    fn loaded_detectors(&self) -> &[String] {
        self.state().loaded_detectors()
    }

    /// Current, corrected view.
    fn data(&self) -> &SpectrumSet {
        self.state().data()
    }

    /// Active normalisation.
    fn normalisation(&self) -> Normalisation {
        self.state().normalisation()
    }

    /// True if no detector has any raw data.
    fn is_empty(&self) -> bool {
        self.state().raw().all_empty()
    }

    /// Current-view spectra with data.
    fn get_nonzero_data(&self) -> Vec<&Spectrum> {
        self.state().data().iter().filter(|s| !s.is_empty()).collect()
    }

    /// Deep copy of the loaded spectra.
    fn get_raw(&self) -> SpectrumSet {
        self.state().raw().clone()
    }
}

/// Keeps only characters at or above the space character.
pub(crate) fn strip_control(s: &str) -> String {
    s.chars().filter(|c| u32::from(*c) >= 32).collect()
}

/// Characters of `s` from `offset` on; empty if `s` is shorter.
pub(crate) fn tail_from(s: &str, offset: usize) -> String {
    s.chars().skip(offset).collect()
}
