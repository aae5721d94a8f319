//! Run backed by a per-event Nexus file.
//!
//! Each detector carries its raw `(time, energy)` events plus the prompt and
//! delayed histograms written by the acquisition. The plot mode picks which
//! of those feeds the current view before the shared correction stages run.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Receiver;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::corrections::{
    apply_binning, apply_energy_corrections, apply_normalisation, check_binning, BinMethod,
    CorrectionRequest, EnergyCorrections,
};
use crate::error::{Error, Result};
use crate::rebin::{histogram_2d, raw_rebin};
use crate::run::{CommentSummary, CorrectionsUpdated, Run, RunState};
use crate::spectrum::{EventData, Histogram2D, SpectrumSet};

/// Default prompt/delayed boundary in event-time units.
pub const DEFAULT_PROMPT_LIMIT: f64 = 1000.0;
/// Upper time gate for the manual delayed window.
pub const DELAYED_TIME_LIMIT: f64 = 20_000_000.0;
/// Upper time gate of the time plot.
pub const TIME_PLOT_LIMIT: f64 = 2000.0;
/// Number of bins in the time plot.
pub const TIME_PLOT_BINS: usize = 100;

/// Which slice of the event data an event run presents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlotMode {
    /// Acquisition-built prompt histogram.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "IBEX Prompt Spectrum"))]
    IbexPrompt,
    /// Acquisition-built delayed histogram.
    #[cfg_attr(feature = "serde", serde(rename = "IBEX Delayed Spectrum"))]
    IbexDelayed,
    /// Events with `0 < t < prompt_limit`.
    #[cfg_attr(feature = "serde", serde(rename = "Manual Prompt Spectrum"))]
    ManualPrompt,
    /// Events with `prompt_limit < t < 20_000_000`.
    #[cfg_attr(feature = "serde", serde(rename = "Manual Delayed Spectrum"))]
    ManualDelayed,
    /// Every event with `t > 0`.
    #[cfg_attr(feature = "serde", serde(rename = "Efficiency Spectrum"))]
    Efficiency,
    /// Event-time distribution over `0 < t < 2000`.
    #[cfg_attr(feature = "serde", serde(rename = "Time Plot"))]
    TimePlot,
}

impl PlotMode {
    /// All modes in menu order.
    pub const ALL: [PlotMode; 6] = [
        Self::IbexPrompt,
        Self::IbexDelayed,
        Self::ManualPrompt,
        Self::ManualDelayed,
        Self::Efficiency,
        Self::TimePlot,
    ];

    /// Display name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IbexPrompt => "IBEX Prompt Spectrum",
            Self::IbexDelayed => "IBEX Delayed Spectrum",
            Self::ManualPrompt => "Manual Prompt Spectrum",
            Self::ManualDelayed => "Manual Delayed Spectrum",
            Self::Efficiency => "Efficiency Spectrum",
            Self::TimePlot => "Time Plot",
        }
    }

    /// True for the modes showing the prompt window.
    #[must_use]
    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::IbexPrompt | Self::ManualPrompt)
    }

    /// Binning method the mode's data needs.
    #[must_use]
    pub fn bin_method(&self) -> BinMethod {
        match self {
            Self::IbexPrompt | Self::IbexDelayed | Self::TimePlot => BinMethod::Prebinned,
            Self::ManualPrompt | Self::ManualDelayed | Self::Efficiency => BinMethod::Raw,
        }
    }

    /// Recorded event count used to normalise by events in this mode.
    ///
    /// The two prompt modes use the prompt window's count; every other mode
    /// uses the delayed window's.
    #[must_use]
    pub fn event_count(&self, events: &EventData) -> Option<f64> {
        if self.is_prompt() {
            events.prompt_events
        } else {
            events.delayed_events
        }
    }
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("invalid plot mode '{s}'")))
    }
}

/// Run-level metadata read from an event file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMetadata {
    /// Run title, shown as the comment.
    pub title: String,
    /// Free-text notes.
    pub notes: String,
    /// Run start time.
    pub start_time: String,
    /// Run end time.
    pub end_time: String,
    /// Beam momentum, when recorded.
    pub momentum: Option<f64>,
}

/// A run whose detector data arrived as per-event records.
#[derive(Debug)]
pub struct EventRun {
    state: RunState,
    plot_mode: PlotMode,
    prompt_limit: f64,
    metadata: EventMetadata,
}

impl EventRun {
    /// Creates a run from loaded spectra and file metadata.
    ///
    /// Each loaded spectrum should carry its [`EventData`].
    #[must_use]
    pub fn new(
        raw: SpectrumSet,
        loaded_detectors: Vec<String>,
        run_num: impl Into<String>,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            state: RunState::new(raw, loaded_detectors, run_num),
            plot_mode: PlotMode::default(),
            prompt_limit: DEFAULT_PROMPT_LIMIT,
            metadata,
        }
    }

    /// Active plot mode.
    #[must_use]
    pub fn plot_mode(&self) -> PlotMode {
        self.plot_mode
    }

    /// Active prompt/delayed boundary.
    #[must_use]
    pub fn prompt_limit(&self) -> f64 {
        self.prompt_limit
    }

    /// File metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Pre-binned time-energy histogram stored with a detector's events.
    #[must_use]
    pub fn stored_histogram(&self, detector: &str) -> Option<&Histogram2D> {
        self.state
            .raw()
            .get(detector)?
            .events
            .as_ref()?
            .hist_2d
            .as_ref()
    }

    /// Histograms a detector's raw events as time (rows) against energy
    /// (columns).
    ///
    /// The time range comes from the recorded event-time bounds when present.
    /// Returns `None` for a detector without events.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for zero bin counts.
    pub fn time_energy_histogram(
        &self,
        detector: &str,
        bins: (usize, usize),
    ) -> Result<Option<Histogram2D>> {
        let Some(events) = self
            .state
            .raw()
            .get(detector)
            .and_then(|s| s.events.as_ref())
        else {
            return Ok(None);
        };
        let time_range = events
            .event_time_bounds
            .or_else(|| span(&events.time))
            .unwrap_or((0.0, 1.0));
        let energy_range = span(&events.energy).unwrap_or((0.0, 1.0));
        histogram_2d(&events.time, &events.energy, bins, (time_range, energy_range)).map(Some)
    }

    fn commit_selection(&mut self, mode: PlotMode, prompt_limit: f64, default_bin: usize) {
        self.plot_mode = mode;
        self.prompt_limit = prompt_limit;
        self.state.default_bin = default_bin;
    }
}

/// Replaces each detector's view with the slice `mode` selects.
fn select_mode(
    data: &mut SpectrumSet,
    mode: PlotMode,
    limit: f64,
    default_bin: usize,
) -> Result<()> {
    for spectrum in data.iter_mut() {
        let Some(events) = spectrum.events.as_mut() else {
            continue;
        };
        let (x, y, range) = match mode {
            PlotMode::IbexPrompt => (
                events.prompt_energy.clone(),
                events.prompt_count.clone(),
                span(&events.prompt_energy),
            ),
            PlotMode::IbexDelayed => (
                events.delayed_energy.clone(),
                events.delayed_count.clone(),
                span(&events.delayed_energy),
            ),
            PlotMode::ManualPrompt | PlotMode::ManualDelayed | PlotMode::Efficiency => {
                events.cut_data = match mode {
                    PlotMode::ManualPrompt => events.energies_where(|t| t > 0.0 && t < limit),
                    PlotMode::ManualDelayed => {
                        events.energies_where(|t| t > limit && t < DELAYED_TIME_LIMIT)
                    }
                    _ => events.energies_where(|t| t > 0.0),
                };
                let range = spectrum.bin_range.or_else(|| span(&events.prompt_energy));
                let (x, y) = raw_rebin(&events.cut_data, default_bin, range)?;
                (x, y, range)
            }
            PlotMode::TimePlot => {
                events.cut_data = events.times_where(|t| t > 0.0 && t < TIME_PLOT_LIMIT);
                let range = Some((0.0, TIME_PLOT_LIMIT));
                let (x, y) = raw_rebin(&events.cut_data, TIME_PLOT_BINS, range)?;
                (x, y, range)
            }
        };
        spectrum.x = x;
        spectrum.y = y;
        spectrum.bin_range = range;
    }
    Ok(())
}

impl Run for EventRun {
    fn state(&self) -> &RunState {
        &self.state
    }

    /// Selects the plot mode's view, then runs the shared stages on it.
    ///
    /// The time plot shows event times, so energy corrections are not
    /// applied in that mode. Nothing is stored unless the pass succeeds,
    /// apart from the normalisation reset on a normalisation error.
    fn set_corrections(&mut self, request: CorrectionRequest) -> Result<()> {
        let bin_rate = request.bin_rate.unwrap_or(self.state.bin_rate);
        let default_bin = request.default_bin.unwrap_or(self.state.default_bin);
        if default_bin == 0 {
            return Err(Error::Configuration(
                "default bin count must be at least 1".to_string(),
            ));
        }
        let prompt_limit = request.prompt_limit.unwrap_or(self.prompt_limit);
        if !(prompt_limit.is_finite() && prompt_limit > 0.0) {
            return Err(Error::Configuration(format!(
                "prompt limit must be positive, got {prompt_limit}"
            )));
        }
        let mode = request.plot_mode.unwrap_or(self.plot_mode);
        let (energy_corrections, normalisation, normalise_which) = self.state.resolve(&request);

        let mut data = self.state.fresh_data();
        select_mode(&mut data, mode, prompt_limit, default_bin)?;
        check_binning(&data, mode.bin_method(), bin_rate, default_bin)?;

        if mode != PlotMode::TimePlot {
            apply_energy_corrections(&mut data, &energy_corrections);
            calibrate_event_cuts(&mut data, &energy_corrections);
        }

        let scales = match apply_normalisation(&mut data, normalisation, &normalise_which, |s| {
            s.events
                .as_ref()
                .and_then(|events| mode.event_count(events))
                .ok_or_else(|| {
                    Error::Normalisation(format!(
                        "no recorded event count for {} in {mode}",
                        s.detector
                    ))
                })
        }) {
            Ok(scales) => scales,
            Err(e) => {
                self.commit_selection(mode, prompt_limit, default_bin);
                self.state.energy_corrections = energy_corrections;
                self.state.reset_normalisation();
                self.state.data = data;
                return Err(e);
            }
        };

        apply_binning(&mut data, mode.bin_method(), bin_rate, default_bin, &scales)?;

        self.commit_selection(mode, prompt_limit, default_bin);
        self.state.energy_corrections = energy_corrections;
        self.state.set_normalisation(normalisation, normalise_which);
        self.state.bin_rate = bin_rate;
        self.state.data = data;
        self.state.notify();
        Ok(())
    }

    fn read_comment_data(&self) -> CommentSummary {
        let recorded: f64 = self
            .state
            .raw()
            .iter()
            .filter_map(|s| s.events.as_ref())
            .map(EventData::recorded_events)
            .sum();
        let events = format!("{}", recorded.round() as u64);
        let comment = self.metadata.title.trim().to_string();
        let start = self.metadata.start_time.trim().to_string();
        let end = self.metadata.end_time.trim().to_string();
        let run_info = format!(
            "Run number: {}\n\n{comment}\nEvents:{events}\n\nStart time:\n{start}\n\nEnd time:\n{end}",
            self.state.run_num
        );
        CommentSummary {
            comment,
            start,
            end,
            events,
            run_info,
        }
    }

    fn subscribe(&mut self) -> Receiver<CorrectionsUpdated> {
        self.state.subscribe()
    }
}

/// Carries the energy calibration into the binning range and the raw-mode
/// scratch data, so a later re-histogram stays on the calibrated axis.
fn calibrate_event_cuts(data: &mut SpectrumSet, corrections: &EnergyCorrections) {
    for spectrum in data.iter_mut() {
        let Some(correction) = corrections.get(&spectrum.detector) else {
            continue;
        };
        if !correction.enabled {
            continue;
        }
        if let Some(events) = spectrum.events.as_mut() {
            correction.apply(&mut events.cut_data);
        }
        spectrum.bin_range = spectrum.bin_range.map(|r| correction.apply_range(r));
    }
}

fn span(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
        None => Some((v, v)),
    })
}
