//! Run backed by pre-binned flat histogram files.
#![allow(clippy::cast_precision_loss)]

use std::sync::mpsc::Receiver;

use crate::corrections::{
    apply_binning, apply_energy_corrections, apply_normalisation, check_binning, BinMethod,
    CorrectionRequest,
};
use crate::error::Result;
use crate::normalisation::parse_event_field;
use crate::run::{strip_control, tail_from, CommentSummary, CorrectionsUpdated, Run, RunState};
use crate::spectrum::SpectrumSet;

/// Character offset of the event count in the raw events line.
pub const EVENTS_FIELD_OFFSET: usize = 19;

const START_DISPLAY_OFFSET: usize = 21;
const END_DISPLAY_OFFSET: usize = 21;
const EVENTS_DISPLAY_OFFSET: usize = 20;
const COMMENT_DISPLAY_OFFSET: usize = 11;

/// The four metadata lines read from `comment.dat` for one run.
///
/// Lines are stored verbatim; a run missing from the comment file gets
/// single-space placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentData {
    /// `Run start time` line.
    pub start_time: String,
    /// `Run end time` line.
    pub end_time: String,
    /// Events line; the count starts at [`EVENTS_FIELD_OFFSET`].
    pub events: String,
    /// Comment line.
    pub comment: String,
}

impl Default for CommentData {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl CommentData {
    /// Whitespace placeholders used when no metadata was found.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            start_time: " ".to_string(),
            end_time: " ".to_string(),
            events: " ".to_string(),
            comment: " ".to_string(),
        }
    }

    /// Event (spill) count parsed from the events line.
    ///
    /// # Errors
    /// Returns a normalisation error if the field is not an integer.
    pub fn event_count(&self) -> Result<i64> {
        parse_event_field(&self.events, EVENTS_FIELD_OFFSET)
    }
}

/// A run whose detector data arrived pre-binned from flat text files.
///
/// Binning always uses [`BinMethod::Prebinned`] and there is no mode
/// selection step.
#[derive(Debug)]
pub struct HistogramRun {
    state: RunState,
    comment: CommentData,
}

impl HistogramRun {
    /// Creates a run from loaded spectra and comment metadata.
    #[must_use]
    pub fn new(
        raw: SpectrumSet,
        loaded_detectors: Vec<String>,
        run_num: impl Into<String>,
        comment: CommentData,
    ) -> Self {
        Self {
            state: RunState::new(raw, loaded_detectors, run_num),
            comment,
        }
    }

    /// Raw comment metadata.
    #[must_use]
    pub fn comment_data(&self) -> &CommentData {
        &self.comment
    }

    /// Binning method used by this variant.
    #[must_use]
    pub fn bin_method(&self) -> BinMethod {
        BinMethod::Prebinned
    }
}

impl Run for HistogramRun {
    fn state(&self) -> &RunState {
        &self.state
    }

    fn set_corrections(&mut self, request: CorrectionRequest) -> Result<()> {
        let bin_rate = request.bin_rate.unwrap_or(self.state.bin_rate);
        let default_bin = self.state.default_bin;
        let (energy_corrections, normalisation, normalise_which) = self.state.resolve(&request);

        let mut data = self.state.fresh_data();
        check_binning(&data, self.bin_method(), bin_rate, default_bin)?;

        apply_energy_corrections(&mut data, &energy_corrections);

        let spills = self.comment.event_count();
        let scales = match apply_normalisation(&mut data, normalisation, &normalise_which, |_| {
            spills.clone().map(|n| n as f64)
        }) {
            Ok(scales) => scales,
            Err(e) => {
                self.state.energy_corrections = energy_corrections;
                self.state.reset_normalisation();
                self.state.data = data;
                return Err(e);
            }
        };

        apply_binning(&mut data, self.bin_method(), bin_rate, default_bin, &scales)?;

        self.state.energy_corrections = energy_corrections;
        self.state.set_normalisation(normalisation, normalise_which);
        self.state.bin_rate = bin_rate;
        self.state.data = data;
        self.state.notify();
        Ok(())
    }

    fn read_comment_data(&self) -> CommentSummary {
        let start = tail_from(&strip_control(&self.comment.start_time), START_DISPLAY_OFFSET);
        let end = tail_from(&strip_control(&self.comment.end_time), END_DISPLAY_OFFSET);
        let events = tail_from(&strip_control(&self.comment.events), EVENTS_DISPLAY_OFFSET);
        let comment = tail_from(&strip_control(&self.comment.comment), COMMENT_DISPLAY_OFFSET);
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
