//! Spectrum container types.
//!
//! A [`Spectrum`] holds one detector's data for one run. The event-file
//! variant additionally carries per-event arrays and pre-computed
//! prompt/delayed histograms in [`EventData`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One detector's data for a single run.
///
/// `x` and `y` always have equal length. A spectrum with zero-length axes
/// stands for "no data for this detector".
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    /// Detector identifier (e.g. `GE1`).
    pub detector: String,
    /// Run number the data belongs to.
    pub run_number: String,
    /// Position / energy axis.
    pub x: Vec<f64>,
    /// Intensity / counts axis.
    pub y: Vec<f64>,
    /// Lower and upper bound used when binning.
    pub bin_range: Option<(f64, f64)>,
    /// Raw event payload (event-file variant only).
    #[cfg_attr(feature = "serde", serde(skip))]
    pub events: Option<EventData>,
}

impl Spectrum {
    /// Creates a spectrum from parallel position and intensity arrays.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if `x` and `y` differ in length.
    pub fn new(
        detector: impl Into<String>,
        run_number: impl Into<String>,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self> {
        let detector = detector.into();
        if x.len() != y.len() {
            return Err(Error::LengthMismatch {
                detector,
                x: x.len(),
                y: y.len(),
            });
        }
        Ok(Self {
            detector,
            run_number: run_number.into(),
            x,
            y,
            bin_range: None,
            events: None,
        })
    }

    /// Creates an empty placeholder spectrum for a detector with no data.
    #[must_use]
    pub fn empty(detector: impl Into<String>, run_number: impl Into<String>) -> Self {
        Self {
            detector: detector.into(),
            run_number: run_number.into(),
            ..Self::default()
        }
    }

    /// Sets the binning range.
    #[must_use]
    pub fn with_bin_range(mut self, range: (f64, f64)) -> Self {
        self.bin_range = Some(range);
        self
    }

    /// Attaches raw event data.
    #[must_use]
    pub fn with_events(mut self, events: EventData) -> Self {
        self.events = Some(events);
        self
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the spectrum holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Sum of the intensity axis.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.y.iter().sum()
    }
}

/// Per-event arrays and pre-computed histograms read from an event file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    /// Per-event time offsets.
    pub time: Vec<f64>,
    /// Per-event energies (parallel to `time`).
    pub energy: Vec<f64>,
    /// Prompt histogram energy axis.
    pub prompt_energy: Vec<f64>,
    /// Prompt histogram counts.
    pub prompt_count: Vec<f64>,
    /// Delayed histogram energy axis.
    pub delayed_energy: Vec<f64>,
    /// Delayed histogram counts.
    pub delayed_count: Vec<f64>,
    /// Number of events recorded in the prompt window.
    pub prompt_events: Option<f64>,
    /// Number of events recorded in the delayed window.
    pub delayed_events: Option<f64>,
    /// Minimum and maximum event time recorded by the acquisition.
    pub event_time_bounds: Option<(f64, f64)>,
    /// Pre-binned time-energy histogram.
    pub hist_2d: Option<Histogram2D>,
    /// Scratch field: time-gated subset feeding the raw binning step.
    pub cut_data: Vec<f64>,
}

impl EventData {
    /// Returns the energies of all events whose time satisfies `gate`.
    pub fn energies_where<F>(&self, gate: F) -> Vec<f64>
    where
        F: Fn(f64) -> bool,
    {
        self.time
            .iter()
            .zip(&self.energy)
            .filter(|(t, _)| gate(**t))
            .map(|(_, e)| *e)
            .collect()
    }

    /// Returns all event times satisfying `gate`.
    pub fn times_where<F>(&self, gate: F) -> Vec<f64>
    where
        F: Fn(f64) -> bool,
    {
        self.time.iter().copied().filter(|t| gate(*t)).collect()
    }

    /// Total number of recorded events over both windows.
    #[must_use]
    pub fn recorded_events(&self) -> f64 {
        self.prompt_events.unwrap_or(0.0) + self.delayed_events.unwrap_or(0.0)
    }
}

/// A dense 2D histogram stored in row-major order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram2D {
    /// Flattened counts, `counts[row * cols + col]`.
    pub counts: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl Histogram2D {
    /// Creates a zero-filled histogram.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            counts: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Get the count at a specific cell.
    #[must_use]
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.counts[row * self.cols + col])
        } else {
            None
        }
    }

    /// Sum over all cells.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Ordered detector → spectrum collection.
///
/// Keeps the configured channel order, which a map keyed by detector name
/// would lose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumSet {
    spectra: Vec<Spectrum>,
}

impl SpectrumSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a spectrum, replacing any existing entry for the same detector.
    pub fn insert(&mut self, spectrum: Spectrum) {
        match self.get_mut(&spectrum.detector) {
            Some(existing) => *existing = spectrum,
            None => self.spectra.push(spectrum),
        }
    }

    /// Looks up a detector's spectrum.
    #[must_use]
    pub fn get(&self, detector: &str) -> Option<&Spectrum> {
        self.spectra.iter().find(|s| s.detector == detector)
    }

    /// Looks up a detector's spectrum mutably.
    pub fn get_mut(&mut self, detector: &str) -> Option<&mut Spectrum> {
        self.spectra.iter_mut().find(|s| s.detector == detector)
    }

    /// Returns true if the detector has an entry.
    #[must_use]
    pub fn contains(&self, detector: &str) -> bool {
        self.get(detector).is_some()
    }

    /// Detector names in channel order.
    pub fn detectors(&self) -> impl Iterator<Item = &str> {
        self.spectra.iter().map(|s| s.detector.as_str())
    }

    /// Iterates over the spectra in channel order.
    pub fn iter(&self) -> std::slice::Iter<'_, Spectrum> {
        self.spectra.iter()
    }

    /// Iterates mutably over the spectra in channel order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Spectrum> {
        self.spectra.iter_mut()
    }

    /// Number of detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Returns true if the set has no detectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Returns true if every spectrum in the set has zero-length data.
    #[must_use]
    pub fn all_empty(&self) -> bool {
        self.spectra.iter().all(Spectrum::is_empty)
    }
}

impl FromIterator<Spectrum> for SpectrumSet {
    fn from_iter<I: IntoIterator<Item = Spectrum>>(iter: I) -> Self {
        let mut set = Self::new();
        for spectrum in iter {
            set.insert(spectrum);
        }
        set
    }
}

impl<'a> IntoIterator for &'a SpectrumSet {
    type Item = &'a Spectrum;
    type IntoIter = std::slice::Iter<'a, Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.iter()
    }
}

impl IntoIterator for SpectrumSet {
    type Item = Spectrum;
    type IntoIter = std::vec::IntoIter<Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.into_iter()
    }
}
