//! eva-core: Spectra and the run correction pipeline.
//!
//! This crate holds the per-detector [`Spectrum`] container, the pure
//! rebinning and normalisation functions, and the [`Run`] trait with its
//! two variants: [`HistogramRun`] for pre-binned flat files and
//! [`EventRun`] for per-event Nexus data.
//!

pub mod corrections;
pub mod error;
pub mod normalisation;
pub mod rebin;
pub mod run;
pub mod settings;
pub mod spectrum;

pub use corrections::{BinMethod, CorrectionRequest, EnergyCorrection, EnergyCorrections};
pub use error::{Error, Result};
pub use normalisation::Normalisation;
pub use run::event::{EventMetadata, EventRun, PlotMode};
pub use run::histogram::{CommentData, HistogramRun};
pub use run::{CommentSummary, CorrectionsUpdated, Run, RunState};
pub use settings::CorrectionSettings;
pub use spectrum::{EventData, Histogram2D, Spectrum, SpectrumSet};
