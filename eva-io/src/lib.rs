//! eva-io: Run loading and spectrum export for EVA.
//!
//! Two independent loaders build runs from a working directory:
//! [`load_histogram_run`] for the per-channel flat histogram files plus
//! `comment.dat`, and (with the `hdf5` feature) [`load_event_run`] for a
//! single per-event Nexus file. Neither fails on missing data; they report
//! what was absent through [`LoadFlags`].
//!

mod comment;
mod error;
pub mod histogram_files;
mod load;
pub mod locator;
#[cfg(feature = "hdf5")]
pub mod nexus;
#[cfg(feature = "serde")]
mod settings;
mod writer;

pub use comment::{find_comment, load_comment, COMMENT_FILE};
pub use error::{Error, Result};
pub use histogram_files::{load_histogram_run, read_histogram_file, ChannelMap};
pub use load::{LoadFlags, LoadOutcome};
pub use locator::NexusLocator;
#[cfg(feature = "hdf5")]
pub use nexus::{load_event_run, read_event_file, EventFile};
#[cfg(feature = "serde")]
pub use settings::load_settings;
pub use writer::{ExportFormat, SpectrumWriter};
