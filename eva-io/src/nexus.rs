//! Per-event Nexus (HDF5) run files.
//!
//! Layout read, relative to the `raw_data_1` entry:
//!
//! * `title`, `notes`, `start_time`, `end_time`: run metadata strings
//! * `detector_{i}_energyA/` and `detector_{i}_energyB/`: prompt and
//!   delayed histograms (`counts`, `energy`, `num_events`,
//!   `event_time_min`, `event_time_max`)
//! * `detector_{i}_events/`: raw `event_energy` and `event_time_offset`
//! * `detector_{i}_energy2D/counts`: time-energy histogram
//! * `instrument/detector_{i}/name`
//! * `selog/Momentum/value`: optional beam momentum

use std::path::Path;

use hdf5::types::{VarLenAscii, VarLenUnicode};
use hdf5::{File, Group};
use ndarray::Array2;

use eva_core::{
    CorrectionRequest, EventData, EventMetadata, EventRun, Histogram2D, Spectrum, SpectrumSet,
};

use crate::load::{apply_initial_corrections, LoadFlags, LoadOutcome};
use crate::locator::NexusLocator;
use crate::{Error, Result};

/// Root entry of the file.
pub const NEXUS_ROOT: &str = "raw_data_1";
/// Number of detector slots in a file.
pub const DETECTOR_SLOTS: usize = 4;

/// Everything read from one event file.
#[derive(Debug, Clone, Default)]
pub struct EventFile {
    pub metadata: EventMetadata,
    /// False if none of the run metadata strings were present.
    pub metadata_found: bool,
    /// Spectra of the included detector slots, in slot order.
    pub spectra: SpectrumSet,
    pub loaded_detectors: Vec<String>,
}

/// One time window's pre-built histogram.
#[derive(Debug, Default)]
struct Window {
    energy: Vec<f64>,
    counts: Vec<f64>,
    num_events: Option<f64>,
    time_bounds: Option<(f64, f64)>,
}

/// Reads the metadata and every detector slot with recorded events.
///
/// A slot is included only if its prompt and delayed windows together
/// recorded at least one event; empty slots are left out entirely.
///
/// # Errors
/// Returns an error if the file cannot be opened, has no `raw_data_1`
/// entry, or holds inconsistent arrays.
pub fn read_event_file(path: &Path, run_num: &str) -> Result<EventFile> {
    let file = File::open(path)?;
    let root = file.group(NEXUS_ROOT)?;

    let title = read_string_opt(&root, "title")?;
    let start_time = read_string_opt(&root, "start_time")?;
    let end_time = read_string_opt(&root, "end_time")?;
    let metadata_found = title.is_some() || start_time.is_some() || end_time.is_some();
    let placeholder = || " ".to_string();
    let metadata = EventMetadata {
        title: title.unwrap_or_else(placeholder),
        notes: read_string_opt(&root, "notes")?.unwrap_or_else(placeholder),
        start_time: start_time.unwrap_or_else(placeholder),
        end_time: end_time.unwrap_or_else(placeholder),
        momentum: read_momentum(&root)?,
    };

    let mut spectra = SpectrumSet::new();
    let mut loaded_detectors = Vec::new();
    for slot in 1..=DETECTOR_SLOTS {
        let Some(spectrum) = read_detector(&root, slot, run_num)? else {
            continue;
        };
        log::info!(
            "Loaded {} ({} events) from {}",
            spectrum.detector,
            spectrum.events.as_ref().map_or(0, |e| e.time.len()),
            path.display()
        );
        loaded_detectors.push(spectrum.detector.clone());
        spectra.insert(spectrum);
    }

    Ok(EventFile {
        metadata,
        metadata_found,
        spectra,
        loaded_detectors,
    })
}

/// Locates and loads an event-file run.
///
/// A missing file, or a file without any recorded events, yields no run and
/// `no_files_found`; a missing file also raises `comment_not_found`. `defaults` is applied once before the run is returned.
///
/// # Errors
/// Returns an error if the located file is unreadable or `defaults` holds
/// invalid parameters.
pub fn load_event_run(
    locator: &NexusLocator,
    run_num: &str,
    defaults: &CorrectionRequest,
) -> Result<LoadOutcome<EventRun>> {
    let Some(path) = locator.locate(run_num) else {
        log::warn!(
            "No event file found for run {run_num} in {}",
            locator.dir().display()
        );
        return Ok(LoadOutcome::nothing_found(true));
    };

    let file = read_event_file(&path, run_num)?;
    if file.loaded_detectors.is_empty() {
        log::warn!("{} has no detector with recorded events", path.display());
        return Ok(LoadOutcome::nothing_found(!file.metadata_found));
    }

    let mut flags = LoadFlags {
        comment_not_found: !file.metadata_found,
        ..LoadFlags::default()
    };
    if flags.comment_not_found {
        log::warn!("{} has no run metadata", path.display());
    }

    let mut run = EventRun::new(file.spectra, file.loaded_detectors, run_num, file.metadata);
    apply_initial_corrections(&mut run, defaults, &mut flags)?;
    Ok(LoadOutcome {
        run: Some(run),
        flags,
    })
}

fn read_detector(root: &Group, slot: usize, run_num: &str) -> Result<Option<Spectrum>> {
    let prompt = read_window(root, &format!("detector_{slot}_energyA"))?;
    let delayed = read_window(root, &format!("detector_{slot}_energyB"))?;
    let recorded = prompt.num_events.unwrap_or(0.0) + delayed.num_events.unwrap_or(0.0);
    if recorded <= 0.0 {
        log::debug!("Detector slot {slot} recorded no events, skipping");
        return Ok(None);
    }

    let detector = match root.group(&format!("instrument/detector_{slot}")) {
        Ok(group) => read_string_opt(&group, "name")?,
        Err(_) => None,
    }
    .map(|name| name.trim().to_string())
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| format!("GE{slot}"));

    let (energy, time) = match root.group(&format!("detector_{slot}_events")) {
        Ok(group) => (
            read_vec_opt(&group, "event_energy")?.unwrap_or_default(),
            read_vec_opt(&group, "event_time_offset")?.unwrap_or_default(),
        ),
        Err(_) => (Vec::new(), Vec::new()),
    };
    if energy.len() != time.len() {
        return Err(Error::InvalidFormat(format!(
            "detector_{slot}_events: {} energies but {} times",
            energy.len(),
            time.len()
        )));
    }

    let hist_2d = match root.group(&format!("detector_{slot}_energy2D")) {
        Ok(group) => read_histogram_2d(&group)?,
        Err(_) => None,
    };

    let event_time_bounds = match (prompt.time_bounds, delayed.time_bounds) {
        (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => Some((a_lo.min(b_lo), a_hi.max(b_hi))),
        (bounds, None) | (None, bounds) => bounds,
    };
    let bin_range = span(&prompt.energy);

    let events = EventData {
        time,
        energy,
        prompt_energy: prompt.energy,
        prompt_count: prompt.counts,
        delayed_energy: delayed.energy,
        delayed_count: delayed.counts,
        prompt_events: prompt.num_events,
        delayed_events: delayed.num_events,
        event_time_bounds,
        hist_2d,
        cut_data: Vec::new(),
    };

    let mut spectrum = Spectrum::new(
        detector,
        run_num,
        events.prompt_energy.clone(),
        events.prompt_count.clone(),
    )?
    .with_events(events);
    spectrum.bin_range = bin_range;
    Ok(Some(spectrum))
}

fn read_window(root: &Group, name: &str) -> Result<Window> {
    let Ok(group) = root.group(name) else {
        return Ok(Window::default());
    };

    let counts = read_vec_opt(&group, "counts")?.unwrap_or_default();
    let mut energy = read_vec_opt(&group, "energy")?.unwrap_or_default();
    if energy.len() == counts.len() + 1 {
        // bin edges
        energy = energy.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }
    if energy.len() != counts.len() {
        return Err(Error::InvalidFormat(format!(
            "{name}: {} energies but {} counts",
            energy.len(),
            counts.len()
        )));
    }

    let time_min = read_first_opt(&group, "event_time_min")?;
    let time_max = read_first_opt(&group, "event_time_max")?;
    Ok(Window {
        energy,
        counts,
        num_events: read_first_opt(&group, "num_events")?,
        time_bounds: time_min.zip(time_max),
    })
}

fn read_histogram_2d(group: &Group) -> Result<Option<Histogram2D>> {
    let Ok(dataset) = group.dataset("counts") else {
        return Ok(None);
    };
    if dataset.ndim() != 2 {
        return Err(Error::InvalidFormat(format!(
            "2D histogram has {} dimensions",
            dataset.ndim()
        )));
    }
    let counts: Array2<f64> = dataset.read_2d()?;
    let (rows, cols) = counts.dim();
    Ok(Some(Histogram2D {
        counts: counts.iter().copied().collect(),
        rows,
        cols,
    }))
}

fn read_momentum(root: &Group) -> Result<Option<f64>> {
    match root.group("selog/Momentum") {
        Ok(group) => read_first_opt(&group, "value"),
        Err(_) => Ok(None),
    }
}

fn read_vec_opt(group: &Group, name: &str) -> Result<Option<Vec<f64>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<f64>()?)),
        Err(_) => Ok(None),
    }
}

fn read_first_opt(group: &Group, name: &str) -> Result<Option<f64>> {
    Ok(read_vec_opt(group, name)?.and_then(|values| values.first().copied()))
}

/// Reads a string stored either as a scalar or as a one-element array.
fn read_string_opt(group: &Group, name: &str) -> Result<Option<String>> {
    let Ok(dataset) = group.dataset(name) else {
        return Ok(None);
    };
    if let Ok(value) = dataset.read_scalar::<VarLenUnicode>() {
        return Ok(Some(value.as_str().to_string()));
    }
    if let Ok(values) = dataset.read_raw::<VarLenUnicode>() {
        return Ok(values.first().map(|v| v.as_str().to_string()));
    }
    if let Ok(value) = dataset.read_scalar::<VarLenAscii>() {
        return Ok(Some(value.as_str().to_string()));
    }
    let values = dataset.read_raw::<VarLenAscii>()?;
    Ok(values.first().map(|v| v.as_str().to_string()))
}

fn span(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
        None => Some((v, v)),
    })
}
