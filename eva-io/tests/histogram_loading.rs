//! Loading histogram-file runs from a working directory.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use eva_core::{CorrectionRequest, EnergyCorrection, Normalisation, Run};
use eva_io::{load_histogram_run, ChannelMap, COMMENT_FILE};
use tempfile::TempDir;

const COMMENT: &str = "\
Run 2630
Run start time     : 2024-03-01 10:00:00
Run end time       : 2024-03-01 11:30:00
Number of events :  2000
Title    : sample
Comment  : Cu target
";

fn write_channel(dir: &Path, code: u32, rows: &[(f64, f64)]) {
    let text: String = rows.iter().map(|(x, y)| format!("{x} {y}\n")).collect();
    fs::write(dir.join(ChannelMap::file_name("2630", code)), text).unwrap();
}

fn two_channel_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_channel(dir.path(), 2099, &[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 2.0)]);
    write_channel(dir.path(), 4099, &[(0.0, 5.0), (1.0, 5.0)]);
    dir
}

#[test]
fn missing_channels_stay_as_empty_placeholders() {
    let dir = two_channel_dir();
    let outcome = load_histogram_run(
        dir.path(),
        "2630",
        &ChannelMap::default(),
        &CorrectionRequest::new(),
    )
    .unwrap();

    assert!(!outcome.flags.no_files_found);
    assert!(outcome.flags.comment_not_found);
    let run = outcome.run.unwrap();
    assert_eq!(run.loaded_detectors(), ["GE1".to_string(), "GE3".to_string()]);

    let raw = run.get_raw();
    let detectors: Vec<&str> = raw.detectors().collect();
    assert_eq!(detectors, vec!["GE1", "GE2", "GE3", "GE4"]);
    assert_eq!(raw.get("GE1").unwrap().len(), 4);
    assert!(raw.get("GE2").unwrap().is_empty());
    assert!(raw.get("GE2").unwrap().y.is_empty());
    assert_eq!(raw.get("GE3").unwrap().len(), 2);
    assert!(raw.get("GE4").unwrap().is_empty());
}

#[test]
fn no_files_gives_no_run() {
    let dir = TempDir::new().unwrap();
    let outcome = load_histogram_run(
        dir.path(),
        "2630",
        &ChannelMap::default(),
        &CorrectionRequest::new(),
    )
    .unwrap();
    assert!(outcome.run.is_none());
    assert!(outcome.flags.no_files_found);
    assert!(outcome.flags.comment_not_found);
}

#[test]
fn comment_is_checked_even_without_channel_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(COMMENT_FILE), COMMENT).unwrap();
    let outcome = load_histogram_run(
        dir.path(),
        "2630",
        &ChannelMap::default(),
        &CorrectionRequest::new(),
    )
    .unwrap();
    assert!(outcome.run.is_none());
    assert!(outcome.flags.no_files_found);
    assert!(!outcome.flags.comment_not_found);
}

#[test]
fn malformed_file_is_treated_as_missing() {
    let dir = two_channel_dir();
    fs::write(dir.path().join(ChannelMap::file_name("2630", 3099)), "1.0 abc\n").unwrap();
    let run = load_histogram_run(
        dir.path(),
        "2630",
        &ChannelMap::default(),
        &CorrectionRequest::new(),
    )
    .unwrap()
    .run
    .unwrap();
    assert_eq!(run.loaded_detectors().len(), 2);
    assert!(run.get_raw().get("GE2").unwrap().is_empty());
}

#[test]
fn defaults_are_applied_on_load() {
    let dir = two_channel_dir();
    fs::write(dir.path().join(COMMENT_FILE), COMMENT).unwrap();
    let mut calibration = eva_core::EnergyCorrections::new();
    calibration.insert("GE1".to_string(), EnergyCorrection::new(2.0, 10.0));
    let defaults = CorrectionRequest::new()
        .with_energy_corrections(calibration)
        .with_normalisation(Normalisation::Events);

    let outcome =
        load_histogram_run(dir.path(), "2630", &ChannelMap::default(), &defaults).unwrap();
    assert!(outcome.flags.is_clean());
    let run = outcome.run.unwrap();
    let ge1 = run.data().get("GE1").unwrap();
    assert_eq!(ge1.x, vec![10.0, 12.0, 14.0, 16.0]);
    assert_relative_eq!(ge1.y[2], 3.0 / 2000.0);
    assert_eq!(run.read_comment_data().comment, "Cu target");
}

#[test]
fn events_normalisation_without_comment_falls_back() {
    let dir = two_channel_dir();
    let defaults = CorrectionRequest::new().with_normalisation(Normalisation::Events);
    let outcome =
        load_histogram_run(dir.path(), "2630", &ChannelMap::default(), &defaults).unwrap();

    assert!(outcome.flags.comment_not_found);
    assert!(outcome.flags.norm_by_spills_error);
    let run = outcome.run.unwrap();
    assert_eq!(run.normalisation(), Normalisation::None);
    assert_eq!(run.data().get("GE3").unwrap().y, vec![5.0, 5.0]);
}

#[test]
fn invalid_defaults_are_reported() {
    let dir = two_channel_dir();
    let defaults = CorrectionRequest::new().with_bin_rate(-2.0);
    assert!(load_histogram_run(dir.path(), "2630", &ChannelMap::default(), &defaults).is_err());
}
