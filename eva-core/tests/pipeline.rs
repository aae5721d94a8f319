//! End-to-end checks of the correction pipeline over both run variants.

use approx::assert_relative_eq;
use eva_core::{
    CommentData, CorrectionRequest, EnergyCorrection, EnergyCorrections, EventData,
    EventMetadata, EventRun, HistogramRun, Normalisation, PlotMode, Run, Spectrum, SpectrumSet,
};

fn histogram_run(comment: CommentData) -> HistogramRun {
    let raw: SpectrumSet = [
        Spectrum::new(
            "GE1",
            "2630",
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1.0, 2.0, 3.0, 2.0, 1.0],
        )
        .unwrap(),
        Spectrum::empty("GE2", "2630"),
        Spectrum::new("GE3", "2630", (0..16).map(f64::from).collect(), vec![4.0; 16]).unwrap(),
        Spectrum::empty("GE4", "2630"),
    ]
    .into_iter()
    .collect();
    HistogramRun::new(
        raw,
        vec!["GE1".to_string(), "GE3".to_string()],
        "2630",
        comment,
    )
}

fn event_run() -> EventRun {
    let events = EventData {
        time: (0..400).map(|i| f64::from(i) * 10.0 - 5.0).collect(),
        energy: (0..400).map(|i| f64::from(i % 40)).collect(),
        prompt_energy: (0..40).map(f64::from).collect(),
        prompt_count: vec![3.0; 40],
        delayed_energy: (0..40).map(f64::from).collect(),
        delayed_count: vec![1.0; 40],
        prompt_events: Some(300.0),
        delayed_events: Some(120.0),
        ..EventData::default()
    };
    let ge1 = Spectrum::new(
        "GE1",
        "3000",
        events.prompt_energy.clone(),
        events.prompt_count.clone(),
    )
    .unwrap()
    .with_bin_range((0.0, 39.0))
    .with_events(events);
    EventRun::new(
        std::iter::once(ge1).collect(),
        vec!["GE1".to_string()],
        "3000",
        EventMetadata::default(),
    )
}

fn calibration(detectors: &[&str]) -> EnergyCorrections {
    detectors
        .iter()
        .map(|d| (d.to_string(), EnergyCorrection::new(2.0, 10.0)))
        .collect()
}

fn requests() -> Vec<CorrectionRequest> {
    vec![
        CorrectionRequest::new().with_energy_corrections(calibration(&["GE1", "GE3"])),
        CorrectionRequest::new().with_normalisation(Normalisation::Counts),
        CorrectionRequest::new().with_bin_rate(2.0),
        CorrectionRequest::new().with_bin_rate(0.5),
        CorrectionRequest::new()
            .with_normalisation(Normalisation::None)
            .with_bin_rate(1.0),
    ]
}

fn assert_raw_stable<R: Run>(run: &mut R, extra: Vec<CorrectionRequest>) {
    let loaded = run.get_raw();
    for request in requests().into_iter().chain(extra) {
        run.set_corrections(request).unwrap();
        assert_eq!(run.get_raw(), loaded);
    }
}

#[test]
fn raw_is_immutable_for_both_variants() {
    assert_raw_stable(&mut histogram_run(CommentData::placeholder()), Vec::new());
    assert_raw_stable(
        &mut event_run(),
        PlotMode::ALL
            .into_iter()
            .map(|mode| {
                CorrectionRequest::new()
                    .with_plot_mode(mode)
                    .with_default_bin(40)
            })
            .collect(),
    );
}

#[test]
fn calibration_then_count_normalisation() {
    let mut run = histogram_run(CommentData::placeholder());
    run.set_corrections(
        CorrectionRequest::new()
            .with_energy_corrections(calibration(&["GE1", "GE3"]))
            .with_normalisation(Normalisation::Counts),
    )
    .unwrap();

    let ge1 = run.data().get("GE1").unwrap();
    assert_eq!(ge1.x, vec![10.0, 12.0, 14.0, 16.0, 18.0]);
    let expected = [1.0 / 9.0, 2.0 / 9.0, 3.0 / 9.0, 2.0 / 9.0, 1.0 / 9.0];
    for (got, want) in ge1.y.iter().zip(expected) {
        assert_relative_eq!(*got, want);
    }
}

#[test]
fn unit_bin_rate_leaves_corrected_data_alone() {
    let mut hist = histogram_run(CommentData::placeholder());
    hist.set_corrections(
        CorrectionRequest::new()
            .with_energy_corrections(calibration(&["GE1", "GE3"]))
            .with_normalisation(Normalisation::Counts),
    )
    .unwrap();
    let before = hist.data().clone();
    hist.set_corrections(CorrectionRequest::new().with_bin_rate(1.0))
        .unwrap();
    assert_eq!(hist.data(), &before);

    let mut event = event_run();
    event
        .set_corrections(
            CorrectionRequest::new()
                .with_plot_mode(PlotMode::Efficiency)
                .with_default_bin(40)
                .with_normalisation(Normalisation::Counts),
        )
        .unwrap();
    let before = event.data().clone();
    event
        .set_corrections(CorrectionRequest::new().with_bin_rate(1.0))
        .unwrap();
    assert_eq!(event.data(), &before);
}

#[test]
fn events_normalisation_without_metadata_falls_back() {
    let mut run = histogram_run(CommentData::placeholder());
    let err = run
        .set_corrections(CorrectionRequest::new().with_normalisation(Normalisation::Events))
        .unwrap_err();
    assert!(err.is_normalisation());
    assert_eq!(run.normalisation(), Normalisation::None);

    // the run is still usable afterwards
    run.set_corrections(CorrectionRequest::new().with_bin_rate(2.0))
        .unwrap();
    assert_eq!(run.data().get("GE3").unwrap().len(), 8);
}

#[test]
fn subscribers_see_each_successful_pass() {
    let mut run = event_run();
    let rx = run.subscribe();
    for request in requests() {
        run.set_corrections(request).unwrap();
    }
    assert_eq!(rx.try_iter().count(), requests().len());
}

#[test]
fn efficiency_normalises_by_delayed_events() {
    let mut run = event_run();
    run.set_corrections(
        CorrectionRequest::new()
            .with_plot_mode(PlotMode::Efficiency)
            .with_default_bin(40)
            .with_normalisation(Normalisation::Events),
    )
    .unwrap();
    // every event but the one at t = -5 passes the efficiency gate
    assert_relative_eq!(run.data().get("GE1").unwrap().total(), 399.0 / 120.0);
}

fn assert_failed_pass_changes_nothing<R: Run>(run: &mut R, request: CorrectionRequest) {
    let data = run.data().clone();
    let rx = run.subscribe();
    assert!(run.set_corrections(request).is_err());
    assert_eq!(run.data(), &data);
    assert_eq!(run.normalisation(), Normalisation::None);
    assert!(run.state().energy_corrections().is_empty());
    assert_relative_eq!(run.state().bin_rate(), 1.0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn unbinnable_rate_is_rejected_before_any_change() {
    assert_failed_pass_changes_nothing(
        &mut histogram_run(CommentData::placeholder()),
        CorrectionRequest::new()
            .with_energy_corrections(calibration(&["GE1", "GE3"]))
            .with_normalisation(Normalisation::Counts)
            .with_bin_rate(6.0),
    );

    let mut event = event_run();
    assert_failed_pass_changes_nothing(
        &mut event,
        CorrectionRequest::new()
            .with_plot_mode(PlotMode::Efficiency)
            .with_default_bin(40)
            .with_energy_corrections(calibration(&["GE1"]))
            .with_normalisation(Normalisation::Counts)
            .with_bin_rate(50.0),
    );
    assert_eq!(event.plot_mode(), PlotMode::IbexPrompt);
}
