use interop_conformance::fixtures::{registry, Fixture, Remote};
use interop_core::ConfigError;
use interop_plan::{compile, AssumeAvailable, Classification, PlanningFilters, PlanningWarning};
use interop_report::{parse, Aggregator, RunOutcome, RunRecord, RunStatus, RunSummary, SUMMARY_FILE};

#[test]
fn only_the_shared_target_pair_is_planned() {
    let reg = registry(14, &[
        Fixture::new("x", [14]).client(),
        Fixture::new("y", [14]).remote(Remote::active("https://y.example:4443", "webtransport")),
        Fixture::new("z", [13]).remote(Remote::active("moqt://z.example:4443", "quic")),
    ]);
    let plan = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();

    assert_eq!(plan.pairs(), vec![("x", "y")]);
    assert_eq!(plan.entries()[0].classification, Classification::At);
    assert_eq!(
        plan.warnings(),
        &[PlanningWarning::NoSharedVersion { client: "x".into(), relay: "z".into() }]
    );
}

#[test]
fn todo_failure_scenario() {
    let v = parse("TAP version 14\n1..2\nok 1 - a\nnot ok 2 - b # TODO flaky\n").unwrap();
    assert_eq!((v.passed(), v.failed(), v.skipped(), v.total()), (2, 0, 0, 2));
}

#[test]
fn inactive_endpoints_are_never_planned() {
    let reg = registry(14, &[
        Fixture::new("c", [14]).client(),
        Fixture::new("r", [14])
            .remote(Remote::inactive("https://old.r.example", "webtransport"))
            .remote(Remote::active("moqt://r.example", "quic")),
        Fixture::new("gone", [14]).remote(Remote::inactive("https://gone.example", "webtransport")),
    ]);
    let plan = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();

    let targets: Vec<_> = plan.entries().iter().map(|e| e.target.as_str()).collect();
    assert_eq!(targets, vec!["moqt://r.example"]);
    assert!(plan
        .warnings()
        .contains(&PlanningWarning::NoEndpoints { client: "c".into(), relay: "gone".into() }));
}

#[test]
fn conflicting_classification_filters_are_rejected() {
    let err = PlanningFilters::builder()
        .only(Classification::At)
        .only(Classification::Behind)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::ConflictingFilters(_)));
}

#[test]
fn summary_survives_every_step_of_a_run() {
    let reg = registry(14, &[
        Fixture::new("a", [13, 14]).client().docker_relay(),
        Fixture::new("b", [14, 15]).client().remote(Remote::active("https://b.example", "webtransport")),
    ]);
    let plan = compile(&reg, &reg.current_target, &PlanningFilters::default(), &AssumeAvailable).unwrap();
    assert_eq!(plan.len(), 4);

    let dir = tempfile::tempdir().unwrap();
    let mut aggregator = Aggregator::create(dir.path(), plan.target_version.clone()).unwrap();
    let path = dir.path().join(SUMMARY_FILE);

    let outputs = [
        "TAP version 14\n1..1\nok 1 - setup-only\n",
        "",
        "✓ setup-only\n✗ announce-only\n",
        "TAP version 14\n1..2\nok 1 - setup-only\n",
    ];
    // Completion order differs from plan order.
    for i in [3usize, 1, 0, 2] {
        let entry = &plan.entries()[i];
        let outcome = RunOutcome::from_process_output(outputs[i], Some(0), false);
        aggregator.submit(RunRecord::new(entry, outcome, None)).unwrap();
        RunSummary::load(&path).unwrap();
    }
    let summary = aggregator.finalize().unwrap();

    let statuses: Vec<_> = summary.runs.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RunStatus::Pass, RunStatus::Fail, RunStatus::Fail, RunStatus::Fail]);
    assert_eq!(summary.runs[1].reason.as_deref(), Some("no output"));
    assert_eq!(summary.runs[3].reason.as_deref(), Some("planned 2 test(s) but 1 reported"));
    assert_eq!(RunSummary::load(&path).unwrap(), summary);
    assert!(!summary.success());
}
