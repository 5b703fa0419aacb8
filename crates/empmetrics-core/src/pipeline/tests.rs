//! Tests for the pipeline against the fixture store.

use tempfile::TempDir;

use super::*;
use crate::extract::parse_date;
use crate::resolver::SqlConfigurationResolver;
use crate::source::SqliteDataSource;
use crate::table::Value;

const FIXTURE_SQL: &str = include_str!("../../tests/fixtures/store.sql");

fn fixture_store() -> SqliteDataSource {
    let source = SqliteDataSource::in_memory().expect("in-memory source");
    source.with_connection(|conn| conn.execute_batch(FIXTURE_SQL).expect("load fixture"));
    source
}

fn settings(organization: &str) -> ExtractionSettings {
    ExtractionSettings {
        organization: organization.to_string(),
        range: DateRange::parse("2020-01-01", "2020-06-08").unwrap(),
        window: TimeWindow::parse("08:00", "18:00").unwrap(),
        cutoff: parse_date("2020-05-08").unwrap(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Start(Stage),
    Complete(Stage, usize),
    Error(Stage),
}

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<Event>,
}

impl PipelineObserver for Recorder {
    fn on_stage_start(&mut self, stage: Stage) {
        self.events.push(Event::Start(stage));
    }

    fn on_stage_complete(&mut self, stage: Stage, table: &Table, _elapsed: Duration) {
        self.events.push(Event::Complete(stage, table.num_rows()));
    }

    fn on_stage_error(
        &mut self,
        stage: Stage,
        _elapsed: Duration,
        _error: &(dyn std::error::Error + 'static),
    ) {
        self.events.push(Event::Error(stage));
    }
}

#[test]
fn test_dry_run_joins_all_metrics() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let mut pipeline = Pipeline::new(&source, &resolver);

    let report = pipeline.run(&settings("maize"), None).unwrap();

    assert_eq!(report.organization, OrganizationRecord::new(7, "Maize Regional"));
    assert!(report.output.is_none());
    assert_eq!(
        report.table.columns(),
        [
            "employee_id",
            "clicks_count",
            "patients_accessed_count",
            "after_hours_count",
            "department",
            "indicator",
        ]
    );
    assert_eq!(
        report.table.rows(),
        [
            vec![
                Value::Integer(1),
                Value::Integer(3),
                Value::Integer(2),
                Value::Integer(2),
                Value::from("ICU"),
                Value::from("1"),
            ],
            vec![
                Value::Integer(2),
                Value::Integer(2),
                Value::Integer(1),
                Value::Null,
                Value::from("ER"),
                Value::from("0"),
            ],
            vec![
                Value::Integer(3),
                Value::Integer(1),
                Value::Null,
                Value::Integer(1),
                Value::Null,
                Value::Null,
            ],
        ]
    );
}

#[test]
fn test_joined_keys_follow_termination_indicator() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let range = settings("Maize").range;

    let indicator = extract::termination_indicator(
        &source,
        &resolver,
        &TerminationParams::new(
            parse_date("2020-05-08").unwrap(),
            OrganizationRecord::new(7, "Maize Regional"),
        ),
    )
    .unwrap();
    let patients = extract::patients_accessed(&source, &range).unwrap();
    let report = Pipeline::new(&source, &resolver)
        .run(&settings("Maize"), None)
        .unwrap();

    let joined = report.table.integer_keys(EMPLOYEE_ID).unwrap();
    assert_eq!(joined, indicator.integer_keys(EMPLOYEE_ID).unwrap());
    assert_ne!(joined, patients.integer_keys(EMPLOYEE_ID).unwrap());
}

#[test]
fn test_observer_sees_stages_in_order() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.parquet");
    let mut recorder = Recorder::default();

    let report = Pipeline::new(&source, &resolver)
        .with_observer(&mut recorder)
        .run(&settings("Maize"), Some(&path))
        .unwrap();

    let expected_rows = [3, 2, 2, 2, 3];
    let mut expected = Vec::new();
    for (metric, rows) in Metric::ALL.into_iter().zip(expected_rows) {
        expected.push(Event::Start(Stage::Extract(metric)));
        expected.push(Event::Complete(Stage::Extract(metric), rows));
    }
    expected.extend([
        Event::Start(Stage::Join),
        Event::Complete(Stage::Join, 3),
        Event::Start(Stage::Persist),
        Event::Complete(Stage::Persist, 3),
    ]);
    assert_eq!(recorder.events, expected);

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages.len(), 7);
    assert_eq!(stages.last(), Some(&Stage::Persist));
}

#[test]
fn test_run_writes_output_file() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cone.parquet");

    let report = Pipeline::new(&source, &resolver)
        .run(&settings("Maize"), Some(&path))
        .unwrap();

    assert_eq!(report.output.as_deref(), Some(path.as_path()));
    assert_eq!(persist::load(&path).unwrap(), report.table);
}

#[test]
fn test_unknown_organization_aborts_before_any_stage() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.parquet");
    let mut recorder = Recorder::default();

    let err = Pipeline::new(&source, &resolver)
        .with_observer(&mut recorder)
        .run(&settings("Wheat"), Some(&path))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Resolve(ResolveError::OrganizationNotFound { .. })
    ));
    assert_eq!(err.stage(), None);
    assert!(recorder.events.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_failed_extractor_writes_nothing() {
    let source = fixture_store();
    // Other Health has a term date field but no hire setting.
    let resolver = SqlConfigurationResolver::new(&source);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.parquet");
    let mut recorder = Recorder::default();

    let err = Pipeline::new(&source, &resolver)
        .with_observer(&mut recorder)
        .run(&settings("other"), Some(&path))
        .unwrap_err();

    let failed = Stage::Extract(Metric::TerminationIndicator);
    assert_eq!(err.stage(), Some(failed));
    assert!(err.to_string().contains("termination_indicator"));
    assert_eq!(recorder.events.last(), Some(&Event::Error(failed)));
    assert!(!recorder.events.contains(&Event::Start(Stage::Join)));
    assert!(!path.exists());
}

#[test]
fn test_missing_output_directory_fails_persist() {
    let source = fixture_store();
    let resolver = SqlConfigurationResolver::new(&source);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("out.parquet");

    let err = Pipeline::new(&source, &resolver)
        .run(&settings("Maize"), Some(&path))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Persist(PersistError::Io { .. })
    ));
    assert!(!path.exists());
}

#[test]
fn test_stage_names() {
    assert_eq!(Stage::Extract(Metric::Clicks).name(), "clicks");
    assert_eq!(Stage::Join.to_string(), "join");
    assert_eq!(Stage::Persist.name(), "persist");
}
