//! Orchestrated WAP runs over the example music-streaming pipeline.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use polars::prelude::{AnyValue, DataFrame, IntoColumn, NamedFrom, Series};
use wap_common::any_to_string;
use wap_core::{MemoryRunLedger, PipelineOrchestrator, RetryPolicy, RunLedger};
use wap_ingest::{IngestError, LoadSummary, StagingLoader};
use wap_model::{
    DeletionMode, FailureKind, Layer, PipelineConfig, RelationRef, RunContext, RunRecord,
    RunStatus, StagingDescriptor, WapError,
};
use wap_warehouse::{LocalWarehouse, Predicate, Warehouse, WarehouseError};

const PIPELINE: &str = include_str!("../../../config/pipeline.toml");

// 2018-11-01 UTC
const TS_A: i64 = 1_541_105_830_796;
const TS_B: i64 = 1_541_106_106_796;
const DAY_MS: i64 = 86_400_000;

// ============================================================================
// Fixtures
// ============================================================================

/// Serves prepared frames keyed by the rendered source locator.
#[derive(Default)]
struct FixtureLoader {
    sources: RefCell<HashMap<String, DataFrame>>,
    failures: Cell<u32>,
}

impl FixtureLoader {
    fn set(&self, locator: &str, frame: DataFrame) {
        self.sources.borrow_mut().insert(locator.to_string(), frame);
    }

    fn fail_next(&self, times: u32) {
        self.failures.set(times);
    }
}

impl StagingLoader for FixtureLoader {
    fn load(
        &self,
        ctx: &RunContext,
        staging: &StagingDescriptor,
        warehouse: &mut dyn Warehouse,
    ) -> wap_ingest::Result<LoadSummary> {
        let remaining = self.failures.get();
        if remaining > 0 {
            self.failures.set(remaining - 1);
            return Err(IngestError::InvalidStaging {
                table: staging.table.clone(),
                message: "bulk copy interrupted".to_string(),
            });
        }

        let relation = RelationRef::staging(&staging.table);
        let rows_deleted = match (staging.deletion_mode, &staging.time_column) {
            (DeletionMode::ByRunDate, Some(time_column)) => warehouse
                .delete_where(&relation, &Predicate::on_date(time_column, ctx.run_date()))?,
            _ => warehouse.truncate(&relation)?,
        };
        let locator = ctx.render_template(&staging.source_locator);
        let rows_loaded = match self.sources.borrow().get(&locator) {
            Some(frame) => warehouse.insert(&relation, frame)?,
            None => 0,
        };
        Ok(LoadSummary {
            table: staging.table.clone(),
            files: usize::from(rows_loaded > 0),
            rows_deleted,
            rows_loaded,
        })
    }
}

struct Event {
    userid: i64,
    first: Option<&'static str>,
    level: &'static str,
    song: &'static str,
    artist: &'static str,
    length: f64,
    page: &'static str,
    ts: i64,
}

fn play(userid: i64, level: &'static str, song: &'static str, artist: &'static str, length: f64, ts: i64) -> Event {
    Event {
        userid,
        first: Some("Lily"),
        level,
        song,
        artist,
        length,
        page: "NextSong",
        ts,
    }
}

fn events(events: &[Event]) -> DataFrame {
    let n = events.len();
    DataFrame::new(vec![
        Series::new("artist".into(), events.iter().map(|e| e.artist).collect::<Vec<_>>()).into_column(),
        Series::new("firstname".into(), events.iter().map(|e| e.first).collect::<Vec<_>>()).into_column(),
        Series::new("lastname".into(), vec!["Koch"; n]).into_column(),
        Series::new("gender".into(), vec!["F"; n]).into_column(),
        Series::new("length".into(), events.iter().map(|e| e.length).collect::<Vec<_>>()).into_column(),
        Series::new("level".into(), events.iter().map(|e| e.level).collect::<Vec<_>>()).into_column(),
        Series::new("location".into(), vec!["Chicago, IL"; n]).into_column(),
        Series::new("page".into(), events.iter().map(|e| e.page).collect::<Vec<_>>()).into_column(),
        Series::new("sessionid".into(), vec![583i64; n]).into_column(),
        Series::new("song".into(), events.iter().map(|e| e.song).collect::<Vec<_>>()).into_column(),
        Series::new("ts".into(), events.iter().map(|e| e.ts).collect::<Vec<_>>()).into_column(),
        Series::new("useragent".into(), vec!["Mozilla/5.0"; n]).into_column(),
        Series::new("userid".into(), events.iter().map(|e| e.userid).collect::<Vec<_>>()).into_column(),
    ])
    .unwrap()
}

fn catalog(durations: [f64; 4]) -> DataFrame {
    catalog_with_drift(durations, "Z feat. W")
}

/// The catalog with the name recorded for `AR2`'s last song overridden.
fn catalog_with_drift(durations: [f64; 4], last_artist_name: &'static str) -> DataFrame {
    DataFrame::new(vec![
        Series::new("song_id".into(), vec!["S1", "S2", "S2", "S3"]).into_column(),
        Series::new("title".into(), vec!["A", "C", "C", "D"]).into_column(),
        Series::new("artist_id".into(), vec!["AR1", "AR2", "AR2", "AR2"]).into_column(),
        Series::new("artist_name".into(), vec!["X", "Z", "Z", last_artist_name]).into_column(),
        Series::new("artist_location".into(), vec![Some("Oslo"), None, Some("Lima"), None]).into_column(),
        Series::new("artist_latitude".into(), vec![Some(59.9), None, Some(-12.0), None]).into_column(),
        Series::new("artist_longitude".into(), vec![Some(10.7), None, Some(-77.0), None]).into_column(),
        Series::new("duration".into(), durations.to_vec()).into_column(),
        Series::new("year".into(), vec![2004i64, 0, 0, 2010]).into_column(),
    ])
    .unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 11, day).unwrap()
}

fn events_locator(day: u32) -> String {
    RunContext::new(date(day)).render_template("log-data/{year}/{month}/{ds}-events.csv")
}

type Orchestrator = PipelineOrchestrator<LocalWarehouse, FixtureLoader, MemoryRunLedger>;

fn orchestrator_with(config: &str) -> Orchestrator {
    let config = PipelineConfig::from_toml_str(config).expect("valid pipeline");
    let loader = FixtureLoader::default();
    loader.set("song-data", catalog([200.0, 180.5, 181.25, 99.0]));
    PipelineOrchestrator::new(config, LocalWarehouse::in_memory(), loader, MemoryRunLedger::new())
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
}

fn orchestrator() -> Orchestrator {
    orchestrator_with(PIPELINE)
}

fn production(orchestrator: &Orchestrator, table: &str) -> DataFrame {
    orchestrator
        .warehouse()
        .read(&RelationRef::production(table))
        .unwrap()
}

fn texts(frame: &DataFrame, column: &str) -> Vec<String> {
    let column = frame.column(column).unwrap();
    (0..frame.height())
        .map(|idx| any_to_string(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect()
}

const TABLES: [&str; 5] = ["fct_songplays", "dim_users", "dim_songs", "dim_artists", "dim_times"];

// ============================================================================
// Testable properties
// ============================================================================

#[test]
fn example_run_keeps_only_matched_plays() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().set(
        &events_locator(1),
        events(&[
            play(10, "free", "A", "X", 200.0, TS_A),
            play(11, "paid", "B", "Y", 150.0, TS_B),
        ]),
    );

    let report = orchestrator.trigger(date(1)).unwrap();
    assert_eq!(report.record.status, RunStatus::Succeeded);
    assert_eq!(report.units[0].table, "fct_songplays");
    assert_eq!(report.units[0].rows_written, 1);

    let facts = production(&orchestrator, "fct_songplays");
    assert_eq!(facts.height(), 1);
    assert_eq!(texts(&facts, "song_id"), vec!["S1"]);
    assert_eq!(texts(&facts, "artist_name"), vec!["X"]);
    assert_eq!(texts(&facts, "dwh_ds"), vec!["2018-11-01"]);

    // The unmatched play still counts as a user and a time.
    assert_eq!(production(&orchestrator, "dim_users").height(), 2);
    assert_eq!(production(&orchestrator, "dim_times").height(), 2);
}

#[test]
fn rerunning_a_date_is_idempotent() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().set(
        &events_locator(1),
        events(&[
            play(10, "free", "A", "X", 200.0, TS_A),
            play(10, "free", "A", "X", 200.0, TS_A),
            play(11, "paid", "C", "Z", 181.25, TS_B),
        ]),
    );

    orchestrator.trigger(date(1)).unwrap();
    let first: Vec<DataFrame> = TABLES.iter().map(|t| production(&orchestrator, t)).collect();
    let rerun = orchestrator.trigger(date(1)).unwrap();
    let second: Vec<DataFrame> = TABLES.iter().map(|t| production(&orchestrator, t)).collect();

    assert_eq!(rerun.record.attempts, 2);
    for ((table, before), after) in TABLES.iter().zip(&first).zip(&second) {
        assert!(before.equals_missing(after), "{table} changed on rerun");
    }
    // Exact duplicate plays collapse to one fact row.
    assert_eq!(first[0].height(), 2);
}

#[test]
fn current_state_keeps_latest_level() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().set(
        &events_locator(1),
        events(&[
            play(10, "paid", "A", "X", 200.0, TS_B),
            play(10, "free", "A", "X", 200.0, TS_A),
        ]),
    );
    orchestrator.trigger(date(1)).unwrap();

    let users = production(&orchestrator, "dim_users");
    assert_eq!(users.height(), 1);
    assert_eq!(texts(&users, "level"), vec!["paid"]);
}

#[test]
fn drifting_artist_names_get_their_own_surrogate_rows() {
    let mut orchestrator = orchestrator();
    orchestrator.trigger(date(1)).unwrap();

    let artists = production(&orchestrator, "dim_artists");
    let ids = texts(&artists, "artist_id");
    let keys = texts(&artists, "artist_sk");
    let drifted: Vec<usize> = (0..ids.len()).filter(|&idx| ids[idx] == "AR2").collect();
    assert_eq!(drifted.len(), 2);
    assert_ne!(keys[drifted[0]], keys[drifted[1]]);
}

#[test]
fn partition_overwrite_replaces_only_the_rerun_date() {
    let mut orchestrator = orchestrator();
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));
    orchestrator.loader().set(
        &events_locator(2),
        events(&[play(11, "free", "C", "Z", 181.25, TS_A + DAY_MS)]),
    );
    orchestrator.trigger(date(1)).unwrap();
    orchestrator.trigger(date(2)).unwrap();

    orchestrator.loader().set(
        &events_locator(2),
        events(&[
            play(11, "free", "C", "Z", 181.25, TS_A + DAY_MS),
            play(12, "free", "A", "X", 200.0, TS_B + DAY_MS),
        ]),
    );
    orchestrator.trigger(date(2)).unwrap();

    let facts = production(&orchestrator, "fct_songplays");
    let mut days = texts(&facts, "dwh_ds");
    days.sort();
    assert_eq!(days, vec!["2018-11-01", "2018-11-02", "2018-11-02"]);
    let day_one: Vec<String> = texts(&facts, "user_id")
        .into_iter()
        .zip(texts(&facts, "dwh_ds"))
        .filter(|(_, ds)| ds == "2018-11-01")
        .map(|(user, _)| user)
        .collect();
    assert_eq!(day_one, vec!["10"]);
}

#[test]
fn merge_replaces_the_whole_row_for_a_known_key() {
    let mut orchestrator = orchestrator();
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));
    let mut upgraded = play(10, "paid", "A", "X", 200.0, TS_A + DAY_MS);
    upgraded.first = Some("Lilian");
    orchestrator
        .loader()
        .set(&events_locator(2), events(&[upgraded]));

    orchestrator.trigger(date(1)).unwrap();
    orchestrator.trigger(date(2)).unwrap();

    let users = production(&orchestrator, "dim_users");
    assert_eq!(users.height(), 1);
    assert_eq!(texts(&users, "level"), vec!["paid"]);
    assert_eq!(texts(&users, "first_name"), vec!["Lilian"]);
    assert_eq!(texts(&users, "dwh_ds"), vec!["2018-11-02"]);
}

#[test]
fn failing_unique_check_blocks_publication() {
    let config = PIPELINE.replace(r#"unique = ["artist_sk"]"#, r#"unique = ["artist_id"]"#);
    let mut orchestrator = orchestrator_with(&config);
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));

    let err = orchestrator.trigger(date(1)).unwrap_err();
    let report = err.audit_report().expect("quality violation");
    assert_eq!(report.table, "dim_artists");
    assert_eq!(report.failure_count(), 1);

    assert!(!orchestrator.warehouse().exists(&RelationRef::production("dim_artists")));
    assert!(!orchestrator.warehouse().exists(&RelationRef::production("dim_times")));
    assert_eq!(production(&orchestrator, "dim_songs").height(), 3);

    let record = orchestrator.inspect("scheduled__2018-11-01").unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.completed_units, vec!["fct_songplays", "dim_users", "dim_songs"]);
    let failure = record.failure.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::QualityViolation);
    assert_eq!(failure.failed_checks[0].column, "artist_id");
}

#[test]
fn failing_audit_leaves_published_tables_unchanged() {
    let config = PIPELINE.replace(r#"unique = ["artist_sk"]"#, r#"unique = ["artist_id"]"#);
    let mut orchestrator = orchestrator_with(&config);
    orchestrator
        .loader()
        .set("song-data", catalog_with_drift([200.0, 180.5, 181.25, 99.0], "Z"));
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));
    orchestrator.trigger(date(1)).unwrap();
    let artists = production(&orchestrator, "dim_artists");
    let times = production(&orchestrator, "dim_times");
    assert_eq!(artists.height(), 2);

    // AR2 now appears under two names, so artist_id is no longer unique.
    orchestrator.loader().set("song-data", catalog([200.0, 180.5, 181.25, 99.0]));
    orchestrator.loader().set(
        &events_locator(2),
        events(&[play(11, "paid", "C", "Z", 181.25, TS_A + DAY_MS)]),
    );
    let err = orchestrator.trigger(date(2)).unwrap_err();
    let report = err.audit_report().expect("quality violation");
    assert_eq!(report.table, "dim_artists");
    assert_eq!(report.failures().next().unwrap().column, "artist_id");

    assert!(production(&orchestrator, "dim_artists").equals_missing(&artists));
    assert!(production(&orchestrator, "dim_times").equals_missing(&times));
}

#[test]
fn non_positive_durations_fail_the_catalog_unit() {
    let mut orchestrator = orchestrator();
    orchestrator
        .loader()
        .set("song-data", catalog([0.0, 180.5, 181.25, -1.0]));
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));

    let err = orchestrator.trigger(date(1)).unwrap_err();
    let report = err.audit_report().expect("quality violation");
    assert_eq!(report.table, "dim_songs");
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.column, "duration");
    assert_eq!(failure.violations, 2);

    assert!(!orchestrator.warehouse().exists(&RelationRef::production("dim_songs")));
    assert_eq!(production(&orchestrator, "dim_users").height(), 1);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn failed_run_blocks_the_next_date() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().fail_next(10);
    let err = orchestrator.trigger(date(1)).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Ingestion);

    let err = orchestrator.trigger(date(2)).unwrap_err();
    match err {
        WapError::RunBlocked {
            predecessor,
            status,
            ..
        } => {
            assert_eq!(predecessor, "scheduled__2018-11-01");
            assert_eq!(status, "failed");
        }
        other => panic!("expected RunBlocked, got {other}"),
    }
    assert!(orchestrator.inspect("scheduled__2018-11-02").unwrap().is_none());
}

#[test]
fn earlier_date_cannot_rerun_after_a_later_run() {
    let mut orchestrator = orchestrator();
    orchestrator
        .loader()
        .set(&events_locator(1), events(&[play(10, "free", "A", "X", 200.0, TS_A)]));
    orchestrator.loader().set(
        &events_locator(2),
        events(&[play(10, "paid", "A", "X", 200.0, TS_A + DAY_MS)]),
    );
    orchestrator.trigger(date(1)).unwrap();
    orchestrator.trigger(date(2)).unwrap();

    let err = orchestrator.trigger(date(1)).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Blocked);
    match err {
        WapError::RunOutOfOrder { run_id, later } => {
            assert_eq!(run_id, "scheduled__2018-11-01");
            assert_eq!(later, "scheduled__2018-11-02");
        }
        other => panic!("expected RunOutOfOrder, got {other}"),
    }

    let users = production(&orchestrator, "dim_users");
    assert_eq!(texts(&users, "level"), vec!["paid"]);
    assert_eq!(texts(&users, "dwh_ds"), vec!["2018-11-02"]);
    let first = orchestrator.inspect("scheduled__2018-11-01").unwrap().unwrap();
    assert_eq!(first.status, RunStatus::Succeeded);
    assert_eq!(first.attempts, 1);
}

#[test]
fn any_earlier_failure_blocks_later_dates() {
    let mut ledger = MemoryRunLedger::new();
    let mut failed = RunRecord::new(RunContext::new(date(1)));
    failed.status = RunStatus::Failed;
    ledger.put(&failed).unwrap();
    let mut succeeded = RunRecord::new(RunContext::new(date(2)));
    succeeded.status = RunStatus::Succeeded;
    ledger.put(&succeeded).unwrap();

    let config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    let loader = FixtureLoader::default();
    loader.set("song-data", catalog([200.0, 180.5, 181.25, 99.0]));
    let mut orchestrator =
        PipelineOrchestrator::new(config, LocalWarehouse::in_memory(), loader, ledger)
            .with_retry_policy(RetryPolicy::none());

    let err = orchestrator.trigger(date(3)).unwrap_err();
    assert!(matches!(
        err,
        WapError::RunBlocked { ref predecessor, ref status, .. }
            if predecessor == "scheduled__2018-11-01" && status == "failed"
    ));
    assert!(orchestrator.inspect("scheduled__2018-11-03").unwrap().is_none());
}

#[test]
fn missing_predecessor_blocks() {
    let mut orchestrator = orchestrator();
    let err = orchestrator.trigger(date(3)).unwrap_err();
    assert!(matches!(err, WapError::RunBlocked { ref status, .. } if status == "missing"));
}

#[test]
fn independent_dates_run_when_past_is_not_required() {
    let config = PIPELINE.replace("depends_on_past = true", "depends_on_past = false");
    let mut orchestrator = orchestrator_with(&config);
    assert!(orchestrator.trigger(date(3)).is_ok());
}

#[test]
fn dates_before_start_are_rejected() {
    let mut orchestrator = orchestrator();
    let err = orchestrator
        .trigger(NaiveDate::from_ymd_opt(2018, 10, 31).unwrap())
        .unwrap_err();
    assert!(matches!(err, WapError::BeforeStartDate { .. }));
}

#[test]
fn only_one_run_may_be_active() {
    let mut ledger = MemoryRunLedger::new();
    let mut stuck = RunRecord::new(RunContext::new(date(1)));
    stuck.status = RunStatus::PublishingUnits;
    ledger.put(&stuck).unwrap();

    let config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    let loader = FixtureLoader::default();
    loader.set("song-data", catalog([200.0, 180.5, 181.25, 99.0]));
    let mut orchestrator =
        PipelineOrchestrator::new(config, LocalWarehouse::in_memory(), loader, ledger)
            .with_retry_policy(RetryPolicy::none());

    let err = orchestrator.trigger(date(2)).unwrap_err();
    assert!(matches!(err, WapError::ActiveRun { ref active } if active == "scheduled__2018-11-01"));

    // Re-triggering the interrupted date resumes it.
    let report = orchestrator.trigger(date(1)).unwrap();
    assert_eq!(report.record.status, RunStatus::Succeeded);
    assert!(orchestrator.trigger(date(2)).is_ok());
}

#[test]
fn retryable_failures_are_retried() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().fail_next(2);
    let report = orchestrator.trigger(date(1)).unwrap();
    assert_eq!(report.record.status, RunStatus::Succeeded);
    assert_eq!(report.record.attempts, 1);
}

#[test]
fn exhausted_retries_fail_the_run_without_touching_production() {
    let mut orchestrator = orchestrator();
    orchestrator.loader().fail_next(4);
    let err = orchestrator.trigger(date(1)).unwrap_err();
    assert!(err.is_retryable());
    for table in TABLES {
        assert!(!orchestrator.warehouse().exists(&RelationRef::production(table)));
    }
    let record = orchestrator.inspect("scheduled__2018-11-01").unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.completed_units.is_empty());
}

/// Fails a number of inserts into one layer, then behaves normally.
struct FailingInserts {
    inner: LocalWarehouse,
    layer: Layer,
    remaining: u32,
}

impl Warehouse for FailingInserts {
    fn read(&self, relation: &RelationRef) -> wap_warehouse::Result<DataFrame> {
        self.inner.read(relation)
    }

    fn insert(&mut self, relation: &RelationRef, rows: &DataFrame) -> wap_warehouse::Result<usize> {
        if relation.layer == self.layer && self.remaining > 0 {
            self.remaining -= 1;
            return Err(WarehouseError::SchemaMismatch {
                relation: relation.to_string(),
                message: "statement timeout".to_string(),
            });
        }
        self.inner.insert(relation, rows)
    }

    fn truncate(&mut self, relation: &RelationRef) -> wap_warehouse::Result<usize> {
        self.inner.truncate(relation)
    }

    fn delete_where(
        &mut self,
        relation: &RelationRef,
        predicate: &Predicate,
    ) -> wap_warehouse::Result<usize> {
        self.inner.delete_where(relation, predicate)
    }

    fn row_count(&self, relation: &RelationRef) -> wap_warehouse::Result<usize> {
        self.inner.row_count(relation)
    }

    fn exists(&self, relation: &RelationRef) -> bool {
        self.inner.exists(relation)
    }
}

fn flaky_orchestrator(
    layer: Layer,
    failures: u32,
) -> PipelineOrchestrator<FailingInserts, FixtureLoader, MemoryRunLedger> {
    let config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    let loader = FixtureLoader::default();
    loader.set("song-data", catalog([200.0, 180.5, 181.25, 99.0]));
    loader.set(
        &events_locator(1),
        events(&[play(10, "free", "A", "X", 200.0, TS_A)]),
    );
    let warehouse = FailingInserts {
        inner: LocalWarehouse::in_memory(),
        layer,
        remaining: failures,
    };
    PipelineOrchestrator::new(config, warehouse, loader, MemoryRunLedger::new())
        .with_retry_policy(RetryPolicy::new(2, Duration::ZERO))
}

#[test]
fn transformation_failures_rewrite_audit_from_scratch() {
    let mut orchestrator = flaky_orchestrator(Layer::Audit, 2);
    let report = orchestrator.trigger(date(1)).unwrap();
    assert_eq!(report.units[0].rows_written, 1);
    let facts = orchestrator
        .warehouse()
        .inner
        .read(&RelationRef::production("fct_songplays"))
        .unwrap();
    assert_eq!(facts.height(), 1);
}

#[test]
fn promotion_failures_are_retried_then_fail_the_run() {
    let mut orchestrator = flaky_orchestrator(Layer::Production, 3);
    let err = orchestrator.trigger(date(1)).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Promotion);
    assert_eq!(err.table(), Some("fct_songplays"));

    // The next trigger finds the warehouse healthy again.
    let report = orchestrator.trigger(date(1)).unwrap();
    assert_eq!(report.record.attempts, 2);
    assert_eq!(report.units.len(), 5);
}

// ============================================================================
// Backfill
// ============================================================================

#[test]
fn backfill_runs_dates_in_order() {
    let mut orchestrator = orchestrator();
    for day in 1..=3 {
        orchestrator.loader().set(
            &events_locator(day),
            events(&[play(10, "free", "A", "X", 200.0, TS_A + i64::from(day - 1) * DAY_MS)]),
        );
    }
    let mut seen = Vec::new();
    let report = orchestrator.backfill(date(1), date(3), |ctx| seen.push(ctx.ds()));

    assert!(report.succeeded());
    assert_eq!(seen, vec!["2018-11-01", "2018-11-02", "2018-11-03"]);
    assert_eq!(report.runs.len(), 3);
    assert_eq!(production(&orchestrator, "fct_songplays").height(), 3);
}

#[test]
fn backfill_stops_at_first_failure() {
    let mut orchestrator = orchestrator();
    let mut anonymous = play(10, "free", "A", "X", 200.0, TS_A + DAY_MS);
    anonymous.first = None;
    orchestrator
        .loader()
        .set(&events_locator(2), events(&[anonymous]));

    let report = orchestrator.backfill(date(1), date(3), |_| {});
    assert!(!report.succeeded());
    assert_eq!(report.runs.len(), 1);
    assert!(matches!(report.error, Some(WapError::QualityViolation(_))));
    assert!(orchestrator.inspect("scheduled__2018-11-03").unwrap().is_none());
    let history = orchestrator.history().unwrap();
    assert_eq!(history.len(), 2);
}
