//! Two consecutive runs against CSV sources, a persisted warehouse and a
//! JSON run ledger, reopened between runs.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::AnyValue;
use wap_common::any_to_string;
use wap_core::{JsonRunLedger, PipelineOrchestrator, RetryPolicy, RunLedger};
use wap_ingest::FileStagingLoader;
use wap_model::{Layer, PipelineConfig, RelationRef, RunStatus};
use wap_warehouse::{LocalWarehouse, Warehouse};

const PIPELINE: &str = include_str!("../../../config/pipeline.toml");

const EVENTS_HEADER: &str =
    "artist,auth,firstName,gender,itemInSession,lastName,length,level,location,method,page,sessionId,song,status,ts,userAgent,userId";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn seed_sources(data: &Path) {
    write(
        &data.join("song-data/A/TRAAAAW128F429D538.csv"),
        "song_id,title,artist_id,artist_name,artist_location,artist_latitude,artist_longitude,duration,year,num_songs\n\
         S1,A,AR1,X,Oslo,59.9,10.7,200.0,2004,1\n",
    );
    write(
        &data.join("song-data/B/TRBBBBW128F4290123.csv"),
        "song_id,title,artist_id,artist_name,artist_location,artist_latitude,artist_longitude,duration,year,num_songs\n\
         S2,C,AR2,Z,,,,181.25,0,1\n",
    );
    write(
        &data.join("log-data/2018/11/2018-11-01-events.csv"),
        &format!(
            "{EVENTS_HEADER}\n\
             X,Logged In,Lily,F,0,Koch,200.0,free,\"Chicago, IL\",PUT,NextSong,583,A,200,1541105830796,Mozilla/5.0,10\n\
             ,Logged In,Lily,F,1,Koch,,free,\"Chicago, IL\",GET,Home,583,,200,1541106000000,Mozilla/5.0,10\n"
        ),
    );
    write(
        &data.join("log-data/2018/11/2018-11-02-events.csv"),
        &format!(
            "{EVENTS_HEADER}\n\
             Z,Logged In,Lily,F,0,Koch,181.25,paid,\"Chicago, IL\",PUT,NextSong,601,C,200,1541192230796,Mozilla/5.0,10\n"
        ),
    );
}

type FileOrchestrator = PipelineOrchestrator<LocalWarehouse, FileStagingLoader, JsonRunLedger>;

fn open(root: &Path) -> FileOrchestrator {
    let config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    let warehouse = LocalWarehouse::open(root.join("warehouse")).unwrap();
    let ledger = JsonRunLedger::open(root.join("warehouse/runs.json")).unwrap();
    PipelineOrchestrator::new(
        config,
        warehouse,
        FileStagingLoader::new(root.join("data")),
        ledger,
    )
    .with_retry_policy(RetryPolicy::none())
}

fn column(orchestrator: &FileOrchestrator, table: &str, name: &str) -> Vec<String> {
    let frame = orchestrator
        .warehouse()
        .read(&RelationRef::production(table))
        .unwrap();
    let column = frame.column(name).unwrap();
    (0..frame.height())
        .map(|idx| any_to_string(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect()
}

#[test]
fn consecutive_runs_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    seed_sources(&dir.path().join("data"));

    {
        let mut orchestrator = open(dir.path());
        let report = orchestrator
            .trigger(NaiveDate::from_ymd_opt(2018, 11, 1).unwrap())
            .unwrap();
        assert_eq!(report.staging[0].rows_loaded, 2);
        assert_eq!(report.staging[1].files, 2);
        assert_eq!(column(&orchestrator, "dim_users", "level"), vec!["free"]);
    }

    let mut orchestrator = open(dir.path());
    orchestrator
        .trigger(NaiveDate::from_ymd_opt(2018, 11, 2).unwrap())
        .unwrap();

    let mut days = column(&orchestrator, "fct_songplays", "dwh_ds");
    days.sort();
    assert_eq!(days, vec!["2018-11-01", "2018-11-02"]);
    assert_eq!(column(&orchestrator, "dim_users", "level"), vec!["paid"]);
    assert_eq!(column(&orchestrator, "dim_songs", "song_id").len(), 2);
    assert_eq!(column(&orchestrator, "dim_times", "start_time").len(), 2);

    for relation in orchestrator.warehouse().relations() {
        if relation.layer == Layer::Audit {
            assert_eq!(orchestrator.warehouse().row_count(relation).unwrap(), 0);
        }
    }
    assert!(dir.path().join("warehouse/prod/fct_songplays.csv").is_file());

    let runs = orchestrator.ledger().records().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.status == RunStatus::Succeeded));
}
