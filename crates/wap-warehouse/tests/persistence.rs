//! Persisted warehouse round trips through the CSV files on disk.

use chrono::NaiveDate;
use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};
use tempfile::tempdir;
use wap_model::RelationRef;
use wap_warehouse::{LocalWarehouse, Predicate, Warehouse};

fn songplays(ids: &[&str], ds: &str) -> DataFrame {
    DataFrame::new(vec![
        Series::new("songplay_id".into(), ids.to_vec()).into_column(),
        Series::new("dwh_ds".into(), vec![ds; ids.len()]).into_column(),
    ])
    .unwrap()
}

#[test]
fn relations_survive_reopen() {
    let dir = tempdir().unwrap();
    let relation = RelationRef::production("fct_songplays");
    {
        let mut warehouse = LocalWarehouse::open(dir.path()).unwrap();
        warehouse
            .insert(&relation, &songplays(&["k1", "k2"], "2018-11-01"))
            .unwrap();
        warehouse
            .insert(&relation, &songplays(&["k3"], "2018-11-02"))
            .unwrap();
    }

    let path = dir.path().join("prod").join("fct_songplays.csv");
    assert!(path.exists());
    assert!(!dir.path().join("prod").join("fct_songplays.csv.tmp").exists());

    let mut warehouse = LocalWarehouse::open(dir.path()).unwrap();
    assert_eq!(warehouse.row_count(&relation).unwrap(), 3);

    let removed = warehouse
        .delete_where(&relation, &Predicate::equals("dwh_ds", "2018-11-01"))
        .unwrap();
    assert_eq!(removed, 2);

    let reopened = LocalWarehouse::open(dir.path()).unwrap();
    assert_eq!(reopened.row_count(&relation).unwrap(), 1);
}

#[test]
fn truncated_relation_reopens_empty_with_columns() {
    let dir = tempdir().unwrap();
    let relation = RelationRef::audit("fct_songplays");
    {
        let mut warehouse = LocalWarehouse::open(dir.path()).unwrap();
        warehouse
            .insert(&relation, &songplays(&["k1"], "2018-11-01"))
            .unwrap();
        warehouse.truncate(&relation).unwrap();
    }
    let warehouse = LocalWarehouse::open(dir.path()).unwrap();
    let frame = warehouse.read(&relation).unwrap();
    assert_eq!(frame.height(), 0);
    assert_eq!(frame.width(), 2);
}

#[test]
fn on_date_delete_keeps_other_days() {
    let dir = tempdir().unwrap();
    let relation = RelationRef::staging("staging_events");
    let mut warehouse = LocalWarehouse::open(dir.path()).unwrap();
    let events = DataFrame::new(vec![
        Series::new(
            "ts".into(),
            vec![1_541_105_830_796i64, 1_541_106_106_796, 1_541_203_200_000],
        )
        .into_column(),
    ])
    .unwrap();
    warehouse.insert(&relation, &events).unwrap();

    let day = NaiveDate::from_ymd_opt(2018, 11, 1).unwrap();
    let removed = warehouse
        .delete_where(&relation, &Predicate::on_date("ts", day))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(warehouse.row_count(&relation).unwrap(), 1);
}
