//! Loading ledger-listed files into the warehouse.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use climate_common::{FetchRecord, Partition, YearRange};
use ingestion::{Loader, Synchronizer};
use storage::{paths, FetchLedger, MemoryWarehouse, SqliteLedger, Warehouse, WriteMode};
use test_utils::{
    assert_approx_eq, fire_row, firms_csv, temp_storage_root, write_file, FIRMS_HEADER_ONLY_CSV,
    FIRMS_MODIS_CSV, FIRMS_REDUCED_CSV, GISTEMP_CSV,
};

use common::{fire_source, temperature_source, Reply, ScriptedProvider};

/// Put a file under the root and record it, as a successful fetch would.
async fn stage_file(
    root: &std::path::Path,
    ledger: &dyn FetchLedger,
    partition: Partition,
    name: &str,
    contents: &str,
) {
    let location = paths::partition_location(&partition, name);
    write_file(root, &location, contents);
    ledger
        .record(&FetchRecord::new(partition, location, contents.len() as u64))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_loads_temperatures_and_merges_fire_files() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    let warehouse = Arc::new(MemoryWarehouse::new());

    stage_file(root.path(), ledger.as_ref(), Partition::temperature(2026), "GLB.Ts+dSST.csv", GISTEMP_CSV).await;
    stage_file(root.path(), ledger.as_ref(), Partition::fire(2004), "a.csv", FIRMS_MODIS_CSV).await;
    stage_file(root.path(), ledger.as_ref(), Partition::fire(2005), "b.csv", FIRMS_REDUCED_CSV).await;

    let loader = Loader::new(root.path(), ledger.clone(), warehouse.clone());
    let report = loader.load().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.temperature_rows, Some(5));
    assert_eq!(report.fire_files_loaded, 2);
    assert_eq!(report.fire_rows, 5);

    let fires = warehouse.read_fires().await.unwrap();
    let reduced: Vec<_> = fires
        .iter()
        .filter(|f| f.source_file == "bronze/fires/2005/b.csv")
        .collect();
    assert_eq!(reduced.len(), 2);
    assert!(reduced.iter().all(|f| f.intensity_mw.is_none() && f.confidence.is_none()));

    let modis_null_frp = fires
        .iter()
        .filter(|f| f.source_file == "bronze/fires/2004/a.csv" && f.intensity_mw.is_none())
        .count();
    assert_eq!(modis_null_frp, 1);
}

#[tokio::test]
async fn test_missing_first_file_does_not_leave_append_mode() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    let warehouse = Arc::new(MemoryWarehouse::new());

    // Rows from an earlier load that the next load must replace.
    warehouse
        .write_fire_batch(&[fire_row("1999-08-01", Some(1.0), "stale.csv")], WriteMode::Replace)
        .await
        .unwrap();

    ledger
        .record(&FetchRecord::new(Partition::fire(2000), "bronze/fires/2000/gone.csv", 10))
        .await
        .unwrap();
    stage_file(root.path(), ledger.as_ref(), Partition::fire(2001), "b.csv", &firms_csv("2001-08-01", &[3.0, 4.0])).await;

    let report = Loader::new(root.path(), ledger.clone(), warehouse.clone())
        .load()
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].partition, Partition::fire(2000));
    assert_eq!(report.fire_files_loaded, 1);

    let fires = warehouse.read_fires().await.unwrap();
    assert_eq!(fires.len(), 2);
    assert!(fires.iter().all(|f| f.source_file == "bronze/fires/2001/b.csv"));
}

#[tokio::test]
async fn test_failed_first_write_does_not_leave_append_mode() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    let warehouse = Arc::new(MemoryWarehouse::new());
    warehouse
        .write_fire_batch(&[fire_row("1999-08-01", Some(1.0), "stale.csv")], WriteMode::Replace)
        .await
        .unwrap();

    stage_file(root.path(), ledger.as_ref(), Partition::fire(2000), "a.csv", &firms_csv("2000-08-01", &[1.0])).await;
    stage_file(root.path(), ledger.as_ref(), Partition::fire(2001), "b.csv", &firms_csv("2001-08-01", &[2.0])).await;
    stage_file(root.path(), ledger.as_ref(), Partition::fire(2002), "c.csv", &firms_csv("2002-08-01", &[3.0])).await;

    warehouse.fail_next_fire_writes(1);
    let report = Loader::new(root.path(), ledger.clone(), warehouse.clone())
        .load()
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    let years: Vec<String> = warehouse
        .read_fires()
        .await
        .unwrap()
        .iter()
        .map(|f| f.fire_date.to_string())
        .collect();
    assert_eq!(years, vec!["2001-08-01", "2002-08-01"]);
}

#[tokio::test]
async fn test_unreadable_temperature_file_is_reported() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    stage_file(root.path(), ledger.as_ref(), Partition::temperature(2026), "t.csv", "title\nYear,Jan\n2000,.1\n").await;

    let report = Loader::new(root.path(), ledger.clone(), Arc::new(MemoryWarehouse::new()))
        .load()
        .await
        .unwrap();

    assert_eq!(report.temperature_rows, None);
    assert_eq!(report.failures.len(), 1);
}

#[tokio::test]
async fn test_nothing_fetched_loads_nothing() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    let warehouse = Arc::new(MemoryWarehouse::new());

    let report = Loader::new(root.path(), ledger, warehouse.clone())
        .load()
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.temperature_rows, None);
    assert!(warehouse.read_fires().await.is_err());
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_fetch_load_transform_end_to_end() {
    let root = temp_storage_root();
    let ledger = Arc::new(SqliteLedger::open_memory().await.unwrap());
    let warehouse = Arc::new(MemoryWarehouse::new());
    let cancel = CancellationToken::new();

    let temps = Arc::new(ScriptedProvider::new().script(
        2026,
        [Reply::ok("Land-Ocean: Global Means\nYear,J-D\n2000,.45\n2001,.55\n")],
    ));
    Synchronizer::new(temperature_source(), root.path(), temps, ledger.clone())
        .run(YearRange::single(2026), &cancel)
        .await
        .unwrap();

    let fires = Arc::new(
        ScriptedProvider::new()
            .script(2000, [Reply::ok(&firms_csv("2000-08-01", &[12.3]))])
            .script(2001, [Reply::ok(FIRMS_HEADER_ONLY_CSV)]),
    );
    let fire_report = Synchronizer::new(fire_source(), root.path(), fires, ledger.clone())
        .run(YearRange::new(2000, 2001).unwrap(), &cancel)
        .await
        .unwrap();
    assert_eq!(fire_report.fetched.len(), 1);
    assert_eq!(fire_report.confirmed_empty.len(), 1);

    let report = Loader::new(root.path(), ledger.clone(), warehouse.clone())
        .load()
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.fire_rows, 1);

    warehouse.rebuild_summary().await.unwrap();
    let summary = warehouse.read_summary().await.unwrap();
    assert_eq!(summary.len(), 2);

    assert_eq!(summary[0].year, 2001);
    assert_approx_eq!(summary[0].temp_anomaly_celsius.unwrap(), 0.55, 1e-9);
    assert_eq!(summary[0].total_fires, 0);
    assert_eq!(summary[0].avg_intensity, 0.0);
    assert_eq!(summary[0].max_intensity, 0.0);

    assert_eq!(summary[1].year, 2000);
    assert_approx_eq!(summary[1].temp_anomaly_celsius.unwrap(), 0.45, 1e-9);
    assert_eq!(summary[1].total_fires, 1);
    assert_approx_eq!(summary[1].avg_intensity, 12.3, 1e-9);
    assert_approx_eq!(summary[1].max_intensity, 12.3, 1e-9);
}
