//! Archive mirror tests against an in-memory object store.

use std::sync::Arc;

use object_store::{memory::InMemory, path::Path as ObjectPath, ObjectStore};
use storage::ArchiveMirror;
use test_utils::{temp_storage_root, write_file};

async fn keys(store: &InMemory) -> Vec<String> {
    use futures::TryStreamExt;

    let mut keys: Vec<String> = store
        .list(None)
        .map_ok(|meta| meta.location.to_string())
        .try_collect()
        .await
        .unwrap();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_uploads_files_with_relative_keys() {
    let root = temp_storage_root();
    write_file(root.path(), "bronze/fires/2004/fires_world_2004-08-01.csv", "a,b\n1,2\n");
    write_file(root.path(), "gold/final_climate_fire_analysis.csv", "year\n2000\n");

    let store = Arc::new(InMemory::new());
    let mirror = ArchiveMirror::new(store.clone(), root.path());
    let report = mirror.sync().await;

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.is_clean());
    assert_eq!(
        keys(&store).await,
        vec![
            "bronze/fires/2004/fires_world_2004-08-01.csv".to_string(),
            "gold/final_climate_fire_analysis.csv".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_second_pass_skips_existing_keys() {
    let root = temp_storage_root();
    write_file(root.path(), "bronze/temperature/2026/GLB.Ts+dSST.csv", "x\n");

    let store = Arc::new(InMemory::new());
    let mirror = ArchiveMirror::new(store.clone(), root.path());
    assert_eq!(mirror.sync().await.uploaded, 1);

    let second = mirror.sync().await;
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.skipped, 1);
}

#[tokio::test]
async fn test_existing_object_is_not_overwritten() {
    let root = temp_storage_root();
    write_file(root.path(), "gold/chart.svg", "local");

    let store = Arc::new(InMemory::new());
    store
        .put(&ObjectPath::from("gold/chart.svg"), bytes::Bytes::from("remote").into())
        .await
        .unwrap();

    let report = ArchiveMirror::new(store.clone(), root.path()).sync().await;
    assert_eq!(report.skipped, 1);

    let remote = store
        .get(&ObjectPath::from("gold/chart.svg"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&remote[..], b"remote");
}

#[tokio::test]
async fn test_hidden_and_partial_files_are_ignored() {
    let root = temp_storage_root();
    write_file(root.path(), ".env", "SECRET=1");
    write_file(root.path(), ".cache/blob", "x");
    write_file(root.path(), "bronze/fires/2004/a.csv.partial", "half");
    write_file(root.path(), "bronze/fires/2004/a.csv", "whole");

    let store = Arc::new(InMemory::new());
    let report = ArchiveMirror::new(store.clone(), root.path()).sync().await;

    assert_eq!(report.uploaded, 1);
    assert_eq!(keys(&store).await, vec!["bronze/fires/2004/a.csv".to_string()]);
}
