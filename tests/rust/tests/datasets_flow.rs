//! End-to-end dataset workflow over a local object store
//!
//! Exercises the full path a notebook user takes:
//! - Uploading a local results tree
//! - Listing, globbing and classifying paths
//! - Reading a file through `open`
//! - Moving, downloading and removing data

use anyhow::Result;
use datasets::{Datasets, LocalObjectStore, ObjectClient, PathKind};
use platform_core::{DatasetsConfig, ProjectId};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn write_results_tree(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("metrics"))?;
    fs::write(root.join("summary.txt"), "accuracy=0.93\n")?;
    fs::write(root.join("metrics").join("train.csv"), "epoch,loss\n1,0.5\n")?;
    fs::write(root.join("metrics").join("eval.csv"), "epoch,acc\n1,0.93\n")?;
    fs::write(root.join(".checkpoint"), "hidden")?;
    Ok(())
}

fn datasets_over(store_root: &Path, page_size: usize) -> Datasets {
    let config = DatasetsConfig {
        list_page_size: page_size,
        ..Default::default()
    };
    let store = Arc::new(LocalObjectStore::with_config(store_root, &config));
    Datasets::with_config(store, ProjectId::new(Uuid::new_v4()), &config)
}

#[tokio::test]
async fn test_put_list_and_read() -> Result<()> {
    platform_core::logging::init_tracing("datasets=debug");
    let store_root = TempDir::new()?;
    let local = TempDir::new()?;
    write_results_tree(local.path())?;

    // Small pages force the listing to follow continuation tokens
    let datasets = datasets_over(store_root.path(), 2);
    datasets.put(local.path(), "/runs/run-1/").await?;

    let visible = datasets.ls("/runs/", false).await?;
    assert_eq!(
        visible,
        vec![
            "/runs/",
            "/runs/run-1/",
            "/runs/run-1/metrics/",
            "/runs/run-1/metrics/eval.csv",
            "/runs/run-1/metrics/train.csv",
            "/runs/run-1/summary.txt",
        ]
    );
    assert!(datasets
        .ls("/runs/", true)
        .await?
        .contains(&"/runs/run-1/.checkpoint".to_string()));

    let csvs = datasets.glob("*.csv", "/runs/", false).await?;
    assert_eq!(
        csvs,
        vec!["/runs/run-1/metrics/eval.csv", "/runs/run-1/metrics/train.csv"]
    );

    assert_eq!(datasets.classify("/runs/run-1").await?, PathKind::Directory);
    assert_eq!(datasets.classify("/runs/run-1/summary.txt").await?, PathKind::File);
    assert_eq!(datasets.classify("/runs/run-2").await?, PathKind::Absent);

    let summary = datasets
        .with_open("/runs/run-1/summary.txt", "r", |file| file.read_text())
        .await?;
    assert_eq!(summary, "accuracy=0.93\n");

    assert!(!datasets.etag("/runs/run-1/summary.txt").await?.contains('"'));
    Ok(())
}

#[tokio::test]
async fn test_move_download_and_remove() -> Result<()> {
    let store_root = TempDir::new()?;
    let local = TempDir::new()?;
    write_results_tree(local.path())?;

    let datasets = datasets_over(store_root.path(), 1000);
    datasets.put(local.path(), "/staging/").await?;

    datasets.mv("/staging", "/published").await?;
    assert!(!datasets.is_dir("/staging").await?);
    assert!(datasets.is_file("/published/metrics/train.csv").await?);

    let download = TempDir::new()?;
    let target = download.path().join("published");
    datasets.get("/published", &target).await?;
    assert_eq!(
        fs::read_to_string(target.join("metrics").join("eval.csv"))?,
        "epoch,acc\n1,0.93\n"
    );
    assert!(target.join(".checkpoint").is_file());

    let single = download.path().join("summary.txt");
    datasets.get("/published/summary.txt", &single).await?;
    assert_eq!(fs::read_to_string(&single)?, "accuracy=0.93\n");

    datasets.cp("/published/summary.txt", "/summary-copy.txt", false).await?;
    datasets.rm("/summary-copy.txt", false).await?;
    datasets.rmdir("/published").await?;
    assert!(datasets.ls("/", true).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_directories_and_writes() -> Result<()> {
    let store_root = TempDir::new()?;
    let datasets = datasets_over(store_root.path(), 1000);
    let store = LocalObjectStore::new(store_root.path());
    store
        .create_directory(datasets.project_id(), "/inputs/")
        .await?;

    let err = datasets.open("/inputs", "r").await.unwrap_err();
    assert!(err.is_validation());

    let err = datasets.open("/inputs/a.txt", "w").await.unwrap_err();
    assert!(err.is_validation());
    Ok(())
}
