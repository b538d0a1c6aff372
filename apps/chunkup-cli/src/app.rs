//! Upload run: reads files, connects, uploads, reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chunkup_transfer::FileHandle;
use chunkup_uploader::{UploadEvent, UploadOrchestrator, UploadResult};
use chunkup_ws_client::WsClient;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::adapter::WsStorageTransport;
use crate::config::Config;

/// Outcome of one run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub failed: usize,
}

/// Uploads `paths` and prints one line per phase event and per file.
pub async fn run(config: Config, paths: Vec<PathBuf>) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match prepare(path, &config) {
            Ok(file) => files.push(file),
            Err(e) => {
                eprintln!("✗ {}: {e}", path.display());
                summary.failed += 1;
            }
        }
    }
    if files.is_empty() {
        return Ok(summary);
    }

    let client = Arc::new(WsClient::connect(&config.ws_config()).await?);
    let transport = Arc::new(WsStorageTransport::new(Arc::clone(&client)));
    let mut orch = UploadOrchestrator::new(transport).with_options(config.upload_options());

    let mut events_rx = orch
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{}", describe(&event));
        }
    });

    let cancel = orch.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling uploads");
            cancel.cancel();
        }
    });

    let policy = config.retry_policy();
    let results: Vec<UploadResult> = if policy.max_attempts > 1 {
        join_all(
            files
                .iter()
                .map(|f| orch.upload_with_retry(f, config.chunk_size, &policy)),
        )
        .await
    } else {
        orch.upload_many(files.clone(), config.chunk_size).await
    };

    drop(orch);
    let _ = printer.await;
    client.close().await;

    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(receipt) => {
                println!("✓ {} → {}", file.key(), receipt.locator);
                summary.uploaded += 1;
            }
            Err(e) => {
                eprintln!("✗ {}: {e}", file.key());
                summary.failed += 1;
            }
        }
    }

    info!(
        uploaded = summary.uploaded,
        failed = summary.failed,
        "upload run finished"
    );
    Ok(summary)
}

/// Reads one file and applies the caller-side checks.
fn prepare(path: &Path, config: &Config) -> anyhow::Result<FileHandle> {
    let len = std::fs::metadata(path)?.len();
    check_size(len, config.max_file_size)?;

    let key = if config.timestamp_keys {
        None
    } else {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("path has no file name"))?
            .to_string_lossy();
        Some(name.into_owned())
    };
    Ok(FileHandle::read(path, key)?)
}

fn check_size(len: u64, max: u64) -> anyhow::Result<()> {
    anyhow::ensure!(
        len <= max,
        "file is {len} bytes, limit is {max} bytes"
    );
    Ok(())
}

/// Human-readable line for one event.
fn describe(event: &UploadEvent) -> String {
    match event {
        UploadEvent::Initiating { key } => format!("{key}: initiating"),
        UploadEvent::Storing { key, index, total } => {
            format!("{key}: storing chunk {}/{total}", index + 1)
        }
        UploadEvent::Finalizing { key } => format!("{key}: finalizing"),
        UploadEvent::Completed { key, locator } => format!("{key}: completed ({locator})"),
        UploadEvent::Failed { key, error } => format!("{key}: failed ({error})"),
        UploadEvent::Retrying {
            key,
            attempt,
            delay,
        } => format!(
            "{key}: retrying (attempt {attempt}) in {} ms",
            delay.as_millis()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkup_uploader::UploadError;
    use std::time::Duration;

    #[test]
    fn size_ceiling() {
        assert!(check_size(10, 10).is_ok());
        let err = check_size(11, 10).unwrap_err();
        assert_eq!(err.to_string(), "file is 11 bytes, limit is 10 bytes");
    }

    #[test]
    fn describe_events() {
        let key = "k".to_string();
        assert_eq!(
            describe(&UploadEvent::Storing {
                key: key.clone(),
                index: 0,
                total: 3
            }),
            "k: storing chunk 1/3"
        );
        assert_eq!(
            describe(&UploadEvent::Failed {
                key: key.clone(),
                error: UploadError::Cancelled
            }),
            "k: failed (cancelled)"
        );
        assert_eq!(
            describe(&UploadEvent::Retrying {
                key,
                attempt: 2,
                delay: Duration::from_millis(250)
            }),
            "k: retrying (attempt 2) in 250 ms"
        );
    }

    #[test]
    fn prepare_uses_timestamped_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cat.png");
        std::fs::write(&path, b"PNG").unwrap();

        let file = prepare(&path, &Config::default()).unwrap();
        assert!(file.key().ends_with("_cat.png"));
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn prepare_without_prefix_uses_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cat.png");
        std::fs::write(&path, b"PNG").unwrap();

        let config = Config {
            timestamp_keys: false,
            ..Config::default()
        };
        assert_eq!(prepare(&path, &config).unwrap().key(), "cat.png");
    }

    #[test]
    fn prepare_refuses_oversized_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let config = Config {
            max_file_size: 32,
            ..Config::default()
        };
        assert!(prepare(&path, &config).is_err());
    }

    #[tokio::test]
    async fn run_with_only_bad_paths_makes_no_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            endpoint: "ws://127.0.0.1:1/unreachable".into(),
            ..Config::default()
        };

        let summary = run(config, vec![tmp.path().join("missing.png")])
            .await
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                uploaded: 0,
                failed: 1
            }
        );
    }
}
