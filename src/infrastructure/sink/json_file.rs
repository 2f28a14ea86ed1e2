use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::models::{MetricsRecord, RecordParams};
use crate::domain::ports::{ResultSink, SinkError};

/// Writes one pretty-printed JSON document per run into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

/// A persisted record as read back from disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub name: String,
    pub params: RecordParams,
    pub total_gas: u64,
}

#[derive(Deserialize)]
struct StoredDocument {
    params: RecordParams,
    gas: StoredGas,
}

#[derive(Deserialize)]
struct StoredGas {
    total: u64,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Every record in the directory, sorted by name
    ///
    /// Files that do not parse as records are skipped.
    pub async fn records(&self) -> Result<Vec<StoredRecord>, SinkError> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<StoredDocument>(&bytes) {
                Ok(doc) => records.push(StoredRecord {
                    name,
                    params: doc.params,
                    total_gas: doc.gas.total,
                }),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn persist(&self, name: &str, record: &MetricsRecord) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(record)?;

        // Write then rename so a reader never sees a half-written record.
        let path = self.path_for(name);
        let staging = self.dir.join(format!(".{name}.json.tmp"));
        tokio::fs::write(&staging, body).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "staging file left behind");
            }
            return Err(e.into());
        }

        debug!(path = %path.display(), "record persisted");
        Ok(())
    }

    async fn contains(&self, name: &str) -> Result<bool, SinkError> {
        Ok(tokio::fs::try_exists(self.path_for(name)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExperimentParams;
    use crate::services::{gas_keys, MetricsCollector};

    fn record(total: u64, completed: bool) -> MetricsRecord {
        let mut metrics = MetricsCollector::new();
        metrics.record(gas_keys::DEPLOYMENT, total).unwrap();
        metrics.finish(&ExperimentParams::default(), completed)
    }

    #[tokio::test]
    async fn test_persist_creates_directory_and_reads_back() {
        let root = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(root.path().join("results").join("OPTIMIZED"));

        assert!(!sink.contains("run_a").await.unwrap());
        sink.persist("run_a", &record(100, true)).await.unwrap();
        sink.persist("run_b", &record(250, false)).await.unwrap();
        assert!(sink.contains("run_a").await.unwrap());

        let records = sink.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "run_a");
        assert_eq!(records[0].total_gas, 100);
        assert!(!records[1].params.selection_completed);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(sink.path_for("run_b")).unwrap()).unwrap();
        assert_eq!(raw["gas"]["deployment"], 250);
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(root.path());
        sink.persist("run", &record(1, false)).await.unwrap();
        sink.persist("run", &record(2, true)).await.unwrap();

        let records = sink.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_gas, 2);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_staging_file() {
        let root = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(root.path());
        // a non-empty directory where the record should land
        let blocked = sink.path_for("run");
        std::fs::create_dir_all(blocked.join("inner")).unwrap();

        let err = sink.persist("run", &record(5, true)).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)), "{err}");
        assert!(!root.path().join(".run.json.tmp").exists());
        assert!(blocked.is_dir());

        // the blocked directory is not listed as a record
        sink.persist("other", &record(9, true)).await.unwrap();
        let records = sink.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "other");
    }

    #[tokio::test]
    async fn test_records_of_missing_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(root.path().join("absent"));
        assert!(sink.records().await.unwrap().is_empty());
    }
}
