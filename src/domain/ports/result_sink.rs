use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::MetricsRecord;

/// Errors raised while persisting run records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Output port receiving one record per run
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store `record` under `name`, replacing any previous record
    async fn persist(&self, name: &str, record: &MetricsRecord) -> Result<(), SinkError>;

    /// Whether a record named `name` already exists
    async fn contains(&self, name: &str) -> Result<bool, SinkError>;
}
