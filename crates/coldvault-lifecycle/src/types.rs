//! Value types exchanged with the cloud resource gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source image discovered for cold-storage export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupImage {
    pub image_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Snapshot ids behind the image's block devices. `None` means the
    /// provider omitted the mapping list entirely, which the starter treats
    /// as a hard error rather than an image with no volumes.
    pub block_device_snapshots: Option<Vec<String>>,
}

/// Destination and traceability data for one store-to-archive export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub image_id: String,
    pub bucket: String,
    /// Audit key under the bucket, `YYYY-MM-DD/<instance-id>`.
    pub object_key: String,
    pub source_instance_id: String,
}

/// Traceability data for one snapshot copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCopyRequest {
    pub source_snapshot_id: String,
    pub image_id: String,
}

/// State of an image export task as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTaskState {
    Completed,
    Failed,
    InProgress,
    /// Any state the pipeline does not recognize. Logged and otherwise
    /// ignored until it resolves to a known state.
    Other(String),
}

impl ExportTaskState {
    /// Map the provider's state string onto the closed set the checker
    /// acts on.
    pub fn from_provider(state: &str) -> Self {
        match state {
            "Completed" => ExportTaskState::Completed,
            "Failed" => ExportTaskState::Failed,
            "InProgress" => ExportTaskState::InProgress,
            other => ExportTaskState::Other(other.to_string()),
        }
    }
}

/// Result of polling one image export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExportTask {
    pub image_id: String,
    pub state: ExportTaskState,
    pub bucket: Option<String>,
    pub failure_reason: Option<String>,
}

/// Copy-progress state of a snapshot as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotCopyState {
    Pending,
    Completed,
    Error,
    Recoverable,
    Recovering,
    Other(String),
}

impl SnapshotCopyState {
    pub fn from_provider(state: &str) -> Self {
        match state {
            "pending" => SnapshotCopyState::Pending,
            "completed" => SnapshotCopyState::Completed,
            "error" => SnapshotCopyState::Error,
            "recoverable" => SnapshotCopyState::Recoverable,
            "recovering" => SnapshotCopyState::Recovering,
            other => SnapshotCopyState::Other(other.to_string()),
        }
    }
}

/// Storage class a snapshot currently sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTier {
    Standard,
    Archive,
    Other(String),
}

impl StorageTier {
    pub fn from_provider(tier: &str) -> Self {
        match tier {
            "standard" => StorageTier::Standard,
            "archive" => StorageTier::Archive,
            other => StorageTier::Other(other.to_string()),
        }
    }
}

/// Current view of one snapshot, as polled from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotObservation {
    pub snapshot_id: String,
    pub state: SnapshotCopyState,
    pub state_message: Option<String>,
    pub volume_id: Option<String>,
    pub tier: StorageTier,
}
