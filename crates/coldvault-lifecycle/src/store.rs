//! Durable tracking rows and the state-store contract.
//!
//! The state store is the sole source of truth for pipeline membership: a
//! row exists exactly while the underlying operation is believed in flight.
//! Neither job keeps durable state of its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// One compute-image export believed still in progress or not yet confirmed.
///
/// There are no intermediate states for this entity: export is binary, so
/// the row carries only its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedImage {
    pub image_id: String,
}

/// Lifecycle phase of a tracked snapshot copy.
///
/// Strictly advances `Copying -> Archiving -> (row deleted)`; it never
/// regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPhase {
    Copying,
    Archiving,
}

impl SnapshotPhase {
    /// Stable wire string stored in the `status` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotPhase::Copying => "copying",
            SnapshotPhase::Archiving => "archiving",
        }
    }

    /// Parse the stored `status` attribute.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "copying" => Some(SnapshotPhase::Copying),
            "archiving" => Some(SnapshotPhase::Archiving),
            _ => None,
        }
    }
}

/// One block-volume snapshot moving toward the archive tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSnapshot {
    pub snapshot_id: String,
    pub phase: SnapshotPhase,
}

/// Durable key-value tables tracking in-flight work, one per entity type.
///
/// Pure storage; all lifecycle rules live in the jobs. Implementations chunk
/// batch calls to whatever limit their backend imposes.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put_tracked_images(&self, images: &[TrackedImage]) -> Result<(), StoreError>;

    async fn scan_tracked_images(&self) -> Result<Vec<TrackedImage>, StoreError>;

    async fn delete_tracked_images(&self, image_ids: &[String]) -> Result<(), StoreError>;

    async fn put_tracked_snapshots(&self, snapshots: &[TrackedSnapshot]) -> Result<(), StoreError>;

    async fn scan_tracked_snapshots(&self) -> Result<Vec<TrackedSnapshot>, StoreError>;

    async fn update_snapshot_phase(
        &self,
        snapshot_id: &str,
        phase: SnapshotPhase,
    ) -> Result<(), StoreError>;

    async fn delete_tracked_snapshots(&self, snapshot_ids: &[String]) -> Result<(), StoreError>;
}
