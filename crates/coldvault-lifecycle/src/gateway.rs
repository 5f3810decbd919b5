//! Contract for the provider's compute/storage control plane.

use async_trait::async_trait;

use crate::{
    BackupImage, ExportRequest, Frequency, GatewayError, ImageExportTask, SnapshotCopyRequest,
    SnapshotObservation,
};

/// Thin binding to the cloud provider's control-plane APIs.
///
/// All listing operations drain the provider's pagination before returning;
/// callers always see the complete result set. The provider owns the
/// authoritative status of every underlying operation; the pipeline only
/// polls, it is never called back.
#[async_trait]
pub trait CloudGateway: Send + Sync {
    /// List backup images carrying the given frequency tag.
    async fn list_backup_images(
        &self,
        frequency: Frequency,
    ) -> Result<Vec<BackupImage>, GatewayError>;

    /// Start a store-to-archive export task for one image.
    async fn start_image_export(&self, request: &ExportRequest) -> Result<(), GatewayError>;

    /// Poll export-task results for exactly these images.
    async fn poll_image_exports(
        &self,
        image_ids: &[String],
    ) -> Result<Vec<ImageExportTask>, GatewayError>;

    /// Copy a snapshot into the account, returning the new snapshot id.
    async fn copy_snapshot(&self, request: &SnapshotCopyRequest) -> Result<String, GatewayError>;

    /// Poll the current state of these snapshots. Implementations chunk the
    /// id list to whatever a single call supports.
    async fn poll_snapshots(
        &self,
        snapshot_ids: &[String],
    ) -> Result<Vec<SnapshotObservation>, GatewayError>;

    /// Move a stable snapshot into the archive tier.
    async fn archive_snapshot(&self, snapshot_id: &str) -> Result<(), GatewayError>;
}
