//! EC2 control-plane gateway.

use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, SdkError};
use aws_sdk_ec2::types::{
    Filter, Image, ResourceType, S3ObjectTag, Snapshot, SnapshotState, StoreImageTaskResult, Tag,
    TagSpecification, TargetStorageTier,
};
use chrono::{DateTime, Utc};

use coldvault_lifecycle::{
    BackupImage, CloudGateway, ExportRequest, ExportTaskState, Frequency, GatewayError,
    ImageExportTask, SnapshotCopyRequest, SnapshotCopyState, SnapshotObservation, StorageTier,
};

/// Tag key images are discovered by.
const FREQUENCY_TAG: &str = "backup-frequency";

/// DescribeStoreImageTasks accepts at most 25 image ids per call.
const STORE_TASK_CHUNK: usize = 25;

/// Keeps DescribeSnapshots requests well under the API's URL limits.
const SNAPSHOT_CHUNK: usize = 100;

/// `CloudGateway` implementation over the EC2 control plane.
pub struct Ec2Gateway {
    client: aws_sdk_ec2::Client,
    /// Region snapshot copies are issued from (and into).
    region: String,
}

impl Ec2Gateway {
    pub fn new(client: aws_sdk_ec2::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl CloudGateway for Ec2Gateway {
    async fn list_backup_images(
        &self,
        frequency: Frequency,
    ) -> Result<Vec<BackupImage>, GatewayError> {
        let filter = Filter::builder()
            .name(format!("tag:{FREQUENCY_TAG}"))
            .values(frequency.tag_value())
            .build();

        let mut images = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .describe_images()
                .owners("self")
                .filters(filter.clone());
            if let Some(token) = next_token {
                request = request.next_token(token);
            }
            let output = request.send().await.map_err(provider_error)?;
            for image in output.images() {
                images.push(map_image(image)?);
            }
            next_token = output.next_token().map(str::to_owned);
            if next_token.is_none() {
                break;
            }
        }
        Ok(images)
    }

    async fn start_image_export(&self, request: &ExportRequest) -> Result<(), GatewayError> {
        self.client
            .create_store_image_task()
            .image_id(&request.image_id)
            .bucket(&request.bucket)
            .s3_object_tags(
                S3ObjectTag::builder()
                    .key("archive-key")
                    .value(&request.object_key)
                    .build(),
            )
            .s3_object_tags(
                S3ObjectTag::builder()
                    .key("source-instance")
                    .value(&request.source_instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(provider_error)?;
        Ok(())
    }

    async fn poll_image_exports(
        &self,
        image_ids: &[String],
    ) -> Result<Vec<ImageExportTask>, GatewayError> {
        let mut tasks = Vec::new();
        for chunk in image_ids.chunks(STORE_TASK_CHUNK) {
            let mut next_token: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .describe_store_image_tasks()
                    .set_image_ids(Some(chunk.to_vec()));
                if let Some(token) = next_token {
                    request = request.next_token(token);
                }
                let output = request.send().await.map_err(provider_error)?;
                for task in output.store_image_task_results() {
                    tasks.push(map_store_task(task)?);
                }
                next_token = output.next_token().map(str::to_owned);
                if next_token.is_none() {
                    break;
                }
            }
        }
        Ok(tasks)
    }

    async fn copy_snapshot(&self, request: &SnapshotCopyRequest) -> Result<String, GatewayError> {
        let tags = TagSpecification::builder()
            .resource_type(ResourceType::Snapshot)
            .tags(
                Tag::builder()
                    .key("source-snapshot")
                    .value(&request.source_snapshot_id)
                    .build(),
            )
            .tags(
                Tag::builder()
                    .key("source-image")
                    .value(&request.image_id)
                    .build(),
            )
            .build();

        let output = self
            .client
            .copy_snapshot()
            .source_snapshot_id(&request.source_snapshot_id)
            .source_region(&self.region)
            .description(format!(
                "cold-storage copy of {} (image {})",
                request.source_snapshot_id, request.image_id
            ))
            .tag_specifications(tags)
            .send()
            .await
            .map_err(provider_error)?;

        output
            .snapshot_id()
            .map(str::to_owned)
            .ok_or_else(|| {
                GatewayError::MalformedResponse("snapshot copy returned no snapshot id".to_string())
            })
    }

    async fn poll_snapshots(
        &self,
        snapshot_ids: &[String],
    ) -> Result<Vec<SnapshotObservation>, GatewayError> {
        let mut observations = Vec::new();
        for chunk in snapshot_ids.chunks(SNAPSHOT_CHUNK) {
            let mut next_token: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .describe_snapshots()
                    .set_snapshot_ids(Some(chunk.to_vec()));
                if let Some(token) = next_token {
                    request = request.next_token(token);
                }
                let output = request.send().await.map_err(provider_error)?;
                for snapshot in output.snapshots() {
                    observations.push(map_snapshot(snapshot)?);
                }
                next_token = output.next_token().map(str::to_owned);
                if next_token.is_none() {
                    break;
                }
            }
        }
        Ok(observations)
    }

    async fn archive_snapshot(&self, snapshot_id: &str) -> Result<(), GatewayError> {
        self.client
            .modify_snapshot_tier()
            .snapshot_id(snapshot_id)
            .storage_tier(TargetStorageTier::Archive)
            .send()
            .await
            .map_err(provider_error)?;
        Ok(())
    }
}

fn provider_error<E, R>(err: SdkError<E, R>) -> GatewayError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    GatewayError::Provider(DisplayErrorContext(err).to_string())
}

fn map_image(image: &Image) -> Result<BackupImage, GatewayError> {
    let image_id = image
        .image_id()
        .ok_or_else(|| GatewayError::MalformedResponse("image without an id".to_string()))?
        .to_string();

    let created_at: DateTime<Utc> = image
        .creation_date()
        .ok_or_else(|| {
            GatewayError::MalformedResponse(format!("image {image_id} has no creation date"))
        })?
        .parse::<DateTime<Utc>>()
        .map_err(|e| {
            GatewayError::MalformedResponse(format!("image {image_id} creation date: {e}"))
        })?;

    // Distinguish "no mapping list" (a contract violation the starter fails
    // on) from "mappings without EBS volumes" (ephemeral devices, skipped).
    let block_device_snapshots = image.block_device_mappings.as_ref().map(|mappings| {
        mappings
            .iter()
            .filter_map(|mapping| mapping.ebs().and_then(|ebs| ebs.snapshot_id()))
            .map(str::to_owned)
            .collect()
    });

    Ok(BackupImage {
        image_id,
        name: image.name().unwrap_or_default().to_string(),
        created_at,
        block_device_snapshots,
    })
}

fn map_store_task(task: &StoreImageTaskResult) -> Result<ImageExportTask, GatewayError> {
    let image_id = task
        .ami_id()
        .ok_or_else(|| {
            GatewayError::MalformedResponse("store-image task without an image id".to_string())
        })?
        .to_string();

    Ok(ImageExportTask {
        image_id,
        state: ExportTaskState::from_provider(task.store_task_state().unwrap_or_default()),
        bucket: task.bucket().map(str::to_owned),
        failure_reason: task.store_task_failure_reason().map(str::to_owned),
    })
}

fn map_snapshot(snapshot: &Snapshot) -> Result<SnapshotObservation, GatewayError> {
    let snapshot_id = snapshot
        .snapshot_id()
        .ok_or_else(|| GatewayError::MalformedResponse("snapshot without an id".to_string()))?
        .to_string();

    // Snapshots predating tiering report no tier; they sit in standard.
    let tier = snapshot
        .storage_tier()
        .map(|tier| StorageTier::from_provider(tier.as_str()))
        .unwrap_or(StorageTier::Standard);

    Ok(SnapshotObservation {
        snapshot_id,
        state: SnapshotCopyState::from_provider(
            snapshot.state().map(SnapshotState::as_str).unwrap_or("unreported"),
        ),
        state_message: snapshot.state_message().map(str::to_owned),
        volume_id: snapshot.volume_id().map(str::to_owned),
        tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{BlockDeviceMapping, EbsBlockDevice};
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_image_with_ebs_mappings() {
        let image = Image::builder()
            .image_id("ami-0123456789abcdef0")
            .name("backup_i-0aaa_2026-07-01")
            .creation_date("2026-07-01T00:00:00.000Z")
            .block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name("/dev/xvda")
                    .ebs(EbsBlockDevice::builder().snapshot_id("snap-1").build())
                    .build(),
            )
            .block_device_mappings(
                // Ephemeral device, no EBS volume behind it.
                BlockDeviceMapping::builder().device_name("/dev/sdb").build(),
            )
            .build();

        let mapped = map_image(&image).expect("image maps");
        assert_eq!(mapped.image_id, "ami-0123456789abcdef0");
        assert_eq!(mapped.name, "backup_i-0aaa_2026-07-01");
        assert_eq!(
            mapped.block_device_snapshots,
            Some(vec!["snap-1".to_string()])
        );
    }

    #[test]
    fn keeps_missing_mapping_list_distinct_from_empty() {
        let image = Image::builder()
            .image_id("ami-0123456789abcdef0")
            .creation_date("2026-07-01T00:00:00.000Z")
            .build();
        let mapped = map_image(&image).expect("image maps");
        assert_eq!(mapped.block_device_snapshots, None);
    }

    #[test]
    fn rejects_image_without_creation_date() {
        let image = Image::builder().image_id("ami-0123456789abcdef0").build();
        assert!(matches!(
            map_image(&image),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn maps_store_task_states() {
        let task = StoreImageTaskResult::builder()
            .ami_id("ami-1")
            .bucket("cold-backups")
            .store_task_state("Failed")
            .store_task_failure_reason("access denied")
            .build();
        let mapped = map_store_task(&task).expect("task maps");
        assert_eq!(mapped.state, ExportTaskState::Failed);
        assert_eq!(mapped.bucket.as_deref(), Some("cold-backups"));
        assert_eq!(mapped.failure_reason.as_deref(), Some("access denied"));
    }

    #[test]
    fn maps_snapshot_without_tier_to_standard() {
        let snapshot = Snapshot::builder()
            .snapshot_id("snap-1")
            .state(SnapshotState::Completed)
            .volume_id("vol-1")
            .build();
        let mapped = map_snapshot(&snapshot).expect("snapshot maps");
        assert_eq!(mapped.state, SnapshotCopyState::Completed);
        assert_eq!(mapped.tier, StorageTier::Standard);
    }

    #[test]
    fn maps_archived_snapshot_tier() {
        let snapshot = Snapshot::builder()
            .snapshot_id("snap-1")
            .state(SnapshotState::Completed)
            .storage_tier(aws_sdk_ec2::types::StorageTier::Archive)
            .build();
        let mapped = map_snapshot(&snapshot).expect("snapshot maps");
        assert_eq!(mapped.tier, StorageTier::Archive);
    }
}
