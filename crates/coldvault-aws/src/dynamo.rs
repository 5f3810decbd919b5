//! DynamoDB state store.
//!
//! Two tables, one per tracked entity type, keyed by the external id. Rows
//! carry no data beyond the key and (for snapshots) the lifecycle phase.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest};

use coldvault_lifecycle::{SnapshotPhase, StateStore, StoreError, TrackedImage, TrackedSnapshot};

/// BatchWriteItem accepts at most 25 requests per call.
const BATCH_WRITE_CHUNK: usize = 25;

const IMAGE_KEY: &str = "imageId";
const SNAPSHOT_KEY: &str = "snapshotId";
const STATUS_ATTR: &str = "status";

/// `StateStore` implementation over two DynamoDB tables.
pub struct DynamoStateStore {
    client: aws_sdk_dynamodb::Client,
    images_table: String,
    snapshots_table: String,
}

impl DynamoStateStore {
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        images_table: impl Into<String>,
        snapshots_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            images_table: images_table.into(),
            snapshots_table: snapshots_table.into(),
        }
    }

    async fn batch_write(&self, table: &str, writes: Vec<WriteRequest>) -> Result<(), StoreError> {
        for chunk in writes.chunks(BATCH_WRITE_CHUNK) {
            let output = self
                .client
                .batch_write_item()
                .request_items(table, chunk.to_vec())
                .send()
                .await
                .map_err(backend_error)?;

            // Partial success is still failure: the run either records all
            // its work or fails loudly and gets re-covered by a later tick.
            let unprocessed = output
                .unprocessed_items()
                .map(|items| items.values().map(Vec::len).sum::<usize>())
                .unwrap_or(0);
            if unprocessed > 0 {
                return Err(StoreError::Backend(format!(
                    "table {table} left {unprocessed} writes unprocessed"
                )));
            }
        }
        Ok(())
    }

    async fn scan_table(
        &self,
        table: &str,
    ) -> Result<Vec<HashMap<String, AttributeValue>>, StoreError> {
        let mut items = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut request = self.client.scan().table_name(table);
            if let Some(key) = exclusive_start_key {
                request = request.set_exclusive_start_key(Some(key));
            }
            let output = request.send().await.map_err(backend_error)?;
            items.extend(output.items().iter().cloned());
            exclusive_start_key = output.last_evaluated_key().cloned();
            if exclusive_start_key.is_none() {
                break;
            }
        }
        Ok(items)
    }

    fn key_deletes(key_attr: &str, ids: &[String]) -> Result<Vec<WriteRequest>, StoreError> {
        ids.iter()
            .map(|id| {
                let delete = DeleteRequest::builder()
                    .key(key_attr, AttributeValue::S(id.clone()))
                    .build()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(WriteRequest::builder().delete_request(delete).build())
            })
            .collect()
    }
}

#[async_trait]
impl StateStore for DynamoStateStore {
    async fn put_tracked_images(&self, images: &[TrackedImage]) -> Result<(), StoreError> {
        let writes = images
            .iter()
            .map(|image| {
                let put = PutRequest::builder()
                    .item(IMAGE_KEY, AttributeValue::S(image.image_id.clone()))
                    .build()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.batch_write(&self.images_table, writes).await
    }

    async fn scan_tracked_images(&self) -> Result<Vec<TrackedImage>, StoreError> {
        self.scan_table(&self.images_table)
            .await?
            .iter()
            .map(|item| image_from_item(item, &self.images_table))
            .collect()
    }

    async fn delete_tracked_images(&self, image_ids: &[String]) -> Result<(), StoreError> {
        let writes = Self::key_deletes(IMAGE_KEY, image_ids)?;
        self.batch_write(&self.images_table, writes).await
    }

    async fn put_tracked_snapshots(&self, snapshots: &[TrackedSnapshot]) -> Result<(), StoreError> {
        let writes = snapshots
            .iter()
            .map(|row| {
                let put = PutRequest::builder()
                    .item(SNAPSHOT_KEY, AttributeValue::S(row.snapshot_id.clone()))
                    .item(STATUS_ATTR, AttributeValue::S(row.phase.as_str().to_string()))
                    .build()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.batch_write(&self.snapshots_table, writes).await
    }

    async fn scan_tracked_snapshots(&self) -> Result<Vec<TrackedSnapshot>, StoreError> {
        self.scan_table(&self.snapshots_table)
            .await?
            .iter()
            .map(|item| snapshot_from_item(item, &self.snapshots_table))
            .collect()
    }

    async fn update_snapshot_phase(
        &self,
        snapshot_id: &str,
        phase: SnapshotPhase,
    ) -> Result<(), StoreError> {
        // `status` is a DynamoDB reserved word, hence the name alias.
        self.client
            .update_item()
            .table_name(&self.snapshots_table)
            .key(SNAPSHOT_KEY, AttributeValue::S(snapshot_id.to_string()))
            .update_expression("SET #status = :phase")
            .expression_attribute_names("#status", STATUS_ATTR)
            .expression_attribute_values(":phase", AttributeValue::S(phase.as_str().to_string()))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete_tracked_snapshots(&self, snapshot_ids: &[String]) -> Result<(), StoreError> {
        let writes = Self::key_deletes(SNAPSHOT_KEY, snapshot_ids)?;
        self.batch_write(&self.snapshots_table, writes).await
    }
}

fn backend_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|value| value.as_s().ok()).cloned()
}

fn image_from_item(
    item: &HashMap<String, AttributeValue>,
    table: &str,
) -> Result<TrackedImage, StoreError> {
    let image_id = string_attr(item, IMAGE_KEY).ok_or_else(|| StoreError::MalformedItem {
        table: table.to_string(),
        detail: format!("missing string attribute {IMAGE_KEY}"),
    })?;
    Ok(TrackedImage { image_id })
}

fn snapshot_from_item(
    item: &HashMap<String, AttributeValue>,
    table: &str,
) -> Result<TrackedSnapshot, StoreError> {
    let snapshot_id = string_attr(item, SNAPSHOT_KEY).ok_or_else(|| StoreError::MalformedItem {
        table: table.to_string(),
        detail: format!("missing string attribute {SNAPSHOT_KEY}"),
    })?;
    let status = string_attr(item, STATUS_ATTR).ok_or_else(|| StoreError::MalformedItem {
        table: table.to_string(),
        detail: format!("snapshot {snapshot_id} missing attribute {STATUS_ATTR}"),
    })?;
    let phase = SnapshotPhase::parse(&status).ok_or_else(|| StoreError::MalformedItem {
        table: table.to_string(),
        detail: format!("snapshot {snapshot_id} has unknown status {status:?}"),
    })?;
    Ok(TrackedSnapshot { snapshot_id, phase })
}
