//! Starter job: discovers eligible backup images and launches export work.
//!
//! Runs once per invocation on an external fixed cadence. Discovery, export
//! launches, and tracking writes happen in strict order so that every
//! external operation has a durable row behind it before the run ends; the
//! only loss window is a crash between an external call and the batch write
//! that follows it, which a later cadence tick re-covers.

use chrono::Utc;
use tracing::{error, info};

use crate::{
    BackupImage, CloudGateway, ExportRequest, Frequency, JobError, Notifier, ScheduleSpec,
    SchedulerControl, SnapshotCopyRequest, SnapshotPhase, StateStore, TrackedImage,
    TrackedSnapshot,
};

/// Configuration for one starter invocation, constructed at job entry and
/// passed by parameter.
#[derive(Debug, Clone)]
pub struct StarterConfig {
    pub frequency: Frequency,
    /// Destination bucket for image exports.
    pub archive_bucket: String,
    /// The checker trigger to arm when this run starts any work.
    pub checker_schedule: ScheduleSpec,
}

/// Outcome summary of one starter invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StarterReport {
    pub images_discovered: usize,
    pub exports_started: usize,
    pub copies_started: usize,
    pub schedule_armed: bool,
}

/// Run the starter job.
///
/// Any error aborts the remaining steps, is posted to the notifier
/// best-effort with the error text, and is then re-raised: the job fails
/// loudly rather than reporting partial completion.
pub async fn run_starter(
    config: &StarterConfig,
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    scheduler: &dyn SchedulerControl,
    notifier: &dyn Notifier,
) -> Result<StarterReport, JobError> {
    match run_inner(config, gateway, store, scheduler).await {
        Ok(report) => Ok(report),
        Err(err) => {
            if let Err(notify_err) = notifier
                .post_message(&format!("cold-storage starter failed: {err}"))
                .await
            {
                error!(error = %notify_err, "failed to deliver starter failure notification");
            }
            Err(err)
        }
    }
}

async fn run_inner(
    config: &StarterConfig,
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    scheduler: &dyn SchedulerControl,
) -> Result<StarterReport, JobError> {
    let now = Utc::now();

    let discovered = gateway.list_backup_images(config.frequency).await?;
    let images_discovered = discovered.len();
    let eligible: Vec<BackupImage> = discovered
        .into_iter()
        .filter(|image| config.frequency.is_eligible(image.created_at, now))
        .collect();
    info!(
        discovered = images_discovered,
        eligible = eligible.len(),
        cutoff = %config.frequency.age_cutoff(now),
        "discovered backup images"
    );

    let date_key = now.format("%Y-%m-%d").to_string();
    for image in &eligible {
        let instance_id = instance_id_from_name(image)?;
        let object_key = format!("{date_key}/{instance_id}");
        info!(
            image_id = %image.image_id,
            bucket = %config.archive_bucket,
            key = %object_key,
            "queueing image export"
        );
        gateway
            .start_image_export(&ExportRequest {
                image_id: image.image_id.clone(),
                bucket: config.archive_bucket.clone(),
                object_key,
                source_instance_id: instance_id.to_string(),
            })
            .await?;
    }

    if !eligible.is_empty() {
        let rows: Vec<TrackedImage> = eligible
            .iter()
            .map(|image| TrackedImage {
                image_id: image.image_id.clone(),
            })
            .collect();
        store.put_tracked_images(&rows).await?;
    }

    let mut copies = Vec::new();
    for image in &eligible {
        let sources = image
            .block_device_snapshots
            .as_ref()
            .ok_or_else(|| JobError::MissingBlockDevices {
                image_id: image.image_id.clone(),
            })?;
        for source in sources {
            let copy_id = gateway
                .copy_snapshot(&SnapshotCopyRequest {
                    source_snapshot_id: source.clone(),
                    image_id: image.image_id.clone(),
                })
                .await?;
            copies.push(TrackedSnapshot {
                snapshot_id: copy_id,
                phase: SnapshotPhase::Copying,
            });
        }
    }
    if !copies.is_empty() {
        store.put_tracked_snapshots(&copies).await?;
    }

    // Arm only when this run actually started something. A still-armed
    // schedule from an earlier partial run is left alone: disarming is the
    // checker's exclusive responsibility.
    let schedule_armed = !eligible.is_empty() || !copies.is_empty();
    if schedule_armed {
        scheduler.create_schedule(&config.checker_schedule).await?;
        info!(schedule = %config.checker_schedule.name, "armed checker schedule");
    }

    Ok(StarterReport {
        images_discovered,
        exports_started: eligible.len(),
        copies_started: copies.len(),
        schedule_armed,
    })
}

/// Source instance id, the second underscore-delimited token of the image
/// name. Its absence is a hard error for the run: it usually means the image
/// producer's naming contract changed, which is worth surfacing loudly.
fn instance_id_from_name(image: &BackupImage) -> Result<&str, JobError> {
    image
        .name
        .split('_')
        .nth(1)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| JobError::MissingInstanceToken {
            image_id: image.image_id.clone(),
            name: image.name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn image_named(name: &str) -> BackupImage {
        BackupImage {
            image_id: "ami-0123456789abcdef0".to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            block_device_snapshots: Some(Vec::new()),
        }
    }

    #[test]
    fn extracts_second_token() {
        let image = image_named("backup_i-0fedcba987654321_2026-08-01");
        assert_eq!(
            instance_id_from_name(&image).expect("token present"),
            "i-0fedcba987654321"
        );
    }

    #[test]
    fn rejects_name_without_separator() {
        let image = image_named("backup-i-0fedcba987654321");
        assert!(matches!(
            instance_id_from_name(&image),
            Err(JobError::MissingInstanceToken { .. })
        ));
    }

    #[test]
    fn rejects_empty_second_token() {
        let image = image_named("backup_");
        assert!(matches!(
            instance_id_from_name(&image),
            Err(JobError::MissingInstanceToken { .. })
        ));
    }
}
