//! Checker job: polls in-flight export work and advances tracked state.
//!
//! Runs on the schedule the starter armed. Every invocation re-derives the
//! outstanding work from the state store, polls the provider once per track,
//! and applies the state-machine rules below. Safe to run on an unknown
//! cadence: a run that observes no progress changes nothing.

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::{
    CloudGateway, ExportTaskState, JobError, Notifier, SchedulerControl, SnapshotCopyState,
    SnapshotPhase, StateStore, StorageTier, notify_failures,
};

/// Snapshot phase updates are issued in concurrent groups of this size, each
/// group awaited before the next starts, bounding concurrent writes against
/// the state store.
const PHASE_UPDATE_BATCH: usize = 20;

/// Configuration for one checker invocation.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Name of the checker's own recurring trigger, deleted once all
    /// outstanding work has drained.
    pub schedule_name: String,
}

/// Outcome summary of one checker invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckerReport {
    pub exports_completed: usize,
    pub exports_failed: usize,
    pub exports_in_progress: usize,
    /// Snapshots whose archive-tier transition was issued this run.
    pub copies_archived: usize,
    pub copies_failed: usize,
    /// Snapshots observed in the archive tier and removed from tracking.
    pub snapshots_retired: usize,
    pub schedule_disarmed: bool,
}

/// Run the checker job.
///
/// Failure semantics mirror the starter: any error aborts the rest of the
/// invocation, is posted best-effort to the notifier, and re-raised.
pub async fn run_checker(
    config: &CheckerConfig,
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    scheduler: &dyn SchedulerControl,
    notifier: &dyn Notifier,
) -> Result<CheckerReport, JobError> {
    match run_inner(config, gateway, store, scheduler, notifier).await {
        Ok(report) => Ok(report),
        Err(err) => {
            if let Err(notify_err) = notifier
                .post_message(&format!("cold-storage checker failed: {err}"))
                .await
            {
                error!(error = %notify_err, "failed to deliver checker failure notification");
            }
            Err(err)
        }
    }
}

async fn run_inner(
    config: &CheckerConfig,
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    scheduler: &dyn SchedulerControl,
    notifier: &dyn Notifier,
) -> Result<CheckerReport, JobError> {
    let mut report = CheckerReport::default();

    // "Finished" is only ever derived from scan emptiness, never from what
    // this run resolved: work removed now is confirmed drained by the next
    // tick, which then disarms.
    let images_finished = check_image_track(gateway, store, notifier, &mut report).await?;
    let snapshots_finished = check_snapshot_track(gateway, store, notifier, &mut report).await?;

    if images_finished && snapshots_finished {
        scheduler.delete_schedule(&config.schedule_name).await?;
        report.schedule_disarmed = true;
        info!(
            schedule = %config.schedule_name,
            "no tracked work remains, disarmed checker schedule"
        );
    }

    Ok(report)
}

/// Advance the image-export track. Returns true when no rows remained at
/// scan time.
async fn check_image_track(
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
    report: &mut CheckerReport,
) -> Result<bool, JobError> {
    let tracked = store.scan_tracked_images().await?;
    if tracked.is_empty() {
        info!("no tracked image exports remain");
        return Ok(true);
    }

    let image_ids: Vec<String> = tracked.iter().map(|row| row.image_id.clone()).collect();
    let tasks = gateway.poll_image_exports(&image_ids).await?;

    let mut completed = Vec::new();
    let mut failed_ids = Vec::new();
    let mut failures = Vec::new();
    let mut in_progress = 0usize;
    for task in tasks {
        match task.state {
            ExportTaskState::Completed => completed.push(task.image_id),
            ExportTaskState::Failed => {
                failures.push(format!(
                    "export task {} (bucket {}): {}",
                    task.image_id,
                    task.bucket.as_deref().unwrap_or("unknown"),
                    task.failure_reason
                        .as_deref()
                        .unwrap_or("no failure reason reported"),
                ));
                failed_ids.push(task.image_id);
            }
            ExportTaskState::InProgress => in_progress += 1,
            ExportTaskState::Other(state) => {
                warn!(image_id = %task.image_id, state = %state, "unexpected export task state");
            }
        }
    }

    if !completed.is_empty() {
        store.delete_tracked_images(&completed).await?;
    }
    if !failed_ids.is_empty() {
        store.delete_tracked_images(&failed_ids).await?;
        notify_failures(notifier, "Image export failures:", &failures).await?;
    }
    info!(
        completed = completed.len(),
        failed = failed_ids.len(),
        in_progress,
        "image export progress"
    );

    report.exports_completed = completed.len();
    report.exports_failed = failed_ids.len();
    report.exports_in_progress = in_progress;
    Ok(false)
}

/// Advance the snapshot track. Returns true when no rows remained at scan
/// time.
async fn check_snapshot_track(
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
    report: &mut CheckerReport,
) -> Result<bool, JobError> {
    let tracked = store.scan_tracked_snapshots().await?;
    if tracked.is_empty() {
        info!("no tracked snapshots remain");
        return Ok(true);
    }

    let mut copying = Vec::new();
    let mut archiving = Vec::new();
    for row in tracked {
        match row.phase {
            SnapshotPhase::Copying => copying.push(row.snapshot_id),
            SnapshotPhase::Archiving => archiving.push(row.snapshot_id),
        }
    }

    if !copying.is_empty() {
        advance_copying(gateway, store, notifier, &copying, report).await?;
    }
    if !archiving.is_empty() {
        advance_archiving(gateway, store, &archiving, report).await?;
    }
    Ok(false)
}

/// Move finished copies into the archive tier and flip their rows, remove
/// errored copies, leave converging ones alone.
async fn advance_copying(
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
    snapshot_ids: &[String],
    report: &mut CheckerReport,
) -> Result<(), JobError> {
    let observations = gateway.poll_snapshots(snapshot_ids).await?;

    let mut ready = Vec::new();
    let mut failed_ids = Vec::new();
    let mut failures = Vec::new();
    let mut converging = 0usize;
    for observation in observations {
        match observation.state {
            SnapshotCopyState::Completed => ready.push(observation.snapshot_id),
            SnapshotCopyState::Error => {
                failures.push(format!(
                    "snapshot {} (volume {}): error: {}",
                    observation.snapshot_id,
                    observation.volume_id.as_deref().unwrap_or("unknown"),
                    observation
                        .state_message
                        .as_deref()
                        .unwrap_or("no state message reported"),
                ));
                failed_ids.push(observation.snapshot_id);
            }
            SnapshotCopyState::Pending
            | SnapshotCopyState::Recoverable
            | SnapshotCopyState::Recovering => converging += 1,
            SnapshotCopyState::Other(state) => {
                warn!(
                    snapshot_id = %observation.snapshot_id,
                    state = %state,
                    "unexpected snapshot copy state"
                );
            }
        }
    }

    // Tier transitions are sequential and fail-fast: one failing call aborts
    // the rest of this invocation. The phase updates below are isolated per
    // batch instead.
    for snapshot_id in &ready {
        gateway.archive_snapshot(snapshot_id).await?;
    }

    for batch in ready.chunks(PHASE_UPDATE_BATCH) {
        let updates = batch
            .iter()
            .map(|id| store.update_snapshot_phase(id, SnapshotPhase::Archiving));
        for (snapshot_id, result) in batch.iter().zip(join_all(updates).await) {
            if let Err(err) = result {
                error!(
                    snapshot_id = %snapshot_id,
                    error = %err,
                    "failed to mark snapshot archiving"
                );
            }
        }
    }

    if !failed_ids.is_empty() {
        notify_failures(notifier, "Snapshot copy failures:", &failures).await?;
        store.delete_tracked_snapshots(&failed_ids).await?;
    }
    info!(
        archiving = ready.len(),
        failed = failed_ids.len(),
        converging,
        "snapshot copy progress"
    );

    report.copies_archived = ready.len();
    report.copies_failed = failed_ids.len();
    Ok(())
}

/// Retire snapshots the provider reports in the archive tier.
async fn advance_archiving(
    gateway: &dyn CloudGateway,
    store: &dyn StateStore,
    snapshot_ids: &[String],
    report: &mut CheckerReport,
) -> Result<(), JobError> {
    let observations = gateway.poll_snapshots(snapshot_ids).await?;

    let mut archived = Vec::new();
    for observation in observations {
        match observation.tier {
            StorageTier::Archive => archived.push(observation.snapshot_id),
            StorageTier::Standard => {}
            StorageTier::Other(tier) => {
                warn!(
                    snapshot_id = %observation.snapshot_id,
                    tier = %tier,
                    "unexpected storage tier"
                );
            }
        }
    }

    if !archived.is_empty() {
        store.delete_tracked_snapshots(&archived).await?;
    }
    info!(
        archived = archived.len(),
        pending = snapshot_ids.len() - archived.len(),
        "snapshot archive progress"
    );

    report.snapshots_retired = archived.len();
    Ok(())
}
