//! Cold-storage backup lifecycle for Coldvault.
//!
//! This crate contains the whole pipeline brain and none of its plumbing:
//! - The collaborator contracts the jobs depend on (cloud gateway, state
//!   store, scheduler control, notifier)
//! - The tracked-item model persisted between invocations
//! - The starter job (discovers eligible images, launches export work, arms
//!   the checker schedule)
//! - The checker job (polls in-flight work, advances or removes tracked
//!   items, disarms its own schedule once everything drained)
//!
//! Production bindings live in `coldvault-aws` and `coldvault-notify`.

mod checker;
mod digest;
mod error;
mod frequency;
mod gateway;
mod notify;
mod schedule;
mod starter;
mod store;
mod types;

pub use checker::{CheckerConfig, CheckerReport, run_checker};
pub use digest::{notify_failures, render_digest};
pub use error::{GatewayError, JobError, NotifyError, ScheduleError, StoreError};
pub use frequency::Frequency;
pub use gateway::CloudGateway;
pub use notify::Notifier;
pub use schedule::{ScheduleSpec, SchedulerControl};
pub use starter::{StarterConfig, StarterReport, run_starter};
pub use store::{SnapshotPhase, StateStore, TrackedImage, TrackedSnapshot};
pub use types::{
    BackupImage, ExportRequest, ExportTaskState, ImageExportTask, SnapshotCopyRequest,
    SnapshotCopyState, SnapshotObservation, StorageTier,
};
