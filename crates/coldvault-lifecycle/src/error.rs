//! Error types for the lifecycle contracts and jobs.

use thiserror::Error;

/// Errors surfaced by the cloud resource gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider rejected or failed a control-plane call.
    #[error("cloud provider error: {0}")]
    Provider(String),

    /// A response was missing a field the pipeline cannot proceed without.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Errors surfaced by the durable state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend rejected or failed a call.
    #[error("state store error: {0}")]
    Backend(String),

    /// A stored row could not be decoded into a tracked item.
    #[error("malformed item in table {table}: {detail}")]
    MalformedItem { table: String, detail: String },
}

/// Errors surfaced by the scheduler control binding.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The scheduler service rejected or failed a call.
    #[error("scheduler control error: {0}")]
    Control(String),
}

/// Errors surfaced by the notification gateway.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The message never reached the endpoint.
    #[error("notification transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("notification endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },
}

/// Errors that abort a starter or checker invocation.
///
/// Per-item terminal outcomes (a failed export task, an errored snapshot
/// copy) are not errors at this level; they are handled in-band and surfaced
/// through the aggregated failure digest.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The image name did not carry the source-instance token. Treated as
    /// fatal rather than a skip: it usually means the naming contract of the
    /// image producer changed.
    #[error("image {image_id} name {name:?} has no instance-id token")]
    MissingInstanceToken { image_id: String, name: String },

    /// The provider omitted the block-device mapping list for an image.
    #[error("image {image_id} reported no block-device mapping list")]
    MissingBlockDevices { image_id: String },
}
