//! Contract for the external recurring-trigger service.

use async_trait::async_trait;

use crate::ScheduleError;

/// Description of the checker's recurring trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub name: String,
    /// Rate or cron expression in the scheduler service's own syntax.
    pub expression: String,
    pub target_arn: String,
    pub role_arn: String,
}

/// On/off switch for the checker's cadence. The service itself holds no
/// pipeline logic; the starter arms it and the checker disarms it.
#[async_trait]
pub trait SchedulerControl: Send + Sync {
    /// Create the recurring trigger, enabled. Arming is idempotent:
    /// implementations treat an already-existing schedule with this name as
    /// success, since a prior partial run may have left one armed.
    async fn create_schedule(&self, spec: &ScheduleSpec) -> Result<(), ScheduleError>;

    /// Delete the recurring trigger by name.
    async fn delete_schedule(&self, name: &str) -> Result<(), ScheduleError>;
}
