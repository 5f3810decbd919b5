//! EventBridge Scheduler control.

use async_trait::async_trait;
use aws_sdk_scheduler::error::{DisplayErrorContext, SdkError};
use aws_sdk_scheduler::types::{FlexibleTimeWindow, FlexibleTimeWindowMode, ScheduleState, Target};
use tracing::{debug, info};

use coldvault_lifecycle::{ScheduleError, ScheduleSpec, SchedulerControl};

/// `SchedulerControl` implementation over EventBridge Scheduler.
pub struct EventBridgeScheduler {
    client: aws_sdk_scheduler::Client,
}

impl EventBridgeScheduler {
    pub fn new(client: aws_sdk_scheduler::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchedulerControl for EventBridgeScheduler {
    async fn create_schedule(&self, spec: &ScheduleSpec) -> Result<(), ScheduleError> {
        let window = FlexibleTimeWindow::builder()
            .mode(FlexibleTimeWindowMode::Off)
            .build()
            .map_err(|e| ScheduleError::Control(e.to_string()))?;
        let target = Target::builder()
            .arn(&spec.target_arn)
            .role_arn(&spec.role_arn)
            .build()
            .map_err(|e| ScheduleError::Control(e.to_string()))?;

        let result = self
            .client
            .create_schedule()
            .name(&spec.name)
            .schedule_expression(&spec.expression)
            .flexible_time_window(window)
            .target(target)
            .state(ScheduleState::Enabled)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(name = %spec.name, expression = %spec.expression, "created schedule");
                Ok(())
            }
            // Arming is idempotent: a prior partial run may have left the
            // schedule in place, and only the checker ever removes it.
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conflict_exception()) =>
            {
                debug!(name = %spec.name, "schedule already armed");
                Ok(())
            }
            Err(err) => Err(control_error(err)),
        }
    }

    async fn delete_schedule(&self, name: &str) -> Result<(), ScheduleError> {
        self.client
            .delete_schedule()
            .name(name)
            .send()
            .await
            .map_err(control_error)?;
        info!(name = %name, "deleted schedule");
        Ok(())
    }
}

fn control_error<E, R>(err: SdkError<E, R>) -> ScheduleError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    ScheduleError::Control(DisplayErrorContext(err).to_string())
}
