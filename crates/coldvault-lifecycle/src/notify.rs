//! Contract for the chat-ops notification gateway.

use async_trait::async_trait;

use crate::NotifyError;

/// Delivers one rendered message to the chat-ops endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message. Transport failure is an error; callers decide whether
    /// delivery is best-effort or must propagate.
    async fn post_message(&self, text: &str) -> Result<(), NotifyError>;
}
