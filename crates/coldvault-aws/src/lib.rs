//! AWS bindings for the Coldvault collaborator contracts.
//!
//! Thin adapters only: each type maps one contract from
//! `coldvault-lifecycle` onto the corresponding AWS control-plane API and
//! translates responses into the core's value types. All lifecycle rules
//! stay in the core crate.

mod dynamo;
mod ec2;
mod scheduler;

pub use dynamo::DynamoStateStore;
pub use ec2::Ec2Gateway;
pub use scheduler::EventBridgeScheduler;
