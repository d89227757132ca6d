//! CloudFormation integration.
//!
//! This module provides:
//! - Provider-neutral stack and change set types
//! - The [`CloudFormationApi`] seam and its AWS SDK implementation
//! - Bounded polling for stack operations and change sets
//! - Change set creation and execution, including empty-diff handling
//! - The [`CloudFormation`] orchestrator used by the application driver

mod changeset;
mod client;
mod deployer;
mod types;
mod waiter;

pub use changeset::{CHANGE_SET_NAME_PREFIX, ChangeSetController, ChangeSetOutcome, change_set_name};
pub use client::{AwsCloudFormationClient, CloudFormationApi};
#[cfg(test)]
pub use client::MockCloudFormationApi;
pub use deployer::{CloudFormation, DEFAULT_DRY_RUN_DIR};
pub use types::{
    ChangeSetDescription, ChangeSetHandle, ChangeSetInput, ChangeSetStatus, ChangeSetType,
    StackDescription, StackStatus,
};
pub use waiter::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, StackOperation, Waiter};
