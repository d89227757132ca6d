//! Polling until stacks and change sets reach a terminal state.
//!
//! Success and failure states mirror the CloudFormation SDK waiters
//! (`StackCreateComplete`, `StackUpdateComplete`, `StackDeleteComplete`,
//! `ChangeSetCreateComplete`). Any other state keeps the waiter polling.

use std::time::Duration;
use tracing::debug;

use crate::error::{Result, StackError};

use super::client::CloudFormationApi;
use super::types::{ChangeSetDescription, ChangeSetHandle, ChangeSetStatus, StackDescription, StackStatus};

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of polls, 90 minutes at the default delay.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1800;

/// A stack operation that can be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    /// Stack creation.
    Create,
    /// Stack update.
    Update,
    /// Stack deletion.
    Delete,
}

#[derive(Debug, PartialEq, Eq)]
enum Poll {
    Done,
    Failed,
    Pending,
}

impl StackOperation {
    /// Verb used in messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn poll(self, status: Option<&StackStatus>) -> Poll {
        use StackStatus as S;

        match (self, status) {
            (Self::Create | Self::Update, None) => Poll::Failed,
            (Self::Delete, None | Some(S::DeleteComplete)) => Poll::Done,

            (Self::Create, Some(S::CreateComplete)) => Poll::Done,
            (
                Self::Create,
                Some(
                    S::CreateFailed
                    | S::DeleteComplete
                    | S::DeleteFailed
                    | S::RollbackFailed
                    | S::RollbackComplete,
                ),
            ) => Poll::Failed,

            (Self::Update, Some(S::UpdateComplete)) => Poll::Done,
            (
                Self::Update,
                Some(S::UpdateFailed | S::UpdateRollbackFailed | S::UpdateRollbackComplete),
            ) => Poll::Failed,

            (
                Self::Delete,
                Some(
                    S::DeleteFailed
                    | S::RollbackFailed
                    | S::UpdateRollbackInProgress
                    | S::UpdateRollbackFailed
                    | S::UpdateRollbackComplete,
                ),
            ) => Poll::Failed,

            _ => Poll::Pending,
        }
    }
}

/// Polls with a fixed delay and a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    delay: Duration,
    max_attempts: u32,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl Waiter {
    /// Creates a waiter.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Delay between polls.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Maximum number of polls.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Waits until a stack operation finishes.
    ///
    /// Returns the final description, or `None` once a deleted stack is gone.
    ///
    /// # Errors
    ///
    /// Returns `StackError::WaitFailed` if the stack reaches a failure state,
    /// `StackError::Timeout` if the attempts run out, or any describe error.
    pub async fn wait_for_stack<C: CloudFormationApi + ?Sized>(
        &self,
        api: &C,
        stack_name: &str,
        operation: StackOperation,
    ) -> Result<Option<StackDescription>> {
        for attempt in 1..=self.max_attempts {
            let stack = api.describe_stack(stack_name).await?;
            let status = stack.as_ref().map(|s| &s.status);

            match operation.poll(status) {
                Poll::Done => return Ok(stack),
                Poll::Failed => {
                    return Err(StackError::WaitFailed {
                        stack_name: stack_name.to_string(),
                        operation: operation.verb().to_string(),
                        status: describe_failure(stack.as_ref()),
                    }
                    .into());
                }
                Poll::Pending => {
                    debug!(
                        "Stack {stack_name} is {} (attempt {attempt}/{}), waiting to {}",
                        status.map_or("missing", StackStatus::as_str),
                        self.max_attempts,
                        operation.verb()
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(StackError::Timeout {
            stack_name: stack_name.to_string(),
            operation: operation.verb().to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }

    /// Waits until a change set has been created.
    ///
    /// # Errors
    ///
    /// Returns `StackError::ChangeSetCreationFailed` if CloudFormation marks
    /// the change set failed, `StackError::Timeout` if the attempts run out,
    /// or any describe error.
    pub async fn wait_for_change_set<C: CloudFormationApi + ?Sized>(
        &self,
        api: &C,
        stack_name: &str,
        change_set: &ChangeSetHandle,
    ) -> Result<ChangeSetDescription> {
        for attempt in 1..=self.max_attempts {
            let description = api.describe_change_set(change_set).await?;

            match description.status {
                ChangeSetStatus::CreateComplete => return Ok(description),
                ChangeSetStatus::Failed => {
                    return Err(StackError::ChangeSetCreationFailed {
                        stack_name: stack_name.to_string(),
                        reason: description
                            .status_reason
                            .unwrap_or_else(|| String::from("change set failed")),
                    }
                    .into());
                }
                ref status => {
                    debug!(
                        "Change set for {stack_name} is {status} (attempt {attempt}/{})",
                        self.max_attempts
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(StackError::Timeout {
            stack_name: stack_name.to_string(),
            operation: String::from("create change set for"),
            attempts: self.max_attempts,
        }
        .into())
    }
}

fn describe_failure(stack: Option<&StackDescription>) -> String {
    match stack {
        None => String::from("DOES_NOT_EXIST"),
        Some(StackDescription {
            status,
            status_reason: Some(reason),
            ..
        }) => format!("{status} ({reason})"),
        Some(stack) => stack.status.to_string(),
    }
}
