//! Change set lifecycle: create, wait, execute, or discard when empty.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{OamError, Result, StackError};
use crate::stack::KeyValue;

use super::client::CloudFormationApi;
use super::types::{ChangeSetHandle, ChangeSetInput, ChangeSetType};
use super::waiter::Waiter;

/// Prefix of every change set name.
pub const CHANGE_SET_NAME_PREFIX: &str = "oam-ecs";

/// What happened to a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetOutcome {
    /// The change set was executed; the stack operation is now running.
    Executed(ChangeSetHandle),
    /// The change set had nothing to do and was deleted.
    NoChanges,
}

impl ChangeSetOutcome {
    /// Returns true if the stack operation was started.
    #[must_use]
    pub const fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }
}

/// Generates a unique change set name.
#[must_use]
pub fn change_set_name() -> String {
    format!("{CHANGE_SET_NAME_PREFIX}-{}", Uuid::new_v4())
}

/// Drives a change set from creation to execution.
pub struct ChangeSetController<'a, C: CloudFormationApi + ?Sized> {
    api: &'a C,
    waiter: Waiter,
}

impl<'a, C: CloudFormationApi + ?Sized> ChangeSetController<'a, C> {
    /// Creates a controller.
    #[must_use]
    pub const fn new(api: &'a C, waiter: Waiter) -> Self {
        Self { api, waiter }
    }

    /// Builds the change set input for a stack.
    #[must_use]
    pub fn input(
        stack_name: &str,
        change_set_type: ChangeSetType,
        template_body: String,
        parameters: Vec<KeyValue>,
        tags: Vec<KeyValue>,
    ) -> ChangeSetInput {
        ChangeSetInput {
            stack_name: stack_name.to_string(),
            change_set_name: change_set_name(),
            change_set_type,
            template_body,
            parameters,
            tags,
        }
    }

    /// Creates the change set, waits for it, and executes it.
    ///
    /// An update change set that fails because it contains no changes is
    /// deleted and reported as [`ChangeSetOutcome::NoChanges`].
    ///
    /// # Errors
    ///
    /// Returns `StackError::ChangeSetCreationFailed` if the change set
    /// cannot be created, `StackError::ChangeSetExecutionFailed` if it cannot
    /// be executed, or a wait error.
    pub async fn deploy(&self, input: &ChangeSetInput) -> Result<ChangeSetOutcome> {
        info!(
            "Creating {} change set {} for stack {}",
            input.change_set_type, input.change_set_name, input.stack_name
        );

        let handle = self.api.create_change_set(input).await.map_err(|e| {
            OamError::from(StackError::ChangeSetCreationFailed {
                stack_name: input.stack_name.clone(),
                reason: e.to_string(),
            })
        })?;

        if let Err(wait_err) = self
            .waiter
            .wait_for_change_set(self.api, &input.stack_name, &handle)
            .await
        {
            if !self.is_empty_update(input, &handle, &wait_err).await? {
                return Err(wait_err);
            }

            debug!(
                "Change set {} for stack {} has no changes: {wait_err}",
                handle.id, input.stack_name
            );
            if let Err(e) = self.api.delete_change_set(&handle).await {
                warn!("Failed to delete empty change set {}: {e}", handle.id);
            }
            info!("No changes to deploy for stack {}", input.stack_name);
            return Ok(ChangeSetOutcome::NoChanges);
        }

        self.api.execute_change_set(&handle).await.map_err(|e| {
            OamError::from(StackError::ChangeSetExecutionFailed {
                stack_name: input.stack_name.clone(),
                change_set: handle.id.clone(),
                message: e.to_string(),
            })
        })?;

        info!("Executed change set {} for stack {}", handle.id, input.stack_name);
        Ok(ChangeSetOutcome::Executed(handle))
    }

    /// Only an update change set that CloudFormation rejected for having no
    /// changes counts as empty. Timeouts and every other failure propagate.
    async fn is_empty_update(
        &self,
        input: &ChangeSetInput,
        handle: &ChangeSetHandle,
        wait_err: &OamError,
    ) -> Result<bool> {
        if input.change_set_type != ChangeSetType::Update
            || !matches!(
                wait_err,
                OamError::Stack(StackError::ChangeSetCreationFailed { .. })
            )
        {
            return Ok(false);
        }
        let description = self.api.describe_change_set(handle).await?;
        Ok(description.is_empty_diff())
    }
}
