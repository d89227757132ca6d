//! CloudFormation API seam.
//!
//! [`CloudFormationApi`] is the only boundary the orchestrator talks through.
//! [`AwsCloudFormationClient`] implements it over the AWS SDK; tests use
//! in-memory implementations.

use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::BehaviorVersion;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType as SdkChangeSetType, Parameter, Stack, Tag,
};
use tracing::debug;

use crate::error::{Result, StackError};

use super::types::{
    ChangeSetDescription, ChangeSetHandle, ChangeSetInput, ChangeSetStatus, ChangeSetType,
    StackDescription, StackStatus,
};

/// The CloudFormation operations the orchestrator relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// Describes a stack by name or id.
    ///
    /// Returns `None` if the stack does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Creates a change set.
    async fn create_change_set(&self, input: &ChangeSetInput) -> Result<ChangeSetHandle>;

    /// Describes a change set.
    async fn describe_change_set(&self, change_set: &ChangeSetHandle)
    -> Result<ChangeSetDescription>;

    /// Executes a change set.
    async fn execute_change_set(&self, change_set: &ChangeSetHandle) -> Result<()>;

    /// Deletes a change set.
    async fn delete_change_set(&self, change_set: &ChangeSetHandle) -> Result<()>;

    /// Starts deleting a stack by name or id.
    async fn delete_stack(&self, stack_name: &str) -> Result<()>;
}

/// CloudFormation client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsCloudFormationClient {
    client: Client,
}

impl AwsCloudFormationClient {
    /// Creates a client from the ambient AWS configuration.
    ///
    /// An explicit region overrides `AWS_REGION` and the profile's region.
    pub async fn new(region: Option<&str>) -> Self {
        let config = if let Some(region) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self {
            client: Client::new(&config),
        }
    }

    /// Creates a client that skips the AWS configuration chain.
    ///
    /// Suited to dry runs, which make no remote call; any request sent
    /// through it fails for lack of a region.
    #[must_use]
    pub fn unconfigured() -> Self {
        let config = aws_sdk_cloudformation::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl CloudFormationApi for AwsCloudFormationClient {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        debug!("DescribeStacks {stack_name}");

        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        match result {
            Ok(output) => output
                .stacks()
                .first()
                .map(|stack| to_description(stack_name, stack))
                .transpose(),
            Err(err) if stack_does_not_exist(err.code(), err.message()) => Ok(None),
            Err(err) => Err(StackError::provider(
                "DescribeStacks",
                stack_name,
                DisplayErrorContext(&err).to_string(),
            )
            .into()),
        }
    }

    async fn create_change_set(&self, input: &ChangeSetInput) -> Result<ChangeSetHandle> {
        debug!(
            "CreateChangeSet {} ({}) for {}",
            input.change_set_name, input.change_set_type, input.stack_name
        );

        let parameters = input
            .parameters
            .iter()
            .map(|p| {
                Parameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect::<Vec<_>>();

        let tags = input
            .tags
            .iter()
            .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
            .collect::<Vec<_>>();

        let change_set_type = match input.change_set_type {
            ChangeSetType::Create => SdkChangeSetType::Create,
            ChangeSetType::Update => SdkChangeSetType::Update,
        };

        let output = self
            .client
            .create_change_set()
            .stack_name(&input.stack_name)
            .change_set_name(&input.change_set_name)
            .change_set_type(change_set_type)
            .template_body(&input.template_body)
            .set_parameters(Some(parameters))
            .set_tags(Some(tags))
            .capabilities(Capability::CapabilityIam)
            .send()
            .await
            .map_err(|e| {
                StackError::provider(
                    "CreateChangeSet",
                    &input.stack_name,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(ChangeSetHandle {
            id: output.id().unwrap_or(&input.change_set_name).to_string(),
            stack_id: output.stack_id().unwrap_or(&input.stack_name).to_string(),
        })
    }

    async fn describe_change_set(
        &self,
        change_set: &ChangeSetHandle,
    ) -> Result<ChangeSetDescription> {
        debug!("DescribeChangeSet {}", change_set.id);

        let output = self
            .client
            .describe_change_set()
            .change_set_name(&change_set.id)
            .stack_name(&change_set.stack_id)
            .send()
            .await
            .map_err(|e| {
                StackError::provider(
                    "DescribeChangeSet",
                    &change_set.stack_id,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(ChangeSetDescription {
            status: output
                .status()
                .map_or_else(|| ChangeSetStatus::Other(String::new()), |s| {
                    ChangeSetStatus::parse(s.as_str())
                }),
            status_reason: output.status_reason().map(str::to_string),
            change_count: output.changes().len(),
        })
    }

    async fn execute_change_set(&self, change_set: &ChangeSetHandle) -> Result<()> {
        debug!("ExecuteChangeSet {}", change_set.id);

        self.client
            .execute_change_set()
            .change_set_name(&change_set.id)
            .stack_name(&change_set.stack_id)
            .send()
            .await
            .map_err(|e| {
                StackError::provider(
                    "ExecuteChangeSet",
                    &change_set.stack_id,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(())
    }

    async fn delete_change_set(&self, change_set: &ChangeSetHandle) -> Result<()> {
        debug!("DeleteChangeSet {}", change_set.id);

        self.client
            .delete_change_set()
            .change_set_name(&change_set.id)
            .stack_name(&change_set.stack_id)
            .send()
            .await
            .map_err(|e| {
                StackError::provider(
                    "DeleteChangeSet",
                    &change_set.stack_id,
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        debug!("DeleteStack {stack_name}");

        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                StackError::provider("DeleteStack", stack_name, DisplayErrorContext(&e).to_string())
            })?;

        Ok(())
    }
}

/// A described stack without a name or status is a provider error.
fn to_description(requested: &str, stack: &Stack) -> Result<StackDescription> {
    let missing = |field: &str| {
        StackError::provider(
            "DescribeStacks",
            requested,
            format!("response is missing the stack {field}"),
        )
    };
    let stack_name = stack.stack_name().ok_or_else(|| missing("name"))?;
    let status = stack.stack_status().ok_or_else(|| missing("status"))?;

    Ok(StackDescription {
        stack_id: stack.stack_id().map(str::to_string),
        stack_name: stack_name.to_string(),
        status: StackStatus::parse(status.as_str()),
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs: stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect(),
    })
}

/// CloudFormation reports a missing stack as a validation error.
fn stack_does_not_exist(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationError") && message.is_some_and(|m| m.contains("does not exist"))
}
