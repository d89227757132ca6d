//! Stack orchestration.
//!
//! [`CloudFormation`] observes a stack once, decides what to do from its
//! status, and then drives the change set and the wait that follows:
//!
//! | observed            | action                          |
//! |---------------------|---------------------------------|
//! | absent              | create                          |
//! | needs cleanup       | delete, then create             |
//! | in progress         | fail with the current status    |
//! | anything else       | update                          |

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{OamError, Result, StackError};
use crate::stack::StackConfiguration;

use super::changeset::{ChangeSetController, ChangeSetOutcome};
use super::client::CloudFormationApi;
use super::types::{ChangeSetType, StackDescription, StackStatus};
use super::waiter::{StackOperation, Waiter};

/// Directory dry-run templates are written to, relative to the working directory.
pub const DEFAULT_DRY_RUN_DIR: &str = "oam-ecs-dry-run-results";

/// Deploys, describes and deletes stacks described by a [`StackConfiguration`].
pub struct CloudFormation<C: CloudFormationApi> {
    /// Provider client.
    client: C,
    /// Poll settings for every wait.
    waiter: Waiter,
    /// Where dry-run templates go.
    dry_run_dir: PathBuf,
}

impl<C: CloudFormationApi> CloudFormation<C> {
    /// Creates an orchestrator with default wait settings.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client,
            waiter: Waiter::default(),
            dry_run_dir: PathBuf::from(DEFAULT_DRY_RUN_DIR),
        }
    }

    /// Sets the poll settings.
    #[must_use]
    pub fn with_waiter(mut self, waiter: Waiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Sets the dry-run output directory.
    #[must_use]
    pub fn with_dry_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dry_run_dir = dir.into();
        self
    }

    /// Returns the provider client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Returns the dry-run output directory.
    #[must_use]
    pub fn dry_run_dir(&self) -> &Path {
        &self.dry_run_dir
    }

    /// Fetches the current state of a stack.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if the stack does not exist, or a
    /// provider error.
    pub async fn describe(&self, stack_name: &str) -> Result<StackDescription> {
        self.client
            .describe_stack(stack_name)
            .await?
            .ok_or_else(|| {
                StackError::NotFound {
                    stack_name: stack_name.to_string(),
                }
                .into()
            })
    }

    /// Starts creating a stack.
    ///
    /// A stack left behind by a failed creation is deleted first. Returns
    /// once the change set is executed; the caller waits for completion.
    ///
    /// # Errors
    ///
    /// Returns `StackError::AlreadyExists` for a healthy existing stack,
    /// `StackError::UpdateInProgress` while another operation runs, or any
    /// template, change set or provider error.
    pub async fn create<S: StackConfiguration>(&self, config: &S) -> Result<ChangeSetOutcome> {
        let template = config.template()?;
        let existing = self.client.describe_stack(&config.stack_name()).await?;
        self.create_from(config, existing.as_ref(), template).await
    }

    /// Starts updating an existing stack.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if the stack does not exist,
    /// `StackError::UpdateInProgress` while another operation runs, or any
    /// template, change set or provider error.
    pub async fn update<S: StackConfiguration>(&self, config: &S) -> Result<ChangeSetOutcome> {
        let template = config.template()?;
        let stack = self.describe(&config.stack_name()).await?;
        self.update_from(config, &stack, template).await
    }

    /// Deletes a stack and waits until it is gone.
    ///
    /// Pass the stack id where known, so the wait can observe
    /// `DELETE_COMPLETE` instead of a missing stack.
    ///
    /// # Errors
    ///
    /// Returns a provider error or a wait error.
    pub async fn delete(&self, stack_id: &str) -> Result<()> {
        info!("Deleting stack {stack_id}");
        self.client.delete_stack(stack_id).await?;
        self.waiter
            .wait_for_stack(&self.client, stack_id, StackOperation::Delete)
            .await?;
        info!("Deleted stack {stack_id}");
        Ok(())
    }

    /// Brings a stack in line with its configuration and returns the result.
    ///
    /// Re-running with an unchanged template is a successful no-op that
    /// returns the current outputs.
    ///
    /// # Errors
    ///
    /// Returns `StackError::UpdateInProgress` if another operation is running
    /// on the stack, or any template, change set, wait or provider error.
    pub async fn reconcile<S: StackConfiguration>(&self, config: &S) -> Result<S::Output> {
        let stack_name = config.stack_name();
        let template = config.template()?;
        let existing = self.client.describe_stack(&stack_name).await?;

        let stack = match existing {
            Some(stack) if !stack.status.requires_cleanup() && !stack.status.in_progress() => {
                if !stack.status.is_success() {
                    warn!("Updating stack {stack_name} from {}", stack.status);
                }
                match self.update_from(config, &stack, template).await? {
                    ChangeSetOutcome::Executed(_) => {
                        self.wait(&stack_name, StackOperation::Update).await?
                    }
                    ChangeSetOutcome::NoChanges => stack,
                }
            }
            existing => match self.create_from(config, existing.as_ref(), template).await? {
                ChangeSetOutcome::Executed(_) => {
                    self.wait(&stack_name, StackOperation::Create).await?
                }
                ChangeSetOutcome::NoChanges => self.describe(&stack_name).await?,
            },
        };

        info!("Stack {stack_name} is {}", stack.status);
        Ok(config.to_result(&stack))
    }

    /// Describes a stack and maps it to its result.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if the stack does not exist, or a
    /// provider error.
    pub async fn describe_result<S: StackConfiguration>(&self, config: &S) -> Result<S::Output> {
        let stack = self.describe(&config.stack_name()).await?;
        Ok(config.to_result(&stack))
    }

    /// Deletes a stack and returns what it held before deletion.
    ///
    /// A missing stack counts as deleted: the result carries the stack name
    /// and no outputs.
    ///
    /// # Errors
    ///
    /// Returns a provider error or a wait error.
    pub async fn delete_result<S: StackConfiguration>(&self, config: &S) -> Result<S::Output> {
        let stack_name = config.stack_name();

        let Some(stack) = self.client.describe_stack(&stack_name).await? else {
            info!("Stack {stack_name} does not exist, nothing to delete");
            let gone = StackDescription::new(stack_name, StackStatus::DeleteComplete);
            return Ok(config.to_result(&gone));
        };

        self.delete(stack.id_or_name()).await?;
        Ok(config.to_result(&stack))
    }

    /// Renders the template to `<dry-run dir>/<stack name>-template.yaml`.
    ///
    /// Makes no remote call. Returns the absolute path of the written file.
    ///
    /// # Errors
    ///
    /// Returns a template error or an IO error.
    pub async fn dry_run<S: StackConfiguration>(&self, config: &S) -> Result<PathBuf> {
        let template = config.template()?;

        fs::create_dir_all(&self.dry_run_dir).await?;
        let path = std::path::absolute(
            self.dry_run_dir
                .join(format!("{}-template.yaml", config.stack_name())),
        )?;
        fs::write(&path, template).await?;

        debug!("Wrote dry-run template to {}", path.display());
        Ok(path)
    }

    async fn create_from<S: StackConfiguration>(
        &self,
        config: &S,
        existing: Option<&StackDescription>,
        template: String,
    ) -> Result<ChangeSetOutcome> {
        let stack_name = config.stack_name();

        if let Some(stack) = existing {
            if stack.status.in_progress() {
                return Err(update_in_progress(stack));
            }
            if !stack.status.requires_cleanup() {
                return Err(StackError::AlreadyExists {
                    stack_name,
                    status: stack.status.to_string(),
                }
                .into());
            }

            warn!(
                "Stack {stack_name} is in status {}, deleting it before creating it again",
                stack.status
            );
            self.delete(stack.id_or_name()).await?;
        }

        info!("Creating stack {stack_name}");
        self.deploy_change_set(config, ChangeSetType::Create, template)
            .await
    }

    async fn update_from<S: StackConfiguration>(
        &self,
        config: &S,
        stack: &StackDescription,
        template: String,
    ) -> Result<ChangeSetOutcome> {
        if stack.status.in_progress() {
            return Err(update_in_progress(stack));
        }

        info!("Updating stack {} (status {})", stack.stack_name, stack.status);
        self.deploy_change_set(config, ChangeSetType::Update, template)
            .await
    }

    async fn deploy_change_set<S: StackConfiguration>(
        &self,
        config: &S,
        change_set_type: ChangeSetType,
        template: String,
    ) -> Result<ChangeSetOutcome> {
        let input = ChangeSetController::<C>::input(
            &config.stack_name(),
            change_set_type,
            template,
            config.parameters(),
            config.tags(),
        );
        ChangeSetController::new(&self.client, self.waiter)
            .deploy(&input)
            .await
    }

    async fn wait(&self, stack_name: &str, operation: StackOperation) -> Result<StackDescription> {
        self.waiter
            .wait_for_stack(&self.client, stack_name, operation)
            .await?
            .ok_or_else(|| {
                StackError::NotFound {
                    stack_name: stack_name.to_string(),
                }
                .into()
            })
    }
}

fn update_in_progress(stack: &StackDescription) -> OamError {
    StackError::UpdateInProgress {
        stack_name: stack.stack_name.clone(),
        status: stack.status.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudformation::client::MockCloudFormationApi;
    use crate::cloudformation::types::{
        ChangeSetDescription, ChangeSetHandle, ChangeSetInput, ChangeSetStatus,
    };
    use crate::error::TemplateError;
    use crate::stack::KeyValue;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A stack configuration with a fixed template.
    struct FixedStack {
        template: Option<String>,
    }

    impl FixedStack {
        fn new(template: &str) -> Self {
            Self {
                template: Some(template.to_string()),
            }
        }
    }

    impl StackConfiguration for FixedStack {
        type Output = (String, BTreeMap<String, String>);

        fn stack_name(&self) -> String {
            String::from("oam-ecs-shop-web")
        }

        fn template(&self) -> std::result::Result<String, TemplateError> {
            self.template.clone().ok_or_else(|| TemplateError::NotFound {
                location: String::from("core.oam.dev/cf.yml"),
            })
        }

        fn parameters(&self) -> Vec<KeyValue> {
            Vec::new()
        }

        fn tags(&self) -> Vec<KeyValue> {
            vec![KeyValue::new("oam-ecs-environment", "default")]
        }

        fn to_result(&self, stack: &StackDescription) -> Self::Output {
            (self.stack_name(), stack.outputs.clone())
        }
    }

    #[derive(Default)]
    struct State {
        stack: Option<StackDescription>,
        template: Option<String>,
        pending: Option<ChangeSetInput>,
        calls: Vec<String>,
    }

    /// In-memory CloudFormation: operations complete instantly and a change
    /// set with an identical template has no changes.
    #[derive(Default)]
    struct SimulatedCloudFormation {
        state: Mutex<State>,
    }

    impl SimulatedCloudFormation {
        fn with_stack(stack: StackDescription, template: &str) -> Self {
            let sim = Self::default();
            {
                let mut state = sim.state.lock().unwrap();
                state.stack = Some(stack);
                state.template = Some(template.to_string());
            }
            sim
        }

        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        fn mutating_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("Describe"))
                .collect()
        }
    }

    #[async_trait]
    impl CloudFormationApi for SimulatedCloudFormation {
        async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("DescribeStacks {stack_name}"));
            Ok(state.stack.clone())
        }

        async fn create_change_set(&self, input: &ChangeSetInput) -> Result<ChangeSetHandle> {
            let mut state = self.state.lock().unwrap();
            state
                .calls
                .push(format!("CreateChangeSet {}", input.change_set_type));
            state.pending = Some(input.clone());
            Ok(ChangeSetHandle {
                id: input.change_set_name.clone(),
                stack_id: String::from("arn:stack/oam-ecs-shop-web/1"),
            })
        }

        async fn describe_change_set(
            &self,
            _change_set: &ChangeSetHandle,
        ) -> Result<ChangeSetDescription> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(String::from("DescribeChangeSet"));
            let unchanged = state.pending.as_ref().map(|p| &p.template_body) == state.template.as_ref();
            Ok(if unchanged {
                ChangeSetDescription {
                    status: ChangeSetStatus::Failed,
                    status_reason: Some(String::from(
                        "The submitted information didn't contain changes.",
                    )),
                    change_count: 0,
                }
            } else {
                ChangeSetDescription {
                    status: ChangeSetStatus::CreateComplete,
                    status_reason: None,
                    change_count: 1,
                }
            })
        }

        async fn execute_change_set(&self, _change_set: &ChangeSetHandle) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(String::from("ExecuteChangeSet"));
            let input = state.pending.take().ok_or_else(|| {
                StackError::provider("ExecuteChangeSet", "oam-ecs-shop-web", "no change set")
            })?;
            let status = match input.change_set_type {
                ChangeSetType::Create => StackStatus::CreateComplete,
                ChangeSetType::Update => StackStatus::UpdateComplete,
            };
            state.stack = Some(
                StackDescription::new(&input.stack_name, status)
                    .with_id("arn:stack/oam-ecs-shop-web/1")
                    .with_output("Template", input.template_body.clone()),
            );
            state.template = Some(input.template_body);
            Ok(())
        }

        async fn delete_change_set(&self, _change_set: &ChangeSetHandle) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(String::from("DeleteChangeSet"));
            state.pending = None;
            Ok(())
        }

        async fn delete_stack(&self, stack_name: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("DeleteStack {stack_name}"));
            state.stack = None;
            state.template = None;
            Ok(())
        }
    }

    fn orchestrator<C: CloudFormationApi>(client: C) -> CloudFormation<C> {
        CloudFormation::new(client).with_waiter(Waiter::new(Duration::ZERO, 5))
    }

    fn existing(status: StackStatus) -> StackDescription {
        StackDescription::new("oam-ecs-shop-web", status)
            .with_id("arn:stack/oam-ecs-shop-web/0")
            .with_output("Template", "v1")
    }

    #[tokio::test]
    async fn test_reconcile_creates_absent_stack() {
        let cf = orchestrator(SimulatedCloudFormation::default());

        let (name, outputs) = cf.reconcile(&FixedStack::new("v1")).await.unwrap();
        assert_eq!(name, "oam-ecs-shop-web");
        assert_eq!(outputs["Template"], "v1");
        assert_eq!(
            cf.client().mutating_calls(),
            vec!["CreateChangeSet CREATE", "ExecuteChangeSet"]
        );
    }

    #[tokio::test]
    async fn test_reconcile_updates_existing_stack() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::CreateComplete), "v1");
        let cf = orchestrator(sim);

        let (_, outputs) = cf.reconcile(&FixedStack::new("v2")).await.unwrap();
        assert_eq!(outputs["Template"], "v2");
        assert_eq!(
            cf.client().mutating_calls(),
            vec!["CreateChangeSet UPDATE", "ExecuteChangeSet"]
        );
    }

    #[tokio::test]
    async fn test_reconcile_unchanged_stack_is_a_no_op() {
        let sim =
            SimulatedCloudFormation::with_stack(existing(StackStatus::UpdateRollbackComplete), "v1");
        let cf = orchestrator(sim);

        let (_, outputs) = cf.reconcile(&FixedStack::new("v1")).await.unwrap();
        assert_eq!(outputs["Template"], "v1");
        assert_eq!(
            cf.client().mutating_calls(),
            vec!["CreateChangeSet UPDATE", "DeleteChangeSet"]
        );
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let cf = orchestrator(SimulatedCloudFormation::default());
        let config = FixedStack::new("v1");

        let first = cf.reconcile(&config).await.unwrap();
        let second = cf.reconcile(&config).await.unwrap();
        assert_eq!(first, second);
        assert!(!cf.client().calls().contains(&String::from("DeleteStack oam-ecs-shop-web")));
    }

    #[tokio::test]
    async fn test_reconcile_cleans_up_failed_creation() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::RollbackComplete), "v0");
        let cf = orchestrator(sim);

        let (_, outputs) = cf.reconcile(&FixedStack::new("v1")).await.unwrap();
        assert_eq!(outputs["Template"], "v1");
        assert_eq!(
            cf.client().mutating_calls(),
            vec![
                "DeleteStack arn:stack/oam-ecs-shop-web/0",
                "CreateChangeSet CREATE",
                "ExecuteChangeSet"
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_in_progress_makes_no_mutating_call() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stack()
            .times(1)
            .returning(|_| Ok(Some(existing(StackStatus::UpdateInProgress))));
        api.expect_create_change_set().never();
        api.expect_execute_change_set().never();
        api.expect_delete_stack().never();

        let err = orchestrator(api)
            .reconcile(&FixedStack::new("v1"))
            .await
            .unwrap_err();
        assert!(err.is_update_in_progress());
        assert!(err.to_string().contains("UPDATE_IN_PROGRESS"));
    }

    #[tokio::test]
    async fn test_template_errors_stop_before_remote_calls() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stack().never();

        let err = orchestrator(api)
            .reconcile(&FixedStack { template: None })
            .await
            .unwrap_err();
        assert!(matches!(err, OamError::Template(TemplateError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_healthy_stack() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::UpdateComplete), "v1");
        let cf = orchestrator(sim);

        let err = cf.create(&FixedStack::new("v2")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(cf.client().mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_existing_stack() {
        let cf = orchestrator(SimulatedCloudFormation::default());

        let err = cf.update(&FixedStack::new("v1")).await.unwrap_err();
        assert!(err.is_stack_not_found());
    }

    #[tokio::test]
    async fn test_update_starts_change_set() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::CreateComplete), "v1");
        let cf = orchestrator(sim);

        let outcome = cf.update(&FixedStack::new("v2")).await.unwrap();
        assert!(outcome.is_executed());
    }

    #[tokio::test]
    async fn test_describe_result_maps_outputs() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::CreateComplete), "v1");
        let cf = orchestrator(sim);

        let (_, outputs) = cf.describe_result(&FixedStack::new("v1")).await.unwrap();
        assert_eq!(outputs["Template"], "v1");

        let err = orchestrator(SimulatedCloudFormation::default())
            .describe_result(&FixedStack::new("v1"))
            .await
            .unwrap_err();
        assert!(err.is_stack_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_stack_succeeds() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stack().returning(|_| Ok(None));
        api.expect_delete_stack().never();

        let (name, outputs) = orchestrator(api)
            .delete_result(&FixedStack::new("v1"))
            .await
            .unwrap();
        assert_eq!(name, "oam-ecs-shop-web");
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_delete_existing_stack_by_id() {
        let sim = SimulatedCloudFormation::with_stack(existing(StackStatus::UpdateComplete), "v1");
        let cf = orchestrator(sim);

        let (_, outputs) = cf.delete_result(&FixedStack::new("v1")).await.unwrap();
        assert_eq!(outputs["Template"], "v1");
        assert_eq!(
            cf.client().mutating_calls(),
            vec!["DeleteStack arn:stack/oam-ecs-shop-web/0"]
        );
    }

    #[tokio::test]
    async fn test_delete_surfaces_provider_errors() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stack().returning(|_| {
            Err(StackError::provider("DescribeStacks", "oam-ecs-shop-web", "access denied").into())
        });

        let err = orchestrator(api)
            .delete_result(&FixedStack::new("v1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_template_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stack().never();
        let cf = orchestrator(api).with_dry_run_dir(dir.path().join("results"));

        let first = cf.dry_run(&FixedStack::new("v1")).await.unwrap();
        let second = cf.dry_run(&FixedStack::new("v1")).await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_absolute());
        assert!(first.ends_with("results/oam-ecs-shop-web-template.yaml"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "v1");
    }
}
