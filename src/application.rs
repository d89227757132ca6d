//! Per-application deployment driver.
//!
//! Component instances are processed one at a time in document order. The
//! first failure stops the run; instances already deployed stay deployed.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::cloudformation::{CloudFormation, CloudFormationApi};
use crate::error::Result;
use crate::oam::{ApplicationConfiguration, OamWorkload};
use crate::stack::{
    Component, ComponentStackConfig, EnvStackConfig, Environment, StackConfiguration, TemplateBox,
};

/// What `apply` did for one component instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "mode")]
pub enum ApplyOutcome {
    /// The template was written locally.
    DryRun {
        /// Component instance name.
        instance_name: String,
        /// Stack the template is for.
        stack_name: String,
        /// Absolute path of the written template.
        template_path: PathBuf,
    },
    /// The stack was created or updated.
    Deployed {
        /// Component instance name.
        instance_name: String,
        /// Deployed stack name.
        stack_name: String,
        /// Stack outputs keyed by output name.
        stack_outputs: BTreeMap<String, String>,
    },
}

impl ApplyOutcome {
    /// Returns the component instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        match self {
            Self::DryRun { instance_name, .. } | Self::Deployed { instance_name, .. } => {
                instance_name
            }
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        match self {
            Self::DryRun { stack_name, .. } | Self::Deployed { stack_name, .. } => stack_name,
        }
    }
}

/// Deploys, describes and deletes applications and the shared environment.
pub struct ApplicationDeployer<C: CloudFormationApi> {
    cloudformation: CloudFormation<C>,
    templates: TemplateBox,
}

impl<C: CloudFormationApi> ApplicationDeployer<C> {
    /// Creates a driver over an orchestrator.
    #[must_use]
    pub fn new(cloudformation: CloudFormation<C>) -> Self {
        Self {
            cloudformation,
            templates: TemplateBox::default(),
        }
    }

    /// Uses a custom template box.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateBox) -> Self {
        self.templates = templates;
        self
    }

    /// Returns the orchestrator.
    #[must_use]
    pub const fn cloudformation(&self) -> &CloudFormation<C> {
        &self.cloudformation
    }

    /// Deploys every component instance of a workload, or writes their
    /// templates when `dry_run` is set.
    ///
    /// # Errors
    ///
    /// Returns the first template, stack or IO error; later instances are
    /// not processed.
    pub async fn apply(&self, workload: &OamWorkload, dry_run: bool) -> Result<Vec<ApplyOutcome>> {
        let application = &workload.application;
        let mut outcomes = Vec::with_capacity(application.components().len());

        for instance in application.components() {
            let config = ComponentStackConfig::new(
                application,
                instance,
                workload.schematic(&instance.component_name),
            )
            .with_templates(self.templates.clone());
            let stack_name = config.stack_name();

            let outcome = if dry_run {
                let template_path = self.cloudformation.dry_run(&config).await?;
                info!(
                    "Wrote template for component instance {} to {}",
                    instance.instance_name,
                    template_path.display()
                );
                ApplyOutcome::DryRun {
                    instance_name: instance.instance_name.clone(),
                    stack_name,
                    template_path,
                }
            } else {
                info!(
                    "Deploying component instance {} to stack {stack_name}",
                    instance.instance_name
                );
                let component = self.cloudformation.reconcile(&config).await?;
                ApplyOutcome::Deployed {
                    instance_name: instance.instance_name.clone(),
                    stack_name: component.stack_name,
                    stack_outputs: component.stack_outputs,
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Describes the stack of every component instance.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` for the first instance without a
    /// stack, or a provider error.
    pub async fn show(&self, application: &ApplicationConfiguration) -> Result<Vec<Component>> {
        let mut components = Vec::with_capacity(application.components().len());
        for instance in application.components() {
            let config = ComponentStackConfig::new(application, instance, None);
            components.push(self.cloudformation.describe_result(&config).await?);
        }
        Ok(components)
    }

    /// Deletes the stack of every component instance.
    ///
    /// Instances without a stack are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first provider or wait error.
    pub async fn delete(&self, application: &ApplicationConfiguration) -> Result<Vec<Component>> {
        let mut components = Vec::with_capacity(application.components().len());
        for instance in application.components() {
            let config = ComponentStackConfig::new(application, instance, None);
            info!(
                "Deleting component instance {} (stack {})",
                instance.instance_name,
                config.stack_name()
            );
            components.push(self.cloudformation.delete_result(&config).await?);
        }
        Ok(components)
    }

    /// Creates or updates the shared environment.
    ///
    /// # Errors
    ///
    /// Returns a template, stack or provider error.
    pub async fn deploy_environment(&self) -> Result<Environment> {
        info!("Deploying environment");
        self.cloudformation.reconcile(&self.environment()).await
    }

    /// Describes the shared environment.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if the environment is not deployed, or
    /// a provider error.
    pub async fn show_environment(&self) -> Result<Environment> {
        self.cloudformation.describe_result(&self.environment()).await
    }

    /// Deletes the shared environment.
    ///
    /// # Errors
    ///
    /// Returns a provider or wait error.
    pub async fn delete_environment(&self) -> Result<Environment> {
        info!("Deleting environment");
        self.cloudformation.delete_result(&self.environment()).await
    }

    fn environment(&self) -> EnvStackConfig {
        EnvStackConfig::new().with_templates(self.templates.clone())
    }
}
