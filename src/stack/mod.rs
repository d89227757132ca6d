//! Stack configurations: what gets deployed and how results are read back.
//!
//! This module provides:
//! - The [`StackConfiguration`] capability shared by every deployable stack
//! - Component instance and environment stack configurations
//! - Embedded templates and their rendering
//! - Fargate task sizing

mod component;
mod environment;
mod fargate;
mod template;

use serde::Serialize;

use crate::cloudformation::StackDescription;
use crate::error::TemplateError;

pub use component::{Component, ComponentStackConfig, STACK_NAME_MAX_LEN};
pub use environment::{ENVIRONMENT_NAME, ENVIRONMENT_STACK_NAME, EnvStackConfig, Environment};
pub use fargate::{FargateTaskSize, nearest_task_size, size_for, total_requirements, valid_task_sizes};
pub use template::{
    COMPONENT_TEMPLATE_PATH, ENVIRONMENT_TEMPLATE_PATH, TemplateBox, escape_single_quoted,
    has_ports, health_check_grace_period, render, requires_private_registry_auth, requires_volumes,
    resolve_parameter_value, resolve_trait_value, volume_names,
};

/// Prefix of every stack name created by this tool.
pub const STACK_NAME_PREFIX: &str = "oam-ecs";

/// Tag key carrying the environment name.
pub const ENVIRONMENT_TAG_KEY: &str = "oam-ecs-environment";

/// The only environment name.
pub const ENVIRONMENT_TAG_VALUE: &str = "default";

/// Tag key carrying the application name.
pub const APPLICATION_TAG_KEY: &str = "oam-ecs-application";

/// Tag key carrying the component instance name.
pub const COMPONENT_TAG_KEY: &str = "oam-ecs-component";

/// A key/value pair, used for stack parameters and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValue {
    /// Key.
    pub key: String,
    /// Value.
    pub value: String,
}

impl KeyValue {
    /// Creates a pair.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Something that can be deployed as a CloudFormation stack.
pub trait StackConfiguration: Send + Sync {
    /// Domain result built from a remote stack.
    type Output: Send;

    /// Returns the deterministic stack name.
    fn stack_name(&self) -> String;

    /// Renders the stack template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be found or rendered.
    fn template(&self) -> Result<String, TemplateError>;

    /// Returns the template parameters.
    fn parameters(&self) -> Vec<KeyValue>;

    /// Returns the stack tags.
    fn tags(&self) -> Vec<KeyValue>;

    /// Builds the domain result from a remote stack.
    fn to_result(&self, stack: &StackDescription) -> Self::Output;
}
