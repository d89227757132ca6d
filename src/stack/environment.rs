//! Stack configuration for the shared environment.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::cloudformation::StackDescription;
use crate::error::TemplateError;

use super::template::{ENVIRONMENT_TEMPLATE_PATH, TemplateBox};
use super::{ENVIRONMENT_TAG_KEY, ENVIRONMENT_TAG_VALUE, KeyValue, StackConfiguration};

/// Name of the environment as seen by component templates.
pub const ENVIRONMENT_NAME: &str = "oam-ecs";

/// Name of the singleton environment stack.
pub const ENVIRONMENT_STACK_NAME: &str = "oam-ecs-environment-default";

/// The deployed environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Stack name.
    pub stack_name: String,
    /// Stack outputs keyed by output name.
    pub stack_outputs: BTreeMap<String, String>,
}

/// Provides everything CloudFormation needs to deploy the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvStackConfig {
    templates: TemplateBox,
}

impl EnvStackConfig {
    /// Creates the environment configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom template box.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateBox) -> Self {
        self.templates = templates;
        self
    }
}

impl StackConfiguration for EnvStackConfig {
    type Output = Environment;

    fn stack_name(&self) -> String {
        ENVIRONMENT_STACK_NAME.to_string()
    }

    fn template(&self) -> Result<String, TemplateError> {
        self.templates
            .find(ENVIRONMENT_TEMPLATE_PATH)
            .map(str::to_string)
    }

    fn parameters(&self) -> Vec<KeyValue> {
        Vec::new()
    }

    fn tags(&self) -> Vec<KeyValue> {
        vec![KeyValue::new(ENVIRONMENT_TAG_KEY, ENVIRONMENT_TAG_VALUE)]
    }

    fn to_result(&self, stack: &StackDescription) -> Environment {
        Environment {
            stack_name: self.stack_name(),
            stack_outputs: stack.outputs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudformation::StackStatus;

    #[test]
    fn test_environment_stack_identity() {
        let config = EnvStackConfig::new();
        assert_eq!(config.stack_name(), format!("{ENVIRONMENT_TAG_KEY}-{ENVIRONMENT_TAG_VALUE}"));
        assert_eq!(config.tags(), vec![KeyValue::new("oam-ecs-environment", "default")]);
        assert!(config.parameters().is_empty());
    }

    #[test]
    fn test_environment_template_exports_imports() {
        let template = EnvStackConfig::new().template().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&template).unwrap();
        for output in ["ClusterName", "VpcId", "PublicSubnet1Id", "PublicSubnet2Id"] {
            assert!(parsed["Outputs"][output]["Export"].is_mapping(), "{output}");
        }
    }

    #[test]
    fn test_environment_template_not_found() {
        let err = EnvStackConfig::new()
            .with_templates(TemplateBox::empty())
            .template()
            .unwrap_err();
        assert!(err.to_string().contains(ENVIRONMENT_TEMPLATE_PATH));
    }

    #[test]
    fn test_to_result() {
        let stack = StackDescription::new(ENVIRONMENT_STACK_NAME, StackStatus::UpdateComplete)
            .with_output("ClusterName", "oam-ecs-cluster");
        let env = EnvStackConfig::new().to_result(&stack);
        assert_eq!(env.stack_name, ENVIRONMENT_STACK_NAME);
        assert_eq!(env.stack_outputs.len(), 1);
    }
}
