//! Stack configuration for one component instance.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::cloudformation::StackDescription;
use crate::error::TemplateError;
use crate::oam::{ApplicationConfiguration, ComponentConfiguration, ComponentSchematic, WorkloadType};

use super::environment::{ENVIRONMENT_NAME, ENVIRONMENT_STACK_NAME};
use super::template::{COMPONENT_TEMPLATE_PATH, TemplateBox, has_ports, render, volume_names};
use super::{
    APPLICATION_TAG_KEY, COMPONENT_TAG_KEY, ENVIRONMENT_TAG_KEY, ENVIRONMENT_TAG_VALUE, KeyValue,
    STACK_NAME_PREFIX, StackConfiguration,
};

/// Longest stack name CloudFormation accepts.
pub const STACK_NAME_MAX_LEN: usize = 128;

/// A deployed component instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Stack name.
    pub stack_name: String,
    /// Stack outputs keyed by output name.
    pub stack_outputs: BTreeMap<String, String>,
}

/// Provides everything CloudFormation needs to deploy a component instance.
#[derive(Debug, Clone)]
pub struct ComponentStackConfig<'a> {
    application: &'a ApplicationConfiguration,
    instance: &'a ComponentConfiguration,
    schematic: Option<&'a ComponentSchematic>,
    templates: TemplateBox,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateData<'a> {
    stack_name: String,
    workload_type: &'static str,
    /// Server workloads with at least one port sit behind a load balancer.
    load_balanced: bool,
    /// Task volumes, one per distinct name.
    volumes: Vec<&'a str>,
    application: &'a ApplicationConfiguration,
    instance: &'a ComponentConfiguration,
    component: &'a ComponentSchematic,
    environment: EnvironmentData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentData {
    name: &'static str,
    stack_name: &'static str,
}

impl<'a> ComponentStackConfig<'a> {
    /// Creates a configuration for a component instance.
    ///
    /// The schematic is only needed to render the template; describing or
    /// deleting the stack works without it.
    #[must_use]
    pub fn new(
        application: &'a ApplicationConfiguration,
        instance: &'a ComponentConfiguration,
        schematic: Option<&'a ComponentSchematic>,
    ) -> Self {
        Self {
            application,
            instance,
            schematic,
            templates: TemplateBox::default(),
        }
    }

    /// Uses a custom template box.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateBox) -> Self {
        self.templates = templates;
        self
    }

    /// Returns the component instance.
    #[must_use]
    pub const fn instance(&self) -> &ComponentConfiguration {
        self.instance
    }
}

impl StackConfiguration for ComponentStackConfig<'_> {
    type Output = Component;

    fn stack_name(&self) -> String {
        let name = format!(
            "{STACK_NAME_PREFIX}-{}-{}",
            self.application.name(),
            self.instance.instance_name
        );
        if name.len() <= STACK_NAME_MAX_LEN {
            return name;
        }
        // Keep the rightmost characters, which carry the instance name.
        let mut start = name.len() - STACK_NAME_MAX_LEN;
        while !name.is_char_boundary(start) {
            start += 1;
        }
        name[start..].to_string()
    }

    fn template(&self) -> Result<String, TemplateError> {
        let source = self.templates.find(COMPONENT_TEMPLATE_PATH)?;
        let component = self.schematic.ok_or_else(|| TemplateError::MissingSchematic {
            instance: self.instance.instance_name.clone(),
        })?;

        let workload_type = component.workload_type();
        let containers = &component.spec.containers;
        let data = TemplateData {
            stack_name: self.stack_name(),
            workload_type: workload_type.map_or("Unsupported", |t| t.short_name()),
            load_balanced: workload_type == Some(WorkloadType::Server) && has_ports(containers),
            volumes: volume_names(containers),
            application: self.application,
            instance: self.instance,
            component,
            environment: EnvironmentData {
                name: ENVIRONMENT_NAME,
                stack_name: ENVIRONMENT_STACK_NAME,
            },
        };

        render(COMPONENT_TEMPLATE_PATH, source, &data)
    }

    fn parameters(&self) -> Vec<KeyValue> {
        Vec::new()
    }

    fn tags(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(COMPONENT_TAG_KEY, &self.instance.instance_name),
            KeyValue::new(APPLICATION_TAG_KEY, self.application.name()),
            KeyValue::new(ENVIRONMENT_TAG_KEY, ENVIRONMENT_TAG_VALUE),
        ]
    }

    fn to_result(&self, stack: &StackDescription) -> Component {
        Component {
            stack_name: self.stack_name(),
            stack_outputs: stack.outputs.clone(),
        }
    }
}
