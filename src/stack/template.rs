//! Embedded CloudFormation templates and their rendering.
//!
//! Templates are handlebars documents compiled into the binary. Rendering
//! runs in strict mode and exposes helpers that derive ECS settings from the
//! OAM model. Interpolated text goes inside single-quoted YAML scalars, so
//! the only escaping applied is doubling single quotes.

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason, handlebars_helper,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::TemplateError;
use crate::oam::{ComponentConfiguration, Container};

use super::fargate;

/// Location of the component instance template.
pub const COMPONENT_TEMPLATE_PATH: &str = "core.oam.dev/cf.yml";

/// Location of the environment template.
pub const ENVIRONMENT_TEMPLATE_PATH: &str = "environment/cf.yml";

const COMPONENT_TEMPLATE: &str = include_str!("../../templates/core.oam.dev/cf.yml");
const ENVIRONMENT_TEMPLATE: &str = include_str!("../../templates/environment/cf.yml");

/// In-memory lookup of template sources by location.
#[derive(Debug, Clone)]
pub struct TemplateBox {
    sources: BTreeMap<String, String>,
}

impl Default for TemplateBox {
    fn default() -> Self {
        Self::empty()
            .with_template(COMPONENT_TEMPLATE_PATH, COMPONENT_TEMPLATE)
            .with_template(ENVIRONMENT_TEMPLATE_PATH, ENVIRONMENT_TEMPLATE)
    }
}

impl TemplateBox {
    /// Creates a box holding the embedded templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a box with no templates.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Adds or replaces a template.
    #[must_use]
    pub fn with_template(mut self, location: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(location.into(), source.into());
        self
    }

    /// Finds a template source.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::NotFound` if nothing is stored at the location.
    pub fn find(&self, location: &str) -> Result<&str, TemplateError> {
        self.sources
            .get(location)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::NotFound {
                location: location.to_string(),
            })
    }
}

/// Renders a template source against serializable data.
///
/// # Errors
///
/// Returns an error if the source does not parse or a value cannot be
/// resolved while rendering.
pub fn render<T: Serialize>(location: &str, source: &str, data: &T) -> Result<String, TemplateError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(escape_single_quoted);
    register_helpers(&mut registry);

    registry
        .register_template_string(location, source)
        .map_err(|e| TemplateError::Parse {
            location: location.to_string(),
            message: e.to_string(),
        })?;

    let rendered = registry
        .render(location, data)
        .map_err(|e| TemplateError::Render {
            location: location.to_string(),
            message: e.to_string(),
        })?;

    debug!("Rendered template {location} ({} bytes)", rendered.len());
    Ok(rendered)
}

/// Escapes text for a single-quoted YAML scalar.
#[must_use]
pub fn escape_single_quoted(text: &str) -> String {
    text.replace('\'', "''")
}

fn register_helpers(registry: &mut Handlebars<'_>) {
    registry.register_helper("resolve_parameter", Box::new(resolve_parameter_helper));
    registry.register_helper("resolve_trait", Box::new(resolve_trait_helper));
    registry.register_helper("requires_volumes", Box::new(requires_volumes_helper));
    registry.register_helper(
        "requires_private_registry_auth",
        Box::new(requires_private_registry_auth_helper),
    );
    registry.register_helper(
        "health_check_grace_period",
        Box::new(health_check_grace_period_helper),
    );
    registry.register_helper("task_cpu", Box::new(task_cpu_helper));
    registry.register_helper("task_memory", Box::new(task_memory_helper));
    registry.register_helper("lowercase", Box::new(lowercase_helper));
}

/// Finds the value of a named parameter on a component instance.
///
/// # Errors
///
/// Returns `TemplateError::MissingParameter` if the instance sets no value.
pub fn resolve_parameter_value<'a>(
    instance: &'a ComponentConfiguration,
    name: &str,
) -> Result<&'a str, TemplateError> {
    instance
        .parameter_value(name)
        .ok_or_else(|| TemplateError::MissingParameter {
            name: name.to_string(),
            instance: instance.instance_name.clone(),
        })
}

/// Reads a numeric trait property, falling back to `default` when the trait
/// or the property is absent or not a number.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn resolve_trait_value(
    instance: &ComponentConfiguration,
    trait_name: &str,
    property: &str,
    default: i64,
) -> i64 {
    instance
        .find_trait(trait_name)
        .and_then(|t| t.properties.get(property))
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.trunc() as i64)))
        .unwrap_or(default)
}

/// Returns true if any container mounts a volume.
#[must_use]
pub fn requires_volumes(containers: &[Container]) -> bool {
    containers.iter().any(|c| !c.resources.volumes.is_empty())
}

/// Returns the distinct volume names mounted by the containers, in order of
/// first mount.
#[must_use]
pub fn volume_names(containers: &[Container]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    containers
        .iter()
        .flat_map(|c| &c.resources.volumes)
        .map(|v| v.name.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Returns true if any container exposes a port.
#[must_use]
pub fn has_ports(containers: &[Container]) -> bool {
    containers.iter().any(|c| !c.ports.is_empty())
}

/// Returns true if any container pulls from a private registry.
#[must_use]
pub fn requires_private_registry_auth(containers: &[Container]) -> bool {
    containers
        .iter()
        .any(|c| c.image_pull_secret.as_deref().is_some_and(|s| !s.is_empty()))
}

/// Returns the longest initial delay among HTTP and TCP liveness probes.
#[must_use]
pub fn health_check_grace_period(containers: &[Container]) -> u32 {
    containers
        .iter()
        .filter_map(|c| c.liveness_probe.as_ref())
        .filter(|p| p.is_network_probe())
        .map(|p| p.initial_delay_seconds)
        .max()
        .unwrap_or(0)
}

// Boolean and numeric helpers are declared through the macro so they also
// work as subexpressions, e.g. `{{#if (requires_volumes ...)}}`.
handlebars_helper!(requires_volumes_helper: |containers: Json| {
    requires_volumes(&from_json::<Vec<Container>>(containers))
});

handlebars_helper!(requires_private_registry_auth_helper: |containers: Json| {
    requires_private_registry_auth(&from_json::<Vec<Container>>(containers))
});

handlebars_helper!(health_check_grace_period_helper: |containers: Json| {
    health_check_grace_period(&from_json::<Vec<Container>>(containers))
});

handlebars_helper!(resolve_trait_helper: |trait_name: str, property: str, default: i64, instance: Json| {
    resolve_trait_value(&from_json::<ComponentConfiguration>(instance), trait_name, property, default)
});

handlebars_helper!(lowercase_helper: |value: str| value.to_lowercase());

fn from_json<T: DeserializeOwned + Default>(value: &serde_json::Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn param<T: DeserializeOwned>(
    h: &Helper<'_>,
    index: usize,
    helper: &'static str,
) -> Result<T, RenderError> {
    let value = h
        .param(index)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(helper, index))?
        .value();
    serde_json::from_value(value.clone())
        .map_err(|e| RenderErrorReason::Other(format!("{helper}: invalid argument {index}: {e}")).into())
}

fn resolve_parameter_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let name: String = param(h, 0, "resolve_parameter")?;
    let instance: ComponentConfiguration = param(h, 1, "resolve_parameter")?;
    let value = resolve_parameter_value(&instance, &name)
        .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
    out.write(&escape_single_quoted(value))?;
    Ok(())
}

fn task_cpu_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let containers: Vec<Container> = param(h, 0, "task_cpu")?;
    let size = fargate::nearest_task_size(&containers)
        .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
    out.write(&size.cpu_value())?;
    Ok(())
}

fn task_memory_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let containers: Vec<Container> = param(h, 0, "task_memory")?;
    let size = fargate::nearest_task_size(&containers)
        .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
    out.write(&size.memory_value())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> ComponentConfiguration {
        serde_yaml::from_str(
            r"
componentName: api
instanceName: api-v1
parameterValues:
  - name: image
    value: nginx
traits:
  - name: manual-scaler
    properties:
      replicaCount: 3
",
        )
        .unwrap()
    }

    fn containers() -> Vec<Container> {
        serde_yaml::from_str(
            r#"
- name: web
  image: nginx
  imagePullSecret: registry-creds
  resources:
    cpu:
      required: 0.5
    memory:
      required: 1Gi
    volumes:
      - name: cache
        mountPath: /cache
  livenessProbe:
    httpGet:
      path: /
      port: 80
    initialDelaySeconds: 45
- name: sidecar
  image: busybox
  livenessProbe:
    exec:
      command: ["true"]
    initialDelaySeconds: 90
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_template_box_lookup() {
        let templates = TemplateBox::new();
        assert!(templates.find(COMPONENT_TEMPLATE_PATH).is_ok());
        assert!(templates.find(ENVIRONMENT_TEMPLATE_PATH).is_ok());

        let err = TemplateBox::empty().find(COMPONENT_TEMPLATE_PATH).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
        assert!(err.to_string().contains(COMPONENT_TEMPLATE_PATH));
    }

    #[test]
    fn test_template_functions() {
        let instance = instance();
        assert_eq!(resolve_parameter_value(&instance, "image").unwrap(), "nginx");
        assert!(matches!(
            resolve_parameter_value(&instance, "tag"),
            Err(TemplateError::MissingParameter { .. })
        ));

        assert_eq!(resolve_trait_value(&instance, "manual-scaler", "replicaCount", 1), 3);
        assert_eq!(resolve_trait_value(&instance, "manual-scaler", "other", 1), 1);
        assert_eq!(resolve_trait_value(&instance, "auto-scaler", "replicaCount", 2), 2);

        let containers = containers();
        assert!(requires_volumes(&containers));
        assert!(requires_private_registry_auth(&containers));
        assert_eq!(health_check_grace_period(&containers), 45);
        assert!(!requires_volumes(&containers[1..]));
        assert!(!has_ports(&containers));
        assert_eq!(health_check_grace_period(&containers[1..]), 0);
    }

    #[test]
    fn test_volume_names_are_distinct() {
        let mut containers = containers();
        let cache = containers[0].resources.volumes[0].clone();
        let scratch = crate::oam::Volume {
            name: String::from("scratch"),
            ..cache.clone()
        };
        containers[1].resources.volumes = vec![cache, scratch];

        assert_eq!(volume_names(&containers), vec!["cache", "scratch"]);
        assert!(volume_names(&containers[..0]).is_empty());
    }

    #[test]
    fn test_render_with_helpers() {
        let source = "cpu={{task_cpu containers}} memory={{task_memory containers}} \
            replicas={{resolve_trait \"manual-scaler\" \"replicaCount\" 1 instance}} \
            image={{resolve_parameter \"image\" instance}} \
            grace={{health_check_grace_period containers}}\
            {{#if (requires_volumes containers)}} volumes{{/if}}";
        let data = json!({ "containers": containers(), "instance": instance() });

        let rendered = render("test", source, &data).unwrap();
        assert_eq!(
            rendered,
            "cpu=0.50 vcpu memory=1024 replicas=3 image=nginx grace=45 volumes"
        );
    }

    #[test]
    fn test_render_escapes_only_single_quotes() {
        let rendered = render("test", "'{{value}}'", &json!({ "value": "a&b<c> it's" })).unwrap();
        assert_eq!(rendered, "'a&b<c> it''s'");
    }

    #[test]
    fn test_render_missing_parameter_fails() {
        let data = json!({ "instance": instance() });
        let err = render("test", "{{resolve_parameter \"port\" instance}}", &data).unwrap_err();
        match err {
            TemplateError::Render { message, .. } => {
                assert!(message.contains("Could not find parameter value for name port"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_strict_mode_rejects_missing_fields() {
        let err = render("test", "{{missing.field}}", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }
}
