//! OAM `core.oam.dev/v1alpha1` document types.
//!
//! These structs map one-to-one onto the YAML documents users supply. They
//! are also serialized as the rendering context of stack templates, so
//! optional fields are kept as explicit nulls rather than skipped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::quantity::Quantity;

/// API version of every supported document.
pub const OAM_API_VERSION: &str = "core.oam.dev/v1alpha1";

/// Kind of the application configuration document.
pub const APPLICATION_CONFIGURATION_KIND: &str = "ApplicationConfiguration";

/// Kind of the component schematic document.
pub const COMPONENT_SCHEMATIC_KIND: &str = "ComponentSchematic";

/// Object metadata shared by all documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Free-form annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// The single document describing an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfiguration {
    /// Declared apiVersion.
    pub api_version: String,
    /// Declared kind.
    pub kind: String,
    /// Metadata; `metadata.name` is the application name.
    pub metadata: ObjectMeta,
    /// Component instances.
    #[serde(default)]
    pub spec: ApplicationConfigurationSpec,
}

/// Body of an application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfigurationSpec {
    /// Component instances, in document order.
    #[serde(default)]
    pub components: Vec<ComponentConfiguration>,
}

impl ApplicationConfiguration {
    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the component instances in document order.
    #[must_use]
    pub fn components(&self) -> &[ComponentConfiguration] {
        &self.spec.components
    }
}

/// A named instance of a component schematic within an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfiguration {
    /// Name of the referenced component schematic.
    pub component_name: String,
    /// Instance name, used in stack names and tags.
    pub instance_name: String,
    /// Values for the schematic's parameters.
    #[serde(default)]
    pub parameter_values: Vec<ParameterValue>,
    /// Traits attached to this instance.
    #[serde(default)]
    pub traits: Vec<TraitBinding>,
}

impl ComponentConfiguration {
    /// Looks up a parameter value by name.
    #[must_use]
    pub fn parameter_value(&self, name: &str) -> Option<&str> {
        self.parameter_values
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Looks up a trait by name.
    #[must_use]
    pub fn find_trait(&self, name: &str) -> Option<&TraitBinding> {
        self.traits.iter().find(|t| t.name == name)
    }
}

/// A named parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterValue {
    /// Parameter name.
    pub name: String,
    /// Parameter value; YAML scalars of any type are kept as text.
    #[serde(deserialize_with = "scalar_as_string")]
    pub value: String,
}

/// A trait attached to a component instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraitBinding {
    /// Trait name, e.g. `manual-scaler`.
    pub name: String,
    /// Trait properties.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Workload types this tool can deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadType {
    /// A long-running service reachable over the network.
    Server,
    /// A long-running background process with no inbound traffic.
    Worker,
}

impl WorkloadType {
    /// All supported workload types.
    pub const ALL: [Self; 2] = [Self::Server, Self::Worker];

    /// Returns the fully qualified workload type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "core.oam.dev/v1alpha1.Server",
            Self::Worker => "core.oam.dev/v1alpha1.Worker",
        }
    }

    /// Returns the unqualified type name, e.g. `Server`.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Server => "Server",
            Self::Worker => "Worker",
        }
    }

    /// Parses a fully qualified workload type string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Human-readable list of the supported types.
    #[must_use]
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reusable description of a workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSchematic {
    /// Declared apiVersion.
    pub api_version: String,
    /// Declared kind.
    pub kind: String,
    /// Metadata; `metadata.name` is the component name.
    pub metadata: ObjectMeta,
    /// Workload description.
    pub spec: ComponentSpec,
}

impl ComponentSchematic {
    /// Returns the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the parsed workload type, if supported.
    #[must_use]
    pub fn workload_type(&self) -> Option<WorkloadType> {
        WorkloadType::parse(&self.spec.workload_type)
    }

    /// Returns the first port number exposed by more than one port entry.
    ///
    /// Containers of a Fargate task share one network namespace, so a port
    /// number can be bound only once per schematic.
    #[must_use]
    pub fn duplicate_port(&self) -> Option<u16> {
        let mut seen = BTreeSet::new();
        self.spec
            .containers
            .iter()
            .flat_map(|c| &c.ports)
            .map(|p| p.container_port)
            .find(|port| !seen.insert(*port))
    }
}

/// Body of a component schematic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Fully qualified workload type.
    pub workload_type: String,
    /// Operating system the containers need.
    #[serde(default)]
    pub os_type: Option<String>,
    /// CPU architecture the containers need.
    #[serde(default)]
    pub arch: Option<String>,
    /// Parameters the schematic accepts.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Containers making up the workload.
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A parameter declared by a schematic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Parameter name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Declared type (string, number, boolean).
    #[serde(default, rename = "type")]
    pub parameter_type: Option<String>,
    /// Whether a value must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Default value.
    #[serde(default, deserialize_with = "optional_scalar_as_string")]
    pub default: Option<String>,
}

/// A container within a workload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Name of the secret holding private registry credentials.
    #[serde(default)]
    pub image_pull_secret: Option<String>,
    /// Entrypoint override.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables.
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Exposed ports.
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    /// Resource requirements.
    #[serde(default)]
    pub resources: Resources,
    /// Liveness probe.
    #[serde(default)]
    pub liveness_probe: Option<Probe>,
    /// Readiness probe.
    #[serde(default)]
    pub readiness_probe: Option<Probe>,
    /// Config files mounted into the container.
    #[serde(default)]
    pub config: Vec<ConfigFile>,
}

/// An environment variable, either literal or bound to a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Literal value.
    #[serde(default, deserialize_with = "optional_scalar_as_string")]
    pub value: Option<String>,
    /// Parameter supplying the value.
    #[serde(default)]
    pub from_param: Option<String>,
}

/// A container port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name.
    pub name: String,
    /// Port number.
    pub container_port: u16,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: PortProtocol,
}

/// Transport protocol of a container port.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortProtocol {
    /// `TCP`, the default.
    #[default]
    #[serde(rename = "TCP", alias = "tcp")]
    Tcp,
    /// `UDP`
    #[serde(rename = "UDP", alias = "udp")]
    Udp,
}

/// Container resource requirements.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// CPU requirement in cores.
    #[serde(default)]
    pub cpu: Option<ResourceRequirement>,
    /// Memory requirement in bytes.
    #[serde(default)]
    pub memory: Option<ResourceRequirement>,
    /// GPU requirement.
    #[serde(default)]
    pub gpu: Option<ResourceRequirement>,
    /// Volumes.
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Extended resources.
    #[serde(default)]
    pub extended: Vec<ExtendedResource>,
}

impl Resources {
    /// Required CPU in millicores, zero when unspecified.
    #[must_use]
    pub fn cpu_millicores(&self) -> u64 {
        self.cpu.as_ref().map_or(0, |r| r.required.milli_value())
    }

    /// Required memory in bytes, zero when unspecified.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        self.memory.as_ref().map_or(0, |r| r.required.value())
    }
}

/// A single required quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequirement {
    /// Required quantity.
    pub required: Quantity,
}

/// A volume mounted into a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name.
    pub name: String,
    /// Mount path inside the container.
    pub mount_path: String,
    /// RO or RW.
    #[serde(default)]
    pub access_mode: Option<String>,
    /// Exclusive or Shared.
    #[serde(default)]
    pub sharing_policy: Option<String>,
    /// Disk requirement.
    #[serde(default)]
    pub disk: Option<Disk>,
}

/// Disk requirement of a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Disk {
    /// Required size.
    pub required: Quantity,
    /// Whether the disk is ephemeral.
    #[serde(default)]
    pub ephemeral: bool,
}

/// An extended resource requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtendedResource {
    /// Resource name.
    pub name: String,
    /// Required amount.
    #[serde(deserialize_with = "scalar_as_string")]
    pub required: String,
}

/// A config file mounted into a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// File path.
    pub path: String,
    /// Literal content.
    #[serde(default)]
    pub value: Option<String>,
    /// Parameter supplying the content.
    #[serde(default)]
    pub from_param: Option<String>,
}

/// A health probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// Command probe.
    #[serde(default)]
    pub exec: Option<ExecProbe>,
    /// HTTP GET probe.
    #[serde(default)]
    pub http_get: Option<HttpGetProbe>,
    /// TCP socket probe.
    #[serde(default)]
    pub tcp_socket: Option<TcpSocketProbe>,
    /// Seconds before the first probe.
    #[serde(default)]
    pub initial_delay_seconds: u32,
    /// Seconds between probes.
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u32,
    /// Probe timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Consecutive successes to be healthy.
    #[serde(default = "default_threshold")]
    pub success_threshold: u32,
    /// Consecutive failures to be unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Probe {
    /// Returns true if the probe checks the network (HTTP or TCP).
    #[must_use]
    pub const fn is_network_probe(&self) -> bool {
        self.http_get.is_some() || self.tcp_socket.is_some()
    }
}

/// Command probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecProbe {
    /// Command to run.
    pub command: Vec<String>,
}

/// HTTP GET probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpGetProbe {
    /// Request path.
    pub path: String,
    /// Port to probe.
    pub port: u16,
    /// Extra request headers.
    #[serde(default)]
    pub http_headers: Vec<HttpHeader>,
}

/// An HTTP header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// TCP socket probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpSocketProbe {
    /// Port to probe.
    pub port: u16,
}

const fn default_period_seconds() -> u32 {
    10
}

const fn default_timeout_seconds() -> u32 {
    1
}

const fn default_threshold() -> u32 {
    1
}

const fn default_failure_threshold() -> u32 {
    3
}

/// Accepts any YAML scalar and keeps its textual form.
fn scalar_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    scalar_text(&value).ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
}

fn optional_scalar_as_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    scalar_text(&value)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component_schematic() {
        let yaml = r#"
apiVersion: core.oam.dev/v1alpha1
kind: ComponentSchematic
metadata:
  name: frontend
spec:
  workloadType: core.oam.dev/v1alpha1.Server
  parameters:
    - name: port
      type: number
      default: 8080
  containers:
    - name: web
      image: nginx:1.17
      env:
        - name: PORT
          fromParam: port
        - name: DEBUG
          value: true
      ports:
        - name: http
          containerPort: 8080
      resources:
        cpu:
          required: 0.5
        memory:
          required: "512Mi"
      livenessProbe:
        httpGet:
          path: /health
          port: 8080
        initialDelaySeconds: 30
"#;
        let schematic: ComponentSchematic = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schematic.name(), "frontend");
        assert_eq!(schematic.workload_type(), Some(WorkloadType::Server));
        assert_eq!(schematic.spec.parameters[0].default.as_deref(), Some("8080"));

        let container = &schematic.spec.containers[0];
        assert_eq!(container.env[1].value.as_deref(), Some("true"));
        assert_eq!(container.resources.cpu_millicores(), 500);
        assert_eq!(container.resources.memory_bytes(), 512 * 1024 * 1024);

        let probe = container.liveness_probe.as_ref().unwrap();
        assert!(probe.is_network_probe());
        assert_eq!(probe.initial_delay_seconds, 30);
        assert_eq!(probe.failure_threshold, 3);
    }

    #[test]
    fn test_parse_application_configuration() {
        let yaml = r"
apiVersion: core.oam.dev/v1alpha1
kind: ApplicationConfiguration
metadata:
  name: shop
spec:
  components:
    - componentName: frontend
      instanceName: shop-frontend
      parameterValues:
        - name: port
          value: 80
      traits:
        - name: manual-scaler
          properties:
            replicaCount: 3
";
        let app: ApplicationConfiguration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(app.name(), "shop");

        let instance = &app.components()[0];
        assert_eq!(instance.parameter_value("port"), Some("80"));
        assert_eq!(instance.parameter_value("missing"), None);

        let scaler = instance.find_trait("manual-scaler").unwrap();
        assert_eq!(scaler.properties["replicaCount"], serde_json::json!(3));
    }

    #[test]
    fn test_port_protocol_accepts_either_case() {
        let ports: Vec<ContainerPort> = serde_yaml::from_str(
            r"
- name: http
  containerPort: 80
- name: dns
  containerPort: 53
  protocol: udp
- name: metrics
  containerPort: 9090
  protocol: TCP
",
        )
        .unwrap();
        assert_eq!(ports[0].protocol, PortProtocol::Tcp);
        assert_eq!(ports[1].protocol, PortProtocol::Udp);
        assert_eq!(ports[2].protocol, PortProtocol::Tcp);
        assert_eq!(serde_json::to_value(ports[1].protocol).unwrap(), "UDP");

        let err = serde_yaml::from_str::<ContainerPort>("name: x\ncontainerPort: 1\nprotocol: SCTP\n")
            .unwrap_err();
        assert!(err.to_string().contains("SCTP"));
    }

    #[test]
    fn test_duplicate_port_across_containers() {
        let mut schematic: ComponentSchematic = serde_yaml::from_str(
            r"
apiVersion: core.oam.dev/v1alpha1
kind: ComponentSchematic
metadata:
  name: pair
spec:
  workloadType: core.oam.dev/v1alpha1.Server
  containers:
    - name: a
      image: nginx
      ports:
        - name: http
          containerPort: 80
    - name: b
      image: nginx
      ports:
        - name: alt
          containerPort: 8080
",
        )
        .unwrap();
        assert_eq!(schematic.duplicate_port(), None);

        schematic.spec.containers[1].ports[0].container_port = 80;
        assert_eq!(schematic.duplicate_port(), Some(80));
    }

    #[test]
    fn test_workload_type_allow_list() {
        assert_eq!(
            WorkloadType::parse("core.oam.dev/v1alpha1.Worker"),
            Some(WorkloadType::Worker)
        );
        assert_eq!(WorkloadType::parse("core.oam.dev/v1alpha1.Task"), None);
        assert_eq!(WorkloadType::parse("Server"), None);
    }
}
