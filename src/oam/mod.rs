//! Open Application Model documents.
//!
//! This module provides:
//! - Types for the `core.oam.dev/v1alpha1` document kinds
//! - Resource quantity parsing
//! - A per-invocation registry of decodable document kinds
//! - Loading and validation of multi-document YAML files

mod loader;
mod quantity;
mod registry;
mod spec;
mod validator;

pub use loader::{OamWorkload, WorkloadLoader, split_file_list};
pub use quantity::Quantity;
pub use registry::{DocumentKind, OamDocument, SchemeRegistry};
pub use spec::{
    APPLICATION_CONFIGURATION_KIND, ApplicationConfiguration, ApplicationConfigurationSpec,
    COMPONENT_SCHEMATIC_KIND, ComponentConfiguration, ComponentSchematic, ComponentSpec,
    ConfigFile, Container, ContainerPort, Disk, EnvVar, ExecProbe, ExtendedResource, HttpGetProbe,
    HttpHeader, OAM_API_VERSION, ObjectMeta, ParameterDefinition, ParameterValue, PortProtocol, Probe,
    ResourceRequirement, Resources, TcpSocketProbe, TraitBinding, Volume, WorkloadType,
};
pub use validator::unsupported_fields;
