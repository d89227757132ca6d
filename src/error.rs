//! Error types for the oam-ecs deployment tool.
//!
//! Errors are grouped by the stage that produces them: loading and
//! validating OAM documents, rendering stack templates, talking to
//! CloudFormation, and reading the tool's own configuration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for oam-ecs.
#[derive(Debug, Error)]
pub enum OamError {
    /// Document loading and validation errors.
    #[error("Validation error: {0}")]
    Load(#[from] LoadError),

    /// Template rendering errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// CloudFormation stack errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Tool configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading and validating OAM documents.
///
/// None of these involve a remote call; they stop processing before any
/// stack is touched.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A file could not be read.
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A document is not valid YAML or does not match its kind's schema.
    #[error("Failed to parse file {path}: {message}")]
    Parse {
        /// Path of the file containing the document.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The document's apiVersion/kind pair is not registered.
    #[error("Object type {api_version}/{kind} in file {path} is not supported")]
    UnsupportedKind {
        /// Path of the file containing the document.
        path: PathBuf,
        /// Declared apiVersion.
        api_version: String,
        /// Declared kind.
        kind: String,
    },

    /// A second application configuration was found.
    #[error(
        "Multiple application configuration files found, only one is allowed per application (second one in {path})"
    )]
    MultipleApplicationConfigurations {
        /// File holding the second application configuration.
        path: PathBuf,
    },

    /// No application configuration was found in any file.
    #[error("Application configuration is required, none found in: {files}")]
    MissingApplicationConfiguration {
        /// Comma separated list of the files that were searched.
        files: String,
    },

    /// A component schematic declares a workload type outside the allow-list.
    #[error("Workload type of component schematic {schematic} is {workload_type}, only {supported} are supported")]
    UnsupportedWorkloadType {
        /// Name of the offending schematic.
        schematic: String,
        /// The declared workload type.
        workload_type: String,
        /// Human-readable list of supported types.
        supported: String,
    },

    /// The application configuration references an unknown component.
    #[error(
        "Application configuration refers to component {component} (instance {instance}), but no file provided the component schematic"
    )]
    UnresolvedComponent {
        /// The referenced component name.
        component: String,
        /// The instance that references it.
        instance: String,
    },

    /// Two schematics share a name.
    #[error("Component schematic {name} is defined more than once (again in {path})")]
    DuplicateSchematic {
        /// The duplicated schematic name.
        name: String,
        /// File holding the second definition.
        path: PathBuf,
    },

    /// Two port entries of a schematic expose the same port number.
    #[error("Component schematic {schematic} exposes port {port} more than once")]
    DuplicatePort {
        /// Name of the offending schematic.
        schematic: String,
        /// The repeated port number.
        port: u16,
    },

    /// A resource quantity could not be parsed.
    #[error("Invalid resource quantity: {value}")]
    InvalidQuantity {
        /// The raw quantity text.
        value: String,
    },
}

/// Errors raised while producing a stack template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No embedded template exists at the location.
    #[error("Failed to find the template at {location}")]
    NotFound {
        /// Template location that was looked up.
        location: String,
    },

    /// A component instance was rendered without its schematic.
    #[error("Component instance {instance} has no component schematic to render")]
    MissingSchematic {
        /// Instance name.
        instance: String,
    },

    /// The template source is not valid handlebars.
    #[error("Failed to parse template {location}: {message}")]
    Parse {
        /// Template location.
        location: String,
        /// Parser message.
        message: String,
    },

    /// Rendering failed, usually because a helper could not resolve a value.
    #[error("Failed to render template {location}: {message}")]
    Render {
        /// Template location.
        location: String,
        /// Renderer message, including the helper's reason.
        message: String,
    },

    /// A parameter lookup found no value.
    #[error("Could not find parameter value for name {name} in component instance {instance}")]
    MissingParameter {
        /// Parameter name.
        name: String,
        /// Instance that was searched.
        instance: String,
    },

    /// The summed container requirements exceed every Fargate size.
    #[error(
        "Could not find valid Fargate task size for the given CPU and memory requirements: {cpu_millicores} CPU millicores, {memory_mib} MiB memory"
    )]
    NoFargateSize {
        /// Required CPU in millicores.
        cpu_millicores: u64,
        /// Required memory in MiB.
        memory_mib: u64,
    },
}

/// Errors describing the state of a CloudFormation stack or change set.
#[derive(Debug, Error)]
pub enum StackError {
    /// The stack does not exist.
    #[error("Stack {stack_name} was not found")]
    NotFound {
        /// Stack name.
        stack_name: String,
    },

    /// A create was attempted against a healthy existing stack.
    #[error("Stack {stack_name} already exists with status {status}")]
    AlreadyExists {
        /// Stack name.
        stack_name: String,
        /// Current status.
        status: String,
    },

    /// Another operation is running on the stack.
    #[error("Stack {stack_name} is currently being updated (status {status}) and cannot be deployed to")]
    UpdateInProgress {
        /// Stack name.
        stack_name: String,
        /// Current status.
        status: String,
    },

    /// The change set could not be created for a reason other than an empty diff.
    #[error("Failed to create change set for stack {stack_name}: {reason}")]
    ChangeSetCreationFailed {
        /// Stack name.
        stack_name: String,
        /// Reason reported by CloudFormation.
        reason: String,
    },

    /// The change set could not be executed.
    #[error("Failed to execute change set {change_set} for stack {stack_name}: {message}")]
    ChangeSetExecutionFailed {
        /// Stack name.
        stack_name: String,
        /// Change set id.
        change_set: String,
        /// Provider message.
        message: String,
    },

    /// A wait ended in a failure status.
    #[error("Failed to {operation} stack {stack_name}: stack reached status {status}")]
    WaitFailed {
        /// Stack name.
        stack_name: String,
        /// Operation being waited on (create, update, delete).
        operation: String,
        /// Terminal status observed.
        status: String,
    },

    /// A wait exhausted its attempts.
    #[error("Timed out waiting to {operation} stack {stack_name} after {attempts} attempts")]
    Timeout {
        /// Stack name.
        stack_name: String,
        /// Operation being waited on.
        operation: String,
        /// Number of polls made.
        attempts: u32,
    },

    /// Any other provider failure.
    #[error("CloudFormation {operation} failed for stack {stack_name}: {message}")]
    Provider {
        /// API operation name.
        operation: String,
        /// Stack name or id.
        stack_name: String,
        /// Provider message.
        message: String,
    },
}

/// Tool configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
    },

    /// The `.env` file exists but cannot be loaded.
    #[error("Failed to load {path}: {message}")]
    EnvFile {
        /// Path of the file.
        path: PathBuf,
        /// Loader message.
        message: String,
    },
}

/// Result type alias for oam-ecs operations.
pub type Result<T> = std::result::Result<T, OamError>;

impl OamError {
    /// Returns true if this error reports a missing stack.
    #[must_use]
    pub const fn is_stack_not_found(&self) -> bool {
        matches!(self, Self::Stack(StackError::NotFound { .. }))
    }

    /// Returns true if this error reports a stack with an operation in flight.
    #[must_use]
    pub const fn is_update_in_progress(&self) -> bool {
        matches!(self, Self::Stack(StackError::UpdateInProgress { .. }))
    }

    /// Returns true if this error reports a create against an existing stack.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::Stack(StackError::AlreadyExists { .. }))
    }
}

impl StackError {
    /// Creates a provider error for an API operation.
    #[must_use]
    pub fn provider(
        operation: impl Into<String>,
        stack_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            operation: operation.into(),
            stack_name: stack_name.into(),
            message: message.into(),
        }
    }
}

impl LoadError {
    /// Creates a parse error for a file.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
