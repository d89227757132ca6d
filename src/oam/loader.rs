//! Loading OAM documents from files into a validated workload.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::LoadError;

use super::registry::{OamDocument, SchemeRegistry};
use super::spec::{ApplicationConfiguration, ComponentSchematic, WorkloadType};
use super::validator;

/// A validated application together with the schematics it references.
#[derive(Debug, Clone, PartialEq)]
pub struct OamWorkload {
    /// The single application configuration.
    pub application: ApplicationConfiguration,
    /// Component schematics keyed by name.
    pub schematics: BTreeMap<String, ComponentSchematic>,
    /// Fields present in the input that deployment ignores.
    pub warnings: Vec<String>,
}

impl OamWorkload {
    /// Looks up a schematic by component name.
    #[must_use]
    pub fn schematic(&self, component_name: &str) -> Option<&ComponentSchematic> {
        self.schematics.get(component_name)
    }
}

/// Reads OAM files and validates the documents they contain.
#[derive(Debug, Clone, Default)]
pub struct WorkloadLoader {
    registry: SchemeRegistry,
}

impl WorkloadLoader {
    /// Creates a loader using the default OAM v1alpha1 registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom registry.
    #[must_use]
    pub fn with_registry(mut self, registry: SchemeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Loads an application configuration and all component schematics.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, a document kind is
    /// not supported, more than one or no application configuration is found,
    /// a schematic has an unsupported workload type or is defined twice, or a
    /// component instance refers to a schematic that was not supplied.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<OamWorkload, LoadError> {
        let mut application = None;
        let mut schematics = BTreeMap::new();

        for path in paths {
            let path = path.as_ref();
            for document in self.read_documents(path)? {
                match document {
                    OamDocument::ApplicationConfiguration(app) => {
                        set_application(&mut application, app, path)?;
                    }
                    OamDocument::ComponentSchematic(schematic) => {
                        add_schematic(&mut schematics, schematic, path)?;
                    }
                }
            }
        }

        let application = require_application(application, paths)?;

        for instance in application.components() {
            if !schematics.contains_key(&instance.component_name) {
                return Err(LoadError::UnresolvedComponent {
                    component: instance.component_name.clone(),
                    instance: instance.instance_name.clone(),
                });
            }
        }

        let warnings: Vec<String> = schematics
            .values()
            .flat_map(validator::unsupported_fields)
            .collect();
        for warning in &warnings {
            warn!("{warning}");
        }

        info!(
            "Loaded application {} with {} component instance(s) and {} schematic(s)",
            application.name(),
            application.components().len(),
            schematics.len()
        );

        Ok(OamWorkload {
            application,
            schematics,
            warnings,
        })
    }

    /// Loads only the application configuration.
    ///
    /// Component schematics in the files are decoded but not required to
    /// match the application's references.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, a document kind is
    /// not supported, or not exactly one application configuration is found.
    pub fn load_application<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<ApplicationConfiguration, LoadError> {
        let mut application = None;

        for path in paths {
            let path = path.as_ref();
            for document in self.read_documents(path)? {
                if let OamDocument::ApplicationConfiguration(app) = document {
                    set_application(&mut application, app, path)?;
                }
            }
        }

        require_application(application, paths)
    }

    /// Reads every non-empty document from a file.
    fn read_documents(&self, path: &Path) -> Result<Vec<OamDocument>, LoadError> {
        debug!("Reading OAM documents from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| LoadError::parse(path, e.to_string()))?;
            if value.is_null() {
                continue;
            }
            documents.push(self.registry.decode(path, value)?);
        }

        debug!("Decoded {} document(s) from {}", documents.len(), path.display());
        Ok(documents)
    }
}

fn set_application(
    slot: &mut Option<ApplicationConfiguration>,
    app: ApplicationConfiguration,
    path: &Path,
) -> Result<(), LoadError> {
    if slot.is_some() {
        return Err(LoadError::MultipleApplicationConfigurations {
            path: path.to_path_buf(),
        });
    }
    *slot = Some(app);
    Ok(())
}

fn add_schematic(
    schematics: &mut BTreeMap<String, ComponentSchematic>,
    schematic: ComponentSchematic,
    path: &Path,
) -> Result<(), LoadError> {
    if schematic.workload_type().is_none() {
        return Err(LoadError::UnsupportedWorkloadType {
            schematic: schematic.name().to_string(),
            workload_type: schematic.spec.workload_type.clone(),
            supported: WorkloadType::supported_list(),
        });
    }
    if let Some(port) = schematic.duplicate_port() {
        return Err(LoadError::DuplicatePort {
            schematic: schematic.name().to_string(),
            port,
        });
    }
    if schematics.contains_key(schematic.name()) {
        return Err(LoadError::DuplicateSchematic {
            name: schematic.name().to_string(),
            path: path.to_path_buf(),
        });
    }
    schematics.insert(schematic.name().to_string(), schematic);
    Ok(())
}

fn require_application<P: AsRef<Path>>(
    application: Option<ApplicationConfiguration>,
    paths: &[P],
) -> Result<ApplicationConfiguration, LoadError> {
    application.ok_or_else(|| LoadError::MissingApplicationConfiguration {
        files: paths
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Splits a comma-delimited file list into paths, skipping empty entries.
#[must_use]
pub fn split_file_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
