//! Document kind registry and decoding.
//!
//! A [`SchemeRegistry`] is built per invocation and handed to the loader.
//! Decoding reads the `apiVersion`/`kind` discriminator of a YAML document,
//! resolves it through the registry and deserializes the concrete type.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::LoadError;

use super::spec::{
    APPLICATION_CONFIGURATION_KIND, ApplicationConfiguration, COMPONENT_SCHEMATIC_KIND,
    ComponentSchematic, OAM_API_VERSION,
};

/// Document kinds the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `ApplicationConfiguration`.
    ApplicationConfiguration,
    /// `ComponentSchematic`.
    ComponentSchematic,
}

/// Maps (apiVersion, kind) pairs to document kinds.
#[derive(Debug, Clone)]
pub struct SchemeRegistry {
    kinds: HashMap<(String, String), DocumentKind>,
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::empty()
            .with_kind(
                OAM_API_VERSION,
                APPLICATION_CONFIGURATION_KIND,
                DocumentKind::ApplicationConfiguration,
            )
            .with_kind(
                OAM_API_VERSION,
                COMPONENT_SCHEMATIC_KIND,
                DocumentKind::ComponentSchematic,
            )
    }
}

impl SchemeRegistry {
    /// Creates a registry with the OAM v1alpha1 kinds registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registers a kind.
    #[must_use]
    pub fn with_kind(
        mut self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        document_kind: DocumentKind,
    ) -> Self {
        self.kinds
            .insert((api_version.into(), kind.into()), document_kind);
        self
    }

    /// Resolves an (apiVersion, kind) pair.
    #[must_use]
    pub fn resolve(&self, api_version: &str, kind: &str) -> Option<DocumentKind> {
        self.kinds
            .get(&(api_version.to_string(), kind.to_string()))
            .copied()
    }

    /// Decodes a single YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the discriminator is missing, the kind is not
    /// registered, or the body does not match the kind's schema.
    pub fn decode(&self, path: &Path, value: serde_yaml::Value) -> Result<OamDocument, LoadError> {
        let header: TypeHeader = serde_yaml::from_value(value.clone())
            .map_err(|e| LoadError::parse(path, format!("missing apiVersion or kind: {e}")))?;

        let Some(kind) = self.resolve(&header.api_version, &header.kind) else {
            return Err(LoadError::UnsupportedKind {
                path: path.to_path_buf(),
                api_version: header.api_version,
                kind: header.kind,
            });
        };

        debug!(
            "Decoding {}/{} from {}",
            header.api_version,
            header.kind,
            path.display()
        );

        let document = match kind {
            DocumentKind::ApplicationConfiguration => OamDocument::ApplicationConfiguration(
                serde_yaml::from_value(value).map_err(|e| LoadError::parse(path, e.to_string()))?,
            ),
            DocumentKind::ComponentSchematic => OamDocument::ComponentSchematic(
                serde_yaml::from_value(value).map_err(|e| LoadError::parse(path, e.to_string()))?,
            ),
        };
        Ok(document)
    }
}

/// A decoded OAM document.
#[derive(Debug, Clone, PartialEq)]
pub enum OamDocument {
    /// An application configuration.
    ApplicationConfiguration(ApplicationConfiguration),
    /// A component schematic.
    ComponentSchematic(ComponentSchematic),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeHeader {
    api_version: String,
    kind: String,
}
