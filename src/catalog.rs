// JSON catalog of execution environments and file types
use crate::config::ImporterConfig;
use crate::environment::EnvironmentRegistry;
use crate::error::ImportError;
use crate::file_type::FileTypeRegistry;
use crate::model::{ExecutionEnvironment, FileType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub importer: ImporterConfig,
    pub execution_environments: Vec<ExecutionEnvironment>,
    pub file_types: Vec<FileType>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let catalog: Catalog =
            serde_json::from_str(json).map_err(|e| ImportError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    // Names are lookup keys, so they must be unique
    fn validate(&self) -> Result<(), ImportError> {
        let mut names = HashSet::new();
        for environment in &self.execution_environments {
            if !names.insert(environment.name.as_str()) {
                return Err(ImportError::Catalog(format!(
                    "duplicate execution environment '{}'",
                    environment.name
                )));
            }
        }

        let mut names = HashSet::new();
        let mut extensions = HashSet::new();
        for file_type in &self.file_types {
            if !names.insert(file_type.name.as_str()) {
                return Err(ImportError::Catalog(format!(
                    "duplicate file type '{}'",
                    file_type.name
                )));
            }
            if let Some(extension) = &file_type.file_extension {
                if !extension.starts_with('.') {
                    return Err(ImportError::Catalog(format!(
                        "file extension '{}' of '{}' must start with '.'",
                        extension, file_type.name
                    )));
                }
                if !extensions.insert(extension.as_str()) {
                    return Err(ImportError::Catalog(format!(
                        "file extension '{}' is registered twice",
                        extension
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn into_registries(self) -> (EnvironmentRegistry, FileTypeRegistry, ImporterConfig) {
        (
            self.execution_environments.into_iter().collect(),
            self.file_types.into_iter().collect(),
            self.importer,
        )
    }
}
