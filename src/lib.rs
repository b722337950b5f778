// ProFormA task importer: turns ProFormA XML exercises into exercise drafts

pub mod catalog;
pub mod config;
pub mod document;
pub mod environment;
pub mod error;
pub mod file_type;
pub mod files;
pub mod importer;
pub mod metadata;
pub mod model;

// Re-export key types for convenience
pub use catalog::Catalog;
pub use config::ImporterConfig;
pub use document::{load, XmlDocument, XmlQuery};
pub use environment::{EnvironmentLookup, EnvironmentRegistry, EnvironmentResolver};
pub use error::ImportError;
pub use file_type::{FileTypeLookup, FileTypeRegistry, FileTypeResolver};
pub use files::{classify, split_filename, FilenameParts};
pub use importer::ProformaImporter;
pub use metadata::{extract_metadata, TaskMetadata};
pub use model::{ExecutionEnvironment, ExerciseDraft, ExerciseFile, FileRole, FileType};
