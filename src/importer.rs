// ProFormA task import: metadata, execution environment and files into an exercise draft
use crate::config::ImporterConfig;
use crate::document::{self, XmlDocument};
use crate::environment::{EnvironmentLookup, EnvironmentResolver};
use crate::error::ImportError;
use crate::file_type::{FileTypeLookup, FileTypeResolver};
use crate::files::collect_files;
use crate::metadata::extract_metadata;
use crate::model::ExerciseDraft;
use tracing::info;

/// Imports ProFormA task documents into exercise drafts.
///
/// Holds only read-only collaborators, so one importer can serve concurrent
/// callers as long as each passes its own draft. An import either fills the
/// draft completely or leaves it untouched.
pub struct ProformaImporter<E, F> {
    environments: E,
    file_types: F,
    config: ImporterConfig,
}

impl<E: EnvironmentLookup, F: FileTypeLookup> ProformaImporter<E, F> {
    pub fn new(environments: E, file_types: F, config: ImporterConfig) -> Self {
        Self {
            environments,
            file_types,
            config,
        }
    }

    pub fn import(&self, draft: &mut ExerciseDraft, xml: &str) -> Result<(), ImportError> {
        let doc = document::load(xml)?;
        self.import_document(draft, &doc)
    }

    pub fn import_bytes(&self, draft: &mut ExerciseDraft, xml: &[u8]) -> Result<(), ImportError> {
        let doc = document::load_bytes(xml)?;
        self.import_document(draft, &doc)
    }

    // Everything is computed before the draft is touched
    pub fn import_document(
        &self,
        draft: &mut ExerciseDraft,
        doc: &XmlDocument,
    ) -> Result<(), ImportError> {
        let metadata = extract_metadata(doc)?;
        info!(
            title = %metadata.title,
            language = %metadata.language,
            version = %metadata.version,
            "Importing ProFormA task"
        );

        let environment_id =
            EnvironmentResolver::new(&self.environments, self.config.default_environment_id)
                .resolve(&metadata.language, &metadata.version);
        let file_types =
            FileTypeResolver::new(&self.file_types, &self.config.fallback_file_type_name);
        let files = collect_files(doc, &file_types)?;

        info!(
            files = files.len(),
            execution_environment_id = environment_id,
            "Imported ProFormA task"
        );

        draft.title = metadata.title;
        draft.description = metadata.description;
        draft.execution_environment_id = Some(environment_id);
        draft.files.extend(files);
        Ok(())
    }
}
