// Declared task files: role classification, filename decomposition and file records
use crate::document::{XmlDocument, XmlElement, XmlQuery};
use crate::error::ImportError;
use crate::file_type::{FileTypeLookup, FileTypeResolver};
use crate::model::{ExerciseDraft, ExerciseFile, FileRole};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const FILES_PATH: &str = "/p:task/p:files/p:file";
pub const TEST_CONFIGURATIONS_PATH: &str = "//p:test/p:test-configuration";
pub const MODEL_SOLUTION_FILEREFS_PATH: &str = "//p:model-solution/p:filerefs/p:fileref";
const FILEREF_PATH: &str = "p:filerefs/p:fileref";
const FEEDBACK_MESSAGE_PATH: &str = "c:feedback-message";

pub const INTERNAL_CLASS: &str = "internal";
pub const TEMPLATE_CLASS: &str = "template";
pub const MAIN_COMMENT: &str = "main";

// Raw attributes and content of one task/files/file element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFile {
    pub id: String,
    pub class: String,
    pub filename: Option<String>,
    pub comment: Option<String>,
    pub content: String,
}

impl DeclaredFile {
    pub fn from_element(element: &XmlElement) -> Result<Self, ImportError> {
        let id = element.attribute("id").ok_or(ImportError::MissingFileId)?;
        let class = element
            .attribute("class")
            .ok_or_else(|| ImportError::MissingFileClass { id: id.to_string() })?;

        Ok(Self {
            id: id.to_string(),
            class: class.to_string(),
            filename: element.attribute("filename").map(str::to_string),
            comment: element.attribute("comment").map(str::to_string),
            content: element.text(),
        })
    }

    pub fn is_internal(&self) -> bool {
        self.class == INTERNAL_CLASS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestConfiguration {
    refids: Vec<String>,
    feedback_message: String,
}

/// Cross-references from the test and model-solution sections to file ids.
///
/// Collected once per document; test configurations keep document order so
/// the feedback message of the first configuration referencing a file wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReferences {
    tests: Vec<TestConfiguration>,
    model_solution: HashSet<String>,
}

impl FileReferences {
    pub fn collect(doc: &XmlDocument) -> Self {
        let tests = doc
            .query_nodes(TEST_CONFIGURATIONS_PATH)
            .into_iter()
            .map(|config| {
                let scope = doc.within(config);
                TestConfiguration {
                    refids: scope
                        .query_nodes(FILEREF_PATH)
                        .into_iter()
                        .filter_map(|r| r.attribute("refid"))
                        .map(str::to_string)
                        .collect(),
                    feedback_message: scope.query_text(FEEDBACK_MESSAGE_PATH),
                }
            })
            .collect();

        let model_solution = doc
            .query_nodes(MODEL_SOLUTION_FILEREFS_PATH)
            .into_iter()
            .filter_map(|r| r.attribute("refid"))
            .map(str::to_string)
            .collect();

        Self {
            tests,
            model_solution,
        }
    }

    pub fn is_tested(&self, id: &str) -> bool {
        self.tests.iter().any(|t| t.refids.iter().any(|r| r == id))
    }

    pub fn is_model_solution(&self, id: &str) -> bool {
        self.model_solution.contains(id)
    }

    pub fn feedback_message(&self, id: &str) -> Option<&str> {
        self.tests
            .iter()
            .find(|t| t.refids.iter().any(|r| r == id))
            .map(|t| t.feedback_message.as_str())
    }
}

/// Role of a declared file. Checked top to bottom, first match wins:
///
/// 1. internal and referenced by a test configuration: teacher-defined test
/// 2. internal and referenced by the model solution: reference implementation
/// 3. template commented `main`: main file
/// 4. internal commented `main`: unset
/// 5. anything else: regular file
pub fn classify(file: &DeclaredFile, references: &FileReferences) -> FileRole {
    let internal = file.is_internal();
    let main = file.comment.as_deref() == Some(MAIN_COMMENT);

    match (
        internal && references.is_tested(&file.id),
        internal && references.is_model_solution(&file.id),
        file.class.as_str(),
        main,
    ) {
        (true, _, _, _) => FileRole::TeacherDefinedTest,
        (false, true, _, _) => FileRole::ReferenceImplementation,
        (false, false, TEMPLATE_CLASS, true) => FileRole::MainFile,
        (false, false, INTERNAL_CLASS, true) => FileRole::Unset,
        _ => FileRole::RegularFile,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameParts {
    pub path: String,
    pub name: String,
    pub extension: String,
}

/// Splits "dir/sub/name.ext" into path, name and extension.
///
/// The path ends at the last `/`. The name ends at the first `.` and the
/// extension is only the segment after it, so "a.test.java" yields name
/// "a" and extension "test"; later segments are dropped.
pub fn split_filename(filename: &str) -> FilenameParts {
    let (path, name_with_extension) = filename.rsplit_once('/').unwrap_or(("", filename));
    let mut segments = name_with_extension.split('.');
    let name = segments.next().unwrap_or_default();
    let extension = segments.next().unwrap_or_default();

    FilenameParts {
        path: path.to_string(),
        name: name.to_string(),
        extension: extension.to_string(),
    }
}

pub fn build_file<L: FileTypeLookup + ?Sized>(
    file: DeclaredFile,
    references: &FileReferences,
    file_types: &FileTypeResolver<'_, L>,
) -> ExerciseFile {
    let role = classify(&file, references);
    let parts = file
        .filename
        .as_deref()
        .map(split_filename)
        .unwrap_or_default();
    let feedback_message = match role {
        FileRole::TeacherDefinedTest => references.feedback_message(&file.id).map(str::to_string),
        _ => None,
    };

    debug!(
        id = %file.id,
        class = %file.class,
        role = %role,
        name = %parts.name,
        "Classified task file"
    );

    ExerciseFile {
        file_type_id: file_types.resolve(&parts.extension),
        hidden: file.is_internal(),
        read_only: false,
        content: file.content,
        name: parts.name,
        path: parts.path,
        role,
        feedback_message,
    }
}

// Builds one record per task/files/file in document order; fails before producing any
pub fn collect_files<L: FileTypeLookup + ?Sized>(
    doc: &XmlDocument,
    file_types: &FileTypeResolver<'_, L>,
) -> Result<Vec<ExerciseFile>, ImportError> {
    let declared = doc
        .query_nodes(FILES_PATH)
        .into_iter()
        .map(DeclaredFile::from_element)
        .collect::<Result<Vec<_>, _>>()?;

    let references = FileReferences::collect(doc);
    if doc.bindings().feedback.is_none()
        && declared
            .iter()
            .any(|f| f.is_internal() && references.is_tested(&f.id))
    {
        warn!("No feedback namespace declared, test feedback messages will be empty");
    }

    Ok(declared
        .into_iter()
        .map(|file| build_file(file, &references, file_types))
        .collect())
}

pub fn import_files<L: FileTypeLookup + ?Sized>(
    doc: &XmlDocument,
    draft: &mut ExerciseDraft,
    file_types: &FileTypeResolver<'_, L>,
) -> Result<(), ImportError> {
    let files = collect_files(doc, file_types)?;
    draft.files.extend(files);
    Ok(())
}
