// Exercise model populated by the importer
use serde::{Deserialize, Serialize};
use std::fmt;

// Mutable import target; created by the caller and filled in by the importer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseDraft {
    pub title: String,
    pub description: String,
    pub execution_environment_id: Option<i64>,
    pub files: Vec<ExerciseFile>,
}

impl ExerciseDraft {
    pub fn new() -> Self {
        Self::default()
    }

    // First file flagged as the entry point, in declaration order
    pub fn main_file(&self) -> Option<&ExerciseFile> {
        self.files.iter().find(|f| f.role == FileRole::MainFile)
    }

    pub fn files_with_role(&self, role: FileRole) -> impl Iterator<Item = &ExerciseFile> {
        self.files.iter().filter(move |f| f.role == role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseFile {
    pub content: String,
    pub name: String,
    pub path: String,
    pub file_type_id: Option<i64>,
    pub role: FileRole,
    pub feedback_message: Option<String>,
    pub hidden: bool,
    pub read_only: bool,
}

/// Purpose of a declared file.
///
/// Serialized as the role strings stored by the exercise tables; `Unset`
/// is the empty string and marks internal files tagged `main`, which are
/// neither regular files nor candidates for main-file detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileRole {
    #[default]
    #[serde(rename = "regular_file")]
    RegularFile,
    #[serde(rename = "teacher_defined_test")]
    TeacherDefinedTest,
    #[serde(rename = "reference_implementation")]
    ReferenceImplementation,
    #[serde(rename = "main_file")]
    MainFile,
    #[serde(rename = "")]
    Unset,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::RegularFile => "regular_file",
            FileRole::TeacherDefinedTest => "teacher_defined_test",
            FileRole::ReferenceImplementation => "reference_implementation",
            FileRole::MainFile => "main_file",
            FileRole::Unset => "",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Runtime a task is executed in, keyed by "<language> <version>"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileType {
    pub id: i64,
    pub name: String,
    // Leading dot included, e.g. ".py"
    #[serde(default)]
    pub file_extension: Option<String>,
}
