// Task-level metadata: title, description and programming language
use crate::document::{XmlDocument, XmlQuery};
use crate::error::ImportError;

pub const TITLE_PATH: &str = "/p:task/p:meta-data/p:title";
pub const DESCRIPTION_PATH: &str = "/p:task/p:description";
pub const PROGLANG_PATH: &str = "/p:task/p:proglang";
pub const PROGLANG_VERSION_PATH: &str = "/p:task/p:proglang/@version";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskMetadata {
    pub title: String,
    pub description: String,
    pub language: String,
    pub version: String,
}

pub fn extract_metadata(doc: &XmlDocument) -> Result<TaskMetadata, ImportError> {
    let version = doc
        .query_attr(PROGLANG_VERSION_PATH)
        .ok_or(ImportError::MissingLanguageVersion)?;

    Ok(TaskMetadata {
        title: doc.query_text(TITLE_PATH),
        description: doc.query_text(DESCRIPTION_PATH),
        language: doc.query_text(PROGLANG_PATH),
        version,
    })
}
