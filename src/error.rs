// Error types for ProFormA task import
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Missing version attribute on task/proglang")]
    MissingLanguageVersion,

    #[error("Declared file is missing its id attribute")]
    MissingFileId,

    #[error("Declared file {id} is missing its class attribute")]
    MissingFileClass { id: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

