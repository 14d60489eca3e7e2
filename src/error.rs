//! Error types for quire operations.

use thiserror::Error;

/// Which half of a split produced an output failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPart {
    Front,
    Back,
}

impl std::fmt::Display for SplitPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitPart::Front => f.write_str("front"),
            SplitPart::Back => f.write_str("back"),
        }
    }
}

/// Errors that can occur while loading, normalizing or editing book content.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// Byte content does not parse as the resource's native format.
    /// The resource stays in its collection.
    #[error("Resource {href} is not valid for its media type: {reason}")]
    ResourceData { href: String, reason: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Duplicate resource href: {0}")]
    DuplicateHref(String),

    #[error("Invalid split point at offset {offset}: {reason}")]
    InvalidSplitPoint { offset: usize, reason: String },

    /// A split half could not be rebuilt into a well-formed document.
    /// Nothing is written when this is returned.
    #[error("Failed to write {part} part of split: {reason}")]
    OutputFailed { part: SplitPart, reason: String },

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("Book processor '{step}' failed: {source}")]
    Pipeline {
        step: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Background job failed: {0}")]
    Worker(String),

    #[error("Background job was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
