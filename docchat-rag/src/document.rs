//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata key holding the source file path.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the source file name.
pub const META_FILE_NAME: &str = "file_name";
/// Metadata key holding the file category (`pdf`, `word`, `text`, `image`).
pub const META_FILE_TYPE: &str = "file_type";
/// Metadata key holding the 1-based PDF page number.
pub const META_PAGE: &str = "page";
/// Metadata key holding the chunk's position within its document.
pub const META_CHUNK_INDEX: &str = "chunk_index";
/// Metadata key holding the chunk's character offset within its document.
pub const META_START_INDEX: &str = "start_index";

/// Plain text extracted from one logical unit of a source file.
///
/// A PDF yields one document per page; every other format yields one per file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The file the text was extracted from.
    pub source_path: PathBuf,
    /// The extracted text.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Chunk {
    /// The source file this chunk was cut from, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// Human readable origin such as `report.pdf p.3`.
    pub fn citation(&self) -> String {
        let name = self
            .metadata
            .get(META_FILE_NAME)
            .map(String::as_str)
            .or_else(|| self.source())
            .unwrap_or(&self.document_id);
        match self.metadata.get(META_PAGE) {
            Some(page) => format!("{name} p.{page}"),
            None => name.to_string(),
        }
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(metadata: &[(&str, &str)]) -> Chunk {
        Chunk {
            id: "doc_0".into(),
            text: "text".into(),
            embedding: Vec::new(),
            metadata: metadata.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            document_id: "doc".into(),
        }
    }

    #[test]
    fn citation_includes_page_when_present() {
        let chunk = chunk_with(&[(META_FILE_NAME, "report.pdf"), (META_PAGE, "3")]);
        assert_eq!(chunk.citation(), "report.pdf p.3");
    }

    #[test]
    fn citation_falls_back_to_document_id() {
        assert_eq!(chunk_with(&[]).citation(), "doc");
    }
}
