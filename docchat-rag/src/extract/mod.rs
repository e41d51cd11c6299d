//! Text extraction from a folder of source files.
//!
//! [`DocumentLoader::load_folder`] walks one directory (non-recursive), routes
//! each file by extension and returns the extracted [`Document`]s together
//! with an [`ExtractionSummary`]. A bad file is logged and skipped; it never
//! aborts the run.

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::document::{Document, META_FILE_NAME, META_FILE_TYPE, META_PAGE, META_SOURCE};
use crate::error::Result;

pub use ocr::{BoundingBox, OcrDetection, OcrEngine, OcrRuntime, TesseractConfig, TesseractOcr};

/// Extensions handled by OCR.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

/// Category of a source file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Word,
    Text,
    Image,
    Unsupported,
}

impl FileKind {
    /// Classify `path` by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => FileKind::Pdf,
            Some("docx" | "doc") => FileKind::Word,
            Some("txt") => FileKind::Text,
            Some(e) if IMAGE_EXTENSIONS.contains(&e) => FileKind::Image,
            _ => FileKind::Unsupported,
        }
    }

    /// Label stored in chunk metadata and printed in summaries.
    pub fn label(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Word => "word",
            FileKind::Text => "text",
            FileKind::Image => "image",
            FileKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-category file counts for one extraction run.
///
/// Supported categories count every attempted file, including ones that
/// then failed; `failed` counts those failures separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub pdf: usize,
    pub word: usize,
    pub text: usize,
    pub image: usize,
    pub unsupported: usize,
    pub failed: usize,
}

impl ExtractionSummary {
    fn record(&mut self, kind: FileKind) {
        match kind {
            FileKind::Pdf => self.pdf += 1,
            FileKind::Word => self.word += 1,
            FileKind::Text => self.text += 1,
            FileKind::Image => self.image += 1,
            FileKind::Unsupported => self.unsupported += 1,
        }
    }

    /// Number of files in a supported category.
    pub fn supported(&self) -> usize {
        self.pdf + self.word + self.text + self.image
    }
}

impl fmt::Display for ExtractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document processing summary:")?;
        writeln!(f, "  PDF files:         {}", self.pdf)?;
        writeln!(f, "  Word files:        {}", self.word)?;
        writeln!(f, "  Text files:        {}", self.text)?;
        writeln!(f, "  Image files:       {}", self.image)?;
        writeln!(f, "  Unsupported files: {}", self.unsupported)?;
        write!(f, "  Failed files:      {}", self.failed)
    }
}

/// Result of [`DocumentLoader::load_folder`].
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub documents: Vec<Document>,
    pub summary: ExtractionSummary,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Turns the files of a folder into [`Document`]s.
///
/// Extraction is blocking file and subprocess IO; async callers should run
/// it on `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    ocr: Arc<OcrRuntime>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(OcrRuntime::global())
    }
}

impl DocumentLoader {
    /// Create a loader that uses `ocr` for image files.
    pub fn new(ocr: Arc<OcrRuntime>) -> Self {
        Self { ocr }
    }

    /// Regular files directly inside `dir`, sorted by path.
    ///
    /// A missing directory yields an empty list.
    pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Extract every supported file in `dir`.
    pub fn load_folder(&self, dir: &Path) -> Result<Extraction> {
        let files = Self::list_files(dir)?;
        if files.is_empty() {
            info!(dir = %dir.display(), "no files to extract");
            return Ok(Extraction::default());
        }

        let mut extraction = Extraction::default();
        for path in files {
            let kind = FileKind::from_path(&path);
            extraction.summary.record(kind);
            if kind == FileKind::Unsupported {
                info!(path = %path.display(), "skipping unsupported file");
                continue;
            }

            info!(path = %path.display(), kind = %kind, "loading");
            match self.load_file(&path, kind) {
                Ok(documents) => extraction.documents.extend(documents),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to extract file, skipping");
                    extraction.summary.failed += 1;
                }
            }
        }

        info!(
            documents = extraction.documents.len(),
            pdf = extraction.summary.pdf,
            word = extraction.summary.word,
            text = extraction.summary.text,
            image = extraction.summary.image,
            unsupported = extraction.summary.unsupported,
            failed = extraction.summary.failed,
            "extraction finished"
        );
        Ok(extraction)
    }

    /// Extract a single file already classified as `kind`.
    pub fn load_file(&self, path: &Path, kind: FileKind) -> Result<Vec<Document>> {
        match kind {
            FileKind::Pdf => {
                let pages = pdf::extract_pages(path)?;
                Ok(pages
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| new_document(path, kind, text, Some(i + 1)))
                    .collect())
            }
            FileKind::Word => Ok(vec![new_document(path, kind, docx::extract_text(path)?, None)]),
            FileKind::Text => Ok(vec![new_document(path, kind, read_text(path)?, None)]),
            FileKind::Image => {
                let text = match self.ocr.extract_text(path) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "OCR failed, using empty text");
                        String::new()
                    }
                };
                if text.trim().is_empty() {
                    info!(path = %path.display(), "no text recognized in image");
                    return Ok(Vec::new());
                }
                Ok(vec![new_document(path, kind, text, None)])
            }
            FileKind::Unsupported => Ok(Vec::new()),
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(path = %path.display(), "file is not valid UTF-8, replacing invalid bytes");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

fn new_document(path: &Path, kind: FileKind, text: String, page: Option<usize>) -> Document {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let id = match page {
        Some(page) => format!("{file_name}#p{page}"),
        None => file_name.clone(),
    };

    let mut metadata = HashMap::new();
    metadata.insert(META_SOURCE.to_string(), path.display().to_string());
    metadata.insert(META_FILE_NAME.to_string(), file_name);
    metadata.insert(META_FILE_TYPE.to_string(), kind.label().to_string());
    if let Some(page) = page {
        metadata.insert(META_PAGE.to_string(), page.to_string());
    }

    Document { id, source_path: path.to_path_buf(), text, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        let cases = [
            ("a.PDF", FileKind::Pdf),
            ("a.docx", FileKind::Word),
            ("a.doc", FileKind::Word),
            ("a.txt", FileKind::Text),
            ("a.JPeG", FileKind::Image),
            ("a.tif", FileKind::Image),
            ("a.md", FileKind::Unsupported),
            ("README", FileKind::Unsupported),
        ];
        for (name, kind) in cases {
            assert_eq!(FileKind::from_path(Path::new(name)), kind, "{name}");
        }
    }

    #[test]
    fn summary_display_lists_every_category() {
        let summary = ExtractionSummary { pdf: 1, text: 2, unsupported: 3, ..Default::default() };
        let shown = summary.to_string();
        assert!(shown.contains("PDF files:         1"));
        assert!(shown.contains("Text files:        2"));
        assert!(shown.contains("Unsupported files: 3"));
        assert_eq!(summary.supported(), 3);
    }

    #[test]
    fn missing_folder_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DocumentLoader::list_files(&dir.path().join("nope")).unwrap().is_empty());
    }
}
