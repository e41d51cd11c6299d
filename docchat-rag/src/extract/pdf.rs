//! PDF text extraction, one string per page.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::warn;

use crate::error::{RagError, Result};

/// Extract the text of every page of the PDF at `path`, in page order.
///
/// `pdf-extract` handles font encodings best and is tried first. It is known
/// to panic on some malformed files, so panics are caught; on either failure
/// the page text is read with `lopdf` instead.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let primary = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)));

    let reason = match primary {
        Ok(Ok(pages)) => return Ok(pages),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    warn!(path = %path.display(), %reason, "pdf-extract failed, falling back to lopdf");
    extract_pages_with_lopdf(path).map_err(|fallback| RagError::ExtractionError {
        path: path.to_path_buf(),
        message: format!("unreadable PDF ({reason}; lopdf: {fallback})"),
    })
}

fn extract_pages_with_lopdf(path: &Path) -> std::result::Result<Vec<String>, String> {
    let document = lopdf::Document::load(path).map_err(|e| e.to_string())?;
    document
        .get_pages()
        .keys()
        .map(|&number| document.extract_text(&[number]).map_err(|e| e.to_string()))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, RagError::ExtractionError { .. }));
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
