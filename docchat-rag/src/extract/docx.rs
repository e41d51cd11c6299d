//! Word (`.docx`) text extraction.
//!
//! A `.docx` file is a ZIP archive; the body lives in `word/document.xml`.
//! Text runs are `<w:t>` elements, paragraphs end at `</w:p>`.

use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{RagError, Result};

const BODY_PART: &str = "word/document.xml";

/// Extract the body text of the Word document at `path`.
///
/// Paragraphs are separated by a blank line. Legacy binary `.doc` files are
/// not ZIP archives and fail with an extraction error.
pub fn extract_text(path: &Path) -> Result<String> {
    let fail = |message: String| RagError::ExtractionError { path: path.to_path_buf(), message };

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        fail(format!("not a DOCX archive ({e}); legacy binary .doc files are not supported"))
    })?;

    let mut xml = String::new();
    archive
        .by_name(BODY_PART)
        .map_err(|e| fail(format!("missing {BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| fail(format!("cannot read {BODY_PART}: {e}")))?;

    text_from_document_xml(&xml).map_err(|e| fail(format!("malformed {BODY_PART}: {e}")))
}

/// Collect the visible text of a WordprocessingML body.
pub(crate) fn text_from_document_xml(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run = false,
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run => match e.unescape() {
                Ok(run) => text.push_str(&run),
                // Unknown entity: keep the raw run.
                Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
            },
            Event::CData(e) if in_run => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_runs_and_breaks() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Annual</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t><w:tab/><w:t>end</w:t></w:r></w:p>
            <w:p/>
        </w:body></w:document>"#;
        assert_eq!(text_from_document_xml(xml).unwrap(), "Annual report\n\nLine one\nLine two\tend");
    }

    #[test]
    fn entities_are_decoded_once() {
        let xml = "<w:p><w:r><w:t>R&amp;D &lt;b&gt; &amp;lt; &#233;&#x41;</w:t></w:r></w:p>";
        assert_eq!(text_from_document_xml(xml).unwrap(), "R&D <b> &lt; éA");
    }

    #[test]
    fn markup_inside_attributes_comments_and_cdata() {
        let xml = r#"<w:p><!-- a > b --><w:r><w:t a="x>y">hi</w:t><w:t><![CDATA[ <raw> ]]></w:t></w:r></w:p>"#;
        assert_eq!(text_from_document_xml(xml).unwrap(), "hi <raw>");
    }

    #[test]
    fn text_outside_runs_is_ignored() {
        let xml = "<w:p><w:instrText>PAGE</w:instrText><w:r><w:t>body</w:t></w:r></w:p>";
        assert_eq!(text_from_document_xml(xml).unwrap(), "body");
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        assert!(text_from_document_xml("<w:p><w:t>open</w:p>").is_err());
    }

    #[test]
    fn non_zip_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0 binary word").unwrap();
        assert!(matches!(extract_text(&path), Err(RagError::ExtractionError { .. })));
    }
}
