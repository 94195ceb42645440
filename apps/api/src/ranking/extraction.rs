//! Text extraction: turns an uploaded resume into plain text, keyed by document format.

use std::io::{Cursor, Read};

use regex::Regex;
use thiserror::Error;

use crate::models::resume::{DocumentFormat, UploadedFile};

/// Main body part of a DOCX package.
const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF could not be read: {0}")]
    Pdf(String),

    #[error("DOCX could not be read: {0}")]
    Docx(String),

    #[error("File is not valid UTF-8 text")]
    Encoding,

    #[error("No text found in document")]
    Empty,
}

/// Pluggable text extractor. Implementations are blocking and run on the blocking pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, file: &UploadedFile) -> Result<String, ExtractionError>;
}

/// Default extractor for PDF, DOCX and plain text uploads.
pub struct DocumentTextExtractor {
    docx_run: Regex,
}

impl DocumentTextExtractor {
    pub fn new() -> Self {
        Self {
            // paragraph ends and text runs, in document order
            docx_run: Regex::new(r"(?s)</w:p>|<w:t(?:\s[^>]*)?>(.*?)</w:t>")
                .expect("DOCX run pattern is valid"),
        }
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))
    }

    fn extract_docx(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::Docx(e.to_string()))?;
        let mut xml = String::new();
        archive
            .by_name(DOCX_BODY)
            .map_err(|e| ExtractionError::Docx(e.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractionError::Docx(e.to_string()))?;

        Ok(self.docx_text(&xml))
    }

    fn docx_text(&self, xml: &str) -> String {
        let mut text = String::with_capacity(xml.len() / 4);
        for caps in self.docx_run.captures_iter(xml) {
            match caps.get(1) {
                Some(run) => text.push_str(&unescape_xml(run.as_str())),
                None => text.push('\n'),
            }
        }
        text
    }
}

impl Default for DocumentTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, file: &UploadedFile) -> Result<String, ExtractionError> {
        let text = match file.format {
            DocumentFormat::Pdf => self.extract_pdf(&file.content)?,
            DocumentFormat::Docx => self.extract_docx(&file.content)?,
            DocumentFormat::Txt => std::str::from_utf8(&file.content)
                .map_err(|_| ExtractionError::Encoding)?
                .to_string(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text.to_string())
    }
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Write;

    fn file(name: &str, format: DocumentFormat, content: impl Into<Bytes>) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            format,
            content: content.into(),
        }
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::FileOptions::default();
            zip.start_file(DOCX_BODY, options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_plain_text_is_trimmed() {
        let extractor = DocumentTextExtractor::new();
        let text = extractor
            .extract(&file("a.txt", DocumentFormat::Txt, "\n  Python developer \n"))
            .unwrap();
        assert_eq!(text, "Python developer");
    }

    #[test]
    fn test_blank_text_is_empty_error() {
        let extractor = DocumentTextExtractor::new();
        let err = extractor
            .extract(&file("a.txt", DocumentFormat::Txt, "   \n"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Empty));
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let extractor = DocumentTextExtractor::new();
        let err = extractor
            .extract(&file("a.txt", DocumentFormat::Txt, vec![0xff, 0xfe, 0x00]))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Encoding));
    }

    #[test]
    fn test_docx_paragraphs_and_entities() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Senior Engineer</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Python &amp; SQL, </w:t></w:r><w:r><w:t>5 years</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let extractor = DocumentTextExtractor::new();

        let text = extractor
            .extract(&file("cv.docx", DocumentFormat::Docx, docx_bytes(xml)))
            .unwrap();

        assert_eq!(text, "Senior Engineer\nPython & SQL, 5 years");
    }

    #[test]
    fn test_docx_tab_and_props_tags_are_not_runs() {
        let extractor = DocumentTextExtractor::new();
        let text = extractor.docx_text("<w:p><w:tab/><w:tblPr/><w:t>Rust</w:t></w:p>");
        assert_eq!(text, "Rust\n");
    }

    #[test]
    fn test_corrupt_docx_is_docx_error() {
        let extractor = DocumentTextExtractor::new();
        let err = extractor
            .extract(&file("bad.docx", DocumentFormat::Docx, "not a zip archive"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Docx(_)));
    }
}
