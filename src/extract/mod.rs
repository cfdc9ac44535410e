//! Multi-format text extraction for uploaded files.
//!
//! This module handles:
//! - PDF text extraction with a structural fallback and embedded-image OCR
//! - DOCX, CSV, XLSX and plain text parsing
//! - Standalone image OCR via the external tesseract binary
//!
//! Extraction works on in-memory bytes; uploads never touch disk before the
//! batch is accepted.

pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod tabular;

use crate::error::ApiError;

/// One file of an upload batch, held fully in memory.
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> String {
        self.filename
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_lowercase()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp"];

/// Extract text from a single file based on its extension.
///
/// Returns `Ok(None)` for unsupported types (the file is skipped with a
/// warning); any `Err` aborts the whole upload batch.
pub fn extract_text(file: &UploadedFile) -> Result<Option<String>, ApiError> {
    let ext = file.extension();
    match ext.as_str() {
        "pdf" => pdf::extract_pdf_text(&file.bytes, &file.filename).map(Some),
        "docx" => docx::extract_docx_text(&file.bytes, &file.filename).map(Some),
        "csv" => tabular::parse_csv_to_text(&file.bytes).map(Some),
        "xlsx" => tabular::parse_xlsx_to_text(&file.bytes, &file.filename).map(Some),
        "txt" | "md" => Ok(Some(String::from_utf8_lossy(&file.bytes).into_owned())),
        _ if IMAGE_EXTENSIONS.contains(&ext.as_str()) => {
            ocr::ocr_image_bytes(&file.bytes, &ext).map(Some)
        }
        _ => {
            log::warn!("skipping unsupported file type: {}", file.filename);
            Ok(None)
        }
    }
}

/// Guess a MIME type from the filename extension, for download responses.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lowercased() {
        let file = UploadedFile {
            filename: "Notes.PDF".into(),
            bytes: Vec::new(),
        };
        assert_eq!(file.extension(), "pdf");
    }

    #[test]
    fn test_plain_text_passthrough() {
        let file = UploadedFile {
            filename: "readme.txt".into(),
            bytes: b"hello world".to_vec(),
        };
        assert_eq!(extract_text(&file).unwrap(), Some("hello world".into()));
    }

    #[test]
    fn test_unsupported_type_skipped() {
        let file = UploadedFile {
            filename: "archive.tar.gz".into(),
            bytes: vec![0, 1, 2],
        };
        assert_eq!(extract_text(&file).unwrap(), None);
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.csv"), "text/csv");
        assert_eq!(content_type_for("a.unknown"), "application/octet-stream");
    }
}
