//! PDF text extraction.
//!
//! pdf-extract has better font encoding handling than raw lopdf, but panics
//! on some malformed files, so the call is wrapped in `catch_unwind` with a
//! lopdf content-stream walk as fallback. Embedded JPEG images are OCRed and
//! their text appended, so scanned pages still contribute content.

use crate::error::ApiError;
use crate::extract::ocr;
use lopdf::{Document, Object};

/// Extract all text from a PDF held in memory.
pub fn extract_pdf_text(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    // Use catch_unwind to capture panics from the pdf-extract library.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));

    let mut text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            log::warn!(
                "pdf-extract failed for {}, trying lopdf fallback: {}",
                filename,
                e
            );
            extract_pdf_text_via_lopdf(bytes, filename)?
        }
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            log::warn!(
                "pdf-extract panicked for {}, trying lopdf fallback: {}",
                filename,
                panic_msg
            );
            extract_pdf_text_via_lopdf(bytes, filename)?
        }
    };

    match ocr_embedded_images(bytes, filename) {
        Ok(ocr_text) if !ocr_text.trim().is_empty() => {
            text.push('\n');
            text.push_str(&ocr_text);
        }
        Ok(_) => {}
        Err(e) => log::warn!("embedded image OCR skipped for {}: {}", filename, e),
    }

    Ok(text)
}

/// Fallback PDF text extraction using lopdf when pdf-extract fails.
/// Less accurate for complex fonts but more tolerant of malformed PDFs.
fn extract_pdf_text_via_lopdf(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let doc = Document::load_mem(bytes).map_err(|_| {
        ApiError::Validation(format!(
            "Cannot read '{}': This PDF has an incompatible format. Try re-exporting the PDF from its source application.",
            filename
        ))
    })?;

    let mut all_text = String::new();
    let pages = doc.get_pages();

    for (_page_num, page_id) in pages {
        if let Ok(content) = doc.get_page_content(page_id) {
            let operations = lopdf::content::Content::decode(&content)
                .map(|c| c.operations)
                .unwrap_or_default();

            for op in operations {
                match op.operator.as_str() {
                    // Tj: show text string
                    "Tj" => {
                        if let Some(Object::String(bytes, _)) = op.operands.first() {
                            all_text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                    // TJ: show text array (with kerning)
                    "TJ" => {
                        if let Some(Object::Array(arr)) = op.operands.first() {
                            for item in arr {
                                if let Object::String(bytes, _) = item {
                                    all_text.push_str(&decode_pdf_string(bytes));
                                }
                            }
                        }
                    }
                    // Text positioning that indicates new line/paragraph
                    "Td" | "TD" | "T*" | "'" | "\"" => {
                        if !all_text.ends_with('\n') && !all_text.ends_with(' ') {
                            all_text.push(' ');
                        }
                    }
                    "ET" => {
                        if !all_text.ends_with('\n') {
                            all_text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
        }
        all_text.push('\n'); // page break
    }

    Ok(all_text)
}

// Try UTF-8 first, then Latin-1 fallback.
fn decode_pdf_string(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
}

/// Walk the PDF object table and OCR embedded JPEG image streams (DCTDecode
/// filter). Other image encodings are skipped.
fn ocr_embedded_images(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return Ok(String::new()),
    };

    let mut recognized = String::new();
    for (_id, object) in doc.objects.iter() {
        let Object::Stream(stream) = object else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|n| n == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        let is_jpeg = stream
            .dict
            .get(b"Filter")
            .map(|f| filter_mentions_dct(f))
            .unwrap_or(false);
        if !is_jpeg {
            log::debug!("skipping non-JPEG embedded image in {}", filename);
            continue;
        }

        if !ocr::is_ocr_available() {
            log::warn!(
                "tesseract unavailable, embedded images in {} are not OCRed",
                filename
            );
            return Ok(recognized);
        }

        match ocr::ocr_image_bytes(&stream.content, "jpg") {
            Ok(text) => {
                if !text.trim().is_empty() {
                    recognized.push_str(&text);
                    recognized.push('\n');
                }
            }
            Err(e) => log::warn!("OCR failed for an embedded image in {}: {}", filename, e),
        }
    }

    Ok(recognized)
}

fn filter_mentions_dct(filter: &Object) -> bool {
    match filter {
        Object::Name(name) => name == b"DCTDecode",
        Object::Array(items) => items.iter().any(filter_mentions_dct),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pdf_string_latin1_fallback() {
        // 0xE9 is not valid UTF-8 on its own; Latin-1 maps it to 'é'.
        assert_eq!(decode_pdf_string(&[0x61, 0xE9]), "a\u{e9}");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = extract_pdf_text(b"not a pdf at all", "bad.pdf").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_filter_mentions_dct() {
        assert!(filter_mentions_dct(&Object::Name(b"DCTDecode".to_vec())));
        assert!(filter_mentions_dct(&Object::Array(vec![
            Object::Name(b"FlateDecode".to_vec()),
            Object::Name(b"DCTDecode".to_vec()),
        ])));
        assert!(!filter_mentions_dct(&Object::Name(b"FlateDecode".to_vec())));
    }
}
