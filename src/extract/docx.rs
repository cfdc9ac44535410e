//! DOCX text extraction. A DOCX file is a ZIP archive; the body text lives
//! in `word/document.xml` inside `<w:t>` runs.

use crate::error::ApiError;
use std::io::{Cursor, Read};

/// Extract the plain text content from a DOCX file held in memory.
pub fn extract_docx_text(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ApiError::Validation(format!("'{}' is not a valid DOCX archive: {}", filename, e)))?;

    let mut doc_xml = archive
        .by_name("word/document.xml")
        .map_err(|_| ApiError::Validation(format!("No document.xml found in '{}'", filename)))?;

    let mut xml_content = String::new();
    doc_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ApiError::Validation(format!("Failed to read document.xml in '{}': {}", filename, e)))?;

    Ok(extract_plaintext_from_docx_xml(&xml_content))
}

/// Pull text runs out of WordprocessingML without a full XML parser: track
/// `<w:t>` open/close state and start new lines at paragraph tags.
pub fn extract_plaintext_from_docx_xml(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut chars = xml.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for tc in chars.by_ref() {
                if tc == '>' {
                    break;
                }
                tag.push(tc);
            }

            if tag.starts_with("w:t") && !tag.starts_with("w:t/") && !tag.ends_with('/') {
                in_text = true;
            } else if tag == "/w:t" {
                in_text = false;
            } else if tag.starts_with("w:p") && !tag.starts_with("w:p/") && !tag.ends_with('/') {
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
        } else if in_text {
            result.push(c);
        }
    }

    result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_runs() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t> world</w:t></w:r></w:p><w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_plaintext_from_docx_xml(xml);
        assert_eq!(text, "Hello world\nSecond paragraph");
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = r#"<w:p><w:t>Tom &amp; Jerry &lt;3</w:t></w:p>"#;
        assert_eq!(extract_plaintext_from_docx_xml(xml), "Tom & Jerry <3");
    }

    #[test]
    fn test_self_closing_tags_ignored() {
        let xml = r#"<w:p><w:t/><w:t>real</w:t></w:p>"#;
        assert_eq!(extract_plaintext_from_docx_xml(xml), "real");
    }

    #[test]
    fn test_invalid_archive_rejected() {
        let err = extract_docx_text(b"not a zip", "bad.docx").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
