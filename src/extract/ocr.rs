//! OCR via the external `tesseract` binary.
//!
//! Image bytes are staged in a temp directory and fed to tesseract with
//! stdout output. Standalone image uploads hard-fail when tesseract is
//! missing; embedded PDF images degrade to a warning instead (see the pdf
//! module).

use crate::error::ApiError;
use std::io::Write;
use std::process::Command;

/// Check whether the tesseract binary is available on the system.
pub fn is_ocr_available() -> bool {
    let tesseract = Command::new("tesseract").arg("--version").output().is_ok();
    if !tesseract {
        log::debug!("tesseract not found - install tesseract-ocr for OCR support");
    }
    tesseract
}

/// Run tesseract over raw image bytes and return the recognized text.
pub fn ocr_image_bytes(bytes: &[u8], extension: &str) -> Result<String, ApiError> {
    if !is_ocr_available() {
        return Err(ApiError::Upstream(
            "OCR requires tesseract-ocr to be installed".into(),
        ));
    }

    let temp_dir = tempfile::tempdir()
        .map_err(|e| ApiError::Internal(format!("failed to create temp dir: {}", e)))?;
    let image_path = temp_dir.path().join(format!("input.{}", extension));

    let mut staged = std::fs::File::create(&image_path)
        .map_err(|e| ApiError::Internal(format!("failed to stage image: {}", e)))?;
    staged
        .write_all(bytes)
        .map_err(|e| ApiError::Internal(format!("failed to stage image: {}", e)))?;
    drop(staged);

    let output = Command::new("tesseract")
        .arg(&image_path)
        .arg("stdout")
        .arg("-l")
        .arg("eng")
        .output()
        .map_err(|e| ApiError::Upstream(format!("failed to run tesseract: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApiError::Upstream(format!("tesseract failed: {}", stderr)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
