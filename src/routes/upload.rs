//! Upload endpoint: multipart batch of files plus a `role` field.
//!
//! Extraction and chunking happen on a blocking thread; the resulting chunks
//! replace the vector index via the index actor. Extraction failure on any
//! file aborts the whole batch so a half-indexed state never becomes
//! visible.

use crate::chunker;
use crate::error::ApiError;
use crate::extract::{self, UploadedFile};
use crate::protocol::{FileDetail, IndexMsg, UploadResponse};
use crate::routes::parse_role;
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use tokio::sync::oneshot;

pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut role_raw: Option<String> = None;
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "role" {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("invalid role field: {}", e)))?;
            role_raw = Some(value);
            continue;
        }

        let Some(filename) = field.file_name().map(|f| f.to_string()) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read '{}': {}", filename, e)))?;
        files.push(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    let role = parse_role(role_raw.as_deref().unwrap_or(""))?;
    if files.is_empty() {
        return Err(ApiError::Validation("no files in upload".into()));
    }

    log::info!("processing upload of {} file(s) for role {}", files.len(), role);

    // Extraction is CPU-bound (PDF parsing, OCR), keep it off the runtime.
    let batch_label = files[0].filename.clone();
    let (files, texts) = tokio::task::spawn_blocking(move || {
        let mut texts = Vec::new();
        for file in &files {
            if let Some(text) = extract::extract_text(file)? {
                texts.push(text);
            }
        }
        Ok::<_, ApiError>((files, texts))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("extraction task panicked: {}", e)))??;

    let chunks = chunker::chunk_batch(&texts, &batch_label, role)?;

    // Persist the originals and their metadata before indexing, so a signed
    // download is possible as soon as the upload response returns.
    let mut file_details = Vec::with_capacity(files.len());
    for file in &files {
        state.store.save(&file.filename, &file.bytes).await?;
        let content_type = extract::content_type_for(&file.filename);
        state
            .db
            .insert_document(&file.filename, content_type, role, file.bytes.len())?;
        file_details.push(FileDetail {
            name: file.filename.clone(),
            size: file.bytes.len(),
            content_type: content_type.to_string(),
            role: role.as_str().to_string(),
        });
    }

    let (tx, rx) = oneshot::channel();
    state
        .index_tx
        .send(IndexMsg::Rebuild {
            chunks,
            respond_to: tx,
        })
        .await
        .map_err(|_| ApiError::Internal("index actor is not running".into()))?;
    let indexed = rx
        .await
        .map_err(|_| ApiError::Internal("index actor dropped the request".into()))??;

    Ok(Json(UploadResponse {
        message: format!(
            "Successfully processed {} file(s) into {} chunks",
            file_details.len(),
            indexed
        ),
        file_details,
    }))
}
