//! Document retrieval, signed downloads and file management.

use crate::error::ApiError;
use crate::extract::content_type_for;
use crate::protocol::{IndexMsg, RetrieveDocumentRequest, RetrieveDocumentResponse, StoredFileInfo};
use crate::routes::parse_role;
use crate::store::FileStore;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

/// Fuzzy-match a requested filename against the stored documents and hand
/// out a signed download URL when the requester's role clears the file's
/// tier. Access denials and misses are normal payloads, not errors.
pub async fn retrieve_document(
    State(state): State<AppState>,
    Json(request): Json<RetrieveDocumentRequest>,
) -> Result<Json<RetrieveDocumentResponse>, ApiError> {
    let viewer = parse_role(&request.user_role)?;

    let documents = state.db.list_documents()?;
    let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();

    let Some(matched) = FileStore::best_match(&request.file_name, &names) else {
        return Ok(Json(RetrieveDocumentResponse {
            can_access: false,
            download_url: None,
            file_name: None,
            message: Some(format!("No document matching '{}' was found", request.file_name)),
        }));
    };

    // best_match only returns names from the listing.
    let doc = documents
        .iter()
        .find(|d| &d.name == matched)
        .ok_or_else(|| ApiError::Internal("matched document vanished".into()))?;
    let doc_role = parse_role(&doc.role)?;

    if !viewer.can_access(doc_role) {
        return Ok(Json(RetrieveDocumentResponse {
            can_access: false,
            download_url: None,
            file_name: Some(doc.name.clone()),
            message: Some(format!(
                "Your role does not have access to '{}'",
                doc.name
            )),
        }));
    }

    Ok(Json(RetrieveDocumentResponse {
        can_access: true,
        download_url: Some(state.store.sign_download(&doc.name)),
        file_name: Some(doc.name.clone()),
        message: None,
    }))
}

#[derive(Deserialize)]
pub struct DownloadParams {
    pub expires: i64,
    pub sig: String,
}

pub async fn download(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    state
        .store
        .verify_download(&file_name, params.expires, &params.sig)?;

    let bytes = state.store.read(&file_name).await?;
    let content_type = content_type_for(&file_name);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Most recent uploads owned by exactly this role tier (not the hierarchy).
pub async fn recent_files(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<Vec<StoredFileInfo>>, ApiError> {
    let role = parse_role(&role)?;
    Ok(Json(state.db.recent_documents(role)?))
}

/// Delete a stored file. The vector index may contain its chunks, so it is
/// invalidated; chat requires a fresh upload afterwards.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state.db.delete_document(&file_name)?;
    let removed = state.store.delete(&file_name).await?;
    if !existed && !removed {
        return Err(ApiError::NotFound(format!(
            "file '{}' not found",
            file_name
        )));
    }

    let (tx, rx) = oneshot::channel();
    state
        .index_tx
        .send(IndexMsg::Invalidate { respond_to: tx })
        .await
        .map_err(|_| ApiError::Internal("index actor is not running".into()))?;
    rx.await
        .map_err(|_| ApiError::Internal("index actor dropped the request".into()))??;

    Ok(Json(json!({
        "message": format!("Deleted '{}'. Chat index cleared; re-upload files to chat again.", file_name)
    })))
}
