//! Announcement posting and role-scoped listing.

use crate::error::ApiError;
use crate::protocol::{AnnouncementPayload, AnnouncementRecord};
use crate::routes::parse_role;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_LIMIT: usize = 5;

pub async fn create_announcement(
    State(state): State<AppState>,
    Json(payload): Json<AnnouncementPayload>,
) -> Result<Json<AnnouncementRecord>, ApiError> {
    if payload.title.trim().is_empty() || payload.text.trim().is_empty() {
        return Err(ApiError::Validation(
            "announcement title and text must not be empty".into(),
        ));
    }
    let role = parse_role(&payload.role)?;
    let record = state.db.insert_announcement(
        payload.title.trim(),
        payload.text.trim(),
        role,
        payload.is_important,
    )?;
    Ok(Json(record))
}

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Announcements visible to the given role, newest first.
pub async fn list_announcements(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AnnouncementRecord>>, ApiError> {
    let viewer = parse_role(&role)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.db.list_announcements(viewer, limit)?))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.delete_announcement(&id)? {
        return Err(ApiError::NotFound(format!("announcement '{}' not found", id)));
    }
    Ok(Json(json!({ "message": "Announcement deleted" })))
}
