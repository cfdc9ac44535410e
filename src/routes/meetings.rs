//! Users, timetables and the meeting-booking ledger.

use crate::error::ApiError;
use crate::protocol::{BookingForm, BookingOutcome, MeetingRecord, NewUser, UserRecord};
use crate::routes::parse_role;
use crate::timetable::{self, Schedule};
use crate::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<Json<UserRecord>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("user name must not be empty".into()));
    }
    let role = parse_role(&payload.role)?;
    Ok(Json(state.db.insert_user(name, role, payload.email.trim())?))
}

pub async fn list_teachers(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    Ok(Json(state.db.list_teachers()?))
}

/// Multipart upload: a `teacher_id` field plus one XLSX timetable file.
pub async fn upload_timetable(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut teacher_id: Option<String> = None;
    let mut workbook: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "teacher_id" || name == "teacherId" {
            teacher_id = Some(
                field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid teacher_id field: {}", e)))?,
            );
        } else if let Some(filename) = field.file_name().map(|f| f.to_string()) {
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::Validation(format!("failed to read '{}': {}", filename, e))
            })?;
            workbook = Some((filename, bytes.to_vec()));
        }
    }

    let teacher_id = teacher_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("teacher_id is required".into()))?;
    let (filename, bytes) =
        workbook.ok_or_else(|| ApiError::Validation("no timetable file in upload".into()))?;
    if !filename.to_lowercase().ends_with(".xlsx") {
        return Err(ApiError::Validation(
            "timetable must be an .xlsx workbook".into(),
        ));
    }

    let schedule = timetable::parse_timetable_xlsx(&bytes)?;
    state.db.set_timetable(teacher_id.trim(), &schedule)?;

    log::info!("stored timetable for teacher {}", teacher_id.trim());
    Ok(Json(json!({
        "message": "Timetable uploaded successfully",
        "schedule": schedule,
    })))
}

pub async fn get_timetable(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    state
        .db
        .get_timetable(&teacher_id)?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("no timetable found for teacher '{}'", teacher_id))
        })
}

/// Book a meeting slot. Rule violations come back as a rejection payload
/// with the remaining open slots, not as an error status.
pub async fn book_meeting(
    State(state): State<AppState>,
    Form(form): Form<BookingForm>,
) -> Result<Json<BookingOutcome>, ApiError> {
    if form.student_id.trim().is_empty() {
        return Err(ApiError::Validation("student_id is required".into()));
    }
    let teacher = state
        .db
        .find_teacher_by_name(&form.teacher_name)?
        .ok_or_else(|| {
            ApiError::NotFound(format!("teacher '{}' not found", form.teacher_name))
        })?;

    let outcome = state
        .db
        .book_meeting(&teacher, form.student_id.trim(), &form.date, &form.time)?;
    if outcome.success {
        log::info!(
            "booked meeting with {} on {} at {}",
            teacher.name,
            form.date,
            form.time
        );
    }
    Ok(Json(outcome))
}

pub async fn available_slots(
    State(state): State<AppState>,
    Path((teacher_id, date)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.available_slots(&teacher_id, &date)?))
}

#[derive(Deserialize)]
pub struct MeetingListParams {
    pub user_role: Option<String>,
}

pub async fn list_meetings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<MeetingListParams>,
) -> Result<Json<Vec<MeetingRecord>>, ApiError> {
    let role = match params.user_role.as_deref() {
        Some(raw) => Some(parse_role(raw)?),
        None => None,
    };
    Ok(Json(state.db.list_meetings(&user_id, role)?))
}

pub async fn delete_meeting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.delete_meeting(&id)? {
        return Err(ApiError::NotFound(format!("meeting '{}' not found", id)));
    }
    Ok(Json(json!({ "message": "Meeting cancelled" })))
}
