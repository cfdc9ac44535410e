//! Shared message and payload types.
//!
//! Actor messages carry a `respond_to` oneshot channel; API payloads use
//! serde with the field casing the frontend expects.

use crate::error::ApiError;
use crate::roles::Role;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

// ============================================================================
// CHUNKS & INDEX ACTOR MESSAGES
// ============================================================================

/// A chunk of extracted text ready for embedding.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub text: String,
    /// Source identifier, `{chunk index}-{batch label}`.
    pub source: String,
    pub role: Role,
    pub chunk_index: usize,
}

/// A chunk returned from a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub content: String,
    pub source: String,
    pub score: f32,
}

/// Commands for the index actor. Processing is serialized by the actor, so a
/// rebuild fully replaces the index before any later search runs.
pub enum IndexMsg {
    /// Replace the whole index with a new upload batch.
    Rebuild {
        chunks: Vec<ChunkRecord>,
        respond_to: oneshot::Sender<Result<usize, ApiError>>,
    },
    /// Embed the query and return the nearest chunks visible to `role`.
    Search {
        query: String,
        role: Role,
        limit: usize,
        respond_to: oneshot::Sender<Result<Vec<ScoredChunk>, ApiError>>,
    },
    /// Drop all indexed chunks (a file was deleted; chat requires re-upload).
    Invalidate {
        respond_to: oneshot::Sender<Result<(), ApiError>>,
    },
}

// ============================================================================
// CHAT
// ============================================================================

/// A single message in the hosted-LLM conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage { role: "system".into(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: "user".into(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage { role: "assistant".into(), content: content.into() }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Requester role for retrieval filtering; defaults to student.
    pub role: Option<String>,
    /// Conversation memory scope; requests without one share a session.
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

// ============================================================================
// UPLOAD & DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FileDetail {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_details: Vec<FileDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveDocumentRequest {
    pub file_name: String,
    pub user_role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveDocumentResponse {
    pub can_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredFileInfo {
    pub name: String,
    pub size: i64,
    pub uploaded: String,
    pub role: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

// ============================================================================
// ANNOUNCEMENTS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnnouncementPayload {
    pub title: String,
    pub text: String,
    pub role: String,
    #[serde(rename = "isImportant", default)]
    pub is_important: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementRecord {
    pub id: String,
    pub title: String,
    pub text: String,
    pub role: String,
    #[serde(rename = "isImportant")]
    pub is_important: bool,
    pub timestamp: String,
}

// ============================================================================
// USERS, TIMETABLES & MEETINGS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingForm {
    pub teacher_name: String,
    pub student_id: String,
    pub date: String,
    pub time: String,
}

/// Outcome of a booking attempt. Rejections are normal payloads, not errors.
#[derive(Debug, Serialize)]
pub struct BookingOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    pub available_slots: Vec<String>,
}

impl BookingOutcome {
    pub fn rejected(message: impl Into<String>, available_slots: Vec<String>) -> Self {
        BookingOutcome {
            success: false,
            message: message.into(),
            meeting_id: None,
            available_slots,
        }
    }

    pub fn scheduled(meeting_id: String) -> Self {
        BookingOutcome {
            success: true,
            message: "Meeting scheduled successfully".into(),
            meeting_id: Some(meeting_id),
            available_slots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRecord {
    pub id: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub student_id: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub created_at: String,
}
