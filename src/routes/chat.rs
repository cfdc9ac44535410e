//! Retrieval-augmented chat endpoint.

use crate::error::ApiError;
use crate::protocol::{ChatRequest, ChatResponse, IndexMsg};
use crate::responder;
use crate::roles::Role;
use crate::routes::parse_role;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use tokio::sync::oneshot;

const RETRIEVAL_LIMIT: usize = 4;
const DEFAULT_SESSION: &str = "default";

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = request.message.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::Validation("message must not be empty".into()));
    }

    // Without a stated role retrieval runs at the most restrictive tier.
    let role = match request.role.as_deref() {
        Some(raw) => parse_role(raw)?,
        None => Role::Student,
    };
    let session_id = request
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let (tx, rx) = oneshot::channel();
    state
        .index_tx
        .send(IndexMsg::Search {
            query: question.clone(),
            role,
            limit: RETRIEVAL_LIMIT,
            respond_to: tx,
        })
        .await
        .map_err(|_| ApiError::Internal("index actor is not running".into()))?;
    let context = rx
        .await
        .map_err(|_| ApiError::Internal("index actor dropped the request".into()))??;

    let history = {
        let sessions = state.sessions.read().await;
        sessions.get(&session_id).cloned().unwrap_or_default()
    };

    let messages = responder::build_messages(&history, &context, &question);
    let answer = state.llm.complete(&messages).await?;
    let response = responder::append_sources(&answer, &context);

    {
        let mut sessions = state.sessions.write().await;
        sessions
            .entry(session_id)
            .or_default()
            .push((question, answer));
    }

    Ok(Json(ChatResponse { response }))
}
