pub mod actors;
pub mod booking;
pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod llm;
pub mod protocol;
pub mod responder;
pub mod roles;
pub mod routes;
pub mod store;
pub mod timetable;

use crate::db::CampusDb;
use crate::llm::LlmClient;
use crate::protocol::IndexMsg;
use crate::store::FileStore;
use axum::routing::{delete, get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Per-session conversation history: session id -> (question, answer) pairs.
pub type SessionHistory = Arc<RwLock<HashMap<String, Vec<(String, String)>>>>;

#[derive(Clone)]
pub struct AppState {
    pub index_tx: mpsc::Sender<IndexMsg>,
    pub db: CampusDb,
    pub store: FileStore,
    pub llm: LlmClient,
    pub sessions: SessionHistory,
}

impl AppState {
    pub fn new(
        index_tx: mpsc::Sender<IndexMsg>,
        db: CampusDb,
        store: FileStore,
        llm: LlmClient,
    ) -> Self {
        AppState {
            index_tx,
            db,
            store,
            llm,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload/", post(routes::upload::upload_files))
        .route("/chat/", post(routes::chat::chat))
        .route(
            "/retrieve-document/",
            post(routes::documents::retrieve_document),
        )
        .route("/download/:file_name", get(routes::documents::download))
        .route(
            "/recent-files/:role",
            get(routes::documents::recent_files),
        )
        .route(
            "/delete-file/:file_name",
            delete(routes::documents::delete_file),
        )
        .route(
            "/announcements/:role",
            get(routes::announcements::list_announcements),
        )
        .route(
            "/announcement/",
            post(routes::announcements::create_announcement),
        )
        .route(
            "/announcement/:id",
            delete(routes::announcements::delete_announcement),
        )
        .route("/users/", post(routes::meetings::create_user))
        .route("/teachers/", get(routes::meetings::list_teachers))
        .route(
            "/upload-timetable/",
            post(routes::meetings::upload_timetable),
        )
        .route(
            "/timetable/:teacher_id",
            get(routes::meetings::get_timetable),
        )
        .route("/book-meeting/", post(routes::meetings::book_meeting))
        .route(
            "/available-slots/:teacher_id/:date",
            get(routes::meetings::available_slots),
        )
        .route("/meetings/:user_id", get(routes::meetings::list_meetings))
        .route("/meeting/:id", delete(routes::meetings::delete_meeting))
        .with_state(state)
}
