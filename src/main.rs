use campus_chat::actors::index_actor::IndexActor;
use campus_chat::config::CliArgs;
use campus_chat::db::CampusDb;
use campus_chat::llm::LlmClient;
use campus_chat::store::FileStore;
use campus_chat::{router, AppState};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = CliArgs::parse();

    let data_dir = PathBuf::from(&args.data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let db = CampusDb::open(&data_dir.join("campus.db"))?;
    let store = FileStore::new(&data_dir, &args.signing_secret);
    store.init().await?;
    let llm = LlmClient::new(args.llm_base_url, args.groq_api_key, args.model);

    let (index_tx, index_rx) = mpsc::channel(32);
    let actor = IndexActor::new(index_rx, data_dir.join("index"));
    tokio::spawn(actor.run());

    let state = AppState::new(index_tx, db, store, llm);
    let app = router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("campus-chat listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
