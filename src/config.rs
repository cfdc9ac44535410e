//! Runtime configuration from CLI flags and environment.

use clap::Parser;

pub const DEFAULT_HOST: &str = "127.0.0.1";
// Use a less common default port to reduce clashes with local services.
pub const DEFAULT_PORT: u16 = 43080;
pub const DEFAULT_DATA_DIR: &str = "./campus-data";
pub const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Parser, Debug, Clone)]
#[command(name = "campus-chat", about = "Campus document chatbot API server")]
pub struct CliArgs {
    /// Host interface to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
    /// Port to bind
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Directory for uploaded files, the SQLite database and the vector index
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,
    /// API key for the hosted chat-completion service
    #[arg(long, env = "GROQ_API_KEY")]
    pub groq_api_key: String,
    /// Secret for signing time-limited download URLs
    #[arg(long, env = "SIGNED_URL_SECRET")]
    pub signing_secret: String,
    /// Chat-completion model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
    /// Base URL of the OpenAI-compatible chat-completion API
    #[arg(long, default_value = DEFAULT_LLM_BASE_URL)]
    pub llm_base_url: String,
}
