//! Client for the hosted OpenAI-compatible chat-completion API.

use crate::error::ApiError;
use crate::protocol::ChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TEMPERATURE: f32 = 0.2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        LlmClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    /// Run one chat completion. A transient failure is retried once before
    /// the error surfaces as [`ApiError::Upstream`].
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        match self.complete_once(messages).await {
            Ok(content) => Ok(content),
            Err(first_err) => {
                log::warn!("chat completion failed, retrying once: {}", first_err);
                tokio::time::sleep(RETRY_DELAY).await;
                self.complete_once(messages).await.map_err(|e| {
                    ApiError::Upstream(format!("chat completion failed: {}", e))
                })
            }
        }
    }

    async fn complete_once(&self, messages: &[ChatMessage]) -> Result<String, String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            stream: false,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request error: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("API returned {}: {}", status, text));
        }

        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| format!("invalid response body: {}", e))?;

        data.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "response contained no choices".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(socket: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&data[..pos]).to_ascii_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= pos + 4 + content_length {
                    break;
                }
            }
        }
    }

    /// Serve one canned (status, body) response per incoming connection.
    async fn spawn_stub(responses: Vec<(u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn good_body(content: &str) -> String {
        format!(
            r#"{{"choices":[{{"message":{{"role":"assistant","content":"{}"}}}}]}}"#,
            content
        )
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let base = spawn_stub(vec![(200, good_body("hello there"))]).await;
        let client = LlmClient::new(base, "key".into(), "test-model".into());
        let answer = client.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(answer, "hello there");
    }

    #[tokio::test]
    async fn test_complete_retries_after_server_error() {
        let base = spawn_stub(vec![(500, "{}".to_string()), (200, good_body("second try"))]).await;
        let client = LlmClient::new(base, "key".into(), "test-model".into());
        let answer = client.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(answer, "second try");
    }

    #[tokio::test]
    async fn test_complete_fails_after_two_errors() {
        let base = spawn_stub(vec![(500, "{}".to_string()), (500, "{}".to_string())]).await;
        let client = LlmClient::new(base, "key".into(), "test-model".into());
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_empty_choices_is_upstream_error() {
        let empty = r#"{"choices":[]}"#.to_string();
        let base = spawn_stub(vec![(200, empty.clone()), (200, empty)]).await;
        let client = LlmClient::new(base, "key".into(), "test-model".into());
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
        assert!(err.to_string().contains("no choices"));
    }
}
