//! Command Suggester backed by a remote text-completion endpoint.
//!
//! One POST per call: the query goes out as the `prompt` field, the first
//! choice's `text` field comes back untouched. No retries, no streaming.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Errors surfaced by [`Suggester::suggest`].
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error(
        "API key not found. Set PROMPTSH_API_KEY environment variable \
         or add api_key to config file."
    )]
    MissingApiKey,
    #[error("failed to reach completion endpoint")]
    Transport(#[from] reqwest::Error),
    #[error("completion request failed with status {0}")]
    Api(StatusCode),
    #[error("completion response contained no choices")]
    NoChoices,
}

/// Client for the completion endpoint.
pub struct Suggester {
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: Client,
}

impl Suggester {
    /// Create a suggester from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: config.api.endpoint.clone(),
            api_key: config.api.api_key.clone(),
            max_tokens: config.api.max_tokens,
            temperature: config.api.temperature,
            client: Client::new(),
        }
    }

    /// Get the API key from config or environment.
    fn get_api_key(&self) -> Result<String, SuggestError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("PROMPTSH_API_KEY").ok())
            .ok_or(SuggestError::MissingApiKey)
    }

    /// Ask the endpoint to turn `query` into a command.
    ///
    /// Returns the first choice's text exactly as the service produced it,
    /// whitespace included.
    pub async fn suggest(&self, query: &str) -> Result<String, SuggestError> {
        let api_key = self.get_api_key()?;

        let request = CompletionRequest {
            prompt: query.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Sending completion request to {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SuggestError::Api(response.status()));
        }

        let completion: CompletionResponse = response.json().await?;
        debug!("Received {} choice(s)", completion.choices.len());

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(SuggestError::NoChoices)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Serve canned HTTP responses on a local port, one connection per entry,
    /// forwarding each raw request to the returned channel.
    async fn mock_endpoint(
        responses: Vec<(u16, serde_json::Value)>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                let _ = tx.send(request);

                let body = body.to_string();
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        (format!("http://{}", addr), rx)
    }

    /// Read a full HTTP request (headers plus content-length body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn test_suggester(endpoint: &str) -> Suggester {
        let mut config = Config::default();
        config.api.endpoint = endpoint.to_string();
        config.api.api_key = Some("test-key".to_string());
        Suggester::new(&config)
    }

    #[tokio::test]
    async fn test_returns_first_choice_verbatim() {
        let (endpoint, _rx) = mock_endpoint(vec![(
            200,
            serde_json::json!({"choices": [{"text": "kubectl get pods"}]}),
        )])
        .await;

        let command = test_suggester(&endpoint).suggest("list pods").await.unwrap();
        assert_eq!(command, "kubectl get pods");
    }

    #[tokio::test]
    async fn test_choice_text_is_not_trimmed() {
        let (endpoint, _rx) = mock_endpoint(vec![(
            200,
            serde_json::json!({"choices": [{"text": "  ls -la\n"}]}),
        )])
        .await;

        let command = test_suggester(&endpoint).suggest("list files").await.unwrap();
        assert_eq!(command, "  ls -la\n");
    }

    #[tokio::test]
    async fn test_non_200_carries_status() {
        let (endpoint, _rx) =
            mock_endpoint(vec![(500, serde_json::json!({"error": "overloaded"}))]).await;

        let err = test_suggester(&endpoint).suggest("list pods").await.unwrap_err();
        match err {
            SuggestError::Api(status) => assert_eq!(status.as_u16(), 500),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_query_still_sends_request() {
        let (endpoint, mut rx) =
            mock_endpoint(vec![(200, serde_json::json!({"choices": [{"text": "ls"}]}))]).await;

        let command = test_suggester(&endpoint).suggest("").await.unwrap();
        assert_eq!(command, "ls");

        let request = rx.recv().await.unwrap();
        assert!(request.contains(r#""prompt":"""#));
        // Header names are lowercased on the wire
        assert!(request.to_lowercase().contains("authorization: bearer test-key"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let (endpoint, _rx) = mock_endpoint(vec![(200, serde_json::json!({"choices": []}))]).await;

        let err = test_suggester(&endpoint).suggest("list pods").await.unwrap_err();
        assert!(matches!(err, SuggestError::NoChoices));
    }

    #[tokio::test]
    async fn test_identical_requests_yield_identical_results() {
        let body = serde_json::json!({"choices": [{"text": "df -h"}]});
        let (endpoint, _rx) = mock_endpoint(vec![(200, body.clone()), (200, body)]).await;

        let suggester = test_suggester(&endpoint);
        let first = suggester.suggest("disk usage").await.unwrap();
        let second = suggester.suggest("disk usage").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        std::env::remove_var("PROMPTSH_API_KEY");
        let mut config = Config::default();
        config.api.api_key = None;

        let err = Suggester::new(&config).suggest("list pods").await.unwrap_err();
        assert!(matches!(err, SuggestError::MissingApiKey));
    }
}
