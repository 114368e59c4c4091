// src/llm/mod.rs
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System prompt sent with every generic question.
pub const ANALYST_PROMPT: &str =
    "You are a data analyst. Analyze the question and provide appropriate responses.";

/// A text-completion backend. Injected into the analyzer so tests can supply a fake.
pub trait CompletionService: Send + Sync {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, "requesting completion");

        let resp: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: user,
                    },
                ],
            })
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?
            .json()
            .await
            .context("decoding completion response")?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion response had no content"))
    }
}

impl CompletionService for OpenAiClient {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.chat(system, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_chat_schema() -> Result<()> {
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [
                ChatMessage {
                    role: "system",
                    content: ANALYST_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "what is the mean?",
                },
            ],
        })?;
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "what is the mean?");
        Ok(())
    }

    #[test]
    fn response_content_is_extracted() -> Result<()> {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"42"}}]}"#,
        )?;
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("42"));
        Ok(())
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = OpenAiClient::new(Client::new(), "http://localhost:8000/v1/", "k", "m");
        assert_eq!(c.base_url, "http://localhost:8000/v1");
        assert_eq!(c.model(), "m");
    }
}
