// src/analysis/generic.rs
use crate::llm::{CompletionService, ANALYST_PROMPT};
use serde_json::{json, Value};
use tracing::warn;

/// Reply when no completion service is configured or it fails.
pub const NO_SERVICE_MESSAGE: &str = "Generic analysis requires OpenAI API key";

/// Forward the question to the completion service; the reply text goes under `"analysis"`.
pub async fn run(completion: Option<&dyn CompletionService>, question: &str) -> Value {
    if let Some(service) = completion {
        match service.complete(ANALYST_PROMPT, question).await {
            Ok(text) => return json!({ "analysis": text }),
            Err(e) => warn!("completion failed: {:#}", e),
        }
    }
    json!({ "message": NO_SERVICE_MESSAGE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use futures::future::BoxFuture;

    struct Echo;

    impl CompletionService for Echo {
        fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok(format!("{} | {}", system.len(), user)) })
        }
    }

    struct Broken;

    impl CompletionService for Broken {
        fn complete<'a>(&'a self, _: &'a str, _: &'a str) -> BoxFuture<'a, Result<String>> {
            Box::pin(async { Err(anyhow!("503 Service Unavailable")) })
        }
    }

    #[tokio::test]
    async fn reply_is_surfaced_verbatim() {
        let v = run(Some(&Echo as &dyn CompletionService), "mean of 1,2,3?").await;
        assert_eq!(
            v,
            json!({ "analysis": format!("{} | mean of 1,2,3?", ANALYST_PROMPT.len()) })
        );
    }

    #[tokio::test]
    async fn missing_or_failing_service_gives_message() {
        let expected = json!({ "message": NO_SERVICE_MESSAGE });
        assert_eq!(run(None, "anything").await, expected);
        assert_eq!(run(Some(&Broken as &dyn CompletionService), "anything").await, expected);
    }
}
