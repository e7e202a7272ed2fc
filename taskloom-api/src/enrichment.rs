/// AI enrichment: detached post-commit task decoration
///
/// After a task is created (and its response already sent), a detached job
/// asks the configured inference service for a one-line summary and a
/// sentiment, then writes both back to the store of record and invalidates
/// the task's item cache entry so the next read reflects them.
///
/// # Contract
///
/// - Fire-and-forget: `spawn` hands the job to the Tokio runtime, which
///   owns it independently of the originating request's lifecycle. The job
///   keeps running after the response is transmitted and is not cancelled
///   by request teardown.
/// - Best-effort: any failure at any stage (service unreachable, malformed
///   response, no extractable JSON, empty summary, database write failure)
///   is logged and the job stops. Nothing propagates to the creating
///   request and nothing is retried.
/// - The completion text may wrap the JSON object in prose or markdown
///   code fences; the first balanced JSON object found is used.
/// - `sentiment` outside the closed enum defaults to `neutral`; the
///   summary is truncated to [`MAX_SUMMARY_LEN`] characters.

use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use taskloom_shared::cache::task_cache::TaskCache;
use taskloom_shared::models::task::{Sentiment, Task};

use crate::config::AiConfig;

/// Maximum stored summary length in characters
pub const MAX_SUMMARY_LEN: usize = 280;

/// Maximum description length fed into the prompt
const MAX_PROMPT_DESCRIPTION_LEN: usize = 500;

/// Client for the external text-completion service
pub struct Enricher {
    config: AiConfig,
    http: reqwest::Client,
}

/// Fields extracted from the completion
#[derive(Debug, Deserialize)]
struct EnrichmentPayload {
    summary: Option<String>,
    sentiment: Option<String>,
}

impl Enricher {
    /// Creates an enricher for a configured inference service
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Spawns the enrichment job for a freshly created task.
    ///
    /// Returns immediately; the runtime keeps the job alive past the
    /// response lifecycle of the originating request.
    pub fn spawn(self: std::sync::Arc<Self>, db: PgPool, cache: TaskCache, task: Task) {
        tokio::spawn(async move {
            self.run(db, cache, task).await;
        });
    }

    /// Runs the enrichment flow to completion; every exit path is silent
    /// toward the originating request
    async fn run(&self, db: PgPool, cache: TaskCache, task: Task) {
        let completion = match self.complete(&build_prompt(&task)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "Enrichment call failed");
                return;
            }
        };

        let Some(raw) = extract_json_object(&completion) else {
            tracing::warn!(task_id = task.id, "No JSON object in enrichment response");
            return;
        };

        let payload: EnrichmentPayload = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "Unparseable enrichment JSON");
                return;
            }
        };

        let summary = match payload.summary {
            Some(s) if !s.trim().is_empty() => truncate_summary(s.trim()),
            _ => {
                tracing::warn!(task_id = task.id, "Enrichment returned an empty summary");
                return;
            }
        };

        let sentiment = payload
            .sentiment
            .as_deref()
            .and_then(Sentiment::parse)
            .unwrap_or(Sentiment::Neutral);

        if let Err(e) = Task::set_enrichment(&db, task.id, &summary, sentiment).await {
            tracing::warn!(task_id = task.id, error = %e, "Failed to persist enrichment");
            return;
        }

        // The next read of this task must reflect the AI fields
        cache.invalidate_item(task.user_id, task.id).await;

        tracing::info!(task_id = task.id, sentiment = ?sentiment, "Task enriched");
    }

    /// Calls the chat-completions endpoint and returns the raw completion
    /// text
    async fn complete(&self, prompt: &str) -> Result<String, reqwest::Error> {
        let mut request = self.http.post(&self.config.api_url).json(&json!({
            "model": self.config.model,
            "max_tokens": 200,
            "messages": [{"role": "user", "content": prompt}],
        }));

        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let body: serde_json::Value = request.send().await?.error_for_status()?.json().await?;

        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }
}

/// Builds the bounded enrichment prompt from title + description
fn build_prompt(task: &Task) -> String {
    let description = task
        .description
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(MAX_PROMPT_DESCRIPTION_LEN)
        .collect::<String>();

    format!(
        "Summarize this task in one sentence and classify its sentiment.\n\
         Respond with only a JSON object: {{\"summary\": string, \"sentiment\": \
         \"positive\"|\"neutral\"|\"negative\"}}.\n\nTitle: {}\nDescription: {}",
        task.title, description
    )
}

/// Extracts the first balanced `{ ... }` JSON object from free-form text.
///
/// Tolerates surrounding prose and markdown code fences; respects braces
/// inside string literals.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Truncates a summary to [`MAX_SUMMARY_LEN`] characters on a char
/// boundary
fn truncate_summary(summary: &str) -> String {
    summary.chars().take(MAX_SUMMARY_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let text = r#"{"summary": "Buy milk", "sentiment": "neutral"}"#;
        assert_eq!(extract_json_object(text), Some(text.to_string()));
    }

    #[test]
    fn test_extract_from_markdown_fence() {
        let text = "Sure! Here is the JSON:\n```json\n{\"summary\": \"Ship it\", \"sentiment\": \"positive\"}\n```\nHope that helps.";
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"summary": "Ship it", "sentiment": "positive"}"#.to_string())
        );
    }

    #[test]
    fn test_extract_respects_braces_in_strings() {
        let text = r#"{"summary": "Fix the {weird} bug", "sentiment": "negative"}"#;
        assert_eq!(extract_json_object(text), Some(text.to_string()));
    }

    #[test]
    fn test_extract_nested_object() {
        let text = r#"noise {"a": {"b": 1}, "summary": "x"} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": {"b": 1}, "summary": "x"}"#.to_string())
        );
    }

    #[test]
    fn test_extract_none_without_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("unbalanced { \"a\": 1"), None);
        assert_eq!(extract_json_object(""), None);
    }

    #[test]
    fn test_truncate_summary() {
        let long = "x".repeat(MAX_SUMMARY_LEN + 50);
        assert_eq!(truncate_summary(&long).chars().count(), MAX_SUMMARY_LEN);

        assert_eq!(truncate_summary("short"), "short");

        // Truncation lands on a char boundary for multi-byte text
        let unicode = "日".repeat(MAX_SUMMARY_LEN + 5);
        assert_eq!(truncate_summary(&unicode).chars().count(), MAX_SUMMARY_LEN);
    }

    #[test]
    fn test_invalid_sentiment_defaults_to_neutral() {
        let payload: EnrichmentPayload =
            serde_json::from_str(r#"{"summary": "S", "sentiment": "elated"}"#).unwrap();
        let sentiment = payload
            .sentiment
            .as_deref()
            .and_then(Sentiment::parse)
            .unwrap_or(Sentiment::Neutral);
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_missing_sentiment_defaults_to_neutral() {
        let payload: EnrichmentPayload = serde_json::from_str(r#"{"summary": "S"}"#).unwrap();
        let sentiment = payload
            .sentiment
            .as_deref()
            .and_then(Sentiment::parse)
            .unwrap_or(Sentiment::Neutral);
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_prompt_bounds_description() {
        let task_description = "d".repeat(2000);
        let prompt = format!(
            "Title: {}\nDescription: {}",
            "T",
            task_description
                .chars()
                .take(MAX_PROMPT_DESCRIPTION_LEN)
                .collect::<String>()
        );
        assert!(prompt.len() < 600);
    }
}
