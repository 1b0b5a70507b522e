//! Language-model clients for the chat binary.
//!
//! `OpenAiCompatClient` talks to any OpenAI-compatible chat-completions
//! endpoint. `ExtractiveModel` is a deterministic offline stand-in: it
//! declines to paraphrase, scores rerank batches by term overlap, and
//! answers by quoting the sources with citations, so the whole REPL
//! works with no model server at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use paperground_core::error::ModelError;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::term_tokens;

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiCompatClient {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatClient {
    async fn complete(
        &self,
        prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(opts.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(opts.timeout)
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited(status.to_string()));
        }
        if status.is_server_error() {
            return Err(ModelError::Transport(format!("server returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Failed(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelError::Malformed("response had no choices".to_string()))?;
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// Deterministic offline model. Recognizes the pipeline's three prompt
/// shapes and produces useful output for two of them; paraphrasing is
/// skipped by returning no restatements.
pub struct ExtractiveModel;

#[async_trait]
impl LanguageModel for ExtractiveModel {
    async fn complete(
        &self,
        prompt: &str,
        _opts: &CompletionOptions,
    ) -> Result<String, ModelError> {
        if prompt.starts_with("Restate the question") {
            return Ok(String::new());
        }
        if prompt.starts_with("Rate how relevant") {
            return Ok(score_batch(prompt));
        }
        Ok(extract_answer(prompt))
    }
}

/// Score each `Passage N (...)` paragraph 0-10 by query-term overlap.
fn score_batch(prompt: &str) -> String {
    let question = prompt
        .lines()
        .find_map(|l| l.strip_prefix("Question: "))
        .unwrap_or_default();
    let question_terms = term_tokens(question);

    let mut lines = Vec::new();
    for block in prompt.split("\n\n") {
        let Some(rest) = block.trim().strip_prefix("Passage ") else {
            continue;
        };
        let Some((index, text)) = rest.split_once(':') else {
            continue;
        };
        let index: String = index.chars().take_while(char::is_ascii_digit).collect();
        if index.is_empty() {
            continue;
        }
        let passage_terms = term_tokens(text);
        let overlap = question_terms
            .iter()
            .filter(|t| passage_terms.contains(*t))
            .count();
        let score = (overlap * 3).min(10);
        lines.push(format!("{index}: {score}"));
    }
    lines.join("\n")
}

/// Quote the first sentence of each source with its citation marker.
fn extract_answer(prompt: &str) -> String {
    let mut answer = String::new();
    let mut current_citation: Option<String> = None;
    for line in prompt.lines() {
        if let Some(rest) = line.strip_prefix("[Source: ") {
            if let Some(inner) = rest.strip_suffix(']') {
                current_citation = Some(inner.to_string());
            }
            continue;
        }
        if let Some(citation) = current_citation.take() {
            let sentence = line.split(['.', '!', '?']).next().unwrap_or(line).trim();
            if !sentence.is_empty() {
                answer.push_str(&format!("{sentence} [{citation}]. "));
            }
        }
    }
    if answer.is_empty() {
        "The provided sources do not contain an answer.".to_string()
    } else {
        answer.trim_end().to_string()
    }
}
