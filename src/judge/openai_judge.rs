//! OpenAI-compatible chat-completions judge
//!
//! Sends one JSON-mode request per prompt group at temperature 0 and parses the
//! reply into a [`JudgeEvaluation`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{clamp_score, JudgeBackend, JudgeEvaluation};
use crate::records::ResponseRecord;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

/// Responses quoted to the judge per prompt
pub const MAX_JUDGED_RESPONSES: usize = 10;
/// Characters quoted per response
pub const MAX_RESPONSE_CHARS: usize = 2000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are an expert evaluator of generative model output. \
You receive one prompt and several responses that the same service produced for it under load. \
Judge whether the responses are consistent with each other and correct. \
Reply with a single JSON object with these fields: \
similarity_score (0-10, how alike the responses are in meaning), \
technical_correctness (0-10), \
coherence_score (0-10, whether each response reads as a complete, coherent answer), \
creativity_expected (boolean, true when the prompt invites varied answers), \
issues_detected (array of short strings), \
legitimate_variations (array of short strings describing acceptable differences).";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Fields the judge model is asked to produce
#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    similarity_score: f64,
    technical_correctness: f64,
    coherence_score: f64,
    #[serde(default)]
    creativity_expected: bool,
    #[serde(default)]
    issues_detected: Vec<String>,
    #[serde(default)]
    legitimate_variations: Vec<String>,
}

/// Render the user message for one prompt group
pub fn build_user_message(prompt: &str, category: &str, responses: &[&ResponseRecord]) -> String {
    let mut message = format!(
        "Category: {}\nPrompt: {}\n\nResponses ({} of {} shown):\n",
        category,
        prompt,
        responses.len().min(MAX_JUDGED_RESPONSES),
        responses.len()
    );

    for (i, record) in responses.iter().take(MAX_JUDGED_RESPONSES).enumerate() {
        let text: String = record.response().chars().take(MAX_RESPONSE_CHARS).collect();
        let cut = record.response_length() > MAX_RESPONSE_CHARS;
        message.push_str(&format!(
            "\n--- Response {}{}{} ---\n{}\n",
            i + 1,
            if record.is_truncated() { " [TRUNCATED BY SERVICE]" } else { "" },
            if cut { " [shortened for review]" } else { "" },
            text
        ));
    }

    message
}

/// Parse the judge model's JSON reply
fn parse_verdict(
    content: &str,
    prompt: &str,
    category: &str,
    response_count: usize,
) -> Result<JudgeEvaluation> {
    let verdict: JudgeVerdict = serde_json::from_str(content).context("Judge reply is not the expected JSON object")?;

    Ok(JudgeEvaluation {
        prompt: prompt.to_string(),
        category: category.to_string(),
        response_count,
        similarity_score: clamp_score(verdict.similarity_score),
        technical_correctness: clamp_score(verdict.technical_correctness),
        coherence_score: clamp_score(verdict.coherence_score),
        creativity_expected: verdict.creativity_expected,
        issues_detected: verdict.issues_detected,
        legitimate_variations: verdict.legitimate_variations,
        raw_response: Some(content.to_string()),
    })
}

/// Extract the assistant message from a chat-completions body
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body).context("Failed to parse chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("Chat completion response has no message content")
}

/// Judge backend calling an OpenAI-style chat-completions endpoint
pub struct OpenAiJudge {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    name: String,
}

impl OpenAiJudge {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for judge")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            name: format!("judge-{}", model),
            model,
            max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl JudgeBackend for OpenAiJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        prompt: &str,
        category: &str,
        responses: &[&ResponseRecord],
    ) -> Result<JudgeEvaluation> {
        let request_body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_user_message(prompt, category, responses) },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .with_context(|| format!("Judge request to {} failed", self.endpoint))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read judge response body")?;
        if !status.is_success() {
            bail!("Judge service returned error {}: {}", status, body);
        }

        let content = extract_content(&body)?;
        parse_verdict(&content, prompt, category, responses.len())
    }
}
