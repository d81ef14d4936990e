use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::error::{ReportError, Result};
use crate::llm::types::{GenerationOutcome, GenerationRequest, StreamEvent, TokenUsage};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The text-generation collaborator: takes a system/user prompt pair and
/// returns either a complete string or a token stream. The extraction call
/// uses [`generate`](TextGenerator::generate) (the full response is needed
/// before validation can run); the narrative call may stream.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome>;

    /// Streamed variant. Emits incremental [`StreamEvent`]s on `events`
    /// while also accumulating the full response, which is returned so the
    /// caller can parse it once the stream ends. A dropped receiver is not
    /// an error - the caller abandoned the stream.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        events: Sender<StreamEvent>,
    ) -> Result<GenerationOutcome>;

    fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn payload(&self, request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![WireContent {
                role: "user".to_string(),
                parts: vec![WirePart {
                    text: Some(request.prompt.user.clone()),
                }],
            }],
            system_instruction: WireContent {
                role: "user".to_string(),
                parts: vec![WirePart {
                    text: Some(request.prompt.system.clone()),
                }],
            },
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        debug!(
            "generation call: model={} max_tokens={} temperature={}",
            self.model, request.max_tokens, request.temperature
        );

        let res = self
            .client
            .post(&url)
            .json(&self.payload(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ReportError::GenerationFailed(format!(
                "generation service error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;
        let usage = body.usage();
        let content = body.text();
        if content.is_empty() {
            return Err(ReportError::GenerationFailed(
                "model returned no text content".to_string(),
            ));
        }

        Ok(GenerationOutcome { content, usage })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        events: Sender<StreamEvent>,
    ) -> Result<GenerationOutcome> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        );

        let res = self
            .client
            .post(&url)
            .json(&self.payload(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(ReportError::GenerationFailed(format!(
                "generation service error (status {}): {}",
                status, err_text
            )));
        }

        let mut stream = res.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();
        let mut usage = TokenUsage::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let Some(payload) = parse_sse_data(&line) else {
                    continue;
                };

                let parsed: GenerateContentResponse = match serde_json::from_str(payload) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!("skipping unparseable stream chunk: {}", err);
                        continue;
                    }
                };

                if let Some(wire_usage) = parsed.usage_metadata {
                    usage = TokenUsage {
                        input_tokens: wire_usage.prompt_token_count,
                        output_tokens: wire_usage.candidates_token_count,
                    };
                }

                let text = parsed.text();
                if !text.is_empty() {
                    content.push_str(&text);
                    let _ = events.send(StreamEvent::Text { text }).await;
                }
            }
        }

        let _ = events
            .send(StreamEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            })
            .await;
        let _ = events.send(StreamEvent::Done).await;

        Ok(GenerationOutcome { content, usage })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract the payload of a `data:` SSE line, if it is one.
fn parse_sse_data(line: &str) -> Option<&str> {
    let payload = line.trim_end().strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: WireContent,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Deserialize, Clone)]
struct WireContent {
    role: String,
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Clone)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<WireCandidate>>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<WireUsage>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .as_deref()
            .and_then(|candidates| candidates.first())
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn usage(&self) -> TokenUsage {
        self.usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct WireCandidate {
    content: WireCandidateContent,
}

#[derive(Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize, Default, Clone, Copy)]
struct WireUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}
