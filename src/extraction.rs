//! Structured extraction: text → typed objects and links.
//!
//! Extraction is an injected capability like embedding. The collaborator
//! returns objects/links that are validated against the closed schema
//! *before* any graph mutation: malformed output is rejected here, never
//! silently coerced. Implementations:
//!
//! - [`DisabledExtractor`]: always fails.
//! - [`RuleExtractor`]: offline keyword heuristics for the demo pipeline.
//! - [`ChatExtractor`]: an OpenAI-compatible chat-completions endpoint
//!   prompted to emit the extraction JSON schema.

use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::models::{Link, LinkType, Object, ObjectType};

/// Output of one extraction call.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub objects: Vec<Object>,
    pub links: Vec<Link>,
}

/// An opaque function from text to typed objects and links.
///
/// Implementations must return output that passes [`validate_extraction`];
/// the provided ones run it before returning, so malformed model output is
/// the collaborator's failure, not the graph's.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn model_name(&self) -> &str;

    async fn extract(&self, text: &str) -> Result<ExtractionResult>;
}

/// Validate extractor output against the schema contract: non-empty ids,
/// confidences in `[0, 1]`, self-loops only for `SameAs`. Endpoint
/// existence is checked later by the graph at insertion time.
pub fn validate_extraction(result: &ExtractionResult) -> Result<()> {
    for object in &result.objects {
        if object.id.is_empty() {
            return Err(Error::EmptyId);
        }
        if !(0.0..=1.0).contains(&object.confidence) {
            return Err(Error::InvalidConfidence {
                id: object.id.clone(),
                value: object.confidence,
            });
        }
    }
    for link in &result.links {
        if link.src_id.is_empty() || link.dst_id.is_empty() {
            return Err(Error::EmptyId);
        }
        if !(0.0..=1.0).contains(&link.confidence) {
            return Err(Error::InvalidConfidence {
                id: format!("{} -> {}", link.src_id, link.dst_id),
                value: link.confidence,
            });
        }
        if link.src_id == link.dst_id && link.link_type != LinkType::SameAs {
            return Err(Error::SelfLoop {
                id: link.src_id.clone(),
            });
        }
    }
    Ok(())
}

/// Create the appropriate [`Extractor`] from configuration.
pub fn create_extractor(config: &ExtractionConfig) -> Result<Box<dyn Extractor>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledExtractor)),
        "rule" => Ok(Box::new(RuleExtractor)),
        "chat" => Ok(Box::new(ChatExtractor::new(config)?)),
        other => Err(Error::Config(format!(
            "unknown extraction provider: '{other}'"
        ))),
    }
}

// ============ Disabled provider ============

pub struct DisabledExtractor;

#[async_trait]
impl Extractor for DisabledExtractor {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn extract(&self, _text: &str) -> Result<ExtractionResult> {
        Err(Error::ExtractionUnavailable(
            "extraction provider is disabled".to_string(),
        ))
    }
}

// ============ Rule provider ============

/// Offline keyword heuristics. Good enough to exercise the whole pipeline
/// (graph construction, contradiction detection, insight generation)
/// without a model behind it.
pub struct RuleExtractor;

#[async_trait]
impl Extractor for RuleExtractor {
    fn model_name(&self) -> &str {
        "rule-v1"
    }

    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let lower = text.to_lowercase();
        let mut result = ExtractionResult::default();

        if lower.contains("earth") {
            result.objects.push(Object::new(
                "claim-earth-round",
                ObjectType::Claim,
                "The earth is round",
                0.95,
            ));
            result.objects.push(Object::new(
                "claim-earth-flat",
                ObjectType::Claim,
                "The earth is flat",
                0.4,
            ));
            result.links.push(Link {
                src_id: "claim-earth-round".to_string(),
                dst_id: "claim-earth-flat".to_string(),
                link_type: LinkType::Contradicts,
                confidence: 0.9,
                evidence_span_id: None,
            });
        }

        if lower.contains("gravity") {
            result.objects.push(Object::new(
                "idea-gravity",
                ObjectType::Idea,
                "Gravity pulls everything towards the center of mass",
                0.9,
            ));
            if lower.contains("earth") {
                result.links.push(Link {
                    src_id: "idea-gravity".to_string(),
                    dst_id: "claim-earth-round".to_string(),
                    link_type: LinkType::Supports,
                    confidence: 0.85,
                    evidence_span_id: None,
                });
            }
        }

        if let Some(question) = lower.split(['.', '\n']).find(|s| s.trim().ends_with('?')) {
            result.objects.push(Object::new(
                "question-open",
                ObjectType::Question,
                question.trim(),
                0.7,
            ));
        }

        validate_extraction(&result)?;
        Ok(result)
    }
}

// ============ Chat-completions provider ============

/// Untyped shapes for model output. Types arrive as strings and convert
/// through `FromStr`, so a value outside the closed enumerations surfaces
/// as `InvalidObjectType`/`InvalidLinkType` instead of a generic parse
/// error.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    objects: Vec<RawObject>,
    #[serde(default)]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: String,
    #[serde(rename = "type")]
    object_type: String,
    canonical_text: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(alias = "src_id")]
    source_id: String,
    #[serde(alias = "dst_id")]
    target_id: String,
    #[serde(rename = "type")]
    link_type: String,
    confidence: f32,
    #[serde(default)]
    evidence_span_id: Option<String>,
}

fn convert_raw(raw: RawExtraction) -> Result<ExtractionResult> {
    let objects = raw
        .objects
        .into_iter()
        .map(|o| {
            Ok(Object::new(
                o.id,
                ObjectType::from_str(&o.object_type)?,
                o.canonical_text,
                o.confidence,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let links = raw
        .links
        .into_iter()
        .map(|l| {
            Ok(Link {
                src_id: l.source_id,
                dst_id: l.target_id,
                link_type: LinkType::from_str(&l.link_type)?,
                confidence: l.confidence,
                evidence_span_id: l.evidence_span_id,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExtractionResult { objects, links })
}

/// Extraction via an OpenAI-compatible `POST {api_base}/chat/completions`
/// endpoint. Requires the `GROQ_API_KEY` environment variable. Same retry
/// strategy as the embedding provider: backoff on 429/5xx and network
/// errors, immediate failure on other 4xx.
pub struct ChatExtractor {
    model: String,
    api_base: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

const EXTRACTION_PROMPT: &str = "Analyze the text and extract structured knowledge. \
Respond with only a JSON object: {\"objects\": [{\"id\", \"type\", \"canonical_text\", \"confidence\"}], \
\"links\": [{\"source_id\", \"target_id\", \"type\", \"confidence\"}]}. \
Object types: Idea, Claim, Assumption, Question, Task, Evidence, Definition. \
Link types: Supports, Contradicts, Refines, DependsOn, SameAs, Causes. \
Confidence is a number between 0.0 and 1.0.";

impl ChatExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        if std::env::var("GROQ_API_KEY").is_err() {
            return Err(Error::Config(
                "GROQ_API_KEY environment variable not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request(&self, text: &str) -> Result<String> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| Error::ExtractionUnavailable("GROQ_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": EXTRACTION_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.api_base))
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;
                        return json
                            .pointer("/choices/0/message/content")
                            .and_then(|c| c.as_str())
                            .map(|c| c.to_string())
                            .ok_or_else(|| {
                                Error::ExtractionUnavailable(
                                    "chat response missing choices[0].message.content".to_string(),
                                )
                            });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::ExtractionUnavailable(format!(
                            "chat API error {status}: {text}"
                        )));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::ExtractionUnavailable(format!(
                        "chat API error {status}: {text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::ExtractionUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::ExtractionUnavailable("extraction failed after retries".to_string())
        }))
    }
}

/// Strip a markdown code fence the model may wrap its JSON in.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl Extractor for ChatExtractor {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let content = self.request(text).await?;
        let raw: RawExtraction = serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| Error::ExtractionUnavailable(format!("unparseable model output: {e}")))?;
        let result = convert_raw(raw)?;
        validate_extraction(&result)?;
        Ok(result)
    }
}
