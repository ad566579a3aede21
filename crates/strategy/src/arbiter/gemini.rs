//! Gemini `generateContent` classifier.

use async_trait::async_trait;
use pulse_trade_core::{
    AiClassifier, ArbiterConfig, Classification, ClassificationContext, Direction, ServiceError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    direction: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClassifier {
    api_key: String,
    model_name: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClassifier")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClassifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model_name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: base_url.into(),
            client,
        })
    }

    /// Builds a classifier with the API key read from `config.api_key_env`.
    ///
    /// # Errors
    /// `Unavailable` if the key variable is unset or empty.
    pub fn from_config(config: &ArbiterConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::Unavailable(format!("{} is not set", config.api_key_env))
            })?;
        Self::new(
            api_key,
            config.model.clone(),
            config.api_url.clone(),
            config.request_timeout(),
        )
    }

    /// The key travels in `x-goog-api-key`, never in the URL.
    fn build_api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_name
        )
    }
}

#[async_trait]
impl AiClassifier for GeminiClassifier {
    async fn classify(
        &self,
        context: &ClassificationContext,
    ) -> Result<Classification, ServiceError> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(context),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json",
            },
        };

        tracing::debug!("Gemini classify {} via {}", context.symbol, self.model_name);

        let response = self
            .client
            .post(self.build_api_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), text));
        }

        let body: GeminiResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServiceError::Serialization("Gemini returned no text".to_string()))?;

        parse_classification(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Renders the market context into a prompt asking for strict JSON.
#[must_use]
pub fn build_prompt(context: &ClassificationContext) -> String {
    let s = &context.sentiment;
    let p = &context.pulse;
    format!(
        r#"You are a crypto market direction classifier. Sentiment alone is ambiguous for {symbol}; decide the short-term direction from the data below.

Sentiment index: {score:.0}/100 ({label}){sentiment_stale}
Breadth over top {basket} assets: {adv:.1}% advancing, {dec:.1}% declining (imbalance {imb:+.1} pp){pulse_stale}
Volume-weighted 24h price change: {vw:+.2}%

Reply with only a JSON object, no prose:
{{"direction": "LONG" | "SHORT" | "NEUTRAL", "confidence": <0-100>, "reasoning": "<one sentence>"}}
Use NEUTRAL when the evidence does not favour either side."#,
        symbol = context.symbol,
        score = s.score,
        label = s.classification,
        sentiment_stale = if s.stale { " [stale]" } else { "" },
        basket = p.basket_size,
        adv = p.advancing_pct,
        dec = p.declining_pct,
        imb = p.imbalance(),
        pulse_stale = if p.stale { " [stale]" } else { "" },
        vw = p.vw_delta_pct,
    )
}

/// Parses the classifier's JSON reply. Markdown code fences and leading or
/// trailing prose around the object are tolerated.
///
/// # Errors
/// `Serialization` if no valid object or direction can be extracted.
pub fn parse_classification(text: &str) -> Result<Classification, ServiceError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => {
            return Err(ServiceError::Serialization(format!(
                "no JSON object in classifier reply: {}",
                truncate(text, 120)
            )))
        }
    };

    let raw: RawClassification = serde_json::from_str(json)?;
    let direction: Direction = raw
        .direction
        .parse()
        .map_err(ServiceError::Serialization)?;

    Ok(Classification {
        direction,
        confidence: raw.confidence,
        reasoning: raw.reasoning,
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
