//! Translation backends. Calls block the calling worker thread on the shared runtime.

use crate::config::{Config, Provider};
use crate::languages::{self, AUTO_CODE};
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
});

const GOOGLE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Detected code when the request asked for `auto` (empty if none was reported),
    /// otherwise the requested one.
    pub source_code: String,
    pub target_code: String,
    pub text: String,
    pub original: String,
}

pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<Translation>;
}

pub fn build_translator(cfg: &Config, rt: Arc<Runtime>) -> Arc<dyn Translator> {
    match cfg.provider {
        Provider::OpenAi if !cfg.openai_api_key.is_empty() => {
            log::info!("Using OpenAI translator with model {}", cfg.openai_model);
            Arc::new(OpenAiTranslator { rt, api_key: cfg.openai_api_key.clone(), model: cfg.openai_model.clone() })
        }
        Provider::OpenAi => {
            log::warn!("OpenAI selected but OPENAI_API_KEY is empty; using Google");
            Arc::new(GoogleTranslator { rt })
        }
        Provider::Google => {
            log::info!("Using Google translator");
            Arc::new(GoogleTranslator { rt })
        }
    }
}

fn finish(text: &str, source: &str, target: &str, translated: String, detected: Option<String>) -> Result<Translation> {
    let translated = translated.trim().to_string();
    if translated.is_empty() {
        anyhow::bail!("Empty response");
    }
    let source_code = if source == AUTO_CODE {
        detected.filter(|d| !d.is_empty() && d != AUTO_CODE).unwrap_or_default()
    } else {
        source.to_string()
    };
    Ok(Translation { source_code, target_code: target.to_string(), text: translated, original: text.to_string() })
}

async fn error_for_status(resp: reqwest::Response, service: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    anyhow::bail!("{service} error {status}: {text}")
}

pub struct GoogleTranslator {
    rt: Arc<Runtime>,
}

/// Region suffixes are upper-case on the wire (`zh-cn` -> `zh-CN`).
fn google_code(code: &str) -> String {
    match code.split_once('-') {
        Some((lang, region)) => format!("{lang}-{}", region.to_ascii_uppercase()),
        None => code.to_string(),
    }
}

/// Returns the concatenated translated segments and the detected source code.
fn parse_google(body: &Value) -> Result<(String, Option<String>)> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("unexpected translation response"))?;
    let text: String = segments.iter().filter_map(|seg| seg.get(0).and_then(Value::as_str)).collect();
    let detected = body.get(2).and_then(Value::as_str).map(str::to_ascii_lowercase);
    Ok((text, detected))
}

impl GoogleTranslator {
    async fn request(&self, text: &str, source: &str, target: &str) -> Result<Value> {
        let (sl, tl) = (google_code(source), google_code(target));
        let resp = CLIENT
            .get(GOOGLE_URL)
            .query(&[("client", "gtx"), ("sl", sl.as_str()), ("tl", tl.as_str()), ("dt", "t"), ("q", text)])
            .send()
            .await?;
        let resp = error_for_status(resp, "Google Translate").await?;
        Ok(resp.json().await?)
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<Translation> {
        log::info!("Translating {} chars {source} -> {target} via Google", text.len());
        let body = self.rt.block_on(self.request(text, source, target))?;
        let (translated, detected) = parse_google(&body)?;
        finish(text, source, target, translated, detected)
    }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(serde::Deserialize)]
struct TranslationReply {
    translation: String,
    #[serde(default)]
    detected: Option<String>,
}

pub struct OpenAiTranslator {
    rt: Arc<Runtime>,
    api_key: String,
    model: String,
}

/// Accepts the requested JSON shape, or treats the whole reply as the translation.
fn parse_openai_reply(content: &str) -> (String, Option<String>) {
    match serde_json::from_str::<TranslationReply>(content.trim()) {
        Ok(reply) => (reply.translation, reply.detected.map(|d| d.trim().to_ascii_lowercase())),
        Err(_) => (content.to_string(), None),
    }
}

impl OpenAiTranslator {
    async fn request(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let from = if source == AUTO_CODE {
            String::new()
        } else {
            format!(" from {}", languages::name_for(source))
        };
        let system = format!(
            "Translate the user's text{from} to {}. Reply with a JSON object \
             {{\"translation\": <translated text>, \"detected\": <ISO 639-1 code of the source language>}}.",
            languages::name_for(target)
        );
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &system },
                ChatMessage { role: "user", content: text },
            ],
            temperature: 0.0,
            max_tokens: Some(2048),
            response_format: ResponseFormat { kind: "json_object" },
            stream: false,
        };

        let resp = CLIENT.post(OPENAI_URL).bearer_auth(&self.api_key).json(&req).send().await?;
        let resp = error_for_status(resp, "OpenAI").await?;
        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("Empty response")
    }
}

impl Translator for OpenAiTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<Translation> {
        log::info!("Translating {} chars {source} -> {target} with model {}", text.len(), self.model);
        let content = self.rt.block_on(self.request(text, source, target))?;
        let (translated, detected) = parse_openai_reply(&content);
        finish(text, source, target, translated, detected)
    }
}
