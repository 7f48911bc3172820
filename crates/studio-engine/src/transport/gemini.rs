use std::env;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use studio_contracts::settings::Settings;

use super::{ContentRequest, ContentResponse, ContentTransport, RemoteFailure};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const ERROR_BODY_MAX_CHARS: usize = 512;

pub struct GeminiTransport {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiTransport {
    /// Resolves credential and base URL: stored settings first, then the
    /// process environment, then the public endpoint.
    pub fn from_settings(settings: &Settings, timeout: Duration) -> Self {
        let api_key = settings.credential.clone().or_else(Self::env_api_key);
        let api_base = settings
            .endpoint_override
            .clone()
            .or_else(|| non_empty_env("GEMINI_API_BASE"))
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        Self::new(api_base, api_key, timeout)
    }

    pub fn new(api_base: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let api_base = api_base.into();
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn env_api_key() -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ContentTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(RemoteFailure::message(
                "API key not configured. Set one with `studio settings --credential` or GEMINI_API_KEY.",
            ));
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .json(&request.to_payload())
            .send()
            .map_err(|err| {
                // No URL in the message; its digits would match status-code rules.
                let status = err.status().map(|status| status.as_u16());
                let err = err.without_url();
                RemoteFailure::new(
                    status,
                    format!("Gemini request failed: {}", error_chain_text(&err)),
                )
            })?;

        let status = response.status();
        let code = status.as_u16();
        let body = response.text().map_err(|err| {
            RemoteFailure::new(Some(code), format!("Gemini response body read failed: {err}"))
        })?;
        if !status.is_success() {
            return Err(RemoteFailure::new(
                Some(code),
                format!(
                    "Gemini request failed ({code}): {}",
                    truncate_text(&body, ERROR_BODY_MAX_CHARS)
                ),
            ));
        }
        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            RemoteFailure::new(Some(code), format!("Gemini returned invalid JSON payload: {err}"))
        })?;
        let response = ContentResponse::new(parsed);
        if let Some(reason) = response.block_reason() {
            return Err(RemoteFailure::new(
                Some(code),
                format!("Gemini blocked the request (blockReason: {reason})"),
            ));
        }
        Ok(response)
    }
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if parts.last().map(|last| last != &text).unwrap_or(true) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(" | caused by: ")
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
