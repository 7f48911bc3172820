mod dryrun;
mod gemini;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use studio_contracts::{ImageData, Role};

pub use dryrun::DryrunTransport;
pub use gemini::{GeminiTransport, DEFAULT_GEMINI_API_BASE};

/// A failure reported by (or on the way to) the remote service, before it is
/// translated into a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteFailure {
    pub status: Option<u16>,
    pub message: String,
    pub cancelled: bool,
}

impl RemoteFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn cancelled() -> Self {
        Self {
            status: None,
            message: "request cancelled".to_string(),
            cancelled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image(ImageData),
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Part::Text(value.into())
    }

    fn to_json(&self) -> Value {
        match self {
            Part::Text(text) => json!({ "text": text }),
            Part::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime_type(),
                    "data": image.to_base64(),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "role": self.role.wire_name(),
            "parts": self.parts.iter().map(Part::to_json).collect::<Vec<Value>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    /// Ask for a JSON array of strings instead of free text.
    pub response_json_array: bool,
    /// Ask for an image part in the response.
    pub response_image: bool,
}

impl ContentRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            ..Self::default()
        }
    }

    pub fn single_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(model, vec![Content::user(vec![Part::text(text)])])
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn expecting_json_array(mut self) -> Self {
        self.response_json_array = true;
        self
    }

    pub fn expecting_image(mut self) -> Self {
        self.response_image = true;
        self
    }

    /// All text parts of the request joined by newlines.
    pub fn prompt_text(&self) -> String {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<&str>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter(|part| matches!(part, Part::Image(_)))
            .count()
    }

    /// `generateContent` request body.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(self.contents.iter().map(Content::to_json).collect()),
        );
        if let Some(instruction) = self.system_instruction.as_ref() {
            payload.insert(
                "systemInstruction".to_string(),
                json!({ "parts": [{ "text": instruction }] }),
            );
        }
        let mut generation_config = Map::new();
        if self.response_json_array {
            generation_config.insert(
                "responseMimeType".to_string(),
                Value::String("application/json".to_string()),
            );
            generation_config.insert(
                "responseSchema".to_string(),
                json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
            );
        }
        if self.response_image {
            generation_config.insert(
                "responseModalities".to_string(),
                json!(["TEXT", "IMAGE"]),
            );
        }
        if !generation_config.is_empty() {
            payload.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }
        Value::Object(payload)
    }
}

/// Raw `generateContent` response body with accessors for the parts the
/// client cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentResponse {
    payload: Value,
}

impl ContentResponse {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    fn candidate_parts(&self) -> Vec<&Value> {
        self.payload
            .get("candidates")
            .and_then(Value::as_array)
            .map(|candidates| {
                candidates
                    .iter()
                    .filter_map(|candidate| {
                        candidate
                            .get("content")
                            .and_then(|content| content.get("parts"))
                            .and_then(Value::as_array)
                    })
                    .flatten()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text of the first candidate, thought parts excluded.
    pub fn text(&self) -> String {
        self.payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<Vec<&str>>()
                    .join("")
            })
            .unwrap_or_default()
    }

    /// First inline binary payload across every candidate's parts.
    pub fn first_inline_image(&self) -> Result<Option<ImageData>, RemoteFailure> {
        for part in self.candidate_parts() {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            let image = ImageData::from_base64(data, mime_type)
                .map_err(|err| RemoteFailure::message(format!("{err:#}")))?;
            return Ok(Some(image));
        }
        Ok(None)
    }

    /// `promptFeedback.blockReason`, set when the prompt itself was refused.
    pub fn block_reason(&self) -> Option<&str> {
        self.payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
    }
}

pub trait ContentTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure>;
}

impl<T: ContentTransport + ?Sized> ContentTransport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        (**self).generate_content(request)
    }
}

impl<T: ContentTransport + ?Sized> ContentTransport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        (**self).generate_content(request)
    }
}
