use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use studio_contracts::ImageData;

use crate::retry::Sleeper;
use crate::transport::{ContentRequest, ContentResponse, ContentTransport, RemoteFailure};

type Reply = Result<ContentResponse, RemoteFailure>;

/// Replays queued answers. Image-model requests and text requests have
/// separate queues so parallel sub-calls stay deterministic.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    text_replies: Mutex<VecDeque<Reply>>,
    image_replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ContentRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_text(&self, reply: Reply) {
        if let Ok(mut queue) = self.text_replies.lock() {
            queue.push_back(reply);
        }
    }

    pub(crate) fn push_image(&self, reply: Reply) {
        if let Ok(mut queue) = self.image_replies.lock() {
            queue.push_back(reply);
        }
    }

    pub(crate) fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests().len()
    }
}

impl ContentTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queue = if request.response_image {
            &self.image_replies
        } else {
            &self.text_replies
        };
        let next = queue.lock().ok().and_then(|mut queue| queue.pop_front());
        match next {
            Some(reply) => reply,
            None if request.response_image => Ok(image_response(b"final-png")),
            None => Ok(text_response("ok")),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

pub(crate) fn text_response(text: &str) -> ContentResponse {
    ContentResponse::new(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

pub(crate) fn json_array_response(values: &[&str]) -> ContentResponse {
    let array = Value::Array(values.iter().map(|v| Value::from(*v)).collect());
    text_response(&array.to_string())
}

pub(crate) fn image_response(bytes: &[u8]) -> ContentResponse {
    let image = ImageData::new(bytes.to_vec(), "image/png");
    ContentResponse::new(json!({
        "candidates": [{ "content": { "parts": [
            { "inlineData": { "mimeType": image.mime_type(), "data": image.to_base64() } }
        ]}}]
    }))
}

pub(crate) fn rate_limited() -> RemoteFailure {
    RemoteFailure::new(Some(429), "Gemini request failed (429): RESOURCE_EXHAUSTED")
}

pub(crate) fn garment() -> ImageData {
    ImageData::new(b"garment-jpeg".to_vec(), "image/jpeg")
}
