use std::sync::Arc;
use std::thread;

use serde_json::Value;
use studio_contracts::{
    Audience, Category, ImageData, KeywordSet, Locale, Role, Transcript, CATEGORY_COUNT,
};
use tracing::{debug, info, warn};

use crate::config::{ArtifactSchedule, StudioConfig};
use crate::errors::GenerationError;
use crate::prompts;
use crate::retry::{CancelToken, Sleeper, ThreadSleeper};
use crate::transport::{Content, ContentRequest, ContentResponse, ContentTransport, Part, RemoteFailure};

const MISSING_PROMPT: &str = "N/A";

/// Everything the final artifact is composed from.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub garment: &'a ImageData,
    pub reference_images: &'a [Option<ImageData>; CATEGORY_COUNT],
    pub accessory_notes: &'a str,
    pub keywords: Option<&'a KeywordSet>,
    pub conversation_context: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub image: ImageData,
    pub prompt: String,
}

/// Remote generation operations. Every call goes through the retry policy;
/// failures that reach the caller are already normalized.
pub struct GenerationClient<T> {
    transport: T,
    config: StudioConfig,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelToken,
}

impl<T: ContentTransport> GenerationClient<T> {
    pub fn new(transport: T, config: StudioConfig) -> Self {
        Self {
            transport,
            config,
            sleeper: Arc::new(ThreadSleeper),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancels anything still waiting on the current token and installs a
    /// fresh one for later calls.
    pub fn reset_cancellation(&mut self) -> CancelToken {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.cancel.clone()
    }

    pub fn analyze_garment(
        &self,
        garment: &ImageData,
        audience: Audience,
        locale: Locale,
    ) -> Result<String, GenerationError> {
        if garment.is_empty() {
            return Err(GenerationError::InvalidInput(
                "garment image is empty".to_string(),
            ));
        }
        let request = ContentRequest::new(
            self.config.text_model.clone(),
            vec![Content::user(vec![
                Part::Image(garment.clone()),
                Part::text(prompts::analyze_garment(locale, audience)),
            ])],
        )
        .with_system_instruction(prompts::creative_director(locale));
        let response = self.call("analyze_garment", &request)?;
        Ok(response.text())
    }

    /// Next director reply. `history` excludes `message`.
    pub fn continue_conversation(
        &self,
        history: &Transcript,
        message: &str,
        locale: Locale,
    ) -> Result<String, GenerationError> {
        if message.trim().is_empty() {
            return Err(GenerationError::InvalidInput("message is empty".to_string()));
        }
        let mut contents: Vec<Content> = history
            .turns()
            .iter()
            .map(|turn| Content {
                role: turn.role,
                parts: vec![Part::text(turn.text.clone())],
            })
            .collect();
        contents.push(Content {
            role: Role::User,
            parts: vec![Part::text(message)],
        });
        let request = ContentRequest::new(self.config.text_model.clone(), contents)
            .with_system_instruction(prompts::producer(locale));
        let response = self.call("continue_conversation", &request)?;
        Ok(response.text())
    }

    /// Never fails: any remote problem yields the fallback set.
    pub fn generate_keywords(&self, transcript: &Transcript, locale: Locale) -> KeywordSet {
        let request = ContentRequest::single_text(
            self.config.text_model.clone(),
            prompts::keyword_set(&transcript.render()),
        )
        .expecting_json_array();
        let response = match self.call("generate_keywords", &request) {
            Ok(response) => response,
            Err(failure) => {
                warn!(?locale, error = %failure, "keyword generation failed; using fallback set");
                return KeywordSet::fallback();
            }
        };
        match parse_keyword_array(&response.text()) {
            Some(values) => KeywordSet::from_values(values),
            None => {
                warn!(?locale, "keyword answer was not a JSON array; using fallback set");
                KeywordSet::fallback()
            }
        }
    }

    /// Never fails: failure or a blank answer returns `current`.
    pub fn regenerate_keyword(
        &self,
        transcript: &Transcript,
        category: Category,
        current: &str,
    ) -> String {
        let request = ContentRequest::single_text(
            self.config.text_model.clone(),
            prompts::regenerate_keyword(&transcript.render(), category, current),
        );
        match self.call("regenerate_keyword", &request) {
            Ok(response) => {
                let text = response.text();
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    current.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(failure) => {
                warn!(category = %category, error = %failure, "keyword regeneration failed; keeping current");
                current.to_string()
            }
        }
    }

    /// Never fails: an empty string means nothing could be summarized.
    pub fn summarize_conversation(&self, transcript: &Transcript, locale: Locale) -> String {
        let request = ContentRequest::single_text(
            self.config.text_model.clone(),
            prompts::summarize(&transcript.render(), locale),
        );
        match self.call("summarize_conversation", &request) {
            Ok(response) => response.text().trim().to_string(),
            Err(failure) => {
                warn!(?locale, error = %failure, "conversation summary failed");
                String::new()
            }
        }
    }

    pub fn generate_artifact(
        &self,
        request: &ArtifactRequest<'_>,
    ) -> Result<Artifact, GenerationError> {
        if request.garment.is_empty() {
            return Err(GenerationError::InvalidInput(
                "garment image is empty".to_string(),
            ));
        }
        let prompt_request = self.master_prompt_request(request);
        let image_request = self.editorial_request(request);
        info!(
            references = image_request.image_count().saturating_sub(1),
            schedule = ?self.config.artifact_schedule,
            "generating artifact"
        );

        let (prompt_response, image_response) = match self.config.artifact_schedule {
            ArtifactSchedule::Parallel => thread::scope(|scope| {
                let prompt_worker = scope.spawn(|| self.call("master_prompt", &prompt_request));
                let image = self.call("editorial_image", &image_request);
                let prompt = prompt_worker.join().unwrap_or_else(|_| {
                    Err(RemoteFailure::message("master prompt worker panicked"))
                });
                (prompt, image)
            }),
            ArtifactSchedule::Sequential { delay } => {
                let prompt = self.call("master_prompt", &prompt_request)?;
                self.sleeper.sleep(delay);
                (Ok(prompt), self.call("editorial_image", &image_request))
            }
        };
        let prompt_response = prompt_response?;
        let image_response = image_response?;

        let image = image_response
            .first_inline_image()?
            .ok_or(GenerationError::NoImageReturned)?;
        let prompt_text = prompt_response.text();
        let prompt = match prompt_text.trim() {
            "" => MISSING_PROMPT.to_string(),
            trimmed => trimmed.to_string(),
        };
        Ok(Artifact { image, prompt })
    }

    fn master_prompt_request(&self, request: &ArtifactRequest<'_>) -> ContentRequest {
        let mut parts = vec![Part::Image(request.garment.clone())];
        parts.extend(
            request
                .reference_images
                .iter()
                .flatten()
                .map(|image| Part::Image(image.clone())),
        );
        parts.push(Part::text(prompts::master_prompt(
            request.conversation_context,
            request.accessory_notes,
            request.keywords,
        )));
        ContentRequest::new(self.config.text_model.clone(), vec![Content::user(parts)])
    }

    fn editorial_request(&self, request: &ArtifactRequest<'_>) -> ContentRequest {
        let mut parts = vec![
            Part::text(prompts::MAIN_SUBJECT_LABEL),
            Part::Image(request.garment.clone()),
        ];
        for (category, slot) in Category::ALL.iter().zip(request.reference_images.iter()) {
            if let Some(image) = slot {
                parts.push(Part::text(prompts::reference_label(*category)));
                parts.push(Part::Image(image.clone()));
            }
        }
        parts.push(Part::text(prompts::editorial(
            request.conversation_context,
            request.accessory_notes,
        )));
        ContentRequest::new(self.config.image_model.clone(), vec![Content::user(parts)])
            .expecting_image()
    }

    fn call(&self, label: &str, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        debug!(
            operation = label,
            transport = self.transport.name(),
            model = %request.model,
            images = request.image_count(),
            "remote call"
        );
        self.config
            .retry
            .run(label, self.sleeper.as_ref(), &self.cancel, || {
                self.transport.generate_content(request)
            })
    }
}

/// Accepts a bare JSON array or one wrapped in a markdown code fence.
fn parse_keyword_array(text: &str) -> Option<Vec<String>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let parsed: Value = serde_json::from_str(body.trim()).ok()?;
    let values = parsed.as_array()?;
    Some(
        values
            .iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect(),
    )
}
