use chrono::{DateTime, Utc};
use serde_json::Value;
use studio_contracts::events::{EventPayload, SessionLog};
use studio_contracts::{
    Action, Audience, BrainstormView, Category, ImageData, Locale, Rejected, Session,
};
use tracing::{info, warn};

use crate::client::{ArtifactRequest, GenerationClient};
use crate::errors::GenerationError;
use crate::transport::ContentTransport;

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Rejected(#[from] Rejected),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Drives one wizard session: every change goes through the reducer, remote
/// work goes through the client, outcomes land back in the session.
pub struct Studio<T> {
    session: Session,
    client: GenerationClient<T>,
    locale: Locale,
    log: Option<SessionLog>,
}

impl<T: ContentTransport> Studio<T> {
    pub fn new(client: GenerationClient<T>, locale: Locale) -> Self {
        let session = Session::with_error_display(client.config().error_display);
        Self {
            session,
            client,
            locale,
            log: None,
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self.emit("session_started", EventPayload::new());
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &GenerationClient<T> {
        &self.client
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn set_garment(&mut self, garment: ImageData) -> Result<(), StudioError> {
        self.apply(Action::SetGarment(garment))
    }

    pub fn set_audience(&mut self, audience: Audience) -> Result<(), StudioError> {
        self.apply(Action::SetAudience(audience))
    }

    pub fn analyze(&mut self) -> Result<(), StudioError> {
        self.apply(Action::BeginAnalysis)?;
        let result = match (self.session.garment(), self.session.audience()) {
            (Some(garment), Some(audience)) => {
                self.client.analyze_garment(garment, audience, self.locale)
            }
            _ => Err(GenerationError::InvalidInput(
                "garment and audience are required".to_string(),
            )),
        };
        self.settle("analysis", result, Action::AnalysisSucceeded)
    }

    /// The user turn is in the transcript before the reply is requested.
    pub fn send_message(&mut self, text: &str) -> Result<(), StudioError> {
        let history = self.session.transcript().clone();
        self.apply(Action::SendMessage(text.to_string()))?;
        let result = self
            .client
            .continue_conversation(&history, text, self.locale);
        self.settle("reply", result, Action::ReplyReceived)
    }

    pub fn set_view(&mut self, view: BrainstormView) -> Result<(), StudioError> {
        self.apply(Action::SetBrainstormView(view))
    }

    pub fn generate_keywords(&mut self) -> Result<(), StudioError> {
        self.apply(Action::BeginKeywords)?;
        let keywords = self
            .client
            .generate_keywords(self.session.transcript(), self.locale);
        self.settle("keywords", Ok(keywords), Action::KeywordsReady)
    }

    pub fn regenerate_keyword(&mut self, index: usize) -> Result<(), StudioError> {
        self.apply(Action::BeginKeywordRegeneration(index))?;
        let value = match (Category::from_index(index), self.session.keywords()) {
            (Some(category), Some(keywords)) => Ok(self.client.regenerate_keyword(
                self.session.transcript(),
                category,
                keywords.get(category),
            )),
            _ => Err(GenerationError::InvalidInput(format!(
                "no keyword in slot {index}"
            ))),
        };
        self.settle("regenerate_keyword", value, Action::KeywordRegenerated)
    }

    pub fn proceed_to_assets(&mut self) -> Result<(), StudioError> {
        self.apply(Action::ProceedToAssets)
    }

    pub fn set_reference(
        &mut self,
        index: usize,
        image: Option<ImageData>,
    ) -> Result<(), StudioError> {
        self.apply(Action::SetReferenceImage { index, image })
    }

    pub fn set_notes(&mut self, notes: &str) -> Result<(), StudioError> {
        self.apply(Action::SetAccessoryNotes(notes.to_string()))
    }

    pub fn import_plan(&mut self) -> Result<(), StudioError> {
        self.apply(Action::BeginImport)?;
        let summary = self
            .client
            .summarize_conversation(self.session.transcript(), self.locale);
        self.settle("import_plan", Ok(summary), Action::ImportSucceeded)
    }

    pub fn start_shoot(&mut self) -> Result<(), StudioError> {
        self.apply(Action::BeginShoot)?;
        let context = self.session.transcript().render();
        let result = match self.session.garment() {
            Some(garment) => self.client.generate_artifact(&ArtifactRequest {
                garment,
                reference_images: self.session.reference_images(),
                accessory_notes: self.session.accessory_notes(),
                keywords: self.session.keywords(),
                conversation_context: &context,
            }),
            None => Err(GenerationError::InvalidInput(
                "garment image is required".to_string(),
            )),
        };
        self.settle("shoot", result, |artifact| Action::ShootSucceeded {
            image: artifact.image,
            prompt: artifact.prompt,
        })
    }

    /// Back to a blank intake with a fresh cancellation token.
    pub fn new_session(&mut self) -> Result<(), StudioError> {
        self.apply(Action::NewSession)?;
        self.client.reset_cancellation();
        if let Some(log) = self.log.as_ref() {
            if let Err(err) = log.rotate() {
                warn!(error = %err, "session log id rotation failed");
            }
        }
        self.emit("session_started", EventPayload::new());
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        self.apply_infallible(Action::DismissError);
    }

    pub fn tick(&mut self) {
        self.tick_at(Utc::now());
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) {
        self.apply_infallible(Action::Tick(now));
    }

    fn apply(&mut self, action: Action) -> Result<(), StudioError> {
        let before = self.session.step();
        self.session = self.session.reduce(action)?;
        let after = self.session.step();
        if before != after {
            info!(from = before.number(), to = after.number(), "step changed");
        }
        Ok(())
    }

    fn apply_infallible(&mut self, action: Action) {
        match self.session.reduce(action) {
            Ok(next) => self.session = next,
            Err(err) => warn!(error = %err, "housekeeping action refused"),
        }
    }

    /// Applies the success action or records the failure on the session.
    fn settle<V>(
        &mut self,
        operation: &str,
        result: Result<V, GenerationError>,
        on_success: impl FnOnce(V) -> Action,
    ) -> Result<(), StudioError> {
        match result {
            Ok(value) => {
                self.apply(on_success(value))?;
                let mut payload = EventPayload::new();
                payload.insert("operation".to_string(), Value::from(operation));
                self.emit("operation_completed", payload);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.apply(Action::OperationFailed {
                    message: message.clone(),
                    at: Utc::now(),
                })?;
                let mut payload = EventPayload::new();
                payload.insert("operation".to_string(), Value::from(operation));
                payload.insert("message".to_string(), Value::from(message));
                self.emit("operation_failed", payload);
                Err(err.into())
            }
        }
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        let Some(log) = self.log.as_ref() else {
            return;
        };
        if let Err(err) = log.record(event_type, &self.session, payload) {
            warn!(error = %err, event_type, "session log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use studio_contracts::{Role, Step, Turn};

    use super::*;
    use crate::config::StudioConfig;
    use crate::test_support::{
        garment, image_response, json_array_response, text_response, RecordingSleeper,
        ScriptedTransport,
    };
    use crate::transport::RemoteFailure;

    fn studio_with(transport: &Arc<ScriptedTransport>) -> Studio<Arc<ScriptedTransport>> {
        let client = GenerationClient::new(Arc::clone(transport), StudioConfig::default())
            .with_sleeper(RecordingSleeper::new());
        Studio::new(client, Locale::En)
    }

    fn brainstorming(
        transport: &Arc<ScriptedTransport>,
    ) -> anyhow::Result<Studio<Arc<ScriptedTransport>>> {
        transport.push_text(Ok(text_response("Go for a retro skater editorial.")));
        let mut studio = studio_with(transport);
        studio.set_garment(garment())?;
        studio.set_audience(Audience::Female)?;
        studio.analyze()?;
        Ok(studio)
    }

    #[test]
    fn analysis_moves_to_brainstorm_with_director_turn() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let studio = brainstorming(&transport)?;
        let session = studio.session();
        assert_eq!(session.step(), Step::Brainstorm);
        assert_eq!(
            session.transcript().turns(),
            &[Turn::assistant("Go for a retro skater editorial.")]
        );
        assert!(!session.in_flight());
        Ok(())
    }

    #[test]
    fn analysis_failure_stays_on_intake_with_message() {
        let transport = ScriptedTransport::new();
        transport.push_text(Err(RemoteFailure::new(Some(503), "UNAVAILABLE")));
        let mut studio = studio_with(&transport);
        studio.set_garment(garment()).unwrap();
        studio.set_audience(Audience::Male).unwrap();

        let err = studio.analyze().unwrap_err();
        assert!(matches!(err, StudioError::Generation(_)));
        let session = studio.session();
        assert_eq!(session.step(), Step::Intake);
        assert!(!session.in_flight());
        assert_eq!(
            session.error().map(|e| e.message.as_str()),
            Some("Gemini Service Overloaded. Please try again shortly.")
        );
    }

    #[test]
    fn analysis_without_audience_is_rejected_before_any_call() {
        let transport = ScriptedTransport::new();
        let mut studio = studio_with(&transport);
        studio.set_garment(garment()).unwrap();
        let err = studio.analyze().unwrap_err();
        assert!(matches!(err, StudioError::Rejected(Rejected::MissingAudience)));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn user_turn_is_recorded_before_reply() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        transport.push_text(Ok(text_response("Low-key lighting, wet asphalt.")));

        studio.send_message("make it moodier")?;

        let sent = transport.requests().pop().expect("chat request");
        let last = sent.contents.last().expect("last content");
        assert_eq!(last.role, Role::User);
        assert!(sent.prompt_text().ends_with("make it moodier"));

        let roles: Vec<Role> = studio
            .session()
            .transcript()
            .turns()
            .iter()
            .map(|turn| turn.role)
            .collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(
            studio.session().transcript().turns()[1],
            Turn::user("make it moodier")
        );
        Ok(())
    }

    #[test]
    fn failed_reply_keeps_user_turn() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        transport.push_text(Err(RemoteFailure::message("blockReason: SAFETY")));

        assert!(studio.send_message("make it moodier").is_err());
        let session = studio.session();
        assert_eq!(session.transcript().last(), Some(&Turn::user("make it moodier")));
        assert!(!session.in_flight());
        assert_eq!(session.step(), Step::Brainstorm);
        Ok(())
    }

    #[test]
    fn keywords_and_regeneration_update_slots() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        assert!(matches!(
            studio.regenerate_keyword(0),
            Err(StudioError::Rejected(Rejected::NoKeywords))
        ));

        transport.push_text(Ok(json_array_response(&[
            "skater crouch",
            "freckles",
            "messy bun",
            "concrete wall",
            "grunge",
            "skatepark",
            "golden hour",
            "low angle",
        ])));
        studio.generate_keywords()?;
        transport.push_text(Ok(text_response("dusk skatepark bowl")));
        studio.regenerate_keyword(Category::Location.index())?;

        let keywords = studio.session().keywords().expect("keywords");
        assert_eq!(&keywords[Category::Location], "dusk skatepark bowl");
        assert_eq!(&keywords[Category::Vibe], "grunge");
        assert_eq!(studio.session().regenerating_keyword(), None);
        assert_eq!(studio.session().step(), Step::Brainstorm);
        Ok(())
    }

    #[test]
    fn shoot_with_no_references_reaches_result() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        studio.proceed_to_assets()?;
        transport.push_text(Ok(text_response("Subject: skater, 35mm, Portra 400.")));
        transport.push_image(Ok(image_response(b"final-editorial")));

        studio.start_shoot()?;

        let session = studio.session();
        assert_eq!(session.step(), Step::Result);
        assert_eq!(
            session.final_image().map(|image| image.bytes().to_vec()),
            Some(b"final-editorial".to_vec())
        );
        assert!(!session.master_prompt().is_empty());
        Ok(())
    }

    #[test]
    fn failed_editorial_image_keeps_session_on_assets() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        studio.proceed_to_assets()?;
        transport.push_text(Ok(text_response("Subject: skater, 35mm.")));
        transport.push_image(Err(RemoteFailure::new(Some(503), "UNAVAILABLE")));

        let err = studio.start_shoot().unwrap_err();
        assert!(matches!(err, StudioError::Generation(_)));
        let session = studio.session();
        assert_eq!(session.step(), Step::Assets);
        assert!(!session.in_flight());
        assert!(session.final_image().is_none());
        assert!(session.master_prompt().is_empty());
        assert_eq!(
            session.error().map(|e| e.message.as_str()),
            Some("Gemini Service Overloaded. Please try again shortly.")
        );
        Ok(())
    }

    #[test]
    fn import_appends_final_plan_to_notes() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        studio.proceed_to_assets()?;
        studio.set_notes("Gold earrings")?;
        transport.push_text(Ok(text_response("Vibe: grunge. Location: skatepark.")));

        studio.import_plan()?;
        assert_eq!(
            studio.session().accessory_notes(),
            "Gold earrings\n\n--- Final Plan ---\nVibe: grunge. Location: skatepark."
        );
        Ok(())
    }

    #[test]
    fn new_session_clears_everything_and_cancels_old_token() -> anyhow::Result<()> {
        let transport = ScriptedTransport::new();
        let mut studio = brainstorming(&transport)?;
        studio.proceed_to_assets()?;
        studio.set_reference(3, Some(ImageData::new(b"bg".to_vec(), "image/png")))?;
        studio.start_shoot()?;
        let old_token = studio.client().cancel_handle();

        studio.new_session()?;

        let session = studio.session();
        assert_eq!(session.step(), Step::Intake);
        assert!(session.garment().is_none());
        assert!(session.audience().is_none());
        assert!(session.transcript().is_empty());
        assert!(session.keywords().is_none());
        assert!(session.reference_images().iter().all(Option::is_none));
        assert!(session.final_image().is_none());
        assert!(session.master_prompt().is_empty());
        assert!(old_token.is_cancelled());
        assert!(!studio.client().cancel_handle().is_cancelled());
        Ok(())
    }

    #[test]
    fn transient_error_expires_on_tick() {
        let transport = ScriptedTransport::new();
        transport.push_text(Err(RemoteFailure::message("boom")));
        let mut studio = studio_with(&transport);
        studio.set_garment(garment()).unwrap();
        studio.set_audience(Audience::Unisex).unwrap();
        let _ = studio.analyze();

        let raised_at = studio.session().error().expect("error").raised_at;
        studio.tick_at(raised_at + chrono::Duration::seconds(3));
        assert!(studio.session().error().is_some());
        studio.tick_at(raised_at + chrono::Duration::seconds(8));
        assert!(studio.session().error().is_none());
    }

    #[test]
    fn session_log_records_operations() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session.jsonl");
        let transport = ScriptedTransport::new();
        transport.push_text(Err(RemoteFailure::new(Some(400), "bad request")));
        transport.push_text(Ok(text_response("Ready.")));
        let mut studio =
            studio_with(&transport).with_log(SessionLog::with_session_id(&path, "s-1"));
        studio.set_garment(garment())?;
        studio.set_audience(Audience::Female)?;
        assert!(studio.analyze().is_err());
        studio.analyze()?;

        let lines: Vec<Value> = fs::read_to_string(&path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?;
        let types: Vec<&str> = lines
            .iter()
            .filter_map(|line| line["type"].as_str())
            .collect();
        assert_eq!(
            types,
            vec!["session_started", "operation_failed", "operation_completed"]
        );
        assert_eq!(lines[1]["operation"], "analysis");
        assert_eq!(
            lines[1]["message"],
            "Invalid request. Please check your inputs and try again."
        );
        assert_eq!(lines[0]["seq"], 0);
        assert_eq!(lines[1]["step"], 1);
        assert_eq!(lines[2]["step"], 2);
        assert_eq!(lines[2]["turns"], 1);
        assert!(lines.iter().all(|line| line["session_id"] == "s-1"));
        Ok(())
    }
}
