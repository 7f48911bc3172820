use chrono::{DateTime, Utc};

use super::{BrainstormView, PendingOperation, Session, Step, TransientError};
use crate::category::{Audience, Category, CATEGORY_COUNT};
use crate::image::ImageData;
use crate::keywords::KeywordSet;
use crate::transcript::{Transcript, Turn};

const ANALYSIS_PLACEHOLDER: &str = "Ready.";
const FINAL_PLAN_HEADER: &str = "--- Final Plan ---\n";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetGarment(ImageData),
    SetAudience(Audience),
    BeginAnalysis,
    AnalysisSucceeded(String),
    SendMessage(String),
    ReplyReceived(String),
    SetBrainstormView(BrainstormView),
    BeginKeywords,
    KeywordsReady(KeywordSet),
    BeginKeywordRegeneration(usize),
    KeywordRegenerated(String),
    ProceedToAssets,
    SetReferenceImage {
        index: usize,
        image: Option<ImageData>,
    },
    SetAccessoryNotes(String),
    BeginImport,
    ImportSucceeded(String),
    BeginShoot,
    ShootSucceeded {
        image: ImageData,
        prompt: String,
    },
    OperationFailed {
        message: String,
        at: DateTime<Utc>,
    },
    DismissError,
    Tick(DateTime<Utc>),
    NewSession,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("not available in the {current:?} step (needs {required:?})")]
    WrongStep { current: Step, required: Step },
    #[error("another request is still running ({0})")]
    Busy(&'static str),
    #[error("upload a garment image first")]
    MissingGarment,
    #[error("choose a target audience first")]
    MissingAudience,
    #[error("message is empty")]
    EmptyMessage,
    #[error("generate keywords first")]
    NoKeywords,
    #[error("the conversation is empty")]
    EmptyTranscript,
    #[error("slot {0} is out of range (0-7)")]
    SlotOutOfRange(usize),
    #[error("no request is running")]
    NothingPending,
    #[error("completion for {received} does not match running {pending}")]
    UnexpectedCompletion {
        pending: &'static str,
        received: &'static str,
    },
}

impl Session {
    /// Computes the state that follows `action`. `self` is left untouched; a
    /// refused action leaves the caller holding the unchanged state.
    pub fn reduce(&self, action: Action) -> Result<Session, Rejected> {
        let mut next = self.clone();
        match action {
            Action::SetGarment(image) => {
                self.require_idle_in(Step::Intake)?;
                if image.is_empty() {
                    return Err(Rejected::MissingGarment);
                }
                next.garment = Some(image);
            }
            Action::SetAudience(audience) => {
                self.require_idle_in(Step::Intake)?;
                next.audience = Some(audience);
            }
            Action::BeginAnalysis => {
                self.require_idle_in(Step::Intake)?;
                if self.garment.is_none() {
                    return Err(Rejected::MissingGarment);
                }
                if self.audience.is_none() {
                    return Err(Rejected::MissingAudience);
                }
                next.begin(PendingOperation::Analysis);
            }
            Action::AnalysisSucceeded(text) => {
                self.require_pending(PendingOperation::Analysis)?;
                let text = if text.trim().is_empty() {
                    ANALYSIS_PLACEHOLDER.to_string()
                } else {
                    text
                };
                next.pending = None;
                next.step = Step::Brainstorm;
                next.brainstorm_view = BrainstormView::Chat;
                next.transcript = Transcript::new().with_turn(Turn::assistant(text));
            }
            Action::SendMessage(text) => {
                self.require_idle_in(Step::Brainstorm)?;
                if text.trim().is_empty() {
                    return Err(Rejected::EmptyMessage);
                }
                next.transcript.push(Turn::user(text));
                next.begin(PendingOperation::Reply);
            }
            Action::ReplyReceived(text) => {
                self.require_pending(PendingOperation::Reply)?;
                next.pending = None;
                next.transcript.push(Turn::assistant(text));
            }
            Action::SetBrainstormView(view) => {
                self.require_step(Step::Brainstorm)?;
                next.brainstorm_view = view;
            }
            Action::BeginKeywords => {
                self.require_idle_in(Step::Brainstorm)?;
                next.begin(PendingOperation::Keywords);
            }
            Action::KeywordsReady(keywords) => {
                self.require_pending(PendingOperation::Keywords)?;
                next.pending = None;
                next.keywords = Some(keywords);
            }
            Action::BeginKeywordRegeneration(index) => {
                self.require_idle_in(Step::Brainstorm)?;
                if index >= CATEGORY_COUNT {
                    return Err(Rejected::SlotOutOfRange(index));
                }
                if self.keywords.is_none() {
                    return Err(Rejected::NoKeywords);
                }
                next.begin(PendingOperation::Regenerate(index));
            }
            Action::KeywordRegenerated(value) => {
                let Some(PendingOperation::Regenerate(index)) = self.pending else {
                    return Err(self.mismatch("regenerate_keyword"));
                };
                next.pending = None;
                if let (Some(keywords), Some(category)) =
                    (self.keywords.as_ref(), Category::from_index(index))
                {
                    next.keywords = Some(keywords.with_replaced(category, value));
                }
            }
            Action::ProceedToAssets => {
                self.require_idle_in(Step::Brainstorm)?;
                next.step = Step::Assets;
            }
            Action::SetReferenceImage { index, image } => {
                self.require_idle_in(Step::Assets)?;
                let Some(slot) = next.reference_images.get_mut(index) else {
                    return Err(Rejected::SlotOutOfRange(index));
                };
                *slot = image.filter(|image| !image.is_empty());
            }
            Action::SetAccessoryNotes(text) => {
                self.require_idle_in(Step::Assets)?;
                next.accessory_notes = text;
            }
            Action::BeginImport => {
                self.require_idle_in(Step::Assets)?;
                if self.transcript.is_empty() {
                    return Err(Rejected::EmptyTranscript);
                }
                next.begin(PendingOperation::Import);
            }
            Action::ImportSucceeded(summary) => {
                self.require_pending(PendingOperation::Import)?;
                next.pending = None;
                if !summary.trim().is_empty() {
                    let mut notes = self.accessory_notes.clone();
                    if !notes.is_empty() {
                        notes.push_str("\n\n");
                    }
                    notes.push_str(FINAL_PLAN_HEADER);
                    notes.push_str(&summary);
                    next.accessory_notes = notes;
                }
            }
            Action::BeginShoot => {
                self.require_idle_in(Step::Assets)?;
                if self.garment.is_none() {
                    return Err(Rejected::MissingGarment);
                }
                next.begin(PendingOperation::Shoot);
            }
            Action::ShootSucceeded { image, prompt } => {
                self.require_pending(PendingOperation::Shoot)?;
                next.pending = None;
                next.final_image = Some(image);
                next.master_prompt = prompt;
                next.step = Step::Result;
            }
            Action::OperationFailed { message, at } => {
                if self.pending.is_none() {
                    return Err(Rejected::NothingPending);
                }
                next.pending = None;
                next.error = Some(TransientError {
                    message,
                    raised_at: at,
                    display_for: self.error_display,
                });
            }
            Action::DismissError => {
                next.error = None;
            }
            Action::Tick(now) => {
                if self.error.as_ref().is_some_and(|error| error.is_expired(now)) {
                    next.error = None;
                }
            }
            Action::NewSession => {
                self.require_idle_in(Step::Result)?;
                next = Session::with_error_display(self.error_display);
            }
        }
        Ok(next)
    }

    fn begin(&mut self, operation: PendingOperation) {
        self.pending = Some(operation);
        self.error = None;
    }

    fn require_step(&self, required: Step) -> Result<(), Rejected> {
        if self.step != required {
            return Err(Rejected::WrongStep {
                current: self.step,
                required,
            });
        }
        Ok(())
    }

    fn require_idle_in(&self, required: Step) -> Result<(), Rejected> {
        self.require_step(required)?;
        if let Some(pending) = self.pending {
            return Err(Rejected::Busy(pending.name()));
        }
        Ok(())
    }

    fn require_pending(&self, expected: PendingOperation) -> Result<(), Rejected> {
        if self.pending == Some(expected) {
            return Ok(());
        }
        Err(self.mismatch(expected.name()))
    }

    fn mismatch(&self, received: &'static str) -> Rejected {
        match self.pending {
            Some(pending) => Rejected::UnexpectedCompletion {
                pending: pending.name(),
                received,
            },
            None => Rejected::NothingPending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::transcript::Role;

    fn garment() -> ImageData {
        ImageData::new(b"garment".to_vec(), "image/jpeg")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap_or_default()
    }

    fn apply(session: Session, actions: Vec<Action>) -> Session {
        actions.into_iter().fold(session, |state, action| {
            state
                .reduce(action.clone())
                .unwrap_or_else(|err| panic!("{action:?} rejected: {err}"))
        })
    }

    fn brainstorming() -> Session {
        apply(
            Session::new(),
            vec![
                Action::SetGarment(garment()),
                Action::SetAudience(Audience::Female),
                Action::BeginAnalysis,
                Action::AnalysisSucceeded("Go for a retro skater editorial.".to_string()),
            ],
        )
    }

    fn in_assets() -> Session {
        apply(brainstorming(), vec![Action::ProceedToAssets])
    }

    fn at_result() -> Session {
        apply(
            in_assets(),
            vec![
                Action::BeginShoot,
                Action::ShootSucceeded {
                    image: ImageData::new(b"final".to_vec(), "image/png"),
                    prompt: "Subject: ...".to_string(),
                },
            ],
        )
    }

    #[test]
    fn analysis_requires_garment_and_audience() {
        let session = Session::new();
        assert!(!session.can_analyze());
        assert_eq!(session.reduce(Action::BeginAnalysis), Err(Rejected::MissingGarment));

        let with_garment = apply(session, vec![Action::SetGarment(garment())]);
        assert_eq!(
            with_garment.reduce(Action::BeginAnalysis),
            Err(Rejected::MissingAudience)
        );

        let ready = apply(with_garment, vec![Action::SetAudience(Audience::Unisex)]);
        assert!(ready.can_analyze());
        let running = apply(ready, vec![Action::BeginAnalysis]);
        assert!(running.in_flight());
        assert_eq!(running.step(), Step::Intake);
    }

    #[test]
    fn successful_analysis_seeds_transcript_and_advances() {
        let session = brainstorming();
        assert_eq!(session.step(), Step::Brainstorm);
        assert!(!session.in_flight());
        assert_eq!(
            session.transcript().turns(),
            &[Turn::assistant("Go for a retro skater editorial.")]
        );
    }

    #[test]
    fn blank_analysis_uses_placeholder_turn() {
        let session = apply(
            Session::new(),
            vec![
                Action::SetGarment(garment()),
                Action::SetAudience(Audience::Male),
                Action::BeginAnalysis,
                Action::AnalysisSucceeded("  ".to_string()),
            ],
        );
        assert_eq!(session.transcript().turns(), &[Turn::assistant("Ready.")]);
    }

    #[test]
    fn failed_analysis_stays_on_intake_with_error() {
        let session = apply(
            Session::new(),
            vec![
                Action::SetGarment(garment()),
                Action::SetAudience(Audience::Female),
                Action::BeginAnalysis,
                Action::OperationFailed {
                    message: "Gemini Service Overloaded. Please try again shortly.".to_string(),
                    at: at(0),
                },
            ],
        );
        assert_eq!(session.step(), Step::Intake);
        assert!(!session.in_flight());
        assert!(session.transcript().is_empty());
        assert_eq!(
            session.error().map(|e| e.message.as_str()),
            Some("Gemini Service Overloaded. Please try again shortly.")
        );
    }

    #[test]
    fn user_turn_is_appended_before_reply_arrives() {
        let session = brainstorming()
            .reduce(Action::SendMessage("make it moodier".to_string()))
            .unwrap();
        assert!(session.in_flight());
        let last = session.transcript().last().cloned().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text, "make it moodier");

        let replied = session
            .reduce(Action::ReplyReceived("Low-key lighting then.".to_string()))
            .unwrap();
        assert_eq!(replied.transcript().len(), 3);
        assert!(!replied.in_flight());
    }

    #[test]
    fn failed_reply_keeps_user_turn() {
        let session = apply(
            brainstorming(),
            vec![
                Action::SendMessage("make it moodier".to_string()),
                Action::OperationFailed {
                    message: "boom".to_string(),
                    at: at(0),
                },
            ],
        );
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.step(), Step::Brainstorm);
    }

    #[test]
    fn blank_message_is_rejected() {
        assert_eq!(
            brainstorming().reduce(Action::SendMessage("   ".to_string())),
            Err(Rejected::EmptyMessage)
        );
    }

    #[test]
    fn single_in_flight_flag_gates_every_action() {
        let generating = apply(brainstorming(), vec![Action::BeginKeywords]);
        assert_eq!(
            generating.reduce(Action::SendMessage("hi".to_string())),
            Err(Rejected::Busy("keywords"))
        );
        assert_eq!(
            generating.reduce(Action::ProceedToAssets),
            Err(Rejected::Busy("keywords"))
        );

        let with_keywords = apply(generating, vec![Action::KeywordsReady(KeywordSet::fallback())]);
        let regenerating = apply(with_keywords, vec![Action::BeginKeywordRegeneration(2)]);
        assert_eq!(regenerating.regenerating_keyword(), Some(2));
        assert_eq!(
            regenerating.reduce(Action::BeginKeywords),
            Err(Rejected::Busy("regenerate_keyword"))
        );
        assert!(matches!(
            regenerating.reduce(Action::KeywordsReady(KeywordSet::fallback())),
            Err(Rejected::UnexpectedCompletion { .. })
        ));
    }

    #[test]
    fn keyword_regeneration_replaces_one_slot() {
        let session = apply(
            brainstorming(),
            vec![
                Action::BeginKeywords,
                Action::KeywordsReady(KeywordSet::fallback()),
                Action::BeginKeywordRegeneration(4),
                Action::KeywordRegenerated("moody grunge film still".to_string()),
            ],
        );
        let keywords = session.keywords().cloned().unwrap();
        assert_eq!(keywords.get(Category::Vibe), "moody grunge film still");
        assert_eq!(keywords.get(Category::Pose), "Model Pose");
        assert_eq!(session.regenerating_keyword(), None);
    }

    #[test]
    fn regeneration_requires_keywords_and_valid_slot() {
        let session = brainstorming();
        assert_eq!(
            session.reduce(Action::BeginKeywordRegeneration(1)),
            Err(Rejected::NoKeywords)
        );
        assert_eq!(
            session.reduce(Action::BeginKeywordRegeneration(8)),
            Err(Rejected::SlotOutOfRange(8))
        );
    }

    #[test]
    fn view_toggle_does_not_change_step() {
        let session = apply(
            brainstorming(),
            vec![Action::SetBrainstormView(BrainstormView::Keywords)],
        );
        assert_eq!(session.brainstorm_view(), BrainstormView::Keywords);
        assert_eq!(session.step(), Step::Brainstorm);
    }

    #[test]
    fn reference_slots_are_index_aligned() {
        let session = apply(
            in_assets(),
            vec![Action::SetReferenceImage {
                index: Category::Lighting.index(),
                image: Some(ImageData::new(b"light".to_vec(), "image/jpeg")),
            }],
        );
        assert!(session.reference_images()[Category::Lighting.index()].is_some());
        assert_eq!(
            session.reference_images().iter().filter(|slot| slot.is_some()).count(),
            1
        );
        assert_eq!(
            session.reduce(Action::SetReferenceImage {
                index: 9,
                image: None
            }),
            Err(Rejected::SlotOutOfRange(9))
        );
    }

    #[test]
    fn import_appends_final_plan_to_notes() {
        let session = apply(
            in_assets(),
            vec![
                Action::SetAccessoryNotes("Gold earrings".to_string()),
                Action::BeginImport,
                Action::ImportSucceeded("Vibe: retro skater".to_string()),
            ],
        );
        assert_eq!(
            session.accessory_notes(),
            "Gold earrings\n\n--- Final Plan ---\nVibe: retro skater"
        );

        let empty_notes = apply(
            in_assets(),
            vec![Action::BeginImport, Action::ImportSucceeded("Lighting: neon".to_string())],
        );
        assert_eq!(empty_notes.accessory_notes(), "--- Final Plan ---\nLighting: neon");
    }

    #[test]
    fn blank_summary_leaves_notes_unchanged() {
        let session = apply(
            in_assets(),
            vec![
                Action::SetAccessoryNotes("Silver chain".to_string()),
                Action::BeginImport,
                Action::ImportSucceeded(String::new()),
            ],
        );
        assert_eq!(session.accessory_notes(), "Silver chain");
        assert!(!session.in_flight());
    }

    #[test]
    fn shoot_success_moves_to_result() {
        let session = at_result();
        assert_eq!(session.step(), Step::Result);
        assert_eq!(session.master_prompt(), "Subject: ...");
        assert!(session.final_image().is_some());
    }

    #[test]
    fn failed_shoot_stays_on_assets() {
        let session = apply(
            in_assets(),
            vec![
                Action::BeginShoot,
                Action::OperationFailed {
                    message: "Image generation failed to return data.".to_string(),
                    at: at(0),
                },
            ],
        );
        assert_eq!(session.step(), Step::Assets);
        assert!(session.final_image().is_none());
    }

    #[test]
    fn new_session_clears_everything_but_display_setting() {
        let custom = Session::with_error_display(Duration::from_secs(6));
        let finished = apply(
            custom,
            vec![
                Action::SetGarment(garment()),
                Action::SetAudience(Audience::Female),
                Action::BeginAnalysis,
                Action::AnalysisSucceeded("plan".to_string()),
                Action::BeginKeywords,
                Action::KeywordsReady(KeywordSet::fallback()),
                Action::ProceedToAssets,
                Action::SetReferenceImage {
                    index: 0,
                    image: Some(garment()),
                },
                Action::BeginShoot,
                Action::ShootSucceeded {
                    image: garment(),
                    prompt: "prompt".to_string(),
                },
            ],
        );
        let reset = finished.reduce(Action::NewSession).unwrap();
        assert_eq!(reset, Session::with_error_display(Duration::from_secs(6)));
        assert_eq!(reset.step(), Step::Intake);
        assert!(reset.garment().is_none());
        assert!(reset.audience().is_none());
        assert!(reset.transcript().is_empty());
        assert!(reset.keywords().is_none());
        assert!(reset.reference_images().iter().all(Option::is_none));
        assert!(reset.final_image().is_none());
        assert!(reset.master_prompt().is_empty());
    }

    #[test]
    fn new_session_only_from_result() {
        assert!(matches!(
            in_assets().reduce(Action::NewSession),
            Err(Rejected::WrongStep { .. })
        ));
        assert!(at_result().reduce(Action::NewSession).is_ok());
    }

    #[test]
    fn error_expires_after_display_window() {
        let failed = apply(
            in_assets(),
            vec![
                Action::BeginShoot,
                Action::OperationFailed {
                    message: "busy".to_string(),
                    at: at(0),
                },
            ],
        );
        let early = failed.reduce(Action::Tick(at(7))).unwrap();
        assert!(early.error().is_some());
        let late = failed.reduce(Action::Tick(at(8))).unwrap();
        assert!(late.error().is_none());
        let dismissed = failed.reduce(Action::DismissError).unwrap();
        assert!(dismissed.error().is_none());
    }

    #[test]
    fn starting_an_operation_clears_previous_error() {
        let failed = apply(
            in_assets(),
            vec![
                Action::BeginShoot,
                Action::OperationFailed {
                    message: "busy".to_string(),
                    at: at(0),
                },
                Action::BeginShoot,
            ],
        );
        assert!(failed.error().is_none());
        assert!(failed.in_flight());
    }

    #[test]
    fn failure_without_pending_operation_is_rejected() {
        assert_eq!(
            Session::new().reduce(Action::OperationFailed {
                message: "late".to_string(),
                at: at(0),
            }),
            Err(Rejected::NothingPending)
        );
    }

    #[test]
    fn reduce_never_mutates_input_state() {
        let before = brainstorming();
        let snapshot = before.clone();
        let _ = before.reduce(Action::SendMessage("hello".to_string()));
        assert_eq!(before, snapshot);
    }
}
