mod reducer;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::category::{Audience, CATEGORY_COUNT};
use crate::image::ImageData;
use crate::keywords::KeywordSet;
use crate::transcript::Transcript;

pub use reducer::{Action, Rejected};

pub const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Intake = 1,
    Brainstorm = 2,
    Assets = 3,
    Result = 4,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Intake => "Garment",
            Step::Brainstorm => "Brainstorm",
            Step::Assets => "Assets",
            Step::Result => "Studio",
        }
    }
}

/// Which half of the brainstorm screen is showing. Not a separate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrainstormView {
    #[default]
    Chat,
    Keywords,
}

/// The remote operation the in-flight flag is currently held for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOperation {
    Analysis,
    Reply,
    Keywords,
    Regenerate(usize),
    Import,
    Shoot,
}

impl PendingOperation {
    pub fn name(self) -> &'static str {
        match self {
            PendingOperation::Analysis => "analysis",
            PendingOperation::Reply => "reply",
            PendingOperation::Keywords => "keywords",
            PendingOperation::Regenerate(_) => "regenerate_keyword",
            PendingOperation::Import => "import_plan",
            PendingOperation::Shoot => "shoot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientError {
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub display_for: Duration,
}

impl TransientError {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.raised_at)
            .to_std()
            .map(|elapsed| elapsed >= self.display_for)
            .unwrap_or(false)
    }
}

/// Working state of one wizard run. Only [`Session::reduce`] produces new
/// values; fields are read-only outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub(crate) step: Step,
    pub(crate) audience: Option<Audience>,
    pub(crate) garment: Option<ImageData>,
    pub(crate) brainstorm_view: BrainstormView,
    pub(crate) transcript: Transcript,
    pub(crate) keywords: Option<KeywordSet>,
    pub(crate) reference_images: [Option<ImageData>; CATEGORY_COUNT],
    pub(crate) accessory_notes: String,
    pub(crate) final_image: Option<ImageData>,
    pub(crate) master_prompt: String,
    pub(crate) pending: Option<PendingOperation>,
    pub(crate) error: Option<TransientError>,
    pub(crate) error_display: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_error_display(DEFAULT_ERROR_DISPLAY)
    }

    pub fn with_error_display(error_display: Duration) -> Self {
        Self {
            step: Step::Intake,
            audience: None,
            garment: None,
            brainstorm_view: BrainstormView::Chat,
            transcript: Transcript::new(),
            keywords: None,
            reference_images: Default::default(),
            accessory_notes: String::new(),
            final_image: None,
            master_prompt: String::new(),
            pending: None,
            error: None,
            error_display,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn audience(&self) -> Option<Audience> {
        self.audience
    }

    pub fn garment(&self) -> Option<&ImageData> {
        self.garment.as_ref()
    }

    pub fn brainstorm_view(&self) -> BrainstormView {
        self.brainstorm_view
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn keywords(&self) -> Option<&KeywordSet> {
        self.keywords.as_ref()
    }

    pub fn reference_images(&self) -> &[Option<ImageData>; CATEGORY_COUNT] {
        &self.reference_images
    }

    pub fn accessory_notes(&self) -> &str {
        &self.accessory_notes
    }

    pub fn final_image(&self) -> Option<&ImageData> {
        self.final_image.as_ref()
    }

    pub fn master_prompt(&self) -> &str {
        &self.master_prompt
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<PendingOperation> {
        self.pending
    }

    pub fn error(&self) -> Option<&TransientError> {
        self.error.as_ref()
    }

    pub fn error_display(&self) -> Duration {
        self.error_display
    }

    /// Index of the keyword slot being regenerated, if any.
    pub fn regenerating_keyword(&self) -> Option<usize> {
        match self.pending {
            Some(PendingOperation::Regenerate(index)) => Some(index),
            _ => None,
        }
    }

    /// Whether the intake transition is currently enabled.
    pub fn can_analyze(&self) -> bool {
        self.step == Step::Intake
            && !self.in_flight()
            && self.garment.is_some()
            && self.audience.is_some()
    }
}
