use std::env;
use std::time::Duration;

use studio_contracts::session::DEFAULT_ERROR_DISPLAY;

use crate::retry::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
pub const SEQUENTIAL_STAGGER: Duration = Duration::from_secs(1);

/// How the two artifact sub-calls are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactSchedule {
    #[default]
    Parallel,
    /// Text first, then `delay`, then the image.
    Sequential { delay: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub text_model: String,
    pub image_model: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub artifact_schedule: ArtifactSchedule,
    pub error_display: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            artifact_schedule: ArtifactSchedule::Parallel,
            error_display: DEFAULT_ERROR_DISPLAY,
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies `STUDIO_*` overrides; unparsable values keep the default and
    /// out-of-range values are clamped.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_attempts = value_as_f64(
            lookup("STUDIO_RETRY_ATTEMPTS").as_deref(),
            f64::from(DEFAULT_MAX_ATTEMPTS),
            1.0,
            6.0,
        )
        .round() as u32;
        let backoff_base = value_as_f64(
            lookup("STUDIO_RETRY_BACKOFF_BASE").as_deref(),
            DEFAULT_BACKOFF_BASE,
            1.0,
            5.0,
        );
        let request_timeout = value_as_f64(
            lookup("STUDIO_REQUEST_TIMEOUT_S").as_deref(),
            defaults.request_timeout.as_secs_f64(),
            15.0,
            300.0,
        );
        let error_display = value_as_f64(
            lookup("STUDIO_ERROR_DISPLAY_S").as_deref(),
            defaults.error_display.as_secs_f64(),
            1.0,
            60.0,
        );
        let artifact_schedule = match lookup("STUDIO_ARTIFACT_SCHEDULE")
            .map(|raw| raw.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("sequential") => ArtifactSchedule::Sequential {
                delay: SEQUENTIAL_STAGGER,
            },
            _ => ArtifactSchedule::Parallel,
        };

        Self {
            retry: RetryPolicy::new(max_attempts, backoff_base),
            request_timeout: Duration::from_secs_f64(request_timeout),
            artifact_schedule,
            error_display: Duration::from_secs_f64(error_display),
            ..defaults
        }
    }
}

fn value_as_f64(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}
