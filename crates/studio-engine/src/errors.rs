use tracing::error;

use crate::transport::RemoteFailure;

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Authentication,
    RateLimited,
    Overloaded,
    SafetyBlocked,
    InvalidRequest,
    Unclassified,
}

impl FailureCategory {
    /// Fixed guidance shown for the category; `None` means pass the raw text through.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            FailureCategory::Authentication => Some(
                "Access Denied: Invalid or restricted API Key. Please ensure you have selected a valid project key.",
            ),
            FailureCategory::RateLimited => Some(
                "System Busy: Rate limit exceeded. We tried retrying, but the server is still busy. Please wait 60 seconds.",
            ),
            FailureCategory::Overloaded => {
                Some("Gemini Service Overloaded. Please try again shortly.")
            }
            FailureCategory::SafetyBlocked => {
                Some("Request blocked by AI safety filters. Please modify your input.")
            }
            FailureCategory::InvalidRequest => {
                Some("Invalid request. Please check your inputs and try again.")
            }
            FailureCategory::Unclassified => None,
        }
    }
}

pub struct ClassificationRule {
    pub category: FailureCategory,
    pub matches: fn(&RemoteFailure) -> bool,
}

/// Evaluated top to bottom; the first matching rule wins.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        category: FailureCategory::Authentication,
        matches: is_authentication_failure,
    },
    ClassificationRule {
        category: FailureCategory::RateLimited,
        matches: is_rate_limit_failure,
    },
    ClassificationRule {
        category: FailureCategory::Overloaded,
        matches: is_overload_failure,
    },
    ClassificationRule {
        category: FailureCategory::SafetyBlocked,
        matches: is_safety_failure,
    },
    ClassificationRule {
        category: FailureCategory::InvalidRequest,
        matches: is_invalid_request_failure,
    },
];

fn is_authentication_failure(failure: &RemoteFailure) -> bool {
    matches!(failure.status, Some(401 | 403))
        || failure.message.contains("403")
        || failure.message.contains("API key")
        || failure.message.contains("API_KEY")
        || failure.message.contains("PERMISSION_DENIED")
}

fn is_rate_limit_failure(failure: &RemoteFailure) -> bool {
    failure.status == Some(429) || failure.message.contains("429")
}

fn is_overload_failure(failure: &RemoteFailure) -> bool {
    failure.status == Some(503)
        || failure.message.contains("503")
        || failure.message.contains("Overloaded")
        || failure.message.contains("overloaded")
        || failure.message.contains("UNAVAILABLE")
}

fn is_safety_failure(failure: &RemoteFailure) -> bool {
    failure.message.contains("SAFETY")
}

fn is_invalid_request_failure(failure: &RemoteFailure) -> bool {
    failure.status == Some(400) || failure.message.contains("400")
}

pub fn classify(failure: &RemoteFailure) -> FailureCategory {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(failure))
        .map(|rule| rule.category)
        .unwrap_or(FailureCategory::Unclassified)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFailure {
    pub category: FailureCategory,
    pub message: String,
}

/// Total: every failure maps to one category and a non-empty message.
pub fn normalize(failure: &RemoteFailure) -> NormalizedFailure {
    error!(status = ?failure.status, message = %failure.message, "remote generation failed");
    let category = classify(failure);
    let message = match category.guidance() {
        Some(guidance) => guidance.to_string(),
        None if failure.message.trim().is_empty() => UNKNOWN_ERROR_MESSAGE.to_string(),
        None => failure.message.clone(),
    };
    NormalizedFailure { category, message }
}

/// What callers of the generation client see when an operation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("{}", .0.message)]
    Remote(NormalizedFailure),
    #[error("Image generation failed to return data.")]
    NoImageReturned,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Request cancelled.")]
    Cancelled,
}

impl GenerationError {
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            GenerationError::Remote(failure) => Some(failure.category),
            _ => None,
        }
    }
}

impl From<RemoteFailure> for GenerationError {
    fn from(failure: RemoteFailure) -> Self {
        if failure.cancelled {
            return GenerationError::Cancelled;
        }
        GenerationError::Remote(normalize(&failure))
    }
}
