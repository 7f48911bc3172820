pub mod client;
pub mod config;
pub mod errors;
pub mod prompts;
pub mod retry;
pub mod studio;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{Artifact, ArtifactRequest, GenerationClient};
pub use config::{ArtifactSchedule, StudioConfig};
pub use errors::{normalize, FailureCategory, GenerationError, NormalizedFailure};
pub use retry::{CancelToken, RetryPolicy, Sleeper, ThreadSleeper};
pub use studio::{Studio, StudioError};
pub use transport::{
    ContentRequest, ContentResponse, ContentTransport, DryrunTransport, GeminiTransport,
    RemoteFailure,
};
