//! Error types for the CustomPodAutoscaler controller

use std::time::Duration;

use thiserror::Error;

/// Error variants are named with the `Error` suffix for clarity (e.g., `KubeError`, `ValidationError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The scale target reference could not be serialized. Its shape is
    /// fixed by the CRD, so this indicates a broken invariant.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 409 Conflict, 429 TooManyRequests) are usually not retryable
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        return code == 409 || code == 429;
                    }
                    true
                }
                // Network and other errors are retryable
                _ => true,
            },
            // Scale target kind may become served later (e.g. CRD installed)
            Error::NotFound(_) => true,
            Error::SerializationError(_) => false,
            Error::MissingObjectKey(_) => false,
            Error::ValidationError(_) => false,
        }
    }

    /// Check if this error can never be resolved by requeueing the same object
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::SerializationError(_))
    }

    /// Check if this error is a 404 from the API server
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(resp)) if resp.code == 404)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Requeue delay configuration for failed reconciliations
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Delay before retrying a retryable error
    pub initial_delay: Duration,
    /// Delay before revisiting an object that failed permanently
    pub max_delay: Duration,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300), // 5 minutes
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Retry delay with jitter applied, so that failures across many
    /// autoscalers do not requeue in lockstep
    pub fn retry_delay(&self) -> Duration {
        let base_delay_secs = self.initial_delay.as_secs_f64();
        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        Duration::from_secs_f64(delay_with_jitter.min(self.max_delay.as_secs_f64()))
    }

    /// Get the delay for an error, with different handling for retryable vs non-retryable
    pub fn delay_for_error(&self, error: &Error) -> Duration {
        if error.is_retryable() {
            self.retry_delay()
        } else {
            // Leave room for manual intervention; editing the object also triggers a watch event
            self.max_delay
        }
    }
}
