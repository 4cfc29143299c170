//! Load error model and transport backoff helper.

use std::time::Duration;

use pushload_types::error::PushError;

use crate::input::InputError;

const BACKOFF_MAX_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// LoadError: the single error type surfaced to the top-level handler
// ---------------------------------------------------------------------------

/// Terminal failure of a load run.
///
/// `Push` wraps a typed [`PushError`] raised by the reconciler, the ingestion
/// pipeline or the HTTP client. `Infrastructure` wraps local failures
/// (config parsing, manifest and CSV I/O) that carry no remote semantics.
#[derive(Debug)]
pub enum LoadError {
    /// Typed reconciliation, ingestion or transport error.
    Push(PushError),
    /// Local I/O, parse or configuration error.
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<anyhow::Error> for LoadError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<PushError> for LoadError {
    fn from(e: PushError) -> Self {
        Self::Push(e)
    }
}

impl From<InputError> for LoadError {
    fn from(e: InputError) -> Self {
        Self::Infrastructure(anyhow::Error::new(e))
    }
}

impl LoadError {
    /// Returns the typed push error if this is a `Push` variant.
    pub fn as_push_error(&self) -> Option<&PushError> {
        match self {
            Self::Push(e) => Some(e),
            Self::Infrastructure(_) => None,
        }
    }

    /// Stable error code, when one exists.
    pub fn code(&self) -> Option<&str> {
        self.as_push_error().map(|e| e.code.as_str())
    }
}

/// Exponential transport backoff: `base * 2^(attempt-1)`, capped at 60 s.
pub(crate) fn compute_backoff(base: Duration, attempt: u32) -> Duration {
    #[allow(clippy::cast_possible_truncation)]
    let base_ms = base.as_millis() as u64;
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor).min(BACKOFF_MAX_MS))
}
