//! Why a resolution run ended without a badge.
//!
//! None of these reach the host page. They decide whether a run is retried
//! and what gets logged.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("page shows no title or metadata key yet")]
    NoPageContext,
    #[error("no server connection or token available")]
    NoServerContext,
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("upstream response unusable: {0}")]
    Parse(String),
    #[error("no show-level catalog id resolved")]
    NoIdentity,
    #[error("no place on the page to put the badge")]
    NoInjectionTarget,
    #[error("movies are not rated")]
    Excluded,
}

impl SkipReason {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SkipReason::Excluded)
    }
}

/// Early exit from a run: either superseded by a newer navigation or
/// skipped for a [`SkipReason`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunAbort {
    #[error("run superseded by a newer navigation")]
    Stale,
    #[error(transparent)]
    Skipped(#[from] SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_movies_are_final() {
        assert!(SkipReason::NoServerContext.is_retryable());
        assert!(SkipReason::Network("timeout".into()).is_retryable());
        assert!(SkipReason::NoInjectionTarget.is_retryable());
        assert!(!SkipReason::Excluded.is_retryable());
    }

    #[test]
    fn skip_converts_into_abort() {
        let abort: RunAbort = SkipReason::NoIdentity.into();
        assert_eq!(abort, RunAbort::Skipped(SkipReason::NoIdentity));
        assert_eq!(abort.to_string(), "no show-level catalog id resolved");
    }
}
