//! Recovery policy, cancellation, and callback seams for bulkfs
//!
//! The engine never decides on its own how to react to a failure and
//! never owns a UI. Both concerns are injected: a [`RecoveryPolicy`]
//! answers retry/skip/abort (a GUI may block on a prompt inside
//! `decide`), and plain function values carry progress and load
//! notifications back to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{PathInfo, ProcessError, ProcessProgress};

/// The recovery decision for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorAction {
    /// Re-run the same item's action
    Retry,
    /// Record the item in the error queue and continue with the next
    Skip,
    /// Abort the whole remaining batch
    Abort,
}

/// Maps a classified error to a recovery action.
///
/// `decide` is async because interactive callers await a modal prompt
/// here; headless callers return immediately.
#[async_trait::async_trait]
pub trait RecoveryPolicy: Send + Sync {
    /// Choose the action for `error`.
    async fn decide(&self, error: &ProcessError) -> ErrorAction;
}

/// A policy that always returns the same action.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub ErrorAction);

#[async_trait::async_trait]
impl RecoveryPolicy for FixedPolicy {
    async fn decide(&self, _error: &ProcessError) -> ErrorAction {
        self.0
    }
}

/// A policy backed by a plain closure.
pub struct FnPolicy<F>(pub F);

#[async_trait::async_trait]
impl<F> RecoveryPolicy for FnPolicy<F>
where
    F: Fn(&ProcessError) -> ErrorAction + Send + Sync,
{
    async fn decide(&self, error: &ProcessError) -> ErrorAction {
        (self.0)(error)
    }
}

/// Trait for cooperative cancellation.
pub trait Cancellable {
    /// Request cancellation.
    fn cancel(&self);

    /// Whether cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

/// Shared cancellation flag polled by the engine at its suspension
/// points: between items, between streamed chunks, and around retry
/// iterations. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token with no cancellation requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the flag so the token can back a fresh run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

impl Cancellable for CancelToken {
    fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Fire-and-forget progress callback; the latest value wins.
pub type ProgressFn = Arc<dyn Fn(&ProcessProgress) + Send + Sync>;

/// Per-item load observer; returning `false` cancels loading.
pub type PathLoadedFn = Box<dyn FnMut(&PathInfo) -> bool + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_policy_always_answers_the_same() {
        let policy = FixedPolicy(ErrorAction::Skip);
        let err = ProcessError::unknown("x");
        assert_eq!(policy.decide(&err).await, ErrorAction::Skip);
        assert_eq!(policy.decide(&err).await, ErrorAction::Skip);
    }

    #[tokio::test]
    async fn fn_policy_sees_the_error() {
        let policy = FnPolicy(|e: &ProcessError| {
            if matches!(e, ProcessError::SharingViolation { .. }) {
                ErrorAction::Retry
            } else {
                ErrorAction::Abort
            }
        });
        let sharing = ProcessError::SharingViolation {
            path: "/l".into(),
        };
        assert_eq!(policy.decide(&sharing).await, ErrorAction::Retry);
        assert_eq!(
            policy.decide(&ProcessError::unknown("y")).await,
            ErrorAction::Abort
        );
    }

    #[test]
    fn cancel_token_is_shared_and_resettable() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!clone.is_cancelled());
    }
}
