//! Cooperative cancellation.
//!
//! A [`CancelToken`] is cloned into every task of a run. Tasks poll it at step
//! boundaries (after each file copy, around the metadata fan-out, between
//! galleries) and unwind with [`Cancelled`] when it has been tripped. In-flight
//! filesystem operations are never interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("generation cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Callback that trips this token, for a Ctrl-C handler.
    pub fn trigger(&self) -> impl Fn() + Send + 'static {
        let token = self.clone();
        move || {
            tracing::info!("cancellation requested");
            token.cancel();
        }
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.check(), Ok(()));
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let worker = token.clone();
        token.cancel();
        assert!(worker.is_cancelled());
        assert_eq!(worker.check(), Err(Cancelled));
    }

    #[test]
    fn trigger_cancels_the_token() {
        let token = CancelToken::new();
        let trigger = token.trigger();
        assert!(!token.is_cancelled());
        trigger();
        trigger();
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn cancel_across_threads() {
        let token = CancelToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
