use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::VerifyError;

/// Cooperative cancellation flag shared by every in-flight check.
///
/// A child token observes its parent as well as its own flag, so the
/// orchestrator can abort its workers without tripping the caller's token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::SeqCst))
    }

    pub fn check(&self) -> Result<(), VerifyError> {
        if self.is_cancelled() {
            Err(VerifyError::Cancelled)
        } else {
            Ok(())
        }
    }
}
