use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Liveness flag tied to one view's lifetime.
///
/// In-flight remote calls are never cancelled, so a response can arrive after
/// the view that initiated it is gone. Every settle path checks the token and
/// discards the local state change once the scope has been retired; the
/// remote outcome is still returned to whoever is awaiting it.
#[derive(Debug, Clone)]
pub struct ScopeToken {
    live: Arc<AtomicBool>,
}

impl ScopeToken {
    pub fn new() -> Self {
        ScopeToken {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for ScopeToken {
    fn default() -> Self {
        Self::new()
    }
}
