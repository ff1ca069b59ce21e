//! Process-wide halt signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Latched signal raised when storage can no longer be trusted.
///
/// Only the first reason is kept. The host awaits [`Halt::raised`] and owns
/// the actual process exit.
#[derive(Clone)]
pub struct Halt {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Halt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn is_raised(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Resolve with the halt reason once the signal is raised
    pub async fn raised(&self) -> String {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone().unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}

impl Default for Halt {
    fn default() -> Self {
        Self::new()
    }
}
