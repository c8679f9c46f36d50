//! Cooperative shutdown signal shared by the polling loop and its controllers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "running" flag
///
/// Cloned into every signal source (quit command, ctrl-c handler). The
/// polling loop checks it at the top of each tick; whichever source
/// cancels first wins and later cancellations are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    running: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request shutdown. Returns true for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_running()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cancel_wins() {
        let token = ShutdownToken::new();
        let signal = token.clone();
        assert!(token.is_running());

        assert!(signal.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_across_threads() {
        let token = ShutdownToken::new();
        let remote = token.clone();
        std::thread::spawn(move || {
            remote.cancel();
        })
        .join()
        .unwrap();
        assert!(token.is_cancelled());
    }
}
