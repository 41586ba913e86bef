//! Cooperative cancellation for long analyses.
//!
//! The flag is checked between top-level items in the parsers and
//! between statements in the interpreters. Setting it stops the
//! current stage; partial outputs are returned with a `Cancelled`
//! diagnostic appended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared abort flag. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_between_clones() {
        let flag = AbortFlag::new();
        let other = flag.clone();
        assert!(!other.is_set());
        flag.set();
        assert!(other.is_set());
    }
}
