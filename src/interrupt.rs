//! Cooperative cancellation tokens.

use crate::error::{ImportError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by streaming loops at record granularity.
///
/// A child token reports set when its own flag or any ancestor's flag is set;
/// tripping a child never affects its ancestors or siblings.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.flag.clone());
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }

    pub fn trip(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.ancestors.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// `Err(Interrupted)` naming the operation in progress when set.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_set() {
            Err(ImportError::Interrupted(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_trips_children() {
        let run = Interrupt::new();
        let job = run.child();
        let table = job.child();
        assert!(!table.is_set());
        run.trip();
        assert!(job.is_set());
        assert!(table.is_set());
    }

    #[test]
    fn test_child_does_not_trip_siblings_or_parent() {
        let run = Interrupt::new();
        let first = run.child();
        let second = run.child();
        first.trip();
        assert!(first.check("datatable").unwrap_err().is_interrupt());
        assert!(!second.is_set());
        assert!(!run.is_set());
        assert!(second.check("datatable").is_ok());
    }
}
