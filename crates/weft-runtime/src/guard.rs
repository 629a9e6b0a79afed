//! Singleton apply guard.
//!
//! Repeated application of bootstrap injection for the same compile target
//! is legal in the host integration; the guard makes it idempotent. The
//! marker is a weak side-table association keyed by target identity, never
//! a flag on the target itself: the target's shape is owned by the external
//! collaborator, and dead entries are purged so the table does not outlive
//! its targets.

use std::any::Any;
use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::{Rc, Weak};

/// Runs an action at most once per live target.
#[derive(Default)]
pub struct ApplyOnce {
    seen: RefCell<Vec<Weak<dyn Any>>>,
}

impl ApplyOnce {
    pub fn new() -> ApplyOnce {
        ApplyOnce::default()
    }

    /// Run `action` if it has not yet run for this target.
    ///
    /// Returns true when the action ran.
    pub fn once<T: Any>(&self, target: &Rc<T>, action: impl FnOnce()) -> bool {
        match self.try_once(target, || -> Result<(), Infallible> {
            action();
            Ok(())
        }) {
            Ok(ran) => ran,
            Err(never) => match never {},
        }
    }

    /// Run a fallible `action` if it has not yet run for this target.
    ///
    /// The target is marked only when the action succeeds; a failed first
    /// attempt leaves the target retryable. Returns `Ok(true)` when the
    /// action ran and succeeded, `Ok(false)` when the target had already
    /// been applied.
    pub fn try_once<T: Any, E>(
        &self,
        target: &Rc<T>,
        action: impl FnOnce() -> Result<(), E>,
    ) -> Result<bool, E> {
        let handle: Rc<dyn Any> = target.clone();
        let candidate = Rc::downgrade(&handle);
        // Compare allocation addresses, not fat pointers; vtable
        // identity is not stable for trait objects.
        let candidate_addr = Weak::as_ptr(&candidate) as *const ();
        {
            let mut seen = self.seen.borrow_mut();
            seen.retain(|entry| entry.strong_count() > 0);
            if seen
                .iter()
                .any(|entry| Weak::as_ptr(entry) as *const () == candidate_addr)
            {
                return Ok(false);
            }
        }
        action()?;
        self.seen.borrow_mut().push(candidate);
        Ok(true)
    }

    /// Number of live markers, for diagnostics.
    pub fn live_targets(&self) -> usize {
        self.seen
            .borrow()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_once_per_target() {
        let guard = ApplyOnce::new();
        let target = Rc::new("compiler".to_string());
        let mut runs = 0;
        assert!(guard.once(&target, || runs += 1));
        assert!(!guard.once(&target, || runs += 1));
        assert!(!guard.once(&target, || runs += 1));
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_distinct_targets_each_run() {
        let guard = ApplyOnce::new();
        let a = Rc::new(1u32);
        let b = Rc::new(1u32);
        let mut runs = 0;
        assert!(guard.once(&a, || runs += 1));
        assert!(guard.once(&b, || runs += 1));
        assert_eq!(runs, 2);
    }

    #[test]
    fn test_failed_action_leaves_target_retryable() {
        let guard = ApplyOnce::new();
        let target = Rc::new("compiler".to_string());
        assert!(guard
            .try_once(&target, || Err::<(), &str>("wiring failed"))
            .is_err());
        // The failure did not mark the target; the next attempt runs.
        assert_eq!(guard.try_once(&target, || Ok::<(), &str>(())), Ok(true));
        assert_eq!(guard.try_once(&target, || Ok::<(), &str>(())), Ok(false));
    }

    #[test]
    fn test_markers_do_not_outlive_targets() {
        let guard = ApplyOnce::new();
        {
            let target = Rc::new(7u64);
            guard.once(&target, || {});
            assert_eq!(guard.live_targets(), 1);
        }
        assert_eq!(guard.live_targets(), 0);
        // A fresh target reuses the slot without being mistaken for the
        // dropped one.
        let next = Rc::new(7u64);
        assert!(guard.once(&next, || {}));
    }
}
