//! Scoped "form is processing" lock.
//!
//! [`BlockGuard::acquire`] blocks a target and the guard unblocks it when
//! dropped, so every exit path of an async body releases the lock, including
//! early returns and `?`.

use std::fmt;
use std::rc::Rc;

/// Selector of a page region that can be blocked or receive errors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormTarget(String);

impl FormTarget {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn selector(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormTarget {
    fn from(selector: &str) -> Self {
        Self::new(selector)
    }
}

/// Visual lock over a page region.
pub trait UiBlocker {
    fn block(&self, target: &FormTarget);
    fn unblock(&self, target: &FormTarget);
}

/// Releases its target on drop.
#[must_use = "the target is unblocked as soon as the guard is dropped"]
pub struct BlockGuard {
    blocker: Rc<dyn UiBlocker>,
    target: FormTarget,
}

impl BlockGuard {
    pub fn acquire(blocker: Rc<dyn UiBlocker>, target: FormTarget) -> Self {
        tracing::debug!(target = %target, "blocking form");
        blocker.block(&target);
        Self { blocker, target }
    }

    /// Releases now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        tracing::debug!(target = %self.target, "unblocking form");
        self.blocker.unblock(&self.target);
    }
}
