//! Lifecycle hooks
//!
//! Hooks run synchronously in registration order. A before hook may refuse
//! the action by returning `Err(reason)`; after hooks run only on success.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Action, Record};

/// Runs before an action; `Err(reason)` aborts it.
pub type BeforeHook = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Runs after an action succeeded.
pub type AfterHook = Arc<dyn Fn(&Record) + Send + Sync>;

/// Hook lists keyed by action.
#[derive(Clone, Default)]
pub struct Hooks {
    before: HashMap<Action, Vec<BeforeHook>>,
    after: HashMap<Action, Vec<AfterHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_before(&mut self, action: Action, hook: BeforeHook) {
        self.before.entry(action).or_default().push(hook);
    }

    pub fn add_after(&mut self, action: Action, hook: AfterHook) {
        self.after.entry(action).or_default().push(hook);
    }

    /// Before hooks for `action`, cloned so they can run without a lock held.
    pub fn before(&self, action: Action) -> Vec<BeforeHook> {
        self.before.get(&action).cloned().unwrap_or_default()
    }

    pub fn after(&self, action: Action) -> Vec<AfterHook> {
        self.after.get(&action).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.before.values().all(Vec::is_empty) && self.after.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let before: usize = self.before.values().map(Vec::len).sum();
        let after: usize = self.after.values().map(Vec::len).sum();
        f.debug_struct("Hooks")
            .field("before", &before)
            .field("after", &after)
            .finish()
    }
}

/// Runs before hooks in order, stopping at the first refusal.
pub(crate) fn run_before(hooks: &[BeforeHook], record: &Record) -> Result<(), String> {
    hooks.iter().try_for_each(|hook| hook(record))
}

pub(crate) fn run_after(hooks: &[AfterHook], record: &Record) {
    for hook in hooks {
        hook(record);
    }
}
