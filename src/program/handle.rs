use std::sync::{Arc, Mutex};

use crate::context::Context;

/// Tagged exit cause for a runner's eventual termination, replacing a bare
/// "manual-respawn" boolean (spec.md §9 redesign note: "Manual-respawn flag
/// → tagged exit cause").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunIntent {
    /// Nothing has told this runner it's going away; if it exits, that's a
    /// spontaneous crash and the retry machinery applies.
    None,
    /// This runner is being superseded by a hot restart; its exit must not
    /// trigger a retry.
    SupersededByRestart,
    /// An operator issued Stop; its exit must not trigger a retry.
    StoppedByOperator,
}

/// Per-live-invocation bookkeeping the engine needs to act on a runner from
/// outside its own supervising thread: the pid to signal, the intent flag
/// to set before signaling, and a one-shot "terminated" signal to wait on
/// (spec.md §3 "Runner handle").
#[derive(Clone)]
pub struct RunHandle {
    pub pid: u32,
    pub intent: Arc<Mutex<RunIntent>>,
    pub terminated: Context<bool>,
}

impl RunHandle {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            intent: Arc::new(Mutex::new(RunIntent::None)),
            terminated: Context::new(),
        }
    }

    pub fn mark(&self, intent: RunIntent) {
        *self.intent.lock().unwrap() = intent;
    }

    pub fn current_intent(&self) -> RunIntent {
        *self.intent.lock().unwrap()
    }
}
