use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::item::WorkItem;
use super::state::RunState;

type ItemsHook = Box<dyn Fn(&[WorkItem], &RunState) + Send + Sync>;
type ItemHook = Box<dyn Fn(&WorkItem) + Send + Sync>;
type InteractionHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, Option<&WorkItem>) + Send + Sync>;

/// Caller-supplied hooks, all optional.
///
/// Hooks fire synchronously at the point of transition and never while the
/// runner holds its internal lock, so a hook may call back into the runner.
/// Panics inside a hook are not caught.
#[derive(Default)]
pub struct RunnerEvents {
    on_initialize: Option<ItemsHook>,
    on_current_start: Option<ItemHook>,
    on_current_complete: Option<ItemHook>,
    on_current_skip: Option<ItemHook>,
    on_interaction: Option<InteractionHook>,
    on_finish: Option<ItemsHook>,
    on_error: Option<ErrorHook>,
}

impl RunnerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initialize(
        mut self,
        hook: impl Fn(&[WorkItem], &RunState) + Send + Sync + 'static,
    ) -> Self {
        self.on_initialize = Some(Box::new(hook));
        self
    }

    pub fn on_current_start(mut self, hook: impl Fn(&WorkItem) + Send + Sync + 'static) -> Self {
        self.on_current_start = Some(Box::new(hook));
        self
    }

    pub fn on_current_complete(mut self, hook: impl Fn(&WorkItem) + Send + Sync + 'static) -> Self {
        self.on_current_complete = Some(Box::new(hook));
        self
    }

    pub fn on_current_skip(mut self, hook: impl Fn(&WorkItem) + Send + Sync + 'static) -> Self {
        self.on_current_skip = Some(Box::new(hook));
        self
    }

    /// Receives interactions reported by the delegate, never by the runner itself.
    pub fn on_interaction(mut self, hook: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
        self.on_interaction = Some(Arc::new(hook));
        self
    }

    pub fn on_finish(
        mut self,
        hook: impl Fn(&[WorkItem], &RunState) + Send + Sync + 'static,
    ) -> Self {
        self.on_finish = Some(Box::new(hook));
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(&str, Option<&WorkItem>) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub(crate) fn initialized(&self, items: &[WorkItem], state: &RunState) {
        if let Some(hook) = &self.on_initialize {
            hook(items, state);
        }
    }

    pub(crate) fn current_started(&self, item: &WorkItem) {
        if let Some(hook) = &self.on_current_start {
            hook(item);
        }
    }

    pub(crate) fn current_completed(&self, item: &WorkItem) {
        if let Some(hook) = &self.on_current_complete {
            hook(item);
        }
    }

    pub(crate) fn current_skipped(&self, item: &WorkItem) {
        if let Some(hook) = &self.on_current_skip {
            hook(item);
        }
    }

    pub(crate) fn interaction_hook(&self) -> Option<InteractionHook> {
        self.on_interaction.clone()
    }

    pub(crate) fn finished(&self, items: &[WorkItem], state: &RunState) {
        if let Some(hook) = &self.on_finish {
            hook(items, state);
        }
    }

    pub(crate) fn errored(&self, message: &str, item: Option<&WorkItem>) {
        if let Some(hook) = &self.on_error {
            hook(message, item);
        }
    }
}

impl fmt::Debug for RunnerEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerEvents")
            .field("on_initialize", &self.on_initialize.is_some())
            .field("on_current_start", &self.on_current_start.is_some())
            .field("on_current_complete", &self.on_current_complete.is_some())
            .field("on_current_skip", &self.on_current_skip.is_some())
            .field("on_interaction", &self.on_interaction.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
