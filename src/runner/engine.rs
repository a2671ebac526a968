use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::events::RunnerEvents;
use super::item::WorkItem;
use super::state::{Phase, RunError, RunState};
use crate::config::RunnerConfig;
use crate::delegate::{
    DelegateConstructor, InteractionCallback, PresentationDelegate, StepOutcome, StepResult,
};

/// Caller override for the validation/transform step of `initialize`.
pub type ItemEnhancer = Arc<dyn Fn(Vec<WorkItem>) -> Vec<WorkItem> + Send + Sync>;

/// Drives a queue of work items through an optional presentation delegate.
///
/// `Runner` is a cheap handle; clones share the same run. Scheduled
/// continuations (timers and pending delegate steps) run on the Tokio
/// runtime, so calls that may schedule work must happen inside one.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

struct Inner {
    config: RunnerConfig,
    events: RunnerEvents,
    enhancer: Option<ItemEnhancer>,
    state: Mutex<RunState>,
    delegate: Mutex<Option<Arc<dyn PresentationDelegate>>>,
    /// Bumped by reset/initialize/destroy. Continuations from an older
    /// generation are dropped.
    generation: AtomicU64,
    finalizing: AtomicBool,
    /// Set while an `advance_or_finalize` loop is running. Nested calls only
    /// raise `advance_requested`, so synchronous steps never grow the stack.
    advancing: AtomicBool,
    advance_requested: AtomicBool,
}

/// Configures a [`Runner`] before construction.
pub struct RunnerBuilder {
    config: RunnerConfig,
    events: RunnerEvents,
    delegate: Option<Arc<dyn PresentationDelegate>>,
    enhancer: Option<ItemEnhancer>,
}

impl RunnerBuilder {
    pub fn events(mut self, events: RunnerEvents) -> Self {
        self.events = events;
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn PresentationDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Instantiate the delegate right away from a constructor.
    pub fn delegate_with(mut self, constructor: &DelegateConstructor) -> Self {
        self.delegate = Some(constructor());
        self
    }

    pub fn enhance_data(
        mut self,
        enhancer: impl Fn(Vec<WorkItem>) -> Vec<WorkItem> + Send + Sync + 'static,
    ) -> Self {
        self.enhancer = Some(Arc::new(enhancer));
        self
    }

    pub fn build(self) -> Runner {
        Runner {
            inner: Arc::new(Inner {
                config: self.config,
                events: self.events,
                enhancer: self.enhancer,
                state: Mutex::new(RunState::default()),
                delegate: Mutex::new(self.delegate),
                generation: AtomicU64::new(0),
                finalizing: AtomicBool::new(false),
                advancing: AtomicBool::new(false),
                advance_requested: AtomicBool::new(false),
            }),
        }
    }
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        events: RunnerEvents,
        delegate: Option<Arc<dyn PresentationDelegate>>,
    ) -> Self {
        let builder = Self::builder(config).events(events);
        match delegate {
            Some(delegate) => builder.delegate(delegate).build(),
            None => builder.build(),
        }
    }

    pub fn builder(config: RunnerConfig) -> RunnerBuilder {
        RunnerBuilder {
            config,
            events: RunnerEvents::default(),
            delegate: None,
            enhancer: None,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    /// Start a run over `items`, discarding any previous run.
    ///
    /// Returns the state as it was right after the queue was populated; it
    /// does not track later progress.
    pub fn initialize(&self, items: Vec<WorkItem>) -> RunState {
        let items = self.prepare(items);
        self.reset();
        let generation = self.generation();

        let snapshot = {
            let mut state = self.state();
            state.total = items.len();
            state.remaining = items.len();
            state.pendings_data = items.iter().cloned().collect();
            state.phase = Phase::Processing;
            state.clone()
        };
        info!(total = snapshot.total, generation, "runner initialized");
        self.inner.events.initialized(&items, &snapshot);

        match self.delegate() {
            Some(delegate) => {
                let outcome = delegate.initialize(&self.inner.config, self.interaction_callback());
                self.settle(generation, "initialize", None, outcome, move |runner| {
                    runner.schedule_start(generation)
                });
            }
            None if self.inner.config.auto_start => self.advance_or_finalize(),
            None => debug!("auto start disabled, waiting for run_next"),
        }

        snapshot
    }

    /// Whether the pending queue still holds items. Pure query.
    pub fn has_more(&self) -> bool {
        !self.state().pendings_data.is_empty()
    }

    /// Start the next pending item, or finalize once the queue is drained.
    pub fn run_next(&self) {
        self.advance_or_finalize();
    }

    /// The runner's single advance transition: dequeue and present the head
    /// item when there is one, otherwise attempt finalization.
    ///
    /// Calls made while another advance is in progress are queued and run by
    /// the outermost call once the current step returns.
    pub fn advance_or_finalize(&self) {
        let inner = &self.inner;
        inner.advance_requested.store(true, Ordering::SeqCst);
        loop {
            if inner.advancing.swap(true, Ordering::SeqCst) {
                return;
            }
            {
                let _advancing = ClearOnDrop(&inner.advancing);
                while inner.advance_requested.swap(false, Ordering::SeqCst) {
                    if self.has_more() {
                        self.start_next();
                    } else {
                        self.try_finalize_runner();
                    }
                }
            }
            // A request may have landed between the last check and the release.
            if !inner.advance_requested.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    pub fn get_current(&self) -> Option<WorkItem> {
        self.state().current_data.clone()
    }

    /// A copy of the live state.
    pub fn get_state(&self) -> RunState {
        self.state().clone()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    /// Mark the current item processed and move on.
    pub fn complete_current(&self) {
        let generation = self.generation();
        let completed = {
            let mut state = self.state();
            state.current_data.take().map(|mut item| {
                item.is_processed = true;
                item.is_skipped = false;
                item.processing_end_time = Some(Utc::now());
                state.remaining = state.remaining.saturating_sub(1);
                state.processed += 1;
                state.completed_data.push(item.clone());
                item
            })
        };

        let Some(item) = completed else {
            self.try_finalize_runner();
            return;
        };
        debug!(item = %item.id, "item completed");
        self.inner.events.current_completed(&item);

        match self.delegate() {
            Some(delegate) => {
                let outcome = delegate.update_content(&item);
                self.settle(generation, "update_content", Some(&item), outcome, |runner| {
                    runner.continue_if_processing()
                });
            }
            None => self.continue_if_processing(),
        }
    }

    /// Skip the current item. A no-op when skipping is disabled, either by
    /// configuration or by the item itself.
    pub fn skip_current(&self) {
        if !self.inner.config.skip_allowed {
            debug!("skip ignored, skipping is disabled");
            return;
        }

        let generation = self.generation();
        let skipped = {
            let mut state = self.state();
            let skipable = state
                .current_data
                .as_ref()
                .map(|item| item.skipable != Some(false));
            match skipable {
                None => None,
                Some(false) => {
                    debug!("skip ignored, current item is not skipable");
                    return;
                }
                Some(true) => state.current_data.take().map(|mut item| {
                    item.is_skipped = true;
                    item.is_processed = false;
                    item.processing_end_time = Some(Utc::now());
                    state.remaining = state.remaining.saturating_sub(1);
                    state.processed += 1;
                    state.skipped_data.push(item.clone());
                    item
                }),
            }
        };

        let Some(item) = skipped else {
            self.try_finalize_runner();
            return;
        };
        debug!(item = %item.id, "item skipped");
        self.inner.events.current_skipped(&item);

        match self.delegate() {
            Some(delegate) => {
                let outcome = delegate.skip();
                self.settle(generation, "skip", Some(&item), outcome, |runner| {
                    runner.continue_if_processing()
                });
            }
            None => self.continue_if_processing(),
        }
    }

    /// Finish the run once the queue is drained and nothing is current.
    /// Runs at most once per run.
    pub fn try_finalize_runner(&self) {
        {
            let state = self.state();
            if state.phase != Phase::Processing
                || !state.pendings_data.is_empty()
                || state.current_data.is_some()
            {
                return;
            }
            if self.inner.finalizing.swap(true, Ordering::SeqCst) {
                return;
            }
        }

        let generation = self.generation();
        match self.delegate() {
            Some(delegate) => {
                let outcome = delegate.finish(&self.get_state());
                self.settle(generation, "finish", None, outcome, move |runner| {
                    runner.hide(generation)
                });
            }
            None => self.hide(generation),
        }
    }

    /// Record a non-fatal error. Never changes the phase.
    pub fn add_error(&self, message: impl Into<String>, item: Option<WorkItem>) {
        let error = RunError::new(message, item);
        warn!(
            message = %error.message,
            item = error.item.as_ref().map(|i| i.id.as_str()),
            "runner error"
        );
        self.state().errors.push(error.clone());
        self.inner.events.errored(&error.message, error.item.as_ref());
    }

    /// Return to a blank `Initialized` state. Invalidates every scheduled
    /// continuation of the previous run.
    pub fn reset(&self) {
        let mut state = self.state();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.finalizing.store(false, Ordering::SeqCst);
        *state = RunState::default();
    }

    /// Tear the runner down and release the delegate. Pending timers and
    /// delegate steps from earlier runs are discarded when they fire.
    pub fn destroy(&self) {
        self.reset();
        self.state().phase = Phase::Destroyed;
        info!("runner destroyed");

        let delegate = self
            .inner
            .delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(delegate) = delegate else {
            return;
        };
        match delegate.destroy() {
            StepOutcome::Ready(result) => log_destroy(result),
            pending => {
                tokio::spawn(async move { log_destroy(pending.settle().await) });
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delegate(&self) -> Option<Arc<dyn PresentationDelegate>> {
        self.inner
            .delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn is_live(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn prepare(&self, items: Vec<WorkItem>) -> Vec<WorkItem> {
        let mut items = match &self.inner.enhancer {
            Some(enhance) => enhance(items),
            None => items,
        };
        if self.inner.config.priority_based {
            // Stable: equal priorities keep their input order.
            items.sort_by_key(|item| std::cmp::Reverse(item.effective_priority()));
        }
        items
    }

    fn interaction_callback(&self) -> InteractionCallback {
        let hook = self.inner.events.interaction_hook();
        Arc::new(move |kind: &str, data: Value| {
            if let Some(hook) = &hook {
                hook(kind, &data);
            }
        })
    }

    fn schedule_start(&self, generation: u64) {
        let delay = self.inner.config.auto_start_delay;
        if delay == 0 {
            self.advance_or_finalize();
            return;
        }
        debug!(delay_ms = delay, "first item scheduled");
        let runner = self.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            if runner.is_live(generation) {
                runner.advance_or_finalize();
            }
        });
    }

    fn start_next(&self) {
        let generation = self.generation();
        let started = {
            let mut state = self.state();
            if state.phase != Phase::Processing {
                return;
            }
            if let Some(current) = &state.current_data {
                warn!(current = %current.id, "run_next ignored, an item is still current");
                return;
            }
            state.pendings_data.pop_front().map(|mut item| {
                item.processing_start_time = Some(Utc::now());
                state.r_index += 1;
                state.current_data = Some(item.clone());
                (item, state.r_index)
            })
        };

        let Some((item, r_index)) = started else {
            return;
        };
        debug!(item = %item.id, r_index, "item started");
        self.inner.events.current_started(&item);

        // The hook may have completed, skipped or replaced the item already.
        if !self.is_started(generation, r_index) {
            debug!(item = %item.id, r_index, "item left current before presentation");
            return;
        }

        let Some(delegate) = self.delegate() else {
            match item.duration {
                Some(millis) => self.complete_after(generation, r_index, millis),
                None => warn!(
                    item = %item.id,
                    "no duration and no delegate, waiting for complete_current"
                ),
            }
            return;
        };

        match delegate.show(&item, &self.inner.config) {
            outcome @ StepOutcome::Pending(_) => {
                self.settle(generation, "show", Some(&item), outcome, move |runner| {
                    runner.complete_if_current(r_index)
                });
            }
            StepOutcome::Ready(Err(err)) => {
                self.record_failure("show", Some(&item), Err(err));
                self.complete_if_current(r_index);
            }
            StepOutcome::Ready(Ok(())) => match item.duration {
                Some(millis) => self.complete_after(generation, r_index, millis),
                None => debug!(item = %item.id, "waiting for external completion"),
            },
        }
    }

    fn complete_after(&self, generation: u64, r_index: usize, millis: u64) {
        let runner = self.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(millis)).await;
            if runner.is_live(generation) {
                runner.complete_if_current(r_index);
            }
        });
    }

    /// Complete the current item only if it is still the one started as `r_index`.
    fn complete_if_current(&self, r_index: usize) {
        let still_current = {
            let state = self.state();
            state.r_index == r_index && state.current_data.is_some()
        };
        if still_current {
            self.complete_current();
        } else {
            debug!(r_index, "stale completion ignored");
        }
    }

    fn is_started(&self, generation: u64, r_index: usize) -> bool {
        let state = self.state();
        self.is_live(generation) && state.r_index == r_index && state.current_data.is_some()
    }

    fn continue_if_processing(&self) {
        if self.phase() == Phase::Processing {
            self.advance_or_finalize();
        }
    }

    fn hide(&self, generation: u64) {
        match self.delegate() {
            Some(delegate) => {
                let outcome = delegate.hide();
                self.settle(generation, "hide", None, outcome, |runner| runner.finish_run());
            }
            None => self.finish_run(),
        }
    }

    fn finish_run(&self) {
        let (items, snapshot) = {
            let mut state = self.state();
            debug_assert!(
                state.pendings_data.is_empty(),
                "finalized with {} pending items",
                state.pendings_data.len()
            );
            if !state.pendings_data.is_empty() {
                warn!(pending = state.pendings_data.len(), "finalized with pending items");
            }
            state.phase = Phase::Completed;
            let items: Vec<WorkItem> = state
                .completed_data
                .iter()
                .chain(state.skipped_data.iter())
                .cloned()
                .collect();
            (items, state.clone())
        };
        info!(
            processed = snapshot.processed,
            skipped = snapshot.skipped_data.len(),
            errors = snapshot.errors.len(),
            "run completed"
        );
        self.inner.events.finished(&items, &snapshot);
    }

    /// Route a delegate step outcome to `then`, whether it settled already or
    /// settles later. Failures are recorded and never stop the run.
    fn settle<F>(
        &self,
        generation: u64,
        step: &'static str,
        item: Option<&WorkItem>,
        outcome: StepOutcome,
        then: F,
    ) where
        F: FnOnce(&Runner) + Send + 'static,
    {
        match outcome {
            StepOutcome::Ready(result) => self.resume(generation, step, item, result, then),
            StepOutcome::Pending(future) => {
                let runner = self.clone();
                let item = item.cloned();
                tokio::spawn(async move {
                    let result = future.await;
                    runner.resume(generation, step, item.as_ref(), result, then);
                });
            }
        }
    }

    fn resume<F>(
        &self,
        generation: u64,
        step: &'static str,
        item: Option<&WorkItem>,
        result: StepResult,
        then: F,
    ) where
        F: FnOnce(&Runner),
    {
        if !self.is_live(generation) {
            debug!(step, "dropping continuation from a previous run");
            return;
        }
        self.record_failure(step, item, result);
        then(self);
    }

    fn record_failure(&self, step: &str, item: Option<&WorkItem>, result: StepResult) {
        if let Err(err) = result {
            self.add_error(format!("delegate {step} failed: {err}"), item.cloned());
        }
    }
}

/// Releases the flag on drop, including while unwinding from a hook panic.
struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn log_destroy(result: StepResult) {
    if let Err(err) = result {
        warn!(error = %err, "delegate destroy failed");
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .field("generation", &self.generation())
            .finish()
    }
}
