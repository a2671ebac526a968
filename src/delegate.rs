//! Presentation delegate contract.
//!
//! A delegate knows how to present a [`WorkItem`]; the runner never assumes
//! one exists. Every step returns a [`StepOutcome`], which is either already
//! settled or settles later, and the runner routes both through the same
//! continuation path.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::config::RunnerConfig;
use crate::runner::{RunState, WorkItem};

/// Failure reported by a delegate step. Always non-fatal to the run.
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DelegateError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type StepResult = Result<(), DelegateError>;

/// Result of one delegate step.
pub enum StepOutcome {
    /// The step finished before returning.
    Ready(StepResult),
    /// The step settles when the future resolves.
    Pending(BoxFuture<'static, StepResult>),
}

impl StepOutcome {
    pub fn done() -> Self {
        Self::Ready(Ok(()))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Ready(Err(DelegateError::failed(message)))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = StepResult> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Await the outcome regardless of which variant it is.
    pub async fn settle(self) -> StepResult {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Channel a delegate uses to report user interaction (`kind`, payload) back
/// to the runner's `on_interaction` hook.
pub type InteractionCallback = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Something that can visually or audibly present work items.
///
/// `initialize`, `show`, `hide` and `destroy` are required. The remaining
/// steps default to an immediate success, which the runner treats exactly
/// like an absent capability.
pub trait PresentationDelegate: Send + Sync {
    fn initialize(&self, config: &RunnerConfig, interaction: InteractionCallback) -> StepOutcome;

    /// Present `item`. A pending outcome completes the item when it settles.
    /// A ready outcome leaves completion to the item's `duration`, or to an
    /// explicit `complete_current` call when there is none.
    fn show(&self, item: &WorkItem, config: &RunnerConfig) -> StepOutcome;

    fn hide(&self) -> StepOutcome;

    fn update_content(&self, _item: &WorkItem) -> StepOutcome {
        StepOutcome::done()
    }

    fn skip(&self) -> StepOutcome {
        StepOutcome::done()
    }

    fn finish(&self, _state: &RunState) -> StepOutcome {
        StepOutcome::done()
    }

    fn destroy(&self) -> StepOutcome;
}

/// Builds a fresh delegate instance.
pub type DelegateConstructor = Arc<dyn Fn() -> Arc<dyn PresentationDelegate> + Send + Sync>;
