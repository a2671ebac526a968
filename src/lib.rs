//! Sequential work-item runner.
//!
//! A [`Runner`] consumes an ordered (optionally prioritized) queue of
//! [`WorkItem`]s, drives an optional [`PresentationDelegate`] through each
//! item's lifecycle, and reports progress, skips and errors through
//! [`RunnerEvents`] hooks.

pub mod config;
pub mod delegate;
pub mod error;
pub mod registry;
pub mod runner;
pub mod ui;

pub use config::RunnerConfig;
pub use delegate::{
    DelegateConstructor, DelegateError, InteractionCallback, PresentationDelegate, StepOutcome,
};
pub use error::SequencerError;
pub use registry::{DelegateSource, EngineSource, RegistryError, RunnerRegistry, RunnerSpec};
pub use runner::{Phase, RunError, RunState, Runner, RunnerEvents, WorkItem};
