//! Explicit name tables for building runners from configuration.
//!
//! Engines and delegates are registered under stable identifiers at startup.
//! A name that was never registered is a typed [`RegistryError`] rather than
//! an empty result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::config::RunnerConfig;
use crate::delegate::{DelegateConstructor, PresentationDelegate};
use crate::runner::{Runner, RunnerEvents, WorkItem};
use crate::ui::ConsolePresenter;

pub const DEFAULT_ENGINE: &str = "default";
pub const CONSOLE_DELEGATE: &str = "console";

/// Builds a runner from its options, hooks and an already resolved delegate.
pub type EngineConstructor = Arc<
    dyn Fn(RunnerConfig, RunnerEvents, Option<Arc<dyn PresentationDelegate>>) -> Runner
        + Send
        + Sync,
>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no engine registered under {0:?}")]
    UnknownEngine(String),

    #[error("no delegate registered under {0:?}")]
    UnknownDelegate(String),

    #[error("engine {0:?} is already registered")]
    DuplicateEngine(String),

    #[error("delegate {0:?} is already registered")]
    DuplicateDelegate(String),
}

pub enum EngineSource {
    Named(String),
    Constructor(EngineConstructor),
}

impl From<&str> for EngineSource {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

#[derive(Default)]
pub enum DelegateSource {
    #[default]
    None,
    Instance(Arc<dyn PresentationDelegate>),
    Constructor(DelegateConstructor),
    Named(String),
}

/// Everything needed to build (and optionally start) a runner.
pub struct RunnerSpec {
    pub implementation: EngineSource,
    pub options: RunnerConfig,
    pub events: RunnerEvents,
    pub delegate: DelegateSource,
    /// When present, the runner is initialized with these items before it is returned.
    pub data: Option<Vec<WorkItem>>,
}

impl RunnerSpec {
    pub fn new(implementation: impl Into<EngineSource>, options: RunnerConfig) -> Self {
        Self {
            implementation: implementation.into(),
            options,
            events: RunnerEvents::default(),
            delegate: DelegateSource::None,
            data: None,
        }
    }

    pub fn events(mut self, events: RunnerEvents) -> Self {
        self.events = events;
        self
    }

    pub fn delegate(mut self, delegate: DelegateSource) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn data(mut self, items: Vec<WorkItem>) -> Self {
        self.data = Some(items);
        self
    }
}

#[derive(Default)]
pub struct RunnerRegistry {
    engines: HashMap<String, EngineConstructor>,
    delegates: HashMap<String, DelegateConstructor>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock engine and the console presenter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .engines
            .insert(DEFAULT_ENGINE.to_string(), Arc::new(Runner::new));
        registry.delegates.insert(
            CONSOLE_DELEGATE.to_string(),
            Arc::new(|| Arc::new(ConsolePresenter::new()) as Arc<dyn PresentationDelegate>),
        );
        registry
    }

    pub fn register_engine(
        &mut self,
        name: impl Into<String>,
        constructor: EngineConstructor,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.engines.contains_key(&name) {
            return Err(RegistryError::DuplicateEngine(name));
        }
        debug!(engine = %name, "engine registered");
        self.engines.insert(name, constructor);
        Ok(())
    }

    pub fn register_delegate(
        &mut self,
        name: impl Into<String>,
        constructor: DelegateConstructor,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.delegates.contains_key(&name) {
            return Err(RegistryError::DuplicateDelegate(name));
        }
        debug!(delegate = %name, "delegate registered");
        self.delegates.insert(name, constructor);
        Ok(())
    }

    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    pub fn has_delegate(&self, name: &str) -> bool {
        self.delegates.contains_key(name)
    }

    /// Resolve the engine and delegate named in `spec` and construct the runner.
    pub fn build(&self, spec: RunnerSpec) -> Result<Runner, RegistryError> {
        let engine = match spec.implementation {
            EngineSource::Constructor(constructor) => constructor,
            EngineSource::Named(name) => self
                .engines
                .get(&name)
                .cloned()
                .ok_or(RegistryError::UnknownEngine(name))?,
        };

        let delegate = match spec.delegate {
            DelegateSource::None => None,
            DelegateSource::Instance(delegate) => Some(delegate),
            DelegateSource::Constructor(constructor) => Some(constructor()),
            DelegateSource::Named(name) => {
                let constructor = self
                    .delegates
                    .get(&name)
                    .ok_or(RegistryError::UnknownDelegate(name))?;
                Some(constructor())
            }
        };

        let runner = engine(spec.options, spec.events, delegate);
        if let Some(items) = spec.data {
            runner.initialize(items);
        }
        Ok(runner)
    }
}

impl fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut engines: Vec<_> = self.engines.keys().collect();
        let mut delegates: Vec<_> = self.delegates.keys().collect();
        engines.sort();
        delegates.sort();
        f.debug_struct("RunnerRegistry")
            .field("engines", &engines)
            .field("delegates", &delegates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::{InteractionCallback, StepOutcome};
    use crate::runner::Phase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Silent;

    impl PresentationDelegate for Silent {
        fn initialize(&self, _: &RunnerConfig, _: InteractionCallback) -> StepOutcome {
            StepOutcome::done()
        }
        fn show(&self, _: &WorkItem, _: &RunnerConfig) -> StepOutcome {
            StepOutcome::done()
        }
        fn hide(&self) -> StepOutcome {
            StepOutcome::done()
        }
        fn destroy(&self) -> StepOutcome {
            StepOutcome::done()
        }
    }

    fn silent() -> DelegateConstructor {
        Arc::new(|| Arc::new(Silent) as Arc<dyn PresentationDelegate>)
    }

    #[test]
    fn defaults_are_registered() {
        let registry = RunnerRegistry::with_defaults();
        assert!(registry.has_engine(DEFAULT_ENGINE));
        assert!(registry.has_delegate(CONSOLE_DELEGATE));
        assert_eq!(
            format!("{registry:?}"),
            r#"RunnerRegistry { engines: ["default"], delegates: ["console"] }"#
        );
    }

    #[test]
    fn unknown_engine_is_an_error() {
        let registry = RunnerRegistry::with_defaults();
        let err = registry
            .build(RunnerSpec::new("app.runners.Fancy", RunnerConfig::default()))
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownEngine("app.runners.Fancy".into()));
    }

    #[test]
    fn unknown_delegate_is_an_error() {
        let registry = RunnerRegistry::with_defaults();
        let spec = RunnerSpec::new(DEFAULT_ENGINE, RunnerConfig::default())
            .delegate(DelegateSource::Named("hologram".into()));
        let err = registry.build(spec).unwrap_err();
        assert_eq!(err, RegistryError::UnknownDelegate("hologram".into()));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = RunnerRegistry::new();
        registry.register_delegate("silent", silent()).unwrap();
        let err = registry.register_delegate("silent", silent()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDelegate("silent".into()));

        let engine: EngineConstructor = Arc::new(Runner::new);
        registry.register_engine("plain", engine.clone()).unwrap();
        let err = registry.register_engine("plain", engine).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEngine("plain".into()));
    }

    #[test]
    fn named_delegate_is_constructed_per_build() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut registry = RunnerRegistry::with_defaults();
        registry
            .register_delegate(
                "counted",
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Arc::new(Silent) as Arc<dyn PresentationDelegate>
                }),
            )
            .unwrap();

        for _ in 0..2 {
            let spec = RunnerSpec::new(DEFAULT_ENGINE, RunnerConfig::default())
                .delegate(DelegateSource::Named("counted".into()));
            registry.build(spec).unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn data_initializes_the_runner() {
        let registry = RunnerRegistry::with_defaults();
        let config = RunnerConfig {
            auto_start: false,
            ..Default::default()
        };
        let spec = RunnerSpec::new(DEFAULT_ENGINE, config).data(vec![WorkItem::new()]);

        let runner = registry.build(spec).unwrap();
        let state = runner.get_state();
        assert_eq!(state.phase, Phase::Processing);
        assert_eq!(state.total, 1);
    }

    #[test]
    fn custom_engine_applies_its_enhancer() {
        let mut registry = RunnerRegistry::new();
        registry
            .register_engine(
                "tagged",
                Arc::new(
                    |config: RunnerConfig,
                     events: RunnerEvents,
                     _delegate: Option<Arc<dyn PresentationDelegate>>| {
                        Runner::builder(config)
                            .events(events)
                            .enhance_data(|items| {
                                items.into_iter().map(|i| i.with_field("tagged", true)).collect()
                            })
                            .build()
                    },
                ),
            )
            .unwrap();
        let config = RunnerConfig {
            auto_start: false,
            ..Default::default()
        };

        let runner = registry
            .build(RunnerSpec::new("tagged", config).data(vec![WorkItem::new()]))
            .unwrap();
        let state = runner.get_state();
        assert_eq!(
            state.pendings_data[0].extra.get("tagged"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn constructor_sources_bypass_the_tables() {
        let registry = RunnerRegistry::new();
        let engine: EngineConstructor = Arc::new(Runner::new);
        let spec = RunnerSpec::new(EngineSource::Constructor(engine), RunnerConfig::default())
            .delegate(DelegateSource::Constructor(silent()))
            .data(Vec::new());

        let runner = registry.build(spec).unwrap();
        assert_eq!(runner.phase(), Phase::Completed);
    }
}
