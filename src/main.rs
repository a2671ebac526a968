mod cli;

use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use sequencer::runner::load_items;
use sequencer::{
    DelegateSource, RunState, Runner, RunnerConfig, RunnerEvents, RunnerRegistry, RunnerSpec,
    WorkItem, registry::DEFAULT_ENGINE,
};

/// Duration given to items that do not declare one, so terminal runs never stall.
const DEFAULT_ITEM_DURATION_MS: u64 = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = RunnerConfig::load(cli.config.as_deref())?;
    if cli.priority {
        config.priority_based = true;
    }

    match cli.command {
        Command::Run { file, delegate } => {
            let items = load_items(&file)
                .with_context(|| format!("failed to load items from {}", file.display()))?;
            let items = items
                .into_iter()
                .map(|item| match item.duration {
                    Some(_) => item,
                    None => item.with_duration(DEFAULT_ITEM_DURATION_MS),
                })
                .collect();
            let state = run(config, DelegateSource::Named(delegate), items).await?;
            print_summary(&state);
        }
        Command::Order { file } => {
            let items = load_items(&file)
                .with_context(|| format!("failed to load items from {}", file.display()))?;
            let planner = Runner::new(
                RunnerConfig {
                    auto_start: false,
                    ..config
                },
                RunnerEvents::new(),
                None,
            );
            let state = planner.initialize(items);
            for (position, item) in state.pendings_data.iter().enumerate() {
                println!(
                    "{:>3}. {} (priority {})",
                    position + 1,
                    item.label(),
                    item.effective_priority()
                );
            }
        }
        Command::Demo => {
            let state = run(
                config,
                DelegateSource::Named(sequencer::registry::CONSOLE_DELEGATE.to_string()),
                demo_items(),
            )
            .await?;
            print_summary(&state);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Build a runner through the registry, start it, and wait for `on_finish`.
async fn run(
    config: RunnerConfig,
    delegate: DelegateSource,
    items: Vec<WorkItem>,
) -> Result<RunState> {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let events = RunnerEvents::new().on_finish(move |_items, state| {
        let sender = tx.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(state.clone());
        }
    });

    let registry = RunnerRegistry::with_defaults();
    let spec = RunnerSpec::new(DEFAULT_ENGINE, config)
        .events(events)
        .delegate(delegate)
        .data(items);
    let _runner = registry.build(spec)?;

    rx.await.context("runner stopped before finishing")
}

fn demo_items() -> Vec<WorkItem> {
    vec![
        WorkItem::new()
            .with_field("label", "Load assets")
            .with_priority(9)
            .with_duration(600),
        WorkItem::new()
            .with_field("label", "Play intro")
            .with_duration(900),
        WorkItem::new()
            .with_field("label", "Show tutorial")
            .with_priority(3)
            .with_duration(700),
        WorkItem::new()
            .with_field("label", "Warm up audio")
            .with_priority(7)
            .with_duration(400),
    ]
}

fn print_summary(state: &RunState) {
    println!();
    println!("{}", serde_json::to_string_pretty(state).unwrap_or_default());
}
