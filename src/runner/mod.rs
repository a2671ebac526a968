mod engine;
mod events;
mod item;
mod state;


pub use engine::{ItemEnhancer, Runner, RunnerBuilder};
pub use events::RunnerEvents;
pub use item::{load_items, WorkItem, DEFAULT_PRIORITY};
pub use state::{Phase, RunError, RunState};
