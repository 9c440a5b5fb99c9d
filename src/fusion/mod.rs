mod engine;
mod state;

pub use engine::{FusionEngine, HistoryPolicy};
pub use state::{advisory_request, FusionState};
