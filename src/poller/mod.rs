mod controller;
mod loop_worker;

pub use controller::PollingController;
pub use loop_worker::{acquire_ambient, PollSettings, DEFAULT_POLL_INTERVAL};
