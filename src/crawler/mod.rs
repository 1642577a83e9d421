pub mod controller;
pub mod scheduler;
pub mod search;
pub mod task;

// Re-export common types
pub use controller::ScrapeController;
pub use task::{RunConfig, ScrapeRun};
