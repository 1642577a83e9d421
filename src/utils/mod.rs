pub mod logging;
pub mod progress;

// Re-export common functions and types
pub use logging::{init_logging, default_log_file};
pub use progress::LogProgress;
