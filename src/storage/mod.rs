pub mod archive;
pub mod manifest;

// Re-export common types
pub use archive::ArchiveWriter;
pub use manifest::{archive_file_name, bundle_entries};
