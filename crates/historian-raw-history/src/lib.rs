/*
[INPUT]:  Public API exports for historian-raw-history crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod events;
pub mod samples;
pub mod script;

// Re-export main types for convenience
pub use config::ScriptConfig;
pub use events::{describe_event, print_events};
pub use samples::{demo_filter, generate_write_items};
pub use script::{SessionScript, create_api_client, print_plan};
