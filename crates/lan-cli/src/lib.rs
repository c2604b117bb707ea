// Library interface for lan-cli
// This allows integration tests to access internal modules

// NOTE: commands.rs is also declared in main.rs, so it is referenced by
// path here to avoid "file loaded multiple times" errors.

#[path = "commands.rs"]
pub mod commands;

pub use commands::{handle_command, CommandResult};
