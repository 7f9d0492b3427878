// ABOUTME: Command module aggregator for the shipwright CLI.
// ABOUTME: Re-exports environment, release and status command handlers.

mod backend;
mod environment;
mod release;
mod status;

pub use environment::create_environment;
pub use release::{deploy, promote};
pub use status::status;
