//! CLI domain: parse, route, and output only.
//! No domain orchestration; single route table dispatches to the site API.

mod output;
mod parse;
mod route;

pub use output::map_error;
pub use parse::{BlocksCommands, Cli, Commands};
pub use route::RunContext;
