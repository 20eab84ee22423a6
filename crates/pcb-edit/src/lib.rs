//! Editing core for KiCad boards: typed commands, the engines that run them,
//! and the line-oriented JSON server in front of them.

pub mod alignment;
pub mod board_ops;
pub mod bom;
pub mod command;
pub mod design_rules;
pub mod engine;
pub mod error;
pub mod export;
pub mod files;
pub mod params;
pub mod placement;
pub mod project;
pub mod response;
pub mod routing;
pub mod router;
pub mod schematic;
pub mod server;
pub mod session;

#[cfg(test)]
mod testing;

pub use command::Command;
pub use error::{CommandError, CommandResult};
pub use response::{Outcome, Response};
pub use router::CommandRouter;
pub use session::BoardSession;
