use crate::error::CommandResult;
use crate::response::Outcome;
use crate::session::SessionContext;

/// A group of commands operating on the open board.
pub trait Engine {
    type Command;

    fn execute(&self, ctx: &mut SessionContext<'_>, command: Self::Command)
    -> CommandResult<Outcome>;
}
