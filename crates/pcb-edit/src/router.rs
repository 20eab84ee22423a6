//! Request dispatch: decodes one request, checks the session state, runs the
//! command on its engine and wraps the result in a [`Response`].

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error, info};
use pcb_board::BoardKernel;
use serde_json::Value;

use crate::alignment::AlignmentEngine;
use crate::board_ops::BoardEngine;
use crate::command::{Command, is_known, requires_board};
use crate::design_rules::DesignRuleEngine;
use crate::engine::Engine;
use crate::error::{CommandError, CommandResult};
use crate::export::ExportEngine;
use crate::placement::PlacementEngine;
use crate::project;
use crate::response::{Outcome, Response};
use crate::routing::RoutingEngine;
use crate::schematic::{SchematicEditor, default_symbol_patterns};
use crate::session::BoardSession;

pub struct CommandRouter {
    kernel: Box<dyn BoardKernel>,
    session: BoardSession,
    symbol_patterns: Vec<String>,
}

impl CommandRouter {
    pub fn new(kernel: Box<dyn BoardKernel>) -> Self {
        Self {
            kernel,
            session: BoardSession::new(),
            symbol_patterns: default_symbol_patterns(),
        }
    }

    /// Replace the glob patterns `list_schematic_libraries` searches by default.
    pub fn with_symbol_patterns(mut self, patterns: Vec<String>) -> Self {
        if !patterns.is_empty() {
            self.symbol_patterns = patterns;
        }
        self
    }

    pub fn session(&self) -> &BoardSession {
        &self.session
    }

    /// Handle one raw request line.
    pub fn handle_line(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Value>(line) {
            Ok(request) => self.handle_request(request),
            Err(err) => {
                error!("Failed to parse request: {err}");
                Response::from_error(&CommandError::InvalidJson(err.to_string()))
            }
        }
    }

    pub fn handle_request(&mut self, mut request: Value) -> Response {
        let Some(name) = request
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Response::from_error(&CommandError::MissingCommand);
        };
        let params = request
            .get_mut("params")
            .map(Value::take)
            .unwrap_or(Value::Null);

        info!("Handling command: {name}");
        debug!("Params: {params}");

        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(&name, params)))
            .unwrap_or_else(|panic| {
                let details = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Command {name} panicked: {details}");
                Err(CommandError::Internal {
                    message: format!("Command {name} failed unexpectedly"),
                    details,
                })
            });

        if let Err(err) = &result {
            debug!("Command {name} failed: {err}");
        }
        Response::from(result)
    }

    fn dispatch(&mut self, name: &str, params: Value) -> CommandResult<Outcome> {
        if !is_known(name) {
            return Err(CommandError::UnknownCommand(name.to_string()));
        }
        if requires_board(name) && !self.session.is_loaded() {
            return Err(CommandError::NoBoardLoaded);
        }

        let kernel = self.kernel.as_ref();
        let session = &mut self.session;
        match Command::from_request(name, params)? {
            Command::Project(command) => project::execute(session, kernel, command),
            Command::Schematic(command) => SchematicEditor {
                kernel,
                default_patterns: &self.symbol_patterns,
            }
            .execute(command),
            Command::Board(c) => on_board(session, kernel, BoardEngine, c),
            Command::Placement(c) => on_board(session, kernel, PlacementEngine, c),
            Command::Align(c) => on_board(session, kernel, AlignmentEngine, c),
            Command::Routing(c) => on_board(session, kernel, RoutingEngine, c),
            Command::DesignRule(c) => on_board(session, kernel, DesignRuleEngine, c),
            Command::Export(c) => on_board(session, kernel, ExportEngine, c),
        }
    }
}

fn on_board<E: Engine>(
    session: &mut BoardSession,
    kernel: &dyn BoardKernel,
    engine: E,
    command: E::Command,
) -> CommandResult<Outcome> {
    let mut ctx = session
        .context(kernel)
        .ok_or(CommandError::NoBoardLoaded)?;
    engine.execute(&mut ctx, command)
}
