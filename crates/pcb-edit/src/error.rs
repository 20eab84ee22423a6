use log::error;
use pcb_board::BoardError;
use pcb_board::units::UnitError;
use thiserror::Error;

/// Failure of a single command. Never terminates the server.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No board is loaded")]
    NoBoardLoaded,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{message}")]
    Internal { message: String, details: String },

    #[error("Invalid JSON input")]
    InvalidJson(String),

    #[error("Missing command")]
    MissingCommand,
}

pub type CommandResult<T> = Result<T, CommandError>;

impl CommandError {
    /// Stable machine-readable tag emitted as `errorCode`.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NoBoardLoaded => "NO_BOARD_LOADED",
            CommandError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            CommandError::MissingParameter(_) => "MISSING_PARAMETER",
            CommandError::InvalidParameter(_) => "INVALID_PARAMETER",
            CommandError::NotFound(_) => "NOT_FOUND",
            CommandError::AlreadyExists(_) => "ALREADY_EXISTS",
            CommandError::Unsupported(_) => "UNSUPPORTED",
            CommandError::Internal { .. } => "INTERNAL_ERROR",
            CommandError::InvalidJson(_) => "INVALID_JSON",
            CommandError::MissingCommand => "MISSING_COMMAND",
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            CommandError::NoBoardLoaded => Some("Load or create a board first".to_string()),
            CommandError::UnknownCommand(_) => {
                Some("The specified command is not supported".to_string())
            }
            CommandError::MissingParameter(name) => Some(format!("{name} parameter is required")),
            CommandError::Internal { details, .. } => Some(details.clone()),
            CommandError::InvalidJson(details) => Some(details.clone()),
            CommandError::MissingCommand => {
                Some("Requests must carry a \"command\" field".to_string())
            }
            _ => None,
        }
    }

    pub fn missing(name: &str) -> Self {
        CommandError::MissingParameter(name.to_string())
    }

    /// Wrap a collaborator failure, keeping its whole cause chain.
    pub fn internal(message: impl Into<String>, err: &anyhow::Error) -> Self {
        CommandError::Internal {
            message: message.into(),
            details: format!("{err:#}"),
        }
    }
}

impl From<UnitError> for CommandError {
    fn from(err: UnitError) -> Self {
        CommandError::InvalidParameter(err.to_string())
    }
}

impl From<BoardError> for CommandError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::DuplicateReference(_) => CommandError::AlreadyExists(err.to_string()),
        }
    }
}

/// Convert kernel and I/O failures into [`CommandError::Internal`].
pub trait KernelResultExt<T> {
    fn or_internal(self, message: &str) -> CommandResult<T>;
}

impl<T> KernelResultExt<T> for anyhow::Result<T> {
    fn or_internal(self, message: &str) -> CommandResult<T> {
        self.map_err(|err| {
            error!("{message}: {err:#}");
            CommandError::internal(message, &err)
        })
    }
}

/// Unwrap a required parameter.
pub fn required<T>(value: Option<T>, name: &str) -> CommandResult<T> {
    value.ok_or_else(|| CommandError::missing(name))
}
