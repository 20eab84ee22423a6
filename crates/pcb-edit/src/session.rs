use pcb_board::{Board, BoardKernel, DrcReport};

/// The single open board, if any. Engines borrow it per call through
/// [`SessionContext`] and never keep it.
#[derive(Debug, Default)]
pub struct BoardSession {
    board: Option<Board>,
    drc: Option<DrcReport>,
}

impl BoardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.board.is_some()
    }

    /// Replace the open board. Everything derived from the previous one is dropped.
    pub fn install(&mut self, board: Board) {
        self.board = Some(board);
        self.drc = None;
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn board_mut(&mut self) -> Option<&mut Board> {
        self.board.as_mut()
    }

    /// Borrow the open board together with the kernel for one command.
    pub fn context<'a>(&'a mut self, kernel: &'a dyn BoardKernel) -> Option<SessionContext<'a>> {
        let board = self.board.as_mut()?;
        Some(SessionContext {
            board,
            drc: &mut self.drc,
            kernel,
        })
    }
}

/// What an engine may touch while running one command.
pub struct SessionContext<'a> {
    pub board: &'a mut Board,
    /// Result of the last `run_drc`.
    pub drc: &'a mut Option<DrcReport>,
    pub kernel: &'a dyn BoardKernel,
}
