//! Error types for the window manager core.
//!
//! Per the fatal/recoverable split in the specification's error handling
//! design: `WmError` variants that are recoverable are logged and handled
//! locally (the `Result` is consumed at the call site); the fatal kinds
//! (`XConnection`, `Alloc`, `SocketSetup`) are allowed to propagate out of
//! `run()` and terminate the process with a nonzero exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WmError {
    #[error("failed to connect to the X display")]
    XConnection,

    #[error("another window manager is already running")]
    WmAlreadyRunning,

    #[error("no screen associated with display")]
    NoScreen,

    #[error("client allocation failed")]
    Alloc,

    #[error("control socket setup failed: {0}")]
    SocketSetup(String),

    #[error("atom intern failed for {0}")]
    AtomIntern(String),

    #[error("delete register is full")]
    DeleteRegisterFull,

    #[error("delete register is empty")]
    DeleteRegisterEmpty,

    #[error("workspace index {0} out of range")]
    InvalidWorkspace(usize),

    #[error("client {0:#x} not found")]
    ClientNotFound(u64),

    #[error("malformed socket command: {0}")]
    MalformedCommand(String),

    #[error("scratchpad slot already occupied")]
    ScratchpadOccupied,

    #[error("scratchpad slot is empty")]
    ScratchpadEmpty,

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WmError>;

/// Whether an error represents one of the fatal kinds in spec section 7,
/// which should terminate the event loop rather than be logged and ignored.
impl WmError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WmError::XConnection | WmError::Alloc | WmError::SocketSetup(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_are_exactly_the_ones_in_section_7() {
        assert!(WmError::XConnection.is_fatal());
        assert!(WmError::Alloc.is_fatal());
        assert!(WmError::SocketSetup("bind failed".into()).is_fatal());
    }

    #[test]
    fn recoverable_kinds_are_not_fatal() {
        assert!(!WmError::DeleteRegisterFull.is_fatal());
        assert!(!WmError::ScratchpadOccupied.is_fatal());
        assert!(!WmError::MalformedCommand("bad".into()).is_fatal());
        assert!(!WmError::WmAlreadyRunning.is_fatal());
        assert!(!WmError::NoScreen.is_fatal());
    }
}
