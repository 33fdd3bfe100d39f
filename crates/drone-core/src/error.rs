//! Error taxonomy for drone control.

use thiserror::Error;

use crate::lock_table::HolderId;

/// Errors raised while selecting, commanding or undoing on a drone.
///
/// Everything except [`ControlError::ConnectionFault`] is recoverable and is
/// turned into a status line for the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("drone {device_id} is held by {holder}")]
    SelectionConflict { device_id: String, holder: HolderId },

    #[error("control of drone {device_id} was lost")]
    ControlLost { device_id: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid parameter for {verb}: {reason}")]
    InvalidParameter { verb: String, reason: String },

    #[error("unknown drone: {0}")]
    UnknownDevice(String),

    #[error("no drone selected")]
    NoDeviceSelected,

    #[error("pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("pool handle is not checked out")]
    InvalidHandle,

    #[error("nothing to undo")]
    EmptyUndoStack,

    #[error("device fault on {device_id}: {message}")]
    DeviceFault { device_id: String, message: String },

    #[error("connection fault: {0}")]
    ConnectionFault(String),
}

impl ControlError {
    /// Whether the error ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectionFault(_))
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
