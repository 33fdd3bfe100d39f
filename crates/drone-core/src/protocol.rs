//! Text protocol spoken over the control socket.
//!
//! One client line in, one status line out.

use std::fmt;

use crate::command::CommandKind;
use crate::error::ControlError;
use crate::invoker::FlushReport;
use crate::lock_table::HolderId;

pub const SELECT_VERB: &str = "selected_drone";

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Select(String),
    Verb { verb: String, arg: Option<String> },
    Queue { verb: String, arg: Option<String> },
    Flush,
    Undo,
    Release,
}

impl ClientMessage {
    pub fn parse(line: &str) -> Result<Self, ControlError> {
        let mut parts = line.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let first = parts.next().map(str::to_string);
        let second = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(ControlError::InvalidParameter {
                verb: head.to_string(),
                reason: "too many arguments".to_string(),
            });
        }

        match head {
            SELECT_VERB => match (first, second) {
                (Some(device_id), None) => Ok(Self::Select(device_id)),
                _ => Err(ControlError::InvalidParameter {
                    verb: SELECT_VERB.to_string(),
                    reason: "expected exactly one drone id".to_string(),
                }),
            },
            "queue" => match first {
                Some(verb) => Ok(Self::Queue { verb, arg: second }),
                None => Err(ControlError::InvalidParameter {
                    verb: "queue".to_string(),
                    reason: "missing command to queue".to_string(),
                }),
            },
            "flush" | "undo" | "release" if first.is_some() => {
                Err(ControlError::InvalidParameter {
                    verb: head.to_string(),
                    reason: "takes no arguments".to_string(),
                })
            }
            "flush" => Ok(Self::Flush),
            "undo" => Ok(Self::Undo),
            "release" => Ok(Self::Release),
            verb if second.is_none() => Ok(Self::Verb {
                verb: verb.to_string(),
                arg: first,
            }),
            verb => Err(ControlError::InvalidParameter {
                verb: verb.to_string(),
                reason: "too many arguments".to_string(),
            }),
        }
    }
}

/// Status line sent back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    ControlGranted { device_id: String },
    AlreadyYours { device_id: String },
    Busy { device_id: String, holder: HolderId },
    SelectFirst,
    Executed(CommandKind),
    Queued { kind: CommandKind, queued: usize, capacity: usize },
    Flushed(FlushReport),
    Undone(CommandKind),
    UndoNotSupported(CommandKind),
    NothingToUndo,
    Released { device_id: String },
    ControlLost { device_id: String },
    Failed(ControlError),
}

impl From<ControlError> for Reply {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::SelectionConflict { device_id, holder } => {
                Self::Busy { device_id, holder }
            }
            ControlError::NoDeviceSelected => Self::SelectFirst,
            ControlError::ControlLost { device_id } => Self::ControlLost { device_id },
            ControlError::EmptyUndoStack => Self::NothingToUndo,
            other => Self::Failed(other),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlGranted { device_id } => {
                write!(f, "Drone {} selected. Control granted", device_id)
            }
            Self::AlreadyYours { device_id } => {
                write!(f, "You already control drone {}!", device_id)
            }
            Self::Busy { device_id, holder } => {
                write!(f, "Drone {} is busy, held by another operator ({})", device_id, holder)
            }
            Self::SelectFirst => f.write_str("Select a drone first!"),
            Self::Executed(kind) => f.write_str(&kind.status()),
            Self::Queued {
                kind,
                queued,
                capacity,
            } => write!(f, "Queued {} ({}/{})", kind, queued, capacity),
            Self::Flushed(report) => match &report.fault {
                None => write!(f, "Executed {} queued commands", report.executed),
                Some(err) => write!(
                    f,
                    "Executed {} queued commands, discarded {}: {}",
                    report.executed, report.discarded, err
                ),
            },
            Self::Undone(kind) => write!(f, "Undid {}", kind),
            Self::UndoNotSupported(kind) => {
                write!(f, "Undo is not supported for {}", kind.verb())
            }
            Self::NothingToUndo => f.write_str("Nothing to undo"),
            Self::Released { device_id } => write!(f, "Released drone {}", device_id),
            Self::ControlLost { device_id } => {
                write!(f, "Control of drone {} was lost, select it again", device_id)
            }
            Self::Failed(err) => match err {
                ControlError::UnknownCommand(_) => f.write_str("Unknown command"),
                ControlError::UnknownDevice(id) => write!(f, "Unknown drone {}", id),
                ControlError::PoolExhausted { capacity } => {
                    write!(f, "Command queue is full ({} slots), flush first", capacity)
                }
                ControlError::DeviceFault { device_id, message } => {
                    write!(f, "Drone {} fault: {}", device_id, message)
                }
                other => write!(f, "Error: {}", other),
            },
        }
    }
}
