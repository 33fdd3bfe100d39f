//! Reversible drone commands.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::ControlResult;

/// The closed set of operations a session can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    Arm,
    Takeoff,
    Land,
    Hover,
    MoveForward,
    MoveBack,
    DropPayload,
    Rotate { degree: i32 },
    ChangeAltitude { altitude_m: i32 },
}

impl CommandKind {
    /// Wire verb for this command.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Takeoff => "takeoff",
            Self::Land => "land",
            Self::Hover => "hover",
            Self::MoveForward => "move_forward",
            Self::MoveBack => "move_back",
            Self::DropPayload => "drop_payload",
            Self::Rotate { .. } => "rotate",
            Self::ChangeAltitude { .. } => "change_altitude",
        }
    }

    /// Status line reported to the operator after a successful run.
    pub fn status(&self) -> String {
        match self {
            Self::Arm => "Drone armed".to_string(),
            Self::Takeoff => "Drone is taking off".to_string(),
            Self::Land => "Drone is landing".to_string(),
            Self::Hover => "Drone is hovering".to_string(),
            Self::MoveForward => "Drone is moving forward".to_string(),
            Self::MoveBack => "Drone is moving back".to_string(),
            Self::DropPayload => "Drone dropped its payload".to_string(),
            Self::Rotate { degree } => format!("Drone rotated by {} deg", degree),
            Self::ChangeAltitude { altitude_m } => {
                format!("Drone changing altitude to {} m", altitude_m)
            }
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotate { degree } => write!(f, "rotate {}", degree),
            Self::ChangeAltitude { altitude_m } => write!(f, "change_altitude {}", altitude_m),
            other => f.write_str(other.verb()),
        }
    }
}

/// Result of undoing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The inverse operation ran.
    Reverted(CommandKind),
    /// The command has no inverse; nothing was sent to the drone.
    NotSupported(CommandKind),
}

/// A command bound to its target drone.
#[derive(Debug, Clone)]
pub struct Command {
    device: Arc<Device>,
    kind: CommandKind,
}

impl Command {
    pub fn new(device: Arc<Device>, kind: CommandKind) -> Self {
        Self { device, kind }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn execute(&self) -> ControlResult<()> {
        match self.kind {
            CommandKind::Arm => self.device.arm(),
            CommandKind::Takeoff => self.device.takeoff(),
            CommandKind::Land => self.device.land(),
            CommandKind::Hover => self.device.hover(),
            CommandKind::MoveForward => self.device.move_forward(),
            CommandKind::MoveBack => self.device.move_back(),
            CommandKind::DropPayload => self.device.drop_payload(),
            CommandKind::Rotate { degree } => self.device.rotate(degree),
            CommandKind::ChangeAltitude { altitude_m } => self.device.change_altitude(altitude_m),
        }
    }

    /// Run the inverse operation, if one exists.
    pub fn undo(&self) -> ControlResult<UndoOutcome> {
        match self.kind {
            CommandKind::Rotate { degree } => {
                self.device.rotate_cancel(degree)?;
                Ok(UndoOutcome::Reverted(self.kind))
            }
            _ => Ok(UndoOutcome::NotSupported(self.kind)),
        }
    }
}

/// Pool container for a command waiting in a batch queue.
#[derive(Debug, Default)]
pub struct CommandSlot {
    command: Option<Command>,
}

impl CommandSlot {
    pub fn fill(&mut self, command: Command) {
        self.command = Some(command);
    }

    pub fn take(&mut self) -> Option<Command> {
        self.command.take()
    }

    pub fn peek(&self) -> Option<&Command> {
        self.command.as_ref()
    }
}

impl crate::pool::Reusable for CommandSlot {
    fn reset(&mut self) {
        self.command = None;
    }
}
