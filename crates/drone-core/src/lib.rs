//! Core logic for exclusive drone control.
//!
//! Sessions compete for drones through a shared [`LockTable`]; the winner
//! drives its drone with [`Command`]s run through a per-session [`Invoker`]
//! that keeps an undo history and a pooled batch queue.

pub mod command;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod fleet;
pub mod invoker;
pub mod lock_table;
pub mod pool;
pub mod protocol;
pub mod session;

pub use command::{Command, CommandKind, CommandSlot, UndoOutcome};
pub use device::{Device, DeviceDriver, DriverError, LoggingDriver};
pub use error::{ControlError, ControlResult};
pub use fleet::{DeviceInfo, Fleet, FleetEntry, FleetError};
pub use invoker::{FlushReport, Invoker};
pub use lock_table::{HolderId, LockOutcome, LockSnapshot, LockTable};
pub use pool::{Pool, PoolHandle, Reusable};
pub use protocol::{ClientMessage, Reply};
pub use session::{Session, SessionState};
