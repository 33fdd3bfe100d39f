//! Per-session command runner with undo history and a pooled batch queue.

use std::collections::VecDeque;

use crate::command::{Command, CommandSlot, UndoOutcome};
use crate::error::{ControlError, ControlResult};
use crate::pool::{Pool, PoolHandle};

/// Summary of a [`Invoker::flush`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub executed: usize,
    pub discarded: usize,
    pub fault: Option<ControlError>,
}

pub struct Invoker {
    history: Vec<Command>,
    queue: VecDeque<PoolHandle>,
    slots: Pool<CommandSlot>,
}

impl Invoker {
    /// `queue_capacity` bounds how many commands can wait for a flush.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            history: Vec::new(),
            queue: VecDeque::with_capacity(queue_capacity),
            slots: Pool::new(queue_capacity),
        }
    }

    /// Run a command now. It is recorded for undo only if it succeeded.
    pub fn execute(&mut self, command: Command) -> ControlResult<()> {
        command.execute()?;
        self.history.push(command);
        Ok(())
    }

    /// Pop the most recent command and run its inverse.
    ///
    /// A command whose inverse fails is dropped from the history anyway, the
    /// fault is returned to the caller.
    pub fn undo(&mut self) -> ControlResult<UndoOutcome> {
        let command = self.history.pop().ok_or(ControlError::EmptyUndoStack)?;
        command.undo()
    }

    /// Park a command until the next [`Invoker::flush`].
    pub fn queue(&mut self, command: Command) -> ControlResult<()> {
        let handle = self.slots.acquire()?;
        self.slots.get_mut(handle)?.fill(command);
        self.queue.push_back(handle);
        Ok(())
    }

    /// Execute queued commands in submission order.
    ///
    /// Stops at the first fault; everything still queued is discarded. The
    /// queue is empty and every slot is back in the pool when this returns.
    pub fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport {
            executed: 0,
            discarded: 0,
            fault: None,
        };

        while let Some(handle) = self.queue.pop_front() {
            let command = self.slots.get_mut(handle).ok().and_then(CommandSlot::take);
            if let Err(err) = self.slots.release(handle) {
                tracing::error!("Queued command slot could not be returned: {}", err);
            }

            let Some(command) = command else {
                continue;
            };
            if report.fault.is_some() {
                report.discarded += 1;
                continue;
            }
            match command.execute() {
                Ok(()) => {
                    self.history.push(command);
                    report.executed += 1;
                }
                Err(err) => {
                    report.discarded += 1;
                    report.fault = Some(err);
                }
            }
        }
        report
    }

    /// Forget history and queued commands.
    pub fn clear(&mut self) {
        self.history.clear();
        while let Some(handle) = self.queue.pop_front() {
            let _ = self.slots.release(handle);
        }
    }

    pub fn history(&self) -> &[Command] {
        &self.history
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.slots.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::device::tests::{device, FailingDriver};
    use crate::device::Device;
    use std::sync::Arc;

    #[test]
    fn undo_is_lifo() {
        let drone = device("drn001");
        let mut invoker = Invoker::new(4);

        invoker
            .execute(Command::new(drone.clone(), CommandKind::Rotate { degree: 90 }))
            .unwrap();
        invoker
            .execute(Command::new(drone.clone(), CommandKind::Takeoff))
            .unwrap();
        invoker
            .execute(Command::new(drone.clone(), CommandKind::Rotate { degree: 45 }))
            .unwrap();
        assert_eq!(drone.orientation(), 135);

        assert_eq!(
            invoker.undo().unwrap(),
            UndoOutcome::Reverted(CommandKind::Rotate { degree: 45 })
        );
        assert_eq!(drone.orientation(), 90);
        assert_eq!(
            invoker.undo().unwrap(),
            UndoOutcome::NotSupported(CommandKind::Takeoff)
        );
        assert_eq!(
            invoker.undo().unwrap(),
            UndoOutcome::Reverted(CommandKind::Rotate { degree: 90 })
        );
        assert_eq!(drone.orientation(), 0);
        assert_eq!(invoker.undo(), Err(ControlError::EmptyUndoStack));
    }

    #[test]
    fn failed_execute_is_not_recorded() {
        let drone = Arc::new(Device::new("drx002", "DJI", Arc::new(FailingDriver)));
        let mut invoker = Invoker::new(1);

        let err = invoker
            .execute(Command::new(drone, CommandKind::Land))
            .unwrap_err();
        assert!(matches!(err, ControlError::DeviceFault { .. }));
        assert!(invoker.history().is_empty());
    }

    #[test]
    fn flush_runs_queue_in_order() {
        let drone = device("drn001");
        let mut invoker = Invoker::new(3);

        invoker
            .queue(Command::new(drone.clone(), CommandKind::Arm))
            .unwrap();
        invoker
            .queue(Command::new(drone.clone(), CommandKind::Takeoff))
            .unwrap();
        invoker
            .queue(Command::new(drone.clone(), CommandKind::Rotate { degree: 30 }))
            .unwrap();
        assert_eq!(drone.orientation(), 0);

        let report = invoker.flush();
        assert_eq!(report.executed, 3);
        assert!(report.fault.is_none());
        assert_eq!(invoker.queued(), 0);
        assert_eq!(drone.orientation(), 30);

        let kinds: Vec<_> = invoker.history().iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![
                CommandKind::Arm,
                CommandKind::Takeoff,
                CommandKind::Rotate { degree: 30 }
            ]
        );
    }

    #[test]
    fn queue_is_bounded_by_pool() {
        let drone = device("drn001");
        let mut invoker = Invoker::new(2);

        for _ in 0..2 {
            invoker
                .queue(Command::new(drone.clone(), CommandKind::Hover))
                .unwrap();
        }
        assert_eq!(
            invoker.queue(Command::new(drone.clone(), CommandKind::Hover)),
            Err(ControlError::PoolExhausted { capacity: 2 })
        );

        invoker.flush();
        invoker
            .queue(Command::new(drone, CommandKind::Hover))
            .unwrap();
        assert_eq!(invoker.queued(), 1);
    }

    #[test]
    fn flush_stops_at_fault_and_frees_slots() {
        let good = device("drn001");
        let bad = Arc::new(Device::new("drx002", "DJI", Arc::new(FailingDriver)));
        let mut invoker = Invoker::new(3);

        invoker
            .queue(Command::new(good.clone(), CommandKind::Rotate { degree: 10 }))
            .unwrap();
        invoker
            .queue(Command::new(bad, CommandKind::Takeoff))
            .unwrap();
        invoker
            .queue(Command::new(good.clone(), CommandKind::Rotate { degree: 10 }))
            .unwrap();

        let report = invoker.flush();
        assert_eq!(report.executed, 1);
        assert_eq!(report.discarded, 2);
        assert!(matches!(report.fault, Some(ControlError::DeviceFault { .. })));
        assert_eq!(good.orientation(), 10);
        assert_eq!(invoker.history().len(), 1);

        for _ in 0..3 {
            invoker
                .queue(Command::new(good.clone(), CommandKind::Hover))
                .unwrap();
        }
    }

    #[test]
    fn clear_returns_queued_slots() {
        let drone = device("drn001");
        let mut invoker = Invoker::new(1);
        invoker
            .execute(Command::new(drone.clone(), CommandKind::Arm))
            .unwrap();
        invoker
            .queue(Command::new(drone.clone(), CommandKind::Land))
            .unwrap();

        invoker.clear();
        assert!(invoker.history().is_empty());
        assert_eq!(invoker.queued(), 0);
        assert!(invoker.queue(Command::new(drone, CommandKind::Land)).is_ok());
    }
}
