//! Per-connection control session.
//!
//! A session starts `Unselected`, moves to `Controlling` once the lock table
//! grants it a drone and ends `Closed`. Dropping a session releases whatever
//! lock it still holds, so teardown happens on every exit path of the
//! connection task.

use std::sync::Arc;

use crate::command::UndoOutcome;
use crate::device::Device;
use crate::dispatcher;
use crate::error::{ControlError, ControlResult};
use crate::fleet::Fleet;
use crate::invoker::Invoker;
use crate::lock_table::{HolderId, LockOutcome, LockTable};
use crate::protocol::{ClientMessage, Reply};

#[derive(Debug, Clone)]
pub enum SessionState {
    Unselected,
    Controlling(Arc<Device>),
    Closed,
}

pub struct Session {
    identity: HolderId,
    state: SessionState,
    invoker: Invoker,
    fleet: Arc<Fleet>,
    locks: Arc<LockTable>,
}

impl Session {
    pub fn new(
        identity: HolderId,
        fleet: Arc<Fleet>,
        locks: Arc<LockTable>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            identity,
            state: SessionState::Unselected,
            invoker: Invoker::new(queue_capacity),
            fleet,
            locks,
        }
    }

    pub fn identity(&self) -> &HolderId {
        &self.identity
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Id of the drone this session controls, if any.
    pub fn controlled_device(&self) -> Option<&str> {
        match &self.state {
            SessionState::Controlling(device) => Some(device.id()),
            _ => None,
        }
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Handle one client line and produce the status line for it.
    pub fn handle_line(&mut self, line: &str) -> Reply {
        let reply = match ClientMessage::parse(line) {
            Ok(message) => self.handle(message),
            Err(err) => Err(err),
        };
        reply.unwrap_or_else(|err| {
            tracing::debug!("{} -> {}", self.identity, err);
            Reply::from(err)
        })
    }

    pub fn handle(&mut self, message: ClientMessage) -> ControlResult<Reply> {
        if matches!(self.state, SessionState::Closed) {
            return Err(ControlError::ConnectionFault("session closed".to_string()));
        }
        match message {
            ClientMessage::Select(device_id) => self.select(&device_id),
            ClientMessage::Verb { verb, arg } => {
                let device = self.active_device()?;
                let command = dispatcher::dispatch(&device, &verb, arg.as_deref())?;
                tracing::info!(
                    "{} sent command for drone {}: {}",
                    self.identity,
                    device.id(),
                    command.kind()
                );
                let kind = command.kind();
                self.invoker.execute(command)?;
                Ok(Reply::Executed(kind))
            }
            ClientMessage::Queue { verb, arg } => {
                let device = self.active_device()?;
                let command = dispatcher::dispatch(&device, &verb, arg.as_deref())?;
                let kind = command.kind();
                self.invoker.queue(command)?;
                Ok(Reply::Queued {
                    kind,
                    queued: self.invoker.queued(),
                    capacity: self.invoker.queue_capacity(),
                })
            }
            ClientMessage::Flush => {
                let device = self.active_device()?;
                let report = self.invoker.flush();
                tracing::info!(
                    "{} flushed {} commands on drone {}",
                    self.identity,
                    report.executed,
                    device.id()
                );
                Ok(Reply::Flushed(report))
            }
            ClientMessage::Undo => {
                self.active_device()?;
                match self.invoker.undo()? {
                    UndoOutcome::Reverted(kind) => Ok(Reply::Undone(kind)),
                    UndoOutcome::NotSupported(kind) => Ok(Reply::UndoNotSupported(kind)),
                }
            }
            ClientMessage::Release => {
                let device = self.active_device()?;
                self.relinquish();
                Ok(Reply::Released {
                    device_id: device.id().to_string(),
                })
            }
        }
    }

    /// Request control of `device_id`.
    ///
    /// Switching drones is make-before-break: the current lock is released
    /// only after the new one is granted.
    pub fn select(&mut self, device_id: &str) -> ControlResult<Reply> {
        let device = self
            .fleet
            .get(device_id)
            .ok_or_else(|| ControlError::UnknownDevice(device_id.to_string()))?;

        let current = match &self.state {
            SessionState::Controlling(current) => Some(current.clone()),
            SessionState::Unselected => None,
            SessionState::Closed => {
                return Err(ControlError::ConnectionFault("session closed".to_string()))
            }
        };

        if let Some(current) = &current {
            if current.id() == device_id {
                if self.locks.renew(device_id, &self.identity) {
                    return Ok(Reply::AlreadyYours {
                        device_id: device_id.to_string(),
                    });
                }
                tracing::warn!("{} lost its lease on drone {}", self.identity, device_id);
                self.state = SessionState::Unselected;
                self.invoker.clear();
            }
        }

        match self.locks.acquire(device_id, &self.identity) {
            LockOutcome::Granted => {
                if let SessionState::Controlling(previous) = &self.state {
                    if self.locks.release(previous.id(), &self.identity) {
                        tracing::info!("{} released drone {}", self.identity, previous.id());
                    }
                }
                // History and queue are bound to the previous drone.
                self.invoker.clear();
                tracing::info!("{} took control of drone {}", self.identity, device_id);
                self.state = SessionState::Controlling(device);
                Ok(Reply::ControlGranted {
                    device_id: device_id.to_string(),
                })
            }
            LockOutcome::Denied(holder) if holder == self.identity => Ok(Reply::AlreadyYours {
                device_id: device_id.to_string(),
            }),
            LockOutcome::Denied(holder) => Err(ControlError::SelectionConflict {
                device_id: device_id.to_string(),
                holder,
            }),
        }
    }

    /// Renew the lease on the controlled drone without handling a message.
    ///
    /// Called by the connection task for every frame it sees from the peer.
    /// Returns false when nothing is held or the lease was already lost; the
    /// next message then reports the loss.
    pub fn keep_alive(&mut self) -> bool {
        match &self.state {
            SessionState::Controlling(device) => self.locks.renew(device.id(), &self.identity),
            _ => false,
        }
    }

    /// Release any held lock and refuse further messages.
    pub fn close(&mut self) {
        if matches!(self.state, SessionState::Closed) {
            return;
        }
        self.relinquish();
        self.state = SessionState::Closed;
        tracing::debug!("Session {} closed", self.identity);
    }

    /// The controlled drone, after confirming the lock is still ours.
    fn active_device(&mut self) -> ControlResult<Arc<Device>> {
        let SessionState::Controlling(device) = &self.state else {
            return Err(ControlError::NoDeviceSelected);
        };
        let device = device.clone();
        if self.locks.renew(device.id(), &self.identity) {
            return Ok(device);
        }
        tracing::warn!("{} lost its lease on drone {}", self.identity, device.id());
        self.state = SessionState::Unselected;
        self.invoker.clear();
        Err(ControlError::ControlLost {
            device_id: device.id().to_string(),
        })
    }

    fn relinquish(&mut self) {
        if let SessionState::Controlling(device) = &self.state {
            if self.locks.release(device.id(), &self.identity) {
                tracing::info!("{} released drone {}", self.identity, device.id());
            }
        }
        self.invoker.clear();
        self.state = SessionState::Unselected;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::device::LoggingDriver;
    use std::time::Duration;

    fn fleet() -> Arc<Fleet> {
        Arc::new(Fleet::new(&Fleet::default_entries(), Arc::new(LoggingDriver)).unwrap())
    }

    fn session(name: &str, fleet: &Arc<Fleet>, locks: &Arc<LockTable>) -> Session {
        Session::new(HolderId::new(name), fleet.clone(), locks.clone(), 4)
    }

    #[test]
    fn second_client_is_busy_until_first_disconnects() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("10.0.0.1:5000", &fleet, &locks);
        let mut y = session("10.0.0.2:5001", &fleet, &locks);

        assert_eq!(
            x.handle_line("selected_drone drn001"),
            Reply::ControlGranted {
                device_id: "drn001".into()
            }
        );
        assert_eq!(
            y.handle_line("selected_drone drn001"),
            Reply::Busy {
                device_id: "drn001".into(),
                holder: HolderId::new("10.0.0.1:5000")
            }
        );

        drop(x);
        assert_eq!(locks.holder_of("drn001"), None);
        assert_eq!(
            y.handle_line("selected_drone drn001"),
            Reply::ControlGranted {
                device_id: "drn001".into()
            }
        );
    }

    #[test]
    fn duplicate_select_is_already_yours() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        assert_eq!(
            x.handle_line("selected_drone drn001"),
            Reply::AlreadyYours {
                device_id: "drn001".into()
            }
        );
        assert_eq!(x.controlled_device(), Some("drn001"));
    }

    #[test]
    fn verbs_require_selection() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        assert_eq!(x.handle_line("takeoff"), Reply::SelectFirst);
        assert_eq!(x.handle_line("undo"), Reply::SelectFirst);
        assert_eq!(x.handle_line("takeoff").to_string(), "Select a drone first!");
    }

    #[test]
    fn verbs_reply_with_status_or_unknown() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drx002");

        assert_eq!(x.handle_line("takeoff").to_string(), "Drone is taking off");
        assert_eq!(x.handle_line("hover").to_string(), "Drone is hovering");
        assert_eq!(x.handle_line("somersault").to_string(), "Unknown command");
        assert_eq!(x.invoker().history().len(), 2);
    }

    #[test]
    fn rotate_then_undo_restores_orientation() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let drone = fleet.get("drn001").unwrap();
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");

        x.handle_line("rotate 300");
        let before = drone.orientation();
        assert_eq!(
            x.handle_line("rotate 90"),
            Reply::Executed(CommandKind::Rotate { degree: 90 })
        );
        assert_eq!(drone.orientation(), (before + 90) % 360);

        assert_eq!(
            x.handle_line("undo"),
            Reply::Undone(CommandKind::Rotate { degree: 90 })
        );
        assert_eq!(drone.orientation(), before);
    }

    #[test]
    fn undo_of_min_degree_rotate_restores_orientation() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let drone = fleet.get("drn001").unwrap();
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        let before = drone.orientation();

        x.handle_line("rotate -2147483648");
        assert_ne!(drone.orientation(), before);
        assert_eq!(
            x.handle_line("undo"),
            Reply::Undone(CommandKind::Rotate { degree: i32::MIN })
        );
        assert_eq!(drone.orientation(), before);
    }

    #[test]
    fn undo_reports_unsupported_and_empty() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        x.handle_line("land");

        assert_eq!(
            x.handle_line("undo"),
            Reply::UndoNotSupported(CommandKind::Land)
        );
        assert_eq!(x.handle_line("undo"), Reply::NothingToUndo);
    }

    #[test]
    fn queue_and_flush() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let drone = fleet.get("dprn003").unwrap();
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone dprn003");

        assert_eq!(x.handle_line("queue arm").to_string(), "Queued arm (1/4)");
        x.handle_line("queue rotate 15");
        assert_eq!(drone.orientation(), 0);
        assert_eq!(
            x.handle_line("flush").to_string(),
            "Executed 2 queued commands"
        );
        assert_eq!(drone.orientation(), 15);

        for _ in 0..4 {
            x.handle_line("queue hover");
        }
        assert!(matches!(
            x.handle_line("queue hover"),
            Reply::Failed(ControlError::PoolExhausted { capacity: 4 })
        ));
    }

    #[test]
    fn reselect_switches_lock_and_drops_history() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        x.handle_line("rotate 10");

        assert_eq!(
            x.handle_line("selected_drone drx002"),
            Reply::ControlGranted {
                device_id: "drx002".into()
            }
        );
        assert_eq!(locks.holder_of("drn001"), None);
        assert_eq!(locks.holder_of("drx002"), Some(HolderId::new("x")));
        assert_eq!(x.handle_line("undo"), Reply::NothingToUndo);
        assert_eq!(fleet.get("drn001").unwrap().orientation(), 10);
    }

    #[test]
    fn failed_reselect_keeps_current_drone() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        let mut y = session("y", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        y.handle_line("selected_drone drx002");

        assert!(matches!(
            x.handle_line("selected_drone drx002"),
            Reply::Busy { .. }
        ));
        assert_eq!(x.controlled_device(), Some("drn001"));
        assert_eq!(locks.holder_of("drn001"), Some(HolderId::new("x")));
        assert_eq!(x.handle_line("land").to_string(), "Drone is landing");
    }

    #[test]
    fn unknown_drone_is_rejected() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        assert_eq!(
            x.handle_line("selected_drone ghost").to_string(),
            "Unknown drone ghost"
        );
        assert!(locks.is_empty());
    }

    #[test]
    fn release_frees_the_drone() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        let mut y = session("y", &fleet, &locks);
        x.handle_line("selected_drone drn001");

        assert_eq!(
            x.handle_line("release"),
            Reply::Released {
                device_id: "drn001".into()
            }
        );
        assert!(matches!(x.state(), SessionState::Unselected));
        assert!(matches!(
            y.handle_line("selected_drone drn001"),
            Reply::ControlGranted { .. }
        ));
    }

    #[test]
    fn lost_lease_drops_control() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::new(Some(Duration::ZERO))));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");

        assert_eq!(
            x.handle_line("takeoff"),
            Reply::ControlLost {
                device_id: "drn001".into()
            }
        );
        assert!(matches!(x.state(), SessionState::Unselected));
        assert_eq!(x.handle_line("takeoff"), Reply::SelectFirst);
    }

    #[test]
    fn oversized_lease_does_not_break_select() {
        let lease = Duration::from_secs(u64::MAX);
        let (fleet, locks) = (fleet(), Arc::new(LockTable::new(Some(lease))));
        let mut x = session("x", &fleet, &locks);

        assert_eq!(
            x.handle_line("selected_drone drn001"),
            Reply::ControlGranted {
                device_id: "drn001".into()
            }
        );
        assert_eq!(x.handle_line("takeoff"), Reply::Executed(CommandKind::Takeoff));
        assert!(x.keep_alive());
    }

    #[test]
    fn keep_alive_renews_only_a_held_lease() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::new(Some(Duration::from_secs(60)))));
        let mut x = session("x", &fleet, &locks);
        assert!(!x.keep_alive());

        x.handle_line("selected_drone drn001");
        assert!(x.keep_alive());

        x.handle_line("release");
        assert!(!x.keep_alive());
        assert_eq!(locks.holder_of("drn001"), None);
    }

    #[test]
    fn closed_session_refuses_messages() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let mut x = session("x", &fleet, &locks);
        x.handle_line("selected_drone drn001");
        x.close();

        assert!(locks.is_empty());
        assert!(matches!(
            x.handle(ClientMessage::Undo),
            Err(ControlError::ConnectionFault(_))
        ));
    }

    #[test]
    fn lock_released_when_task_panics() {
        let (fleet, locks) = (fleet(), Arc::new(LockTable::default()));
        let (f, l) = (fleet.clone(), locks.clone());

        let result = std::thread::spawn(move || {
            let mut x = session("x", &f, &l);
            x.handle_line("selected_drone drn001");
            assert_eq!(l.holder_of("drn001"), Some(HolderId::new("x")));
            panic!("connection handler crashed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(locks.holder_of("drn001"), None);
    }
}
