//! Drone devices and the driver seam they delegate to.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::error::{ControlError, ControlResult};

/// Failure reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

/// Side-effecting operations of the physical or simulated airframe.
///
/// Implementations must not block; they are called from connection tasks.
pub trait DeviceDriver: Send + Sync {
    fn arm(&self, device_id: &str) -> Result<(), DriverError>;
    fn takeoff(&self, device_id: &str) -> Result<(), DriverError>;
    fn land(&self, device_id: &str) -> Result<(), DriverError>;
    fn hover(&self, device_id: &str) -> Result<(), DriverError>;
    fn move_forward(&self, device_id: &str) -> Result<(), DriverError>;
    fn move_back(&self, device_id: &str) -> Result<(), DriverError>;
    /// `duration_s` is passed through untouched; drivers may ignore it.
    fn rotate(&self, device_id: &str, degree: i32, duration_s: Option<f64>)
        -> Result<(), DriverError>;
    fn change_altitude(&self, device_id: &str, altitude_m: i32) -> Result<(), DriverError>;
    fn drop_payload(&self, device_id: &str) -> Result<(), DriverError>;
}

/// Driver that only logs what it is asked to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDriver;

impl DeviceDriver for LoggingDriver {
    fn arm(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} armed", device_id);
        Ok(())
    }

    fn takeoff(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} taking off to 3 m", device_id);
        Ok(())
    }

    fn land(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} landing", device_id);
        Ok(())
    }

    fn hover(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} hovering", device_id);
        Ok(())
    }

    fn move_forward(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} moving forward", device_id);
        Ok(())
    }

    fn move_back(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} moving back", device_id);
        Ok(())
    }

    fn rotate(
        &self,
        device_id: &str,
        degree: i32,
        duration_s: Option<f64>,
    ) -> Result<(), DriverError> {
        tracing::info!(
            "Drone {} rotating by {} deg (duration {:?})",
            device_id,
            degree,
            duration_s
        );
        Ok(())
    }

    fn change_altitude(&self, device_id: &str, altitude_m: i32) -> Result<(), DriverError> {
        tracing::info!("Drone {} changing altitude to {} m", device_id, altitude_m);
        Ok(())
    }

    fn drop_payload(&self, device_id: &str) -> Result<(), DriverError> {
        tracing::info!("Drone {} dropping payload", device_id);
        Ok(())
    }
}

/// A single drone in the fleet.
///
/// Created once at fleet start-up and shared by every session through `Arc`.
/// Only the session holding the drone's lock issues commands, so the
/// orientation atomic never sees competing writers in practice.
pub struct Device {
    id: String,
    model: String,
    orientation: AtomicI32,
    driver: Arc<dyn DeviceDriver>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("orientation", &self.orientation())
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.id, self.model)
    }
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        driver: Arc<dyn DeviceDriver>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            orientation: AtomicI32::new(0),
            driver,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Current heading in degrees, always within `[0, 360)`.
    pub fn orientation(&self) -> i32 {
        self.orientation.load(Ordering::SeqCst)
    }

    pub fn arm(&self) -> ControlResult<()> {
        self.drive(|d| d.arm(&self.id))
    }

    pub fn takeoff(&self) -> ControlResult<()> {
        self.drive(|d| d.takeoff(&self.id))
    }

    pub fn land(&self) -> ControlResult<()> {
        self.drive(|d| d.land(&self.id))
    }

    pub fn hover(&self) -> ControlResult<()> {
        self.drive(|d| d.hover(&self.id))
    }

    pub fn move_forward(&self) -> ControlResult<()> {
        self.drive(|d| d.move_forward(&self.id))
    }

    pub fn move_back(&self) -> ControlResult<()> {
        self.drive(|d| d.move_back(&self.id))
    }

    /// Rotate by `degree`; negative values turn the other way.
    pub fn rotate(&self, degree: i32) -> ControlResult<()> {
        self.rotate_for(degree, None)
    }

    /// Rotate with an optional duration hint for the driver.
    ///
    /// The orientation only changes once the driver accepted the call.
    pub fn rotate_for(&self, degree: i32, duration_s: Option<f64>) -> ControlResult<()> {
        self.drive(|d| d.rotate(&self.id, degree, duration_s))?;
        self.turn(degree.rem_euclid(360));
        Ok(())
    }

    /// Undo a `rotate(degree)`.
    ///
    /// The inverse is taken on the normalized step, so it holds for every
    /// `i32` including `i32::MIN`.
    pub fn rotate_cancel(&self, degree: i32) -> ControlResult<()> {
        let step = (360 - degree.rem_euclid(360)) % 360;
        let reverse = degree.checked_neg().unwrap_or(step);
        self.drive(|d| d.rotate(&self.id, reverse, None))?;
        self.turn(step);
        Ok(())
    }

    pub fn change_altitude(&self, altitude_m: i32) -> ControlResult<()> {
        self.drive(|d| d.change_altitude(&self.id, altitude_m))
    }

    pub fn drop_payload(&self) -> ControlResult<()> {
        self.drive(|d| d.drop_payload(&self.id))
    }

    /// `step` is already within `[0, 360)`.
    fn turn(&self, step: i32) {
        let current = self.orientation.load(Ordering::SeqCst);
        self.orientation.store((current + step) % 360, Ordering::SeqCst);
    }

    fn drive<F>(&self, op: F) -> ControlResult<()>
    where
        F: FnOnce(&dyn DeviceDriver) -> Result<(), DriverError>,
    {
        op(self.driver.as_ref()).map_err(|err| {
            tracing::warn!("Driver fault on drone {}: {}", self.id, err);
            ControlError::DeviceFault {
                device_id: self.id.clone(),
                message: err.0,
            }
        })
    }
}
