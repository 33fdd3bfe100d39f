//! Drone CLI - operator tools for the drone control server.
//!
//! Binaries:
//! - drone-ctl: list the fleet or take control of a drone interactively

pub mod client;

pub use client::{ControlClient, DirectoryClient};
