//! Background loops for continuous processing.

pub mod lease_expiry_loop;
