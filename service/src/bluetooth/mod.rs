//! Bluetooth layer for the sender.
//!
//! This module provides peer discovery over BlueZ and the RFCOMM stream
//! the payload is written to.

pub mod discovery;
pub mod rfcomm;
