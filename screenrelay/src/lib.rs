//! # screenrelay: device screenshot relay
//!
//! Connects to a tethered device's screenshot service and streams every
//! captured frame, length-prefixed, to a single TCP client.
//!
//! The relay machinery lives in `screenrelay-core`; this crate holds the
//! command line and the TOML configuration.

pub mod cli;
pub mod config;
