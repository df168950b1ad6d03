//! Corsair Link register protocol.
//!
//! This module contains the command codec for both register layouts, the
//! device capability table, and the decoded fan and temperature state types.

pub mod capability;
pub mod commands;
pub mod status;

pub use capability::*;
pub use commands::*;
pub use status::*;
