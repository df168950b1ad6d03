//! Helpers for the command line front end.

pub mod parsing;

pub use parsing::{parse_fan_mode, parse_fan_number};
