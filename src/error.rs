//! Custom error types for Corsair Link devices.
//!
//! This module provides fine-grained error handling for device communication,
//! protocol parsing, and argument validation.

use thiserror::Error;

/// Main error type for Corsair Link operations.
#[derive(Error, Debug)]
pub enum CorsairError {
    /// No controller of the requested family is connected.
    #[error("Corsair {family} not found. Check USB connection and permissions.")]
    DeviceNotFound { family: String },

    /// HID communication error.
    #[error("HID communication error: {0}")]
    HidError(#[from] hidapi::HidError),

    /// Channel failure other than a raw HID error (short write, listener failure).
    #[error("Transport error: {0}")]
    Transport(String),

    /// No matching reply arrived before the deadline.
    #[error("Timeout waiting for reply to request {request_id:#04x} after {waited_ms} ms")]
    Timeout { request_id: u8, waited_ms: u64 },

    /// Identity byte is unknown or not supported by this driver.
    #[error("Unsupported device {name} (id {code:#04x})")]
    UnsupportedDevice { code: u8, name: &'static str },

    /// Fan mode value is not one of the defined modes.
    #[error("Invalid fan mode {0:#04x}. Valid modes: 0x02, 0x04, 0x06, 0x08, 0x0a, 0x0c, 0x0e")]
    InvalidMode(u8),

    /// Generic invalid input error.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The device read back a different value than the one written.
    #[error("Device did not accept {register}: requested {requested}, read back {actual}")]
    WriteNotAccepted {
        register: &'static str,
        requested: u16,
        actual: u16,
    },

    /// A matching reply too short to hold the expected data.
    #[error("Invalid response from device: {message}")]
    MalformedResponse { message: String },

    /// A request was submitted while another one is still unresolved.
    #[error("Another request is still in flight")]
    Busy,

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CorsairError {
    /// Whether the session must be closed after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CorsairError::DeviceNotFound { .. }
                | CorsairError::HidError(_)
                | CorsairError::Transport(_)
                | CorsairError::UnsupportedDevice { .. }
        )
    }
}

/// Result type alias for Corsair Link operations.
pub type Result<T> = std::result::Result<T, CorsairError>;
