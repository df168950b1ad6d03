//! Open Corsair Link Library
//!
//! A Rust driver for Corsair Link liquid coolers: the Cooling Node hub (V1
//! register layout) and the H80i / H100i (V2 register layout).
//!
//! # Features
//!
//! - Identify the controller and read its firmware version
//! - Read temperatures, fan and pump RPM, and fan modes
//! - Set fan modes and fixed RPM targets, verified by read-back on V2 devices
//! - Polling or event-driven request/response correlation
//!
//! # Example
//!
//! ```no_run
//! use open_corsair_link::config::SessionConfig;
//! use open_corsair_link::device::{HidTransport, InterfaceFamily, Session};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Open and identify the device
//!     let transport = HidTransport::open(InterfaceFamily::H80i)?;
//!     let mut session = Session::open(transport, InterfaceFamily::H80i, &SessionConfig::default())?;
//!     println!("Connected to {} (firmware {})", session.identity().name, session.firmware());
//!
//!     // Read everything
//!     let report = session.query()?;
//!     println!("{}", report);
//!
//!     // Quiet mode on fan 1
//!     session.set_fan_mode(0, 0x08)?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod utils;

// Re-exports for convenience
pub use device::{InterfaceFamily, Session};
pub use error::{CorsairError, Result};
pub use protocol::{FanMode, Variant};
