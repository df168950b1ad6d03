//! Byte channel to a Corsair Link controller.
//!
//! The protocol engine only needs "write a frame" and "read whatever arrived";
//! [`HidTransport`] provides both over `hidapi`.

use std::str::FromStr;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::info;

use crate::error::{CorsairError, Result};
use crate::protocol::{COOLING_NODE_PID, CORSAIR_VID, H80I_PID, Variant};

/// A bidirectional frame channel.
pub trait Transport: Send {
    /// Write one frame, returning the number of bytes accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Read one frame into `buf`, waiting at most `timeout`.
    ///
    /// Returns 0 when nothing arrived. A zero timeout never blocks.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }
}

// =============================================================================
// Interface Families
// =============================================================================

/// USB product family to open. Fixes the framing used before identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceFamily {
    /// H80i / H100i (V2 framing).
    H80i,
    /// Commander / Cooling Node hub (V1 framing).
    CoolingNode,
}

impl InterfaceFamily {
    pub const fn product_id(&self) -> u16 {
        match self {
            InterfaceFamily::H80i => H80I_PID,
            InterfaceFamily::CoolingNode => COOLING_NODE_PID,
        }
    }

    pub const fn variant(&self) -> Variant {
        match self {
            InterfaceFamily::H80i => Variant::V2,
            InterfaceFamily::CoolingNode => Variant::V1,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            InterfaceFamily::H80i => "h80i",
            InterfaceFamily::CoolingNode => "cooling-node",
        }
    }
}

impl FromStr for InterfaceFamily {
    type Err = CorsairError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "h80i" | "h100i" | "v2" => Ok(InterfaceFamily::H80i),
            "cooling-node" | "clink" | "commander" | "v1" => Ok(InterfaceFamily::CoolingNode),
            other => Err(CorsairError::InvalidArgument(format!(
                "Unknown interface '{}'. Use: h80i, cooling-node",
                other
            ))),
        }
    }
}

impl std::fmt::Display for InterfaceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// HidTransport
// =============================================================================

/// `hidapi` backed channel. Closing is `Drop`.
pub struct HidTransport {
    device: HidDevice,
    family: InterfaceFamily,
}

impl HidTransport {
    /// Open the first controller of `family`.
    ///
    /// # Errors
    /// Returns `DeviceNotFound` if no matching controller is connected.
    pub fn open(family: InterfaceFamily) -> Result<Self> {
        let api = HidApi::new()?;

        for info in api.device_list() {
            if info.vendor_id() == CORSAIR_VID && info.product_id() == family.product_id() {
                let device = info.open_device(&api)?;
                info!(
                    interface = family.name(),
                    path = %info.path().to_string_lossy(),
                    "Opened Corsair Link controller"
                );
                return Ok(Self { device, family });
            }
        }

        Err(CorsairError::DeviceNotFound {
            family: family.name().to_string(),
        })
    }

    pub fn family(&self) -> InterfaceFamily {
        self.family
    }
}

impl Transport for HidTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        // Controllers use unnumbered reports, so hidapi wants report number 0 first.
        let mut report = Vec::with_capacity(bytes.len() + 1);
        report.push(0x00);
        report.extend_from_slice(bytes);

        let written = self.device.write(&report)?;
        Ok(written.saturating_sub(1).min(bytes.len()))
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        Ok(self.device.read_timeout(buf, millis)?)
    }
}
