//! Session with one identified Corsair Link controller.
//!
//! High-level interface for reading temperatures and fans and for changing fan
//! modes and target speeds. Register layout differences between the V1 and V2
//! families are resolved by the codec; nothing here branches on the family.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use crate::config::{SessionConfig, Strategy};
use crate::device::correlator::{Correlator, EventCorrelator, PollingCorrelator};
use crate::device::transport::{InterfaceFamily, Transport};
use crate::error::{CorsairError, Result};
use crate::protocol::{
    Command, DeviceIdentity, DeviceReport, FanMode, FanState, FirmwareVersion, Frame, Register,
    RequestIds, TempSensorState, Variant, lookup,
};

/// Session shared between threads. Callers queue on the mutex.
pub type SharedSession = Arc<Mutex<Session>>;

/// Requested changes for one fan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanSettings {
    /// Raw mode value to set, if any.
    pub mode: Option<u8>,
    /// Fixed RPM target; 0 leaves the target unchanged.
    pub rpm: u16,
}

// =============================================================================
// Link
// =============================================================================

/// Framing, ids and correlation for one channel.
struct Link {
    correlator: Box<dyn Correlator>,
    ids: RequestIds,
    variant: Variant,
    timeout: Duration,
}

impl Link {
    fn exchange(&mut self, commands: &[Command]) -> Result<(Frame, Vec<u8>)> {
        let frame = Frame::encode(self.variant, &mut self.ids, commands)?;
        let reply = self.correlator.submit(&frame, self.timeout)?;
        Ok((frame, reply))
    }

    fn read(&mut self, register: Register) -> Result<u16> {
        let commands = self.variant.read_commands(register)?;
        let (frame, reply) = self.exchange(&commands)?;
        frame.decode(&reply)
    }

    fn write(&mut self, register: Register, value: u16) -> Result<()> {
        let commands = self.variant.write_commands(register, value)?;
        let (frame, reply) = self.exchange(&commands)?;

        if self.variant.verifies_writes() {
            let actual = frame.decode(&reply)?;
            if !register.confirms(value, actual) {
                return Err(CorsairError::WriteNotAccepted {
                    register: register.label(),
                    requested: value,
                    actual,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// An identified, supported controller.
///
/// # Example
///
/// ```no_run
/// use open_corsair_link::config::SessionConfig;
/// use open_corsair_link::device::{HidTransport, InterfaceFamily, Session};
///
/// let transport = HidTransport::open(InterfaceFamily::H80i)?;
/// let mut session = Session::open(transport, InterfaceFamily::H80i, &SessionConfig::default())?;
/// println!("{}", session.query()?);
///
/// session.set_fan_mode(0, 0x08)?;
/// session.close();
/// # Ok::<(), open_corsair_link::error::CorsairError>(())
/// ```
pub struct Session {
    link: Link,
    identity: &'static DeviceIdentity,
    firmware: FirmwareVersion,
}

impl Session {
    /// Identify the controller behind `transport` and open a session.
    ///
    /// # Errors
    /// Returns `UnsupportedDevice` when the identity byte is unknown, not
    /// supported, or belongs to the other interface family.
    pub fn open<T: Transport + 'static>(
        transport: T,
        family: InterfaceFamily,
        config: &SessionConfig,
    ) -> Result<Self> {
        let correlator: Box<dyn Correlator> = match config.strategy {
            Strategy::Poll => Box::new(PollingCorrelator::new(transport, config.poll_interval())),
            Strategy::Event => Box::new(EventCorrelator::spawn(
                transport,
                config.listener_interval(),
            )?),
        };
        Self::with_correlator(correlator, family, config.timeout())
    }

    /// Identify the controller using an already built correlator.
    pub fn with_correlator(
        correlator: Box<dyn Correlator>,
        family: InterfaceFamily,
        timeout: Duration,
    ) -> Result<Self> {
        let variant = family.variant();
        let mut link = Link {
            correlator,
            ids: RequestIds::new(),
            variant,
            timeout,
        };

        let code = link.read(Register::DeviceId)? as u8;
        let identity = lookup(code);
        if !identity.supported || identity.variant != Some(variant) {
            return Err(CorsairError::UnsupportedDevice {
                code,
                name: identity.name,
            });
        }

        let firmware = FirmwareVersion::new(link.read(Register::FirmwareId)?);
        info!(
            device = identity.name,
            code = %format!("{:#04x}", code),
            firmware = %firmware,
            "Corsair Link controller identified"
        );

        Ok(Self {
            link,
            identity,
            firmware,
        })
    }

    pub fn identity(&self) -> &'static DeviceIdentity {
        self.identity
    }

    pub fn firmware(&self) -> FirmwareVersion {
        self.firmware
    }

    pub fn variant(&self) -> Variant {
        self.link.variant
    }

    fn check_fan(&self, index: u8) -> Result<()> {
        if index >= self.identity.fan_count() {
            return Err(CorsairError::InvalidArgument(format!(
                "{} has no fan {} ({} channels)",
                self.identity.name,
                index + 1,
                self.identity.fan_count()
            )));
        }
        Ok(())
    }

    fn check_sensor(&self, index: u8) -> Result<()> {
        if index >= self.identity.max_temp_sensors {
            return Err(CorsairError::InvalidArgument(format!(
                "{} has no temperature sensor {} ({} sensors)",
                self.identity.name,
                index + 1,
                self.identity.max_temp_sensors
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Temperatures
    // =========================================================================

    /// Number of sensors to read.
    pub fn temperature_sensor_count(&mut self) -> Result<u8> {
        let max = self.identity.max_temp_sensors;
        if self.link.variant.counts_sensors() {
            let count = self.link.read(Register::TempSensorCount)? as u8;
            Ok(count.min(max))
        } else {
            Ok(max)
        }
    }

    pub fn read_temperature(&mut self, index: u8) -> Result<TempSensorState> {
        self.check_sensor(index)?;
        let raw = self.link.read(Register::Temperature(index))?;
        Ok(TempSensorState::from_raw(self.link.variant, index, raw))
    }

    /// Read every sensor below the sensor count.
    pub fn temperature_sensors(&mut self) -> Result<Vec<TempSensorState>> {
        let count = self.temperature_sensor_count()?;
        (0..count).map(|i| self.read_temperature(i)).collect()
    }

    // =========================================================================
    // Fans
    // =========================================================================

    /// Raw mode register byte of a fan.
    pub fn read_fan_mode(&mut self, index: u8) -> Result<u8> {
        self.check_fan(index)?;
        // V1 mode ports are two bytes wide; the mode is the low byte.
        Ok(self.link.read(Register::FanMode(index))? as u8)
    }

    pub fn read_fan_rpm(&mut self, index: u8) -> Result<u16> {
        self.check_fan(index)?;
        self.link.read(Register::FanRpm(index))
    }

    pub fn read_fan_max_rpm(&mut self, index: u8) -> Result<u16> {
        self.check_fan(index)?;
        self.link.read(Register::FanMaxRpm(index))
    }

    /// Read mode, RPM and max RPM of one fan.
    pub fn read_fan(&mut self, index: u8) -> Result<FanState> {
        let mode_raw = self.read_fan_mode(index)?;
        let rpm = self.read_fan_rpm(index)?;
        let max_rpm = self.read_fan_max_rpm(index)?;

        Ok(FanState {
            index,
            name: self.identity.fan_name(index),
            mode: FanMode::from_register(mode_raw),
            mode_raw,
            rpm,
            max_rpm,
            present: self.link.variant.fan_present(mode_raw, rpm, max_rpm),
        })
    }

    /// Read every fan and pump channel.
    pub fn fans(&mut self) -> Result<Vec<FanState>> {
        (0..self.identity.fan_count())
            .map(|i| self.read_fan(i))
            .collect()
    }

    /// Set the operating mode of a fan.
    ///
    /// # Errors
    /// `InvalidMode` for undefined modes, before anything is sent.
    /// `WriteNotAccepted` when a V2 device reads back a different mode.
    pub fn set_fan_mode(&mut self, index: u8, mode: u8) -> Result<()> {
        let mode = FanMode::try_from(mode)?;
        self.check_fan(index)?;
        self.link
            .write(Register::FanMode(index), mode.value() as u16)?;
        info!(fan = index + 1, mode = %mode, "Fan mode set");
        Ok(())
    }

    /// Set the fixed RPM target of a fan.
    pub fn set_fixed_rpm(&mut self, index: u8, rpm: u16) -> Result<()> {
        self.check_fan(index)?;
        self.link.write(Register::FanFixedRpm(index), rpm)?;
        info!(fan = index + 1, rpm, "Fan fixed RPM set");
        Ok(())
    }

    /// Apply mode and RPM changes to a fan.
    ///
    /// All arguments are validated before anything is written. The mode is
    /// written first, then the RPM target when nonzero.
    pub fn configure(&mut self, index: u8, settings: FanSettings) -> Result<()> {
        self.check_fan(index)?;
        let mode = settings.mode.map(FanMode::try_from).transpose()?;

        if mode.is_none() && settings.rpm == 0 {
            return Err(CorsairError::InvalidArgument(
                "Nothing to configure: give a mode or an RPM".into(),
            ));
        }
        if mode == Some(FanMode::FixedRpm) && settings.rpm == 0 {
            return Err(CorsairError::InvalidArgument(
                "FixedRPM mode needs a nonzero RPM".into(),
            ));
        }

        if let Some(mode) = mode {
            self.set_fan_mode(index, mode.value())?;
        }
        if settings.rpm > 0 {
            self.set_fixed_rpm(index, settings.rpm)?;
        }
        Ok(())
    }

    // =========================================================================
    // Report
    // =========================================================================

    /// Read everything into a report.
    pub fn query(&mut self) -> Result<DeviceReport> {
        let temperatures = self.temperature_sensors()?;
        let fans = self.fans()?;

        Ok(DeviceReport {
            device: self.identity.name.to_string(),
            identity: self.identity.code,
            variant: self.link.variant,
            firmware: self.firmware.to_string(),
            temperatures,
            fans,
        })
    }

    /// Close the session, stopping any listener and releasing the channel.
    pub fn close(self) {
        info!(device = self.identity.name, "Session closed");
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.identity.name)
            .field("variant", &self.link.variant)
            .field("firmware", &self.firmware.to_string())
            .finish()
    }
}
