//! Decoded fan and temperature state.
//!
//! Turns raw register values into fan modes, fixed-point temperatures and the
//! firmware version, and assembles them into a printable report.

use serde::Serialize;

use crate::error::{CorsairError, Result};
use crate::protocol::commands::{FAN_MODE_MASK, Variant};

// =============================================================================
// Fan Modes
// =============================================================================

/// Fan operating mode, as stored in bits 1-3 of the fan mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    FixedPwm,
    FixedRpm,
    Default,
    Quiet,
    Balanced,
    Performance,
    Custom,
}

impl FanMode {
    pub const ALL: [FanMode; 7] = [
        FanMode::FixedPwm,
        FanMode::FixedRpm,
        FanMode::Default,
        FanMode::Quiet,
        FanMode::Balanced,
        FanMode::Performance,
        FanMode::Custom,
    ];

    /// Raw register value of this mode.
    pub const fn value(&self) -> u8 {
        match self {
            FanMode::FixedPwm => 0x02,
            FanMode::FixedRpm => 0x04,
            FanMode::Default => 0x06,
            FanMode::Quiet => 0x08,
            FanMode::Balanced => 0x0A,
            FanMode::Performance => 0x0C,
            FanMode::Custom => 0x0E,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            FanMode::FixedPwm => "FixedPWM",
            FanMode::FixedRpm => "FixedRPM",
            FanMode::Default => "Default",
            FanMode::Quiet => "Quiet",
            FanMode::Balanced => "Balanced",
            FanMode::Performance => "Performance",
            FanMode::Custom => "Custom",
        }
    }

    /// Extract the mode from a full mode register byte.
    ///
    /// Presence, tach and channel bits are ignored. Returns `None` when the
    /// mode bits are clear.
    pub fn from_register(byte: u8) -> Option<Self> {
        Self::try_from(byte & FAN_MODE_MASK).ok()
    }
}

impl TryFrom<u8> for FanMode {
    type Error = CorsairError;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.value() == value)
            .ok_or(CorsairError::InvalidMode(value))
    }
}

impl std::fmt::Display for FanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Temperatures
// =============================================================================

/// Milli-degree weights of bits 7..0 of the fractional temperature byte.
const FRACTION_WEIGHTS: [u16; 8] = [500, 250, 125, 62, 31, 16, 8, 4];

/// Convert a 1/256-degree fraction byte into milli-degrees (0xFF gives 996).
pub fn fraction_millidegrees(fraction: u8) -> u16 {
    FRACTION_WEIGHTS
        .iter()
        .enumerate()
        .filter(|(bit, _)| fraction & (0x80 >> bit) != 0)
        .map(|(_, weight)| weight)
        .sum()
}

/// One temperature sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TempSensorState {
    pub index: u8,
    pub name: String,
    /// Whole degrees Celsius.
    pub whole: u8,
    /// Fraction in 1/256 degree.
    pub fraction: u8,
    pub millidegrees: u32,
    pub present: bool,
}

impl TempSensorState {
    /// Build a sensor from a raw two-byte reading (low byte fraction, high byte whole degrees).
    pub fn from_raw(variant: Variant, index: u8, raw: u16) -> Self {
        let [fraction, whole] = raw.to_le_bytes();
        Self {
            index,
            name: format!("Temp {}", index + 1),
            whole,
            fraction,
            millidegrees: whole as u32 * 1000 + fraction_millidegrees(fraction) as u32,
            present: variant.temperature_present(whole, fraction),
        }
    }

    /// Temperature in degrees Celsius.
    pub fn celsius(&self) -> f32 {
        self.millidegrees as f32 / 1000.0
    }
}

// =============================================================================
// Fans
// =============================================================================

/// One fan or pump channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanState {
    pub index: u8,
    pub name: String,
    /// `None` when the mode bits hold no defined mode.
    pub mode: Option<FanMode>,
    pub mode_raw: u8,
    pub rpm: u16,
    pub max_rpm: u16,
    pub present: bool,
}

// =============================================================================
// Firmware
// =============================================================================

/// Firmware version, stored as BCD (1.0.5 is 0x1005).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub raw: u16,
}

impl FirmwareVersion {
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }

    pub fn major(&self) -> u8 {
        (self.raw >> 12) as u8 & 0x0F
    }

    pub fn minor(&self) -> u8 {
        (self.raw >> 8) as u8 & 0x0F
    }

    pub fn patch(&self) -> u8 {
        let low = self.raw as u8;
        (low >> 4) * 10 + (low & 0x0F)
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

// =============================================================================
// Report
// =============================================================================

/// Snapshot of everything readable from a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub device: String,
    pub identity: u8,
    pub variant: Variant,
    pub firmware: String,
    pub temperatures: Vec<TempSensorState>,
    pub fans: Vec<FanState>,
}

impl std::fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "+-------------------------------------------+")?;
        writeln!(
            f,
            "|  Corsair {:<8} (id {:#04x})  firmware {:<6}|",
            self.device, self.identity, self.firmware
        )?;
        writeln!(f, "+-------------------------------------------+")?;
        for sensor in self.temperatures.iter().filter(|s| s.present) {
            writeln!(
                f,
                "|  {:<8}  {:>7.3} C                      |",
                sensor.name,
                sensor.celsius()
            )?;
        }
        writeln!(f, "+-------------------------------------------+")?;
        for fan in self.fans.iter().filter(|fan| fan.present) {
            let mode = fan.mode.map(|m| m.name()).unwrap_or("Unknown");
            writeln!(
                f,
                "|  {:<6} {:<11} {:>5} RPM (max {:>5})  |",
                fan.name, mode, fan.rpm, fan.max_rpm
            )?;
        }
        writeln!(f, "+-------------------------------------------+")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_weights() {
        assert_eq!(fraction_millidegrees(0x00), 0);
        assert_eq!(fraction_millidegrees(0x80), 500);
        assert_eq!(fraction_millidegrees(0x40), 250);
        assert_eq!(fraction_millidegrees(0x01), 4);
        assert_eq!(fraction_millidegrees(0xFF), 996);

        for fraction in 0..=255u8 {
            let expected: u16 = (0..8)
                .filter(|bit| fraction & (0x80 >> bit) != 0)
                .map(|bit| FRACTION_WEIGHTS[bit])
                .sum();
            let value = fraction_millidegrees(fraction);
            assert_eq!(value, expected);
            assert!(value <= 999);
        }
    }

    #[test]
    fn test_temperature_from_raw() {
        // 31 degrees + 0xC0 (0.75)
        let sensor = TempSensorState::from_raw(Variant::V2, 0, 0x1FC0);
        assert_eq!(sensor.whole, 31);
        assert_eq!(sensor.fraction, 0xC0);
        assert_eq!(sensor.millidegrees, 31_750);
        assert_eq!(sensor.name, "Temp 1");
        assert!(sensor.present);

        let missing = TempSensorState::from_raw(Variant::V1, 3, 0);
        assert!(!missing.present);
    }

    #[test]
    fn test_fan_mode_values() {
        for mode in FanMode::ALL {
            assert_eq!(FanMode::try_from(mode.value()).unwrap(), mode);
        }
        assert!(matches!(
            FanMode::try_from(0x03),
            Err(CorsairError::InvalidMode(0x03))
        ));
        assert!(FanMode::try_from(0x00).is_err());
    }

    #[test]
    fn test_fan_mode_from_register() {
        // present + tach + quiet
        assert_eq!(FanMode::from_register(0x89), Some(FanMode::Quiet));
        assert_eq!(FanMode::from_register(0x86), Some(FanMode::Default));
        assert_eq!(FanMode::from_register(0x81), None);
    }

    #[test]
    fn test_firmware_display() {
        assert_eq!(FirmwareVersion::new(0x1005).to_string(), "1.0.5");
        assert_eq!(FirmwareVersion::new(0x1112).to_string(), "1.1.12");
    }

    #[test]
    fn test_report_json() {
        let report = DeviceReport {
            device: "h100i".into(),
            identity: 0x3C,
            variant: Variant::V2,
            firmware: "1.0.5".into(),
            temperatures: vec![TempSensorState::from_raw(Variant::V2, 0, 0x1F80)],
            fans: vec![FanState {
                index: 4,
                name: "Pump".into(),
                mode: Some(FanMode::Performance),
                mode_raw: 0x8C,
                rpm: 1068,
                max_rpm: 2100,
                present: true,
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["device"], "h100i");
        assert_eq!(json["temperatures"][0]["millidegrees"], 31_500);
        assert_eq!(json["fans"][0]["mode"], "performance");
        assert_eq!(json["fans"][0]["rpm"], 1068);

        let text = report.to_string();
        assert!(text.contains("Pump"));
        assert!(text.contains("Performance"));
    }
}
