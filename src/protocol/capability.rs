//! Device capability table.
//!
//! Maps the identity byte read from register 0x00 to what the controller can
//! do. Lookup is a linear scan that always ends at the `unknown` sentinel.

use crate::protocol::commands::Variant;

/// Capabilities of one controller model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Identity byte reported by the device.
    pub code: u8,
    /// Whether this driver knows how to talk to the model.
    pub supported: bool,
    /// Register layout, absent for the sentinel.
    pub variant: Option<Variant>,
    pub max_temp_sensors: u8,
    pub max_fans: u8,
    /// 0 or 1. The pump sits at fan index `max_fans`.
    pub max_pumps: u8,
    pub name: &'static str,
}

const fn entry(
    code: u8,
    supported: bool,
    variant: Variant,
    max_temp_sensors: u8,
    max_fans: u8,
    max_pumps: u8,
    name: &'static str,
) -> DeviceIdentity {
    DeviceIdentity {
        code,
        supported,
        variant: Some(variant),
        max_temp_sensors,
        max_fans,
        max_pumps,
        name,
    }
}

/// Returned for identity bytes not in [`DEVICES`].
pub static UNKNOWN_DEVICE: DeviceIdentity = DeviceIdentity {
    code: 0x00,
    supported: false,
    variant: None,
    max_temp_sensors: 0,
    max_fans: 0,
    max_pumps: 0,
    name: "unknown",
};

/// Known controllers.
pub static DEVICES: [DeviceIdentity; 7] = [
    entry(0x37, false, Variant::V1, 1, 2, 1, "h80"),
    entry(0x38, true, Variant::V1, 4, 5, 0, "clink"),
    entry(0x39, false, Variant::V1, 0, 0, 0, "lightNode"),
    entry(0x3A, false, Variant::V1, 1, 4, 1, "h100"),
    entry(0x3B, true, Variant::V2, 1, 4, 1, "h80i"),
    entry(0x3C, true, Variant::V2, 1, 4, 1, "h100i"),
    entry(0x3D, false, Variant::V2, 4, 6, 0, "extNode"),
];

/// Look up an identity byte; unknown codes resolve to [`UNKNOWN_DEVICE`].
pub fn lookup(code: u8) -> &'static DeviceIdentity {
    DEVICES
        .iter()
        .find(|d| d.code == code)
        .unwrap_or(&UNKNOWN_DEVICE)
}

impl DeviceIdentity {
    /// Total fan channels including the pump.
    pub fn fan_count(&self) -> u8 {
        self.max_fans + self.max_pumps
    }

    pub fn is_pump(&self, index: u8) -> bool {
        self.max_pumps > 0 && index == self.max_fans
    }

    /// Display name of a fan channel: "Fan N" (1-based) or "Pump".
    pub fn fan_name(&self, index: u8) -> String {
        if self.is_pump(index) {
            "Pump".to_string()
        } else {
            format!("Fan {}", index + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_h100i() {
        let device = lookup(0x3C);
        assert!(device.supported);
        assert_eq!(device.variant, Some(Variant::V2));
        assert_eq!(device.name, "h100i");
        assert_eq!(device.max_fans, 4);
        assert_eq!(device.max_pumps, 1);
        assert_eq!(device.max_temp_sensors, 1);
        assert_eq!(device.fan_count(), 5);
        assert_eq!(device.fan_name(0), "Fan 1");
        assert_eq!(device.fan_name(4), "Pump");
    }

    #[test]
    fn test_lookup_cooling_node() {
        let device = lookup(0x38);
        assert!(device.supported);
        assert_eq!(device.variant, Some(Variant::V1));
        assert_eq!(device.name, "clink");
        assert_eq!(device.max_fans, 5);
        assert_eq!(device.max_temp_sensors, 4);
        assert_eq!(device.max_pumps, 0);
        assert_eq!(device.fan_name(4), "Fan 5");
    }

    #[test]
    fn test_lookup_unknown() {
        let device = lookup(0x99);
        assert_eq!(*device, UNKNOWN_DEVICE);
        assert!(!device.supported);
        assert_eq!(device.variant, None);
        assert_eq!(device.fan_count(), 0);
    }

    #[test]
    fn test_unsupported_entries() {
        for code in [0x37, 0x39, 0x3A, 0x3D] {
            assert!(!lookup(code).supported, "{:#04x}", code);
        }
    }
}
