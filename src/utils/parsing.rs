//! Parsing utilities for CLI arguments.

use crate::error::{CorsairError, Result};
use crate::protocol::FanMode;

// =============================================================================
// Fan Mode Parsing
// =============================================================================

/// Parse a fan mode given by name or by raw value.
///
/// Names are matched case-insensitively, ignoring `-` and `_`. Raw values may
/// be decimal or `0x` hex and must be one of the defined modes.
///
/// # Arguments
/// * `input` - Mode name ("quiet", "fixed-rpm") or value ("8", "0x08")
///
/// # Returns
/// Raw mode register value
///
/// # Example
/// ```
/// use open_corsair_link::utils::parsing::parse_fan_mode;
///
/// assert_eq!(parse_fan_mode("performance").unwrap(), 0x0C);
/// assert_eq!(parse_fan_mode("0x04").unwrap(), 0x04);
/// assert_eq!(parse_fan_mode("6").unwrap(), 0x06);
/// assert!(parse_fan_mode("3").is_err());
/// ```
pub fn parse_fan_mode(input: &str) -> Result<u8> {
    let normalized: String = input
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();

    if let Some(mode) = FanMode::ALL
        .iter()
        .find(|m| m.name().to_lowercase() == normalized)
    {
        return Ok(mode.value());
    }

    let value = match normalized.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => normalized.parse::<u8>(),
    }
    .map_err(|_| {
        CorsairError::InvalidArgument(format!(
            "Unknown fan mode '{}'. Use a name (fixedpwm, fixedrpm, default, quiet, \
             balanced, performance, custom) or a value",
            input
        ))
    })?;

    FanMode::try_from(value).map(|m| m.value())
}

/// Parse a 1-based fan number into a 0-based channel index.
///
/// # Example
/// ```
/// use open_corsair_link::utils::parsing::parse_fan_number;
///
/// assert_eq!(parse_fan_number("1").unwrap(), 0);
/// assert!(parse_fan_number("0").is_err());
/// ```
pub fn parse_fan_number(input: &str) -> Result<u8> {
    match input.trim().parse::<u8>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(CorsairError::InvalidArgument(format!(
            "Invalid fan number '{}'. Fans are numbered from 1",
            input
        ))),
    }
}
