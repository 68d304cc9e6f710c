//! Capacity unit conversion.
//!
//! The device accepts `-size <n> -unit <b|kb|mb|gb|tb|pb>` and reports
//! capacities either as raw byte counts (`-bytes`) or in a unit-suffixed
//! human form. Every unit is a power of 1024.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One gibibyte. `expandvdisksize -size` is always expressed in this unit.
pub const GIB: u64 = 1 << 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("Unknown capacity unit `{0}`")]
    UnknownUnit(String),

    #[error("Invalid capacity value `{0}`")]
    InvalidNumber(String),

    #[error("Capacity {size}{unit} does not fit in 64 bits")]
    Overflow { size: u64, unit: CapacityUnit },
}

/// Capacity units in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityUnit {
    B,
    Kb,
    Mb,
    Gb,
    Tb,
    Pb,
}

impl CapacityUnit {
    pub const ALL: [CapacityUnit; 6] = [
        CapacityUnit::B,
        CapacityUnit::Kb,
        CapacityUnit::Mb,
        CapacityUnit::Gb,
        CapacityUnit::Tb,
        CapacityUnit::Pb,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            CapacityUnit::B => "B",
            CapacityUnit::Kb => "KB",
            CapacityUnit::Mb => "MB",
            CapacityUnit::Gb => "GB",
            CapacityUnit::Tb => "TB",
            CapacityUnit::Pb => "PB",
        }
    }

    fn exponent(self) -> u32 {
        match self {
            CapacityUnit::B => 0,
            CapacityUnit::Kb => 1,
            CapacityUnit::Mb => 2,
            CapacityUnit::Gb => 3,
            CapacityUnit::Tb => 4,
            CapacityUnit::Pb => 5,
        }
    }

    /// Number of bytes in one of this unit.
    pub fn multiplier(self) -> u64 {
        1u64 << (10 * self.exponent())
    }
}

impl fmt::Display for CapacityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for CapacityUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CapacityUnit::ALL
            .into_iter()
            .find(|unit| unit.suffix().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnitError::UnknownUnit(s.to_string()))
    }
}

/// Convert a `-size`/`-unit` pair to a byte count.
pub fn to_bytes(size: &str, unit: &str) -> Result<u64, UnitError> {
    let unit: CapacityUnit = unit.parse()?;
    let size: u64 = size
        .trim()
        .parse()
        .map_err(|_| UnitError::InvalidNumber(size.to_string()))?;
    size.checked_mul(unit.multiplier())
        .ok_or(UnitError::Overflow { size, unit })
}

/// Render a byte count in the largest unit whose value is at least one,
/// with two decimals (`1073741824` -> `1.00GB`).
pub fn bytes_to_human(bytes: u64) -> String {
    let unit = CapacityUnit::ALL
        .into_iter()
        .rev()
        .find(|unit| bytes >= unit.multiplier())
        .unwrap_or(CapacityUnit::B);
    let value = bytes as f64 / unit.multiplier() as f64;
    format!("{:.2}{}", value, unit.suffix())
}
