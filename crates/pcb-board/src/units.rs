//! Conversion between user-facing lengths/angles and the board's fixed-point
//! internal units.
//!
//! Coordinates are signed 64-bit nanometres. Rotations are tenths of a degree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const IU_PER_MM: i64 = 1_000_000;
pub const IU_PER_INCH: i64 = 25_400_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown length unit '{0}' (expected 'mm' or 'inch')")]
pub struct UnitError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Mm,
    Inch,
}

impl LengthUnit {
    pub fn scale(self) -> i64 {
        match self {
            LengthUnit::Mm => IU_PER_MM,
            LengthUnit::Inch => IU_PER_INCH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Mm => "mm",
            LengthUnit::Inch => "inch",
        }
    }
}

impl FromStr for LengthUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimetre" => Ok(LengthUnit::Mm),
            "in" | "inch" | "inches" => Ok(LengthUnit::Inch),
            _ => Err(UnitError(s.to_string())),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length in `unit` to internal units, rounded to the nearest nanometre.
pub fn to_internal(value: f64, unit: LengthUnit) -> i64 {
    (value * unit.scale() as f64).round() as i64
}

pub fn from_internal(iu: i64, unit: LengthUnit) -> f64 {
    iu as f64 / unit.scale() as f64
}

pub fn mm(value: f64) -> i64 {
    to_internal(value, LengthUnit::Mm)
}

pub fn to_mm(iu: i64) -> f64 {
    from_internal(iu, LengthUnit::Mm)
}

pub fn degrees_to_tenths(degrees: f64) -> i32 {
    (degrees * 10.0).round() as i32
}

pub fn tenths_to_degrees(tenths: i32) -> f64 {
    f64::from(tenths) / 10.0
}

/// Fold an angle in tenths of a degree into `[0, 3600)`.
pub fn normalize_tenths(tenths: i32) -> i32 {
    tenths.rem_euclid(3600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millimetres_and_inches() {
        assert_eq!(to_internal(1.0, LengthUnit::Mm), 1_000_000);
        assert_eq!(to_internal(1.0, LengthUnit::Inch), 25_400_000);
        assert_eq!(to_internal(-2.5, LengthUnit::Mm), -2_500_000);
        assert_eq!(from_internal(25_400_000, LengthUnit::Inch), 1.0);
    }

    #[test]
    fn round_trip_within_one_unit() {
        for value in [0.1, 0.2, 0.3, 12.345678, -99.999999, 1e-6, 0.0254] {
            for unit in [LengthUnit::Mm, LengthUnit::Inch] {
                let iu = to_internal(value, unit);
                let back = to_internal(from_internal(iu, unit), unit);
                assert!((iu - back).abs() <= 1, "{value} {unit}");
            }
        }
    }

    #[test]
    fn unit_names() {
        assert_eq!("MM".parse::<LengthUnit>(), Ok(LengthUnit::Mm));
        assert_eq!("in".parse::<LengthUnit>(), Ok(LengthUnit::Inch));
        let err = "furlong".parse::<LengthUnit>().unwrap_err();
        assert_eq!(err.to_string(), "unknown length unit 'furlong' (expected 'mm' or 'inch')");
    }

    #[test]
    fn angles() {
        assert_eq!(degrees_to_tenths(90.0), 900);
        assert_eq!(degrees_to_tenths(-45.25), -453);
        assert_eq!(tenths_to_degrees(1805), 180.5);
        assert_eq!(normalize_tenths(-900), 2700);
        assert_eq!(normalize_tenths(3600), 0);
    }
}
