//! Length and density units of a geometry description.
//!
//! Geometry files are written in whatever units the detector group prefers.
//! The analyzer converts every reported length and density to SI (metres and
//! kg/m^3) using the scale factors resolved here.

use crate::error::GeomError;


/// Scale factors from geometry units to SI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    pub length: f64,
    pub density: f64,
}

impl Units {
    /// Reports results in the geometry's own units.
    pub fn native() -> Self {
        Self {
            length: 1.0,
            density: 1.0,
        }
    }

    pub fn from_names(length: &str, density: &str) -> Result<Self, GeomError> {
        Ok(Self {
            length: length_unit(length)?,
            density: density_unit(density)?,
        })
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::native()
    }
}

/// Returns the size of one `name` length unit in metres.
pub fn length_unit(name: &str) -> Result<f64, GeomError> {
    let scale = match name.trim() {
        "km" => 1e3,
        "m" => 1.0,
        "cm" => 1e-2,
        "mm" => 1e-3,
        "um" => 1e-6,
        "nm" => 1e-9,
        "fm" => 1e-15,
        other => return Err(GeomError::UnknownUnit(other.to_string())),
    };
    Ok(scale)
}

/// Returns the size of one `name` density unit in kg/m^3.
pub fn density_unit(name: &str) -> Result<f64, GeomError> {
    let scale = match name.trim() {
        "kg_m3" => 1.0,
        "g_cm3" => 1e3,
        "mg_cm3" => 1.0,
        "kg_cm3" => 1e6,
        other => return Err(GeomError::UnknownUnit(other.to_string())),
    };
    Ok(scale)
}
