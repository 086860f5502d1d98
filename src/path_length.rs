//! Per-isotope accumulation of path lengths.
//!
//! A [`PathLengthList`] maps every isotope code of a geometry to the distance
//! a ray travels through material containing that isotope.
//!
//! Mixtures are not split by mass fraction: a step through a mixture adds the
//! full step length to every constituent isotope. Summing the entries of a
//! list therefore over-counts the geometric length of the ray whenever it
//! crossed a mixture. Each entry is meant to be read on its own, as the
//! thickness of the isotope's host material along the ray.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeomError;
use crate::material::Material;
use crate::pdg::PdgCodeList;


/// Isotope code to accumulated length, in code order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathLengthList {
    lengths: BTreeMap<i32, f64>,
}

impl PathLengthList {
    /// A zeroed entry for every code of `codes`.
    pub fn new(codes: &PdgCodeList) -> Self {
        Self {
            lengths: codes.iter().map(|code| (code, 0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn set_all_to_zero(&mut self) {
        self.lengths.values_mut().for_each(|v| *v = 0.0);
    }

    pub fn add_path_length(&mut self, code: i32, length: f64) -> Result<(), GeomError> {
        let entry = self
            .lengths
            .get_mut(&code)
            .ok_or(GeomError::UnknownIsotope(code))?;
        *entry += length;
        Ok(())
    }

    /// Adds `length` to every isotope of `material`.
    pub fn add_step(&mut self, material: &Material, length: f64) -> Result<(), GeomError> {
        material
            .isotopes()
            .try_for_each(|code| self.add_path_length(code, length))
    }

    pub fn set_path_length(&mut self, code: i32, length: f64) -> Result<(), GeomError> {
        let entry = self
            .lengths
            .get_mut(&code)
            .ok_or(GeomError::UnknownIsotope(code))?;
        *entry = length;
        Ok(())
    }

    pub fn path_length(&self, code: i32) -> Option<f64> {
        self.lengths.get(&code).copied()
    }

    pub fn are_all_zero(&self) -> bool {
        self.lengths.values().all(|&v| v == 0.0)
    }

    /// Multiplies every entry by `factor`, e.g. to convert units.
    pub fn scale(&mut self, factor: f64) {
        self.lengths.values_mut().for_each(|v| *v *= factor);
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.lengths.iter().map(|(&code, &length)| (code, length))
    }
}

impl FromIterator<(i32, f64)> for PathLengthList {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        Self {
            lengths: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for PathLengthList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (code, length) in self.iter() {
            writeln!(f, "{:>12} : {:.6e}", code, length)?;
        }
        Ok(())
    }
}
