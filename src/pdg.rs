//! Nuclear isotope codes.
//!
//! Isotopes are identified by the PDG ion convention `10LZZZAAAI`, with the
//! strangeness digit `L` and the isomer digit `I` always zero. The geometry
//! service and the path-length accumulator both derive their keys through
//! [`ion_pdg_code`], so the two always agree.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use crate::error::GeomError;


const ION_BASE: i32 = 1_000_000_000;

/// Encodes mass number `a` and atomic number `z` as an ion code.
pub fn ion_pdg_code(a: i32, z: i32) -> i32 {
    ION_BASE + z * 10_000 + a * 10
}

/// Atomic number of an ion code.
pub fn ion_z(code: i32) -> i32 {
    (code / 10_000) % 1000
}

/// Mass number of an ion code.
pub fn ion_a(code: i32) -> i32 {
    (code / 10) % 1000
}

pub fn is_ion(code: i32) -> bool {
    code > ION_BASE && code < 2 * ION_BASE
}

/// Ordered set of isotope codes present in a geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdgCodeList {
    codes: Vec<i32>,
}

impl PdgCodeList {
    pub fn from_codes(codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            codes: codes.into_iter().sorted().dedup().collect(),
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        self.codes.binary_search(&code).is_ok()
    }

    pub fn codes(&self) -> &[i32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.codes.iter().copied()
    }
}

impl fmt::Display for PdgCodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in &self.codes {
            writeln!(f, "  - {} (Z = {}, A = {})", code, ion_z(*code), ion_a(*code))?;
        }
        Ok(())
    }
}

/// A list of targets with weight fractions, used when no detailed geometry
/// is available.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMix {
    weights: BTreeMap<i32, f64>,
}

impl TargetMix {
    pub fn new(weights: BTreeMap<i32, f64>) -> Result<Self, GeomError> {
        if weights.is_empty() {
            return Err(GeomError::InvalidTargetMix("no targets given".to_string()));
        }
        if let Some((code, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w <= 0.0) {
            return Err(GeomError::InvalidTargetMix(format!(
                "weight {} for target {} must be positive",
                w, code
            )));
        }
        Ok(Self { weights })
    }

    /// Parses `code1[w1],code2[w2],...`, or a single bare code with weight 1.
    pub fn parse(s: &str) -> Result<Self, GeomError> {
        let entries: Vec<&str> = s.split(',').map(str::trim).collect();

        if entries.len() == 1 && !entries[0].contains('[') {
            let code = parse_code(entries[0])?;
            return Self::new(BTreeMap::from([(code, 1.0)]));
        }

        let mut weights = BTreeMap::new();
        for entry in entries {
            let (Some(open), Some(close)) = (entry.find('['), entry.find(']')) else {
                return Err(GeomError::InvalidTargetMix(format!(
                    "'{}' is not of the form code[weight]",
                    entry
                )));
            };
            if close < open {
                return Err(GeomError::InvalidTargetMix(format!("misplaced brackets in '{}'", entry)));
            }
            let code = parse_code(&entry[..open])?;
            let weight = entry[open + 1..close].trim().parse::<f64>().map_err(|_| {
                GeomError::InvalidTargetMix(format!("bad weight in '{}'", entry))
            })?;
            weights.insert(code, weight);
        }

        Self::new(weights)
    }

    pub fn weights(&self) -> &BTreeMap<i32, f64> {
        &self.weights
    }

    pub fn weight(&self, code: i32) -> Option<f64> {
        self.weights.get(&code).copied()
    }
}

fn parse_code(s: &str) -> Result<i32, GeomError> {
    s.trim()
        .parse::<i32>()
        .map_err(|_| GeomError::InvalidTargetMix(format!("'{}' is not a target code", s)))
}
