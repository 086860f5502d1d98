//! Materials filling the geometry's volumes.
//!
//! A material is either a single element or a mixture of elements with mass
//! fractions. Both expose their density and the isotope codes they contain,
//! which is all the path-length engine needs to know about them.

use serde::Deserialize;

use crate::error::GeomError;
use crate::pdg::ion_pdg_code;

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Material {
        Material::Mixture {
            name: "Water".to_string(),
            density: 1.0,
            components: vec![
                Component {
                    z: 1,
                    a: 1.008,
                    fraction: 0.112,
                },
                Component {
                    z: 8,
                    a: 15.999,
                    fraction: 0.888,
                },
            ],
        }
    }

    #[test]
    fn element_isotope_uses_rounded_mass_number() {
        let iron = Material::Element {
            name: "Iron".to_string(),
            z: 26,
            a: 55.845,
            density: 7.87,
        };
        assert_eq!(iron.isotopes().collect::<Vec<_>>(), vec![1000260560]);
        assert!(iron.contains_isotope(1000260560));
        assert!(!iron.is_mixture());
        assert_eq!(iron.density(), 7.87);
    }

    #[test]
    fn mixture_lists_every_component() {
        let water = water();
        assert!(water.is_mixture());
        assert_eq!(
            water.isotopes().collect::<Vec<_>>(),
            vec![1000010010, 1000080160]
        );
        assert!(water.contains_isotope(1000080160));
        assert!(water.validate().is_ok());
    }

    #[test]
    fn mixture_fractions_must_sum_to_one() {
        let mut bad = water();
        if let Material::Mixture { components, .. } = &mut bad {
            components[0].fraction = 0.5;
        }
        assert!(bad.validate().is_err());
    }

    #[test]
    fn nuclides_must_fit_the_ion_code() {
        let element = |z, a| Material::Element {
            name: "Odd".to_string(),
            z,
            a,
            density: 1.0,
        };
        assert!(element(26, 55.845).validate().is_ok());
        assert!(element(1000, 2500.0).validate().is_err());
        assert!(element(-3, 7.0).validate().is_err());
        assert!(element(0, 1.0).validate().is_err());
        assert!(element(26, -55.8).validate().is_err());
        assert!(element(92, 1200.0).validate().is_err());

        let mut bad = water();
        if let Material::Mixture { components, .. } = &mut bad {
            components[1].z = 1200;
        }
        assert!(matches!(bad.validate(), Err(GeomError::Description(_))));
    }

    #[test]
    fn deserialize_tagged_materials() {
        let text = r#"
            [[materials]]
            kind = "element"
            name = "Lead"
            z = 82
            a = 207.2
            density = 11.35

            [[materials]]
            kind = "mixture"
            name = "Scintillator"
            density = 1.032
            components = [
                { z = 6, a = 12.011, fraction = 0.915 },
                { z = 1, a = 1.008, fraction = 0.085 },
            ]
        "#;

        #[derive(Deserialize)]
        struct Wrapper {
            materials: Vec<Material>,
        }

        let wrapper: Wrapper = toml::from_str(text).unwrap();
        assert_eq!(wrapper.materials.len(), 2);
        assert_eq!(wrapper.materials[0].name(), "Lead");
        assert_eq!(wrapper.materials[1].isotopes().count(), 2);
    }
}

/// Tolerance on the sum of mixture mass fractions.
const FRACTION_SUM_TOLERANCE: f64 = 1e-3;
/// `Z` and rounded `A` must fit the three digits of an ion code.
const MAX_ION_FIELD: i32 = 999;

/// Checks `z` and `a` fit the ion code of `material`.
fn validate_nuclide(material: &str, z: i32, a: f64) -> Result<(), GeomError> {
    if !(1..=MAX_ION_FIELD).contains(&z) {
        return Err(GeomError::Description(format!(
            "material '{}' has atomic number {} outside 1..={}",
            material, z, MAX_ION_FIELD
        )));
    }
    if !a.is_finite() || a < 0.5 || a.round() > MAX_ION_FIELD as f64 {
        return Err(GeomError::Description(format!(
            "material '{}' has atomic mass {} outside the ion code range",
            material, a
        )));
    }
    Ok(())
}

/// One element of a mixture.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Component {
    pub z: i32,
    /// Atomic mass in g/mol.
    pub a: f64,
    /// Mass fraction within the mixture.
    pub fraction: f64,
}

impl Component {
    pub fn pdg_code(&self) -> i32 {
        isotope_code(self.a, self.z)
    }
}

/// Material of a volume.
///
/// Densities are expressed in the geometry's density units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Material {
    Element {
        name: String,
        z: i32,
        a: f64,
        density: f64,
    },
    Mixture {
        name: String,
        density: f64,
        components: Vec<Component>,
    },
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Material::Element { name, .. } | Material::Mixture { name, .. } => name,
        }
    }

    pub fn density(&self) -> f64 {
        match self {
            Material::Element { density, .. } | Material::Mixture { density, .. } => *density,
        }
    }

    pub fn is_mixture(&self) -> bool {
        matches!(self, Material::Mixture { .. })
    }

    /// Isotope codes of the material. Mixtures yield one code per component.
    pub fn isotopes(&self) -> impl Iterator<Item = i32> + '_ {
        let (single, components) = match self {
            Material::Element { z, a, .. } => (Some(isotope_code(*a, *z)), &[][..]),
            Material::Mixture { components, .. } => (None, components.as_slice()),
        };
        single
            .into_iter()
            .chain(components.iter().map(Component::pdg_code))
    }

    pub fn contains_isotope(&self, code: i32) -> bool {
        self.isotopes().any(|c| c == code)
    }

    /// Checks the density is physical and mixture fractions add up.
    pub fn validate(&self) -> Result<(), GeomError> {
        let density = self.density();
        if !density.is_finite() || density < 0.0 {
            return Err(GeomError::Description(format!(
                "material '{}' has invalid density {}",
                self.name(),
                density
            )));
        }

        if let Material::Element { z, a, .. } = self {
            validate_nuclide(self.name(), *z, *a)?;
        }

        if let Material::Mixture { components, .. } = self {
            for component in components {
                validate_nuclide(self.name(), component.z, component.a)?;
            }
            if components.is_empty() {
                return Err(GeomError::Description(format!(
                    "mixture '{}' has no components",
                    self.name()
                )));
            }
            if components.iter().any(|c| c.fraction <= 0.0) {
                return Err(GeomError::Description(format!(
                    "mixture '{}' has a non-positive mass fraction",
                    self.name()
                )));
            }
            let sum: f64 = components.iter().map(|c| c.fraction).sum();
            if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
                return Err(GeomError::Description(format!(
                    "mass fractions of mixture '{}' sum to {:.4}",
                    self.name(),
                    sum
                )));
            }
        }

        Ok(())
    }
}

/// Isotope code of an element with atomic mass `a` (g/mol) and atomic number `z`.
///
/// The mass number is `a` rounded to the nearest integer. ROOT-based GENIE
/// geometry drivers truncate instead, so tables written by them key iron
/// (55.845) as 1000260550 where this gives 1000260560.
pub fn isotope_code(a: f64, z: i32) -> i32 {
    ion_pdg_code(a.round() as i32, z)
}
