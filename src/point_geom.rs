use nalgebra::{Point3, Vector3};

use crate::analyzer::GeomAnalyzer;
use crate::error::GeomError;
use crate::path_length::PathLengthList;
use crate::pdg::{PdgCodeList, TargetMix};


/// Analyzer for a target mix without spatial structure. Path lengths are the
/// mix weights and every interaction happens at the origin.
#[derive(Debug, Clone)]
pub struct PointGeomAnalyzer {
    mix: TargetMix,
    targets: PdgCodeList,
    path_lengths: PathLengthList,
}

impl PointGeomAnalyzer {
    pub fn new(mix: TargetMix) -> Self {
        let targets = PdgCodeList::from_codes(mix.weights().keys().copied());
        let path_lengths = mix.weights().iter().map(|(&c, &w)| (c, w)).collect();
        Self {
            mix,
            targets,
            path_lengths,
        }
    }

    /// Builds the analyzer from a `code[weight],...` string.
    pub fn parse(s: &str) -> Result<Self, GeomError> {
        Ok(Self::new(TargetMix::parse(s)?))
    }

    pub fn mix(&self) -> &TargetMix {
        &self.mix
    }
}

impl GeomAnalyzer for PointGeomAnalyzer {
    fn list_of_target_nuclei(&self) -> &PdgCodeList {
        &self.targets
    }

    fn compute_max_path_lengths(&mut self) -> Result<&PathLengthList, GeomError> {
        Ok(&self.path_lengths)
    }

    fn compute_path_lengths(
        &mut self,
        _origin: &Point3<f64>,
        _dir: &Vector3<f64>,
    ) -> Result<&PathLengthList, GeomError> {
        Ok(&self.path_lengths)
    }

    fn generate_vertex(
        &mut self,
        _origin: &Point3<f64>,
        _dir: &Vector3<f64>,
        target: i32,
    ) -> Result<Point3<f64>, GeomError> {
        self.mix
            .weight(target)
            .map(|_| Point3::origin())
            .ok_or(GeomError::UnknownIsotope(target))
    }
}
