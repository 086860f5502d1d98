//! Geometry analyzers as seen by an event generator.
//!
//! A generator only needs four things from the detector geometry: the list of
//! target nuclei, an upper bound on the path length through each of them, the
//! path lengths along a given ray, and a vertex along a ray once it has picked
//! a target. [`GeomAnalyzer`] is that interface.
//!
//! [`VolumeGeomAnalyzer`] answers the queries by walking rays through a
//! [`GeometryService`]. Points passed in and returned are in metres, lengths
//! are returned in metres and density-weighted lengths in kg/m^2. Internally
//! everything runs in the geometry's own units, converted with [`Units`].

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::DEFAULT_VERTEX_STEP;
use crate::error::GeomError;
use crate::geometry::Geometry;
use crate::max_path::{MaxPathEstimator, MaxPathSampling};
use crate::navigator::{GeometryService, VolumeId};
use crate::path_length::PathLengthList;
use crate::pdg::PdgCodeList;
use crate::ray::Ray;
use crate::stepper::{StepLimits, Stepper};
use crate::units::Units;
use crate::vertex::VertexSampler;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::material::{isotope_code, Component, Material};
    use crate::shape::Shape;

    /// Argon-filled world with a lead sphere of radius 1 and a unit-thick slab of
    /// water at 3 < x < 4.
    fn detector() -> Arc<Geometry> {
        let mut builder = GeometryBuilder::new();
        builder.material(Material::Element {
            name: "Argon".to_string(),
            z: 18,
            a: 39.948,
            density: 0.00166,
        });
        builder.material(Material::Element {
            name: "Lead".to_string(),
            z: 82,
            a: 207.2,
            density: 11.35,
        });
        builder.material(Material::Mixture {
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
        });
        builder.volume(
            "World",
            Shape::Box {
                centre: Point3::origin(),
                half: Vector3::new(5.0, 5.0, 5.0),
            },
            "Argon",
            None,
        );
        builder.volume(
            "Ball",
            Shape::Sphere {
                centre: Point3::origin(),
                radius: 1.0,
            },
            "Lead",
            Some("World"),
        );
        builder.volume(
            "Tank",
            Shape::Box {
                centre: Point3::new(3.5, 0.0, 0.0),
                half: Vector3::new(0.5, 2.0, 2.0),
            },
            "Water",
            Some("World"),
        );
        Arc::new(builder.build().unwrap())
    }

    fn lead() -> i32 {
        isotope_code(207.2, 82)
    }

    #[test]
    fn target_list_covers_every_material() {
        let analyzer = VolumeGeomAnalyzer::new(detector(), Some(1));
        let codes = analyzer.list_of_target_nuclei().codes().to_vec();
        assert_eq!(codes, vec![1000010010, 1000080160, 1000180400, 1000822070]);
    }

    #[test]
    fn path_lengths_in_si_units() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(1));
        analyzer.set_units(Units::from_names("cm", "g_cm3").unwrap());

        // origin given in metres: (-0.1, 0, 0) is x = -10 cm
        let lengths = analyzer
            .compute_path_lengths(&Point3::new(-0.1, 0.0, 0.0), &Vector3::x())
            .unwrap()
            .clone();
        assert!((lengths.path_length(lead()).unwrap() - 0.02).abs() < 1e-9);
        assert!((lengths.path_length(1000010010).unwrap() - 0.01).abs() < 1e-9);
        assert!((lengths.path_length(1000080160).unwrap() - 0.01).abs() < 1e-9);

        // 2 cm of lead at 11.35 g/cm3 is 227 kg/m2
        let weighted = analyzer.weighted_path_lengths().unwrap();
        assert!((weighted.path_length(lead()).unwrap() - 227.0).abs() < 1e-5);
    }

    #[test]
    fn failed_vertex_resets_to_origin() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(4));
        let vertex = analyzer
            .generate_vertex(&Point3::new(-10.0, 0.0, 0.0), &Vector3::x(), lead())
            .unwrap();
        assert!(vertex.coords.norm() <= 1.0 + 1e-6);
        assert_eq!(analyzer.last_vertex(), vertex);

        let result =
            analyzer.generate_vertex(&Point3::new(-10.0, 3.0, 0.0), &Vector3::x(), lead());
        assert!(matches!(result, Err(GeomError::NoTargetAlongRay(_))));
        assert_eq!(analyzer.last_vertex(), Point3::origin());

        let result = analyzer.generate_vertex(&Point3::origin(), &Vector3::x(), 1000260560);
        assert!(matches!(result, Err(GeomError::UnknownIsotope(1000260560))));
    }

    /// Air-filled world holding 150 iron plates of unit thickness, plate `i`
    /// at `2i < x < 2i + 1`.
    fn plate_stack() -> Arc<Geometry> {
        let mut builder = GeometryBuilder::new();
        builder.material(Material::Element {
            name: "Nitrogen".to_string(),
            z: 7,
            a: 14.007,
            density: 0.00125,
        });
        builder.material(Material::Element {
            name: "Iron".to_string(),
            z: 26,
            a: 55.845,
            density: 7.874,
        });
        builder.volume(
            "World",
            Shape::Box {
                centre: Point3::new(150.0, 0.0, 0.0),
                half: Vector3::new(160.0, 5.0, 5.0),
            },
            "Nitrogen",
            None,
        );
        for i in 0..150 {
            builder.volume(
                &format!("Plate{}", i),
                Shape::Box {
                    centre: Point3::new(2.0 * i as f64 + 0.5, 0.0, 0.0),
                    half: Vector3::new(0.5, 4.0, 4.0),
                },
                "Iron",
                Some("World"),
            );
        }
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn vertices_reach_past_a_hundred_boundaries() {
        let iron = isotope_code(55.845, 26);
        let mut analyzer = VolumeGeomAnalyzer::new(plate_stack(), Some(3));
        analyzer.set_vertex_step(0.1);

        let origin = Point3::new(-5.0, 0.0, 0.0);
        let lengths = analyzer.compute_path_lengths(&origin, &Vector3::x()).unwrap();
        assert!((lengths.path_length(iron).unwrap() - 150.0).abs() < 1e-6);

        // half the iron lies beyond x = 150, past the first 150 crossings
        let draws = 100;
        let mut beyond = 0;
        for _ in 0..draws {
            let vertex = analyzer.generate_vertex(&origin, &Vector3::x(), iron).unwrap();
            if vertex.x > 150.0 {
                beyond += 1;
            }
        }
        assert!(beyond > 30, "{} of {} vertices beyond x = 150", beyond, draws);
        assert!(beyond < 70, "{} of {} vertices beyond x = 150", beyond, draws);
    }

    #[test]
    fn top_volume_moves_only_the_entry_faces() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(6));
        analyzer.set_top_volume("Tank").unwrap();
        analyzer.set_sampling(MaxPathSampling {
            points_per_face: 20,
            rays_per_point: 20,
            ..MaxPathSampling::default()
        });

        // the tank holds no lead, but rays fired from its faces still cross the ball
        let length = analyzer.estimate_max_path_length(lead()).unwrap();
        assert!(length > 0.0);
        assert!(length <= 2.0 + 1e-6);
    }

    #[test]
    fn top_volume_must_exist() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(1));
        assert!(analyzer.set_top_volume("Tank").is_ok());
        assert_eq!(analyzer.top_volume(), 2);
        assert!(matches!(
            analyzer.set_top_volume("Cavern"),
            Err(GeomError::MissingVolume(_))
        ));
    }

    #[test]
    fn max_path_table_is_reproducible() {
        let sampling = MaxPathSampling {
            points_per_face: 10,
            rays_per_point: 10,
            ..MaxPathSampling::default()
        };
        let run = || {
            let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(2024));
            analyzer.set_sampling(sampling);
            analyzer.compute_max_path_lengths().unwrap().clone()
        };
        let first = run();
        assert_eq!(first, run());
        assert!(first.path_length(lead()).unwrap() <= 2.0 + 1e-6);
        assert!(first.iter().any(|(_, length)| length > 0.0));
    }

    #[test]
    fn preloaded_table_is_returned() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(1));
        let mut table = PathLengthList::new(analyzer.list_of_target_nuclei());
        table.set_path_length(lead(), 0.25).unwrap();
        analyzer.set_max_path_lengths(table.clone()).unwrap();
        assert_eq!(analyzer.compute_max_path_lengths().unwrap(), &table);

        let foreign = PathLengthList::new(&PdgCodeList::from_codes([1000260560]));
        assert!(analyzer.set_max_path_lengths(foreign).is_err());
    }

    #[test]
    fn single_estimate_rejects_unknown_isotope() {
        let mut analyzer = VolumeGeomAnalyzer::new(detector(), Some(1));
        assert!(matches!(
            analyzer.estimate_max_path_length(1000260560),
            Err(GeomError::UnknownIsotope(_))
        ));
    }
}

/// Interface an event generator drives.
pub trait GeomAnalyzer {
    /// Every isotope present in the geometry, in code order.
    fn list_of_target_nuclei(&self) -> &PdgCodeList;

    /// Upper bound on the path length through each isotope for any ray.
    fn compute_max_path_lengths(&mut self) -> Result<&PathLengthList, GeomError>;

    /// Path length through each isotope along the ray from `origin`.
    fn compute_path_lengths(
        &mut self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
    ) -> Result<&PathLengthList, GeomError>;

    /// Picks an interaction point in material containing `target` along the
    /// ray from `origin`.
    fn generate_vertex(
        &mut self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        target: i32,
    ) -> Result<Point3<f64>, GeomError>;

    /// Density-weighted lengths of the last `compute_path_lengths` call, if
    /// the analyzer knows densities.
    fn weighted_path_lengths(&self) -> Option<&PathLengthList> {
        None
    }
}

/// Every isotope of every volume's material.
pub fn isotope_list<G: GeometryService + ?Sized>(geometry: &G) -> PdgCodeList {
    PdgCodeList::from_codes(
        (0..geometry.num_volumes()).flat_map(|v| geometry.material_of(v).isotopes()),
    )
}

/// Analyzer walking rays through a detailed volume geometry.
pub struct VolumeGeomAnalyzer<G: GeometryService = Geometry, R: Rng + SeedableRng = StdRng> {
    geometry: Arc<G>,
    rng: R,
    units: Units,
    top_volume: VolumeId,
    sampling: MaxPathSampling,
    limits: StepLimits,
    vertex_step: f64,
    targets: PdgCodeList,
    path_lengths: PathLengthList,
    weighted_path_lengths: PathLengthList,
    max_path_lengths: PathLengthList,
    max_path_preloaded: bool,
    vertex: Point3<f64>,
    show_progress: bool,
}

impl<G: GeometryService> VolumeGeomAnalyzer<G, StdRng> {
    /// Analyzer seeded from `seed`, or from the thread-local generator when
    /// no seed is given.
    pub fn new(geometry: Arc<G>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self::with_rng(geometry, rng)
    }
}

impl<G: GeometryService, R: Rng + SeedableRng> VolumeGeomAnalyzer<G, R> {
    pub fn with_rng(geometry: Arc<G>, rng: R) -> Self {
        let targets = isotope_list(geometry.as_ref());
        let top_volume = geometry.master_volume();
        debug!(
            "analyzer over {} volumes with {} target isotopes",
            geometry.num_volumes(),
            targets.len()
        );

        Self {
            rng,
            units: Units::native(),
            top_volume,
            sampling: MaxPathSampling::default(),
            limits: StepLimits::default(),
            vertex_step: DEFAULT_VERTEX_STEP,
            path_lengths: PathLengthList::new(&targets),
            weighted_path_lengths: PathLengthList::new(&targets),
            max_path_lengths: PathLengthList::new(&targets),
            max_path_preloaded: false,
            vertex: Point3::origin(),
            show_progress: false,
            targets,
            geometry,
        }
    }

    pub fn geometry(&self) -> &Arc<G> {
        &self.geometry
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn set_units(&mut self, units: Units) {
        self.units = units;
    }

    pub fn top_volume(&self) -> VolumeId {
        self.top_volume
    }

    /// Restricts max-path sampling to the bounding box of the named volume.
    ///
    /// Only the entry faces move: rays fired from them still walk, and
    /// count, material outside the top volume until they leave the master
    /// volume.
    pub fn set_top_volume(&mut self, name: &str) -> Result<(), GeomError> {
        self.top_volume = self
            .geometry
            .find_volume(name)
            .ok_or_else(|| GeomError::MissingVolume(name.to_string()))?;
        Ok(())
    }

    pub fn set_sampling(&mut self, sampling: MaxPathSampling) {
        self.sampling = sampling;
    }

    /// Limits of path-length and vertex walks. Max-path rays use the
    /// limits of their sampling settings.
    pub fn set_step_limits(&mut self, limits: StepLimits) {
        self.limits = limits;
    }

    /// Increment of the vertex locate pass, in geometry units.
    pub fn set_vertex_step(&mut self, step: f64) {
        self.vertex_step = step;
    }

    pub fn set_show_progress(&mut self, show: bool) {
        self.show_progress = show;
    }

    /// Uses a previously computed max-path table instead of sampling.
    pub fn set_max_path_lengths(&mut self, table: PathLengthList) -> Result<(), GeomError> {
        if let Some(code) = table.iter().map(|(c, _)| c).find(|&c| !self.targets.contains(c)) {
            return Err(GeomError::UnknownIsotope(code));
        }
        if let Some(code) = self.targets.iter().find(|&c| table.path_length(c).is_none()) {
            return Err(GeomError::UnknownIsotope(code));
        }
        self.max_path_lengths = table;
        self.max_path_preloaded = true;
        Ok(())
    }

    /// Vertex of the last `generate_vertex` call, the origin if it failed.
    pub fn last_vertex(&self) -> Point3<f64> {
        self.vertex
    }

    /// Max-path estimate for a single isotope, in metres.
    pub fn estimate_max_path_length(&mut self, code: i32) -> Result<f64, GeomError> {
        if !self.targets.contains(code) {
            return Err(GeomError::UnknownIsotope(code));
        }
        let estimator = MaxPathEstimator::new(self.geometry.as_ref(), self.top_volume, self.sampling);
        let length = estimator.estimate(code, &mut self.rng) * self.units.length;
        debug!("max path length of {}: {:.6e} m", code, length);
        Ok(length)
    }

    fn to_geometry_units(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(point.coords / self.units.length)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }
        pb.set_message("isotope".to_string());
        pb
    }
}

impl<G, R> GeomAnalyzer for VolumeGeomAnalyzer<G, R>
where
    G: GeometryService + Sync,
    R: Rng + SeedableRng,
{
    fn list_of_target_nuclei(&self) -> &PdgCodeList {
        &self.targets
    }

    fn compute_max_path_lengths(&mut self) -> Result<&PathLengthList, GeomError> {
        if self.max_path_preloaded {
            return Ok(&self.max_path_lengths);
        }

        let codes: Vec<i32> = self.targets.iter().collect();
        let seeds: Vec<u64> = codes.iter().map(|_| self.rng.next_u64()).collect();
        let estimator = MaxPathEstimator::new(self.geometry.as_ref(), self.top_volume, self.sampling);
        info!(
            "estimating max path lengths of {} isotopes with {} rays each",
            codes.len(),
            6 * self.sampling.points_per_face * self.sampling.rays_per_point
        );

        let pb = self.progress_bar(codes.len());
        let estimates: Vec<(i32, f64)> = codes
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(&code, &seed)| {
                let mut rng = R::seed_from_u64(seed);
                let length = estimator.estimate(code, &mut rng);
                pb.inc(1);
                (code, length)
            })
            .collect();
        pb.finish_and_clear();

        for (code, length) in estimates {
            self.max_path_lengths
                .set_path_length(code, length * self.units.length)?;
        }
        Ok(&self.max_path_lengths)
    }

    fn compute_path_lengths(
        &mut self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
    ) -> Result<&PathLengthList, GeomError> {
        self.path_lengths.set_all_to_zero();
        self.weighted_path_lengths.set_all_to_zero();

        let ray = Ray::new(self.to_geometry_units(origin), *dir)?;
        let stepper = Stepper::new(self.geometry.as_ref(), self.limits);
        let lengths = &mut self.path_lengths;
        let weighted = &mut self.weighted_path_lengths;

        let walked = stepper.walk(&ray, |material, step| {
            lengths.add_step(material, step)?;
            weighted.add_step(material, step * material.density())
        });

        match walked {
            Ok(outcome) => {
                if outcome.truncated {
                    warn!("path lengths cover only the first {} steps", outcome.steps);
                }
            }
            Err(err) => {
                self.path_lengths.set_all_to_zero();
                self.weighted_path_lengths.set_all_to_zero();
                return Err(err);
            }
        }

        self.path_lengths.scale(self.units.length);
        self.weighted_path_lengths
            .scale(self.units.length * self.units.density);
        Ok(&self.path_lengths)
    }

    fn weighted_path_lengths(&self) -> Option<&PathLengthList> {
        Some(&self.weighted_path_lengths)
    }

    fn generate_vertex(
        &mut self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        target: i32,
    ) -> Result<Point3<f64>, GeomError> {
        self.vertex = Point3::origin();
        if !self.targets.contains(target) {
            return Err(GeomError::UnknownIsotope(target));
        }

        let start = self.to_geometry_units(origin);
        let sampler = VertexSampler::new(self.geometry.as_ref(), self.limits, self.vertex_step);
        let vertex = sampler.sample(&start, dir, target, &mut self.rng)?;

        self.vertex = Point3::from(vertex.coords * self.units.length);
        debug!(
            "vertex for {} at ({:.6}, {:.6}, {:.6})",
            target, self.vertex.x, self.vertex.y, self.vertex.z
        );
        Ok(self.vertex)
    }
}
