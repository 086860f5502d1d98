//! Density-weighted placement of interaction vertices along a ray.
//!
//! Sampling takes two passes. The measure pass walks the ray boundary to
//! boundary and sums `step * density` over the target material. The locate
//! pass draws a threshold below that sum and marches the ray through the
//! target in fixed increments, accumulating the same quantity until it
//! reaches the threshold.

use log::debug;
use nalgebra::{Point3, Vector3};
use rand::Rng;

use crate::config::DEFAULT_VERTEX_STEP;
use crate::error::GeomError;
use crate::navigator::GeometryService;
use crate::ray::Ray;
use crate::stepper::{StepLimits, Stepper};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryBuilder};
    use crate::material::{isotope_code, Material};
    use crate::shape::Shape;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Vacuum world holding two lead slabs, 1 < x < 2 and 3 < x < 5, with
    /// an aluminium slab in between.
    fn slabs() -> Geometry {
        let element = |name: &str, z, a, density| Material::Element {
            name: name.to_string(),
            z,
            a,
            density,
        };
        let slab = |lo: f64, hi: f64| Shape::Box {
            centre: Point3::new((lo + hi) / 2.0, 0.0, 0.0),
            half: Vector3::new((hi - lo) / 2.0, 4.0, 4.0),
        };

        let mut builder = GeometryBuilder::new();
        builder.material(element("Vacuum", 1, 1.0, 0.0));
        builder.material(element("Lead", 82, 207.2, 11.35));
        builder.material(element("Aluminium", 13, 26.98, 2.7));
        builder.volume(
            "World",
            Shape::Box {
                centre: Point3::origin(),
                half: Vector3::new(6.0, 6.0, 6.0),
            },
            "Vacuum",
            None,
        );
        builder.volume("Front", slab(1.0, 2.0), "Lead", Some("World"));
        builder.volume("Middle", slab(2.0, 3.0), "Aluminium", Some("World"));
        builder.volume("Back", slab(3.0, 5.0), "Lead", Some("World"));
        builder.build().unwrap()
    }

    fn lead() -> i32 {
        isotope_code(207.2, 82)
    }

    #[test]
    fn weighted_length_counts_only_target() {
        let geometry = slabs();
        let sampler = VertexSampler::new(&geometry, StepLimits::sampling(), 1e-3);
        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::x()).unwrap();
        let total = sampler.weighted_length(&ray, lead()).unwrap();
        assert!((total - 3.0 * 11.35).abs() < 1e-6);
    }

    #[test]
    fn threshold_maps_to_expected_depth() {
        let geometry = slabs();
        let sampler = VertexSampler::new(&geometry, StepLimits::sampling(), 1e-3);
        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::x()).unwrap();

        // half the lead: 1 unit into the front slab, 0.5 into the back one
        let point = sampler.locate(&ray, lead(), 1.5 * 11.35).unwrap();
        assert!((point.x - 3.5).abs() < 2e-3, "vertex at {}", point.x);

        let point = sampler.locate(&ray, lead(), 0.0).unwrap();
        assert!((point.x - 1.0).abs() < 2e-3, "vertex at {}", point.x);
    }

    #[test]
    fn overshooting_threshold_returns_last_target_point() {
        let geometry = slabs();
        let sampler = VertexSampler::new(&geometry, StepLimits::sampling(), 1e-3);
        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::x()).unwrap();
        let point = sampler.locate(&ray, lead(), 1e6).unwrap();
        assert!((point.x - 5.0).abs() < 2e-3);
        assert_eq!(geometry.material_of(geometry.locate(&point).unwrap()).name(), "Lead");
    }

    #[test]
    fn sampled_vertices_lie_in_target() {
        let geometry = slabs();
        let sampler = VertexSampler::new(&geometry, StepLimits::sampling(), 1e-3);
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..50 {
            let vertex = sampler
                .sample(&Point3::new(-10.0, 0.1, -0.2), &Vector3::x(), lead(), &mut rng)
                .unwrap();
            let volume = geometry.locate(&vertex).unwrap();
            assert_eq!(geometry.material_of(volume).name(), "Lead");
        }
    }

    #[test]
    fn vertices_follow_density() {
        let iron = |name: &str, density| Material::Element {
            name: name.to_string(),
            z: 26,
            a: 55.845,
            density,
        };
        let slab = |lo: f64| Shape::Box {
            centre: Point3::new(lo + 0.5, 0.0, 0.0),
            half: Vector3::new(0.5, 4.0, 4.0),
        };

        let mut builder = GeometryBuilder::new();
        builder.material(iron("Foam", 1.0));
        builder.material(iron("Block", 10.0));
        builder.material(Material::Element {
            name: "Vacuum".to_string(),
            z: 1,
            a: 1.0,
            density: 0.0,
        });
        builder.volume(
            "World",
            Shape::Box {
                centre: Point3::origin(),
                half: Vector3::new(6.0, 6.0, 6.0),
            },
            "Vacuum",
            None,
        );
        builder.volume("Light", slab(1.0), "Foam", Some("World"));
        builder.volume("Dense", slab(3.0), "Block", Some("World"));
        let geometry = builder.build().unwrap();

        let code = isotope_code(55.845, 26);
        let sampler = VertexSampler::new(&geometry, StepLimits::default(), 1e-3);
        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::x()).unwrap();
        let total = sampler.weighted_length(&ray, code).unwrap();
        assert!((total - 11.0).abs() < 1e-6, "weighted length {}", total);

        let mut rng = StdRng::seed_from_u64(8);
        let draws = 1000;
        let dense = (0..draws)
            .map(|_| {
                sampler
                    .sample(&ray.origin, ray.direction(), code, &mut rng)
                    .unwrap()
            })
            .filter(|vertex| vertex.x > 3.0)
            .count();
        let fraction = dense as f64 / draws as f64;
        assert!(
            (fraction - 10.0 / 11.0).abs() < 0.04,
            "dense fraction {}",
            fraction
        );
    }

    #[test]
    fn ray_missing_target_fails() {
        let geometry = slabs();
        let sampler = VertexSampler::new(&geometry, StepLimits::sampling(), 1e-3);
        let mut rng = StdRng::seed_from_u64(1);
        let result = sampler.sample(&Point3::new(-10.0, 0.0, 0.0), &Vector3::y(), lead(), &mut rng);
        assert!(matches!(result, Err(GeomError::NoTargetAlongRay(_))));
    }
}

pub struct VertexSampler<'a, G: GeometryService + ?Sized> {
    geometry: &'a G,
    limits: StepLimits,
    vertex_step: f64,
}

impl<'a, G: GeometryService + ?Sized> VertexSampler<'a, G> {
    pub fn new(geometry: &'a G, limits: StepLimits, vertex_step: f64) -> Self {
        let vertex_step = if vertex_step > 0.0 {
            vertex_step
        } else {
            DEFAULT_VERTEX_STEP
        };
        Self {
            geometry,
            limits,
            vertex_step,
        }
    }

    /// Draws a vertex in material containing `code` along the ray, with
    /// probability proportional to density.
    pub fn sample<R: Rng>(
        &self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        code: i32,
        rng: &mut R,
    ) -> Result<Point3<f64>, GeomError> {
        let ray = Ray::new(*origin, *dir)?;
        let total = self.weighted_length(&ray, code)?;
        if total <= 0.0 {
            return Err(GeomError::NoTargetAlongRay(code));
        }

        let threshold = rng.random::<f64>() * total;
        debug!(
            "vertex threshold {:.6} of weighted length {:.6}",
            threshold, total
        );
        self.locate(&ray, code, threshold)
    }

    /// Sum of `step * density` over the steps through material containing `code`.
    pub fn weighted_length(&self, ray: &Ray, code: i32) -> Result<f64, GeomError> {
        let stepper = Stepper::new(self.geometry, self.limits);
        let mut total = 0.0;
        stepper.walk(ray, |material, step| {
            if material.contains_isotope(code) {
                total += step * material.density();
            }
            Ok(())
        })?;
        Ok(total)
    }

    /// Marches the ray in fixed increments through the target until the
    /// weighted length reaches `threshold`, returning the start of the
    /// increment that crossed it. Volumes without the target are crossed
    /// boundary to boundary. If the ray leaves the geometry first, the last
    /// point found inside the target is returned.
    pub fn locate(&self, ray: &Ray, code: i32, threshold: f64) -> Result<Point3<f64>, GeomError> {
        let stepper = Stepper::new(self.geometry, self.limits);
        let mut ray = ray.clone();

        let mut jumps = 0;
        while self.geometry.locate(&ray.origin).is_none() {
            if jumps >= self.limits.max_steps {
                return Err(GeomError::NoTargetAlongRay(code));
            }
            let boundary = self
                .geometry
                .next_boundary(&ray.origin, ray.direction())
                .ok_or(GeomError::NoTargetAlongRay(code))?;
            ray.advance(boundary.distance);
            jumps += 1;
        }

        let mut accumulated = 0.0;
        let mut last_in_target = None;
        while let Some(volume) = self.geometry.locate(&ray.origin) {
            let material = self.geometry.material_of(volume);
            if !material.contains_isotope(code) {
                if jumps >= self.limits.max_steps {
                    break;
                }
                match stepper.step_to_boundary(&ray.origin, ray.direction())? {
                    Some(step) => ray.advance(step),
                    None => break,
                }
                jumps += 1;
                continue;
            }

            last_in_target = Some(ray.origin);
            accumulated += self.vertex_step * material.density();
            if accumulated >= threshold {
                return Ok(ray.origin);
            }
            ray.advance(self.vertex_step);
        }

        debug!(
            "locate pass left the target at weighted length {:.6} below threshold {:.6}",
            accumulated, threshold
        );
        last_in_target.ok_or(GeomError::NoTargetAlongRay(code))
    }
}
