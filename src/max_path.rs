//! Stochastic upper bound on the path length through each isotope.
//!
//! Rays are fired into the top volume's bounding box from random points on
//! each of its six faces, with directions biased to point into the box. The
//! longest distance any ray travels through material containing the isotope
//! is the estimate.
//!
//! Random numbers come from nested streams. Every face seeds its own stream
//! from the caller's source, and every entry point on a face seeds a stream
//! for its rays. Adding points or rays only appends rays to the ones already
//! fired, so for a fixed seed the estimate never decreases when either count
//! grows.

use log::debug;
use nalgebra::{Point3, Vector3};
use rand::{Rng, RngCore, SeedableRng};

use crate::config::{DEFAULT_POINTS_PER_FACE, DEFAULT_RAYS_PER_POINT};
use crate::error::GeomError;
use crate::navigator::{GeometryService, VolumeId};
use crate::ray::Ray;
use crate::shape::BoundingBox;
use crate::stepper::{StepLimits, Stepper};


/// Sampling counts of the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPathSampling {
    pub points_per_face: usize,
    pub rays_per_point: usize,
    pub limits: StepLimits,
}

impl Default for MaxPathSampling {
    fn default() -> Self {
        Self {
            points_per_face: DEFAULT_POINTS_PER_FACE,
            rays_per_point: DEFAULT_RAYS_PER_POINT,
            limits: StepLimits::sampling(),
        }
    }
}

/// One face of a bounding box: the axis it is normal to and which side of the
/// box it sits on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoxFace {
    axis: usize,
    side: f64,
}

impl BoxFace {
    const ALL: [BoxFace; 6] = [
        BoxFace { axis: 0, side: -1.0 },
        BoxFace { axis: 0, side: 1.0 },
        BoxFace { axis: 1, side: -1.0 },
        BoxFace { axis: 1, side: 1.0 },
        BoxFace { axis: 2, side: -1.0 },
        BoxFace { axis: 2, side: 1.0 },
    ];

    fn random_point<R: Rng>(&self, bbox: &BoundingBox, rng: &mut R) -> Point3<f64> {
        let mut point = bbox.origin;
        for axis in 0..3 {
            point[axis] += if axis == self.axis {
                self.side * bbox.half[axis]
            } else {
                bbox.half[axis] * (2.0 * rng.random::<f64>() - 1.0)
            };
        }
        point
    }

    /// Unnormalized direction with a `U(0,1)` component along the inward
    /// normal and `U(-0.5,0.5)` tangential components.
    fn inward_direction<R: Rng>(&self, rng: &mut R) -> Vector3<f64> {
        let mut dir = Vector3::zeros();
        for axis in 0..3 {
            dir[axis] = if axis == self.axis {
                -self.side * rng.random::<f64>()
            } else {
                rng.random_range(-0.5..0.5)
            };
        }
        dir
    }
}

pub struct MaxPathEstimator<'a, G: GeometryService + ?Sized> {
    geometry: &'a G,
    bbox: BoundingBox,
    sampling: MaxPathSampling,
}

impl<'a, G: GeometryService + ?Sized> MaxPathEstimator<'a, G> {
    pub fn new(geometry: &'a G, top_volume: VolumeId, sampling: MaxPathSampling) -> Self {
        Self {
            geometry,
            bbox: geometry.bounding_box(top_volume),
            sampling,
        }
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Largest length through material containing `code` over all rays.
    pub fn estimate<R: RngCore + SeedableRng>(&self, code: i32, rng: &mut R) -> f64 {
        let stepper = Stepper::new(self.geometry, self.sampling.limits);
        let mut max_length = 0.0_f64;
        let mut failed = 0_usize;

        for face in BoxFace::ALL {
            let mut face_rng = R::seed_from_u64(rng.next_u64());
            for _ in 0..self.sampling.points_per_face {
                let point = face.random_point(&self.bbox, &mut face_rng);
                let mut ray_rng = R::seed_from_u64(face_rng.next_u64());
                for _ in 0..self.sampling.rays_per_point {
                    let dir = face.inward_direction(&mut ray_rng);
                    match self.fire_ray(&stepper, point, dir, code) {
                        Ok(length) => max_length = max_length.max(length),
                        Err(err) => {
                            failed += 1;
                            debug!("skipping max-path ray from {:?}: {}", point, err);
                        }
                    }
                }
            }
        }

        if failed > 0 {
            debug!("{} max-path rays failed for isotope {}", failed, code);
        }
        max_length
    }

    fn fire_ray(
        &self,
        stepper: &Stepper<'_, G>,
        point: Point3<f64>,
        dir: Vector3<f64>,
        code: i32,
    ) -> Result<f64, GeomError> {
        let ray = Ray::new(point, dir)?;
        let mut length = 0.0;
        stepper.walk(&ray, |material, step| {
            if material.contains_isotope(code) {
                length += step;
            }
            Ok(())
        })?;
        Ok(length)
    }
}
