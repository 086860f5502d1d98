//! Boundary-to-boundary ray walking.
//!
//! The stepper turns the geometry service's point queries into a sequence of
//! `(material, step)` pairs along a ray. Everything that measures matter along
//! a ray (path lengths, max-path rays, the vertex measure pass) is a visitor
//! over this walk.

use log::{debug, warn};
use nalgebra::{Point3, Vector3};

use crate::config::{DEFAULT_MAX_STEPS, MAX_BOUNDARY_REQUERIES, SAMPLING_MAX_STEPS};
use crate::error::GeomError;
use crate::material::Material;
use crate::navigator::GeometryService;
use crate::ray::Ray;


/// Bounds on a single walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLimits {
    pub max_steps: usize,
    pub max_requeries: usize,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_requeries: MAX_BOUNDARY_REQUERIES,
        }
    }
}

impl StepLimits {
    /// Limits used by the max-path and vertex sampling walks.
    pub fn sampling() -> Self {
        Self {
            max_steps: SAMPLING_MAX_STEPS,
            ..Self::default()
        }
    }
}

/// Summary of a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalkOutcome {
    pub steps: usize,
    /// Distance covered from the ray origin, including leading empty space.
    pub distance: f64,
    /// The walk hit its step cap before leaving the geometry.
    pub truncated: bool,
}

pub struct Stepper<'a, G: GeometryService + ?Sized> {
    geometry: &'a G,
    limits: StepLimits,
}

impl<'a, G: GeometryService + ?Sized> Stepper<'a, G> {
    pub fn new(geometry: &'a G, limits: StepLimits) -> Self {
        Self { geometry, limits }
    }

    pub fn limits(&self) -> StepLimits {
        self.limits
    }

    /// Distance from `point` to the next boundary that enters a different
    /// volume. Crossings that leave the located volume unchanged are stepped
    /// over and their distances summed. Returns `None` if no boundary lies
    /// ahead.
    pub fn step_to_boundary(
        &self,
        point: &Point3<f64>,
        dir: &Vector3<f64>,
    ) -> Result<Option<f64>, GeomError> {
        let mut travelled = 0.0;
        let mut cursor = *point;

        for _ in 0..=self.limits.max_requeries {
            match self.geometry.next_boundary(&cursor, dir) {
                None => return Ok((travelled > 0.0).then_some(travelled)),
                Some(boundary) => {
                    travelled += boundary.distance;
                    if boundary.entering {
                        return Ok(Some(travelled));
                    }
                    cursor = point + dir * travelled;
                }
            }
        }

        Err(GeomError::BoundaryJitter {
            requeries: self.limits.max_requeries,
            x: cursor.x,
            y: cursor.y,
            z: cursor.z,
        })
    }

    /// Walks `ray` through the geometry, handing the material and length of
    /// every step inside a volume to `visit`. Empty space before the geometry
    /// is skipped; the walk ends when the ray leaves the geometry.
    pub fn walk<F>(&self, ray: &Ray, mut visit: F) -> Result<WalkOutcome, GeomError>
    where
        F: FnMut(&Material, f64) -> Result<(), GeomError>,
    {
        let mut ray = ray.clone();
        let mut entered = false;
        let mut outcome = WalkOutcome::default();

        loop {
            if outcome.steps >= self.limits.max_steps {
                outcome.truncated = true;
                warn!(
                    "walk truncated after {} steps at ({:.4}, {:.4}, {:.4})",
                    outcome.steps, ray.origin.x, ray.origin.y, ray.origin.z
                );
                break;
            }

            let step = match self.geometry.locate(&ray.origin) {
                None if entered => break,
                None => match self.geometry.next_boundary(&ray.origin, ray.direction()) {
                    None => break,
                    Some(boundary) => boundary.distance,
                },
                Some(volume) => {
                    entered = true;
                    let step = self
                        .step_to_boundary(&ray.origin, ray.direction())?
                        .ok_or_else(|| {
                            GeomError::UnboundedVolume(self.geometry.volume_name(volume).to_string())
                        })?;
                    let material = self.geometry.material_of(volume);
                    debug!("step {:.6} through '{}'", step, material.name());
                    visit(material, step)?;
                    step
                }
            };

            ray.advance(step);
            outcome.distance += step;
            outcome.steps += 1;
        }

        Ok(outcome)
    }
}
