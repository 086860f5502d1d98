use nalgebra::{Point3, Vector3};

use crate::config::DIRECTION_DRIFT_TOLERANCE;
use crate::error::GeomError;


/// Half-line with a unit direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Result<Self, GeomError> {
        let norm = direction.norm();
        if !norm.is_finite() || norm == 0.0 {
            return Err(GeomError::DegenerateDirection);
        }
        Ok(Self {
            origin,
            direction: direction / norm,
        })
    }

    pub fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }

    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction * distance
    }

    /// Moves the origin `distance` along the ray.
    pub fn advance(&mut self, distance: f64) {
        self.origin += self.direction * distance;
        self.renormalize();
    }

    fn renormalize(&mut self) {
        if (self.direction.norm_squared() - 1.0).abs() > DIRECTION_DRIFT_TOLERANCE {
            self.direction.normalize_mut();
        }
    }
}
