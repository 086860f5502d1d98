//! Solid shapes that volumes are made of.
//!
//! Every shape answers the two questions the navigator asks: does it contain
//! a point, and where along a ray is its next surface crossing. Shapes are
//! placed in global coordinates.

use nalgebra::{Point3, Vector3};

use crate::error::GeomError;
use crate::geom::Mesh;


/// Parallel-ray threshold for slab and cap tests.
const AXIS_EPSILON: f64 = 1e-15;

/// Axis-aligned box given by half-widths `(dx, dy, dz)` around an origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub half: Vector3<f64>,
    pub origin: Point3<f64>,
}

impl BoundingBox {
    pub fn from_corners(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            half: (max - min) / 2.0,
            origin: nalgebra::center(&min, &max),
        }
    }

    pub fn min(&self) -> Point3<f64> {
        self.origin - self.half
    }

    pub fn max(&self) -> Point3<f64> {
        self.origin + self.half
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| (point[i] - self.origin[i]).abs() <= self.half[i])
    }
}

/// A solid.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box {
        centre: Point3<f64>,
        half: Vector3<f64>,
    },
    Sphere {
        centre: Point3<f64>,
        radius: f64,
    },
    /// Cylindrical shell along z. `rmin = 0` gives a solid cylinder.
    Tube {
        centre: Point3<f64>,
        rmin: f64,
        rmax: f64,
        half_z: f64,
    },
    Mesh(Mesh),
}

impl Shape {
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        match self {
            Shape::Box { centre, half } => (0..3).all(|i| (point[i] - centre[i]).abs() <= half[i]),
            Shape::Sphere { centre, radius } => (point - centre).norm_squared() <= radius * radius,
            Shape::Tube {
                centre,
                rmin,
                rmax,
                half_z,
            } => {
                let local = point - centre;
                let rho2 = local.x * local.x + local.y * local.y;
                local.z.abs() <= *half_z && rho2 <= rmax * rmax && rho2 >= rmin * rmin
            }
            Shape::Mesh(mesh) => mesh.contains(point),
        }
    }

    /// Smallest distance along `dir` from `origin`, strictly greater than
    /// `min_distance`, at which the ray crosses the shape's surface.
    pub fn nearest_crossing(
        &self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        min_distance: f64,
    ) -> Option<f64> {
        match self {
            Shape::Box { centre, half } => {
                slab_crossings(origin, dir, &(centre - half), &(centre + half))
                    .into_iter()
                    .flatten()
                    .filter(|&t| t > min_distance)
                    .min_by(|a, b| a.total_cmp(b))
            }
            Shape::Sphere { centre, radius } => sphere_crossings(origin, dir, centre, *radius)
                .into_iter()
                .flatten()
                .filter(|&t| t > min_distance)
                .min_by(|a, b| a.total_cmp(b)),
            Shape::Tube {
                centre,
                rmin,
                rmax,
                half_z,
            } => tube_crossings(origin, dir, centre, *rmin, *rmax, *half_z)
                .into_iter()
                .filter(|&t| t > min_distance)
                .min_by(|a, b| a.total_cmp(b)),
            Shape::Mesh(mesh) => mesh.nearest_crossing(origin, dir, min_distance),
        }
    }

    /// Rejects non-finite placements and empty or inverted extents.
    pub fn validate(&self) -> Result<(), GeomError> {
        let positive = |x: f64| x.is_finite() && x > 0.0;
        let problem = match self {
            Shape::Box { centre, half } => {
                if !centre.iter().all(|c| c.is_finite()) {
                    Some("box centre is not finite".to_string())
                } else if !half.iter().all(|&h| positive(h)) {
                    Some(format!("box half-widths {:?} must be positive", half.as_slice()))
                } else {
                    None
                }
            }
            Shape::Sphere { centre, radius } => {
                if !centre.iter().all(|c| c.is_finite()) {
                    Some("sphere centre is not finite".to_string())
                } else if !positive(*radius) {
                    Some(format!("sphere radius {} must be positive", radius))
                } else {
                    None
                }
            }
            Shape::Tube {
                centre,
                rmin,
                rmax,
                half_z,
            } => {
                if !centre.iter().all(|c| c.is_finite()) {
                    Some("tube centre is not finite".to_string())
                } else if !positive(*rmax) || !positive(*half_z) {
                    Some(format!(
                        "tube rmax {} and half_z {} must be positive",
                        rmax, half_z
                    ))
                } else if !rmin.is_finite() || *rmin < 0.0 || rmin >= rmax {
                    Some(format!("tube rmin {} must lie in [0, {})", rmin, rmax))
                } else {
                    None
                }
            }
            Shape::Mesh(_) => None,
        };

        match problem {
            Some(reason) => Err(GeomError::Description(reason)),
            None => Ok(()),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Shape::Box { centre, half } => BoundingBox {
                half: *half,
                origin: *centre,
            },
            Shape::Sphere { centre, radius } => BoundingBox {
                half: Vector3::repeat(*radius),
                origin: *centre,
            },
            Shape::Tube {
                centre,
                rmax,
                half_z,
                ..
            } => BoundingBox {
                half: Vector3::new(*rmax, *rmax, *half_z),
                origin: *centre,
            },
            Shape::Mesh(mesh) => {
                let (min, max) = mesh.bounds();
                BoundingBox::from_corners(min, max)
            }
        }
    }
}

/// Entry and exit distances of a ray through an axis-aligned box.
fn slab_crossings(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    min: &Point3<f64>,
    max: &Point3<f64>,
) -> [Option<f64>; 2] {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for i in 0..3 {
        if dir[i].abs() < AXIS_EPSILON {
            if origin[i] < min[i] || origin[i] > max[i] {
                return [None, None];
            }
            continue;
        }
        let t1 = (min[i] - origin[i]) / dir[i];
        let t2 = (max[i] - origin[i]) / dir[i];
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    if t_near > t_far {
        return [None, None];
    }
    [Some(t_near), Some(t_far)]
}

fn sphere_crossings(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    centre: &Point3<f64>,
    radius: f64,
) -> [Option<f64>; 2] {
    let oc = origin - centre;
    let a = dir.norm_squared();
    let b = dir.dot(&oc);
    let c = oc.norm_squared() - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return [None, None];
    }
    let root = disc.sqrt();
    [Some((-b - root) / a), Some((-b + root) / a)]
}

/// All crossings of the lateral walls and end caps of a tube.
fn tube_crossings(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    centre: &Point3<f64>,
    rmin: f64,
    rmax: f64,
    half_z: f64,
) -> Vec<f64> {
    let local = origin - centre;
    let mut crossings = Vec::with_capacity(6);

    let a = dir.x * dir.x + dir.y * dir.y;
    if a > AXIS_EPSILON {
        let b = dir.x * local.x + dir.y * local.y;
        let rho2 = local.x * local.x + local.y * local.y;
        for radius in [rmin, rmax] {
            if radius <= 0.0 {
                continue;
            }
            let disc = b * b - a * (rho2 - radius * radius);
            if disc < 0.0 {
                continue;
            }
            let root = disc.sqrt();
            for t in [(-b - root) / a, (-b + root) / a] {
                let z = local.z + t * dir.z;
                if z.abs() <= half_z {
                    crossings.push(t);
                }
            }
        }
    }

    if dir.z.abs() > AXIS_EPSILON {
        for cap in [-half_z, half_z] {
            let t = (cap - local.z) / dir.z;
            let x = local.x + t * dir.x;
            let y = local.y + t * dir.y;
            let rho2 = x * x + y * y;
            if rho2 <= rmax * rmax && rho2 >= rmin * rmin {
                crossings.push(t);
            }
        }
    }

    crossings
}
