//! The geometry service contract.
//!
//! The path-length engine never looks at shapes directly. It asks a
//! [`GeometryService`] where a point is, what the volume there is made of and
//! how far the next boundary lies along a ray. [`crate::geometry::Geometry`]
//! is the built-in implementation; anything else honouring the same contract
//! can be analysed too.

use nalgebra::{Point3, Vector3};

use crate::material::Material;
use crate::shape::BoundingBox;

/// Index of a volume within its geometry.
pub type VolumeId = usize;

/// Result of a next-boundary query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    /// Distance along the ray to a point just past the boundary.
    pub distance: f64,
    /// Whether the point past the boundary lies in a different volume (or
    /// outside every volume) than the query point.
    pub entering: bool,
}

pub trait GeometryService {
    /// Outermost volume of the geometry.
    fn master_volume(&self) -> VolumeId;

    fn num_volumes(&self) -> usize;

    fn volume_name(&self, volume: VolumeId) -> &str;

    fn find_volume(&self, name: &str) -> Option<VolumeId>;

    /// Deepest volume containing `point`, or `None` outside the geometry.
    fn locate(&self, point: &Point3<f64>) -> Option<VolumeId>;

    fn material_of(&self, volume: VolumeId) -> &Material;

    /// Next surface crossing along `dir` from `point`, or `None` if the ray
    /// crosses no further surface.
    fn next_boundary(&self, point: &Point3<f64>, dir: &Vector3<f64>) -> Option<Boundary>;

    fn bounding_box(&self, volume: VolumeId) -> BoundingBox;
}
