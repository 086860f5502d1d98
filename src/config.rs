pub const DEFAULT_POINTS_PER_FACE: usize = 200; // entry points drawn on each bounding-box face
pub const DEFAULT_RAYS_PER_POINT: usize = 200; // rays fired from each entry point
pub const SAMPLING_MAX_STEPS: usize = 100; // step cap for max-path and vertex walks
pub const DEFAULT_MAX_STEPS: usize = 10_000; // step cap for path-length walks
pub const MAX_BOUNDARY_REQUERIES: usize = 64; // re-queries allowed before a boundary counts as jittering
pub const DEFAULT_VERTEX_STEP: f64 = 1e-3; // fixed increment of the vertex locate pass, geometry units

/// Distance a boundary query point is pushed past the surface it reports.
pub const BOUNDARY_PUSH: f64 = 1e-9;
/// Surface crossings closer than this to the query point are ignored.
pub const SURFACE_TOLERANCE: f64 = 1e-12;
/// Squared-norm drift of a ray direction that triggers re-normalization.
pub const DIRECTION_DRIFT_TOLERANCE: f64 = 1e-12;
