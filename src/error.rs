//! Error taxonomy for geometry queries.
//!
//! Every failure of a path-length, max-path or vertex query is reported as a
//! [`GeomError`] value. Nothing in the query path panics, so callers running
//! hundreds of thousands of rays can treat a miss as an ordinary outcome.
//!
//! The variants fall into three groups:
//!
//! - configuration errors (unknown isotope, missing volume, unknown unit,
//!   malformed geometry description, runaway boundary re-queries)
//! - ray degeneracy (no target material along the ray, zero direction)
//! - I/O and parsing errors from loading descriptions and tables

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeomError {
    #[error("isotope code {0} is not part of the geometry's isotope list")]
    UnknownIsotope(i32),

    #[error("volume '{0}' does not exist in the geometry")]
    MissingVolume(String),

    #[error("ray direction must be a non-zero finite vector")]
    DegenerateDirection,

    #[error("no entering boundary confirmed after {requeries} re-queries at ({x:.6}, {y:.6}, {z:.6})")]
    BoundaryJitter {
        requeries: usize,
        x: f64,
        y: f64,
        z: f64,
    },

    #[error("volume '{0}' has no boundary along the ray")]
    UnboundedVolume(String),

    #[error("no material with isotope code {0} along the ray")]
    NoTargetAlongRay(i32),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("invalid target mix: {0}")]
    InvalidTargetMix(String),

    #[error("invalid geometry description: {0}")]
    Description(String),

    #[error("failed to load mesh '{path}': {reason}")]
    Mesh { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
