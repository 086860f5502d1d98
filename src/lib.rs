pub mod analyzer;
pub mod config;
pub mod containment;
pub mod error;
pub mod geom;
pub mod geometry;
pub mod material;
pub mod max_path;
pub mod navigator;
pub mod output;
pub mod path_length;
pub mod pdg;
pub mod point_geom;
pub mod ray;
pub mod settings;
pub mod shape;
pub mod stepper;
pub mod units;
pub mod vertex;
