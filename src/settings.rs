use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use log::{debug, info};
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

use crate::config::{
    DEFAULT_MAX_STEPS, DEFAULT_POINTS_PER_FACE, DEFAULT_RAYS_PER_POINT, DEFAULT_VERTEX_STEP,
    MAX_BOUNDARY_REQUERIES,
};
use crate::units::Units;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let settings = load_default_config().unwrap();
        assert!(settings.points_per_face > 0);
        assert!(settings.units().is_ok());
        assert!(validate_config(&settings).is_ok());
    }

    #[test]
    fn command_line_overrides_file() {
        let mut settings = load_default_config().unwrap();
        let args = CliArgs::parse_from([
            "nugeom",
            "--mode",
            "vertices",
            "--target",
            "1000822070",
            "--origin",
            "1",
            "2",
            "3",
            "--seed",
            "9",
            "--rays-per-point",
            "10",
        ]);
        apply_cli_args(&mut settings, args);

        assert_eq!(settings.mode, Mode::Vertices);
        assert_eq!(settings.target, Some(1000822070));
        assert_eq!(settings.origin_point(), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(settings.seed, Some(9));
        assert_eq!(settings.rays_per_point, 10);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = load_default_config().unwrap();
        settings.vertex_step = 0.0;
        assert!(validate_config(&settings).is_err());

        let mut settings = load_default_config().unwrap();
        settings.direction = [0.0, 0.0, 0.0];
        assert!(validate_config(&settings).is_err());

        let mut settings = load_default_config().unwrap();
        settings.mode = Mode::Vertices;
        settings.target = None;
        assert!(validate_config(&settings).is_err());

        let mut settings = load_default_config().unwrap();
        settings.length_units = "furlong".to_string();
        assert!(validate_config(&settings).is_err());
    }
}

/// What the command-line driver computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Path lengths along the configured ray.
    PathLengths,
    /// Max path length table of the geometry.
    MaxPath,
    /// Interaction vertices in the target along the configured ray.
    Vertices,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::PathLengths => "path-lengths",
            Mode::MaxPath => "max-path",
            Mode::Vertices => "vertices",
        };
        write!(f, "{}", name)
    }
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Path to a TOML geometry description, or a target mix `code[weight],...`.
    pub geometry: String,
    pub top_volume: Option<String>,
    pub length_units: String,
    pub density_units: String,
    pub seed: Option<u64>,
    pub mode: Mode,
    /// Ray origin in metres.
    pub origin: [f64; 3],
    pub direction: [f64; 3],
    pub target: Option<i32>,
    #[serde(default = "default_num_vertices")]
    pub num_vertices: usize,
    #[serde(default = "default_points_per_face")]
    pub points_per_face: usize,
    #[serde(default = "default_rays_per_point")]
    pub rays_per_point: usize,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_max_requeries")]
    pub max_requeries: usize,
    #[serde(default = "default_vertex_step")]
    pub vertex_step: f64,
    /// Max path table to read instead of sampling.
    pub max_path_file: Option<String>,
    /// Output directory.
    pub directory: String,
}

fn default_num_vertices() -> usize {
    1
}

fn default_points_per_face() -> usize {
    DEFAULT_POINTS_PER_FACE
}

fn default_rays_per_point() -> usize {
    DEFAULT_RAYS_PER_POINT
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_max_requeries() -> usize {
    MAX_BOUNDARY_REQUERIES
}

fn default_vertex_step() -> f64 {
    DEFAULT_VERTEX_STEP
}

impl Settings {
    pub fn origin_point(&self) -> Point3<f64> {
        Point3::from(self.origin)
    }

    pub fn direction_vector(&self) -> Vector3<f64> {
        Vector3::from(self.direction)
    }

    pub fn units(&self) -> Result<Units> {
        Units::from_names(&self.length_units, &self.density_units)
            .context("invalid units in configuration")
    }

    /// True if `geometry` names a description file rather than a target mix.
    pub fn has_geometry_file(&self) -> bool {
        self.geometry.ends_with(".toml")
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("failed to load configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        info!("using local configuration: {}", local_config.display());
        local_config
    } else {
        info!("using default configuration: {}", default_config_file.display());
        default_config_file
    };

    let settings = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("nugeom"))
        .build()
        .context("failed to load configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    apply_cli_args(&mut config, CliArgs::parse());

    validate_config(&config)?;

    debug!("{:#?}", config);

    Ok(config)
}

/// Overrides configuration values with those given on the command line.
pub fn apply_cli_args(config: &mut Settings, args: CliArgs) {
    if let Some(geometry) = args.geometry {
        config.geometry = geometry;
    }
    if let Some(top_volume) = args.top_volume {
        config.top_volume = Some(top_volume);
    }
    if let Some(length_units) = args.length_units {
        config.length_units = length_units;
    }
    if let Some(density_units) = args.density_units {
        config.density_units = density_units;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(origin) = args.origin {
        config.origin = [origin[0], origin[1], origin[2]];
    }
    if let Some(direction) = args.direction {
        config.direction = [direction[0], direction[1], direction[2]];
    }
    if let Some(target) = args.target {
        config.target = Some(target);
    }
    if let Some(num) = args.num_vertices {
        config.num_vertices = num;
    }
    if let Some(points) = args.points_per_face {
        config.points_per_face = points;
    }
    if let Some(rays) = args.rays_per_point {
        config.rays_per_point = rays;
    }
    if let Some(steps) = args.max_steps {
        config.max_steps = steps;
    }
    if let Some(requeries) = args.max_requeries {
        config.max_requeries = requeries;
    }
    if let Some(step) = args.vertex_step {
        config.vertex_step = step;
    }
    if let Some(file) = args.max_path_file {
        config.max_path_file = Some(file);
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the NUGEOM_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
pub fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("NUGEOM_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    // Walk upward from the executable looking for a "config" subdirectory
    let exe_path = env::current_exe().context("failed to get current executable path")?;
    let mut current_dir = exe_path.parent();
    while let Some(dir) = current_dir {
        if dir.join("config").is_dir() {
            return Ok(dir.to_path_buf());
        }
        current_dir = dir.parent();
    }

    bail!("could not find project root directory; set NUGEOM_ROOT_DIR")
}

pub fn validate_config(config: &Settings) -> Result<()> {
    ensure!(!config.geometry.trim().is_empty(), "geometry must be given");
    ensure!(config.points_per_face > 0, "points per face must be positive");
    ensure!(config.rays_per_point > 0, "rays per point must be positive");
    ensure!(config.max_steps > 0, "max steps must be positive");
    ensure!(config.num_vertices > 0, "number of vertices must be positive");
    ensure!(
        config.vertex_step.is_finite() && config.vertex_step > 0.0,
        "vertex step must be positive, got {}",
        config.vertex_step
    );
    ensure!(
        config.direction.iter().all(|c| c.is_finite())
            && config.direction.iter().any(|&c| c != 0.0),
        "ray direction must be a non-zero vector"
    );
    if config.mode == Mode::Vertices {
        ensure!(config.target.is_some(), "vertex mode needs a target isotope");
    }
    config.units()?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "nugeom - path lengths and interaction vertices in detector geometries")]
pub struct CliArgs {
    /// Geometry description (.toml) or a target mix such as `1000060120[0.9],1000010010[0.1]`.
    #[arg(short, long)]
    geometry: Option<String>,

    /// Volume whose bounding box is sampled for max path lengths. Defaults to the master volume.
    #[arg(long)]
    top_volume: Option<String>,

    /// Length unit of the geometry description (km, m, cm, mm, um, nm, fm).
    #[arg(long)]
    length_units: Option<String>,

    /// Density unit of the geometry description (kg_m3, g_cm3, mg_cm3, kg_cm3).
    #[arg(long)]
    density_units: Option<String>,

    /// Random seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// What to compute.
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Ray origin in metres: x y z
    #[arg(long, num_args = 3, allow_negative_numbers = true)]
    origin: Option<Vec<f64>>,

    /// Ray direction: x y z
    #[arg(long, num_args = 3, allow_negative_numbers = true)]
    direction: Option<Vec<f64>>,

    /// Target isotope code for vertex generation.
    #[arg(short, long)]
    target: Option<i32>,

    /// Number of vertices to generate.
    #[arg(short, long)]
    num_vertices: Option<usize>,

    /// Entry points per bounding-box face for max path sampling.
    #[arg(long)]
    points_per_face: Option<usize>,

    /// Rays per entry point for max path sampling.
    #[arg(long)]
    rays_per_point: Option<usize>,

    /// Step cap of path-length walks.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Boundary re-queries allowed before a crossing counts as jitter.
    #[arg(long)]
    max_requeries: Option<usize>,

    /// Increment of the vertex locate pass, in geometry units.
    #[arg(long)]
    vertex_step: Option<f64>,

    /// Max path table to read instead of sampling.
    #[arg(long)]
    max_path_file: Option<String>,

    /// Output directory.
    #[arg(short, long)]
    dir: Option<String>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Geometry: {}
  - Top Volume: {}
  - Units: {} / {}
  - Mode: {}
  - Seed: {:?}
  - Origin: {:?}
  - Direction: {:?}
  - Target: {:?}
  - Sampling: {} points x {} rays per face
  - Vertex Step: {}
  ",
            self.geometry,
            self.top_volume.as_deref().unwrap_or("(master)"),
            self.length_units,
            self.density_units,
            self.mode,
            self.seed,
            self.origin,
            self.direction,
            self.target,
            self.points_per_face,
            self.rays_per_point,
            self.vertex_step,
        )
    }
}
