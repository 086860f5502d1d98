use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use nugeom::analyzer::{GeomAnalyzer, VolumeGeomAnalyzer};
use nugeom::geometry::Geometry;
use nugeom::max_path::MaxPathSampling;
use nugeom::navigator::GeometryService;
use nugeom::output::{self, MaxPathTable, PathLengthRecord, VertexRecord};
use nugeom::point_geom::PointGeomAnalyzer;
use nugeom::settings::{self, Mode, Settings};
use nugeom::stepper::StepLimits;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    info!("{}", settings);

    let directory = PathBuf::from(&settings.directory);
    fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create output directory {}", directory.display()))?;

    if settings.has_geometry_file() {
        let mut analyzer = volume_analyzer(&settings)?;
        let top_volume = analyzer
            .geometry()
            .volume_name(analyzer.top_volume())
            .to_string();
        run(&settings, &mut analyzer, &directory, &top_volume)
    } else {
        let mut analyzer = PointGeomAnalyzer::parse(&settings.geometry)
            .context("geometry is neither a .toml description nor a target mix")?;
        run(&settings, &mut analyzer, &directory, "(point)")
    }
}

/// Resolves a path from the configuration against the working directory,
/// falling back to the project root.
fn resolve(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if path.is_absolute() || path.exists() {
        return Ok(path);
    }
    Ok(settings::retrieve_project_root()?.join(path))
}

fn volume_analyzer(settings: &Settings) -> Result<VolumeGeomAnalyzer> {
    let path = resolve(&settings.geometry)?;
    let geometry = Geometry::from_file(&path)
        .with_context(|| format!("failed to load geometry {}", path.display()))?;

    let mut analyzer = VolumeGeomAnalyzer::new(Arc::new(geometry), settings.seed);
    analyzer.set_units(settings.units()?);
    analyzer.set_sampling(MaxPathSampling {
        points_per_face: settings.points_per_face,
        rays_per_point: settings.rays_per_point,
        limits: StepLimits {
            max_requeries: settings.max_requeries,
            ..StepLimits::sampling()
        },
    });
    analyzer.set_step_limits(StepLimits {
        max_steps: settings.max_steps,
        max_requeries: settings.max_requeries,
    });
    analyzer.set_vertex_step(settings.vertex_step);
    analyzer.set_show_progress(true);

    if let Some(top_volume) = &settings.top_volume {
        analyzer.set_top_volume(top_volume)?;
    }
    if let Some(file) = &settings.max_path_file {
        let table = output::read_max_path_lengths(resolve(file)?)
            .with_context(|| format!("failed to read max path table {}", file))?;
        info!("using max path lengths generated {}", table.generated);
        analyzer.set_max_path_lengths(table.lengths)?;
    }

    Ok(analyzer)
}

fn run<A: GeomAnalyzer>(
    settings: &Settings,
    analyzer: &mut A,
    directory: &Path,
    top_volume: &str,
) -> Result<()> {
    info!(
        "target nuclei:\n{}",
        analyzer.list_of_target_nuclei()
    );

    match settings.mode {
        Mode::PathLengths => {
            let origin = settings.origin_point();
            let direction = settings.direction_vector();
            let lengths = analyzer.compute_path_lengths(&origin, &direction)?.clone();
            info!("path lengths [m]:\n{}", lengths);

            let record = PathLengthRecord {
                origin,
                direction,
                lengths,
                weighted: analyzer.weighted_path_lengths().cloned(),
            };
            output::write_path_lengths(directory.join("path_lengths.json"), &[record])?;
        }
        Mode::MaxPath => {
            let lengths = analyzer.compute_max_path_lengths()?.clone();
            info!("max path lengths [m]:\n{}", lengths);

            let table = MaxPathTable::new(
                &settings.geometry,
                top_volume,
                settings.seed,
                settings.points_per_face,
                settings.rays_per_point,
                lengths,
            );
            output::write_max_path_lengths(directory.join("max_path_lengths.json"), &table)?;
        }
        Mode::Vertices => {
            let origin = settings.origin_point();
            let direction = settings.direction_vector();
            let target = settings
                .target
                .context("vertex mode needs a target isotope")?;

            let pb = ProgressBar::new(settings.num_vertices as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg}",
            ) {
                pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
            }
            pb.set_message("vertex".to_string());

            let mut records = Vec::with_capacity(settings.num_vertices);
            for _ in 0..settings.num_vertices {
                let record = match analyzer.generate_vertex(&origin, &direction, target) {
                    Ok(vertex) => VertexRecord::found(origin, direction, target, vertex),
                    Err(err) => {
                        warn!("vertex generation failed: {}", err);
                        VertexRecord::failed(origin, direction, target, &err.to_string())
                    }
                };
                records.push(record);
                pb.inc(1);
            }
            pb.finish_and_clear();

            let found = records.iter().filter(|r| r.vertex.is_some()).count();
            info!("generated {} of {} vertices", found, records.len());
            output::write_vertices(directory.join("vertices.json"), &records)?;
        }
    }

    Ok(())
}
