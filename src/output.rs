use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::GeomError;
use crate::path_length::PathLengthList;


/// Max path lengths with the settings that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxPathTable {
    pub generated: DateTime<Utc>,
    pub geometry: String,
    pub top_volume: String,
    pub seed: Option<u64>,
    pub points_per_face: usize,
    pub rays_per_point: usize,
    /// Lengths in metres.
    pub lengths: PathLengthList,
}

impl MaxPathTable {
    pub fn new(
        geometry: &str,
        top_volume: &str,
        seed: Option<u64>,
        points_per_face: usize,
        rays_per_point: usize,
        lengths: PathLengthList,
    ) -> Self {
        Self {
            generated: Utc::now(),
            geometry: geometry.to_string(),
            top_volume: top_volume.to_string(),
            seed,
            points_per_face,
            rays_per_point,
            lengths,
        }
    }
}

/// Path lengths along one ray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathLengthRecord {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
    pub lengths: PathLengthList,
    pub weighted: Option<PathLengthList>,
}

/// Outcome of one vertex request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
    pub target: i32,
    pub vertex: Option<Point3<f64>>,
    pub error: Option<String>,
}

impl VertexRecord {
    pub fn found(origin: Point3<f64>, direction: Vector3<f64>, target: i32, vertex: Point3<f64>) -> Self {
        Self {
            origin,
            direction,
            target,
            vertex: Some(vertex),
            error: None,
        }
    }

    pub fn failed(origin: Point3<f64>, direction: Vector3<f64>, target: i32, error: &str) -> Self {
        Self {
            origin,
            direction,
            target,
            vertex: None,
            error: Some(error.to_string()),
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), GeomError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    info!("wrote {}", path.display());
    Ok(())
}

pub fn write_max_path_lengths(path: impl AsRef<Path>, table: &MaxPathTable) -> Result<(), GeomError> {
    write_json(path.as_ref(), table)
}

pub fn read_max_path_lengths(path: impl AsRef<Path>) -> Result<MaxPathTable, GeomError> {
    let file = File::open(path.as_ref())?;
    let table = serde_json::from_reader(BufReader::new(file))?;
    Ok(table)
}

pub fn write_path_lengths(path: impl AsRef<Path>, records: &[PathLengthRecord]) -> Result<(), GeomError> {
    write_json(path.as_ref(), records)
}

pub fn write_vertices(path: impl AsRef<Path>, records: &[VertexRecord]) -> Result<(), GeomError> {
    write_json(path.as_ref(), records)
}
