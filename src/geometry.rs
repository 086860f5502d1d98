//! A tree of named volumes implementing [`GeometryService`].
//!
//! Geometries are described in TOML:
//!
//! ```toml
//! [[materials]]
//! kind = "element"
//! name = "Lead"
//! z = 82
//! a = 207.2
//! density = 11.35
//!
//! [[volumes]]
//! name = "World"
//! material = "Air"
//! shape = { type = "box", centre = [0.0, 0.0, 0.0], half = [5.0, 5.0, 5.0] }
//!
//! [[volumes]]
//! name = "Target"
//! material = "Lead"
//! parent = "World"
//! shape = { type = "sphere", centre = [0.0, 0.0, 0.0], radius = 1.0 }
//! ```
//!
//! Mesh volumes reference OBJ files relative to the description file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

use crate::config::{BOUNDARY_PUSH, SURFACE_TOLERANCE};
use crate::containment::ContainmentGraph;
use crate::error::GeomError;
use crate::geom::Mesh;
use crate::material::Material;
use crate::navigator::{Boundary, GeometryService, VolumeId};
use crate::shape::{BoundingBox, Shape};


#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ShapeDescriptor {
    Box {
        centre: [f64; 3],
        half: [f64; 3],
    },
    Sphere {
        centre: [f64; 3],
        radius: f64,
    },
    Tube {
        centre: [f64; 3],
        #[serde(default)]
        rmin: f64,
        rmax: f64,
        half_z: f64,
    },
    Mesh {
        file: PathBuf,
        #[serde(default)]
        offset: [f64; 3],
    },
}

impl ShapeDescriptor {
    fn into_shape(self, base_dir: &Path) -> Result<Shape, GeomError> {
        let shape = match self {
            ShapeDescriptor::Box { centre, half } => Shape::Box {
                centre: Point3::from(centre),
                half: Vector3::from(half),
            },
            ShapeDescriptor::Sphere { centre, radius } => Shape::Sphere {
                centre: Point3::from(centre),
                radius,
            },
            ShapeDescriptor::Tube {
                centre,
                rmin,
                rmax,
                half_z,
            } => Shape::Tube {
                centre: Point3::from(centre),
                rmin,
                rmax,
                half_z,
            },
            ShapeDescriptor::Mesh { file, offset } => {
                let path = if file.is_absolute() {
                    file
                } else {
                    base_dir.join(file)
                };
                Shape::Mesh(Mesh::from_file(&path, Vector3::from(offset))?)
            }
        };
        Ok(shape)
    }
}

#[derive(Debug, Deserialize)]
struct VolumeDescriptor {
    name: String,
    material: String,
    parent: Option<String>,
    shape: ShapeDescriptor,
}

#[derive(Debug, Deserialize)]
struct GeometryDescriptor {
    materials: Vec<Material>,
    volumes: Vec<VolumeDescriptor>,
}

/// A placed solid with its material.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    pub shape: Shape,
    material: usize,
}

/// Volume tree with a single master volume.
#[derive(Debug, Clone)]
pub struct Geometry {
    volumes: Vec<Volume>,
    materials: Vec<Material>,
    containment: ContainmentGraph,
    master: VolumeId,
}

impl Geometry {
    /// Loads a TOML geometry description.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GeomError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let geometry = Self::from_toml(&text, base_dir)?;
        info!(
            "loaded geometry {} with {} volumes and {} materials",
            path.display(),
            geometry.volumes.len(),
            geometry.materials.len()
        );
        Ok(geometry)
    }

    /// Parses a TOML description. Mesh files are resolved against `base_dir`.
    pub fn from_toml(text: &str, base_dir: &Path) -> Result<Self, GeomError> {
        let descriptor: GeometryDescriptor = toml::from_str(text)?;

        let mut builder = GeometryBuilder::new();
        for material in descriptor.materials {
            builder.material(material);
        }
        for volume in descriptor.volumes {
            let shape = volume.shape.into_shape(base_dir)?;
            builder.volume(&volume.name, shape, &volume.material, volume.parent.as_deref());
        }
        builder.build()
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn containment(&self) -> &ContainmentGraph {
        &self.containment
    }
}

impl GeometryService for Geometry {
    fn master_volume(&self) -> VolumeId {
        self.master
    }

    fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    fn volume_name(&self, volume: VolumeId) -> &str {
        &self.volumes[volume].name
    }

    fn find_volume(&self, name: &str) -> Option<VolumeId> {
        self.volumes.iter().position(|v| v.name == name)
    }

    fn locate(&self, point: &Point3<f64>) -> Option<VolumeId> {
        if !self.volumes[self.master].shape.contains(point) {
            return None;
        }
        let mut current = self.master;
        while let Some(&daughter) = self
            .containment
            .daughters(current)
            .iter()
            .find(|&&d| self.volumes[d].shape.contains(point))
        {
            current = daughter;
        }
        Some(current)
    }

    fn material_of(&self, volume: VolumeId) -> &Material {
        &self.materials[self.volumes[volume].material]
    }

    fn next_boundary(&self, point: &Point3<f64>, dir: &Vector3<f64>) -> Option<Boundary> {
        let t = self
            .volumes
            .iter()
            .filter_map(|v| v.shape.nearest_crossing(point, dir, SURFACE_TOLERANCE))
            .min_by(|a, b| a.total_cmp(b))?;

        let distance = t + BOUNDARY_PUSH;
        let beyond = point + dir * distance;
        Some(Boundary {
            distance,
            entering: self.locate(&beyond) != self.locate(point),
        })
    }

    fn bounding_box(&self, volume: VolumeId) -> BoundingBox {
        self.volumes[volume].shape.bounding_box()
    }
}

struct PendingVolume {
    name: String,
    shape: Shape,
    material: String,
    parent: Option<String>,
}

/// Assembles a [`Geometry`] from materials and volumes referring to each
/// other by name.
#[derive(Default)]
pub struct GeometryBuilder {
    materials: Vec<Material>,
    volumes: Vec<PendingVolume>,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(&mut self, material: Material) -> &mut Self {
        self.materials.push(material);
        self
    }

    pub fn volume(
        &mut self,
        name: &str,
        shape: Shape,
        material: &str,
        parent: Option<&str>,
    ) -> &mut Self {
        self.volumes.push(PendingVolume {
            name: name.to_string(),
            shape,
            material: material.to_string(),
            parent: parent.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> Result<Geometry, GeomError> {
        if self.volumes.is_empty() {
            return Err(GeomError::Description(
                "geometry has no volumes".to_string(),
            ));
        }

        let mut material_index = HashMap::new();
        for (i, material) in self.materials.iter().enumerate() {
            material.validate()?;
            if material_index.insert(material.name().to_string(), i).is_some() {
                return Err(GeomError::Description(format!(
                    "material '{}' is defined twice",
                    material.name()
                )));
            }
        }

        let mut volume_index = HashMap::new();
        for (i, volume) in self.volumes.iter().enumerate() {
            volume.shape.validate().map_err(|err| match err {
                GeomError::Description(reason) => {
                    GeomError::Description(format!("volume '{}': {}", volume.name, reason))
                }
                other => other,
            })?;
            if volume_index.insert(volume.name.clone(), i).is_some() {
                return Err(GeomError::Description(format!(
                    "volume '{}' is defined twice",
                    volume.name
                )));
            }
        }

        let mut containment = ContainmentGraph::new(self.volumes.len());
        for (i, volume) in self.volumes.iter().enumerate() {
            if let Some(parent) = &volume.parent {
                let parent_id = *volume_index
                    .get(parent)
                    .ok_or_else(|| GeomError::MissingVolume(parent.clone()))?;
                containment.set_parent(i, parent_id)?;
            }
        }

        let roots = containment.roots();
        if roots.len() != 1 {
            return Err(GeomError::Description(format!(
                "expected a single master volume, found {}",
                roots.len()
            )));
        }
        let master = roots[0];

        let volumes = self
            .volumes
            .into_iter()
            .map(|v| {
                let material = *material_index.get(&v.material).ok_or_else(|| {
                    GeomError::Description(format!(
                        "volume '{}' uses undefined material '{}'",
                        v.name, v.material
                    ))
                })?;
                Ok(Volume {
                    name: v.name,
                    shape: v.shape,
                    material,
                })
            })
            .collect::<Result<Vec<_>, GeomError>>()?;

        debug!(
            "built geometry with master volume '{}'",
            volumes[master].name
        );

        Ok(Geometry {
            volumes,
            materials: self.materials,
            containment,
            master,
        })
    }
}
