use std::path::Path;

use nalgebra::Point3;
use nalgebra::Vector3;

use crate::error::GeomError;

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::Write;

    fn unit_cube() -> Mesh {
        Mesh::cuboid(Point3::origin(), Vector3::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn face_normal_and_midpoint() {
        let face = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ])
        .unwrap();
        assert!((face.normal - Vector3::z()).norm() < 1e-12);
        assert!((face.midpoint - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
        assert_eq!(face.num_vertices(), 4);

        let plane = face.plane();
        assert!(plane.offset.abs() < 1e-12);
    }

    #[test]
    fn degenerate_face_is_rejected() {
        let collinear = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ]);
        assert!(collinear.is_err());
        assert!(Face::new(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]).is_err());
    }

    #[test]
    fn ray_hits_face_inside_polygon_only() {
        let face = Face::new(vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ])
        .unwrap();
        let down = Vector3::new(0.0, 0.0, -1.0);
        let hit = face.intersect(&Point3::new(0.2, 0.3, 5.0), &down).unwrap();
        assert!((hit - 5.0).abs() < 1e-12);
        assert!(face.intersect(&Point3::new(1.5, 0.0, 5.0), &down).is_none());
        // parallel to the face
        assert!(face
            .intersect(&Point3::new(0.0, 0.0, 1.0), &Vector3::x())
            .is_none());
    }

    #[test]
    fn cube_mesh_containment() {
        let cube = unit_cube();
        assert_eq!(cube.num_faces(), 6);
        assert!(cube.contains(&Point3::new(0.1, -0.4, 0.9)));
        assert!(!cube.contains(&Point3::new(1.2, 0.0, 0.0)));
        assert!(!cube.contains(&Point3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn cube_mesh_crossings() {
        let cube = unit_cube();
        let origin = Point3::new(-5.0, 0.1, 0.2);
        let dir = Vector3::x();
        let first = cube.nearest_crossing(&origin, &dir, 0.0).unwrap();
        assert!((first - 4.0).abs() < 1e-12);
        let second = cube.nearest_crossing(&origin, &dir, first + 1e-9).unwrap();
        assert!((second - 6.0).abs() < 1e-12);
        assert!(cube.nearest_crossing(&origin, &-dir, 0.0).is_none());
    }

    #[test]
    fn mesh_bounds() {
        let cube = Mesh::cuboid(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.5, 1.0, 2.0)).unwrap();
        let (min, max) = cube.bounds();
        assert_eq!(min, Point3::new(0.5, 1.0, 1.0));
        assert_eq!(max, Point3::new(1.5, 3.0, 5.0));
    }

    #[test]
    fn load_obj_mesh() {
        let path = std::env::temp_dir().join(format!("nugeom_tetra_{}.obj", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4"
        )
        .unwrap();
        drop(file);

        let mesh = Mesh::from_file(&path, Vector3::zeros()).unwrap();
        assert_eq!(mesh.num_faces(), 4);
        assert!(mesh.contains(&Point3::new(0.1, 0.1, 0.1)));
        assert!(!mesh.contains(&Point3::new(0.6, 0.6, 0.6)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_obj_is_an_error() {
        let result = Mesh::from_file("does/not/exist.obj", Vector3::zeros());
        assert!(matches!(result, Err(GeomError::Mesh { .. })));
    }
}

/// Minimum length of a face normal before normalisation for the face to be
/// considered non-degenerate.
const NORMAL_LENGTH_THRESHOLD: f64 = 1e-12;
/// Minimum absolute value of the dot product between ray and face normal.
/// Rays closer to parallel than this do not intersect the face.
const PARALLEL_THRESHOLD: f64 = 1e-12;
/// Direction used for point-in-mesh parity tests, off every axis.
const PARITY_DIRECTION: [f64; 3] = [0.577_215_664_9, 0.267_949_192_4, 0.771_136_843_6];

/// Represents a plane, defined by a normal and an offset value.
/// The plane is then defined by `n . x + offset = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

/// Planar polygon on the surface of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub vertices: Vec<Point3<f64>>, // List of vertices
    pub normal: Vector3<f64>,       // Unit normal, right-handed with vertex order
    pub midpoint: Point3<f64>,      // Midpoint
}

impl Face {
    pub fn new(vertices: Vec<Point3<f64>>) -> Result<Self, GeomError> {
        if vertices.len() < 3 {
            return Err(GeomError::Description(format!(
                "face needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let normal = Self::compute_normal(&vertices)?;
        let midpoint = Self::compute_midpoint(&vertices);

        Ok(Self {
            vertices,
            normal,
            midpoint,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Newell's method, robust for non-triangular and slightly non-planar faces.
    fn compute_normal(vertices: &[Point3<f64>]) -> Result<Vector3<f64>, GeomError> {
        let mut normal = Vector3::zeros();
        for (i, current) in vertices.iter().enumerate() {
            let next = &vertices[(i + 1) % vertices.len()];
            normal.x += (current.y - next.y) * (current.z + next.z);
            normal.y += (current.z - next.z) * (current.x + next.x);
            normal.z += (current.x - next.x) * (current.y + next.y);
        }

        if normal.norm() < NORMAL_LENGTH_THRESHOLD {
            return Err(GeomError::Description(
                "face has degenerate (collinear) vertices".to_string(),
            ));
        }

        Ok(normal.normalize())
    }

    fn compute_midpoint(vertices: &[Point3<f64>]) -> Point3<f64> {
        let len = vertices.len() as f64;
        let sum = vertices
            .iter()
            .fold(Vector3::zeros(), |acc, point| acc + point.coords);

        Point3::from(sum / len)
    }

    /// Computes the plane containing the face.
    pub fn plane(&self) -> Plane {
        Plane {
            normal: self.normal,
            offset: -self.normal.dot(&self.vertices[0].coords),
        }
    }

    /// Distance along `dir` from `origin` to the face, if the ray crosses it.
    /// Negative distances (face behind the origin) are returned as well so the
    /// caller decides which half-line it cares about.
    pub fn intersect(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        let plane = self.plane();
        let denom = plane.normal.dot(dir);
        if denom.abs() < PARALLEL_THRESHOLD {
            return None;
        }
        let t = -(plane.normal.dot(&origin.coords) + plane.offset) / denom;
        let hit = origin + dir * t;

        if self.contains_projected(&hit) {
            Some(t)
        } else {
            None
        }
    }

    /// Crossing-number test of an in-plane point, projected on the plane
    /// where the face has the largest extent.
    fn contains_projected(&self, point: &Point3<f64>) -> bool {
        let n = self.normal.abs();
        let (u, v) = if n.x >= n.y && n.x >= n.z {
            (1, 2)
        } else if n.y >= n.z {
            (2, 0)
        } else {
            (0, 1)
        };

        let (px, py) = (point[u], point[v]);
        let mut inside = false;
        let count = self.vertices.len();
        for i in 0..count {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % count];
            let (ax, ay) = (a[u], a[v]);
            let (bx, by) = (b[u], b[v]);
            if (ay > py) != (by > py) {
                let x_cross = ax + (py - ay) * (bx - ax) / (by - ay);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// Closed polygonal surface enclosing a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub faces: Vec<Face>,
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Mesh {
    pub fn new(faces: Vec<Face>) -> Result<Self, GeomError> {
        if faces.len() < 4 {
            return Err(GeomError::Description(format!(
                "a closed mesh needs at least 4 faces, got {}",
                faces.len()
            )));
        }

        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for vertex in faces.iter().flat_map(|f| f.vertices.iter()) {
            min = min.inf(vertex);
            max = max.sup(vertex);
        }

        Ok(Self { faces, min, max })
    }

    /// Loads every model of a Wavefront OBJ file into one mesh, shifted by `offset`.
    pub fn from_file(path: impl AsRef<Path>, offset: Vector3<f64>) -> Result<Self, GeomError> {
        let path = path.as_ref();
        let (models, _) = tobj::load_obj(path, &tobj::LoadOptions::default()).map_err(|err| {
            GeomError::Mesh {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        })?;

        let mut faces = Vec::new();
        for model in &models {
            let mesh = &model.mesh;
            let vertices: Vec<Point3<f64>> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64) + offset)
                .collect();

            // all-triangle meshes come without arities
            let arities: Vec<usize> = if mesh.face_arities.is_empty() {
                vec![3; mesh.indices.len() / 3]
            } else {
                mesh.face_arities.iter().map(|&a| a as usize).collect()
            };

            let mut next_face = 0;
            for arity in arities {
                let end = next_face + arity;
                let face_vertices = mesh.indices[next_face..end]
                    .iter()
                    .map(|&i| vertices[i as usize])
                    .collect();
                faces.push(Face::new(face_vertices)?);
                next_face = end;
            }
        }

        Self::new(faces).map_err(|err| GeomError::Mesh {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    /// Axis-aligned cuboid with outward-facing quads.
    pub fn cuboid(centre: Point3<f64>, half: Vector3<f64>) -> Result<Self, GeomError> {
        let corner = |sx: f64, sy: f64, sz: f64| {
            centre + Vector3::new(sx * half.x, sy * half.y, sz * half.z)
        };
        let quads = [
            [(-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.), (1., -1., -1.)],
            [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
            [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
            [(-1., 1., -1.), (-1., 1., 1.), (1., 1., 1.), (1., 1., -1.)],
            [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
            [(1., -1., -1.), (1., 1., -1.), (1., 1., 1.), (1., -1., 1.)],
        ];

        let faces = quads
            .iter()
            .map(|quad| Face::new(quad.iter().map(|&(x, y, z)| corner(x, y, z)).collect()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(faces)
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Returns the min and max corners of the mesh's axis-aligned bounds.
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        (self.min, self.max)
    }

    fn in_bounds(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// Parity test: a point is inside if a ray from it crosses the surface an
    /// odd number of times.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        if !self.in_bounds(point) {
            return false;
        }
        let dir = Vector3::from(PARITY_DIRECTION).normalize();
        let crossings = self
            .faces
            .iter()
            .filter_map(|face| face.intersect(point, &dir))
            .filter(|&t| t > 0.0)
            .count();
        crossings % 2 == 1
    }

    /// Smallest crossing distance strictly greater than `min_distance`.
    pub fn nearest_crossing(
        &self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        min_distance: f64,
    ) -> Option<f64> {
        self.faces
            .iter()
            .filter_map(|face| face.intersect(origin, dir))
            .filter(|&t| t > min_distance)
            .min_by(|a, b| a.total_cmp(b))
    }
}
