//! `TriangleMesh`, the indexed triangle mesh produced by surface extraction

use crate::float_types::{Real, tolerance};
use crate::grid::EdgeConfidence;
use crate::traits::SurfaceMeshSink;
use nalgebra::{Point3, Vector3};

/// An indexed triangle mesh with one normal per vertex.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    vertices: Vec<Point3<Real>>,
    normals: Vec<Vector3<Real>>,
    indices: Vec<usize>,
    confidences: Vec<EdgeConfidence>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Point3<Real>] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vector3<Real>] {
        &self.normals
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Per-vertex confidence, empty if the producer never reported any.
    pub fn confidences(&self) -> &[EdgeConfidence] {
        &self.confidences
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over triangles as vertex index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Unnormalized face normal of triangle `i` (counter-clockwise winding), `None`
    /// if there is no such triangle or it references a missing vertex.
    pub fn face_normal(&self, i: usize) -> Option<Vector3<Real>> {
        let start = i.checked_mul(3)?;
        let tri = self.indices.get(start..start.checked_add(3)?)?;
        let p0 = self.vertices.get(tri[0])?;
        let p1 = self.vertices.get(tri[1])?;
        let p2 = self.vertices.get(tri[2])?;
        Some((p1 - p0).cross(&(p2 - p0)))
    }
}

impl SurfaceMeshSink for TriangleMesh {
    fn add_vertex(&mut self, position: Point3<Real>) -> usize {
        self.vertices.push(position);
        self.vertices.len() - 1
    }

    fn add_normal(&mut self, normal: Vector3<Real>) {
        self.normals.push(normal);
    }

    fn add_index(&mut self, vertex: usize) {
        self.indices.push(vertex);
    }

    /// Running average of unit directions: the stored normal and the incoming one are
    /// both normalized before being summed, so a zero-initialized slot simply adopts
    /// the first face normal it sees.
    fn interpolate_normal(&mut self, vertex: usize, normal: Vector3<Real>) {
        let Some(current) = self.normals.get_mut(vertex) else {
            return;
        };
        let Some(incoming) = normal.try_normalize(tolerance()) else {
            return;
        };
        let sum = current.try_normalize(tolerance()).unwrap_or_else(Vector3::zeros) + incoming;
        *current = sum.try_normalize(tolerance()).unwrap_or(incoming);
    }

    fn add_vertex_confidence(&mut self, confidence: EdgeConfidence) {
        self.confidences.push(confidence);
    }
}
