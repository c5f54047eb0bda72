use crate::float_types::Real;
use crate::grid::EdgeConfidence;
use nalgebra::{Point3, Vector3};

/// A signed distance to the reconstructed surface, negative inside.
///
/// How the value is estimated (plane fitting over nearest neighbours, radial basis
/// functions, an analytic shape) is up to the implementor. Any
/// `Fn(&Point3<Real>) -> Real + Send + Sync` closure is a distance field.
pub trait DistanceField: Send + Sync {
    fn distance(&self, point: &Point3<Real>) -> Real;
}

impl<F> DistanceField for F
where
    F: Fn(&Point3<Real>) -> Real + Send + Sync,
{
    #[inline]
    fn distance(&self, point: &Point3<Real>) -> Real {
        self(point)
    }
}

/// The mesh-building contract surface extraction writes into.
///
/// Vertices and normals are appended pairwise, so the `n`-th normal belongs to the
/// `n`-th vertex. Every three consecutive indices form one triangle.
pub trait SurfaceMeshSink {
    /// Append a vertex and return its index.
    fn add_vertex(&mut self, position: Point3<Real>) -> usize;

    fn add_normal(&mut self, normal: Vector3<Real>);

    /// Append one corner of a triangle.
    fn add_index(&mut self, vertex: usize);

    /// Blend a face normal into the normal stored for `vertex`.
    fn interpolate_normal(&mut self, vertex: usize, normal: Vector3<Real>);

    /// Record how reliable the last added vertex is. Ignored unless the sink cares.
    fn add_vertex_confidence(&mut self, _confidence: EdgeConfidence) {}
}
