//! End-to-end surface reconstruction from a point cloud

use crate::errors::GridResult;
use crate::float_types::Real;
use crate::grid::{GridConfig, SpatialHashGrid};
use crate::mesh::TriangleMesh;
use crate::traits::DistanceField;
use nalgebra::Point3;
use tracing::info;

/// Reconstruct a triangle mesh from `points`.
///
/// A grid is sized to the bounding box of the samples, one cell (plus its neighbors
/// when extruding) is seeded per sample, `field` is evaluated at every lattice point,
/// and the zero level set is extracted with marching cubes.
///
/// # Example
/// ```
/// use isogrid::{CellSize, GridConfig, float_types::Real, reconstruct};
/// use nalgebra::Point3;
///
/// // samples on a unit sphere
/// let points: Vec<Point3<Real>> = (0..200)
///     .map(|i| {
///         let t = i as Real * 0.7;
///         let z = 1.0 - 2.0 * (i as Real + 0.5) / 200.0;
///         let r = (1.0 - z * z).sqrt();
///         Point3::new(r * t.cos(), r * t.sin(), z)
///     })
///     .collect();
/// let config = GridConfig { cell_size: CellSize::Absolute(0.25), ..GridConfig::default() };
/// let mesh = reconstruct(&points, &config, &|p: &Point3<Real>| p.coords.norm() - 1.0).unwrap();
/// assert!(mesh.num_triangles() > 0);
/// ```
pub fn reconstruct<F>(
    points: &[Point3<Real>],
    config: &GridConfig,
    field: &F,
) -> GridResult<TriangleMesh>
where
    F: DistanceField + ?Sized,
{
    let mut grid = SpatialHashGrid::from_points(points, config);
    for p in points {
        grid.add_point(p, Real::NAN)?;
    }
    grid.calc_distance_values(field);

    let mut mesh = TriangleMesh::new();
    grid.extract_surface(&mut mesh)?;
    info!(
        samples = points.len(),
        cells = grid.num_cells(),
        duplicates = grid.num_duplicate_cells(),
        triangles = mesh.num_triangles(),
        "reconstructed surface"
    );
    Ok(mesh)
}
