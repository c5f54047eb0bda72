//! Test support library
//! Provides grid builders and invariant checks shared by the integration tests.
#![allow(dead_code)]

use hashbrown::HashMap;
use isogrid::{
    BoundingBox, CellSize, GridConfig, SpatialHashGrid,
    float_types::Real,
    grid::{
        INVALID,
        tables::{CORNER_OFFSETS, NEIGHBOR_OFFSETS, NUM_NEIGHBOR_SLOTS, SELF_SLOT, antipodal_slot},
    },
};
use nalgebra::Point3;

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn config(voxel_size: Real, extrude: bool) -> GridConfig {
    GridConfig {
        cell_size: CellSize::Absolute(voxel_size),
        extrude,
        interpolate: true,
    }
}

/// Grid sized to `points` with every point seeded.
pub fn seeded_grid(points: &[Point3<Real>], voxel_size: Real, extrude: bool) -> SpatialHashGrid {
    let mut grid = SpatialHashGrid::from_points(points, &config(voxel_size, extrude));
    for p in points {
        grid.add_point(p, Real::NAN).unwrap();
    }
    grid
}

/// Grid with one extruded seed per lattice cell of `bbox`, so that the whole box is covered.
pub fn filled_grid(bbox: BoundingBox, voxel_size: Real) -> SpatialHashGrid {
    let mut grid = SpatialHashGrid::new(bbox, &config(voxel_size, true));
    let steps = (bbox.longest_side() / voxel_size).ceil() as i64 + 1;
    for i in 0..=steps {
        for j in 0..=steps {
            for k in 0..=steps {
                let step = nalgebra::Vector3::new(i as Real, j as Real, k as Real);
                let p = bbox.mins + step * voxel_size;
                grid.add_point(&p, Real::NAN).unwrap();
            }
        }
    }
    grid
}

/// Points spread over a sphere along a spiral.
pub fn sphere_samples(count: usize, radius: Real) -> Vec<Point3<Real>> {
    (0..count)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as Real + 0.5) / count as Real;
            let r = (1.0 - z * z).sqrt();
            let t = i as Real * 2.399_963;
            Point3::new(r * t.cos(), r * t.sin(), z) * radius
        })
        .collect()
}

pub fn sphere(radius: Real) -> impl Fn(&Point3<Real>) -> Real + Send + Sync {
    move |p: &Point3<Real>| p.coords.norm() - radius
}

fn position_key(p: &Point3<Real>) -> [u64; 3] {
    [p.x.to_bits() as u64, p.y.to_bits() as u64, p.z.to_bits() as u64]
}

/// Every lattice position is owned by exactly one query point, and every corner
/// handle refers to a query point at the corner's position.
pub fn assert_shared_corners(grid: &SpatialHashGrid) {
    let mut owner: HashMap<[u64; 3], usize> = HashMap::new();
    for (handle, qp) in grid.query_points().iter().enumerate() {
        let previous = owner.insert(position_key(&qp.position), handle);
        assert!(
            previous.is_none(),
            "query points {previous:?} and {handle} share position {}",
            qp.position
        );
    }

    let vs = grid.voxel_size();
    for cell in grid.cells() {
        for (corner, &handle) in cell.corners().iter().enumerate() {
            let index = cell.lattice_index();
            assert_ne!(handle, INVALID, "cell {index:?} corner {corner} unresolved");
            let qp = grid.query_points().get(handle).unwrap();
            let o = CORNER_OFFSETS[corner];
            let half = nalgebra::Vector3::repeat(0.5);
            let offset = nalgebra::Vector3::new(o[0] as Real, o[1] as Real, o[2] as Real) - half;
            let expected = cell.center() + offset * vs;
            assert!(
                (qp.position - expected).norm() < 1e-6 * vs.max(1.0),
                "corner {corner} of {:?} at {} instead of {}",
                cell.lattice_index(),
                qp.position,
                expected
            );
        }
    }
}

/// Neighbor links point at the cell with the right lattice offset and are mirrored
/// by the neighbor, and no existing neighbor is left unlinked.
pub fn assert_symmetric_neighbors(grid: &SpatialHashGrid) {
    for (handle, cell) in grid.cells().iter().enumerate() {
        for slot in 0..NUM_NEIGHBOR_SLOTS {
            if slot == SELF_SLOT {
                assert_eq!(cell.neighbor(slot), None);
                continue;
            }
            let expected = grid.find_cell(cell.lattice_index().offset(NEIGHBOR_OFFSETS[slot]));
            assert_eq!(cell.neighbor(slot), expected, "slot {slot} of cell {handle}");
            if let Some(n) = cell.neighbor(slot) {
                assert_eq!(grid.cells()[n].neighbor(antipodal_slot(slot)), Some(handle));
            }
        }
    }
}

/// Cell centers stay strictly inside the bounding box grown by one voxel.
pub fn assert_bounded(grid: &SpatialHashGrid) {
    let extent = grid.bounding_box().inflated(grid.voxel_size());
    for cell in grid.cells() {
        assert!(
            extent.contains_strict(&cell.center()),
            "cell center {} outside {:?}",
            cell.center(),
            extent
        );
    }
}

/// How many triangles use each undirected mesh edge.
pub fn edge_use_counts(indices: &[usize]) -> HashMap<(usize, usize), usize> {
    let mut counts = HashMap::new();
    for tri in indices.chunks_exact(3) {
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }
    counts
}
