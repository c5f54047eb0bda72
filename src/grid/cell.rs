//! Marching-cubes cells and per-cell triangulation

use super::indexer::{HashKey, LatticeIndex};
use super::query_point::{INVALID, QueryPointHandle};
use super::tables::{EDGE_CORNERS, EDGE_NEIGHBOR_TABLE, NUM_NEIGHBOR_SLOTS, triangles};
use crate::float_types::Real;
use crate::traits::SurfaceMeshSink;
use nalgebra::{Point3, Vector3};

/// Index of a [`Cell`] in its grid's cell arena.
pub type CellHandle = usize;

/// Whether a cell has been triangulated during the current extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionState {
    #[default]
    Pending,
    Extracted,
}

/// How trustworthy an interpolated edge vertex is.
///
/// Endpoint distances that differ by less than one voxel width are consistent with a
/// surface actually crossing the edge; a larger jump usually comes from a poorly
/// estimated distance at one of the corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeConfidence {
    High,
    Low,
}

/// One cube of the lattice.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) key: HashKey,
    pub(crate) index: LatticeIndex,
    pub(crate) center: Point3<Real>,
    pub(crate) corners: [QueryPointHandle; 8],
    pub(crate) neighbors: [Option<CellHandle>; NUM_NEIGHBOR_SLOTS],
    pub(crate) duplicate: bool,
    pub(crate) edge_vertices: [Option<usize>; 12],
    pub(crate) state: ExtractionState,
}

impl Cell {
    pub(crate) fn new(
        key: HashKey,
        index: LatticeIndex,
        center: Point3<Real>,
        duplicate: bool,
    ) -> Self {
        Self {
            key,
            index,
            center,
            corners: [INVALID; 8],
            neighbors: [None; NUM_NEIGHBOR_SLOTS],
            duplicate,
            edge_vertices: [None; 12],
            state: ExtractionState::Pending,
        }
    }

    pub const fn key(&self) -> HashKey {
        self.key
    }

    pub const fn lattice_index(&self) -> LatticeIndex {
        self.index
    }

    pub const fn center(&self) -> Point3<Real> {
        self.center
    }

    pub const fn corners(&self) -> &[QueryPointHandle; 8] {
        &self.corners
    }

    /// The cell at neighbor slot `slot`, `None` at the grid boundary.
    pub fn neighbor(&self, slot: usize) -> Option<CellHandle> {
        self.neighbors.get(slot).copied().flatten()
    }

    pub const fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    pub const fn state(&self) -> ExtractionState {
        self.state
    }

    /// Mesh vertex resolved for `edge` in the current extraction pass.
    pub fn edge_vertex(&self, edge: usize) -> Option<usize> {
        self.edge_vertices.get(edge).copied().flatten()
    }

    pub(crate) fn reset_extraction(&mut self) {
        self.edge_vertices = [None; 12];
        self.state = ExtractionState::Pending;
    }
}

/// Bit `i` is set iff corner `i` lies inside the surface (negative distance).
pub fn configuration_index(distances: &[Real; 8]) -> u8 {
    distances
        .iter()
        .enumerate()
        .filter(|(_, d)| **d < 0.0)
        .fold(0u8, |index, (i, _)| index | (1 << i))
}

/// Zero crossing of the distance along the segment `a`-`b`, or its midpoint when
/// `interpolate` is off.
pub fn edge_intersection(
    a: &Point3<Real>,
    b: &Point3<Real>,
    dist_a: Real,
    dist_b: Real,
    interpolate: bool,
) -> Point3<Real> {
    if !interpolate || dist_a == dist_b {
        return nalgebra::center(a, b);
    }
    *a + (b - a) * ((0.0 - dist_a) / (dist_b - dist_a))
}

pub fn edge_confidence(dist_a: Real, dist_b: Real, voxel_size: Real) -> EdgeConfidence {
    if (dist_a - dist_b).abs() < voxel_size {
        EdgeConfidence::High
    } else {
        EdgeConfidence::Low
    }
}

/// Corner positions and distances of one cell, in corner order.
#[derive(Debug, Clone, Copy)]
pub struct CornerSamples {
    pub positions: [Point3<Real>; 8],
    pub distances: [Real; 8],
}

/// Settings shared by every cell of an extraction pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TriangulationParams {
    pub interpolate: bool,
    pub voxel_size: Real,
}

/// Emit the triangles of cell `id` into `sink` and return `counter` advanced by the
/// number of vertices added.
///
/// Edge vertices already resolved by this cell or by one of the up to three cells
/// sharing the edge are reused; a newly created vertex takes the index returned by
/// the sink and is published into the mirrored edge slot of every sharing neighbor.
/// Triangles wind counter-clockwise seen from the positive side of the field.
pub(crate) fn triangulate<M: SurfaceMeshSink + ?Sized>(
    cells: &mut [Cell],
    id: CellHandle,
    samples: &CornerSamples,
    params: TriangulationParams,
    mut counter: usize,
    sink: &mut M,
) -> usize {
    let configuration = configuration_index(&samples.distances);
    let neighbors = cells[id].neighbors;
    let CornerSamples { positions, distances } = samples;

    for tri in triangles(configuration) {
        let mut ids = [0usize; 3];
        let mut pts = [Point3::origin(); 3];

        for (k, &edge) in tri.iter().enumerate() {
            let [a, b] = EDGE_CORNERS[edge];
            let point = edge_intersection(
                &positions[a],
                &positions[b],
                distances[a],
                distances[b],
                params.interpolate,
            );

            let shared = cells[id].edge_vertices[edge].or_else(|| {
                EDGE_NEIGHBOR_TABLE[edge]
                    .iter()
                    .find_map(|s| neighbors[s.slot].and_then(|n| cells[n].edge_vertices[s.edge]))
            });

            let vertex = match shared {
                Some(vertex) => vertex,
                None => {
                    let vertex = sink.add_vertex(point);
                    counter += 1;
                    sink.add_normal(Vector3::zeros());
                    let confidence = edge_confidence(distances[a], distances[b], params.voxel_size);
                    sink.add_vertex_confidence(confidence);

                    for s in &EDGE_NEIGHBOR_TABLE[edge] {
                        if let Some(n) = neighbors[s.slot] {
                            cells[n].edge_vertices[s.edge] = Some(vertex);
                        }
                    }
                    vertex
                },
            };

            cells[id].edge_vertices[edge] = Some(vertex);
            ids[k] = vertex;
            pts[k] = point;
        }

        // The table winds towards the inside; swap two corners to face outwards.
        let order = [0, 2, 1];
        for k in order {
            sink.add_index(ids[k]);
        }
        let normal = (pts[2] - pts[0]).cross(&(pts[1] - pts[0]));
        for k in order {
            sink.interpolate_normal(ids[k], normal);
        }
    }

    cells[id].state = ExtractionState::Extracted;
    counter
}
