//! Spatial hash grid of marching-cubes cells
//!
//! Cells are created lazily around point-cloud samples, keyed by the packed lattice
//! index of their position. Every cell shares its corner query points and its
//! edge vertices with the cells around it, so each lattice point is sampled once and
//! each surface vertex is emitted once.
//!
//! ```
//! use isogrid::{GridConfig, SpatialHashGrid, TriangleMesh, float_types::Real};
//! use nalgebra::Point3;
//!
//! let samples = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.2, 0.0)];
//! let mut grid = SpatialHashGrid::from_points(&samples, &GridConfig::default());
//! for p in &samples {
//!     grid.add_point(p, Real::NAN).unwrap();
//! }
//! grid.calc_distance_values(&|p: &Point3<Real>| p.y - 0.005);
//!
//! let mut mesh = TriangleMesh::new();
//! let vertices = grid.extract_surface(&mut mesh).unwrap();
//! assert_eq!(vertices, mesh.num_vertices());
//! ```

pub mod cell;
pub mod indexer;
pub mod io;
pub mod query_point;
pub mod tables;

pub use cell::{
    Cell, CellHandle, CornerSamples, EdgeConfidence, ExtractionState, configuration_index,
    edge_confidence, edge_intersection,
};
pub use indexer::{HashKey, LatticeIndex, VoxelIndexer};
pub use query_point::{INVALID, QueryPoint, QueryPointHandle, QueryPointStore};

use crate::aabb::BoundingBox;
use crate::errors::{GridError, GridResult};
use crate::float_types::Real;
use crate::traits::{DistanceField, SurfaceMeshSink};
use cell::TriangulationParams;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tables::{
    CORNER_OFFSETS, NEIGHBOR_OFFSETS, NUM_NEIGHBOR_SLOTS, SELF_SLOT, SHARED_VERTEX_TABLE,
    antipodal_slot,
};
use tracing::{debug, info, warn};

/// Cells whose center is closer than this many voxels to a bounding-box face are
/// flagged as duplicates.
pub const DUPLICATE_BAND: Real = 5.0;

/// No axis of a grid's bounding box is thinner than this many voxels.
pub const MIN_SIDE_VOXELS: Real = 3.0;

/// How the voxel size of a grid is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellSize {
    /// Edge length of one cell.
    Absolute(Real),
    /// Number of cells along the longest side of the bounding box.
    Divisions(usize),
}

impl CellSize {
    /// Voxel size for a bounding box whose longest side is `longest_side`.
    pub fn voxel_size(&self, longest_side: Real) -> Real {
        match *self {
            CellSize::Absolute(size) => size,
            CellSize::Divisions(n) => longest_side / n as Real,
        }
    }
}

/// Construction parameters of a [`SpatialHashGrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub cell_size: CellSize,
    /// Also create the 26 cells around every sample.
    pub extrude: bool,
    /// Place edge vertices at the interpolated zero crossing instead of the midpoint.
    pub interpolate: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: CellSize::Divisions(100),
            extrude: true,
            interpolate: true,
        }
    }
}

/// A uniform lattice of marching-cubes cells stored sparsely by hash key.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    bounding_box: BoundingBox,
    /// Cell centers must lie strictly inside this box.
    extent: BoundingBox,
    voxel_size: Real,
    extrude: bool,
    interpolate: bool,
    indexer: VoxelIndexer,
    query_points: QueryPointStore,
    cells: Vec<Cell>,
    cell_map: HashMap<HashKey, CellHandle>,
}

impl SpatialHashGrid {
    /// An empty grid covering `bounding_box`.
    ///
    /// Axes shorter than three voxels are widened symmetrically. A degenerate box or an
    /// unusable voxel size is reported and yields a grid that stays empty.
    pub fn new(bounding_box: BoundingBox, config: &GridConfig) -> Self {
        if bounding_box.is_degenerate() {
            warn!(mins = ?bounding_box.mins, maxs = ?bounding_box.maxs, "degenerate bounding box");
        }
        let voxel_size = config.cell_size.voxel_size(bounding_box.longest_side());
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            warn!(
                voxel_size,
                cell_size = ?config.cell_size,
                "unusable voxel size, grid will stay empty"
            );
        }

        let widened = widen(&bounding_box, voxel_size);
        let mut grid = Self::with_voxel_size(widened, voxel_size, config.extrude);
        grid.interpolate = config.interpolate;
        info!(
            voxel_size,
            extrude = config.extrude,
            mins = ?grid.bounding_box.mins,
            maxs = ?grid.bounding_box.maxs,
            "created spatial hash grid"
        );
        grid
    }

    /// An empty grid sized to the bounding box of `points`.
    pub fn from_points(points: &[Point3<Real>], config: &GridConfig) -> Self {
        Self::new(BoundingBox::from_points(points), config)
    }

    /// Grid over exactly `bounding_box`, without widening thin axes.
    pub(crate) fn with_voxel_size(
        bounding_box: BoundingBox,
        voxel_size: Real,
        extrude: bool,
    ) -> Self {
        let extent = bounding_box.inflated(voxel_size);
        let indexer = VoxelIndexer::new(&bounding_box, voxel_size);

        Self {
            bounding_box,
            extent,
            voxel_size,
            extrude,
            interpolate: true,
            indexer,
            query_points: QueryPointStore::new(),
            cells: Vec::new(),
            cell_map: HashMap::new(),
        }
    }

    /// Replace the bounding box, recomputing the key base.
    ///
    /// On a populated grid the new box is grown to cover the current one and its
    /// minimum is moved down onto the existing lattice, so every cell keeps its
    /// position and query points. Keys, duplicate flags and neighbor links are then
    /// re-derived from the cell centers. On error the grid is left unchanged.
    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) -> GridResult<()> {
        let mut target = widen(&bounding_box, self.voxel_size);
        if !self.cells.is_empty() {
            target = self.aligned_cover(target);
        }

        let mut rebuilt = Self::with_voxel_size(target, self.voxel_size, self.extrude);
        let placements = rebuilt.place_cells(&self.cells)?;
        self.bounding_box = rebuilt.bounding_box;
        self.extent = rebuilt.extent;
        self.indexer = rebuilt.indexer;
        self.cell_map = rebuilt.cell_map;

        if !self.cells.is_empty() {
            for (cell, (index, key, duplicate)) in self.cells.iter_mut().zip(placements) {
                cell.index = index;
                cell.key = key;
                cell.duplicate = duplicate;
            }
            self.relink_all();
            info!(
                cells = self.cells.len(),
                mins = ?self.bounding_box.mins,
                maxs = ?self.bounding_box.maxs,
                "re-keyed populated grid"
            );
        }
        Ok(())
    }

    /// `target` grown to contain the current box, with its minimum snapped down to a
    /// whole number of voxels from the current minimum.
    fn aligned_cover(&self, target: BoundingBox) -> BoundingBox {
        let mut out = target;
        out.expand_to(&self.bounding_box.mins);
        out.expand_to(&self.bounding_box.maxs);
        let anchor = self.bounding_box.mins;
        for axis in 0..3 {
            let steps = ((out.mins[axis] - anchor[axis]) / self.voxel_size).floor();
            out.mins[axis] = anchor[axis] + steps * self.voxel_size;
        }
        out
    }

    /// Lattice index, key and duplicate flag of each of `cells` on this grid's
    /// lattice. Registers every key in the cell map under the cell's handle.
    fn place_cells(
        &mut self,
        cells: &[Cell],
    ) -> GridResult<Vec<(LatticeIndex, HashKey, bool)>> {
        let mut placements: Vec<(LatticeIndex, HashKey, bool)> = Vec::with_capacity(cells.len());
        for (handle, cell) in cells.iter().enumerate() {
            let center = cell.center;
            let index = self.indexer.to_lattice_index(&center);
            let key = self.indexer.hash(index).ok_or_else(|| {
                GridError::CorruptGrid(format!("cell {handle} at {center} is outside the lattice"))
            })?;
            if let Some(previous) = self.cell_map.insert(key, handle) {
                return Err(GridError::HashCollision {
                    key,
                    existing: placements[previous].0,
                    incoming: index,
                });
            }
            placements.push((index, key, self.near_boundary(&center)));
        }
        Ok(placements)
    }

    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub const fn voxel_size(&self) -> Real {
        self.voxel_size
    }

    pub const fn extrude(&self) -> bool {
        self.extrude
    }

    pub const fn interpolate(&self) -> bool {
        self.interpolate
    }

    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
    }

    pub const fn indexer(&self) -> &VoxelIndexer {
        &self.indexer
    }

    pub const fn query_points(&self) -> &QueryPointStore {
        &self.query_points
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, handle: CellHandle) -> Option<&Cell> {
        self.cells.get(handle)
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_query_points(&self) -> usize {
        self.query_points.len()
    }

    pub fn num_duplicate_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.duplicate).count()
    }

    /// Handle of the cell at `index`, if it exists.
    pub fn find_cell(&self, index: LatticeIndex) -> Option<CellHandle> {
        self.indexer.hash(index).and_then(|key| self.cell_map.get(&key).copied())
    }

    /// Lattice index of the cell containing `point`.
    pub fn to_lattice_index(&self, point: &Point3<Real>) -> LatticeIndex {
        self.indexer.to_lattice_index(point)
    }

    /// Insert the cell containing `point` and, when extruding, its 26 neighbors.
    pub fn add_point(&mut self, point: &Point3<Real>, distance: Real) -> GridResult<usize> {
        self.add_lattice_point(self.indexer.to_lattice_index(point), distance)
    }

    /// Insert the cell at `index` and, when extruding, its 26 neighbors. Returns the
    /// number of cells created.
    ///
    /// Candidates whose center is not strictly inside the bounding box plus one voxel
    /// are skipped, as are candidates that already exist. New corners take `distance`.
    pub fn add_lattice_point(&mut self, index: LatticeIndex, distance: Real) -> GridResult<usize> {
        let limit = if self.extrude { 1 } else { 0 };
        let mut created = 0;

        for dz in -limit..=limit {
            for dy in -limit..=limit {
                for dx in -limit..=limit {
                    let candidate = index.offset([dx, dy, dz]);
                    let center = self.indexer.cell_center(candidate);
                    if !self.extent.contains_strict(&center) {
                        continue;
                    }
                    let Some(key) = self.indexer.hash(candidate) else {
                        continue;
                    };
                    if let Some(&existing) = self.cell_map.get(&key) {
                        let existing = self.cells[existing].index;
                        if existing != candidate {
                            return Err(GridError::HashCollision {
                                key,
                                existing,
                                incoming: candidate,
                            });
                        }
                        continue;
                    }
                    self.insert_cell(key, candidate, center, distance);
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    fn insert_cell(
        &mut self,
        key: HashKey,
        index: LatticeIndex,
        center: Point3<Real>,
        distance: Real,
    ) {
        let mut cell = Cell::new(key, index, center, self.near_boundary(&center));

        for (corner, shared) in SHARED_VERTEX_TABLE.iter().enumerate() {
            let existing = shared.iter().find_map(|s| {
                self.find_cell(index.offset(NEIGHBOR_OFFSETS[s.slot]))
                    .map(|n| self.cells[n].corners[s.corner])
                    .filter(|&h| h != INVALID)
            });
            cell.corners[corner] = match existing {
                Some(handle) => handle,
                None => {
                    let o = CORNER_OFFSETS[corner];
                    let offset = Vector3::new(o[0] as Real, o[1] as Real, o[2] as Real);
                    let position = self.indexer.lattice_position(index, offset);
                    self.query_points.insert(position, distance)
                },
            };
        }

        let handle = self.cells.len();
        self.cells.push(cell);
        self.cell_map.insert(key, handle);
        self.link_neighbors(handle);
    }

    fn near_boundary(&self, center: &Point3<Real>) -> bool {
        self.bounding_box.distance_to_boundary(center) < DUPLICATE_BAND * self.voxel_size
    }

    /// Connect `handle` with every existing cell around it, in both directions.
    fn link_neighbors(&mut self, handle: CellHandle) {
        let index = self.cells[handle].index;
        for slot in 0..NUM_NEIGHBOR_SLOTS {
            if slot == SELF_SLOT {
                continue;
            }
            if let Some(n) = self.find_cell(index.offset(NEIGHBOR_OFFSETS[slot])) {
                self.cells[handle].neighbors[slot] = Some(n);
                self.cells[n].neighbors[antipodal_slot(slot)] = Some(handle);
            }
        }
    }

    /// Evaluate `field` at every query point, replacing the stored distances.
    pub fn calc_distance_values<F: DistanceField + ?Sized>(&mut self, field: &F) {
        self.query_points.evaluate(field);
        debug!(query_points = self.query_points.len(), "evaluated distance field");
    }

    /// Triangulate every cell using the stored query point distances. Returns the
    /// number of vertices added to `sink`.
    ///
    /// Vertex indices are the ones `sink` hands out, so several grids can be
    /// extracted into the same mesh.
    pub fn extract_surface<M>(&mut self, sink: &mut M) -> GridResult<usize>
    where
        M: SurfaceMeshSink + ?Sized,
    {
        self.extract_with(sink, |qp| qp.distance)
    }

    /// Triangulate every cell, evaluating `field` at each corner on demand.
    pub fn extract_surface_with<F, M>(&mut self, field: &F, sink: &mut M) -> GridResult<usize>
    where
        F: DistanceField + ?Sized,
        M: SurfaceMeshSink + ?Sized,
    {
        self.extract_with(sink, |qp| field.distance(&qp.position))
    }

    fn extract_with<M, D>(&mut self, sink: &mut M, mut corner_distance: D) -> GridResult<usize>
    where
        M: SurfaceMeshSink + ?Sized,
        D: FnMut(&QueryPoint) -> Real,
    {
        for cell in &mut self.cells {
            cell.reset_extraction();
        }
        let params = TriangulationParams {
            interpolate: self.interpolate,
            voxel_size: self.voxel_size,
        };

        let mut counter = 0;
        let mut skipped = 0usize;
        for id in 0..self.cells.len() {
            if self.cells[id].state == ExtractionState::Extracted {
                continue;
            }
            let Some(samples) = self.corner_samples(id, &mut corner_distance)? else {
                skipped += 1;
                continue;
            };
            counter = cell::triangulate(&mut self.cells, id, &samples, params, counter, sink);
        }

        if skipped > 0 {
            warn!(skipped, "cells with undefined corner distances were not triangulated");
        }
        info!(cells = self.cells.len(), vertices = counter, "extracted surface");
        Ok(counter)
    }

    /// Positions and distances of the corners of `id`, `None` if any distance is not
    /// finite. A missing query point is only tolerated while the remaining corners
    /// are all outside.
    fn corner_samples<D>(
        &self,
        id: CellHandle,
        corner_distance: &mut D,
    ) -> GridResult<Option<CornerSamples>>
    where
        D: FnMut(&QueryPoint) -> Real,
    {
        let cell = &self.cells[id];
        let mut samples = CornerSamples {
            positions: [Point3::origin(); 8],
            distances: [Real::INFINITY; 8],
        };
        let mut unresolved = None;

        for (corner, &handle) in cell.corners.iter().enumerate() {
            let Some(qp) = self.query_points.get(handle) else {
                if unresolved.is_none() {
                    unresolved = Some(corner);
                }
                continue;
            };
            samples.positions[corner] = qp.position;
            let d = corner_distance(qp);
            if !d.is_finite() {
                return Ok(None);
            }
            samples.distances[corner] = d;
        }

        if let Some(corner) = unresolved {
            let configuration = configuration_index(&samples.distances);
            if configuration != 0 {
                return Err(GridError::UnresolvedCorner {
                    cell: id,
                    corner,
                    configuration,
                });
            }
            // an all-outside cell emits nothing
            return Ok(None);
        }
        Ok(Some(samples))
    }

    /// Rebuild every neighbor link from cell positions.
    pub(crate) fn relink_all(&mut self) {
        for cell in &mut self.cells {
            cell.neighbors = [None; NUM_NEIGHBOR_SLOTS];
        }
        for handle in 0..self.cells.len() {
            self.link_neighbors(handle);
        }
    }
}

fn widen(bounding_box: &BoundingBox, voxel_size: Real) -> BoundingBox {
    let inverted = bounding_box.extent().iter().any(|c| !(c.is_finite() && *c >= 0.0));
    if voxel_size.is_finite() && voxel_size > 0.0 && !inverted {
        bounding_box.with_min_side(MIN_SIDE_VOXELS * voxel_size)
    } else {
        *bounding_box
    }
}
