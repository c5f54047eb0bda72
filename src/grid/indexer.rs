//! Mapping between world coordinates, integer lattice indices and hash keys

use crate::aabb::BoundingBox;
use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// Packed lattice index, `x + y·M + z·M²`.
pub type HashKey = u64;

/// Cells between the bounding box minimum and lattice index zero.
pub(crate) const LATTICE_PADDING: i64 = 2;

/// Voxel widths added to the longest side when deriving the key base `M`.
const KEY_MARGIN: Real = 5.0;

/// Integer position of a cell on the uniform grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticeIndex {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl LatticeIndex {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Saturates, so indices of far-away points never wrap back onto the lattice.
    #[inline]
    pub const fn offset(&self, [dx, dy, dz]: [i64; 3]) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy), self.z.saturating_add(dz))
    }
}

/// Converts between world space and the lattice, and packs lattice indices into keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelIndexer {
    origin: Point3<Real>,
    voxel_size: Real,
    max_index: i64,
}

impl VoxelIndexer {
    /// Indexer for a grid covering `bbox`, with lattice index zero sitting
    /// [`LATTICE_PADDING`] voxels below the box minimum.
    ///
    /// A non-positive or non-finite voxel size yields an indexer that hashes nothing.
    pub fn new(bbox: &BoundingBox, voxel_size: Real) -> Self {
        let usable =
            voxel_size.is_finite() && voxel_size > 0.0 && bbox.mins.iter().all(|c| c.is_finite());
        if !usable {
            return Self {
                origin: Point3::origin(),
                voxel_size,
                max_index: 0,
            };
        }

        let origin = bbox.mins - Vector3::repeat(LATTICE_PADDING as Real * voxel_size);
        let bound = ((bbox.longest_side() + KEY_MARGIN * voxel_size) / voxel_size).ceil();
        // M³ must fit the key type.
        let max_index = if bound.is_finite() && bound < 2_097_152.0 {
            bound as i64
        } else {
            0
        };

        Self {
            origin,
            voxel_size,
            max_index,
        }
    }

    #[inline]
    pub const fn origin(&self) -> Point3<Real> {
        self.origin
    }

    #[inline]
    pub const fn voxel_size(&self) -> Real {
        self.voxel_size
    }

    /// The key base `M`; zero when the indexer is unusable.
    #[inline]
    pub const fn max_index(&self) -> i64 {
        self.max_index
    }

    /// Floor-divide a world coordinate onto the lattice. NaN coordinates produce
    /// indices that never hash.
    pub fn to_lattice_index(&self, point: &Point3<Real>) -> LatticeIndex {
        let rel = (point - self.origin) / self.voxel_size;
        LatticeIndex::new(
            to_index(rel.x.floor()),
            to_index(rel.y.floor()),
            to_index(rel.z.floor()),
        )
    }

    /// World position of the lattice point `index + offset`, `offset` in voxel units.
    #[inline]
    pub fn lattice_position(&self, index: LatticeIndex, offset: Vector3<Real>) -> Point3<Real> {
        let v = Vector3::new(index.x as Real, index.y as Real, index.z as Real) + offset;
        self.origin + v * self.voxel_size
    }

    /// Center of the cell spanning `[index, index + 1]` on every axis.
    #[inline]
    pub fn cell_center(&self, index: LatticeIndex) -> Point3<Real> {
        self.lattice_position(index, Vector3::repeat(0.5))
    }

    /// Pack an index into a key, `None` outside `[0, M)` on any axis. Restricting the
    /// range this way is what keeps keys collision free.
    #[inline]
    pub const fn hash(&self, index: LatticeIndex) -> Option<HashKey> {
        let m = self.max_index;
        let below = index.x < 0 || index.y < 0 || index.z < 0;
        if below || index.x >= m || index.y >= m || index.z >= m {
            return None;
        }
        let m = m as u64;
        Some(index.x as u64 + index.y as u64 * m + index.z as u64 * m * m)
    }

    /// Inverse of [`VoxelIndexer::hash`].
    pub const fn unhash(&self, key: HashKey) -> Option<LatticeIndex> {
        if self.max_index <= 0 {
            return None;
        }
        let m = self.max_index as u64;
        let z = key / (m * m);
        if z >= m {
            return None;
        }
        let rem = key % (m * m);
        Some(LatticeIndex::new((rem % m) as i64, (rem / m) as i64, z as i64))
    }
}

#[inline]
fn to_index(v: Real) -> i64 {
    // `as` saturates and maps NaN to zero; route NaN to an index no key accepts
    if v.is_nan() { i64::MIN } else { v as i64 }
}
