//! Flat storage for the lattice sample points shared between cells

use crate::float_types::Real;
use crate::traits::DistanceField;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Stable index of a [`QueryPoint`] in its [`QueryPointStore`].
pub type QueryPointHandle = usize;

/// Handle of a corner that has no query point.
pub const INVALID: QueryPointHandle = QueryPointHandle::MAX;

/// A lattice position and its signed distance. `NaN` means not evaluated yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub position: Point3<Real>,
    pub distance: Real,
}

impl QueryPoint {
    pub const fn new(position: Point3<Real>, distance: Real) -> Self {
        Self { position, distance }
    }

    #[inline]
    pub fn has_distance(&self) -> bool {
        self.distance.is_finite()
    }

    /// Distance as persisted: undefined values are written as `0`.
    #[inline]
    pub fn persisted_distance(&self) -> Real {
        if self.distance.is_nan() { 0.0 } else { self.distance }
    }
}

/// Append-only owner of every query point of a grid.
#[derive(Debug, Clone, Default)]
pub struct QueryPointStore {
    points: Vec<QueryPoint>,
}

impl QueryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Append a point and return its handle. Handles are never reused or moved.
    pub fn insert(&mut self, position: Point3<Real>, distance: Real) -> QueryPointHandle {
        self.points.push(QueryPoint::new(position, distance));
        self.points.len() - 1
    }

    /// `None` for [`INVALID`] or any handle this store never issued.
    #[inline]
    pub fn get(&self, handle: QueryPointHandle) -> Option<&QueryPoint> {
        self.points.get(handle)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryPoint> {
        self.points.iter()
    }

    /// Evaluate `field` at every stored position.
    pub fn evaluate<F: DistanceField + ?Sized>(&mut self, field: &F) {
        #[cfg(not(feature = "parallel"))]
        self.points
            .iter_mut()
            .for_each(|qp| qp.distance = field.distance(&qp.position));

        #[cfg(feature = "parallel")]
        self.points
            .par_iter_mut()
            .for_each(|qp| qp.distance = field.distance(&qp.position));
    }
}
