use crate::float_types::{Real, tolerance};
use nalgebra::{Point3, Vector3};

/// Axis aligned bounding box of a point cloud or of a grid's spatial extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub mins: Point3<Real>,
    pub maxs: Point3<Real>,
}

impl BoundingBox {
    #[inline]
    pub const fn new(mins: Point3<Real>, maxs: Point3<Real>) -> Self {
        Self { mins, maxs }
    }

    /// An inverted box that any call to [`BoundingBox::expand_to`] replaces.
    pub fn empty() -> Self {
        Self {
            mins: Point3::new(Real::MAX, Real::MAX, Real::MAX),
            maxs: Point3::new(-Real::MAX, -Real::MAX, -Real::MAX),
        }
    }

    /// Smallest box containing every point. Non-finite points are ignored.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<Real>>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            if p.coords.iter().all(|c| c.is_finite()) {
                bbox.expand_to(p);
            }
        }
        bbox
    }

    pub fn expand_to(&mut self, p: &Point3<Real>) {
        self.mins = self.mins.inf(p);
        self.maxs = self.maxs.sup(p);
    }

    #[inline]
    pub fn extent(&self) -> Vector3<Real> {
        self.maxs - self.mins
    }

    #[inline]
    pub fn center(&self) -> Point3<Real> {
        nalgebra::center(&self.mins, &self.maxs)
    }

    /// Length of the longest side, zero for an inverted box.
    pub fn longest_side(&self) -> Real {
        self.extent().max().max(0.0)
    }

    /// True if the box is inverted, non-finite, or collapsed on every axis.
    pub fn is_degenerate(&self) -> bool {
        let extent = self.extent();
        !extent.iter().all(|c| c.is_finite() && *c >= 0.0) || extent.max() <= tolerance()
    }

    /// Grow every side shorter than `min_side` symmetrically around its midpoint.
    pub fn with_min_side(&self, min_side: Real) -> Self {
        let mut out = *self;
        let center = self.center();
        for axis in 0..3 {
            if self.maxs[axis] - self.mins[axis] < min_side {
                out.mins[axis] = center[axis] - 0.5 * min_side;
                out.maxs[axis] = center[axis] + 0.5 * min_side;
            }
        }
        out
    }

    /// Box grown by `margin` on every face.
    pub fn inflated(&self, margin: Real) -> Self {
        let m = Vector3::repeat(margin);
        Self::new(self.mins - m, self.maxs + m)
    }

    /// Strict containment: points on a face are outside.
    #[inline]
    pub fn contains_strict(&self, p: &Point3<Real>) -> bool {
        (0..3).all(|axis| p[axis] > self.mins[axis] && p[axis] < self.maxs[axis])
    }

    /// Signed distance from an interior point to the nearest face, negative outside
    /// along at least one axis.
    pub fn distance_to_boundary(&self, p: &Point3<Real>) -> Real {
        (0..3)
            .map(|axis| (p[axis] - self.mins[axis]).min(self.maxs[axis] - p[axis]))
            .fold(Real::MAX, Real::min)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
