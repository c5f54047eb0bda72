//! Surface reconstruction from unorganized **point clouds**: a signed distance field is
//! sampled on a uniform lattice stored in a [spatial hash grid](grid::SpatialHashGrid), and
//! the isosurface is extracted with table-driven [marching cubes].
//!
//! [marching cubes]: https://en.wikipedia.org/wiki/Marching_cubes
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **parallel**: use rayon to evaluate the distance field at every query point
//!
//! # Example
//! ```
//! use isogrid::{GridConfig, TriangleMesh, float_types::Real, reconstruct};
//! use nalgebra::Point3;
//!
//! let points: Vec<Point3<Real>> = (0..64)
//!     .map(|i| {
//!         let t = i as Real * 0.1;
//!         Point3::new(t.cos(), t.sin(), 0.5 * t.sin())
//!     })
//!     .collect();
//! let sphere = |p: &Point3<Real>| p.coords.norm() - 1.0;
//!
//! let mesh: TriangleMesh = reconstruct(&points, &GridConfig::default(), &sphere).unwrap();
//! assert_eq!(mesh.indices().len() % 3, 0);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod errors;
pub mod float_types;
pub mod grid;
pub mod mesh;
pub mod reconstruct;
pub mod traits;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use aabb::BoundingBox;
pub use errors::{GridError, GridResult};
pub use grid::{CellSize, GridConfig, SpatialHashGrid};
pub use mesh::TriangleMesh;
pub use reconstruct::reconstruct;
pub use traits::{DistanceField, SurfaceMeshSink};
