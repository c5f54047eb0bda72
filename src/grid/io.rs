//! Plain-text grid persistence.
//!
//! Two whitespace-separated layouts are written. The *plain* layout only lists the
//! query points and the corner handles of each cell:
//!
//! ```text
//! <numQueryPoints> <voxelSize> <numCells>
//! <x> <y> <z> <distance>                                 × numQueryPoints
//! <v0> … <v7>                                            × numCells
//! ```
//!
//! The *full* layout prefixes the extrusion flag and the bounding box and stores
//! enough per cell to rebuild the grid:
//!
//! ```text
//! <extrude>
//! <minX> <minY> <minZ> <maxX> <maxY> <maxZ>
//! <numQueryPoints> <voxelSize> <numCells>
//! <x> <y> <z> <distance>                                 × numQueryPoints
//! <hashKey> <v0> … <v7> <cx> <cy> <cz> <duplicate>       × numCells
//! ```
//!
//! Undefined distances are written as `0` and missing corners as `-1`. Neighbor links
//! are never stored; loading re-derives them from the cell positions.

use super::{Cell, INVALID, QueryPointHandle, SpatialHashGrid};
use crate::aabb::BoundingBox;
use crate::errors::{GridError, GridResult};
use crate::float_types::Real;
use hashbrown::hash_map::Entry;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};
use tracing::{debug, info};

impl SpatialHashGrid {
    /// Write the plain layout.
    pub fn save_grid<W: Write>(&self, writer: &mut W) -> GridResult<()> {
        self.write_points(writer)?;
        for cell in &self.cells {
            write_corners(writer, cell)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Write the full layout, readable by [`SpatialHashGrid::deserialize`].
    pub fn serialize<W: Write>(&self, writer: &mut W) -> GridResult<()> {
        writeln!(writer, "{}", u8::from(self.extrude))?;
        let (mins, maxs) = (self.bounding_box.mins, self.bounding_box.maxs);
        writeln!(writer, "{} {} {} {} {} {}", mins.x, mins.y, mins.z, maxs.x, maxs.y, maxs.z)?;
        self.write_points(writer)?;
        for cell in &self.cells {
            write!(writer, "{} ", cell.key)?;
            write_corners(writer, cell)?;
            let c = cell.center;
            writeln!(writer, " {} {} {} {}", c.x, c.y, c.z, u8::from(cell.duplicate))?;
        }
        Ok(())
    }

    fn write_points<W: Write>(&self, writer: &mut W) -> GridResult<()> {
        writeln!(writer, "{} {} {}", self.query_points.len(), self.voxel_size, self.cells.len())?;
        for qp in self.query_points.iter() {
            let p = qp.position;
            writeln!(writer, "{} {} {} {}", p.x, p.y, p.z, qp.persisted_distance())?;
        }
        Ok(())
    }

    pub fn save_grid_to_file<P: AsRef<Path>>(&self, path: P) -> GridResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.save_grid(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), cells = self.cells.len(), "saved grid");
        Ok(())
    }

    pub fn serialize_to_file<P: AsRef<Path>>(&self, path: P) -> GridResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.serialize(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), cells = self.cells.len(), "serialized grid");
        Ok(())
    }

    /// Rebuild a grid from the full layout.
    ///
    /// Query points, corner handles and duplicate flags are taken from the input;
    /// every neighbor link is recomputed by hashing the cell positions.
    pub fn deserialize<R: Read>(reader: &mut R) -> GridResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut tokens = Tokens::new(&text);

        let extrude = tokens.flag("extrusion flag")?;
        let mut coords = [0.0 as Real; 6];
        for c in &mut coords {
            *c = tokens.parse("bounding box coordinate")?;
        }
        let bounding_box = BoundingBox::new(
            Point3::new(coords[0], coords[1], coords[2]),
            Point3::new(coords[3], coords[4], coords[5]),
        );
        let num_points: usize = tokens.parse("query point count")?;
        let voxel_size: Real = tokens.parse("voxel size")?;
        let num_cells: usize = tokens.parse("cell count")?;

        let mut grid = Self::with_voxel_size(bounding_box, voxel_size, extrude);

        for _ in 0..num_points {
            let x = tokens.parse("query point x")?;
            let y = tokens.parse("query point y")?;
            let z = tokens.parse("query point z")?;
            let distance = tokens.parse("query point distance")?;
            grid.query_points.insert(Point3::new(x, y, z), distance);
        }

        // counts come from the file, so storage grows with the records actually read
        for handle in 0..num_cells {
            let key = tokens.parse("cell hash key")?;
            let mut corners = [INVALID; 8];
            for corner in &mut corners {
                *corner = tokens.handle(num_points)?;
            }
            let x = tokens.parse("cell center x")?;
            let y = tokens.parse("cell center y")?;
            let z = tokens.parse("cell center z")?;
            let duplicate = tokens.flag("duplicate flag")?;

            let center = Point3::new(x, y, z);
            let index = grid.indexer.to_lattice_index(&center);
            if grid.indexer.hash(index) != Some(key) {
                return Err(GridError::CorruptGrid(format!(
                    "cell {handle} has key {key} but its center {center} hashes to {:?}",
                    grid.indexer.hash(index)
                )));
            }
            match grid.cell_map.entry(key) {
                Entry::Occupied(_) => {
                    let message = format!("cell {handle} repeats hash key {key}");
                    return Err(GridError::CorruptGrid(message));
                },
                Entry::Vacant(slot) => {
                    slot.insert(handle);
                },
            }

            let mut cell = Cell::new(key, index, center, duplicate);
            cell.corners = corners;
            grid.cells.push(cell);
        }

        grid.relink_all();
        info!(
            query_points = grid.query_points.len(),
            cells = grid.cells.len(),
            voxel_size,
            "loaded grid"
        );
        Ok(grid)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let mut file = File::open(path.as_ref())?;
        Self::deserialize(&mut file)
    }
}

fn write_corners<W: Write>(writer: &mut W, cell: &Cell) -> GridResult<()> {
    for (i, &handle) in cell.corners.iter().enumerate() {
        if i > 0 {
            write!(writer, " ")?;
        }
        if handle == INVALID {
            write!(writer, "-1")?;
        } else {
            write!(writer, "{handle}")?;
        }
    }
    Ok(())
}

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_token(&mut self, expected: &'static str) -> GridResult<&'a str> {
        self.inner.next().ok_or(GridError::UnexpectedEof { expected })
    }

    fn parse<T: FromStr>(&mut self, expected: &'static str) -> GridResult<T> {
        let token = self.next_token(expected)?;
        token.parse().map_err(|_| GridError::Parse {
            token: token.to_string(),
            expected,
        })
    }

    fn flag(&mut self, expected: &'static str) -> GridResult<bool> {
        match self.next_token(expected)? {
            "0" => Ok(false),
            "1" => Ok(true),
            token => Err(GridError::Parse {
                token: token.to_string(),
                expected,
            }),
        }
    }

    /// A corner handle below `num_points`, or `-1` for a missing corner.
    fn handle(&mut self, num_points: usize) -> GridResult<QueryPointHandle> {
        let token = self.next_token("corner handle")?;
        if token == "-1" {
            return Ok(INVALID);
        }
        let handle: QueryPointHandle = token.parse().map_err(|_| GridError::Parse {
            token: token.to_string(),
            expected: "corner handle",
        })?;
        if handle >= num_points {
            return Err(GridError::CorruptGrid(format!(
                "corner handle {handle} out of range for {num_points} query points"
            )));
        }
        Ok(handle)
    }
}
