mod support;

use hashbrown::HashSet;
use isogrid::{
    BoundingBox, GridError, SpatialHashGrid, SurfaceMeshSink, TriangleMesh,
    float_types::Real,
    grid::{EdgeConfidence, ExtractionState},
};
use nalgebra::{Point3, Vector3};

use crate::support::{approx_eq, config, edge_use_counts, filled_grid, sphere};

/// A single cell centered at the origin with corners at ±0.5.
fn unit_cell() -> SpatialHashGrid {
    let mut grid = SpatialHashGrid::from_points(&[Point3::origin()], &config(1.0, false));
    grid.add_point(&Point3::origin(), Real::NAN).unwrap();
    grid
}

/// 3×3×3 cells around the origin, corners at z ∈ {-1.5, -0.5, 0.5, 1.5}.
fn block() -> SpatialHashGrid {
    let mut grid = SpatialHashGrid::from_points(&[Point3::origin()], &config(1.0, true));
    grid.add_point(&Point3::origin(), Real::NAN).unwrap();
    grid
}

fn extract(grid: &mut SpatialHashGrid) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    let vertices = grid.extract_surface(&mut mesh).unwrap();
    assert_eq!(vertices, mesh.num_vertices());
    mesh
}

#[test]
fn uniform_cells_emit_nothing() {
    for d in [1.0, -1.0] {
        let mut grid = block();
        grid.calc_distance_values(&move |_: &Point3<Real>| d);
        let mesh = extract(&mut grid);
        assert!(mesh.is_empty());
        assert_eq!(mesh.num_vertices(), 0);
    }
}

#[test]
fn single_inside_corner_cuts_one_triangle() {
    let mut grid = unit_cell();
    // only corner 0 at (-0.5, -0.5, -0.5) is inside
    let plane = |p: &Point3<Real>| p.x + p.y + p.z + 1.0;
    grid.calc_distance_values(&plane);
    let mesh = extract(&mut grid);

    assert_eq!(mesh.num_triangles(), 1);
    assert_eq!(mesh.num_vertices(), 3);
    for v in mesh.vertices() {
        assert!(approx_eq(plane(v), 0.0, 1e-9));
    }

    let outward = Vector3::new(1.0, 1.0, 1.0).normalize();
    assert!(mesh.face_normal(0).unwrap().normalize().dot(&outward) > 0.99);
    for n in mesh.normals() {
        assert!((n - outward).norm() < 1e-9);
    }
}

#[test]
fn crossing_edges_get_one_vertex_each() {
    let mut grid = block();
    let plane = |p: &Point3<Real>| 0.5 * p.z - 0.05;
    grid.calc_distance_values(&plane);
    let mesh = extract(&mut grid);

    // nine cells straddle z = 0.1, each cut by a quad on sixteen shared vertical edges
    assert_eq!(mesh.num_triangles(), 18);
    assert_eq!(mesh.num_vertices(), 16);
    for (v, n) in mesh.vertices().iter().zip(mesh.normals()) {
        assert!(approx_eq(v.z, 0.1, 1e-9));
        assert!((n - Vector3::z()).norm() < 1e-9);
    }
    for i in 0..mesh.num_triangles() {
        assert!(mesh.face_normal(i).unwrap().z > 0.0);
    }
    assert!(edge_use_counts(mesh.indices()).values().all(|&n| n <= 2));
    assert_eq!(mesh.confidences(), &[EdgeConfidence::High; 16][..]);

    for cell in grid.cells() {
        assert_eq!(cell.state(), ExtractionState::Extracted);
        let straddles = cell.center().z == 0.0;
        assert_eq!(cell.edge_vertex(8).is_some(), straddles);
    }
}

#[test]
fn two_grids_share_one_mesh() {
    let plane = |p: &Point3<Real>| 0.5 * p.z - 0.05;
    let mut first = block();
    let seed = Point3::new(10.0, 0.0, 0.0);
    let mut second = SpatialHashGrid::from_points(&[seed], &config(1.0, true));
    second.add_point(&seed, Real::NAN).unwrap();
    first.calc_distance_values(&plane);
    second.calc_distance_values(&plane);

    let mut mesh = TriangleMesh::new();
    assert_eq!(first.extract_surface(&mut mesh).unwrap(), 16);
    let first_indices = mesh.indices().len();
    assert_eq!(second.extract_surface(&mut mesh).unwrap(), 16);

    assert_eq!(mesh.num_vertices(), 32);
    assert_eq!(mesh.num_triangles(), 36);
    assert_eq!(mesh.normals().len(), 32);
    assert!(mesh.indices()[..first_indices].iter().all(|&i| i < 16));
    for &i in &mesh.indices()[first_indices..] {
        assert!((16..32).contains(&i));
        assert!(mesh.vertices()[i].x > 8.0);
    }
    assert!(edge_use_counts(mesh.indices()).values().all(|&n| n <= 2));
}

#[test]
fn steep_distance_jumps_are_low_confidence() {
    let mut grid = block();
    grid.calc_distance_values(&|p: &Point3<Real>| 3.0 * (p.z - 0.1));
    let mesh = extract(&mut grid);
    assert_eq!(mesh.confidences().len(), mesh.num_vertices());
    assert!(mesh.confidences().iter().all(|&c| c == EdgeConfidence::Low));
}

#[test]
fn without_interpolation_vertices_sit_at_edge_midpoints() {
    let mut grid = block();
    grid.set_interpolate(false);
    grid.calc_distance_values(&|p: &Point3<Real>| p.z - 0.3);
    let mesh = extract(&mut grid);
    assert_eq!(mesh.num_vertices(), 16);
    assert!(mesh.vertices().iter().all(|v| v.z == 0.0));
}

#[test]
fn extraction_can_be_repeated() {
    let mut grid = block();
    grid.calc_distance_values(&|p: &Point3<Real>| p.coords.norm() - 0.9);
    let first = extract(&mut grid);
    let second = extract(&mut grid);
    assert!(!first.is_empty());
    assert_eq!(first.vertices(), second.vertices());
    assert_eq!(first.indices(), second.indices());
}

#[test]
fn on_demand_evaluation_matches_stored_distances() {
    let field = |p: &Point3<Real>| (p - Point3::new(0.2, -0.1, 0.05)).norm() - 0.8;

    let mut stored = block();
    stored.calc_distance_values(&field);
    let expected = extract(&mut stored);

    let mut lazy = block();
    let mut mesh = TriangleMesh::new();
    let vertices = lazy.extract_surface_with(&field, &mut mesh).unwrap();
    assert_eq!(vertices, expected.num_vertices());
    assert_eq!(mesh.vertices(), expected.vertices());
    assert_eq!(mesh.indices(), expected.indices());
    // stored distances are left untouched
    assert!(lazy.query_points().iter().all(|qp| qp.distance.is_nan()));
}

#[test]
fn cells_with_undefined_distances_are_skipped() {
    let mut grid = block();
    let mesh = extract(&mut grid);
    assert!(mesh.is_empty());
    assert!(grid.cells().iter().all(|c| c.state() == ExtractionState::Pending));
}

#[test]
fn missing_corner_of_an_active_cell_is_an_error() {
    let mut grid = unit_cell();
    grid.calc_distance_values(&|_: &Point3<Real>| -1.0);
    let broken = drop_first_corner(&grid);

    let mut mesh = TriangleMesh::new();
    match broken.clone().extract_surface(&mut mesh) {
        Err(GridError::UnresolvedCorner {
            cell,
            corner,
            configuration,
        }) => {
            assert_eq!((cell, corner, configuration), (0, 0, 0b1111_1110));
        },
        other => panic!("expected an unresolved corner, got {other:?}"),
    }

    // a missing corner is harmless while the rest of the cell is outside
    let mut outside = broken;
    outside.calc_distance_values(&|_: &Point3<Real>| 1.0);
    let mut mesh = TriangleMesh::new();
    assert_eq!(outside.extract_surface(&mut mesh).unwrap(), 0);
}

fn drop_first_corner(grid: &SpatialHashGrid) -> SpatialHashGrid {
    let mut bytes = Vec::new();
    grid.serialize(&mut bytes).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let last = lines.len() - 1;
    let mut tokens: Vec<&str> = lines[last].split_whitespace().collect();
    tokens[1] = "-1";
    lines[last] = tokens.join(" ");
    SpatialHashGrid::deserialize(&mut lines.join("\n").as_bytes()).unwrap()
}

#[test]
fn sphere_surface_is_consistent() {
    let radius = 1.03;
    let bbox = BoundingBox::new(Point3::new(-1.5, -1.5, -1.5), Point3::new(1.5, 1.5, 1.5));
    let mut grid = filled_grid(bbox, 0.25);
    grid.calc_distance_values(&sphere(radius));
    let mesh = extract(&mut grid);
    assert!(mesh.num_triangles() > 100);

    // every vertex is emitted once, however many cells share its edge
    let unique: HashSet<[u64; 3]> = mesh
        .vertices()
        .iter()
        .map(|p| [p.x.to_bits() as u64, p.y.to_bits() as u64, p.z.to_bits() as u64])
        .collect();
    assert_eq!(unique.len(), mesh.num_vertices());

    for v in mesh.vertices() {
        assert!((v.coords.norm() - radius).abs() < 0.25);
    }
    // slivers can tilt a few normals, but the surface as a whole faces outwards
    let inward = mesh
        .vertices()
        .iter()
        .zip(mesh.normals())
        .filter(|(v, n)| n.dot(&v.coords) <= 0.0)
        .count();
    assert!(inward * 100 <= mesh.num_vertices(), "{inward} inward vertex normals");
    for (i, [a, b, c]) in mesh.triangles().enumerate() {
        let normal = mesh.face_normal(i).unwrap();
        if normal.norm() < 1e-4 {
            continue;
        }
        let [pa, pb, pc] = [a, b, c].map(|v| mesh.vertices()[v].coords);
        let centroid = (pa + pb + pc) / 3.0;
        assert!(normal.dot(&centroid) > 0.0, "triangle {i} faces inwards");
    }
    assert!(edge_use_counts(mesh.indices()).values().all(|&n| n <= 2));
}

/// A sink that only counts what it receives.
#[derive(Default)]
struct CountingSink {
    vertices: usize,
    normals: usize,
    indices: Vec<usize>,
    blends: usize,
}

impl SurfaceMeshSink for CountingSink {
    fn add_vertex(&mut self, _position: Point3<Real>) -> usize {
        self.vertices += 1;
        self.vertices - 1
    }

    fn add_normal(&mut self, _normal: Vector3<Real>) {
        self.normals += 1;
    }

    fn add_index(&mut self, vertex: usize) {
        self.indices.push(vertex);
    }

    fn interpolate_normal(&mut self, _vertex: usize, _normal: Vector3<Real>) {
        self.blends += 1;
    }
}

#[test]
fn any_sink_can_receive_the_surface() {
    let mut grid = block();
    grid.calc_distance_values(&|p: &Point3<Real>| p.z - 0.1);
    let mut sink = CountingSink::default();
    let vertices = grid.extract_surface(&mut sink).unwrap();

    assert_eq!(vertices, 16);
    assert_eq!(sink.vertices, sink.normals);
    assert_eq!(sink.indices.len(), 54);
    assert_eq!(sink.blends, sink.indices.len());
    assert!(sink.indices.iter().all(|&i| i < vertices));
}
