mod support;

use isogrid::{GridError, SpatialHashGrid, TriangleMesh, float_types::Real, grid::INVALID};
use nalgebra::Point3;

use crate::support::{assert_shared_corners, assert_symmetric_neighbors, seeded_grid, sphere};

fn sample_grid() -> SpatialHashGrid {
    let samples = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.8, 0.3, -0.2),
        Point3::new(1.7, 1.1, 0.4),
        Point3::new(-0.6, 0.9, 1.3),
    ];
    seeded_grid(&samples, 0.5, true)
}

fn serialized(grid: &SpatialHashGrid) -> String {
    let mut bytes = Vec::new();
    grid.serialize(&mut bytes).unwrap();
    String::from_utf8(bytes).unwrap()
}

fn reload(text: &str) -> Result<SpatialHashGrid, GridError> {
    SpatialHashGrid::deserialize(&mut text.as_bytes())
}

#[test]
fn serialize_round_trip_preserves_the_grid() {
    let mut grid = sample_grid();
    grid.calc_distance_values(&sphere(0.9));
    let loaded = reload(&serialized(&grid)).unwrap();

    assert_eq!(loaded.bounding_box(), grid.bounding_box());
    assert_eq!(loaded.voxel_size(), grid.voxel_size());
    assert_eq!(loaded.extrude(), grid.extrude());
    assert_eq!(loaded.num_query_points(), grid.num_query_points());
    for (a, b) in loaded.query_points().iter().zip(grid.query_points().iter()) {
        assert_eq!(a, b);
    }

    assert_eq!(loaded.num_cells(), grid.num_cells());
    for (a, b) in loaded.cells().iter().zip(grid.cells()) {
        assert_eq!(a.key(), b.key());
        assert_eq!(a.lattice_index(), b.lattice_index());
        assert_eq!(a.center(), b.center());
        assert_eq!(a.corners(), b.corners());
        assert_eq!(a.is_duplicate(), b.is_duplicate());
        for slot in 0..27 {
            assert_eq!(a.neighbor(slot), b.neighbor(slot));
        }
    }
    assert_symmetric_neighbors(&loaded);
    assert_shared_corners(&loaded);
}

#[test]
fn reloaded_grid_extracts_the_same_surface() {
    let mut grid = sample_grid();
    grid.calc_distance_values(&sphere(0.9));
    let mut expected = TriangleMesh::new();
    grid.extract_surface(&mut expected).unwrap();

    let mut loaded = reload(&serialized(&grid)).unwrap();
    let mut mesh = TriangleMesh::new();
    loaded.extract_surface(&mut mesh).unwrap();

    assert!(!mesh.is_empty());
    assert_eq!(mesh.vertices(), expected.vertices());
    assert_eq!(mesh.indices(), expected.indices());
}

#[test]
fn reloaded_grid_keeps_growing_consistently() {
    let grid = sample_grid();
    let mut loaded = reload(&serialized(&grid)).unwrap();
    let created = loaded.add_point(&Point3::new(1.0, -0.5, 1.0), Real::NAN).unwrap();
    assert!(created > 0);
    assert_shared_corners(&loaded);
    assert_symmetric_neighbors(&loaded);
}

#[test]
fn undefined_distances_are_written_as_zero() {
    let grid = sample_grid();
    let loaded = reload(&serialized(&grid)).unwrap();
    assert!(loaded.query_points().iter().all(|qp| qp.distance == 0.0));
}

#[test]
fn plain_layout_lists_points_and_corners() {
    let mut grid = SpatialHashGrid::from_points(&[Point3::origin()], &support::config(1.0, false));
    grid.add_point(&Point3::origin(), 0.5).unwrap();

    let mut bytes = Vec::new();
    grid.save_grid(&mut bytes).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 1 + 8 + 1);
    assert_eq!(lines[0], "8 1 1");
    assert_eq!(lines[1], "-0.5 -0.5 -0.5 0.5");
    assert_eq!(lines[9], "0 1 2 3 4 5 6 7");
}

#[test]
fn full_layout_header() {
    let mut grid = SpatialHashGrid::from_points(&[Point3::origin()], &support::config(1.0, false));
    grid.add_point(&Point3::origin(), Real::NAN).unwrap();
    let text = serialized(&grid);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "0");
    assert_eq!(lines[1], "-1.5 -1.5 -1.5 1.5 1.5 1.5");
    assert_eq!(lines[2], "8 1 1");
    let key = grid.cells()[0].key();
    assert_eq!(lines[11], format!("{key} 0 1 2 3 4 5 6 7 0 0 0 1"));
}

#[test]
fn missing_corners_are_written_as_minus_one() {
    let mut grid = SpatialHashGrid::from_points(&[Point3::origin()], &support::config(1.0, false));
    grid.add_point(&Point3::origin(), Real::NAN).unwrap();
    let text = serialized(&grid).replacen(" 0 1 2 3", " -1 1 2 3", 1);
    let loaded = reload(&text).unwrap();
    assert_eq!(loaded.cells()[0].corners()[0], INVALID);
    assert!(serialized(&loaded).contains(" -1 1 2 3 "));
}

#[test]
fn truncated_input_is_reported() {
    let grid = sample_grid();
    let text = serialized(&grid);
    let kept: Vec<&str> = text.lines().take(3 + grid.num_query_points() / 2).collect();
    match reload(&kept.join("\n")) {
        Err(GridError::UnexpectedEof { expected }) => assert!(expected.starts_with("query point")),
        other => panic!("expected a truncation error, got {other:?}"),
    }
    assert!(matches!(reload(""), Err(GridError::UnexpectedEof { expected: "extrusion flag" })));
}

#[test]
fn malformed_tokens_are_reported() {
    let text = serialized(&sample_grid());
    let bad_flag = text.replacen('1', "yes", 1);
    assert!(matches!(
        reload(&bad_flag),
        Err(GridError::Parse { ref token, expected: "extrusion flag" }) if token == "yes"
    ));

    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines[2] = lines[2].replacen(' ', " abc ", 1);
    assert!(matches!(reload(&lines.join("\n")), Err(GridError::Parse { .. })));
}

#[test]
fn inconsistent_cells_are_rejected() {
    let grid = sample_grid();
    let text = serialized(&grid);
    let header_lines = 3 + grid.num_query_points();
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let rewrite = |edit: &dyn Fn(&mut Vec<String>)| {
        let mut tokens: Vec<String> =
            lines[header_lines].split_whitespace().map(str::to_string).collect();
        edit(&mut tokens);
        let mut out = lines.clone();
        out[header_lines] = tokens.join(" ");
        reload(&out.join("\n"))
    };

    // key that does not match the center
    let wrong_key =
        rewrite(&|t: &mut Vec<String>| t[0] = (t[0].parse::<u64>().unwrap() + 1).to_string());
    assert!(matches!(wrong_key, Err(GridError::CorruptGrid(_))));

    // corner handle past the point table
    let out_of_range = rewrite(&|t: &mut Vec<String>| t[3] = grid.num_query_points().to_string());
    assert!(matches!(out_of_range, Err(GridError::CorruptGrid(_))));

    // the first cell repeated in place of the second
    let mut repeated = lines.clone();
    repeated[header_lines + 1] = repeated[header_lines].clone();
    assert!(matches!(reload(&repeated.join("\n")), Err(GridError::CorruptGrid(_))));
}

#[test]
fn oversized_counts_fail_on_the_missing_records() {
    let cells = reload("0\n0 0 0 1 1 1\n0 1 18446744073709551615\n");
    assert!(matches!(cells, Err(GridError::UnexpectedEof { expected: "cell hash key" })));

    let points = reload("0\n0 0 0 1 1 1\n18446744073709551615 1 0\n");
    assert!(matches!(points, Err(GridError::UnexpectedEof { expected: "query point x" })));
}

#[test]
fn file_helpers_round_trip() {
    let mut grid = sample_grid();
    grid.calc_distance_values(&sphere(0.9));

    let dir = std::env::temp_dir();
    let full = dir.join(format!("isogrid-full-{}.grid", std::process::id()));
    let plain = dir.join(format!("isogrid-plain-{}.grid", std::process::id()));

    grid.serialize_to_file(&full).unwrap();
    grid.save_grid_to_file(&plain).unwrap();
    let loaded = SpatialHashGrid::from_file(&full).unwrap();
    let plain_text = std::fs::read_to_string(&plain).unwrap();
    std::fs::remove_file(&full).unwrap();
    std::fs::remove_file(&plain).unwrap();

    assert_eq!(loaded.num_cells(), grid.num_cells());
    assert_eq!(plain_text.lines().count(), 1 + grid.num_query_points() + grid.num_cells());
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("isogrid-does-not-exist.grid");
    assert!(matches!(SpatialHashGrid::from_file(path), Err(GridError::Io(_))));
}
