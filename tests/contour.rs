use bathycore::contour::{trace_contours, ContourLevel};
use bathycore::mesh::{EdgeClass, SamplePoint, TriangleMesh};

// Scenario 5: unit square, corner depths 1/2/3/4, contoured at level 2.5.
fn square_mesh() -> TriangleMesh {
    let pts = vec![
        SamplePoint::new(0.0, 0.0, 1.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 0.0, 2.0, EdgeClass::Interior),
        SamplePoint::new(0.0, 1.0, 3.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 1.0, 4.0, EdgeClass::Interior),
    ];
    TriangleMesh::build(pts).expect("unit square triangulates")
}

fn path_length(points: &[(f64, f64)]) -> f64 {
    points.windows(2).map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt()).sum()
}

#[test]
fn contour_at_2_5_crosses_both_triangles_in_one_polyline() {
    let mut mesh = square_mesh();
    let levels = [ContourLevel { value: 2.5, tick: false, label: false }];
    let traces = trace_contours(&mut mesh, &levels, 0.0, 0.0);

    assert_eq!(traces.len(), 1, "a single monotone saddle level produces one component");
    let trace = &traces[0];
    assert_eq!(trace.points.len(), 3, "crosses one side in each of the two triangles plus the shared diagonal");

    // The two endpoints must land on opposite sides of the square: one on
    // the x=1 edge, the other on the x=0 edge.
    let first = trace.points[0];
    let last = *trace.points.last().unwrap();
    let on_right = |p: (f64, f64)| (p.0 - 1.0).abs() < 1e-9;
    let on_left = |p: (f64, f64)| p.0.abs() < 1e-9;
    assert!(
        (on_right(first) && on_left(last)) || (on_left(first) && on_right(last)),
        "endpoints {first:?} and {last:?} should land on the square's opposite vertical edges"
    );

    let length = path_length(&trace.points);
    assert!((length - 1.25_f64.sqrt()).abs() < 1e-6, "length {length} should be sqrt(1.25)");
}

#[test]
fn contour_outside_the_depth_range_produces_no_traces() {
    let mut mesh = square_mesh();
    let levels = [ContourLevel { value: 100.0, tick: false, label: false }];
    let traces = trace_contours(&mut mesh, &levels, 0.0, 0.0);
    assert!(traces.is_empty());
}

#[test]
fn flat_mesh_produces_no_traces() {
    let pts = vec![
        SamplePoint::new(0.0, 0.0, 5.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 0.0, 5.0, EdgeClass::Interior),
        SamplePoint::new(0.0, 1.0, 5.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 1.0, 5.0, EdgeClass::Interior),
    ];
    let mut mesh = TriangleMesh::build(pts).unwrap();
    let levels = [ContourLevel { value: 5.0, tick: false, label: false }];
    let traces = trace_contours(&mut mesh, &levels, 0.0, 0.0);
    assert!(traces.is_empty(), "a flat swath below the depth-range threshold traces nothing");
}
