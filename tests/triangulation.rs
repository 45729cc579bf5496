use bathycore::mesh::{EdgeClass, SamplePoint, TriangleMesh, NO_NEIGHBOUR};

// Scenario 4: a unit square split along one diagonal.
fn unit_square() -> Vec<SamplePoint> {
    vec![
        SamplePoint::new(0.0, 0.0, 1.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 0.0, 2.0, EdgeClass::Interior),
        SamplePoint::new(0.0, 1.0, 3.0, EdgeClass::Interior),
        SamplePoint::new(1.0, 1.0, 4.0, EdgeClass::Interior),
    ]
}

#[test]
fn unit_square_triangulates_into_two_triangles() {
    let mesh = TriangleMesh::build(unit_square()).expect("four corners triangulate");
    assert_eq!(mesh.len(), 2);
}

#[test]
fn unit_square_has_four_boundary_sides() {
    let mesh = TriangleMesh::build(unit_square()).unwrap();
    let boundary = mesh.ct.iter().flatten().filter(|&&c| c == NO_NEIGHBOUR).count();
    assert_eq!(boundary, 4);
}

#[test]
fn unit_square_has_exactly_one_interior_shared_side() {
    let mesh = TriangleMesh::build(unit_square()).unwrap();
    let shared = mesh.ct.iter().flatten().filter(|&&c| c != NO_NEIGHBOUR).count();
    // each shared diagonal is counted from both triangles' perspective.
    assert_eq!(shared, 2);
}

// Property: every interior side's ct/cs back-reference lands exactly on
// the triangle and slot it was found from, regardless of point ordering.
#[test]
fn triangulation_neighbour_table_is_symmetric_under_point_shuffles() {
    let orderings: Vec<Vec<SamplePoint>> = vec![
        unit_square(),
        {
            let mut pts = unit_square();
            pts.reverse();
            pts
        },
        {
            let mut pts = unit_square();
            pts.swap(0, 3);
            pts
        },
    ];

    for pts in orderings {
        let mesh = TriangleMesh::build(pts).unwrap();
        for t in 0..mesh.len() {
            for j in 0..3 {
                let neighbour = mesh.ct[t][j];
                if neighbour == NO_NEIGHBOUR {
                    continue;
                }
                let k = mesh.cs[t][j] as usize;
                assert_eq!(mesh.ct[neighbour as usize][k], t as i64);
            }
        }
    }
}

#[test]
fn larger_random_point_cloud_triangulates_with_a_consistent_neighbour_table() {
    // deterministic pseudo-random scatter: no rand dependency needed for a
    // fixed point set.
    let mut pts = Vec::new();
    for i in 0..30u32 {
        let x = ((i * 2654435761) % 1000) as f64 / 1000.0;
        let y = ((i * 40503 + 7) % 1000) as f64 / 1000.0;
        pts.push(SamplePoint::new(x, y, i as f64, EdgeClass::Interior));
    }
    let mesh = TriangleMesh::build(pts).expect("30-point scatter should triangulate");
    assert!(mesh.len() > 0);
    for t in 0..mesh.len() {
        for j in 0..3 {
            let neighbour = mesh.ct[t][j];
            if neighbour == NO_NEIGHBOUR {
                continue;
            }
            let k = mesh.cs[t][j] as usize;
            assert_eq!(mesh.ct[neighbour as usize][k], t as i64);
            assert_eq!(mesh.cs[neighbour as usize][k] as usize, j);
        }
    }
}
