/*!
The triangle-arena mesh the contour tracer walks.

Grounded on `mb_triangulate` (`original_source/src/mbaux/mb_truecont.c`),
which produces exactly this parallel-array layout (`iv`/`ct`/`cs`/`ed`/
`flag`, one slot per triangle side) rather than a halfedge or pointer-based
structure. The incremental Delaunay triangulator kept from the teacher
(`crate::algorithms::delaunay_triangulation`) is the engine that actually
places the points; this module adapts its halfedge output into the arena
shape the contour tracer in [`crate::contour`] expects, and folds in the
per-vertex edge labels the triangulator itself does not know about.
*/

use crate::algorithms::{triangulate, Triangulation, EMPTY};
use crate::structures::Point2D;

/// Which swath boundary, if any, a sample point sits on. Propagated from
/// the input soundings onto the triangle sides that connect two points of
/// the same class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdgeClass {
    Left,
    Interior,
    Right,
}

impl EdgeClass {
    /// The `ed[j][i]` encoding: 0 for `Interior`, ±1 for `Left`/`Right`.
    fn code(self) -> i8 {
        match self {
            EdgeClass::Left => -1,
            EdgeClass::Interior => 0,
            EdgeClass::Right => 1,
        }
    }
}

/// A sounding: map position, depth, and which swath boundary it belongs to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub edge: EdgeClass,
    /// Platform heading (degrees) at the time this sounding was recorded;
    /// used only to orient contour labels (`get_azimuth_tri`'s ping
    /// heading lookup). Defaults to 0 for callers that don't track it.
    pub heading: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, z: f64, edge: EdgeClass) -> Self {
        SamplePoint { x, y, z, edge, heading: 0.0 }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }
}

/// Sentinel used for `ct`/`cs` slots with no neighbour, matching the `-1`
/// the design calls for (triangle indices are otherwise non-negative).
pub const NO_NEIGHBOUR: i64 = -1;

/// The triangle arena: append-only, one entry per triangle, three slots
/// per side. `flag` is transient scratch space for the contour tracer and
/// is reset to zero on every [`TriangleMesh::reset_flags`] call, once per
/// contour level.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    pub points: Vec<SamplePoint>,
    pub iv: Vec<[usize; 3]>,
    pub ct: Vec<[i64; 3]>,
    pub cs: Vec<[i8; 3]>,
    pub ed: Vec<[i8; 3]>,
    pub flag: Vec<[i8; 3]>,
}

impl TriangleMesh {
    pub fn len(&self) -> usize {
        self.iv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iv.is_empty()
    }

    /// Vertex positions of triangle `t`'s side `j`, i.e. the edge from
    /// `iv[t][j]` to `iv[t][(j+1)%3]`.
    pub fn side_points(&self, t: usize, j: usize) -> (SamplePoint, SamplePoint) {
        let a = self.iv[t][j];
        let b = self.iv[t][(j + 1) % 3];
        (self.points[a], self.points[b])
    }

    pub fn reset_flags(&mut self) {
        for f in self.flag.iter_mut() {
            *f = [0, 0, 0];
        }
    }

    /// Bins samples to a coarse grid of `cell` map units on a side and
    /// keeps only the shallowest (largest |z|) sample per occupied cell,
    /// per §4.4's sample-point preparation step. Guards the triangulator
    /// against coincident-point degeneracy.
    pub fn dedupe_by_bin(samples: &[SamplePoint], cell: f64) -> Vec<SamplePoint> {
        use std::collections::HashMap;
        if cell <= 0.0 {
            return samples.to_vec();
        }
        let mut best: HashMap<(i64, i64), usize> = HashMap::new();
        for (idx, s) in samples.iter().enumerate() {
            let key = ((s.x / cell).floor() as i64, (s.y / cell).floor() as i64);
            match best.get(&key) {
                Some(&existing) if samples[existing].z.abs() >= s.z.abs() => {}
                _ => {
                    best.insert(key, idx);
                }
            }
        }
        best.values().map(|&idx| samples[idx]).collect()
    }

    /// Triangulates `samples` (after `dedupe_by_bin` has been applied by
    /// the caller) and derives the full triangle arena, including the
    /// `ed` vertex-to-side reduction of §11.
    pub fn build(samples: Vec<SamplePoint>) -> Option<TriangleMesh> {
        if samples.len() < 3 {
            return None;
        }
        let points: Vec<Point2D> = samples.iter().map(|s| Point2D::new(s.x, s.y)).collect();
        let tri: Triangulation = triangulate(&points)?;
        let ntri = tri.len();

        let mut iv = Vec::with_capacity(ntri);
        let mut ct = Vec::with_capacity(ntri);
        let mut cs = Vec::with_capacity(ntri);
        let mut ed = Vec::with_capacity(ntri);

        for t in 0..ntri {
            iv.push(tri.points_of_triangle(t));
            let edges = tri.edges_of_triangle(t);

            let mut ct_t = [NO_NEIGHBOUR; 3];
            let mut cs_t = [-1i8; 3];
            let mut ed_t = [0i8; 3];

            for j in 0..3 {
                let e = edges[j];
                let opposite = tri.halfedges[e];
                if opposite != EMPTY {
                    ct_t[j] = tri.triangle_of_edge(opposite) as i64;
                    cs_t[j] = (opposite % 3) as i8;
                }

                let a = tri.triangles[e];
                let b = tri.triangles[tri.next_halfedge(e)];
                if samples[a].edge == samples[b].edge && samples[a].edge != EdgeClass::Interior {
                    ed_t[j] = samples[a].edge.code();
                }
            }

            ct.push(ct_t);
            cs.push(cs_t);
            ed.push(ed_t);
        }

        let flag = vec![[0i8; 3]; ntri];

        Some(TriangleMesh { points: samples, iv, ct, cs, ed, flag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_samples() -> Vec<SamplePoint> {
        let mut pts = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                let edge = if i == 0 {
                    EdgeClass::Left
                } else if i == 3 {
                    EdgeClass::Right
                } else {
                    EdgeClass::Interior
                };
                pts.push(SamplePoint::new(i as f64, j as f64, (i + j) as f64, edge));
            }
        }
        pts
    }

    #[test]
    fn build_produces_symmetric_arena() {
        let mesh = TriangleMesh::build(grid_samples()).expect("triangulation should succeed");
        assert!(mesh.len() > 0);
        for t in 0..mesh.len() {
            for j in 0..3 {
                let neighbour = mesh.ct[t][j];
                if neighbour == NO_NEIGHBOUR {
                    continue;
                }
                let k = mesh.cs[t][j] as usize;
                let back = mesh.ct[neighbour as usize][k];
                assert_eq!(back, t as i64, "ct/cs symmetry broken at triangle {t} side {j}");
                let back_side = mesh.cs[neighbour as usize][k];
                assert_eq!(back_side as usize, j);
            }
        }
    }

    #[test]
    fn boundary_sides_have_no_neighbour() {
        let mesh = TriangleMesh::build(grid_samples()).unwrap();
        let boundary_count = mesh
            .ct
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&c| c == NO_NEIGHBOUR)
            .count();
        assert!(boundary_count > 0, "a finite mesh must have a hull boundary");
    }

    #[test]
    fn left_right_edge_sides_are_classified() {
        let mesh = TriangleMesh::build(grid_samples()).unwrap();
        let mut saw_left = false;
        let mut saw_right = false;
        for (t, row) in mesh.ed.iter().enumerate() {
            for (j, &code) in row.iter().enumerate() {
                if code == 0 {
                    continue;
                }
                let (p, q) = mesh.side_points(t, j);
                assert_eq!(p.edge, q.edge, "nonzero ed side must join two same-class vertices");
                if code < 0 {
                    saw_left = true;
                } else {
                    saw_right = true;
                }
            }
        }
        assert!(saw_left && saw_right, "the 4x4 grid has both Left and Right boundary columns");
    }

    #[test]
    fn interior_only_mesh_has_no_edge_sides() {
        let pts: Vec<SamplePoint> = (0..3)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 3.0;
                SamplePoint::new(a.cos(), a.sin(), 0.0, EdgeClass::Interior)
            })
            .collect();
        let mesh = TriangleMesh::build(pts).unwrap();
        for row in &mesh.ed {
            assert!(row.iter().all(|&c| c == 0));
        }
    }

    #[test]
    fn dedupe_by_bin_keeps_shallowest_sample() {
        let samples = vec![
            SamplePoint::new(0.01, 0.01, 10.0, EdgeClass::Interior),
            SamplePoint::new(0.02, 0.02, -50.0, EdgeClass::Interior),
            SamplePoint::new(5.0, 5.0, 1.0, EdgeClass::Interior),
        ];
        let deduped = TriangleMesh::dedupe_by_bin(&samples, 1.0);
        assert_eq!(deduped.len(), 2);
        let kept = deduped.iter().find(|s| s.x < 1.0).unwrap();
        assert_eq!(kept.z, -50.0);
    }

    #[test]
    fn too_few_points_returns_none() {
        let pts = vec![
            SamplePoint::new(0.0, 0.0, 0.0, EdgeClass::Interior),
            SamplePoint::new(1.0, 0.0, 0.0, EdgeClass::Interior),
        ];
        assert!(TriangleMesh::build(pts).is_none());
    }
}
