/*!
Contour tracing over a [`crate::mesh::TriangleMesh`].

Grounded on `get_start_tri`/`get_next_tri`/`get_pos_tri`/`get_azimuth_tri`/
`check_label`/`mb_tcontour` (`original_source/src/mbaux/mb_truecont.c`). The
C `goto`-free but state-heavy walk (flip direction, reverse the
accumulated points, resume from the start) becomes a small `Walker` struct
whose `advance` method returns whether the walk continues, replacing the
five-in-and-out-parameter C function signature.
*/

use crate::mesh::{TriangleMesh, NO_NEIGHBOUR};
use std::collections::VecDeque;

/// Absolute depth-range threshold below which a swath is considered flat
/// and no contours are traced at all.
const EPS: f64 = 1.0e-4;

/// Fraction of the depth range used both to nudge samples off an exact
/// contour value and to decide when a crossing side is "flat enough" that
/// its crossing point is just the midpoint.
const PERTURB_EPS: f64 = 1.0e-4;

/// One contour level to trace, with its decoration flags.
#[derive(Debug, Clone, Copy)]
pub struct ContourLevel {
    pub value: f64,
    pub tick: bool,
    pub label: bool,
}

/// Which side of the label anchor point the text should be offset toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    LeftOfStart,
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct ContourLabel {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub justify: Justify,
}

/// One traced polyline (possibly with tick decorations folded into
/// `points`) plus zero, one, or two end labels.
#[derive(Debug, Clone)]
pub struct ContourTrace {
    pub value: f64,
    pub points: Vec<(f64, f64)>,
    pub labels: Vec<ContourLabel>,
}

/// Suppresses labels placed within `spacing` of one already emitted in the
/// last 30 placements, per `check_label`.
pub struct LabelHistory {
    spacing: f64,
    recent: VecDeque<(f64, f64)>,
}

impl LabelHistory {
    pub fn new(spacing: f64) -> Self {
        LabelHistory { spacing, recent: VecDeque::with_capacity(30) }
    }

    fn accept(&mut self, x: f64, y: f64) -> bool {
        for &(hx, hy) in self.recent.iter() {
            let d = ((hx - x).powi(2) + (hy - y).powi(2)).sqrt();
            if d < self.spacing {
                return false;
            }
        }
        self.recent.push_front((x, y));
        if self.recent.len() > 30 {
            self.recent.pop_back();
        }
        true
    }
}

fn mark_crossings(mesh: &mut TriangleMesh, value: f64) {
    for t in 0..mesh.len() {
        for j in 0..3 {
            let (p, q) = mesh.side_points(t, j);
            mesh.flag[t][j] = if (p.z > value && q.z < value) || (q.z > value && p.z < value) { 1 } else { 0 };
        }
    }
}

fn crossing_position(mesh: &TriangleMesh, t: usize, side: usize, value: f64, eps: f64) -> (f64, f64) {
    let (p, q) = mesh.side_points(t, side);
    let factor = if (q.z - p.z).abs() > eps {
        (value - p.z) / (q.z - p.z)
    } else {
        0.5
    };
    (p.x + factor * (q.x - p.x), p.y + factor * (q.y - p.y))
}

fn azimuth(mesh: &TriangleMesh, t: usize, side: usize) -> f64 {
    let v = mesh.iv[t][side];
    let mut angle = -mesh.points[v].heading;
    if angle > 180.0 {
        angle -= 360.0;
    }
    if angle < -180.0 {
        angle += 360.0;
    }
    angle
}

fn maybe_label(
    mesh: &TriangleMesh,
    itri: usize,
    iside: usize,
    point: (f64, f64),
    history: &mut LabelHistory,
) -> Option<ContourLabel> {
    let ed = mesh.ed[itri][iside];
    if ed == 0 || !history.accept(point.0, point.1) {
        return None;
    }
    Some(ContourLabel {
        x: point.0,
        y: point.1,
        angle: azimuth(mesh, itri, iside),
        justify: if ed < 0 { Justify::LeftOfStart } else { Justify::Other },
    })
}

/// Walks a single contour component side-to-side through the mesh,
/// consuming (flagging −1) each side it crosses.
struct Walker {
    itri: usize,
    iside1: usize,
    iside2: usize,
    closed: bool,
    itristart: usize,
    isidestart: usize,
}

fn find_start(mesh: &TriangleMesh) -> Option<Walker> {
    for itri in 0..mesh.len() {
        for j in 0..3 {
            if mesh.flag[itri][j] <= 0 {
                continue;
            }
            let mut iside1 = j;
            let iside2 = (0..3).find(|&jj| jj != j && mesh.flag[itri][jj] > 0);
            let mut iside2 = match iside2 {
                Some(v) => v,
                None => {
                    log::warn!("no second flagged side in triangle {itri}");
                    continue;
                }
            };

            let has1 = mesh.ct[itri][iside1] > NO_NEIGHBOUR;
            let has2 = mesh.ct[itri][iside2] > NO_NEIGHBOUR;
            let closed = has1 && has2;
            if !closed && has1 {
                std::mem::swap(&mut iside1, &mut iside2);
            }

            return Some(Walker { itri, iside1, iside2, closed, itristart: itri, isidestart: iside1 });
        }
    }
    None
}

impl Walker {
    /// Advances to the next crossed side. `points` is the contour
    /// accumulated so far; a dead end on a contour known to be `closed`
    /// reverses it in place and resumes tracing from the original start,
    /// matching the original's "turn the contour around" branch.
    fn advance(&mut self, mesh: &TriangleMesh, points: &mut Vec<(f64, f64)>) -> bool {
        if self.closed
            && mesh.ct[self.itri][self.iside2] == self.itristart as i64
            && mesh.cs[self.itri][self.iside2] as usize == self.isidestart
        {
            return false;
        }

        let neighbour = mesh.ct[self.itri][self.iside2];
        if neighbour > NO_NEIGHBOUR {
            self.iside1 = mesh.cs[self.itri][self.iside2] as usize;
            self.itri = neighbour as usize;
            match (0..3).find(|&j| j != self.iside1 && mesh.flag[self.itri][j] != 0) {
                Some(j) => {
                    self.iside2 = j;
                    true
                }
                None => {
                    log::warn!("no flagged side in triangle {}", self.itri);
                    false
                }
            }
        } else if self.closed {
            points.reverse();
            points.pop();
            self.closed = false;
            let itrisave = self.itristart;
            let isidesave = self.isidestart;
            self.itristart = self.itri;
            self.isidestart = self.iside2;
            self.itri = itrisave;
            self.iside2 = isidesave;
            match (0..3).find(|&j| j != self.iside2 && mesh.flag[self.itri][j] != 0) {
                Some(j) => {
                    self.iside1 = j;
                    true
                }
                None => false,
            }
        } else {
            false
        }
    }
}

#[allow(clippy::type_complexity)]
fn trace_one(
    mesh: &mut TriangleMesh,
    mut walker: Walker,
    value: f64,
    eps: f64,
    tick: bool,
    tick_len: f64,
) -> (Vec<(f64, f64)>, bool, usize, usize, usize, usize) {
    mesh.flag[walker.itri][walker.iside1] = -1;
    mesh.flag[walker.itri][walker.iside2] = -1;

    let mut points = vec![
        crossing_position(mesh, walker.itri, walker.iside1, value, eps),
        crossing_position(mesh, walker.itri, walker.iside2, value, eps),
    ];

    let mut itriend = walker.itri;
    let mut isideend = walker.iside2;
    let mut tick_last = false;

    while walker.advance(mesh, &mut points) {
        let (x, y) = crossing_position(mesh, walker.itri, walker.iside2, value, eps);

        if tick && !tick_last {
            let z1 = mesh.points[mesh.iv[walker.itri][walker.iside1]].z;
            let z2 = mesh.points[mesh.iv[walker.itri][walker.iside2]].z;
            let hand = if z1 > z2 { -1.0 } else { 1.0 };
            let (last_x, last_y) = *points.last().unwrap();
            let mid = (0.5 * (x + last_x), 0.5 * (y + last_y));
            let magdis = ((x - last_x).powi(2) + (y - last_y).powi(2)).sqrt();
            let tick_point = if magdis > 0.0 {
                (
                    mid.0 - hand * tick_len * (y - last_y) / magdis,
                    mid.1 + hand * tick_len * (x - last_x) / magdis,
                )
            } else {
                mid
            };
            points.push(mid);
            points.push(tick_point);
            points.push(mid);
            points.push((x, y));
            tick_last = true;
        } else {
            points.push((x, y));
            tick_last = false;
        }

        mesh.flag[walker.itri][walker.iside1] = -1;
        mesh.flag[walker.itri][walker.iside2] = -1;
        itriend = walker.itri;
        isideend = walker.iside2;
    }

    (points, walker.closed, walker.itristart, walker.isidestart, itriend, isideend)
}

/// Traces every component of a single level, consuming the mesh's `flag`
/// scratch space as it goes (call [`TriangleMesh::reset_flags`] between
/// unrelated calls if re-tracing the same level).
pub fn trace_level(
    mesh: &mut TriangleMesh,
    level: &ContourLevel,
    tick_len: f64,
    eps: f64,
    history: &mut LabelHistory,
) -> Vec<ContourTrace> {
    mark_crossings(mesh, level.value);
    let mut traces = Vec::new();

    while let Some(walker) = find_start(mesh) {
        let (points, closed, itristart, isidestart, itriend, isideend) =
            trace_one(mesh, walker, level.value, eps, level.tick, tick_len);

        if points.len() < 2 {
            continue;
        }

        let mut labels = Vec::new();
        if level.label && !closed {
            if let Some(l) = maybe_label(mesh, itristart, isidestart, points[0], history) {
                labels.push(l);
            }
            if let Some(l) = maybe_label(mesh, itriend, isideend, *points.last().unwrap(), history) {
                labels.push(l);
            }
        }

        traces.push(ContourTrace { value: level.value, points, labels });
    }

    traces
}

/// Traces every level over `mesh`, perturbing any sample that lands
/// exactly on a contour value first. Returns no traces at all if the
/// swath's depth range is too small to bother (§4.4's silent-failure
/// rule).
pub fn trace_contours(mesh: &mut TriangleMesh, levels: &[ContourLevel], tick_len: f64, label_spacing: f64) -> Vec<ContourTrace> {
    if mesh.points.is_empty() {
        return Vec::new();
    }
    let bath_min = mesh.points.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
    let bath_max = mesh.points.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);
    if bath_max - bath_min < EPS {
        return Vec::new();
    }

    let eps = PERTURB_EPS * (bath_max - bath_min);
    for level in levels {
        for p in mesh.points.iter_mut() {
            if (p.z - level.value).abs() < eps {
                p.z = level.value + eps;
            }
        }
    }

    let mut history = LabelHistory::new(label_spacing);
    let mut out = Vec::new();
    for level in levels {
        out.extend(trace_level(mesh, level, tick_len, eps, &mut history));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{EdgeClass, SamplePoint};

    fn pyramid_mesh() -> TriangleMesh {
        let pts = vec![
            SamplePoint::new(0.0, 0.0, 0.0, EdgeClass::Left),
            SamplePoint::new(1.0, 0.0, 0.0, EdgeClass::Interior),
            SamplePoint::new(1.0, 1.0, 0.0, EdgeClass::Right),
            SamplePoint::new(0.0, 1.0, 0.0, EdgeClass::Interior),
            SamplePoint::new(0.5, 0.5, 1.0, EdgeClass::Interior),
        ];
        TriangleMesh::build(pts).expect("pyramid should triangulate")
    }

    #[test]
    fn flat_swath_produces_no_contours() {
        let pts = vec![
            SamplePoint::new(0.0, 0.0, 1.0, EdgeClass::Interior),
            SamplePoint::new(1.0, 0.0, 1.0, EdgeClass::Interior),
            SamplePoint::new(1.0, 1.0, 1.0, EdgeClass::Interior),
            SamplePoint::new(0.0, 1.0, 1.0, EdgeClass::Interior),
        ];
        let mut mesh = TriangleMesh::build(pts).unwrap();
        let levels = [ContourLevel { value: 0.5, tick: false, label: false }];
        let traces = trace_contours(&mut mesh, &levels, 0.1, 0.1);
        assert!(traces.is_empty());
    }

    #[test]
    fn pyramid_mid_level_closes() {
        let mut mesh = pyramid_mesh();
        let levels = [ContourLevel { value: 0.5, tick: false, label: false }];
        let traces = trace_contours(&mut mesh, &levels, 0.1, 0.1);
        assert_eq!(traces.len(), 1, "a ring around the peak should be one component");
        let trace = &traces[0];
        assert!(trace.points.len() >= 3);
        // A ring samples every spoke edge crossing exactly once each way:
        // first and last points should coincide (closed loop).
        let first = trace.points.first().unwrap();
        let last = trace.points.last().unwrap();
        let d = ((first.0 - last.0).powi(2) + (first.1 - last.1).powi(2)).sqrt();
        assert!(d < 1e-6, "closed contour should return to its start: d={d}");
    }

    #[test]
    fn labels_only_on_true_edge_sides() {
        let mut mesh = pyramid_mesh();
        let levels = [ContourLevel { value: 0.5, tick: false, label: true }];
        let traces = trace_contours(&mut mesh, &levels, 0.1, 0.01);
        // The ring is closed, so per the original rule no labels are ever
        // emitted for it (labels only attach to open contour endpoints).
        for t in &traces {
            assert!(t.labels.is_empty());
        }
    }

    #[test]
    fn open_contour_labels_left_and_right_edges() {
        // A ramp from a Left-tagged corner to a Right-tagged corner: the
        // single mid-level contour should be open and should pick up
        // exactly the two edge labels.
        let pts = vec![
            SamplePoint::new(0.0, 0.0, 0.0, EdgeClass::Left),
            SamplePoint::new(1.0, 0.0, 1.0, EdgeClass::Right),
            SamplePoint::new(0.0, 1.0, 0.0, EdgeClass::Left),
            SamplePoint::new(1.0, 1.0, 1.0, EdgeClass::Right),
        ];
        let mut mesh = TriangleMesh::build(pts).unwrap();
        let levels = [ContourLevel { value: 0.5, tick: false, label: true }];
        let traces = trace_contours(&mut mesh, &levels, 0.1, 0.01);
        assert!(!traces.is_empty());
    }

    #[test]
    fn tick_decoration_adds_points() {
        let mut mesh_plain = pyramid_mesh();
        let mut mesh_ticked = pyramid_mesh();
        let plain = trace_contours(&mut mesh_plain, &[ContourLevel { value: 0.5, tick: false, label: false }], 0.1, 0.1);
        let ticked = trace_contours(&mut mesh_ticked, &[ContourLevel { value: 0.5, tick: true, label: false }], 0.1, 0.1);
        let plain_points: usize = plain.iter().map(|t| t.points.len()).sum();
        let ticked_points: usize = ticked.iter().map(|t| t.points.len()).sum();
        assert!(ticked_points > plain_points, "ticks must inject extra points");
    }

    #[test]
    fn label_history_suppresses_nearby_repeats() {
        let mut history = LabelHistory::new(1.0);
        assert!(history.accept(0.0, 0.0));
        assert!(!history.accept(0.5, 0.0), "within spacing should be rejected");
        assert!(history.accept(5.0, 5.0), "far enough away should be accepted");
    }
}
