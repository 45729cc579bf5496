/*!
Collaborator contracts the core consumes but never implements, per §6.

The original C threads five separate function pointers
(`contour_plot`, `contour_newpen`, `contour_setline`, `contour_justify`,
`contour_plot_string`, plus the grid-file read/write pair) through every
call that needs them. Each caller built and passed its own struct of
pointers; here that becomes one trait per collaborator role, implemented
once by whatever embeds the core.
*/

use crate::error::Result;
use crate::grid::Grid;

/// Pen state for [`PlotSink::plot`], matching the contour tracer's own
/// move/draw/stroke sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pen {
    Move,
    Draw,
    Stroke,
}

/// Plotting surface consumed by the contour tracer (and any caller that
/// draws ship tracks alongside it). Bundles the five capabilities the
/// original passes as separate function pointers into one trait
/// implemented once per caller.
pub trait PlotSink {
    fn plot(&mut self, x: f64, y: f64, pen: Pen);
    fn new_pen(&mut self, color_index: i32);
    fn set_line(&mut self, linewidth_index: i32);
    /// Returns `(width, advance)` of `s` set at `height`.
    fn measure_string(&self, height: f64, s: &str) -> (f64, f64);
    fn plot_string(&mut self, x: f64, y: f64, height: f64, angle_deg: f64, s: &str);
}

/// Grid persistence consumed by [`crate::topogrid`]. The core never reads
/// or writes a grid file itself; a caller supplies both directions.
pub trait GridProvider {
    fn read_grid(&self, path: &str) -> Result<Grid>;
    fn write_grid(&self, path: &str, grid: &Grid, title: &str, projection_label: &str) -> Result<()>;
}

/// A finite source of scattered `(x, y, z)` samples, consumed by
/// [`crate::surface::surface`] and [`crate::zgrid::zgrid`]. Neither
/// algorithm assumes any particular iteration order.
pub trait SampleSource {
    fn samples(&self) -> Vec<(f64, f64, f32)>;
}

impl SampleSource for [(f64, f64, f32)] {
    fn samples(&self) -> Vec<(f64, f64, f32)> {
        self.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        ops: Vec<String>,
    }

    impl PlotSink for RecordingSink {
        fn plot(&mut self, x: f64, y: f64, pen: Pen) {
            self.ops.push(format!("plot({x},{y},{pen:?})"));
        }
        fn new_pen(&mut self, color_index: i32) {
            self.ops.push(format!("new_pen({color_index})"));
        }
        fn set_line(&mut self, linewidth_index: i32) {
            self.ops.push(format!("set_line({linewidth_index})"));
        }
        fn measure_string(&self, height: f64, s: &str) -> (f64, f64) {
            (s.len() as f64 * height, s.len() as f64 * height)
        }
        fn plot_string(&mut self, x: f64, y: f64, height: f64, angle_deg: f64, s: &str) {
            self.ops.push(format!("plot_string({x},{y},{height},{angle_deg},{s})"));
        }
    }

    #[test]
    fn plot_sink_records_expected_call_sequence() {
        let mut sink = RecordingSink { ops: Vec::new() };
        sink.new_pen(3);
        sink.plot(0.0, 0.0, Pen::Move);
        sink.plot(1.0, 1.0, Pen::Draw);
        sink.plot(1.0, 1.0, Pen::Stroke);
        assert_eq!(sink.ops, vec!["new_pen(3)", "plot(0,0,Move)", "plot(1,1,Draw)", "plot(1,1,Stroke)"]);
    }

    #[test]
    fn sample_slice_implements_sample_source() {
        let samples: &[(f64, f64, f32)] = &[(0.0, 0.0, 1.0), (1.0, 1.0, 2.0)];
        assert_eq!(samples.samples().len(), 2);
    }
}
