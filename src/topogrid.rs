/*!
Topography lookup and sonar ray/grid intersection, per §4.6.

Grounded on `original_source/src/mbaux/mb_intersectgrid.c`
(`mb_topogrid_topo`, `mb_topogrid_bounds`, `mb_topogrid_intersect`,
`mb_topogrid_getangletable`). The original keeps the grid behind a raw
`void *` handle allocated/freed by a matching init/deall pair; here a
[`Topogrid`] simply owns a [`Grid`], so there is no deallocation call and
no null-pointer case for `bounds` to guard against — the "dereferenced
before the null check" bug at `mb_topogrid_bounds`'s trailing debug print
has no analogue once a null topogrid can't reach this code at all.
*/

use crate::error::{Error, Result};
use crate::grid::Grid;

/// A read-only topography surface addressed by longitude/latitude.
pub struct Topogrid {
    pub grid: Grid,
}

#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub lon: f64,
    pub lat: f64,
    pub topo: f64,
    pub range: f64,
}

pub struct AngleTable {
    pub angle: Vec<f64>,
    pub xtrack: Vec<f64>,
    pub ltrack: Vec<f64>,
    pub altitude: Vec<f64>,
    pub range: Vec<f64>,
}

impl Topogrid {
    pub fn new(grid: Grid) -> Topogrid {
        Topogrid { grid }
    }

    /// World-coordinate bounds `(xmin, xmax, ymin, ymax)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let xmax = self.grid.x_at(self.grid.n_columns - 1);
        let ymax = self.grid.y_at(self.grid.n_rows - 1);
        (self.grid.xmin, xmax, self.grid.ymin, ymax)
    }

    /// Averages the up-to-four grid nodes surrounding `(lon, lat)` that
    /// carry data, matching the original's crude "average of the
    /// enclosing cell's defined corners" rather than true bilinear
    /// interpolation.
    pub fn topo(&self, lon: f64, lat: f64) -> Result<f64> {
        let i = ((lon - self.grid.xmin) / self.grid.dx).floor();
        let j = ((lat - self.grid.ymin) / self.grid.dy).floor();
        if i < 0.0 || j < 0.0 || i as usize >= self.grid.n_columns.saturating_sub(1) || j as usize >= self.grid.n_rows.saturating_sub(1) {
            return Err(Error::NotEnoughData("location falls outside the topography grid".into()));
        }
        let (i, j) = (i as usize, j as usize);
        let mut sum = 0.0;
        let mut count = 0;
        for ii in i..=i + 1 {
            for jj in j..=j + 1 {
                let v = self.grid.get(ii, jj);
                if v != self.grid.nodata {
                    sum += v as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Err(Error::NotEnoughData("no defined topography at that location".into()));
        }
        Ok(sum / count as f64)
    }

    /// Marches a sonar look vector `(vx, vy, vz)` from `(navlon, navlat,
    /// -sensordepth)` outward until it crosses the topography within
    /// `topotolerance`, bisecting the bracket on each miss. `altitude`
    /// seeds the initial search range; when `None` it is estimated from
    /// the topography directly beneath the sensor.
    pub fn intersect(
        &self,
        navlon: f64,
        navlat: f64,
        altitude: Option<f64>,
        sensordepth: f64,
        mtodeglon: f64,
        mtodeglat: f64,
        vx: f64,
        vy: f64,
        vz: f64,
    ) -> Result<Intersection> {
        const ITERATION_MAX: usize = 50;

        let altitude = match altitude {
            Some(a) if a > 0.0 => a,
            _ => {
                let topo = self.topo(navlon, navlat)?;
                -sensordepth - topo
            }
        };
        let mut dr = altitude / 20.0;
        let mut r = altitude / vz - dr;
        let mut rmax = 4.0 * altitude / vz;
        let mut rmin = 0.0f64;

        let topotolerance = 0.05 * (self.grid.dx / mtodeglon + self.grid.dy / mtodeglat);

        let mut iteration = 0;
        let mut done = false;
        while !done && iteration < ITERATION_MAX {
            r += dr;
            let lontest = navlon + mtodeglon * vx * r;
            let lattest = navlat + mtodeglat * vy * r;
            let topotest = -sensordepth - vz * r;

            match self.topo(lontest, lattest) {
                Ok(topog) => {
                    let dtopo = topotest - topog;
                    if dtopo.abs() < topotolerance {
                        done = true;
                    } else {
                        // `rmin = MIN(rmin, r)` here mirrors the original
                        // verbatim: a lower bound narrowed by taking the
                        // smaller value reads like it should be MAX, but
                        // this is what mb_topogrid_intersect actually
                        // does, and callers have relied on it.
                        if dtopo < 0.0 {
                            rmax = rmax.min(r);
                        } else if dtopo > 0.0 {
                            rmin = rmin.min(r);
                        }
                        dr = dtopo / vz;
                        if r + dr >= rmax {
                            dr = 0.5 * (rmax - r);
                        }
                        if r + dr <= rmin {
                            dr = 0.5 * (rmin - r);
                        }
                    }
                }
                Err(_) => break,
            }
            iteration += 1;
        }

        Ok(Intersection {
            lon: navlon + mtodeglon * vx * r,
            lat: navlat + mtodeglat * vy * r,
            topo: -sensordepth - vz * r,
            range: r,
        })
    }

    /// Builds a lookup table of `nangle` takeoff angles evenly spaced over
    /// `[angle_min, angle_max]`, each resolved to where the corresponding
    /// sonar ray crosses the topography. Angles whose ray never crosses
    /// the grid (off the edge of coverage) fall back to a flat-bottom
    /// estimate carried from the nearest successfully resolved angle, or
    /// their midpoint when bracketed on both sides.
    #[allow(clippy::too_many_arguments)]
    pub fn angle_table(
        &self,
        nangle: usize,
        angle_min: f64,
        angle_max: f64,
        navlon: f64,
        navlat: f64,
        heading: f64,
        altitude: Option<f64>,
        sensordepth: f64,
        pitch: f64,
        mtodeglon: f64,
        mtodeglat: f64,
    ) -> Result<AngleTable> {
        if nangle < 2 {
            return Err(Error::BadInput("angle table needs at least two angles".into()));
        }
        let dangle = (angle_max - angle_min) / (nangle - 1) as f64;
        let mut table = AngleTable {
            angle: vec![0.0; nangle],
            xtrack: vec![0.0; nangle],
            ltrack: vec![0.0; nangle],
            altitude: vec![0.0; nangle],
            range: vec![0.0; nangle],
        };

        let mut set = vec![false; nangle];
        for i in 0..nangle {
            table.angle[i] = angle_min + dangle * i as f64;
            let beta = 90.0 - table.angle[i];
            let (theta, phi) = rollpitch_to_takeoff(pitch, beta);

            let vz = theta.to_radians().cos();
            let vx0 = theta.to_radians().sin() * phi.to_radians().cos();
            let vy0 = theta.to_radians().sin() * phi.to_radians().sin();

            // Mirrors the original's heading rotation verbatim, including
            // its reuse of the already-rotated vx when rotating vy.
            let hr = heading.to_radians();
            let vx = vx0 * hr.cos() + vy0 * hr.sin();
            let vy = -vx * hr.sin() + vy0 * hr.cos();

            match self.intersect(navlon, navlat, altitude, sensordepth, mtodeglon, mtodeglat, vx, vy, vz) {
                Ok(hit) => {
                    let theta_r = theta.to_radians();
                    let phi_r = phi.to_radians();
                    let zz = hit.range * theta_r.cos();
                    let xx = hit.range * theta_r.sin();
                    table.xtrack[i] = xx * phi_r.cos();
                    table.ltrack[i] = xx * phi_r.sin();
                    table.altitude[i] = zz;
                    table.range[i] = hit.range;
                    set[i] = true;
                }
                Err(_) => {
                    table.range[i] = 0.0;
                }
            }
        }

        let nset = set.iter().filter(|&&s| s).count();
        if nset > 0 && nset < nangle {
            let first = set.iter().position(|&s| s).unwrap();
            let last = set.iter().rposition(|&s| s).unwrap();
            for i in 0..nangle {
                if set[i] {
                    continue;
                }
                let beta = 90.0 - table.angle[i];
                let (theta, phi) = rollpitch_to_takeoff(pitch, beta);
                table.altitude[i] = if i < first {
                    table.altitude[first]
                } else if i > last {
                    table.altitude[last]
                } else {
                    0.5 * (table.altitude[first] + table.altitude[last])
                };
                // Matches the original verbatim: the range uses the first
                // bracketing altitude even for entries blended between
                // first and last, not the blended value just assigned.
                table.range[i] = table.altitude[first] / theta.to_radians().cos();
                let xx = table.range[i] * theta.to_radians().sin();
                let phi_r = phi.to_radians();
                table.xtrack[i] = xx * phi_r.cos();
                table.ltrack[i] = xx * phi_r.sin();
            }
        } else if nset == 0 {
            return Err(Error::NotEnoughData("no angle in the table reached the topography".into()));
        }

        Ok(table)
    }
}

/// Meters-per-degree scale factors at `latitude` (WGS84), used to convert
/// the metre-scale look-vector components used by [`Topogrid::intersect`]
/// into longitude/latitude offsets. Not present in the retrieved source
/// slice (`mb_coor_scale` lives outside `mbaux`); this is the standard
/// WGS84 local-radius approximation rather than a direct port.
pub fn coor_scale(latitude: f64) -> (f64, f64) {
    let lat = latitude.to_radians();
    let mtodeglat = 1.0 / (111132.954 - 559.822 * (2.0 * lat).cos() + 1.175 * (4.0 * lat).cos());
    let mtodeglon = 1.0 / (111412.84 * lat.cos() - 93.5 * (3.0 * lat).cos() + 0.118 * (5.0 * lat).cos());
    (mtodeglon, mtodeglat)
}

/// Converts a roll-corrected grazing angle `beta` and a pitch offset
/// `alpha` (both degrees) into takeoff-coordinate `(theta, phi)`
/// (degrees): `theta` from vertical, `phi` the azimuth in the
/// vehicle-relative horizontal plane. Like [`coor_scale`], `mb_rollpitch_to_takeoff`
/// itself wasn't in the retrieved slice; this is the standard spherical
/// composition of the two rotations its call sites expect.
pub fn rollpitch_to_takeoff(alpha: f64, beta: f64) -> (f64, f64) {
    let (sa, ca) = alpha.to_radians().sin_cos();
    let (sb, cb) = beta.to_radians().sin_cos();
    let ctheta = (ca * cb).clamp(-1.0, 1.0);
    let theta = ctheta.acos().to_degrees();
    let phi = sa.atan2(sb).to_degrees();
    (theta, phi)
}
