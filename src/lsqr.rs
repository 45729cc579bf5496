/*!
LSQR: the iterative solver for `Ax = b`, `min ||Ax - b||`, or the damped
least-squares problem `min ||(A; damp*I)x - (b; 0)||`, via Golub-Kahan
bidiagonalisation with Givens rotations.

Ported from `mblsqr_lsqr` (`original_source/src/mbaux/mb_cheb.c`), following
Paige & Saunders (1982). The sparse matrix `A` is never materialised; the
caller supplies an [`LsqrOperator`] that computes `y += A*x` or
`x += Aᵀ*y`, replacing the original's raw `aprod` function pointer plus
`void *UsrWrk` workspace with a trait object, per the function-pointer
redesign rule.
*/

use crate::blas::{d2norm, daxpy, dcopy, dnrm2, dscal};

/// Which half of the bidiagonalisation step to perform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AprodMode {
    /// `y := y + A*x`; `x` must be left unchanged.
    ComputeY,
    /// `x := x + Aᵀ*y`; `y` must be left unchanged.
    ComputeX,
}

/// The sparse-matrix callback contract consumed by [`lsqr`]. Implementors
/// own whatever representation of `A` they like (dense, CSR, a closure
/// over a stencil); the solver only ever asks for matrix-vector products.
pub trait LsqrOperator {
    fn apply(&mut self, mode: AprodMode, x: &mut [f64], y: &mut [f64]);
}

impl<F> LsqrOperator for F
where
    F: FnMut(AprodMode, &mut [f64], &mut [f64]),
{
    fn apply(&mut self, mode: AprodMode, x: &mut [f64], y: &mut [f64]) {
        (self)(mode, x, y)
    }
}

/// Reason LSQR stopped, mirroring the original `istop` codes 0..5.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Istop {
    /// x = 0 is the exact solution; no iterations were performed.
    ExactZero = 0,
    /// Ax = b is probably compatible, given atol/btol.
    Compatible = 1,
    /// damp = 0; an accurate least-squares solution was found, given atol.
    LeastSquares = 2,
    /// damp != 0; an accurate damped least-squares solution was found.
    DampedLeastSquares = 3,
    /// cond(Abar) exceeded conlim; the system appears ill-conditioned.
    IllConditioned = 4,
    /// The iteration limit itnlim was reached.
    IterationLimit = 5,
}

impl Istop {
    fn from_code(code: u8) -> Istop {
        match code {
            0 => Istop::ExactZero,
            1 => Istop::Compatible,
            2 => Istop::LeastSquares,
            3 => Istop::DampedLeastSquares,
            4 => Istop::IllConditioned,
            _ => Istop::IterationLimit,
        }
    }
}

/// Everything LSQR reports back, beyond the solution vector itself.
#[derive(Debug, Clone)]
pub struct LsqrResult {
    pub x: Vec<f64>,
    pub istop: Istop,
    pub itn: usize,
    pub anorm: f64,
    pub acond: f64,
    pub rnorm: f64,
    pub arnorm: f64,
    pub xnorm: f64,
    /// Standard-error estimates for each component of `x`, present only
    /// when requested.
    pub se: Option<Vec<f64>>,
}

/// Solves `Ax = b` (damp = 0), `min ||Ax-b||`, or the damped variant, via
/// bidiagonalisation. `u` holds `b` on entry (length m) and is overwritten.
/// `wantse` requests the standard-error vector.
///
/// `verbose` gates the original's optional per-iteration `nout` log; when
/// set, one `log::debug!` line is emitted per iteration instead of the
/// source's `fprintf(nout, ...)`, per the structured-logging redesign.
#[allow(clippy::too_many_arguments)]
pub fn lsqr(
    m: usize,
    n: usize,
    op: &mut dyn LsqrOperator,
    damp: f64,
    b: &[f64],
    atol: f64,
    btol: f64,
    conlim: f64,
    itnlim: usize,
    wantse: bool,
    verbose: bool,
) -> LsqrResult {
    let damped = damp > 0.0;
    let ctol = if conlim > 0.0 { 1.0 / conlim } else { 0.0 };

    let mut u = b.to_vec();
    let mut v = vec![0.0_f64; n];
    let mut w = vec![0.0_f64; n];
    let mut x = vec![0.0_f64; n];
    let mut se = if wantse { Some(vec![0.0_f64; n]) } else { None };

    let mut itn: usize = 0;
    let mut istop: u8 = 0;
    let mut nstop: u32 = 0;

    let mut anorm = 0.0_f64;
    let mut acond = 0.0_f64;
    let mut xnorm = 0.0_f64;
    let mut dnorm = 0.0_f64;
    let mut res2 = 0.0_f64;
    let mut psi = 0.0_f64;
    let mut xnorm1 = 0.0_f64;
    let mut cs2 = -1.0_f64;
    let mut sn2 = 0.0_f64;
    let mut z = 0.0_f64;

    let mut alpha = 0.0_f64;
    let mut beta = dnrm2(&u, 1);
    if beta > 0.0 {
        dscal(1.0 / beta, &mut u, 1);
        op.apply(AprodMode::ComputeX, &mut v, &mut u);
        alpha = dnrm2(&v, 1);
    }
    if alpha > 0.0 {
        dscal(1.0 / alpha, &mut v, 1);
        dcopy(&v, 1, &mut w, 1);
    }

    let bnorm = beta;
    let mut rnorm = beta;
    let arnorm0 = alpha * beta;
    let mut rhobar = alpha;
    let mut phibar = beta;

    if arnorm0 == 0.0 {
        // x = 0 is already the exact solution.
        return LsqrResult {
            x,
            istop: Istop::ExactZero,
            itn: 0,
            anorm,
            acond,
            rnorm,
            arnorm: 0.0,
            xnorm,
            se,
        };
    }

    let mut test1;
    let mut test2 = 0.0_f64;
    let mut arnorm = arnorm0;

    loop {
        itn += 1;

        // --- continue the bidiagonalisation: next beta, u, alpha, v ---
        dscal(-alpha, &mut u, 1);
        op.apply(AprodMode::ComputeY, &mut v, &mut u);
        beta = dnrm2(&u, 1);

        let temp = d2norm(d2norm(alpha, beta), damp);
        anorm = d2norm(anorm, temp);

        if beta > 0.0 {
            dscal(1.0 / beta, &mut u, 1);
            dscal(-beta, &mut v, 1);
            op.apply(AprodMode::ComputeX, &mut v, &mut u);
            alpha = dnrm2(&v, 1);
            if alpha > 0.0 {
                dscal(1.0 / alpha, &mut v, 1);
            }
        }

        // --- eliminate the damping parameter with a plane rotation ---
        let mut rhbar1 = rhobar;
        if damped {
            rhbar1 = d2norm(rhobar, damp);
            let cs1 = rhobar / rhbar1;
            let sn1 = damp / rhbar1;
            psi = sn1 * phibar;
            phibar = cs1 * phibar;
        }

        // --- eliminate the subdiagonal element beta ---
        let rho = d2norm(rhbar1, beta);
        let cs = rhbar1 / rho;
        let sn = beta / rho;
        let theta = sn * alpha;
        rhobar = -cs * alpha;
        let phi = cs * phibar;
        phibar = sn * phibar;
        let tau = sn * phi;

        // --- update x, w, and (optionally) se ---
        let t1 = phi / rho;
        let t2 = -theta / rho;
        let t3 = 1.0 / rho;
        let mut dknorm = 0.0_f64;

        if let Some(se) = se.as_mut() {
            for i in 0..n {
                let t = w[i];
                x[i] += t1 * t;
                w[i] = t2 * t + v[i];
                let tt = (t3 * t) * (t3 * t);
                se[i] += tt;
                dknorm += tt;
            }
        } else {
            for i in 0..n {
                let t = w[i];
                x[i] += t1 * t;
                w[i] = t2 * t + v[i];
                dknorm += (t3 * t) * (t3 * t);
            }
        }

        let dknorm = dknorm.sqrt();
        dnorm = d2norm(dnorm, dknorm);

        // --- eliminate the superdiagonal element theta, estimate norm(x) ---
        let delta = sn2 * rho;
        let gambar = -cs2 * rho;
        let rhs = phi - delta * z;
        let zbar = rhs / gambar;
        xnorm = d2norm(xnorm1, zbar);
        let gamma = d2norm(gambar, theta);
        cs2 = gambar / gamma;
        sn2 = theta / gamma;
        z = rhs / gamma;
        xnorm1 = d2norm(xnorm1, z);

        // --- convergence tests ---
        acond = anorm * dnorm;
        res2 = d2norm(res2, psi);
        rnorm = d2norm(res2, phibar);
        arnorm = alpha * tau.abs();

        test1 = rnorm / bnorm;
        test2 = if rnorm > 0.0 { arnorm / (anorm * rnorm) } else { 0.0 };
        let test3 = 1.0 / acond;
        let t1 = test1 / (1.0 + anorm * xnorm / bnorm);
        let rtol = btol + atol * anorm * xnorm / bnorm;

        if itn >= itnlim {
            istop = 5;
        }
        if 1.0 + test3 <= 1.0 {
            istop = 4;
        }
        if 1.0 + test2 <= 1.0 {
            istop = 2;
        }
        if 1.0 + t1 <= 1.0 {
            istop = 1;
        }
        if test3 <= ctol {
            istop = 4;
        }
        if test2 <= atol {
            istop = 2;
        }
        if test1 <= rtol {
            istop = 1;
        }

        if verbose {
            log::debug!(
                "lsqr itn={itn} x0={:.6e} rnorm={rnorm:.6e} test1={test1:.3e} test2={test2:.3e} anorm={anorm:.3e} acond={acond:.3e}",
                x.first().copied().unwrap_or(0.0)
            );
        }

        // require convergence to persist for one iteration before halting.
        if istop == 0 {
            nstop = 0;
        } else {
            nstop += 1;
            if nstop < 1 && itn < itnlim {
                istop = 0;
            }
        }

        if istop != 0 {
            break;
        }
    }

    if let Some(se) = se.as_mut() {
        let mut t = 1.0_f64;
        if m > n {
            t = (m - n) as f64;
        }
        if damped {
            t = m as f64;
        }
        t = rnorm / t.sqrt();
        for v in se.iter_mut() {
            *v = t * v.sqrt();
        }
    }

    if damped && istop == 2 {
        istop = 3;
    }

    // The source reports `arnorm_out = test2`, the normalised residual
    // ratio, not the raw `alpha*|tau|` quantity computed during the loop.
    // Preserved verbatim.
    LsqrResult {
        x,
        istop: Istop::from_code(istop),
        itn,
        anorm,
        acond,
        rnorm,
        arnorm: test2,
        xnorm,
        se,
    }
}

/// Convenience wrapper for a dense matrix stored row-major, used by tests
/// and by small embedded problems that don't need a custom sparse
/// representation.
pub struct DenseOperator<'a> {
    pub rows: usize,
    pub cols: usize,
    pub a: &'a [f64],
}

impl<'a> LsqrOperator for DenseOperator<'a> {
    fn apply(&mut self, mode: AprodMode, x: &mut [f64], y: &mut [f64]) {
        match mode {
            AprodMode::ComputeY => {
                for i in 0..self.rows {
                    let row = &self.a[i * self.cols..(i + 1) * self.cols];
                    let mut s = 0.0;
                    for j in 0..self.cols {
                        s += row[j] * x[j];
                    }
                    y[i] += s;
                }
            }
            AprodMode::ComputeX => {
                for j in 0..self.cols {
                    let mut s = 0.0;
                    for i in 0..self.rows {
                        s += self.a[i * self.cols + j] * y[i];
                    }
                    x[j] += s;
                }
            }
        }
    }
}
