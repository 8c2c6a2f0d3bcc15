//! Vectorized slice primitives shared by the operator transforms and the solver.
//!
//! Every routine walks its slices in `f64x4` lanes and finishes the remainder
//! with a scalar tail. Callers guarantee equal slice lengths; the routines
//! `debug_assert` it and otherwise operate on the shorter prefix.
use wide::f64x4;

const LANES: usize = 4;

#[inline(always)]
fn load(chunk: &[f64]) -> f64x4 {
    f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]])
}

#[inline(always)]
fn store(chunk: &mut [f64], v: f64x4) {
    chunk.copy_from_slice(&v.to_array());
}

/// `dest = alpha * src`
#[inline]
pub fn scale_into(dest: &mut [f64], src: &[f64], alpha: f64) {
    debug_assert_eq!(dest.len(), src.len());
    let a = f64x4::splat(alpha);
    let mut d = dest.chunks_exact_mut(LANES);
    let mut s = src.chunks_exact(LANES);
    for (dc, sc) in (&mut d).zip(&mut s) {
        store(dc, load(sc) * a);
    }
    for (dv, sv) in d.into_remainder().iter_mut().zip(s.remainder()) {
        *dv = alpha * *sv;
    }
}

/// `dest += src`
#[inline]
pub fn add_assign(dest: &mut [f64], src: &[f64]) {
    debug_assert_eq!(dest.len(), src.len());
    let mut d = dest.chunks_exact_mut(LANES);
    let mut s = src.chunks_exact(LANES);
    for (dc, sc) in (&mut d).zip(&mut s) {
        let sum = load(dc) + load(sc);
        store(dc, sum);
    }
    for (dv, sv) in d.into_remainder().iter_mut().zip(s.remainder()) {
        *dv += *sv;
    }
}

/// `y += alpha * x`
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    let a = f64x4::splat(alpha);
    let mut yc = y.chunks_exact_mut(LANES);
    let mut xc = x.chunks_exact(LANES);
    for (yv, xv) in (&mut yc).zip(&mut xc) {
        let r = load(yv) + a * load(xv);
        store(yv, r);
    }
    for (yv, xv) in yc.into_remainder().iter_mut().zip(xc.remainder()) {
        *yv += alpha * *xv;
    }
}

/// Inner product of two equal-length slices.
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let mut acc = f64x4::splat(0.0);
    let xc = x.chunks_exact(LANES);
    let yc = y.chunks_exact(LANES);
    let tail: f64 = xc.remainder().iter().zip(yc.remainder()).map(|(a, b)| a * b).sum();
    for (xv, yv) in xc.zip(yc) {
        acc += load(xv) * load(yv);
    }
    acc.to_array().iter().sum::<f64>() + tail
}

#[inline]
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}
