//! The `*scal`-shaped seam a strided buffer operation can dispatch through
//! when a real BLAS binding is linked in: only the contract lives here, not
//! a binding. Shaped as a trait seam with a pure-Rust default, so a caller
//! can swap in a SIMD/FFI implementation without touching call sites.

use num_complex::Complex64;

/// One BLAS Level-1 operation: scale `n` strided elements of `x` by `alpha`
/// in place, matching the classic `zscal`/`cscal` contract.
pub trait ScalKernel {
    fn scal(&self, n: usize, alpha: Complex64, x: &mut [Complex64], incx: usize);
}

/// The default kernel used when no BLAS binding is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PureRustScal;

impl ScalKernel for PureRustScal {
    fn scal(&self, n: usize, alpha: Complex64, x: &mut [Complex64], incx: usize) {
        if incx == 0 {
            return;
        }
        for i in 0..n {
            let idx = i * incx;
            if idx >= x.len() {
                break;
            }
            x[idx] *= alpha;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scal_multiplies_every_strided_element() {
        let mut x = vec![Complex64::new(1.0, 0.0); 6];
        PureRustScal.scal(3, Complex64::new(2.0, 0.0), &mut x, 2);
        assert_eq!(x[0], Complex64::new(2.0, 0.0));
        assert_eq!(x[1], Complex64::new(1.0, 0.0));
        assert_eq!(x[2], Complex64::new(2.0, 0.0));
        assert_eq!(x[4], Complex64::new(2.0, 0.0));
    }

    #[test]
    fn scal_stops_at_buffer_end() {
        let mut x = vec![Complex64::new(1.0, 0.0); 2];
        PureRustScal.scal(10, Complex64::new(2.0, 0.0), &mut x, 1);
        assert_eq!(x, vec![Complex64::new(2.0, 0.0); 2]);
    }
}
