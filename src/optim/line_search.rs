//! Polynomial step estimates for the bracketing line search
//!
//! Points are `(x, f, d)`: the step along the search direction, the
//! objective there and its slope along the direction. The objective is
//! minimized.

/// Extrapolated step of the cubic through `(x1, f1, d1)` and `(x2, f2, d2)`.
///
/// Returns `None` on numerical trouble or if the minimizer lies behind the
/// origin.
#[inline]
pub(crate) fn cubic_extrapolation(
    x1: f64,
    f1: f64,
    d1: f64,
    x2: f64,
    f2: f64,
    d2: f64,
) -> Option<f64> {
    let dx = x2 - x1;
    let a = 6.0 * (f1 - f2) + 3.0 * (d2 + d1) * dx;
    let b = 3.0 * (f2 - f1) - (2.0 * d1 + d2) * dx;
    let x3 = x1 - d1 * dx * dx / (b + (b * b - a * d1 * dx).sqrt());
    if x3.is_finite() && x3 >= 0.0 {
        Some(x3)
    } else {
        None
    }
}

/// Minimum of the quadratic through `(x2, f2)` and `(x4, f4)` with slope
/// `d2` at `x2`
#[inline]
pub(crate) fn quad_interpolation(
    x2: f64,
    f2: f64,
    d2: f64,
    x4: f64,
    f4: f64,
) -> Option<f64> {
    let dx = x4 - x2;
    let x3 = x2 - (0.5 * d2 * dx * dx) / (f4 - f2 - d2 * dx);
    x3.is_finite().then_some(x3)
}

/// Minimum of the cubic through `(x2, f2, d2)` and `(x4, f4, d4)`
#[inline]
pub(crate) fn cubic_interpolation(
    x2: f64,
    f2: f64,
    d2: f64,
    x4: f64,
    f4: f64,
    d4: f64,
) -> Option<f64> {
    let dx = x4 - x2;
    let a = 6.0 * (f2 - f4) / dx + 3.0 * (d4 + d2);
    let b = 3.0 * (f4 - f2) - (2.0 * d2 + d4) * dx;
    let x3 = x2 + ((b * b - a * d2 * dx * dx).sqrt() - b) / a;
    x3.is_finite().then_some(x3)
}

#[cfg(test)]
mod tests {
    use super::*;

    // f(x) = (x - 2)^2, f'(x) = 2 (x - 2)
    fn parabola(x: f64) -> (f64, f64) {
        ((x - 2.0).powi(2), 2.0 * (x - 2.0))
    }

    #[test]
    fn quadratic_interpolation_is_exact_on_parabola() {
        let (f2, d2) = parabola(0.0);
        let (f4, _) = parabola(5.0);
        let x3 = quad_interpolation(0.0, f2, d2, 5.0, f4).unwrap();
        assert::close(x3, 2.0, 1E-12);
    }

    #[test]
    fn cubic_interpolation_is_exact_on_cubic() {
        // f(x) = x^3 - 3x has its local minimum at x = 1
        let f = |x: f64| (x.powi(3) - 3.0 * x, 3.0 * x * x - 3.0);
        let (f2, d2) = f(0.0);
        let (f4, d4) = f(2.0);
        let x3 = cubic_interpolation(0.0, f2, d2, 2.0, f4, d4).unwrap();
        assert::close(x3, 1.0, 1E-10);
    }

    #[test]
    fn cubic_extrapolation_moves_forward() {
        // still descending at both points
        let (f1, d1) = parabola(0.0);
        let (f2, d2) = parabola(1.0);
        let x3 = cubic_extrapolation(0.0, f1, d1, 1.0, f2, d2).unwrap();
        assert::close(x3, 2.0, 1E-10);
    }

    #[test]
    fn degenerate_points_give_none() {
        assert!(quad_interpolation(1.0, 0.0, 0.0, 1.0, 0.0).is_none());
        assert!(cubic_extrapolation(0.0, 0.0, 1.0, 0.0, 0.0, 1.0).is_none());
    }
}
