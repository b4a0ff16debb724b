use itertools::Itertools;

/// Squared Euclidean distance between two patterns, each axis divided by
/// `scale`
#[inline]
#[must_use]
pub fn e2_norm(x1: &[f64], x2: &[f64], scale: f64) -> f64 {
    x1.iter().zip_eq(x2.iter()).fold(0.0, |acc, (a, b)| {
        let diff = (a - b) / scale;
        diff.mul_add(diff, acc)
    })
}

/// Squared Euclidean distance with a separate length-scale per axis
#[inline]
#[must_use]
pub fn e2_norm_ard(x1: &[f64], x2: &[f64], scales: &[f64]) -> f64 {
    itertools::izip!(x1, x2, scales).fold(0.0, |acc, (a, b, l)| {
        let diff = (a - b) / l;
        diff.mul_add(diff, acc)
    })
}

/// Plain dot product of two patterns
#[inline]
#[must_use]
pub fn dot(x1: &[f64], x2: &[f64]) -> f64 {
    x1.iter()
        .zip_eq(x2.iter())
        .fold(0.0, |acc, (a, b)| a.mul_add(*b, acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_distance() {
        assert::close(e2_norm(&[1.0, 2.0], &[3.0, 4.0], 1.0), 8.0, 1E-12);
        assert::close(e2_norm(&[1.0, 2.0], &[3.0, 4.0], 2.0), 2.0, 1E-12);
        assert::close(
            e2_norm_ard(&[1.0, 2.0], &[3.0, 4.0], &[1.0, 2.0]),
            5.0,
            1E-12,
        );
    }

    #[test]
    fn dot_product() {
        assert::close(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0, 1E-12);
    }
}
