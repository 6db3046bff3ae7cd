//! Ellipse summaries of cluster spread, for plotting.

use crate::linalg::symmetric_eigen_2x2;
use serde::{Deserialize, Serialize};

/// A rotated ellipse: center, major-axis angle from the x-axis (radians) and axis lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Center point.
    pub mean: [f64; 2],
    /// Rotation of the major axis, in `[-π/2, π/2]`.
    pub angle: f64,
    /// Length along the direction of largest spread.
    pub major_axis: f64,
    /// Length along the orthogonal direction.
    pub minor_axis: f64,
}

impl Ellipse {
    /// Ellipse at two standard deviations of a Gaussian component.
    ///
    /// Each axis length is `2·√2·√λ` for the corresponding covariance
    /// eigenvalue λ; the larger one is reported as the major axis and the
    /// angle follows its eigenvector.
    pub fn from_gaussian(mean: [f64; 2], covariance: [[f64; 2]; 2]) -> Self {
        let (values, vectors) = symmetric_eigen_2x2(covariance);
        let mut pairs = [(values[0], vectors[0]), (values[1], vectors[1])];
        pairs.sort_by(|p, q| q.0.total_cmp(&p.0));
        let [(lambda, v), (minor, _)] = pairs;
        let axis = |lambda: f64| 2.0 * std::f64::consts::SQRT_2 * lambda.max(0.0).sqrt();

        let angle = if v[0] == 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            (v[1] / v[0]).atan()
        };

        Self {
            mean,
            angle,
            major_axis: axis(lambda),
            minor_axis: axis(minor),
        }
    }

    /// Axis-aligned ellipse for trees lying on the x-axis.
    ///
    /// Centered at `(mean(x), 0)`; the major axis reaches the farthest point
    /// and never drops below `minor_axis`, which the caller supplies because
    /// the points themselves have no vertical spread.
    pub fn from_linear(x: &[f64], minor_axis: f64) -> Self {
        if x.is_empty() {
            return Self {
                mean: [0.0, 0.0],
                angle: 0.0,
                major_axis: minor_axis,
                minor_axis,
            };
        }

        let center = x.iter().sum::<f64>() / x.len() as f64;
        let max = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let extent = (max - center).abs().max((min - center).abs());

        Self {
            mean: [center, 0.0],
            angle: 0.0,
            major_axis: extent.max(minor_axis),
            minor_axis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_4, SQRT_2};

    #[test]
    fn axis_aligned_gaussian() {
        let e = Ellipse::from_gaussian([0.5, 0.5], [[4.0, 0.0], [0.0, 1.0]]);
        assert_eq!(e.mean, [0.5, 0.5]);
        assert!(e.angle.abs() < 1e-9);
        assert!((e.major_axis - 4.0 * SQRT_2).abs() < 1e-9);
        assert!((e.minor_axis - 2.0 * SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn major_axis_follows_larger_variance() {
        // Larger variance along y: the ellipse stands upright.
        let e = Ellipse::from_gaussian([0.0, 0.0], [[1.0, 0.0], [0.0, 9.0]]);
        assert!((e.angle.abs() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((e.major_axis - 6.0 * SQRT_2).abs() < 1e-9);
        assert!((e.minor_axis - 2.0 * SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn rank_deficient_covariance_has_zero_minor_axis() {
        let e = Ellipse::from_gaussian([0.0, 0.0], [[1.0, 1.0], [1.0, 1.0]]);
        assert!(e.minor_axis.abs() < 1e-6);
        assert!((e.major_axis - 4.0).abs() < 1e-9);
        assert!((e.angle - FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn diagonal_correlation_rotates_45_degrees() {
        let e = Ellipse::from_gaussian([0.0, 0.0], [[2.0, 1.0], [1.0, 2.0]]);
        assert!((e.angle - FRAC_PI_4).abs() < 1e-9);
        assert!((e.major_axis - 2.0 * SQRT_2 * 3.0f64.sqrt()).abs() < 1e-9);
        assert!((e.minor_axis - 2.0 * SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn linear_ellipse_reaches_farthest_point() {
        let e = Ellipse::from_linear(&[0.1, 0.2, 0.6], 0.05);
        assert!((e.mean[0] - 0.3).abs() < 1e-12);
        assert_eq!(e.mean[1], 0.0);
        assert_eq!(e.angle, 0.0);
        assert!((e.major_axis - 0.3).abs() < 1e-12);
        assert_eq!(e.minor_axis, 0.05);
    }

    #[test]
    fn single_point_linear_ellipse_is_circle() {
        let e = Ellipse::from_linear(&[0.4], 0.01);
        assert_eq!(e.major_axis, 0.01);
        assert_eq!(e.minor_axis, 0.01);
    }

    proptest! {
        #[test]
        fn axes_are_ordered_and_nonnegative(
            a in 0.0f64..5.0,
            c in 0.0f64..5.0,
            rho in -0.99f64..0.99,
            mx in -1.0f64..1.0,
            my in -1.0f64..1.0,
        ) {
            let b = rho * (a * c).sqrt();
            let e = Ellipse::from_gaussian([mx, my], [[a, b], [b, c]]);
            prop_assert!(e.major_axis >= e.minor_axis);
            prop_assert!(e.minor_axis >= 0.0);
            prop_assert!(e.angle.abs() <= std::f64::consts::FRAC_PI_2 + 1e-12);
        }

        #[test]
        fn linear_axes_are_ordered(
            xs in proptest::collection::vec(0.0f64..1.0, 1..30),
            minor in 0.0f64..0.5,
        ) {
            let e = Ellipse::from_linear(&xs, minor);
            prop_assert!(e.major_axis >= e.minor_axis);
            prop_assert!(e.minor_axis >= 0.0);
        }
    }
}
