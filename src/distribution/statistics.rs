//! Incremental Gaussian sufficient statistics
//!
//! Welford-style running mean and scatter matrix. The covariance is only
//! considered well defined once the sample count exceeds the dimension and
//! the matrix is positive definite; before that every density query is 0.

use crate::types::Point;
use nalgebra::{Cholesky, SMatrix, SVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Relative pivot threshold below which a covariance is treated as singular
const DEGENERATE_EPS: f64 = 1e-10;

/// Raw sufficient statistics of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics<const D: usize> {
    count: u64,
    mean: SVector<f64, D>,
    /// Sum of outer products of deviations from the running mean
    scatter: SMatrix<f64, D, D>,
}

impl<const D: usize> Default for Statistics<D> {
    fn default() -> Self {
        Self {
            count: 0,
            mean: SVector::zeros(),
            scatter: SMatrix::zeros(),
        }
    }
}

impl<const D: usize> Statistics<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(count: u64, mean: SVector<f64, D>, scatter: SMatrix<f64, D, D>) -> Self {
        Self { count, mean, scatter }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> &SVector<f64, D> {
        &self.mean
    }

    #[inline]
    pub fn scatter(&self) -> &SMatrix<f64, D, D> {
        &self.scatter
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Incorporate one sample
    pub fn add(&mut self, p: &Point<D>) {
        self.count += 1;
        let n = self.count as f64;

        let delta = p - self.mean;
        self.mean += delta / n;
        let delta_new = p - self.mean;
        self.scatter += delta * delta_new.transpose();
    }

    /// Pointwise union with another cell's statistics (Chan et al.)
    pub fn merge(&mut self, other: &Statistics<D>) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;

        self.mean += delta * (nb / n);
        self.scatter += other.scatter + delta * delta.transpose() * (na * nb / n);
        self.count += other.count;
    }

    /// Unbiased sample covariance, `None` below two samples
    pub fn covariance(&self) -> Option<SMatrix<f64, D, D>> {
        if self.count < 2 {
            return None;
        }
        let cov = self.scatter / (self.count - 1) as f64;
        Some((cov + cov.transpose()) * 0.5)
    }

    /// Minimum sample count for a non-degenerate covariance
    #[inline]
    pub const fn min_samples() -> u64 {
        D as u64 + 1
    }

    /// Evaluable Gaussian, `None` while the statistic is degenerate
    pub fn gaussian(&self) -> Option<Gaussian<D>> {
        if self.count < Self::min_samples() {
            return None;
        }
        let covariance = self.covariance()?;
        let cholesky = Cholesky::new(covariance)?;

        let l = cholesky.l();
        let scale = (0..D).fold(0.0f64, |acc, i| acc.max(covariance[(i, i)]));
        if (0..D).any(|i| l[(i, i)] * l[(i, i)] <= DEGENERATE_EPS * scale) {
            return None;
        }
        let sqrt_det: f64 = (0..D).map(|i| l[(i, i)]).product();
        if !(sqrt_det.is_finite() && sqrt_det > 0.0) {
            return None;
        }

        Some(Gaussian {
            mean: self.mean,
            inverse_covariance: cholesky.inverse(),
            normalizer: 1.0 / ((2.0 * PI).powi(D as i32).sqrt() * sqrt_det),
        })
    }

    pub fn evaluate(&self, p: &Point<D>) -> f64 {
        self.gaussian().map_or(0.0, |g| g.evaluate(p))
    }

    pub fn evaluate_non_normalized(&self, p: &Point<D>) -> f64 {
        self.gaussian().map_or(0.0, |g| g.evaluate_non_normalized(p))
    }
}

/// Mean, inverse covariance and normalization constant of a fitted cell
#[derive(Debug, Clone)]
pub struct Gaussian<const D: usize> {
    mean: SVector<f64, D>,
    inverse_covariance: SMatrix<f64, D, D>,
    normalizer: f64,
}

impl<const D: usize> Gaussian<D> {
    #[inline]
    fn mahalanobis_squared(&self, p: &Point<D>) -> f64 {
        let q = p - self.mean;
        q.dot(&(self.inverse_covariance * q))
    }

    #[inline]
    pub fn evaluate(&self, p: &Point<D>) -> f64 {
        self.normalizer * self.evaluate_non_normalized(p)
    }

    #[inline]
    pub fn evaluate_non_normalized(&self, p: &Point<D>) -> f64 {
        (-0.5 * self.mahalanobis_squared(p)).exp()
    }

    pub fn normalizer(&self) -> f64 {
        self.normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point2, Point3};

    fn cloud() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.5),
            Point2::new(0.5, 1.0),
            Point2::new(-0.5, 0.25),
            Point2::new(0.25, -0.75),
        ]
    }

    #[test]
    fn test_running_mean_and_covariance() {
        let mut stats = Statistics::<2>::new();
        for p in cloud() {
            stats.add(&p);
        }
        assert_eq!(stats.count(), 5);

        let n = 5.0;
        let mean = cloud().iter().fold(Point2::zeros(), |acc, p| acc + p) / n;
        assert!((stats.mean() - mean).norm() < 1e-12);

        let mut cov = SMatrix::<f64, 2, 2>::zeros();
        for p in cloud() {
            let d = p - mean;
            cov += d * d.transpose();
        }
        cov /= n - 1.0;
        assert!((stats.covariance().unwrap() - cov).norm() < 1e-12);
    }

    #[test]
    fn test_degenerate_returns_zero() {
        let mut stats = Statistics::<2>::new();
        assert_eq!(stats.evaluate(&Point2::zeros()), 0.0);

        stats.add(&Point2::new(1.0, 1.0));
        stats.add(&Point2::new(2.0, 2.0));
        assert_eq!(stats.evaluate(&Point2::new(1.5, 1.5)), 0.0);

        // collinear samples: singular covariance
        stats.add(&Point2::new(3.0, 3.0));
        assert_eq!(stats.evaluate(&Point2::new(1.5, 1.5)), 0.0);
        assert_eq!(stats.evaluate_non_normalized(&Point2::new(1.5, 1.5)), 0.0);
    }

    #[test]
    fn test_density_peaks_at_mean() {
        let mut stats = Statistics::<2>::new();
        for p in cloud() {
            stats.add(&p);
        }
        let mean = *stats.mean();
        assert!((stats.evaluate_non_normalized(&mean) - 1.0).abs() < 1e-12);

        let g = stats.gaussian().unwrap();
        assert!((stats.evaluate(&mean) - g.normalizer()).abs() < 1e-12);
        assert!(stats.evaluate(&(mean + Point2::new(2.0, 0.0))) < stats.evaluate(&mean));
    }

    #[test]
    fn test_unit_gaussian_normalizer_3d() {
        let mut stats = Statistics::<3>::new();
        let axes = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        for p in axes {
            stats.add(&p);
        }
        // covariance = diag(2/5)
        let var: f64 = 2.0 / 5.0;
        let expected = 1.0 / ((2.0 * PI).powi(3) * var.powi(3)).sqrt();
        assert!((stats.evaluate(&Point3::zeros()) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let points = cloud();
        let mut all = Statistics::<2>::new();
        let mut left = Statistics::<2>::new();
        let mut right = Statistics::<2>::new();
        for (i, p) in points.iter().enumerate() {
            all.add(p);
            if i < 2 {
                left.add(p);
            } else {
                right.add(p);
            }
        }
        left.merge(&right);
        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).norm() < 1e-12);
        assert!((left.scatter() - all.scatter()).norm() < 1e-12);

        let mut empty = Statistics::<2>::new();
        empty.merge(&all);
        assert_eq!(empty, all);
    }
}
