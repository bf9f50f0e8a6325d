//! Spatial primitives: points, rigid poses and axis-aligned bounds

use nalgebra::{Isometry2, Isometry3, Rotation2, SMatrix, SVector};
use serde::{Deserialize, Serialize};

/// D-dimensional point (column vector)
pub type Point<const D: usize> = SVector<f64, D>;

pub type Point2 = Point<2>;
pub type Point3 = Point<3>;

/// Rigid transform `p' = R * p + t`
///
/// Used as the world↔map pose of a grid. Both frames share units; only
/// rotation and translation are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform<const D: usize> {
    rotation: SMatrix<f64, D, D>,
    translation: SVector<f64, D>,
}

pub type Transform2 = RigidTransform<2>;
pub type Transform3 = RigidTransform<3>;

impl<const D: usize> Default for RigidTransform<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> RigidTransform<D> {
    /// Create from a rotation matrix and a translation.
    ///
    /// The rotation is taken as given (orthonormal, det = +1).
    pub fn new(rotation: SMatrix<f64, D, D>, translation: SVector<f64, D>) -> Self {
        Self { rotation, translation }
    }

    pub fn identity() -> Self {
        Self {
            rotation: SMatrix::identity(),
            translation: SVector::zeros(),
        }
    }

    pub fn from_translation(translation: SVector<f64, D>) -> Self {
        Self {
            rotation: SMatrix::identity(),
            translation,
        }
    }

    #[inline]
    pub fn rotation(&self) -> &SMatrix<f64, D, D> {
        &self.rotation
    }

    #[inline]
    pub fn translation(&self) -> &SVector<f64, D> {
        &self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        let translation = -(rotation * self.translation);
        Self { rotation, translation }
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    #[inline]
    pub fn transform_point(&self, p: &Point<D>) -> Point<D> {
        self.rotation * p + self.translation
    }
}

impl RigidTransform<2> {
    /// Planar pose from position and heading (radians)
    pub fn planar(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            rotation: Rotation2::new(yaw).into_inner(),
            translation: SVector::<f64, 2>::new(x, y),
        }
    }

    pub fn yaw(&self) -> f64 {
        self.rotation[(1, 0)].atan2(self.rotation[(0, 0)])
    }
}

impl From<Isometry2<f64>> for RigidTransform<2> {
    fn from(iso: Isometry2<f64>) -> Self {
        Self {
            rotation: iso.rotation.to_rotation_matrix().into_inner(),
            translation: iso.translation.vector,
        }
    }
}

impl From<Isometry3<f64>> for RigidTransform<3> {
    fn from(iso: Isometry3<f64>) -> Self {
        Self {
            rotation: iso.rotation.to_rotation_matrix().into_inner(),
            translation: iso.translation.vector,
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<const D: usize> {
    pub min: Point<D>,
    pub max: Point<D>,
}

impl<const D: usize> Bounds<D> {
    pub fn from_point(point: Point<D>) -> Self {
        Self { min: point, max: point }
    }

    /// Smallest box containing both corners, in any order
    pub fn from_corners(a: Point<D>, b: Point<D>) -> Self {
        let mut bounds = Self::from_point(a);
        bounds.expand(&b);
        bounds
    }

    pub fn contains(&self, point: &Point<D>) -> bool {
        (0..D).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    pub fn expand(&mut self, point: &Point<D>) {
        for axis in 0..D {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    pub fn extent(&self) -> Point<D> {
        self.max - self.min
    }

    /// World-frame hull of this box after applying `transform`
    pub fn transformed(&self, transform: &RigidTransform<D>) -> Self {
        let mut hull: Option<Bounds<D>> = None;
        for corner in 0..(1usize << D) {
            let mut p = self.min;
            for axis in 0..D {
                if corner & (1 << axis) != 0 {
                    p[axis] = self.max[axis];
                }
            }
            let p = transform.transform_point(&p);
            match hull.as_mut() {
                Some(h) => h.expand(&p),
                None => hull = Some(Bounds::from_point(p)),
            }
        }
        hull.unwrap_or(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform2::planar(1.0, -2.0, 0.7);
        let p = Point2::new(3.5, 4.25);
        let back = t.inverse().transform_point(&t.transform_point(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn test_compose_order() {
        let rotate = Transform2::planar(0.0, 0.0, FRAC_PI_2);
        let shift = Transform2::from_translation(Point2::new(1.0, 0.0));
        // shift first, then rotate
        let p = rotate.compose(&shift).transform_point(&Point2::zeros());
        assert!((p - Point2::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_from_isometry3() {
        let iso = Isometry3::translation(1.0, 2.0, 3.0);
        let t: Transform3 = iso.into();
        let p = t.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Point3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_yaw() {
        let t = Transform2::planar(0.0, 0.0, 0.3);
        assert!((t.yaw() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_contains_and_transform() {
        let b = Bounds::from_corners(Point2::new(2.0, 2.0), Point2::new(0.0, 0.0));
        assert!(b.contains(&Point2::new(1.0, 1.0)));
        assert!(!b.contains(&Point2::new(3.0, 1.0)));

        let rotated = b.transformed(&Transform2::planar(0.0, 0.0, FRAC_PI_2));
        assert!((rotated.min - Point2::new(-2.0, 0.0)).norm() < 1e-12);
        assert!((rotated.max - Point2::new(0.0, 2.0)).norm() < 1e-12);
        assert!((rotated.extent() - Point2::new(2.0, 2.0)).norm() < 1e-12);
    }
}
