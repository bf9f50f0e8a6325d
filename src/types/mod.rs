//! Core value types

pub mod spatial;

pub use spatial::{Bounds, Point, Point2, Point3, RigidTransform, Transform2, Transform3};
