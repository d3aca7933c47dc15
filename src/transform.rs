use std::ops::Neg;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::math::deg_to_rad;

/// An affine transform, stored alongside its inverse so that neither needs to be recomputed when
/// moving between world and object space.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f32>,
    inverse: Matrix4<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    pub fn new() -> Self {
        Self {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    /// Append a translation to this transform.
    pub fn translate(mut self, vec: &Vector3<f32>) -> Self {
        self.matrix.append_translation_mut(vec);
        self.inverse.prepend_translation_mut(&vec.neg());
        self
    }

    /// Append a non-uniform scaling to this transform. Zero components produce a degenerate
    /// inverse.
    pub fn scale(mut self, amount: &Vector3<f32>) -> Self {
        self.matrix.append_nonuniform_scaling_mut(amount);
        self.inverse
            .prepend_nonuniform_scaling_mut(&amount.map(|x| 1.0 / x));
        self
    }

    /// Append an axis-angle rotation, with the angle in radians.
    pub fn rotate(mut self, axis: &Vector3<f32>, angle: f32) -> Self {
        let axisangle = axis.normalize() * angle;
        self.matrix = Matrix4::new_rotation(axisangle) * self.matrix;
        self.inverse *= Matrix4::new_rotation(axisangle.neg());
        self
    }

    /// Append a yaw/pitch/roll rotation given in degrees as `(pitch, yaw, roll)` about the x, y
    /// and z axes. The composite is `Ry * Rx * Rz`.
    pub fn rotate_euler(self, degrees: &Vector3<f32>) -> Self {
        self.rotate(&Vector3::z(), deg_to_rad(degrees.z))
            .rotate(&Vector3::x(), deg_to_rad(degrees.x))
            .rotate(&Vector3::y(), deg_to_rad(degrees.y))
    }
}

pub trait ApplyTransform {
    fn apply(&self, transform: &Transform) -> Self;
    fn invert(&self, transform: &Transform) -> Self;
}

impl ApplyTransform for Point3<f32> {
    #[inline]
    fn apply(&self, transform: &Transform) -> Self {
        transform.matrix.transform_point(self)
    }

    #[inline]
    fn invert(&self, transform: &Transform) -> Self {
        transform.inverse.transform_point(self)
    }
}

impl ApplyTransform for Vector3<f32> {
    #[inline]
    fn apply(&self, transform: &Transform) -> Self {
        transform.matrix.transform_vector(self)
    }

    #[inline]
    fn invert(&self, transform: &Transform) -> Self {
        transform.inverse.transform_vector(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translate() {
        let t = Transform::new().translate(&Vector3::new(1., 0., 0.));
        let p = Point3::new(1., 0., 0.);
        assert_eq!(Point3::new(2., 0., 0.), p.apply(&t));
        assert_eq!(p, p.apply(&t).invert(&t));
    }

    #[test]
    fn test_scaling() {
        let t = Transform::new().scale(&Vector3::new(10.0, 2.0, 0.5));
        let p = Point3::new(1., 1., 1.);
        assert_relative_eq!(Point3::new(10., 2., 0.5), p.apply(&t));
        assert_relative_eq!(p, p.apply(&t).invert(&t));
    }

    #[test]
    fn test_rotation() {
        let t = Transform::new().rotate(&Vector3::z(), std::f32::consts::FRAC_PI_2);
        let p = Point3::new(1., 0., 0.);
        assert_relative_eq!(Point3::new(0., 1., 0.), p.apply(&t), epsilon = 1e-6);
        assert_relative_eq!(p, p.apply(&t).invert(&t), epsilon = 1e-6);
    }

    #[test]
    fn test_euler_order() {
        // yaw of 90 degrees turns +z into +x
        let t = Transform::new().rotate_euler(&Vector3::new(0., 90., 0.));
        let v = Vector3::new(0., 0., 1.);
        assert_relative_eq!(Vector3::new(1., 0., 0.), v.apply(&t), epsilon = 1e-6);
    }

    #[test]
    fn test_composition() {
        let t = Transform::new()
            .scale(&Vector3::new(10.0, 10.0, 10.0))
            .translate(&Vector3::new(1., 0., 0.));
        let p = Point3::new(1., 0., 1.);
        assert_relative_eq!(Point3::new(11., 0., 10.), p.apply(&t));
        assert_relative_eq!(p, p.apply(&t).invert(&t));
    }
}
