use nalgebra::{Point3, Unit, Vector3};

use crate::transform::{ApplyTransform, Transform};

/// A ray with an origin and a direction. The direction is stored as given by the producer, and is
/// not required to be normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub position: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Construct a new ray.
    pub fn new(position: Point3<f32>, direction: Vector3<f32>) -> Ray {
        Ray {
            position,
            direction,
        }
    }

    /// The point at parameter `t` along the ray.
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.position + self.direction * t
    }

    /// The normalized direction of the ray.
    pub fn unit_direction(&self) -> Unit<Vector3<f32>> {
        Unit::new_normalize(self.direction)
    }
}

impl ApplyTransform for Ray {
    /// Transforming a ray keeps its direction normalized in the target space.
    #[inline]
    fn apply(&self, transform: &Transform) -> Self {
        let position = self.position.apply(transform);
        let ahead = self.at(1.).apply(transform);
        Ray::new(position, (ahead - position).normalize())
    }

    #[inline]
    fn invert(&self, transform: &Transform) -> Self {
        let position = self.position.invert(transform);
        let ahead = self.at(1.).invert(transform);
        Ray::new(position, (ahead - position).normalize())
    }
}

#[test]
fn test_at() {
    let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -2.));
    assert_eq!(Point3::new(0., 0., 1.), ray.at(2.));
    assert_eq!(Vector3::new(0., 0., -1.), ray.unit_direction().into_inner());
}

#[test]
fn test_invert() {
    let t = Transform::new()
        .scale(&Vector3::new(2., 2., 2.))
        .translate(&Vector3::new(0., 0., -10.));
    let ray = Ray::new(Point3::new(0., 0., 0.), Vector3::new(0., 0., -3.));
    let local = ray.invert(&t);
    assert_eq!(Point3::new(0., 0., 5.), local.position);
    assert_eq!(Vector3::new(0., 0., -1.), local.direction);
}
