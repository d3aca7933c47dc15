use nalgebra::{Point2, Point3};

use crate::ray::Ray;

#[derive(Debug, Clone)]
pub struct Sample {
    /// The point on the film where the ray originates, with both coordinates in `[0, 1]` and
    /// `(0, 0)` at the bottom-left.
    pub film: Point2<f32>,
}

impl Sample {
    pub fn new(fx: f32, fy: f32) -> Self {
        Self {
            film: Point2::new(fx, fy),
        }
    }
}

pub trait Camera {
    /// Given a [`Sample`], generate a ray.
    fn generate_ray(&self, sample: &Sample) -> Ray;
}

/// A rectangle parallel to the xy plane that rays are fired through.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewPlane {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
    pub z: f32,
}

impl Default for ViewPlane {
    fn default() -> Self {
        Self {
            min: Point2::new(-3., -2.),
            max: Point2::new(3., 2.),
            z: 20.,
        }
    }
}

impl ViewPlane {
    pub fn new(min: Point2<f32>, max: Point2<f32>, z: f32) -> Self {
        Self { min, max, z }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Map normalized plane coordinates to a world-space point on the plane.
    pub fn to_world(&self, u: f32, v: f32) -> Point3<f32> {
        Point3::new(
            self.min.x + u * self.width(),
            self.min.y + v * self.height(),
            self.z,
        )
    }
}

/// A camera that fires rays from an eye point through a [`ViewPlane`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCam {
    pub position: Point3<f32>,
    pub view: ViewPlane,
}

impl Default for RenderCam {
    fn default() -> Self {
        Self {
            position: Point3::new(-6., -2., 25.),
            view: ViewPlane::default(),
        }
    }
}

impl RenderCam {
    pub fn new(position: Point3<f32>, view: ViewPlane) -> Self {
        Self { position, view }
    }

    pub fn get_ray(&self, u: f32, v: f32) -> Ray {
        let target = self.view.to_world(u, v);
        Ray::new(self.position, target - self.position)
    }
}

impl Camera for RenderCam {
    fn generate_ray(&self, sample: &Sample) -> Ray {
        self.get_ray(sample.film.x, sample.film.y)
    }
}
