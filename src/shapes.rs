use anyhow::{bail, Result};
use nalgebra::{Point2, Point3, Rotation3, Unit, Vector2, Vector3};

use crate::{
    bounds::BoundingBox,
    math::{deg_to_rad, fold_point},
    noise,
    params::ParamSet,
    ray::Ray,
    transform::{ApplyTransform, Transform},
};

/// Anything that can report a signed distance for a point in world space: positive outside,
/// negative inside and zero on the surface.
pub trait Sdf {
    fn sdf(&self, p: &Point3<f32>) -> f32;
}

impl<F> Sdf for F
where
    F: Fn(&Point3<f32>) -> f32,
{
    #[inline]
    fn sdf(&self, p: &Point3<f32>) -> f32 {
        self(p)
    }
}

/// Evaluate `sdf` on the point folded into the periodic cell of size `cell`, turning a single
/// instance into an infinite lattice.
pub fn op_rep<S: Sdf + ?Sized>(p: &Point3<f32>, cell: &Vector3<f32>, sdf: &S) -> f32 {
    sdf.sdf(&fold_point(p, cell))
}

/// The period the torus folds its query point by.
pub const TORUS_PERIOD: Vector3<f32> = Vector3::new(4., 4., 4.);

/// The default cell size for [`Prim::Repeat`].
pub const REPEAT_CELL: Vector3<f32> = Vector3::new(3.5, 3.5, 3.5);

/// Primitive shapes, positioned by the origin of the object that owns them.
#[derive(Debug, Clone, PartialEq)]
pub enum Prim {
    /// A sphere with the given radius. The z bounds and sweep only affect the reported bound and
    /// area.
    Sphere {
        radius: f32,
        z_min: f32,
        z_max: f32,
        phi_max: f32,
    },

    /// A torus with the given hole and tube radii, turned by `angle` radians about `axis`. The
    /// query point is folded by `period` before evaluation.
    Torus {
        hole: f32,
        tube: f32,
        axis: Unit<Vector3<f32>>,
        angle: f32,
        period: Vector3<f32>,
    },

    /// A horizontal surface displaced by a sum of noise octaves.
    WaterPool {
        amplitude: f32,
        frequency: f32,
        octaves: u32,
        radius: f32,
        z_min: f32,
        z_max: f32,
        phi_max: f32,
    },

    /// An infinite plane with the given normal.
    Plane { normal: Unit<Vector3<f32>> },

    /// An infinite lattice of `prim`, one copy per cell.
    Repeat { cell: Vector3<f32>, prim: Box<Prim> },
}

/// A ray/surface intersection in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceHit {
    /// The intersection point.
    pub point: Point3<f32>,

    /// The outward surface normal.
    pub normal: Unit<Vector3<f32>>,

    /// Distance from the ray origin along its normalized direction.
    pub t: f32,
}

/// A point sampled on the surface of a shape.
#[derive(Debug, Clone)]
pub struct SurfaceSample {
    pub point: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub pdf: f32,
}

impl Prim {
    pub fn sphere(radius: f32) -> Self {
        Prim::Sphere {
            radius,
            z_min: -radius,
            z_max: radius,
            phi_max: 2. * std::f32::consts::PI,
        }
    }

    pub fn torus(hole: f32, tube: f32) -> Self {
        Prim::Torus {
            hole,
            tube,
            axis: Vector3::x_axis(),
            angle: deg_to_rad(60.),
            period: TORUS_PERIOD,
        }
    }

    pub fn water_pool(amplitude: f32, frequency: f32, octaves: u32) -> Self {
        Prim::WaterPool {
            amplitude,
            frequency,
            octaves,
            radius: 1.,
            z_min: -1.,
            z_max: 1.,
            phi_max: 2. * std::f32::consts::PI,
        }
    }

    pub fn plane(normal: Unit<Vector3<f32>>) -> Self {
        Prim::Plane { normal }
    }

    pub fn repeat(cell: Vector3<f32>, prim: Prim) -> Self {
        Prim::Repeat {
            cell,
            prim: Box::new(prim),
        }
    }

    /// Construct a primitive from its name and creation parameters.
    pub fn from_params(name: &str, params: &ParamSet) -> Result<Self> {
        let prim = match name {
            "sphere" => {
                let radius = params.find_one_float("radius", 1.)?;
                let (z_min, z_max, phi_max) = sweep_params(params, radius)?;
                Prim::Sphere {
                    radius,
                    z_min,
                    z_max,
                    phi_max,
                }
            }

            "torus" => Prim::Torus {
                hole: params.find_one_float("hole", 1.)?,
                tube: params.find_one_float("tube", 0.25)?,
                axis: Unit::try_new(
                    params.find_one_vector("axis", Vector3::x())?,
                    f32::EPSILON,
                )
                .ok_or_else(|| anyhow::anyhow!("torus axis must be non-zero"))?,
                angle: deg_to_rad(params.find_one_float("angle", 60.)?),
                period: params.find_one_vector("period", TORUS_PERIOD)?,
            },

            "waterpool" => {
                let radius = params.find_one_float("radius", 1.)?;
                let (z_min, z_max, phi_max) = sweep_params(params, radius)?;
                Prim::WaterPool {
                    amplitude: params.find_one_float("amplitude", 3.0)?,
                    frequency: params.find_one_float("frequency", 0.08)?,
                    octaves: params.find_one_int("octave", 8)?,
                    radius,
                    z_min,
                    z_max,
                    phi_max,
                }
            }

            "plane" => Prim::Plane {
                normal: Unit::try_new(params.find_one_vector("normal", Vector3::y())?, f32::EPSILON)
                    .ok_or_else(|| anyhow::anyhow!("plane normal must be non-zero"))?,
            },

            _ => bail!("unknown shape `{}`", name),
        };

        if let Prim::Torus { period, .. } = &prim {
            if period.iter().any(|c| *c <= 0.) {
                bail!("{} period must be positive in every axis", name);
            }
        }

        Ok(prim)
    }

    /// Signed distance from `p` to the primitive placed at `origin`.
    pub fn sdf(&self, p: &Point3<f32>, origin: &Point3<f32>) -> f32 {
        match self {
            Prim::Sphere { radius, .. } => (p - origin).norm() - radius,

            Prim::Torus {
                hole,
                tube,
                axis,
                angle,
                period,
            } => torus_sdf(&Point3::from(p - origin), *hole, *tube, axis, *angle, period),

            Prim::WaterPool {
                amplitude,
                frequency,
                octaves,
                ..
            } => p.y - (origin.y + noise::turbulence(p, *amplitude, *frequency, *octaves)),

            Prim::Plane { normal } => (p - origin).dot(normal.as_ref()),

            Prim::Repeat { cell, prim } => op_rep(p, cell, &|q: &Point3<f32>| prim.sdf(q, origin)),
        }
    }

    /// Signed distance from `p` to the primitive placed by `transform`. The torus is evaluated in
    /// object space, so the whole placement applies to it; the other primitives only follow the
    /// transformed origin.
    pub fn sdf_placed(&self, p: &Point3<f32>, transform: &Transform) -> f32 {
        match self {
            Prim::Torus {
                hole,
                tube,
                axis,
                angle,
                period,
            } => torus_sdf(&p.invert(transform), *hole, *tube, axis, *angle, period),
            Prim::Repeat { cell, prim } => {
                op_rep(p, cell, &|q: &Point3<f32>| prim.sdf_placed(q, transform))
            }
            _ => self.sdf(p, &Point3::origin().apply(transform)),
        }
    }

    /// True when the primitive has a closed-form ray intersection, and false when it must be
    /// found by marching its distance field.
    pub fn is_analytic(&self) -> bool {
        matches!(self, Prim::Sphere { .. } | Prim::Plane { .. })
    }

    /// The normal to fall back on when the estimated gradient vanishes.
    pub fn default_normal(&self) -> Unit<Vector3<f32>> {
        match self {
            Prim::WaterPool { .. } => Vector3::y_axis(),
            Prim::Plane { normal } => *normal,
            Prim::Repeat { prim, .. } => prim.default_normal(),
            _ => Vector3::z_axis(),
        }
    }

    /// Closed-form intersection of `ray` with the primitive placed at `origin`. Returns `None`
    /// for primitives that must be marched.
    pub fn intersect(&self, ray: &Ray, origin: &Point3<f32>) -> Option<SurfaceHit> {
        match self {
            Prim::Sphere { radius, .. } => intersect_sphere(ray, origin, *radius),

            Prim::Plane { normal } => {
                let dir = Unit::try_new(ray.direction, 0.)?;
                let denom = normal.dot(dir.as_ref());
                if denom.abs() < 1e-6 {
                    return None;
                }
                let t = (origin - ray.position).dot(normal.as_ref()) / denom;
                if t <= 0. {
                    return None;
                }
                let normal = if denom > 0. { -*normal } else { *normal };
                Some(SurfaceHit {
                    point: ray.position + dir.as_ref() * t,
                    normal,
                    t,
                })
            }

            _ => None,
        }
    }

    /// The bound of the primitive in object space.
    pub fn object_bound(&self) -> BoundingBox {
        match self {
            &Prim::Sphere {
                radius,
                z_min,
                z_max,
                ..
            } => BoundingBox::new(
                Point3::new(-radius, -radius, z_min),
                Point3::new(radius, radius, z_max),
            ),

            // flattened in y, as the surface is close to a horizontal plane
            &Prim::WaterPool {
                radius,
                z_min,
                z_max,
                ..
            } => BoundingBox::new(
                Point3::new(-radius, -radius / 4., z_min),
                Point3::new(radius, radius / 4., z_max),
            ),

            &Prim::Torus { hole, tube, .. } => {
                let rad = hole + tube;
                BoundingBox::new(Point3::new(-rad, -rad, -rad), Point3::new(rad, rad, rad))
            }

            Prim::Plane { .. } | Prim::Repeat { .. } => BoundingBox::max(),
        }
    }

    /// Surface area of the primitive. Unbounded primitives report infinity.
    pub fn area(&self) -> f32 {
        match self {
            &Prim::Sphere {
                radius,
                z_min,
                z_max,
                phi_max,
            }
            | &Prim::WaterPool {
                radius,
                z_min,
                z_max,
                phi_max,
                ..
            } => phi_max * radius * (z_max - z_min),

            &Prim::Torus { hole, tube, .. } => {
                4. * std::f32::consts::PI * std::f32::consts::PI * hole.max(tube) * tube
            }

            Prim::Plane { .. } | Prim::Repeat { .. } => f32::INFINITY,
        }
    }

    /// Uniformly sample a point on the surface of the primitive placed at `origin`, for use by
    /// area lights.
    ///
    /// # Panics
    ///
    /// Only spheres can be sampled. Marched surfaces have no parameterization, and asking for one
    /// is a bug in the caller.
    pub fn sample(&self, u: &Point2<f32>, origin: &Point3<f32>) -> SurfaceSample {
        match self {
            Prim::Sphere { radius, .. } => {
                let z = 1. - 2. * u.x;
                let r = (1. - z * z).max(0.).sqrt();
                let phi = 2. * std::f32::consts::PI * u.y;
                let normal = Unit::new_normalize(Vector3::new(r * phi.cos(), r * phi.sin(), z));
                SurfaceSample {
                    point: origin + normal.as_ref() * *radius,
                    normal,
                    pdf: 1. / (4. * std::f32::consts::PI * radius * radius),
                }
            }

            other => {
                log::error!("sampling is not implemented for {}", other.name());
                panic!("{}::sample not implemented", other.name())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Prim::Sphere { .. } => "Sphere",
            Prim::Torus { .. } => "Torus",
            Prim::WaterPool { .. } => "WaterPool",
            Prim::Plane { .. } => "Plane",
            Prim::Repeat { .. } => "Repeat",
        }
    }
}

/// The torus distance at an object-space point, after the periodic fold and the fixed rotation.
fn torus_sdf(
    local: &Point3<f32>,
    hole: f32,
    tube: f32,
    axis: &Unit<Vector3<f32>>,
    angle: f32,
    period: &Vector3<f32>,
) -> f32 {
    let folded = fold_point(local, period);
    let q = Rotation3::from_axis_angle(axis, angle).inverse_transform_point(&folded);
    Vector2::new(q.xz().coords.norm() - hole, q.y).norm() - tube
}

fn sweep_params(params: &ParamSet, radius: f32) -> Result<(f32, f32, f32)> {
    if !(radius > 0.) {
        bail!("radius must be positive, not {}", radius);
    }

    let clamped = |name: &str, value: f32, lo: f32, hi: f32| {
        let c = value.clamp(lo, hi);
        if c != value {
            log::warn!("`{}` of {} clamped to {}", name, value, c);
        }
        c
    };

    let z_min = clamped("zmin", params.find_one_float("zmin", -radius)?, -radius, radius);
    let z_max = clamped("zmax", params.find_one_float("zmax", radius)?, -radius, radius);
    let phi_max = clamped("phimax", params.find_one_float("phimax", 360.)?, 0., 360.);
    Ok((z_min.min(z_max), z_min.max(z_max), deg_to_rad(phi_max)))
}

/// Nearest intersection in front of the ray origin with a sphere at `center`. The ray direction
/// need not be normalized.
pub fn intersect_sphere(ray: &Ray, center: &Point3<f32>, radius: f32) -> Option<SurfaceHit> {
    let dir = Unit::try_new(ray.direction, 0.)?;
    let oc = ray.position - center;
    let b = oc.dot(dir.as_ref());
    let c = oc.norm_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0. {
        return None;
    }

    let root = disc.sqrt();
    let t = [-b - root, -b + root].into_iter().find(|t| *t > 0.)?;
    let point = ray.position + dir.as_ref() * t;
    Some(SurfaceHit {
        point,
        normal: Unit::new_normalize(point - center),
        t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_sign() {
        let s = Prim::sphere(1.);
        let c = Point3::new(1., 2., 3.);
        assert_relative_eq!(0., s.sdf(&Point3::new(1., 3., 3.), &c), epsilon = 1e-6);
        assert_relative_eq!(0., s.sdf(&(c + Vector3::new(0.6, 0., 0.8)), &c), epsilon = 1e-6);
        assert!(s.sdf(&Point3::new(1., 2., 5.), &c) > 0.);
        assert!(s.sdf(&Point3::new(1., 2.5, 3.), &c) < 0.);
        assert_eq!(-1., s.sdf(&c, &c));
    }

    #[test]
    fn test_op_rep_periodic() {
        let s = Prim::sphere(0.5);
        let sdf = |p: &Point3<f32>| s.sdf(p, &Point3::origin());
        let cell = Vector3::new(3.5, 2., 4.);
        let p = Point3::new(0.25, -0.75, 1.5);
        let base = op_rep(&p, &cell, &sdf);
        for k in [(1., 0., 0.), (-2., 3., 1.), (4., -1., -5.)] {
            let shifted = p + Vector3::new(k.0 * cell.x, k.1 * cell.y, k.2 * cell.z);
            assert_relative_eq!(base, op_rep(&shifted, &cell, &sdf), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_repeat_variant_matches_operator() {
        let cell = Vector3::new(3.5, 3.5, 3.5);
        let rep = Prim::repeat(cell, Prim::sphere(0.5));
        let p = Point3::new(7.2, -3.1, 0.4);
        let expected = op_rep(&p, &cell, &|q: &Point3<f32>| (q.coords).norm() - 0.5);
        assert_eq!(expected, rep.sdf(&p, &Point3::origin()));
    }

    #[test]
    fn test_torus_fold_invariance() {
        let t = Prim::torus(1., 0.25);
        let origin = Point3::origin();
        for p in [
            Point3::new(0.5, 0.25, -0.75),
            Point3::new(-1.25, 1.5, 0.5),
            Point3::new(1.0, -0.5, 1.75),
        ] {
            let shifted = p + Vector3::new(4., 0., 0.);
            assert_eq!(t.sdf(&p, &origin), t.sdf(&shifted, &origin));
        }
    }

    #[test]
    fn test_torus_surface() {
        // with no rotation, the ring lies in the xz plane
        let t = Prim::Torus {
            hole: 1.,
            tube: 0.25,
            axis: Vector3::x_axis(),
            angle: 0.,
            period: TORUS_PERIOD,
        };
        let origin = Point3::origin();
        assert_relative_eq!(0., t.sdf(&Point3::new(1.25, 0., 0.), &origin), epsilon = 1e-6);
        assert_relative_eq!(-0.25, t.sdf(&Point3::new(0., 0., 1.), &origin), epsilon = 1e-6);
        assert_relative_eq!(0.75, t.sdf(&Point3::origin(), &origin), epsilon = 1e-6);
    }

    #[test]
    fn test_water_pool_zero_amplitude() {
        let located = Point3::new(0., -2., 0.);
        for (freq, octaves) in [(0.08, 8), (5.0, 1), (0.5, 0), (123.4, 16)] {
            let w = Prim::water_pool(0., freq, octaves);
            for p in [
                Point3::new(0.3, 1.7, -4.),
                Point3::new(-12.1, -2.0, 8.8),
                Point3::new(0., -3.5, 0.),
            ] {
                assert_eq!(p.y - located.y, w.sdf(&p, &located));
            }
        }
    }

    #[test]
    fn test_water_pool_displaced() {
        let w = Prim::water_pool(3., 0.08, 8);
        let located = Point3::new(0., -2., 0.);
        let p = Point3::new(3.3, 0., 7.1);
        let expected = p.y - (located.y + noise::turbulence(&p, 3., 0.08, 8));
        assert_eq!(expected, w.sdf(&p, &located));
    }

    #[test]
    fn test_plane() {
        let plane = Prim::plane(Vector3::y_axis());
        let origin = Point3::new(0., -2., 0.);
        assert_eq!(3., plane.sdf(&Point3::new(4., 1., 2.), &origin));

        let ray = Ray::new(Point3::new(0., 3., 0.), Vector3::new(0., -2., 0.));
        let hit = plane.intersect(&ray, &origin).expect("hit");
        assert_relative_eq!(Point3::new(0., -2., 0.), hit.point);
        assert_relative_eq!(5., hit.t);
        assert_eq!(Vector3::y_axis(), hit.normal);

        let away = Ray::new(Point3::new(0., 3., 0.), Vector3::new(0., 1., 0.));
        assert!(plane.intersect(&away, &origin).is_none());
    }

    #[test]
    fn test_intersect_sphere() {
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -3.));
        let hit = intersect_sphere(&ray, &Point3::origin(), 1.).expect("hit");
        assert_relative_eq!(Point3::new(0., 0., 1.), hit.point);
        assert_relative_eq!(4., hit.t);
        assert_relative_eq!(Vector3::new(0., 0., 1.), hit.normal.into_inner());

        // from the inside we hit the far wall
        let inside = Ray::new(Point3::origin(), Vector3::new(1., 0., 0.));
        let hit = intersect_sphere(&inside, &Point3::origin(), 2.).expect("hit");
        assert_relative_eq!(2., hit.t);

        let miss = Ray::new(Point3::new(0., 3., 5.), Vector3::new(0., 0., -1.));
        assert!(intersect_sphere(&miss, &Point3::origin(), 1.).is_none());
        assert!(Prim::torus(1., 0.5).intersect(&ray, &Point3::origin()).is_none());
    }

    #[test]
    fn test_from_params_defaults() {
        let params = ParamSet::new();
        match Prim::from_params("waterpool", &params).unwrap() {
            Prim::WaterPool {
                amplitude,
                frequency,
                octaves,
                ..
            } => {
                assert_eq!(3.0, amplitude);
                assert_eq!(0.08, frequency);
                assert_eq!(8, octaves);
            }
            other => panic!("unexpected {:?}", other),
        }

        let sphere = Prim::from_params("sphere", &params).unwrap();
        assert_eq!(Prim::sphere(1.), sphere);
        assert!(Prim::from_params("mandelbrot", &params).is_err());
    }

    #[test]
    fn test_bad_radius() {
        for radius in [-1., 0., f32::NAN] {
            let params = ParamSet::new().with("radius", Param::Number(radius));
            assert!(Prim::from_params("sphere", &params).is_err());
            assert!(Prim::from_params("waterpool", &params).is_err());
        }
    }

    #[test]
    fn test_torus_placed() {
        let torus = Prim::from_params("torus", &ParamSet::new()).unwrap();
        let p = Point3::new(0.7, 1.9, -0.4);

        // a pure translation matches evaluating at the origin
        let origin = Point3::new(1., -2., 3.);
        let moved = Transform::new().translate(&origin.coords);
        assert_relative_eq!(torus.sdf(&p, &origin), torus.sdf_placed(&p, &moved), epsilon = 1e-5);

        // rotation and scale are applied before the fold
        let turned = Transform::new()
            .scale(&Vector3::new(2., 2., 2.))
            .rotate_euler(&Vector3::new(0., 0., 90.));
        let local = p.invert(&turned);
        assert_relative_eq!(
            torus.sdf(&local, &Point3::origin()),
            torus.sdf_placed(&p, &turned),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_bounds_and_area() {
        let params = ParamSet::new()
            .with("radius", Param::Number(2.))
            .with("zmin", Param::Number(-1.))
            .with("phimax", Param::Number(180.));
        let sphere = Prim::from_params("sphere", &params).unwrap();
        let bound = sphere.object_bound();
        assert_eq!(Point3::new(-2., -2., -1.), bound.min);
        assert_eq!(Point3::new(2., 2., 2.), bound.max);
        assert_relative_eq!(std::f32::consts::PI * 2. * 3., sphere.area(), epsilon = 1e-5);

        let pool = Prim::water_pool(3., 0.08, 8);
        assert_eq!(Point3::new(1., 0.25, 1.), pool.object_bound().max);
        assert_eq!(f32::INFINITY, Prim::plane(Vector3::y_axis()).area());
    }

    #[test]
    fn test_sample_sphere() {
        let origin = Point3::new(1., 1., 1.);
        let sample = Prim::sphere(2.).sample(&Point2::new(0.3, 0.7), &origin);
        assert_relative_eq!(2., (sample.point - origin).norm(), epsilon = 1e-5);
    }

    #[test]
    #[should_panic(expected = "WaterPool::sample not implemented")]
    fn test_sample_marched_is_fatal() {
        Prim::water_pool(3., 0.08, 8).sample(&Point2::new(0.5, 0.5), &Point3::origin());
    }
}
