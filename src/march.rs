use anyhow::Result;
use nalgebra::{Point3, Unit, Vector3};

use crate::{params::ParamSet, ray::Ray, shapes::Sdf};

/// Controls for sphere marching.
#[derive(Debug, Clone, PartialEq)]
pub struct MarchConfig {
    /// The step budget for a single ray.
    pub max_steps: u32,

    /// A point closer to the surface than this counts as a hit.
    pub hit_threshold: f32,

    /// A step larger than this means the ray escaped the scene.
    pub max_distance: f32,

    /// Offset used when estimating normals by finite differences.
    pub normal_eps: f32,
}

impl Default for MarchConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            hit_threshold: 0.01,
            max_distance: 100.,
            normal_eps: 0.01,
        }
    }
}

impl MarchConfig {
    /// Read the `maxray`, `distthres`, `maxdist` and `eps` parameters, falling back on the
    /// defaults.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            max_steps: params.find_one_int("maxray", default.max_steps)?,
            hit_threshold: params.find_one_float("distthres", default.hit_threshold)?,
            max_distance: params.find_one_float("maxdist", default.max_distance)?,
            normal_eps: params.find_one_float("eps", default.normal_eps)?,
        })
    }

    /// How far to move off a marched surface before casting a secondary ray, so that the new ray
    /// doesn't immediately register a hit on the surface it left.
    pub fn surface_offset(&self) -> f32 {
        10. * self.hit_threshold
    }
}

/// The result of a successful march.
#[derive(Debug, Clone)]
pub struct MarchHit {
    /// The point where the march stopped, within the hit threshold of the surface.
    pub point: Point3<f32>,

    /// The estimated surface normal at `point`.
    pub normal: Unit<Vector3<f32>>,

    /// A conservative bound on the error in `point`.
    pub error: Vector3<f32>,

    /// The distance from the world origin to `point`. This is not the ray parameter.
    pub distance: f32,

    /// The number of steps taken.
    pub steps: u32,
}

impl MarchHit {
    /// The point pushed off the surface along the normal, for spawning shadow rays.
    pub fn spawn_point(&self, config: &MarchConfig) -> Point3<f32> {
        self.point + self.normal.as_ref() * config.surface_offset()
    }

    /// Distance along `ray` to the hit point.
    pub fn ray_parameter(&self, ray: &Ray) -> f32 {
        (self.point - ray.position).dot(ray.unit_direction().as_ref())
    }
}

/// March `ray` through the distance field `sdf`, stepping by the reported distance until it comes
/// within the hit threshold of a surface. Running out of steps, or taking a step larger than the
/// maximum distance, is a miss.
pub fn march<S: Sdf + ?Sized>(
    config: &MarchConfig,
    sdf: &S,
    ray: &Ray,
    default_normal: &Unit<Vector3<f32>>,
) -> Option<MarchHit> {
    let dir = Unit::try_new(ray.direction, 0.)?;
    let mut point = ray.position;

    for steps in 0..config.max_steps {
        let dist = sdf.sdf(&point);

        if dist < config.hit_threshold {
            let normal = estimate_normal(sdf, &point, config.normal_eps, default_normal);
            return Some(MarchHit {
                point,
                normal,
                error: point.coords * (10. * config.hit_threshold),
                distance: point.coords.norm(),
                steps,
            });
        }

        if dist > config.max_distance {
            return None;
        }

        point += dir.as_ref() * dist;
    }

    None
}

/// March `ray` as in [`march`], but only report a hit that lies within `limit` of the ray origin.
/// Returns the distance travelled to the hit.
pub fn march_within<S: Sdf + ?Sized>(
    config: &MarchConfig,
    sdf: &S,
    ray: &Ray,
    limit: f32,
) -> Option<f32> {
    let dir = Unit::try_new(ray.direction, 0.)?;
    let mut point = ray.position;
    let mut travelled = 0.;

    for _ in 0..config.max_steps {
        if travelled >= limit {
            return None;
        }

        let dist = sdf.sdf(&point);

        if dist < config.hit_threshold {
            return Some(travelled);
        }

        if dist > config.max_distance {
            return None;
        }

        point += dir.as_ref() * dist;
        travelled += dist;
    }

    None
}

/// Estimate the surface normal at `p` from one-sided differences of the distance field along each
/// axis. A vanishing gradient yields `default`.
pub fn estimate_normal<S: Sdf + ?Sized>(
    sdf: &S,
    p: &Point3<f32>,
    eps: f32,
    default: &Unit<Vector3<f32>>,
) -> Unit<Vector3<f32>> {
    let dp = sdf.sdf(p);
    let n = Vector3::new(
        dp - sdf.sdf(&Point3::new(p.x - eps, p.y, p.z)),
        dp - sdf.sdf(&Point3::new(p.x, p.y - eps, p.z)),
        dp - sdf.sdf(&Point3::new(p.x, p.y, p.z - eps)),
    );

    Unit::try_new(n, 0.).unwrap_or_else(|| {
        log::trace!("degenerate normal at {:?}, using the default", p);
        *default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{intersect_sphere, Prim};
    use approx::assert_relative_eq;

    fn unit_sphere(p: &Point3<f32>) -> f32 {
        p.coords.norm() - 1.
    }

    #[test]
    fn test_march_sphere() {
        let config = MarchConfig::default();
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -1.));
        let hit = march(&config, &unit_sphere, &ray, &Vector3::z_axis()).expect("hit");

        assert!((hit.point - Point3::new(0., 0., 1.)).norm() < config.hit_threshold);
        assert_relative_eq!(Vector3::new(0., 0., 1.), hit.normal.into_inner(), epsilon = 1e-2);
        assert_relative_eq!(hit.point.coords.norm(), hit.distance);
        assert_relative_eq!(hit.point.coords * 0.1, hit.error);
    }

    #[test]
    fn test_march_matches_analytic() {
        let config = MarchConfig::default();
        let center = Point3::new(0.5, -0.25, -3.);
        let prim = Prim::sphere(1.5);
        let sdf = |p: &Point3<f32>| prim.sdf(p, &center);

        for dir in [
            Vector3::new(0.1, -0.05, -1.),
            Vector3::new(0.3, 0.2, -2.),
            Vector3::new(0.05, -0.02, -0.7),
        ] {
            let ray = Ray::new(Point3::new(0., 0., 4.), dir);
            let exact = intersect_sphere(&ray, &center, 1.5);
            assert!(exact.is_some(), "{:?} should hit the sphere", dir);
            let exact = exact.unwrap();
            let hit = march(&config, &sdf, &ray, &Vector3::z_axis()).expect("marched hit");
            // an oblique ray stops a little further than the threshold from the surface
            let tolerance = 2. * config.hit_threshold;
            assert!((hit.point - exact.point).norm() < tolerance);
            assert_relative_eq!(exact.t, hit.ray_parameter(&ray), epsilon = tolerance);

            let analytic_normal = (hit.point - center) / 1.5;
            assert!(hit.normal.angle(&analytic_normal) < 0.05);
        }
    }

    #[test]
    fn test_unnormalized_direction() {
        let config = MarchConfig::default();
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -40.));
        let hit = march(&config, &unit_sphere, &ray, &Vector3::z_axis()).expect("hit");
        assert!((hit.point - Point3::new(0., 0., 1.)).norm() < config.hit_threshold);
    }

    #[test]
    fn test_escape() {
        let config = MarchConfig::default();
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., 1.));
        assert!(march(&config, &unit_sphere, &ray, &Vector3::z_axis()).is_none());

        // far away geometry escapes on the first step
        let far = |p: &Point3<f32>| (p - Point3::new(0., 0., -500.)).norm() - 1.;
        let ray = Ray::new(Point3::origin(), Vector3::new(0., 0., -1.));
        assert!(march(&config, &far, &ray, &Vector3::z_axis()).is_none());
    }

    #[test]
    fn test_step_budget() {
        let config = MarchConfig {
            max_steps: 1,
            ..MarchConfig::default()
        };
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -1.));
        assert!(march(&config, &unit_sphere, &ray, &Vector3::z_axis()).is_none());

        let config = MarchConfig {
            max_steps: 0,
            ..MarchConfig::default()
        };
        let on_surface = Ray::new(Point3::new(0., 0., 1.), Vector3::new(0., 0., -1.));
        assert!(march(&config, &unit_sphere, &on_surface, &Vector3::z_axis()).is_none());
    }

    #[test]
    fn test_zero_direction() {
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::zeros());
        assert!(march(&MarchConfig::default(), &unit_sphere, &ray, &Vector3::z_axis()).is_none());
    }

    #[test]
    fn test_march_within() {
        let config = MarchConfig::default();
        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0., 0., -1.));
        let dist = march_within(&config, &unit_sphere, &ray, 10.).expect("hit");
        assert_relative_eq!(4., dist, epsilon = config.hit_threshold);
        assert!(march_within(&config, &unit_sphere, &ray, 3.).is_none());
    }

    #[test]
    fn test_degenerate_normal() {
        let flat = |_: &Point3<f32>| 0.;
        let default = Vector3::y_axis();
        let n = estimate_normal(&flat, &Point3::new(1., 2., 3.), 0.01, &default);
        assert_eq!(default, n);
    }

    #[test]
    fn test_march_water_pool() {
        // the default pool is displaced by several octaves of noise, so its distance is only an
        // estimate away from the surface
        let pool = Prim::from_params("waterpool", &ParamSet::new()).unwrap();
        let origin = Point3::new(0., -2., 0.);
        let sdf = |p: &Point3<f32>| pool.sdf(p, &origin);
        let config = MarchConfig::default();

        for i in 0..5 {
            for j in 0..5 {
                let start = Point3::new(i as f32 * 3.7 - 8., 10., j as f32 * 2.9 - 6.);
                for dir in [Vector3::new(0., -1., 0.), Vector3::new(0.2, -1., 0.1)] {
                    let ray = Ray::new(start, dir);
                    let hit = march(&config, &sdf, &ray, &Vector3::y_axis());
                    assert!(hit.is_some(), "{:?} along {:?} missed the pool", start, dir);
                    let hit = hit.unwrap();

                    // every step lands within the band the noise can displace the surface by
                    assert!(sdf(&hit.point) < config.hit_threshold);
                    assert!((hit.point.y - origin.y).abs() <= 3.5);
                    assert!(hit.steps < config.max_steps);
                    assert!(hit.normal.iter().all(|c| c.is_finite()));
                }
            }
        }
    }

    #[test]
    fn test_extreme_params() {
        use crate::params::Param;

        let ray = Ray::new(Point3::new(0., 0., 5.), Vector3::new(0.3, 0.2, -5.));

        // a tiny threshold still converges, just more slowly
        let fine = MarchConfig::from_params(&ParamSet::new().with("distthres", Param::Number(1e-5)))
            .unwrap();
        let coarse = march(&MarchConfig::default(), &unit_sphere, &ray, &Vector3::z_axis())
            .expect("hit");
        let hit = march(&fine, &unit_sphere, &ray, &Vector3::z_axis()).expect("hit");
        assert!(unit_sphere(&hit.point).abs() < 1e-5);
        assert!(hit.steps >= coarse.steps);
        let exact = intersect_sphere(&ray, &Point3::origin(), 1.).expect("analytic hit");
        assert!((hit.point - exact.point).norm() < 1e-3);

        // a threshold larger than the first distance hits at the ray origin
        let loose = MarchConfig::from_params(&ParamSet::new().with("distthres", Param::Number(10.)))
            .unwrap();
        let hit = march(&loose, &unit_sphere, &ray, &Vector3::z_axis()).expect("hit");
        assert_eq!(0, hit.steps);
        assert_eq!(ray.position, hit.point);

        // a short escape distance gives up before reaching the sphere
        let short = MarchConfig::from_params(&ParamSet::new().with("maxdist", Param::Number(2.)))
            .unwrap();
        assert!(march(&short, &unit_sphere, &ray, &Vector3::z_axis()).is_none());

        let none = MarchConfig::from_params(&ParamSet::new().with("maxray", Param::Number(0.)))
            .unwrap();
        assert!(march(&none, &unit_sphere, &ray, &Vector3::z_axis()).is_none());

        // without octaves the pool is a flat plane
        let flat = Prim::from_params(
            "waterpool",
            &ParamSet::new().with("octave", Param::Number(0.)),
        )
        .unwrap();
        let origin = Point3::new(0., -2., 0.);
        let p = Point3::new(1.3, 0.5, -4.2);
        assert_eq!(2.5, flat.sdf(&p, &origin));
        let down = Ray::new(Point3::new(1.3, 3., -4.2), Vector3::new(0., -1., 0.));
        let hit = march(
            &MarchConfig::default(),
            &|q: &Point3<f32>| flat.sdf(q, &origin),
            &down,
            &Vector3::y_axis(),
        )
        .expect("hit");
        assert_relative_eq!(-2., hit.point.y, epsilon = 1e-5);
    }

    #[test]
    fn test_from_params() {
        use crate::params::Param;

        let params = ParamSet::new()
            .with("maxray", Param::Number(50.))
            .with("eps", Param::Number(0.001));
        let config = MarchConfig::from_params(&params).unwrap();
        assert_eq!(50, config.max_steps);
        assert_eq!(0.001, config.normal_eps);
        assert_eq!(0.01, config.hit_threshold);
        assert_eq!(100., config.max_distance);
        assert_eq!(MarchConfig::default(), MarchConfig::from_params(&ParamSet::new()).unwrap());
    }
}
