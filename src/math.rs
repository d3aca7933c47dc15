use nalgebra::{Point3, Unit, Vector3};

/// Reflect `vec` through `normal`.
pub fn reflect(vec: &Unit<Vector3<f32>>, normal: &Unit<Vector3<f32>>) -> Unit<Vector3<f32>> {
    Unit::new_normalize(vec.as_ref() - normal.as_ref() * 2. * vec.dot(normal.as_ref()))
}

pub trait Mix {
    type Output;

    fn mix(self, b: Self, t: f32) -> Self::Output;
}

impl Mix for f32 {
    type Output = f32;

    #[inline]
    fn mix(self, y: f32, t: f32) -> f32 {
        self * (1.0 - t) + y * t
    }
}

#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    (deg / 180.) * std::f32::consts::PI
}

/// Fold a single coordinate into the cell `[-c/2, c/2)` centered on the origin.
///
/// Uses a floored modulo, so the fold is periodic across the origin as well: `fold(x + k * c, c)`
/// equals `fold(x, c)` for every integer `k`.
#[inline]
pub fn fold(x: f32, c: f32) -> f32 {
    (x + 0.5 * c).rem_euclid(c) - 0.5 * c
}

/// Fold a point component-wise into the periodic cell of size `cell`.
pub fn fold_point(p: &Point3<f32>, cell: &Vector3<f32>) -> Point3<f32> {
    Point3::new(fold(p.x, cell.x), fold(p.y, cell.y), fold(p.z, cell.z))
}

#[test]
fn test_deg_to_rad() {
    assert_eq!(std::f32::consts::PI, deg_to_rad(180.));
}

#[test]
fn test_fold_range() {
    assert_eq!(1.0, fold(1.0, 4.0));
    assert_eq!(1.0, fold(5.0, 4.0));
    assert_eq!(-1.5, fold(-1.5, 4.0));
    assert_eq!(-1.5, fold(2.5, 4.0));
    assert_eq!(-2.0, fold(2.0, 4.0));
}

#[test]
fn test_fold_negative_periods() {
    for k in -3..=3 {
        let shifted = 1.25 + 4.0 * k as f32;
        assert_eq!(fold(1.25, 4.0), fold(shifted, 4.0), "k = {}", k);
    }
}

#[test]
fn test_reflect() {
    let v = Unit::new_normalize(Vector3::new(1., -1., 0.));
    let n = Vector3::y_axis();
    let r = reflect(&v, &n);
    approx::assert_relative_eq!(r.into_inner(), Vector3::new(1., 1., 0.).normalize());
}
