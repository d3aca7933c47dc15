use nalgebra::Point3;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

fn min_point(a: &Point3<f32>, b: &Point3<f32>) -> Point3<f32> {
    Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
}

fn max_point(a: &Point3<f32>, b: &Point3<f32>) -> Point3<f32> {
    Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
}

impl BoundingBox {
    pub fn new(a: Point3<f32>, b: Point3<f32>) -> Self {
        let min = min_point(&a, &b);
        let max = max_point(&a, &b);
        BoundingBox { min, max }
    }

    /// A bound covering all of space, for shapes like planes and lattices.
    pub fn max() -> Self {
        BoundingBox {
            min: Point3::new(f32::MIN, f32::MIN, f32::MIN),
            max: Point3::new(f32::MAX, f32::MAX, f32::MAX),
        }
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        self.min.x <= p.x
            && self.min.y <= p.y
            && self.min.z <= p.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

#[test]
fn test_bounds() {
    let b = BoundingBox::new(Point3::new(1., -1., 2.), Point3::new(-1., 1., -2.));
    assert_eq!(Point3::new(-1., -1., -2.), b.min);
    assert_eq!(Point3::new(1., 1., 2.), b.max);
    assert!(b.contains(&Point3::new(0.5, 0.5, 1.9)));
    assert!(!b.contains(&Point3::new(0.5, 1.5, 1.9)));
    assert!(BoundingBox::max().contains(&Point3::new(1e30, -1e30, 0.)));
}
