//! Perlin gradient noise.
//!
//! The lattice hash uses Ken Perlin's reference permutation, so the noise field is identical from
//! run to run and matches other renderers built on the same table.

use nalgebra::Point3;

use crate::math::Mix;

const PERM_SIZE: usize = 256;

#[rustfmt::skip]
const PERM: [u8; PERM_SIZE] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline]
fn perm(ix: usize) -> usize {
    PERM[ix % PERM_SIZE] as usize
}

/// Dot product of the hashed lattice gradient with the offset from that lattice corner.
fn grad(x: usize, y: usize, z: usize, dx: f32, dy: f32, dz: f32) -> f32 {
    let h = perm(perm(perm(x) + y) + z) & 15;
    let u = if h < 8 || h == 12 || h == 13 { dx } else { dy };
    let v = if h < 4 || h == 12 || h == 13 { dy } else { dz };
    (if h & 1 != 0 { -u } else { u }) + (if h & 2 != 0 { -v } else { v })
}

/// Quintic fade curve, with zero first and second derivatives at the lattice.
#[inline]
fn weight(t: f32) -> f32 {
    let t3 = t * t * t;
    let t4 = t3 * t;
    6. * t4 * t - 15. * t4 + 10. * t3
}

/// Evaluate 3d gradient noise at `p`. The result lies roughly in `[-1, 1]` and is zero at every
/// integer lattice point.
pub fn noise(p: &Point3<f32>) -> f32 {
    let (fx, fy, fz) = (p.x.floor(), p.y.floor(), p.z.floor());
    let (dx, dy, dz) = (p.x - fx, p.y - fy, p.z - fz);

    // wrap the lattice cell into the permutation table
    let ix = (fx as i64).rem_euclid(PERM_SIZE as i64) as usize;
    let iy = (fy as i64).rem_euclid(PERM_SIZE as i64) as usize;
    let iz = (fz as i64).rem_euclid(PERM_SIZE as i64) as usize;

    let w000 = grad(ix, iy, iz, dx, dy, dz);
    let w100 = grad(ix + 1, iy, iz, dx - 1., dy, dz);
    let w010 = grad(ix, iy + 1, iz, dx, dy - 1., dz);
    let w110 = grad(ix + 1, iy + 1, iz, dx - 1., dy - 1., dz);
    let w001 = grad(ix, iy, iz + 1, dx, dy, dz - 1.);
    let w101 = grad(ix + 1, iy, iz + 1, dx - 1., dy, dz - 1.);
    let w011 = grad(ix, iy + 1, iz + 1, dx, dy - 1., dz - 1.);
    let w111 = grad(ix + 1, iy + 1, iz + 1, dx - 1., dy - 1., dz - 1.);

    let (wx, wy, wz) = (weight(dx), weight(dy), weight(dz));
    let x00 = w000.mix(w100, wx);
    let x10 = w010.mix(w110, wx);
    let x01 = w001.mix(w101, wx);
    let x11 = w011.mix(w111, wx);
    let y0 = x00.mix(x10, wy);
    let y1 = x01.mix(x11, wy);
    y0.mix(y1, wz)
}

/// Sum `octaves` layers of noise, halving the amplitude and doubling the frequency each layer.
/// Layer `i` contributes `amplitude / 2^(i+1) * noise(frequency * 2^i * p)`.
pub fn turbulence(p: &Point3<f32>, amplitude: f32, frequency: f32, octaves: u32) -> f32 {
    let mut sum = 0.;
    let mut ampl = amplitude;
    let mut freq = frequency;
    for _ in 0..octaves {
        sum += ampl / 2. * noise(&Point3::from(p.coords * freq));
        ampl /= 2.;
        freq *= 2.;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_is_complete() {
        let mut seen = [false; PERM_SIZE];
        for &p in PERM.iter() {
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_zero_on_lattice() {
        for p in [
            Point3::new(0., 0., 0.),
            Point3::new(3., -7., 12.),
            Point3::new(-256., 300., 1.),
        ] {
            assert_eq!(0., noise(&p));
        }
    }

    #[test]
    fn test_bounded_and_varied() {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for i in 0..1000 {
            let t = i as f32 * 0.137;
            let n = noise(&Point3::new(t, t * 0.71 + 0.3, -t * 1.3 + 0.1));
            assert!(n.is_finite());
            assert!(n.abs() <= 1.5);
            min = min.min(n);
            max = max.max(n);
        }
        assert!(max - min > 0.5);
    }

    #[test]
    fn test_continuity() {
        let p = Point3::new(1.37, 2.61, -0.42);
        let q = Point3::new(1.37 + 1e-4, 2.61, -0.42);
        assert!((noise(&p) - noise(&q)).abs() < 1e-2);
    }

    #[test]
    fn test_turbulence_zero_amplitude() {
        let p = Point3::new(0.3, 4.1, -2.2);
        assert_eq!(0., turbulence(&p, 0., 0.08, 8));
        assert_eq!(0., turbulence(&p, 3., 0.08, 0));
    }
}
