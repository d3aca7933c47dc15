use nalgebra::{Point2, Vector2};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub trait Sampler: std::marker::Send + std::marker::Sync + Clone {
    type PixelIterator: Iterator<Item = Point2<f32>>;

    /// Produce an iterator that will traverse the samples for a single pixel.
    fn pixel(&mut self, pixel: &Point2<f32>) -> Self::PixelIterator;

    /// A size-hint for the number of samples computed for each pixel.
    fn samples_per_pixel(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct UniformSampler {
    step: Vector2<f32>,
    size: usize,
}

impl UniformSampler {
    /// Construct a new uniform sampler that will sample the center of each cell of the
    /// width x height sub-pixel grid.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            step: Vector2::new(1. / (width as f32), 1. / (height as f32)),
            size: (width * height) as usize,
        }
    }
}

pub struct UniformIterator {
    done: bool,
    base: Point2<f32>,
    step: Vector2<f32>,
    pos: Vector2<f32>,
}

impl Iterator for UniformIterator {
    type Item = Point2<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let p = self.base + self.pos;

        self.pos.x += self.step.x;

        if self.pos.x >= 1. {
            self.pos.x = self.step.x / 2.;
            self.pos.y += self.step.y;
        }

        if self.pos.y >= 1. {
            self.done = true;
        }

        Some(p)
    }
}

impl Sampler for UniformSampler {
    type PixelIterator = UniformIterator;

    fn pixel(&mut self, pixel: &Point2<f32>) -> Self::PixelIterator {
        UniformIterator {
            done: false,
            base: *pixel,
            step: self.step,
            pos: self.step / 2.,
        }
    }

    fn samples_per_pixel(&self) -> usize {
        self.size
    }
}

/// Stratified sampling: one random point within each cell of the sub-pixel grid. The generator is
/// seeded, so renders are repeatable.
#[derive(Debug, Clone)]
pub struct JitteredSampler {
    width: u32,
    height: u32,
    rng: StdRng,
}

impl JitteredSampler {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for JitteredSampler {
    type PixelIterator = std::vec::IntoIter<Point2<f32>>;

    fn pixel(&mut self, pixel: &Point2<f32>) -> Self::PixelIterator {
        let dx = 1. / self.width as f32;
        let dy = 1. / self.height as f32;
        let mut samples = Vec::with_capacity(self.samples_per_pixel());
        for row in 0..self.height {
            for col in 0..self.width {
                let jitter: (f32, f32) = (self.rng.gen(), self.rng.gen());
                samples.push(Point2::new(
                    pixel.x + (col as f32 + jitter.0) * dx,
                    pixel.y + (row as f32 + jitter.1) * dy,
                ));
            }
        }
        samples.into_iter()
    }

    fn samples_per_pixel(&self) -> usize {
        (self.width * self.height) as usize
    }
}

#[test]
fn test_uniform_sampler() {
    let mut sampler = UniformSampler::new(1, 1);
    let samples: Vec<_> = sampler.pixel(&Point2::new(0., 0.)).take(10).collect();
    assert_eq!(1, samples.len());
    assert_eq!(1, sampler.samples_per_pixel());
    assert_eq!(Point2::new(0.5, 0.5), samples[0]);

    let mut sampler = UniformSampler::new(2, 2);
    let samples: Vec<_> = sampler.pixel(&Point2::new(0., 0.)).take(10).collect();
    assert_eq!(4, samples.len());
    assert_eq!(4, sampler.samples_per_pixel());
    assert_eq!(Point2::new(0.25, 0.25), samples[0]);
    assert_eq!(Point2::new(0.75, 0.75), samples[3]);
}

#[test]
fn test_jittered_sampler() {
    let mut sampler = JitteredSampler::new(2, 2, 7);
    let pixel = Point2::new(3., 4.);
    let samples: Vec<_> = sampler.pixel(&pixel).collect();
    assert_eq!(4, samples.len());
    assert_eq!(4, sampler.samples_per_pixel());

    // each sample stays inside its own stratum
    for (ix, s) in samples.iter().enumerate() {
        let (col, row) = ((ix % 2) as f32, (ix / 2) as f32);
        assert!(s.x >= 3. + col * 0.5 && s.x <= 3. + (col + 1.) * 0.5);
        assert!(s.y >= 4. + row * 0.5 && s.y <= 4. + (row + 1.) * 0.5);
    }

    // the same seed gives the same samples
    let mut again = JitteredSampler::new(2, 2, 7);
    assert_eq!(samples, again.pixel(&pixel).collect::<Vec<_>>());
}
