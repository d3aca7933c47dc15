use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam::{channel, thread};
use nalgebra::{Point2, Unit, Vector3};

use crate::{
    camera::{Camera, Sample},
    canvas::{Canvas, Color},
    lighting::{self, ShadePoint, Shader},
    ray::Ray,
    sampler::{JitteredSampler, Sampler, UniformSampler},
    scene::{LightRef, Scene},
};

/// How rays find surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// Intersect each object on its own, analytically where possible.
    RayTrace,

    /// March the combined distance field of the scene.
    RayMarch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    Lambert,
    Phong,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub threads: usize,
    pub technique: Technique,
    pub shading: Shading,

    /// Samples per pixel along each axis.
    pub samples: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 120,
            height: 80,
            threads: num_cpus::get(),
            technique: Technique::RayMarch,
            shading: Shading::Phong,
            samples: 1,
        }
    }
}

impl RenderConfig {
    /// Lighting for the configured technique and shading model.
    pub fn direct_lighting(&self) -> DirectLighting {
        DirectLighting::new(self.technique, self.shading)
    }

    pub fn debug_normals(&self) -> DebugNormals {
        DebugNormals {
            technique: self.technique,
        }
    }

    /// A sampler taking `samples` x `samples` evenly spaced samples per pixel.
    pub fn uniform_sampler(&self) -> UniformSampler {
        UniformSampler::new(self.samples, self.samples)
    }

    pub fn jittered_sampler(&self, seed: u64) -> JitteredSampler {
        JitteredSampler::new(self.samples, self.samples, seed)
    }
}

/// An individual tile in the rendering target.
#[derive(Debug)]
struct Tile {
    offset_x: u32,
    offset_y: u32,
    width: u32,
    height: u32,
}

/// An iterator for tiles in a rendering target.
#[derive(Debug)]
struct Tiles {
    width: u32,
    height: u32,
    chunks_x: u32,
    chunks_y: u32,
    x: u32,
    y: u32,
}

const TILE_SIZE: u32 = 16;

impl Tiles {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            chunks_x: (width + TILE_SIZE - 1) / TILE_SIZE,
            chunks_y: (height + TILE_SIZE - 1) / TILE_SIZE,
            x: 0,
            y: 0,
        }
    }

    fn total(&self) -> u32 {
        self.chunks_x * self.chunks_y
    }
}

impl Iterator for Tiles {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.x >= self.chunks_x {
            self.x = 0;
            self.y += 1;
        }

        if self.y >= self.chunks_y {
            return None;
        }

        let offset_x = self.x * TILE_SIZE;
        let offset_y = self.y * TILE_SIZE;

        self.x += 1;

        Some(Tile {
            offset_x,
            offset_y,
            width: (self.width - offset_x).min(TILE_SIZE),
            height: (self.height - offset_y).min(TILE_SIZE),
        })
    }
}

/// Computes the color seen along a single camera ray.
pub trait Integrator: Send + Sync {
    fn luminance(&self, scene: &Scene, ray: &Ray) -> Color;
}

impl<I: Integrator + ?Sized> Integrator for Box<I> {
    fn luminance(&self, scene: &Scene, ray: &Ray) -> Color {
        self.as_ref().luminance(scene, ray)
    }
}

/// Direct illumination from the scene lights, with shadows.
#[derive(Debug, Clone)]
pub struct DirectLighting {
    pub technique: Technique,
    pub shading: Shading,
    pub shader: Shader,

    /// The color of rays that hit nothing.
    pub background: Color,
}

impl DirectLighting {
    pub fn new(technique: Technique, shading: Shading) -> Self {
        Self {
            technique,
            shading,
            shader: Shader::default(),
            background: Color::black(),
        }
    }

    fn shade<F>(&self, scene: &Scene, at: &ShadePoint, visible: F) -> Color
    where
        F: Fn(&LightRef) -> bool,
    {
        match self.shading {
            Shading::Lambert => lighting::lambert(&self.shader, scene, at, visible),
            Shading::Phong => lighting::phong(&self.shader, scene, at, visible),
        }
    }
}

impl Integrator for DirectLighting {
    fn luminance(&self, scene: &Scene, ray: &Ray) -> Color {
        let view = -ray.unit_direction();

        match self.technique {
            Technique::RayTrace => {
                let found = match scene.intersect(ray) {
                    Some(found) => found,
                    None => return self.background,
                };
                let material = match scene.get(found.id) {
                    Some(obj) => &obj.material,
                    None => return self.background,
                };

                let at = ShadePoint {
                    point: found.hit.point,
                    normal: found.hit.normal,
                    view,
                    material,
                };
                self.shade(scene, &at, |light| {
                    lighting::light_visible_traced(&self.shader, scene, &at.point, &at.normal, light)
                })
            }

            Technique::RayMarch => {
                let shapes = scene.shapes();
                let (id, hit) = match scene.march_shapes(&shapes, ray) {
                    Some(found) => found,
                    None => return self.background,
                };
                let material = match scene.get(id) {
                    Some(obj) => &obj.material,
                    None => return self.background,
                };

                let at = ShadePoint {
                    point: hit.point,
                    normal: hit.normal,
                    view,
                    material,
                };
                self.shade(scene, &at, |light| {
                    lighting::light_visible_marched(scene, &shapes, &hit, light)
                })
            }
        }
    }
}

/// Colors surfaces by their normal, for checking geometry.
#[derive(Debug, Clone)]
pub struct DebugNormals {
    pub technique: Technique,
}

impl Integrator for DebugNormals {
    fn luminance(&self, scene: &Scene, ray: &Ray) -> Color {
        let normal: Option<Unit<Vector3<f32>>> = match self.technique {
            Technique::RayTrace => scene.intersect(ray).map(|found| found.hit.normal),
            Technique::RayMarch => scene.march(ray).map(|(_, hit)| hit.normal),
        };

        normal.map_or(Color::black(), |n| {
            Color::new((n.x + 1.) / 2., (n.y + 1.) / 2., (n.z + 1.) / 2.)
        })
    }
}

/// Render `scene` through `camera`, splitting the image into tiles that are shared out between
/// worker threads. Setting `cancel` stops the render between tiles, and yields `None`.
pub fn render<C, S, I>(
    config: &RenderConfig,
    scene: &Scene,
    camera: &C,
    sampler: S,
    integrator: &I,
    cancel: &AtomicBool,
) -> Result<Option<Canvas>>
where
    C: Camera + Sync,
    S: Sampler,
    I: Integrator + ?Sized,
{
    let start = Instant::now();
    let num_threads = config.threads.max(1);
    log::info!(
        "rendering {}x{} on {} threads",
        config.width,
        config.height,
        num_threads
    );

    let mut canvas = Canvas::new(config.width, config.height);
    let (width, height) = (config.width as f32, config.height as f32);

    let (input, tiles): (_, channel::Receiver<Tile>) = channel::unbounded();
    let (results, chunks) = channel::unbounded();

    thread::scope(|s| {
        for _ in 0..num_threads {
            let mut sampler = sampler.clone();
            let results = results.clone();
            let tiles = tiles.clone();
            s.spawn(move |_| {
                let inv_num_samples = 1. / (sampler.samples_per_pixel() as f32);
                for tile in tiles {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }

                    let mut chunk = Canvas::new(tile.width, tile.height);
                    let coords: Vec<_> = chunk.coords().collect();

                    for ((col, row), pixel) in coords.into_iter().zip(chunk.pixels_mut()) {
                        let base = Point2::new(
                            (col + tile.offset_x) as f32,
                            (row + tile.offset_y) as f32,
                        );
                        for film in sampler.pixel(&base) {
                            let sample = Sample::new(film.x / width, film.y / height);
                            *pixel += integrator.luminance(scene, &camera.generate_ray(&sample));
                        }

                        *pixel *= inv_num_samples;
                    }

                    if results.send((tile.offset_x, tile.offset_y, chunk)).is_err() {
                        break;
                    }
                }
            });
        }

        // only the workers hold senders now, so the results end when they finish
        drop(results);

        let tiles = Tiles::new(config.width, config.height);
        let expecting = tiles.total() as usize;

        s.spawn(move |_| {
            for tile in tiles {
                if input.send(tile).is_err() {
                    break;
                }
            }
        });

        for (offset_x, offset_y, chunk) in chunks.into_iter().take(expecting) {
            canvas.blit(offset_x, offset_y, &chunk)
        }
    })
    .map_err(|_| anyhow!("a render thread panicked"))?;

    if cancel.load(Ordering::Relaxed) {
        log::info!("render cancelled after {:.2?}", start.elapsed());
        return Ok(None);
    }

    log::info!("render finished in {:.2?}", start.elapsed());
    Ok(Some(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::{RenderCam, ViewPlane},
        scene::{Light, SceneObject},
        shapes::Prim,
    };
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn test_scene() -> (Scene, RenderCam) {
        let mut scene = Scene::new();
        scene.add(SceneObject::shape(Prim::sphere(4.)));
        scene.add(SceneObject::light(Light::default()).at(Point3::new(0., 0., 15.)));
        let cam = RenderCam::new(Point3::new(0., 0., 25.), ViewPlane::default());
        (scene, cam)
    }

    fn config(technique: Technique) -> RenderConfig {
        RenderConfig {
            width: 20,
            height: 12,
            threads: 2,
            technique,
            shading: Shading::Phong,
            samples: 1,
        }
    }

    #[test]
    fn test_tiles() {
        let tiles = Tiles::new(40, 20);
        assert_eq!(6, tiles.total());
        let tiles: Vec<_> = tiles.collect();
        assert_eq!(6, tiles.len());
        let area: u32 = tiles.iter().map(|t| t.width * t.height).sum();
        assert_eq!(800, area);
        assert_eq!((8, 4), (tiles[5].width, tiles[5].height));
    }

    #[test]
    fn test_render_techniques_agree() {
        let (scene, cam) = test_scene();
        let cancel = AtomicBool::new(false);

        let render_with = |technique| {
            let config = config(technique);
            let integrator = config.direct_lighting();
            render(&config, &scene, &cam, config.uniform_sampler(), &integrator, &cancel)
                .unwrap()
                .expect("not cancelled")
        };

        let traced = render_with(Technique::RayTrace);
        let marched = render_with(Technique::RayMarch);

        let center = traced.get(10, 6);
        assert!(center.r > 0.);
        assert_relative_eq!(center.r, marched.get(10, 6).r, epsilon = 0.02);

        // the corners miss the sphere
        assert!(traced.get(0, 0).is_black());
        assert!(marched.get(19, 11).is_black());
    }

    #[test]
    fn test_render_cancelled() {
        let (scene, cam) = test_scene();
        let cancel = AtomicBool::new(true);
        let config = config(Technique::RayTrace);
        let integrator = config.debug_normals();
        let result = render(
            &config,
            &scene,
            &cam,
            config.uniform_sampler(),
            &integrator,
            &cancel,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_debug_normals() {
        let (scene, cam) = test_scene();
        let integrator = config(Technique::RayMarch).debug_normals();
        let color = integrator.luminance(&scene, &cam.get_ray(0.5, 0.5));
        assert_relative_eq!(1., color.b, epsilon = 1e-2);
        assert_relative_eq!(0.5, color.r, epsilon = 1e-2);
    }

    #[test]
    fn test_shadowed_pixel() {
        let (lit, _) = test_scene();
        let mut shadowed = lit.clone();
        // sits between the light and the front of the large sphere
        shadowed.add(SceneObject::shape(Prim::sphere(1.)).at(Point3::new(0., 0., 10.)));

        // comes in from the side to avoid the blocker
        let origin = Point3::new(10., 0., 25.);
        let target = Point3::new(0.5, 0., (16f32 - 0.25).sqrt());
        let ray = Ray::new(origin, target - origin);

        for technique in [Technique::RayTrace, Technique::RayMarch] {
            let integrator = DirectLighting::new(technique, Shading::Lambert);
            assert!(integrator.luminance(&lit, &ray).r > 0., "{:?}", technique);
            assert!(
                integrator.luminance(&shadowed, &ray).is_black(),
                "{:?}",
                technique
            );
        }
    }
}
