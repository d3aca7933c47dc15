use nalgebra::{Point3, Unit, Vector3};

use crate::{
    canvas::Color,
    march::{march_within, MarchHit},
    math,
    ray::Ray,
    scene::{LightRef, Material, Scene, Shapes},
};

/// Shading constants shared by every surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    /// Added to every shaded point, lit or not.
    pub ambient: Color,

    /// The phong specular exponent.
    pub power: f32,

    /// How far traced shadow rays start off the surface.
    pub bias: f32,
}

impl Default for Shader {
    fn default() -> Self {
        Self {
            ambient: Color::black(),
            power: 10.,
            bias: 0.01,
        }
    }
}

/// A surface point to shade.
#[derive(Debug, Clone)]
pub struct ShadePoint<'a> {
    pub point: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,

    /// Direction from the point back towards the viewer.
    pub view: Unit<Vector3<f32>>,

    pub material: &'a Material,
}

/// Diffuse shading from every light for which `visible` holds.
pub fn lambert<F>(shader: &Shader, scene: &Scene, at: &ShadePoint, visible: F) -> Color
where
    F: Fn(&LightRef) -> bool,
{
    shade(shader, scene, at, visible, false)
}

/// Diffuse and specular shading from every light for which `visible` holds.
pub fn phong<F>(shader: &Shader, scene: &Scene, at: &ShadePoint, visible: F) -> Color
where
    F: Fn(&LightRef) -> bool,
{
    shade(shader, scene, at, visible, true)
}

fn shade<F>(shader: &Shader, scene: &Scene, at: &ShadePoint, visible: F, specular: bool) -> Color
where
    F: Fn(&LightRef) -> bool,
{
    let mut color = shader.ambient;

    for light in scene.lights() {
        let intensity = light.light.intensity();
        if intensity <= 0. {
            continue;
        }

        let to_light = light.position - at.point;
        let dist2 = to_light.norm_squared();
        let lightv = match Unit::try_new(to_light, 0.) {
            Some(dir) => dir,
            None => continue,
        };

        if !visible(&light) {
            continue;
        }

        let falloff = intensity / dist2;
        let diffuse = at.normal.dot(lightv.as_ref()).max(0.);
        color += at.material.diffuse.filter(&light.light.color) * (falloff * diffuse);

        if specular {
            let reflectv = math::reflect(&-lightv, &at.normal);
            let factor = reflectv.dot(at.view.as_ref()).max(0.).powf(shader.power);
            color += at.material.specular.filter(&light.light.color) * (falloff * factor);
        }
    }

    color
}

/// True when `point` falls within the cone of a spotlight. Lights that aren't spotlights, or that
/// have lost their target, light everything.
pub fn in_spotlight(scene: &Scene, light: &LightRef, point: &Point3<f32>) -> bool {
    let spot = match &light.light.spot {
        Some(spot) => spot,
        None => return true,
    };

    let target = match scene.target_position(light.light) {
        Some(target) => target,
        None => return true,
    };

    let aim = target - light.position;
    if aim.norm_squared() == 0. {
        return true;
    }

    aim.angle(&(point - light.position)) <= spot.cone_angle()
}

/// Visibility of `light` from a traced surface point. Any shape hit between the point and the
/// light casts a shadow.
pub fn light_visible_traced(
    shader: &Shader,
    scene: &Scene,
    point: &Point3<f32>,
    normal: &Unit<Vector3<f32>>,
    light: &LightRef,
) -> bool {
    if !in_spotlight(scene, light, point) {
        return false;
    }

    let start = point + normal.as_ref() * shader.bias;
    let to_light = light.position - start;
    let dist = to_light.norm();
    let ray = Ray::new(start, to_light);

    !scene.iter().any(|(_, obj)| {
        obj.intersect(&ray)
            .map_or(false, |hit| hit.t > shader.bias && hit.t < dist)
    })
}

/// Visibility of `light` from a marched hit, by marching the scene towards the light and stopping
/// at its distance.
pub fn light_visible_marched(
    scene: &Scene,
    shapes: &Shapes,
    hit: &MarchHit,
    light: &LightRef,
) -> bool {
    if !in_spotlight(scene, light, &hit.point) {
        return false;
    }

    let start = hit.spawn_point(&scene.march);
    let to_light = light.position - start;
    let dist = to_light.norm();
    march_within(&scene.march, shapes, &Ray::new(start, to_light), dist).is_none()
}
