use anyhow::{anyhow, bail, Result};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::{
    camera::{RenderCam, ViewPlane},
    canvas::Color,
    march::{self, MarchConfig, MarchHit},
    ray::Ray,
    shapes::{intersect_sphere, Prim, Sdf, SurfaceHit},
    transform::{ApplyTransform, Transform},
};

/// An ordered collection of shapes, lights and cameras. Removing an object leaves a hole, so the
/// ids of the remaining objects stay valid.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<Option<SceneObject>>,

    /// Controls for marching the scene as a whole.
    pub march: MarchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

/// Where an object sits in the world. The transform is rebuilt from these fields whenever it is
/// needed, so editing them never leaves a stale matrix behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub position: Point3<f32>,

    /// Rotation in degrees about the x, y and z axes.
    pub rotation: Vector3<f32>,

    pub scale: Vector3<f32>,

    /// The point rotation happens about, relative to the object origin.
    pub pivot: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse: Color,
    pub specular: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spotlight {
    pub cone_radius: f32,
    pub cone_length: f32,

    /// The light the spot is aimed at. A spotlight with no target behaves like a point light.
    pub target: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub intensity: f32,
    pub color: Color,
    pub spot: Option<Spotlight>,

    /// Target markers only exist to be aimed at, and give off no light.
    pub target_marker: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Geometry, along with the controls used when it has to be marched on its own.
    Shape { prim: Prim, march: MarchConfig },

    Light(Light),

    Camera(ViewPlane),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: Option<String>,
    pub placement: Placement,
    pub material: Material,
    pub kind: ObjectKind,
}

/// A light in the scene, resolved to its world position.
#[derive(Debug, Clone)]
pub struct LightRef<'a> {
    pub id: ObjectId,
    pub position: Point3<f32>,
    pub light: &'a Light,
}

/// The closest surface hit by a traced ray.
#[derive(Debug, Clone)]
pub struct SceneHit {
    pub id: ObjectId,
    pub hit: SurfaceHit,
}

/// The shapes of a scene with their transforms resolved, for evaluating the scene's distance field
/// many times over without rebuilding them.
#[derive(Debug)]
pub struct Shapes<'a> {
    shapes: Vec<(ObjectId, &'a Prim, Transform)>,
}

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            rotation: Vector3::zeros(),
            scale: Vector3::new(1., 1., 1.),
            pivot: Vector3::zeros(),
        }
    }
}

impl Placement {
    pub fn at(position: Point3<f32>) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// The object-to-world transform: scale, then rotate about the pivot, then translate.
    pub fn transform(&self) -> Transform {
        Transform::new()
            .scale(&self.scale)
            .translate(&-self.pivot)
            .rotate_euler(&self.rotation)
            .translate(&self.pivot)
            .translate(&self.position.coords)
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        *self.transform().matrix()
    }

    /// Where the object origin ends up in the world.
    pub fn world_position(&self) -> Point3<f32> {
        Point3::origin().apply(&self.transform())
    }

    /// Move the object so that its origin lands on `pos`.
    pub fn set_world_position(&mut self, pos: &Point3<f32>) {
        let offset = pos - self.world_position();
        self.position += offset;
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Color::grey(),
            specular: Color::light_grey(),
        }
    }
}

impl Default for Spotlight {
    fn default() -> Self {
        Self {
            cone_radius: 0.75,
            cone_length: 3.,
            target: None,
        }
    }
}

impl Spotlight {
    /// The half-angle of the cone, in radians.
    pub fn cone_angle(&self) -> f32 {
        (self.cone_radius / self.cone_length).atan()
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            intensity: 75.,
            color: Color::white(),
            spot: None,
            target_marker: false,
        }
    }
}

impl Light {
    pub fn point(intensity: f32) -> Self {
        Self {
            intensity,
            ..Self::default()
        }
    }

    pub fn spot(intensity: f32, spot: Spotlight) -> Self {
        Self {
            intensity,
            spot: Some(spot),
            ..Self::default()
        }
    }

    /// The effective intensity, which is always zero for target markers.
    pub fn intensity(&self) -> f32 {
        if self.target_marker {
            0.
        } else {
            self.intensity
        }
    }

    pub fn mark_target(&mut self) {
        self.target_marker = true;
    }
}

impl SceneObject {
    fn new(kind: ObjectKind) -> Self {
        Self {
            name: None,
            placement: Placement::default(),
            material: Material::default(),
            kind,
        }
    }

    pub fn shape(prim: Prim) -> Self {
        Self::new(ObjectKind::Shape {
            prim,
            march: MarchConfig::default(),
        })
    }

    pub fn light(light: Light) -> Self {
        Self::new(ObjectKind::Light(light))
    }

    pub fn camera(view: ViewPlane) -> Self {
        Self::new(ObjectKind::Camera(view))
    }

    pub fn at(mut self, position: Point3<f32>) -> Self {
        self.placement.position = position;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn position(&self) -> Point3<f32> {
        self.placement.world_position()
    }

    pub fn prim(&self) -> Option<&Prim> {
        match &self.kind {
            ObjectKind::Shape { prim, .. } => Some(prim),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            ObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            ObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// The signed distance from `p` to this object. Lights and cameras have no surface.
    pub fn distance(&self, p: &Point3<f32>) -> f32 {
        match &self.kind {
            ObjectKind::Shape { prim, .. } => prim.sdf_placed(p, &self.placement.transform()),
            _ => f32::INFINITY,
        }
    }

    /// Intersect `ray` with this object's surface, analytically when the shape allows it and by
    /// marching its own distance field otherwise.
    pub fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let (prim, config) = match &self.kind {
            ObjectKind::Shape { prim, march } => (prim, march),
            _ => return None,
        };

        let transform = self.placement.transform();
        if prim.is_analytic() {
            return prim.intersect(ray, &Point3::origin().apply(&transform));
        }

        let sdf = |p: &Point3<f32>| prim.sdf_placed(p, &transform);
        march::march(config, &sdf, ray, &prim.default_normal()).map(|hit| SurfaceHit {
            t: hit.ray_parameter(ray),
            point: hit.point,
            normal: hit.normal,
        })
    }

    /// The radius of the sphere used to grab this object.
    pub fn pick_radius(&self) -> f32 {
        fn prim_radius(prim: &Prim) -> f32 {
            match prim {
                Prim::Sphere { radius, .. } | Prim::WaterPool { radius, .. } => *radius,
                Prim::Torus { hole, tube, .. } => hole + tube,
                Prim::Plane { .. } => 1.,
                Prim::Repeat { prim, .. } => prim_radius(prim),
            }
        }

        self.prim().map_or(1., prim_radius)
    }

    /// Intersect `ray` with the object's picking sphere in object space, so that scaling, rotation
    /// and pivot are all taken into account. Returns the world-space point that was hit.
    pub fn intersect_to_move(&self, ray: &Ray) -> Option<Point3<f32>> {
        let transform = self.placement.transform();
        let local = ray.invert(&transform);
        let hit = intersect_sphere(&local, &Point3::origin(), self.pick_radius())?;
        Some(hit.point.apply(&transform))
    }
}

impl<'a> Shapes<'a> {
    /// The object whose surface is closest to `p`.
    pub fn closest(&self, p: &Point3<f32>) -> Option<(ObjectId, &'a Prim)> {
        self.shapes
            .iter()
            .map(|(id, prim, transform)| (*id, *prim, prim.sdf_placed(p, transform)))
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, prim, _)| (id, prim))
    }
}

impl<'a> Sdf for Shapes<'a> {
    fn sdf(&self, p: &Point3<f32>) -> f32 {
        self.shapes
            .iter()
            .map(|(_, prim, transform)| prim.sdf_placed(p, transform))
            .fold(f32::INFINITY, f32::min)
    }
}

impl Sdf for Scene {
    fn sdf(&self, p: &Point3<f32>) -> f32 {
        self.iter()
            .map(|(_, obj)| obj.distance(p))
            .fold(f32::INFINITY, f32::min)
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the end of the scene.
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        log::debug!(
            "adding object {} {}",
            id.0,
            object.name.as_deref().unwrap_or("<unnamed>")
        );
        self.objects.push(Some(object));
        id
    }

    pub fn get(&self, ObjectId(id): ObjectId) -> Option<&SceneObject> {
        self.objects.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, ObjectId(id): ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Find an object by name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.iter()
            .find(|(_, obj)| obj.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// All objects in the scene, in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(ix, obj)| obj.as_ref().map(|obj| (ObjectId(ix as u32), obj)))
    }

    pub fn lights(&self) -> impl Iterator<Item = LightRef<'_>> {
        self.iter().filter_map(|(id, obj)| {
            obj.as_light().map(|light| LightRef {
                id,
                position: obj.position(),
                light,
            })
        })
    }

    /// The first camera in the scene.
    pub fn camera(&self) -> Option<RenderCam> {
        self.iter().find_map(|(_, obj)| match &obj.kind {
            ObjectKind::Camera(view) => Some(RenderCam::new(obj.position(), view.clone())),
            _ => None,
        })
    }

    /// Remove an object from the scene. Spotlights aimed at it fall back to being point lights.
    pub fn remove(&mut self, ObjectId(id): ObjectId) -> Option<SceneObject> {
        let removed = self.objects.get_mut(id as usize)?.take()?;

        for obj in self.objects.iter_mut().flatten() {
            let name = obj.name.clone();
            if let Some(spot) = obj.as_light_mut().and_then(|light| light.spot.as_mut()) {
                if spot.target == Some(ObjectId(id)) {
                    log::warn!(
                        "spotlight {} lost its target",
                        name.as_deref().unwrap_or("<unnamed>")
                    );
                    spot.target = None;
                }
            }
        }

        Some(removed)
    }

    /// Aim the spotlight `spot` at the light `target`, turning the target into a marker.
    pub fn aim(&mut self, spot: ObjectId, target: ObjectId) -> Result<()> {
        if spot == target {
            bail!("a spotlight can't target itself");
        }

        self.get_mut(target)
            .and_then(SceneObject::as_light_mut)
            .ok_or_else(|| anyhow!("spotlight targets must be lights"))?
            .mark_target();

        let light = self
            .get_mut(spot)
            .and_then(SceneObject::as_light_mut)
            .ok_or_else(|| anyhow!("only lights can be aimed"))?;
        light.spot.get_or_insert_with(Spotlight::default).target = Some(target);

        Ok(())
    }

    /// Resolve the position a light is aimed at, if it is a spotlight with a live target.
    pub fn target_position(&self, light: &Light) -> Option<Point3<f32>> {
        let target = light.spot.as_ref()?.target?;
        self.get(target).map(SceneObject::position)
    }

    /// Resolve the positions of every shape, for repeated distance queries.
    pub fn shapes(&self) -> Shapes<'_> {
        Shapes {
            shapes: self
                .iter()
                .filter_map(|(id, obj)| {
                    obj.prim()
                        .map(|prim| (id, prim, obj.placement.transform()))
                })
                .collect(),
        }
    }

    /// The closest surface along `ray`, tracing each object on its own.
    pub fn intersect(&self, ray: &Ray) -> Option<SceneHit> {
        self.iter()
            .filter_map(|(id, obj)| obj.intersect(ray).map(|hit| SceneHit { id, hit }))
            .min_by(|a, b| a.hit.t.total_cmp(&b.hit.t))
    }

    /// March `ray` through the combined distance field of every shape. The hit is attributed to
    /// whichever object is closest to the point where the march stopped.
    pub fn march(&self, ray: &Ray) -> Option<(ObjectId, MarchHit)> {
        self.march_shapes(&self.shapes(), ray)
    }

    /// As [`Scene::march`], reusing shapes that were already resolved.
    pub fn march_shapes(&self, shapes: &Shapes, ray: &Ray) -> Option<(ObjectId, MarchHit)> {
        let default = Vector3::z_axis();
        let mut hit = march::march(&self.march, shapes, ray, &default)?;
        let (id, prim) = shapes.closest(&hit.point)?;

        let fallback = prim.default_normal();
        if fallback != default {
            hit.normal =
                march::estimate_normal(shapes, &hit.point, self.march.normal_eps, &fallback);
        }

        Some((id, hit))
    }

    /// The object whose picking sphere `ray` hits first.
    pub fn pick(&self, ray: &Ray) -> Option<ObjectId> {
        self.iter()
            .filter_map(|(id, obj)| {
                obj.intersect_to_move(ray)
                    .map(|p| (id, (p - ray.position).norm()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
