use cgmath::{Rad, Vector3};
use thiserror::Error;

use crate::{
    gfx::uniforms::LIGHT_CAPACITY,
    wgpu_utils::device::{GpuDevice, GpuError},
};

use super::{light::PointLight, material::BlinnPhongMaterial, vertex::InstanceData};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene already holds {limit} lights")]
    LightLimitReached { limit: usize },
    #[error("no light at index {0}")]
    NoSuchLight(usize),
}

/// A drawable object placed in the scene
#[derive(Debug, Clone)]
pub struct Renderable {
    pub name: String,
    pub position: Vector3<f32>,
    pub scale: f32,
    /// Spin about the Y axis in radians per second
    pub rotation_speed: f32,
    pub angle: Rad<f32>,
    pub material: BlinnPhongMaterial,
    pub visible: bool,
}

impl Renderable {
    pub fn new(name: impl Into<String>, position: Vector3<f32>) -> Self {
        Self {
            name: name.into(),
            position,
            scale: 1.0,
            rotation_speed: 0.0,
            angle: Rad(0.0),
            material: BlinnPhongMaterial::default(),
            visible: true,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation_speed(mut self, radians_per_second: f32) -> Self {
        self.rotation_speed = radians_per_second;
        self
    }

    pub fn with_material(mut self, material: BlinnPhongMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn instance(&self) -> InstanceData {
        InstanceData::new(
            self.position,
            self.scale,
            self.angle,
            self.material.packed(),
        )
    }
}

/// Main scene containing renderables and the light collection
///
/// Lights keep insertion order; the frame orchestrator only ever reads a
/// snapshot of them through [`Scene::lights`].
pub struct Scene {
    pub objects: Vec<Renderable>,
    lights: Vec<PointLight>,
    light_limit: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            lights: Vec::new(),
            light_limit: LIGHT_CAPACITY,
        }
    }

    /// Overrides the maximum number of lights the scene accepts.
    ///
    /// A limit above the lights buffer capacity is rejected when the
    /// application is prepared.
    pub fn with_light_limit(mut self, limit: usize) -> Self {
        self.light_limit = limit;
        self
    }

    pub fn light_limit(&self) -> usize {
        self.light_limit
    }

    /// Ordered snapshot of the current lights
    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.lights
    }

    pub fn add_light(&mut self, light: PointLight) -> Result<usize, SceneError> {
        if self.lights.len() >= self.light_limit {
            return Err(SceneError::LightLimitReached {
                limit: self.light_limit,
            });
        }
        self.lights.push(light);
        Ok(self.lights.len() - 1)
    }

    pub fn remove_light(&mut self, index: usize) -> Result<PointLight, SceneError> {
        if index >= self.lights.len() {
            return Err(SceneError::NoSuchLight(index));
        }
        Ok(self.lights.remove(index))
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    pub fn add_renderable(&mut self, renderable: Renderable) -> &mut Renderable {
        self.objects.push(renderable);
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    /// Advances animation by `dt` seconds. Works with any frame time.
    pub fn update(&mut self, dt: f32) {
        for object in self.objects.iter_mut() {
            if object.rotation_speed != 0.0 {
                let angle = (object.angle.0 + object.rotation_speed * dt) % std::f32::consts::TAU;
                object.angle = Rad(angle);
            }
        }
    }

    /// Instance data for every visible renderable, in scene order
    pub fn instances(&self) -> Vec<InstanceData> {
        self.objects
            .iter()
            .filter(|object| object.visible)
            .map(Renderable::instance)
            .collect()
    }

    /// Issues the draw pass for the current frame.
    pub fn draw(&self, device: &mut dyn GpuDevice) -> Result<(), GpuError> {
        let instances = self.instances();
        log::trace!("Drawing {} instances", instances.len());
        device.draw_instances(&instances)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wgpu_utils::recording::{GpuCommand, RecordingDevice};

    #[test]
    fn test_lights_keep_insertion_order() {
        let mut scene = Scene::new();
        for i in 0..3 {
            scene
                .add_light(PointLight::new(
                    Vector3::new(i as f32, 0.0, 0.0),
                    [1.0; 3],
                    1.0,
                ))
                .unwrap();
        }
        let xs: Vec<f32> = scene.lights().iter().map(|l| l.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);

        scene.remove_light(1).unwrap();
        let xs: Vec<f32> = scene.lights().iter().map(|l| l.position.x).collect();
        assert_eq!(xs, vec![0.0, 2.0]);
    }

    #[test]
    fn test_light_limit_is_enforced() {
        let mut scene = Scene::new().with_light_limit(2);
        scene.add_light(PointLight::default()).unwrap();
        scene.add_light(PointLight::default()).unwrap();
        assert_eq!(
            scene.add_light(PointLight::default()),
            Err(SceneError::LightLimitReached { limit: 2 })
        );
        assert_eq!(scene.remove_light(5), Err(SceneError::NoSuchLight(5)));
    }

    #[test]
    fn test_update_scales_with_dt() {
        let mut scene = Scene::new();
        scene.add_renderable(Renderable::new("spinner", Vector3::new(0.0, 0.0, 0.0)).with_rotation_speed(1.0));

        scene.update(0.25);
        scene.update(0.5);
        assert!((scene.objects[0].angle.0 - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_draw_skips_hidden_objects() {
        let mut device = RecordingDevice::new();
        device.initialize().unwrap();

        let mut scene = Scene::new();
        scene.add_renderable(Renderable::new("a", Vector3::new(0.0, 0.0, 0.0)));
        scene.add_renderable(Renderable::new("b", Vector3::new(1.0, 0.0, 0.0))).visible = false;

        scene.draw(&mut device).unwrap();
        assert_eq!(
            device.commands(),
            &[GpuCommand::Draw { instance_count: 1 }]
        );
    }
}
