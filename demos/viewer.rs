//! # Viewer Demo
//!
//! A ring of spinning cubes lit by three colored point lights.
//!
//! ## Usage:
//! ```bash
//! RUST_LOG=info cargo run --example viewer
//! ```
//!
//! ## Controls:
//! - Left mouse drag: orbit
//! - Shift + left mouse drag: pan
//! - Mouse wheel: zoom
//! - Shift + C: reset the camera
//! - Escape: quit

use rsm::prelude::*;

const CUBE_COUNT: usize = 12;
const RING_RADIUS: f32 = 4.0;

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    scene.add_renderable(
        Renderable::new("floor", Vector3::new(0.0, -1.5, 0.0))
            .with_scale(0.5)
            .with_material(BlinnPhongMaterial::new([0.6, 0.6, 0.6], 8.0)),
    );

    for i in 0..CUBE_COUNT {
        let angle = i as f32 / CUBE_COUNT as f32 * std::f32::consts::TAU;
        let hue = i as f32 / CUBE_COUNT as f32;
        scene.add_renderable(
            Renderable::new(
                format!("cube_{i}"),
                Vector3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS),
            )
            .with_scale(0.4)
            .with_rotation_speed(0.5 + hue)
            .with_material(BlinnPhongMaterial::new([hue, 0.5, 1.0 - hue], 64.0)),
        );
    }

    let lights = [
        PointLight::new(Vector3::new(0.0, 4.0, 0.0), [1.0, 1.0, 1.0], 1.5),
        PointLight::new(Vector3::new(5.0, 1.0, 0.0), [1.0, 0.3, 0.2], 2.0)
            .with_attenuation(Attenuation::for_range(12.0)),
        PointLight::new(Vector3::new(-5.0, 1.0, 0.0), [0.2, 0.4, 1.0], 2.0)
            .with_attenuation(Attenuation::for_range(12.0)),
    ];
    for light in lights {
        if let Err(e) = scene.add_light(light) {
            log::warn!("Skipping light: {}", e);
        }
    }

    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::new(1280, 720)
        .with_title("rsm viewer")
        .with_camera(CameraConfig {
            distance: 10.0,
            auto_rotate: 0.1,
            ..Default::default()
        });

    rsm::run(config, build_scene)
}
