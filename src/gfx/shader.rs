//! Scene shader
//!
//! Declares the camera and lights blocks with the exact layouts of
//! [`CameraUniformBlock`](crate::gfx::uniforms::CameraUniformBlock) and
//! [`LightUniformBlock`](crate::gfx::uniforms::LightUniformBlock). The light
//! array length is substituted from [`LIGHT_CAPACITY`] so the two can not
//! drift apart.

use crate::gfx::uniforms::{CAMERA_SLOT, LIGHTS_SLOT, LIGHT_CAPACITY};

const SCENE_SHADER_TEMPLATE: &str = r#"
struct CameraBlock {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    position: vec4<f32>,
}

struct LightEntry {
    position: vec4<f32>,    // w = 1
    color: vec4<f32>,       // rgb, w = intensity
    attenuation: vec4<f32>, // constant, linear, quadratic, range
}

struct LightsBlock {
    count: u32,
    _padding0: u32,
    _padding1: u32,
    _padding2: u32,
    entries: array<LightEntry, {{LIGHT_CAPACITY}}>,
}

@group(0) @binding({{CAMERA_SLOT}})
var<uniform> camera: CameraBlock;

@group(0) @binding({{LIGHTS_SLOT}})
var<uniform> lights: LightsBlock;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) material: vec4<f32>, // diffuse rgb, w = shininess
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) material: vec4<f32>,
}

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
    let world_position = model * vec4<f32>(vertex.position, 1.0);

    // uniform scale only, so the model matrix also transforms normals
    let world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);

    var output: VertexOutput;
    output.clip_position = camera.view_proj * world_position;
    output.world_position = world_position.xyz;
    output.world_normal = world_normal;
    output.material = instance.material;
    return output;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.world_normal);
    let view_dir = normalize(camera.position.xyz - in.world_position);
    let diffuse_color = in.material.rgb;
    let shininess = in.material.w;

    var color = diffuse_color * 0.05;

    // entries past `count` are undefined
    let count = min(lights.count, {{LIGHT_CAPACITY}}u);
    for (var i = 0u; i < count; i = i + 1u) {
        let point_light = lights.entries[i];
        let to_light = point_light.position.xyz - in.world_position;
        let dist = length(to_light);
        if (dist > point_light.attenuation.w) {
            continue;
        }

        let light_dir = to_light / max(dist, 0.0001);
        let half_dir = normalize(light_dir + view_dir);
        let falloff = 1.0 / (point_light.attenuation.x
            + point_light.attenuation.y * dist
            + point_light.attenuation.z * dist * dist);
        let radiance = point_light.color.rgb * point_light.color.w * falloff;

        let n_dot_l = max(dot(normal, light_dir), 0.0);
        let specular = select(0.0, pow(max(dot(normal, half_dir), 0.0), shininess), n_dot_l > 0.0);

        color += (diffuse_color * n_dot_l + vec3<f32>(specular)) * radiance;
    }

    return vec4<f32>(color, 1.0);
}
"#;

/// WGSL source of the scene shader with binding slots and light capacity filled in
pub fn scene_shader_source() -> String {
    SCENE_SHADER_TEMPLATE
        .replace("{{LIGHT_CAPACITY}}", &LIGHT_CAPACITY.to_string())
        .replace("{{CAMERA_SLOT}}", &CAMERA_SLOT.0.to_string())
        .replace("{{LIGHTS_SLOT}}", &LIGHTS_SLOT.0.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_filled() {
        let source = scene_shader_source();
        assert!(!source.contains("{{"));
        assert!(source.contains(&format!("array<LightEntry, {}>", LIGHT_CAPACITY)));
        assert!(source.contains(&format!("@binding({})\nvar<uniform> camera", CAMERA_SLOT.0)));
        assert!(source.contains(&format!("@binding({})\nvar<uniform> lights", LIGHTS_SLOT.0)));
    }
}
