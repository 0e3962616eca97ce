use std::f32::consts::PI;

use cgmath::{EuclideanSpace, InnerSpace};
use wgpu::util::DeviceExt;

use crate::{
    config::RendererConfig,
    data_structures::scene_graph::{Light, Scene},
};

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(uniform: LightUniform, device: &wgpu::Device) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, uniform: LightUniform) {
        if self.uniform == uniform {
            return;
        }
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

/// Lighting and output encoding for the model shader.
///
/// Colours are linear and premultiplied with their intensity. Every field is
/// a vec4 to satisfy uniform alignment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    sky_color: [f32; 4],
    ground_color: [f32; 4],
    directional_color: [f32; 4],
    /// Unit vector pointing from the surface towards the light.
    directional_direction: [f32; 4],
    /// x: gamma factor, y: 1.0 when the shader has to gamma encode,
    /// z: scale applied to all irradiance.
    output: [f32; 4],
}

impl LightUniform {
    /// Collects the scene's lights. Only the first light of each kind is used.
    ///
    /// `surface_is_srgb` disables shader side gamma: the surface format already encodes.
    pub fn from_scene(scene: &Scene, settings: &RendererConfig, surface_is_srgb: bool) -> Self {
        let mut uniform = Self {
            sky_color: [0.0; 4],
            ground_color: [0.0; 4],
            directional_color: [0.0; 4],
            directional_direction: [0.0, 1.0, 0.0, 0.0],
            output: [
                settings.gamma_factor,
                if settings.gamma_output && !surface_is_srgb { 1.0 } else { 0.0 },
                // Lambert divides by PI; legacy lighting scales intensities up to cancel it.
                if settings.physically_correct_lights { 1.0 / PI } else { 1.0 },
                0.0,
            ],
        };
        let mut hemisphere_set = false;
        let mut directional_set = false;
        for light in scene.lights() {
            match light {
                Light::Hemisphere {
                    sky_color,
                    ground_color,
                    intensity,
                } if !hemisphere_set => {
                    uniform.sky_color = scaled(sky_color.to_array(), *intensity);
                    uniform.ground_color = scaled(ground_color.to_array(), *intensity);
                    hemisphere_set = true;
                }
                Light::Directional {
                    color,
                    intensity,
                    position,
                } if !directional_set => {
                    uniform.directional_color = scaled(color.to_array(), *intensity);
                    // the light targets the origin
                    let towards_light = position.to_vec();
                    if towards_light.magnitude2() > 0.0 {
                        let direction = towards_light.normalize();
                        uniform.directional_direction =
                            [direction.x, direction.y, direction.z, 0.0];
                    }
                    directional_set = true;
                }
                _ => log::debug!("Ignoring additional light {:?}", light),
            }
        }
        uniform
    }
}

fn scaled([r, g, b]: [f32; 3], intensity: f32) -> [f32; 4] {
    [r * intensity, g * intensity, b * intensity, 1.0]
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}
