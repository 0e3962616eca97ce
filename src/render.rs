//! Drawing a [`Scene`] through a [`PerspectiveCamera`].
//!
//! [`FrameRenderer`] is what the scene controller talks to. [`WgpuRenderer`]
//! is the GPU implementation: it mirrors scene meshes and materials into GPU
//! buffers the first time it sees them, re-blends morphed primitives on the
//! CPU every frame, and draws every mesh node as one instance.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    camera::{CameraUniform, PerspectiveCamera},
    config::RendererConfig,
    context::Context,
    data_structures::{
        color::Color,
        instance::InstanceRaw,
        model::Primitive,
        scene_graph::{NodeId, Scene},
        texture::{self, Texture},
    },
    pipelines::{
        basic::mk_model_pipeline,
        light::{LightResources, LightUniform},
    },
    resources::texture::base_color_layout,
};

/// Output side of the scene controller.
pub trait FrameRenderer {
    /// Physical pixels per logical pixel of the drawing buffer.
    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Sets the drawing buffer size in logical pixels.
    fn set_size(&mut self, width: u32, height: u32);

    /// Current drawing buffer size in logical pixels.
    fn size(&self) -> (u32, u32);

    /// Asks the host for another frame callback.
    fn request_frame(&self) {}

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()>;
}

pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

struct GpuPrimitive {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
    material: usize,
    morphed: bool,
}

struct GpuMaterial {
    bind_group: wgpu::BindGroup,
    double_sided: bool,
}

/// A primitive scheduled for this frame.
struct DrawCall {
    mesh: usize,
    primitive: usize,
    node: NodeId,
    instance: u32,
}

pub struct WgpuRenderer {
    ctx: Context,
    settings: RendererConfig,
    pixel_ratio: f64,
    logical_size: (u32, u32),
    depth_texture: Texture,
    msaa_target: Option<Texture>,
    camera: CameraResources,
    light: LightResources,
    material_layout: wgpu::BindGroupLayout,
    single_sided_pipeline: wgpu::RenderPipeline,
    double_sided_pipeline: wgpu::RenderPipeline,
    white: Texture,
    materials: Vec<GpuMaterial>,
    meshes: Vec<Vec<GpuPrimitive>>,
    /// Blended vertices of morphed primitives, per node and primitive.
    morphed: HashMap<(NodeId, usize), wgpu::Buffer>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    scene_id: u64,
}

impl WgpuRenderer {
    pub fn new(ctx: Context, settings: &RendererConfig) -> Self {
        let device = &ctx.device;
        let camera = CameraResources::new(device);
        let light = LightResources::new(
            LightUniform::from_scene(&Scene::new(), settings, ctx.surface_is_srgb()),
            device,
        );
        let material_layout = base_color_layout(device);
        let single_sided_pipeline = mk_model_pipeline(
            device,
            ctx.config.format,
            ctx.sample_count,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            false,
        );
        let double_sided_pipeline = mk_model_pipeline(
            device,
            ctx.config.format,
            ctx.sample_count,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            true,
        );
        let white = Texture::create_white(device, &ctx.queue);
        let depth_texture = Texture::create_depth_texture(
            device,
            [ctx.config.width, ctx.config.height],
            ctx.sample_count,
            "depth_texture",
        );
        let msaa_target = (ctx.sample_count > 1)
            .then(|| Texture::create_msaa_target(device, &ctx.config, ctx.sample_count));
        let instance_capacity = 16;
        let instance_buffer = mk_instance_buffer(device, instance_capacity);
        // the surface starts out at the window's physical size
        let pixel_ratio = ctx.window.scale_factor();
        let logical_size = (
            (ctx.config.width as f64 / pixel_ratio).round() as u32,
            (ctx.config.height as f64 / pixel_ratio).round() as u32,
        );

        Self {
            settings: settings.clone(),
            pixel_ratio,
            logical_size,
            depth_texture,
            msaa_target,
            camera,
            light,
            material_layout,
            single_sided_pipeline,
            double_sided_pipeline,
            white,
            materials: Vec::new(),
            meshes: Vec::new(),
            morphed: HashMap::new(),
            instance_buffer,
            instance_capacity,
            scene_id: 0,
            ctx,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Drawing buffer size in physical pixels, within the device's texture limit.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        physical_size(
            self.logical_size,
            self.pixel_ratio,
            self.ctx.device.limits().max_texture_dimension_2d,
        )
    }

    fn reconfigure(&mut self) {
        let (width, height) = self.drawing_buffer_size();
        if !self.ctx.resize(width, height) {
            return;
        }
        self.depth_texture = Texture::create_depth_texture(
            &self.ctx.device,
            [width, height],
            self.ctx.sample_count,
            "depth_texture",
        );
        if self.ctx.sample_count > 1 {
            self.msaa_target = Some(Texture::create_msaa_target(
                &self.ctx.device,
                &self.ctx.config,
                self.ctx.sample_count,
            ));
        }
    }

    /// Uploads meshes and materials added to the scene since the last frame.
    /// The scene only ever appends, so indices stay valid.
    fn sync_resources(&mut self, scene: &Scene) {
        if scene.id() != self.scene_id {
            log::debug!("New scene {}, dropping cached GPU resources", scene.id());
            self.materials.clear();
            self.meshes.clear();
            self.morphed.clear();
            self.scene_id = scene.id();
        }
        while self.materials.len() < scene.materials().len() {
            let idx = self.materials.len();
            let material = &scene.materials()[idx];
            let texture = material.base_color_texture.as_ref().map(|img| {
                Texture::from_image_data(&self.ctx.device, &self.ctx.queue, img, Some(&material.name))
            });
            let texture = texture.as_ref().unwrap_or(&self.white);
            let sampler = match &texture.sampler {
                Some(sampler) => sampler.clone(),
                None => texture::create_default_sampler(&self.ctx.device),
            };
            let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
                label: Some(&material.name),
            });
            self.materials.push(GpuMaterial {
                bind_group,
                double_sided: material.double_sided,
            });
        }

        let mut mesh_idx = self.meshes.len();
        while let Some(mesh) = scene.mesh(mesh_idx) {
            let primitives = mesh
                .primitives
                .iter()
                .enumerate()
                .map(|(i, primitive)| {
                    upload_primitive(&self.ctx.device, &format!("{} {}", mesh.name, i), primitive)
                })
                .collect();
            self.meshes.push(primitives);
            mesh_idx += 1;
        }
    }

    /// Collects draw calls and writes world transforms and blended vertices.
    fn prepare(&mut self, scene: &Scene) -> Vec<DrawCall> {
        let world = scene.world_transforms();
        let mut instances: Vec<InstanceRaw> = Vec::new();
        let mut calls = Vec::new();

        for (id, node) in scene.nodes() {
            let Some(mesh_idx) = node.mesh else {
                continue;
            };
            let (Some(mesh), Some(gpu_mesh)) = (scene.mesh(mesh_idx), self.meshes.get(mesh_idx))
            else {
                continue;
            };
            let instance = instances.len() as u32;
            instances.push(world[id.0].to_raw());

            let weights = scene.effective_weights(node);
            for (p, (primitive, gpu)) in mesh.primitives.iter().zip(gpu_mesh).enumerate() {
                if gpu.morphed {
                    let vertices = primitive.blend(&weights);
                    match self.morphed.get(&(id, p)) {
                        Some(buffer) => {
                            self.ctx
                                .queue
                                .write_buffer(buffer, 0, bytemuck::cast_slice(&vertices))
                        }
                        None => {
                            let buffer =
                                self.ctx
                                    .device
                                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                        label: Some("Morphed Vertex Buffer"),
                                        contents: bytemuck::cast_slice(&vertices),
                                        usage: wgpu::BufferUsages::VERTEX
                                            | wgpu::BufferUsages::COPY_DST,
                                    });
                            self.morphed.insert((id, p), buffer);
                        }
                    }
                }
                calls.push(DrawCall {
                    mesh: mesh_idx,
                    primitive: p,
                    node: id,
                    instance,
                });
            }
        }

        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = mk_instance_buffer(&self.ctx.device, self.instance_capacity);
        }
        if !instances.is_empty() {
            self.ctx
                .queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        calls
    }

    fn clear_color(&self, background: Option<Color>) -> wgpu::Color {
        let Some(background) = background else {
            return wgpu::Color::BLACK;
        };
        if self.settings.gamma_output && !self.ctx.surface_is_srgb() {
            let encode = |c: f32| c.max(0.0).powf(1.0 / self.settings.gamma_factor) as f64;
            return wgpu::Color {
                r: encode(background.r),
                g: encode(background.g),
                b: encode(background.b),
                a: 1.0,
            };
        }
        background.into()
    }
}

impl FrameRenderer for WgpuRenderer {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        if ratio <= 0.0 || ratio == self.pixel_ratio {
            return;
        }
        self.pixel_ratio = ratio;
        self.reconfigure();
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == self.logical_size && self.ctx.is_surface_configured() {
            return;
        }
        self.logical_size = (width, height);
        #[cfg(target_arch = "wasm32")]
        {
            // the canvas follows the container
            let _ = self
                .ctx
                .window
                .request_inner_size(winit::dpi::LogicalSize::new(width, height));
        }
        self.reconfigure();
    }

    fn size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn request_frame(&self) {
        self.ctx.window.request_redraw();
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }

        self.sync_resources(scene);
        let calls = self.prepare(scene);

        self.camera.uniform.update_view_proj(camera);
        self.ctx.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
        let lights = LightUniform::from_scene(scene, &self.settings, self.ctx.surface_is_srgb());
        self.light.write(&self.ctx.queue, lights);

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(anyhow::anyhow!("Surface texture acquisition failed validation"));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (color_view, resolve_target) = match &self.msaa_target {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color(scene.background)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_bind_group(1, &self.camera.bind_group, &[]);
            render_pass.set_bind_group(2, &self.light.bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

            for call in &calls {
                let Some(gpu) = self.meshes.get(call.mesh).and_then(|m| m.get(call.primitive))
                else {
                    continue;
                };
                if gpu.num_elements == 0 {
                    continue;
                }
                let Some(material) = self.materials.get(gpu.material) else {
                    log::warn!("Primitive references missing material {}", gpu.material);
                    continue;
                };
                let vertex_buffer = if gpu.morphed {
                    self.morphed
                        .get(&(call.node, call.primitive))
                        .unwrap_or(&gpu.vertex_buffer)
                } else {
                    &gpu.vertex_buffer
                };
                render_pass.set_pipeline(if material.double_sided {
                    &self.double_sided_pipeline
                } else {
                    &self.single_sided_pipeline
                });
                render_pass.set_bind_group(0, &material.bind_group, &[]);
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                render_pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..gpu.num_elements, 0, call.instance..call.instance + 1);
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn upload_primitive(device: &wgpu::Device, label: &str, primitive: &Primitive) -> GpuPrimitive {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", label)),
        contents: bytemuck::cast_slice(&primitive.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", label)),
        contents: bytemuck::cast_slice(&primitive.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuPrimitive {
        vertex_buffer,
        index_buffer,
        num_elements: primitive.indices.len() as u32,
        material: primitive.material,
        morphed: primitive.is_morphed(),
    }
}

fn mk_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Scales a logical size by `ratio`, shrinking both sides evenly when the
/// larger one would exceed `max_dimension`.
fn physical_size(logical: (u32, u32), ratio: f64, max_dimension: u32) -> (u32, u32) {
    let width = logical.0 as f64 * ratio;
    let height = logical.1 as f64 * ratio;
    let largest = width.max(height);
    let fit = if largest > max_dimension as f64 {
        max_dimension as f64 / largest
    } else {
        1.0
    };
    let side = |v: f64| ((v * fit).round() as u32).min(max_dimension);
    (side(width), side(height))
}
