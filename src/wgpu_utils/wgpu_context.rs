//! wgpu implementation of [`GpuDevice`]
//!
//! Owns the surface, device and queue of one window, the global bind group
//! that exposes the uniform buffers to shaders, and the single scene pipeline
//! drawing instanced unit cubes with Blinn-Phong shading.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::device::{check_write_range, BindingSlot, BufferHandle, GpuDevice, GpuError};
use crate::{
    config::AppConfig,
    gfx::{
        scene::vertex::{unit_cube, InstanceData, Vertex3D},
        shader::scene_shader_source,
        uniforms::{CameraUniformBlock, LightUniformBlock, CAMERA_SLOT, LIGHTS_SLOT},
    },
};

/// Standard depth buffer format used by the scene pass
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const INITIAL_INSTANCE_CAPACITY: usize = 64;

/// GPU objects that only exist once `initialize` succeeded
struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    global_layout: wgpu::BindGroupLayout,
    global_bind_group: Option<wgpu::BindGroup>,
    pipeline: wgpu::RenderPipeline,
    cube_vertices: wgpu::Buffer,
    cube_indices: wgpu::Buffer,
    cube_index_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

struct UniformAllocation {
    slot: BindingSlot,
    buffer: wgpu::Buffer,
}

pub struct WgpuContext {
    window: Arc<Window>,
    width: u32,
    height: u32,
    vsync: bool,
    clear_color: wgpu::Color,
    gpu: Option<GpuState>,
    buffers: HashMap<BufferHandle, UniformAllocation>,
    slots: BTreeMap<BindingSlot, BufferHandle>,
    next_id: u32,
}

impl WgpuContext {
    /// Creates an uninitialized context for `window`. No GPU work happens
    /// until [`GpuDevice::initialize`].
    pub fn new(window: Arc<Window>, config: &AppConfig) -> Self {
        let [r, g, b, a] = config.clear_color;
        Self {
            window,
            width: config.width.max(1),
            height: config.height.max(1),
            vsync: config.vsync,
            clear_color: wgpu::Color { r, g, b, a },
            gpu: None,
            buffers: HashMap::new(),
            slots: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.gpu.as_ref().map(|gpu| gpu.config.format)
    }

    fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }

    async fn create_gpu_state(&self) -> Result<GpuState, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(self.window.clone())
            .map_err(|e| GpuError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::Surface(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("rsm Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| GpuError::Surface(e.to_string()))?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| GpuError::Surface("surface reports no formats".to_owned()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: self.width,
            height: self.height,
            present_mode: self.present_mode(),
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, &config);

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: CAMERA_SLOT.0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: uniform_binding(std::mem::size_of::<CameraUniformBlock>()),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: LIGHTS_SLOT.0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: uniform_binding(std::mem::size_of::<LightUniformBlock>()),
                    count: None,
                },
            ],
        });

        let pipeline = create_scene_pipeline(&device, &global_layout, format);

        let (vertices, indices) = unit_cube();
        let cube_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCE_CAPACITY);

        Ok(GpuState {
            surface,
            device,
            queue,
            config,
            depth_view,
            global_layout,
            global_bind_group: None,
            pipeline,
            cube_vertices,
            cube_indices,
            cube_index_count: indices.len() as u32,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
        })
    }

    /// Builds the global bind group from the current slot assignments.
    fn global_bind_group(&mut self) -> Result<(), GpuError> {
        let gpu = self.gpu.as_mut().ok_or(GpuError::NotInitialized)?;
        if gpu.global_bind_group.is_some() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(2);
        for slot in [CAMERA_SLOT, LIGHTS_SLOT] {
            let allocation = self
                .slots
                .get(&slot)
                .and_then(|handle| self.buffers.get(handle))
                .ok_or(GpuError::MissingBinding(slot))?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot.0,
                resource: allocation.buffer.as_entire_binding(),
            });
        }

        gpu.global_bind_group = Some(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global Bind Group"),
            layout: &gpu.global_layout,
            entries: &entries,
        }));
        log::debug!("Rebuilt global bind group");
        Ok(())
    }

    fn invalidate_bindings(&mut self) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.global_bind_group = None;
        }
    }
}

impl GpuDevice for WgpuContext {
    fn initialize(&mut self) -> Result<(), GpuError> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let gpu = pollster::block_on(self.create_gpu_state())?;
        log::info!(
            "GPU context ready ({:?}, {}x{})",
            gpu.config.format,
            gpu.config.width,
            gpu.config.height
        );
        self.gpu = Some(gpu);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    fn create_uniform_buffer(
        &mut self,
        label: &str,
        size: u64,
        slot: BindingSlot,
    ) -> Result<BufferHandle, GpuError> {
        let gpu = self.gpu.as_ref().ok_or(GpuError::NotInitialized)?;
        if self.slots.contains_key(&slot) {
            return Err(GpuError::SlotInUse(slot));
        }

        let max_size = u64::from(gpu.device.limits().max_uniform_buffer_binding_size);
        if size == 0 || size > max_size {
            return Err(GpuError::AllocationFailed {
                label: label.to_owned(),
                size,
                reason: format!("uniform buffers must hold 1..={} bytes", max_size),
            });
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(error) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(GpuError::AllocationFailed {
                label: label.to_owned(),
                size,
                reason: error.to_string(),
            });
        }

        let handle = BufferHandle(self.next_id);
        self.next_id += 1;
        self.buffers.insert(handle, UniformAllocation { slot, buffer });
        self.slots.insert(slot, handle);
        self.invalidate_bindings();
        Ok(handle)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let gpu = self.gpu.as_ref().ok_or(GpuError::NotInitialized)?;
        let allocation = self
            .buffers
            .get(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        check_write_range(offset, data.len() as u64, allocation.buffer.size())?;

        gpu.queue.write_buffer(&allocation.buffer, offset, data);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(allocation) = self.buffers.remove(&buffer) {
            self.slots.remove(&allocation.slot);
            allocation.buffer.destroy();
            self.invalidate_bindings();
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;

        if let Some(gpu) = self.gpu.as_mut() {
            gpu.config.width = width;
            gpu.config.height = height;
            gpu.surface.configure(&gpu.device, &gpu.config);
            gpu.depth_view = create_depth_view(&gpu.device, &gpu.config);
        }
    }

    fn draw_instances(&mut self, instances: &[InstanceData]) -> Result<(), GpuError> {
        self.global_bind_group()?;
        let clear_color = self.clear_color;
        let gpu = self.gpu.as_mut().ok_or(GpuError::NotInitialized)?;

        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(GpuError::Surface(e.to_string())),
        };

        if instances.len() > gpu.instance_capacity {
            gpu.instance_capacity = instances.len().next_power_of_two();
            gpu.instance_buffer = create_instance_buffer(&gpu.device, gpu.instance_capacity);
        }
        if !instances.is_empty() {
            gpu.queue
                .write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(instances));
        }

        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let (false, Some(bind_group)) = (instances.is_empty(), gpu.global_bind_group.as_ref()) {
                render_pass.set_pipeline(&gpu.pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.set_vertex_buffer(0, gpu.cube_vertices.slice(..));
                render_pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
                render_pass.set_index_buffer(gpu.cube_indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..gpu.cube_index_count, 0, 0..instances.len() as u32);
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        surface_texture.present();
        Ok(())
    }
}

/// Uniform binding that rejects buffers smaller than the block it holds
fn uniform_binding(block_size: usize) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: wgpu::BufferSize::new(block_size as u64),
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceData>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    global_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scene Shader"),
        source: wgpu::ShaderSource::Wgsl(scene_shader_source().into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: &[global_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex3D::desc(), InstanceData::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
