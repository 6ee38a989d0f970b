use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, error, warn};
use wgpu::util::DeviceExt;

use crate::error::TumbleError;
use crate::model::{Camera, Geometry, Scene, SceneRenderer, VisualId};
use crate::ui::Overlay;
use crate::utils::{Mesh, MeshBuffer, Vertex};
use crate::view::GpuContext;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.05, g: 0.06, b: 0.08, a: 1.0 };
const LIGHT_DIR: [f32; 3] = [-0.4, -1.0, -0.3];
const AMBIENT: f32 = 0.3;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct EntityUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

/// GPU objects for one visual, created the first time it is drawn
struct EntityResources {
    geometry: Geometry,
    mesh: MeshBuffer,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
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
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> wgpu::RenderPipeline {
    let cull_mode = match topology {
        wgpu::PrimitiveTopology::TriangleList => Some(wgpu::Face::Back),
        _ => None,
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                    wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
                ],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// Draws every visual in the scene: solid materials as lit triangles, wireframe
/// materials as unlit line lists, then the egui overlay if one was handed over.
pub struct MeshRenderer {
    gpu: GpuContext,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    entity_layout: wgpu::BindGroupLayout,
    fill_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    entities: HashMap<VisualId, EntityResources>,
    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<Overlay>,
    failure: Option<TumbleError>,
}

impl MeshRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let device = gpu.device.as_ref();
        let (depth_texture, depth_view) = create_depth_texture(device, gpu.config.width, gpu.config.height);

        let globals_layout = uniform_layout(device, "globals_layout");
        let entity_layout = uniform_layout(device, "entity_layout");

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals_buffer"),
            size: std::mem::size_of::<GlobalsUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buffer.as_entire_binding() }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &entity_layout],
            push_constant_ranges: &[],
        });
        let fill_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            gpu.format,
            wgpu::PrimitiveTopology::TriangleList,
            "fill_pipeline",
        );
        let line_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            gpu.format,
            wgpu::PrimitiveTopology::LineList,
            "line_pipeline",
        );

        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        Self {
            depth_texture,
            depth_view,
            globals_buffer,
            globals_bind_group,
            entity_layout,
            fill_pipeline,
            line_pipeline,
            entities: HashMap::new(),
            egui_renderer,
            overlay: None,
            failure: None,
            gpu,
        }
    }

    /// Overlay to composite on top of the next frame. Texture changes of an
    /// overlay that never reached the screen are carried over.
    pub fn set_overlay(&mut self, overlay: Overlay) {
        let overlay = match self.overlay.take() {
            Some(pending) => overlay.superseding(pending),
            None => overlay,
        };
        self.overlay = Some(overlay);
    }

    /// Set once the surface fails in a way a reconfigure cannot fix
    pub fn take_failure(&mut self) -> Option<TumbleError> {
        self.failure.take()
    }

    fn sync_entities(&mut self, scene: &Scene) {
        // Prune entities whose visual is gone
        self.entities.retain(|id, _| scene.contains(*id));

        let device = self.gpu.device.as_ref();
        for visual in scene.iter() {
            let uniform = EntityUniform {
                model: visual.transform.matrix().to_cols_array_2d(),
                color: [
                    visual.material.color[0],
                    visual.material.color[1],
                    visual.material.color[2],
                    if visual.material.wireframe { 0.0 } else { 1.0 },
                ],
            };

            let stale = self.entities.get(&visual.id).is_some_and(|e| e.geometry != visual.geometry);
            if stale {
                self.entities.remove(&visual.id);
            }

            if let Some(entity) = self.entities.get(&visual.id) {
                self.gpu.queue.write_buffer(&entity.uniform, 0, bytemuck::bytes_of(&uniform));
                continue;
            }

            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("entity_uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("entity_bind_group"),
                layout: &self.entity_layout,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }],
            });
            let mesh = Mesh::for_geometry(&visual.geometry).upload(device);
            debug!(visual = visual.id.0, geometry = ?visual.geometry, "uploaded mesh");
            self.entities.insert(
                visual.id,
                EntityResources { geometry: visual.geometry, mesh, uniform: uniform_buffer, bind_group },
            );
        }
    }

    fn acquire_frame(&mut self) -> Option<wgpu::SurfaceTexture> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                match self.gpu.surface.get_current_texture() {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        warn!(error = ?e, "frame skipped after reconfigure");
                        None
                    }
                }
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory");
                self.failure = Some(TumbleError::Gpu("surface out of memory".to_string()));
                None
            }
            Err(e) => {
                warn!(error = ?e, "frame skipped");
                None
            }
        }
    }
}

impl SceneRenderer for MeshRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        let globals = GlobalsUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            light_dir: [LIGHT_DIR[0], LIGHT_DIR[1], LIGHT_DIR[2], AMBIENT],
        };
        self.gpu.queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
        self.sync_entities(scene);

        let Some(frame) = self.acquire_frame() else {
            return;
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let device = self.gpu.device.as_ref();
        let queue = self.gpu.queue.as_ref();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("encoder") });

        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mesh_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(CLEAR_COLOR), store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_bind_group(0, &self.globals_bind_group, &[]);

            for visual in scene.iter() {
                let Some(entity) = self.entities.get(&visual.id) else {
                    continue;
                };
                let (pipeline, buffer, count) = if visual.material.wireframe {
                    (&self.line_pipeline, &entity.mesh.edge_buffer, entity.mesh.edge_count)
                } else {
                    (&self.fill_pipeline, &entity.mesh.index_buffer, entity.mesh.index_count)
                };
                if count == 0 {
                    continue;
                }
                rp.set_pipeline(pipeline);
                rp.set_bind_group(1, &entity.bind_group, &[]);
                rp.set_vertex_buffer(0, entity.mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                rp.draw_indexed(0..count, 0, 0..1);
            }
        }

        if let Some(overlay) = self.overlay.take() {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.gpu.config.width, self.gpu.config.height],
                pixels_per_point: overlay.pixels_per_point,
            };
            for (id, image_delta) in &overlay.textures_delta.set {
                self.egui_renderer.update_texture(device, queue, *id, image_delta);
            }
            self.egui_renderer
                .update_buffers(device, queue, &mut encoder, &overlay.primitives, &screen_descriptor);
            {
                let egui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_render_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.egui_renderer
                    .render(&mut egui_pass.forget_lifetime(), &overlay.primitives, &screen_descriptor);
            }
            for id in &overlay.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        let (depth_texture, depth_view) = create_depth_texture(&self.gpu.device, width, height);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;
    }
}
