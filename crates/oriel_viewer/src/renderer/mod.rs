pub mod mesh;
pub mod passes;

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use oriel_core::camera::Camera;
use oriel_core::passes::{plan_portal_passes, DepthStencilMode, PassCmd, PassPlan, ViewFrame};
use oriel_core::scene::{LightKind, MeshId, Scene};
use oriel_core::view::RenderOptions;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::renderer::mesh::{cube_mesh, portal_quad_mesh, sphere_mesh, GpuMesh};
use crate::renderer::passes::PassPipelines;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
const MAX_LIGHTS: usize = 8;
const SPHERE_RINGS: u32 = 24;
const SPHERE_SEGMENTS: u32 = 48;
const BACKGROUND_COLOR: wgpu::Color = wgpu::Color {
    r: 0.392,
    g: 0.584,
    b: 0.929,
    a: 1.0,
};

pub const CUBE_MESH: MeshId = MeshId(0);
pub const SPHERE_MESH: MeshId = MeshId(1);
pub const PORTAL_MESH: MeshId = MeshId(2);

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    // xyz = eye position, w = total render time in seconds
    camera_pos: [f32; 4],
}

impl CameraUniform {
    fn from_frame(frame: &ViewFrame, time_seconds: f32) -> Self {
        Self {
            view_proj: (frame.projection * frame.view).to_cols_array_2d(),
            camera_pos: [
                frame.camera_pos.x,
                frame.camera_pos.y,
                frame.camera_pos.z,
                time_seconds,
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct LightUniform {
    // xyz = direction, w = kind (0 directional, 1 point)
    direction: [f32; 4],
    // xyz = position, w = range
    position: [f32; 4],
    // xyz = color, w = intensity
    color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct LightsUniform {
    // xyz = ambient color, w = active light count
    ambient: [f32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

impl LightsUniform {
    fn from_scene(scene: &Scene) -> Self {
        let mut lights = [LightUniform::zeroed(); MAX_LIGHTS];
        let count = scene.lights.len().min(MAX_LIGHTS);
        for (slot, light) in lights.iter_mut().zip(scene.lights.iter()) {
            let kind = match light.kind {
                LightKind::Directional => 0.0,
                LightKind::Point => 1.0,
            };
            *slot = LightUniform {
                direction: [
                    light.direction.x,
                    light.direction.y,
                    light.direction.z,
                    kind,
                ],
                position: [light.position.x, light.position.y, light.position.z, light.range],
                color: [light.color.x, light.color.y, light.color.z, light.intensity],
            };
        }
        Self {
            ambient: [scene.ambient.x, scene.ambient.y, scene.ambient.z, count as f32],
            lights,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    // rgb tint, a = opacity
    tint: [f32; 4],
    // x = recursive border flag, rest unused
    flags: [f32; 4],
}

#[derive(Debug)]
struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct DepthTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Oriel Depth Stencil Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[derive(Debug)]
pub enum RendererInitError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RendererInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(err) => write!(f, "failed to create surface: {err}"),
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
            Self::UnsupportedSurface => write!(f, "adapter does not support this surface"),
        }
    }
}

impl std::error::Error for RendererInitError {}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: DepthTexture,
    pipelines: PassPipelines,
    meshes: Vec<GpuMesh>,
    lights_slot: UniformSlot,
    frame_slots: Vec<UniformSlot>,
    object_slots: Vec<UniformSlot>,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, RendererInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(RendererInitError::CreateSurface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(RendererInitError::RequestAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Oriel Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(RendererInitError::RequestDevice)?;

        let initial_size = window.inner_size();
        let surface_config = surface
            .get_default_config(&adapter, initial_size.width.max(1), initial_size.height.max(1))
            .ok_or(RendererInitError::UnsupportedSurface)?;

        surface.configure(&device, &surface_config);

        let pipelines = PassPipelines::new(&device, surface_config.format, DEPTH_FORMAT);
        let depth_texture = DepthTexture::new(&device, surface_config.width, surface_config.height);

        // Mesh order must match the CUBE_MESH/SPHERE_MESH/PORTAL_MESH ids.
        let meshes = vec![
            GpuMesh::upload(&device, "Cube Mesh", &cube_mesh()),
            GpuMesh::upload(
                &device,
                "Sphere Mesh",
                &sphere_mesh(SPHERE_RINGS, SPHERE_SEGMENTS),
            ),
            GpuMesh::upload(&device, "Portal Quad Mesh", &portal_quad_mesh()),
        ];

        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Uniform Buffer"),
            contents: bytemuck::bytes_of(&LightsUniform::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lights Bind Group"),
            layout: &pipelines.lights_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lights_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            pipelines,
            meshes,
            lights_slot: UniformSlot {
                buffer: lights_buffer,
                bind_group: lights_bind_group,
            },
            frame_slots: Vec::new(),
            object_slots: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture = DepthTexture::new(&self.device, width, height);
    }

    fn uniform_slot<T: Pod>(&self, label: &str, layout: &wgpu::BindGroupLayout) -> UniformSlot {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&T::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        UniformSlot { buffer, bind_group }
    }

    fn ensure_frame_slots(&mut self, count: usize) {
        while self.frame_slots.len() < count {
            let slot = self.uniform_slot::<CameraUniform>(
                "Frame Camera Uniform",
                &self.pipelines.camera_bind_group_layout,
            );
            self.frame_slots.push(slot);
        }
    }

    fn ensure_object_slots(&mut self, count: usize) {
        while self.object_slots.len() < count {
            let slot = self.uniform_slot::<ObjectUniform>(
                "Object Uniform",
                &self.pipelines.object_bind_group_layout,
            );
            self.object_slots.push(slot);
        }
    }

    /// Renders one frame: derives the portal pass plan on the CPU, uploads
    /// the per-frame camera and per-object uniforms, then executes the plan
    /// as a sequence of render passes split at depth-clear boundaries.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        options: &RenderOptions,
        time_seconds: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        let root = ViewFrame {
            view: camera.view(),
            projection: camera.projection(),
            camera_pos: camera.transform().position(),
        };
        let plan = plan_portal_passes(&mut scene.portals, root, options);

        self.ensure_frame_slots(plan.frames.len());
        for (slot, frame) in self.frame_slots.iter().zip(plan.frames.iter()) {
            let uniform = CameraUniform::from_frame(frame, time_seconds);
            self.queue
                .write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&uniform));
        }

        self.queue.write_buffer(
            &self.lights_slot.buffer,
            0,
            bytemuck::bytes_of(&LightsUniform::from_scene(scene)),
        );

        // Entity slots first, then two slots per portal: the flat border
        // variant and the recursive one.
        let entity_count = scene.entities.len();
        let portal_count = scene.portals.len();
        self.ensure_object_slots(entity_count + portal_count * 2);
        for (index, entity) in scene.entities.iter_mut().enumerate() {
            let uniform = ObjectUniform {
                model: entity.transform.world_matrix().to_cols_array_2d(),
                normal_matrix: entity.transform.world_inverse_transpose().to_cols_array_2d(),
                tint: [1.0, 1.0, 1.0, 1.0],
                flags: [0.0; 4],
            };
            self.queue.write_buffer(
                &self.object_slots[index].buffer,
                0,
                bytemuck::bytes_of(&uniform),
            );
        }
        let portal_ids: Vec<_> = scene.portals.ids().collect();
        for (index, &id) in portal_ids.iter().enumerate() {
            let border_color = scene.portals.get(id).border_color();
            let portal = scene.portals.get_mut(id);
            let model = portal.transform_mut().world_matrix().to_cols_array_2d();
            let normal_matrix = portal
                .transform_mut()
                .world_inverse_transpose()
                .to_cols_array_2d();
            for recursive in 0..2 {
                let uniform = ObjectUniform {
                    model,
                    normal_matrix,
                    tint: [border_color.x, border_color.y, border_color.z, 1.0],
                    flags: [recursive as f32, 0.0, 0.0, 0.0],
                };
                let slot = entity_count + index * 2 + recursive;
                self.queue.write_buffer(
                    &self.object_slots[slot].buffer,
                    0,
                    bytemuck::bytes_of(&uniform),
                );
            }
        }

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Oriel Command Encoder"),
            });

        self.execute_plan(&mut encoder, &view, &plan, scene, entity_count);

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn execute_plan(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        plan: &PassPlan,
        scene: &Scene,
        entity_count: usize,
    ) {
        // Split the command list into wgpu render passes at ClearDepth
        // boundaries; the stencil buffer persists across all of them.
        let mut segments: Vec<&[PassCmd]> = Vec::new();
        let mut start = 0;
        for (index, cmd) in plan.cmds.iter().enumerate() {
            if matches!(cmd, PassCmd::ClearDepth) {
                segments.push(&plan.cmds[start..index]);
                start = index + 1;
            }
        }
        segments.push(&plan.cmds[start..]);

        // Mode and reference survive segment boundaries: the plan sets the
        // stencil state, then clears depth, then draws.
        let mut mode = DepthStencilMode::SceneStencilGe;
        let mut reference = 0u32;
        for (segment_index, segment) in segments.iter().enumerate() {
            let first = segment_index == 0;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Oriel Portal Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if first {
                            wgpu::LoadOp::Clear(BACKGROUND_COLOR)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: if first {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for cmd in *segment {
                match *cmd {
                    PassCmd::SetDepthStencil {
                        mode: m,
                        reference: r,
                    } => {
                        mode = m;
                        reference = r;
                    }
                    PassCmd::ClearDepth => unreachable!("segments split on ClearDepth"),
                    PassCmd::DrawPortalMask { portal, frame } => {
                        let slot = entity_count + portal.index() * 2;
                        render_pass.set_pipeline(self.pipelines.mask(mode));
                        render_pass.set_stencil_reference(reference);
                        self.draw_object(&mut render_pass, PORTAL_MESH, frame, slot);
                    }
                    PassCmd::DrawPortalBorder {
                        portal,
                        frame,
                        recursive,
                    } => {
                        let slot = entity_count + portal.index() * 2 + usize::from(recursive);
                        render_pass.set_pipeline(self.pipelines.border(mode));
                        render_pass.set_stencil_reference(reference);
                        self.draw_object(&mut render_pass, PORTAL_MESH, frame, slot);
                    }
                    PassCmd::DrawScene { frame } => {
                        render_pass.set_pipeline(self.pipelines.scene(mode));
                        render_pass.set_stencil_reference(reference);
                        for (index, entity) in scene.entities.iter().enumerate() {
                            if !entity.visible {
                                continue;
                            }
                            self.draw_object(&mut render_pass, entity.mesh, frame, index);
                        }
                    }
                }
            }
        }
    }

    fn draw_object(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        mesh: MeshId,
        frame: usize,
        object_slot: usize,
    ) {
        let mesh = &self.meshes[mesh.0];
        render_pass.set_bind_group(0, &self.frame_slots[frame].bind_group, &[]);
        render_pass.set_bind_group(1, &self.lights_slot.bind_group, &[]);
        render_pass.set_bind_group(2, &self.object_slots[object_slot].bind_group, &[]);
        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}
