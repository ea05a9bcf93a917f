use oriel_core::passes::DepthStencilMode;

use crate::renderer::mesh::SceneVertex;

/// Maps each pass-plan mode onto a fixed wgpu depth/stencil configuration.
/// The stencil comparison is `reference CMP stored`, so "stored >= reference"
/// reads as `LessEqual`.
pub fn depth_stencil_state(
    mode: DepthStencilMode,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    let keep = wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Always,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Keep,
    };
    let face = |compare, fail_op| wgpu::StencilFaceState {
        compare,
        fail_op,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Keep,
    };

    let (depth_write_enabled, depth_compare, stencil_face, stencil_write_mask) = match mode {
        // Fails exactly where the stencil equals the reference and bumps it
        // there. Depth is ignored so portals mask regardless of occlusion
        // within the clear.
        DepthStencilMode::StencilWrite => (
            false,
            wgpu::CompareFunction::Always,
            face(
                wgpu::CompareFunction::NotEqual,
                wgpu::StencilOperation::IncrementClamp,
            ),
            0xff,
        ),
        DepthStencilMode::InnerScene => (
            true,
            wgpu::CompareFunction::Less,
            face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
            0x00,
        ),
        DepthStencilMode::StencilUndo => (
            false,
            wgpu::CompareFunction::Less,
            face(
                wgpu::CompareFunction::NotEqual,
                wgpu::StencilOperation::DecrementClamp,
            ),
            0xff,
        ),
        DepthStencilMode::PortalDepth => (true, wgpu::CompareFunction::Always, keep, 0x00),
        DepthStencilMode::PortalBorder => (
            true,
            wgpu::CompareFunction::LessEqual,
            face(wgpu::CompareFunction::LessEqual, wgpu::StencilOperation::Keep),
            0x00,
        ),
        DepthStencilMode::SceneStencilGe => (
            true,
            wgpu::CompareFunction::Less,
            face(wgpu::CompareFunction::LessEqual, wgpu::StencilOperation::Keep),
            0x00,
        ),
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState {
            front: stencil_face,
            back: stencil_face,
            read_mask: 0xff,
            write_mask: stencil_write_mask,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

/// One immutable pipeline per (shader x depth-stencil mode) pairing the pass
/// plan can emit. Stencil references are set per draw from the plan.
#[derive(Debug)]
pub struct PassPipelines {
    pub camera_bind_group_layout: wgpu::BindGroupLayout,
    pub lights_bind_group_layout: wgpu::BindGroupLayout,
    pub object_bind_group_layout: wgpu::BindGroupLayout,
    scene_inner: wgpu::RenderPipeline,
    scene_outer: wgpu::RenderPipeline,
    border_inner: wgpu::RenderPipeline,
    border_recursive: wgpu::RenderPipeline,
    mask_write: wgpu::RenderPipeline,
    mask_undo: wgpu::RenderPipeline,
    mask_depth: wgpu::RenderPipeline,
}

impl PassPipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/scene.wgsl"
                ))
                .into(),
            ),
        });
        let border_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Border Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/portal_border.wgsl"
                ))
                .into(),
            ),
        });

        let uniform_layout = |label| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        };
        let camera_bind_group_layout = uniform_layout("Camera Bind Group Layout");
        let lights_bind_group_layout = uniform_layout("Lights Bind Group Layout");
        let object_bind_group_layout = uniform_layout("Object Bind Group Layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[
                &camera_bind_group_layout,
                &lights_bind_group_layout,
                &object_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let build = |label: &str,
                     shader: &wgpu::ShaderModule,
                     mode: DepthStencilMode,
                     blend: Option<wgpu::BlendState>,
                     color_writes: wgpu::ColorWrites| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[SceneVertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend,
                        write_mask: color_writes,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Portal quads are seen from both sides and several
                    // scene slabs are thin enough to clip the camera.
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: Some(depth_stencil_state(mode, depth_format)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let scene_inner = build(
            "Scene Inner Pipeline",
            &scene_shader,
            DepthStencilMode::InnerScene,
            Some(wgpu::BlendState::REPLACE),
            wgpu::ColorWrites::ALL,
        );
        let scene_outer = build(
            "Scene Outer Pipeline",
            &scene_shader,
            DepthStencilMode::SceneStencilGe,
            Some(wgpu::BlendState::REPLACE),
            wgpu::ColorWrites::ALL,
        );
        let border_inner = build(
            "Portal Border Inner Pipeline",
            &border_shader,
            DepthStencilMode::InnerScene,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            wgpu::ColorWrites::ALL,
        );
        let border_recursive = build(
            "Portal Border Recursive Pipeline",
            &border_shader,
            DepthStencilMode::PortalBorder,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            wgpu::ColorWrites::ALL,
        );
        // Mask pipelines write depth/stencil only; the color target stays
        // attached with all channels masked off.
        let mask_write = build(
            "Portal Mask Write Pipeline",
            &scene_shader,
            DepthStencilMode::StencilWrite,
            None,
            wgpu::ColorWrites::empty(),
        );
        let mask_undo = build(
            "Portal Mask Undo Pipeline",
            &scene_shader,
            DepthStencilMode::StencilUndo,
            None,
            wgpu::ColorWrites::empty(),
        );
        let mask_depth = build(
            "Portal Mask Depth Pipeline",
            &scene_shader,
            DepthStencilMode::PortalDepth,
            None,
            wgpu::ColorWrites::empty(),
        );

        Self {
            camera_bind_group_layout,
            lights_bind_group_layout,
            object_bind_group_layout,
            scene_inner,
            scene_outer,
            border_inner,
            border_recursive,
            mask_write,
            mask_undo,
            mask_depth,
        }
    }

    pub fn scene(&self, mode: DepthStencilMode) -> &wgpu::RenderPipeline {
        match mode {
            DepthStencilMode::InnerScene => &self.scene_inner,
            DepthStencilMode::SceneStencilGe => &self.scene_outer,
            other => panic!("no scene pipeline for {other:?}"),
        }
    }

    pub fn border(&self, mode: DepthStencilMode) -> &wgpu::RenderPipeline {
        match mode {
            DepthStencilMode::InnerScene => &self.border_inner,
            DepthStencilMode::PortalBorder => &self.border_recursive,
            other => panic!("no border pipeline for {other:?}"),
        }
    }

    pub fn mask(&self, mode: DepthStencilMode) -> &wgpu::RenderPipeline {
        match mode {
            DepthStencilMode::StencilWrite => &self.mask_write,
            DepthStencilMode::StencilUndo => &self.mask_undo,
            DepthStencilMode::PortalDepth => &self.mask_depth,
            other => panic!("no mask pipeline for {other:?}"),
        }
    }
}
