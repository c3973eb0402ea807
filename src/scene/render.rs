use glam::{Mat3, Vec3};
use iced::widget::shader::wgpu;

use crate::camera::Camera;
use crate::scene::compile::LabelNode;
use crate::scene::grid::create_grid_pipeline;
use crate::scene::runtime::SceneSnapshot;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    /// rgb plus intensity.
    pub emissive: [f32; 4],
}

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3, 1 => Float32x3, 2 => Float32x3, 3 => Float32x4
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LabelVertex {
    pub position: [f32; 3],
    /// Quad-local coordinates in `[-1, 1]`.
    pub local: [f32; 2],
    /// Border thickness in local units per axis.
    pub border: [f32; 2],
    pub fill: [f32; 3],
}

impl LabelVertex {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3, 1 => Float32x2, 2 => Float32x2, 3 => Float32x3
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LabelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct Uniforms {
    pub model_view: [[f32; 4]; 4],
    pub mvp: [[f32; 4]; 4],
}

/// Flattens the snapshot into one vertex/index buffer: ground first, then
/// every object part with its world transform and colors baked in.
pub(crate) fn build_mesh_buffers(snapshot: &SceneSnapshot) -> (Vec<MeshVertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    let mut append = |mesh: &crate::geometry::Mesh,
                      world: Option<glam::Mat4>,
                      color: [f32; 3],
                      emissive: [f32; 4]| {
        let base = vertices.len() as u32;
        match world {
            Some(world) => {
                let normal_matrix = Mat3::from_mat4(world);
                for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
                    vertices.push(MeshVertex {
                        position: world.transform_point3(Vec3::from_array(*p)).to_array(),
                        normal: (normal_matrix * Vec3::from_array(*n))
                            .normalize_or_zero()
                            .to_array(),
                        color,
                        emissive,
                    });
                }
            }
            None => {
                for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
                    vertices.push(MeshVertex {
                        position: *p,
                        normal: *n,
                        color,
                        emissive,
                    });
                }
            }
        }
        indices.extend(mesh.indices.iter().map(|i| base + i));
    };

    if let Some(env) = &snapshot.environment {
        append(&env.ground, None, env.ground_color, [0.0; 4]);
    }

    for part in &snapshot.parts {
        let emissive = [
            part.emissive[0],
            part.emissive[1],
            part.emissive[2],
            part.emissive_intensity,
        ];
        append(&part.mesh, Some(part.world), part.color, emissive);
    }

    (vertices, indices)
}

/// Camera-facing quads for every visible label, two triangles each.
pub(crate) fn build_label_vertices(labels: &[LabelNode], camera: &Camera) -> Vec<LabelVertex> {
    let forward = camera.forward();
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    let up = right.cross(forward);

    let mut out = Vec::new();
    for label in labels.iter().filter(|l| l.visible) {
        let half_w = right * (label.width * 0.5);
        let half_h = up * (label.height * 0.5);
        // 3px of border on a 64px-tall sprite, doubled into [-1,1] space.
        let border_y = 3.0 * 2.0 / 64.0;
        let border_x = border_y * label.height / label.width.max(1.0e-3);
        let border = [border_x, border_y];

        let corner = |sx: f32, sy: f32| LabelVertex {
            position: (label.position + half_w * sx + half_h * sy).to_array(),
            local: [sx, sy],
            border,
            fill: label.fill,
        };

        let (a, b, c, d) = (
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        );
        out.extend_from_slice(&[a, b, c, a, c, d]);
    }
    out
}

pub(crate) struct Pipeline {
    pub mesh_pipeline: wgpu::RenderPipeline,
    pub grid_pipeline: wgpu::RenderPipeline,
    pub label_pipeline: wgpu::RenderPipeline,
    pub uniforms: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub depth: wgpu::TextureView,
    pub depth_size: (u32, u32),
    /// Widget bounds in physical pixels, for the render-pass viewport.
    pub last_bounds: (f32, f32, f32, f32),
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
    pub grid_vertices: wgpu::Buffer,
    pub grid_vertex_count: u32,
    pub grid_key: Option<(u32, u32)>,
    pub label_vertices: wgpu::Buffer,
    pub label_vertex_count: u32,
    pub scene_version: Option<u64>,
}

impl Pipeline {
    pub(crate) fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("room_scene_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("room_scene_bind_group_layout"),
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
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("room_scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("room_scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_mesh_pipeline(device, format, &pipeline_layout);
        let grid_pipeline = create_grid_pipeline(device, format, &pipeline_layout);
        let label_pipeline = create_label_pipeline(device, format, &pipeline_layout);

        let depth = create_depth_view(device, 1, 1);

        let empty = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: 16,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
                mapped_at_creation: false,
            })
        };

        Self {
            mesh_pipeline,
            grid_pipeline,
            label_pipeline,
            uniforms,
            bind_group,
            depth,
            depth_size: (1, 1),
            last_bounds: (0.0, 0.0, 1.0, 1.0),
            vertices: empty("room_scene_vertices"),
            indices: empty("room_scene_indices"),
            index_count: 0,
            grid_vertices: empty("room_grid_vertices"),
            grid_vertex_count: 0,
            grid_key: None,
            label_vertices: empty("room_label_vertices"),
            label_vertex_count: 0,
            scene_version: None,
        }
    }
}

pub(crate) fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("room_scene_depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth24Plus,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    pipeline_layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("room_mesh_shader"),
        source: wgpu::ShaderSource::Wgsl(
            r#"
struct Uniforms {
    model_view: mat4x4<f32>,
    mvp: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) emissive: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) emissive: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.mvp * vec4<f32>(in.position, 1.0);
    out.normal = in.normal;
    out.color = in.color;
    out.emissive = in.emissive;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(5.0, 10.0, 5.0));
    let n = normalize(in.normal);
    let diffuse = max(dot(n, light_dir), 0.0) * 0.8;
    let lit = in.color * min(0.6 + diffuse, 1.0);
    let glow = in.emissive.rgb * in.emissive.a;
    return vec4<f32>(lit + glow, 1.0);
}
"#
            .into(),
        ),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("room_mesh_pipeline"),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[MeshVertex::layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth24Plus,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

fn create_label_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    pipeline_layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("room_label_shader"),
        source: wgpu::ShaderSource::Wgsl(
            r#"
struct Uniforms {
    model_view: mat4x4<f32>,
    mvp: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) local: vec2<f32>,
    @location(2) border: vec2<f32>,
    @location(3) fill: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) border: vec2<f32>,
    @location(2) fill: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.mvp * vec4<f32>(in.position, 1.0);
    out.local = in.local;
    out.border = in.border;
    out.fill = in.fill;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let edge_x = abs(in.local.x) > 1.0 - in.border.x;
    let edge_y = abs(in.local.y) > 1.0 - in.border.y;
    if (edge_x || edge_y) {
        return vec4<f32>(1.0, 1.0, 1.0, 1.0);
    }
    return vec4<f32>(in.fill, 0.95);
}
"#
            .into(),
        ),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("room_label_pipeline"),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[LabelVertex::layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth24Plus,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}
