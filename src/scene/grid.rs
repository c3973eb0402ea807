use iced::widget::shader::wgpu;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl GridVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GridVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const CENTER_COLOR: [f32; 3] = [0x88 as f32 / 255.0; 3];
const LINE_COLOR: [f32; 3] = [0xCC as f32 / 255.0; 3];

/// Line-list vertices for the ground reference grid: `divisions` cells over
/// a `size`-wide square in the XZ plane, center lines darker than the rest.
pub(crate) fn build_grid_vertices(size: f32, divisions: u32) -> Vec<GridVertex> {
    let half = size * 0.5;
    let step = size / divisions.max(1) as f32;
    let steps = divisions.max(1) as i32 / 2;
    let mut out = Vec::new();

    for i in -steps..=steps {
        let v = i as f32 * step;
        let color = if i == 0 { CENTER_COLOR } else { LINE_COLOR };
        out.push(GridVertex {
            position: [-half, 0.0, v],
            color,
        });
        out.push(GridVertex {
            position: [half, 0.0, v],
            color,
        });
        out.push(GridVertex {
            position: [v, 0.0, -half],
            color,
        });
        out.push(GridVertex {
            position: [v, 0.0, half],
            color,
        });
    }

    out
}

pub(crate) fn create_grid_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    pipeline_layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    let grid_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("room_grid_shader"),
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
    @location(1) color: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.mvp * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#
            .into(),
        ),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("room_grid_pipeline"),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module: &grid_shader,
            entry_point: "vs_main",
            buffers: &[GridVertex::layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineList,
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
            module: &grid_shader,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_the_square() {
        let vertices = build_grid_vertices(20.0, 20);
        // 21 lines per direction, two vertices each.
        assert_eq!(vertices.len(), 21 * 4);
        assert!(vertices
            .iter()
            .all(|v| v.position[0].abs() <= 10.0 && v.position[2].abs() <= 10.0));
        assert!(vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn center_lines_are_darker() {
        let vertices = build_grid_vertices(20.0, 20);
        let center: Vec<_> = vertices
            .iter()
            .filter(|v| v.color == CENTER_COLOR)
            .collect();
        assert_eq!(center.len(), 4);
    }
}
