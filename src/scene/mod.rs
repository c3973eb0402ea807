//! The 3D room view: a shader widget whose program forwards pointer input
//! to the application as [`SceneInput`] messages and whose primitive uploads
//! the current scene snapshot to the GPU. Rendering only ever reads the
//! snapshot; every mutation happens in [`runtime::SceneModel`] before the
//! next frame is drawn.

use iced::advanced::Shell;
use iced::event::Status;
use iced::widget::shader::{self, wgpu, Event, Storage, Viewport};
use iced::widget::shader::wgpu::util::DeviceExt;
use iced::{keyboard, mouse, Rectangle};

pub mod compile;
mod grid;
mod render;
pub mod runtime;

use crate::camera::{ScenePoint, SceneRect};
use grid::build_grid_vertices;
use render::{build_label_vertices, build_mesh_buffers, create_depth_view, Pipeline, Uniforms};
pub use runtime::{SceneInput, SceneModel, SceneView};

/// The shader program for the room view. Stateless apart from modifier
/// tracking; everything interactive lives in the application's
/// [`SceneModel`], fed through `on_input`.
pub struct ScenePane<Message> {
    view: SceneView,
    on_input: fn(SceneInput, SceneRect) -> Message,
}

impl<Message> ScenePane<Message> {
    pub fn new(view: SceneView, on_input: fn(SceneInput, SceneRect) -> Message) -> Self {
        Self { view, on_input }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaneState {
    ctrl: bool,
}

fn scene_rect(bounds: Rectangle) -> SceneRect {
    SceneRect::new(0.0, 0.0, bounds.width, bounds.height)
}

impl<Message> shader::Program<Message> for ScenePane<Message> {
    type State = PaneState;
    type Primitive = ScenePrimitive;

    fn update(
        &self,
        state: &mut Self::State,
        event: Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
        _shell: &mut Shell<'_, Message>,
    ) -> (Status, Option<Message>) {
        let emit = |input: SceneInput| Some((self.on_input)(input, scene_rect(bounds)));

        match event {
            Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.ctrl = modifiers.control();
                (Status::Ignored, None)
            }
            Event::Mouse(mouse::Event::ButtonPressed(button)) => {
                let Some(position) = cursor.position_in(bounds) else {
                    return (Status::Ignored, None);
                };
                let secondary = match button {
                    mouse::Button::Left => state.ctrl,
                    mouse::Button::Right => true,
                    _ => return (Status::Ignored, None),
                };
                (
                    Status::Captured,
                    emit(SceneInput::PointerDown {
                        position: ScenePoint::new(position.x, position.y),
                        secondary,
                    }),
                )
            }
            Event::Mouse(mouse::Event::ButtonReleased(
                mouse::Button::Left | mouse::Button::Right,
            )) => {
                // Gestures end even when the pointer has left the widget.
                (Status::Ignored, emit(SceneInput::PointerUp))
            }
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let Some(position) = cursor.position_in(bounds) else {
                    return (Status::Ignored, None);
                };
                (
                    Status::Ignored,
                    emit(SceneInput::PointerMoved {
                        position: ScenePoint::new(position.x, position.y),
                    }),
                )
            }
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.position_in(bounds).is_none() {
                    return (Status::Ignored, None);
                }
                let scroll_y = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y,
                    mouse::ScrollDelta::Pixels { y, .. } => y / 120.0,
                };
                if scroll_y.abs() <= f32::EPSILON {
                    return (Status::Ignored, None);
                }
                // Scrolling down moves the eye toward the room.
                let notches = if scroll_y < 0.0 { 1.0 } else { -1.0 };
                (Status::Captured, emit(SceneInput::Wheel { notches }))
            }
            _ => (Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        _cursor: mouse::Cursor,
        _bounds: Rectangle,
    ) -> Self::Primitive {
        ScenePrimitive {
            view: self.view.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ScenePrimitive {
    view: SceneView,
}

impl shader::Primitive for ScenePrimitive {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        storage: &mut Storage,
        bounds: &Rectangle,
        viewport: &Viewport,
    ) {
        if !storage.has::<Pipeline>() {
            storage.store(Pipeline::new(device, format));
        }
        let Some(pipeline) = storage.get_mut::<Pipeline>() else {
            return;
        };

        // The depth buffer matches the frame, not the widget.
        let physical = viewport.physical_size();
        if pipeline.depth_size != (physical.width.max(1), physical.height.max(1)) {
            pipeline.depth = create_depth_view(device, physical.width, physical.height);
            pipeline.depth_size = (physical.width.max(1), physical.height.max(1));
        }

        // Widget bounds in physical pixels, for the render-pass viewport.
        let scale = viewport.scale_factor() as f32;
        pipeline.last_bounds = (
            bounds.x * scale,
            bounds.y * scale,
            (bounds.width * scale).max(1.0),
            (bounds.height * scale).max(1.0),
        );

        let camera = &self.view.camera;
        let rect = scene_rect(*bounds);
        let view = camera.view();
        let mvp = camera.projection(rect) * view;
        let uniforms = Uniforms {
            model_view: view.to_cols_array_2d(),
            mvp: mvp.to_cols_array_2d(),
        };
        queue.write_buffer(&pipeline.uniforms, 0, bytemuck::bytes_of(&uniforms));

        let snapshot = &self.view.snapshot;

        if pipeline.scene_version != Some(snapshot.version) {
            pipeline.scene_version = Some(snapshot.version);

            let (vertices, indices) = build_mesh_buffers(snapshot);
            if indices.is_empty() {
                pipeline.index_count = 0;
            } else {
                pipeline.vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("room_scene_vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                pipeline.indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("room_scene_indices"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                pipeline.index_count = indices.len() as u32;
            }
        }

        let grid_key = snapshot
            .environment
            .as_ref()
            .map(|env| (env.grid_size.to_bits(), env.grid_divisions));
        if pipeline.grid_key != grid_key {
            pipeline.grid_key = grid_key;
            match &snapshot.environment {
                Some(env) => {
                    let vertices = build_grid_vertices(env.grid_size, env.grid_divisions);
                    pipeline.grid_vertices =
                        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("room_grid_vertices"),
                            contents: bytemuck::cast_slice(&vertices),
                            usage: wgpu::BufferUsages::VERTEX,
                        });
                    pipeline.grid_vertex_count = vertices.len() as u32;
                }
                None => pipeline.grid_vertex_count = 0,
            }
        }

        // Labels billboard toward the camera, so their quads are rebuilt
        // every frame rather than version-gated.
        let label_vertices = build_label_vertices(&snapshot.labels, camera);
        if label_vertices.is_empty() {
            pipeline.label_vertex_count = 0;
        } else {
            pipeline.label_vertices =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("room_label_vertices"),
                    contents: bytemuck::cast_slice(&label_vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            pipeline.label_vertex_count = label_vertices.len() as u32;
        }
    }

    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        storage: &Storage,
        target: &wgpu::TextureView,
        clip_bounds: &Rectangle<u32>,
    ) {
        let Some(pipeline) = storage.get::<Pipeline>() else {
            return;
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("room_scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &pipeline.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (bx, by, bw, bh) = pipeline.last_bounds;
        render_pass.set_viewport(bx, by, bw, bh, 0.0, 1.0);
        render_pass.set_scissor_rect(
            clip_bounds.x,
            clip_bounds.y,
            clip_bounds.width,
            clip_bounds.height,
        );

        if pipeline.index_count > 0 {
            render_pass.set_pipeline(&pipeline.mesh_pipeline);
            render_pass.set_bind_group(0, &pipeline.bind_group, &[]);
            render_pass.set_vertex_buffer(0, pipeline.vertices.slice(..));
            render_pass.set_index_buffer(pipeline.indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..pipeline.index_count, 0, 0..1);
        }

        if pipeline.grid_vertex_count > 0 {
            render_pass.set_pipeline(&pipeline.grid_pipeline);
            render_pass.set_bind_group(0, &pipeline.bind_group, &[]);
            render_pass.set_vertex_buffer(0, pipeline.grid_vertices.slice(..));
            render_pass.draw(0..pipeline.grid_vertex_count, 0..1);
        }

        if pipeline.label_vertex_count > 0 {
            render_pass.set_pipeline(&pipeline.label_pipeline);
            render_pass.set_bind_group(0, &pipeline.bind_group, &[]);
            render_pass.set_vertex_buffer(0, pipeline.label_vertices.slice(..));
            render_pass.draw(0..pipeline.label_vertex_count, 0..1);
        }
    }
}
