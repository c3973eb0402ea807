mod camera;
mod controls;
mod geometry;
mod layout;
mod recover;
mod scene;

use iced::widget::{column, container, row, shader, text, text_editor};
use iced::{Element, Length, Size, Task};
use std::path::Path;

use camera::SceneRect;
use layout::RoomLayout;
use scene::{SceneInput, SceneModel, ScenePane, SceneView};

const SAMPLE_LAYOUT: &str = r#"[
  {
    "name": "Sofa",
    "x": 3, "z": 2, "color": "8B4513",
    "components": [
      { "geometry": { "type": "box", "params": { "width": 2, "height": 0.5, "depth": 0.9 } },
        "position": { "y": 0.35 } },
      { "geometry": { "type": "box", "params": { "width": 2, "height": 0.6, "depth": 0.25 } },
        "position": { "y": 0.8, "z": -0.33 } }
    ]
  },
  {
    "name": "Coffee Table",
    "x": 5, "z": 4, "color": "654321",
    "components": [
      { "geometry": { "type": "box", "params": { "width": 1.2, "height": 0.08, "depth": 0.6 } },
        "position": { "y": 0.45 } },
      { "geometry": { "type": "cylinder", "params": { "radiusTop": 0.04, "radiusBottom": 0.04, "height": 0.45 } },
        "position": { "x": -0.5, "y": 0.22, "z": -0.2 } },
      { "geometry": { "type": "cylinder", "params": { "radiusTop": 0.04, "radiusBottom": 0.04, "height": 0.45 } },
        "position": { "x": 0.5, "y": 0.22, "z": 0.2 } }
    ]
  },
  {
    "name": "Floor Lamp",
    "x": 8, "z": 7, "color": "333333",
    "components": [
      { "geometry": { "type": "cylinder", "params": { "radiusTop": 0.02, "radiusBottom": 0.02, "height": 1.4 } },
        "position": { "y": 0.7 } },
      { "geometry": { "type": "cone", "params": { "radius": 0.25, "height": 0.3 } },
        "position": { "y": 1.5 },
        "color": "FFF7CC", "emissive": "FFE599", "emissiveIntensity": 0.6 }
    ]
  }
]"#;

#[derive(Debug, Clone)]
enum Message {
    // Layout editor
    RawEdited(text_editor::Action),
    Apply,
    Clear,
    LoadSample,
    // File
    OpenFile,
    FileLoaded(Result<Option<LoadedLayout>, String>),
    // Viewport and sidebar
    Scene(SceneInput, SceneRect),
    SelectObject(Option<usize>),
}

fn wrap_scene_input(input: SceneInput, bounds: SceneRect) -> Message {
    Message::Scene(input, bounds)
}

#[derive(Debug, Clone)]
struct LoadedLayout {
    text: String,
    label: String,
}

async fn pick_layout_file() -> Result<Option<LoadedLayout>, String> {
    let file = rfd::AsyncFileDialog::new()
        .add_filter("Layout", &["json", "txt"])
        .set_title("Open Room Layout")
        .pick_file()
        .await;

    let Some(handle) = file else {
        return Ok(None);
    };

    let path = handle.path().to_path_buf();
    let text = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;

    Ok(Some(LoadedLayout {
        text,
        label: path_label(&path),
    }))
}

fn path_label(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

struct App {
    model: SceneModel,
    scene_view: SceneView,
    layout: RoomLayout,
    raw: text_editor::Content,
    status: String,
}

impl App {
    fn new() -> Self {
        let mut model = SceneModel::default();
        let mut layout = RoomLayout::default();
        let mut status = String::from("Ready");

        match recover::recover_layout(SAMPLE_LAYOUT) {
            Ok(sample) => {
                status = format!("Applied {} objects", sample.objects.len());
                model.apply_layout(&sample);
                layout = sample;
            }
            Err(err) => log::warn!("sample layout rejected: {err}"),
        }

        let scene_view = model.view();
        Self {
            model,
            scene_view,
            layout,
            raw: text_editor::Content::with_text(SAMPLE_LAYOUT),
            status,
        }
    }

    fn apply_raw(&mut self) {
        match recover::recover_layout(&self.raw.text()) {
            Ok(layout) => {
                log::info!("layout applied: {} objects", layout.objects.len());
                self.status = format!("Applied {} objects", layout.objects.len());
                self.model.apply_layout(&layout);
                self.layout = layout;
            }
            Err(err) => {
                // The previous scene stays up when the new text is beyond repair.
                log::warn!("layout rejected: {err}");
                self.status = err.to_string();
            }
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::RawEdited(action) => {
                self.raw.perform(action);
                Task::none()
            }
            Message::Apply => {
                self.apply_raw();
                Task::none()
            }
            Message::Clear => {
                self.layout = RoomLayout::default();
                self.model.apply_layout(&self.layout);
                self.raw = text_editor::Content::new();
                self.status = String::from("Cleared");
                Task::none()
            }
            Message::LoadSample => {
                self.raw = text_editor::Content::with_text(SAMPLE_LAYOUT);
                self.apply_raw();
                Task::none()
            }
            Message::OpenFile => Task::perform(pick_layout_file(), Message::FileLoaded),
            Message::FileLoaded(result) => {
                match result {
                    Ok(Some(loaded)) => {
                        self.raw = text_editor::Content::with_text(&loaded.text);
                        self.apply_raw();
                        self.status = format!("{} ({})", self.status, loaded.label);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("file open failed: {err}");
                        self.status = format!("Open failed: {err}");
                    }
                }
                Task::none()
            }
            Message::SelectObject(id) => {
                self.model.select(id);
                Task::none()
            }
            Message::Scene(input, bounds) => {
                let update = self.model.update(input, bounds);
                if let Some((id, x, z)) = update.moved {
                    if let Some(object) = self.layout.objects.get_mut(id) {
                        object.x = x;
                        object.z = z;
                    }
                }
                Task::none()
            }
        };

        self.scene_view = self.model.view();
        task
    }

    fn view(&self) -> Element<'_, Message> {
        let has_input = !self.raw.text().trim().is_empty();
        let has_scene = !self.model.objects().is_empty();
        let toolbar = controls::toolbar(has_input, has_scene);

        let sidebar = controls::object_sidebar(self.model.objects(), self.model.selected());

        let viewport = container(
            shader(ScenePane::new(self.scene_view.clone(), wrap_scene_input))
                .width(Length::Fill)
                .height(Length::Fill),
        )
        .width(Length::FillPortion(3))
        .height(Length::Fill);

        let editor = column![
            text("Layout JSON").size(14),
            text_editor(&self.raw)
                .on_action(Message::RawEdited)
                .height(Length::Fill),
        ]
        .spacing(8)
        .width(Length::FillPortion(2));

        let selected = self
            .model
            .selected()
            .and_then(|id| self.model.object_name(id));
        let hovered = self
            .model
            .hovered()
            .and_then(|id| self.model.object_name(id));
        let status = controls::status_row(&self.status, selected, hovered);

        column![
            toolbar,
            row![sidebar, viewport, editor]
                .spacing(10)
                .width(Length::Fill)
                .height(Length::Fill),
            container(status).padding(8).width(Length::Fill),
        ]
        .spacing(10)
        .padding(12)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
    }
}

fn main() -> iced::Result {
    env_logger::init();

    iced::application("Room Layout Viewer", App::update, App::view)
        .window_size(Size::new(1280.0, 800.0))
        .run_with(|| (App::new(), Task::none()))
}
