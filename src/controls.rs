use iced::widget::{button, column, container, row, scrollable, text};
use iced::{Color, Element, Length};

use crate::scene::compile::ObjectNode;

// Toolbar above the layout editor
pub fn toolbar<'a>(has_input: bool, has_scene: bool) -> Element<'a, crate::Message> {
    row![
        button("Apply Layout").on_press_maybe(has_input.then_some(crate::Message::Apply)),
        button("Open...").on_press(crate::Message::OpenFile),
        button("Sample").on_press(crate::Message::LoadSample),
        button("Clear").on_press_maybe(has_scene.then_some(crate::Message::Clear)),
    ]
    .spacing(10)
    .align_y(iced::Alignment::Center)
    .into()
}

// Sidebar: one chip per placed object, click to select
pub fn object_sidebar<'a>(
    objects: &'a [ObjectNode],
    selected: Option<usize>,
) -> Element<'a, crate::Message> {
    let mut chips = column![].spacing(4);

    for object in objects {
        let is_selected = selected == Some(object.id);
        let label = if is_selected {
            text(format!("● {}", object.name))
        } else {
            text(object.name.as_str())
        };
        let target = if is_selected { None } else { Some(object.id) };
        chips = chips.push(
            button(
                row![swatch(object.original_color), label]
                    .spacing(8)
                    .align_y(iced::Alignment::Center),
            )
            .width(Length::Fill)
            .on_press(crate::Message::SelectObject(target)),
        );
    }

    if objects.is_empty() {
        chips = chips.push(text("No objects").size(14));
    }

    container(scrollable(chips))
        .width(Length::Fixed(220.0))
        .height(Length::Fill)
        .padding(8)
        .into()
}

fn swatch<'a>(color: [f32; 3]) -> Element<'a, crate::Message> {
    container(text(""))
        .width(Length::Fixed(14.0))
        .height(Length::Fixed(14.0))
        .style(move |_theme| container::Style {
            background: Some(Color::from_rgb(color[0], color[1], color[2]).into()),
            border: iced::Border {
                color: Color::from_rgba(0.0, 0.0, 0.0, 0.4),
                width: 1.0,
                radius: 3.0.into(),
            },
            ..container::Style::default()
        })
        .into()
}

pub fn status_row<'a>(
    status: &'a str,
    selected: Option<&'a str>,
    hovered: Option<&'a str>,
) -> Element<'a, crate::Message> {
    row![
        text(status),
        text("|"),
        text(match selected {
            Some(name) => format!("Selected: {name}"),
            None => String::from("Selected: -"),
        }),
        text("|"),
        text(match hovered {
            Some(name) => format!("Hover: {name}"),
            None => String::from("Hover: -"),
        }),
        text("|"),
        text("Drag to move, right click or ctrl to orbit, scroll to zoom"),
    ]
    .spacing(10)
    .align_y(iced::Alignment::Center)
    .into()
}
