use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Neutral gray used whenever an object or component color is absent or
/// cannot be parsed.
pub const DEFAULT_COLOR: [f32; 3] = [
    0xAA as f32 / 255.0,
    0xAA as f32 / 255.0,
    0xAA as f32 / 255.0,
];

/// A full room description: an ordered list of placed objects. The index of
/// an object in this list is its stable identifier for the lifetime of one
/// compiled scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomLayout {
    pub objects: Vec<PlacedObject>,
}

/// One object on the 10x10 logical grid. `x`/`z` are grid coordinates in
/// `[0, 10]`; the compiled world position is `(x - 5, 0, z - 5)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "default_color_hex")]
    pub color: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

fn default_color_hex() -> String {
    "AAAAAA".to_owned()
}

impl PlacedObject {
    /// Base color of the object, gray when absent or malformed.
    pub fn base_color(&self) -> [f32; 3] {
        parse_hex_color(&self.color)
    }
}

/// One visual component of an object, positioned relative to the object's
/// local origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub geometry: GeometryDescriptor,
    #[serde(default)]
    pub position: Option<Vec3Data>,
    #[serde(default)]
    pub rotation: Option<Vec3Data>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub emissive: Option<String>,
    #[serde(default, rename = "emissiveIntensity")]
    pub emissive_intensity: f32,
}

/// Per-axis values as the generator emits them; any missing axis is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Data {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// A primitive shape request. `type` stays a plain string at the boundary;
/// [`GeometryKind::parse`] resolves it with an explicit fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescriptor {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Named dimensions, `width`, `radius`, `segments` and so on. Absent
    /// entries fall back to per-type defaults.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl GeometryDescriptor {
    /// Named dimension with a per-type default when missing.
    pub fn param(&self, name: &str, default: f32) -> f32 {
        self.params.get(name).map(|v| *v as f32).unwrap_or(default)
    }
}

/// Closed set of recognized primitives. Anything else is a unit box, since
/// the descriptors come from an unreliable generator and one bad component
/// must not abort the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Box,
    Cylinder,
    Sphere,
    Cone,
    Plane,
}

impl GeometryKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "box" => Self::Box,
            "cylinder" => Self::Cylinder,
            "sphere" => Self::Sphere,
            "cone" => Self::Cone,
            "plane" => Self::Plane,
            _ => Self::Box,
        }
    }
}

/// Parses a 6-digit hex color, with or without a leading `#`. Malformed
/// input resolves to [`DEFAULT_COLOR`].
pub fn parse_hex_color(text: &str) -> [f32; 3] {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if hex.len() != 6 {
        return DEFAULT_COLOR;
    }
    match u32::from_str_radix(hex, 16) {
        Ok(rgb) => [
            ((rgb >> 16) & 0xFF) as f32 / 255.0,
            ((rgb >> 8) & 0xFF) as f32 / 255.0,
            (rgb & 0xFF) as f32 / 255.0,
        ],
        Err(_) => DEFAULT_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_deserializes_from_array() {
        let json = r#"[
            {"name":"Sofa","x":2.0,"z":3.0,"color":"8B4513","components":[
                {"geometry":{"type":"box","params":{"width":2.0}},
                 "position":{"x":0,"y":0.4,"z":0},
                 "emissiveIntensity":0.5}
            ]}
        ]"#;
        let layout: RoomLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.objects.len(), 1);
        let obj = &layout.objects[0];
        assert_eq!(obj.name, "Sofa");
        assert_eq!(obj.components.len(), 1);
        let comp = &obj.components[0];
        assert_eq!(comp.position.unwrap().y, 0.4);
        assert!(comp.rotation.is_none());
        assert_eq!(comp.emissive_intensity, 0.5);
        assert_eq!(comp.geometry.param("width", 1.0), 2.0);
        assert_eq!(comp.geometry.param("depth", 1.0), 1.0);
    }

    #[test]
    fn geometry_params_are_nested() {
        let json = r#"{"type":"box","params":{"width":0.8,"height":0.4,"depth":0.6}}"#;
        let geom: GeometryDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(geom.kind, "box");
        assert_eq!(geom.param("width", 1.0), 0.8);
        assert_eq!(geom.param("height", 1.0), 0.4);
        assert_eq!(geom.param("segments", 8.0), 8.0);
    }

    #[test]
    fn geometry_params_default_empty() {
        let geom: GeometryDescriptor = serde_json::from_str(r#"{"type":"sphere"}"#).unwrap();
        assert!(geom.params.is_empty());
        assert_eq!(geom.param("radius", 0.5), 0.5);
    }

    #[test]
    fn color_defaults_to_gray() {
        let json = r#"[{"name":"Rug","x":1.0,"z":1.0,"components":[]}]"#;
        let layout: RoomLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.objects[0].color, "AAAAAA");
        assert_eq!(layout.objects[0].base_color(), DEFAULT_COLOR);
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex_color("FF0000"), [1.0, 0.0, 0.0]);
        assert_eq!(parse_hex_color("#00FF00"), [0.0, 1.0, 0.0]);
        assert_eq!(parse_hex_color("nonsense"), DEFAULT_COLOR);
        assert_eq!(parse_hex_color(""), DEFAULT_COLOR);
        assert_eq!(parse_hex_color("12345"), DEFAULT_COLOR);
    }

    #[test]
    fn unknown_geometry_kind_is_box() {
        assert_eq!(GeometryKind::parse("torus"), GeometryKind::Box);
        assert_eq!(GeometryKind::parse(""), GeometryKind::Box);
        assert_eq!(GeometryKind::parse("sphere"), GeometryKind::Sphere);
    }
}
