//! Turns a validated room layout into renderable, pickable scene data. The
//! whole output is rebuilt on every layout change; nothing is diffed.

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::geometry::{build_mesh, build_plane, Mesh};
use crate::layout::{parse_hex_color, Component, PlacedObject, RoomLayout, Vec3Data};

pub const GROUND_SIZE: f32 = 20.0;
pub const GRID_DIVISIONS: u32 = 20;
pub const DRAG_PLANE_HALF: f32 = 50.0;
pub const LABEL_HEIGHT_WORLD: f32 = 0.5;
pub const LABEL_ALTITUDE: f32 = 2.0;

const GROUND_COLOR: [f32; 3] = [224.0 / 255.0, 224.0 / 255.0, 224.0 / 255.0];

/// Logical `[0,10]` grid coordinates to world space, centering the room on
/// the origin.
pub fn world_position(x: f32, z: f32) -> Vec3 {
    Vec3::new(x - 5.0, 0.0, z - 5.0)
}

/// Axis-aligned bounds in the owning object's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl Iterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        if min.x > max.x {
            return Self {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            };
        }
        Self { min, max }
    }

    pub fn translated(self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Slab test. Returns the entry distance along the ray, `None` on miss
    /// or when the box is entirely behind the origin.
    pub fn ray_hit(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let (o, d) = (origin[axis], dir[axis]);
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() <= 1.0e-6 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (t0, t1) = ((lo - o) * inv, (hi - o) * inv);
            let (t0, t1) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some(t_min.max(0.0))
    }
}

/// One component's renderable mesh inside an object group.
#[derive(Debug, Clone)]
pub struct MeshPart {
    pub mesh: Mesh,
    /// Local transform relative to the object origin.
    pub transform: Mat4,
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    /// Bounds of the transformed mesh, still in object-local space.
    pub bounds: Aabb,
}

impl MeshPart {
    fn from_component(comp: &Component, base_color: [f32; 3]) -> Self {
        let mesh = build_mesh(&comp.geometry);

        let offset = vec3_from(comp.position.unwrap_or_default());
        let rotation = vec3_from(comp.rotation.unwrap_or_default());
        let transform = Mat4::from_rotation_translation(
            Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z),
            offset,
        );

        let bounds = Aabb::from_points(
            mesh.positions
                .iter()
                .map(|p| transform.transform_point3(Vec3::from_array(*p))),
        );

        let color = comp
            .color
            .as_deref()
            .map(parse_hex_color)
            .unwrap_or(base_color);
        let emissive = comp
            .emissive
            .as_deref()
            .map(parse_hex_color)
            .unwrap_or([0.0; 3]);

        Self {
            mesh,
            transform,
            color,
            emissive,
            emissive_intensity: comp.emissive_intensity.clamp(0.0, 1.0),
            bounds,
        }
    }
}

/// The owned render group for one placed object. `id` is the object's index
/// in the layout and never changes while the scene lives.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub id: usize,
    pub name: String,
    pub original_color: [f32; 3],
    pub position: Vec3,
    pub parts: Vec<MeshPart>,
}

/// Floating billboard marker for one object. Correlated to the object only
/// by shared `id`; neither side owns the other.
#[derive(Debug, Clone)]
pub struct LabelNode {
    pub id: usize,
    pub text: String,
    pub position: Vec3,
    pub width: f32,
    pub height: f32,
    pub fill: [f32; 3],
    pub visible: bool,
}

impl LabelNode {
    fn new(id: usize, object: &PlacedObject) -> Self {
        // Sized like a 256x64px text sprite: 16px per character plus 40px
        // of padding, floored at 256px, mapped to 0.5 world units tall.
        let text_px = object.name.chars().count() as f32 * 16.0;
        let canvas_w = (text_px + 40.0).max(256.0);
        let aspect = canvas_w / 64.0;
        Self {
            id,
            text: object.name.clone(),
            position: world_position(object.x, object.z) + Vec3::Y * LABEL_ALTITUDE,
            width: LABEL_HEIGHT_WORLD * aspect,
            height: LABEL_HEIGHT_WORLD,
            fill: object.base_color(),
            visible: false,
        }
    }
}

/// Static geometry shared by every compiled scene: a visible ground plane
/// and grid, and the invisible oversized plane drag rays are cast against.
#[derive(Debug, Clone)]
pub struct Environment {
    pub ground: Mesh,
    pub ground_color: [f32; 3],
    pub grid_size: f32,
    pub grid_divisions: u32,
    pub drag_plane_half: f32,
}

impl Default for Environment {
    fn default() -> Self {
        let quad = build_plane(GROUND_SIZE, GROUND_SIZE);
        let lay_flat = Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2);
        let ground = Mesh {
            positions: quad
                .positions
                .iter()
                .map(|p| lay_flat.transform_point3(Vec3::from_array(*p)).to_array())
                .collect(),
            normals: vec![[0.0, 1.0, 0.0]; quad.normals.len()],
            indices: quad.indices,
        };
        Self {
            ground,
            ground_color: GROUND_COLOR,
            grid_size: GROUND_SIZE,
            grid_divisions: GRID_DIVISIONS,
            drag_plane_half: DRAG_PLANE_HALF,
        }
    }
}

/// Casts a ray against the invisible drag plane (y = 0, bounded extent).
pub fn intersect_drag_plane(origin: Vec3, dir: Vec3, half: f32) -> Option<Vec3> {
    let (num, denom) = (-origin.y, dir.y);
    if denom.abs() <= 1.0e-6 {
        return None;
    }
    let t = num / denom;
    if t <= 0.0 {
        return None;
    }
    let hit = origin + dir * t;
    if hit.x.abs() > half || hit.z.abs() > half {
        return None;
    }
    Some(hit)
}

/// The full compiled output for one layout.
#[derive(Debug, Clone, Default)]
pub struct CompiledScene {
    pub objects: Vec<ObjectNode>,
    pub labels: Vec<LabelNode>,
    pub environment: Option<Environment>,
}

/// Compiles a layout into object groups, paired labels, and the static
/// environment. Never fails; malformed component data degrades to defaults.
pub fn compile_scene(layout: &RoomLayout) -> CompiledScene {
    let mut objects = Vec::with_capacity(layout.objects.len());
    let mut labels = Vec::with_capacity(layout.objects.len());

    for (id, item) in layout.objects.iter().enumerate() {
        let base_color = item.base_color();
        let parts = item
            .components
            .iter()
            .map(|comp| MeshPart::from_component(comp, base_color))
            .collect();

        objects.push(ObjectNode {
            id,
            name: item.name.clone(),
            original_color: base_color,
            position: world_position(item.x, item.z),
            parts,
        });
        labels.push(LabelNode::new(id, item));
    }

    CompiledScene {
        objects,
        labels,
        environment: Some(Environment::default()),
    }
}

fn vec3_from(data: Vec3Data) -> Vec3 {
    Vec3::new(data.x, data.y, data.z)
}
