//! Pointer and camera state machine over a compiled scene. All mutation
//! happens here, synchronously, one input at a time; the render side only
//! ever reads the versioned snapshot this model publishes.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::camera::{Camera, ScenePoint, SceneRect};
use crate::layout::RoomLayout;
use crate::scene::compile::{
    compile_scene, intersect_drag_plane, CompiledScene, Environment, LabelNode, MeshPart,
    ObjectNode, DRAG_PLANE_HALF,
};

/// Emissive color applied to every part of the selected object.
pub const HIGHLIGHT_EMISSIVE: [f32; 3] = [
    0x55 as f32 / 255.0,
    0x55 as f32 / 255.0,
    0x55 as f32 / 255.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Dragging,
    Orbiting,
}

/// One pointer or wheel event, already mapped to widget-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneInput {
    /// `secondary` is the orbit chord: right button or Ctrl.
    PointerDown { position: ScenePoint, secondary: bool },
    PointerMoved { position: ScenePoint },
    PointerUp,
    /// Positive notches move the eye toward the room.
    Wheel { notches: f32 },
}

/// What one input changed, for the shell to mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneUpdate {
    pub redraw: bool,
    pub capture: bool,
    /// `Some(new_selection)` when the selection changed.
    pub selection_changed: Option<Option<usize>>,
    /// `Some(new_hover)` when the hovered object changed.
    pub hover_changed: Option<Option<usize>>,
    /// Object id plus its new logical grid coordinates after a drag step.
    pub moved: Option<(usize, f32, f32)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Hit {
    Object { id: usize, t: f32 },
    Label { id: usize, t: f32 },
}

impl Hit {
    fn t(self) -> f32 {
        match self {
            Hit::Object { t, .. } | Hit::Label { t, .. } => t,
        }
    }

    fn id(self) -> usize {
        match self {
            Hit::Object { id, .. } | Hit::Label { id, .. } => id,
        }
    }
}

/// Render-facing copy of one mesh part, world transform applied and the
/// highlight already folded into the emissive.
#[derive(Debug, Clone)]
pub struct DrawPart {
    pub mesh: crate::geometry::Mesh,
    pub world: Mat4,
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
}

/// Immutable snapshot the shader primitive reads. Rebuilt (and its version
/// bumped) whenever anything render-visible changes.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub version: u64,
    pub parts: Vec<DrawPart>,
    pub labels: Vec<LabelNode>,
    pub environment: Option<Environment>,
}

/// Snapshot plus the current camera; cheap to clone per frame.
#[derive(Debug, Clone)]
pub struct SceneView {
    pub camera: Camera,
    pub snapshot: Arc<SceneSnapshot>,
}

pub struct SceneModel {
    scene: CompiledScene,
    camera: Camera,
    phase: Phase,
    selected: Option<usize>,
    hovered: Option<usize>,
    last_cursor: Option<ScenePoint>,
    version: u64,
    snapshot: Option<Arc<SceneSnapshot>>,
}

impl Default for SceneModel {
    fn default() -> Self {
        Self {
            scene: CompiledScene::default(),
            camera: Camera::default(),
            phase: Phase::Idle,
            selected: None,
            hovered: None,
            last_cursor: None,
            version: 0,
            snapshot: None,
        }
    }
}

impl SceneModel {
    /// Replaces the whole scene. The previous forest is discarded;
    /// selection, hover, and gesture state reset with it.
    pub fn apply_layout(&mut self, layout: &RoomLayout) {
        self.scene = compile_scene(layout);
        self.phase = Phase::Idle;
        self.selected = None;
        self.hovered = None;
        self.last_cursor = None;
        self.invalidate();
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn object_name(&self, id: usize) -> Option<&str> {
        self.scene.objects.get(id).map(|o| o.name.as_str())
    }

    pub fn objects(&self) -> &[ObjectNode] {
        &self.scene.objects
    }

    pub fn labels(&self) -> &[LabelNode] {
        &self.scene.labels
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Selection driven from the sidebar rather than a pick.
    pub fn select(&mut self, id: Option<usize>) -> SceneUpdate {
        let mut update = SceneUpdate::default();
        let id = id.filter(|id| *id < self.scene.objects.len());
        if self.selected != id {
            self.selected = id;
            self.invalidate();
            update.redraw = true;
            update.selection_changed = Some(id);
        }
        update
    }

    pub fn update(&mut self, input: SceneInput, bounds: SceneRect) -> SceneUpdate {
        match input {
            SceneInput::PointerDown {
                position,
                secondary,
            } => self.pointer_down(position, secondary, bounds),
            SceneInput::PointerMoved { position } => self.pointer_moved(position, bounds),
            SceneInput::PointerUp => self.pointer_up(),
            SceneInput::Wheel { notches } => {
                self.camera.zoom(notches);
                SceneUpdate {
                    redraw: true,
                    capture: true,
                    ..SceneUpdate::default()
                }
            }
        }
    }

    fn pointer_down(
        &mut self,
        position: ScenePoint,
        secondary: bool,
        bounds: SceneRect,
    ) -> SceneUpdate {
        let mut update = SceneUpdate {
            capture: true,
            ..SceneUpdate::default()
        };

        if secondary {
            self.phase = Phase::Orbiting;
            self.last_cursor = Some(position);
            return update;
        }

        match self.pick(position, bounds, true) {
            Some(hit) => {
                let id = hit.id();
                if self.selected != Some(id) {
                    self.selected = Some(id);
                    self.invalidate();
                    update.redraw = true;
                    update.selection_changed = Some(Some(id));
                }
                self.phase = Phase::Dragging;
            }
            None => {
                if self.selected.take().is_some() {
                    self.invalidate();
                    update.redraw = true;
                    update.selection_changed = Some(None);
                }
            }
        }
        update
    }

    fn pointer_moved(&mut self, position: ScenePoint, bounds: SceneRect) -> SceneUpdate {
        match self.phase {
            Phase::Orbiting => {
                let mut update = SceneUpdate {
                    capture: true,
                    ..SceneUpdate::default()
                };
                if let Some(last) = self.last_cursor {
                    self.camera.orbit(position.x - last.x, position.y - last.y);
                    update.redraw = true;
                }
                self.last_cursor = Some(position);
                update
            }
            Phase::Dragging => {
                let mut update = SceneUpdate {
                    capture: true,
                    ..SceneUpdate::default()
                };
                let Some(id) = self.selected else {
                    return update;
                };
                let Some((origin, dir)) = self.camera.ray_from_cursor(position, bounds) else {
                    return update;
                };
                let half = self
                    .scene
                    .environment
                    .as_ref()
                    .map(|env| env.drag_plane_half)
                    .unwrap_or(DRAG_PLANE_HALF);
                if let Some(hit) = intersect_drag_plane(origin, dir, half) {
                    if let Some(object) = self.scene.objects.get_mut(id) {
                        object.position.x = hit.x;
                        object.position.z = hit.z;
                    }
                    if let Some(label) = self.scene.labels.get_mut(id) {
                        label.position.x = hit.x;
                        label.position.z = hit.z;
                    }
                    self.invalidate();
                    update.redraw = true;
                    update.moved = Some((id, hit.x + 5.0, hit.z + 5.0));
                }
                update
            }
            Phase::Idle => {
                let hover = self.pick(position, bounds, false).map(Hit::id);
                let mut update = SceneUpdate::default();
                if hover != self.hovered {
                    self.hovered = hover;
                    for label in &mut self.scene.labels {
                        label.visible = Some(label.id) == hover;
                    }
                    self.invalidate();
                    update.redraw = true;
                    update.hover_changed = Some(hover);
                }
                update
            }
        }
    }

    fn pointer_up(&mut self) -> SceneUpdate {
        let was_active = self.phase != Phase::Idle;
        self.phase = Phase::Idle;
        self.last_cursor = None;
        SceneUpdate {
            redraw: was_active,
            capture: was_active,
            ..SceneUpdate::default()
        }
    }

    /// Nearest ray hit over object parts and, for pointer-down picking,
    /// label billboards. Environment geometry is never a hit; a label hit
    /// resolves to its object through the shared id.
    fn pick(&self, position: ScenePoint, bounds: SceneRect, include_labels: bool) -> Option<Hit> {
        let (origin, dir) = self.camera.ray_from_cursor(position, bounds)?;
        let mut nearest: Option<Hit> = None;

        let mut consider = |hit: Hit| {
            if nearest.map(|n| hit.t() < n.t()).unwrap_or(true) {
                nearest = Some(hit);
            }
        };

        for object in &self.scene.objects {
            for part in &object.parts {
                let world_bounds = part.bounds.translated(object.position);
                if let Some(t) = world_bounds.ray_hit(origin, dir) {
                    consider(Hit::Object { id: object.id, t });
                }
            }
        }

        if include_labels {
            for label in &self.scene.labels {
                if let Some(t) = self.ray_label(origin, dir, label) {
                    consider(Hit::Label { id: label.id, t });
                }
            }
        }

        nearest
    }

    /// Ray against a camera-facing rectangle centered on the label.
    fn ray_label(&self, origin: Vec3, dir: Vec3, label: &LabelNode) -> Option<f32> {
        let forward = self.camera.forward();
        let denom = dir.dot(forward);
        if denom.abs() <= 1.0e-6 {
            return None;
        }
        let t = (label.position - origin).dot(forward) / denom;
        if t <= 0.0 {
            return None;
        }
        let offset = origin + dir * t - label.position;

        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);
        if offset.dot(right).abs() > label.width * 0.5 {
            return None;
        }
        if offset.dot(up).abs() > label.height * 0.5 {
            return None;
        }
        Some(t)
    }

    fn invalidate(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.snapshot = None;
    }

    fn effective_emissive(&self, object: &ObjectNode, part: &MeshPart) -> ([f32; 3], f32) {
        if self.selected == Some(object.id) {
            (HIGHLIGHT_EMISSIVE, 1.0)
        } else {
            (part.emissive, part.emissive_intensity)
        }
    }

    /// Current render snapshot, rebuilt only after a change.
    pub fn view(&mut self) -> SceneView {
        let snapshot = match &self.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => {
                let built = Arc::new(self.build_snapshot());
                self.snapshot = Some(Arc::clone(&built));
                built
            }
        };
        SceneView {
            camera: self.camera,
            snapshot,
        }
    }

    fn build_snapshot(&self) -> SceneSnapshot {
        let parts = self
            .scene
            .objects
            .iter()
            .flat_map(|object| {
                object.parts.iter().map(move |part| {
                    let (emissive, emissive_intensity) = self.effective_emissive(object, part);
                    DrawPart {
                        mesh: part.mesh.clone(),
                        world: Mat4::from_translation(object.position) * part.transform,
                        color: part.color,
                        emissive,
                        emissive_intensity,
                    }
                })
            })
            .collect();

        SceneSnapshot {
            version: self.version,
            parts,
            labels: self.scene.labels.clone(),
            environment: self.scene.environment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::project_point;
    use crate::layout::{Component, GeometryDescriptor, PlacedObject};

    const BOUNDS: SceneRect = SceneRect {
        x: 0.0,
        y: 0.0,
        width: 800.0,
        height: 600.0,
    };

    fn boxy(name: &str, x: f32, z: f32) -> PlacedObject {
        PlacedObject {
            name: name.into(),
            x,
            z,
            color: "336699".into(),
            components: vec![Component {
                geometry: GeometryDescriptor {
                    kind: "box".into(),
                    params: Default::default(),
                },
                position: None,
                rotation: None,
                color: None,
                emissive: None,
                emissive_intensity: 0.0,
            }],
        }
    }

    fn model_with(objects: Vec<PlacedObject>) -> SceneModel {
        let mut model = SceneModel::default();
        model.apply_layout(&RoomLayout { objects });
        model
    }

    /// Cursor position whose pick ray passes through a world point.
    fn cursor_at(model: &SceneModel, world: Vec3) -> ScenePoint {
        project_point(model.camera().view_projection(BOUNDS), BOUNDS, world)
            .expect("point in front of camera")
    }

    fn press(model: &mut SceneModel, cursor: ScenePoint) -> SceneUpdate {
        model.update(
            SceneInput::PointerDown {
                position: cursor,
                secondary: false,
            },
            BOUNDS,
        )
    }

    #[test]
    fn empty_pick_yields_no_hit_and_no_selection_change() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        // Bare floor far from the object: only the drag plane lies under the
        // ray, and environment geometry must never register as a hit.
        let cursor = cursor_at(&model, Vec3::new(4.0, 0.0, 4.0));
        let update = press(&mut model, cursor);
        assert_eq!(model.selected(), None);
        assert_eq!(update.selection_changed, None);
    }

    #[test]
    fn picking_an_object_selects_and_enters_drag() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        let cursor = cursor_at(&model, Vec3::new(0.0, 0.3, 0.0));
        let update = press(&mut model, cursor);
        assert_eq!(model.selected(), Some(0));
        assert_eq!(update.selection_changed, Some(Some(0)));

        // Moving now drags rather than hovering.
        let target = cursor_at(&model, Vec3::new(2.0, 0.0, 1.0));
        let update = model.update(SceneInput::PointerMoved { position: target }, BOUNDS);
        let moved = update.moved.expect("drag reposition");
        assert_eq!(moved.0, 0);
        let object = &model.objects()[0];
        assert!((object.position.x - 2.0).abs() < 1e-2);
        assert!((object.position.z - 1.0).abs() < 1e-2);
        // Logical coordinates are world + 5.
        assert!((moved.1 - 7.0).abs() < 1e-2);
        assert!((moved.2 - 6.0).abs() < 1e-2);
    }

    #[test]
    fn drag_mirrors_the_label() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        let cursor = cursor_at(&model, Vec3::new(0.0, 0.3, 0.0));
        press(&mut model, cursor);
        let target = cursor_at(&model, Vec3::new(-1.5, 0.0, 2.5));
        model.update(SceneInput::PointerMoved { position: target }, BOUNDS);

        let object = &model.objects()[0];
        let label = &model.labels()[0];
        assert!((label.position.x - object.position.x).abs() < 1e-5);
        assert!((label.position.z - object.position.z).abs() < 1e-5);
        assert_eq!(label.position.y, 2.0);
    }

    #[test]
    fn highlight_is_exclusive() {
        let mut model = model_with(vec![boxy("Sofa", 3.0, 5.0), boxy("Desk", 7.0, 5.0)]);

        let first = cursor_at(&model, Vec3::new(-2.0, 0.3, 0.0));
        press(&mut model, first);
        model.update(SceneInput::PointerUp, BOUNDS);
        assert_eq!(model.selected(), Some(0));
        let view = model.view();
        assert_eq!(view.snapshot.parts[0].emissive, HIGHLIGHT_EMISSIVE);
        assert_eq!(view.snapshot.parts[1].emissive, [0.0; 3]);

        let second = cursor_at(&model, Vec3::new(2.0, 0.3, 0.0));
        press(&mut model, second);
        assert_eq!(model.selected(), Some(1));
        let view = model.view();
        assert_eq!(view.snapshot.parts[0].emissive, [0.0; 3]);
        assert_eq!(view.snapshot.parts[1].emissive, HIGHLIGHT_EMISSIVE);
    }

    #[test]
    fn clicking_empty_space_clears_selection() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        let on_object = cursor_at(&model, Vec3::new(0.0, 0.3, 0.0));
        press(&mut model, on_object);
        model.update(SceneInput::PointerUp, BOUNDS);

        let off_object = cursor_at(&model, Vec3::new(4.0, 0.0, 4.0));
        let update = press(&mut model, off_object);
        assert_eq!(model.selected(), None);
        assert_eq!(update.selection_changed, Some(None));
        let view = model.view();
        assert_eq!(view.snapshot.parts[0].emissive, [0.0; 3]);
    }

    #[test]
    fn hover_shows_only_the_matching_label() {
        let mut model = model_with(vec![boxy("Sofa", 3.0, 5.0), boxy("Desk", 7.0, 5.0)]);

        let over_first = cursor_at(&model, Vec3::new(-2.0, 0.3, 0.0));
        let update = model.update(SceneInput::PointerMoved { position: over_first }, BOUNDS);
        assert_eq!(update.hover_changed, Some(Some(0)));
        assert!(model.labels()[0].visible);
        assert!(!model.labels()[1].visible);

        let over_floor = cursor_at(&model, Vec3::new(0.0, 0.0, 4.0));
        let update = model.update(SceneInput::PointerMoved { position: over_floor }, BOUNDS);
        assert_eq!(update.hover_changed, Some(None));
        assert!(!model.labels()[0].visible);
        assert!(!model.labels()[1].visible);
    }

    #[test]
    fn label_pick_resolves_to_its_object() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        // Straight at the label billboard, well above the box itself.
        let cursor = cursor_at(&model, Vec3::new(0.0, 2.0, 0.0));
        press(&mut model, cursor);
        assert_eq!(model.selected(), Some(0));
    }

    #[test]
    fn orbit_gesture_keeps_altitude_floored() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        model.update(
            SceneInput::PointerDown {
                position: ScenePoint::new(400.0, 300.0),
                secondary: true,
            },
            BOUNDS,
        );
        for step in 0..100 {
            model.update(
                SceneInput::PointerMoved {
                    position: ScenePoint::new(400.0, 300.0 + step as f32 * 40.0),
                },
                BOUNDS,
            );
        }
        assert_eq!(model.camera().eye.y, crate::camera::MIN_ALTITUDE);
        assert_eq!(model.selected(), None);
    }

    #[test]
    fn pointer_up_is_idempotent() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        let quiet = model.update(SceneInput::PointerUp, BOUNDS);
        assert!(!quiet.redraw);
        assert_eq!(model.selected(), None);
    }

    #[test]
    fn wheel_zoom_respects_altitude_range() {
        let mut model = model_with(vec![]);
        for _ in 0..500 {
            model.update(SceneInput::Wheel { notches: -1.0 }, BOUNDS);
        }
        assert!(model.camera().eye.y <= crate::camera::MAX_ALTITUDE);
        for _ in 0..2000 {
            model.update(SceneInput::Wheel { notches: 1.0 }, BOUNDS);
        }
        assert!(model.camera().eye.y >= crate::camera::MIN_ALTITUDE);
    }

    #[test]
    fn snapshot_version_tracks_changes() {
        let mut model = model_with(vec![boxy("Sofa", 5.0, 5.0)]);
        let v0 = model.view().snapshot.version;
        assert_eq!(model.view().snapshot.version, v0);

        model.select(Some(0));
        let v1 = model.view().snapshot.version;
        assert_ne!(v0, v1);
    }
}
