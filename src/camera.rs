use glam::{Mat4, Vec3};

/// Cursor position in widget-local logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenePoint {
    pub x: f32,
    pub y: f32,
}

impl ScenePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Widget bounds in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SceneRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

pub const MIN_ALTITUDE: f32 = 2.0;
pub const MAX_ALTITUDE: f32 = 20.0;
const ORBIT_SPEED: f32 = 0.005;
const LIFT_SPEED: f32 = 0.05;
const ZOOM_STEP: f32 = 0.1;

/// Orbit camera fixed on the room origin. The eye moves; the aim point does
/// not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fovy: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 8.0, 12.0),
            target: Vec3::ZERO,
            fovy: 75.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// Horizontal drag spins the eye about the Y axis at constant XZ radius;
    /// vertical drag raises or lowers it, floored at [`MIN_ALTITUDE`].
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        let radius = (self.eye.x * self.eye.x + self.eye.z * self.eye.z).sqrt();
        let angle = self.eye.z.atan2(self.eye.x) - dx * ORBIT_SPEED;
        self.eye.x = radius * angle.cos();
        self.eye.z = radius * angle.sin();
        self.eye.y = (self.eye.y - dy * LIFT_SPEED).max(MIN_ALTITUDE);
    }

    /// Moves the eye along the view direction by whole notches, keeping its
    /// altitude inside `[MIN_ALTITUDE, MAX_ALTITUDE]`.
    pub fn zoom(&mut self, notches: f32) {
        self.eye += self.forward() * (notches * ZOOM_STEP);
        self.eye.y = self.eye.y.clamp(MIN_ALTITUDE, MAX_ALTITUDE);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection(&self, bounds: SceneRect) -> Mat4 {
        let aspect = if bounds.height > 1.0 {
            bounds.width / bounds.height
        } else {
            1.0
        };
        Mat4::perspective_rh(self.fovy, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, bounds: SceneRect) -> Mat4 {
        self.projection(bounds) * self.view()
    }

    /// World-space ray through a cursor position. `None` for degenerate
    /// bounds.
    pub fn ray_from_cursor(&self, cursor: ScenePoint, bounds: SceneRect) -> Option<(Vec3, Vec3)> {
        if bounds.width <= 1.0 || bounds.height <= 1.0 {
            return None;
        }

        let x_ndc = (cursor.x / bounds.width) * 2.0 - 1.0;
        let y_ndc = 1.0 - (cursor.y / bounds.height) * 2.0;

        let forward = self.forward();
        if forward.length_squared() <= f32::EPSILON {
            return None;
        }
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        let half_h = (0.5 * self.fovy).tan();
        let half_w = half_h * (bounds.width / bounds.height);

        let dir = (forward + right * (x_ndc * half_w) + up * (y_ndc * half_h)).normalize_or_zero();
        Some((self.eye, dir))
    }
}

/// Projects a world point into widget-local pixels. `None` when the point
/// is behind the eye.
pub fn project_point(mvp: Mat4, bounds: SceneRect, p: Vec3) -> Option<ScenePoint> {
    let clip = mvp * p.extend(1.0);
    if clip.w <= 1.0e-6 {
        return None;
    }
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    Some(ScenePoint::new(
        (ndc_x + 1.0) * 0.5 * bounds.width,
        (1.0 - ndc_y) * 0.5 * bounds.height,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pose_looks_at_origin() {
        let camera = Camera::default();
        assert_eq!(camera.eye, Vec3::new(0.0, 8.0, 12.0));
        let forward = camera.forward();
        assert!(forward.z < 0.0);
        assert!(forward.y < 0.0);
    }

    #[test]
    fn orbit_preserves_radius_and_floors_altitude() {
        let mut camera = Camera::default();
        let radius = (camera.eye.x * camera.eye.x + camera.eye.z * camera.eye.z).sqrt();
        for _ in 0..200 {
            camera.orbit(13.0, 50.0);
        }
        let after = (camera.eye.x * camera.eye.x + camera.eye.z * camera.eye.z).sqrt();
        assert!((after - radius).abs() < 1e-3);
        assert_eq!(camera.eye.y, MIN_ALTITUDE);
    }

    #[test]
    fn zoom_clamps_altitude() {
        let mut camera = Camera::default();
        for _ in 0..1000 {
            camera.zoom(1.0);
        }
        assert!(camera.eye.y >= MIN_ALTITUDE);
        for _ in 0..1000 {
            camera.zoom(-1.0);
        }
        assert!(camera.eye.y <= MAX_ALTITUDE);
    }

    #[test]
    fn center_ray_points_forward() {
        let camera = Camera::default();
        let bounds = SceneRect::new(0.0, 0.0, 800.0, 600.0);
        let (origin, dir) = camera
            .ray_from_cursor(ScenePoint::new(400.0, 300.0), bounds)
            .unwrap();
        assert_eq!(origin, camera.eye);
        assert!(dir.dot(camera.forward()) > 0.999);
    }

    #[test]
    fn ray_through_projected_point_returns_to_it() {
        let camera = Camera::default();
        let bounds = SceneRect::new(0.0, 0.0, 800.0, 600.0);
        let world = Vec3::new(1.5, 0.0, -2.0);
        let cursor = project_point(camera.view_projection(bounds), bounds, world).unwrap();
        let (origin, dir) = camera.ray_from_cursor(cursor, bounds).unwrap();
        let t = (world - origin).length();
        let reached = origin + dir * t;
        assert!((reached - world).length() < 1e-2);
    }

    #[test]
    fn degenerate_bounds_yield_no_ray() {
        let camera = Camera::default();
        let bounds = SceneRect::new(0.0, 0.0, 0.0, 0.0);
        assert!(camera
            .ray_from_cursor(ScenePoint::new(0.0, 0.0), bounds)
            .is_none());
    }
}
