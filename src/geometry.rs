//! Primitive mesh construction. Descriptors come from an unreliable
//! generator, so every builder substitutes documented defaults for missing
//! parameters and an unknown type yields a unit box. Nothing here fails.

use glam::Vec3;

use crate::layout::{GeometryDescriptor, GeometryKind};

/// A triangle mesh in local space, centered on the origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.normalize_or_zero().to_array());
        index
    }

    fn push_tri(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.push_tri(a, b, c);
        self.push_tri(a, c, d);
    }
}

/// Builds the mesh for a descriptor, defaulting any missing dimension.
pub fn build_mesh(desc: &GeometryDescriptor) -> Mesh {
    match GeometryKind::parse(&desc.kind) {
        GeometryKind::Box => build_box(
            desc.param("width", 1.0),
            desc.param("height", 1.0),
            desc.param("depth", 1.0),
        ),
        GeometryKind::Cylinder => build_cylinder(
            desc.param("radiusTop", 0.5),
            desc.param("radiusBottom", 0.5),
            desc.param("height", 1.0),
            desc.param("segments", 8.0) as u32,
        ),
        GeometryKind::Sphere => build_sphere(
            desc.param("radius", 0.5),
            desc.param("widthSegments", 8.0) as u32,
            desc.param("heightSegments", 8.0) as u32,
        ),
        GeometryKind::Cone => build_cylinder(
            0.0,
            desc.param("radius", 0.5),
            desc.param("height", 1.0),
            desc.param("segments", 8.0) as u32,
        ),
        GeometryKind::Plane => build_plane(desc.param("width", 1.0), desc.param("height", 1.0)),
    }
}

/// Axis-aligned box with flat per-face normals.
pub fn build_box(width: f32, height: f32, depth: f32) -> Mesh {
    let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);
    let mut mesh = Mesh::default();

    // (normal, two in-plane tangents); each face is a quad of four vertices.
    let faces = [
        (Vec3::X, Vec3::Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];
    let half = Vec3::new(hx, hy, hz);

    for (normal, tan_u, tan_v) in faces {
        let center = normal * (normal.abs().dot(half));
        let u = tan_u * tan_u.abs().dot(half);
        let v = tan_v * tan_v.abs().dot(half);
        let a = mesh.push_vertex(center - u - v, normal);
        let b = mesh.push_vertex(center + u - v, normal);
        let c = mesh.push_vertex(center + u + v, normal);
        let d = mesh.push_vertex(center - u + v, normal);
        mesh.push_quad(a, b, c, d);
    }
    mesh
}

/// Open-ended frustum plus caps; `radius_top == radius_bottom` is a straight
/// cylinder, `radius_top == 0` a cone.
pub fn build_cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Mesh {
    let segments = segments.max(3);
    let half_h = height * 0.5;
    let mut mesh = Mesh::default();

    // Side ring: smooth normals tilted by the slope of the frustum wall.
    let mut bottom_ring = Vec::with_capacity(segments as usize);
    let mut top_ring = Vec::with_capacity(segments as usize);
    for i in 0..segments {
        let theta = i as f32 / segments as f32 * std::f32::consts::TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(cos * height, radius_bottom - radius_top, sin * height);
        bottom_ring.push(mesh.push_vertex(
            Vec3::new(cos * radius_bottom, -half_h, sin * radius_bottom),
            normal,
        ));
        top_ring.push(mesh.push_vertex(
            Vec3::new(cos * radius_top, half_h, sin * radius_top),
            normal,
        ));
    }
    for i in 0..segments as usize {
        let j = (i + 1) % segments as usize;
        mesh.push_quad(bottom_ring[i], bottom_ring[j], top_ring[j], top_ring[i]);
    }

    // Caps with their own flat-normal vertices.
    for (radius, y, normal) in [
        (radius_bottom, -half_h, Vec3::NEG_Y),
        (radius_top, half_h, Vec3::Y),
    ] {
        if radius <= f32::EPSILON {
            continue;
        }
        let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal);
        let mut rim = Vec::with_capacity(segments as usize);
        for i in 0..segments {
            let theta = i as f32 / segments as f32 * std::f32::consts::TAU;
            let (sin, cos) = theta.sin_cos();
            rim.push(mesh.push_vertex(Vec3::new(cos * radius, y, sin * radius), normal));
        }
        for i in 0..segments as usize {
            let j = (i + 1) % segments as usize;
            if normal.y > 0.0 {
                mesh.push_tri(center, rim[j], rim[i]);
            } else {
                mesh.push_tri(center, rim[i], rim[j]);
            }
        }
    }
    mesh
}

/// UV sphere with pole caps and smooth normals.
pub fn build_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = Mesh::default();

    let mut rings: Vec<Vec<u32>> = Vec::with_capacity(height_segments as usize + 1);
    for ring in 0..=height_segments {
        let phi = ring as f32 / height_segments as f32 * std::f32::consts::PI;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let mut indices = Vec::with_capacity(width_segments as usize);
        for col in 0..width_segments {
            let theta = col as f32 / width_segments as f32 * std::f32::consts::TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let dir = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
            indices.push(mesh.push_vertex(dir * radius, dir));
        }
        rings.push(indices);
    }

    for ring in 0..height_segments as usize {
        for col in 0..width_segments as usize {
            let next = (col + 1) % width_segments as usize;
            let (a, b) = (rings[ring][col], rings[ring][next]);
            let (c, d) = (rings[ring + 1][next], rings[ring + 1][col]);
            if ring != 0 {
                mesh.push_tri(a, b, c);
            }
            if ring != height_segments as usize - 1 {
                mesh.push_tri(a, c, d);
            }
        }
    }
    mesh
}

/// Single quad in the XY plane facing +Z.
pub fn build_plane(width: f32, height: f32) -> Mesh {
    let (hx, hy) = (width * 0.5, height * 0.5);
    let mut mesh = Mesh::default();
    let a = mesh.push_vertex(Vec3::new(-hx, -hy, 0.0), Vec3::Z);
    let b = mesh.push_vertex(Vec3::new(hx, -hy, 0.0), Vec3::Z);
    let c = mesh.push_vertex(Vec3::new(hx, hy, 0.0), Vec3::Z);
    let d = mesh.push_vertex(Vec3::new(-hx, hy, 0.0), Vec3::Z);
    mesh.push_quad(a, b, c, d);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn descriptor(kind: &str, params: &[(&str, f64)]) -> GeometryDescriptor {
        GeometryDescriptor {
            kind: kind.to_owned(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn extent(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for p in &mesh.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        (min, max)
    }

    #[test]
    fn box_defaults_to_unit() {
        let mesh = build_mesh(&descriptor("box", &[]));
        let (min, max) = extent(&mesh);
        assert_eq!(min, [-0.5, -0.5, -0.5]);
        assert_eq!(max, [0.5, 0.5, 0.5]);
        assert_eq!(mesh.indices.len(), 36);
    }

    #[test]
    fn unknown_type_is_unit_box() {
        let unknown = build_mesh(&descriptor("torus", &[("radius", 3.0)]));
        let unit_box = build_mesh(&descriptor("box", &[]));
        assert_eq!(unknown, unit_box);
    }

    #[test]
    fn box_respects_params() {
        let mesh = build_mesh(&descriptor("box", &[("width", 2.0), ("depth", 4.0)]));
        let (min, max) = extent(&mesh);
        assert_eq!(min, [-1.0, -0.5, -2.0]);
        assert_eq!(max, [1.0, 0.5, 2.0]);
    }

    #[test]
    fn cylinder_defaults() {
        let mesh = build_mesh(&descriptor("cylinder", &[]));
        let (min, max) = extent(&mesh);
        assert!((min[1] + 0.5).abs() < 1e-6);
        assert!((max[1] - 0.5).abs() < 1e-6);
        assert!((max[0] - 0.5).abs() < 1e-6);
        // 8 segments: side quads plus two fans.
        assert_eq!(mesh.indices.len() as u32, 8 * 6 + 2 * 8 * 3);
    }

    #[test]
    fn cone_has_no_top_cap() {
        let cone = build_mesh(&descriptor("cone", &[]));
        let cylinder = build_mesh(&descriptor("cylinder", &[]));
        assert!(cone.indices.len() < cylinder.indices.len());
        let (min, max) = extent(&cone);
        assert!((min[1] + 0.5).abs() < 1e-6);
        assert!((max[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sphere_radius_and_normals() {
        let mesh = build_mesh(&descriptor("sphere", &[("radius", 2.0)]));
        for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - 2.0).abs() < 1e-5);
            let dot = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn plane_is_one_quad() {
        let mesh = build_mesh(&descriptor("plane", &[("width", 20.0), ("height", 20.0)]));
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        let (min, max) = extent(&mesh);
        assert_eq!(min, [-10.0, -10.0, 0.0]);
        assert_eq!(max, [10.0, 10.0, 0.0]);
    }
}
