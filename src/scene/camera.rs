use glam::{Affine3A, Mat4, Vec3, Vec4};

use crate::resources::BoundingBox;
use crate::scene::object::GameObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// Projection parameters. The view comes from the owning node's world
/// matrix at render time.
#[derive(Debug, Clone)]
pub struct Camera {
    pub projection_type: ProjectionType,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half-height of the orthographic view volume.
    pub ortho_size: f32,
}

impl GameObject for Camera {}

impl Camera {
    /// `fov` is the vertical field of view in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
        }
    }

    #[must_use]
    pub fn new_orthographic(size: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection_type: ProjectionType::Orthographic,
            fov: 60f32.to_radians(),
            aspect,
            near,
            far,
            ortho_size: size,
        }
    }

    /// `[0, 1]` depth, right-handed.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        }
    }

    /// Snapshot of everything the renderer needs for one frame.
    #[must_use]
    pub fn extract(&self, world: &Affine3A) -> RenderCamera {
        let view = Mat4::from(*world).inverse();
        let projection = self.projection_matrix();
        let view_projection = projection * view;
        RenderCamera {
            world: *world,
            view,
            projection,
            view_projection,
            position: world.translation.into(),
            projection_type: self.projection_type,
            fov: self.fov,
            aspect: self.aspect,
            near: self.near,
            far: self.far,
            ortho_size: self.ortho_size,
            frustum: Frustum::from_matrix(view_projection),
        }
    }
}

/// Per-frame camera data. Plain values, detached from the scene.
#[derive(Debug, Clone, Copy)]
pub struct RenderCamera {
    pub world: Affine3A,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,
    pub frustum: Frustum,
}

// ============================================================================
// Frustum
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum FrustumPlane {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Near = 4,
    Far = 5,
}

/// Six clip planes, `xyz` the unit normal pointing *out* of the volume and
/// `w` the offset, so `dot(n, p) + w > 0` means `p` is outside.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb-Hartmann extraction for a `[0, 1]` depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        // Inward-facing planes first.
        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            *plane = if length > f32::EPSILON && length.is_finite() {
                -*plane / length
            } else {
                Vec4::ZERO
            };
        }

        Self { planes }
    }

    #[inline]
    #[must_use]
    pub fn plane(&self, which: FrustumPlane) -> Vec4 {
        self.planes[which as usize]
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Any plane with a zero normal (singular matrix).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.planes.iter().any(|p| p.truncate() == Vec3::ZERO)
    }

    /// The box is at least partly on the inner side of `plane`. Touching the
    /// plane counts as inside.
    #[inline]
    #[must_use]
    pub fn test_plane(plane: Vec4, bbox: &BoundingBox) -> bool {
        let normal = plane.truncate();
        normal.dot(bbox.center) + plane.w - bbox.projected_radius(normal) <= 0.0
    }

    /// Visibility test against every plane except the far plane.
    ///
    /// A degenerate frustum or a box with non-finite data is never visible.
    #[must_use]
    pub fn test_box(&self, bbox: &BoundingBox) -> bool {
        if self.is_degenerate() || !bbox.is_finite() {
            return false;
        }
        self.planes[..FrustumPlane::Far as usize]
            .iter()
            .all(|&p| Self::test_plane(p, bbox))
    }

    /// Sphere test against all six planes.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(center) + p.w <= radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_normals_are_unit_and_outward() {
        let m = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let f = Frustum::from_matrix(m);
        for p in f.planes() {
            assert!((p.truncate().length() - 1.0).abs() < 1e-5);
        }
        // The camera looks down -Z, so the near plane faces +Z.
        assert!(f.plane(FrustumPlane::Near).z > 0.9);
        assert!(f.plane(FrustumPlane::Far).z < -0.9);
    }

    #[test]
    fn singular_matrix_sees_nothing() {
        let f = Frustum::from_matrix(Mat4::ZERO);
        assert!(f.is_degenerate());
        let b = BoundingBox::from_center_extents(Vec3::ZERO, Vec3::ONE);
        assert!(!f.test_box(&b));
    }
}
