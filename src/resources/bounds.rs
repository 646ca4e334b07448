//! Oriented Bounding Volumes
//!
//! [`BoundingBox`] is an oriented box: a center plus three orthogonal axes.
//! Each axis is stored as a `Vec4` whose `xyz` is the unit direction and whose
//! `w` is the half-extent along that direction. Keeping the axes explicit lets
//! the frustum test handle arbitrarily rotated and scaled boxes without ever
//! re-fitting an axis-aligned box.

use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Oriented bounding box in object or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center: Vec3,
    /// Unit direction in `xyz`, half-extent in `w`.
    pub axes: [Vec4; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::from_center_extents(Vec3::ZERO, Vec3::ZERO)
    }
}

impl BoundingBox {
    /// Axis-aligned box from its center and half-extents.
    #[must_use]
    pub fn from_center_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            axes: [
                Vec3::X.extend(half_extents.x),
                Vec3::Y.extend(half_extents.y),
                Vec3::Z.extend(half_extents.z),
            ],
        }
    }

    /// Axis-aligned box from two opposite corners.
    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let lo = min.min(max);
        let hi = min.max(max);
        Self::from_center_extents((lo + hi) * 0.5, (hi - lo) * 0.5)
    }

    /// Fits an axis-aligned box around a point cloud.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self::from_min_max(min, max))
    }

    #[inline]
    #[must_use]
    pub fn axis(&self, index: usize) -> Vec3 {
        self.axes[index].truncate()
    }

    #[inline]
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.axes[0].w, self.axes[1].w, self.axes[2].w)
    }

    /// A box with no volume along at least one axis, or with non-finite data.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.half_extents().min_element() <= 0.0
    }

    /// All components finite. Flat boxes (a single quad) still qualify.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.center.is_finite() && self.axes.iter().all(|a| a.is_finite())
    }

    /// Applies an affine transform.
    ///
    /// The center is transformed as a point. Each scaled axis is transformed
    /// as a vector; its new length becomes the half-extent and its normalized
    /// direction the new axis. A collapsed axis keeps its old direction with a
    /// zero extent.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        let center = matrix.transform_point3(self.center);
        let mut axes = self.axes;
        for axis in &mut axes {
            let dir = axis.truncate();
            let scaled = matrix.transform_vector3(dir * axis.w);
            let len = scaled.length();
            *axis = if len > f32::EPSILON {
                (scaled / len).extend(len)
            } else {
                matrix.transform_vector3(dir).normalize_or(dir).extend(0.0)
            };
        }
        Self { center, axes }
    }

    /// Same as [`Self::transform`] for a `Mat4` model matrix.
    #[must_use]
    pub fn transform_mat4(&self, matrix: &Mat4) -> Self {
        self.transform(&Affine3A::from_mat4(*matrix))
    }

    /// The eight corners of the box.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let u = self.axis(0) * self.axes[0].w;
        let v = self.axis(1) * self.axes[1].w;
        let w = self.axis(2) * self.axes[2].w;
        let c = self.center;
        [
            c - u - v - w,
            c + u - v - w,
            c + u + v - w,
            c - u + v - w,
            c - u - v + w,
            c + u - v + w,
            c + u + v + w,
            c - u + v + w,
        ]
    }

    /// Projected radius of the box onto a (not necessarily unit) direction.
    #[inline]
    #[must_use]
    pub fn projected_radius(&self, normal: Vec3) -> f32 {
        self.axes
            .iter()
            .map(|a| (a.w * normal.dot(a.truncate())).abs())
            .sum()
    }
}
