//! Transform cache
//!
//! A node carries two affine matrices: `local` (relative to the parent) and
//! `global` (world space). Whichever one was written last is authoritative;
//! the other is recomputed lazily on the next read.
//!
//! - `local_dirty`: local was written (or an ancestor moved), global is stale.
//! - `global_dirty`: global was written, local is stale.
//!
//! Both flags clear together once [`Transform::reconcile`] runs against the
//! parent's global matrix. The cache lives in `Cell`s so that reads through a
//! shared `&Scene` can still settle it.
//!
//! Position, rotation and scale are *views* over the matrix columns, not
//! stored fields. Writing rotation keeps the current scale and writing scale
//! keeps the current rotation; see [`with_rotation`] and [`with_scale`].

use std::cell::Cell;

use glam::{Affine3A, Mat3, Quat, Vec3, Vec3A};

const SCALE_EPSILON: f32 = 1e-8;
const POLAR_ITERATIONS: usize = 16;
const POLAR_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct Transform {
    local: Cell<Affine3A>,
    global: Cell<Affine3A>,
    local_dirty: Cell<bool>,
    global_dirty: Cell<bool>,
    /// Bumped whenever the world-space value of this node may have changed.
    revision: Cell<u64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: Cell::new(Affine3A::IDENTITY),
            global: Cell::new(Affine3A::IDENTITY),
            local_dirty: Cell::new(false),
            global_dirty: Cell::new(false),
            revision: Cell::new(0),
        }
    }

    #[must_use]
    pub fn from_local(local: Affine3A) -> Self {
        let t = Self::new();
        t.write_local(local);
        t
    }

    // ========================================================================
    // Cache state
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn is_local_dirty(&self) -> bool {
        self.local_dirty.get()
    }

    #[inline]
    #[must_use]
    pub fn is_global_dirty(&self) -> bool {
        self.global_dirty.get()
    }

    #[inline]
    #[must_use]
    pub fn needs_reconcile(&self) -> bool {
        self.local_dirty.get() || self.global_dirty.get()
    }

    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Raw cached local matrix. May be stale while `global_dirty` is set.
    #[inline]
    #[must_use]
    pub fn cached_local(&self) -> Affine3A {
        self.local.get()
    }

    /// Raw cached global matrix. May be stale while `local_dirty` is set.
    #[inline]
    #[must_use]
    pub fn cached_global(&self) -> Affine3A {
        self.global.get()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Makes `local` authoritative.
    pub fn write_local(&self, local: Affine3A) {
        self.local.set(local);
        self.local_dirty.set(true);
        self.global_dirty.set(false);
        self.bump();
    }

    /// Makes `global` authoritative.
    pub fn write_global(&self, global: Affine3A) {
        self.global.set(global);
        self.global_dirty.set(true);
        self.local_dirty.set(false);
        self.bump();
    }

    /// An ancestor's global changed: this node's global must be rebuilt from
    /// its local on the next read.
    ///
    /// Callers settle a pending `global_dirty` first; see
    /// [`transform_system::settle_subtree`](super::transform_system::settle_subtree).
    pub fn invalidate_global(&self) {
        self.local_dirty.set(true);
        self.global_dirty.set(false);
        self.bump();
    }

    #[inline]
    fn bump(&self) {
        self.revision.set(self.revision.get().wrapping_add(1));
    }

    /// Brings both matrices in line with `global = parent_global * local`.
    ///
    /// `parent_global` is `None` for a root node. No-op when neither side is
    /// dirty.
    pub fn reconcile(&self, parent_global: Option<&Affine3A>) {
        if self.local_dirty.get() {
            let global = match parent_global {
                Some(parent) => *parent * self.local.get(),
                None => self.local.get(),
            };
            self.global.set(global);
        } else if self.global_dirty.get() {
            let local = match parent_global {
                Some(parent) => parent.inverse() * self.global.get(),
                None => self.global.get(),
            };
            self.local.set(local);
        } else {
            return;
        }
        self.local_dirty.set(false);
        self.global_dirty.set(false);
    }
}

// ============================================================================
// Matrix views
// ============================================================================

/// Translation column.
#[inline]
#[must_use]
pub fn position_of(m: &Affine3A) -> Vec3 {
    m.translation.into()
}

/// Per-axis column length of the upper-left 3x3.
#[inline]
#[must_use]
pub fn scale_of(m: &Affine3A) -> Vec3 {
    Vec3::new(
        m.matrix3.x_axis.length(),
        m.matrix3.y_axis.length(),
        m.matrix3.z_axis.length(),
    )
}

/// Rotation of the upper-left 3x3 once scale is divided out.
///
/// Shear left after removing scale is discarded by a polar decomposition,
/// which yields the closest orthonormal basis. Mirrored bases are folded into
/// a proper rotation, and collapsed axes are rebuilt from the other two.
#[must_use]
pub fn rotation_of(m: &Affine3A) -> Quat {
    let Some(basis) = unit_basis(m) else {
        return Quat::IDENTITY;
    };

    let mut r = basis;
    for _ in 0..POLAR_ITERATIONS {
        let det = r.determinant();
        if det.abs() < SCALE_EPSILON {
            break;
        }
        let next = (r + r.inverse().transpose()) * 0.5;
        let delta = (next.x_axis - r.x_axis).length_squared()
            + (next.y_axis - r.y_axis).length_squared()
            + (next.z_axis - r.z_axis).length_squared();
        r = next;
        if delta < POLAR_TOLERANCE * POLAR_TOLERANCE {
            break;
        }
    }

    Quat::from_mat3(&r).normalize()
}

/// Normalized columns with degenerate and mirrored cases repaired.
fn unit_basis(m: &Affine3A) -> Option<Mat3> {
    let mut cols = [
        Vec3::from(m.matrix3.x_axis),
        Vec3::from(m.matrix3.y_axis),
        Vec3::from(m.matrix3.z_axis),
    ];
    let mut collapsed = 0;
    for c in &mut cols {
        let len = c.length();
        if len > SCALE_EPSILON {
            *c /= len;
        } else {
            *c = Vec3::ZERO;
            collapsed += 1;
        }
    }

    match collapsed {
        0 => {}
        1 => {
            if cols[0] == Vec3::ZERO {
                cols[0] = cols[1].cross(cols[2]).normalize_or_zero();
            } else if cols[1] == Vec3::ZERO {
                cols[1] = cols[2].cross(cols[0]).normalize_or_zero();
            } else {
                cols[2] = cols[0].cross(cols[1]).normalize_or_zero();
            }
        }
        _ => return None,
    }

    let mut basis = Mat3::from_cols(cols[0], cols[1], cols[2]);
    if basis.determinant() < 0.0 {
        basis.x_axis = -basis.x_axis;
    }
    Some(basis)
}

/// Replaces the translation column.
#[inline]
#[must_use]
pub fn with_position(m: &Affine3A, position: Vec3) -> Affine3A {
    Affine3A {
        matrix3: m.matrix3,
        translation: Vec3A::from(position),
    }
}

/// Replaces the rotation while keeping the current per-axis scale.
#[must_use]
pub fn with_rotation(m: &Affine3A, rotation: Quat) -> Affine3A {
    let scale = scale_of(m);
    let basis = Mat3::from_quat(rotation.normalize()) * Mat3::from_diagonal(scale);
    Affine3A::from_mat3_translation(basis, position_of(m))
}

/// Replaces the per-axis scale while keeping the current rotation.
///
/// Each column is divided by its old length and multiplied by the new one. A
/// collapsed column takes its direction from the extracted rotation instead.
#[must_use]
pub fn with_scale(m: &Affine3A, scale: Vec3) -> Affine3A {
    let old = [m.matrix3.x_axis, m.matrix3.y_axis, m.matrix3.z_axis].map(Vec3::from);
    let mut fallback: Option<Mat3> = None;
    let mut cols = [Vec3::ZERO; 3];
    for i in 0..3 {
        let len = old[i].length();
        cols[i] = if len > SCALE_EPSILON {
            old[i] / len * scale[i]
        } else {
            let rot = *fallback.get_or_insert_with(|| Mat3::from_quat(rotation_of(m)));
            rot.col(i) * scale[i]
        };
    }
    Affine3A::from_mat3_translation(Mat3::from_cols(cols[0], cols[1], cols[2]), position_of(m))
}

/// Builds a rotation that looks from `eye` toward `target` (-Z forward).
///
/// Returns `None` when `target` coincides with `eye` or the view direction is
/// parallel to `up`.
#[must_use]
pub fn look_rotation(eye: Vec3, target: Vec3, up: Vec3) -> Option<Quat> {
    let forward = (target - eye).normalize_or_zero();
    if forward == Vec3::ZERO || forward.cross(up).length_squared() < 1e-4 {
        return None;
    }
    let right = forward.cross(up).normalize();
    let new_up = right.cross(forward).normalize();
    Some(Quat::from_mat3(&Mat3::from_cols(right, new_up, -forward)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn vec3_approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn reconcile_root_copies_authoritative_side() {
        let t = Transform::new();
        let m = Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0));
        t.write_local(m);
        t.reconcile(None);
        assert_eq!(t.cached_global(), m);
        assert!(!t.needs_reconcile());
    }

    #[test]
    fn reconcile_without_dirty_flags_is_noop() {
        let t = Transform::new();
        t.reconcile(Some(&Affine3A::from_translation(Vec3::X)));
        assert_eq!(t.cached_global(), Affine3A::IDENTITY);
    }

    #[test]
    fn rotation_write_keeps_scale() {
        let m = Affine3A::from_scale(Vec3::new(2.0, 1.0, 3.0));
        let rotated = with_rotation(&m, Quat::from_rotation_y(FRAC_PI_2));
        assert!(vec3_approx(scale_of(&rotated), Vec3::new(2.0, 1.0, 3.0)));
    }

    #[test]
    fn scale_write_keeps_rotation() {
        let q = Quat::from_rotation_x(0.6);
        let m = Affine3A::from_quat(q);
        let scaled = with_scale(&m, Vec3::new(4.0, 0.5, 2.0));
        assert!(rotation_of(&scaled).angle_between(q) < 1e-4);
        assert!(vec3_approx(scale_of(&scaled), Vec3::new(4.0, 0.5, 2.0)));
    }

    #[test]
    fn scale_write_recovers_collapsed_axis() {
        let m = Affine3A::from_scale(Vec3::new(1.0, 0.0, 1.0));
        let scaled = with_scale(&m, Vec3::ONE);
        assert!(vec3_approx(scale_of(&scaled), Vec3::ONE));
    }

    #[test]
    fn polar_decomposition_strips_shear() {
        let q = Quat::from_rotation_z(0.4);
        let shear = Mat3::from_cols(Vec3::X, Vec3::new(0.05, 1.0, 0.0), Vec3::Z);
        let m = Affine3A::from_mat3(Mat3::from_quat(q) * shear);
        let r = rotation_of(&m);
        assert!(r.angle_between(q) < 0.05);
        assert!((r.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn look_rotation_rejects_degenerate_input() {
        assert!(look_rotation(Vec3::ZERO, Vec3::ZERO, Vec3::Y).is_none());
        assert!(look_rotation(Vec3::ZERO, Vec3::Y, Vec3::Y).is_none());
    }
}
