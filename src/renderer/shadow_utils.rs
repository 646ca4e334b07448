//! Shadow Utilities
//!
//! Pure math for shadow mapping, kept apart from the passes so it can be
//! tested on its own.
//!
//! - Cascade split computation (Practical Split Scheme)
//! - Frustum slice corners in world space
//! - Orthographic VP matrices fitted to cascade slices
//! - Perspective VP matrices for spot lights and point-light cube faces

use glam::{Mat4, Vec3};

use crate::scene::camera::{ProjectionType, RenderCamera};
use crate::scene::light::MAX_CASCADES;

/// Near plane of spot and point shadow projections.
pub const SHADOW_NEAR: f32 = 0.1;

/// Look directions and up vectors of the six cube faces, in the
/// `+X, -X, +Y, -Y, +Z, -Z` layer order.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

// ============================================================================
// Cascade Split Computation
// ============================================================================

/// Computes cascade split distances using the Practical Split Scheme.
///
/// `lambda` blends between uniform (`0.0`) and logarithmic (`1.0`)
/// distribution. Entry `i` is the view-space far distance of cascade `i`;
/// entries past `cascade_count` stay zero.
#[must_use]
pub fn compute_cascade_splits(
    cascade_count: u32,
    near: f32,
    far: f32,
    lambda: f32,
) -> [f32; MAX_CASCADES as usize] {
    let mut splits = [0.0f32; MAX_CASCADES as usize];
    let n = cascade_count.clamp(1, MAX_CASCADES) as usize;

    for (i, split) in splits.iter_mut().enumerate().take(n) {
        let p = (i + 1) as f32 / n as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        *split = lambda * log_split + (1.0 - lambda) * uni_split;
    }
    splits[n - 1] = far;

    splits
}

// ============================================================================
// Frustum Corners in World Space
// ============================================================================

/// The 8 corners of the camera volume between view distances `slice_near`
/// and `slice_far`, in world space. Near face first, counter-clockwise from
/// bottom-left.
#[must_use]
pub fn compute_frustum_corners_world(
    camera: &RenderCamera,
    slice_near: f32,
    slice_far: f32,
) -> [Vec3; 8] {
    let (w_near, h_near, w_far, h_far) = match camera.projection_type {
        ProjectionType::Perspective => {
            let tan_half_fov = (camera.fov * 0.5).tan();
            let h_near = tan_half_fov * slice_near;
            let h_far = tan_half_fov * slice_far;
            (h_near * camera.aspect, h_near, h_far * camera.aspect, h_far)
        }
        ProjectionType::Orthographic => {
            let h = camera.ortho_size;
            let w = h * camera.aspect;
            (w, h, w, h)
        }
    };

    // RH view space: -Z is forward
    let corners_view = [
        Vec3::new(-w_near, -h_near, -slice_near),
        Vec3::new(w_near, -h_near, -slice_near),
        Vec3::new(w_near, h_near, -slice_near),
        Vec3::new(-w_near, h_near, -slice_near),
        Vec3::new(-w_far, -h_far, -slice_far),
        Vec3::new(w_far, -h_far, -slice_far),
        Vec3::new(w_far, h_far, -slice_far),
        Vec3::new(-w_far, h_far, -slice_far),
    ];

    corners_view.map(|c| camera.world.transform_point3(c))
}

fn safe_direction(direction: Vec3) -> Vec3 {
    if direction.length_squared() > 1e-6 {
        direction.normalize()
    } else {
        Vec3::NEG_Z
    }
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
}

// ============================================================================
// Directional: Cascade VP Matrix
// ============================================================================

/// Builds an orthographic VP matrix enclosing one cascade slice.
///
/// The slice corners are bounded in light space. The depth range is then
/// pushed `padding_front` toward the light, so casters between the light and
/// the slice are kept, and `padding_back` away from it.
#[must_use]
pub fn build_cascade_vp(
    light_direction: Vec3,
    frustum_corners: &[Vec3; 8],
    padding_back: f32,
    padding_front: f32,
) -> Mat4 {
    let dir = safe_direction(light_direction);
    let center = frustum_corners.iter().copied().sum::<Vec3>() / 8.0;
    let light_view = Mat4::look_at_rh(center - dir, center, up_for(dir));

    let mut ls_min = Vec3::splat(f32::MAX);
    let mut ls_max = Vec3::splat(f32::MIN);
    for c in frustum_corners {
        let ls = light_view.transform_point3(*c);
        ls_min = ls_min.min(ls);
        ls_max = ls_max.max(ls);
    }

    // RH light view: larger z is closer to the light.
    ls_max.z += padding_front.max(0.0);
    ls_min.z -= padding_back.max(0.0);

    // glam takes near/far as positive distances along -Z.
    let proj = Mat4::orthographic_rh(ls_min.x, ls_max.x, ls_min.y, ls_max.y, -ls_max.z, -ls_min.z);

    proj * light_view
}

/// VP matrices for every cascade of a directional light.
///
/// `shadow_distance` is clamped to the camera far plane.
#[must_use]
pub fn build_directional_vps(
    light_direction: Vec3,
    camera: &RenderCamera,
    cascade_count: u32,
    lambda: f32,
    shadow_distance: f32,
    padding_back: f32,
    padding_front: f32,
) -> Vec<Mat4> {
    let count = cascade_count.clamp(1, MAX_CASCADES);
    let near = camera.near.max(1e-3);
    let far = shadow_distance.min(camera.far).max(near + 1e-3);
    let splits = compute_cascade_splits(count, near, far, lambda);

    let mut prev = near;
    splits[..count as usize]
        .iter()
        .map(|&split| {
            let corners = compute_frustum_corners_world(camera, prev, split);
            prev = split;
            build_cascade_vp(light_direction, &corners, padding_back, padding_front)
        })
        .collect()
}

// ============================================================================
// Spot and Point VP Matrices
// ============================================================================

/// Perspective VP from the light, covering the full cone angle (degrees).
#[must_use]
pub fn build_spot_vp(position: Vec3, direction: Vec3, cone_angle_deg: f32, range: f32) -> Mat4 {
    let dir = safe_direction(direction);
    let view = Mat4::look_at_rh(position, position + dir, up_for(dir));
    let fov = cone_angle_deg
        .to_radians()
        .clamp(0.1, std::f32::consts::PI - 0.01);
    let proj = Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR, range.max(SHADOW_NEAR + 1.0));
    proj * view
}

/// Six 90° perspective VPs, one per cube face, in [`CUBE_FACES`] order.
#[must_use]
pub fn build_point_vps(position: Vec3, range: f32) -> [Mat4; 6] {
    let proj = Mat4::perspective_rh(
        std::f32::consts::FRAC_PI_2,
        1.0,
        SHADOW_NEAR,
        range.max(SHADOW_NEAR + 1.0),
    );
    CUBE_FACES.map(|(dir, up)| proj * Mat4::look_at_rh(position, position + dir, up))
}
