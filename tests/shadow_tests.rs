//! Shadow Algorithm Tests
//!
//! Tests for:
//! - Atlas tile divisor and row-major packing
//! - Region disjointness and normalized UV ranges
//! - Capacity limits (whole-light drops)
//! - CSM cascade split computation (Practical Split Scheme)
//! - Cascade, spot and point VP matrix construction

use glam::{Affine3A, Mat4, Quat, Vec3};

use ember::renderer::shadow_atlas::{allocate, tile_divisor, ShadowRequest};
use ember::renderer::shadow_utils::{
    build_cascade_vp, build_directional_vps, build_point_vps, build_spot_vp,
    compute_cascade_splits, compute_frustum_corners_world, CUBE_FACES,
};
use ember::resources::uniforms::MAX_SHADOW_SLOTS;
use ember::scene::camera::{Camera, RenderCamera};

const EPSILON: f32 = 1e-4;

fn request(light_index: usize, slots: usize) -> ShadowRequest {
    ShadowRequest::new(
        light_index,
        (0..slots).map(|i| Mat4::from_translation(Vec3::new(light_index as f32, i as f32, 0.0))),
    )
}

fn camera_at(position: Vec3) -> RenderCamera {
    Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0)
        .extract(&Affine3A::from_translation(position))
}

fn inside_clip(ndc: Vec3) -> bool {
    ndc.x.abs() <= 1.0 + EPSILON && ndc.y.abs() <= 1.0 + EPSILON && ndc.z >= -EPSILON && ndc.z <= 1.0 + EPSILON
}

// ============================================================================
// Atlas Divisor
// ============================================================================

#[test]
fn divisor_is_minimal_power_of_two_for_every_count() {
    for slots in 1..=64usize {
        let d = tile_divisor(slots) as usize;
        assert!(d.is_power_of_two());
        assert!(d * d >= slots, "{slots} slots do not fit a {d}x{d} grid");
        if d > 1 {
            let half = d / 2;
            assert!(half * half < slots, "{d} is not minimal for {slots} slots");
        }
    }
}

// ============================================================================
// Atlas Packing
// ============================================================================

#[test]
fn point_and_spot_share_a_four_by_four_grid() {
    let alloc = allocate(&[request(0, 6), request(1, 1)], 4096, 64);

    assert_eq!(alloc.slot_count(), 7);
    assert_eq!(alloc.divisor, 4);
    assert_eq!(alloc.tile_size, 1024);

    let spot = alloc.run_for(1).copied().expect("spot run");
    assert_eq!((spot.first_slot, spot.slot_count), (6, 1));
    // Slot 6 is the third tile of the second row.
    let rect = alloc.regions[6].rect;
    assert_eq!((rect.x, rect.y), (2048, 1024));
}

#[test]
fn regions_never_overlap() {
    let alloc = allocate(
        &[request(0, 4), request(1, 6), request(2, 1), request(3, 3), request(4, 6)],
        2048,
        64,
    );
    assert_eq!(alloc.slot_count(), 20);
    for (i, a) in alloc.regions.iter().enumerate() {
        for b in &alloc.regions[i + 1..] {
            assert!(!a.overlaps(b), "{:?} overlaps {:?}", a.rect, b.rect);
        }
    }
}

#[test]
fn region_uvs_are_normalized_and_match_pixels() {
    let size = 1000;
    let alloc = allocate(&[request(0, 6), request(1, 4)], size, 64);
    for region in &alloc.regions {
        for v in [region.uv_start, region.uv_end] {
            assert!((0.0..=1.0).contains(&v.x) && (0.0..=1.0).contains(&v.y));
        }
        assert!(region.uv_start.x < region.uv_end.x);
        assert!((region.uv_start.x * size as f32 - region.rect.x as f32).abs() < 1e-2);
        assert!((region.uv_end.y * size as f32 - (region.rect.y + region.rect.height) as f32).abs() < 1e-2);
    }
}

#[test]
fn faces_keep_their_view_projection() {
    let alloc = allocate(&[request(2, 6)], 1024, 64);
    for (face, region) in alloc.regions.iter().enumerate() {
        assert_eq!(region.light_index, 2);
        assert_eq!(region.face as usize, face);
        assert_eq!(region.view_projection, Mat4::from_translation(Vec3::new(2.0, face as f32, 0.0)));
    }
}

#[test]
fn lights_past_capacity_are_dropped_whole() {
    // 64 slots: ten point lights need 60, the eleventh would need 66.
    let requests: Vec<_> = (0..11).map(|i| request(i, 6)).collect();
    let alloc = allocate(&requests, 4096, 64);

    assert_eq!(alloc.slot_count(), 60);
    assert_eq!(alloc.dropped, 1);
    assert!(alloc.run_for(10).is_none());
    assert!(alloc.regions.iter().all(|r| r.light_index != 10));
}

#[test]
fn slot_cap_never_exceeds_the_shadow_block() {
    let requests: Vec<_> = (0..11).map(|i| request(i, 6)).collect();
    let alloc = allocate(&requests, 4096, 128);

    assert_eq!(alloc.slot_count(), 60);
    assert_eq!(alloc.dropped, 1);
    assert!(alloc.regions.len() <= MAX_SHADOW_SLOTS);
}

#[test]
fn smaller_light_after_a_drop_still_fits() {
    let alloc = allocate(&[request(0, 4), request(1, 6), request(2, 1)], 2048, 6);
    assert_eq!(alloc.dropped, 1);
    assert_eq!(alloc.run_for(2).map(|r| r.first_slot), Some(4));
}

#[test]
fn empty_request_list_allocates_nothing() {
    let alloc = allocate(&[], 2048, 64);
    assert!(alloc.regions.is_empty());
    assert_eq!(alloc.divisor, 1);
    assert_eq!(alloc.dropped, 0);
}

// ============================================================================
// Cascade Splits
// ============================================================================

#[test]
fn single_cascade_covers_everything() {
    let s = compute_cascade_splits(1, 0.5, 80.0, 0.7);
    assert_eq!(s[0], 80.0);
}

#[test]
fn lambda_moves_splits_toward_the_camera() {
    let uniform = compute_cascade_splits(4, 0.1, 100.0, 0.0);
    let log = compute_cascade_splits(4, 0.1, 100.0, 1.0);
    assert!((uniform[0] - 25.075).abs() < 1e-2);
    assert!(log[0] < uniform[0]);
    assert_eq!(log[3], uniform[3]);
}

// ============================================================================
// Directional Shadows
// ============================================================================

#[test]
fn slice_corners_span_requested_distances() {
    let cam = camera_at(Vec3::ZERO);
    let corners = compute_frustum_corners_world(&cam, 2.0, 20.0);
    for c in &corners[..4] {
        assert!((c.z + 2.0).abs() < EPSILON);
    }
    for c in &corners[4..] {
        assert!((c.z + 20.0).abs() < EPSILON);
    }
}

#[test]
fn every_cascade_contains_its_slice() {
    let cam = camera_at(Vec3::new(0.0, 5.0, 10.0));
    let dir = Vec3::new(0.2, -1.0, -0.4);
    let vps = build_directional_vps(dir, &cam, 4, 0.5, 60.0, 10.0, 10.0);
    assert_eq!(vps.len(), 4);

    let splits = compute_cascade_splits(4, cam.near, 60.0, 0.5);
    let mut prev = cam.near;
    for (vp, &split) in vps.iter().zip(&splits) {
        let corners = compute_frustum_corners_world(&cam, prev, split);
        for c in corners {
            assert!(inside_clip(vp.project_point3(c)), "corner {c} escapes cascade");
        }
        prev = split;
    }
}

#[test]
fn cascades_are_distinct() {
    let cam = camera_at(Vec3::ZERO);
    let vps = build_directional_vps(Vec3::NEG_Y, &cam, 3, 0.5, 100.0, 5.0, 5.0);
    assert_eq!(vps.len(), 3);
    assert_ne!(vps[0], vps[1]);
    assert_ne!(vps[1], vps[2]);
}

#[test]
fn shadow_distance_is_clamped_to_camera_far() {
    let cam = camera_at(Vec3::ZERO);
    let far = build_directional_vps(Vec3::NEG_Y, &cam, 1, 0.5, 1000.0, 0.0, 0.0);
    let exact = build_directional_vps(Vec3::NEG_Y, &cam, 1, 0.5, cam.far, 0.0, 0.0);
    assert!(far[0].abs_diff_eq(exact[0], EPSILON));
}

#[test]
fn front_padding_keeps_casters_between_light_and_slice() {
    let cam = camera_at(Vec3::ZERO);
    let corners = compute_frustum_corners_world(&cam, 0.1, 10.0);
    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let caster = center + Vec3::Y * 15.0;

    let tight = build_cascade_vp(Vec3::NEG_Y, &corners, 0.0, 0.0);
    let padded = build_cascade_vp(Vec3::NEG_Y, &corners, 0.0, 20.0);
    assert!(!inside_clip(tight.project_point3(caster)));
    assert!(inside_clip(padded.project_point3(caster)));
}

// ============================================================================
// Spot and Point Shadows
// ============================================================================

#[test]
fn spot_cone_edge_lands_on_clip_border() {
    let pos = Vec3::new(0.0, 4.0, 0.0);
    let vp = build_spot_vp(pos, Vec3::NEG_Y, 90.0, 30.0);
    // Half-angle 45 degrees: one unit down, one unit sideways.
    let ndc = vp.project_point3(pos + Vec3::new(0.0, -1.0, 1.0));
    assert!((ndc.x.abs().max(ndc.y.abs()) - 1.0).abs() < 1e-3);
}

#[test]
fn spot_follows_a_rotated_direction() {
    let dir = Quat::from_rotation_y(0.8) * Vec3::NEG_Z;
    let vp = build_spot_vp(Vec3::ONE, dir, 40.0, 20.0);
    let ndc = vp.project_point3(Vec3::ONE + dir * 10.0);
    assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
}

#[test]
fn each_cube_face_sees_its_own_axis() {
    let pos = Vec3::new(1.0, 2.0, 3.0);
    let vps = build_point_vps(pos, 25.0);
    for (vp, (dir, _)) in vps.iter().zip(CUBE_FACES) {
        let ndc = vp.project_point3(pos + dir * 5.0);
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
