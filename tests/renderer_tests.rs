//! Renderer Tests
//!
//! Frames are drawn against the recording device and checked through its
//! command log.
//!
//! Tests for:
//! - Pass sequence and per-pass draw counts
//! - Directional cascades, point and spot slots in the shadow atlas
//! - Light block shadow indices, including atlas overflow
//! - Culling (far plane ignored)
//! - Post-processing ping-pong copies
//! - Skybox, patch and prepass-skipping programs
//! - Frames that cannot be drawn

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Affine3A, Quat, Vec3};

use ember::errors::EngineError;
use ember::renderer::passes::{
    COLOR_GROUP, DEPTH_PREPASS_GROUP, POST_PROCESSING_GROUP, PRESENT_GROUP, SHADOWS_GROUP,
    SHADOW_SLOT_GROUP, SKYBOX_GROUP,
};
use ember::renderer::{
    ClearFlags, CommandLog, DeviceCommand, DrawItem, FrameInput, RecordingDevice, Renderer,
    RendererSettings, SceneGraphics, Skybox,
};
use ember::resources::uniforms::{FrameUniforms, LightBlock, UniformSlot};
use ember::resources::{
    BoundingBox, DrawMode, Material, Mesh, ProgramHandle, ShaderFlags, ShaderProgram, SubMesh,
    TextureHandle, VertexArrayHandle, MAX_SHADOW_SLOTS,
};
use ember::scene::{
    Camera, Light, LightSystem, MeshRenderer, NodeHandle, ObjectKey, PostProcessingSystem, Scene,
    ShaderEffect,
};
use ember::utils::FrameTime;

// ============================================================================
// Fixtures
// ============================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn settings() -> RendererSettings {
    RendererSettings {
        shadow_atlas_size: 1024,
        viewport: (320, 240),
        ..Default::default()
    }
}

fn program(id: u32, flags: ShaderFlags) -> Rc<ShaderProgram> {
    Rc::new(ShaderProgram::new(format!("program-{id}"), ProgramHandle(id), flags))
}

fn unit_cube() -> Rc<Mesh> {
    Rc::new(Mesh::new(
        "Cube",
        vec![
            SubMesh::new(
                VertexArrayHandle(7),
                24,
                BoundingBox::from_center_extents(Vec3::ZERO, Vec3::ONE),
            )
            .indexed(36),
        ],
    ))
}

fn cube_renderer(flags: ShaderFlags) -> MeshRenderer {
    MeshRenderer::with_material(unit_cube(), Material::new("Default", program(1, flags)))
}

struct Stage {
    scene: Scene,
    graphics: Rc<RefCell<SceneGraphics>>,
    log: CommandLog,
}

impl Stage {
    /// Scene with lights, post processing and graphics, plus a main camera
    /// at (0, 0, 10) looking down -Z.
    fn new(settings: RendererSettings) -> Self {
        init_logger();
        let (device, log) = RecordingDevice::new();
        let renderer = Renderer::new(Box::new(device), settings)
            .expect("renderer")
            .with_present_program(program(90, ShaderFlags::empty()));

        let mut scene = Scene::new();
        scene.add_component::<LightSystem>();
        scene.add_component::<PostProcessingSystem>();
        let graphics = scene.add_component_with(|| SceneGraphics::new(renderer));

        let cam = scene.create_node(None, "Camera");
        scene.set_position(cam, Vec3::new(0.0, 0.0, 10.0));
        let key = scene
            .add_object(cam, Camera::new_perspective(60.0, 4.0 / 3.0, 0.1, 100.0))
            .expect("camera");
        scene.set_main_camera(key).expect("main camera");

        log.clear();
        Self { scene, graphics, log }
    }

    fn add_cube(&mut self, position: Vec3, flags: ShaderFlags) -> NodeHandle {
        let node = self.scene.create_node(None, "Cube");
        self.scene.set_position(node, position);
        self.scene
            .add_object(node, cube_renderer(flags))
            .expect("mesh renderer");
        node
    }

    fn add_light(&mut self, light: Light, position: Vec3, rotation: Quat) -> ObjectKey {
        let node = self.scene.create_node(None, "Light");
        self.scene.set_position(node, position);
        self.scene.set_rotation(node, rotation);
        self.scene.add_object(node, light).expect("light")
    }

    fn frame(&mut self) {
        self.scene.update(1.0 / 60.0);
        self.scene.render();
    }

    fn light_block(&self) -> LightBlock {
        let bytes = self.log.last_upload(UniformSlot::Lights).expect("light upload");
        bytemuck::pod_read_unaligned(&bytes)
    }
}

fn looking_down() -> Quat {
    Quat::from_rotation_x(-1.0)
}

fn frame_uploads(commands: &[DeviceCommand]) -> Vec<FrameUniforms> {
    commands
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::UploadUniforms {
                slot: UniformSlot::Frame,
                bytes,
            } => Some(bytemuck::pod_read_unaligned::<FrameUniforms>(bytes)),
            _ => None,
        })
        .collect()
}

fn headless_renderer(settings: RendererSettings) -> (Renderer, CommandLog) {
    init_logger();
    let (device, log) = RecordingDevice::new();
    let renderer = Renderer::new(Box::new(device), settings).expect("renderer");
    log.clear();
    (renderer, log)
}

fn draw_at(position: Vec3) -> DrawItem {
    let flags = ShaderFlags::default();
    DrawItem {
        object: ObjectKey::default(),
        node: NodeHandle::default(),
        model: Affine3A::from_translation(position),
        mesh: unit_cube(),
        materials: vec![Material::new("Default", program(1, flags))].into(),
    }
}

// ============================================================================
// Full frame through the scene
// ============================================================================

#[test]
fn directional_shadow_frame() {
    let mut stage = Stage::new(settings());
    stage.add_light(
        Light::directional(Vec3::ONE, 1.0).with_shadows(true).with_cascades(4),
        Vec3::new(0.0, 10.0, 0.0),
        looking_down(),
    );
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    stage.frame();

    assert_eq!(stage.log.mesh_draws_in(DEPTH_PREPASS_GROUP), 1);
    assert_eq!(stage.log.mesh_draws_in(COLOR_GROUP), 1);

    let slots = stage.log.groups(SHADOW_SLOT_GROUP);
    assert_eq!(slots.len(), 4);
    let vps: Vec<_> = slots
        .iter()
        .map(|slot| frame_uploads(slot).first().expect("slot frame upload").view_projection)
        .collect();
    for (i, a) in vps.iter().enumerate() {
        for b in &vps[i + 1..] {
            assert_ne!(a, b, "cascades share a view-projection");
        }
    }

    let block = stage.light_block();
    assert_eq!(block.light_count, 1);
    assert!(block.lights[0].shadow_atlas_index >= 0);
    assert_eq!(block.lights[0].shadow_slot_count, 4);

    let stats = stage.graphics.borrow().last_stats().expect("frame drawn");
    assert_eq!(stats.shadow_slots, 4);
    assert_eq!(stats.lights, 1);
    assert_eq!(stats.culled, 0);
}

#[test]
fn passes_run_in_fixed_order() {
    let mut stage = Stage::new(settings());
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    let fx = stage.scene.create_node(None, "Effects");
    stage
        .scene
        .add_object(fx, ShaderEffect::new("Grade", program(9, ShaderFlags::empty())))
        .expect("effect");
    stage.frame();

    let passes = [
        DEPTH_PREPASS_GROUP,
        SHADOWS_GROUP,
        COLOR_GROUP,
        POST_PROCESSING_GROUP,
        PRESENT_GROUP,
    ];
    let order: Vec<String> = stage
        .log
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::PushDebugGroup(label) if passes.contains(&label.as_str()) => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(order, passes);

    let present = stage.log.group(PRESENT_GROUP);
    assert!(present.contains(&DeviceCommand::BindFramebuffer(None)));
    assert!(present.contains(&DeviceCommand::BindProgram(ProgramHandle(90))));
    assert_eq!(present.last(), Some(&DeviceCommand::DrawFullscreenQuad));
}

#[test]
fn present_without_a_program_draws_nothing() {
    let (mut renderer, log) = headless_renderer(settings());
    let camera = Camera::new_perspective(60.0, 4.0 / 3.0, 0.1, 50.0).extract(&Affine3A::IDENTITY);
    let input = FrameInput {
        camera: &camera,
        draws: &[],
        lights: &[],
        effects: &[],
        skybox: None,
        time: FrameTime::default(),
    };

    renderer.render(&input).expect("frame");
    let present = log.group(PRESENT_GROUP);
    assert!(!present.iter().any(DeviceCommand::is_draw));

    renderer.set_present_program(Some(program(90, ShaderFlags::empty())));
    log.clear();
    renderer.render(&input).expect("frame");
    assert_eq!(log.group(PRESENT_GROUP).last(), Some(&DeviceCommand::DrawFullscreenQuad));
}

#[test]
fn point_and_spot_fill_seven_slots() {
    let mut stage = Stage::new(settings());
    stage.add_light(
        Light::point(Vec3::ONE, 1.0, 20.0).with_shadows(true),
        Vec3::new(0.0, 4.0, 0.0),
        Quat::IDENTITY,
    );
    stage.add_light(
        Light::spot(Vec3::ONE, 1.0, 20.0, 60.0).with_shadows(true),
        Vec3::new(0.0, 6.0, 0.0),
        looking_down(),
    );
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    stage.frame();

    assert_eq!(stage.log.groups(SHADOW_SLOT_GROUP).len(), 7);
    let block = stage.light_block();
    assert_eq!(block.light_count, 2);
    assert_eq!((block.lights[0].shadow_atlas_index, block.lights[0].shadow_slot_count), (0, 6));
    assert_eq!((block.lights[1].shadow_atlas_index, block.lights[1].shadow_slot_count), (6, 1));
}

#[test]
fn light_without_room_in_atlas_has_no_shadow_index() {
    let mut stage = Stage::new(RendererSettings {
        max_shadow_slots: 6,
        ..settings()
    });
    stage.add_light(
        Light::directional(Vec3::ONE, 1.0).with_shadows(true).with_cascades(4),
        Vec3::ZERO,
        looking_down(),
    );
    stage.add_light(
        Light::point(Vec3::ONE, 1.0, 10.0).with_shadows(true),
        Vec3::new(0.0, 3.0, 0.0),
        Quat::IDENTITY,
    );
    stage.frame();

    let block = stage.light_block();
    assert_eq!(block.light_count, 2);
    assert_eq!(block.lights[0].shadow_atlas_index, 0);
    assert_eq!(block.lights[1].shadow_atlas_index, -1);
    assert_eq!(block.lights[1].shadow_slot_count, 0);

    let stats = stage.graphics.borrow().last_stats().expect("frame drawn");
    assert_eq!(stats.dropped_shadow_lights, 1);
    assert_eq!(stats.shadow_slots, 4);
}

#[test]
fn lights_without_shadows_take_no_slots() {
    let mut stage = Stage::new(settings());
    stage.add_light(Light::point(Vec3::ONE, 1.0, 10.0), Vec3::Y, Quat::IDENTITY);
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    stage.frame();

    assert!(stage.log.groups(SHADOW_SLOT_GROUP).is_empty());
    assert_eq!(stage.light_block().lights[0].shadow_atlas_index, -1);
}

#[test]
fn post_effects_get_a_fresh_copy_each() {
    let mut stage = Stage::new(settings());
    let fx = stage.scene.create_node(None, "Effects");
    stage
        .scene
        .add_object(fx, ShaderEffect::new("Bloom", program(20, ShaderFlags::empty())))
        .expect("bloom");
    stage
        .scene
        .add_object(fx, ShaderEffect::new("Tonemap", program(21, ShaderFlags::empty())))
        .expect("tonemap");
    stage.frame();

    let sequence: Vec<String> = stage
        .log
        .group(POST_PROCESSING_GROUP)
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::CopyTexture { .. } => Some("copy".to_owned()),
            DeviceCommand::PushDebugGroup(label) => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(sequence, vec!["copy", "Bloom", "copy", "Tonemap"]);

    let stats = stage.graphics.borrow().last_stats().expect("frame drawn");
    assert_eq!(stats.post_effects, 2);
}

#[test]
fn disabled_effect_is_skipped() {
    let mut stage = Stage::new(settings());
    let fx = stage.scene.create_node(None, "Effects");
    let key = stage
        .scene
        .add_object(fx, ShaderEffect::new("Bloom", program(20, ShaderFlags::empty())))
        .expect("bloom");
    stage.scene.set_object_enabled(key, false).expect("toggle");
    stage.frame();

    assert!(stage.log.groups(POST_PROCESSING_GROUP).is_empty());
}

#[test]
fn skybox_replaces_the_colour_clear() {
    let mut stage = Stage::new(settings());
    stage.graphics.borrow_mut().set_skybox(Some(Skybox {
        program: program(30, ShaderFlags::empty()),
        cubemap: TextureHandle(99),
        mesh: unit_cube(),
    }));
    stage.frame();

    let color = stage.log.group(COLOR_GROUP);
    assert!(!color.iter().any(|c| matches!(
        c,
        DeviceCommand::Clear { flags, .. } if flags.contains(ClearFlags::COLOR)
    )));
    assert_eq!(stage.log.mesh_draws_in(SKYBOX_GROUP), 1);
    assert!(stage.log.group(SKYBOX_GROUP).contains(&DeviceCommand::BindTexture {
        unit: 0,
        texture: TextureHandle(99),
    }));
}

#[test]
fn colour_is_cleared_without_skybox() {
    let mut stage = Stage::new(settings());
    stage.frame();
    assert!(stage.log.group(COLOR_GROUP).iter().any(|c| matches!(
        c,
        DeviceCommand::Clear { flags, .. } if flags.contains(ClearFlags::COLOR)
    )));
}

#[test]
fn patch_programs_draw_patches() {
    let mut stage = Stage::new(settings());
    stage.add_cube(Vec3::ZERO, ShaderFlags::CASTS_SHADOWS | ShaderFlags::USES_PATCHES);
    stage.frame();

    let modes: Vec<_> = stage
        .log
        .group(COLOR_GROUP)
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::Draw { mode, count, indexed, .. } => Some((mode, count, indexed)),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![(DrawMode::Patches, 36, true)]);
}

#[test]
fn prepass_skips_programs_that_opt_out() {
    let mut stage = Stage::new(settings());
    stage.add_cube(Vec3::ZERO, ShaderFlags::IGNORES_DEPTH_PREPASS);
    stage.add_cube(Vec3::new(2.0, 0.0, 0.0), ShaderFlags::default());
    stage.frame();

    assert_eq!(stage.log.mesh_draws_in(DEPTH_PREPASS_GROUP), 1);
    assert_eq!(stage.log.mesh_draws_in(COLOR_GROUP), 2);
}

#[test]
fn disabled_mesh_node_is_not_drawn() {
    let mut stage = Stage::new(settings());
    let node = stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    stage.scene.set_enabled(node, false);
    stage.frame();

    assert_eq!(stage.log.mesh_draws_in(COLOR_GROUP), 0);
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn objects_past_far_plane_are_still_drawn() -> anyhow::Result<()> {
    let (mut renderer, log) = headless_renderer(settings());
    let camera = Camera::new_perspective(60.0, 4.0 / 3.0, 0.1, 50.0).extract(&Affine3A::IDENTITY);
    let draws = [draw_at(Vec3::new(0.0, 0.0, -200.0))];

    let stats = renderer.render(&FrameInput {
        camera: &camera,
        draws: &draws,
        lights: &[],
        effects: &[],
        skybox: None,
        time: FrameTime::default(),
    })?;

    assert_eq!(stats.culled, 0);
    assert_eq!(stats.color_draws, 1);
    assert_eq!(log.mesh_draws_in(COLOR_GROUP), 1);
    Ok(())
}

#[test]
fn objects_outside_side_planes_are_culled() {
    let (mut renderer, log) = headless_renderer(settings());
    let camera = Camera::new_perspective(60.0, 4.0 / 3.0, 0.1, 50.0).extract(&Affine3A::IDENTITY);
    let draws = [draw_at(Vec3::new(-1000.0, 0.0, -200.0)), draw_at(Vec3::new(0.0, 0.0, -5.0))];

    let stats = renderer
        .render(&FrameInput {
            camera: &camera,
            draws: &draws,
            lights: &[],
            effects: &[],
            skybox: None,
            time: FrameTime::default(),
        })
        .expect("frame");

    assert_eq!(stats.culled, 1);
    assert_eq!(stats.prepass_draws, 1);
    assert_eq!(log.mesh_draws_in(DEPTH_PREPASS_GROUP), 1);
    assert_eq!(log.mesh_draws_in(COLOR_GROUP), 1);
}

// ============================================================================
// Frames that cannot be drawn
// ============================================================================

#[test]
fn missing_main_camera_skips_the_frame() {
    let mut stage = Stage::new(settings());
    stage.scene.clear_main_camera();
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    stage.frame();

    assert!(stage.graphics.borrow().last_stats().is_none());
    assert!(stage.log.groups(COLOR_GROUP).is_empty());
}

#[test]
fn inactive_main_camera_skips_the_frame() {
    let mut stage = Stage::new(settings());
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    let camera = stage.scene.main_camera().expect("main camera");
    let camera_node = stage.scene.object_node(camera).expect("camera node");

    stage.scene.set_enabled(camera_node, false);
    stage.frame();
    assert!(stage.graphics.borrow().last_stats().is_none());
    assert!(stage.log.groups(COLOR_GROUP).is_empty());

    stage.scene.set_enabled(camera_node, true);
    stage.scene.set_object_enabled(camera, false).expect("toggle");
    stage.frame();
    assert!(stage.graphics.borrow().last_stats().is_none());

    stage.scene.set_object_enabled(camera, true).expect("toggle");
    stage.frame();
    assert!(stage.graphics.borrow().last_stats().is_some());
}

#[test]
fn zero_viewport_fails_without_touching_the_device() {
    let (mut renderer, log) = headless_renderer(settings());
    renderer.resize(0, 0).expect("resize to zero");
    assert_eq!(renderer.color_target(), None);
    log.clear();

    let camera = Camera::new_perspective(60.0, 1.0, 0.1, 50.0).extract(&Affine3A::IDENTITY);
    let result = renderer.render(&FrameInput {
        camera: &camera,
        draws: &[],
        lights: &[],
        effects: &[],
        skybox: None,
        time: FrameTime::default(),
    });

    assert!(matches!(
        result,
        Err(EngineError::InvalidViewport { width: 0, height: 0 })
    ));
    assert!(log.is_empty());

    renderer.resize(64, 64).expect("resize back");
    assert!(renderer.color_target().is_some());
}

#[test]
fn zero_viewport_through_the_scene_is_skipped() {
    let mut stage = Stage::new(settings());
    stage
        .graphics
        .borrow_mut()
        .renderer_mut()
        .resize(0, 0)
        .expect("resize");
    stage.log.clear();
    stage.frame();

    assert!(stage.graphics.borrow().last_stats().is_none());
    assert!(stage.log.is_empty());
}

#[test]
fn device_failure_surfaces_from_new() {
    let (device, _log) = RecordingDevice::failing();
    let result = Renderer::new(Box::new(device), settings());
    assert!(matches!(result, Err(EngineError::Device(_))));
}

#[test]
fn invalid_settings_are_rejected() {
    let (device, _log) = RecordingDevice::new();
    let bad = RendererSettings {
        shadow_atlas_size: 1000,
        ..settings()
    };
    assert!(matches!(
        Renderer::new(Box::new(device), bad),
        Err(EngineError::InvalidSettings(_))
    ));

    // The shadow block holds 64 regions; more slots cannot be uploaded.
    let (device, _log) = RecordingDevice::new();
    let oversized = RendererSettings {
        max_shadow_slots: 128,
        ..settings()
    };
    assert!(matches!(
        Renderer::new(Box::new(device), oversized),
        Err(EngineError::InvalidSettings(_))
    ));
}

#[test]
fn shadow_indices_stay_inside_the_uploaded_block() {
    let mut stage = Stage::new(RendererSettings {
        shadow_atlas_size: 4096,
        ..settings()
    });
    stage.add_cube(Vec3::ZERO, ShaderFlags::default());
    for i in 0..11 {
        stage.add_light(
            Light::point(Vec3::ONE, 1.0, 20.0).with_shadows(true),
            Vec3::new(i as f32, 3.0, 0.0),
            Quat::IDENTITY,
        );
    }
    stage.frame();

    let block = stage.light_block();
    let regions = stage.graphics.borrow().renderer().shadow_block().region_count as usize;
    assert!(regions <= MAX_SHADOW_SLOTS);
    for light in &block.lights[..block.light_count as usize] {
        if light.shadow_atlas_index >= 0 {
            let end = light.shadow_atlas_index as usize + light.shadow_slot_count as usize;
            assert!(end <= regions, "light reaches region {end} of {regions}");
        }
    }
    assert_eq!(stage.log.groups(SHADOW_SLOT_GROUP).len(), regions);
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn dropping_the_renderer_frees_its_targets() {
    let (renderer, log) = headless_renderer(settings());
    drop(renderer);

    let destroyed = log
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DestroyTexture(_)))
        .count();
    // Colour, depth, ping-pong and the shadow atlas.
    assert_eq!(destroyed, 4);
}

#[test]
fn failed_resize_releases_partial_targets() {
    // Atlas texture and framebuffer, then the three frame textures and the
    // frame framebuffer: six creations for `new`, one more for the colour
    // target of the resize.
    let (device, log) = RecordingDevice::failing_after(7);
    let mut renderer = Renderer::new(Box::new(device), settings()).expect("renderer");

    let result = renderer.resize(128, 128);
    assert!(matches!(result, Err(EngineError::Device(_))));
    assert!(renderer.color_target().is_none());

    drop(renderer);
    assert_eq!(log.live_textures(), 0);
}

#[test]
fn failed_atlas_framebuffer_releases_the_atlas_texture() {
    let (device, log) = RecordingDevice::failing_after(1);
    assert!(matches!(
        Renderer::new(Box::new(device), settings()),
        Err(EngineError::Device(_))
    ));
    assert_eq!(log.live_textures(), 0);
}

#[test]
fn changing_atlas_size_recreates_the_atlas() -> anyhow::Result<()> {
    let (mut renderer, log) = headless_renderer(settings());
    let old = renderer.shadow_atlas();

    renderer.set_settings(RendererSettings {
        shadow_atlas_size: 2048,
        ..settings()
    })?;

    assert_ne!(renderer.shadow_atlas(), old);
    assert!(log.commands().contains(&DeviceCommand::DestroyTexture(old)));
    Ok(())
}
