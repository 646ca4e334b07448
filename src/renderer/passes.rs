//! Frame passes.
//!
//! Each pass is wrapped in a device debug group named after it, so captures
//! (and the recording device) can tell the passes apart.

use glam::{Mat4, Vec4};
use log::{trace, warn};

use crate::errors::Result;
use crate::renderer::device::{ClearFlags, DrawCall, GraphicsDevice, Viewport};
use crate::renderer::renderer::{FrameInput, FrameStats, FrameTargets, Renderer};
use crate::renderer::shadow_atlas::{self, ShadowAllocation, ShadowRequest};
use crate::renderer::shadow_utils::{build_directional_vps, build_point_vps, build_spot_vp};
use crate::resources::uniforms::{
    FrameUniforms, LightBlock, ObjectUniforms, ShadowBlock, UniformSlot, MAX_LIGHTS,
};
use crate::resources::{BoundingBox, DrawMode, ShaderProgram, SubMesh};
use crate::scene::camera::{Frustum, RenderCamera};
use crate::scene::light::{LightSnapshot, LightType};
use crate::scene::post_process::PostProcessPass;

pub const DEPTH_PREPASS_GROUP: &str = "DepthPrepass";
pub const SHADOWS_GROUP: &str = "Shadows";
pub const SHADOW_SLOT_GROUP: &str = "ShadowSlot";
pub const COLOR_GROUP: &str = "Color";
pub const SKYBOX_GROUP: &str = "Skybox";
pub const POST_PROCESSING_GROUP: &str = "PostProcessing";
pub const PRESENT_GROUP: &str = "Present";

/// Texture unit of the shadow atlas during the colour pass.
pub const SHADOW_ATLAS_UNIT: u32 = 8;
/// Texture unit of the skybox cubemap.
pub const SKYBOX_UNIT: u32 = 0;
/// Texture unit of the colour target during present.
pub const PRESENT_INPUT_UNIT: u32 = 0;

/// A sub-mesh resolved against its material, with world-space bounds.
struct PreparedDraw<'a> {
    model: Mat4,
    sub_mesh: &'a SubMesh,
    program: &'a ShaderProgram,
    bounds: BoundingBox,
    visible: bool,
}

fn draw_mode(sub_mesh: &SubMesh, program: &ShaderProgram) -> DrawMode {
    if program.uses_patches() {
        DrawMode::Patches
    } else {
        sub_mesh.mode
    }
}

fn submit(device: &mut dyn GraphicsDevice, draw: &PreparedDraw<'_>, view_projection: Mat4) {
    device.bind_program(draw.program.handle());
    let object = ObjectUniforms::new(draw.model, view_projection);
    device.upload_uniforms(UniformSlot::Object, bytemuck::bytes_of(&object));
    device.draw(DrawCall {
        sub_mesh: draw.sub_mesh,
        mode: draw_mode(draw.sub_mesh, draw.program),
    });
}

fn frame_uniforms(camera: &RenderCamera, viewport: Viewport, time: f32) -> FrameUniforms {
    FrameUniforms {
        view: camera.view,
        projection: camera.projection,
        view_projection: camera.view_projection,
        camera_position: camera.position,
        time,
        viewport: Vec4::new(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
        ),
    }
}

impl Renderer {
    pub(crate) fn render_frame(
        &mut self,
        input: &FrameInput<'_>,
        targets: FrameTargets,
    ) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        let viewport = self.viewport();
        let frame = frame_uniforms(input.camera, viewport, input.time.elapsed);

        let draws = prepare_draws(input, &mut stats);
        trace!(
            "Frame {}: {} sub-meshes, {} culled",
            input.time.frame,
            draws.len(),
            stats.culled
        );

        self.depth_prepass(&draws, targets, viewport, &frame, &mut stats);
        self.shadow_pass(input, &draws, &mut stats);
        self.color_pass(input, &draws, targets, viewport, &frame, &mut stats);
        self.post_processing_pass(input, targets, viewport, &frame, &mut stats);
        self.present_pass(targets, viewport);

        Ok(stats)
    }

    // ========================================================================
    // Depth prepass
    // ========================================================================

    fn depth_prepass(
        &mut self,
        draws: &[PreparedDraw<'_>],
        targets: FrameTargets,
        viewport: Viewport,
        frame: &FrameUniforms,
        stats: &mut FrameStats,
    ) {
        let device = self.device.as_mut();
        device.push_debug_group(DEPTH_PREPASS_GROUP);

        device.bind_framebuffer(Some(targets.framebuffer));
        device.set_viewport(viewport);
        device.clear(ClearFlags::DEPTH, wgpu::Color::BLACK, 1.0);
        device.set_cull_mode(Some(wgpu::Face::Back));
        device.set_depth_state(Some(wgpu::CompareFunction::Less), true);
        device.set_color_write(false);
        device.upload_uniforms(UniformSlot::Frame, bytemuck::bytes_of(frame));

        for draw in draws
            .iter()
            .filter(|d| d.visible && !d.program.ignores_depth_prepass())
        {
            submit(device, draw, frame.view_projection);
            stats.prepass_draws += 1;
        }

        device.set_color_write(true);
        device.pop_debug_group();
    }

    // ========================================================================
    // Shadows
    // ========================================================================

    /// Allocates atlas slots, fills the light and shadow blocks, and renders
    /// every slot.
    fn shadow_pass(&mut self, input: &FrameInput<'_>, draws: &[PreparedDraw<'_>], stats: &mut FrameStats) {
        let limit = self.settings.max_lights.min(MAX_LIGHTS);
        if input.lights.len() > limit {
            warn!(
                "{} light(s) past the renderer limit of {limit} were dropped",
                input.lights.len() - limit
            );
        }
        let lights = &input.lights[..input.lights.len().min(limit)];

        let requests = self.shadow_requests(input.camera, lights);
        let allocation = shadow_atlas::allocate(
            &requests,
            self.atlas.size,
            self.settings.max_shadow_slots,
        );

        self.light_block = build_light_block(lights, &allocation);
        self.shadow_block = build_shadow_block(&allocation);
        stats.lights = self.light_block.light_count;
        stats.shadow_slots = allocation.slot_count() as u32;
        stats.dropped_shadow_lights = allocation.dropped as u32;

        let device = self.device.as_mut();
        device.push_debug_group(SHADOWS_GROUP);

        device.bind_framebuffer(Some(self.atlas.framebuffer));
        device.set_viewport(Viewport::full(self.atlas.size, self.atlas.size));
        device.clear(ClearFlags::DEPTH, wgpu::Color::BLACK, 1.0);
        device.set_cull_mode(Some(wgpu::Face::Front));
        device.set_depth_state(Some(wgpu::CompareFunction::Less), true);
        device.set_color_write(false);

        for region in &allocation.regions {
            device.push_debug_group(SHADOW_SLOT_GROUP);
            device.set_viewport(region.rect);

            let light = &lights[region.light_index];
            let slot_frame = FrameUniforms {
                view: Mat4::IDENTITY,
                projection: region.view_projection,
                view_projection: region.view_projection,
                camera_position: light.position(),
                time: input.time.elapsed,
                viewport: Vec4::new(
                    region.rect.x as f32,
                    region.rect.y as f32,
                    region.rect.width as f32,
                    region.rect.height as f32,
                ),
            };
            device.upload_uniforms(UniformSlot::Frame, bytemuck::bytes_of(&slot_frame));

            let frustum = Frustum::from_matrix(region.view_projection);
            for draw in draws
                .iter()
                .filter(|d| d.program.casts_shadows() && frustum.test_box(&d.bounds))
            {
                submit(device, draw, region.view_projection);
                stats.shadow_draws += 1;
            }
            device.pop_debug_group();
        }

        device.set_color_write(true);
        device.pop_debug_group();
    }

    fn shadow_requests(&self, camera: &RenderCamera, lights: &[LightSnapshot]) -> Vec<ShadowRequest> {
        let s = &self.settings;
        lights
            .iter()
            .enumerate()
            .filter(|(_, light)| light.casts_shadows)
            .map(|(index, light)| match light.light_type {
                LightType::Spot => ShadowRequest::new(
                    index,
                    [build_spot_vp(
                        light.position(),
                        light.direction(),
                        light.spot_angle,
                        light.range,
                    )],
                ),
                LightType::Point => {
                    ShadowRequest::new(index, build_point_vps(light.position(), light.range))
                }
                LightType::Directional => ShadowRequest::new(
                    index,
                    build_directional_vps(
                        light.direction(),
                        camera,
                        light.cascade_count.min(s.cascade_count),
                        s.cascade_split_lambda,
                        s.shadow_distance,
                        s.cascade_padding_back,
                        s.cascade_padding_front,
                    ),
                ),
            })
            .collect()
    }

    // ========================================================================
    // Color
    // ========================================================================

    fn color_pass(
        &mut self,
        input: &FrameInput<'_>,
        draws: &[PreparedDraw<'_>],
        targets: FrameTargets,
        viewport: Viewport,
        frame: &FrameUniforms,
        stats: &mut FrameStats,
    ) {
        let clear_color = self.settings.clear_color();
        let atlas = self.atlas.texture;
        let device = self.device.as_mut();
        device.push_debug_group(COLOR_GROUP);

        device.bind_framebuffer(Some(targets.framebuffer));
        device.set_viewport(viewport);
        if input.skybox.is_none() {
            device.clear(ClearFlags::COLOR, clear_color, 1.0);
        }
        device.set_cull_mode(Some(wgpu::Face::Back));
        device.set_depth_state(Some(wgpu::CompareFunction::LessEqual), true);
        device.upload_uniforms(UniformSlot::Frame, bytemuck::bytes_of(frame));
        device.upload_uniforms(UniformSlot::Lights, bytemuck::bytes_of(&self.light_block));
        device.upload_uniforms(UniformSlot::Shadows, bytemuck::bytes_of(&self.shadow_block));
        device.bind_texture(SHADOW_ATLAS_UNIT, atlas);

        for draw in draws.iter().filter(|d| d.visible) {
            submit(device, draw, frame.view_projection);
            stats.color_draws += 1;
        }

        if let Some(skybox) = input.skybox {
            device.push_debug_group(SKYBOX_GROUP);
            device.set_cull_mode(None);
            device.set_depth_state(Some(wgpu::CompareFunction::LessEqual), false);
            device.bind_program(skybox.program.handle());
            device.bind_texture(SKYBOX_UNIT, skybox.cubemap);
            let object = ObjectUniforms::new(
                Mat4::from_translation(input.camera.position),
                frame.view_projection,
            );
            device.upload_uniforms(UniformSlot::Object, bytemuck::bytes_of(&object));
            for sub_mesh in &skybox.mesh.sub_meshes {
                device.draw(DrawCall {
                    sub_mesh,
                    mode: draw_mode(sub_mesh, &skybox.program),
                });
            }
            device.set_depth_state(Some(wgpu::CompareFunction::LessEqual), true);
            device.pop_debug_group();
        }

        device.pop_debug_group();
    }

    // ========================================================================
    // Post processing
    // ========================================================================

    fn post_processing_pass(
        &mut self,
        input: &FrameInput<'_>,
        targets: FrameTargets,
        viewport: Viewport,
        frame: &FrameUniforms,
        stats: &mut FrameStats,
    ) {
        if input.effects.is_empty() {
            return;
        }
        let device = self.device.as_mut();
        device.push_debug_group(POST_PROCESSING_GROUP);

        for effect in input.effects {
            let Ok(mut effect) = effect.try_borrow_mut() else {
                warn!("Post effect is borrowed elsewhere; skipped this frame");
                continue;
            };
            device.copy_texture(targets.color, targets.ping_pong);
            device.push_debug_group(effect.name());
            let mut pass = PostProcessPass {
                device: &mut *device,
                input: targets.ping_pong,
                target: targets.framebuffer,
                viewport,
                frame,
            };
            effect.apply(&mut pass);
            device.pop_debug_group();
            stats.post_effects += 1;
        }

        device.pop_debug_group();
    }

    // ========================================================================
    // Present
    // ========================================================================

    fn present_pass(&mut self, targets: FrameTargets, viewport: Viewport) {
        let device = self.device.as_mut();
        device.push_debug_group(PRESENT_GROUP);

        device.bind_framebuffer(None);
        device.set_viewport(viewport);
        device.set_depth_state(None, false);
        device.set_cull_mode(None);
        match &self.present_program {
            Some(program) => {
                device.bind_program(program.handle());
                device.bind_texture(PRESENT_INPUT_UNIT, targets.color);
                device.draw_fullscreen_quad();
            }
            None => {
                if !self.present_warned {
                    warn!("No present program set; the frame stays in the colour target");
                    self.present_warned = true;
                }
            }
        }

        device.pop_debug_group();
    }
}

/// Resolves every queued sub-mesh to a program and culls it against the
/// camera frustum. Sub-meshes without a material are skipped.
fn prepare_draws<'a>(input: &FrameInput<'a>, stats: &mut FrameStats) -> Vec<PreparedDraw<'a>> {
    let frustum = &input.camera.frustum;
    let mut prepared = Vec::with_capacity(input.draws.len());

    for item in input.draws {
        let model = Mat4::from(item.model);
        for sub_mesh in &item.mesh.sub_meshes {
            let Some(material) = item.material_for(sub_mesh) else {
                trace!("Sub-mesh of {:?} has no material; skipped", item.mesh.name);
                continue;
            };
            let bounds = sub_mesh.bounds.transform(&item.model);
            let visible = frustum.test_box(&bounds);
            if !visible {
                stats.culled += 1;
            }
            prepared.push(PreparedDraw {
                model,
                sub_mesh,
                program: &material.program,
                bounds,
                visible,
            });
        }
    }
    prepared
}

fn build_light_block(lights: &[LightSnapshot], allocation: &ShadowAllocation) -> LightBlock {
    let mut block = LightBlock::default();
    for (index, light) in lights.iter().enumerate().take(MAX_LIGHTS) {
        let mut gpu = light.gpu;
        match allocation.run_for(index) {
            Some(run) => {
                gpu.shadow_atlas_index = run.first_slot as i32;
                gpu.shadow_slot_count = run.slot_count as u32;
            }
            None => {
                gpu.shadow_atlas_index = -1;
                gpu.shadow_slot_count = 0;
            }
        }
        block.lights[index] = gpu;
        block.light_count += 1;
    }
    block
}

fn build_shadow_block(allocation: &ShadowAllocation) -> ShadowBlock {
    let mut block = ShadowBlock::default();
    for (slot, region) in block.regions.iter_mut().zip(&allocation.regions) {
        *slot = region.to_gpu();
        block.region_count += 1;
    }
    block
}
