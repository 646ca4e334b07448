//! Forward renderer.
//!
//! One [`Renderer::render`] call runs the fixed pass sequence
//!
//! ```text
//! DepthPrepass -> Shadows -> Color -> PostProcessing -> Present
//! ```
//!
//! against device-side targets owned by the renderer: a colour texture, a
//! depth texture, a ping-pong copy target for post effects, and the shared
//! shadow atlas. Everything the frame draws arrives in a [`FrameInput`].

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::errors::{EngineError, Result};
use crate::renderer::device::{GraphicsDevice, Viewport};
use crate::renderer::graphics::Skybox;
use crate::renderer::queue::DrawItem;
use crate::renderer::settings::RendererSettings;
use crate::resources::texture::{Attachment, ImageRef};
use crate::resources::uniforms::{LightBlock, ShadowBlock};
use crate::resources::{FramebufferHandle, ShaderProgram, TextureDescriptor, TextureHandle};
use crate::scene::camera::RenderCamera;
use crate::scene::light::LightSnapshot;
use crate::scene::post_process::PostProcessEffect;
use crate::utils::FrameTime;

/// Everything one frame draws.
pub struct FrameInput<'a> {
    pub camera: &'a RenderCamera,
    pub draws: &'a [DrawItem],
    /// Active lights, already capped by the light system.
    pub lights: &'a [LightSnapshot],
    /// Post effects in registration order.
    pub effects: &'a [Rc<RefCell<dyn PostProcessEffect>>],
    pub skybox: Option<&'a Skybox>,
    pub time: FrameTime,
}

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub prepass_draws: u32,
    pub shadow_draws: u32,
    pub color_draws: u32,
    /// Sub-meshes rejected by the camera frustum.
    pub culled: u32,
    pub lights: u32,
    pub shadow_slots: u32,
    /// Shadow-casting lights that did not fit in the atlas.
    pub dropped_shadow_lights: u32,
    pub post_effects: u32,
}

/// Colour, depth and ping-pong targets sized to the viewport.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameTargets {
    pub color: TextureHandle,
    pub depth: TextureHandle,
    pub ping_pong: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShadowAtlas {
    pub texture: TextureHandle,
    pub framebuffer: FramebufferHandle,
    pub size: u32,
}

pub struct Renderer {
    pub(crate) device: Box<dyn GraphicsDevice>,
    pub(crate) settings: RendererSettings,
    pub(crate) size: (u32, u32),
    pub(crate) targets: Option<FrameTargets>,
    pub(crate) atlas: ShadowAtlas,
    pub(crate) present_program: Option<Rc<ShaderProgram>>,
    pub(crate) present_warned: bool,
    pub(crate) light_block: LightBlock,
    pub(crate) shadow_block: ShadowBlock,
}

impl Renderer {
    /// Validates `settings` and creates the frame targets and shadow atlas.
    pub fn new(mut device: Box<dyn GraphicsDevice>, settings: RendererSettings) -> Result<Self> {
        settings.validate()?;
        let atlas = create_atlas(device.as_mut(), settings.shadow_atlas_size)?;
        let (width, height) = settings.viewport;

        let mut renderer = Self {
            device,
            settings,
            size: (0, 0),
            targets: None,
            atlas,
            present_program: None,
            present_warned: false,
            light_block: LightBlock::default(),
            shadow_block: ShadowBlock::default(),
        };
        renderer.resize(width, height)?;

        info!(
            "Renderer created: {width}x{height}, shadow atlas {}²",
            renderer.atlas.size
        );
        Ok(renderer)
    }

    /// Program used to blit the final colour target to the screen.
    #[must_use]
    pub fn with_present_program(mut self, program: Rc<ShaderProgram>) -> Self {
        self.present_program = Some(program);
        self
    }

    pub fn set_present_program(&mut self, program: Option<Rc<ShaderProgram>>) {
        self.present_program = program;
        self.present_warned = false;
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Applies new settings, recreating the shadow atlas when its size
    /// changed.
    pub fn set_settings(&mut self, settings: RendererSettings) -> Result<()> {
        settings.validate()?;
        if settings.shadow_atlas_size != self.atlas.size {
            let atlas = create_atlas(self.device.as_mut(), settings.shadow_atlas_size)?;
            self.device.destroy_framebuffer(self.atlas.framebuffer);
            self.device.destroy_texture(self.atlas.texture);
            self.atlas = atlas;
        }
        self.settings = settings;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.size.0, self.size.1)
    }

    /// Recreates the colour, depth and ping-pong targets. A zero size frees
    /// them; frames then fail with [`EngineError::InvalidViewport`] until the
    /// next non-zero resize.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.size == (width, height) && (self.targets.is_some() || width == 0 || height == 0) {
            return Ok(());
        }
        if let Some(old) = self.targets.take() {
            self.device.destroy_framebuffer(old.framebuffer);
            self.device.destroy_texture(old.color);
            self.device.destroy_texture(old.depth);
            self.device.destroy_texture(old.ping_pong);
        }
        self.size = (width, height);
        if width == 0 || height == 0 {
            debug!("Renderer resized to an empty viewport ({width}x{height})");
            return Ok(());
        }

        self.targets = Some(create_targets(self.device.as_mut(), width, height)?);
        Ok(())
    }

    /// Colour target holding the last rendered frame.
    #[must_use]
    pub fn color_target(&self) -> Option<TextureHandle> {
        self.targets.map(|t| t.color)
    }

    #[must_use]
    pub fn shadow_atlas(&self) -> TextureHandle {
        self.atlas.texture
    }

    /// Light block uploaded by the last frame.
    #[inline]
    #[must_use]
    pub fn light_block(&self) -> &LightBlock {
        &self.light_block
    }

    /// Shadow regions uploaded by the last frame.
    #[inline]
    #[must_use]
    pub fn shadow_block(&self) -> &ShadowBlock {
        &self.shadow_block
    }

    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// Renders one frame.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidViewport`] when the renderer has zero size. The
    /// device is not touched in that case.
    pub fn render(&mut self, input: &FrameInput<'_>) -> Result<FrameStats> {
        let Some(targets) = self.targets else {
            return Err(EngineError::InvalidViewport {
                width: self.size.0,
                height: self.size.1,
            });
        };
        self.render_frame(input, targets)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(old) = self.targets.take() {
            self.device.destroy_framebuffer(old.framebuffer);
            self.device.destroy_texture(old.color);
            self.device.destroy_texture(old.depth);
            self.device.destroy_texture(old.ping_pong);
        }
        self.device.destroy_framebuffer(self.atlas.framebuffer);
        self.device.destroy_texture(self.atlas.texture);
    }
}

/// Creates the frame targets. On failure, whatever was already created is
/// destroyed before the error is returned.
fn create_targets(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<FrameTargets> {
    let color = device.create_texture(&TextureDescriptor::color_target("Scene Color", width, height))?;
    let depth = device
        .create_texture(&TextureDescriptor::depth_target("Scene Depth", width, height))
        .inspect_err(|_| release_textures(device, &[color]))?;
    let ping_pong = device
        .create_texture(&TextureDescriptor::color_target("Post Ping-Pong", width, height))
        .inspect_err(|_| release_textures(device, &[color, depth]))?;
    let framebuffer = device
        .create_framebuffer("Scene Framebuffer")
        .inspect_err(|_| release_textures(device, &[color, depth, ping_pong]))?;
    device.attach(framebuffer, Attachment::Color(0), color, ImageRef::default());
    device.attach(framebuffer, Attachment::Depth, depth, ImageRef::default());

    Ok(FrameTargets {
        color,
        depth,
        ping_pong,
        framebuffer,
    })
}

fn release_textures(device: &mut dyn GraphicsDevice, textures: &[TextureHandle]) {
    for &texture in textures {
        device.destroy_texture(texture);
    }
}

fn create_atlas(device: &mut dyn GraphicsDevice, size: u32) -> Result<ShadowAtlas> {
    let texture = device.create_texture(&TextureDescriptor::depth_target("Shadow Atlas", size, size))?;
    let framebuffer = device
        .create_framebuffer("Shadow Atlas Framebuffer")
        .inspect_err(|_| release_textures(device, &[texture]))?;
    device.attach(framebuffer, Attachment::Depth, texture, ImageRef::default());
    Ok(ShadowAtlas {
        texture,
        framebuffer,
        size,
    })
}
