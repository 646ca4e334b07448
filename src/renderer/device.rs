//! Graphics device interface.
//!
//! The renderer talks to the GPU only through [`GraphicsDevice`]: an
//! immediate-mode command surface over textures, framebuffers, programs and
//! fixed uniform slots. Render state uses `wgpu` value types so a backend
//! can map them one-to-one.
//!
//! Creation calls may fail; state and draw calls cannot (a backend logs and
//! ignores what it cannot honour).

use bitflags::bitflags;

use crate::errors::Result;
use crate::resources::texture::{Attachment, ImageRef};
use crate::resources::uniforms::UniformSlot;
use crate::resources::{DrawMode, FramebufferHandle, ProgramHandle, SubMesh, TextureDescriptor, TextureHandle};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// Pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One draw of a sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall<'a> {
    pub sub_mesh: &'a SubMesh,
    /// Effective mode; `Patches` when the program tessellates.
    pub mode: DrawMode,
}

pub trait GraphicsDevice {
    // === Resources ===
    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle>;
    fn destroy_texture(&mut self, texture: TextureHandle);
    fn create_framebuffer(&mut self, label: &str) -> Result<FramebufferHandle>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);
    fn attach(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
        image: ImageRef,
    );

    // === State ===
    /// `None` binds the presentation surface.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn set_viewport(&mut self, viewport: Viewport);
    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color, depth: f32);
    /// `None` disables the depth test.
    fn set_depth_state(&mut self, compare: Option<wgpu::CompareFunction>, write: bool);
    /// `None` disables face culling.
    fn set_cull_mode(&mut self, face: Option<wgpu::Face>);
    fn set_color_write(&mut self, enabled: bool);
    fn bind_program(&mut self, program: ProgramHandle);
    fn upload_uniforms(&mut self, slot: UniformSlot, bytes: &[u8]);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    // === Commands ===
    fn draw(&mut self, call: DrawCall<'_>);
    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle);
    fn draw_fullscreen_quad(&mut self);

    // === Debug ===
    fn push_debug_group(&mut self, label: &str) {
        let _ = label;
    }
    fn pop_debug_group(&mut self) {}
}
