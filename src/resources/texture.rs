//! Texture and framebuffer handles.
//!
//! The core never owns GPU memory. Textures and framebuffers are created by a
//! [`GraphicsDevice`](crate::renderer::device::GraphicsDevice) and referred to
//! through the opaque handles defined here.

use wgpu::TextureFormat;

/// Opaque texture handle issued by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Opaque framebuffer handle issued by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

/// Creation parameters for a device texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub kind: TextureKind,
    pub mip_levels: u32,
}

impl TextureDescriptor {
    #[must_use]
    pub fn color_target(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
            format: TextureFormat::Rgba16Float,
            kind: TextureKind::D2,
            mip_levels: 1,
        }
    }

    #[must_use]
    pub fn depth_target(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
            format: TextureFormat::Depth32Float,
            kind: TextureKind::D2,
            mip_levels: 1,
        }
    }
}

/// Framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
}

/// Which image of a texture an attachment binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageRef {
    pub level: u32,
    /// Cube face index (0..6); ignored for 2D textures.
    pub face: u32,
}
