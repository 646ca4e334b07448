//! Shader programs and materials.
//!
//! Shader loading, preprocessing and reflection live outside the core. What
//! arrives here is an opaque compiled-program handle, the reflected uniform
//! layout, and the flags the renderer consults when deciding which passes an
//! object takes part in.

use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

/// Opaque compiled-program handle issued by the shader provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

bitflags! {
    /// Per-program render behaviour declared by the shader source.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShaderFlags: u32 {
        /// Skip the depth prepass (transparent-style materials).
        const IGNORES_DEPTH_PREPASS = 1 << 0;
        /// Rendered into shadow maps.
        const CASTS_SHADOWS         = 1 << 1;
        /// Draws as tessellation patches.
        const USES_PATCHES          = 1 << 2;
    }
}

impl Default for ShaderFlags {
    fn default() -> Self {
        Self::CASTS_SHADOWS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler,
}

/// One reflected uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub binding: u32,
    pub ty: UniformType,
}

/// Reflected uniform layout, name to location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    fields: FxHashMap<String, UniformField>,
}

impl UniformLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: UniformField) {
        self.fields.insert(name.into(), field);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformField> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compiled program as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub name: String,
    handle: ProgramHandle,
    pub flags: ShaderFlags,
    pub layout: UniformLayout,
}

impl ShaderProgram {
    #[must_use]
    pub fn new(name: impl Into<String>, handle: ProgramHandle, flags: ShaderFlags) -> Self {
        Self {
            name: name.into(),
            handle,
            flags,
            layout: UniformLayout::new(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: UniformLayout) -> Self {
        self.layout = layout;
        self
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn ignores_depth_prepass(&self) -> bool {
        self.flags.contains(ShaderFlags::IGNORES_DEPTH_PREPASS)
    }

    #[inline]
    #[must_use]
    pub fn casts_shadows(&self) -> bool {
        self.flags.contains(ShaderFlags::CASTS_SHADOWS)
    }

    #[inline]
    #[must_use]
    pub fn uses_patches(&self) -> bool {
        self.flags.contains(ShaderFlags::USES_PATCHES)
    }
}

/// A material binds a program; per-material parameters are uploaded by the
/// shader provider and stay opaque to the core.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub program: Rc<ShaderProgram>,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>, program: Rc<ShaderProgram>) -> Self {
        Self {
            name: name.into(),
            program,
        }
    }
}
