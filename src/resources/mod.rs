//! Provider-side resource descriptions.
//!
//! Data the core consumes from its collaborators without interpreting it:
//! - Mesh / SubMesh: vertex-array handles, counts, draw mode, bounds
//! - ShaderProgram / Material: program handle, flags, reflected layout
//! - Texture / Framebuffer handles
//! - BoundingBox: oriented bounds used for culling
//! - Uniforms: GPU uniform blocks uploaded by the renderer

pub mod bounds;
pub mod material;
pub mod mesh;
pub mod texture;
pub mod uniforms;

pub use bounds::BoundingBox;
pub use material::{Material, ProgramHandle, ShaderFlags, ShaderProgram, UniformLayout};
pub use mesh::{DrawMode, Mesh, SubMesh, VertexArrayHandle};
pub use texture::{FramebufferHandle, TextureDescriptor, TextureHandle};
pub use uniforms::{GpuLight, LightBlock, ShadowBlock, UniformSlot, MAX_LIGHTS, MAX_SHADOW_SLOTS};
