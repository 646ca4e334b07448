//! Rendering
//!
//! - [`device`]: the [`GraphicsDevice`] command surface the renderer drives
//! - [`headless`]: a recording device for GPU-less runs and tests
//! - [`queue`]: draw items submitted by `Render` hooks
//! - [`settings`]: [`RendererSettings`]
//! - [`shadow_atlas`] / [`shadow_utils`]: atlas packing and shadow matrices
//! - [`Renderer`]: the per-frame pass sequence
//! - [`SceneGraphics`]: the scene component that feeds the renderer

pub mod device;
pub mod graphics;
pub mod headless;
pub mod passes;
pub mod queue;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod settings;
pub mod shadow_atlas;
pub mod shadow_utils;

pub use device::{ClearFlags, DrawCall, GraphicsDevice, Viewport};
pub use graphics::{SceneGraphics, Skybox};
pub use headless::{CommandLog, DeviceCommand, RecordingDevice};
pub use queue::{DrawItem, GizmoLine, RenderQueue};
pub use renderer::{FrameInput, FrameStats, Renderer};
pub use settings::RendererSettings;
pub use shadow_atlas::{ShadowAllocation, ShadowMapRegion, ShadowRequest};
