//! Headless recording device.
//!
//! [`RecordingDevice`] implements [`GraphicsDevice`] without a GPU: it hands
//! out sequential handles and appends every call to a shared [`CommandLog`].
//! The log handle stays with the caller after the device is moved into a
//! renderer, so passes can be inspected frame by frame.

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{EngineError, Result};
use crate::renderer::device::{ClearFlags, DrawCall, GraphicsDevice, Viewport};
use crate::resources::texture::{Attachment, ImageRef, TextureKind};
use crate::resources::uniforms::UniformSlot;
use crate::resources::{
    DrawMode, FramebufferHandle, ProgramHandle, TextureDescriptor, TextureHandle, VertexArrayHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateTexture {
        handle: TextureHandle,
        label: String,
        width: u32,
        height: u32,
        kind: TextureKind,
    },
    DestroyTexture(TextureHandle),
    CreateFramebuffer {
        handle: FramebufferHandle,
        label: String,
    },
    DestroyFramebuffer(FramebufferHandle),
    Attach {
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
        image: ImageRef,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    SetViewport(Viewport),
    Clear {
        flags: ClearFlags,
        color: wgpu::Color,
        depth: f32,
    },
    SetDepthState {
        compare: Option<wgpu::CompareFunction>,
        write: bool,
    },
    SetCullMode(Option<wgpu::Face>),
    SetColorWrite(bool),
    BindProgram(ProgramHandle),
    UploadUniforms {
        slot: UniformSlot,
        bytes: Vec<u8>,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    Draw {
        vertex_array: VertexArrayHandle,
        count: u32,
        indexed: bool,
        mode: DrawMode,
    },
    CopyTexture {
        source: TextureHandle,
        destination: TextureHandle,
    },
    DrawFullscreenQuad,
    PushDebugGroup(String),
    PopDebugGroup,
}

impl DeviceCommand {
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::DrawFullscreenQuad)
    }
}

/// Shared, append-only command log.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Rc<RefCell<Vec<DeviceCommand>>>,
}

impl CommandLog {
    fn push(&self, command: DeviceCommand) {
        self.commands.borrow_mut().push(command);
    }

    #[must_use]
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }

    /// Textures created minus textures destroyed since the last clear.
    #[must_use]
    pub fn live_textures(&self) -> isize {
        self.commands.borrow().iter().fold(0, |live, c| match c {
            DeviceCommand::CreateTexture { .. } => live + 1,
            DeviceCommand::DestroyTexture(_) => live - 1,
            _ => live,
        })
    }

    /// Commands recorded inside each debug group named `label`, nested
    /// groups included, one entry per occurrence.
    #[must_use]
    pub fn groups(&self, label: &str) -> Vec<Vec<DeviceCommand>> {
        let commands = self.commands.borrow();
        let mut found = Vec::new();
        let mut i = 0;
        while i < commands.len() {
            if matches!(&commands[i], DeviceCommand::PushDebugGroup(l) if l == label) {
                let mut depth = 1usize;
                let mut body = Vec::new();
                i += 1;
                while i < commands.len() && depth > 0 {
                    match &commands[i] {
                        DeviceCommand::PushDebugGroup(_) => depth += 1,
                        DeviceCommand::PopDebugGroup => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        body.push(commands[i].clone());
                    }
                    i += 1;
                }
                found.push(body);
            } else {
                i += 1;
            }
        }
        found
    }

    /// Commands of the first group named `label`, empty when absent.
    #[must_use]
    pub fn group(&self, label: &str) -> Vec<DeviceCommand> {
        self.groups(label).into_iter().next().unwrap_or_default()
    }

    /// Mesh draws (not fullscreen quads) inside the first group `label`.
    #[must_use]
    pub fn mesh_draws_in(&self, label: &str) -> usize {
        self.group(label)
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
            .count()
    }

    /// Payloads uploaded to `slot` inside the first group `label`.
    #[must_use]
    pub fn uploads_in(&self, label: &str, slot: UniformSlot) -> Vec<Vec<u8>> {
        self.group(label)
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::UploadUniforms { slot: s, bytes } if s == slot => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// Last payload uploaded to `slot` anywhere in the log.
    #[must_use]
    pub fn last_upload(&self, slot: UniformSlot) -> Option<Vec<u8>> {
        self.commands.borrow().iter().rev().find_map(|c| match c {
            DeviceCommand::UploadUniforms { slot: s, bytes } if *s == slot => Some(bytes.clone()),
            _ => None,
        })
    }
}

/// GPU-less [`GraphicsDevice`].
#[derive(Debug, Default)]
pub struct RecordingDevice {
    log: CommandLog,
    next_texture: u32,
    next_framebuffer: u32,
    /// Successful texture/framebuffer creations left before every further
    /// creation fails. `None` never fails.
    creations_left: Option<u32>,
}

impl RecordingDevice {
    /// A new device plus a handle to its log.
    #[must_use]
    pub fn new() -> (Self, CommandLog) {
        let device = Self::default();
        let log = device.log.clone();
        (device, log)
    }

    /// Every texture/framebuffer creation fails with `EngineError::Device`.
    #[must_use]
    pub fn failing() -> (Self, CommandLog) {
        Self::failing_after(0)
    }

    /// The first `successes` texture/framebuffer creations succeed, every
    /// later one fails with `EngineError::Device`.
    #[must_use]
    pub fn failing_after(successes: u32) -> (Self, CommandLog) {
        let (mut device, log) = Self::new();
        device.creations_left = Some(successes);
        (device, log)
    }

    fn take_creation(&mut self) -> bool {
        match &mut self.creations_left {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        "Recording Device"
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle> {
        if !self.take_creation() {
            return Err(EngineError::Device(format!("cannot create texture {}", desc.label)));
        }
        self.next_texture += 1;
        let handle = TextureHandle(self.next_texture);
        log::trace!(
            "RecordingDevice: creating texture {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );
        self.log.push(DeviceCommand::CreateTexture {
            handle,
            label: desc.label.to_owned(),
            width: desc.width,
            height: desc.height,
            kind: desc.kind,
        });
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.log.push(DeviceCommand::DestroyTexture(texture));
    }

    fn create_framebuffer(&mut self, label: &str) -> Result<FramebufferHandle> {
        if !self.take_creation() {
            return Err(EngineError::Device(format!("cannot create framebuffer {label}")));
        }
        self.next_framebuffer += 1;
        let handle = FramebufferHandle(self.next_framebuffer);
        self.log.push(DeviceCommand::CreateFramebuffer {
            handle,
            label: label.to_owned(),
        });
        Ok(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.log.push(DeviceCommand::DestroyFramebuffer(framebuffer));
    }

    fn attach(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
        image: ImageRef,
    ) {
        self.log.push(DeviceCommand::Attach {
            framebuffer,
            attachment,
            texture,
            image,
        });
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.log.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.log.push(DeviceCommand::SetViewport(viewport));
    }

    fn clear(&mut self, flags: ClearFlags, color: wgpu::Color, depth: f32) {
        self.log.push(DeviceCommand::Clear { flags, color, depth });
    }

    fn set_depth_state(&mut self, compare: Option<wgpu::CompareFunction>, write: bool) {
        self.log.push(DeviceCommand::SetDepthState { compare, write });
    }

    fn set_cull_mode(&mut self, face: Option<wgpu::Face>) {
        self.log.push(DeviceCommand::SetCullMode(face));
    }

    fn set_color_write(&mut self, enabled: bool) {
        self.log.push(DeviceCommand::SetColorWrite(enabled));
    }

    fn bind_program(&mut self, program: ProgramHandle) {
        self.log.push(DeviceCommand::BindProgram(program));
    }

    fn upload_uniforms(&mut self, slot: UniformSlot, bytes: &[u8]) {
        self.log.push(DeviceCommand::UploadUniforms {
            slot,
            bytes: bytes.to_vec(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.log.push(DeviceCommand::BindTexture { unit, texture });
    }

    fn draw(&mut self, call: DrawCall<'_>) {
        self.log.push(DeviceCommand::Draw {
            vertex_array: call.sub_mesh.vertex_array,
            count: call.sub_mesh.element_count(),
            indexed: call.sub_mesh.is_indexed(),
            mode: call.mode,
        });
    }

    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) {
        self.log.push(DeviceCommand::CopyTexture {
            source,
            destination,
        });
    }

    fn draw_fullscreen_quad(&mut self) {
        self.log.push(DeviceCommand::DrawFullscreenQuad);
    }

    fn push_debug_group(&mut self, label: &str) {
        self.log.push(DeviceCommand::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.log.push(DeviceCommand::PopDebugGroup);
    }
}
