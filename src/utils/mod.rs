//! Utility Module
//!
//! - [`time`]: frame timer and the [`FrameTime`] snapshot passed to hooks

pub mod time;

pub use time::{FrameTime, Timer};
