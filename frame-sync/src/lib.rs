//! # RedLilium Frame Sync
//!
//! Frame-in-flight synchronization and render-graph barrier synthesis for
//! RedLilium.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`AccessMapper`] - Maps logical resource accesses to stage, access and layout scopes
//! - [`FrameTimeline`] - Per-slot timeline semaphore with named frame phases
//! - [`SubmissionQueue`] - Deferred uploads and clears with owned staging memory
//! - [`FrameManager`] - The acquire, record, submit, present and complete lifecycle
//! - [`RenderGraphBuilder`] / [`RenderGraph`] - Declarative passes with automatic barriers
//! - Backends: a simulated GPU (always available) and Vulkan (`vulkan-backend`)
//!
//! ## Example
//!
//! ```
//! use redlilium_frame_sync::{
//!     AccessKind, FrameConfig, FrameManager, GraphicsDevice, PresentRegion, RenderGraphBuilder,
//!     SurfaceTarget, SwapchainDescriptor,
//! };
//! use redlilium_frame_sync::types::{ImageDescriptor, ImageFormat, ImageUsage};
//!
//! let device = GraphicsDevice::dummy();
//! let swapchain = device
//!     .create_swapchain(SurfaceTarget::Headless, &SwapchainDescriptor::new(32, 32))
//!     .unwrap();
//! let mut frames = FrameManager::new(device.clone(), swapchain, FrameConfig::default()).unwrap();
//!
//! let color = device
//!     .create_image(&ImageDescriptor::new_2d(
//!         32,
//!         32,
//!         ImageFormat::Bgra8Unorm,
//!         ImageUsage::COLOR_ATTACHMENT | ImageUsage::COPY_SRC | ImageUsage::COPY_DST,
//!     ))
//!     .unwrap();
//!
//! let mut builder = RenderGraphBuilder::new();
//! builder
//!     .use_image(&color, AccessKind::TransferWrite)
//!     .record_graphics_pass("clear", {
//!         let color = color.clone();
//!         move |ctx| ctx.clear_color_image(&color, [0.1, 0.2, 0.3, 1.0])
//!     });
//! builder.add_external_output_dependency_image(&color, AccessKind::ColorAttachmentWrite);
//! let graph = builder.build();
//!
//! for _ in 0..4 {
//!     frames.start_frame_default().unwrap();
//!     graph.execute(&mut frames);
//!     frames.submit_main_command_buffer().unwrap();
//!     frames
//!         .present_to_framebuffer(&color, PresentRegion::whole(&color))
//!         .unwrap();
//! }
//! frames.wait_idle().unwrap();
//! ```

pub mod access;
pub mod backend;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod graph;
pub mod resources;
pub mod submission;
pub mod swapchain;
pub mod timeline;
pub mod types;

// Re-export main types for convenience
pub use access::{AccessFlags, AccessKind, AccessMapper, AccessScope, Barrier, PipelineStages};
pub use backend::{GpuBackend, SurfaceTarget};
pub use command::{Command, CommandContext, CommandList};
pub use config::{DEFAULT_FRAMES_IN_FLIGHT, FrameConfig};
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::GraphicsError;
pub use frame::{
    FrameComponent, FrameInfo, FrameManager, FrameState, PresentRegion, ReadbackHandle,
    ReadbackSource,
};
pub use graph::{PassKind, RenderGraph, RenderGraphBuilder};
pub use resources::{Buffer, Image, ResourceId};
pub use submission::SubmissionQueue;
pub use swapchain::{PresentMode, Swapchain, SwapchainDescriptor};
pub use timeline::{FramePhase, FrameTimeline};
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent3d, ImageDescriptor, ImageFormat, ImageUsage,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_device() {
        let device = GraphicsDevice::dummy();
        assert_eq!(device.name(), "Dummy Backend");
    }
}
