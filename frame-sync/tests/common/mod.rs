//! Common utilities for frame-sync integration tests.
//!
//! Every test runs on the simulated backend so GPU timing can be controlled
//! with `pause` / `resume` and results inspected without mapping memory.

use std::sync::Arc;
use std::time::Duration;

use redlilium_frame_sync::backend::dummy::DummyBackend;
use redlilium_frame_sync::{
    AccessKind, BufferDescriptor, BufferUsage, FrameConfig, FrameManager, GraphicsDevice, Image,
    ImageDescriptor, ImageFormat, ImageUsage, PresentRegion, RenderGraph, RenderGraphBuilder,
    SurfaceTarget, SwapchainDescriptor,
};

/// Width and height of the test swapchain.
pub const SURFACE_SIZE: u32 = 8;

/// Timeout used for frames that are expected to start immediately.
pub const START_TIMEOUT: Duration = Duration::from_secs(1);

/// Route log output to the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate a deterministic byte pattern for upload tests.
#[allow(dead_code)]
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 + 3) as u8).collect()
}

/// A device, swapchain and frame manager over the simulated backend.
pub struct TestContext {
    pub device: Arc<GraphicsDevice>,
    pub frames: FrameManager,
}

impl TestContext {
    pub fn new(frames_in_flight: usize) -> Self {
        init_logging();
        let device = GraphicsDevice::dummy();
        let swapchain = device
            .create_swapchain(
                SurfaceTarget::Headless,
                &SwapchainDescriptor::new(SURFACE_SIZE, SURFACE_SIZE),
            )
            .expect("headless swapchain");
        let config = FrameConfig::default()
            .with_frames_in_flight(frames_in_flight)
            .with_label("test");
        let frames =
            FrameManager::new(Arc::clone(&device), swapchain, config).expect("frame manager");
        Self { device, frames }
    }

    /// The simulated backend behind the device.
    pub fn dummy(&self) -> &DummyBackend {
        self.device
            .backend()
            .as_dummy()
            .expect("test context always uses the dummy backend")
    }

    /// A color image that can be cleared, rendered to and presented.
    #[allow(dead_code)]
    pub fn color_image(&self, label: &str) -> Arc<Image> {
        self.device
            .create_image(
                &ImageDescriptor::new_2d(
                    SURFACE_SIZE,
                    SURFACE_SIZE,
                    ImageFormat::Bgra8Unorm,
                    ImageUsage::COLOR_ATTACHMENT | ImageUsage::COPY_SRC | ImageUsage::COPY_DST,
                )
                .with_label(label),
            )
            .expect("color image")
    }

    /// A device-local buffer that can be uploaded to and read back.
    #[allow(dead_code)]
    pub fn storage_buffer(&self, size: u64, label: &str) -> Arc<redlilium_frame_sync::Buffer> {
        self.device
            .create_buffer(
                &BufferDescriptor::new(
                    size,
                    BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
                )
                .with_label(label),
            )
            .expect("storage buffer")
    }

    /// Run one frame that records `graph` and presents `image`.
    #[allow(dead_code)]
    pub fn run_frame(&mut self, graph: &RenderGraph, image: &Arc<Image>) -> bool {
        self.frames.start_frame(START_TIMEOUT).expect("start_frame");
        graph.execute(&mut self.frames);
        self.frames
            .submit_main_command_buffer()
            .expect("submit_main_command_buffer");
        self.frames
            .present_to_framebuffer(image, PresentRegion::whole(image))
            .expect("present_to_framebuffer")
    }
}

/// A graph that clears `image` to `color` and leaves it ready to present.
#[allow(dead_code)]
pub fn clear_graph(image: &Arc<Image>, color: [f32; 4]) -> RenderGraph {
    let mut builder = RenderGraphBuilder::new();
    builder
        .use_image(image, AccessKind::TransferWrite)
        .record_graphics_pass("clear", {
            let image = Arc::clone(image);
            move |ctx| ctx.clear_color_image(&image, color)
        });
    builder.add_external_output_dependency_image(image, AccessKind::ColorAttachmentWrite);
    builder.build()
}
