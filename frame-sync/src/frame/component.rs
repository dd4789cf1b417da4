//! Hooks into the frame lifecycle.

/// Identifies the frame a hook is called for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameInfo {
    /// Zero-based number of the frame since the manager was created.
    pub frame_number: u64,
    /// Frame-in-flight slot the frame uses.
    pub slot: usize,
}

/// A subsystem that follows the frame lifecycle.
///
/// Components are registered with
/// [`FrameManager::add_component`](super::FrameManager::add_component) and
/// called in registration order. Every hook defaults to doing nothing.
pub trait FrameComponent: Send {
    /// After the slot fence was waited on and a swapchain image acquired.
    fn on_frame_start(&mut self, _info: &FrameInfo) {}

    /// Before deferred uploads and the main command buffer are submitted.
    fn on_pre_main_submission(&mut self, _info: &FrameInfo) {}

    /// After the main command buffer was submitted.
    fn on_post_main_submission(&mut self, _info: &FrameInfo) {}

    /// After the frame was presented and its readbacks were delivered.
    fn on_frame_complete(&mut self, _info: &FrameInfo) {}
}
