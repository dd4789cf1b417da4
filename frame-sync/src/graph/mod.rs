//! Render graph with automatic barrier synthesis.
//!
//! Passes declare which resources they touch and how, as [`AccessKind`]s.
//! [`RenderGraphBuilder::build`] walks the passes in declaration order, keeps
//! the last known access of every resource and inserts exactly one barrier
//! before a pass whenever the resolved (stage, access, layout) of a resource
//! changes. Identical consecutive accesses produce no barrier, so a static
//! graph re-executed every frame does not over-synchronize.
//!
//! ```text
//! use_image(color, ColorAttachmentWrite) -> "scene"    barrier: Undefined -> ColorAttachment
//! use_image(color, ColorAttachmentWrite) -> "overlay"  (no barrier)
//! use_image(color, ShaderRead)           -> "post"     barrier: ColorAttachment -> ShaderRead
//! ```

mod builder;
mod pass;
mod tracker;

pub use builder::RenderGraphBuilder;
pub use pass::{GraphResource, Pass, PassCallback, PassKind, ResourceAccess};
pub use tracker::{AccessRecord, ResourceStateTracker};

use std::collections::HashMap;

use crate::access::AccessKind;
use crate::command::CommandList;
use crate::frame::FrameManager;
use crate::resources::ResourceId;

/// An immutable, ordered list of passes and the barriers before each.
#[derive(Debug)]
pub struct RenderGraph {
    passes: Vec<Pass>,
    final_access: HashMap<ResourceId, AccessKind>,
}

impl RenderGraph {
    fn new(passes: Vec<Pass>, final_access: HashMap<ResourceId, AccessKind>) -> Self {
        Self {
            passes,
            final_access,
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Total number of resource barriers across all passes.
    pub fn barrier_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.barriers().len()).sum()
    }

    /// Access a resource is left in after the graph, if the graph uses it.
    pub fn final_access(&self, resource: ResourceId) -> Option<AccessKind> {
        self.final_access.get(&resource).copied()
    }

    /// Record every pass, with its barriers, into `list`.
    pub fn record(&self, list: &mut CommandList) {
        for pass in &self.passes {
            pass.record(list);
        }
    }

    /// Record the graph into the current frame's main command list.
    ///
    /// # Panics
    ///
    /// Panics unless `frames` is recording a frame.
    pub fn execute(&self, frames: &mut FrameManager) {
        self.record(frames.recording_list("RenderGraph::execute"));
    }
}
