//! Declarative construction of a [`RenderGraph`].

use std::sync::Arc;

use crate::access::AccessKind;
use crate::command::CommandContext;
use crate::resources::{Buffer, Image};

use super::RenderGraph;
use super::pass::{GraphResource, Pass, PassCallback, PassKind, ResourceAccess};
use super::tracker::ResourceStateTracker;

struct DeclaredPass {
    name: String,
    kind: PassKind,
    accesses: Vec<ResourceAccess>,
    callback: Option<PassCallback>,
}

/// Collects passes and their resource accesses.
///
/// Accesses declared with [`use_image`](Self::use_image) and
/// [`use_buffer`](Self::use_buffer) belong to the next recorded pass.
/// Barriers are synthesized by [`build`](Self::build).
///
/// # Example
///
/// ```
/// use redlilium_frame_sync::{AccessKind, GraphicsDevice, RenderGraphBuilder};
/// use redlilium_frame_sync::types::{ImageDescriptor, ImageFormat, ImageUsage};
///
/// let device = GraphicsDevice::dummy();
/// let color = device
///     .create_image(&ImageDescriptor::new_2d(
///         64,
///         64,
///         ImageFormat::Rgba8Unorm,
///         ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
///     ))
///     .unwrap();
///
/// let mut builder = RenderGraphBuilder::new();
/// builder
///     .use_image(&color, AccessKind::ColorAttachmentWrite)
///     .record_graphics_pass("scene", |_ctx| {});
/// builder
///     .use_image(&color, AccessKind::ShaderRead)
///     .record_compute_pass("post", |_ctx| {});
/// let graph = builder.build();
///
/// // Undefined -> color attachment, then color attachment -> shader read.
/// assert_eq!(graph.barrier_count(), 2);
/// ```
#[derive(Default)]
pub struct RenderGraphBuilder {
    declared: Vec<ResourceAccess>,
    passes: Vec<DeclaredPass>,
    inputs: Vec<ResourceAccess>,
    outputs: Vec<ResourceAccess>,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare how the next pass accesses `image`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is `Undefined` or cannot apply to images, or if the
    /// image was already declared with a different kind for the same pass.
    pub fn use_image(&mut self, image: &Arc<Image>, kind: AccessKind) -> &mut Self {
        assert_destination(kind);
        assert!(
            kind.applies_to_images(),
            "access kind {kind:?} cannot be used on an image"
        );
        self.declare(GraphResource::Image(Arc::clone(image)), kind)
    }

    /// Declare how the next pass accesses `buffer`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is `Undefined` or cannot apply to buffers, or if the
    /// buffer was already declared with a different kind for the same pass.
    pub fn use_buffer(&mut self, buffer: &Arc<Buffer>, kind: AccessKind) -> &mut Self {
        assert_destination(kind);
        assert!(
            kind.applies_to_buffers(),
            "access kind {kind:?} cannot be used on a buffer"
        );
        self.declare(GraphResource::Buffer(Arc::clone(buffer)), kind)
    }

    fn declare(&mut self, resource: GraphResource, kind: AccessKind) -> &mut Self {
        let id = resource.id();
        if let Some(existing) = self.declared.iter().find(|a| a.resource.id() == id) {
            assert_eq!(
                existing.kind,
                kind,
                "resource {:?} declared with conflicting accesses in one pass",
                resource.label()
            );
            return self;
        }
        self.declared.push(ResourceAccess { resource, kind });
        self
    }

    /// Append a pass that uses every access declared since the previous pass.
    pub fn record_pass(
        &mut self,
        kind: PassKind,
        name: impl Into<String>,
        callback: impl Fn(&mut CommandContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.push_pass(kind, name.into(), Some(Box::new(callback)))
    }

    pub fn record_graphics_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl Fn(&mut CommandContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.record_pass(PassKind::Graphics, name, callback)
    }

    pub fn record_compute_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl Fn(&mut CommandContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.record_pass(PassKind::Compute, name, callback)
    }

    pub fn record_transfer_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl Fn(&mut CommandContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.record_pass(PassKind::Transfer, name, callback)
    }

    /// Append a pass that only moves the declared resources to their new accesses.
    pub fn record_synchronization(&mut self, name: impl Into<String>) -> &mut Self {
        self.push_pass(PassKind::Synchronization, name.into(), None)
    }

    fn push_pass(
        &mut self,
        kind: PassKind,
        name: String,
        callback: Option<PassCallback>,
    ) -> &mut Self {
        self.passes.push(DeclaredPass {
            name,
            kind,
            accesses: std::mem::take(&mut self.declared),
            callback,
        });
        self
    }

    /// State `image` is in before the graph runs, e.g. after a deferred upload.
    pub fn add_external_input_dependency_image(
        &mut self,
        image: &Arc<Image>,
        previous: AccessKind,
    ) -> &mut Self {
        let resource = GraphResource::Image(Arc::clone(image));
        Self::set_external(&mut self.inputs, resource, previous);
        self
    }

    /// State `buffer` is in before the graph runs.
    pub fn add_external_input_dependency_buffer(
        &mut self,
        buffer: &Arc<Buffer>,
        previous: AccessKind,
    ) -> &mut Self {
        let resource = GraphResource::Buffer(Arc::clone(buffer));
        Self::set_external(&mut self.inputs, resource, previous);
        self
    }

    /// State `image` must be in after the graph, for a consumer outside it
    /// such as a readback or the present copy.
    pub fn add_external_output_dependency_image(
        &mut self,
        image: &Arc<Image>,
        next: AccessKind,
    ) -> &mut Self {
        assert_destination(next);
        let resource = GraphResource::Image(Arc::clone(image));
        Self::set_external(&mut self.outputs, resource, next);
        self
    }

    /// State `buffer` must be in after the graph.
    pub fn add_external_output_dependency_buffer(
        &mut self,
        buffer: &Arc<Buffer>,
        next: AccessKind,
    ) -> &mut Self {
        assert_destination(next);
        let resource = GraphResource::Buffer(Arc::clone(buffer));
        Self::set_external(&mut self.outputs, resource, next);
        self
    }

    fn set_external(list: &mut Vec<ResourceAccess>, resource: GraphResource, kind: AccessKind) {
        // Validates the kind for the resource type.
        resource.resolve(kind);
        let id = resource.id();
        match list.iter_mut().find(|a| a.resource.id() == id) {
            Some(existing) => existing.kind = kind,
            None => list.push(ResourceAccess { resource, kind }),
        }
    }

    /// Resolve access histories and freeze the passes.
    ///
    /// External outputs are applied after the last pass regardless of when
    /// they were declared.
    pub fn build(self) -> RenderGraph {
        if !self.declared.is_empty() {
            log::warn!(
                "RenderGraphBuilder: {} declared accesses were never recorded in a pass and are dropped",
                self.declared.len()
            );
        }

        let mut tracker = ResourceStateTracker::new();
        for input in &self.inputs {
            tracker.seed(&input.resource, input.kind);
        }

        let mut passes: Vec<Pass> = self
            .passes
            .into_iter()
            .map(|declared| {
                let barriers = declared
                    .accesses
                    .iter()
                    .filter_map(|access| tracker.transition(&access.resource, access.kind))
                    .collect();
                Pass {
                    name: declared.name,
                    kind: declared.kind,
                    accesses: declared.accesses,
                    barriers,
                    callback: declared.callback,
                }
            })
            .collect();

        let output_barriers: Vec<_> = self
            .outputs
            .iter()
            .filter_map(|access| tracker.transition(&access.resource, access.kind))
            .collect();
        if !output_barriers.is_empty() {
            passes.push(Pass {
                name: "external outputs".to_string(),
                kind: PassKind::Synchronization,
                accesses: self.outputs,
                barriers: output_barriers,
                callback: None,
            });
        }

        let graph = RenderGraph::new(passes, tracker.into_final_kinds());
        log::debug!(
            "RenderGraph: built {} passes with {} barriers",
            graph.passes().len(),
            graph.barrier_count()
        );
        graph
    }
}

/// A resource can be left in any state but never moved into `Undefined`.
fn assert_destination(kind: AccessKind) {
    assert!(
        kind != AccessKind::Undefined,
        "Undefined is not a valid access to transition a resource to"
    );
}

impl std::fmt::Debug for RenderGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraphBuilder")
            .field("passes", &self.passes.len())
            .field("declared", &self.declared.len())
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}
