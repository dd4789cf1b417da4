//! Per-resource access history used to synthesize barriers.

use std::collections::HashMap;

use crate::access::{AccessKind, AccessScope, Barrier};
use crate::resources::ResourceId;

use super::pass::GraphResource;

/// The last known access of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    pub kind: AccessKind,
    pub scope: AccessScope,
}

/// Tracks the current access of every resource the graph has seen.
///
/// Records are created lazily on first use. A transition yields a barrier
/// only when the resolved scope actually changes.
#[derive(Debug, Default)]
pub struct ResourceStateTracker {
    records: HashMap<ResourceId, AccessRecord>,
}

impl ResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `resource` is already in `kind` before the graph runs.
    pub fn seed(&mut self, resource: &GraphResource, kind: AccessKind) {
        let scope = resource.resolve(kind);
        let record = AccessRecord { kind, scope };
        self.records.insert(resource.id(), record);
    }

    /// Move `resource` to `kind`, returning the barrier that orders it.
    ///
    /// Buffers seen for the first time need no barrier. Images seen for the
    /// first time transition from `Undefined`.
    pub fn transition(&mut self, resource: &GraphResource, kind: AccessKind) -> Option<Barrier> {
        let next = resource.resolve(kind);
        let previous = self
            .records
            .insert(resource.id(), AccessRecord { kind, scope: next });

        let previous_scope = match (previous, resource) {
            (Some(record), _) => record.scope,
            (None, GraphResource::Buffer(_)) => return None,
            (None, GraphResource::Image(_)) => {
                if !kind.is_write() {
                    log::warn!(
                        "RenderGraph: image {:?} is first read as {:?} without an input dependency; its contents are undefined",
                        resource.label(),
                        kind
                    );
                }
                AccessScope::UNDEFINED
            }
        };

        (previous_scope != next).then(|| resource.barrier(previous_scope, next))
    }

    pub fn get(&self, id: ResourceId) -> Option<AccessRecord> {
        self.records.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Final access kind of every tracked resource.
    pub fn into_final_kinds(self) -> HashMap<ResourceId, AccessKind> {
        self.records
            .into_iter()
            .map(|(id, record)| (id, record.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessMapper;
    use crate::device::GraphicsDevice;
    use crate::types::{BufferDescriptor, BufferUsage, ImageDescriptor, ImageFormat, ImageUsage};

    fn image() -> GraphResource {
        let device = GraphicsDevice::dummy();
        GraphResource::Image(
            device
                .create_image(&ImageDescriptor::new_2d(
                    8,
                    8,
                    ImageFormat::Rgba8Unorm,
                    ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
                ))
                .unwrap(),
        )
    }

    #[test]
    fn test_identical_access_needs_no_barrier() {
        let image = image();
        let mut tracker = ResourceStateTracker::new();
        let first = tracker.transition(&image, AccessKind::ColorAttachmentWrite);
        assert!(first.is_some());
        let repeated = tracker.transition(&image, AccessKind::ColorAttachmentWrite);
        assert!(repeated.is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_divergent_access_uses_mapped_scopes() {
        let image = image();
        let mut tracker = ResourceStateTracker::new();
        tracker.transition(&image, AccessKind::ColorAttachmentWrite);
        let barrier = tracker.transition(&image, AccessKind::ShaderRead).unwrap();
        assert_eq!(
            barrier.src(),
            AccessMapper::resolve(AccessKind::ColorAttachmentWrite)
        );
        assert_eq!(barrier.dst(), AccessMapper::resolve(AccessKind::ShaderRead));
        assert_eq!(
            tracker.get(image.id()).unwrap().kind,
            AccessKind::ShaderRead
        );
    }

    #[test]
    fn test_seeded_and_first_buffer_use() {
        let device = GraphicsDevice::dummy();
        let buffer = GraphResource::Buffer(
            device
                .create_buffer(&BufferDescriptor::new(64, BufferUsage::STORAGE))
                .unwrap(),
        );
        let image = image();
        let mut tracker = ResourceStateTracker::new();
        let first_write = tracker.transition(&buffer, AccessKind::ShaderRandomWrite);
        assert!(first_write.is_none());

        tracker.seed(&image, AccessKind::ShaderRead);
        assert!(tracker.transition(&image, AccessKind::ShaderRead).is_none());
    }
}
