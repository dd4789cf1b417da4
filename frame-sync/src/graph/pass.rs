//! Passes of a built render graph.

use std::sync::Arc;

use crate::access::{AccessKind, AccessMapper, AccessScope, Barrier};
use crate::command::{CommandContext, CommandList};
use crate::resources::{Buffer, Image, ResourceId};

/// Records the commands of one pass.
pub type PassCallback = Box<dyn Fn(&mut CommandContext<'_>) + Send + Sync>;

/// The command context a pass records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Graphics,
    Compute,
    Transfer,
    /// Barriers only, no recorded commands.
    Synchronization,
}

impl PassKind {
    pub(crate) fn context(self, list: &mut CommandList) -> CommandContext<'_> {
        match self {
            Self::Graphics | Self::Synchronization => CommandContext::Graphics(list),
            Self::Compute => CommandContext::Compute(list),
            Self::Transfer => CommandContext::Transfer(list),
        }
    }
}

/// A resource referenced by the graph.
#[derive(Debug, Clone)]
pub enum GraphResource {
    Image(Arc<Image>),
    Buffer(Arc<Buffer>),
}

impl GraphResource {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Image(image) => image.id(),
            Self::Buffer(buffer) => buffer.id(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Image(image) => image.label(),
            Self::Buffer(buffer) => buffer.label(),
        }
    }

    /// Resolve `kind` for this resource type.
    ///
    /// # Panics
    ///
    /// Panics if `kind` cannot apply to this resource type.
    pub fn resolve(&self, kind: AccessKind) -> AccessScope {
        match self {
            Self::Image(_) => AccessMapper::resolve_for_image(kind),
            Self::Buffer(_) => AccessMapper::resolve_for_buffer(kind),
        }
    }

    pub(crate) fn barrier(&self, src: AccessScope, dst: AccessScope) -> Barrier {
        match self {
            Self::Image(image) => Barrier::image_scopes(image, src, dst),
            Self::Buffer(buffer) => Barrier::buffer_scopes(buffer, src, dst),
        }
    }
}

/// One declared access of a pass.
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    pub resource: GraphResource,
    pub kind: AccessKind,
}

/// A pass with the barriers that precede it.
pub struct Pass {
    pub(crate) name: String,
    pub(crate) kind: PassKind,
    pub(crate) accesses: Vec<ResourceAccess>,
    pub(crate) barriers: Vec<Barrier>,
    pub(crate) callback: Option<PassCallback>,
}

impl Pass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Accesses declared for this pass.
    pub fn accesses(&self) -> &[ResourceAccess] {
        &self.accesses
    }

    /// Barriers issued immediately before the pass's commands.
    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    /// Returns true if the pass records commands of its own.
    pub fn is_recordable(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn record(&self, list: &mut CommandList) {
        let mut ctx = self.kind.context(list);
        match &self.callback {
            Some(callback) => {
                ctx.begin_label(self.name.as_str());
                ctx.pipeline_barrier(self.barriers.iter().cloned());
                callback(&mut ctx);
                ctx.end_label();
            }
            None => ctx.pipeline_barrier(self.barriers.iter().cloned()),
        }
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("accesses", &self.accesses.len())
            .field("barriers", &self.barriers.len())
            .finish()
    }
}
