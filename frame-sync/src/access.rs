//! Logical resource accesses and their synchronization scopes.
//!
//! Passes and deferred operations describe what they do to a resource with an
//! [`AccessKind`]. The [`AccessMapper`] turns that into the concrete
//! [`AccessScope`] a barrier needs:
//!
//! | Kind | Stages | Access | Layout |
//! |------|--------|--------|--------|
//! | `Undefined` | none | none | `Undefined` |
//! | `TransferRead` | `ALL_TRANSFER` | `TRANSFER_READ` | `TransferSrcOptimal` |
//! | `TransferWrite` | `ALL_TRANSFER` | `TRANSFER_WRITE` | `TransferDstOptimal` |
//! | `ColorAttachmentRead` | `COLOR_ATTACHMENT_OUTPUT` | `COLOR_ATTACHMENT_READ` | `ColorAttachmentOptimal` |
//! | `ColorAttachmentWrite` | `COLOR_ATTACHMENT_OUTPUT` | `COLOR_ATTACHMENT_READ \| WRITE` | `ColorAttachmentOptimal` |
//! | `DepthAttachmentRead` | `EARLY \| LATE_FRAGMENT_TESTS` | `DEPTH_STENCIL_READ` | `DepthStencilAttachmentOptimal` |
//! | `DepthAttachmentWrite` | `EARLY \| LATE_FRAGMENT_TESTS` | `DEPTH_STENCIL_READ \| WRITE` | `DepthStencilAttachmentOptimal` |
//! | `ShaderRead` | `ALL_COMMANDS` | `SHADER_READ` | `ReadOnlyOptimal` |
//! | `ShaderRandomWrite` | `COMPUTE_SHADER` | `SHADER_STORAGE_WRITE` | `General` |
//! | `ShaderReadRandomWrite` | `COMPUTE_SHADER` | `SHADER_STORAGE_READ \| WRITE` | `General` |
//! | `VertexRead` | `VERTEX_INPUT` | `VERTEX_ATTRIBUTE_READ` | - |
//! | `IndexRead` | `VERTEX_INPUT` | `INDEX_READ` | - |
//! | `IndirectRead` | `DRAW_INDIRECT` | `INDIRECT_COMMAND_READ` | - |
//! | `UniformRead` | `ALL_GRAPHICS \| COMPUTE_SHADER` | `UNIFORM_READ` | - |
//! | `HostRead` | `HOST` | `HOST_READ` | - |
//! | `HostWrite` | `HOST` | `HOST_WRITE` | - |
//! | `PresentSrc` | `BOTTOM_OF_PIPE` | none | `PresentSrc` |
//!
//! Buffer-only kinds carry an `Undefined` layout, which is ignored.

use std::sync::Arc;

use bitflags::bitflags;

use crate::resources::{Buffer, Image, ResourceId};
use crate::types::{BufferUsage, ImageAspect, ImageLayout};

bitflags! {
    /// Pipeline stages a synchronization scope covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u64 {
        const TOP_OF_PIPE = 1 << 0;
        const DRAW_INDIRECT = 1 << 1;
        const VERTEX_INPUT = 1 << 2;
        const VERTEX_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        const LATE_FRAGMENT_TESTS = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER = 1 << 8;
        const ALL_TRANSFER = 1 << 9;
        const BOTTOM_OF_PIPE = 1 << 10;
        const HOST = 1 << 11;
        const ALL_GRAPHICS = 1 << 12;
        const ALL_COMMANDS = 1 << 13;
    }
}

impl PipelineStages {
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// Memory accesses a synchronization scope covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u64 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const SHADER_READ = 1 << 4;
        const COLOR_ATTACHMENT_READ = 1 << 5;
        const COLOR_ATTACHMENT_WRITE = 1 << 6;
        const DEPTH_STENCIL_READ = 1 << 7;
        const DEPTH_STENCIL_WRITE = 1 << 8;
        const TRANSFER_READ = 1 << 9;
        const TRANSFER_WRITE = 1 << 10;
        const HOST_READ = 1 << 11;
        const HOST_WRITE = 1 << 12;
        const SHADER_STORAGE_READ = 1 << 13;
        const SHADER_STORAGE_WRITE = 1 << 14;
    }
}

impl AccessFlags {
    pub const NONE: Self = Self::empty();

    /// Every flag that denotes a write.
    pub const WRITES: Self = Self::COLOR_ATTACHMENT_WRITE
        .union(Self::DEPTH_STENCIL_WRITE)
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE)
        .union(Self::SHADER_STORAGE_WRITE);
}

/// How a resource is accessed by a pass or deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessKind {
    /// No prior access; contents may be discarded.
    #[default]
    Undefined,
    TransferRead,
    TransferWrite,
    ColorAttachmentRead,
    ColorAttachmentWrite,
    DepthAttachmentRead,
    DepthAttachmentWrite,
    /// Sampled or read-only storage access from any shader stage.
    ShaderRead,
    ShaderRandomWrite,
    ShaderReadRandomWrite,
    VertexRead,
    IndexRead,
    IndirectRead,
    UniformRead,
    HostRead,
    HostWrite,
    /// Handed to the presentation engine.
    PresentSrc,
}

impl AccessKind {
    /// Every access kind, in declaration order.
    pub const ALL: [AccessKind; 17] = [
        Self::Undefined,
        Self::TransferRead,
        Self::TransferWrite,
        Self::ColorAttachmentRead,
        Self::ColorAttachmentWrite,
        Self::DepthAttachmentRead,
        Self::DepthAttachmentWrite,
        Self::ShaderRead,
        Self::ShaderRandomWrite,
        Self::ShaderReadRandomWrite,
        Self::VertexRead,
        Self::IndexRead,
        Self::IndirectRead,
        Self::UniformRead,
        Self::HostRead,
        Self::HostWrite,
        Self::PresentSrc,
    ];

    /// Returns true if images can be accessed this way.
    pub fn applies_to_images(self) -> bool {
        !matches!(
            self,
            Self::VertexRead
                | Self::IndexRead
                | Self::IndirectRead
                | Self::UniformRead
                | Self::HostRead
                | Self::HostWrite
        )
    }

    /// Returns true if buffers can be accessed this way.
    pub fn applies_to_buffers(self) -> bool {
        !matches!(
            self,
            Self::ColorAttachmentRead
                | Self::ColorAttachmentWrite
                | Self::DepthAttachmentRead
                | Self::DepthAttachmentWrite
                | Self::PresentSrc
        )
    }

    /// Returns true if this access writes the resource.
    pub fn is_write(self) -> bool {
        AccessMapper::resolve(self).is_write()
    }

    /// The read access a finished upload into a buffer of `usage` is handed to.
    ///
    /// Priority: vertex, index, indirect, uniform, then generic shader reads.
    pub fn default_read_for(usage: BufferUsage) -> Self {
        if usage.contains(BufferUsage::VERTEX) {
            Self::VertexRead
        } else if usage.contains(BufferUsage::INDEX) {
            Self::IndexRead
        } else if usage.contains(BufferUsage::INDIRECT) {
            Self::IndirectRead
        } else if usage.contains(BufferUsage::UNIFORM) {
            Self::UniformRead
        } else {
            Self::ShaderRead
        }
    }
}

/// Stage, access and layout of one side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessScope {
    pub stages: PipelineStages,
    pub access: AccessFlags,
    pub layout: ImageLayout,
}

impl AccessScope {
    /// The scope of a resource nobody has touched yet.
    pub const UNDEFINED: Self = Self {
        stages: PipelineStages::NONE,
        access: AccessFlags::NONE,
        layout: ImageLayout::Undefined,
    };

    pub const fn new(stages: PipelineStages, access: AccessFlags, layout: ImageLayout) -> Self {
        Self {
            stages,
            access,
            layout,
        }
    }

    /// Returns true if the scope contains any write access.
    pub fn is_write(&self) -> bool {
        self.access.intersects(AccessFlags::WRITES)
    }
}

/// Maps logical access kinds to synchronization scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessMapper;

impl AccessMapper {
    /// Resolve an access kind to its (stage, access, layout) triple.
    pub const fn resolve(kind: AccessKind) -> AccessScope {
        use AccessFlags as A;
        use ImageLayout as L;
        use PipelineStages as S;

        match kind {
            AccessKind::Undefined => AccessScope::UNDEFINED,
            AccessKind::TransferRead => {
                AccessScope::new(S::ALL_TRANSFER, A::TRANSFER_READ, L::TransferSrcOptimal)
            }
            AccessKind::TransferWrite => {
                AccessScope::new(S::ALL_TRANSFER, A::TRANSFER_WRITE, L::TransferDstOptimal)
            }
            AccessKind::ColorAttachmentRead => AccessScope::new(
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_READ,
                L::ColorAttachmentOptimal,
            ),
            AccessKind::ColorAttachmentWrite => AccessScope::new(
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_READ.union(A::COLOR_ATTACHMENT_WRITE),
                L::ColorAttachmentOptimal,
            ),
            AccessKind::DepthAttachmentRead => AccessScope::new(
                S::EARLY_FRAGMENT_TESTS.union(S::LATE_FRAGMENT_TESTS),
                A::DEPTH_STENCIL_READ,
                L::DepthStencilAttachmentOptimal,
            ),
            AccessKind::DepthAttachmentWrite => AccessScope::new(
                S::EARLY_FRAGMENT_TESTS.union(S::LATE_FRAGMENT_TESTS),
                A::DEPTH_STENCIL_READ.union(A::DEPTH_STENCIL_WRITE),
                L::DepthStencilAttachmentOptimal,
            ),
            AccessKind::ShaderRead => {
                AccessScope::new(S::ALL_COMMANDS, A::SHADER_READ, L::ReadOnlyOptimal)
            }
            AccessKind::ShaderRandomWrite => {
                AccessScope::new(S::COMPUTE_SHADER, A::SHADER_STORAGE_WRITE, L::General)
            }
            AccessKind::ShaderReadRandomWrite => AccessScope::new(
                S::COMPUTE_SHADER,
                A::SHADER_STORAGE_READ.union(A::SHADER_STORAGE_WRITE),
                L::General,
            ),
            AccessKind::VertexRead => {
                AccessScope::new(S::VERTEX_INPUT, A::VERTEX_ATTRIBUTE_READ, L::Undefined)
            }
            AccessKind::IndexRead => AccessScope::new(S::VERTEX_INPUT, A::INDEX_READ, L::Undefined),
            AccessKind::IndirectRead => {
                AccessScope::new(S::DRAW_INDIRECT, A::INDIRECT_COMMAND_READ, L::Undefined)
            }
            AccessKind::UniformRead => AccessScope::new(
                S::ALL_GRAPHICS.union(S::COMPUTE_SHADER),
                A::UNIFORM_READ,
                L::Undefined,
            ),
            AccessKind::HostRead => AccessScope::new(S::HOST, A::HOST_READ, L::Undefined),
            AccessKind::HostWrite => AccessScope::new(S::HOST, A::HOST_WRITE, L::Undefined),
            AccessKind::PresentSrc => {
                AccessScope::new(S::BOTTOM_OF_PIPE, A::NONE, L::PresentSrc)
            }
        }
    }

    /// Resolve an access kind used on an image.
    ///
    /// # Panics
    ///
    /// Panics if the kind cannot be applied to images.
    pub fn resolve_for_image(kind: AccessKind) -> AccessScope {
        assert!(
            kind.applies_to_images(),
            "access kind {kind:?} cannot be used on an image"
        );
        Self::resolve(kind)
    }

    /// Resolve an access kind used on a buffer; the layout is always `Undefined`.
    ///
    /// # Panics
    ///
    /// Panics if the kind cannot be applied to buffers.
    pub fn resolve_for_buffer(kind: AccessKind) -> AccessScope {
        assert!(
            kind.applies_to_buffers(),
            "access kind {kind:?} cannot be used on a buffer"
        );
        AccessScope {
            layout: ImageLayout::Undefined,
            ..Self::resolve(kind)
        }
    }
}

// ============================================================================
// Barriers
// ============================================================================

/// A layout transition and memory dependency on one image.
#[derive(Debug, Clone)]
pub struct ImageBarrier {
    pub image: Arc<Image>,
    pub src: AccessScope,
    pub dst: AccessScope,
    pub aspect: ImageAspect,
}

/// A memory dependency on one buffer.
#[derive(Debug, Clone)]
pub struct BufferBarrier {
    pub buffer: Arc<Buffer>,
    pub src: AccessScope,
    pub dst: AccessScope,
}

/// A single resource barrier.
#[derive(Debug, Clone)]
pub enum Barrier {
    Image(ImageBarrier),
    Buffer(BufferBarrier),
}

impl Barrier {
    /// Transition `image` from one access kind to another.
    pub fn image(image: &Arc<Image>, from: AccessKind, to: AccessKind) -> Self {
        Self::image_scopes(
            image,
            AccessMapper::resolve_for_image(from),
            AccessMapper::resolve_for_image(to),
        )
    }

    /// Transition `image` between two explicit scopes.
    pub fn image_scopes(image: &Arc<Image>, src: AccessScope, dst: AccessScope) -> Self {
        Self::Image(ImageBarrier {
            image: Arc::clone(image),
            src,
            dst,
            aspect: image.format().aspects(),
        })
    }

    /// Order accesses to `buffer` from one access kind to another.
    pub fn buffer(buffer: &Arc<Buffer>, from: AccessKind, to: AccessKind) -> Self {
        Self::buffer_scopes(
            buffer,
            AccessMapper::resolve_for_buffer(from),
            AccessMapper::resolve_for_buffer(to),
        )
    }

    /// Order accesses to `buffer` between two explicit scopes.
    pub fn buffer_scopes(buffer: &Arc<Buffer>, src: AccessScope, dst: AccessScope) -> Self {
        Self::Buffer(BufferBarrier {
            buffer: Arc::clone(buffer),
            src,
            dst,
        })
    }

    /// The resource this barrier applies to.
    pub fn resource_id(&self) -> ResourceId {
        match self {
            Self::Image(barrier) => barrier.image.id(),
            Self::Buffer(barrier) => barrier.buffer.id(),
        }
    }

    pub fn src(&self) -> AccessScope {
        match self {
            Self::Image(barrier) => barrier.src,
            Self::Buffer(barrier) => barrier.src,
        }
    }

    pub fn dst(&self) -> AccessScope {
        match self {
            Self::Image(barrier) => barrier.dst,
            Self::Buffer(barrier) => barrier.dst,
        }
    }
}
