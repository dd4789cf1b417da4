//! Common types shared across the frame core.

// ============================================================================
// Extent3d / Offset3d
// ============================================================================

/// 3D extent for images and copy regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D images).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub const fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by this extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

/// 3D texel offset into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Offset3d {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Create a new 2D offset.
    pub const fn new_2d(x: u32, y: u32) -> Self {
        Self { x, y, z: 0 }
    }
}

// ============================================================================
// ClearValue
// ============================================================================

/// Value written by an image clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear a color image with RGBA values.
    Color([f32; 4]),
    /// Clear a depth and/or stencil image.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color([r, g, b, a])
    }

    /// Create a depth clear value with a zero stencil.
    pub fn depth(value: f32) -> Self {
        Self::DepthStencil {
            depth: value,
            stencil: 0,
        }
    }

    /// Returns true for depth/stencil clear values.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::DepthStencil { .. })
    }
}

// ============================================================================
// QueueKind
// ============================================================================

/// The kind of GPU queue a command buffer is allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueKind {
    /// Graphics queue, also capable of compute and transfer work.
    #[default]
    Graphics,
    /// Async compute queue.
    Compute,
    /// Dedicated transfer queue.
    Transfer,
    /// Queue used for the final copy into the presentable image.
    Present,
}
