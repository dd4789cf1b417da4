//! GPU resources.
//!
//! This module contains the resource types created by [`GraphicsDevice`]:
//! - [`Buffer`] - GPU memory buffer
//! - [`Image`] - GPU image
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//! Each one carries a process-unique [`ResourceId`] that keys access tracking.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod image;

use std::sync::atomic::{AtomicU64, Ordering};

pub use buffer::Buffer;
pub use image::Image;

/// Process-unique identifier of a buffer or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
