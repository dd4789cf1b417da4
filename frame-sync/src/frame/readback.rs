//! Post-graphics readbacks.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::resources::{Buffer, Image};

/// What a readback copies back to the host.
#[derive(Debug, Clone)]
pub enum ReadbackSource {
    /// The whole buffer.
    Buffer(Arc<Buffer>),
    /// The base level of the image, tightly packed. The image must be in
    /// `TransferRead` state when the main command buffer ends.
    Image(Arc<Image>),
}

impl ReadbackSource {
    /// Number of bytes the readback produces.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Buffer(buffer) => buffer.size(),
            Self::Image(image) => image.descriptor().base_level_size(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Buffer(buffer) => buffer.label(),
            Self::Image(image) => image.label(),
        }
    }
}

/// The result of a readback, available once its frame has completed.
///
/// Cloning a handle shares the same result; whichever clone calls
/// [`try_take`](Self::try_take) first receives the bytes.
#[derive(Debug, Clone)]
pub struct ReadbackHandle {
    frame_number: u64,
    result: Arc<Mutex<ReadbackResult>>,
}

#[derive(Debug, Default)]
enum ReadbackResult {
    #[default]
    Pending,
    Ready(Vec<u8>),
    Taken,
}

impl ReadbackHandle {
    pub(crate) fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            result: Arc::new(Mutex::new(ReadbackResult::Pending)),
        }
    }

    pub(crate) fn fulfil(&self, bytes: Vec<u8>) {
        *self.result.lock() = ReadbackResult::Ready(bytes);
    }

    /// The frame whose GPU work this readback observes.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns true once the bytes are available and not yet taken.
    pub fn is_ready(&self) -> bool {
        matches!(*self.result.lock(), ReadbackResult::Ready(_))
    }

    /// Take the bytes, leaving the handle empty.
    pub fn try_take(&self) -> Option<Vec<u8>> {
        let mut result = self.result.lock();
        match std::mem::replace(&mut *result, ReadbackResult::Taken) {
            ReadbackResult::Ready(bytes) => Some(bytes),
            other => {
                *result = other;
                None
            }
        }
    }
}

static_assertions::assert_impl_all!(ReadbackHandle: Send, Sync);
