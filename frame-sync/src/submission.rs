//! Deferred uploads and clears, executed once per frame before the main pass.
//!
//! Callers enqueue work at any point during a frame. Each enqueue copies the
//! caller's bytes into a fresh host-visible [`StagingAllocation`] immediately
//! and appends an owned [`PendingOperation`]. When the frame is submitted,
//! [`SubmissionQueue::execute`] records every pending operation, in enqueue
//! order, into one disposable command buffer:
//!
//! ```text
//! barrier(tracked state -> TransferWrite)
//! copy or clear
//! barrier(TransferWrite -> final access)
//! ```
//!
//! The submission waits on the slot timeline's baseline and signals
//! [`FramePhase::PreTransferFinished`]. Staging buffers and the command buffer
//! stay alive until [`SubmissionQueue::on_frame_complete`] has waited on the
//! completion fence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::access::{AccessKind, AccessMapper, AccessScope, Barrier, PipelineStages};
use crate::backend::{GpuCommandBuffer, GpuFence, SubmitInfo};
use crate::command::{CommandContext, CommandList};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Image, ResourceId};
use crate::timeline::{FramePhase, FrameTimeline};
use crate::types::{
    BufferCopy, BufferDescriptor, BufferImageCopy, BufferUsage, ClearValue, QueueKind,
};

/// A host-visible buffer holding the source bytes of one transfer.
#[derive(Debug)]
pub struct StagingAllocation {
    buffer: Arc<Buffer>,
}

impl StagingAllocation {
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }
}

/// One deferred GPU-side operation.
#[derive(Debug)]
pub enum PendingOperation {
    /// Copy staging bytes into a buffer, then hand it to `final_access`.
    BufferUpload {
        staging: StagingAllocation,
        dst: Arc<Buffer>,
        final_access: AccessKind,
    },
    /// Copy staging texels into the base level of an image, then make it shader-readable.
    ImageUpload {
        staging: StagingAllocation,
        dst: Arc<Image>,
    },
    /// Clear an image, then make it shader-readable.
    ImageClear { dst: Arc<Image>, value: ClearValue },
}

impl PendingOperation {
    /// The resource this operation writes.
    pub fn destination(&self) -> ResourceId {
        match self {
            Self::BufferUpload { dst, .. } => dst.id(),
            Self::ImageUpload { dst, .. } | Self::ImageClear { dst, .. } => dst.id(),
        }
    }

    pub fn staging(&self) -> Option<&StagingAllocation> {
        match self {
            Self::BufferUpload { staging, .. } | Self::ImageUpload { staging, .. } => Some(staging),
            Self::ImageClear { .. } => None,
        }
    }

    fn record(&self, ctx: &mut CommandContext<'_>, states: &mut HashMap<ResourceId, AccessScope>) {
        let transfer_write = AccessMapper::resolve(AccessKind::TransferWrite);
        let previous = states
            .get(&self.destination())
            .copied()
            .unwrap_or(AccessScope::UNDEFINED);

        match self {
            Self::BufferUpload {
                staging,
                dst,
                final_access,
            } => {
                let write = AccessMapper::resolve_for_buffer(AccessKind::TransferWrite);
                let done = AccessMapper::resolve_for_buffer(*final_access);
                ctx.pipeline_barrier([Barrier::buffer_scopes(dst, previous, write)]);
                ctx.copy_buffer(&staging.buffer, dst, BufferCopy::whole(dst.size()));
                ctx.pipeline_barrier([Barrier::buffer_scopes(dst, write, done)]);
                states.insert(dst.id(), done);
            }
            Self::ImageUpload { staging, dst } => {
                let done = AccessMapper::resolve(AccessKind::ShaderRead);
                ctx.pipeline_barrier([Barrier::image_scopes(dst, previous, transfer_write)]);
                ctx.copy_buffer_to_image(&staging.buffer, dst, BufferImageCopy::whole(dst.size()));
                ctx.pipeline_barrier([Barrier::image_scopes(dst, transfer_write, done)]);
                states.insert(dst.id(), done);
            }
            Self::ImageClear { dst, value } => {
                let done = AccessMapper::resolve(AccessKind::ShaderRead);
                ctx.pipeline_barrier([Barrier::image_scopes(dst, previous, transfer_write)]);
                match *value {
                    ClearValue::Color(color) => ctx.clear_color_image(dst, color),
                    ClearValue::DepthStencil { depth, stencil } => {
                        ctx.clear_depth_stencil_image(dst, depth, stencil)
                    }
                }
                ctx.pipeline_barrier([Barrier::image_scopes(dst, transfer_write, done)]);
                states.insert(dst.id(), done);
            }
        }
    }
}

/// Work submitted this frame that has not been confirmed complete yet.
struct InFlightBatch {
    operations: Vec<PendingOperation>,
    _command_buffer: GpuCommandBuffer,
}

/// FIFO of deferred operations and the staging memory they depend on.
pub struct SubmissionQueue {
    device: Arc<GraphicsDevice>,
    pending: Vec<PendingOperation>,
    in_flight: Option<InFlightBatch>,
    completion_fence: GpuFence,
}

impl SubmissionQueue {
    pub fn new(device: Arc<GraphicsDevice>) -> Result<Self, GraphicsError> {
        let completion_fence = device.backend().create_fence(false)?;
        Ok(Self {
            device,
            pending: Vec::new(),
            in_flight: None,
            completion_fence,
        })
    }

    /// Upload `bytes` into `dst` and hand it to the read access implied by its usage.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the buffer.
    pub fn enqueue_buffer_upload(
        &mut self,
        dst: &Arc<Buffer>,
        bytes: &[u8],
    ) -> Result<(), GraphicsError> {
        let final_access = AccessKind::default_read_for(dst.usage());
        self.enqueue_buffer_upload_with_access(dst, bytes, final_access)
    }

    /// Upload `bytes` into `dst` and hand it to `final_access`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the buffer or `final_access` cannot apply to buffers.
    pub fn enqueue_buffer_upload_with_access(
        &mut self,
        dst: &Arc<Buffer>,
        bytes: &[u8],
        final_access: AccessKind,
    ) -> Result<(), GraphicsError> {
        assert!(
            bytes.len() as u64 >= dst.size(),
            "upload of {} bytes does not cover buffer {:?} of {} bytes",
            bytes.len(),
            dst.label(),
            dst.size()
        );
        assert!(
            final_access.applies_to_buffers(),
            "access kind {final_access:?} cannot be used on a buffer"
        );
        let staging = self.create_staging(&bytes[..dst.size() as usize], bytes.len())?;
        self.pending.push(PendingOperation::BufferUpload {
            staging,
            dst: Arc::clone(dst),
            final_access,
        });
        Ok(())
    }

    /// Upload tightly packed texels into the base level of `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` does not cover the base level.
    pub fn enqueue_image_upload(
        &mut self,
        dst: &Arc<Image>,
        bytes: &[u8],
    ) -> Result<(), GraphicsError> {
        let required = dst.descriptor().base_level_size();
        assert!(
            bytes.len() as u64 >= required,
            "upload of {} bytes does not cover image {:?} of {} bytes",
            bytes.len(),
            dst.label(),
            required
        );
        let staging = self.create_staging(&bytes[..required as usize], bytes.len())?;
        self.pending.push(PendingOperation::ImageUpload {
            staging,
            dst: Arc::clone(dst),
        });
        Ok(())
    }

    /// Clear `dst` to `value`.
    ///
    /// # Panics
    ///
    /// Panics if the clear value kind does not match the image format.
    pub fn enqueue_image_clear(&mut self, dst: &Arc<Image>, value: ClearValue) {
        assert_eq!(
            value.is_depth_stencil(),
            dst.format().is_depth_stencil(),
            "clear value {value:?} does not match format {:?}",
            dst.format()
        );
        self.pending.push(PendingOperation::ImageClear {
            dst: Arc::clone(dst),
            value,
        });
    }

    fn create_staging(
        &self,
        data: &[u8],
        provided: usize,
    ) -> Result<StagingAllocation, GraphicsError> {
        if provided > data.len() {
            log::warn!(
                "SubmissionQueue: {} trailing upload bytes ignored",
                provided - data.len()
            );
        }
        let buffer = self.device.create_buffer(
            &BufferDescriptor::new(data.len() as u64, BufferUsage::STAGING_UPLOAD)
                .with_label("staging"),
        )?;
        self.device.write_buffer(&buffer, 0, data)?;
        Ok(StagingAllocation { buffer })
    }

    /// Record and submit every pending operation for the frame of `timeline`.
    ///
    /// With nothing pending, `PreTransferFinished` is signaled from the host
    /// and no command buffer is submitted.
    ///
    /// # Panics
    ///
    /// Panics if the previous batch has not been completed with
    /// [`on_frame_complete`](Self::on_frame_complete).
    pub fn execute(&mut self, timeline: &FrameTimeline) -> Result<(), GraphicsError> {
        assert!(
            self.in_flight.is_none(),
            "previous transfer batch was never completed"
        );
        let backend = self.device.backend();

        if self.pending.is_empty() {
            log::trace!("SubmissionQueue: nothing pending, signaling transfer phase");
            return backend.signal_semaphore(
                timeline.semaphore(),
                timeline.value(FramePhase::PreTransferFinished),
            );
        }

        let operations = std::mem::take(&mut self.pending);
        let mut list = CommandList::new();
        let mut states = HashMap::new();
        {
            let mut ctx = CommandContext::Graphics(&mut list);
            ctx.begin_label("deferred submission");
            for operation in &operations {
                operation.record(&mut ctx, &mut states);
            }
            ctx.end_label();
        }

        let command_buffer = backend.create_command_buffer(QueueKind::Graphics)?;
        let waits = [timeline.baseline_wait_info(PipelineStages::ALL_COMMANDS)];
        let signals = [timeline.signal_info(
            FramePhase::PreTransferFinished,
            PipelineStages::ALL_COMMANDS,
        )];
        backend.submit(&SubmitInfo {
            label: "deferred submission",
            queue: QueueKind::Graphics,
            command_buffer: Some((&command_buffer, &list)),
            waits: &waits,
            signals: &signals,
            fence: Some(&self.completion_fence),
        })?;

        log::trace!(
            "SubmissionQueue: submitted {} operations ({} barriers)",
            operations.len(),
            list.barrier_count()
        );
        self.in_flight = Some(InFlightBatch {
            operations,
            _command_buffer: command_buffer,
        });
        Ok(())
    }

    /// Wait for the submitted batch and release its staging memory.
    pub fn on_frame_complete(&mut self) -> Result<(), GraphicsError> {
        let Some(batch) = self.in_flight.take() else {
            return Ok(());
        };
        let backend = self.device.backend();
        if let Err(e) = backend
            .wait_fence(&self.completion_fence, Duration::MAX)
            .and_then(|_| backend.reset_fence(&self.completion_fence))
        {
            self.in_flight = Some(batch);
            return Err(e);
        }
        log::trace!(
            "SubmissionQueue: released {} staging buffers",
            batch
                .operations
                .iter()
                .filter(|op| op.staging().is_some())
                .count()
        );
        Ok(())
    }

    /// Operations waiting for the next [`execute`](Self::execute).
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Staging allocations currently held, pending or in flight.
    pub fn staging_count(&self) -> usize {
        let in_flight = self.in_flight.iter().flat_map(|batch| &batch.operations);
        self.pending
            .iter()
            .chain(in_flight)
            .filter(|op| op.staging().is_some())
            .count()
    }

    /// Returns true while a submitted batch awaits [`on_frame_complete`](Self::on_frame_complete).
    pub fn is_submitted(&self) -> bool {
        self.in_flight.is_some()
    }
}

impl std::fmt::Debug for SubmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionQueue")
            .field("pending", &self.pending.len())
            .field("submitted", &self.in_flight.is_some())
            .finish()
    }
}
