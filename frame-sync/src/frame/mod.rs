//! Frame-in-flight lifecycle.
//!
//! The [`FrameManager`] owns `N` frame slots and is the only place that submits
//! to a GPU queue or presents. One frame walks through
//!
//! ```text
//! Idle -> Acquiring -> Recording -> Submitted -> Presenting -> Complete -> Idle
//! ```
//!
//! and the slot index then cycles to `(slot + 1) % N`. Ordering between the
//! submissions of one frame uses the slot's [`FrameTimeline`]:
//!
//! | Submission      | Waits on                                          | Signals                                   |
//! |-----------------|---------------------------------------------------|-------------------------------------------|
//! | Deferred upload | slot baseline                                     | `PreTransferFinished`                     |
//! | Main            | `PreTransferFinished`, previous slot's baseline   | `PostComputeFinished`                     |
//! | Readback        | `PostComputeFinished`                             | readback fence                            |
//! | Present copy    | `PostComputeFinished`, acquire semaphore          | `CopyToPresentFinished`, copy-complete, slot fence |
//!
//! Timeouts and an out-of-date surface are recoverable and leave the manager
//! [`FrameState::Idle`]. Any other failure once GPU work is under way moves it
//! to [`FrameState::Failed`], after which every frame operation panics.

mod component;
mod readback;

pub use component::{FrameComponent, FrameInfo};
pub use readback::{ReadbackHandle, ReadbackSource};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::access::{AccessFlags, AccessKind, AccessMapper, AccessScope, Barrier, PipelineStages};
use crate::backend::{
    GpuBackend, GpuCommandBuffer, GpuFence, GpuSemaphore, SemaphoreKind, SemaphoreSubmit,
    SubmitInfo,
};
use crate::command::{CommandContext, CommandList};
use crate::config::FrameConfig;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Image};
use crate::submission::SubmissionQueue;
use crate::swapchain::Swapchain;
use crate::timeline::{FramePhase, FrameTimeline};
use crate::types::{
    BufferCopy, BufferDescriptor, BufferImageCopy, BufferUsage, Extent3d, ImageCopy, ImageLayout,
    ImageUsage, Offset3d, QueueKind,
};

/// Stage the present copy waits on the acquire semaphore at.
const ACQUIRE_WAIT_STAGES: PipelineStages = PipelineStages::ALL_TRANSFER;

/// A freshly acquired swapchain image. The source stage matches the acquire
/// wait so the layout transition is ordered after the presentation engine.
const ACQUIRED_IMAGE: AccessScope = AccessScope::new(
    ACQUIRE_WAIT_STAGES,
    AccessFlags::NONE,
    ImageLayout::Undefined,
);

/// Where the frame manager is in the lifecycle of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Ready for [`FrameManager::start_frame`].
    Idle,
    /// Waiting on the slot fence and the swapchain.
    Acquiring,
    /// The main command list accepts commands.
    Recording,
    /// The main command buffer was submitted.
    Submitted,
    /// The present copy is being recorded and submitted.
    Presenting,
    /// Readbacks are being delivered and the slot released.
    Complete,
    /// A fatal GPU error occurred; the manager cannot continue.
    Failed,
}

/// The part of the caller's final image that is copied into the swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRegion {
    pub extent: Extent3d,
    pub src_offset: Offset3d,
    pub dst_offset: Offset3d,
    /// Access the source image is in when the main command buffer ends. It is
    /// restored after the copy.
    pub source_access: AccessKind,
}

impl PresentRegion {
    /// Copy a `width` x `height` region between the origins of both images.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: Extent3d::new_2d(width, height),
            src_offset: Offset3d::ZERO,
            dst_offset: Offset3d::ZERO,
            source_access: AccessKind::ColorAttachmentWrite,
        }
    }

    /// Copy the whole of `image`.
    pub fn whole(image: &Image) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn with_src_offset(mut self, offset: Offset3d) -> Self {
        self.src_offset = offset;
        self
    }

    pub fn with_dst_offset(mut self, offset: Offset3d) -> Self {
        self.dst_offset = offset;
        self
    }

    pub fn with_source_access(mut self, access: AccessKind) -> Self {
        self.source_access = access;
        self
    }
}

struct PendingReadback {
    source: ReadbackSource,
    staging: Arc<Buffer>,
    handle: ReadbackHandle,
}

/// Everything one frame in flight owns. Reused every `N` frames.
struct FrameSlot {
    commands: CommandList,
    command_buffer: GpuCommandBuffer,
    present_commands: CommandList,
    present_command_buffer: GpuCommandBuffer,
    /// Signaled by the present copy; guards reuse of the whole slot.
    fence: GpuFence,
    image_available: GpuSemaphore,
    timeline: FrameTimeline,
    readbacks: Vec<PendingReadback>,
    readback_command_buffer: GpuCommandBuffer,
    readback_fence: GpuFence,
    readback_submitted: bool,
}

impl FrameSlot {
    fn new(backend: &GpuBackend) -> Result<Self, GraphicsError> {
        Ok(Self {
            commands: CommandList::new(),
            command_buffer: backend.create_command_buffer(QueueKind::Graphics)?,
            present_commands: CommandList::new(),
            present_command_buffer: backend.create_command_buffer(QueueKind::Present)?,
            fence: backend.create_fence(true)?,
            image_available: backend.create_semaphore(SemaphoreKind::Binary)?,
            timeline: FrameTimeline::new(
                backend.create_semaphore(SemaphoreKind::Timeline { initial: 0 })?,
            ),
            readbacks: Vec::new(),
            readback_command_buffer: backend.create_command_buffer(QueueKind::Transfer)?,
            readback_fence: backend.create_fence(false)?,
            readback_submitted: false,
        })
    }
}

fn copy_complete_semaphores(
    backend: &GpuBackend,
    swapchain: &Swapchain,
) -> Result<Vec<GpuSemaphore>, GraphicsError> {
    (0..swapchain.image_count())
        .map(|_| backend.create_semaphore(SemaphoreKind::Binary))
        .collect()
}

/// Drives frames in flight from acquisition to presentation.
///
/// # Example
///
/// ```
/// use redlilium_frame_sync::{
///     FrameConfig, FrameManager, GraphicsDevice, PresentRegion, SurfaceTarget,
///     SwapchainDescriptor,
/// };
/// use redlilium_frame_sync::types::{ClearValue, ImageDescriptor, ImageFormat, ImageUsage};
///
/// let device = GraphicsDevice::dummy();
/// let swapchain = device
///     .create_swapchain(SurfaceTarget::Headless, &SwapchainDescriptor::new(4, 4))
///     .unwrap();
/// let mut frames = FrameManager::new(device.clone(), swapchain, FrameConfig::default()).unwrap();
///
/// let target = device
///     .create_image(&ImageDescriptor::new_2d(
///         4,
///         4,
///         ImageFormat::Bgra8Unorm,
///         ImageUsage::COPY_SRC | ImageUsage::COPY_DST | ImageUsage::SAMPLED,
///     ))
///     .unwrap();
///
/// frames.start_frame_default().unwrap();
/// frames
///     .submission_queue()
///     .enqueue_image_clear(&target, ClearValue::color(1.0, 0.0, 0.0, 1.0));
/// frames.submit_main_command_buffer().unwrap();
/// let region = PresentRegion::whole(&target)
///     .with_source_access(redlilium_frame_sync::AccessKind::ShaderRead);
/// let out_of_date = frames.present_to_framebuffer(&target, region).unwrap();
/// assert!(!out_of_date);
/// assert_eq!(frames.total_frame_count(), 1);
/// ```
pub struct FrameManager {
    device: Arc<GraphicsDevice>,
    config: FrameConfig,
    swapchain: Swapchain,
    slots: Vec<FrameSlot>,
    /// One per swapchain image, signaled by the present copy and waited on by present.
    copy_complete: Vec<GpuSemaphore>,
    submissions: SubmissionQueue,
    components: Vec<Box<dyn FrameComponent>>,
    state: FrameState,
    current_slot: usize,
    total_frame_count: u64,
    acquired_image: Option<u32>,
}

impl FrameManager {
    pub fn new(
        device: Arc<GraphicsDevice>,
        swapchain: Swapchain,
        config: FrameConfig,
    ) -> Result<Self, GraphicsError> {
        assert!(
            config.frames_in_flight > 0,
            "frames_in_flight must be at least 1"
        );
        let backend = device.backend();
        let slots = (0..config.frames_in_flight)
            .map(|_| FrameSlot::new(backend))
            .collect::<Result<Vec<_>, _>>()?;
        let copy_complete = copy_complete_semaphores(backend, &swapchain)?;
        let submissions = SubmissionQueue::new(Arc::clone(&device))?;

        log::info!(
            "FrameManager '{}': {} frames in flight, {} swapchain images",
            config.label(),
            slots.len(),
            swapchain.image_count()
        );

        Ok(Self {
            device,
            config,
            swapchain,
            slots,
            copy_complete,
            submissions,
            components: Vec::new(),
            state: FrameState::Idle,
            current_slot: 0,
            total_frame_count: 0,
            acquired_image: None,
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Begin a frame: wait for the slot to be free and acquire a swapchain image.
    ///
    /// Returns the acquired image index. On a timeout or an out-of-date
    /// surface the manager stays [`FrameState::Idle`] and the call can be retried.
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Idle`].
    pub fn start_frame(&mut self, timeout: Duration) -> Result<u32, GraphicsError> {
        self.expect_state(FrameState::Idle, "start_frame");
        self.state = FrameState::Acquiring;

        let index = match self.acquire(timeout) {
            Ok(index) => index,
            Err(e) if e.is_recoverable() => {
                log::warn!(
                    "FrameManager: frame {} could not start: {}",
                    self.total_frame_count,
                    e
                );
                self.state = FrameState::Idle;
                return Err(e);
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.acquired_image = Some(index);
        self.state = FrameState::Recording;
        log::trace!(
            "Begin frame {} (slot {}, image {})",
            self.total_frame_count,
            self.current_slot,
            index
        );
        let info = self.frame_info();
        self.notify(info, |c, info| c.on_frame_start(info));
        Ok(index)
    }

    /// [`start_frame`](Self::start_frame) with the configured acquire timeout.
    pub fn start_frame_default(&mut self) -> Result<u32, GraphicsError> {
        self.start_frame(self.config.acquire_timeout)
    }

    fn acquire(&mut self, timeout: Duration) -> Result<u32, GraphicsError> {
        let started = Instant::now();
        let backend = self.device.backend();
        let slot = &mut self.slots[self.current_slot];

        if !backend.wait_fence(&slot.fence, timeout)? {
            return Err(GraphicsError::Timeout(timeout));
        }
        let index = backend.acquire_next_image(
            self.swapchain.gpu(),
            timeout.saturating_sub(started.elapsed()),
            &slot.image_available,
        )?;
        // Only now is the slot committed to this frame.
        backend.reset_fence(&slot.fence)?;
        slot.commands.clear();
        slot.present_commands.clear();
        Ok(index)
    }

    /// Submit deferred uploads, the main command buffer and any readbacks.
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Recording`].
    pub fn submit_main_command_buffer(&mut self) -> Result<(), GraphicsError> {
        self.expect_state(FrameState::Recording, "submit_main_command_buffer");
        let info = self.frame_info();
        self.notify(info, |c, info| c.on_pre_main_submission(info));

        if let Err(e) = self.submit_main() {
            return Err(self.fail(e));
        }
        self.state = FrameState::Submitted;
        self.notify(info, |c, info| c.on_post_main_submission(info));
        Ok(())
    }

    fn submit_main(&mut self) -> Result<(), GraphicsError> {
        let count = self.slots.len();
        let current = self.current_slot;
        self.submissions.execute(&self.slots[current].timeline)?;

        let backend = self.device.backend();
        let slot = &self.slots[current];
        let mut waits = vec![slot.timeline.wait_info(
            FramePhase::PreTransferFinished,
            PipelineStages::ALL_COMMANDS,
        )];
        if count > 1 {
            let previous = &self.slots[(current + count - 1) % count].timeline;
            waits.push(previous.baseline_wait_info(PipelineStages::ALL_COMMANDS));
        }
        let signals = [slot.timeline.signal_info(
            FramePhase::PostComputeFinished,
            PipelineStages::ALL_COMMANDS,
        )];
        let label = format!("{} main", self.config.label());
        backend.submit(&SubmitInfo {
            label: &label,
            queue: QueueKind::Graphics,
            command_buffer: Some((&slot.command_buffer, &slot.commands)),
            waits: &waits,
            signals: &signals,
            fence: None,
        })?;

        if !slot.readbacks.is_empty() {
            self.submit_readbacks()?;
        }
        Ok(())
    }

    fn submit_readbacks(&mut self) -> Result<(), GraphicsError> {
        let backend = self.device.backend();
        let slot = &mut self.slots[self.current_slot];

        let mut list = CommandList::new();
        {
            let mut ctx = CommandContext::Transfer(&mut list);
            ctx.begin_label("readback");
            for readback in &slot.readbacks {
                match &readback.source {
                    ReadbackSource::Buffer(buffer) => {
                        ctx.copy_buffer(buffer, &readback.staging, BufferCopy::whole(buffer.size()))
                    }
                    ReadbackSource::Image(image) => ctx.copy_image_to_buffer(
                        image,
                        &readback.staging,
                        BufferImageCopy::whole(image.size()),
                    ),
                }
            }
            ctx.pipeline_barrier(slot.readbacks.iter().map(|readback| {
                Barrier::buffer(
                    &readback.staging,
                    AccessKind::TransferWrite,
                    AccessKind::HostRead,
                )
            }));
            ctx.end_label();
        }

        let waits = [slot.timeline.wait_info(
            FramePhase::PostComputeFinished,
            PipelineStages::ALL_TRANSFER,
        )];
        let label = format!("{} readback", self.config.label());
        backend.submit(&SubmitInfo {
            label: &label,
            queue: QueueKind::Transfer,
            command_buffer: Some((&slot.readback_command_buffer, &list)),
            waits: &waits,
            signals: &[],
            fence: Some(&slot.readback_fence),
        })?;
        slot.readback_submitted = true;
        log::trace!(
            "FrameManager: submitted {} readbacks for frame {}",
            slot.readbacks.len(),
            self.total_frame_count
        );
        Ok(())
    }

    /// Copy `image` into the acquired swapchain image, present it and complete the frame.
    ///
    /// Returns `true` if the surface is out of date and the swapchain should
    /// be recreated, see [`resize`](Self::resize).
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Submitted`], or if the region
    /// does not fit either image.
    pub fn present_to_framebuffer(
        &mut self,
        image: &Arc<Image>,
        region: PresentRegion,
    ) -> Result<bool, GraphicsError> {
        self.expect_state(FrameState::Submitted, "present_to_framebuffer");
        assert!(
            image.usage().contains(ImageUsage::COPY_SRC),
            "presented image {:?} lacks COPY_SRC usage",
            image.label()
        );
        self.state = FrameState::Presenting;

        let out_of_date = match self.present(image, region) {
            Ok(out_of_date) => out_of_date,
            Err(e) => return Err(self.fail(e)),
        };
        if out_of_date {
            log::debug!(
                "FrameManager: surface out of date after frame {}",
                self.total_frame_count
            );
        }
        if let Err(e) = self.complete_frame() {
            return Err(self.fail(e));
        }
        Ok(out_of_date)
    }

    fn present(
        &mut self,
        image: &Arc<Image>,
        region: PresentRegion,
    ) -> Result<bool, GraphicsError> {
        let index = self
            .acquired_image
            .ok_or_else(|| GraphicsError::Internal("no swapchain image acquired".to_string()))?;
        let target = self
            .swapchain
            .image(index)
            .cloned()
            .ok_or_else(|| GraphicsError::Internal(format!("swapchain image {index} missing")))?;
        let copy_complete = &self.copy_complete[index as usize];
        let backend = self.device.backend();
        let slot = &mut self.slots[self.current_slot];

        let source = AccessMapper::resolve_for_image(region.source_access);
        let transfer_read = AccessMapper::resolve(AccessKind::TransferRead);
        {
            let mut ctx = CommandContext::Graphics(&mut slot.present_commands);
            ctx.begin_label("present copy");
            let mut before = vec![Barrier::image_scopes(
                &target,
                ACQUIRED_IMAGE,
                AccessMapper::resolve(AccessKind::TransferWrite),
            )];
            let mut after = vec![Barrier::image(
                &target,
                AccessKind::TransferWrite,
                AccessKind::PresentSrc,
            )];
            if source != transfer_read {
                before.push(Barrier::image_scopes(image, source, transfer_read));
                // An image with undefined contents stays readable as a transfer source.
                if region.source_access != AccessKind::Undefined {
                    after.push(Barrier::image_scopes(image, transfer_read, source));
                }
            }
            ctx.pipeline_barrier(before);
            ctx.copy_image(
                image,
                &target,
                ImageCopy {
                    src_offset: region.src_offset,
                    dst_offset: region.dst_offset,
                    extent: region.extent,
                },
            );
            ctx.pipeline_barrier(after);
            ctx.end_label();
        }

        let waits = [
            slot.timeline.wait_info(
                FramePhase::PostComputeFinished,
                PipelineStages::ALL_TRANSFER,
            ),
            SemaphoreSubmit::binary(&slot.image_available, ACQUIRE_WAIT_STAGES),
        ];
        let signals = [
            slot.timeline.signal_info(
                FramePhase::CopyToPresentFinished,
                PipelineStages::ALL_COMMANDS,
            ),
            SemaphoreSubmit::binary(copy_complete, PipelineStages::ALL_COMMANDS),
        ];
        let label = format!("{} present copy", self.config.label());
        backend.submit(&SubmitInfo {
            label: &label,
            queue: QueueKind::Present,
            command_buffer: Some((&slot.present_command_buffer, &slot.present_commands)),
            waits: &waits,
            signals: &signals,
            fence: Some(&slot.fence),
        })?;

        match backend.present(self.swapchain.gpu(), index, copy_complete) {
            Ok(out_of_date) => Ok(out_of_date),
            Err(GraphicsError::SurfaceOutdated) => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn complete_frame(&mut self) -> Result<(), GraphicsError> {
        self.state = FrameState::Complete;
        let info = self.frame_info();
        let backend = self.device.backend();
        let slot = &mut self.slots[self.current_slot];

        if slot.readback_submitted {
            backend.wait_fence(&slot.readback_fence, Duration::MAX)?;
            backend.reset_fence(&slot.readback_fence)?;
            slot.readback_submitted = false;
            for readback in slot.readbacks.drain(..) {
                let bytes = self
                    .device
                    .read_buffer(&readback.staging, 0, readback.staging.size())?;
                readback.handle.fulfil(bytes);
            }
        }

        // Every wait on this use of the slot has been submitted.
        slot.timeline.advance();
        self.submissions.on_frame_complete()?;

        self.total_frame_count += 1;
        self.current_slot = (self.current_slot + 1) % self.slots.len();
        self.acquired_image = None;
        self.state = FrameState::Idle;
        self.notify(info, |c, info| c.on_frame_complete(info));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Graphics context over the main command list of the current frame.
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Recording`].
    pub fn command_context(&mut self) -> CommandContext<'_> {
        CommandContext::Graphics(self.recording_list("command_context"))
    }

    /// Compute context over the main command list of the current frame.
    pub fn compute_context(&mut self) -> CommandContext<'_> {
        CommandContext::Compute(self.recording_list("compute_context"))
    }

    /// Transfer context over the main command list of the current frame.
    pub fn transfer_context(&mut self) -> CommandContext<'_> {
        CommandContext::Transfer(self.recording_list("transfer_context"))
    }

    pub(crate) fn recording_list(&mut self, operation: &str) -> &mut CommandList {
        self.expect_state(FrameState::Recording, operation);
        &mut self.slots[self.current_slot].commands
    }

    /// The deferred upload queue. Work enqueued while no frame is recording
    /// runs with the next submitted frame.
    pub fn submission_queue(&mut self) -> &mut SubmissionQueue {
        &mut self.submissions
    }

    /// Copy `source` back to the host once the main command buffer of the
    /// current frame has finished.
    ///
    /// The handle is fulfilled when this frame completes inside
    /// [`present_to_framebuffer`](Self::present_to_framebuffer).
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Recording`], or if the source
    /// lacks `COPY_SRC` usage or is a combined depth/stencil image.
    pub fn enqueue_post_graphics_readback(
        &mut self,
        source: ReadbackSource,
    ) -> Result<ReadbackHandle, GraphicsError> {
        self.expect_state(FrameState::Recording, "enqueue_post_graphics_readback");
        match &source {
            ReadbackSource::Buffer(buffer) => assert!(
                buffer.usage().contains(BufferUsage::COPY_SRC),
                "readback buffer {:?} lacks COPY_SRC usage",
                buffer.label()
            ),
            ReadbackSource::Image(image) => {
                assert!(
                    image.usage().contains(ImageUsage::COPY_SRC),
                    "readback image {:?} lacks COPY_SRC usage",
                    image.label()
                );
                assert!(
                    !image.format().has_stencil(),
                    "readback of combined depth/stencil image {:?} is not supported",
                    image.label()
                );
            }
        }

        let staging = self.device.create_buffer(
            &BufferDescriptor::new(source.byte_size(), BufferUsage::STAGING_READBACK)
                .with_label("readback staging"),
        )?;
        let handle = ReadbackHandle::new(self.total_frame_count);
        log::trace!(
            "FrameManager: readback of {:?} ({} bytes) in frame {}",
            source.label(),
            source.byte_size(),
            self.total_frame_count
        );
        self.slots[self.current_slot].readbacks.push(PendingReadback {
            source,
            staging,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    // ------------------------------------------------------------------------
    // Swapchain and shutdown
    // ------------------------------------------------------------------------

    /// Block until every frame in flight has completed on the GPU.
    ///
    /// # Panics
    ///
    /// Panics unless the manager is [`FrameState::Idle`].
    pub fn wait_idle(&mut self) -> Result<(), GraphicsError> {
        self.expect_state(FrameState::Idle, "wait_idle");
        let result = self.wait_slots();
        result.map_err(|e| self.fail(e))
    }

    fn wait_slots(&self) -> Result<(), GraphicsError> {
        let backend = self.device.backend();
        for slot in &self.slots {
            backend.wait_fence(&slot.fence, Duration::MAX)?;
        }
        backend.wait_idle()
    }

    /// Replace the swapchain, e.g. after an out-of-date surface.
    ///
    /// Waits for every frame in flight first.
    pub fn recreate_swapchain(&mut self, swapchain: Swapchain) -> Result<(), GraphicsError> {
        self.wait_idle()?;
        self.install_swapchain(swapchain)
    }

    /// Recreate the swapchain with new dimensions.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        self.wait_idle()?;
        let descriptor = crate::swapchain::SwapchainDescriptor {
            width,
            height,
            ..self.swapchain.descriptor().clone()
        };
        let swapchain = self
            .device
            .recreate_swapchain(&self.swapchain, &descriptor)?;
        self.install_swapchain(swapchain)
    }

    fn install_swapchain(&mut self, swapchain: Swapchain) -> Result<(), GraphicsError> {
        // A present that failed on an outdated surface may leave these signaled.
        self.copy_complete = copy_complete_semaphores(self.device.backend(), &swapchain)?;
        log::info!(
            "FrameManager: swapchain replaced ({}x{}, {} images)",
            swapchain.width(),
            swapchain.height(),
            swapchain.image_count()
        );
        self.swapchain = swapchain;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    /// Register a component; hooks run in registration order.
    pub fn add_component(&mut self, component: impl FrameComponent + 'static) {
        self.components.push(Box::new(component));
    }

    fn notify(&mut self, info: FrameInfo, hook: fn(&mut dyn FrameComponent, &FrameInfo)) {
        for component in &mut self.components {
            hook(component.as_mut(), &info);
        }
    }

    fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame_number: self.total_frame_count,
            slot: self.current_slot,
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    fn expect_state(&self, expected: FrameState, operation: &str) {
        assert!(
            self.state != FrameState::Failed,
            "{operation} called after the frame manager entered the Failed state"
        );
        assert_eq!(
            self.state, expected,
            "{operation} called in state {:?}",
            self.state
        );
    }

    fn fail(&mut self, error: GraphicsError) -> GraphicsError {
        log::error!(
            "FrameManager: fatal error in frame {} (state {:?}): {}",
            self.total_frame_count,
            self.state,
            error
        );
        self.state = FrameState::Failed;
        error
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Slot the current or next frame uses.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Number of completed frames.
    pub fn total_frame_count(&self) -> u64 {
        self.total_frame_count
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Swapchain image acquired for the current frame.
    pub fn acquired_image(&self) -> Option<u32> {
        self.acquired_image
    }

    /// The timeline of `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn timeline(&self, slot: usize) -> &FrameTimeline {
        &self.slots[slot].timeline
    }

    /// Returns true if the GPU has finished the last frame submitted on `slot`.
    pub fn is_slot_ready(&self, slot: usize) -> Result<bool, GraphicsError> {
        self.device
            .backend()
            .is_fence_signaled(&self.slots[slot].fence)
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl std::fmt::Debug for FrameManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameManager")
            .field("state", &self.state)
            .field("current_slot", &self.current_slot)
            .field("frames_in_flight", &self.slots.len())
            .field("total_frame_count", &self.total_frame_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SurfaceTarget;
    use crate::command::Command;
    use crate::swapchain::SwapchainDescriptor;
    use crate::types::{ImageDescriptor, ImageFormat};

    fn manager(frames: usize) -> (Arc<GraphicsDevice>, FrameManager) {
        let device = GraphicsDevice::dummy();
        let swapchain = device
            .create_swapchain(SurfaceTarget::Headless, &SwapchainDescriptor::new(4, 4))
            .unwrap();
        let config = FrameConfig::default().with_frames_in_flight(frames);
        let manager = FrameManager::new(Arc::clone(&device), swapchain, config).unwrap();
        (device, manager)
    }

    fn source_image(device: &GraphicsDevice) -> Arc<Image> {
        device
            .create_image(&ImageDescriptor::new_2d(
                4,
                4,
                ImageFormat::Bgra8Unorm,
                ImageUsage::COPY_SRC | ImageUsage::COPY_DST | ImageUsage::COLOR_ATTACHMENT,
            ))
            .unwrap()
    }

    fn run_frame(frames: &mut FrameManager, image: &Arc<Image>) -> bool {
        frames.start_frame(Duration::from_secs(1)).unwrap();
        frames.command_context().pipeline_barrier([Barrier::image(
            image,
            AccessKind::Undefined,
            AccessKind::ColorAttachmentWrite,
        )]);
        frames.submit_main_command_buffer().unwrap();
        frames
            .present_to_framebuffer(image, PresentRegion::whole(image))
            .unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let (device, mut frames) = manager(2);
        let image = source_image(&device);
        assert_eq!(frames.state(), FrameState::Idle);

        frames.start_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frames.state(), FrameState::Recording);
        assert!(frames.acquired_image().is_some());

        frames.submit_main_command_buffer().unwrap();
        assert_eq!(frames.state(), FrameState::Submitted);

        frames
            .present_to_framebuffer(
                &image,
                PresentRegion::whole(&image).with_source_access(AccessKind::Undefined),
            )
            .unwrap();
        assert_eq!(frames.state(), FrameState::Idle);
        assert_eq!(frames.acquired_image(), None);
        assert_eq!(frames.current_slot(), 1);
    }

    #[test]
    fn test_swapchain_transition_follows_acquire_wait() {
        let (device, mut frames) = manager(2);
        let image = source_image(&device);
        run_frame(&mut frames, &image);

        let target_id = frames.swapchain().image(0).unwrap().id();
        let Some(Command::PipelineBarrier(barriers)) = frames.slots[0]
            .present_commands
            .commands()
            .iter()
            .find(|c| matches!(c, Command::PipelineBarrier(_)))
        else {
            panic!("present copy recorded no barrier");
        };
        let transition = barriers
            .iter()
            .find(|b| b.resource_id() == target_id)
            .unwrap();
        assert_eq!(transition.src().stages, ACQUIRE_WAIT_STAGES);
        assert_eq!(transition.src().layout, ImageLayout::Undefined);
        assert_eq!(transition.dst().layout, ImageLayout::TransferDstOptimal);
    }

    #[test]
    fn test_first_frame_needs_no_presignal() {
        let (device, mut frames) = manager(3);
        let image = source_image(&device);
        run_frame(&mut frames, &image);

        let dummy = device.backend().as_dummy().unwrap();
        assert_eq!(dummy.pending_count(), 0);
        assert!(dummy.validation_errors().is_empty());
        // Only the empty transfer phase is signaled from the host.
        assert_eq!(dummy.host_signal_count(), 1);
        assert_eq!(
            device
                .backend()
                .semaphore_value(frames.timeline(0).semaphore())
                .unwrap(),
            FrameTimeline::value_at(0, FramePhase::CopyToPresentFinished)
        );
    }

    #[test]
    fn test_slots_cycle() {
        let (device, mut frames) = manager(3);
        let image = source_image(&device);
        for _ in 0..3 {
            run_frame(&mut frames, &image);
        }
        assert_eq!(frames.current_slot(), 0);
        assert_eq!(frames.total_frame_count(), 3);
        assert_eq!(frames.timeline(0).frame_count(), 1);
    }

    #[test]
    #[should_panic(expected = "submit_main_command_buffer called in state Idle")]
    fn test_submit_without_start_panics() {
        let (_device, mut frames) = manager(1);
        let _ = frames.submit_main_command_buffer();
    }

    #[test]
    fn test_present_region_defaults() {
        let region = PresentRegion::new(16, 8);
        assert_eq!(region.extent, Extent3d::new_2d(16, 8));
        assert_eq!(region.src_offset, Offset3d::ZERO);
        assert_eq!(region.source_access, AccessKind::ColorAttachmentWrite);
    }
}
