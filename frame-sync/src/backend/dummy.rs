//! Dummy GPU backend for testing and development.
//!
//! This backend simulates a single GPU queue on the CPU. Buffers and images
//! own plain memory, submissions wait in one FIFO until their semaphore waits
//! are satisfied, and executing a submission runs its commands against that
//! memory before performing its signals and finally its fence.
//!
//! # Validation
//!
//! The simulation records (and logs with `log::error!`) the mistakes a
//! validation layer would report:
//! - a barrier whose source layout disagrees with the tracked image layout
//! - a copy or clear on an image in a layout the command cannot use
//! - a binary semaphore signaled twice without an intervening wait
//! - a timeline semaphore signaled with a non-increasing value
//! - a submission that signals a fence which is already signaled
//!
//! # Pausing
//!
//! [`DummyBackend::pause`] holds back execution to simulate a GPU that has
//! fallen behind; [`DummyBackend::resume`] releases it and
//! [`DummyBackend::step`] executes a single ready submission.
//!
//! Image memory covers the base mip level of the first array layer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::command::Command;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Image};
use crate::swapchain::SwapchainDescriptor;
use crate::types::{
    BufferDescriptor, BufferUsage, Extent3d, ImageDescriptor, ImageFormat, ImageLayout, Offset3d,
    QueueKind,
};

use super::{
    GpuBuffer, GpuCommandBuffer, GpuFence, GpuImage, GpuSemaphore, GpuSwapchain, SemaphoreKind,
    SemaphoreSubmit, SubmitInfo, SurfaceTarget,
};

// ============================================================================
// Simulated objects
// ============================================================================

/// CPU memory behind a simulated buffer.
#[derive(Debug)]
pub struct DummyBuffer {
    label: Option<String>,
    usage: BufferUsage,
    data: Mutex<Vec<u8>>,
}

/// CPU memory and tracked layout behind a simulated image.
#[derive(Debug)]
pub struct DummyImage {
    label: Option<String>,
    format: ImageFormat,
    extent: Extent3d,
    data: Mutex<Vec<u8>>,
    layout: Mutex<ImageLayout>,
}

impl DummyImage {
    fn new(label: Option<String>, format: ImageFormat, extent: Extent3d) -> Self {
        let size = extent.texel_count() * format.block_size() as u64;
        Self {
            label,
            format,
            extent,
            data: Mutex::new(vec![0; size as usize]),
            layout: Mutex::new(ImageLayout::Undefined),
        }
    }
}

/// A simulated fence.
#[derive(Debug)]
pub struct DummyFence {
    signaled: AtomicBool,
}

/// A simulated binary or timeline semaphore. Binary semaphores hold 0 or 1.
#[derive(Debug)]
pub struct DummySemaphore {
    kind: SemaphoreKind,
    value: Mutex<u64>,
}

impl DummySemaphore {
    pub(crate) fn kind(&self) -> SemaphoreKind {
        self.kind
    }

    fn is_satisfied(&self, value: u64) -> bool {
        let current = *self.value.lock();
        match self.kind {
            SemaphoreKind::Binary => current > 0,
            SemaphoreKind::Timeline { .. } => current >= value,
        }
    }
}

/// A simulated headless swapchain.
#[derive(Debug)]
pub struct DummySwapchain {
    /// Round-robin cursor and whether each image is held by the application.
    state: Mutex<(u32, Vec<bool>)>,
}

impl DummySwapchain {
    fn new(image_count: u32) -> Self {
        Self {
            state: Mutex::new((0, vec![false; image_count as usize])),
        }
    }

    fn acquire(&self) -> Option<u32> {
        let mut guard = self.state.lock();
        let (cursor, held) = &mut *guard;
        let count = held.len() as u32;
        let index = (0..count)
            .map(|i| (*cursor + i) % count)
            .find(|&i| !held[i as usize])?;
        held[index as usize] = true;
        *cursor = (index + 1) % count;
        Some(index)
    }

    fn release(&self, index: u32) {
        if let Some(held) = self.state.lock().1.get_mut(index as usize) {
            *held = false;
        }
    }
}

// ============================================================================
// Queue state
// ============================================================================

type SemaphoreOp = (Arc<DummySemaphore>, u64);

enum PendingWork {
    Submit {
        label: String,
        commands: Vec<Command>,
        waits: Vec<SemaphoreOp>,
        signals: Vec<SemaphoreOp>,
        fence: Option<Arc<DummyFence>>,
    },
    Present {
        swapchain: Arc<DummySwapchain>,
        image_index: u32,
        wait: Arc<DummySemaphore>,
    },
}

impl PendingWork {
    fn is_ready(&self) -> bool {
        match self {
            Self::Submit { waits, .. } => waits.iter().all(|(sem, value)| sem.is_satisfied(*value)),
            Self::Present { wait, .. } => wait.is_satisfied(0),
        }
    }
}

#[derive(Default)]
struct DummyState {
    paused: bool,
    queue: VecDeque<PendingWork>,
    submission_count: u64,
    executed_count: u64,
    barrier_count: u64,
    host_signal_count: u64,
    presented: Vec<u32>,
    validation_errors: Vec<String>,
    surface_out_of_date: bool,
}

impl DummyState {
    fn report(&mut self, message: String) {
        log::error!("DummyBackend validation: {}", message);
        self.validation_errors.push(message);
    }

    fn front_ready(&self) -> bool {
        self.queue.front().is_some_and(PendingWork::is_ready)
    }

    fn pump(&mut self) {
        while !self.paused && self.front_ready() {
            self.execute_front();
        }
    }

    fn execute_front(&mut self) {
        let Some(work) = self.queue.pop_front() else {
            return;
        };
        match work {
            PendingWork::Submit {
                label,
                commands,
                waits,
                signals,
                fence,
            } => {
                log::trace!(
                    "DummyBackend: executing '{}' ({} commands)",
                    label,
                    commands.len()
                );
                for (semaphore, _) in &waits {
                    consume_binary(semaphore);
                }
                for command in &commands {
                    self.run_command(&label, command);
                }
                for (semaphore, value) in &signals {
                    self.signal(semaphore, *value, &label);
                }
                if let Some(fence) = fence {
                    fence.signaled.store(true, Ordering::Release);
                }
                self.executed_count += 1;
            }
            PendingWork::Present {
                swapchain,
                image_index,
                wait,
            } => {
                log::trace!("DummyBackend: presenting image {}", image_index);
                consume_binary(&wait);
                swapchain.release(image_index);
                self.presented.push(image_index);
            }
        }
    }

    fn signal(&mut self, semaphore: &DummySemaphore, value: u64, label: &str) {
        let mut current = semaphore.value.lock();
        match semaphore.kind {
            SemaphoreKind::Binary => {
                if *current > 0 {
                    drop(current);
                    self.report(format!(
                        "'{label}' signals a binary semaphore that is already signaled"
                    ));
                    return;
                }
                *current = 1;
            }
            SemaphoreKind::Timeline { .. } => {
                if value <= *current {
                    let previous = *current;
                    drop(current);
                    self.report(format!(
                        "'{label}' signals timeline value {value}, not above current {previous}"
                    ));
                    return;
                }
                *current = value;
            }
        }
    }

    fn run_command(&mut self, label: &str, command: &Command) {
        match command {
            Command::PipelineBarrier(barriers) => {
                for barrier in barriers {
                    self.barrier_count += 1;
                    if let crate::access::Barrier::Image(barrier) = barrier {
                        let Some(image) = self.image_state(&barrier.image, label) else {
                            continue;
                        };
                        let mut layout = image.layout.lock();
                        let tracked = *layout;
                        *layout = barrier.dst.layout;
                        drop(layout);
                        if barrier.src.layout != ImageLayout::Undefined
                            && barrier.src.layout != tracked
                        {
                            self.report(format!(
                                "'{label}': barrier on image {:?} expects {:?} but it is in {:?}",
                                image.label, barrier.src.layout, tracked
                            ));
                        }
                        if barrier.dst.layout == ImageLayout::Undefined {
                            self.report(format!(
                                "'{label}': image {:?} transitioned to Undefined",
                                image.label
                            ));
                        }
                    }
                }
            }
            Command::CopyBuffer { src, dst, region } => {
                let (Some(src), Some(dst)) =
                    (self.buffer_state(src, label), self.buffer_state(dst, label))
                else {
                    return;
                };
                let src_range =
                    region.src_offset as usize..(region.src_offset + region.size) as usize;
                let dst_range =
                    region.dst_offset as usize..(region.dst_offset + region.size) as usize;
                let bytes = src.data.lock()[src_range].to_vec();
                dst.data.lock()[dst_range].copy_from_slice(&bytes);
            }
            Command::CopyBufferToImage { src, dst, region } => {
                let (Some(buffer), Some(image)) =
                    (self.buffer_state(src, label), self.image_state(dst, label))
                else {
                    return;
                };
                if !self.require_layout(&image, TRANSFER_DST_LAYOUTS, "copy destination", label) {
                    return;
                }
                let data = buffer.data.lock().clone();
                let mut texels = image.data.lock();
                let block = image.format.block_size() as u64;
                for_each_row(region.image_extent, |y, z, row| {
                    let from = (region.buffer_offset + row * block) as usize;
                    let to = texel_offset(image.extent, region.image_offset, y, z, block);
                    let len = (region.image_extent.width as u64 * block) as usize;
                    texels[to..to + len].copy_from_slice(&data[from..from + len]);
                });
            }
            Command::CopyImageToBuffer { src, dst, region } => {
                let (Some(image), Some(buffer)) =
                    (self.image_state(src, label), self.buffer_state(dst, label))
                else {
                    return;
                };
                if !self.require_layout(&image, TRANSFER_SRC_LAYOUTS, "copy source", label) {
                    return;
                }
                let texels = image.data.lock().clone();
                let mut data = buffer.data.lock();
                let block = image.format.block_size() as u64;
                for_each_row(region.image_extent, |y, z, row| {
                    let from = texel_offset(image.extent, region.image_offset, y, z, block);
                    let to = (region.buffer_offset + row * block) as usize;
                    let len = (region.image_extent.width as u64 * block) as usize;
                    data[to..to + len].copy_from_slice(&texels[from..from + len]);
                });
            }
            Command::CopyImage { src, dst, region } => {
                let (Some(src), Some(dst)) =
                    (self.image_state(src, label), self.image_state(dst, label))
                else {
                    return;
                };
                if !self.require_layout(&src, TRANSFER_SRC_LAYOUTS, "copy source", label)
                    || !self.require_layout(&dst, TRANSFER_DST_LAYOUTS, "copy destination", label)
                {
                    return;
                }
                let texels = src.data.lock().clone();
                let mut out = dst.data.lock();
                let block = src.format.block_size() as u64;
                for_each_row(region.extent, |y, z, _| {
                    let from = texel_offset(src.extent, region.src_offset, y, z, block);
                    let to = texel_offset(dst.extent, region.dst_offset, y, z, block);
                    let len = (region.extent.width as u64 * block) as usize;
                    out[to..to + len].copy_from_slice(&texels[from..from + len]);
                });
            }
            Command::ClearColorImage { image, color } => {
                let Some(image) = self.image_state(image, label) else {
                    return;
                };
                if self.require_layout(&image, TRANSFER_DST_LAYOUTS, "clear", label) {
                    fill_pattern(&mut image.data.lock(), &encode_color(image.format, *color));
                }
            }
            Command::ClearDepthStencilImage {
                image,
                depth,
                stencil,
            } => {
                let Some(image) = self.image_state(image, label) else {
                    return;
                };
                if self.require_layout(&image, TRANSFER_DST_LAYOUTS, "clear", label) {
                    let texel = encode_depth_stencil(image.format, *depth, *stencil);
                    fill_pattern(&mut image.data.lock(), &texel);
                }
            }
            Command::FillBuffer {
                dst,
                offset,
                size,
                value,
            } => {
                let Some(buffer) = self.buffer_state(dst, label) else {
                    return;
                };
                let mut data = buffer.data.lock();
                fill_pattern(
                    &mut data[*offset as usize..(*offset + *size) as usize],
                    &value.to_le_bytes(),
                );
            }
            Command::BeginLabel(name) => log::trace!("DummyBackend: begin label '{}'", name),
            Command::EndLabel => log::trace!("DummyBackend: end label"),
        }
    }

    fn require_layout(
        &mut self,
        image: &DummyImage,
        allowed: &[ImageLayout],
        what: &str,
        label: &str,
    ) -> bool {
        let layout = *image.layout.lock();
        if allowed.contains(&layout) {
            return true;
        }
        self.report(format!(
            "'{label}': {what} image {:?} is in {:?}, expected one of {:?}",
            image.label, layout, allowed
        ));
        false
    }

    fn buffer_state(&mut self, buffer: &Buffer, label: &str) -> Option<Arc<DummyBuffer>> {
        match buffer_state(buffer.gpu()) {
            Ok(state) => Some(Arc::clone(state)),
            Err(e) => {
                self.report(format!("'{label}': {e}"));
                None
            }
        }
    }

    fn image_state(&mut self, image: &Image, label: &str) -> Option<Arc<DummyImage>> {
        match image_state(image.gpu()) {
            Ok(state) => Some(Arc::clone(state)),
            Err(e) => {
                self.report(format!("'{label}': {e}"));
                None
            }
        }
    }
}

const TRANSFER_DST_LAYOUTS: &[ImageLayout] =
    &[ImageLayout::TransferDstOptimal, ImageLayout::General];
const TRANSFER_SRC_LAYOUTS: &[ImageLayout] =
    &[ImageLayout::TransferSrcOptimal, ImageLayout::General];

fn consume_binary(semaphore: &DummySemaphore) {
    if semaphore.kind == SemaphoreKind::Binary {
        *semaphore.value.lock() = 0;
    }
}

/// Visit every texel row of `extent`, passing (y, z, index of the row's first texel).
fn for_each_row(extent: Extent3d, mut f: impl FnMut(u32, u32, u64)) {
    for z in 0..extent.depth {
        for y in 0..extent.height {
            let row = (z as u64 * extent.height as u64 + y as u64) * extent.width as u64;
            f(y, z, row);
        }
    }
}

fn texel_offset(extent: Extent3d, origin: Offset3d, y: u32, z: u32, block: u64) -> usize {
    let (x, y, z) = (origin.x as u64, (origin.y + y) as u64, (origin.z + z) as u64);
    (((z * extent.height as u64 + y) * extent.width as u64 + x) * block) as usize
}

fn fill_pattern(data: &mut [u8], pattern: &[u8]) {
    for chunk in data.chunks_mut(pattern.len()) {
        chunk.copy_from_slice(&pattern[..chunk.len()]);
    }
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Texel bytes of a color clear. sRGB formats store the values without encoding.
fn encode_color(format: ImageFormat, [r, g, b, a]: [f32; 4]) -> Vec<u8> {
    match format {
        ImageFormat::R8Unorm => vec![unorm8(r)],
        ImageFormat::Rg8Unorm => vec![unorm8(r), unorm8(g)],
        ImageFormat::Rgba8Unorm | ImageFormat::Rgba8UnormSrgb => {
            vec![unorm8(r), unorm8(g), unorm8(b), unorm8(a)]
        }
        ImageFormat::Bgra8Unorm | ImageFormat::Bgra8UnormSrgb => {
            vec![unorm8(b), unorm8(g), unorm8(r), unorm8(a)]
        }
        ImageFormat::R32Float => r.to_le_bytes().to_vec(),
        ImageFormat::R32Uint => (r as u32).to_le_bytes().to_vec(),
        ImageFormat::Rgba32Float => [r, g, b, a].iter().flat_map(|c| c.to_le_bytes()).collect(),
        ImageFormat::Depth16Unorm
        | ImageFormat::Depth24PlusStencil8
        | ImageFormat::Depth32Float
        | ImageFormat::Depth32FloatStencil8 => encode_depth_stencil(format, r, 0),
    }
}

fn encode_depth_stencil(format: ImageFormat, depth: f32, stencil: u32) -> Vec<u8> {
    let depth = depth.clamp(0.0, 1.0);
    match format {
        ImageFormat::Depth16Unorm => ((depth * 65535.0).round() as u16).to_le_bytes().to_vec(),
        ImageFormat::Depth24PlusStencil8 => {
            let packed = (depth * 16_777_215.0).round() as u32 | ((stencil & 0xff) << 24);
            packed.to_le_bytes().to_vec()
        }
        ImageFormat::Depth32Float => depth.to_le_bytes().to_vec(),
        ImageFormat::Depth32FloatStencil8 => {
            let mut bytes = depth.to_le_bytes().to_vec();
            bytes.extend_from_slice(&[(stencil & 0xff) as u8, 0, 0, 0]);
            bytes
        }
        other => vec![0; other.block_size() as usize],
    }
}

// ============================================================================
// Handle access
// ============================================================================

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::InvalidParameter(format!("{kind} was not created by the dummy backend"))
}

fn buffer_state(buffer: &GpuBuffer) -> Result<&Arc<DummyBuffer>, GraphicsError> {
    match buffer {
        GpuBuffer::Dummy(state) => Ok(state),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(foreign("buffer")),
    }
}

fn image_state(image: &GpuImage) -> Result<&Arc<DummyImage>, GraphicsError> {
    match image {
        GpuImage::Dummy(state) => Ok(state),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(foreign("image")),
    }
}

fn fence_state(fence: &GpuFence) -> Result<&Arc<DummyFence>, GraphicsError> {
    match fence {
        GpuFence::Dummy(state) => Ok(state),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(foreign("fence")),
    }
}

fn semaphore_state(semaphore: &GpuSemaphore) -> Result<&Arc<DummySemaphore>, GraphicsError> {
    match semaphore {
        GpuSemaphore::Dummy(state) => Ok(state),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(foreign("semaphore")),
    }
}

fn swapchain_state(swapchain: &GpuSwapchain) -> Result<&Arc<DummySwapchain>, GraphicsError> {
    match swapchain {
        GpuSwapchain::Dummy(state) => Ok(state),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(foreign("swapchain")),
    }
}

fn semaphore_ops(ops: &[SemaphoreSubmit<'_>]) -> Result<Vec<SemaphoreOp>, GraphicsError> {
    ops.iter()
        .map(|op| Ok((Arc::clone(semaphore_state(op.semaphore)?), op.value)))
        .collect()
}

fn host_range(len: usize, offset: u64, size: u64) -> Result<std::ops::Range<usize>, GraphicsError> {
    let end = offset
        .checked_add(size)
        .filter(|&end| end <= len as u64)
        .ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "range {offset}+{size} exceeds buffer of {len} bytes"
            ))
        })?;
    Ok(offset as usize..end as usize)
}

// ============================================================================
// Backend
// ============================================================================

/// Dummy GPU backend.
pub struct DummyBackend {
    state: Mutex<DummyState>,
    /// Notified whenever queued work may have executed.
    progress: Condvar,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DummyState::default()),
            progress: Condvar::new(),
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Create a buffer resource.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(GpuBuffer::Dummy(Arc::new(DummyBuffer {
            label: descriptor.label.clone(),
            usage: descriptor.usage,
            data: Mutex::new(vec![0; descriptor.size as usize]),
        })))
    }

    /// Create an image resource.
    pub fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError> {
        log::trace!(
            "DummyBackend: creating image {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        Ok(GpuImage::Dummy(Arc::new(DummyImage::new(
            descriptor.label.clone(),
            descriptor.format,
            descriptor.size,
        ))))
    }

    /// Write data to a host-visible buffer.
    pub fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let buffer = buffer_state(buffer)?;
        if !buffer.usage.is_host_visible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} is not host-visible",
                buffer.label
            )));
        }
        log::trace!(
            "DummyBackend: write_buffer offset={} len={}",
            offset,
            data.len()
        );
        let mut memory = buffer.data.lock();
        let range = host_range(memory.len(), offset, data.len() as u64)?;
        memory[range].copy_from_slice(data);
        Ok(())
    }

    /// Read data from a host-visible buffer.
    pub fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let buffer = buffer_state(buffer)?;
        if !buffer.usage.is_host_visible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} is not host-visible",
                buffer.label
            )));
        }
        log::trace!("DummyBackend: read_buffer offset={} size={}", offset, size);
        let memory = buffer.data.lock();
        let range = host_range(memory.len(), offset, size)?;
        Ok(memory[range].to_vec())
    }

    /// Create a fence for CPU-GPU synchronization.
    pub fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        Ok(GpuFence::Dummy(Arc::new(DummyFence {
            signaled: AtomicBool::new(signaled),
        })))
    }

    /// Wait for a fence to be signaled with a timeout.
    ///
    /// Returns `true` if the fence was signaled, `false` if the timeout elapsed.
    pub fn wait_fence(&self, fence: &GpuFence, timeout: Duration) -> Result<bool, GraphicsError> {
        let fence = fence_state(fence)?;
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !fence.signaled.load(Ordering::Acquire) {
            match deadline {
                Some(deadline) => {
                    if self.progress.wait_until(&mut state, deadline).timed_out() {
                        return Ok(fence.signaled.load(Ordering::Acquire));
                    }
                }
                None => self.progress.wait(&mut state),
            }
        }
        Ok(true)
    }

    /// Check if a fence is signaled (non-blocking).
    pub fn is_fence_signaled(&self, fence: &GpuFence) -> Result<bool, GraphicsError> {
        Ok(fence_state(fence)?.signaled.load(Ordering::Acquire))
    }

    /// Reset a fence to the unsignaled state.
    pub fn reset_fence(&self, fence: &GpuFence) -> Result<(), GraphicsError> {
        fence_state(fence)?.signaled.store(false, Ordering::Release);
        Ok(())
    }

    /// Create a semaphore.
    pub fn create_semaphore(&self, kind: SemaphoreKind) -> Result<GpuSemaphore, GraphicsError> {
        let initial = match kind {
            SemaphoreKind::Binary => 0,
            SemaphoreKind::Timeline { initial } => initial,
        };
        Ok(GpuSemaphore::Dummy(Arc::new(DummySemaphore {
            kind,
            value: Mutex::new(initial),
        })))
    }

    /// Signal a timeline semaphore from the host.
    pub fn signal_semaphore(
        &self,
        semaphore: &GpuSemaphore,
        value: u64,
    ) -> Result<(), GraphicsError> {
        let semaphore = semaphore_state(semaphore)?;
        if semaphore.kind == SemaphoreKind::Binary {
            return Err(GraphicsError::InvalidParameter(
                "host signals require a timeline semaphore".to_string(),
            ));
        }
        log::trace!("DummyBackend: host signal to {}", value);
        let mut state = self.state.lock();
        state.host_signal_count += 1;
        state.signal(semaphore, value, "host signal");
        state.pump();
        self.progress.notify_all();
        Ok(())
    }

    /// Current value of a semaphore (0 or 1 for binary semaphores).
    pub fn semaphore_value(&self, semaphore: &GpuSemaphore) -> Result<u64, GraphicsError> {
        Ok(*semaphore_state(semaphore)?.value.lock())
    }

    /// Create a command buffer for the given queue.
    pub fn create_command_buffer(
        &self,
        queue: QueueKind,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        Ok(GpuCommandBuffer::Dummy { queue })
    }

    /// Queue a submission; it executes as soon as its waits are satisfied.
    pub fn submit(&self, info: &SubmitInfo<'_>) -> Result<(), GraphicsError> {
        let commands = match info.command_buffer {
            Some((GpuCommandBuffer::Dummy { .. }, list)) => list.commands().to_vec(),
            #[cfg(feature = "vulkan-backend")]
            Some(_) => return Err(foreign("command buffer")),
            None => Vec::new(),
        };
        let waits = semaphore_ops(info.waits)?;
        let signals = semaphore_ops(info.signals)?;
        let fence = info.fence.map(fence_state).transpose()?.cloned();

        let mut state = self.state.lock();
        if let Some(fence) = &fence
            && fence.signaled.load(Ordering::Acquire)
        {
            state.report(format!(
                "'{}' is submitted with a fence that is already signaled",
                info.label
            ));
        }
        log::trace!(
            "DummyBackend: queued '{}' on {:?} ({} commands, {} waits, {} signals)",
            info.label,
            info.queue,
            commands.len(),
            waits.len(),
            signals.len()
        );
        state.submission_count += 1;
        state.queue.push_back(PendingWork::Submit {
            label: info.label.to_string(),
            commands,
            waits,
            signals,
            fence,
        });
        state.pump();
        self.progress.notify_all();
        Ok(())
    }

    /// Create a headless swapchain. Clears a previously reported out-of-date surface.
    pub fn create_swapchain(
        &self,
        target: &SurfaceTarget,
        descriptor: &SwapchainDescriptor,
        _old: Option<&GpuSwapchain>,
    ) -> Result<(GpuSwapchain, Vec<GpuImage>, SwapchainDescriptor), GraphicsError> {
        if !matches!(target, SurfaceTarget::Headless) {
            return Err(GraphicsError::InvalidParameter(
                "the dummy backend only supports headless swapchains".to_string(),
            ));
        }

        log::trace!(
            "DummyBackend: creating swapchain {}x{} with {} images",
            descriptor.width,
            descriptor.height,
            descriptor.image_count
        );
        let extent = Extent3d::new_2d(descriptor.width, descriptor.height);
        let images = (0..descriptor.image_count)
            .map(|i| {
                GpuImage::Dummy(Arc::new(DummyImage::new(
                    Some(format!("swapchain image {i}")),
                    descriptor.format,
                    extent,
                )))
            })
            .collect();
        self.state.lock().surface_out_of_date = false;
        Ok((
            GpuSwapchain::Dummy(Arc::new(DummySwapchain::new(descriptor.image_count))),
            images,
            descriptor.clone(),
        ))
    }

    /// Acquire the next free swapchain image and signal `semaphore` immediately.
    pub fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        timeout: Duration,
        semaphore: &GpuSemaphore,
    ) -> Result<u32, GraphicsError> {
        let swapchain = swapchain_state(swapchain)?;
        let semaphore = semaphore_state(semaphore)?;
        let mut state = self.state.lock();
        if state.surface_out_of_date {
            log::debug!("DummyBackend: surface out of date on acquire");
            return Err(GraphicsError::SurfaceOutdated);
        }
        let Some(index) = swapchain.acquire() else {
            log::warn!("DummyBackend: every swapchain image is still held");
            return Err(GraphicsError::Timeout(timeout));
        };
        state.signal(semaphore, 0, "acquire");
        state.pump();
        self.progress.notify_all();
        Ok(index)
    }

    /// Queue a present; it executes once `wait` is signaled.
    pub fn present(
        &self,
        swapchain: &GpuSwapchain,
        image_index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError> {
        let swapchain = Arc::clone(swapchain_state(swapchain)?);
        let wait = Arc::clone(semaphore_state(wait)?);
        let mut state = self.state.lock();
        state.queue.push_back(PendingWork::Present {
            swapchain,
            image_index,
            wait,
        });
        state.pump();
        self.progress.notify_all();
        Ok(state.surface_out_of_date)
    }

    /// Wait until every queued submission has executed.
    ///
    /// Fails if the queue is running but blocked on a semaphore that nothing
    /// will ever signal.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        loop {
            if state.queue.is_empty() {
                return Ok(());
            }
            if !state.paused && !state.front_ready() {
                log::error!(
                    "DummyBackend: queue is blocked on a semaphore that is never signaled"
                );
                return Err(GraphicsError::Internal(
                    "queue deadlocked waiting on a semaphore".to_string(),
                ));
            }
            self.progress.wait(&mut state);
        }
    }

    // ------------------------------------------------------------------------
    // Simulation control and introspection
    // ------------------------------------------------------------------------

    /// Hold back execution of queued work.
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    /// Resume execution and run everything that is ready.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        state.pump();
        self.progress.notify_all();
    }

    /// Execute the oldest queued work if it is ready, even while paused.
    pub fn step(&self) -> bool {
        let mut state = self.state.lock();
        if !state.front_ready() {
            return false;
        }
        state.execute_front();
        self.progress.notify_all();
        true
    }

    /// Make the next acquire fail and every present report an out-of-date surface.
    pub fn set_surface_out_of_date(&self, out_of_date: bool) {
        self.state.lock().surface_out_of_date = out_of_date;
    }

    /// Number of submissions queued so far (presents excluded).
    pub fn submission_count(&self) -> u64 {
        self.state.lock().submission_count
    }

    /// Number of submissions executed so far (presents excluded).
    pub fn executed_count(&self) -> u64 {
        self.state.lock().executed_count
    }

    /// Number of queued submissions and presents not yet executed.
    pub fn pending_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of individual resource barriers executed.
    pub fn barrier_count(&self) -> u64 {
        self.state.lock().barrier_count
    }

    /// Number of host-side timeline signals.
    pub fn host_signal_count(&self) -> u64 {
        self.state.lock().host_signal_count
    }

    /// Swapchain image indices in the order they were presented.
    pub fn presented_images(&self) -> Vec<u32> {
        self.state.lock().presented.clone()
    }

    /// Validation messages recorded so far.
    pub fn validation_errors(&self) -> Vec<String> {
        self.state.lock().validation_errors.clone()
    }

    /// Current contents of any simulated buffer, host-visible or not.
    pub fn inspect_buffer(&self, buffer: &Buffer) -> Option<Vec<u8>> {
        buffer_state(buffer.gpu())
            .ok()
            .map(|b| b.data.lock().clone())
    }

    /// Current contents of a simulated image.
    pub fn inspect_image(&self, image: &Image) -> Option<Vec<u8>> {
        image_state(image.gpu()).ok().map(|i| i.data.lock().clone())
    }

    /// Layout the simulated image is currently in.
    pub fn image_layout(&self, image: &Image) -> Option<ImageLayout> {
        image_state(image.gpu()).ok().map(|i| *i.layout.lock())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DummyBackend")
            .field("paused", &state.paused)
            .field("pending", &state.queue.len())
            .field("executed", &state.executed_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessKind, Barrier, PipelineStages};
    use crate::command::{CommandContext, CommandList};
    use crate::types::{BufferImageCopy, ImageUsage};

    fn image(backend: &DummyBackend, format: ImageFormat) -> Arc<Image> {
        let desc =
            ImageDescriptor::new_2d(2, 2, format, ImageUsage::COPY_DST | ImageUsage::COPY_SRC);
        Arc::new(Image::new(desc.clone(), backend.create_image(&desc).unwrap()))
    }

    fn buffer(backend: &DummyBackend, size: u64, usage: BufferUsage) -> Arc<Buffer> {
        let desc = BufferDescriptor::new(size, usage);
        Arc::new(Buffer::new(desc.clone(), backend.create_buffer(&desc).unwrap()))
    }

    fn submit(
        backend: &DummyBackend,
        list: &CommandList,
        waits: &[SemaphoreSubmit<'_>],
        signals: &[SemaphoreSubmit<'_>],
        fence: Option<&GpuFence>,
    ) {
        let cb = backend.create_command_buffer(QueueKind::Graphics).unwrap();
        backend
            .submit(&SubmitInfo {
                label: "test",
                queue: QueueKind::Graphics,
                command_buffer: Some((&cb, list)),
                waits,
                signals,
                fence,
            })
            .unwrap();
    }

    #[test]
    fn test_fence_timeout() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(false).unwrap();
        let timeout = Duration::from_millis(1);
        assert!(!backend.wait_fence(&fence, timeout).unwrap());
        let signaled = backend.create_fence(true).unwrap();
        assert!(backend.wait_fence(&signaled, Duration::ZERO).unwrap());
    }

    #[test]
    fn test_submission_waits_for_timeline() {
        let backend = DummyBackend::new();
        let timeline = backend
            .create_semaphore(SemaphoreKind::Timeline { initial: 0 })
            .unwrap();
        let fence = backend.create_fence(false).unwrap();
        let waits = [SemaphoreSubmit {
            semaphore: &timeline,
            value: 2,
            stages: PipelineStages::ALL_COMMANDS,
        }];
        submit(&backend, &CommandList::new(), &waits, &[], Some(&fence));
        assert_eq!(backend.pending_count(), 1);
        assert!(!backend.is_fence_signaled(&fence).unwrap());

        backend.signal_semaphore(&timeline, 2).unwrap();
        assert_eq!(backend.pending_count(), 0);
        assert!(backend.is_fence_signaled(&fence).unwrap());
        assert!(backend.validation_errors().is_empty());
    }

    #[test]
    fn test_pause_and_step() {
        let backend = DummyBackend::new();
        backend.pause();
        submit(&backend, &CommandList::new(), &[], &[], None);
        submit(&backend, &CommandList::new(), &[], &[], None);
        assert_eq!(backend.executed_count(), 0);
        assert!(backend.step());
        assert_eq!(backend.executed_count(), 1);
        backend.resume();
        assert_eq!(backend.executed_count(), 2);
        assert!(!backend.step());
    }

    #[test]
    fn test_blocked_waits_wake_on_resume() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(false).unwrap();
        backend.pause();
        submit(&backend, &CommandList::new(), &[], &[], Some(&fence));

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let signaled = backend.wait_fence(&fence, Duration::from_secs(10)).unwrap();
                backend.wait_idle().unwrap();
                signaled
            });
            std::thread::sleep(Duration::from_millis(20));
            assert!(!waiter.is_finished());
            backend.resume();
            assert!(waiter.join().unwrap());
        });
        assert_eq!(backend.pending_count(), 0);
    }

    #[test]
    fn test_non_increasing_timeline_signal_is_reported() {
        let backend = DummyBackend::new();
        let timeline = backend
            .create_semaphore(SemaphoreKind::Timeline { initial: 5 })
            .unwrap();
        backend.signal_semaphore(&timeline, 5).unwrap();
        assert_eq!(backend.validation_errors().len(), 1);
        assert_eq!(backend.semaphore_value(&timeline).unwrap(), 5);
    }

    #[test]
    fn test_binary_double_signal_is_reported() {
        let backend = DummyBackend::new();
        let binary = backend.create_semaphore(SemaphoreKind::Binary).unwrap();
        let signals = [SemaphoreSubmit::binary(&binary, PipelineStages::ALL_COMMANDS)];
        submit(&backend, &CommandList::new(), &[], &signals, None);
        submit(&backend, &CommandList::new(), &[], &signals, None);
        assert_eq!(backend.validation_errors().len(), 1);
    }

    #[test]
    fn test_clear_requires_transfer_layout() {
        let backend = DummyBackend::new();
        let target = image(&backend, ImageFormat::Rgba8Unorm);
        let mut list = CommandList::new();
        CommandContext::Graphics(&mut list).clear_color_image(&target, [1.0, 0.0, 0.0, 1.0]);
        submit(&backend, &list, &[], &[], None);
        assert_eq!(backend.validation_errors().len(), 1);
        assert_eq!(backend.inspect_image(&target).unwrap(), vec![0; 16]);
    }

    #[test]
    fn test_clear_and_copy_out() {
        let backend = DummyBackend::new();
        let target = image(&backend, ImageFormat::Bgra8Unorm);
        let readback = buffer(&backend, 16, BufferUsage::STAGING_READBACK);
        let mut list = CommandList::new();
        let mut ctx = CommandContext::Graphics(&mut list);
        ctx.pipeline_barrier([Barrier::image(
            &target,
            AccessKind::Undefined,
            AccessKind::TransferWrite,
        )]);
        ctx.clear_color_image(&target, [1.0, 0.0, 0.0, 1.0]);
        ctx.pipeline_barrier([Barrier::image(
            &target,
            AccessKind::TransferWrite,
            AccessKind::TransferRead,
        )]);
        ctx.copy_image_to_buffer(&target, &readback, BufferImageCopy::whole(target.size()));
        submit(&backend, &list, &[], &[], None);

        assert!(backend.validation_errors().is_empty());
        assert_eq!(backend.barrier_count(), 2);
        let bytes = backend.read_buffer(readback.gpu(), 0, 16).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 255, 255]);
        assert_eq!(
            backend.image_layout(&target),
            Some(ImageLayout::TransferSrcOptimal)
        );
    }

    #[test]
    fn test_barrier_layout_mismatch_is_reported() {
        let backend = DummyBackend::new();
        let target = image(&backend, ImageFormat::Rgba8Unorm);
        let mut list = CommandList::new();
        CommandContext::Graphics(&mut list).pipeline_barrier([Barrier::image(
            &target,
            AccessKind::ShaderRead,
            AccessKind::TransferWrite,
        )]);
        submit(&backend, &list, &[], &[], None);
        assert_eq!(backend.validation_errors().len(), 1);
    }

    #[test]
    fn test_depth_encoding() {
        assert_eq!(
            encode_depth_stencil(ImageFormat::Depth24PlusStencil8, 1.0, 3),
            0x03ff_ffffu32.to_le_bytes().to_vec()
        );
        assert_eq!(
            encode_depth_stencil(ImageFormat::Depth16Unorm, 0.0, 0),
            vec![0, 0]
        );
    }

    #[test]
    fn test_host_access_requires_visibility() {
        let backend = DummyBackend::new();
        let local = buffer(&backend, 8, BufferUsage::VERTEX | BufferUsage::COPY_DST);
        assert!(backend.write_buffer(local.gpu(), 0, &[1; 8]).is_err());
        let staging = buffer(&backend, 8, BufferUsage::STAGING_UPLOAD);
        backend.write_buffer(staging.gpu(), 4, &[7; 4]).unwrap();
        assert!(backend.write_buffer(staging.gpu(), 6, &[7; 4]).is_err());
        assert_eq!(
            backend.inspect_buffer(&staging).unwrap(),
            vec![0, 0, 0, 0, 7, 7, 7, 7]
        );
    }

    #[test]
    fn test_headless_swapchain_round_robin() {
        let backend = DummyBackend::new();
        let desc = SwapchainDescriptor::new(4, 4).with_image_count(2);
        let (swapchain, images, _) = backend
            .create_swapchain(&SurfaceTarget::Headless, &desc, None)
            .unwrap();
        assert_eq!(images.len(), 2);
        let acquire = backend.create_semaphore(SemaphoreKind::Binary).unwrap();
        let index = backend
            .acquire_next_image(&swapchain, Duration::ZERO, &acquire)
            .unwrap();
        assert_eq!(index, 0);
        assert!(!backend.present(&swapchain, 0, &acquire).unwrap());
        let index = backend
            .acquire_next_image(&swapchain, Duration::ZERO, &acquire)
            .unwrap();
        assert_eq!(index, 1);
        assert!(!backend.present(&swapchain, 1, &acquire).unwrap());
        assert_eq!(backend.presented_images(), vec![0, 1]);

        backend.set_surface_out_of_date(true);
        assert_eq!(
            backend.acquire_next_image(&swapchain, Duration::ZERO, &acquire),
            Err(GraphicsError::SurfaceOutdated)
        );
    }
}
