//! Frame lifecycle integration tests.
//!
//! Parameterized over the number of frames in flight with `rstest`. Timing is
//! driven through the simulated backend: `pause` holds GPU work back so the
//! CPU can be observed running ahead, `resume` lets it drain.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rstest::rstest;

use common::{START_TIMEOUT, SURFACE_SIZE, TestContext, clear_graph, generate_test_pattern};
use redlilium_frame_sync::types::ImageLayout;
use redlilium_frame_sync::{
    AccessKind, Barrier, FrameComponent, FrameInfo, FramePhase, FrameState, FrameTimeline,
    GraphicsError, PresentRegion, ReadbackSource, RenderGraphBuilder,
};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// BGRA8 bytes of a color made of 0.0 / 1.0 channels, repeated over the surface.
fn bgra_surface(color: [f32; 4]) -> Vec<u8> {
    let to_byte = |c: f32| if c > 0.5 { 255 } else { 0 };
    let texel = [to_byte(color[2]), to_byte(color[1]), to_byte(color[0]), to_byte(color[3])];
    texel.repeat((SURFACE_SIZE * SURFACE_SIZE) as usize)
}

// ============================================================================
// Slot cycling and timeline values
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_slots_cycle_round_robin(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    let mut slots = Vec::new();
    for _ in 0..frames_in_flight * 2 + 1 {
        slots.push(ctx.frames.current_slot());
        ctx.run_frame(&graph, &image);
    }

    let expected: Vec<usize> = (0..frames_in_flight * 2 + 1)
        .map(|i| i % frames_in_flight)
        .collect();
    assert_eq!(slots, expected);
    assert_eq!(
        ctx.frames.total_frame_count(),
        (frames_in_flight * 2 + 1) as u64
    );
    assert_eq!(ctx.frames.current_slot(), 1 % frames_in_flight);
    assert_eq!(ctx.frames.timeline(0).frame_count(), 3);
    assert!(ctx.dummy().validation_errors().is_empty());
}

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_timeline_reaches_copy_to_present_of_last_use(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    for _ in 0..frames_in_flight * 2 {
        ctx.run_frame(&graph, &image);
    }

    let backend = ctx.device.backend();
    for slot in 0..frames_in_flight {
        let timeline = ctx.frames.timeline(slot);
        assert_eq!(timeline.frame_count(), 2);
        assert_eq!(
            backend.semaphore_value(timeline.semaphore()).unwrap(),
            FrameTimeline::value_at(1, FramePhase::CopyToPresentFinished)
        );
        assert_eq!(timeline.baseline(), 11);
    }
}

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_frames_need_only_transfer_host_signals(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    ctx.run_frame(&graph, &image);
    // Only the empty deferred-submission phase is signaled from the host.
    assert_eq!(ctx.dummy().host_signal_count(), 1);

    for _ in 0..4 {
        ctx.run_frame(&graph, &image);
    }
    assert_eq!(ctx.dummy().host_signal_count(), 5);
    assert_eq!(ctx.dummy().pending_count(), 0);
    assert!(ctx.dummy().validation_errors().is_empty());
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_state_follows_lifecycle() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);
    assert_eq!(ctx.frames.state(), FrameState::Idle);
    assert_eq!(ctx.frames.acquired_image(), None);

    let index = ctx.frames.start_frame(START_TIMEOUT).unwrap();
    assert_eq!(ctx.frames.state(), FrameState::Recording);
    assert_eq!(ctx.frames.acquired_image(), Some(index));

    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    assert_eq!(ctx.frames.state(), FrameState::Submitted);

    let out_of_date = ctx
        .frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();
    assert!(!out_of_date);
    assert_eq!(ctx.frames.state(), FrameState::Idle);
    assert_eq!(ctx.frames.acquired_image(), None);
}

#[test]
#[should_panic(expected = "present_to_framebuffer called in state Recording")]
fn test_present_before_submit_panics() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    let _ = ctx
        .frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image));
}

#[test]
#[should_panic(expected = "start_frame called in state Recording")]
fn test_double_start_panics() {
    let mut ctx = TestContext::new(2);
    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    let _ = ctx.frames.start_frame(START_TIMEOUT);
}

#[test]
#[should_panic(expected = "command_context called in state Idle")]
fn test_recording_outside_frame_panics() {
    let mut ctx = TestContext::new(1);
    let _ = ctx.frames.command_context();
}

// ============================================================================
// CPU running ahead of the GPU
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_cpu_blocks_after_frames_in_flight(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    ctx.dummy().pause();
    for _ in 0..frames_in_flight {
        ctx.run_frame(&graph, &image);
    }
    assert!(!ctx.frames.is_slot_ready(0).unwrap());
    // Main submission, present copy and present per frame.
    assert_eq!(ctx.dummy().pending_count(), frames_in_flight * 3);

    let result = ctx.frames.start_frame(Duration::from_millis(20));
    assert!(matches!(result, Err(GraphicsError::Timeout(_))));
    assert_eq!(ctx.frames.state(), FrameState::Idle);

    ctx.dummy().resume();
    assert_eq!(ctx.dummy().pending_count(), 0);
    assert!(ctx.frames.is_slot_ready(0).unwrap());

    ctx.run_frame(&graph, &image);
    assert_eq!(ctx.frames.total_frame_count(), frames_in_flight as u64 + 1);
    assert!(ctx.dummy().validation_errors().is_empty());
}

#[test]
fn test_stepping_releases_one_slot() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    ctx.dummy().pause();
    ctx.run_frame(&graph, &image);
    ctx.run_frame(&graph, &image);

    // Frame 0: main submission, present copy, present.
    for _ in 0..3 {
        assert!(ctx.dummy().step());
    }
    assert!(ctx.frames.is_slot_ready(0).unwrap());
    assert!(!ctx.frames.is_slot_ready(1).unwrap());

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();

    ctx.dummy().resume();
    ctx.frames.wait_idle().unwrap();
    assert_eq!(ctx.dummy().presented_images(), vec![0, 1, 2]);
    assert!(ctx.dummy().validation_errors().is_empty());
}

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_readback_frame_holds_its_slot_until_gpu_catches_up(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);
    let buffer = ctx.storage_buffer(32, "results");
    let data = generate_test_pattern(32);

    ctx.run_frame(&graph, &image);

    // Frame 1: upload and read back, then hold the GPU before the present copy.
    ctx.frames
        .submission_queue()
        .enqueue_buffer_upload_with_access(&buffer, &data, AccessKind::TransferRead)
        .unwrap();
    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    let readback_slot = ctx.frames.current_slot();
    graph.execute(&mut ctx.frames);
    let handle = ctx
        .frames
        .enqueue_post_graphics_readback(ReadbackSource::Buffer(Arc::clone(&buffer)))
        .unwrap();
    ctx.frames.submit_main_command_buffer().unwrap();
    // The copy has executed, but the result is only handed over by frame completion.
    assert!(!handle.is_ready());
    ctx.dummy().pause();
    ctx.frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();
    assert_eq!(handle.frame_number(), 1);
    assert_eq!(handle.try_take(), Some(data));

    for _ in 1..frames_in_flight {
        ctx.run_frame(&graph, &image);
    }
    assert_eq!(ctx.frames.current_slot(), readback_slot);
    assert!(!ctx.frames.is_slot_ready(readback_slot).unwrap());

    let result = ctx.frames.start_frame(Duration::from_millis(20));
    assert!(matches!(result, Err(GraphicsError::Timeout(_))));

    let released = Arc::new(AtomicBool::new(false));
    let helper = std::thread::spawn({
        let device = Arc::clone(&ctx.device);
        let released = Arc::clone(&released);
        move || {
            std::thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            device.backend().as_dummy().unwrap().resume();
        }
    });
    ctx.frames.start_frame(Duration::from_secs(10)).unwrap();
    assert!(released.load(Ordering::SeqCst));
    helper.join().unwrap();

    assert_eq!(ctx.frames.total_frame_count(), 1 + frames_in_flight as u64);
    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();
    assert!(ctx.dummy().validation_errors().is_empty());
}

// ============================================================================
// Presentation
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::triple(3)]
fn test_present_copies_into_swapchain_image(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let red = clear_graph(&image, RED);
    let green = clear_graph(&image, GREEN);

    ctx.run_frame(&red, &image);
    ctx.run_frame(&green, &image);

    let dummy = ctx.dummy();
    assert_eq!(dummy.presented_images(), vec![0, 1]);
    let swapchain = ctx.frames.swapchain();
    let first = swapchain.image(0).unwrap();
    let second = swapchain.image(1).unwrap();
    assert_eq!(dummy.inspect_image(first).unwrap(), bgra_surface(RED));
    assert_eq!(dummy.inspect_image(second).unwrap(), bgra_surface(GREEN));
    assert_eq!(dummy.image_layout(second), Some(ImageLayout::PresentSrc));
    // The source is handed back to the access it was presented from.
    assert_eq!(
        dummy.image_layout(&image),
        Some(ImageLayout::ColorAttachmentOptimal)
    );
    assert!(dummy.validation_errors().is_empty());
}

#[test]
fn test_present_from_transfer_read_skips_source_barriers() {
    let mut ctx = TestContext::new(1);
    let image = ctx.color_image("color");
    let mut builder = RenderGraphBuilder::new();
    builder
        .use_image(&image, AccessKind::TransferWrite)
        .record_graphics_pass("clear", {
            let image = Arc::clone(&image);
            move |ctx| ctx.clear_color_image(&image, GREEN)
        });
    builder.add_external_output_dependency_image(&image, AccessKind::TransferRead);
    let graph = builder.build();
    assert_eq!(graph.barrier_count(), 2);

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(
            &image,
            PresentRegion::whole(&image).with_source_access(AccessKind::TransferRead),
        )
        .unwrap();

    let dummy = ctx.dummy();
    // Two graph barriers plus the swapchain image's two transitions.
    assert_eq!(dummy.barrier_count(), 4);
    assert_eq!(
        dummy.image_layout(&image),
        Some(ImageLayout::TransferSrcOptimal)
    );
    assert!(dummy.validation_errors().is_empty());
}

#[test]
fn test_present_region_with_offsets() {
    let mut ctx = TestContext::new(1);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(
            &image,
            PresentRegion::new(2, 2)
                .with_src_offset(redlilium_frame_sync::types::Offset3d::new_2d(1, 1))
                .with_dst_offset(redlilium_frame_sync::types::Offset3d::new_2d(6, 6)),
        )
        .unwrap();

    let dummy = ctx.dummy();
    let pixels = dummy
        .inspect_image(ctx.frames.swapchain().image(0).unwrap())
        .unwrap();
    let texel = |x: u32, y: u32| {
        let at = ((y * SURFACE_SIZE + x) * 4) as usize;
        pixels[at..at + 4].to_vec()
    };
    assert_eq!(texel(7, 7), vec![0, 0, 255, 255]);
    assert_eq!(texel(6, 6), vec![0, 0, 255, 255]);
    assert_eq!(texel(0, 0), vec![0, 0, 0, 0]);
    assert!(dummy.validation_errors().is_empty());
}

#[test]
fn test_out_of_date_surface_and_resize() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);
    ctx.run_frame(&graph, &image);

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.dummy().set_surface_out_of_date(true);
    let out_of_date = ctx
        .frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();
    assert!(out_of_date);
    assert_eq!(ctx.frames.state(), FrameState::Idle);
    assert_eq!(ctx.frames.total_frame_count(), 2);

    let result = ctx.frames.start_frame(START_TIMEOUT);
    assert!(matches!(result, Err(GraphicsError::SurfaceOutdated)));
    assert_eq!(ctx.frames.state(), FrameState::Idle);

    ctx.frames
        .resize(SURFACE_SIZE * 2, SURFACE_SIZE * 2)
        .unwrap();
    assert_eq!(ctx.frames.swapchain().width(), SURFACE_SIZE * 2);
    assert_eq!(ctx.frames.swapchain().height(), SURFACE_SIZE * 2);

    assert!(!ctx.run_frame(&graph, &image));
    assert_eq!(ctx.frames.total_frame_count(), 3);
    assert!(ctx.dummy().validation_errors().is_empty());
}

// ============================================================================
// Readbacks and deferred uploads
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::double(2)]
fn test_buffer_readback_sees_deferred_upload(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);
    let buffer = ctx.storage_buffer(64, "data");
    let data = generate_test_pattern(64);

    ctx.frames
        .submission_queue()
        .enqueue_buffer_upload(&buffer, &data)
        .unwrap();

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    ctx.frames.command_context().pipeline_barrier([Barrier::buffer(
        &buffer,
        AccessKind::ShaderRead,
        AccessKind::TransferRead,
    )]);
    let handle = ctx
        .frames
        .enqueue_post_graphics_readback(ReadbackSource::Buffer(Arc::clone(&buffer)))
        .unwrap();
    ctx.frames.submit_main_command_buffer().unwrap();
    assert!(!handle.is_ready());

    ctx.frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();
    assert_eq!(handle.frame_number(), 0);
    assert!(handle.is_ready());
    assert_eq!(handle.try_take(), Some(data));
    assert_eq!(handle.try_take(), None);
    assert_eq!(ctx.frames.submission_queue().staging_count(), 0);
    assert!(ctx.dummy().validation_errors().is_empty());
}

#[test]
fn test_image_readback_of_rendered_frame() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let mut builder = RenderGraphBuilder::new();
    builder
        .use_image(&image, AccessKind::TransferWrite)
        .record_graphics_pass("clear", {
            let image = Arc::clone(&image);
            move |ctx| ctx.clear_color_image(&image, GREEN)
        });
    builder.add_external_output_dependency_image(&image, AccessKind::TransferRead);
    let graph = builder.build();

    ctx.run_frame(&clear_graph(&image, RED), &image);

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    graph.execute(&mut ctx.frames);
    let handle = ctx
        .frames
        .enqueue_post_graphics_readback(ReadbackSource::Image(Arc::clone(&image)))
        .unwrap();
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(
            &image,
            PresentRegion::whole(&image).with_source_access(AccessKind::TransferRead),
        )
        .unwrap();

    assert_eq!(handle.frame_number(), 1);
    assert_eq!(handle.try_take(), Some(bgra_surface(GREEN)));
    assert!(ctx.dummy().validation_errors().is_empty());
}

// ============================================================================
// Components
// ============================================================================

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    name: &'static str,
}

impl Recorder {
    fn push(&self, hook: &str, info: &FrameInfo) {
        self.events
            .lock()
            .push(format!("{}:{}:{}:{}", self.name, hook, info.frame_number, info.slot));
    }
}

impl FrameComponent for Recorder {
    fn on_frame_start(&mut self, info: &FrameInfo) {
        self.push("start", info);
    }

    fn on_pre_main_submission(&mut self, info: &FrameInfo) {
        self.push("pre", info);
    }

    fn on_post_main_submission(&mut self, info: &FrameInfo) {
        self.push("post", info);
    }

    fn on_frame_complete(&mut self, info: &FrameInfo) {
        self.push("complete", info);
    }
}

#[test]
fn test_component_hooks_run_in_order() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, RED);
    let events = Arc::new(Mutex::new(Vec::new()));
    ctx.frames.add_component(Recorder {
        events: Arc::clone(&events),
        name: "a",
    });
    ctx.frames.add_component(Recorder {
        events: Arc::clone(&events),
        name: "b",
    });

    ctx.run_frame(&graph, &image);
    ctx.run_frame(&graph, &image);

    let events = events.lock();
    assert_eq!(
        events[..8],
        [
            "a:start:0:0",
            "b:start:0:0",
            "a:pre:0:0",
            "b:pre:0:0",
            "a:post:0:0",
            "b:post:0:0",
            "a:complete:0:0",
            "b:complete:0:0",
        ]
    );
    assert_eq!(events.len(), 16);
    assert_eq!(events[8], "a:start:1:1");
    assert_eq!(events[15], "b:complete:1:1");
}

#[test]
fn test_failed_start_runs_no_hooks() {
    let mut ctx = TestContext::new(1);
    let events = Arc::new(Mutex::new(Vec::new()));
    ctx.frames.add_component(Recorder {
        events: Arc::clone(&events),
        name: "a",
    });

    ctx.dummy().set_surface_out_of_date(true);
    assert!(ctx.frames.start_frame(START_TIMEOUT).is_err());
    assert!(events.lock().is_empty());
}
