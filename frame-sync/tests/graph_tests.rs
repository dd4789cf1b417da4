//! Render graph integration tests: barrier synthesis across pass chains and
//! execution of static graphs inside the frame lifecycle.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use common::{START_TIMEOUT, SURFACE_SIZE, TestContext, clear_graph, generate_test_pattern};
use redlilium_frame_sync::types::{Extent3d, ImageCopy, ImageLayout, Offset3d};
use redlilium_frame_sync::{
    AccessKind, AccessMapper, CommandList, ImageDescriptor, ImageFormat, ImageUsage, PassKind,
    PresentRegion, ReadbackSource, RenderGraphBuilder,
};

#[test]
fn test_pass_chain_barriers() {
    let ctx = TestContext::new(1);
    let color = ctx.color_image("color");
    let particles = ctx.storage_buffer(256, "particles");

    let mut builder = RenderGraphBuilder::new();
    builder
        .use_buffer(&particles, AccessKind::ShaderRandomWrite)
        .record_compute_pass("simulate", |_| {});
    builder
        .use_buffer(&particles, AccessKind::VertexRead)
        .use_image(&color, AccessKind::ColorAttachmentWrite)
        .record_graphics_pass("draw", |_| {});
    builder
        .use_image(&color, AccessKind::ColorAttachmentWrite)
        .record_graphics_pass("overlay", |_| {});
    builder
        .use_image(&color, AccessKind::ShaderReadRandomWrite)
        .record_compute_pass("tonemap", |_| {});
    builder
        .use_image(&color, AccessKind::TransferRead)
        .record_transfer_pass("copy out", |_| {});
    let graph = builder.build();

    let counts: Vec<usize> = graph.passes().iter().map(|p| p.barriers().len()).collect();
    // Buffers need no barrier on first use; the overlay repeats the draw's access.
    assert_eq!(counts, vec![0, 2, 0, 1, 1]);
    assert_eq!(graph.barrier_count(), 4);

    let draw = &graph.passes()[1];
    assert_eq!(draw.kind(), PassKind::Graphics);
    let buffer_barrier = draw
        .barriers()
        .iter()
        .find(|b| b.resource_id() == particles.id())
        .unwrap();
    assert_eq!(
        buffer_barrier.src(),
        AccessMapper::resolve_for_buffer(AccessKind::ShaderRandomWrite)
    );
    assert_eq!(
        buffer_barrier.dst(),
        AccessMapper::resolve_for_buffer(AccessKind::VertexRead)
    );
    let image_barrier = draw
        .barriers()
        .iter()
        .find(|b| b.resource_id() == color.id())
        .unwrap();
    assert_eq!(image_barrier.src().layout, ImageLayout::Undefined);
    assert_eq!(
        image_barrier.dst().layout,
        ImageLayout::ColorAttachmentOptimal
    );

    let tonemap = &graph.passes()[3];
    assert_eq!(tonemap.barriers()[0].dst().layout, ImageLayout::General);

    assert_eq!(
        graph.final_access(color.id()),
        Some(AccessKind::TransferRead)
    );
    assert_eq!(
        graph.final_access(particles.id()),
        Some(AccessKind::VertexRead)
    );
}

#[test]
fn test_synchronization_pass_records_only_barriers() {
    let ctx = TestContext::new(1);
    let color = ctx.color_image("color");

    let mut builder = RenderGraphBuilder::new();
    builder
        .use_image(&color, AccessKind::ColorAttachmentWrite)
        .record_graphics_pass("draw", |_| {});
    builder
        .use_image(&color, AccessKind::ShaderRead)
        .record_synchronization("to sampled");
    let graph = builder.build();

    let mut list = CommandList::new();
    graph.record(&mut list);
    assert_eq!(list.barrier_count(), 2);
    assert!(!graph.passes()[1].is_recordable());
    // Label, barrier and end label for the draw; a bare barrier for the sync pass.
    assert_eq!(list.len(), 4);
}

#[rstest]
#[case::single(1)]
#[case::double(2)]
#[case::triple(3)]
fn test_static_graph_reuse_does_not_accumulate_barriers(#[case] frames_in_flight: usize) {
    let mut ctx = TestContext::new(frames_in_flight);
    let image = ctx.color_image("color");
    let graph = clear_graph(&image, [0.0, 0.0, 1.0, 1.0]);
    assert_eq!(graph.barrier_count(), 2);

    let recorded = Arc::new(AtomicUsize::new(0));
    let mut builder = RenderGraphBuilder::new();
    builder
        .use_image(&image, AccessKind::ColorAttachmentWrite)
        .record_graphics_pass("count", {
            let recorded = Arc::clone(&recorded);
            move |_| {
                recorded.fetch_add(1, Ordering::Relaxed);
            }
        });
    let counter = builder.build();

    for frame in 1..=4 {
        ctx.frames.start_frame(START_TIMEOUT).unwrap();
        graph.execute(&mut ctx.frames);
        counter.execute(&mut ctx.frames);
        ctx.frames.submit_main_command_buffer().unwrap();
        ctx.frames
            .present_to_framebuffer(&image, PresentRegion::whole(&image))
            .unwrap();

        // Graph: two barriers. The second graph starts from Undefined again.
        // Present copy: two on the swapchain image, two on the source.
        assert_eq!(ctx.dummy().barrier_count(), frame * 7);
        assert_eq!(recorded.load(Ordering::Relaxed), frame as usize);
    }
    assert_eq!(graph.barrier_count(), 2);
    assert!(ctx.dummy().validation_errors().is_empty());
}

#[test]
fn test_uploaded_texture_flows_through_graph_to_swapchain() {
    let mut ctx = TestContext::new(2);
    let texture = ctx
        .device
        .create_image(
            &ImageDescriptor::new_2d(
                SURFACE_SIZE,
                SURFACE_SIZE,
                ImageFormat::Bgra8Unorm,
                ImageUsage::SAMPLED | ImageUsage::COPY_DST | ImageUsage::COPY_SRC,
            )
            .with_label("texture"),
        )
        .unwrap();
    let color = ctx.color_image("color");
    let texels = generate_test_pattern((SURFACE_SIZE * SURFACE_SIZE * 4) as usize);
    ctx.frames
        .submission_queue()
        .enqueue_image_upload(&texture, &texels)
        .unwrap();

    let mut builder = RenderGraphBuilder::new();
    builder.add_external_input_dependency_image(&texture, AccessKind::ShaderRead);
    builder
        .use_image(&texture, AccessKind::ShaderRead)
        .record_graphics_pass("sample", |_| {});
    builder
        .use_image(&texture, AccessKind::TransferRead)
        .use_image(&color, AccessKind::TransferWrite)
        .record_transfer_pass("blit", {
            let texture = Arc::clone(&texture);
            let color = Arc::clone(&color);
            move |ctx| {
                ctx.copy_image(
                    &texture,
                    &color,
                    ImageCopy {
                        src_offset: Offset3d::ZERO,
                        dst_offset: Offset3d::ZERO,
                        extent: Extent3d::new_2d(SURFACE_SIZE, SURFACE_SIZE),
                    },
                )
            }
        });
    builder.add_external_output_dependency_image(&texture, AccessKind::ShaderRead);
    builder.add_external_output_dependency_image(&color, AccessKind::ColorAttachmentWrite);
    let graph = builder.build();

    // The sampled read matches the input dependency.
    assert!(graph.passes()[0].barriers().is_empty());
    assert_eq!(graph.passes()[1].barriers().len(), 2);

    ctx.run_frame(&graph, &color);

    let dummy = ctx.dummy();
    let presented = dummy
        .inspect_image(ctx.frames.swapchain().image(0).unwrap())
        .unwrap();
    assert_eq!(presented, texels);
    assert_eq!(
        dummy.image_layout(&texture),
        Some(ImageLayout::ReadOnlyOptimal)
    );
    assert!(dummy.validation_errors().is_empty());
}

#[test]
fn test_compute_fill_is_read_back() {
    let mut ctx = TestContext::new(2);
    let image = ctx.color_image("color");
    let present = clear_graph(&image, [1.0, 1.0, 1.0, 1.0]);
    let buffer = ctx.storage_buffer(32, "results");

    let mut builder = RenderGraphBuilder::new();
    builder
        .use_buffer(&buffer, AccessKind::TransferWrite)
        .record_compute_pass("fill", {
            let buffer = Arc::clone(&buffer);
            move |ctx| ctx.fill_buffer(&buffer, 0, 32, 0xAABB_CCDD)
        });
    builder.add_external_output_dependency_buffer(&buffer, AccessKind::TransferRead);
    let graph = builder.build();
    // First buffer use needs no barrier; the output dependency adds one.
    assert_eq!(graph.barrier_count(), 1);

    ctx.frames.start_frame(START_TIMEOUT).unwrap();
    present.execute(&mut ctx.frames);
    graph.execute(&mut ctx.frames);
    let handle = ctx
        .frames
        .enqueue_post_graphics_readback(ReadbackSource::Buffer(Arc::clone(&buffer)))
        .unwrap();
    ctx.frames.submit_main_command_buffer().unwrap();
    ctx.frames
        .present_to_framebuffer(&image, PresentRegion::whole(&image))
        .unwrap();

    let expected = 0xAABB_CCDDu32.to_le_bytes().repeat(8);
    assert_eq!(handle.try_take(), Some(expected));
    assert!(ctx.dummy().validation_errors().is_empty());
}
