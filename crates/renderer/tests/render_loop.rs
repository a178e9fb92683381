//! End-to-end frame loops on the simulated GPU.

use std::time::Duration;

use framepace_core::PipelineConfig;
use framepace_renderer::{FrameContext, FrameError, FrameOutcome, RenderLoop};
use framepace_rhi::sim::{Sim, SimCommand, SimCommandBuffer, SimDevice, SimGpu};
use framepace_rhi::{PresentStatus, RemovalReason, TextureBarrier};

fn pipeline(ring_depth: usize, wait_timeout_ms: u64) -> PipelineConfig {
    PipelineConfig {
        ring_depth,
        wait_timeout_ms,
        sync_interval: 0,
        ..PipelineConfig::default()
    }
}

fn build(
    buffers: u32,
    gpu_frame_time: Duration,
    config: &PipelineConfig,
) -> (SimDevice, RenderLoop<Sim>) {
    let gpu = SimGpu::new(buffers, gpu_frame_time).expect("sim gpu");
    let device = gpu.device.clone();
    let render_loop =
        RenderLoop::new(gpu.device, gpu.queue, gpu.swapchain, config).expect("render loop");
    (device, render_loop)
}

fn draw_triangle(frame: &mut FrameContext<'_, SimCommandBuffer>) {
    frame.begin_rendering(Some(frame.clear_color()));
    frame.draw(3, 1);
    frame.end_rendering();
}

#[test]
fn test_long_run_is_validation_clean() {
    for ring_depth in [1, 2, 3] {
        let (device, mut render_loop) =
            build(2, Duration::from_micros(500), &pipeline(ring_depth, 5000));

        for _ in 0..40 {
            render_loop.render_frame(draw_triangle).expect("frame");
        }
        render_loop.wait_idle().expect("idle");

        assert_eq!(render_loop.queue().executed(), 40);
        assert_eq!(render_loop.swapchain().present_count(), 40);
        drop(render_loop);

        assert!(
            device.validation().is_clean(),
            "ring depth {ring_depth}: {:?}",
            device.validation().messages()
        );
    }
}

#[test]
fn test_frames_in_flight_never_exceed_ring_depth() {
    let (_device, mut render_loop) = build(3, Duration::from_millis(2), &pipeline(2, 5000));

    for _ in 0..20 {
        render_loop.render_frame(draw_triangle).expect("frame");
        assert!(render_loop.frames_in_flight() <= 2);
    }
}

#[test]
fn test_render_target_transition_precedes_draws() {
    let (device, mut render_loop) = build(2, Duration::ZERO, &pipeline(2, 5000));

    for _ in 0..4 {
        render_loop
            .render_frame(|frame| {
                let recorded = frame.commands().commands().to_vec();
                let target = frame.target().index;
                assert_eq!(
                    recorded,
                    vec![SimCommand::Barrier {
                        image: target,
                        barrier: TextureBarrier::present_to_render_target(),
                    }]
                );
                draw_triangle(frame);
            })
            .expect("frame");
    }

    drop(render_loop);
    assert!(device.validation().is_clean());
}

#[test]
fn test_soft_present_status_does_not_stop_the_loop() {
    let (_device, mut render_loop) = build(2, Duration::ZERO, &pipeline(2, 5000));
    render_loop.swapchain().set_occluded(true);

    for _ in 0..3 {
        match render_loop.render_frame(draw_triangle).expect("frame") {
            FrameOutcome::Presented { status, .. } => assert_eq!(status, PresentStatus::Occluded),
            FrameOutcome::Skipped => panic!("frame skipped"),
        }
    }
    assert_eq!(render_loop.frame_index(), 3);
}

#[test]
fn test_teardown_is_idempotent() {
    let (_device, mut render_loop) = build(2, Duration::ZERO, &pipeline(2, 5000));
    render_loop.shutdown();
    render_loop.shutdown();
    drop(render_loop);

    let (_device, mut render_loop) = build(2, Duration::ZERO, &pipeline(3, 5000));
    for _ in 0..5 {
        render_loop.render_frame(draw_triangle).expect("frame");
    }
    render_loop.shutdown();
    render_loop.shutdown();
    assert!(render_loop.is_shut_down());
}

#[test]
fn test_device_loss_is_reported_with_reason() {
    let (device, mut render_loop) = build(2, Duration::ZERO, &pipeline(2, 200));

    for _ in 0..5 {
        render_loop.render_frame(draw_triangle).expect("frame");
    }
    device.remove(RemovalReason::Hung);

    let err = render_loop
        .render_frame(draw_triangle)
        .expect_err("device is gone");
    assert!(matches!(err, FrameError::DeviceLost(RemovalReason::Hung)));
    assert!(err.requires_rebuild());

    render_loop.shutdown();
}

#[test]
fn test_hung_queue_is_fatal_stall() {
    let (_device, mut render_loop) = build(2, Duration::ZERO, &pipeline(2, 50));
    render_loop.queue().pause();

    render_loop.render_frame(draw_triangle).expect("frame 0");
    render_loop.render_frame(draw_triangle).expect("frame 1");

    let err = render_loop
        .render_frame(draw_triangle)
        .expect_err("GPU never retires frame 0");
    match &err {
        FrameError::FatalStall {
            frame,
            waited_for,
            completed,
            ..
        } => {
            assert_eq!(*frame, 2);
            assert_eq!(*waited_for, 1);
            assert_eq!(*completed, 0);
        }
        other => panic!("expected a fatal stall, got {other}"),
    }
    assert!(!err.is_device_lost());
    assert!(err.requires_rebuild());
    assert_eq!(render_loop.frame_index(), 2);

    render_loop.queue().resume();
    render_loop.shutdown();
}
