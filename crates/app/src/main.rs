//! framepace - headless frame pipeline demo
//!
//! Drives the bounded-latency render loop on the simulated GPU and reports
//! frame rate. An optional first argument names a TOML configuration file
//! (default `framepace.toml`; missing means defaults).
//!
//! With `simulation.lose_device_at_frame` set, the device is removed mid-run
//! and the whole pipeline is rebuilt, up to `app.max_rebuilds` times.

use anyhow::{Context, Result};
use tracing::{info, warn};

use framepace_core::{Config, Timer};
use framepace_renderer::{FrameContext, FrameOutcome, RenderLoop};
use framepace_rhi::RemovalReason;
use framepace_rhi::sim::{Sim, SimCommandBuffer, SimGpu};

const STATS_INTERVAL: u64 = 120;

fn build_pipeline(config: &Config) -> Result<RenderLoop<Sim>> {
    let gpu = SimGpu::new(
        config.simulation.buffer_count,
        config.simulation.gpu_frame_time(),
    )
    .context("failed to create simulated GPU")?;

    let render_loop = RenderLoop::new(gpu.device, gpu.queue, gpu.swapchain, &config.pipeline)
        .context("failed to create render loop")?;
    Ok(render_loop)
}

fn draw_triangle(frame: &mut FrameContext<'_, SimCommandBuffer>) {
    frame.begin_rendering(Some(frame.clear_color()));
    frame.draw(3, 1);
    frame.end_rendering();
}

fn main() -> Result<()> {
    framepace_core::init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "framepace.toml".to_owned());
    let config = Config::load_from_path(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    info!("Starting framepace demo");

    let mut render_loop = build_pipeline(&config)?;
    let timer = Timer::new();
    let mut rendered = 0u64;
    let mut rebuilds = 0u32;
    let mut device_removed = false;

    while rendered < config.app.frames {
        if !device_removed && config.simulation.lose_device_at_frame == Some(rendered) {
            warn!("Removing simulated device at frame {}", rendered);
            render_loop.device().remove(RemovalReason::Reset);
            device_removed = true;
        }

        match render_loop.render_frame(draw_triangle) {
            Ok(FrameOutcome::Presented { .. }) => {
                rendered += 1;
                if rendered % STATS_INTERVAL == 0 {
                    info!(
                        "{} frames, {:.1} fps, {} in flight",
                        rendered,
                        timer.rate(rendered),
                        render_loop.frames_in_flight()
                    );
                }
            }
            Ok(FrameOutcome::Skipped) => {}
            Err(e) if e.requires_rebuild() && rebuilds < config.app.max_rebuilds => {
                warn!("Rebuilding pipeline: {}", e);
                render_loop.shutdown();
                render_loop = build_pipeline(&config)?;
                rebuilds += 1;
            }
            Err(e) => return Err(anyhow::Error::from(e).context("frame loop failed")),
        }
    }

    render_loop.shutdown();
    let validation = render_loop.device().validation().clone();
    drop(render_loop);

    if !validation.is_clean() {
        warn!(
            "GPU validation reported {} issue(s)",
            validation.messages().len()
        );
    }

    info!(
        "Rendered {} frames in {:.2}s ({:.1} fps, {} rebuild(s))",
        rendered,
        timer.elapsed_secs(),
        timer.rate(rendered),
        rebuilds
    );

    Ok(())
}
