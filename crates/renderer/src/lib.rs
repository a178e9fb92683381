//! Bounded-latency frame pipeline.
//!
//! This crate orchestrates frame submission on top of the RHI traits:
//! - [`FrameScheduler`]: fixed ring of recording slots gated by a completion fence
//! - [`PresentableSurface`]: back-buffer state tracking and transitions
//! - [`RenderLoop`]: one frame end to end, with device-liveness diagnosis

mod error;
pub mod frame_scheduler;
pub mod render_loop;
pub mod surface;

pub use error::{FrameError, FrameResult};
pub use frame_scheduler::{CommandRecordingSlot, FrameScheduler};
pub use render_loop::{FrameContext, FrameOutcome, RenderLoop};
pub use surface::{BufferState, PresentableSurface};

/// Default number of frames that can be in flight simultaneously.
pub const DEFAULT_RING_DEPTH: usize = 2;
