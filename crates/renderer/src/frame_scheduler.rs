//! Bounded-latency frame scheduling.
//!
//! This module provides the [`FrameScheduler`], which hands out one
//! [`CommandRecordingSlot`] per frame from a fixed ring and guarantees that a
//! slot is never reset while the GPU may still be executing the frame that
//! last used it.
//!
//! # Overview
//!
//! Two counters drive the scheduler:
//!
//! - the frame index, incremented once per submitted frame by
//!   [`FrameScheduler::end_frame`]
//! - the completed frame index, the last value read back from the
//!   [`CompletionFence`]
//!
//! Frame `F` signals the fence to `F + 1`, so the completed frame index is
//! also the number of frames the GPU has retired. Before reusing a slot,
//! [`FrameScheduler::begin_frame`] blocks until fewer than `ring_depth`
//! frames are outstanding:
//!
//! ```text
//! ring_depth = 2
//!
//! frame:   0        1        2 ──wait(1)──►        3 ──wait(2)──►
//! slot:    0        1        0                     1
//! GPU:         [frame 0]─► 1     [frame 1]─► 2
//! ```
//!
//! Under steady state the GPU keeps up and the wait is already satisfied;
//! the CPU blocks only when it would otherwise run more than
//! `ring_depth - 1` frames ahead.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use framepace_renderer::FrameScheduler;
//! use framepace_rhi::{CommandQueue, CommandRecorder, Device};
//! use framepace_rhi::sim::SimGpu;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gpu = SimGpu::new(2, Duration::from_millis(4))?;
//! let slots = vec![
//!     gpu.device.create_command_buffer("Command Allocator 0")?,
//!     gpu.device.create_command_buffer("Command Allocator 1")?,
//! ];
//! let fence = gpu.device.create_fence("Frame Fence")?;
//! let mut scheduler = FrameScheduler::new(slots, fence, Duration::from_secs(5))?;
//!
//! let slot = scheduler.begin_frame()?;
//! slot.commands_mut().begin()?;
//! // ... record ...
//! slot.commands_mut().close()?;
//! gpu.queue.submit(slot.commands())?;
//! gpu.queue.signal(scheduler.fence(), scheduler.signal_value())?;
//! scheduler.end_frame();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use framepace_rhi::{CommandRecorder, CompletionFence, RhiError};
use tracing::{debug, error, trace};

use crate::error::{FrameError, FrameResult};

/// One ring position: a recorder plus the frame that last used it.
#[derive(Debug)]
pub struct CommandRecordingSlot<C> {
    index: usize,
    commands: C,
    last_frame: Option<u64>,
}

impl<C> CommandRecordingSlot<C> {
    /// Ring position of this slot.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn commands(&self) -> &C {
        &self.commands
    }

    #[inline]
    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    /// The frame that most recently recorded into this slot.
    #[inline]
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }
}

/// Fixed ring of recording slots gated by a completion fence.
///
/// # Thread Safety
///
/// The scheduler is driven by a single CPU thread. The GPU side is reached
/// only through the fence.
pub struct FrameScheduler<C, F> {
    slots: Box<[CommandRecordingSlot<C>]>,
    fence: F,
    frame_index: u64,
    completed: u64,
    timeout: Duration,
    recording: bool,
}

impl<C, F> FrameScheduler<C, F>
where
    C: CommandRecorder,
    F: CompletionFence,
{
    /// Creates a scheduler over `slots`, one per frame in flight.
    ///
    /// # Arguments
    ///
    /// * `slots` - Recorders for the ring; the ring depth is `slots.len()`
    /// * `fence` - Completion fence whose counter starts at 0
    /// * `timeout` - Upper bound on a single completion wait
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidConfig`] if `slots` is empty or `timeout`
    /// is zero.
    pub fn new(slots: Vec<C>, fence: F, timeout: Duration) -> FrameResult<Self> {
        if slots.is_empty() {
            return Err(FrameError::InvalidConfig(
                "ring depth must be at least 1".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(FrameError::InvalidConfig(
                "completion wait timeout must be non-zero".into(),
            ));
        }

        let slots: Box<[_]> = slots
            .into_iter()
            .enumerate()
            .map(|(index, commands)| CommandRecordingSlot {
                index,
                commands,
                last_frame: None,
            })
            .collect();

        debug!(
            "Frame scheduler created (ring depth {}, timeout {:?})",
            slots.len(),
            timeout
        );

        Ok(Self {
            slots,
            fence,
            frame_index: 0,
            completed: 0,
            timeout,
            recording: false,
        })
    }

    /// Number of slots, i.e. the maximum number of frames in flight.
    #[inline]
    pub fn ring_depth(&self) -> usize {
        self.slots.len()
    }

    /// Frames submitted so far; also the index of the next frame.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Frames the GPU is known to have retired.
    #[inline]
    pub fn completed_frame_index(&self) -> u64 {
        self.completed
    }

    /// Submitted frames not yet known to be retired.
    #[inline]
    pub fn frames_in_flight(&self) -> u64 {
        self.frame_index - self.completed
    }

    #[inline]
    pub fn fence(&self) -> &F {
        &self.fence
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fence value the current frame must signal after its submission.
    #[inline]
    pub fn signal_value(&self) -> u64 {
        self.frame_index + 1
    }

    /// Returns the slot at ring position `index`.
    pub fn slot(&self, index: usize) -> Option<&CommandRecordingSlot<C>> {
        self.slots.get(index)
    }

    /// Refreshes the completed frame index from the fence without blocking.
    pub fn poll_completed(&mut self) -> u64 {
        let observed = self.fence.completed_value().min(self.frame_index);
        self.completed = self.completed.max(observed);
        self.completed
    }

    /// Returns the next slot, reset and safe to record into.
    ///
    /// Blocks on the fence only if `ring_depth` frames are outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::FatalStall`] if the wait times out, or the
    /// backend error if the wait or the slot reset fails.
    pub fn begin_frame(&mut self) -> FrameResult<&mut CommandRecordingSlot<C>> {
        debug_assert!(
            !self.recording,
            "begin_frame called twice without end_frame or cancel_frame"
        );

        let depth = self.slots.len() as u64;
        self.poll_completed();

        if self.frame_index - self.completed >= depth {
            let target = self.frame_index - depth + 1;
            trace!(
                "Frame {} waiting for fence value {} (completed {})",
                self.frame_index, target, self.completed
            );
            self.wait_for(target)?;
            self.poll_completed();
        }

        let slot_index = (self.frame_index % depth) as usize;
        let frame_index = self.frame_index;
        let slot = &mut self.slots[slot_index];
        slot.commands.reset()?;
        slot.last_frame = Some(frame_index);
        self.recording = true;

        trace!("Frame {} recording into slot {}", frame_index, slot_index);
        Ok(slot)
    }

    /// Closes the current frame.
    ///
    /// Call after the frame's commands were submitted and the queue was asked
    /// to signal [`signal_value`](Self::signal_value).
    pub fn end_frame(&mut self) {
        debug_assert!(self.recording, "end_frame called without begin_frame");
        self.recording = false;
        self.frame_index += 1;
    }

    /// Abandons the current frame after a failure before its signal was queued.
    ///
    /// The frame index is not advanced; the slot is reset again by the next
    /// [`begin_frame`](Self::begin_frame).
    pub fn cancel_frame(&mut self) {
        if self.recording {
            debug!("Frame {} cancelled", self.frame_index);
            self.recording = false;
        }
    }

    /// Blocks until every submitted frame has retired.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::FatalStall`] if the wait times out.
    pub fn wait_idle(&mut self) -> FrameResult<()> {
        if self.poll_completed() < self.frame_index {
            trace!("Waiting for all {} frames to retire", self.frame_index);
            self.wait_for(self.frame_index)?;
        }
        Ok(())
    }

    fn wait_for(&mut self, value: u64) -> FrameResult<()> {
        match self.fence.wait(value, self.timeout) {
            Ok(()) => {
                self.completed = self.completed.max(value);
                Ok(())
            }
            Err(RhiError::WaitTimeout { completed, .. }) => {
                error!(
                    "Frame {}: fence value {} not reached within {:?} (completed {})",
                    self.frame_index, value, self.timeout, completed
                );
                Err(FrameError::FatalStall {
                    frame: self.frame_index,
                    waited_for: value,
                    completed,
                    timeout: self.timeout,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
