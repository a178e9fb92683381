//! Software command buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::command::{CommandRecorder, TextureBarrier};
use crate::error::{RhiError, RhiResult};

/// Back-buffer handle of the simulated swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimImage {
    pub index: u32,
}

/// A recorded command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Barrier {
        image: u32,
        barrier: TextureBarrier,
    },
    BeginRendering {
        image: u32,
        clear: Option<[f32; 4]>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    EndRendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingState {
    Initial,
    Recording,
    Executable,
}

/// Command allocator + list pair for one ring slot.
///
/// Tracks how many of its submissions the GPU has not retired yet and
/// refuses to reset while that count is non-zero.
pub struct SimCommandBuffer {
    name: String,
    state: RecordingState,
    commands: Vec<SimCommand>,
    in_flight: Arc<AtomicUsize>,
    reset_count: u64,
}

impl SimCommandBuffer {
    pub(crate) fn new(name: &str) -> Self {
        debug!("Created sim command buffer '{}'", name);
        Self {
            name: name.to_owned(),
            state: RecordingState::Initial,
            commands: Vec::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            reset_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commands recorded since the last reset.
    pub fn commands(&self) -> &[SimCommand] {
        &self.commands
    }

    /// Number of submissions the GPU has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of successful resets.
    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }

    /// Returns true once [`close`](CommandRecorder::close) succeeded.
    pub fn is_executable(&self) -> bool {
        self.state == RecordingState::Executable
    }

    /// Snapshot handed to the queue worker, marking one more submission in flight.
    pub(crate) fn snapshot(&self) -> (Arc<[SimCommand]>, Arc<AtomicUsize>) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        (Arc::from(self.commands.as_slice()), self.in_flight.clone())
    }

    fn record(&mut self, command: SimCommand) {
        debug_assert_eq!(
            self.state,
            RecordingState::Recording,
            "'{}' recorded {:?} outside begin/close",
            self.name,
            command
        );
        self.commands.push(command);
    }
}

impl CommandRecorder for SimCommandBuffer {
    type Image = SimImage;

    fn reset(&mut self) -> RhiResult<()> {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            return Err(RhiError::InvalidUsage(format!(
                "'{}' reset while {} submission(s) are still executing",
                self.name, in_flight
            )));
        }
        self.commands.clear();
        self.state = RecordingState::Initial;
        self.reset_count += 1;
        Ok(())
    }

    fn begin(&mut self) -> RhiResult<()> {
        if self.state != RecordingState::Initial {
            return Err(RhiError::InvalidUsage(format!(
                "'{}' begun in state {:?}; reset it first",
                self.name, self.state
            )));
        }
        self.state = RecordingState::Recording;
        Ok(())
    }

    fn barrier(&mut self, image: &SimImage, barrier: &TextureBarrier) {
        self.record(SimCommand::Barrier {
            image: image.index,
            barrier: *barrier,
        });
    }

    fn begin_rendering(&mut self, target: &SimImage, clear: Option<[f32; 4]>) {
        self.record(SimCommand::BeginRendering {
            image: target.index,
            clear,
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.record(SimCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn end_rendering(&mut self) {
        self.record(SimCommand::EndRendering);
    }

    fn close(&mut self) -> RhiResult<()> {
        if self.state != RecordingState::Recording {
            return Err(RhiError::InvalidUsage(format!(
                "'{}' closed in state {:?}",
                self.name, self.state
            )));
        }
        self.state = RecordingState::Executable;
        Ok(())
    }
}

impl std::fmt::Debug for SimCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimCommandBuffer")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("commands", &self.commands.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut cmd = SimCommandBuffer::new("test");
        let image = SimImage { index: 0 };

        cmd.reset().expect("reset");
        cmd.begin().expect("begin");
        cmd.barrier(&image, &TextureBarrier::present_to_render_target());
        cmd.begin_rendering(&image, None);
        cmd.draw(3, 1);
        cmd.end_rendering();
        cmd.close().expect("close");

        assert!(cmd.is_executable());
        assert_eq!(cmd.commands().len(), 4);
        assert_eq!(cmd.reset_count(), 1);
    }

    #[test]
    fn test_reset_refused_while_in_flight() {
        let mut cmd = SimCommandBuffer::new("test");
        cmd.begin().expect("begin");
        cmd.close().expect("close");

        let (_, in_flight) = cmd.snapshot();
        assert!(matches!(cmd.reset(), Err(RhiError::InvalidUsage(_))));

        in_flight.fetch_sub(1, Ordering::AcqRel);
        cmd.reset().expect("reset after retirement");
        assert!(cmd.commands().is_empty());
    }

    #[test]
    fn test_begin_twice_is_invalid() {
        let mut cmd = SimCommandBuffer::new("test");
        cmd.begin().expect("begin");
        assert!(matches!(cmd.begin(), Err(RhiError::InvalidUsage(_))));
    }

    #[test]
    fn test_close_without_begin_is_invalid() {
        let mut cmd = SimCommandBuffer::new("test");
        assert!(matches!(cmd.close(), Err(RhiError::InvalidUsage(_))));
    }

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SimCommandBuffer>();
    }
}
