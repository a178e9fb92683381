//! Software GPU queue backed by a worker thread.
//!
//! The worker is the GPU timeline: it takes jobs in submission order,
//! spends the configured frame time on each command list, replays it through
//! validation, and only then applies the fence signals queued behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use super::command::{SimCommand, SimCommandBuffer};
use super::device::SimDevice;
use super::fence::SimFence;
use super::validation::GpuTimeline;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::queue::CommandQueue;

enum Job {
    Execute {
        name: String,
        commands: Arc<[SimCommand]>,
        in_flight: Arc<AtomicUsize>,
    },
    Signal {
        fence: SimFence,
        value: u64,
    },
    Present {
        image: u32,
    },
    Shutdown,
}

/// Pauses the worker to simulate a GPU that stops making progress.
#[derive(Default)]
struct Gate {
    paused: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.changed.notify_all();
    }

    fn wait_open(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.changed.wait(&mut paused);
        }
    }
}

/// Simulated in-order GPU queue.
pub struct SimQueue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    device: SimDevice,
    gate: Arc<Gate>,
    timeline: Arc<Mutex<GpuTimeline>>,
}

impl SimQueue {
    pub(crate) fn new(device: SimDevice, gpu_frame_time: Duration) -> RhiResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let gate = Arc::new(Gate::default());
        let timeline = Arc::new(Mutex::new(GpuTimeline::default()));

        let worker = {
            let device = device.clone();
            let gate = gate.clone();
            let timeline = timeline.clone();
            thread::Builder::new()
                .name("sim-gpu".into())
                .spawn(move || run_worker(receiver, device, gate, timeline, gpu_frame_time))
                .map_err(|e| {
                    RhiError::InitializationFailed(format!("failed to spawn sim GPU worker: {e}"))
                })?
        };

        debug!("Sim queue created (frame time {:?})", gpu_frame_time);

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            device,
            gate,
            timeline,
        })
    }

    /// Stops the GPU from retiring work until [`resume`](Self::resume).
    pub fn pause(&self) {
        debug!("Sim queue paused");
        self.gate.set_paused(true);
    }

    pub fn resume(&self) {
        debug!("Sim queue resumed");
        self.gate.set_paused(false);
    }

    /// Command lists the GPU has finished executing.
    pub fn executed(&self) -> u64 {
        self.timeline.lock().executed()
    }

    /// Presents the GPU has processed.
    pub fn presented(&self) -> u64 {
        self.timeline.lock().presented()
    }

    pub(crate) fn enqueue_present(&mut self, image: u32) -> RhiResult<()> {
        self.device.check_live()?;
        self.send(Job::Present { image })
    }

    fn send(&self, job: Job) -> RhiResult<()> {
        self.sender
            .as_ref()
            .and_then(|sender| sender.send(job).ok())
            .ok_or_else(|| RhiError::InvalidUsage("sim GPU worker has exited".into()))
    }
}

impl CommandQueue for SimQueue {
    type CommandBuffer = SimCommandBuffer;
    type Fence = SimFence;

    fn submit(&mut self, commands: &SimCommandBuffer) -> RhiResult<()> {
        self.device.check_live()?;
        if !commands.is_executable() {
            return Err(RhiError::InvalidUsage(format!(
                "'{}' submitted before close",
                commands.name()
            )));
        }

        let (list, in_flight) = commands.snapshot();
        trace!("Submitting '{}' ({} commands)", commands.name(), list.len());
        self.send(Job::Execute {
            name: commands.name().to_owned(),
            commands: list,
            in_flight,
        })
    }

    fn signal(&mut self, fence: &SimFence, value: u64) -> RhiResult<()> {
        self.device.check_live()?;
        self.send(Job::Signal {
            fence: fence.clone(),
            value,
        })
    }
}

impl Drop for SimQueue {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Job::Shutdown);
        }
        self.gate.set_paused(false);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Sim GPU worker panicked");
        }
        debug!("Sim queue destroyed");
    }
}

fn run_worker(
    receiver: Receiver<Job>,
    device: SimDevice,
    gate: Arc<Gate>,
    timeline: Arc<Mutex<GpuTimeline>>,
    frame_time: Duration,
) {
    debug!("Sim GPU worker started");

    while let Ok(job) = receiver.recv() {
        if matches!(job, Job::Shutdown) {
            break;
        }

        gate.wait_open();

        // A removed device retires nothing, so pending fence values are never reached.
        if !device.is_live() {
            trace!("Dropping job on lost device");
            continue;
        }

        match job {
            Job::Execute {
                name,
                commands,
                in_flight,
            } => {
                if !frame_time.is_zero() {
                    thread::sleep(frame_time);
                }
                timeline
                    .lock()
                    .execute(&name, &commands, device.validation());
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Job::Signal { fence, value } => fence.signal(value),
            Job::Present { image } => timeline.lock().present(image, device.validation()),
            Job::Shutdown => unreachable!("handled before the gate"),
        }
    }

    debug!("Sim GPU worker stopped");
}
