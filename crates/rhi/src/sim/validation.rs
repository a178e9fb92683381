//! GPU-side validation for the simulated backend.
//!
//! The queue worker replays every submitted command list against the layout
//! each back-buffer actually has on the GPU timeline, the way a native debug
//! layer would. Findings are collected in a [`ValidationLog`] shared with the
//! device so tests can assert that a run was clean.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::command::SimCommand;
use crate::command::BarrierLayout;

/// Shared list of validation findings.
#[derive(Debug, Clone, Default)]
pub struct ValidationLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ValidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding.
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Validation: {}", message);
        self.messages.lock().push(message);
    }

    /// Returns a copy of all findings so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Returns true if nothing has been reported.
    pub fn is_clean(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// Per-image layout state as seen by the GPU.
#[derive(Debug, Default)]
pub(crate) struct GpuTimeline {
    layouts: HashMap<u32, BarrierLayout>,
    rendering: Option<u32>,
    executed: u64,
    presented: u64,
}

impl GpuTimeline {
    fn layout(&self, image: u32) -> BarrierLayout {
        self.layouts
            .get(&image)
            .copied()
            .unwrap_or(BarrierLayout::Undefined)
    }

    /// Replays one command list.
    pub(crate) fn execute(&mut self, name: &str, commands: &[SimCommand], log: &ValidationLog) {
        self.executed += 1;
        for command in commands {
            match *command {
                SimCommand::Barrier { image, barrier } => {
                    let current = self.layout(image);
                    if barrier.layout_before != BarrierLayout::Undefined
                        && barrier.layout_before != current
                    {
                        log.report(format!(
                            "{name}: barrier on image {image} expects {:?} but image is {current:?}",
                            barrier.layout_before
                        ));
                    }
                    if self.rendering == Some(image) {
                        log.report(format!(
                            "{name}: barrier on image {image} while it is bound as render target"
                        ));
                    }
                    self.layouts.insert(image, barrier.layout_after);
                }
                SimCommand::BeginRendering { image, .. } => {
                    let current = self.layout(image);
                    if current != BarrierLayout::RenderTarget {
                        log.report(format!(
                            "{name}: rendering into image {image} in layout {current:?}"
                        ));
                    }
                    if let Some(bound) = self.rendering {
                        log.report(format!(
                            "{name}: image {image} bound while image {bound} is still bound"
                        ));
                    }
                    self.rendering = Some(image);
                }
                SimCommand::Draw { .. } => {
                    if self.rendering.is_none() {
                        log.report(format!("{name}: draw without a bound render target"));
                    }
                }
                SimCommand::EndRendering => {
                    if self.rendering.take().is_none() {
                        log.report(format!("{name}: end_rendering without begin_rendering"));
                    }
                }
            }
        }
        if let Some(image) = self.rendering.take() {
            log.report(format!(
                "{name}: command list ended with image {image} still bound"
            ));
        }
    }

    /// Checks a present against the image's GPU layout.
    pub(crate) fn present(&mut self, image: u32, log: &ValidationLog) {
        self.presented += 1;
        let current = self.layout(image);
        if current != BarrierLayout::Present {
            log.report(format!("image {image} presented in layout {current:?}"));
        }
    }

    pub(crate) fn executed(&self) -> u64 {
        self.executed
    }

    pub(crate) fn presented(&self) -> u64 {
        self.presented
    }
}
