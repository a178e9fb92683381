//! Render Hardware Interface for the framepace pipeline.
//!
//! This crate describes the native graphics objects the frame pipeline
//! consumes, without redesigning them:
//! - Device liveness and object creation ([`device`])
//! - Command recording and barriers ([`command`])
//! - The in-order GPU queue ([`queue`])
//! - Completion fences ([`sync`])
//! - The presentation engine ([`swapchain`])
//!
//! Two implementations are provided:
//! - [`vulkan`] adapts externally created `ash` objects
//! - [`sim`] is a software GPU with a worker-thread timeline and GPU-side
//!   validation, used by tests and the headless demo

mod error;

pub mod command;
pub mod device;
pub mod queue;
pub mod sim;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use command::{BarrierAccess, BarrierLayout, BarrierSync, CommandRecorder, TextureBarrier};
pub use device::{Device, RemovalReason};
pub use error::{RhiError, RhiResult};
pub use queue::CommandQueue;
pub use swapchain::{PresentFlags, PresentStatus, Swapchain};
pub use sync::CompletionFence;

// Re-export ash types that users might need
pub use ash::vk;

/// Bundles the object types of one native API.
///
/// The renderer is generic over a single `Backend`, which keeps the
/// associated types consistent: the queue submits the device's command
/// buffers and signals the device's fences, and the swapchain presents
/// through that queue.
pub trait Backend: 'static {
    type Image;
    type CommandBuffer: CommandRecorder<Image = Self::Image>;
    type Fence: CompletionFence;
    type Queue: CommandQueue<CommandBuffer = Self::CommandBuffer, Fence = Self::Fence>;
    type Swapchain: Swapchain<Image = Self::Image, Queue = Self::Queue>;
    type Device: Device<CommandBuffer = Self::CommandBuffer, Fence = Self::Fence>;
}
