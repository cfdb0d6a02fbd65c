//! Bridge orchestration and thread management.
//!
//! This module contains the top-level `PublishBridge`, the deferred task
//! queue feeding its publish thread, the scheduler running that thread, and
//! the estimator event types.

mod bridge;
pub mod messages;
pub mod scheduler;
pub mod task_queue;

pub use bridge::{EstimationObserver, PublishBridge};
pub use messages::{AnchorCorrection, Frame, Points, PoseSample, Submap, SubmapId};
pub use scheduler::{PublishScheduler, SchedulerState};
pub use task_queue::DeferredTaskQueue;
