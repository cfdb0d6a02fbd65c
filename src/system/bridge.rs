//! Publish Bridge - entry point between the estimator and consumers.
//!
//! The `PublishBridge` owns the alignment tracker, the deferred task queue and
//! the publish scheduler thread. The estimator drives it through the
//! [`EstimationObserver`] callbacks:
//!
//! - new frames are published synchronously on the calling thread
//! - submap batches re-anchor synchronously and defer the map rebuild to the
//!   scheduler thread

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::alignment::{AlignmentTracker, SharedAlignment};
use crate::clock::{Clock, SystemClock};
use crate::config::BridgeConfig;
use crate::publish::{FramePoses, FramePublishRouter, MapAccumulator, MapPublisher, Outputs};

use super::messages::{Frame, Submap};
use super::scheduler::{PublishScheduler, SchedulerState};
use super::task_queue::DeferredTaskQueue;

/// Callbacks invoked by the estimation pipeline.
///
/// The estimator receives an implementation at construction; there is no
/// global registry.
pub trait EstimationObserver: Send + Sync {
    /// A new odometry frame was estimated.
    fn on_new_pose_frame(&self, frame: &Frame);

    /// The mapping backend finalized or re-optimized submaps, oldest first.
    fn on_submap_batch_update(&self, submaps: &[Arc<Submap>]);
}

/// Real-time publishing bridge.
pub struct PublishBridge {
    alignment: SharedAlignment,
    tasks: Arc<DeferredTaskQueue>,
    accumulator: Arc<Mutex<MapAccumulator>>,
    router: FramePublishRouter,
    map_publisher: MapPublisher,
    scheduler: PublishScheduler,
}

impl PublishBridge {
    /// Create the bridge and start its publish thread.
    pub fn new(config: BridgeConfig, outputs: Outputs) -> Result<Self> {
        Self::with_clock(config, outputs, Arc::new(SystemClock))
    }

    /// Create the bridge with an explicit emission-time source.
    pub fn with_clock(
        config: BridgeConfig,
        outputs: Outputs,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let alignment = AlignmentTracker::shared(config.odometry_history);
        let tasks = Arc::new(DeferredTaskQueue::new());
        let accumulator = Arc::new(Mutex::new(MapAccumulator::new(
            config.map_points_warn_threshold,
        )));

        let map_publisher = MapPublisher::new(
            config.frames.world.clone(),
            Arc::clone(&alignment),
            Arc::clone(&tasks),
            Arc::clone(&accumulator),
            Arc::clone(&outputs.map),
            clock,
        );
        let router = FramePublishRouter::new(config.frames, Arc::clone(&alignment), outputs);

        let scheduler = {
            let tasks = Arc::clone(&tasks);
            PublishScheduler::start("slam-bridge-publish", config.publish_period, move || {
                tasks.drain_and_run();
            })?
        };

        Ok(Self {
            alignment,
            tasks,
            accumulator,
            router,
            map_publisher,
            scheduler,
        })
    }

    /// Publish transforms, poses and live points for a new frame.
    pub fn publish_frame(&self, frame: &Frame) -> FramePoses {
        self.router.on_new_frame(frame)
    }

    /// Re-anchor on the latest submap and schedule a merged map rebuild.
    pub fn publish_submaps(&self, submaps: &[Arc<Submap>]) {
        self.map_publisher.on_submap_batch(submaps);
    }

    /// Shared alignment tracker.
    pub fn alignment(&self) -> &SharedAlignment {
        &self.alignment
    }

    /// Deferred tasks not yet run by the scheduler.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Number of submaps retained for the merged map.
    pub fn retained_submaps(&self) -> usize {
        self.accumulator.lock().len()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Completed publish cycles.
    pub fn publish_cycles(&self) -> u64 {
        self.scheduler.cycles()
    }

    /// Stop the publish thread. Tasks still queued are never run.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
    }
}

impl EstimationObserver for PublishBridge {
    fn on_new_pose_frame(&self, frame: &Frame) {
        self.publish_frame(frame);
    }

    fn on_submap_batch_update(&self, submaps: &[Arc<Submap>]) {
        self.publish_submaps(submaps);
    }
}

impl Drop for PublishBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
