//! Merged map accumulation and deferred publishing.
//!
//! Every submap batch:
//! - re-anchors the alignment with the latest submap's endpoint (synchronous)
//! - enqueues one task that retains the new submaps and, if the map output has
//!   consumers, rebuilds and publishes the merged world-frame point set
//!
//! The merged map is rebuilt from scratch each time. Cost grows with the total
//! retained point count, which is flagged once it passes the configured
//! threshold; past that point an incremental structure would be needed.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Vector4;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::alignment::{AnchorMatch, SharedAlignment};
use crate::clock::Clock;
use crate::geometry::SE3;
use crate::system::messages::{Submap, SubmapId};
use crate::system::task_queue::DeferredTaskQueue;

use super::outputs::{Output, PointCloudRecord};

/// A retained submap and the world pose last captured for it.
#[derive(Debug, Clone)]
struct RetainedSubmap {
    submap: Arc<Submap>,
    world_pose: SE3,
}

/// Ordered, append-only collection of posed submaps.
#[derive(Debug)]
pub struct MapAccumulator {
    retained: Vec<RetainedSubmap>,
    index: HashMap<SubmapId, usize>,
    total_points: usize,
    warn_threshold: usize,
    warned: bool,
}

impl MapAccumulator {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            retained: Vec::new(),
            index: HashMap::new(),
            total_points: 0,
            warn_threshold,
            warned: false,
        }
    }

    /// Retain the submaps of a batch together with their captured poses.
    ///
    /// `poses[i]` is the world pose of `batch[i]`. Submaps already retained
    /// keep their position and take the new pose; unseen ones are appended in
    /// batch order. Returns the number of submaps appended.
    pub fn accumulate(&mut self, batch: &[Arc<Submap>], poses: &[SE3]) -> usize {
        debug_assert_eq!(batch.len(), poses.len());

        let mut appended = 0;
        for (submap, pose) in batch.iter().zip(poses) {
            match self.index.get(&submap.id) {
                Some(&i) => self.retained[i].world_pose = *pose,
                None => {
                    self.index.insert(submap.id, self.retained.len());
                    self.total_points += submap.num_points();
                    self.retained.push(RetainedSubmap {
                        submap: Arc::clone(submap),
                        world_pose: *pose,
                    });
                    appended += 1;
                }
            }
        }

        if !self.warned && self.total_points > self.warn_threshold {
            self.warned = true;
            warn!(
                "Merged map holds {} points across {} submaps (limit {}); full rebuilds will slow publishing",
                self.total_points,
                self.retained.len(),
                self.warn_threshold
            );
        }

        appended
    }

    /// Merge every retained submap into one world-frame point buffer.
    ///
    /// Submaps appear in retention order, each transformed by its own pose.
    pub fn rebuild(&self) -> Vec<Vector4<f64>> {
        let mut merged = Vec::with_capacity(self.total_points);
        for entry in &self.retained {
            let pose = &entry.world_pose;
            merged.extend(entry.submap.points.iter().map(|p| pose.transform_homogeneous(p)));
        }
        merged
    }

    /// Number of retained submaps.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Total points across retained submaps.
    pub fn total_points(&self) -> usize {
        self.total_points
    }

    /// Retained submap ids in order.
    pub fn submap_ids(&self) -> Vec<SubmapId> {
        self.retained.iter().map(|r| r.submap.id).collect()
    }
}

/// Handles submap batches from the mapping backend.
pub struct MapPublisher {
    world_frame: String,
    alignment: SharedAlignment,
    tasks: Arc<DeferredTaskQueue>,
    accumulator: Arc<Mutex<MapAccumulator>>,
    output: Arc<dyn Output<PointCloudRecord>>,
    clock: Arc<dyn Clock>,
}

impl MapPublisher {
    pub fn new(
        world_frame: String,
        alignment: SharedAlignment,
        tasks: Arc<DeferredTaskQueue>,
        accumulator: Arc<Mutex<MapAccumulator>>,
        output: Arc<dyn Output<PointCloudRecord>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            world_frame,
            alignment,
            tasks,
            accumulator,
            output,
            clock,
        }
    }

    /// Re-anchor on the latest submap and schedule the map rebuild.
    ///
    /// Empty batches are ignored.
    pub fn on_submap_batch(&self, submaps: &[Arc<Submap>]) {
        let Some(latest) = submaps.last() else {
            warn!("Ignoring empty submap batch");
            return;
        };

        let anchor = latest.anchor_correction();
        let matched = {
            let mut alignment = self.alignment.lock();
            alignment.update_anchor(anchor.timestamp, anchor.world_pose)
        };
        match matched {
            AnchorMatch::AtOrBefore { sample_timestamp } => debug!(
                "Anchored on {} at t={:.3} (odometry sample t={:.3})",
                latest.id, anchor.timestamp, sample_timestamp
            ),
            AnchorMatch::OlderThanHistory { oldest_timestamp } => warn!(
                "Anchor t={:.3} of {} predates odometry history (oldest t={:.3})",
                anchor.timestamp, latest.id, oldest_timestamp
            ),
            AnchorMatch::NoOdometry => warn!(
                "Anchor t={:.3} of {} received before any odometry",
                anchor.timestamp, latest.id
            ),
        }

        let poses: Vec<SE3> = submaps.iter().map(|s| s.t_world_origin).collect();
        let batch: Vec<Arc<Submap>> = submaps.to_vec();

        let accumulator = Arc::clone(&self.accumulator);
        let output = Arc::clone(&self.output);
        let clock = Arc::clone(&self.clock);
        let world_frame = self.world_frame.clone();

        self.tasks.enqueue(move || {
            let mut accumulator = accumulator.lock();
            accumulator.accumulate(&batch, &poses);

            if !output.has_consumers() {
                return;
            }

            let merged = accumulator.rebuild();
            debug!(
                "Rebuilt merged map: {} points from {} submaps",
                merged.len(),
                accumulator.len()
            );
            drop(accumulator);

            output.publish(PointCloudRecord {
                stamp: clock.now_secs(),
                frame_id: world_frame,
                points: merged.into(),
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use crate::alignment::AlignmentTracker;
    use crate::clock::FixedClock;
    use crate::publish::outputs::NullOutput;
    use crate::publish::topic::Topic;

    fn submap(id: u64, n: usize, origin: SE3, last_stamp: f64) -> Arc<Submap> {
        let points: Vec<Vector4<f64>> = (0..n)
            .map(|i| Vector4::new(i as f64, 1.0, 2.0, 1.0))
            .collect();
        Arc::new(Submap {
            id: SubmapId(id),
            t_world_origin: origin,
            t_origin_endpoint: SE3::identity(),
            last_stamp,
            points: points.into(),
        })
    }

    fn poses(batch: &[Arc<Submap>]) -> Vec<SE3> {
        batch.iter().map(|s| s.t_world_origin).collect()
    }

    #[test]
    fn test_two_submap_merge() {
        let s1 = submap(0, 100, SE3::identity(), 1.0);
        let s2 = submap(1, 50, SE3::from_translation(Vector3::new(10.0, 0.0, 0.0)), 2.0);

        let mut acc = MapAccumulator::new(usize::MAX);
        acc.accumulate(&[s1.clone()], &poses(&[s1.clone()]));
        acc.accumulate(&[s2.clone()], &poses(&[s2.clone()]));

        let merged = acc.rebuild();
        assert_eq!(merged.len(), 150);
        for (i, p) in merged[..100].iter().enumerate() {
            assert_relative_eq!(*p, s1.points[i], epsilon = 1e-12);
        }
        for (i, p) in merged[100..].iter().enumerate() {
            assert_relative_eq!(p.x, s2.points[i].x + 10.0, epsilon = 1e-12);
            assert_relative_eq!(p.y, s2.points[i].y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_point_count_is_sum_and_rebuild_is_stable() {
        let batch: Vec<_> = (0..5)
            .map(|i| submap(i, 10 + i as usize * 7, SE3::identity(), i as f64))
            .collect();

        let mut acc = MapAccumulator::new(usize::MAX);
        acc.accumulate(&batch, &poses(&batch));

        let expected: usize = batch.iter().map(|s| s.num_points()).sum();
        assert_eq!(acc.total_points(), expected);

        let first = acc.rebuild();
        let second = acc.rebuild();
        assert_eq!(first.len(), expected);
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_list_batches_refresh_poses_without_duplicates() {
        let s1 = submap(0, 3, SE3::identity(), 1.0);
        let s2 = submap(1, 2, SE3::identity(), 2.0);

        let mut acc = MapAccumulator::new(usize::MAX);
        assert_eq!(acc.accumulate(&[s1.clone()], &poses(&[s1.clone()])), 1);

        // Backend re-sends the full list with an optimized pose for s1
        let shifted = SE3::from_translation(Vector3::new(0.0, 0.0, 5.0));
        let appended = acc.accumulate(&[s1.clone(), s2.clone()], &[shifted, SE3::identity()]);

        assert_eq!(appended, 1);
        assert_eq!(acc.submap_ids(), vec![SubmapId(0), SubmapId(1)]);
        assert_eq!(acc.total_points(), 5);

        let merged = acc.rebuild();
        assert_relative_eq!(merged[0].z, 7.0, epsilon = 1e-12);
        assert_relative_eq!(merged[3].z, 2.0, epsilon = 1e-12);
    }

    fn publisher(
        output: Arc<dyn Output<PointCloudRecord>>,
    ) -> (MapPublisher, SharedAlignment, Arc<DeferredTaskQueue>, Arc<Mutex<MapAccumulator>>) {
        let alignment = AlignmentTracker::shared(8);
        let tasks = Arc::new(DeferredTaskQueue::new());
        let accumulator = Arc::new(Mutex::new(MapAccumulator::new(usize::MAX)));
        let publisher = MapPublisher::new(
            "world".to_string(),
            Arc::clone(&alignment),
            Arc::clone(&tasks),
            Arc::clone(&accumulator),
            output,
            Arc::new(FixedClock(42.0)),
        );
        (publisher, alignment, tasks, accumulator)
    }

    #[test]
    fn test_batch_anchors_immediately_and_defers_map() {
        let (publisher, alignment, tasks, accumulator) = publisher(Arc::new(NullOutput));

        let odom = SE3::from_translation(Vector3::new(1.0, 0.0, 0.0));
        alignment.lock().add_odometry_sample(5.0, odom);

        let origin = SE3::from_translation(Vector3::new(20.0, 0.0, 0.0));
        let mut latest = (*submap(1, 4, origin, 5.0)).clone();
        latest.t_origin_endpoint = SE3::from_translation(Vector3::new(0.0, 3.0, 0.0));
        let batch = vec![submap(0, 4, SE3::identity(), 2.0), Arc::new(latest)];

        publisher.on_submap_batch(&batch);

        // Anchor applied synchronously from the last submap's endpoint
        let world = alignment.lock().compose_world(&odom);
        assert_relative_eq!(world.translation, Vector3::new(20.0, 3.0, 0.0), epsilon = 1e-12);

        // Map work deferred
        assert_eq!(tasks.len(), 1);
        assert!(accumulator.lock().is_empty());

        tasks.drain_and_run();
        assert_eq!(accumulator.lock().len(), 2);
    }

    #[test]
    fn test_map_published_only_with_consumers() {
        let topic = Topic::<PointCloudRecord>::new("map", 1);
        let (publisher, _alignment, tasks, accumulator) = publisher(topic.clone());

        publisher.on_submap_batch(&[submap(0, 10, SE3::identity(), 1.0)]);
        tasks.drain_and_run();
        assert_eq!(accumulator.lock().len(), 1);

        let sub = topic.subscribe();
        publisher.on_submap_batch(&[submap(1, 5, SE3::identity(), 2.0)]);
        tasks.drain_and_run();

        let record = sub.try_recv().unwrap();
        assert_eq!(record.frame_id, "world");
        assert_eq!(record.stamp, 42.0);
        assert_eq!(record.points.len(), 15);
    }

    #[test]
    fn test_empty_batch_ignored() {
        let (publisher, alignment, tasks, _accumulator) = publisher(Arc::new(NullOutput));
        publisher.on_submap_batch(&[]);

        assert!(tasks.is_empty());
        assert!(alignment.lock().anchor().is_none());
    }
}
