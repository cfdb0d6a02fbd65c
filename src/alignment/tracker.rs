//! Odometry-to-world alignment.
//!
//! The estimator produces a smooth but drifting odometry pose at frame rate.
//! The mapping backend occasionally reports where the body *really* was in
//! the world at some past odometry timestamp (an anchor). The tracker keeps
//!
//! ```text
//! T_world_odom = T_world_body(anchor) ∘ T_odom_body(anchor)^-1
//! ```
//!
//! so that any odometry pose can be moved to the world frame with a single
//! composition: `T_world_body = T_world_odom ∘ T_odom_body`.
//!
//! The tracker itself is not synchronized. It is shared between the frame
//! path and the submap path as a [`SharedAlignment`], and every operation
//! is pure arithmetic so the lock is held only briefly.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::geometry::SE3;
use crate::system::messages::{AnchorCorrection, PoseSample};

/// Tracker shared between the producer and publisher threads.
pub type SharedAlignment = Arc<Mutex<AlignmentTracker>>;

/// The anchor currently used for world composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Correction as reported by the mapping backend.
    pub correction: AnchorCorrection,
    /// Odometry pose paired with the correction.
    pub odom_pose: SE3,
}

/// Which odometry sample was paired with an anchor correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorMatch {
    /// Latest retained sample at or before the anchor timestamp.
    AtOrBefore { sample_timestamp: f64 },
    /// Anchor is older than every retained sample; the oldest one was used.
    OlderThanHistory { oldest_timestamp: f64 },
    /// No odometry seen yet; the identity odometry pose was used.
    NoOdometry,
}

/// Running odometry-to-world alignment.
#[derive(Debug, Clone)]
pub struct AlignmentTracker {
    /// Recent odometry samples, oldest first. Never grows past `capacity`.
    history: VecDeque<PoseSample>,
    capacity: usize,

    anchor: Option<Anchor>,
    t_world_odom: SE3,

    /// T_world_odom ∘ latest odometry pose.
    world_estimate: Option<SE3>,
}

impl AlignmentTracker {
    /// Create a tracker that retains up to `history` odometry samples.
    ///
    /// The initial alignment is the identity: world and odometry coincide
    /// until the first anchor arrives.
    pub fn new(history: usize) -> Self {
        let capacity = history.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            anchor: None,
            t_world_odom: SE3::identity(),
            world_estimate: None,
        }
    }

    /// Create a tracker wrapped for sharing between threads.
    pub fn shared(history: usize) -> SharedAlignment {
        Arc::new(Mutex::new(Self::new(history)))
    }

    /// Record the latest odometry pose and refresh the world estimate.
    pub fn add_odometry_sample(&mut self, timestamp: f64, odom_pose: SE3) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(PoseSample {
            timestamp,
            pose: odom_pose,
        });
        self.world_estimate = Some(self.t_world_odom.compose(&odom_pose));
    }

    /// Rigid offset between the odometry and world frames (T_world_odom).
    pub fn current_world_to_odom(&self) -> SE3 {
        self.t_world_odom
    }

    /// Move an odometry-frame pose into the world frame.
    pub fn compose_world(&self, odom_pose: &SE3) -> SE3 {
        self.t_world_odom.compose(odom_pose)
    }

    /// Replace the anchor with a new world correction.
    ///
    /// The correction is paired with the latest retained odometry sample at or
    /// before `timestamp`; no interpolation is performed. Anchors older than
    /// the current one are accepted as well. Poses composed before this call
    /// are unaffected; only later compositions see the new alignment.
    pub fn update_anchor(&mut self, timestamp: f64, world_pose: SE3) -> AnchorMatch {
        let at_or_before = self.history.iter().rev().find(|s| s.timestamp <= timestamp);
        let (odom_pose, matched) = match at_or_before {
            Some(sample) => (
                sample.pose,
                AnchorMatch::AtOrBefore {
                    sample_timestamp: sample.timestamp,
                },
            ),
            None => match self.history.front() {
                Some(oldest) => (
                    oldest.pose,
                    AnchorMatch::OlderThanHistory {
                        oldest_timestamp: oldest.timestamp,
                    },
                ),
                None => (SE3::identity(), AnchorMatch::NoOdometry),
            },
        };

        self.t_world_odom = world_pose.compose(&odom_pose.inverse());
        self.anchor = Some(Anchor {
            correction: AnchorCorrection {
                timestamp,
                world_pose,
            },
            odom_pose,
        });
        self.world_estimate = self
            .history
            .back()
            .map(|latest| self.t_world_odom.compose(&latest.pose));

        matched
    }

    /// Current best world-frame body pose, if any odometry was seen.
    pub fn current_world_pose(&self) -> Option<SE3> {
        self.world_estimate
    }

    /// Most recent odometry sample.
    pub fn latest_sample(&self) -> Option<PoseSample> {
        self.history.back().copied()
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Number of retained odometry samples.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for AlignmentTracker {
    fn default() -> Self {
        Self::new(crate::config::BridgeConfig::default().odometry_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn pose(yaw: f64, x: f64, y: f64) -> SE3 {
        SE3 {
            rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
            translation: Vector3::new(x, y, 0.0),
        }
    }

    fn assert_se3_eq(a: &SE3, b: &SE3) {
        assert_relative_eq!(a.translation, b.translation, epsilon = 1e-9);
        assert_relative_eq!(a.rotation_matrix(), b.rotation_matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_identity_before_any_anchor() {
        let mut tracker = AlignmentTracker::new(8);
        let p = pose(0.4, 1.0, 2.0);
        tracker.add_odometry_sample(0.1, p);

        assert_se3_eq(&tracker.current_world_to_odom(), &SE3::identity());
        assert_se3_eq(&tracker.compose_world(&p), &p);
        assert_se3_eq(&tracker.current_world_pose().unwrap(), &p);
    }

    #[test]
    fn test_anchor_at_exact_sample_reproduces_world_pose() {
        let mut tracker = AlignmentTracker::new(8);
        let odom_at_t = pose(0.3, 1.0, 0.5);
        tracker.add_odometry_sample(1.0, pose(0.0, 0.0, 0.0));
        tracker.add_odometry_sample(2.0, odom_at_t);

        let world = pose(-1.2, 10.0, -4.0);
        let matched = tracker.update_anchor(2.0, world);

        assert_eq!(matched, AnchorMatch::AtOrBefore { sample_timestamp: 2.0 });
        assert_se3_eq(&tracker.compose_world(&odom_at_t), &world);
    }

    #[test]
    fn test_odometry_delta_accumulates_after_anchor() {
        let mut tracker = AlignmentTracker::new(8);
        let anchor_odom = pose(0.5, 1.0, 1.0);
        tracker.add_odometry_sample(1.0, anchor_odom);
        let anchor_world = pose(1.0, 5.0, 5.0);
        tracker.update_anchor(1.0, anchor_world);

        // Subsequent motion relative to the anchor sample
        let deltas = [pose(0.1, 1.0, 0.0), pose(-0.2, 0.5, 0.3), pose(0.7, 0.0, 2.0)];
        let mut odom = anchor_odom;
        let mut expected_world = anchor_world;
        for (i, delta) in deltas.iter().enumerate() {
            odom = odom.compose(delta);
            expected_world = expected_world.compose(delta);
            tracker.add_odometry_sample(2.0 + i as f64, odom);

            assert_se3_eq(&tracker.compose_world(&odom), &expected_world);
            assert_se3_eq(&tracker.current_world_pose().unwrap(), &expected_world);
        }

        // T_world_odom does not change without a new anchor
        assert_se3_eq(
            &tracker.current_world_to_odom(),
            &anchor_world.compose(&anchor_odom.inverse()),
        );
    }

    #[test]
    fn test_anchor_uses_sample_at_or_before_timestamp() {
        let mut tracker = AlignmentTracker::new(8);
        let p1 = pose(0.0, 1.0, 0.0);
        let p2 = pose(0.0, 2.0, 0.0);
        tracker.add_odometry_sample(1.0, p1);
        tracker.add_odometry_sample(2.0, p2);

        // Between samples: paired with t = 1.0, no interpolation
        let world = pose(0.0, 100.0, 0.0);
        let matched = tracker.update_anchor(1.5, world);
        assert_eq!(matched, AnchorMatch::AtOrBefore { sample_timestamp: 1.0 });
        assert_se3_eq(&tracker.compose_world(&p1), &world);
    }

    #[test]
    fn test_older_anchor_still_overwrites() {
        let mut tracker = AlignmentTracker::new(8);
        let oldest = pose(0.0, 3.0, 0.0);
        tracker.add_odometry_sample(3.0, oldest);
        tracker.add_odometry_sample(5.0, pose(0.0, 5.0, 0.0));
        tracker.update_anchor(5.0, pose(0.0, 50.0, 0.0));

        // Earlier than the last sample but within history
        let world = pose(0.0, 40.0, 0.0);
        tracker.update_anchor(4.0, world);
        assert_eq!(tracker.anchor().unwrap().correction.timestamp, 4.0);
        assert_se3_eq(&tracker.compose_world(&oldest), &world);

        // Earlier than every retained sample
        let world = pose(0.0, 30.0, 0.0);
        let matched = tracker.update_anchor(1.0, world);
        assert_eq!(matched, AnchorMatch::OlderThanHistory { oldest_timestamp: 3.0 });
        assert_eq!(tracker.anchor().unwrap().correction.timestamp, 1.0);
        assert_se3_eq(&tracker.compose_world(&oldest), &world);
    }

    #[test]
    fn test_anchor_without_odometry() {
        let mut tracker = AlignmentTracker::new(4);
        let world = pose(0.2, 3.0, 4.0);

        assert_eq!(tracker.update_anchor(1.0, world), AnchorMatch::NoOdometry);
        assert_se3_eq(&tracker.current_world_to_odom(), &world);
        assert!(tracker.current_world_pose().is_none());
    }

    #[test]
    fn test_anchor_does_not_alter_previous_compositions() {
        let mut tracker = AlignmentTracker::new(4);
        let odom = pose(0.0, 1.0, 0.0);
        tracker.add_odometry_sample(1.0, odom);
        let published = tracker.compose_world(&odom);

        tracker.update_anchor(1.0, pose(0.0, 9.0, 0.0));

        assert_se3_eq(&published, &odom);
        assert_relative_eq!(tracker.compose_world(&odom).translation.x, 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = AlignmentTracker::new(3);
        for i in 0..10 {
            tracker.add_odometry_sample(i as f64, pose(0.0, i as f64, 0.0));
        }

        assert_eq!(tracker.history_len(), 3);
        assert_eq!(tracker.latest_sample().unwrap().timestamp, 9.0);
        assert_eq!(
            tracker.update_anchor(0.0, SE3::identity()),
            AnchorMatch::OlderThanHistory { oldest_timestamp: 7.0 }
        );
    }

    #[test]
    fn test_concurrent_samples_and_anchors_stay_consistent() {
        const SAMPLES: usize = 2000;
        const ANCHORS: usize = 200;

        let shared = AlignmentTracker::shared(64);

        // Odometry moves along X; every anchor shifts the world by its index in Y.
        let producer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..SAMPLES {
                    let odom = pose(0.0, i as f64, 0.0);
                    let mut tracker = shared.lock();
                    tracker.add_odometry_sample(i as f64, odom);

                    let t_world_odom = tracker.current_world_to_odom();
                    let world = tracker.current_world_pose().unwrap();
                    assert_se3_eq(&world, &t_world_odom.compose(&odom));
                }
            })
        };
        let anchorer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for k in 1..=ANCHORS {
                    let t = (k * SAMPLES / ANCHORS) as f64;
                    shared.lock().update_anchor(t, pose(0.0, t, k as f64));
                    std::thread::yield_now();
                }
            })
        };

        while !(producer.is_finished() && anchorer.is_finished()) {
            let tracker = shared.lock();
            if let (Some(latest), Some(world)) =
                (tracker.latest_sample(), tracker.current_world_pose())
            {
                let t_world_odom = tracker.current_world_to_odom();
                assert_se3_eq(&world, &t_world_odom.compose(&latest.pose));

                // Only identity or an applied anchor's Y shift may show up
                let offset = t_world_odom.translation.y;
                assert_relative_eq!(offset, offset.round(), epsilon = 1e-9);
                assert!((0.0..=ANCHORS as f64).contains(&offset), "offset = {offset}");
            }
        }
        producer.join().unwrap();
        anchorer.join().unwrap();

        let tracker = shared.lock();
        let anchor = tracker.anchor().unwrap();
        assert_eq!(anchor.correction.world_pose.translation.y, ANCHORS as f64);
        let latest = tracker.latest_sample().unwrap();
        assert_eq!(latest.timestamp, (SAMPLES - 1) as f64);
        assert_se3_eq(
            &tracker.current_world_pose().unwrap(),
            &tracker.current_world_to_odom().compose(&latest.pose),
        );
        assert_eq!(tracker.history_len(), 64);
    }
}
