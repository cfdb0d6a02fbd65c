//! Output streams of the bridge.
//!
//! Records carry the semantic content of each message (frames, stamps,
//! poses, points). Encoding them to a wire format belongs to whatever
//! implements [`Output`].

use std::sync::Arc;

use nalgebra::Vector3;

use crate::geometry::SE3;
use crate::system::messages::Points;

/// Rigid transform between two named frames (T_parent_child).
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStamped {
    pub stamp: f64,
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: SE3,
}

/// Body pose and velocity in the odometry frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OdometryRecord {
    pub stamp: f64,
    /// Odometry frame id.
    pub frame_id: String,
    /// Body frame id.
    pub child_frame_id: String,
    /// T_odom_body.
    pub pose: SE3,
    /// Linear velocity expressed in the body frame.
    pub linear_velocity: Vector3<f64>,
}

/// Body pose in the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseRecord {
    pub stamp: f64,
    pub frame_id: String,
    /// T_world_body.
    pub pose: SE3,
}

/// Point set tagged with its frame.
#[derive(Debug, Clone)]
pub struct PointCloudRecord {
    pub stamp: f64,
    pub frame_id: String,
    pub points: Points,
}

/// A destination for one output stream.
///
/// `has_consumers` must be cheap: it is checked on the producer thread
/// before any record is built, so work is skipped when nobody listens.
pub trait Output<T>: Send + Sync {
    fn has_consumers(&self) -> bool;
    fn publish(&self, record: T);
}

/// Output that never has consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl<T> Output<T> for NullOutput {
    fn has_consumers(&self) -> bool {
        false
    }

    fn publish(&self, _record: T) {}
}

/// All output streams, handed to the bridge at construction.
#[derive(Clone)]
pub struct Outputs {
    /// odom → body, body → sensor, world → odom.
    pub transforms: Arc<dyn Output<TransformStamped>>,
    /// Live per-frame points in their native frame.
    pub points: Arc<dyn Output<PointCloudRecord>>,
    pub odometry: Arc<dyn Output<OdometryRecord>>,
    /// World-frame body pose.
    pub pose: Arc<dyn Output<PoseRecord>>,
    /// Merged map in the world frame.
    pub map: Arc<dyn Output<PointCloudRecord>>,
}

impl Outputs {
    /// Outputs with no consumers anywhere.
    pub fn disconnected() -> Self {
        Self {
            transforms: Arc::new(NullOutput),
            points: Arc::new(NullOutput),
            odometry: Arc::new(NullOutput),
            pose: Arc::new(NullOutput),
            map: Arc::new(NullOutput),
        }
    }
}

impl std::fmt::Debug for Outputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outputs")
            .field("transforms", &self.transforms.has_consumers())
            .field("points", &self.points.has_consumers())
            .field("odometry", &self.odometry.has_consumers())
            .field("pose", &self.pose.has_consumers())
            .field("map", &self.map.has_consumers())
            .finish()
    }
}
