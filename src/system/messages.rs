//! Estimator event payloads.
//!
//! These are produced by the estimation pipeline on its own threads and
//! handed to the bridge through the callback inputs of
//! [`PublishBridge`](super::PublishBridge).

use std::sync::Arc;

use nalgebra::{Vector3, Vector4};

use crate::geometry::{FrameRole, SE3};

/// Homogeneous point set, shared without copying between estimator and bridge.
pub type Points = Arc<[Vector4<f64>]>;

/// Odometry pose of the body at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Timestamp in seconds.
    pub timestamp: f64,
    /// T_odom_body.
    pub pose: SE3,
}

/// Authoritative world pose of the body at an odometry timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorCorrection {
    pub timestamp: f64,
    /// T_world_body.
    pub world_pose: SE3,
}

/// A single estimator output frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame the point set is expressed in.
    pub role: FrameRole,

    /// Timestamp in seconds.
    pub timestamp: f64,

    /// Body pose in the odometry frame (T_odom_body).
    pub t_odom_body: SE3,

    /// Sensor-to-body extrinsic (T_body_sensor).
    pub t_body_sensor: SE3,

    /// Body linear velocity expressed in the odometry frame.
    pub v_odom_body: Vector3<f64>,

    /// Points of this frame.
    pub points: Points,
}

/// Unique identifier of a submap, assigned by the mapping backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmapId(pub u64);

impl std::fmt::Display for SubmapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SM{}", self.0)
    }
}

/// A locally consistent chunk of accumulated points with one world pose.
#[derive(Debug, Clone)]
pub struct Submap {
    pub id: SubmapId,

    /// Submap origin in the world frame (T_world_origin).
    pub t_world_origin: SE3,

    /// Body pose at the last odometry sample of the submap, relative to the
    /// origin (T_origin_endpoint).
    pub t_origin_endpoint: SE3,

    /// Timestamp of the last odometry sample merged into the submap.
    pub last_stamp: f64,

    /// Points in the submap origin frame.
    pub points: Points,
}

impl Submap {
    /// World pose of the submap endpoint (T_world_origin ∘ T_origin_endpoint).
    pub fn world_endpoint(&self) -> SE3 {
        self.t_world_origin.compose(&self.t_origin_endpoint)
    }

    /// Anchor correction implied by this submap.
    pub fn anchor_correction(&self) -> AnchorCorrection {
        AnchorCorrection {
            timestamp: self.last_stamp,
            world_pose: self.world_endpoint(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}
