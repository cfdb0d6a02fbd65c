//! Synchronous per-frame publishing.
//!
//! Runs on the estimator's thread for every new frame:
//! 1. Live points in their native frame (if anyone listens)
//! 2. Alignment update and world composition (under the alignment lock)
//! 3. Transform chain: odom → body, body → sensor, world → odom
//! 4. Odometry record (odom frame) and pose record (world frame), each only
//!    if subscribed

use crate::alignment::SharedAlignment;
use crate::geometry::{FrameNames, SE3};
use crate::system::messages::Frame;

use super::outputs::{OdometryRecord, Outputs, PointCloudRecord, PoseRecord, TransformStamped};

/// Poses computed for one published frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePoses {
    pub t_world_odom: SE3,
    pub t_world_body: SE3,
}

/// Publishes transforms, poses and live points for each estimator frame.
pub struct FramePublishRouter {
    frames: FrameNames,
    alignment: SharedAlignment,
    outputs: Outputs,
}

impl FramePublishRouter {
    pub fn new(frames: FrameNames, alignment: SharedAlignment, outputs: Outputs) -> Self {
        Self {
            frames,
            alignment,
            outputs,
        }
    }

    /// Publish everything derived from `frame`.
    ///
    /// The alignment tracker is updated even when no output has consumers.
    pub fn on_new_frame(&self, frame: &Frame) -> FramePoses {
        if self.outputs.points.has_consumers() {
            self.outputs.points.publish(PointCloudRecord {
                stamp: frame.timestamp,
                frame_id: self.frames.for_role(frame.role).to_string(),
                points: frame.points.clone(),
            });
        }

        let poses = {
            let mut alignment = self.alignment.lock();
            alignment.add_odometry_sample(frame.timestamp, frame.t_odom_body);
            FramePoses {
                t_world_odom: alignment.current_world_to_odom(),
                t_world_body: alignment.compose_world(&frame.t_odom_body),
            }
        };

        if self.outputs.transforms.has_consumers() {
            let stamp = frame.timestamp;
            let names = &self.frames;
            self.send_transform(stamp, &names.odom, &names.body, frame.t_odom_body);
            self.send_transform(stamp, &names.body, &names.sensor, frame.t_body_sensor);
            self.send_transform(stamp, &names.world, &names.odom, poses.t_world_odom);
        }

        if self.outputs.odometry.has_consumers() {
            // Velocity is reported in the child (body) frame
            let linear_velocity = frame.t_odom_body.rotation.inverse() * frame.v_odom_body;
            self.outputs.odometry.publish(OdometryRecord {
                stamp: frame.timestamp,
                frame_id: self.frames.odom.clone(),
                child_frame_id: self.frames.body.clone(),
                pose: frame.t_odom_body,
                linear_velocity,
            });
        }

        if self.outputs.pose.has_consumers() {
            self.outputs.pose.publish(PoseRecord {
                stamp: frame.timestamp,
                frame_id: self.frames.world.clone(),
                pose: poses.t_world_body,
            });
        }

        poses
    }

    fn send_transform(&self, stamp: f64, parent: &str, child: &str, transform: SE3) {
        self.outputs.transforms.publish(TransformStamped {
            stamp,
            parent_frame: parent.to_string(),
            child_frame: child.to_string(),
            transform,
        });
    }
}
