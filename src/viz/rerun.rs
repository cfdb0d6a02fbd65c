//! Rerun-backed outputs.
//!
//! Entity hierarchy (frame names from `FrameNames`, defaults shown):
//!     world                       - World frame root
//!         map                     - Merged map points (dim gray)
//!         pose                    - Corrected body pose
//!         odom                    - world → odom transform
//!             imu                 - odom → body transform
//!                 points          - Live points when published in the body frame
//!                 lidar           - body → sensor transform
//!                     points      - Live points when published in the sensor frame
//!         points                  - Live points when published in the world frame
//!     plots/
//!         speed                   - Body speed from the odometry stream

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use rerun::{RecordingStream, external::glam};

use crate::geometry::{FrameNames, SE3};
use crate::publish::{
    OdometryRecord, Output, Outputs, PointCloudRecord, PoseRecord, TransformStamped,
};

/// Timeline all records are stamped on.
const TIMELINE: &str = "stamp";

/// Entity paths for each named frame of the transform chain.
#[derive(Debug, Clone)]
struct FramePaths {
    paths: HashMap<String, String>,
}

impl FramePaths {
    fn new(frames: &FrameNames) -> Self {
        let world = frames.world.clone();
        let odom = format!("{world}/{}", frames.odom);
        let body = format!("{odom}/{}", frames.body);
        let sensor = format!("{body}/{}", frames.sensor);

        let paths = [
            (frames.world.clone(), world),
            (frames.odom.clone(), odom),
            (frames.body.clone(), body),
            (frames.sensor.clone(), sensor),
        ]
        .into_iter()
        .collect();
        Self { paths }
    }

    fn get(&self, frame_id: &str) -> Option<&str> {
        self.paths.get(frame_id).map(String::as_str)
    }
}

pub struct RerunVisualizer {
    rec: RecordingStream,
    paths: Arc<FramePaths>,
    world: String,
}

impl RerunVisualizer {
    /// Spawn a rerun viewer in a separate process and log to it.
    pub fn spawn(app_name: &str, frames: &FrameNames) -> Result<Self> {
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .spawn()
            .context("failed to spawn rerun viewer")?;
        Ok(Self::from_stream(rec, frames))
    }

    /// Log to an existing recording stream.
    pub fn from_stream(rec: RecordingStream, frames: &FrameNames) -> Self {
        rec.log_static(frames.world.as_str(), &rerun::ViewCoordinates::RFU())
            .ok();
        Self {
            rec,
            paths: Arc::new(FramePaths::new(frames)),
            world: frames.world.clone(),
        }
    }

    /// Output bundle writing to this recording.
    pub fn outputs(&self) -> Outputs {
        Outputs {
            transforms: Arc::new(RerunTransforms {
                rec: self.rec.clone(),
                paths: Arc::clone(&self.paths),
            }),
            points: Arc::new(RerunPoints {
                rec: self.rec.clone(),
                paths: Arc::clone(&self.paths),
                entity: None,
                color: [255, 255, 255],
                radius: 0.02,
            }),
            odometry: Arc::new(RerunOdometry {
                rec: self.rec.clone(),
            }),
            pose: Arc::new(RerunPose {
                rec: self.rec.clone(),
                entity: format!("{}/pose", self.world),
            }),
            map: Arc::new(RerunPoints {
                rec: self.rec.clone(),
                paths: Arc::clone(&self.paths),
                entity: Some(format!("{}/map", self.world)),
                color: [100, 100, 100],
                radius: 0.01,
            }),
        }
    }
}

fn to_glam(pose: &SE3) -> (glam::Vec3, glam::Quat) {
    let translation = glam::Vec3::new(
        pose.translation.x as f32,
        pose.translation.y as f32,
        pose.translation.z as f32,
    );
    let rotation = glam::Quat::from_xyzw(
        pose.rotation.coords.x as f32,
        pose.rotation.coords.y as f32,
        pose.rotation.coords.z as f32,
        pose.rotation.w as f32,
    );
    (translation, rotation)
}

struct RerunTransforms {
    rec: RecordingStream,
    paths: Arc<FramePaths>,
}

impl Output<TransformStamped> for RerunTransforms {
    fn has_consumers(&self) -> bool {
        self.rec.is_enabled()
    }

    fn publish(&self, record: TransformStamped) {
        // Frames outside the known chain have no place in the hierarchy
        let Some(path) = self.paths.get(&record.child_frame) else {
            return;
        };
        let (translation, rotation) = to_glam(&record.transform);
        self.rec.set_duration_secs(TIMELINE, record.stamp);
        self.rec
            .log(
                path,
                &rerun::Transform3D::from_translation_rotation(translation, rotation),
            )
            .ok();
    }
}

struct RerunPoints {
    rec: RecordingStream,
    paths: Arc<FramePaths>,
    /// Fixed entity; `None` logs under the record's frame.
    entity: Option<String>,
    color: [u8; 3],
    radius: f32,
}

impl Output<PointCloudRecord> for RerunPoints {
    fn has_consumers(&self) -> bool {
        self.rec.is_enabled()
    }

    fn publish(&self, record: PointCloudRecord) {
        let entity = match &self.entity {
            Some(entity) => entity.clone(),
            None => match self.paths.get(&record.frame_id) {
                Some(frame_path) => format!("{frame_path}/points"),
                None => return,
            },
        };
        let pts: Vec<[f32; 3]> = record
            .points
            .iter()
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect();

        self.rec.set_duration_secs(TIMELINE, record.stamp);
        self.rec
            .log(
                entity.as_str(),
                &rerun::Points3D::new(pts)
                    .with_colors([self.color])
                    .with_radii([self.radius]),
            )
            .ok();
    }
}

struct RerunPose {
    rec: RecordingStream,
    entity: String,
}

impl Output<PoseRecord> for RerunPose {
    fn has_consumers(&self) -> bool {
        self.rec.is_enabled()
    }

    fn publish(&self, record: PoseRecord) {
        let (translation, rotation) = to_glam(&record.pose);
        self.rec.set_duration_secs(TIMELINE, record.stamp);
        self.rec
            .log(
                self.entity.as_str(),
                &rerun::Transform3D::from_translation_rotation(translation, rotation),
            )
            .ok();
    }
}

struct RerunOdometry {
    rec: RecordingStream,
}

impl Output<OdometryRecord> for RerunOdometry {
    fn has_consumers(&self) -> bool {
        self.rec.is_enabled()
    }

    fn publish(&self, record: OdometryRecord) {
        self.rec.set_duration_secs(TIMELINE, record.stamp);
        self.rec
            .log(
                "plots/speed",
                &rerun::Scalars::new([record.linear_velocity.norm()]),
            )
            .ok();
    }
}
