//! Coordinate frame roles and names.
//!
//! The bridge publishes a chain of four frames:
//!
//! ```text
//! world ──T_world_odom──► odom ──T_odom_body──► body ──T_body_sensor──► sensor
//! ```
//!
//! - **sensor**: the frame the raw point sets are measured in (e.g. LiDAR)
//! - **body**: the frame the estimator tracks (e.g. IMU)
//! - **odom**: locally consistent odometry frame, drifts over time
//! - **world**: globally corrected frame, jumps whenever the mapping backend
//!   finalizes a submap
//!
//! The `odom → body` link is smooth and event-rate; `world → odom` absorbs the
//! corrections so downstream consumers see a continuous odometry and a
//! corrected world pose at the same time.

/// Coordinate role of an estimator frame's point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRole {
    Sensor,
    Body,
    World,
}

/// Frame identifiers stamped on every transform and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNames {
    pub sensor: String,
    pub body: String,
    pub odom: String,
    pub world: String,
}

impl FrameNames {
    /// Frame id for a point set expressed in `role`.
    pub fn for_role(&self, role: FrameRole) -> &str {
        match role {
            FrameRole::Sensor => &self.sensor,
            FrameRole::Body => &self.body,
            FrameRole::World => &self.world,
        }
    }
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            sensor: "lidar".to_string(),
            body: "imu".to_string(),
            odom: "odom".to_string(),
            world: "world".to_string(),
        }
    }
}
