//! Bridge configuration.

use std::time::Duration;

use crate::geometry::FrameNames;

/// Target period of the publish loop (100 Hz ceiling).
pub const DEFAULT_PUBLISH_PERIOD: Duration = Duration::from_millis(10);

/// Configuration for [`PublishBridge`](crate::system::PublishBridge) and its parts.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Frame identifiers stamped on outgoing transforms and messages.
    pub frames: FrameNames,

    /// Target period of the deferred publish loop.
    pub publish_period: Duration,

    /// Number of recent odometry samples kept for anchor lookup.
    pub odometry_history: usize,

    /// Retained point count above which the merged map rebuild is flagged as
    /// past its scaling limit.
    pub map_points_warn_threshold: usize,

    /// Queue depths for in-process [`Topic`](crate::publish::Topic) outputs.
    pub points_queue_depth: usize,
    pub map_queue_depth: usize,
    pub odom_queue_depth: usize,
    pub pose_queue_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frames: FrameNames::default(),
            publish_period: DEFAULT_PUBLISH_PERIOD,
            odometry_history: 512,
            map_points_warn_threshold: 20_000_000,
            points_queue_depth: 10,
            map_queue_depth: 1,
            odom_queue_depth: 10,
            pose_queue_depth: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.publish_period, Duration::from_millis(10));
        assert_eq!(config.map_queue_depth, 1);
        assert!(config.odometry_history > 0);
    }
}
