//! Publishing paths: per-frame routing, merged map accumulation, and the
//! output streams they write to.

pub mod map;
pub mod outputs;
pub mod router;
pub mod topic;

pub use map::{MapAccumulator, MapPublisher};
pub use outputs::{
    NullOutput, OdometryRecord, Output, Outputs, PointCloudRecord, PoseRecord, TransformStamped,
};
pub use router::{FramePoses, FramePublishRouter};
pub use topic::{Subscription, Topic};
