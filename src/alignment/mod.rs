//! Odometry-to-world frame alignment.

mod tracker;

pub use tracker::{AlignmentTracker, Anchor, AnchorMatch, SharedAlignment};
