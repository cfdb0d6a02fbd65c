//! Geometry utilities: SE3 transforms, frame naming.

pub mod frames;
pub mod se3;

pub use frames::{FrameNames, FrameRole};
pub use se3::SE3;
