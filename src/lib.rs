pub mod alignment;
pub mod clock;
pub mod config;
pub mod geometry;
pub mod publish;
pub mod system;
pub mod viz;
