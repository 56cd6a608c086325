pub mod camera;
pub mod controller;
mod loop_worker;

pub use camera::{DirectoryCamera, FrameSource};
pub use controller::LiveScanController;
