pub mod analysis_session;
pub mod classifier;
pub mod fs_service;
pub mod history;
pub mod image_source;
pub mod live_scan;
