pub mod backend;
pub mod catalog;
pub mod fallback;
pub mod gateway;
