pub mod compose;
pub mod config;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod pdf;
pub mod pipeline;
pub mod raster;
