pub mod engine;
pub mod timestamp;

pub use engine::{ComposeOptions, Composer, compose};
