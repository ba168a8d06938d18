pub mod normalizer;

pub use normalizer::{NormalizedImage, normalize};
