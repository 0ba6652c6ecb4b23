pub mod render;
pub mod scene;

pub use render::{render, ImageFormat};
pub use scene::{aggregate_variants, assemble_scene};
