pub mod input;
pub mod render;
pub mod simulate;
pub mod stats;
