pub mod detection;
pub mod pipeline;
pub mod recording;
pub mod render;
pub mod shared;
pub mod video;
