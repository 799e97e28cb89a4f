pub mod analysis;
pub mod config;
pub mod normalize;
pub mod note;
pub mod players;
pub mod quantize;
pub mod recorder;
pub mod scheduler;
pub mod segment;
