pub mod agent;
pub mod boundary;
pub mod config;
pub mod neighbors;
pub mod spatial;
pub mod spawn;
pub mod steering;
pub mod vec2;
pub mod world;
