pub mod config;
pub mod engine;
pub mod geometry;
pub mod io;
pub mod origin;
pub mod scene;
pub mod system;
pub mod tracking;
pub mod viewport;
pub mod viz;
