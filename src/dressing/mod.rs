pub mod core;
pub mod grid;
pub mod anchor;
pub mod placer;
pub mod replay;
pub mod registry;
pub mod store;
pub mod queue;
pub mod render;
pub mod plugin;
pub mod error;

pub use error::DressingError;
pub use plugin::{DressingPlugin, DressingSettings};
