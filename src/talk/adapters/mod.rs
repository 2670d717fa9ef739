//! Adapter implementations of the talk store port.

pub mod dir;
pub mod memory;
mod settings;

pub use dir::DirTalks;
pub use memory::InMemoryTalks;
pub use settings::StoreSettings;
