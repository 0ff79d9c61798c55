//! [`LayoutStore`](crate::application::LayoutStore) implementations.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileLayoutStore;
pub use memory::InMemoryLayoutStore;
