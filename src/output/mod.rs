//! Output module - persisting returned images

pub mod file;

pub use file::OutputStore;
