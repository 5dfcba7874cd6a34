//! Image payload helpers - data URI codec and format detection

pub mod data_uri;

pub use data_uri::{detect_image_format, DataUri, Dimensions, ImageFormat};
