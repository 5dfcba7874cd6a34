//! MagicQuill client
//!
//! Typed access to the MagicQuill image editing backend: prompt guessing,
//! background preprocessing and the proposed generate endpoint, plus an
//! automated smoke checklist and a load runner for exercising a deployment.

pub mod backend;
pub mod checklist;
pub mod config;
pub mod error;
pub mod image;
pub mod load;
pub mod output;

pub use backend::{HttpBackend, QuillBackend};
pub use error::{AppError, Result};
pub use image::DataUri;
