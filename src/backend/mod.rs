//! Backend module - Payload types, the backend trait and its HTTP client

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpBackend;
pub use traits::QuillBackend;
