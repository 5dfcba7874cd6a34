//! Configuration module

pub mod settings;

pub use settings::{
    BackendConfig, ChecklistConfig, LoadConfig, LoggingConfig, OutputConfig, Settings,
};
