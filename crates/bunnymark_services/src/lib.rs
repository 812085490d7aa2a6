//! Bunnymark Services Layer
//!
//! Run settings: defaults, JSON loading and validation.

pub mod settings;

pub use settings::{Settings, SettingsError};
