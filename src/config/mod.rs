//! Configuration management for the quantum state manager
//!
//! - **settings**: the six-category `Settings` schema with defaults and validation
//! - **loader**: file → environment → legacy layering into a validated `Settings`

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::Settings;
