//! Configuration management for the embedding server.
//!
//! Values come from command-line arguments, falling back to
//! environment variables and then to built-in defaults.

mod settings;

pub use settings::{Config, DEFAULT_MODEL};
