//! Embedding Server Library
//!
//! HTTP service exposing a pretrained sentence-embedding model: texts in,
//! fixed-dimension vectors out.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod embeddings;
pub mod error;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
