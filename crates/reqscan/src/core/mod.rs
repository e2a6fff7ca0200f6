//! Core configuration and file utilities.
//!
//! - **Configuration**: loading and validating [`ReqscanConfig`](config::ReqscanConfig)
//! - **I/O**: request validation and content hashing

pub mod config;
pub mod io;

pub use config::{CacheConfig, OcrConfig, PreprocessingConfig, ReqscanConfig};
