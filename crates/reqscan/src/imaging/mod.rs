//! Image loading and normalization.
//!
//! - [`ImageStore`] decodes a raster file into a [`Frame`](crate::Frame)
//! - [`Preprocessor`] turns a raw frame into one favourable to recognition

pub mod clahe;
pub mod filter;
pub mod preprocess;
pub mod skew;
pub mod store;

pub use preprocess::Preprocessor;
pub use store::ImageStore;
