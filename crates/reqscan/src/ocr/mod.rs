//! Text recognition: engines, fusion, caching and retry.
//!
//! # Features
//!
//! - **Two engines**: PaddleOCR as primary and Tesseract as secondary, both driven as
//!   external processes and located on `PATH` (or through `REQSCAN_PADDLEOCR_PATH` /
//!   `REQSCAN_TESSERACT_PATH`)
//! - **Fusion**: one text per frame from whatever the engines returned
//! - **Result caching**: persistent MessagePack cache keyed by content hash, with expiry
//! - **Retry**: exponential backoff, then a degraded pass that skips skew correction
//!
//! # Example
//!
//! ```rust,no_run
//! use reqscan::ocr::{BackendId, BackendSet, Engine, Recognizer, BackendError};
//! use reqscan::types::Frame;
//!
//! struct Fixed;
//!
//! impl Recognizer for Fixed {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     fn recognize(&self, _frame: &Frame) -> Result<Vec<String>, BackendError> {
//!         Ok(vec!["Hello".to_string()])
//!     }
//! }
//!
//! # fn example() -> reqscan::Result<()> {
//! let backends = BackendSet::new(vec![(BackendId::Primary, Engine::custom(Fixed))])?;
//! assert_eq!(backends.len(), 1);
//! # Ok(())
//! # }
//! ```
pub mod backend;
pub mod cache;
pub mod error;
pub mod fusion;
pub mod paddle;
pub mod retry;
pub(crate) mod subprocess;
pub mod tesseract;

pub use backend::{BackendId, BackendSet, Engine, Recognizer, normalize_lines};
pub use cache::{Clock, OcrCache, OcrCacheStats, SystemClock};
pub use error::{BackendError, CacheError};
pub use fusion::fuse;
pub use paddle::{PADDLE_PATH_ENV, PaddleEngine};
pub use retry::{RetryController, RetryState, Sleeper, ThreadSleeper, backoff_delay};
pub use tesseract::{TESSERACT_PATH_ENV, TesseractEngine};
