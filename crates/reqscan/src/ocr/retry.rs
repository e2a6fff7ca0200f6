//! Bounded retry with exponential backoff, then a degraded single-backend pass.
//!
//! ```text
//! Attempting(0) ─empty─▶ sleep 2^0 s ─▶ Attempting(1) ─▶ … ─▶ Attempting(max-1)
//!       │                                                            │ empty
//!       └──────────── text ──▶ Succeeded ◀── text ── Degrading ◀─────┘
//!                                                        │ empty
//!                                                        ▼
//!                                                      Failed
//! ```

use super::backend::BackendSet;
use super::fusion::fuse;
use crate::imaging::Preprocessor;
use crate::pipeline::events::{EventSink, PipelineEvent};
use crate::types::Frame;
use crate::{ExtractionError, Result};
use std::time::Duration;

/// Blocking pause between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Where the controller is in its retry cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Full pipeline attempt `n`, counted from 0
    Attempting(u32),
    /// All full attempts failed; one reduced pass remains
    Degrading,
    Succeeded(String),
    Failed,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed)
    }
}

/// Delay after failed attempt `n`: `2^n` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(32))
}

/// Runs preprocessing, recognition and fusion for one frame until text comes out or every
/// option is exhausted.
pub struct RetryController<'a> {
    preprocessor: &'a Preprocessor,
    backends: &'a BackendSet,
    sleeper: &'a dyn Sleeper,
    events: &'a dyn EventSink,
    max_retries: u32,
    page: Option<u32>,
}

impl<'a> RetryController<'a> {
    /// `max_retries` of 0 is treated as 1.
    pub fn new(
        preprocessor: &'a Preprocessor,
        backends: &'a BackendSet,
        sleeper: &'a dyn Sleeper,
        events: &'a dyn EventSink,
        max_retries: u32,
    ) -> Self {
        Self {
            preprocessor,
            backends,
            sleeper,
            events,
            max_retries: max_retries.max(1),
            page: None,
        }
    }

    /// Tag emitted events with a 1-based page number.
    pub fn for_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    /// Recognize `frame`.
    ///
    /// # Errors
    ///
    /// `RecognitionExhausted` with the number of passes made (full attempts plus the
    /// degraded one) when nothing produced text.
    pub fn run(&self, frame: &Frame) -> Result<String> {
        let mut state = RetryState::Attempting(0);
        let mut passes = 0;

        loop {
            state = match state {
                RetryState::Succeeded(text) => return Ok(text),
                RetryState::Failed => return Err(ExtractionError::RecognitionExhausted { attempts: passes }),
                state => {
                    passes += 1;
                    self.step(state, frame, passes)
                }
            };
        }
    }

    /// Advance one non-terminal state.
    fn step(&self, state: RetryState, frame: &Frame, passes: u32) -> RetryState {
        match state {
            RetryState::Attempting(n) => {
                let processed = self.preprocessor.process(frame.clone());
                let results = self.backends.recognize_all(&processed);
                for result in &results {
                    self.report_failure(result);
                }

                let text = fuse(&results);
                if !text.is_empty() {
                    self.report_success(&text, passes, false);
                    return RetryState::Succeeded(text);
                }

                if n + 1 < self.max_retries {
                    let delay = backoff_delay(n);
                    self.events.emit(&PipelineEvent::AttemptFailed {
                        attempt: n,
                        page: self.page,
                        backoff: Some(delay),
                    });
                    self.sleeper.sleep(delay);
                    RetryState::Attempting(n + 1)
                } else {
                    self.events.emit(&PipelineEvent::AttemptFailed {
                        attempt: n,
                        page: self.page,
                        backoff: None,
                    });
                    RetryState::Degrading
                }
            }
            RetryState::Degrading => {
                self.events.emit(&PipelineEvent::Degrading {
                    page: self.page,
                    attempts: passes - 1,
                });
                let processed = self.preprocessor.process_without_deskew(frame.clone());
                match self
                    .backends
                    .recognize_first(&processed, |result| self.report_failure(result))
                {
                    Some(result) => {
                        let text = result.joined();
                        self.report_success(&text, passes, true);
                        RetryState::Succeeded(text)
                    }
                    None => RetryState::Failed,
                }
            }
            terminal => terminal,
        }
    }

    fn report_failure(&self, result: &crate::types::EngineResult) {
        if let Err(e) = &result.outcome {
            self.events.emit(&PipelineEvent::BackendFailed {
                backend: result.backend,
                page: self.page,
                error: e.to_string(),
            });
        }
    }

    fn report_success(&self, text: &str, passes: u32, degraded: bool) {
        self.events.emit(&PipelineEvent::RecognitionSucceeded {
            page: self.page,
            attempts: passes,
            degraded,
            chars: text.chars().count(),
        });
    }
}
