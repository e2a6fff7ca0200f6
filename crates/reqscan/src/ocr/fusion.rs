//! Merging the outputs of several backends into one text.

use super::backend::BackendId;
use crate::types::EngineResult;

/// Choose the text for a frame from per-backend results.
///
/// 1. Exactly one backend produced text: that text.
/// 2. Both did: the secondary only when its text is *more than* 1.5× as long as the
///    primary's (in characters); otherwise the primary.
/// 3. Nothing usable: an empty string, which callers treat as a failed attempt.
///
/// Total and deterministic.
pub fn fuse(results: &[EngineResult]) -> String {
    let with_text: Vec<&EngineResult> = results.iter().filter(|r| r.has_text()).collect();

    match with_text.as_slice() {
        [] => String::new(),
        [only] => only.joined(),
        _ => {
            let primary = with_text.iter().find(|r| r.backend == BackendId::Primary);
            let secondary = with_text.iter().find(|r| r.backend == BackendId::Secondary);
            match (primary, secondary) {
                (Some(primary), Some(secondary)) => {
                    let primary_text = primary.joined();
                    let secondary_text = secondary.joined();
                    if prefers_secondary(primary_text.chars().count(), secondary_text.chars().count()) {
                        secondary_text
                    } else {
                        primary_text
                    }
                }
                // Several results for one role: first in order wins
                _ => with_text[0].joined(),
            }
        }
    }
}

/// Strict `secondary > 1.5 × primary`, in integers.
fn prefers_secondary(primary_chars: usize, secondary_chars: usize) -> bool {
    2 * secondary_chars > 3 * primary_chars
}
