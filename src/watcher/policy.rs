use super::config::WatchConfig;
use super::text::{contains_any, ends_like_finished};

/// Keyword requirement plus the optional end-punctuation requirement.
///
/// With `require_keyword` set and an empty keyword list nothing can match,
/// so the run never completes.
pub fn keyword_policy_satisfied(text: &str, config: &WatchConfig) -> bool {
    if config.require_keyword && !contains_any(text, &config.keywords) {
        return false;
    }
    if config.require_end_punct && !ends_like_finished(text) {
        return false;
    }
    true
}

pub fn avoid_policy_triggered(text: &str, config: &WatchConfig) -> bool {
    contains_any(text, &config.avoid_words)
}
