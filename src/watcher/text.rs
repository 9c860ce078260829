/// Characters that usually close a finished sentence or quoted reply.
pub const TERMINAL_PUNCTUATION: [char; 10] =
    ['.', '!', '?', '»', '\u{201D}', '\'', '"', ')', ']', '…'];

/// Collapses every run of whitespace into a single space and trims both ends.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring check against any of `needles`.
///
/// Empty needles are ignored so that a stray trailing comma in a keyword
/// list does not match every snapshot.
pub fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .map(|needle| needle.as_ref().trim())
        .filter(|needle| !needle.is_empty())
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

pub fn ends_like_finished(text: &str) -> bool {
    text.trim()
        .chars()
        .last()
        .map(|last| TERMINAL_PUNCTUATION.contains(&last))
        .unwrap_or(false)
}

/// Splits comma-separated user input into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_runs() {
        assert_eq!(normalize_text("  a\n\tb  "), "a b");
        assert_eq!(normalize_text("one   two\r\n\r\nthree"), "one two three");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_text(" x \n y ");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn ends_like_finished_checks_last_visible_char() {
        assert!(ends_like_finished("Done."));
        assert!(!ends_like_finished("Done"));
        assert!(!ends_like_finished(""));
        assert!(!ends_like_finished("   "));
        assert!(ends_like_finished("Really?  \n"));
        assert!(ends_like_finished("(see above)"));
        assert!(ends_like_finished("wait…"));
        assert!(ends_like_finished("«bien»"));
    }

    #[test]
    fn contains_any_ignores_case() {
        assert!(contains_any("Claude is Typing", &["typing"]));
        assert!(contains_any("you said", &["YOU"]));
        assert!(!contains_any("nothing here", &["typing", "loading"]));
    }

    #[test]
    fn contains_any_skips_blank_needles() {
        assert!(!contains_any("anything", &["", "  "]));
        let empty: [&str; 0] = [];
        assert!(!contains_any("anything", &empty));
    }

    #[test]
    fn split_list_drops_empty_entries() {
        assert_eq!(split_list("You, you ,, "), vec!["You", "you"]);
        assert!(split_list("").is_empty());
    }
}
