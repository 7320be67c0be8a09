/// Average speaking/reading pace used for time estimates.
pub const WORDS_PER_MINUTE: usize = 150;

/// Count the maximal non-whitespace runs in `text`.
///
/// Every word count in the crate goes through this function: the editor's
/// live counter, Pitch Kit snapshots, and the total-words aggregate.
/// Empty or whitespace-only input yields 0.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated minutes to deliver `words` at [`WORDS_PER_MINUTE`], rounded up.
///
/// Example: 151 words → 2 minutes
pub fn reading_time_minutes(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE)
}

/// Convert a display name to a URL-safe kebab-case slug.
///
/// Example: "Brisa Labs" → "brisa-labs"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Remove one trailing period, the way user sentences are re-terminated in drafts.
pub fn strip_trailing_period(text: &str) -> &str {
    text.strip_suffix('.').unwrap_or(text)
}
