//! Shared utility functions.

/// Every balanced `{...}` span in text that may contain other content, in
/// order of its opening brace. Braces inside JSON strings are ignored.
///
/// A stray `{` in prose yields no span (or a junk one) and scanning moves on
/// to the next brace, so callers try each candidate until one parses.
pub fn json_object_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_object_at(text, start))
}

/// The balanced object starting at byte `start`, which must be a `{`.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
