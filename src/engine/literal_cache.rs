//! Thread-local cache of compiled literal patterns
//!
//! The same literal text shows up in many rules (and in every clone of an
//! arena), so compiled patterns are shared per thread, keyed by the
//! generated pattern string.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    static LITERAL_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Build the anchored pattern for a literal
///
/// Words are separated by `\s+`, so whitespace runs in the input and in the
/// literal text are equivalent. Returns `None` for text without words.
pub fn literal_pattern(text: &str, case_sensitive: bool) -> Option<String> {
    let words: Vec<String> = text.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    let flags = if case_sensitive { "" } else { "(?i)" };
    Some(format!("{}^(?:{})", flags, words.join(r"\s+")))
}

/// Get or compile the matcher regex for a literal
///
/// Returns `None` if the text has no words.
#[inline]
pub fn get_or_compile(text: &str, case_sensitive: bool) -> Option<Regex> {
    let pattern = literal_pattern(text, case_sensitive)?;
    LITERAL_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(&pattern) {
            return Some(regex.clone());
        }

        // Escaped words always form a valid pattern
        let regex = Regex::new(&pattern).ok()?;
        cache.borrow_mut().insert(pattern, regex.clone());
        Some(regex)
    })
}

/// Clear the cache for the current thread
pub fn clear_cache() {
    LITERAL_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns on the current thread
pub fn cache_size() -> usize {
    LITERAL_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_reuse() {
        clear_cache();

        assert!(get_or_compile("hello world", false).is_some());
        assert_eq!(cache_size(), 1);

        // Whitespace differences map to the same pattern
        assert!(get_or_compile("hello   world", false).is_some());
        assert_eq!(cache_size(), 1);

        // Case sensitivity is part of the key
        assert!(get_or_compile("hello world", true).is_some());
        assert_eq!(cache_size(), 2);
    }

    #[test]
    fn test_empty_text() {
        assert!(get_or_compile("", false).is_none());
        assert!(get_or_compile("   ", true).is_none());
    }

    #[test]
    fn test_escaping_and_case() {
        let re = get_or_compile("a.b (c)", false).unwrap();
        assert!(re.is_match("A.B   (C) rest"));
        assert!(!re.is_match("axb (c)"));

        let re = get_or_compile("Hello", true).unwrap();
        assert!(re.is_match("Hello"));
        assert!(!re.is_match("hello"));
    }
}
