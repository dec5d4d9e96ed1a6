//! Pattern matching for LIKE expressions.
//!
//! SQL LIKE with two wildcards:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! Matching is **case-sensitive** and operates on Unicode scalar values.

use alloc::vec::Vec;

/// SQL LIKE pattern matching.
///
/// ```
/// use skein_core::pattern_match::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_at(&v, &p, 0, 0)
}

fn like_at(v: &[char], p: &[char], vi: usize, pi: usize) -> bool {
    if pi == p.len() {
        return vi == v.len();
    }
    match p[pi] {
        '%' => {
            // collapse runs of %
            let mut next = pi;
            while next < p.len() && p[next] == '%' {
                next += 1;
            }
            (vi..=v.len()).any(|skip| like_at(v, p, skip, next))
        }
        '_' => vi < v.len() && like_at(v, p, vi + 1, pi + 1),
        ch => vi < v.len() && v[vi] == ch && like_at(v, p, vi + 1, pi + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_wildcards() {
        assert!(like("Alice", "Al%"));
        assert!(like("Alex", "Al%"));
        assert!(!like("Bob", "Al%"));
        assert!(like("abc", "a_c"));
        assert!(!like("abbc", "a_c"));
        assert!(like("", "%"));
        assert!(like("anything", "%%%"));
    }

    #[test]
    fn test_like_is_case_sensitive() {
        assert!(!like("alice", "Al%"));
    }
}
