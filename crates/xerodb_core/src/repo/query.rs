//! Shared shapes and helpers for read-side repository queries.

use crate::repo::error::RepoResult;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

/// Result of a set-membership query.
///
/// `matched` and `unmatched` partition the input list in input order, so
/// together they reconstruct it exactly; `rows` holds the distinct matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetMatch<T> {
    pub rows: Vec<T>,
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
}

impl<T> Default for SetMatch<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            matched: Vec::new(),
            unmatched: Vec::new(),
        }
    }
}

/// Identity of a row inside a [`SetMatch`].
pub(crate) trait MatchKey {
    type Key: Eq + Hash;

    fn match_key(&self) -> Self::Key;
}

impl<T: MatchKey> SetMatch<T> {
    /// Runs `lookup` for every input item and sorts the item into
    /// `matched`/`unmatched` by whether it returned any rows.
    pub(crate) fn collect<F>(items: &[String], mut lookup: F) -> RepoResult<Self>
    where
        F: FnMut(&str) -> RepoResult<Vec<T>>,
    {
        let mut result = Self::default();
        let mut seen = HashSet::new();
        for item in items {
            let rows = lookup(item.as_str())?;
            if rows.is_empty() {
                result.unmatched.push(item.clone());
                continue;
            }
            result.matched.push(item.clone());
            for row in rows {
                if seen.insert(row.match_key()) {
                    result.rows.push(row);
                }
            }
        }
        Ok(result)
    }
}

/// Builds a case-insensitive `LIKE` pattern matching `text` anywhere.
///
/// Returns `None` for blank input. Use with `ESCAPE '\'`.
pub(crate) fn contains_pattern(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    Some(escaped)
}

#[cfg(test)]
mod tests {
    use super::{contains_pattern, MatchKey, SetMatch};

    impl MatchKey for String {
        type Key = String;

        fn match_key(&self) -> String {
            self.clone()
        }
    }

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" 50%_up ").as_deref(), Some("%50\\%\\_up%"));
        assert_eq!(contains_pattern("  "), None);
    }

    #[test]
    fn collect_partitions_input_in_order() {
        let items = vec![
            "a".to_string(),
            "x".to_string(),
            "b".to_string(),
            "a".to_string(),
        ];
        let result = SetMatch::collect(&items, |item| {
            Ok(match item {
                "a" | "b" => vec![item.to_uppercase()],
                _ => Vec::new(),
            })
        })
        .unwrap();

        assert_eq!(result.matched, vec!["a", "b", "a"]);
        assert_eq!(result.unmatched, vec!["x"]);
        assert_eq!(result.rows, vec!["A", "B"]);
    }

    #[test]
    fn collect_keeps_first_row_per_key_across_large_inputs() {
        let items: Vec<String> = (0..2000).map(|n| format!("g{n}")).collect();
        let result = SetMatch::collect(&items, |item| {
            let n: usize = item[1..].parse().unwrap();
            Ok(vec![format!("row{}", n % 500), format!("row{}", n % 7)])
        })
        .unwrap();

        assert_eq!(result.matched.len(), 2000);
        assert_eq!(result.rows.len(), 500);
        assert_eq!(result.rows[..3], ["row0", "row1", "row2"]);
    }
}
