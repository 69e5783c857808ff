//! Request id-list normalization
//!
//! Query parameters carrying taxonomy ids arrive in several shapes: repeated
//! keys, `key[]` keys, comma-separated strings, or JSON-ish `[1,"2"]` strings.
//! Everything is funneled through [`parse_id_list`] so the engine only ever
//! sees a sorted, de-duplicated set.

use std::collections::BTreeSet;

/// Normalize raw parameter values into a set of trimmed, non-empty ids.
///
/// ```
/// use bizlink_common::ids::parse_id_list;
///
/// let ids = parse_id_list(["3, 1", "2", "1"]);
/// assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1", "2", "3"]);
///
/// let ids = parse_id_list(["[\"7\", 9]"]);
/// assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["7", "9"]);
/// ```
pub fn parse_id_list<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|value| {
            value
                .as_ref()
                .split(',')
                .map(clean_token)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Strip whitespace, brackets and quotes surrounding a single token
fn clean_token(token: &str) -> &str {
    token
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
}

/// Parse an optional single-valued parameter, treating blanks as absent
pub fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_and_repeated_values_merge() {
        let ids = parse_id_list(vec!["5,6", "7", " 5 "]);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("5"));
        assert!(ids.contains("7"));
    }

    #[test]
    fn test_blank_tokens_dropped() {
        let ids = parse_id_list(vec![",, ,", ""]);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_order_independent() {
        assert_eq!(parse_id_list(["3,1,2"]), parse_id_list(["2", "3", "1"]));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" Lagos ")), Some("Lagos".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
