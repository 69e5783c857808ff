//! Deterministic cache keys and invalidation patterns
//!
//! A key is `namespace:` followed by a canonical JSON rendering of the
//! request parameters: object keys sorted, array elements sorted. Parameter
//! order and array order therefore never fragment the cache.

use serde_json::Value;

/// Build a namespaced key from request parameters
///
/// ```
/// use bizlink_feed::cache::keys::cache_key;
/// use serde_json::json;
///
/// assert_eq!(
///     cache_key("feed", &json!({"ids": [3, 1, 2], "tab": "all"})),
///     cache_key("feed", &json!({"tab": "all", "ids": [2, 3, 1]})),
/// );
/// ```
pub fn cache_key(namespace: &str, params: &Value) -> String {
    format!("{}:{}", namespace, canonical_json(params))
}

/// JSON text with sorted object keys and sorted arrays
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let mut rendered: Vec<String> = items.iter().map(canonical_json).collect();
            rendered.sort();
            format!("[{}]", rendered.join(","))
        }
        scalar => scalar.to_string(),
    }
}

/// Escape glob metacharacters so a part only matches itself
pub fn escape_glob(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `part1*part2*...*` glob over escaped parts
pub fn invalidation_pattern<S: AsRef<str>>(parts: &[S]) -> String {
    let escaped: Vec<String> = parts.iter().map(|p| escape_glob(p.as_ref())).collect();
    format!("{}*", escaped.join("*"))
}

#[derive(Debug, PartialEq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Any,
            '?' => Token::One,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            other => Token::Literal(other),
        });
    }
    tokens
}

/// Glob match supporting `*`, `?` and backslash escapes
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_order_does_not_matter() {
        assert_eq!(
            cache_key("feed", &json!({"ids": [3, 1, 2]})),
            cache_key("feed", &json!({"ids": [2, 3, 1]}))
        );
    }

    #[test]
    fn test_viewer_identity_separates_keys() {
        let anonymous = cache_key("feed", &json!({"currentUserId": "anonymous"}));
        let viewer = cache_key("feed", &json!({"currentUserId": "u1"}));
        assert_ne!(anonymous, viewer);
    }

    #[test]
    fn test_nested_objects_canonical() {
        let a = json!({"b": {"y": 1, "x": [2, 1]}, "a": null});
        let b = json!({"a": null, "b": {"x": [1, 2], "y": 1}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":null,"b":{"x":[1,2],"y":1}}"#);
    }

    #[test]
    fn test_invalidation_pattern_matches_keys_mentioning_user() {
        let key = cache_key("feed", &json!({"currentUserId": "u1", "tab": "all"}));
        let pattern = invalidation_pattern(&["feed:", "u1"]);
        assert!(glob_match(&pattern, &key));
        assert!(!glob_match(&pattern, &cache_key("feed", &json!({"currentUserId": "u2"}))));
        assert!(!glob_match(&pattern, "suggestions:{\"currentUserId\":\"u1\"}"));
    }

    #[test]
    fn test_glob_escapes_are_literal() {
        assert!(glob_match(r"a\*b", "a*b"));
        assert!(!glob_match(r"a\*b", "axb"));
        assert!(glob_match("a?c*", "abcdef"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("abc", "ab"));
    }
}
