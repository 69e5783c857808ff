//! Raw query-string access
//!
//! Clients send list parameters as repeated keys, `key[]` keys, or
//! comma-separated strings. [`QueryParams`] folds every shape into one
//! multimap so the rest of the crate never sees the difference.

use bizlink_common::ids::{non_blank, parse_id_list};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    values: HashMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            let key = key.strip_suffix("[]").unwrap_or(&key).to_string();
            values.entry(key).or_default().push(value);
        }
        Self { values }
    }

    /// First non-blank value for `key`
    pub fn text(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(|list| list.iter().find_map(|v| non_blank(Some(v.as_str()))))
    }

    /// Union of id lists across all `keys`
    pub fn ids(&self, keys: &[&str]) -> BTreeSet<String> {
        parse_id_list(
            keys.iter()
                .filter_map(|key| self.values.get(*key))
                .flatten(),
        )
    }

    /// Parsed number; unparseable values are treated as absent
    pub fn number<T: FromStr>(&self, key: &str) -> Option<T> {
        self.text(key).and_then(|raw| raw.parse().ok())
    }

    /// `true`/`false`/`1`/`0`; anything else is absent
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.text(key)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}
