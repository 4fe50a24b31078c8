//! Request header parsing
//!
//! Builds a case-insensitive header mapping from raw header lines while
//! keeping the raw lines around for verbatim re-serialization.

use std::collections::HashMap;

/// Case-insensitive header mapping built once per connection.
///
/// Keys are lowercased and trimmed; values are trimmed but otherwise
/// unmodified. Duplicate names keep the last occurrence. Lines without a
/// colon separator are dropped silently, degrading to "header absent"
/// rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    map: HashMap<String, String>,
}

impl HeaderMap {
    /// Parse an ordered sequence of raw header lines (no line terminators).
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for line in lines {
            let line = line.as_ref();
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                map.insert(name.to_lowercase(), value.trim().to_string());
            }
        }
        Self { map }
    }

    /// Look up a header by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Number of distinct headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no header line parsed successfully.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over (lowercased name, value) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
