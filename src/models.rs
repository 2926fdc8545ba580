use serde::{Deserialize, Serialize};

/// OMDb's placeholder for "no value".
pub const NOT_AVAILABLE: &str = "N/A";

/// A catalog record as served to clients. Search hits only carry the
/// identity fields; detail lookups fill in the rest.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MyListEntry {
    #[serde(flatten)]
    pub movie: Movie,
    /// Epoch milliseconds.
    pub added_at: i64,
}

/// Entry kept by the collection backend; only the fields we read.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListedMovie {
    pub movie_id: String,
    #[serde(default)]
    pub list: Vec<String>,
}

/// Maps OMDb's "N/A" and blank strings to `None`.
pub fn available(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let trimmed = v.trim();
        !trimmed.is_empty() && trimmed != NOT_AVAILABLE
    })
}

/// Leading-digit year parse: "2005" and "2005–2010" both give 2005.
pub fn parse_year(raw: &str) -> Option<i32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_takes_leading_digits() {
        assert_eq!(parse_year("2005"), Some(2005));
        assert_eq!(parse_year("2005–2010"), Some(2005));
        assert_eq!(parse_year("N/A"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn sentinel_is_not_available() {
        assert_eq!(available(Some("N/A".into())), None);
        assert_eq!(available(Some("  ".into())), None);
        assert_eq!(available(None), None);
        assert_eq!(available(Some("PG-13".into())), Some("PG-13".into()));
    }

    #[test]
    fn entry_serializes_flat_with_camel_case() {
        let entry = MyListEntry {
            movie: Movie {
                id: "tt0372784".into(),
                title: "Batman Begins".into(),
                poster_url: None,
                year: Some(2005),
                ..Movie::default()
            },
            added_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], "tt0372784");
        assert_eq!(value["addedAt"], 1_700_000_000_000_i64);
        assert!(value["posterUrl"].is_null());
        assert!(value.get("plot").is_none());
    }
}
