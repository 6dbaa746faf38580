//! Query string and URL-encoded form parsing

use url::form_urlencoded;

use super::fields::{FieldMap, FieldValue};

/// Parse `a=1&b=2` pairs into a field map.
///
/// Keys and values are percent-decoded (`+` is a space). The last occurrence
/// of a repeated key wins; a key without `=` maps to an empty string.
pub fn parse_pairs(input: &[u8]) -> FieldMap {
    form_urlencoded::parse(input)
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), FieldValue::Text(value.into_owned())))
        .collect()
}

/// Parse an optional raw query string
pub fn parse_query(query: Option<&str>) -> FieldMap {
    query.map(|q| parse_pairs(q.as_bytes())).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(map: &FieldMap, key: &str) -> Option<String> {
        map.get(key).cloned().map(FieldValue::into_text)
    }

    #[test]
    fn test_last_duplicate_wins() {
        let map = parse_query(Some("id=5&id=9"));
        assert_eq!(text(&map, "id").as_deref(), Some("9"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_key_without_value_is_empty() {
        let map = parse_query(Some("flag&name=rivet"));
        assert_eq!(text(&map, "flag").as_deref(), Some(""));
        assert_eq!(text(&map, "name").as_deref(), Some("rivet"));
    }

    #[test]
    fn test_values_are_decoded() {
        let map = parse_pairs(b"title=Hello+World&tag=%C3%A9t%C3%A9");
        assert_eq!(text(&map, "title").as_deref(), Some("Hello World"));
        assert_eq!(text(&map, "tag").as_deref(), Some("été"));
    }

    #[test]
    fn test_empty_and_missing_query() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
        assert!(parse_query(Some("&&")).is_empty());
    }
}
