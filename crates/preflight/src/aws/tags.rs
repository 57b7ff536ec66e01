//! Tag extraction across SDK tag types

use std::collections::HashMap;

/// Extract tags from any AWS tag type into a HashMap.
///
/// Different AWS SDKs use different tag types (acm::Tag, s3::Tag,
/// cloudfront::Tag, ...) but they all have key/value string fields. This
/// generic function handles them all via closures. Tags without a value are
/// kept with an empty value.
pub fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> HashMap<String, String> {
    tags.iter()
        .filter_map(|t| key(t).map(|k| (k.to_string(), value(t).unwrap_or_default().to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str, Option<&'static str>);

    #[test]
    fn keeps_valueless_tags() {
        let tags = [Tag("aws:cloudformation:stack-name", Some("s")), Tag("flag", None)];
        let map = extract_tags(&tags, |t| Some(t.0), |t| t.1);
        assert_eq!(map.get("aws:cloudformation:stack-name").map(String::as_str), Some("s"));
        assert_eq!(map.get("flag").map(String::as_str), Some(""));
    }
}
