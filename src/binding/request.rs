//! Raw request parsing shared by the request context and the binders.

use std::borrow::Cow;
use std::collections::HashMap;

/// Parse cookies from every `Cookie` header value.
///
/// Later cookies with the same name win. Pairs without `=` are kept with an
/// empty value.
///
/// # Arguments
///
/// * `values` - Raw `Cookie` header values in arrival order
///
/// # Returns
///
/// A map of cookie names to values
pub fn parse_cookies<'a>(values: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    values
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse a query string into decoded pairs, keeping order and repeats.
///
/// # Arguments
///
/// * `query` - The raw query string without the leading `?`
///
/// # Returns
///
/// Every `(name, value)` pair in the order it appeared
pub fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Percent-decode a single path segment value. `+` is kept literally.
///
/// # Returns
///
/// The decoded value, or `None` when the decoded bytes are not UTF-8
pub fn decode_path_segment(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(Cow::into_owned)
}
