//! Response header folding.

use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Separator used when combining repeated header fields.
pub const FOLD_SEPARATOR: &str = ", ";

/// Joins every header's values with `", "`, keeping the order they were received in.
pub fn fold_headers<I, V>(headers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, V)>,
    V: IntoIterator<Item = String>,
{
    headers
        .into_iter()
        .map(|(name, values)| {
            let values: Vec<String> = values.into_iter().collect();
            (name, values.join(FOLD_SEPARATOR))
        })
        .collect()
}

/// Folds a `reqwest` header map, rendering names in canonical form.
///
/// Values that are not valid UTF-8 are decoded lossily.
pub fn fold_header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let grouped = headers.keys().map(|name| {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>();
        (canonical_header_name(name.as_str()), values)
    });
    fold_headers(grouped)
}

/// `x-forwarded-for` -> `X-Forwarded-For`.
///
/// Names containing anything other than token characters are returned as-is.
pub fn canonical_header_name(name: &str) -> String {
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
    {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}
