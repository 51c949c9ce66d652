//! Content-Type classification.
//!
//! Decides whether a response body can be surfaced as text. The decision is
//! advisory only: a non-text body is still returned, the caller just warns.

use std::collections::BTreeMap;

/// Charsets accepted for a text body. Compared case-insensitively.
const TEXT_CHARSETS: &[&str] = &["utf-8", "us-ascii"];

/// A parsed media type: lowercased `type/subtype` plus lowercased parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub essence: String,
    pub params: BTreeMap<String, String>,
}

/// Returns true when the Content-Type header value denotes UTF-8 compatible text.
///
/// Unparsable input is not text.
pub fn is_text_content_type(content_type: &str) -> bool {
    let Some(media) = parse_media_type(content_type) else {
        return false;
    };

    if !is_text_essence(&media.essence) {
        return false;
    }

    match media.params.get("charset") {
        None => true,
        Some(charset) => {
            let charset = charset.to_ascii_lowercase();
            charset.is_empty() || TEXT_CHARSETS.contains(&charset.as_str())
        }
    }
}

fn is_text_essence(essence: &str) -> bool {
    if let Some(subtype) = essence.strip_prefix("text/") {
        return !subtype.is_empty();
    }
    essence == "application/json" || essence.starts_with("application/samlmetadata+xml")
}

/// Parses `type/subtype; name=value; name="quoted value"`.
///
/// Returns `None` for anything that is not a well-formed media type,
/// including duplicate parameter names.
pub fn parse_media_type(value: &str) -> Option<MediaType> {
    let mut segments = value.split(';');
    let essence = segments.next()?.trim().to_ascii_lowercase();

    let (kind, subtype) = essence.split_once('/')?;
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }

    let mut params = BTreeMap::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, raw) = segment.split_once('=')?;
        let name = name.trim().to_ascii_lowercase();
        if !is_token(&name) {
            return None;
        }
        let value = parse_param_value(raw.trim())?;
        if params.insert(name, value).is_some() {
            return None;
        }
    }

    Some(MediaType { essence, params })
}

fn parse_param_value(raw: &str) -> Option<String> {
    let Some(quoted) = raw.strip_prefix('"') else {
        return is_token(raw).then(|| raw.to_string());
    };
    let inner = quoted.strip_suffix('"')?;

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            '"' => return None,
            c => value.push(c),
        }
    }
    Some(value)
}

/// RFC 7230 token.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}
