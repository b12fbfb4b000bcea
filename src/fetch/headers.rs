//! Response metadata parsing: `Content-Type` and `Content-Disposition`.
//!
//! Filename precedence:
//! 1. `filename*=` (RFC 5987, `charset'lang'percent-encoded`)
//! 2. `filename=` (quoted or bare)
//!
//! Both candidates are percent-decoded; a decoding failure keeps the raw
//! candidate. Parsing never fails, it only yields `None`.

use std::borrow::Cow;

/// Extracts the media type from a `Content-Type` value.
///
/// Parameters are dropped and the result is lowercased; an empty type yields `None`.
#[must_use]
pub fn media_type_of(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    (!mime.is_empty()).then_some(mime)
}

/// Parses a `Content-Disposition` header and returns the announced filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example%20file.pdf`
///
/// Directory components are stripped from the result.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for param in split_params(header) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended(value.trim()),
            "filename" => plain = Some(percent_decode_or_raw(&unquote(value.trim())).into_owned()),
            _ => {}
        }
    }

    extended
        .filter(|name| !name.trim().is_empty())
        .or(plain)
        .map(|name| base_name(&name).trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Splits header parameters on `;`, ignoring separators inside quotes.
fn split_params(header: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (index, ch) in header.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&header[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    params.push(&header[start..]);
    params
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decodes `charset'lang'value`; falls back to the raw value on any problem.
fn decode_extended(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let mut parts = value.splitn(3, '\'');
    let (charset, encoded) = match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_lang), Some(encoded)) => (charset, encoded),
        _ => ("utf-8", value),
    };
    if encoded.is_empty() {
        return None;
    }

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    let decoded = if charset.eq_ignore_ascii_case("iso-8859-1") {
        bytes.iter().map(|&b| char::from(b)).collect()
    } else {
        String::from_utf8(bytes.into_owned()).unwrap_or_else(|_| encoded.to_string())
    };
    Some(decoded)
}

fn percent_decode_or_raw(candidate: &str) -> Cow<'_, str> {
    if !candidate.contains('%') {
        return Cow::Borrowed(candidate);
    }
    urlencoding::decode(candidate).unwrap_or(Cow::Borrowed(candidate))
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
