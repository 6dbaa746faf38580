//! `multipart/form-data` parsing
//!
//! The whole body is already buffered, so parts are sliced out of it directly:
//! each part between two boundary delimiters carries a header block and its
//! content. Parts with a `filename` keep their raw bytes; other parts are text.

use super::fields::{FieldMap, FieldValue};
use crate::error::BindError;

/// Extract the `boundary` parameter of a multipart Content-Type
pub fn boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then_some(value)
        } else {
            None
        }
    })
}

/// Parse a multipart body into a field map. A repeated field name keeps its last part.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<FieldMap, BindError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let start = find_delimiter(body, delimiter)
        .ok_or_else(|| malformed("opening boundary not found"))?;
    let mut pos = start + delimiter.len();
    let mut fields = FieldMap::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(fields);
        }
        let rest = strip_line_break(rest)
            .ok_or_else(|| malformed("expected line break after boundary"))?;
        let offset = body.len() - rest.len();

        let (end, next) = next_delimiter(rest, delimiter)
            .ok_or_else(|| malformed("closing boundary not found"))?;
        if let Some((name, value)) = parse_part(&rest[..end])? {
            fields.insert(name, value);
        }
        pos = offset + next;
    }
}

fn malformed(reason: &str) -> BindError {
    BindError::MalformedMultipart(reason.to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Position of the next delimiter line: the delimiter must open a line and be
/// followed by a line break, the closing `--` or the end of the body.
fn find_delimiter(bytes: &[u8], delimiter: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = find(&bytes[from..], delimiter) {
        let at = from + found;
        let opens_line = at == 0 || bytes[at - 1] == b'\n';
        let after = &bytes[at + delimiter.len()..];
        let closes_line = after.is_empty()
            || after.starts_with(b"--")
            || after.starts_with(b"\r\n")
            || after.starts_with(b"\n");
        if opens_line && closes_line {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn strip_line_break(bytes: &[u8]) -> Option<&[u8]> {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
}

/// Locate the line break + delimiter ending the current part.
/// Returns (end of part content, position just after the delimiter).
fn next_delimiter(bytes: &[u8], delimiter: &[u8]) -> Option<(usize, usize)> {
    let at = find_delimiter(bytes, delimiter)?;
    let end = if bytes[..at].ends_with(b"\r\n") {
        at - 2
    } else if bytes[..at].ends_with(b"\n") {
        at - 1
    } else {
        at
    };
    Some((end, at + delimiter.len()))
}

fn parse_part(part: &[u8]) -> Result<Option<(String, FieldValue)>, BindError> {
    let (head, content) = if let Some(at) = find(part, b"\r\n\r\n") {
        (&part[..at], &part[at + 4..])
    } else if let Some(at) = find(part, b"\n\n") {
        (&part[..at], &part[at + 2..])
    } else {
        return Err(malformed("part without header block"));
    };

    let head = String::from_utf8_lossy(head);
    let Some(disposition) = head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then(|| value.trim().to_string())
    }) else {
        return Err(malformed("part without Content-Disposition"));
    };

    let Some(name) = disposition_param(&disposition, "name") else {
        return Ok(None);
    };
    let value = if disposition_param(&disposition, "filename").is_some() {
        FieldValue::Bytes(content.to_vec())
    } else {
        FieldValue::Text(String::from_utf8_lossy(content).into_owned())
    };
    Ok(Some((name, value)))
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case(key)
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----rivet7MA4YWxk";

    fn body(parts: &[&str]) -> Vec<u8> {
        let mut out = String::new();
        for part in parts {
            out.push_str(&format!("--{BOUNDARY}\r\n{part}\r\n"));
        }
        out.push_str(&format!("--{BOUNDARY}--\r\n"));
        out.into_bytes()
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=abc123"),
            Some("abc123")
        );
        assert_eq!(
            boundary("multipart/form-data; charset=utf-8; Boundary=\"quoted\""),
            Some("quoted")
        );
        assert_eq!(boundary("multipart/form-data"), None);
        assert_eq!(boundary("multipart/form-data; boundary="), None);
    }

    #[test]
    fn test_text_and_file_parts() {
        let raw = body(&[
            "Content-Disposition: form-data; name=\"title\"\r\n\r\nMy post",
            "Content-Disposition: form-data; name=\"content\"\r\n\r\nline one\r\nline two",
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\x01\x02\x03",
        ]);

        let fields = parse_multipart(&raw, BOUNDARY).unwrap();
        assert_eq!(fields["title"], FieldValue::Text("My post".to_string()));
        assert_eq!(
            fields["content"],
            FieldValue::Text("line one\r\nline two".to_string())
        );
        assert_eq!(fields["file"], FieldValue::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_part_without_name_is_skipped() {
        let raw = body(&[
            "Content-Disposition: form-data\r\n\r\norphan",
            "content-disposition: form-data; name=title\r\n\r\nkept",
        ]);

        let fields = parse_multipart(&raw, BOUNDARY).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["title"], FieldValue::Text("kept".to_string()));
    }

    #[test]
    fn test_boundary_text_inside_a_value_does_not_split_it() {
        let inline = format!(
            "Content-Disposition: form-data; name=\"note\"\r\n\r\nsee --{BOUNDARY} here"
        );
        let prefixed = format!(
            "Content-Disposition: form-data; name=\"log\"\r\n\r\nfirst\r\n--{BOUNDARY}-ish line"
        );
        let raw = body(&[inline.as_str(), prefixed.as_str()]);

        let fields = parse_multipart(&raw, BOUNDARY).unwrap();
        assert_eq!(
            fields["note"],
            FieldValue::Text(format!("see --{BOUNDARY} here"))
        );
        assert_eq!(
            fields["log"],
            FieldValue::Text(format!("first\r\n--{BOUNDARY}-ish line"))
        );
    }

    #[test]
    fn test_preamble_before_first_boundary() {
        let raw = format!(
            "preamble --{BOUNDARY} text\r\n--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--{BOUNDARY}--\r\n"
        );
        let fields = parse_multipart(raw.as_bytes(), BOUNDARY).unwrap();
        assert_eq!(fields["a"], FieldValue::Text("1".to_string()));
    }

    #[test]
    fn test_empty_form() {
        let raw = format!("--{BOUNDARY}--\r\n");
        assert!(parse_multipart(raw.as_bytes(), BOUNDARY).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            parse_multipart(b"no boundary here", BOUNDARY),
            Err(BindError::MalformedMultipart(_))
        ));

        let unterminated = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue"
        );
        assert!(parse_multipart(unterminated.as_bytes(), BOUNDARY).is_err());

        let headless = body(&["just content"]);
        assert!(parse_multipart(&headless, BOUNDARY).is_err());
    }
}
