//! Request body parsing
//!
//! The Content-Type selects one strategy; its media type (before any `;`
//! parameters) is matched case-insensitively.

use serde::de::DeserializeOwned;

use super::fields::{from_fields, from_value, FieldMap, FieldValue};
use super::multipart;
use super::query::parse_pairs;
use crate::error::BindError;

/// Body encodings understood by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    FormData,
    UrlEncoded,
    Text,
    Binary,
    GraphQl,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media.as_str() {
            "application/json" => Some(Self::Json),
            "multipart/form-data" => Some(Self::FormData),
            "application/x-www-form-urlencoded" => Some(Self::UrlEncoded),
            "text/plain" => Some(Self::Text),
            "application/octet-stream" => Some(Self::Binary),
            "application/graphql" => Some(Self::GraphQl),
            _ => None,
        }
    }
}

/// A body parsed according to its Content-Type
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody<'a> {
    Json(&'a [u8]),
    Fields(FieldMap),
    Text(String),
    Binary(&'a [u8]),
}

/// Parse a raw body. A missing or unknown Content-Type is rejected.
pub fn parse_body<'a>(
    content_type: Option<&str>,
    body: &'a [u8],
) -> Result<ParsedBody<'a>, BindError> {
    let kind = content_type
        .and_then(ContentKind::from_content_type)
        .ok_or_else(|| BindError::UnsupportedContentType(content_type.map(str::to_string)))?;

    match kind {
        ContentKind::Json => Ok(ParsedBody::Json(body)),
        ContentKind::FormData => {
            let boundary = content_type
                .and_then(multipart::boundary)
                .ok_or(BindError::MissingBoundary)?;
            Ok(ParsedBody::Fields(multipart::parse_multipart(body, boundary)?))
        }
        ContentKind::UrlEncoded => Ok(ParsedBody::Fields(parse_pairs(body))),
        ContentKind::Text | ContentKind::GraphQl => Ok(ParsedBody::Text(
            String::from_utf8_lossy(body).into_owned(),
        )),
        ContentKind::Binary => Ok(ParsedBody::Binary(body)),
    }
}

/// Deserialize a parsed body into the destination type.
///
/// JSON goes straight through `serde_json`; forms map field by name; text
/// and binary payloads bind to a `String` or `Vec<u8>` destination.
pub fn decode<T: DeserializeOwned>(body: ParsedBody<'_>) -> Result<T, BindError> {
    match body {
        ParsedBody::Json(bytes) => Ok(serde_json::from_slice(bytes)?),
        ParsedBody::Fields(fields) => from_fields(fields),
        ParsedBody::Text(text) => from_value("body", FieldValue::Text(text)),
        ParsedBody::Binary(bytes) => from_value("body", FieldValue::Bytes(bytes.to_vec())),
    }
}
