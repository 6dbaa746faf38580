//! Field-map decoding
//!
//! Query strings, URL-encoded forms and multipart forms all produce a flat
//! map of field name to text or bytes. This module feeds such a map into any
//! `Deserialize` DTO: each declared field picks up the value under its name
//! and converts it to the field's scalar type. Fields absent from the map are
//! left to serde (`Option` becomes `None`, `#[serde(default)]` applies).

use std::collections::BTreeMap;

use serde::de::value::{SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::BindError;

/// Raw value of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Text view; bytes are decoded as UTF-8 with invalid sequences replaced
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

pub type FieldMap = BTreeMap<String, FieldValue>;

/// Deserialize a DTO from a field map
pub fn from_fields<T: DeserializeOwned>(fields: FieldMap) -> Result<T, BindError> {
    T::deserialize(FieldsDeserializer { fields })
}

/// Deserialize a single value, `name` is used in error messages
pub fn from_value<T: DeserializeOwned>(name: &str, value: FieldValue) -> Result<T, BindError> {
    T::deserialize(ValueDeserializer {
        name: name.to_string(),
        value,
    })
}

struct FieldsDeserializer {
    fields: FieldMap,
}

impl<'de> de::Deserializer<'de> for FieldsDeserializer {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_map(FieldsAccess {
            iter: self.fields.into_iter(),
            pending: None,
        })
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct enum
        identifier ignored_any
    }
}

struct FieldsAccess {
    iter: std::collections::btree_map::IntoIter<String, FieldValue>,
    pending: Option<(String, FieldValue)>,
}

impl<'de> MapAccess<'de> for FieldsAccess {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, BindError> {
        match self.iter.next() {
            Some((name, value)) => {
                let key: StringDeserializer<BindError> = name.clone().into_deserializer();
                self.pending = Some((name, value));
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value, BindError> {
        let (name, value) = self
            .pending
            .take()
            .ok_or_else(|| BindError::Deserialize("value requested before key".to_string()))?;
        seed.deserialize(ValueDeserializer { name, value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct ValueDeserializer {
    name: String,
    value: FieldValue,
}

impl ValueDeserializer {
    fn parse<T: std::str::FromStr>(self, expected: &'static str) -> Result<T, BindError> {
        let text = self.value.into_text();
        text.parse::<T>().map_err(|_| BindError::InvalidValue {
            name: self.name,
            value: text,
            expected,
        })
    }

    fn unsupported(self) -> BindError {
        BindError::UnsupportedParameterType(self.name)
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident: $ty:ty,)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
                visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            FieldValue::Text(text) => visitor.visit_string(text),
            FieldValue::Bytes(bytes) => visitor.visit_byte_buf(bytes),
        }
    }

    /// Lenient boolean: `true` in any case is true, anything else is false
    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_bool(self.value.into_text().eq_ignore_ascii_case("true"))
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_i128 => visit_i128: i128,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_u128 => visit_u128: u128,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
        deserialize_char => visit_char: char,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.value.into_text())
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.value.into_text())
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            FieldValue::Text(text) => visitor.visit_byte_buf(text.into_bytes()),
            FieldValue::Bytes(bytes) => visitor.visit_byte_buf(bytes),
        }
    }

    /// An empty value counts as absent
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let empty = match &self.value {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Bytes(bytes) => bytes.is_empty(),
        };
        if empty {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    /// Only file content (`Vec<u8>`) binds to a sequence
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            FieldValue::Bytes(bytes) => {
                de::Deserializer::deserialize_any(
                    SeqDeserializer::<_, BindError>::new(bytes.into_iter()),
                    visitor,
                )
            }
            FieldValue::Text(_) => Err(self.unsupported()),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported())
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, BindError> {
        Err(self.unsupported())
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported())
    }

    /// Unit variants only, selected by name
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let variant: StringDeserializer<BindError> = self.value.into_text().into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::Text((*v).to_string())))
            .collect()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Order {
        Asc,
        Desc,
    }

    #[derive(Debug, Deserialize)]
    struct Search {
        id: i64,
        ratio: f32,
        published: bool,
        title: String,
        page: Option<u32>,
        order: Option<Order>,
    }

    #[test]
    fn test_scalar_fields_are_converted() {
        let search: Search = from_fields(fields(&[
            ("id", "7"),
            ("ratio", "0.5"),
            ("published", "TRUE"),
            ("title", "hello world"),
            ("order", "desc"),
            ("unknown", "ignored"),
        ]))
        .unwrap();

        assert_eq!(search.id, 7);
        assert!((search.ratio - 0.5).abs() < f32::EPSILON);
        assert!(search.published);
        assert_eq!(search.title, "hello world");
        assert_eq!(search.page, None);
        assert_eq!(search.order, Some(Order::Desc));
    }

    #[test]
    fn test_bool_is_lenient() {
        #[derive(Deserialize)]
        struct Flag {
            flag: bool,
        }

        let flag: Flag = from_fields(fields(&[("flag", "yes")])).unwrap();
        assert!(!flag.flag);
        let flag: Flag = from_fields(fields(&[("flag", "")])).unwrap();
        assert!(!flag.flag);
    }

    #[test]
    fn test_invalid_number_names_the_field() {
        #[derive(Debug, Deserialize)]
        struct ById {
            #[allow(dead_code)]
            id: i32,
        }

        let err = from_fields::<ById>(fields(&[("id", "seven")])).unwrap_err();
        match err {
            BindError::InvalidValue {
                name,
                value,
                expected,
            } => {
                assert_eq!(name, "id");
                assert_eq!(value, "seven");
                assert_eq!(expected, "i32");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_is_none_for_option() {
        let search: Search = from_fields(fields(&[
            ("id", "1"),
            ("ratio", "1"),
            ("published", "false"),
            ("title", ""),
            ("page", ""),
        ]))
        .unwrap();
        assert_eq!(search.title, "");
        assert_eq!(search.page, None);
    }

    #[test]
    fn test_bytes_bind_to_string_and_vec() {
        #[derive(Deserialize)]
        struct Upload {
            name: String,
            data: Vec<u8>,
        }

        let mut map = FieldMap::new();
        map.insert("name".to_string(), FieldValue::Bytes(b"notes.txt".to_vec()));
        map.insert("data".to_string(), FieldValue::Bytes(vec![0, 159, 146, 150]));

        let upload: Upload = from_fields(map).unwrap();
        assert_eq!(upload.name, "notes.txt");
        assert_eq!(upload.data, vec![0, 159, 146, 150]);
    }

    #[test]
    fn test_nested_struct_field_is_unsupported() {
        #[derive(Debug, Deserialize)]
        struct Inner {
            #[allow(dead_code)]
            x: i32,
        }
        #[derive(Debug, Deserialize)]
        struct Outer {
            #[allow(dead_code)]
            inner: Inner,
        }

        let err = from_fields::<Outer>(fields(&[("inner", "1")])).unwrap_err();
        assert!(matches!(err, BindError::UnsupportedParameterType(ref name) if name == "inner"));
    }

    #[test]
    fn test_missing_required_field() {
        let err = from_fields::<Search>(fields(&[("id", "1")])).unwrap_err();
        assert!(matches!(err, BindError::Deserialize(_)));
    }

    #[test]
    fn test_single_value() {
        let value: u64 = from_value("id", FieldValue::Text("42".to_string())).unwrap();
        assert_eq!(value, 42);
        let text: String = from_value("body", FieldValue::Bytes(b"raw".to_vec())).unwrap();
        assert_eq!(text, "raw");
    }
}
