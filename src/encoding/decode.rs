use serde::de::value::BorrowedStrDeserializer;
use serde::de::{DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value as JsonValue};

use crate::error::CodecError;
use crate::types::Value;

use super::Encoder;

/// Deserializer over one result row.
///
/// Structs are filled by column name, scalars from a single-column row, tuples and sequences
/// positionally, and maps keyed by column name.
pub(super) struct RowDeserializer<'a> {
    encoder: &'a Encoder,
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowDeserializer<'a> {
    pub(super) fn new(encoder: &'a Encoder, columns: &'a [String], values: &'a [Value]) -> Self {
        RowDeserializer {
            encoder,
            columns,
            values,
        }
    }

    fn only(&self) -> Result<&'a Value, CodecError> {
        match self.values {
            [value] => Ok(value),
            [] => Err(CodecError::Message("row has no columns".into())),
            many => Err(CodecError::TooManyColumns { found: many.len() }),
        }
    }

    fn single(&self) -> Result<JsonValue, CodecError> {
        self.only().map(Value::to_json)
    }

    fn object(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }

    fn array(&self) -> JsonValue {
        JsonValue::Array(self.values.iter().map(Value::to_json).collect())
    }

    /// Column values keyed by struct field. NULL columns are left out so `Option` and
    /// `#[serde(default)]` fields keep their empty value.
    fn record(
        &self,
        fields: &'static [&'static str],
    ) -> Result<Vec<(&'static str, &'a Value)>, CodecError> {
        let mapper = self.encoder.mapper();
        let mut entries = Vec::with_capacity(self.columns.len());
        for (column, value) in self.columns.iter().zip(self.values) {
            let Some(field) = fields.iter().find(|f| mapper.column_name(f) == *column) else {
                if self.encoder.is_lenient() {
                    continue;
                }
                return Err(CodecError::MissingDestination {
                    column: column.clone(),
                });
            };
            if value.is_null() {
                continue;
            }
            entries.push((*field, value));
        }
        Ok(entries)
    }
}

/// Field-by-field access used for struct destinations.
struct RecordAccess<'a> {
    entries: std::vec::IntoIter<(&'static str, &'a Value)>,
    pending: Option<&'a Value>,
}

impl<'de> MapAccess<'de> for RecordAccess<'_> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let Some((field, value)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(value);
        seed.deserialize(BorrowedStrDeserializer::new(field)).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        match self.pending.take() {
            Some(value) => seed.deserialize(ValueDeserializer(value)),
            None => Err(CodecError::Message("value requested before key".into())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

/// Deserializer over one column value.
///
/// Integers 0 and 1 read as booleans (`SQLite` stores booleans as integers). Everything else
/// goes through the value's JSON form.
struct ValueDeserializer<'a>(&'a Value);

macro_rules! via_json {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.0.to_json().$method(visitor).map_err(CodecError::from)
            }
        )+
    };
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = CodecError;

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Int(0) => visitor.visit_bool(false),
            Value::Int(1) => visitor.visit_bool(true),
            other => other.to_json().deserialize_bool(visitor).map_err(CodecError::from),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0
            .to_json()
            .deserialize_unit_struct(name, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0
            .to_json()
            .deserialize_tuple(len, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0
            .to_json()
            .deserialize_tuple_struct(name, len, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0
            .to_json()
            .deserialize_struct(name, fields, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0
            .to_json()
            .deserialize_enum(name, variants, visitor)
            .map_err(CodecError::from)
    }

    via_json!(
        deserialize_any,
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_i128,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64,
        deserialize_u128,
        deserialize_f32,
        deserialize_f64,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_unit,
        deserialize_seq,
        deserialize_map,
        deserialize_identifier,
        deserialize_ignored_any,
    );
}

macro_rules! scalar {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.single()?.$method(visitor).map_err(CodecError::from)
            }
        )+
    };
}

impl<'de> Deserializer<'de> for RowDeserializer<'_> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let json = if self.values.len() == 1 {
            self.single()?
        } else {
            self.object()
        };
        json.deserialize_any(visitor).map_err(CodecError::from)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        ValueDeserializer(self.only()?).deserialize_bool(visitor)
    }

    scalar!(
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_i128,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64,
        deserialize_u128,
        deserialize_f32,
        deserialize_f64,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_unit,
    );

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.values {
            [Value::Null] => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.array().deserialize_seq(visitor).map_err(CodecError::from)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.array()
            .deserialize_tuple(len, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.array()
            .deserialize_tuple_struct(name, len, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.object().deserialize_map(visitor).map_err(CodecError::from)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(RecordAccess {
            entries: self.record(fields)?.into_iter(),
            pending: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.single()?
            .deserialize_enum(name, variants, visitor)
            .map_err(CodecError::from)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}
