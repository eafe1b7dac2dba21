//! Row codec: converts serializable records into insert/update columns and decodes result
//! rows into Rust values with `serde`.
//!
//! Field names go through a [`FieldMapper`] (lowercase by default), so a struct field `Name`
//! maps to column `name`. `#[serde(rename = "...")]` plays the role of a column tag.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use sqlkit::encoding::Encoder;
//! use sqlkit::prelude::*;
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let encoder = Encoder::default();
//! let (columns, values) = encoder.encode(&User { id: 1, name: "a".into() }, &[]).unwrap();
//! assert_eq!(columns, ["id", "name"]);
//! assert_eq!(values, args![1, "a"]);
//!
//! let mut rs = ResultSet::new(columns);
//! rs.add_row_values(values);
//! let user: User = encoder.decode_one(&rs).unwrap();
//! assert_eq!(user, User { id: 1, name: "a".into() });
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::results::{ResultSet, Row};
use crate::types::Value;

mod decode;
mod encode;

/// How record field names translate to column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameConvention {
    /// `UserName` -> `username`
    #[default]
    Lowercase,
    /// Field names are used verbatim.
    Exact,
}

/// Maps record field names to column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldMapper {
    convention: NameConvention,
}

impl FieldMapper {
    #[must_use]
    pub fn new(convention: NameConvention) -> Self {
        FieldMapper { convention }
    }

    #[must_use]
    pub fn convention(&self) -> NameConvention {
        self.convention
    }

    /// Column name for a record field.
    #[must_use]
    pub fn column_name(&self, field: &str) -> String {
        match self.convention {
            NameConvention::Lowercase => field.to_lowercase(),
            NameConvention::Exact => field.to_owned(),
        }
    }
}

/// Converts records to columns and rows to records.
///
/// By default a result column with no matching struct field is an error; a lenient encoder
/// discards such columns instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encoder {
    mapper: FieldMapper,
    lenient: bool,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore result columns that have no destination field.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    #[must_use]
    pub fn mapper(&self) -> FieldMapper {
        self.mapper
    }

    #[must_use]
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Flatten a record into parallel column and value lists, in field declaration order.
    ///
    /// A non-empty `fields` restricts the output to those column names.
    ///
    /// # Errors
    /// [`CodecError::NotARecord`] when `record` does not serialize to a map of fields;
    /// [`CodecError::UnknownField`] when `fields` names a column the record does not have.
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        record: &T,
        fields: &[&str],
    ) -> Result<(Vec<String>, Vec<Value>), CodecError> {
        encode::encode(self.mapper, record, fields)
    }

    /// Decode a single row.
    ///
    /// # Errors
    /// See [`Encoder::decode_all`].
    pub fn decode_row<T: DeserializeOwned>(&self, row: &Row) -> Result<T, CodecError> {
        T::deserialize(decode::RowDeserializer::new(self, row.column_names(), row.values()))
    }

    /// Decode the first row of a result set.
    ///
    /// # Errors
    /// [`CodecError::NoRows`] for an empty result set, otherwise as [`Encoder::decode_all`].
    pub fn decode_one<T: DeserializeOwned>(&self, rows: &ResultSet) -> Result<T, CodecError> {
        let row = rows.rows().first().ok_or(CodecError::NoRows)?;
        self.decode_row(row)
    }

    /// Decode every row of a result set.
    ///
    /// # Errors
    /// [`CodecError::TooManyColumns`] when a scalar destination meets a multi-column row;
    /// [`CodecError::MissingDestination`] when a struct has no field for a column (unless
    /// lenient); [`CodecError::Message`] for type mismatches.
    pub fn decode_all<T: DeserializeOwned>(&self, rows: &ResultSet) -> Result<Vec<T>, CodecError> {
        rows.rows().iter().map(|row| self.decode_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_is_default() {
        assert_eq!(FieldMapper::default().column_name("UserName"), "username");
        assert_eq!(
            FieldMapper::new(NameConvention::Exact).column_name("UserName"),
            "UserName"
        );
    }
}
