use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::CodecError;
use crate::types::Value;

use super::FieldMapper;

pub(super) fn encode<T: Serialize + ?Sized>(
    mapper: FieldMapper,
    record: &T,
    fields: &[&str],
) -> Result<(Vec<String>, Vec<Value>), CodecError> {
    let JsonValue::Object(map) = serde_json::to_value(record)? else {
        return Err(CodecError::NotARecord);
    };

    let mut columns = Vec::with_capacity(map.len());
    let mut values = Vec::with_capacity(map.len());
    for (field, value) in map {
        let column = mapper.column_name(&field);
        if !fields.is_empty() && !fields.contains(&column.as_str()) {
            continue;
        }
        columns.push(column);
        values.push(Value::from_json(value));
    }

    if let Some(unknown) = fields.iter().find(|f| !columns.iter().any(|c| c == *f)) {
        return Err(CodecError::UnknownField((*unknown).to_owned()));
    }
    Ok((columns, values))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;
    use crate::args;
    use crate::encoding::NameConvention;

    #[derive(Serialize)]
    struct Account {
        #[serde(rename = "ID")]
        id: i64,
        #[serde(rename = "Email")]
        email: String,
        nickname: Option<String>,
    }

    fn account() -> Account {
        Account {
            id: 9,
            email: "a@b.c".into(),
            nickname: None,
        }
    }

    #[test]
    fn fields_keep_declaration_order_and_are_lowercased() {
        let (columns, values) = encode(FieldMapper::default(), &account(), &[]).unwrap();
        assert_eq!(columns, ["id", "email", "nickname"]);
        assert_eq!(values, args![9, "a@b.c", Value::Null]);
    }

    #[test]
    fn exact_mapper_keeps_names() {
        let (columns, _) =
            encode(FieldMapper::new(NameConvention::Exact), &account(), &[]).unwrap();
        assert_eq!(columns, ["ID", "Email", "nickname"]);
    }

    #[test]
    fn field_filter_selects_subset() {
        let (columns, values) = encode(FieldMapper::default(), &account(), &["email"]).unwrap();
        assert_eq!(columns, ["email"]);
        assert_eq!(values, args!["a@b.c"]);
    }

    #[test]
    fn unknown_filter_field_is_an_error() {
        let err = encode(FieldMapper::default(), &account(), &["missing"]).unwrap_err();
        assert_eq!(err, CodecError::UnknownField("missing".into()));
    }

    #[test]
    fn maps_are_records_too() {
        let record = BTreeMap::from([("b", 2), ("a", 1)]);
        let (columns, values) = encode(FieldMapper::default(), &record, &[]).unwrap();
        assert_eq!(columns, ["a", "b"]);
        assert_eq!(values, args![1, 2]);
    }

    #[test]
    fn scalars_are_not_records() {
        assert_eq!(
            encode(FieldMapper::default(), &5, &[]).unwrap_err(),
            CodecError::NotARecord
        );
    }
}
