//! Binary wire form of schemas.
//!
//! Per schema: `<tag:1><name:UTF><variant payload>[<key payload>]`. The
//! high bit of the tag marks a key-carrying variant. The key payload is a
//! uvarint field count followed by that many UTF field paths; a count of
//! zero is the ordinal-hash-key sentinel.

use crate::error::{Error, Result};
use crate::memory::{read_utf, read_uvarint, read_uvarint_len, write_utf, write_uvarint};
use crate::schema::{
    FieldType, HashKey, ListSchema, MapSchema, ObjectSchema, RecordKey, Schema, SchemaField,
    SchemaSet, SetSchema,
};

const TAG_OBJECT: u8 = 0x00;
const TAG_LIST: u8 = 0x01;
const TAG_SET: u8 = 0x02;
const TAG_MAP: u8 = 0x03;
const KEY_BIT: u8 = 0x80;

const FIELD_BOOL: u8 = 0;
const FIELD_INT: u8 = 1;
const FIELD_LONG: u8 = 2;
const FIELD_FLOAT: u8 = 3;
const FIELD_DOUBLE: u8 = 4;
const FIELD_STRING: u8 = 5;
const FIELD_BYTES: u8 = 6;
const FIELD_REFERENCE: u8 = 7;

/// Append one schema's wire form.
pub fn write_schema(out: &mut Vec<u8>, schema: &Schema) {
    match schema {
        Schema::Object(s) => {
            out.push(TAG_OBJECT | if s.primary_key.is_some() { KEY_BIT } else { 0 });
            write_utf(out, &s.name);
            write_uvarint(out, s.fields.len() as u64);
            for field in &s.fields {
                write_utf(out, &field.name);
                match &field.field_type {
                    FieldType::Bool => out.push(FIELD_BOOL),
                    FieldType::Int => out.push(FIELD_INT),
                    FieldType::Long => out.push(FIELD_LONG),
                    FieldType::Float => out.push(FIELD_FLOAT),
                    FieldType::Double => out.push(FIELD_DOUBLE),
                    FieldType::String => out.push(FIELD_STRING),
                    FieldType::Bytes => out.push(FIELD_BYTES),
                    FieldType::Reference(target) => {
                        out.push(FIELD_REFERENCE);
                        write_utf(out, target);
                    }
                }
            }
            if let Some(pk) = &s.primary_key {
                write_key_paths(out, &pk.field_paths);
            }
        }
        Schema::List(s) => {
            out.push(TAG_LIST);
            write_utf(out, &s.name);
            write_utf(out, &s.element_type);
        }
        Schema::Set(s) => {
            out.push(TAG_SET | if s.hash_key.is_some() { KEY_BIT } else { 0 });
            write_utf(out, &s.name);
            write_utf(out, &s.element_type);
            write_hash_key(out, &s.hash_key);
        }
        Schema::Map(s) => {
            out.push(TAG_MAP | if s.hash_key.is_some() { KEY_BIT } else { 0 });
            write_utf(out, &s.name);
            write_utf(out, &s.key_type);
            write_utf(out, &s.value_type);
            write_hash_key(out, &s.hash_key);
        }
    }
}

fn write_key_paths(out: &mut Vec<u8>, paths: &[String]) {
    write_uvarint(out, paths.len() as u64);
    for path in paths {
        write_utf(out, path);
    }
}

fn write_hash_key(out: &mut Vec<u8>, key: &Option<HashKey>) {
    match key {
        None => {}
        Some(HashKey::Ordinal) => write_uvarint(out, 0),
        Some(HashKey::Fields(k)) => write_key_paths(out, &k.field_paths),
    }
}

/// Read one schema, advancing `input`.
pub fn read_schema(input: &mut &[u8]) -> Result<Schema> {
    let (&tag, rest) = input
        .split_first()
        .ok_or_else(|| Error::truncated("schema tag"))?;
    *input = rest;
    let has_key = tag & KEY_BIT != 0;
    let name = read_utf(input)?;

    match tag & !KEY_BIT {
        TAG_OBJECT => {
            let field_count = read_uvarint_len(input)?;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                let field_name = read_utf(input)?;
                let field_type = read_field_type(input)?;
                fields.push(SchemaField::new(field_name, field_type));
            }
            let primary_key = if has_key {
                let paths = read_key_paths(input)?;
                if paths.is_empty() {
                    return Err(Error::malformed_schema(format!(
                        "object '{name}' primary key has zero fields"
                    )));
                }
                Some(RecordKey { field_paths: paths })
            } else {
                None
            };
            Ok(Schema::Object(ObjectSchema {
                name,
                fields,
                primary_key,
            }))
        }
        TAG_LIST => {
            let element_type = read_utf(input)?;
            Ok(Schema::List(ListSchema { name, element_type }))
        }
        TAG_SET => {
            let element_type = read_utf(input)?;
            let hash_key = read_hash_key(input, has_key)?;
            Ok(Schema::Set(SetSchema {
                name,
                element_type,
                hash_key,
            }))
        }
        TAG_MAP => {
            let key_type = read_utf(input)?;
            let value_type = read_utf(input)?;
            let hash_key = read_hash_key(input, has_key)?;
            Ok(Schema::Map(MapSchema {
                name,
                key_type,
                value_type,
                hash_key,
            }))
        }
        other => Err(Error::malformed_schema(format!(
            "unknown schema tag 0x{other:02x}"
        ))),
    }
}

fn read_field_type(input: &mut &[u8]) -> Result<FieldType> {
    let (&tag, rest) = input
        .split_first()
        .ok_or_else(|| Error::truncated("field type tag"))?;
    *input = rest;
    Ok(match tag {
        FIELD_BOOL => FieldType::Bool,
        FIELD_INT => FieldType::Int,
        FIELD_LONG => FieldType::Long,
        FIELD_FLOAT => FieldType::Float,
        FIELD_DOUBLE => FieldType::Double,
        FIELD_STRING => FieldType::String,
        FIELD_BYTES => FieldType::Bytes,
        FIELD_REFERENCE => FieldType::Reference(read_utf(input)?),
        other => {
            return Err(Error::malformed_schema(format!(
                "unknown field type tag 0x{other:02x}"
            )))
        }
    })
}

fn read_key_paths(input: &mut &[u8]) -> Result<Vec<String>> {
    let count = read_uvarint(input)?;
    let mut paths = Vec::with_capacity(count as usize);
    for _ in 0..count {
        paths.push(read_utf(input)?);
    }
    Ok(paths)
}

fn read_hash_key(input: &mut &[u8], has_key: bool) -> Result<Option<HashKey>> {
    if !has_key {
        return Ok(None);
    }
    let paths = read_key_paths(input)?;
    if paths.is_empty() {
        Ok(Some(HashKey::Ordinal))
    } else {
        Ok(Some(HashKey::Fields(RecordKey { field_paths: paths })))
    }
}

/// Append the schema header: `<typeCount:uvarint>` then each schema in
/// insertion order.
pub fn write_schema_set(out: &mut Vec<u8>, set: &SchemaSet) {
    write_uvarint(out, set.len() as u64);
    for schema in set.iter() {
        write_schema(out, schema);
    }
}

/// Read a schema header into a validated [`SchemaSet`].
pub fn read_schema_set(input: &mut &[u8]) -> Result<SchemaSet> {
    let count = read_uvarint_len(input)?;
    let mut schemas = Vec::with_capacity(count);
    for _ in 0..count {
        schemas.push(read_schema(input)?);
    }
    SchemaSet::new(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_set() -> SchemaSet {
        SchemaSet::new(vec![
            Schema::keyed_object(
                "Movie",
                [
                    SchemaField::new("id", FieldType::Int),
                    SchemaField::new("title", FieldType::String),
                    SchemaField::new("score", FieldType::Double),
                ],
                RecordKey::new(["id"]),
            ),
            Schema::object(
                "Cast",
                [SchemaField::new("movie", FieldType::Reference("Movie".into()))],
            ),
            Schema::list("MovieList", "Movie"),
            Schema::set(
                "MovieSet",
                "Movie",
                Some(HashKey::Fields(RecordKey::new(["id"]))),
            ),
            Schema::map("ByTitle", "Movie", "Cast", Some(HashKey::Ordinal)),
            Schema::set("PlainSet", "Cast", None),
        ])
        .unwrap()
    }

    #[test]
    fn schema_set_roundtrip() {
        let set = full_set();
        let mut buf = Vec::new();
        write_schema_set(&mut buf, &set);
        let mut slice = buf.as_slice();
        let back = read_schema_set(&mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(back, set);
    }

    #[test]
    fn key_bit_drives_tag() {
        let mut buf = Vec::new();
        write_schema(
            &mut buf,
            &Schema::set(
                "S",
                "E",
                Some(HashKey::Fields(RecordKey::new(["x"]))),
            ),
        );
        assert_eq!(buf[0], 0x82);
        buf.clear();
        write_schema(&mut buf, &Schema::set("S", "E", None));
        assert_eq!(buf[0], 0x02);
    }

    #[test]
    fn ordinal_sentinel_is_zero_field_count() {
        let mut buf = Vec::new();
        write_schema(&mut buf, &Schema::map("M", "K", "V", Some(HashKey::Ordinal)));
        let mut slice = buf.as_slice();
        let back = read_schema(&mut slice).unwrap();
        match back {
            Schema::Map(m) => assert_eq!(m.hash_key, Some(HashKey::Ordinal)),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut buf = vec![0x07u8];
        write_utf(&mut buf, "X");
        let mut slice = buf.as_slice();
        let err = read_schema(&mut slice).unwrap_err();
        assert!(matches!(err, Error::MalformedSchema(_)));
    }

    #[test]
    fn truncated_schema_rejected() {
        let mut buf = Vec::new();
        write_schema(
            &mut buf,
            &Schema::object("A", [SchemaField::new("x", FieldType::Long)]),
        );
        let mut slice = &buf[..buf.len() - 1];
        assert!(read_schema(&mut slice).is_err());
    }
}
