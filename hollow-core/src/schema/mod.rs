//! Typed description of the four record shapes.
//!
//! A dataset is described by a [`SchemaSet`]: named [`Schema`] nodes for
//! object, list, set, and map types. Schemas are created once at data-model
//! initialisation and immutable afterwards; the binary wire form lives in
//! [`wire`].
//!
//! Hash and primary keys are ordered lists of dotted field paths. A path
//! navigates through reference fields and must end on a non-reference leaf
//! in the referenced type. Set and map hash keys may instead be the
//! *ordinal* sentinel ("hash on the element/key ordinal itself"), which is
//! serialised as a key with zero fields.

pub mod wire;

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::fmt;

/// The type of a single object field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    /// A child ordinal in the named type.
    Reference(std::string::String),
}

impl FieldType {
    /// True for every variant except `Reference`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Reference(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => write!(f, "bool"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Float => write!(f, "float"),
            FieldType::Double => write!(f, "double"),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Reference(t) => write!(f, "{t}"),
        }
    }
}

/// One field of an object schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// An ordered list of dotted field paths defining record identity or a
/// hashed slot placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordKey {
    pub field_paths: Vec<String>,
}

impl RecordKey {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// A set/map hash key: either field paths into the element/key type, or the
/// ordinal sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HashKey {
    /// Hash on the element/key ordinal itself (wire form: zero fields).
    Ordinal,
    Fields(RecordKey),
}

/// Object schema: ordered fields, optional primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
    pub primary_key: Option<RecordKey>,
}

impl ObjectSchema {
    /// Index of the named field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// List schema: ordered references to the element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSchema {
    pub name: String,
    pub element_type: String,
}

/// Set schema: hashed references to the element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetSchema {
    pub name: String,
    pub element_type: String,
    pub hash_key: Option<HashKey>,
}

/// Map schema: hashed key references paired with value references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapSchema {
    pub name: String,
    pub key_type: String,
    pub value_type: String,
    pub hash_key: Option<HashKey>,
}

/// A named record shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schema {
    Object(ObjectSchema),
    List(ListSchema),
    Set(SetSchema),
    Map(MapSchema),
}

impl Schema {
    /// Shorthand for an object schema without a primary key.
    pub fn object<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = SchemaField>,
    {
        Schema::Object(ObjectSchema {
            name: name.into(),
            fields: fields.into_iter().collect(),
            primary_key: None,
        })
    }

    /// Shorthand for an object schema with a primary key.
    pub fn keyed_object<I>(name: impl Into<String>, fields: I, key: RecordKey) -> Self
    where
        I: IntoIterator<Item = SchemaField>,
    {
        Schema::Object(ObjectSchema {
            name: name.into(),
            fields: fields.into_iter().collect(),
            primary_key: Some(key),
        })
    }

    /// Shorthand for a list schema.
    pub fn list(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Schema::List(ListSchema {
            name: name.into(),
            element_type: element_type.into(),
        })
    }

    /// Shorthand for a set schema.
    pub fn set(
        name: impl Into<String>,
        element_type: impl Into<String>,
        hash_key: Option<HashKey>,
    ) -> Self {
        Schema::Set(SetSchema {
            name: name.into(),
            element_type: element_type.into(),
            hash_key,
        })
    }

    /// Shorthand for a map schema.
    pub fn map(
        name: impl Into<String>,
        key_type: impl Into<String>,
        value_type: impl Into<String>,
        hash_key: Option<HashKey>,
    ) -> Self {
        Schema::Map(MapSchema {
            name: name.into(),
            key_type: key_type.into(),
            value_type: value_type.into(),
            hash_key,
        })
    }

    /// The schema's unique name within its dataset.
    pub fn name(&self) -> &str {
        match self {
            Schema::Object(s) => &s.name,
            Schema::List(s) => &s.name,
            Schema::Set(s) => &s.name,
            Schema::Map(s) => &s.name,
        }
    }

    /// The object variant, if this is one.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Schema::Object(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Object(s) => {
                write!(f, "{}", s.name)?;
                if let Some(pk) = &s.primary_key {
                    write!(f, " @PrimaryKey({})", pk.field_paths.join(", "))?;
                }
                writeln!(f, " {{")?;
                for field in &s.fields {
                    writeln!(f, "    {} {};", field.field_type, field.name)?;
                }
                write!(f, "}}")
            }
            Schema::List(s) => write!(f, "{} List<{}>;", s.name, s.element_type),
            Schema::Set(s) => {
                write!(f, "{} Set<{}>", s.name, s.element_type)?;
                write_hash_key(f, &s.hash_key)?;
                write!(f, ";")
            }
            Schema::Map(s) => {
                write!(f, "{} Map<{},{}>", s.name, s.key_type, s.value_type)?;
                write_hash_key(f, &s.hash_key)?;
                write!(f, ";")
            }
        }
    }
}

fn write_hash_key(f: &mut fmt::Formatter<'_>, key: &Option<HashKey>) -> fmt::Result {
    match key {
        None => Ok(()),
        Some(HashKey::Ordinal) => write!(f, " @HashKey()"),
        Some(HashKey::Fields(k)) => write!(f, " @HashKey({})", k.field_paths.join(", ")),
    }
}

/// A resolved dotted field path: field indices step through reference
/// fields, ending on a non-reference leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedKeyPath {
    /// Owning object type at each step; `types[0]` is the start type.
    pub types: Vec<String>,
    /// Field index within `types[i]` at step `i`.
    pub steps: Vec<usize>,
    /// The leaf field's type (never a reference).
    pub leaf: FieldType,
}

/// The full set of schemas for one dataset, iterated in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaSet {
    schemas: Vec<Schema>,
    index: FxHashMap<String, usize>,
}

impl SchemaSet {
    /// Build and validate a schema set.
    ///
    /// Validation: names are unique; every reference target resolves; key
    /// field paths resolve to non-reference leaves.
    pub fn new(schemas: Vec<Schema>) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (i, schema) in schemas.iter().enumerate() {
            if index.insert(schema.name().to_string(), i).is_some() {
                return Err(Error::malformed_schema(format!(
                    "duplicate schema name '{}'",
                    schema.name()
                )));
            }
        }
        let set = Self { schemas, index };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        for schema in &self.schemas {
            match schema {
                Schema::Object(s) => {
                    for field in &s.fields {
                        if let FieldType::Reference(target) = &field.field_type {
                            self.require(target)?;
                        }
                    }
                    if let Some(pk) = &s.primary_key {
                        if pk.field_paths.is_empty() {
                            return Err(Error::malformed_schema(format!(
                                "primary key of '{}' has no fields",
                                s.name
                            )));
                        }
                        for path in &pk.field_paths {
                            self.resolve_path(&s.name, path)?;
                        }
                    }
                }
                Schema::List(s) => {
                    self.require(&s.element_type)?;
                }
                Schema::Set(s) => {
                    self.require(&s.element_type)?;
                    self.validate_hash_key(&s.name, &s.element_type, &s.hash_key)?;
                }
                Schema::Map(s) => {
                    self.require(&s.key_type)?;
                    self.require(&s.value_type)?;
                    self.validate_hash_key(&s.name, &s.key_type, &s.hash_key)?;
                }
            }
        }
        Ok(())
    }

    fn validate_hash_key(
        &self,
        owner: &str,
        hashed_type: &str,
        key: &Option<HashKey>,
    ) -> Result<()> {
        match key {
            None | Some(HashKey::Ordinal) => Ok(()),
            Some(HashKey::Fields(k)) => {
                if k.field_paths.is_empty() {
                    return Err(Error::malformed_schema(format!(
                        "hash key of '{owner}' has no fields"
                    )));
                }
                for path in &k.field_paths {
                    self.resolve_path(hashed_type, path)?;
                }
                Ok(())
            }
        }
    }

    /// Look up a schema by name.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.index.get(name).map(|&i| &self.schemas[i])
    }

    /// Look up a schema by name, failing if absent.
    pub fn require(&self, name: &str) -> Result<&Schema> {
        self.get(name)
            .ok_or_else(|| Error::malformed_schema(format!("unresolved type name '{name}'")))
    }

    /// Position of the named schema in insertion order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Schemas in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Schema> {
        self.schemas.iter()
    }

    /// The schema at `position` (insertion order).
    pub fn at(&self, position: usize) -> &Schema {
        &self.schemas[position]
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when the set holds no schemas.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve a dotted field path starting at `start_type`.
    ///
    /// Non-final segments must be reference fields to object types; the
    /// final segment must be a non-reference leaf.
    pub fn resolve_path(&self, start_type: &str, path: &str) -> Result<ResolvedKeyPath> {
        let mut current = start_type.to_string();
        let mut types = Vec::new();
        let mut steps = Vec::new();
        let segments: Vec<&str> = path.split('.').collect();

        for (i, segment) in segments.iter().enumerate() {
            let object = self
                .require(&current)?
                .as_object()
                .ok_or_else(|| {
                    Error::malformed_schema(format!(
                        "path '{path}' traverses non-object type '{current}'"
                    ))
                })?;
            let field_idx = object.field_index(segment).ok_or_else(|| {
                Error::malformed_schema(format!(
                    "path '{path}': no field '{segment}' in '{current}'"
                ))
            })?;
            types.push(current.clone());
            steps.push(field_idx);

            let field_type = &object.fields[field_idx].field_type;
            let is_last = i == segments.len() - 1;
            match (is_last, field_type) {
                (true, FieldType::Reference(_)) => {
                    return Err(Error::malformed_schema(format!(
                        "path '{path}' ends on reference field '{segment}'"
                    )));
                }
                (true, leaf) => {
                    return Ok(ResolvedKeyPath {
                        types,
                        steps,
                        leaf: leaf.clone(),
                    });
                }
                (false, FieldType::Reference(target)) => {
                    current = target.clone();
                }
                (false, _) => {
                    return Err(Error::malformed_schema(format!(
                        "path '{path}': segment '{segment}' is not a reference"
                    )));
                }
            }
        }
        unreachable!("split('.') yields at least one segment")
    }
}
