#![deny(missing_docs)]

//! # Schema Fragments
//!
//! `Schema` is a closed sum type over every shape a Schema Object can take.
//! All variants except `Reference` carry a shared [`CoreContext`]; typed
//! variants add their type-specific constraints.
//!
//! Decoding goes through a loosely typed shim (`RawSchema`) and accepts both
//! OpenAPI 3.0 (`nullable`, boolean `exclusiveMaximum`) and 3.1 (`type`
//! arrays, numeric `exclusiveMaximum`, boolean schemas) shapes. Encoding
//! always produces the 3.1 shape.

use crate::error::{AppError, AppResult};
use crate::oas::components::ComponentKey;
use crate::oas::model::ExternalDocs;
use crate::oas::reference::Reference;
use derive_more::Display;
use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Concrete JSON Schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SchemaType {
    /// `boolean`
    #[display("boolean")]
    Boolean,
    /// `object`
    #[display("object")]
    Object,
    /// `array`
    #[display("array")]
    Array,
    /// `number`
    #[display("number")]
    Number,
    /// `integer`
    #[display("integer")]
    Integer,
    /// `string`
    #[display("string")]
    String,
}

impl SchemaType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Formats registered for this type in the OpenAPI Format Registry.
    pub fn known_formats(self) -> &'static [&'static str] {
        match self {
            SchemaType::Integer => &["int32", "int64"],
            SchemaType::Number => &["float", "double"],
            SchemaType::String => &[
                "byte",
                "binary",
                "date",
                "date-time",
                "time",
                "duration",
                "password",
                "email",
                "idn-email",
                "hostname",
                "idn-hostname",
                "ipv4",
                "ipv6",
                "uri",
                "uri-reference",
                "iri",
                "iri-reference",
                "uuid",
                "uri-template",
                "json-pointer",
                "relative-json-pointer",
                "regex",
            ],
            SchemaType::Boolean | SchemaType::Object | SchemaType::Array => &[],
        }
    }

    /// Whether `format` may be used with this type.
    ///
    /// A format registered for a different type is incompatible; formats that
    /// no type registers are treated as custom and accepted everywhere.
    pub fn accepts_format(self, format: &str) -> bool {
        if self.known_formats().contains(&format) {
            return true;
        }
        let registered_elsewhere = [
            SchemaType::Integer,
            SchemaType::Number,
            SchemaType::String,
        ]
        .into_iter()
        .filter(|t| *t != self)
        .any(|t| t.known_formats().contains(&format));
        !registered_elsewhere
    }
}

/// Read/write permission of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum Permissions {
    /// `readOnly: true`
    #[display("readOnly")]
    ReadOnly,
    /// `writeOnly: true`
    #[display("writeOnly")]
    WriteOnly,
    /// Neither flag set.
    #[default]
    #[display("readWrite")]
    ReadWrite,
}

/// Discriminator for polymorphic payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    /// Property holding the discriminating value.
    #[serde(rename = "propertyName")]
    pub property_name: String,
    /// Values mapped to schema names or references.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
}

/// Attributes shared by every non-reference schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreContext {
    /// `format` keyword.
    pub format: Option<String>,
    /// Whether the enclosing object requires this property.
    pub required: bool,
    /// Whether `null` is also accepted.
    pub nullable: bool,
    /// Read/write permission.
    pub permissions: Permissions,
    /// Whether the schema is deprecated.
    pub deprecated: bool,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Discriminator.
    pub discriminator: Option<Discriminator>,
    /// External documentation.
    pub external_docs: Option<ExternalDocs>,
    /// `enum` keyword.
    pub allowed_values: Option<Vec<Value>>,
    /// Default value.
    pub default: Option<Value>,
    /// Example value.
    pub example: Option<Value>,
}

impl Default for CoreContext {
    fn default() -> Self {
        Self {
            format: None,
            required: true,
            nullable: false,
            permissions: Permissions::ReadWrite,
            deprecated: false,
            title: None,
            description: None,
            discriminator: None,
            external_docs: None,
            allowed_values: None,
            default: None,
            example: None,
        }
    }
}

impl CoreContext {
    /// A core context marked optional.
    pub fn optional() -> Self {
        Self {
            required: false,
            ..Self::default()
        }
    }
}

/// Constraints for `type: number`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericContext {
    /// `multipleOf`
    pub multiple_of: Option<f64>,
    /// Inclusive `maximum`.
    pub maximum: Option<f64>,
    /// `exclusiveMaximum`
    pub exclusive_maximum: Option<f64>,
    /// Inclusive `minimum`.
    pub minimum: Option<f64>,
    /// `exclusiveMinimum`
    pub exclusive_minimum: Option<f64>,
}

/// Constraints for `type: integer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegerContext {
    /// `multipleOf`
    pub multiple_of: Option<i64>,
    /// Inclusive `maximum`.
    pub maximum: Option<i64>,
    /// `exclusiveMaximum`
    pub exclusive_maximum: Option<i64>,
    /// Inclusive `minimum`.
    pub minimum: Option<i64>,
    /// `exclusiveMinimum`
    pub exclusive_minimum: Option<i64>,
}

/// Constraints for `type: string`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringContext {
    /// `maxLength`
    pub max_length: Option<u64>,
    /// `minLength`
    pub min_length: Option<u64>,
    /// `pattern`
    pub pattern: Option<String>,
    /// `contentMediaType`
    pub content_media_type: Option<String>,
    /// `contentEncoding`
    pub content_encoding: Option<String>,
}

/// A schema that can appear as an object property.
///
/// Implemented by both [`Schema`] and the reference-free dereferenced schema
/// so object and array contexts can be shared between them.
pub trait PropertySchema {
    /// Whether the enclosing object requires this property.
    fn is_required(&self) -> bool;
}

/// Constraints for `type: array`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayContext<S = Schema> {
    /// Item schema.
    pub items: Option<Box<S>>,
    /// `maxItems`
    pub max_items: Option<u64>,
    /// `minItems`
    pub min_items: Option<u64>,
    /// `uniqueItems`
    pub unique_items: Option<bool>,
}

impl<S> Default for ArrayContext<S> {
    fn default() -> Self {
        Self {
            items: None,
            max_items: None,
            min_items: None,
            unique_items: None,
        }
    }
}

/// `additionalProperties`: a flag or a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties<S = Schema> {
    /// `true` / `false`
    Allowed(bool),
    /// Schema every additional property must match.
    Schema(Box<S>),
}

/// Constraints for `type: object`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectContext<S = Schema> {
    /// Properties; each property's `required` flag encodes the `required` array.
    pub properties: IndexMap<String, S>,
    /// Names listed in `required` that have no entry in `properties`.
    pub required_undeclared: Vec<String>,
    /// `additionalProperties`
    pub additional_properties: Option<AdditionalProperties<S>>,
    /// `maxProperties`
    pub max_properties: Option<u64>,
    /// `minProperties`
    pub min_properties: Option<u64>,
}

impl<S> Default for ObjectContext<S> {
    fn default() -> Self {
        Self {
            properties: IndexMap::new(),
            required_undeclared: Vec::new(),
            additional_properties: None,
            max_properties: None,
            min_properties: None,
        }
    }
}

impl<S: PropertySchema> ObjectContext<S> {
    /// Names of required properties, in declaration order, followed by
    /// required names without a declared property.
    pub fn required_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, schema)| schema.is_required())
            .map(|(name, _)| name.as_str())
            .chain(self.required_undeclared.iter().map(String::as_str))
            .collect()
    }
}

/// A Schema Object (or partial schema fragment).
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// `type: boolean`
    Boolean {
        /// Shared attributes.
        core: CoreContext,
    },
    /// `type: object`
    Object {
        /// Shared attributes.
        core: CoreContext,
        /// Object constraints.
        object: ObjectContext,
    },
    /// `type: array`
    Array {
        /// Shared attributes.
        core: CoreContext,
        /// Array constraints.
        array: ArrayContext,
    },
    /// `type: number`
    Number {
        /// Shared attributes.
        core: CoreContext,
        /// Numeric constraints.
        number: NumericContext,
    },
    /// `type: integer`
    Integer {
        /// Shared attributes.
        core: CoreContext,
        /// Integer constraints.
        integer: IntegerContext,
    },
    /// `type: string`
    String {
        /// Shared attributes.
        core: CoreContext,
        /// String constraints.
        string: StringContext,
    },
    /// `allOf`
    AllOf {
        /// Sub-schemas that must all match.
        of: Vec<Schema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `oneOf`
    OneOf {
        /// Sub-schemas of which exactly one must match.
        of: Vec<Schema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `anyOf`
    AnyOf {
        /// Sub-schemas of which at least one must match.
        of: Vec<Schema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `not`
    Not {
        /// Schema that must not match.
        not: Box<Schema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `$ref`
    Reference {
        /// The referenced schema.
        reference: Reference<Schema>,
        /// Whether the enclosing object requires this property.
        required: bool,
    },
    /// A schema without a `type`: only shared attributes.
    Fragment {
        /// Shared attributes.
        core: CoreContext,
    },
}

impl Schema {
    /// The universal, unconstrained schema (`{}` / `true`).
    pub fn any() -> Self {
        Schema::Fragment {
            core: CoreContext::default(),
        }
    }

    /// An unconstrained `type: string`.
    pub fn string() -> Self {
        Schema::String {
            core: CoreContext::default(),
            string: StringContext::default(),
        }
    }

    /// An unconstrained `type: integer`.
    pub fn integer() -> Self {
        Schema::Integer {
            core: CoreContext::default(),
            integer: IntegerContext::default(),
        }
    }

    /// An unconstrained `type: number`.
    pub fn number() -> Self {
        Schema::Number {
            core: CoreContext::default(),
            number: NumericContext::default(),
        }
    }

    /// An unconstrained `type: boolean`.
    pub fn boolean() -> Self {
        Schema::Boolean {
            core: CoreContext::default(),
        }
    }

    /// `type: object` with the given properties.
    pub fn object(properties: impl IntoIterator<Item = (String, Schema)>) -> Self {
        Schema::Object {
            core: CoreContext::default(),
            object: ObjectContext {
                properties: properties.into_iter().collect(),
                ..Default::default()
            },
        }
    }

    /// `type: array` with the given item schema.
    pub fn array(items: Schema) -> Self {
        Schema::Array {
            core: CoreContext::default(),
            array: ArrayContext {
                items: Some(Box::new(items)),
                ..Default::default()
            },
        }
    }

    /// A required reference to the schema component `key`.
    pub fn reference(key: ComponentKey) -> Self {
        Schema::Reference {
            reference: Reference::internal(key),
            required: true,
        }
    }

    /// The shared attributes, `None` for references.
    pub fn core(&self) -> Option<&CoreContext> {
        match self {
            Schema::Boolean { core }
            | Schema::Object { core, .. }
            | Schema::Array { core, .. }
            | Schema::Number { core, .. }
            | Schema::Integer { core, .. }
            | Schema::String { core, .. }
            | Schema::AllOf { core, .. }
            | Schema::OneOf { core, .. }
            | Schema::AnyOf { core, .. }
            | Schema::Not { core, .. }
            | Schema::Fragment { core } => Some(core),
            Schema::Reference { .. } => None,
        }
    }

    /// Mutable shared attributes, `None` for references.
    pub fn core_mut(&mut self) -> Option<&mut CoreContext> {
        match self {
            Schema::Boolean { core }
            | Schema::Object { core, .. }
            | Schema::Array { core, .. }
            | Schema::Number { core, .. }
            | Schema::Integer { core, .. }
            | Schema::String { core, .. }
            | Schema::AllOf { core, .. }
            | Schema::OneOf { core, .. }
            | Schema::AnyOf { core, .. }
            | Schema::Not { core, .. }
            | Schema::Fragment { core } => Some(core),
            Schema::Reference { .. } => None,
        }
    }

    /// Returns the schema with its required flag replaced.
    pub fn with_required(mut self, required: bool) -> Self {
        match &mut self {
            Schema::Reference { required: r, .. } => *r = required,
            other => {
                if let Some(core) = other.core_mut() {
                    core.required = required;
                }
            }
        }
        self
    }

    /// Returns the schema marked optional.
    pub fn optional(self) -> Self {
        self.with_required(false)
    }

    /// The concrete type, if the schema has one.
    pub fn schema_type(&self) -> Option<SchemaType> {
        match self {
            Schema::Boolean { .. } => Some(SchemaType::Boolean),
            Schema::Object { .. } => Some(SchemaType::Object),
            Schema::Array { .. } => Some(SchemaType::Array),
            Schema::Number { .. } => Some(SchemaType::Number),
            Schema::Integer { .. } => Some(SchemaType::Integer),
            Schema::String { .. } => Some(SchemaType::String),
            _ => None,
        }
    }

    /// Decodes a schema from a JSON value.
    pub fn from_value(value: Value) -> AppResult<Self> {
        decode_schema(value)
    }

    /// Encodes the schema as a JSON value.
    pub fn to_value(&self) -> AppResult<Value> {
        encode_schema(self)
    }
}

impl PropertySchema for Schema {
    fn is_required(&self) -> bool {
        match self {
            Schema::Reference { required, .. } => *required,
            other => other.core().map(|c| c.required).unwrap_or(true),
        }
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encode_schema(self)
            .map_err(|e| SerError::custom(e.to_string()))?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        decode_schema(raw).map_err(|e| DeError::custom(e.to_string()))
    }
}

/// Loosely typed intermediate deserialization layer for Schema Objects.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(rename = "type")]
    schema_type: Option<Value>,
    format: Option<String>,
    title: Option<String>,
    description: Option<String>,
    nullable: Option<bool>,
    read_only: Option<bool>,
    write_only: Option<bool>,
    deprecated: Option<bool>,
    discriminator: Option<Discriminator>,
    external_docs: Option<ExternalDocs>,
    #[serde(rename = "enum")]
    enum_values: Option<Vec<Value>>,
    #[serde(rename = "const")]
    const_value: Option<Value>,
    default: Option<Value>,
    example: Option<Value>,

    multiple_of: Option<Value>,
    maximum: Option<Value>,
    exclusive_maximum: Option<Value>,
    minimum: Option<Value>,
    exclusive_minimum: Option<Value>,

    max_length: Option<u64>,
    min_length: Option<u64>,
    pattern: Option<String>,
    content_media_type: Option<String>,
    content_encoding: Option<String>,

    items: Option<Box<Schema>>,
    max_items: Option<u64>,
    min_items: Option<u64>,
    unique_items: Option<bool>,

    properties: Option<IndexMap<String, Schema>>,
    required: Option<Vec<String>>,
    additional_properties: Option<Value>,
    max_properties: Option<u64>,
    min_properties: Option<u64>,

    all_of: Option<Vec<Schema>>,
    one_of: Option<Vec<Schema>>,
    any_of: Option<Vec<Schema>>,
    not: Option<Box<Schema>>,
}

impl RawSchema {
    fn has_object_keys(&self) -> bool {
        self.properties.is_some()
            || self.required.is_some()
            || self.additional_properties.is_some()
            || self.max_properties.is_some()
            || self.min_properties.is_some()
    }

    fn has_array_keys(&self) -> bool {
        self.items.is_some()
            || self.max_items.is_some()
            || self.min_items.is_some()
            || self.unique_items.is_some()
    }

    fn has_string_keys(&self) -> bool {
        self.max_length.is_some()
            || self.min_length.is_some()
            || self.pattern.is_some()
            || self.content_media_type.is_some()
            || self.content_encoding.is_some()
    }

    fn has_numeric_keys(&self) -> bool {
        self.multiple_of.is_some()
            || self.maximum.is_some()
            || self.exclusive_maximum.is_some()
            || self.minimum.is_some()
            || self.exclusive_minimum.is_some()
    }

    /// The type implied by type-specific keywords when `type` is absent.
    fn inferred_type(&self) -> Option<SchemaType> {
        if self.has_object_keys() {
            Some(SchemaType::Object)
        } else if self.has_array_keys() {
            Some(SchemaType::Array)
        } else if self.has_string_keys() {
            Some(SchemaType::String)
        } else if self.has_numeric_keys() {
            Some(SchemaType::Number)
        } else {
            None
        }
    }
}

fn decode_schema(value: Value) -> AppResult<Schema> {
    match value {
        Value::Bool(true) => return Ok(Schema::any()),
        Value::Bool(false) => {
            return Ok(Schema::Not {
                not: Box::new(Schema::any()),
                core: CoreContext::default(),
            })
        }
        Value::Object(_) => {}
        other => {
            return Err(AppError::Parse(format!(
                "Schema must be an object or boolean, found {}",
                other
            )))
        }
    }

    let mut raw: RawSchema = serde_json::from_value(value)
        .map_err(|e| AppError::Parse(format!("Failed to parse schema: {}", e)))?;

    if let Some(text) = &raw.reference {
        return Ok(Schema::Reference {
            reference: Reference::parse(text)?,
            required: true,
        });
    }

    let (declared_type, type_nullable) = decode_type(raw.schema_type.as_ref())?;
    let core = decode_core(&raw, type_nullable)?;
    let mut composites = take_composites(&mut raw);
    let schema_type = declared_type.or_else(|| raw.inferred_type());

    let schema = match (schema_type, composites.len()) {
        (None, 0) => Schema::Fragment { core },
        (Some(schema_type), 0) => decode_typed(raw, schema_type, core)?,
        (None, 1) => {
            let mut composite = composites.remove(0);
            if let Some(composite_core) = composite.core_mut() {
                *composite_core = core;
            }
            composite
        }
        // Typed keywords next to composites, or several composites: every
        // part must hold, so they become members of one allOf.
        (schema_type, _) => {
            let mut of = Vec::new();
            if let Some(schema_type) = schema_type {
                of.push(decode_typed(raw, schema_type, CoreContext::default())?);
            }
            for composite in composites {
                match composite {
                    Schema::AllOf { of: members, .. } => of.extend(members),
                    other => of.push(other),
                }
            }
            Schema::AllOf { of, core }
        }
    };

    Ok(schema)
}

/// Removes `allOf`, `oneOf`, `anyOf` and `not` from the shim, in that order.
fn take_composites(raw: &mut RawSchema) -> Vec<Schema> {
    let mut composites = Vec::new();
    if let Some(of) = raw.all_of.take() {
        composites.push(Schema::AllOf {
            of,
            core: CoreContext::default(),
        });
    }
    if let Some(of) = raw.one_of.take() {
        composites.push(Schema::OneOf {
            of,
            core: CoreContext::default(),
        });
    }
    if let Some(of) = raw.any_of.take() {
        composites.push(Schema::AnyOf {
            of,
            core: CoreContext::default(),
        });
    }
    if let Some(not) = raw.not.take() {
        composites.push(Schema::Not {
            not,
            core: CoreContext::default(),
        });
    }
    composites
}

fn decode_typed(raw: RawSchema, schema_type: SchemaType, core: CoreContext) -> AppResult<Schema> {
    let schema = match schema_type {
        SchemaType::Boolean => Schema::Boolean { core },
        SchemaType::Object => Schema::Object {
            core,
            object: decode_object(&raw)?,
        },
        SchemaType::Array => Schema::Array {
            core,
            array: ArrayContext {
                items: raw.items,
                max_items: raw.max_items,
                min_items: raw.min_items,
                unique_items: raw.unique_items,
            },
        },
        SchemaType::Number => Schema::Number {
            core,
            number: decode_numeric(&raw)?,
        },
        SchemaType::Integer => Schema::Integer {
            core,
            integer: decode_integer(&raw)?,
        },
        SchemaType::String => Schema::String {
            core,
            string: StringContext {
                max_length: raw.max_length,
                min_length: raw.min_length,
                pattern: raw.pattern,
                content_media_type: raw.content_media_type,
                content_encoding: raw.content_encoding,
            },
        },
    };
    Ok(schema)
}

fn decode_type(value: Option<&Value>) -> AppResult<(Option<SchemaType>, bool)> {
    let names: Vec<&str> = match value {
        None => return Ok((None, false)),
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(other) => {
            return Err(AppError::Parse(format!(
                "Schema 'type' must be a string or array, found {}",
                other
            )))
        }
    };

    let nullable = names.contains(&"null");
    let concrete: Vec<&str> = names.into_iter().filter(|n| *n != "null").collect();
    match concrete.as_slice() {
        [] => Ok((None, nullable)),
        [single] => SchemaType::parse(single)
            .map(|t| (Some(t), nullable))
            .ok_or_else(|| AppError::Parse(format!("Unknown schema type '{}'", single))),
        many => Err(AppError::Parse(format!(
            "Schemas with multiple types are not supported: [{}]",
            many.join(", ")
        ))),
    }
}

fn decode_core(raw: &RawSchema, type_nullable: bool) -> AppResult<CoreContext> {
    let permissions = match (
        raw.read_only.unwrap_or(false),
        raw.write_only.unwrap_or(false),
    ) {
        (true, true) => {
            return Err(AppError::Parse(
                "Schema cannot be both readOnly and writeOnly".into(),
            ))
        }
        (true, false) => Permissions::ReadOnly,
        (false, true) => Permissions::WriteOnly,
        (false, false) => Permissions::ReadWrite,
    };

    let allowed_values = match (&raw.enum_values, &raw.const_value) {
        (Some(values), _) => Some(values.clone()),
        (None, Some(value)) => Some(vec![value.clone()]),
        (None, None) => None,
    };

    Ok(CoreContext {
        format: raw.format.clone(),
        required: true,
        nullable: type_nullable || raw.nullable.unwrap_or(false),
        permissions,
        deprecated: raw.deprecated.unwrap_or(false),
        title: raw.title.clone(),
        description: raw.description.clone(),
        discriminator: raw.discriminator.clone(),
        external_docs: raw.external_docs.clone(),
        allowed_values,
        default: raw.default.clone(),
        example: raw.example.clone(),
    })
}

fn decode_object(raw: &RawSchema) -> AppResult<ObjectContext> {
    let required: Vec<String> = raw.required.clone().unwrap_or_default();
    let properties: IndexMap<String, Schema> = raw
        .properties
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|(name, schema)| {
            let is_required = required.contains(&name);
            (name, schema.with_required(is_required))
        })
        .collect();

    let mut required_undeclared: Vec<String> = Vec::new();
    for name in required {
        if !properties.contains_key(&name) && !required_undeclared.contains(&name) {
            required_undeclared.push(name);
        }
    }

    let additional_properties = match &raw.additional_properties {
        None => None,
        Some(Value::Bool(flag)) => Some(AdditionalProperties::Allowed(*flag)),
        Some(other) => Some(AdditionalProperties::Schema(Box::new(decode_schema(
            other.clone(),
        )?))),
    };

    Ok(ObjectContext {
        properties,
        required_undeclared,
        additional_properties,
        max_properties: raw.max_properties,
        min_properties: raw.min_properties,
    })
}

/// Splits a 3.0 (`maximum` + boolean `exclusiveMaximum`) or 3.1 (numeric
/// `exclusiveMaximum`) bound into inclusive/exclusive parts.
fn split_bound(
    inclusive: Option<&Value>,
    exclusive: Option<&Value>,
    name: &str,
) -> AppResult<(Option<Value>, Option<Value>)> {
    match exclusive {
        None | Some(Value::Bool(false)) => Ok((inclusive.cloned(), None)),
        Some(Value::Bool(true)) => Ok((None, inclusive.cloned())),
        Some(number @ Value::Number(_)) => Ok((inclusive.cloned(), Some(number.clone()))),
        Some(other) => Err(AppError::Parse(format!(
            "Schema '{}' must be a number or boolean, found {}",
            name, other
        ))),
    }
}

fn as_f64(value: Option<Value>, name: &str) -> AppResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| AppError::Parse(format!("Schema '{}' must be a number", name))),
    }
}

fn as_i64(value: Option<Value>, name: &str) -> AppResult<Option<i64>> {
    match value {
        None => Ok(None),
        Some(v) => {
            if let Some(i) = v.as_i64() {
                return Ok(Some(i));
            }
            match v.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                _ => Err(AppError::Parse(format!(
                    "Integer schema '{}' must be a whole number",
                    name
                ))),
            }
        }
    }
}

fn decode_numeric(raw: &RawSchema) -> AppResult<NumericContext> {
    let (maximum, exclusive_maximum) = split_bound(
        raw.maximum.as_ref(),
        raw.exclusive_maximum.as_ref(),
        "exclusiveMaximum",
    )?;
    let (minimum, exclusive_minimum) = split_bound(
        raw.minimum.as_ref(),
        raw.exclusive_minimum.as_ref(),
        "exclusiveMinimum",
    )?;
    Ok(NumericContext {
        multiple_of: as_f64(raw.multiple_of.clone(), "multipleOf")?,
        maximum: as_f64(maximum, "maximum")?,
        exclusive_maximum: as_f64(exclusive_maximum, "exclusiveMaximum")?,
        minimum: as_f64(minimum, "minimum")?,
        exclusive_minimum: as_f64(exclusive_minimum, "exclusiveMinimum")?,
    })
}

fn decode_integer(raw: &RawSchema) -> AppResult<IntegerContext> {
    let (maximum, exclusive_maximum) = split_bound(
        raw.maximum.as_ref(),
        raw.exclusive_maximum.as_ref(),
        "exclusiveMaximum",
    )?;
    let (minimum, exclusive_minimum) = split_bound(
        raw.minimum.as_ref(),
        raw.exclusive_minimum.as_ref(),
        "exclusiveMinimum",
    )?;
    Ok(IntegerContext {
        multiple_of: as_i64(raw.multiple_of.clone(), "multipleOf")?,
        maximum: as_i64(maximum, "maximum")?,
        exclusive_maximum: as_i64(exclusive_maximum, "exclusiveMaximum")?,
        minimum: as_i64(minimum, "minimum")?,
        exclusive_minimum: as_i64(exclusive_minimum, "exclusiveMinimum")?,
    })
}

fn encode_schema(schema: &Schema) -> AppResult<Value> {
    let mut map = Map::new();

    let core = match schema {
        Schema::Reference { reference, .. } => {
            map.insert("$ref".into(), Value::String(reference.to_ref_string()));
            return Ok(Value::Object(map));
        }
        other => other.core(),
    };

    if let Some(schema_type) = schema.schema_type() {
        let nullable = core.map(|c| c.nullable).unwrap_or(false);
        let type_value = if nullable {
            json!([schema_type.to_string(), "null"])
        } else {
            json!(schema_type.to_string())
        };
        map.insert("type".into(), type_value);
    } else if core.map(|c| c.nullable).unwrap_or(false) {
        map.insert("type".into(), json!(["null"]));
    }

    if let Some(core) = core {
        encode_core(core, &mut map)?;
    }

    match schema {
        Schema::Object { object, .. } => encode_object(object, &mut map)?,
        Schema::Array { array, .. } => {
            if let Some(items) = &array.items {
                map.insert("items".into(), encode_schema(items)?);
            }
            insert_opt(&mut map, "maxItems", array.max_items)?;
            insert_opt(&mut map, "minItems", array.min_items)?;
            insert_opt(&mut map, "uniqueItems", array.unique_items)?;
        }
        Schema::Number { number, .. } => {
            insert_opt(&mut map, "multipleOf", number.multiple_of)?;
            insert_opt(&mut map, "maximum", number.maximum)?;
            insert_opt(&mut map, "exclusiveMaximum", number.exclusive_maximum)?;
            insert_opt(&mut map, "minimum", number.minimum)?;
            insert_opt(&mut map, "exclusiveMinimum", number.exclusive_minimum)?;
        }
        Schema::Integer { integer, .. } => {
            insert_opt(&mut map, "multipleOf", integer.multiple_of)?;
            insert_opt(&mut map, "maximum", integer.maximum)?;
            insert_opt(&mut map, "exclusiveMaximum", integer.exclusive_maximum)?;
            insert_opt(&mut map, "minimum", integer.minimum)?;
            insert_opt(&mut map, "exclusiveMinimum", integer.exclusive_minimum)?;
        }
        Schema::String { string, .. } => {
            insert_opt(&mut map, "maxLength", string.max_length)?;
            insert_opt(&mut map, "minLength", string.min_length)?;
            insert_opt(&mut map, "pattern", string.pattern.as_ref())?;
            insert_opt(&mut map, "contentMediaType", string.content_media_type.as_ref())?;
            insert_opt(&mut map, "contentEncoding", string.content_encoding.as_ref())?;
        }
        Schema::AllOf { of, .. } => {
            map.insert("allOf".into(), encode_list(of)?);
        }
        Schema::OneOf { of, .. } => {
            map.insert("oneOf".into(), encode_list(of)?);
        }
        Schema::AnyOf { of, .. } => {
            map.insert("anyOf".into(), encode_list(of)?);
        }
        Schema::Not { not, .. } => {
            map.insert("not".into(), encode_schema(not)?);
        }
        Schema::Boolean { .. } | Schema::Fragment { .. } | Schema::Reference { .. } => {}
    }

    Ok(Value::Object(map))
}

fn encode_core(core: &CoreContext, map: &mut Map<String, Value>) -> AppResult<()> {
    insert_opt(map, "format", core.format.as_ref())?;
    insert_opt(map, "title", core.title.as_ref())?;
    insert_opt(map, "description", core.description.as_ref())?;
    match core.permissions {
        Permissions::ReadOnly => {
            map.insert("readOnly".into(), Value::Bool(true));
        }
        Permissions::WriteOnly => {
            map.insert("writeOnly".into(), Value::Bool(true));
        }
        Permissions::ReadWrite => {}
    }
    if core.deprecated {
        map.insert("deprecated".into(), Value::Bool(true));
    }
    insert_opt(map, "discriminator", core.discriminator.as_ref())?;
    insert_opt(map, "externalDocs", core.external_docs.as_ref())?;
    insert_opt(map, "enum", core.allowed_values.as_ref())?;
    insert_opt(map, "default", core.default.as_ref())?;
    insert_opt(map, "example", core.example.as_ref())?;
    Ok(())
}

fn encode_object(object: &ObjectContext, map: &mut Map<String, Value>) -> AppResult<()> {
    if !object.properties.is_empty() {
        let mut properties = Map::new();
        for (name, property) in &object.properties {
            properties.insert(name.clone(), encode_schema(property)?);
        }
        map.insert("properties".into(), Value::Object(properties));
    }
    let required = object.required_properties();
    if !required.is_empty() {
        map.insert("required".into(), json!(required));
    }
    match &object.additional_properties {
        Some(AdditionalProperties::Allowed(flag)) => {
            map.insert("additionalProperties".into(), Value::Bool(*flag));
        }
        Some(AdditionalProperties::Schema(schema)) => {
            map.insert("additionalProperties".into(), encode_schema(schema)?);
        }
        None => {}
    }
    insert_opt(map, "maxProperties", object.max_properties)?;
    insert_opt(map, "minProperties", object.min_properties)?;
    Ok(())
}

fn encode_list(schemas: &[Schema]) -> AppResult<Value> {
    schemas
        .iter()
        .map(encode_schema)
        .collect::<AppResult<Vec<_>>>()
        .map(Value::Array)
}

fn insert_opt<T: Serialize>(
    map: &mut Map<String, Value>,
    key: &str,
    value: Option<T>,
) -> AppResult<()> {
    if let Some(value) = value {
        let encoded = serde_json::to_value(value)
            .map_err(|e| AppError::General(format!("Failed to encode '{}': {}", key, e)))?;
        map.insert(key.to_string(), encoded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Schema {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_required_array_marks_properties() {
        let schema = parse(
            r#"
type: object
required: [id]
properties:
  id:
    type: integer
    format: int64
  name:
    type: string
"#,
        );
        let Schema::Object { object, .. } = &schema else {
            panic!("Expected object schema");
        };
        assert!(object.properties["id"].is_required());
        assert!(!object.properties["name"].is_required());
        assert_eq!(object.required_properties(), vec!["id"]);
    }

    #[test]
    fn test_nullable_30_and_31_agree() {
        let legacy = parse("type: string\nnullable: true\n");
        let modern = parse("type: [string, 'null']\n");
        assert_eq!(legacy, modern);
        assert!(legacy.core().unwrap().nullable);
    }

    #[test]
    fn test_legacy_exclusive_maximum() {
        let schema = parse("type: integer\nmaximum: 10\nexclusiveMaximum: true\n");
        let Schema::Integer { integer, .. } = schema else {
            panic!("Expected integer schema");
        };
        assert_eq!(integer.maximum, None);
        assert_eq!(integer.exclusive_maximum, Some(10));
    }

    #[test]
    fn test_boolean_schemas() {
        assert_eq!(parse("true"), Schema::any());
        assert!(matches!(parse("false"), Schema::Not { .. }));
    }

    #[test]
    fn test_untyped_fragment_infers_type_from_keywords() {
        assert_eq!(parse("maxLength: 5").schema_type(), Some(SchemaType::String));
        assert_eq!(parse("items: {}").schema_type(), Some(SchemaType::Array));
        assert_eq!(parse("description: bare").schema_type(), None);
    }

    #[test]
    fn test_reference_schema() {
        let schema = parse("$ref: '#/components/schemas/User'");
        match schema {
            Schema::Reference { reference, required } => {
                assert!(required);
                assert_eq!(reference.key().unwrap().as_str(), "User");
            }
            _ => panic!("Expected reference"),
        }
    }

    #[test]
    fn test_multiple_types_rejected() {
        let result: Result<Schema, _> = serde_yaml::from_str("type: [string, integer]");
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_uses_31_shape() {
        let schema = parse(
            r#"
type: object
nullable: true
required: [id]
properties:
  id: {type: integer, minimum: 1}
"#,
        );
        let encoded = schema.to_value().unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": ["object", "null"],
                "properties": {"id": {"type": "integer", "minimum": 1}},
                "required": ["id"]
            })
        );
        assert_eq!(Schema::from_value(encoded).unwrap(), schema);
    }

    #[test]
    fn test_format_compatibility() {
        assert!(SchemaType::String.accepts_format("uuid"));
        assert!(SchemaType::String.accepts_format("x-custom"));
        assert!(!SchemaType::String.accepts_format("int64"));
        assert!(!SchemaType::Integer.accepts_format("date-time"));
    }

    #[test]
    fn test_typed_schema_keeps_composite_members() {
        let schema = parse(
            r#"
type: object
description: A pet
allOf:
  - $ref: '#/components/schemas/Missing'
"#,
        );
        let Schema::AllOf { of, core } = &schema else {
            panic!("Expected allOf schema, got {:?}", schema);
        };
        assert_eq!(core.description.as_deref(), Some("A pet"));
        assert_eq!(of.len(), 2);
        assert_eq!(of[0].schema_type(), Some(SchemaType::Object));
        assert!(matches!(&of[1], Schema::Reference { reference, .. }
            if reference.key().unwrap().as_str() == "Missing"));
    }

    #[test]
    fn test_inferred_type_keeps_composite_members() {
        let schema = parse(
            r#"
required: [id]
oneOf:
  - {type: string}
  - {type: integer}
"#,
        );
        let Schema::AllOf { of, .. } = &schema else {
            panic!("Expected allOf schema, got {:?}", schema);
        };
        assert_eq!(of[0].schema_type(), Some(SchemaType::Object));
        assert!(matches!(&of[1], Schema::OneOf { of, .. } if of.len() == 2));
    }

    #[test]
    fn test_single_composite_keeps_its_shape() {
        let schema = parse("title: Choice
anyOf: [{type: string}, {type: boolean}]
");
        let Schema::AnyOf { of, core } = &schema else {
            panic!("Expected anyOf schema, got {:?}", schema);
        };
        assert_eq!(of.len(), 2);
        assert_eq!(core.title.as_deref(), Some("Choice"));
        assert_eq!(Schema::from_value(schema.to_value().unwrap()).unwrap(), schema);
    }

    #[test]
    fn test_required_without_property_is_not_invented() {
        let schema = parse(
            r#"
type: object
required: [a, b]
properties:
  b: {type: string}
"#,
        );
        let Schema::Object { object, .. } = &schema else {
            panic!("Expected object schema");
        };
        assert_eq!(object.properties.len(), 1);
        assert_eq!(object.required_undeclared, vec!["a".to_string()]);
        assert_eq!(object.required_properties(), vec!["b", "a"]);

        let encoded = parse("type: object\nrequired: [a]\n").to_value().unwrap();
        assert_eq!(encoded, json!({"type": "object", "required": ["a"]}));
    }

    #[test]
    fn test_untyped_nullable_encodes_null_type() {
        let schema = parse("nullable: true\ndescription: anything\n");
        let encoded = schema.to_value().unwrap();
        assert_eq!(
            encoded,
            json!({"type": ["null"], "description": "anything"})
        );
        assert!(encoded.get("nullable").is_none());
        assert_eq!(Schema::from_value(encoded).unwrap(), schema);
    }
}
