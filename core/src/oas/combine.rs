#![deny(missing_docs)]

//! # Schema Fragment Combination
//!
//! Folds a sequence of partial schemas (typically the members of an `allOf`)
//! into a single dereferenced schema.
//!
//! * References are resolved first, carrying their own required flag.
//! * `allOf` operands are flattened into the input, on either side and at
//!   any depth.
//! * An untyped accumulator adopts the first concrete type it meets.
//! * Scalar constraints merge "unset loses to set"; two different set values
//!   are an attribute conflict.
//! * Object properties merge key by key with the same algorithm.
//! * `anyOf`, `oneOf` and `not` are rejected as unsupported.
//!
//! Combination is fail-fast: the first conflict aborts.

use crate::error::AppResult;
use crate::oas::components::{ComponentKey, Components};
use crate::oas::dereference::{
    DereferenceContext, DereferencedSchema, DereferencedSchemaKind, LocallyDereferenceable,
};
use crate::oas::schema::{
    AdditionalProperties, ArrayContext, CoreContext, IntegerContext, NumericContext,
    ObjectContext, Permissions, Schema, SchemaType, StringContext,
};
use derive_more::Display;
use serde::Serialize;
use serde_json::Value;

/// Reasons a set of schema fragments cannot be combined.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum SchemaResolutionError {
    /// A construct the combiner does not handle (`anyOf`, `oneOf`, `not`).
    #[display("Unsupported schema construct: {_0}")]
    Unsupported(String),

    /// Two fragments declare different concrete types.
    #[display("Cannot combine a '{original}' schema with a '{new}' schema")]
    TypeConflict {
        /// Type of the accumulated schema.
        original: SchemaType,
        /// Type of the incoming fragment.
        new: SchemaType,
    },

    /// Two fragments declare incompatible formats.
    #[display("Format '{new}' conflicts with format '{original}'")]
    FormatConflict {
        /// Format (or type) already accumulated.
        original: String,
        /// Incoming format (or type).
        new: String,
    },

    /// Two fragments set different values for the same attribute.
    #[display(
        "Conflicting values for '{name}'{}: '{original}' vs '{new}'",
        schema_type.map(|t| format!(" on {} schema", t)).unwrap_or_default()
    )]
    AttributeConflict {
        /// Type of the schema carrying the attribute, if known.
        schema_type: Option<SchemaType>,
        /// Wire name of the attribute (e.g. `maxLength`).
        name: String,
        /// Value already accumulated.
        original: String,
        /// Incoming value.
        new: String,
    },

    /// The fragments are inconsistent in some other way.
    #[display("{_0}")]
    Inconsistency(String),

    /// A settled bound is invalid (e.g. `minimum > maximum`).
    #[display("Invalid bound '{name}': {message}")]
    InvalidBounds {
        /// Wire name of the offending attribute.
        name: String,
        /// What is wrong with it.
        message: String,
    },
}

impl std::error::Error for SchemaResolutionError {}

type CombineResult<T> = Result<T, SchemaResolutionError>;

/// Accumulates schema fragments into a single schema.
///
/// ```
/// use oas_core::oas::combine::FragmentCombiner;
/// use oas_core::oas::components::Components;
/// use oas_core::oas::schema::Schema;
///
/// let components = Components::new();
/// let mut combiner = FragmentCombiner::new(&components);
/// combiner.combine(&Schema::string()).unwrap();
/// let schema = combiner.resolve().unwrap();
/// assert!(schema.schema_type().is_some());
/// ```
pub struct FragmentCombiner<'a> {
    components: &'a Components,
    accumulator: DereferencedSchema,
    fragments: usize,
}

impl<'a> FragmentCombiner<'a> {
    /// Starts with an untyped, optional accumulator.
    pub fn new(components: &'a Components) -> Self {
        Self {
            components,
            accumulator: DereferencedSchemaKind::Fragment {
                core: CoreContext::optional(),
            }
            .into(),
            fragments: 0,
        }
    }

    /// Resolves `fragment` against the registry and folds it in.
    pub fn combine(&mut self, fragment: &Schema) -> AppResult<()> {
        let mut ctx = DereferenceContext::new(self.components);
        let dereferenced = fragment.dereferenced_in(&mut ctx)?;
        self.combine_dereferenced(dereferenced)?;
        Ok(())
    }

    /// Folds in every fragment, in order.
    pub fn combine_all<'s>(&mut self, fragments: impl IntoIterator<Item = &'s Schema>) -> AppResult<()> {
        for fragment in fragments {
            self.combine(fragment)?;
        }
        Ok(())
    }

    /// Folds in an already dereferenced fragment.
    pub fn combine_dereferenced(&mut self, fragment: DereferencedSchema) -> CombineResult<()> {
        let accumulator = std::mem::replace(&mut self.accumulator, DereferencedSchema::any());
        self.accumulator = combine_pair(accumulator, fragment)?;
        self.fragments += 1;
        Ok(())
    }

    /// Flattens nested `allOf`s, validates settled bounds and returns the
    /// combined schema.
    ///
    /// Combining zero fragments yields the unconstrained schema.
    pub fn resolve(self) -> AppResult<DereferencedSchema> {
        if self.fragments == 0 {
            return Ok(DereferencedSchema::any());
        }
        let combined = simplify(self.accumulator)?;
        validate_bounds(&combined)?;
        Ok(combined)
    }
}

/// Combines `fragments` against `components` in one call.
pub fn combine_fragments(
    fragments: &[Schema],
    components: &Components,
) -> AppResult<DereferencedSchema> {
    let mut combiner = FragmentCombiner::new(components);
    combiner.combine_all(fragments)?;
    combiner.resolve()
}

fn combine_pair(
    accumulator: DereferencedSchema,
    next: DereferencedSchema,
) -> CombineResult<DereferencedSchema> {
    let DereferencedSchema {
        kind: acc_kind,
        component_keys: mut keys,
    } = flatten(accumulator)?;
    let DereferencedSchema {
        kind: next_kind,
        component_keys: next_keys,
    } = flatten(next)?;
    reject_unsupported(&acc_kind)?;
    reject_unsupported(&next_kind)?;
    extend_keys(&mut keys, next_keys);

    Ok(DereferencedSchema {
        kind: combine_kinds(acc_kind, next_kind)?,
        component_keys: keys,
    })
}

/// Folds an `allOf` into a single schema; other kinds pass through.
///
/// The folded schema keeps the `allOf`'s own required flag.
fn flatten(schema: DereferencedSchema) -> CombineResult<DereferencedSchema> {
    let DereferencedSchema {
        kind,
        component_keys,
    } = schema;
    match kind {
        DereferencedSchemaKind::AllOf { of, core } => {
            let required = core.required;
            let mut folded = DereferencedSchema {
                kind: DereferencedSchemaKind::Fragment { core },
                component_keys,
            };
            for member in of {
                folded = combine_pair(folded, member)?;
            }
            Ok(folded.with_required(required))
        }
        kind => Ok(DereferencedSchema {
            kind,
            component_keys,
        }),
    }
}

fn reject_unsupported(kind: &DereferencedSchemaKind) -> CombineResult<()> {
    let keyword = match kind {
        DereferencedSchemaKind::OneOf { .. } => "oneOf",
        DereferencedSchemaKind::AnyOf { .. } => "anyOf",
        DereferencedSchemaKind::Not { .. } => "not",
        _ => return Ok(()),
    };
    Err(SchemaResolutionError::Unsupported(format!(
        "{} cannot be combined with other fragments",
        keyword
    )))
}

/// Flattens every `allOf` reachable through properties, additional
/// properties and array items.
fn simplify(schema: DereferencedSchema) -> CombineResult<DereferencedSchema> {
    let DereferencedSchema {
        kind,
        component_keys,
    } = flatten(schema)?;
    let kind = match kind {
        DereferencedSchemaKind::Object { core, mut object } => {
            object.properties = object
                .properties
                .into_iter()
                .map(|(name, property)| Ok((name, simplify(property)?)))
                .collect::<CombineResult<_>>()?;
            object.additional_properties = match object.additional_properties {
                Some(AdditionalProperties::Schema(schema)) => {
                    Some(AdditionalProperties::Schema(Box::new(simplify(*schema)?)))
                }
                other => other,
            };
            DereferencedSchemaKind::Object { core, object }
        }
        DereferencedSchemaKind::Array { core, mut array } => {
            array.items = array
                .items
                .map(|items| simplify(*items).map(Box::new))
                .transpose()?;
            DereferencedSchemaKind::Array { core, array }
        }
        other => other,
    };
    Ok(DereferencedSchema {
        kind,
        component_keys,
    })
}

fn combine_kinds(
    acc: DereferencedSchemaKind,
    next: DereferencedSchemaKind,
) -> CombineResult<DereferencedSchemaKind> {
    use DereferencedSchemaKind as K;

    match (acc, next) {
        (K::Fragment { core: a }, K::Fragment { core: b }) => Ok(K::Fragment {
            core: merge_core(a, b, None)?,
        }),
        (K::Fragment { core: a }, typed) => adopt_type(a, typed),
        (typed, K::Fragment { core: b }) => adopt_type(b, typed),
        (K::Boolean { core: a }, K::Boolean { core: b }) => Ok(K::Boolean {
            core: merge_core(a, b, Some(SchemaType::Boolean))?,
        }),
        (K::String { core: a, string: x }, K::String { core: b, string: y }) => Ok(K::String {
            core: merge_core(a, b, Some(SchemaType::String))?,
            string: merge_string(x, y)?,
        }),
        (K::Number { core: a, number: x }, K::Number { core: b, number: y }) => Ok(K::Number {
            core: merge_core(a, b, Some(SchemaType::Number))?,
            number: merge_numeric(x, y)?,
        }),
        (K::Integer { core: a, integer: x }, K::Integer { core: b, integer: y }) => {
            Ok(K::Integer {
                core: merge_core(a, b, Some(SchemaType::Integer))?,
                integer: merge_integer(x, y)?,
            })
        }
        (K::Array { core: a, array: x }, K::Array { core: b, array: y }) => Ok(K::Array {
            core: merge_core(a, b, Some(SchemaType::Array))?,
            array: merge_array(x, y)?,
        }),
        (K::Object { core: a, object: x }, K::Object { core: b, object: y }) => Ok(K::Object {
            core: merge_core(a, b, Some(SchemaType::Object))?,
            object: merge_object(x, y)?,
        }),
        (acc, next) => match (kind_type(&acc), kind_type(&next)) {
            (Some(original), Some(new)) => Err(SchemaResolutionError::TypeConflict { original, new }),
            _ => Err(SchemaResolutionError::Inconsistency(
                "Encountered a composite schema where a single fragment was expected".into(),
            )),
        },
    }
}

fn kind_type(kind: &DereferencedSchemaKind) -> Option<SchemaType> {
    DereferencedSchema::from(kind.clone()).schema_type()
}

/// Merges an untyped core into a typed schema after checking that the
/// untyped side's format suits the type.
fn adopt_type(
    untyped: CoreContext,
    typed: DereferencedSchemaKind,
) -> CombineResult<DereferencedSchemaKind> {
    let schema_type = kind_type(&typed).ok_or_else(|| {
        SchemaResolutionError::Inconsistency(
            "Encountered a composite schema where a single fragment was expected".into(),
        )
    })?;
    if let Some(format) = &untyped.format {
        if !schema_type.accepts_format(format) {
            return Err(SchemaResolutionError::FormatConflict {
                original: format.clone(),
                new: schema_type.to_string(),
            });
        }
    }

    let mut schema = DereferencedSchema::from(typed);
    let typed_core = schema.core().clone();
    *schema.core_mut() = merge_core(untyped, typed_core, Some(schema_type))?;
    Ok(schema.kind)
}

fn merge_core(
    a: CoreContext,
    b: CoreContext,
    schema_type: Option<SchemaType>,
) -> CombineResult<CoreContext> {
    let format = match (a.format, b.format) {
        (Some(x), Some(y)) if x != y => {
            return Err(SchemaResolutionError::FormatConflict {
                original: x,
                new: y,
            })
        }
        (x, y) => x.or(y),
    };

    let permissions = match (a.permissions, b.permissions) {
        (Permissions::ReadWrite, other) | (other, Permissions::ReadWrite) => other,
        (x, y) if x == y => x,
        (x, y) => {
            return Err(SchemaResolutionError::AttributeConflict {
                schema_type,
                name: "permissions".into(),
                original: x.to_string(),
                new: y.to_string(),
            })
        }
    };

    Ok(CoreContext {
        format,
        required: a.required || b.required,
        nullable: a.nullable || b.nullable,
        permissions,
        deprecated: a.deprecated || b.deprecated,
        title: merge_attr(schema_type, "title", a.title, b.title)?,
        description: merge_attr(schema_type, "description", a.description, b.description)?,
        discriminator: merge_attr(schema_type, "discriminator", a.discriminator, b.discriminator)?,
        external_docs: merge_attr(schema_type, "externalDocs", a.external_docs, b.external_docs)?,
        allowed_values: merge_attr(schema_type, "enum", a.allowed_values, b.allowed_values)?,
        default: merge_attr(schema_type, "default", a.default, b.default)?,
        example: merge_attr(schema_type, "example", a.example, b.example)?,
    })
}

/// Unset loses to set; two different set values conflict.
fn merge_attr<T: PartialEq + Serialize>(
    schema_type: Option<SchemaType>,
    name: &str,
    original: Option<T>,
    new: Option<T>,
) -> CombineResult<Option<T>> {
    match (original, new) {
        (Some(x), Some(y)) if x != y => Err(SchemaResolutionError::AttributeConflict {
            schema_type,
            name: name.to_string(),
            original: render(&x),
            new: render(&y),
        }),
        (x, y) => Ok(x.or(y)),
    }
}

fn render<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => "<unrenderable>".to_string(),
    }
}

fn merge_string(a: StringContext, b: StringContext) -> CombineResult<StringContext> {
    let t = Some(SchemaType::String);
    Ok(StringContext {
        max_length: merge_attr(t, "maxLength", a.max_length, b.max_length)?,
        min_length: merge_attr(t, "minLength", a.min_length, b.min_length)?,
        pattern: merge_attr(t, "pattern", a.pattern, b.pattern)?,
        content_media_type: merge_attr(
            t,
            "contentMediaType",
            a.content_media_type,
            b.content_media_type,
        )?,
        content_encoding: merge_attr(t, "contentEncoding", a.content_encoding, b.content_encoding)?,
    })
}

fn merge_numeric(a: NumericContext, b: NumericContext) -> CombineResult<NumericContext> {
    let t = Some(SchemaType::Number);
    Ok(NumericContext {
        multiple_of: merge_attr(t, "multipleOf", a.multiple_of, b.multiple_of)?,
        maximum: merge_attr(t, "maximum", a.maximum, b.maximum)?,
        exclusive_maximum: merge_attr(t, "exclusiveMaximum", a.exclusive_maximum, b.exclusive_maximum)?,
        minimum: merge_attr(t, "minimum", a.minimum, b.minimum)?,
        exclusive_minimum: merge_attr(t, "exclusiveMinimum", a.exclusive_minimum, b.exclusive_minimum)?,
    })
}

fn merge_integer(a: IntegerContext, b: IntegerContext) -> CombineResult<IntegerContext> {
    let t = Some(SchemaType::Integer);
    Ok(IntegerContext {
        multiple_of: merge_attr(t, "multipleOf", a.multiple_of, b.multiple_of)?,
        maximum: merge_attr(t, "maximum", a.maximum, b.maximum)?,
        exclusive_maximum: merge_attr(t, "exclusiveMaximum", a.exclusive_maximum, b.exclusive_maximum)?,
        minimum: merge_attr(t, "minimum", a.minimum, b.minimum)?,
        exclusive_minimum: merge_attr(t, "exclusiveMinimum", a.exclusive_minimum, b.exclusive_minimum)?,
    })
}

fn merge_array(
    a: ArrayContext<DereferencedSchema>,
    b: ArrayContext<DereferencedSchema>,
) -> CombineResult<ArrayContext<DereferencedSchema>> {
    let t = Some(SchemaType::Array);
    let items = match (a.items, b.items) {
        (Some(x), Some(y)) => Some(Box::new(combine_pair(*x, *y)?)),
        (x, y) => x.or(y),
    };
    Ok(ArrayContext {
        items,
        max_items: merge_attr(t, "maxItems", a.max_items, b.max_items)?,
        min_items: merge_attr(t, "minItems", a.min_items, b.min_items)?,
        unique_items: merge_attr(t, "uniqueItems", a.unique_items, b.unique_items)?,
    })
}

fn merge_object(
    a: ObjectContext<DereferencedSchema>,
    b: ObjectContext<DereferencedSchema>,
) -> CombineResult<ObjectContext<DereferencedSchema>> {
    let t = Some(SchemaType::Object);

    let mut properties = a.properties;
    for (name, incoming) in b.properties {
        let merged = match properties.shift_remove(&name) {
            Some(existing) => combine_pair(existing, incoming)?,
            None => incoming,
        };
        properties.insert(name, merged);
    }

    let additional_properties = match (a.additional_properties, b.additional_properties) {
        (Some(AdditionalProperties::Schema(x)), Some(AdditionalProperties::Schema(y))) => Some(
            AdditionalProperties::Schema(Box::new(combine_pair(*x, *y)?)),
        ),
        (Some(AdditionalProperties::Allowed(x)), Some(AdditionalProperties::Allowed(y))) => {
            Some(AdditionalProperties::Allowed(merge_flag(t, "additionalProperties", x, y)?))
        }
        (Some(_), Some(_)) => {
            return Err(SchemaResolutionError::AttributeConflict {
                schema_type: t,
                name: "additionalProperties".into(),
                original: "boolean".into(),
                new: "schema".into(),
            })
        }
        (x, y) => x.or(y),
    };

    let mut required_undeclared = a.required_undeclared;
    for name in b.required_undeclared {
        if !required_undeclared.contains(&name) {
            required_undeclared.push(name);
        }
    }
    required_undeclared.retain(|name| match properties.get_mut(name) {
        Some(property) => {
            property.core_mut().required = true;
            false
        }
        None => true,
    });

    Ok(ObjectContext {
        properties,
        required_undeclared,
        additional_properties,
        max_properties: merge_attr(t, "maxProperties", a.max_properties, b.max_properties)?,
        min_properties: merge_attr(t, "minProperties", a.min_properties, b.min_properties)?,
    })
}

fn merge_flag(t: Option<SchemaType>, name: &str, a: bool, b: bool) -> CombineResult<bool> {
    merge_attr(t, name, Some(a), Some(b)).map(|v| v.unwrap_or(a))
}

fn extend_keys(target: &mut Vec<ComponentKey>, source: Vec<ComponentKey>) {
    for key in source {
        if !target.contains(&key) {
            target.push(key);
        }
    }
}

fn invalid_bounds(name: &str, message: String) -> SchemaResolutionError {
    SchemaResolutionError::InvalidBounds {
        name: name.to_string(),
        message,
    }
}

fn check_order<T: PartialOrd + std::fmt::Display>(
    lower_name: &str,
    lower: Option<T>,
    upper_name: &str,
    upper: Option<T>,
) -> CombineResult<()> {
    if let (Some(lo), Some(hi)) = (lower, upper) {
        if lo > hi {
            return Err(invalid_bounds(
                lower_name,
                format!("{} ({}) is greater than {} ({})", lower_name, lo, upper_name, hi),
            ));
        }
    }
    Ok(())
}

fn validate_bounds(schema: &DereferencedSchema) -> CombineResult<()> {
    match &schema.kind {
        DereferencedSchemaKind::String { string, .. } => {
            check_order("minLength", string.min_length, "maxLength", string.max_length)
        }
        DereferencedSchemaKind::Number { number, .. } => {
            if let Some(m) = number.multiple_of {
                if m <= 0.0 {
                    return Err(invalid_bounds("multipleOf", format!("{} must be positive", m)));
                }
            }
            check_order("minimum", number.minimum, "maximum", number.maximum)?;
            check_order(
                "exclusiveMinimum",
                number.exclusive_minimum,
                "exclusiveMaximum",
                number.exclusive_maximum,
            )
        }
        DereferencedSchemaKind::Integer { integer, .. } => {
            if let Some(m) = integer.multiple_of {
                if m <= 0 {
                    return Err(invalid_bounds("multipleOf", format!("{} must be positive", m)));
                }
            }
            check_order("minimum", integer.minimum, "maximum", integer.maximum)?;
            check_order(
                "exclusiveMinimum",
                integer.exclusive_minimum,
                "exclusiveMaximum",
                integer.exclusive_maximum,
            )
        }
        DereferencedSchemaKind::Array { array, .. } => {
            check_order("minItems", array.min_items, "maxItems", array.max_items)?;
            match &array.items {
                Some(items) => validate_bounds(items),
                None => Ok(()),
            }
        }
        DereferencedSchemaKind::Object { object, .. } => {
            check_order(
                "minProperties",
                object.min_properties,
                "maxProperties",
                object.max_properties,
            )?;
            for property in object.properties.values() {
                validate_bounds(property)?;
            }
            if let Some(AdditionalProperties::Schema(schema)) = &object.additional_properties {
                validate_bounds(schema)?;
            }
            Ok(())
        }
        DereferencedSchemaKind::Boolean { .. }
        | DereferencedSchemaKind::AllOf { .. }
        | DereferencedSchemaKind::OneOf { .. }
        | DereferencedSchemaKind::AnyOf { .. }
        | DereferencedSchemaKind::Not { .. }
        | DereferencedSchemaKind::Fragment { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::oas::schema::PropertySchema;

    fn schema(yaml: &str) -> Schema {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn combine(fragments: &[Schema]) -> AppResult<DereferencedSchema> {
        combine_fragments(fragments, &Components::new())
    }

    #[test]
    fn test_zero_fragments_is_unconstrained() {
        assert_eq!(combine(&[]).unwrap(), DereferencedSchema::any());
    }

    #[test]
    fn test_untyped_adopts_type() {
        let result = combine(&[
            schema("description: A name"),
            schema("type: string\nmaxLength: 5"),
        ])
        .unwrap();
        assert_eq!(result.schema_type(), Some(SchemaType::String));
        assert_eq!(result.core().description.as_deref(), Some("A name"));
    }

    #[test]
    fn test_format_checked_when_adopting_type() {
        let err = combine(&[schema("format: int64"), schema("type: string")]).unwrap_err();
        assert!(matches!(
            err,
            AppError::SchemaResolution(SchemaResolutionError::FormatConflict { .. })
        ));
    }

    #[test]
    fn test_disjoint_fields_are_order_independent() {
        let a = schema("type: string\nmaxLength: 5");
        let b = schema("type: string\npattern: '^[a-z]+$'");
        let ab = combine(&[a.clone(), b.clone()]).unwrap();
        let ba = combine(&[b, a]).unwrap();
        assert_eq!(ab.kind, ba.kind);
    }

    #[test]
    fn test_attribute_conflict_names_field() {
        let a = schema("type: string\nmaxLength: 5");
        let b = schema("type: string\nmaxLength: 10");
        for fragments in [[a.clone(), b.clone()], [b, a]] {
            let err = combine(&fragments).unwrap_err();
            match err {
                AppError::SchemaResolution(SchemaResolutionError::AttributeConflict {
                    name, ..
                }) => assert_eq!(name, "maxLength"),
                other => panic!("Unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_type_conflict() {
        let err = combine(&[schema("type: integer"), schema("type: string")]).unwrap_err();
        match err {
            AppError::SchemaResolution(SchemaResolutionError::TypeConflict { original, new }) => {
                assert_eq!(original, SchemaType::Integer);
                assert_eq!(new, SchemaType::String);
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn test_any_of_is_unsupported() {
        let err = combine(&[schema("anyOf: [{type: string}, {type: integer}]")]).unwrap_err();
        assert!(matches!(
            err,
            AppError::SchemaResolution(SchemaResolutionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_all_of_is_flattened_and_properties_merge() {
        let result = combine(&[schema(
            r#"
allOf:
  - type: object
    required: [id]
    properties:
      id: {type: integer}
      name: {type: string}
  - type: object
    required: [name]
    properties:
      name: {type: string, maxLength: 20}
"#,
        )])
        .unwrap();
        let DereferencedSchemaKind::Object { object, .. } = &result.kind else {
            panic!("Expected object");
        };
        assert!(object.properties["id"].is_required());
        assert!(object.properties["name"].is_required());
        let DereferencedSchemaKind::String { string, .. } = &object.properties["name"].kind else {
            panic!("Expected string property");
        };
        assert_eq!(string.max_length, Some(20));
    }

    #[test]
    fn test_reference_operand_is_resolved() {
        let components: Components = serde_yaml::from_str(
            r#"
schemas:
  Base:
    type: object
    properties:
      id: {type: integer}
"#,
        )
        .unwrap();
        let fragments = vec![
            Schema::reference(ComponentKey::new("Base").unwrap()),
            schema("type: object\nproperties:\n  extra: {type: boolean}"),
        ];
        let result = combine_fragments(&fragments, &components).unwrap();
        let DereferencedSchemaKind::Object { object, .. } = &result.kind else {
            panic!("Expected object");
        };
        assert_eq!(object.properties.len(), 2);
        assert_eq!(result.component_keys[0].as_str(), "Base");

        let missing = vec![Schema::reference(ComponentKey::new("Nope").unwrap())];
        let err = combine_fragments(&missing, &components).unwrap_err();
        assert!(matches!(err, AppError::MissingReference { .. }));
    }

    #[test]
    fn test_invalid_bounds_rejected_on_resolve() {
        let err = combine(&[
            schema("type: integer\nminimum: 10"),
            schema("type: integer\nmaximum: 5"),
        ])
        .unwrap_err();
        match err {
            AppError::SchemaResolution(SchemaResolutionError::InvalidBounds { name, .. }) => {
                assert_eq!(name, "minimum")
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn test_required_is_never_downgraded() {
        let result = combine(&[Schema::string(), Schema::string().optional()]).unwrap();
        assert!(result.is_required());
        let result = combine(&[Schema::string().optional()]).unwrap();
        assert!(!result.is_required());
    }

    #[test]
    fn test_nested_all_of_property_is_order_independent() {
        let a = schema("properties:\n  name:\n    allOf: [{type: string}]\n");
        let b = schema("properties:\n  name: {type: string, maxLength: 5}\n");
        let ab = combine(&[a.clone(), b.clone()]).unwrap();
        let ba = combine(&[b, a]).unwrap();
        assert_eq!(ab.kind, ba.kind);

        let DereferencedSchemaKind::Object { object, .. } = &ab.kind else {
            panic!("Expected object");
        };
        let name = &object.properties["name"];
        assert!(!name.is_required());
        let DereferencedSchemaKind::String { string, .. } = &name.kind else {
            panic!("Expected string property, got {:?}", name.kind);
        };
        assert_eq!(string.max_length, Some(5));
    }

    #[test]
    fn test_resolve_flattens_nested_all_of() {
        let result = combine(&[schema(
            r#"
type: object
properties:
  tags:
    type: array
    items:
      allOf:
        - {type: string}
        - {maxLength: 8}
"#,
        )])
        .unwrap();
        let DereferencedSchemaKind::Object { object, .. } = &result.kind else {
            panic!("Expected object");
        };
        let DereferencedSchemaKind::Array { array, .. } = &object.properties["tags"].kind else {
            panic!("Expected array property");
        };
        let items = array.items.as_deref().unwrap();
        let DereferencedSchemaKind::String { string, .. } = &items.kind else {
            panic!("Expected flattened string items, got {:?}", items.kind);
        };
        assert_eq!(string.max_length, Some(8));
    }

    #[test]
    fn test_one_of_rejected_on_either_side() {
        let choice = schema("oneOf: [{type: string}, {type: integer}]");
        let typed = schema("type: string");
        for fragments in [[choice.clone(), typed.clone()], [typed, choice]] {
            let wrapped: Vec<Schema> = fragments
                .into_iter()
                .map(|s| Schema::object([("value".to_string(), s)]))
                .collect();
            let err = combine(&wrapped).unwrap_err();
            assert!(matches!(
                err,
                AppError::SchemaResolution(SchemaResolutionError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn test_required_names_meet_their_property() {
        let result = combine(&[
            schema("type: object\nrequired: [id]\n"),
            schema("type: object\nproperties:\n  id: {type: integer}\n"),
        ])
        .unwrap();
        let DereferencedSchemaKind::Object { object, .. } = &result.kind else {
            panic!("Expected object");
        };
        assert!(object.properties["id"].is_required());
        assert!(object.required_undeclared.is_empty());
    }
}
