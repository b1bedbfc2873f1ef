#![deny(missing_docs)]

//! # Local Dereferencing
//!
//! Replaces every internal reference in a tree with the component it names,
//! producing `Dereferenced*` views. Reference chains collapse to their final
//! target; the names of the traversed components are kept as provenance.
//!
//! External references are never loaded here: they fail with
//! `RemoteReferenceUnsupported`. See `oas::external` for loading them.

use crate::error::{AppError, AppResult};
use crate::oas::components::{ComponentGroup, ComponentKey, ComponentKind, Components};
use crate::oas::model::{
    Callbacks, Document, Encoding, Example, Header, HttpMethod, Link, MediaType, Operation,
    Parameter, PathItem, RequestBody, Response, SecurityRequirement, SecurityScheme,
};
use crate::oas::path::CodingPath;
use crate::oas::reference::{RefOr, Reference, ReferenceTarget};
use crate::oas::schema::{
    AdditionalProperties, ArrayContext, CoreContext, IntegerContext, NumericContext,
    ObjectContext, PropertySchema, Schema, SchemaType, StringContext,
};
use indexmap::IndexMap;
use tracing::trace;

/// Traversal state for one dereferencing pass.
///
/// Holds the registry (read-only), the current coding path and the stack of
/// components being expanded, which is used to detect reference cycles.
pub struct DereferenceContext<'a> {
    components: &'a Components,
    path: CodingPath,
    visiting: Vec<(ComponentGroup, ComponentKey)>,
}

impl<'a> DereferenceContext<'a> {
    /// Starts a pass at the document root.
    pub fn new(components: &'a Components) -> Self {
        Self::at(components, CodingPath::root())
    }

    /// Starts a pass at `path`.
    pub fn at(components: &'a Components, path: CodingPath) -> Self {
        Self {
            components,
            path,
            visiting: Vec::new(),
        }
    }

    /// The registry references are resolved against.
    pub fn components(&self) -> &'a Components {
        self.components
    }

    /// The current location.
    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    /// Runs `f` with `segment` appended to the current path.
    pub fn scoped<R>(
        &mut self,
        segment: impl Into<String>,
        f: impl FnOnce(&mut Self) -> AppResult<R>,
    ) -> AppResult<R> {
        self.path.push(segment);
        let result = f(self);
        self.path.pop();
        result
    }

    /// Resolves `reference` and dereferences its target, recording the
    /// component key as provenance.
    pub fn follow<T>(&mut self, reference: &Reference<T>) -> AppResult<T::Output>
    where
        T: ComponentKind + LocallyDereferenceable,
        T::Output: Provenance,
    {
        let key = match reference.target() {
            ReferenceTarget::External(url) => {
                return Err(AppError::RemoteReferenceUnsupported {
                    reference: url.clone(),
                    path: self.path.clone(),
                })
            }
            ReferenceTarget::Internal(key) => key.clone(),
        };

        let value = self
            .components
            .get::<T>(&key)
            .ok_or_else(|| AppError::MissingReference {
                group: T::GROUP,
                key: key.to_string(),
                path: self.path.clone(),
            })?;

        let frame = (T::GROUP, key.clone());
        if self.visiting.contains(&frame) {
            return Err(AppError::ReferenceCycle {
                group: T::GROUP,
                key: key.to_string(),
                path: self.path.clone(),
            });
        }

        trace!(group = %T::GROUP, key = %key, path = %self.path, "dereferencing component");
        self.visiting.push(frame);
        let result = value.dereferenced_in(self);
        self.visiting.pop();

        let mut output = result?;
        output.component_keys_mut().insert(0, key);
        Ok(output)
    }
}

/// A node that can be locally dereferenced into a reference-free view.
pub trait LocallyDereferenceable {
    /// The reference-free view.
    type Output;

    /// Dereferences within an ongoing pass.
    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output>;

    /// Dereferences against `components`, starting at the document root.
    fn dereferenced(&self, components: &Components) -> AppResult<Self::Output> {
        self.dereferenced_in(&mut DereferenceContext::new(components))
    }
}

/// Dereferenced views that remember which components they came from.
pub trait Provenance {
    /// Component keys traversed to reach this value, outermost first.
    fn component_keys(&self) -> &[ComponentKey];

    /// Mutable access used while following references.
    fn component_keys_mut(&mut self) -> &mut Vec<ComponentKey>;
}

macro_rules! provenance {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Provenance for $ty {
                fn component_keys(&self) -> &[ComponentKey] {
                    &self.component_keys
                }

                fn component_keys_mut(&mut self) -> &mut Vec<ComponentKey> {
                    &mut self.component_keys
                }
            }
        )*
    };
}

impl<T> LocallyDereferenceable for RefOr<T>
where
    T: ComponentKind + LocallyDereferenceable,
    T::Output: Provenance,
{
    type Output = T::Output;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        match self {
            RefOr::Ref(reference) => ctx.follow(reference),
            RefOr::T(value) => value.dereferenced_in(ctx),
        }
    }
}

impl Components {
    /// Resolves `reference` and fully dereferences the component it names.
    pub fn dereferenced<T>(&self, reference: &Reference<T>) -> AppResult<T::Output>
    where
        T: ComponentKind + LocallyDereferenceable,
        T::Output: Provenance,
    {
        DereferenceContext::new(self).follow(reference)
    }
}

fn dereference_map<V>(
    ctx: &mut DereferenceContext<'_>,
    segment: &str,
    values: &IndexMap<String, V>,
) -> AppResult<IndexMap<String, V::Output>>
where
    V: LocallyDereferenceable,
{
    ctx.scoped(segment, |ctx| {
        values
            .iter()
            .map(|(name, value)| {
                ctx.scoped(name.as_str(), |ctx| value.dereferenced_in(ctx))
                    .map(|output| (name.clone(), output))
            })
            .collect()
    })
}

fn dereference_list<V>(
    ctx: &mut DereferenceContext<'_>,
    segment: &str,
    values: &[V],
) -> AppResult<Vec<V::Output>>
where
    V: LocallyDereferenceable,
{
    ctx.scoped(segment, |ctx| {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| ctx.scoped(index.to_string(), |ctx| value.dereferenced_in(ctx)))
            .collect()
    })
}

fn dereference_option<V>(
    ctx: &mut DereferenceContext<'_>,
    segment: &str,
    value: Option<&V>,
) -> AppResult<Option<V::Output>>
where
    V: LocallyDereferenceable,
{
    value
        .map(|v| ctx.scoped(segment, |ctx| v.dereferenced_in(ctx)))
        .transpose()
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// The shape of a dereferenced schema: every variant of [`Schema`] except
/// `Reference`, with reference-free children.
#[derive(Debug, Clone, PartialEq)]
pub enum DereferencedSchemaKind {
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
        object: ObjectContext<DereferencedSchema>,
    },
    /// `type: array`
    Array {
        /// Shared attributes.
        core: CoreContext,
        /// Array constraints.
        array: ArrayContext<DereferencedSchema>,
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
        /// Sub-schemas.
        of: Vec<DereferencedSchema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `oneOf`
    OneOf {
        /// Sub-schemas.
        of: Vec<DereferencedSchema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `anyOf`
    AnyOf {
        /// Sub-schemas.
        of: Vec<DereferencedSchema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// `not`
    Not {
        /// Negated schema.
        not: Box<DereferencedSchema>,
        /// Shared attributes.
        core: CoreContext,
    },
    /// Untyped fragment.
    Fragment {
        /// Shared attributes.
        core: CoreContext,
    },
}

/// A schema with every reference replaced by its target.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedSchema {
    /// The schema shape.
    pub kind: DereferencedSchemaKind,
    /// Schema components traversed to reach this schema, outermost first.
    pub component_keys: Vec<ComponentKey>,
}

provenance!(DereferencedSchema);

impl From<DereferencedSchemaKind> for DereferencedSchema {
    fn from(kind: DereferencedSchemaKind) -> Self {
        Self {
            kind,
            component_keys: Vec::new(),
        }
    }
}

impl DereferencedSchema {
    /// The universal, unconstrained schema.
    pub fn any() -> Self {
        DereferencedSchemaKind::Fragment {
            core: CoreContext::default(),
        }
        .into()
    }

    /// Shared attributes.
    pub fn core(&self) -> &CoreContext {
        match &self.kind {
            DereferencedSchemaKind::Boolean { core }
            | DereferencedSchemaKind::Object { core, .. }
            | DereferencedSchemaKind::Array { core, .. }
            | DereferencedSchemaKind::Number { core, .. }
            | DereferencedSchemaKind::Integer { core, .. }
            | DereferencedSchemaKind::String { core, .. }
            | DereferencedSchemaKind::AllOf { core, .. }
            | DereferencedSchemaKind::OneOf { core, .. }
            | DereferencedSchemaKind::AnyOf { core, .. }
            | DereferencedSchemaKind::Not { core, .. }
            | DereferencedSchemaKind::Fragment { core } => core,
        }
    }

    /// Mutable shared attributes.
    pub fn core_mut(&mut self) -> &mut CoreContext {
        match &mut self.kind {
            DereferencedSchemaKind::Boolean { core }
            | DereferencedSchemaKind::Object { core, .. }
            | DereferencedSchemaKind::Array { core, .. }
            | DereferencedSchemaKind::Number { core, .. }
            | DereferencedSchemaKind::Integer { core, .. }
            | DereferencedSchemaKind::String { core, .. }
            | DereferencedSchemaKind::AllOf { core, .. }
            | DereferencedSchemaKind::OneOf { core, .. }
            | DereferencedSchemaKind::AnyOf { core, .. }
            | DereferencedSchemaKind::Not { core, .. }
            | DereferencedSchemaKind::Fragment { core } => core,
        }
    }

    /// Returns the schema with its required flag replaced.
    pub fn with_required(mut self, required: bool) -> Self {
        self.core_mut().required = required;
        self
    }

    /// The concrete type, if any.
    pub fn schema_type(&self) -> Option<SchemaType> {
        match &self.kind {
            DereferencedSchemaKind::Boolean { .. } => Some(SchemaType::Boolean),
            DereferencedSchemaKind::Object { .. } => Some(SchemaType::Object),
            DereferencedSchemaKind::Array { .. } => Some(SchemaType::Array),
            DereferencedSchemaKind::Number { .. } => Some(SchemaType::Number),
            DereferencedSchemaKind::Integer { .. } => Some(SchemaType::Integer),
            DereferencedSchemaKind::String { .. } => Some(SchemaType::String),
            _ => None,
        }
    }

    /// Converts back into an inline [`Schema`], dropping provenance.
    pub fn to_schema(&self) -> Schema {
        match &self.kind {
            DereferencedSchemaKind::Boolean { core } => Schema::Boolean { core: core.clone() },
            DereferencedSchemaKind::Object { core, object } => Schema::Object {
                core: core.clone(),
                object: ObjectContext {
                    properties: object
                        .properties
                        .iter()
                        .map(|(name, schema)| (name.clone(), schema.to_schema()))
                        .collect(),
                    required_undeclared: object.required_undeclared.clone(),
                    additional_properties: object.additional_properties.as_ref().map(
                        |additional| match additional {
                            AdditionalProperties::Allowed(flag) => {
                                AdditionalProperties::Allowed(*flag)
                            }
                            AdditionalProperties::Schema(schema) => {
                                AdditionalProperties::Schema(Box::new(schema.to_schema()))
                            }
                        },
                    ),
                    max_properties: object.max_properties,
                    min_properties: object.min_properties,
                },
            },
            DereferencedSchemaKind::Array { core, array } => Schema::Array {
                core: core.clone(),
                array: ArrayContext {
                    items: array.items.as_ref().map(|i| Box::new(i.to_schema())),
                    max_items: array.max_items,
                    min_items: array.min_items,
                    unique_items: array.unique_items,
                },
            },
            DereferencedSchemaKind::Number { core, number } => Schema::Number {
                core: core.clone(),
                number: number.clone(),
            },
            DereferencedSchemaKind::Integer { core, integer } => Schema::Integer {
                core: core.clone(),
                integer: integer.clone(),
            },
            DereferencedSchemaKind::String { core, string } => Schema::String {
                core: core.clone(),
                string: string.clone(),
            },
            DereferencedSchemaKind::AllOf { of, core } => Schema::AllOf {
                of: of.iter().map(DereferencedSchema::to_schema).collect(),
                core: core.clone(),
            },
            DereferencedSchemaKind::OneOf { of, core } => Schema::OneOf {
                of: of.iter().map(DereferencedSchema::to_schema).collect(),
                core: core.clone(),
            },
            DereferencedSchemaKind::AnyOf { of, core } => Schema::AnyOf {
                of: of.iter().map(DereferencedSchema::to_schema).collect(),
                core: core.clone(),
            },
            DereferencedSchemaKind::Not { not, core } => Schema::Not {
                not: Box::new(not.to_schema()),
                core: core.clone(),
            },
            DereferencedSchemaKind::Fragment { core } => Schema::Fragment { core: core.clone() },
        }
    }
}

impl PropertySchema for DereferencedSchema {
    fn is_required(&self) -> bool {
        self.core().required
    }
}

impl LocallyDereferenceable for Schema {
    type Output = DereferencedSchema;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<DereferencedSchema> {
        let kind = match self {
            Schema::Reference {
                reference,
                required,
            } => {
                let target = ctx.follow(reference)?;
                return Ok(target.with_required(*required));
            }
            Schema::Boolean { core } => DereferencedSchemaKind::Boolean { core: core.clone() },
            Schema::Object { core, object } => DereferencedSchemaKind::Object {
                core: core.clone(),
                object: dereference_object(ctx, object)?,
            },
            Schema::Array { core, array } => DereferencedSchemaKind::Array {
                core: core.clone(),
                array: ArrayContext {
                    items: dereference_option(ctx, "items", array.items.as_deref())?
                        .map(Box::new),
                    max_items: array.max_items,
                    min_items: array.min_items,
                    unique_items: array.unique_items,
                },
            },
            Schema::Number { core, number } => DereferencedSchemaKind::Number {
                core: core.clone(),
                number: number.clone(),
            },
            Schema::Integer { core, integer } => DereferencedSchemaKind::Integer {
                core: core.clone(),
                integer: integer.clone(),
            },
            Schema::String { core, string } => DereferencedSchemaKind::String {
                core: core.clone(),
                string: string.clone(),
            },
            Schema::AllOf { of, core } => DereferencedSchemaKind::AllOf {
                of: dereference_list(ctx, "allOf", of)?,
                core: core.clone(),
            },
            Schema::OneOf { of, core } => DereferencedSchemaKind::OneOf {
                of: dereference_list(ctx, "oneOf", of)?,
                core: core.clone(),
            },
            Schema::AnyOf { of, core } => DereferencedSchemaKind::AnyOf {
                of: dereference_list(ctx, "anyOf", of)?,
                core: core.clone(),
            },
            Schema::Not { not, core } => DereferencedSchemaKind::Not {
                not: Box::new(ctx.scoped("not", |ctx| not.dereferenced_in(ctx))?),
                core: core.clone(),
            },
            Schema::Fragment { core } => DereferencedSchemaKind::Fragment { core: core.clone() },
        };
        Ok(kind.into())
    }
}

fn dereference_object(
    ctx: &mut DereferenceContext<'_>,
    object: &ObjectContext,
) -> AppResult<ObjectContext<DereferencedSchema>> {
    let properties = dereference_map(ctx, "properties", &object.properties)?;
    let additional_properties = match &object.additional_properties {
        None => None,
        Some(AdditionalProperties::Allowed(flag)) => Some(AdditionalProperties::Allowed(*flag)),
        Some(AdditionalProperties::Schema(schema)) => Some(AdditionalProperties::Schema(
            Box::new(ctx.scoped("additionalProperties", |ctx| schema.dereferenced_in(ctx))?),
        )),
    };
    Ok(ObjectContext {
        properties,
        required_undeclared: object.required_undeclared.clone(),
        additional_properties,
        max_properties: object.max_properties,
        min_properties: object.min_properties,
    })
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A dereferenced Example Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedExample {
    /// The example.
    pub underlying: Example,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A dereferenced Link Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedLink {
    /// The link.
    pub underlying: Link,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A dereferenced Media Type Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedMediaType {
    /// The media type as written.
    pub underlying: MediaType,
    /// Dereferenced schema.
    pub schema: Option<DereferencedSchema>,
    /// Dereferenced examples.
    pub examples: IndexMap<String, DereferencedExample>,
    /// Dereferenced encodings.
    pub encoding: IndexMap<String, DereferencedEncoding>,
}

/// A dereferenced Encoding Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedEncoding {
    /// The encoding as written.
    pub underlying: Encoding,
    /// Dereferenced headers.
    pub headers: IndexMap<String, DereferencedHeader>,
}

/// A dereferenced Header Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedHeader {
    /// The header as written.
    pub underlying: Header,
    /// Dereferenced schema.
    pub schema: Option<DereferencedSchema>,
    /// Dereferenced content.
    pub content: IndexMap<String, DereferencedMediaType>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A dereferenced Parameter Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedParameter {
    /// The parameter as written.
    pub underlying: Parameter,
    /// Dereferenced schema.
    pub schema: Option<DereferencedSchema>,
    /// Dereferenced content.
    pub content: IndexMap<String, DereferencedMediaType>,
    /// Dereferenced examples.
    pub examples: IndexMap<String, DereferencedExample>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

impl DereferencedParameter {
    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.underlying.name
    }

    /// `(name, location)` identity.
    pub fn identity(&self) -> (String, crate::oas::model::ParameterLocation) {
        self.underlying.identity()
    }
}

/// A dereferenced Request Body Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedRequestBody {
    /// The request body as written.
    pub underlying: RequestBody,
    /// Dereferenced content.
    pub content: IndexMap<String, DereferencedMediaType>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A dereferenced Response Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedResponse {
    /// The response as written.
    pub underlying: Response,
    /// Dereferenced headers.
    pub headers: IndexMap<String, DereferencedHeader>,
    /// Dereferenced content.
    pub content: IndexMap<String, DereferencedMediaType>,
    /// Dereferenced links.
    pub links: IndexMap<String, DereferencedLink>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A dereferenced Callback Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedCallbacks {
    /// The callbacks as written.
    pub underlying: Callbacks,
    /// Dereferenced path items by expression.
    pub paths: IndexMap<String, DereferencedPathItem>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

/// A security requirement whose scheme names have been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedSecurityRequirement {
    /// The requirement as written.
    pub underlying: SecurityRequirement,
    /// Resolved schemes and their scopes, by name.
    pub schemes: IndexMap<String, (SecurityScheme, Vec<String>)>,
}

/// A dereferenced Operation Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedOperation {
    /// The operation as written.
    pub underlying: Operation,
    /// Dereferenced parameters.
    pub parameters: Vec<DereferencedParameter>,
    /// Dereferenced request body.
    pub request_body: Option<DereferencedRequestBody>,
    /// Dereferenced responses by status code.
    pub responses: IndexMap<String, DereferencedResponse>,
    /// Dereferenced callbacks.
    pub callbacks: IndexMap<String, DereferencedCallbacks>,
    /// Resolved security requirements, if the operation overrides them.
    pub security: Option<Vec<DereferencedSecurityRequirement>>,
}

/// A dereferenced Path Item Object.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedPathItem {
    /// The path item as written.
    pub underlying: PathItem,
    /// Dereferenced path-level parameters.
    pub parameters: Vec<DereferencedParameter>,
    /// Dereferenced operations in document order.
    pub operations: IndexMap<HttpMethod, DereferencedOperation>,
    /// Provenance.
    pub component_keys: Vec<ComponentKey>,
}

provenance!(
    DereferencedExample,
    DereferencedLink,
    DereferencedHeader,
    DereferencedParameter,
    DereferencedRequestBody,
    DereferencedResponse,
    DereferencedCallbacks,
    DereferencedPathItem,
);

impl LocallyDereferenceable for Example {
    type Output = DereferencedExample;

    fn dereferenced_in(&self, _ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedExample {
            underlying: self.clone(),
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for Link {
    type Output = DereferencedLink;

    fn dereferenced_in(&self, _ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedLink {
            underlying: self.clone(),
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for MediaType {
    type Output = DereferencedMediaType;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedMediaType {
            underlying: self.clone(),
            schema: dereference_option(ctx, "schema", self.schema.as_ref())?,
            examples: dereference_map(ctx, "examples", &self.examples)?,
            encoding: dereference_map(ctx, "encoding", &self.encoding)?,
        })
    }
}

impl LocallyDereferenceable for Encoding {
    type Output = DereferencedEncoding;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedEncoding {
            underlying: self.clone(),
            headers: dereference_map(ctx, "headers", &self.headers)?,
        })
    }
}

impl LocallyDereferenceable for Header {
    type Output = DereferencedHeader;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedHeader {
            underlying: self.clone(),
            schema: dereference_option(ctx, "schema", self.schema.as_ref())?,
            content: dereference_map(ctx, "content", &self.content)?,
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for Parameter {
    type Output = DereferencedParameter;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedParameter {
            underlying: self.clone(),
            schema: dereference_option(ctx, "schema", self.schema.as_ref())?,
            content: dereference_map(ctx, "content", &self.content)?,
            examples: dereference_map(ctx, "examples", &self.examples)?,
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for RequestBody {
    type Output = DereferencedRequestBody;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedRequestBody {
            underlying: self.clone(),
            content: dereference_map(ctx, "content", &self.content)?,
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for Response {
    type Output = DereferencedResponse;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        Ok(DereferencedResponse {
            underlying: self.clone(),
            headers: dereference_map(ctx, "headers", &self.headers)?,
            content: dereference_map(ctx, "content", &self.content)?,
            links: dereference_map(ctx, "links", &self.links)?,
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for Callbacks {
    type Output = DereferencedCallbacks;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        let paths = self
            .0
            .iter()
            .map(|(expression, item)| {
                ctx.scoped(expression.as_str(), |ctx| item.dereferenced_in(ctx))
                    .map(|output| (expression.clone(), output))
            })
            .collect::<AppResult<_>>()?;
        Ok(DereferencedCallbacks {
            underlying: self.clone(),
            paths,
            component_keys: Vec::new(),
        })
    }
}

impl LocallyDereferenceable for SecurityRequirement {
    type Output = DereferencedSecurityRequirement;

    /// Resolves every scheme name against `securitySchemes`; unknown names
    /// are an inconsistency at `<path>/<scheme>`.
    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        let mut schemes = IndexMap::new();
        for (name, reference, scopes) in self.references() {
            let scheme = reference
                .ok()
                .and_then(|r| ctx.components().lookup(&r))
                .ok_or_else(|| AppError::Inconsistency {
                    message: format!(
                        "Found Security Requirement referencing security scheme '{}' which is not found in the Components Object",
                        name
                    ),
                    path: ctx.path().appending(name),
                })?;
            schemes.insert(name.to_string(), (scheme.clone(), scopes.to_vec()));
        }
        Ok(DereferencedSecurityRequirement {
            underlying: self.clone(),
            schemes,
        })
    }
}

impl LocallyDereferenceable for Operation {
    type Output = DereferencedOperation;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        let security = match &self.security {
            Some(requirements) => Some(ctx.scoped("security", |ctx| {
                requirements
                    .iter()
                    .map(|r| r.dereferenced_in(ctx))
                    .collect::<AppResult<Vec<_>>>()
            })?),
            None => None,
        };
        Ok(DereferencedOperation {
            underlying: self.clone(),
            parameters: dereference_list(ctx, "parameters", &self.parameters)?,
            request_body: dereference_option(ctx, "requestBody", self.request_body.as_ref())?,
            responses: dereference_map(ctx, "responses", &self.responses)?,
            callbacks: dereference_map(ctx, "callbacks", &self.callbacks)?,
            security,
        })
    }
}

impl LocallyDereferenceable for PathItem {
    type Output = DereferencedPathItem;

    fn dereferenced_in(&self, ctx: &mut DereferenceContext<'_>) -> AppResult<Self::Output> {
        let parameters = dereference_list(ctx, "parameters", &self.parameters)?;
        let mut operations = IndexMap::new();
        for (method, operation) in self.operations() {
            let dereferenced =
                ctx.scoped(method.to_string(), |ctx| operation.dereferenced_in(ctx))?;
            operations.insert(method, dereferenced);
        }
        Ok(DereferencedPathItem {
            underlying: self.clone(),
            parameters,
            operations,
            component_keys: Vec::new(),
        })
    }
}

/// A fully dereferenced document.
///
/// Borrows the document it was produced from; the Components Object stays
/// owned by that document.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedDocument<'a> {
    /// The document as written.
    pub underlying: &'a Document,
    /// Dereferenced paths.
    pub paths: IndexMap<String, DereferencedPathItem>,
    /// Dereferenced webhooks.
    pub webhooks: IndexMap<String, DereferencedPathItem>,
    /// Resolved document-level security requirements.
    pub security: Vec<DereferencedSecurityRequirement>,
}

impl<'a> DereferencedDocument<'a> {
    /// The registry of the underlying document.
    pub fn components(&self) -> &'a Components {
        &self.underlying.components
    }
}

impl Document {
    /// Dereferences every internal reference in the document.
    ///
    /// Fails on the first missing, external or cyclic reference, and on any
    /// security requirement naming an undefined security scheme.
    pub fn locally_dereferenced(&self) -> AppResult<DereferencedDocument<'_>> {
        let mut ctx = DereferenceContext::new(&self.components);
        let paths = dereference_map(&mut ctx, "paths", &self.paths)?;
        let webhooks = dereference_map(&mut ctx, "webhooks", &self.webhooks)?;
        let security = ctx.scoped("security", |ctx| {
            self.security
                .iter()
                .map(|r| r.dereferenced_in(ctx))
                .collect::<AppResult<Vec<_>>>()
        })?;
        Ok(DereferencedDocument {
            underlying: self,
            paths,
            webhooks,
            security,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(yaml: &str) -> Components {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_schema_without_references_is_unchanged() {
        let schema: Schema = serde_yaml::from_str(
            r#"
type: object
required: [id]
properties:
  id: {type: integer}
  tags: {type: array, items: {type: string}}
"#,
        )
        .unwrap();
        let dereferenced = schema.dereferenced(&Components::new()).unwrap();
        assert_eq!(dereferenced.to_schema(), schema);
        assert!(dereferenced.component_keys.is_empty());
    }

    #[test]
    fn test_reference_chain_collapses_with_provenance() {
        let registry = components(
            r#"
schemas:
  Alias:
    $ref: '#/components/schemas/Name'
  Name:
    type: string
    maxLength: 5
"#,
        );
        let schema = Schema::reference(ComponentKey::new("Alias").unwrap());
        let dereferenced = schema.dereferenced(&registry).unwrap();
        assert_eq!(
            dereferenced.to_schema(),
            registry.schemas[&ComponentKey::new("Name").unwrap()]
        );
        let keys: Vec<&str> = dereferenced
            .component_keys
            .iter()
            .map(ComponentKey::as_str)
            .collect();
        assert_eq!(keys, vec!["Alias", "Name"]);
    }

    #[test]
    fn test_reference_applies_its_required_flag() {
        let registry = components("schemas:\n  Name: {type: string}\n");
        let schema = Schema::reference(ComponentKey::new("Name").unwrap()).optional();
        let dereferenced = schema.dereferenced(&registry).unwrap();
        assert!(!dereferenced.is_required());
    }

    #[test]
    fn test_missing_reference_reports_location() {
        let schema: Schema = serde_yaml::from_str(
            r#"
type: object
properties:
  owner:
    $ref: '#/components/schemas/missing'
"#,
        )
        .unwrap();
        let err = schema.dereferenced(&Components::new()).unwrap_err();
        match err {
            AppError::MissingReference { group, key, path } => {
                assert_eq!(group, ComponentGroup::Schemas);
                assert_eq!(key, "missing");
                assert_eq!(path.to_string(), "properties/owner");
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn test_external_reference_is_rejected() {
        let schema = Schema::Reference {
            reference: Reference::external("https://example.com/pet.yaml"),
            required: true,
        };
        let err = schema.dereferenced(&Components::new()).unwrap_err();
        assert!(matches!(err, AppError::RemoteReferenceUnsupported { .. }));
    }

    #[test]
    fn test_self_referential_schema_is_a_cycle() {
        let registry = components(
            r#"
schemas:
  Node:
    type: object
    properties:
      next:
        $ref: '#/components/schemas/Node'
"#,
        );
        let err = registry
            .dereferenced(&Reference::<Schema>::internal(
                ComponentKey::new("Node").unwrap(),
            ))
            .unwrap_err();
        match err {
            AppError::ReferenceCycle { key, path, .. } => {
                assert_eq!(key, "Node");
                assert_eq!(path.to_string(), "properties/next");
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parameter_reference_resolves() {
        let registry = components(
            r#"
parameters:
  Limit:
    name: limit
    in: query
    schema: {type: integer}
"#,
        );
        let param: RefOr<Parameter> =
            serde_yaml::from_str("$ref: '#/components/parameters/Limit'").unwrap();
        let dereferenced = param.dereferenced(&registry).unwrap();
        assert_eq!(dereferenced.name(), "limit");
        assert_eq!(dereferenced.component_keys[0].as_str(), "Limit");
        assert_eq!(
            dereferenced.schema.unwrap().schema_type(),
            Some(SchemaType::Integer)
        );
    }
}
