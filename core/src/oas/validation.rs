#![deny(missing_docs)]

//! # OpenAPI Validation
//!
//! A rule engine for structural checks over a whole [`Document`].
//!
//! A rule is a [`Validation<T>`]: a predicate and a check over a
//! [`ValidationContext`] for one node kind `T`. The [`Validator`] walks every
//! node of the document (each model type implements [`Visit`]) and runs each
//! rule whose kind matches the node, so rule authors never write traversal
//! code.
//!
//! Default rules:
//! - Tag names must be unique.
//! - Parameters must be unique by `(name, in)` within a Path Item and within an Operation.
//! - Operation ids must be unique across paths and webhooks.
//! - Every internal reference must name an existing component.
//! - Server variable enums, when present, must be non-empty and contain the default.
//! - Server URL placeholders must name declared variables.
//! - Parameter styles must suit their location; path parameters must be required.
//! - Security requirements must name defined security schemes.
//!
//! Default warnings:
//! - The `openapi` version should be 3.0.x or 3.1.x.
//! - Operations should define at least one response.

use crate::error::{AppError, AppResult};
use crate::oas::components::{ComponentKind, Components};
use crate::oas::model::{
    Callbacks, Document, Encoding, Example, Header, Info, Link, MediaType, Operation, Parameter,
    ParameterLocation, PathItem, RequestBody, Response, SecurityRequirement, SecurityScheme,
    Server, ServerVariable, Tag,
};
use crate::oas::path::CodingPath;
use crate::oas::reference::{RefOr, Reference};
use crate::oas::schema::{AdditionalProperties, Schema};
use indexmap::IndexMap;
use regex::Regex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// What is wrong.
    pub reason: String,
    /// Where it is wrong.
    pub path: CodingPath,
}

impl ValidationError {
    /// Creates an error at `path`.
    pub fn new(reason: impl Into<String>, path: CodingPath) -> Self {
        Self {
            reason: reason.into(),
            path,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at path: {}", self.reason, self.path)
    }
}

impl std::error::Error for ValidationError {}

/// Every error found by one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrorCollection {
    /// The errors, in traversal order.
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ValidationErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for ValidationErrorCollection {}

/// Whether a failed rule is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Always fails validation.
    Error,
    /// Fails validation only in strict mode.
    Warning,
}

/// What a rule sees when it runs.
pub struct ValidationContext<'a, T> {
    /// The whole document.
    pub document: &'a Document,
    /// The node being validated.
    pub subject: &'a T,
    /// Location of the node.
    pub path: &'a CodingPath,
}

impl<T> ValidationContext<'_, T> {
    /// An error at the subject's location.
    pub fn error(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(reason, self.path.clone())
    }

    /// An error at a child of the subject.
    pub fn error_at(&self, segment: impl Into<String>, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(reason, self.path.appending(segment))
    }

    /// The document's Components Object.
    pub fn components(&self) -> &Components {
        &self.document.components
    }
}

type Predicate<T> = Box<dyn Fn(&ValidationContext<'_, T>) -> bool + Send + Sync>;
type Check<T> = Box<dyn Fn(&ValidationContext<'_, T>) -> Vec<ValidationError> + Send + Sync>;

/// A rule scoped to nodes of type `T`.
pub struct Validation<T> {
    predicate: Predicate<T>,
    check: Check<T>,
}

impl<T: 'static> Validation<T> {
    /// A rule that runs `check` on every node of type `T`.
    pub fn new<C>(check: C) -> Self
    where
        C: Fn(&ValidationContext<'_, T>) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(|_| true),
            check: Box::new(check),
        }
    }

    /// A rule that fails with `description` wherever `condition` is false.
    pub fn assert<C>(description: impl Into<String>, condition: C) -> Self
    where
        C: Fn(&ValidationContext<'_, T>) -> bool + Send + Sync + 'static,
    {
        let description = description.into();
        Self::new(move |ctx| {
            if condition(ctx) {
                Vec::new()
            } else {
                vec![ctx.error(format!("Failed to satisfy: {}", description))]
            }
        })
    }

    /// Restricts the rule to nodes for which `predicate` holds.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ValidationContext<'_, T>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Box::new(predicate);
        self
    }
}

/// Type-erased rule, so rules for different node kinds share one list.
trait AnyValidation: Send + Sync {
    fn apply(&self, document: &Document, subject: &dyn Any, path: &CodingPath)
        -> Vec<ValidationError>;
}

impl<T: 'static> AnyValidation for Validation<T> {
    fn apply(
        &self,
        document: &Document,
        subject: &dyn Any,
        path: &CodingPath,
    ) -> Vec<ValidationError> {
        let Some(subject) = subject.downcast_ref::<T>() else {
            return Vec::new();
        };
        let ctx = ValidationContext {
            document,
            subject,
            path,
        };
        if (self.predicate)(&ctx) {
            (self.check)(&ctx)
        } else {
            Vec::new()
        }
    }
}

/// Errors and warnings from one run, before `strict` is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Failed error-level rules.
    pub errors: Vec<ValidationError>,
    /// Failed warning-level rules.
    pub warnings: Vec<ValidationError>,
}

/// An ordered set of rules.
pub struct Validator {
    rules: Vec<(Severity, Box<dyn AnyValidation>)>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator with the default rules and warnings.
    pub fn new() -> Self {
        Self::blank()
            .validating(tag_names_are_unique())
            .validating(path_item_parameters_are_unique())
            .validating(operation_parameters_are_unique())
            .validating(operation_ids_are_unique())
            .validating(reference_exists::<Schema>())
            .validating(reference_exists::<Parameter>())
            .validating(reference_exists::<Response>())
            .validating(reference_exists::<Example>())
            .validating(reference_exists::<RequestBody>())
            .validating(reference_exists::<Header>())
            .validating(reference_exists::<Link>())
            .validating(reference_exists::<Callbacks>())
            .validating(reference_exists::<PathItem>())
            .validating(reference_exists::<SecurityScheme>())
            .validating(server_variable_enums_are_consistent())
            .validating(server_url_variables_are_declared())
            .validating(parameter_style_matches_location())
            .validating(path_parameters_are_required())
            .validating(security_requirements_name_defined_schemes())
            .warning(openapi_version_is_supported())
            .warning(operations_define_responses())
    }

    /// A validator with no rules.
    pub fn blank() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds an error-level rule.
    pub fn validating<T: 'static>(mut self, rule: Validation<T>) -> Self {
        self.rules.push((Severity::Error, Box::new(rule)));
        self
    }

    /// Adds a warning-level rule.
    pub fn warning<T: 'static>(mut self, rule: Validation<T>) -> Self {
        self.rules.push((Severity::Warning, Box::new(rule)));
        self
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule over `document` and returns all findings.
    pub fn report(&self, document: &Document) -> ValidationReport {
        let mut walker = ValidationWalker {
            validator: self,
            document,
            path: CodingPath::root(),
            report: ValidationReport::default(),
        };
        walker.visit_here(document);
        walker.report
    }
}

/// Traversal state handed to [`Visit::visit_children`].
pub struct ValidationWalker<'v, 'd> {
    validator: &'v Validator,
    document: &'d Document,
    path: CodingPath,
    report: ValidationReport,
}

impl ValidationWalker<'_, '_> {
    /// Validates `node` at the current path, then its children.
    pub fn visit_here<T: Visit>(&mut self, node: &T) {
        for (severity, rule) in &self.validator.rules {
            let found = rule.apply(self.document, node, &self.path);
            match severity {
                Severity::Error => self.report.errors.extend(found),
                Severity::Warning => self.report.warnings.extend(found),
            }
        }
        node.visit_children(self);
    }

    /// Validates `node` under `segment`.
    pub fn visit<T: Visit>(&mut self, segment: impl Into<String>, node: &T) {
        self.path.push(segment);
        self.visit_here(node);
        self.path.pop();
    }

    /// Validates an optional node under `segment`.
    pub fn visit_option<T: Visit>(&mut self, segment: &str, node: Option<&T>) {
        if let Some(node) = node {
            self.visit(segment, node);
        }
    }

    /// Validates each item under `segment/<index>`.
    pub fn visit_list<T: Visit>(&mut self, segment: &str, items: &[T]) {
        if items.is_empty() {
            return;
        }
        self.path.push(segment);
        for (index, item) in items.iter().enumerate() {
            self.visit(index.to_string(), item);
        }
        self.path.pop();
    }

    /// Validates each value under `segment/<key>`.
    pub fn visit_map<K: fmt::Display, T: Visit>(&mut self, segment: &str, items: &IndexMap<K, T>) {
        if items.is_empty() {
            return;
        }
        self.path.push(segment);
        for (key, item) in items {
            self.visit(key.to_string(), item);
        }
        self.path.pop();
    }
}

/// A document node the validator can traverse.
///
/// Implementations only enumerate children; rules are applied by the walker.
pub trait Visit: Any {
    /// Visits the node's children.
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>);
}

macro_rules! leaf_nodes {
    ($($ty:ty),*) => {
        $(
            impl Visit for $ty {
                fn visit_children(&self, _walker: &mut ValidationWalker<'_, '_>) {}
            }
        )*
    };
}

leaf_nodes!(Info, ServerVariable, Tag, Example, Link, SecurityScheme, SecurityRequirement);

impl<T: ComponentKind + 'static> Visit for Reference<T> {
    fn visit_children(&self, _walker: &mut ValidationWalker<'_, '_>) {}
}

impl<T: ComponentKind + Visit> Visit for RefOr<T> {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        match self {
            RefOr::Ref(reference) => walker.visit_here(reference),
            RefOr::T(value) => walker.visit_here(value),
        }
    }
}

impl Visit for Document {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit("info", &self.info);
        walker.visit_list("servers", &self.servers);
        walker.visit_map("paths", &self.paths);
        walker.visit_map("webhooks", &self.webhooks);
        walker.visit("components", &self.components);
        walker.visit_list("security", &self.security);
        if let Some(tags) = &self.tags {
            walker.visit_list("tags", tags);
        }
    }
}

impl Visit for Server {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_map("variables", &self.variables);
    }
}

impl Visit for Components {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_map("schemas", &self.schemas);
        walker.visit_map("parameters", &self.parameters);
        walker.visit_map("responses", &self.responses);
        walker.visit_map("examples", &self.examples);
        walker.visit_map("requestBodies", &self.request_bodies);
        walker.visit_map("headers", &self.headers);
        walker.visit_map("links", &self.links);
        walker.visit_map("callbacks", &self.callbacks);
        walker.visit_map("pathItems", &self.path_items);
        walker.visit_map("securitySchemes", &self.security_schemes);
    }
}

impl Visit for PathItem {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        if let Some(servers) = &self.servers {
            walker.visit_list("servers", servers);
        }
        walker.visit_list("parameters", &self.parameters);
        for (method, operation) in self.operations() {
            walker.visit(method.to_string(), operation);
        }
    }
}

impl Visit for Operation {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_list("parameters", &self.parameters);
        walker.visit_option("requestBody", self.request_body.as_ref());
        walker.visit_map("responses", &self.responses);
        walker.visit_map("callbacks", &self.callbacks);
        if let Some(security) = &self.security {
            walker.visit_list("security", security);
        }
        if let Some(servers) = &self.servers {
            walker.visit_list("servers", servers);
        }
    }
}

impl Visit for Callbacks {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        for (expression, item) in &self.0 {
            walker.visit(expression.as_str(), item);
        }
    }
}

impl Visit for Parameter {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_option("schema", self.schema.as_ref());
        walker.visit_map("content", &self.content);
        walker.visit_map("examples", &self.examples);
    }
}

impl Visit for RequestBody {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_map("content", &self.content);
    }
}

impl Visit for MediaType {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_option("schema", self.schema.as_ref());
        walker.visit_map("examples", &self.examples);
        walker.visit_map("encoding", &self.encoding);
    }
}

impl Visit for Encoding {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_map("headers", &self.headers);
    }
}

impl Visit for Response {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_map("headers", &self.headers);
        walker.visit_map("content", &self.content);
        walker.visit_map("links", &self.links);
    }
}

impl Visit for Header {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        walker.visit_option("schema", self.schema.as_ref());
        walker.visit_map("content", &self.content);
    }
}

impl Visit for Schema {
    fn visit_children(&self, walker: &mut ValidationWalker<'_, '_>) {
        match self {
            Schema::Reference { reference, .. } => walker.visit_here(reference),
            Schema::Object { object, .. } => {
                walker.visit_map("properties", &object.properties);
                if let Some(AdditionalProperties::Schema(schema)) = &object.additional_properties {
                    walker.visit("additionalProperties", &**schema);
                }
            }
            Schema::Array { array, .. } => {
                walker.visit_option("items", array.items.as_deref());
            }
            Schema::AllOf { of, .. } => walker.visit_list("allOf", of),
            Schema::OneOf { of, .. } => walker.visit_list("oneOf", of),
            Schema::AnyOf { of, .. } => walker.visit_list("anyOf", of),
            Schema::Not { not, .. } => walker.visit("not", &**not),
            Schema::Boolean { .. }
            | Schema::Number { .. }
            | Schema::Integer { .. }
            | Schema::String { .. }
            | Schema::Fragment { .. } => {}
        }
    }
}

impl Document {
    /// Validates the document.
    ///
    /// Fails with every error-level finding when there is at least one.
    /// Warnings are returned on success, or treated as errors when `strict`.
    pub fn validate(&self, validator: &Validator, strict: bool) -> AppResult<Vec<ValidationError>> {
        let ValidationReport {
            mut errors,
            warnings,
        } = validator.report(self);

        if strict {
            errors.extend(warnings);
            if errors.is_empty() {
                return Ok(Vec::new());
            }
            return Err(AppError::Validation(ValidationErrorCollection { errors }));
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(AppError::Validation(ValidationErrorCollection { errors }))
        }
    }
}

// ---------------------------------------------------------------------------
// Default rules
// ---------------------------------------------------------------------------

/// Tag names are unique within the document.
pub fn tag_names_are_unique() -> Validation<Document> {
    Validation::<Document>::new(|ctx| {
        let Some(tags) = &ctx.subject.tags else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        tags.iter()
            .enumerate()
            .filter(|(_, tag)| !seen.insert(tag.name.as_str()))
            .map(|(index, tag)| {
                ValidationError::new(
                    format!("Duplicate tag name '{}' detected", tag.name),
                    ctx.path.appending("tags").appending(index.to_string()),
                )
            })
            .collect()
    })
}

/// Resolves inline or referenced parameters; unresolved ones are skipped.
fn resolved_parameters<'a>(
    components: &'a Components,
    parameters: &'a [RefOr<Parameter>],
) -> Vec<&'a Parameter> {
    parameters
        .iter()
        .filter_map(|p| match p {
            RefOr::T(parameter) => Some(parameter),
            RefOr::Ref(reference) => components.lookup(reference),
        })
        .collect()
}

fn duplicate_parameters(
    components: &Components,
    parameters: &[RefOr<Parameter>],
) -> Vec<(String, ParameterLocation)> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for parameter in resolved_parameters(components, parameters) {
        let identity = parameter.identity();
        if !seen.insert(identity.clone()) && !duplicates.contains(&identity) {
            duplicates.push(identity);
        }
    }
    duplicates
}

/// Path Item parameters are unique by `(name, in)`.
pub fn path_item_parameters_are_unique() -> Validation<PathItem> {
    Validation::<PathItem>::new(|ctx| {
        duplicate_parameters(ctx.components(), &ctx.subject.parameters)
            .into_iter()
            .map(|(name, location)| {
                ctx.error_at(
                    "parameters",
                    format!(
                        "Path Item parameters must be unique by name and location; '{}' in {} is defined more than once",
                        name, location
                    ),
                )
            })
            .collect()
    })
}

/// Operation parameters are unique by `(name, in)`.
pub fn operation_parameters_are_unique() -> Validation<Operation> {
    Validation::<Operation>::new(|ctx| {
        duplicate_parameters(ctx.components(), &ctx.subject.parameters)
            .into_iter()
            .map(|(name, location)| {
                ctx.error_at(
                    "parameters",
                    format!(
                        "Operation parameters must be unique by name and location; '{}' in {} is defined more than once",
                        name, location
                    ),
                )
            })
            .collect()
    })
}

/// Operation ids are unique across all paths and webhooks.
pub fn operation_ids_are_unique() -> Validation<Document> {
    Validation::<Document>::new(|ctx| {
        let document = ctx.subject;
        let mut locations: Vec<(String, CodingPath)> = Vec::new();
        for (segment, items) in [("paths", &document.paths), ("webhooks", &document.webhooks)] {
            for (name, item) in items {
                let item = match item {
                    RefOr::T(item) => Some(item),
                    RefOr::Ref(reference) => document.components.lookup(reference),
                };
                let Some(item) = item else { continue };
                for (method, operation) in item.operations() {
                    if let Some(id) = &operation.operation_id {
                        let path = CodingPath::from([segment, name.as_str()]).appending(method.to_string());
                        locations.push((id.clone(), path));
                    }
                }
            }
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (id, _) in &locations {
            *counts.entry(id.as_str()).or_insert(0) += 1;
        }
        locations
            .iter()
            .filter(|(id, _)| counts.get(id.as_str()).copied().unwrap_or(0) > 1)
            .map(|(id, path)| {
                ValidationError::new(
                    format!(
                        "All operationIds in the document must be unique; '{}' is used more than once",
                        id
                    ),
                    path.clone(),
                )
            })
            .collect()
    })
}

/// Internal references of kind `T` name an existing component.
pub fn reference_exists<T: ComponentKind + 'static>() -> Validation<Reference<T>> {
    Validation::<Reference<T>>::new(|ctx| {
        if ctx.components().contains(ctx.subject) {
            return Vec::new();
        }
        vec![ctx.error(format!(
            "Reference '{}' does not name an existing component in '{}'",
            ctx.subject.to_ref_string(),
            T::GROUP
        ))]
    })
    .when(|ctx| ctx.subject.is_internal())
}

/// Server variable enums are non-empty and contain the default value.
pub fn server_variable_enums_are_consistent() -> Validation<ServerVariable> {
    Validation::<ServerVariable>::new(|ctx| {
        let variable = ctx.subject;
        match &variable.enum_values {
            Some(values) if values.is_empty() => {
                vec![ctx.error("Server variable has an empty enum")]
            }
            Some(values) if !values.contains(&variable.default) => vec![ctx.error(format!(
                "Server variable has default '{}' not in enum",
                variable.default
            ))],
            _ => Vec::new(),
        }
    })
}

/// Every `{placeholder}` in a server URL names a declared variable.
pub fn server_url_variables_are_declared() -> Validation<Server> {
    Validation::<Server>::new(|ctx| {
        let placeholder_re = Regex::new(r"\{([^}]+)}").expect("Invalid regex constant");
        placeholder_re
            .captures_iter(&ctx.subject.url)
            .map(|cap| cap[1].to_string())
            .filter(|name| !ctx.subject.variables.contains_key(name))
            .map(|name| {
                ctx.error(format!(
                    "Server URL '{}' references undefined variable '{}'",
                    ctx.subject.url, name
                ))
            })
            .collect()
    })
}

/// Explicit parameter styles are allowed for the parameter's location.
pub fn parameter_style_matches_location() -> Validation<Parameter> {
    Validation::<Parameter>::new(|ctx| {
        let parameter = ctx.subject;
        match parameter.style {
            Some(style) if !style.is_allowed_in(parameter.location) => vec![ctx.error_at(
                "style",
                format!(
                    "Parameter '{}' uses style '{}' which is not allowed for {} parameters",
                    parameter.name, style, parameter.location
                ),
            )],
            _ => Vec::new(),
        }
    })
}

/// Path parameters declare `required: true`.
pub fn path_parameters_are_required() -> Validation<Parameter> {
    Validation::<Parameter>::new(|ctx| {
        vec![ctx.error(format!(
            "Path parameter '{}' must be required",
            ctx.subject.name
        ))]
    })
    .when(|ctx| ctx.subject.location == ParameterLocation::Path && !ctx.subject.required)
}

/// Security requirements only name schemes defined in Components.
pub fn security_requirements_name_defined_schemes() -> Validation<SecurityRequirement> {
    Validation::<SecurityRequirement>::new(|ctx| {
        ctx.subject
            .references()
            .filter(|(_, reference, _)| match reference {
                Ok(reference) => !ctx.components().contains(reference),
                Err(_) => true,
            })
            .map(|(name, _, _)| {
                ctx.error_at(
                    name,
                    format!(
                        "Security requirement references security scheme '{}' which is not found in the Components Object",
                        name
                    ),
                )
            })
            .collect()
    })
}

/// The document declares an OpenAPI 3.0.x or 3.1.x version.
pub fn openapi_version_is_supported() -> Validation<Document> {
    Validation::<Document>::new(|ctx| {
        let version_re = Regex::new(r"^3\.[01]\.\d+$").expect("Invalid regex constant");
        if version_re.is_match(&ctx.subject.openapi) {
            Vec::new()
        } else {
            vec![ctx.error_at(
                "openapi",
                format!(
                    "OpenAPI version '{}' is not a supported 3.0.x or 3.1.x version",
                    ctx.subject.openapi
                ),
            )]
        }
    })
}

/// Operations define at least one response.
pub fn operations_define_responses() -> Validation<Operation> {
    Validation::<Operation>::assert("Operation defines at least one response", |ctx| {
        !ctx.subject.responses.is_empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(yaml: &str) -> Document {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn errors(document: &Document) -> Vec<ValidationError> {
        match document.validate(&Validator::new(), false) {
            Err(AppError::Validation(collection)) => collection.errors,
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => Vec::new(),
        }
    }

    #[test]
    fn test_valid_document_passes() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Pets, version: 1.0.0}
paths:
  /pets/{id}:
    parameters:
      - {name: id, in: path, required: true, schema: {type: string}}
    get:
      operationId: getPet
      responses:
        '200': {description: OK}
"#,
        );
        let warnings = doc.validate(&Validator::new(), true).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicate_tags() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Tags, version: '1.0'}
tags:
  - name: accounts
  - name: accounts
paths: {}
"#,
        );
        let found = errors(&doc);
        assert_eq!(found.len(), 1);
        assert!(found[0].reason.contains("Duplicate tag name"));
        assert_eq!(found[0].path.to_string(), "tags/1");
    }

    #[test]
    fn test_duplicate_parameters_resolve_references() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Params, version: '1.0'}
paths:
  /items:
    get:
      parameters:
        - {name: limit, in: query}
        - $ref: '#/components/parameters/Limit'
      responses:
        '200': {description: OK}
components:
  parameters:
    Limit: {name: limit, in: query}
"#,
        );
        let found = errors(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.to_string(), "paths//items/get/parameters");
    }

    #[test]
    fn test_all_errors_are_collected() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Broken, version: '1.0'}
servers:
  - url: https://{region}.example.com
    variables:
      region:
        default: eu
        enum: [us]
paths:
  /items/{id}:
    get:
      parameters:
        - {name: id, in: path, style: form}
      responses:
        '200':
          $ref: '#/components/responses/Missing'
"#,
        );
        let found = errors(&doc);
        let rendered: Vec<String> = found.iter().map(ToString::to_string).collect();
        assert_eq!(found.len(), 4, "{:#?}", rendered);
        assert!(rendered
            .iter()
            .any(|e| e == "Server variable has default 'eu' not in enum at path: servers/0/variables/region"));
        assert!(rendered.iter().any(|e| e.contains("style 'form'")));
        assert!(rendered.iter().any(|e| e.contains("must be required")));
        assert!(rendered
            .iter()
            .any(|e| e.contains("'#/components/responses/Missing'")));
    }

    #[test]
    fn test_undefined_security_scheme() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Secure, version: '1.0'}
security:
  - api_key: []
paths: {}
"#,
        );
        let found = errors(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.to_string(), "security/0/api_key");
    }

    #[test]
    fn test_warnings_respect_strict_mode() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Warn, version: '1.0'}
paths:
  /ping:
    get: {}
"#,
        );
        let warnings = doc.validate(&Validator::new(), false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].reason.contains("at least one response"));

        let err = doc.validate(&Validator::new(), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_custom_rule_on_blank_validator() {
        let validator = Validator::blank().validating(
            Validation::<Tag>::assert("tag names are lowercase", |ctx| {
                ctx.subject.name.chars().all(|c| !c.is_uppercase())
            })
            .when(|ctx| !ctx.subject.name.is_empty()),
        );
        assert_eq!(validator.len(), 1);

        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Tags, version: '1.0'}
tags:
  - name: Accounts
"#,
        );
        let err = doc.validate(&validator, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to satisfy: tag names are lowercase at path: tags/0"
        );
    }

    #[test]
    fn test_default_rules_are_registered() {
        let validator = Validator::new();
        assert_eq!(validator.len(), 21);
        assert!(!validator.is_empty());
        assert!(Validator::blank().is_empty());
    }

    #[test]
    fn test_missing_component_reference_is_reported() {
        let doc = document(
            r#"
openapi: 3.1.0
info: {title: Refs, version: '1.0'}
paths:
  /pets:
    get:
      parameters:
        - $ref: '#/components/parameters/Limit'
      responses:
        '200': {description: OK}
"#,
        );
        let errors = errors(&doc);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("#/components/parameters/Limit"));
    }
}
