#![deny(missing_docs)]

//! # OpenAPI Module
//!
//! - **model**: the typed document model.
//! - **components** / **reference**: the Components registry and typed references.
//! - **schema**: schema fragments and their 3.0/3.1 wire shapes.
//! - **dereference**: local dereferencing into `Dereferenced*` views.
//! - **combine**: folding schema fragments into one schema.
//! - **external**: wave-based loading of external references.
//! - **resolved**: route and endpoint views with inheritance applied.
//! - **validation**: the rule engine and default rules.
//! - **document**: YAML/JSON entry points.

pub mod combine;
pub mod components;
pub mod dereference;
pub mod document;
pub mod external;
pub mod model;
pub mod path;
pub mod reference;
pub mod resolved;
pub mod schema;
pub mod validation;

pub use combine::{combine_fragments, FragmentCombiner, SchemaResolutionError};
pub use components::{
    hashed_component_key, ComponentGroup, ComponentKey, ComponentKind, ComponentMap, Components,
};
pub use dereference::{
    DereferenceContext, DereferencedDocument, DereferencedSchema, DereferencedSchemaKind,
    LocallyDereferenceable, Provenance,
};
pub use document::DocumentFormat;
pub use external::{ExternalDereferenceDepth, ExternalLoader, LoadableComponent};
pub use model::Document;
pub use path::CodingPath;
pub use reference::{RefOr, Reference, ReferenceTarget};
pub use resolved::{ResolvedDocument, ResolvedEndpoint, ResolvedRoute};
pub use schema::{Schema, SchemaType};
pub use validation::{
    Severity, Validation, ValidationContext, ValidationError, ValidationErrorCollection,
    Validator,
};
