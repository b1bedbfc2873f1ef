#![deny(missing_docs)]

//! # OAS Core
//!
//! A typed OpenAPI 3.x document model with reference dereferencing,
//! schema fragment combination, external loading and validation.

/// Shared error types.
pub mod error;

/// OpenAPI (OAS) model and engines.
pub mod oas;

pub use error::{AppError, AppResult};
pub use oas::{
    combine_fragments, CodingPath, ComponentGroup, ComponentKey, Components, Document,
    DocumentFormat, ExternalDereferenceDepth, ExternalLoader, FragmentCombiner, RefOr, Reference,
    Schema, SchemaType, Validator,
};
