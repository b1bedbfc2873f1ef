//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the crate.
//!
//! Dereferencing and schema combination fail fast with a single variant.
//! Validation aggregates every finding into one `ValidationErrorCollection`.

use crate::oas::components::ComponentGroup;
use crate::oas::path::CodingPath;
use crate::oas::combine::SchemaResolutionError;
use crate::oas::validation::ValidationErrorCollection;
use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// An internal reference names a component that does not exist.
    #[from(ignore)]
    #[display("Failed to look up a '{group}' component named '{key}' at path: {path}")]
    MissingReference {
        /// Components group the reference targets.
        group: ComponentGroup,
        /// Key that could not be found.
        key: String,
        /// Location of the reference in the document.
        path: CodingPath,
    },

    /// Local dereferencing encountered an external reference.
    #[from(ignore)]
    #[display("Cannot resolve remote reference '{reference}' locally at path: {path}")]
    RemoteReferenceUnsupported {
        /// The external reference text.
        reference: String,
        /// Location of the reference in the document.
        path: CodingPath,
    },

    /// A component (transitively) references itself.
    #[from(ignore)]
    #[display("Reference cycle through '{group}' component '{key}' at path: {path}")]
    ReferenceCycle {
        /// Components group of the component that closes the cycle.
        group: ComponentGroup,
        /// Key of the component that closes the cycle.
        key: String,
        /// Location of the reference in the document.
        path: CodingPath,
    },

    /// The document is structurally inconsistent in a way dereferencing can detect.
    #[from(ignore)]
    #[display("Inconsistency encountered: {message} at path: {path}")]
    Inconsistency {
        /// What is inconsistent.
        message: String,
        /// Where it was found.
        path: CodingPath,
    },

    /// Schema fragments could not be combined.
    #[display("Schema resolution failed: {_0}")]
    SchemaResolution(SchemaResolutionError),

    /// One or more validation rules failed.
    #[display("{_0}")]
    Validation(ValidationErrorCollection),

    /// A component key does not match the required pattern.
    #[from(ignore)]
    #[display("{_0}")]
    ComponentKeyInvalid(String),

    /// Two distinct values claim the same component key.
    #[from(ignore)]
    #[display("Component collision: '{group}' already contains a different value for '{key}'")]
    ComponentCollision {
        /// Group in which the collision occurred.
        group: ComponentGroup,
        /// Colliding key.
        key: String,
    },

    /// An external loader failed to fetch or decode a document.
    #[from(ignore)]
    #[display("Loader Error: {_0}")]
    Loader(String),

    /// A document could not be decoded.
    #[from(ignore)]
    #[display("Parse Error: {_0}")]
    Parse(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_missing_reference_display() {
        let err = AppError::MissingReference {
            group: ComponentGroup::Schemas,
            key: "missing".into(),
            path: CodingPath::from(["paths", "/users", "get"]),
        };
        assert_eq!(
            err.to_string(),
            "Failed to look up a 'schemas' component named 'missing' at path: paths//users/get"
        );
    }

    #[test]
    fn test_schema_resolution_conversion() {
        let inner = SchemaResolutionError::Unsupported("anyOf".into());
        let err: AppError = inner.into();
        assert!(matches!(err, AppError::SchemaResolution(_)));
        assert!(err.to_string().contains("anyOf"));
    }
}
