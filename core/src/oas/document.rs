#![deny(missing_docs)]

//! # OpenAPI Document Parsing
//!
//! Entry points for reading and writing whole documents as YAML or JSON.
//! Key order is preserved in both directions.

use crate::error::{AppError, AppResult};
use crate::oas::model::Document;
use tracing::debug;

/// Wire format of a serialized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// YAML (a superset of JSON, so JSON text also parses).
    #[default]
    Yaml,
    /// JSON.
    Json,
}

impl DocumentFormat {
    /// Guesses the format from a file name or URL suffix.
    pub fn from_extension(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".json") {
            DocumentFormat::Json
        } else {
            DocumentFormat::Yaml
        }
    }
}

impl Document {
    /// Parses `text` in the given format.
    pub fn parse(text: &str, format: DocumentFormat) -> AppResult<Self> {
        let document = match format {
            DocumentFormat::Yaml => Self::from_yaml(text)?,
            DocumentFormat::Json => Self::from_json(text)?,
        };
        debug!(
            openapi = %document.openapi,
            paths = document.paths.len(),
            components = document.components.len(),
            "parsed document"
        );
        Ok(document)
    }

    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> AppResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| AppError::Parse(format!("Failed to parse OpenAPI YAML: {}", e)))
    }

    /// Parses a JSON document.
    pub fn from_json(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::Parse(format!("Failed to parse OpenAPI JSON: {}", e)))
    }

    /// Serializes the document as YAML.
    pub fn to_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppError::Parse(format!("Failed to serialize OpenAPI YAML: {}", e)))
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Parse(format!("Failed to serialize OpenAPI JSON: {}", e)))
    }

    /// Serializes the document in the given format.
    pub fn render(&self, format: DocumentFormat) -> AppResult<String> {
        match format {
            DocumentFormat::Yaml => self.to_yaml(),
            DocumentFormat::Json => self.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::reference::RefOr;
    use crate::oas::schema::Schema;

    const PETSTORE: &str = r#"
openapi: 3.1.0
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        '200':
          description: A list of pets
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Pet'
  /owners:
    get:
      responses:
        '200': {description: OK}
components:
  schemas:
    Pet:
      type: object
      required: [id]
      properties:
        id: {type: integer, format: int64}
        name: {type: string}
"#;

    #[test]
    fn test_parse_yaml_preserves_path_order() {
        let doc = Document::parse(PETSTORE, DocumentFormat::Yaml).unwrap();
        let paths: Vec<&String> = doc.paths.keys().collect();
        assert_eq!(paths, vec!["/pets", "/owners"]);
        assert!(doc.components.schemas.contains_key("Pet"));
    }

    #[test]
    fn test_json_round_trip() {
        let doc = Document::from_yaml(PETSTORE).unwrap();
        let json = doc.to_json().unwrap();
        let back = Document::parse(&json, DocumentFormat::Json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_response_schema_keeps_reference() {
        let doc = Document::from_yaml(PETSTORE).unwrap();
        let Some(RefOr::T(item)) = doc.paths.get("/pets") else {
            panic!("Expected inline path item");
        };
        let operation = item.get.as_ref().unwrap();
        let Some(RefOr::T(response)) = operation.responses.get("200") else {
            panic!("Expected inline response");
        };
        let schema = response.content["application/json"].schema.as_ref().unwrap();
        match schema {
            Schema::Array { array, .. } => {
                assert!(matches!(
                    array.items.as_deref(),
                    Some(Schema::Reference { .. })
                ));
            }
            other => panic!("Expected array schema, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_text_is_parse_error() {
        let err = Document::from_json("{ not json").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert!(err.to_string().starts_with("Parse Error: Failed to parse OpenAPI JSON"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("api.JSON"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_extension("api.yaml"), DocumentFormat::Yaml);
    }
}
