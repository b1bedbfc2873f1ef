use oas_core::oas::combine::SchemaResolutionError;
use oas_core::oas::dereference::DereferencedSchemaKind;
use oas_core::oas::schema::PropertySchema;
use oas_core::{combine_fragments, AppError, Components, Document, Schema, SchemaType};
use pretty_assertions::assert_eq;

fn schema(yaml: &str) -> Schema {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_disjoint_fragments_commute() {
    let a = schema("type: object\nproperties:\n  id: {type: integer}\nmaxProperties: 4");
    let b = schema("description: Account\nproperties:\n  email: {type: string, format: email}");
    let components = Components::new();

    let ab = combine_fragments(&[a.clone(), b.clone()], &components).unwrap();
    let ba = combine_fragments(&[b, a], &components).unwrap();

    assert_eq!(ab.schema_type(), Some(SchemaType::Object));
    assert_eq!(ab.core(), ba.core());
    let (DereferencedSchemaKind::Object { object: left, .. }, DereferencedSchemaKind::Object { object: right, .. }) =
        (&ab.kind, &ba.kind)
    else {
        panic!("Expected object schemas");
    };
    // Property order follows first appearance; the property set is the same.
    assert_eq!(left.properties.len(), right.properties.len());
    for (name, property) in &left.properties {
        assert_eq!(Some(property), right.properties.get(name));
    }
    assert_eq!(left.max_properties, right.max_properties);
}

#[test]
fn test_conflicting_max_length_in_either_order() {
    let five = schema("type: string\nmaxLength: 5");
    let ten = schema("type: string\nmaxLength: 10");
    let components = Components::new();

    for fragments in [[five.clone(), ten.clone()], [ten, five]] {
        match combine_fragments(&fragments, &components).unwrap_err() {
            AppError::SchemaResolution(SchemaResolutionError::AttributeConflict { name, .. }) => {
                assert_eq!(name, "maxLength");
            }
            other => panic!("Unexpected error: {}", other),
        }
    }
}

#[test]
fn test_integer_and_string_conflict() {
    let err = combine_fragments(
        &[schema("type: integer"), schema("type: string")],
        &Components::new(),
    )
    .unwrap_err();
    match err {
        AppError::SchemaResolution(SchemaResolutionError::TypeConflict { original, new }) => {
            assert_eq!((original, new), (SchemaType::Integer, SchemaType::String));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_all_of_from_document_components() {
    let document = Document::from_yaml(
        r#"
openapi: 3.1.0
info: {title: Inheritance, version: 1.0.0}
paths: {}
components:
  schemas:
    Entity:
      type: object
      required: [id]
      properties:
        id: {type: string, format: uuid, readOnly: true}
    Named:
      properties:
        name: {type: string, maxLength: 64}
    Customer:
      allOf:
        - $ref: '#/components/schemas/Entity'
        - $ref: '#/components/schemas/Named'
        - type: object
          required: [name]
          properties:
            name: {type: string, minLength: 1}
"#,
    )
    .unwrap();

    let customer = document.components.schemas["Customer"].clone();
    let combined = combine_fragments(&[customer], &document.components).unwrap();

    let DereferencedSchemaKind::Object { object, .. } = &combined.kind else {
        panic!("Expected object schema");
    };
    let names: Vec<&str> = object.properties.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["id", "name"]);
    assert!(object.properties["id"].is_required());
    assert!(object.properties["name"].is_required());

    let DereferencedSchemaKind::String { string, .. } = &object.properties["name"].kind else {
        panic!("Expected string property");
    };
    assert_eq!(string.max_length, Some(64));
    assert_eq!(string.min_length, Some(1));
}

#[test]
fn test_nested_composition_resolves_to_plain_schemas() {
    let document = Document::from_yaml(
        r#"
openapi: 3.1.0
info: {title: Nested, version: 1.0.0}
paths: {}
components:
  schemas:
    Label:
      type: string
      maxLength: 32
    Order:
      type: object
      properties:
        label:
          allOf:
            - $ref: '#/components/schemas/Label'
            - minLength: 1
        lines:
          type: array
          items:
            allOf:
              - properties:
                  sku: {type: string}
              - required: [sku]
"#,
    )
    .unwrap();

    let order = document.components.schemas["Order"].clone();
    let labelled = schema("properties:\n  label: {type: string, pattern: '^[A-Z]'}");
    let components = &document.components;

    let forward = combine_fragments(&[order.clone(), labelled.clone()], components).unwrap();
    let backward = combine_fragments(&[labelled, order], components).unwrap();

    for combined in [&forward, &backward] {
        let DereferencedSchemaKind::Object { object, .. } = &combined.kind else {
            panic!("Expected object schema");
        };
        let label = &object.properties["label"];
        assert!(!label.is_required());
        assert_eq!(label.component_keys[0].as_str(), "Label");
        let DereferencedSchemaKind::String { string, .. } = &label.kind else {
            panic!("Expected string label, got {:?}", label.kind);
        };
        assert_eq!(string.max_length, Some(32));
        assert_eq!(string.min_length, Some(1));
        assert_eq!(string.pattern.as_deref(), Some("^[A-Z]"));

        let DereferencedSchemaKind::Array { array, .. } = &object.properties["lines"].kind else {
            panic!("Expected array of lines");
        };
        let line = array.items.as_deref().unwrap();
        let DereferencedSchemaKind::Object { object: line, .. } = &line.kind else {
            panic!("Expected flattened line object, got {:?}", line.kind);
        };
        assert!(line.properties["sku"].is_required());
        assert!(line.required_undeclared.is_empty());
    }
}
