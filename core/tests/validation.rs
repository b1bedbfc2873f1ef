use oas_core::oas::model::Operation;
use oas_core::oas::validation::{Validation, ValidationError};
use oas_core::{AppError, Document, Validator};
use pretty_assertions::assert_eq;

fn validation_errors(result: Result<Vec<ValidationError>, AppError>) -> Vec<String> {
    match result {
        Err(AppError::Validation(collection)) => {
            collection.errors.iter().map(ToString::to_string).collect()
        }
        Err(other) => panic!("Unexpected error: {}", other),
        Ok(warnings) => panic!("Expected validation failure, got warnings {:?}", warnings),
    }
}

#[test]
fn test_duplicate_operation_ids_across_paths_and_webhooks() {
    let document = Document::from_yaml(
        r#"
openapi: 3.1.0
info: {title: Dup, version: 1.0.0}
paths:
  /a:
    get:
      operationId: dup
      responses: {'200': {description: OK}}
webhooks:
  created:
    post:
      operationId: dup
      responses: {'200': {description: OK}}
"#,
    )
    .unwrap();

    let errors = validation_errors(document.validate(&Validator::new(), false));
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.contains("operationIds") && e.contains("'dup'")));
    assert!(errors[0].ends_with("at path: paths//a/get"));
    assert!(errors[1].ends_with("at path: webhooks/created/post"));
}

#[test]
fn test_warnings_only_pass_unless_strict() {
    let document = Document::from_yaml(
        r#"
openapi: 3.2.0
info: {title: Future, version: 1.0.0}
paths:
  /ping:
    get:
      responses: {'204': {description: Pong}}
"#,
    )
    .unwrap();

    let warnings = document.validate(&Validator::new(), false).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path.to_string(), "openapi");

    let errors = validation_errors(document.validate(&Validator::new(), true));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("3.2.0"));
}

#[test]
fn test_every_failing_rule_is_reported() {
    let document = Document::from_yaml(
        r#"
openapi: 3.0.3
info: {title: Many, version: 1.0.0}
tags:
  - name: a
  - name: a
security:
  - oauth: [read]
paths:
  /things/{id}:
    parameters:
      - {name: id, in: path, required: true}
      - {name: id, in: path, required: true}
    get:
      requestBody:
        $ref: '#/components/requestBodies/Missing'
      responses:
        '200':
          description: OK
          headers:
            X-Rate:
              $ref: '#/components/headers/Rate'
"#,
    )
    .unwrap();

    let errors = validation_errors(document.validate(&Validator::new(), false));
    assert_eq!(errors.len(), 5, "{:#?}", errors);
    assert!(errors[0].contains("Duplicate tag name 'a'"));
    assert!(errors.iter().any(|e| e.contains("Path Item parameters must be unique")));
    assert!(errors.iter().any(|e| e.contains("#/components/requestBodies/Missing")));
    assert!(errors.iter().any(|e| e.contains("#/components/headers/Rate")));
    assert!(errors.iter().any(|e| e.contains("security scheme 'oauth'")));
}

#[test]
fn test_custom_rules_extend_defaults() {
    let validator = Validator::new().validating(
        Validation::<Operation>::assert("operation has an operationId", |ctx| {
            ctx.subject.operation_id.is_some()
        })
        .when(|ctx| !ctx.subject.deprecated),
    );
    let document = Document::from_yaml(
        r#"
openapi: 3.1.0
info: {title: Ids, version: 1.0.0}
paths:
  /old:
    get:
      deprecated: true
      responses: {'200': {description: OK}}
  /new:
    get:
      responses: {'200': {description: OK}}
"#,
    )
    .unwrap();

    let errors = validation_errors(document.validate(&validator, false));
    assert_eq!(
        errors,
        vec!["Failed to satisfy: operation has an operationId at path: paths//new/get".to_string()]
    );
}

#[test]
fn test_references_next_to_a_type_are_checked() {
    let document = Document::from_yaml(
        r#"
openapi: 3.1.0
info: {title: Typed, version: 1.0.0}
paths: {}
components:
  schemas:
    Pet:
      type: object
      properties:
        name: {type: string}
      allOf:
        - $ref: '#/components/schemas/Animal'
"#,
    )
    .unwrap();

    let errors = validation_errors(document.validate(&Validator::new(), false));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("#/components/schemas/Animal"), "{}", errors[0]);
    assert!(errors[0].ends_with("at path: components/schemas/Pet/allOf/1"), "{}", errors[0]);
}
