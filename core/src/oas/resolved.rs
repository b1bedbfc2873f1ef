#![deny(missing_docs)]

//! # Resolved Routes
//!
//! Flattens a dereferenced document into one entry per path and one per
//! `(path, method)` pair, with the inheritance rules of OpenAPI applied:
//!
//! - Parameters: path-level parameters are inherited unless the operation
//!   declares one with the same `(name, in)`.
//! - Security: the operation's requirements, else the document's.
//! - Servers: the operation's, else the path item's, else the document's.
//! - Summary/description: the operation's, else the path item's.

use crate::oas::dereference::{
    DereferencedDocument, DereferencedParameter, DereferencedPathItem, DereferencedRequestBody,
    DereferencedResponse, DereferencedSecurityRequirement,
};
use crate::oas::model::{HttpMethod, Server};
use indexmap::IndexMap;

/// A single callable endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template (e.g. `/pets/{id}`).
    pub path: String,
    /// The operation id, if declared.
    pub operation_id: Option<String>,
    /// Operation tags.
    pub tags: Vec<String>,
    /// Operation summary, falling back to the path item's.
    pub summary: Option<String>,
    /// Operation description, falling back to the path item's.
    pub description: Option<String>,
    /// Effective parameters.
    pub parameters: Vec<DereferencedParameter>,
    /// Request body.
    pub request_body: Option<DereferencedRequestBody>,
    /// Responses by status code.
    pub responses: IndexMap<String, DereferencedResponse>,
    /// Whether the operation is deprecated.
    pub deprecated: bool,
    /// Effective security requirements.
    pub security: Vec<DereferencedSecurityRequirement>,
    /// Effective servers.
    pub servers: Vec<Server>,
}

/// A path and the endpoints it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// Path template.
    pub path: String,
    /// Path item summary.
    pub summary: Option<String>,
    /// Path item description.
    pub description: Option<String>,
    /// Effective servers.
    pub servers: Vec<Server>,
    /// Endpoints in declaration order.
    pub endpoints: Vec<ResolvedEndpoint>,
}

/// Routes and endpoints of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDocument {
    /// One route per path.
    pub routes: Vec<ResolvedRoute>,
    /// Every endpoint, in path then method order.
    pub endpoints: Vec<ResolvedEndpoint>,
}

impl ResolvedDocument {
    /// Looks up the endpoint for `method` on the path template `path`.
    pub fn endpoint(&self, method: HttpMethod, path: &str) -> Option<&ResolvedEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.method == method && e.path == path)
    }
}

/// Merges path-level and operation-level parameters.
///
/// Operation parameters replace inherited ones with the same identity but
/// keep the inherited position.
fn merge_parameters(
    inherited: &[DereferencedParameter],
    declared: &[DereferencedParameter],
) -> Vec<DereferencedParameter> {
    let mut merged: IndexMap<_, DereferencedParameter> = inherited
        .iter()
        .map(|p| (p.identity(), p.clone()))
        .collect();
    for parameter in declared {
        merged.insert(parameter.identity(), parameter.clone());
    }
    merged.into_values().collect()
}

fn resolve_route(
    path: &str,
    item: &DereferencedPathItem,
    document_servers: &[Server],
    document_security: &[DereferencedSecurityRequirement],
) -> ResolvedRoute {
    let route_servers = item
        .underlying
        .servers
        .clone()
        .unwrap_or_else(|| document_servers.to_vec());

    let endpoints = item
        .operations
        .iter()
        .map(|(method, operation)| {
            let written = &operation.underlying;
            ResolvedEndpoint {
                method: *method,
                path: path.to_string(),
                operation_id: written.operation_id.clone(),
                tags: written.tags.clone(),
                summary: written
                    .summary
                    .clone()
                    .or_else(|| item.underlying.summary.clone()),
                description: written
                    .description
                    .clone()
                    .or_else(|| item.underlying.description.clone()),
                parameters: merge_parameters(&item.parameters, &operation.parameters),
                request_body: operation.request_body.clone(),
                responses: operation.responses.clone(),
                deprecated: written.deprecated,
                security: operation
                    .security
                    .clone()
                    .unwrap_or_else(|| document_security.to_vec()),
                servers: written
                    .servers
                    .clone()
                    .unwrap_or_else(|| route_servers.clone()),
            }
        })
        .collect();

    ResolvedRoute {
        path: path.to_string(),
        summary: item.underlying.summary.clone(),
        description: item.underlying.description.clone(),
        servers: route_servers,
        endpoints,
    }
}

impl DereferencedDocument<'_> {
    /// Builds the route and endpoint views of the document's paths.
    pub fn resolved(&self) -> ResolvedDocument {
        let routes: Vec<ResolvedRoute> = self
            .paths
            .iter()
            .map(|(path, item)| {
                resolve_route(path, item, &self.underlying.servers, &self.security)
            })
            .collect();
        let endpoints = routes
            .iter()
            .flat_map(|route| route.endpoints.iter().cloned())
            .collect();
        ResolvedDocument { routes, endpoints }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::model::{Document, ParameterLocation};

    const DOC: &str = r#"
openapi: 3.1.0
info: {title: Shop, version: 1.0.0}
servers:
  - url: https://api.example.com
security:
  - api_key: []
paths:
  /orders/{id}:
    summary: A single order
    servers:
      - url: https://orders.example.com
    parameters:
      - {name: id, in: path, required: true, schema: {type: string}}
      - {name: verbose, in: query, schema: {type: boolean}}
    get:
      operationId: getOrder
      parameters:
        - {name: verbose, in: query, required: true, schema: {type: integer}}
        - $ref: '#/components/parameters/Trace'
      responses:
        '200': {description: OK}
    delete:
      description: Cancel
      security: []
      servers:
        - url: https://admin.example.com
      responses:
        '204': {description: Gone}
  /health:
    get:
      responses:
        '200': {description: OK}
components:
  parameters:
    Trace: {name: X-Trace, in: header}
  securitySchemes:
    api_key: {type: apiKey, name: key, in: header}
"#;

    fn resolved() -> ResolvedDocument {
        let doc = Document::from_yaml(DOC).unwrap();
        let dereferenced = doc.locally_dereferenced().unwrap();
        dereferenced.resolved()
    }

    #[test]
    fn test_operation_parameters_override_inherited() {
        let resolved = resolved();
        let endpoint = resolved.endpoint(HttpMethod::Get, "/orders/{id}").unwrap();
        let identities: Vec<(String, ParameterLocation)> =
            endpoint.parameters.iter().map(|p| p.identity()).collect();
        assert_eq!(
            identities,
            vec![
                ("id".to_string(), ParameterLocation::Path),
                ("verbose".to_string(), ParameterLocation::Query),
                ("X-Trace".to_string(), ParameterLocation::Header),
            ]
        );
        assert!(endpoint.parameters[1].underlying.required);
    }

    #[test]
    fn test_fallbacks() {
        let resolved = resolved();
        let get = resolved.endpoint(HttpMethod::Get, "/orders/{id}").unwrap();
        assert_eq!(get.summary.as_deref(), Some("A single order"));
        assert_eq!(get.security.len(), 1);
        assert_eq!(get.servers[0].url, "https://orders.example.com");

        let delete = resolved.endpoint(HttpMethod::Delete, "/orders/{id}").unwrap();
        assert_eq!(delete.description.as_deref(), Some("Cancel"));
        assert!(delete.security.is_empty());
        assert_eq!(delete.servers[0].url, "https://admin.example.com");

        let health = resolved.endpoint(HttpMethod::Get, "/health").unwrap();
        assert_eq!(health.servers[0].url, "https://api.example.com");
    }

    #[test]
    fn test_routes_follow_document_order() {
        let resolved = resolved();
        let paths: Vec<&str> = resolved.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/orders/{id}", "/health"]);
        assert_eq!(resolved.routes[0].endpoints.len(), 2);
        assert_eq!(resolved.endpoints.len(), 3);
        assert!(resolved.endpoint(HttpMethod::Post, "/health").is_none());
    }
}
