#![deny(missing_docs)]

//! # Components Registry
//!
//! Per-document registry of named, kind-grouped reusable values.
//!
//! Every group is a strongly typed `IndexMap<ComponentKey, T>`; the
//! `ComponentKind` trait ties a model type to its group so that a
//! `Reference<T>` can only ever be looked up in the map for `T`.

use crate::error::{AppError, AppResult};
use crate::oas::model::{
    Callbacks, Example, Header, Link, Parameter, PathItem, RequestBody, Response, SecurityScheme,
};
use crate::oas::reference::{Reference, ReferenceTarget};
use crate::oas::schema::Schema;
use derive_more::Display;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;
use url::Url;

/// Pattern every component key must match.
pub const COMPONENT_KEY_PATTERN: &str = r"^[a-zA-Z0-9\.\-_]+$";

/// A validated component name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Validates `value` against [`COMPONENT_KEY_PATTERN`].
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let re = Regex::new(COMPONENT_KEY_PATTERN).expect("Invalid regex constant");
        if re.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::ComponentKeyInvalid(format!(
                "Keys for components in the Components Object must conform to the regex `{}`. '{}' does not.",
                COMPONENT_KEY_PATTERN, value
            )))
        }
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ComponentKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ComponentKey {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComponentKey> for String {
    fn from(key: ComponentKey) -> Self {
        key.0
    }
}

impl std::borrow::Borrow<str> for ComponentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ten groups of the Components Object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ComponentGroup {
    /// `schemas`
    #[display("schemas")]
    Schemas,
    /// `parameters`
    #[display("parameters")]
    Parameters,
    /// `responses`
    #[display("responses")]
    Responses,
    /// `examples`
    #[display("examples")]
    Examples,
    /// `requestBodies`
    #[display("requestBodies")]
    RequestBodies,
    /// `headers`
    #[display("headers")]
    Headers,
    /// `links`
    #[display("links")]
    Links,
    /// `callbacks`
    #[display("callbacks")]
    Callbacks,
    /// `pathItems`
    #[display("pathItems")]
    PathItems,
    /// `securitySchemes`
    #[display("securitySchemes")]
    SecuritySchemes,
}

impl ComponentGroup {
    /// Every group, in document order.
    pub const ALL: [ComponentGroup; 10] = [
        ComponentGroup::Schemas,
        ComponentGroup::Parameters,
        ComponentGroup::Responses,
        ComponentGroup::Examples,
        ComponentGroup::RequestBodies,
        ComponentGroup::Headers,
        ComponentGroup::Links,
        ComponentGroup::Callbacks,
        ComponentGroup::PathItems,
        ComponentGroup::SecuritySchemes,
    ];

    /// Parses the wire name of a group (e.g. `requestBodies`).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.to_string() == name)
    }
}

/// Ordered map from component key to value.
pub type ComponentMap<T> = IndexMap<ComponentKey, T>;

/// A model type that can be stored in (and referenced from) the Components Object.
pub trait ComponentKind: Sized + Clone + PartialEq {
    /// The group holding values of this kind.
    const GROUP: ComponentGroup;

    /// The map for this kind.
    fn group(components: &Components) -> &ComponentMap<Self>;

    /// The mutable map for this kind.
    fn group_mut(components: &mut Components) -> &mut ComponentMap<Self>;
}

macro_rules! component_kind {
    ($ty:ty, $group:ident, $field:ident) => {
        impl ComponentKind for $ty {
            const GROUP: ComponentGroup = ComponentGroup::$group;

            fn group(components: &Components) -> &ComponentMap<Self> {
                &components.$field
            }

            fn group_mut(components: &mut Components) -> &mut ComponentMap<Self> {
                &mut components.$field
            }
        }
    };
}

component_kind!(Schema, Schemas, schemas);
component_kind!(Parameter, Parameters, parameters);
component_kind!(Response, Responses, responses);
component_kind!(Example, Examples, examples);
component_kind!(RequestBody, RequestBodies, request_bodies);
component_kind!(Header, Headers, headers);
component_kind!(Link, Links, links);
component_kind!(Callbacks, Callbacks, callbacks);
component_kind!(PathItem, PathItems, path_items);
component_kind!(SecurityScheme, SecuritySchemes, security_schemes);

/// The Components Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    /// Reusable schemas.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: ComponentMap<Schema>,
    /// Reusable parameters.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: ComponentMap<Parameter>,
    /// Reusable responses.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: ComponentMap<Response>,
    /// Reusable examples.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub examples: ComponentMap<Example>,
    /// Reusable request bodies.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub request_bodies: ComponentMap<RequestBody>,
    /// Reusable headers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: ComponentMap<Header>,
    /// Reusable links.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: ComponentMap<Link>,
    /// Reusable callbacks.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub callbacks: ComponentMap<Callbacks>,
    /// Reusable path items.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub path_items: ComponentMap<PathItem>,
    /// Reusable security schemes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: ComponentMap<SecurityScheme>,
    /// Specification Extensions (x-...).
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl Components {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the value an internal reference points to.
    ///
    /// External references and absent keys both yield `None`.
    pub fn lookup<T: ComponentKind>(&self, reference: &Reference<T>) -> Option<&T> {
        match reference.target() {
            ReferenceTarget::Internal(key) => T::group(self).get(key),
            ReferenceTarget::External(_) => None,
        }
    }

    /// True when `reference` is internal and its key is present.
    pub fn contains<T: ComponentKind>(&self, reference: &Reference<T>) -> bool {
        self.lookup(reference).is_some()
    }

    /// Looks up a component by key.
    pub fn get<T: ComponentKind>(&self, key: &ComponentKey) -> Option<&T> {
        T::group(self).get(key)
    }

    /// Inserts a value under `key`, validating the key syntax.
    ///
    /// Returns the value previously stored under the key, if any.
    pub fn insert<T: ComponentKind>(&mut self, key: &str, value: T) -> AppResult<Option<T>> {
        let key = ComponentKey::new(key)?;
        Ok(T::group_mut(self).insert(key, value))
    }

    /// Inserts a value loaded from an external source under a derived key.
    ///
    /// Inserting an identical value twice is a no-op; a different value under
    /// the same key is a collision.
    pub fn insert_external<T: ComponentKind>(
        &mut self,
        key: ComponentKey,
        value: T,
    ) -> AppResult<Reference<T>> {
        let group = T::group_mut(self);
        match group.get(&key) {
            Some(existing) if *existing != value => {
                warn!(group = %T::GROUP, key = %key, "external component collides with existing value");
                return Err(AppError::ComponentCollision {
                    group: T::GROUP,
                    key: key.to_string(),
                });
            }
            Some(_) => {}
            None => {
                group.insert(key.clone(), value);
            }
        }
        Ok(Reference::internal(key))
    }

    /// Merges `other` into `self`.
    ///
    /// Fails without modifying `self` if any key in any group holds two
    /// non-identical values. Identical values merge idempotently.
    pub fn merge(&mut self, other: Components) -> AppResult<()> {
        self.check_collisions::<Schema>(&other)?;
        self.check_collisions::<Parameter>(&other)?;
        self.check_collisions::<Response>(&other)?;
        self.check_collisions::<Example>(&other)?;
        self.check_collisions::<RequestBody>(&other)?;
        self.check_collisions::<Header>(&other)?;
        self.check_collisions::<Link>(&other)?;
        self.check_collisions::<Callbacks>(&other)?;
        self.check_collisions::<PathItem>(&other)?;
        self.check_collisions::<SecurityScheme>(&other)?;

        absorb(&mut self.schemas, other.schemas);
        absorb(&mut self.parameters, other.parameters);
        absorb(&mut self.responses, other.responses);
        absorb(&mut self.examples, other.examples);
        absorb(&mut self.request_bodies, other.request_bodies);
        absorb(&mut self.headers, other.headers);
        absorb(&mut self.links, other.links);
        absorb(&mut self.callbacks, other.callbacks);
        absorb(&mut self.path_items, other.path_items);
        absorb(&mut self.security_schemes, other.security_schemes);
        for (key, value) in other.extensions {
            self.extensions.entry(key).or_insert(value);
        }
        Ok(())
    }

    /// Returns a new registry holding `self` merged with `other`.
    pub fn merged(&self, other: Components) -> AppResult<Components> {
        let mut merged = self.clone();
        merged.merge(other)?;
        Ok(merged)
    }

    /// Total number of components across all groups.
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.parameters.len()
            + self.responses.len()
            + self.examples.len()
            + self.request_bodies.len()
            + self.headers.len()
            + self.links.len()
            + self.callbacks.len()
            + self.path_items.len()
            + self.security_schemes.len()
    }

    /// True when no group holds any component.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_collisions<T: ComponentKind>(&self, other: &Components) -> AppResult<()> {
        let ours = T::group(self);
        for (key, value) in T::group(other) {
            if let Some(existing) = ours.get(key) {
                if existing != value {
                    warn!(group = %T::GROUP, key = %key, "components merge collision");
                    return Err(AppError::ComponentCollision {
                        group: T::GROUP,
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn absorb<T>(target: &mut ComponentMap<T>, source: ComponentMap<T>) {
    for (key, value) in source {
        target.entry(key).or_insert(value);
    }
}

/// Derives a component key for an externally loaded value.
///
/// The key combines a readable stem taken from the URL (last path segment
/// without extension, plus the last fragment segment) with a short SHA-256
/// digest of the full URL, so different sources never share a key.
pub fn hashed_component_key(url: &str) -> AppResult<ComponentKey> {
    let (document, fragment) = match url.split_once('#') {
        Some((doc, frag)) => (doc, Some(frag)),
        None => (url, None),
    };

    let path = match Url::parse(document) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => document.to_string(),
    };
    let file = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("external");
    let stem = file.split('.').next().unwrap_or(file);

    let mut readable = sanitize_key_part(stem);
    if let Some(last) = fragment.and_then(|f| f.rsplit('/').find(|s| !s.is_empty())) {
        readable.push('_');
        readable.push_str(&sanitize_key_part(last));
    }

    let digest = Sha256::digest(url.as_bytes());
    let suffix: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();

    ComponentKey::new(format!("{}_{}", readable, suffix))
}

fn sanitize_key_part(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "external".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::schema::{CoreContext, StringContext};

    fn string_schema(max_length: Option<u64>) -> Schema {
        Schema::String {
            core: CoreContext::default(),
            string: StringContext {
                max_length,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_component_key_validation() {
        assert!(ComponentKey::new("").is_err());
        assert!(ComponentKey::new("(bad)").is_err());
        assert!(ComponentKey::new("good.key-1_2").is_ok());
    }

    #[test]
    fn test_component_key_error_message() {
        let err = ComponentKey::new("(bad)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Keys for components in the Components Object must conform to the regex `^[a-zA-Z0-9\\.\\-_]+$`. '(bad)' does not."
        );
    }

    #[test]
    fn test_component_key_rejected_on_decode() {
        let yaml = r#"
schemas:
  "bad key":
    type: string
"#;
        let result: Result<Components, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_lookup_absent_is_none() {
        let components = Components::new();
        let reference = Reference::<Schema>::internal(ComponentKey::new("missing").unwrap());
        assert!(components.lookup(&reference).is_none());
        assert!(!components.contains(&reference));
    }

    #[test]
    fn test_lookup_external_is_none() {
        let mut components = Components::new();
        components.insert("User", string_schema(None)).unwrap();
        let reference = Reference::<Schema>::external("https://example.com/User.yaml");
        assert!(components.lookup(&reference).is_none());
    }

    #[test]
    fn test_merge_identical_is_idempotent() {
        let mut a = Components::new();
        a.insert("Name", string_schema(Some(5))).unwrap();
        let b = a.clone();
        a.merge(b).unwrap();
        assert_eq!(a.schemas.len(), 1);
    }

    #[test]
    fn test_merge_collision_leaves_target_untouched() {
        let mut a = Components::new();
        a.insert("Name", string_schema(Some(5))).unwrap();

        let mut b = Components::new();
        b.insert("Other", string_schema(None)).unwrap();
        b.insert("Name", string_schema(Some(10))).unwrap();

        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, AppError::ComponentCollision { .. }));
        assert_eq!(a.schemas.len(), 1);
    }

    #[test]
    fn test_insert_external_collision() {
        let mut components = Components::new();
        let key = ComponentKey::new("Name").unwrap();
        components
            .insert_external(key.clone(), string_schema(Some(1)))
            .unwrap();
        components
            .insert_external(key.clone(), string_schema(Some(1)))
            .unwrap();
        let err = components
            .insert_external(key, string_schema(Some(2)))
            .unwrap_err();
        assert!(matches!(err, AppError::ComponentCollision { .. }));
    }

    #[test]
    fn test_group_parse_round_trip() {
        for group in ComponentGroup::ALL {
            assert_eq!(ComponentGroup::parse(&group.to_string()), Some(group));
        }
        assert_eq!(ComponentGroup::parse("mediaTypes"), None);
    }

    #[test]
    fn test_hashed_component_key_is_stable_and_distinct() {
        let a = hashed_component_key("https://example.com/schemas/user.yaml#/User").unwrap();
        let b = hashed_component_key("https://example.com/schemas/user.yaml#/User").unwrap();
        let c = hashed_component_key("https://example.com/other/user.yaml#/User").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("user_User_"));
    }
}
