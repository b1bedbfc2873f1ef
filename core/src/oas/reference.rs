#![deny(missing_docs)]

//! # References
//!
//! `Reference<T>` points either into the Components Object (internal) or at
//! an arbitrary URL (external). The type parameter pins the Components group a
//! reference may target, so a `Reference<Parameter>` can never be looked up
//! among schemas.
//!
//! `RefOr<T>` is the pervasive "inline value or reference" variant.

use crate::error::{AppError, AppResult};
use crate::oas::components::{ComponentGroup, ComponentKey, ComponentKind};
use percent_encoding::percent_decode_str;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

const COMPONENTS_SEGMENT: &str = "components";

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    /// `#/components/<group>/<key>`
    Internal(ComponentKey),
    /// Any reference that does not start with `#`, kept verbatim.
    External(String),
}

/// A typed reference to a component of kind `T`.
pub struct Reference<T> {
    target: ReferenceTarget,
    kind: PhantomData<fn() -> T>,
}

impl<T> Reference<T> {
    /// An internal reference to the component named `key`.
    pub fn internal(key: ComponentKey) -> Self {
        Self {
            target: ReferenceTarget::Internal(key),
            kind: PhantomData,
        }
    }

    /// An external reference; `url` is stored exactly as given.
    pub fn external(url: impl Into<String>) -> Self {
        Self {
            target: ReferenceTarget::External(url.into()),
            kind: PhantomData,
        }
    }

    /// The reference target.
    pub fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    /// The component key for internal references.
    pub fn key(&self) -> Option<&ComponentKey> {
        match &self.target {
            ReferenceTarget::Internal(key) => Some(key),
            ReferenceTarget::External(_) => None,
        }
    }

    /// The URL for external references.
    pub fn url(&self) -> Option<&str> {
        match &self.target {
            ReferenceTarget::Internal(_) => None,
            ReferenceTarget::External(url) => Some(url),
        }
    }

    /// True for references into the Components Object.
    pub fn is_internal(&self) -> bool {
        matches!(self.target, ReferenceTarget::Internal(_))
    }
}

impl<T: ComponentKind> Reference<T> {
    /// The group this reference targets.
    pub fn group(&self) -> ComponentGroup {
        T::GROUP
    }

    /// Parses the `$ref` text form.
    ///
    /// Local pointers must have the shape `#/components/<group>/<key>` and
    /// name the group of `T`. Anything not starting with `#` is external.
    pub fn parse(text: &str) -> AppResult<Self> {
        if text.is_empty() {
            return Err(AppError::Parse("Empty $ref".into()));
        }

        let Some(pointer) = text.strip_prefix('#') else {
            return Ok(Self::external(text));
        };

        let segments: Vec<String> = pointer
            .trim_start_matches('/')
            .split('/')
            .map(decode_pointer_segment)
            .collect();

        match segments.as_slice() {
            [components, group, key] if components == COMPONENTS_SEGMENT => {
                let parsed_group = ComponentGroup::parse(group).ok_or_else(|| {
                    AppError::Parse(format!(
                        "Reference '{}' names unknown components group '{}'",
                        text, group
                    ))
                })?;
                if parsed_group != T::GROUP {
                    return Err(AppError::Parse(format!(
                        "Reference '{}' targets '{}' but a '{}' reference was expected",
                        text,
                        parsed_group,
                        T::GROUP
                    )));
                }
                Ok(Self::internal(ComponentKey::new(key.as_str())?))
            }
            _ => Err(AppError::Parse(format!(
                "Unsupported local reference '{}': expected '#/{}/{}/<key>'",
                text,
                COMPONENTS_SEGMENT,
                T::GROUP
            ))),
        }
    }

    /// The `$ref` text form.
    pub fn to_ref_string(&self) -> String {
        match &self.target {
            ReferenceTarget::Internal(key) => format!(
                "#/{}/{}/{}",
                COMPONENTS_SEGMENT,
                T::GROUP,
                encode_pointer_segment(key.as_str())
            ),
            ReferenceTarget::External(url) => url.clone(),
        }
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            kind: PhantomData,
        }
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T> Eq for Reference<T> {}

impl<T> Hash for Reference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reference").field(&self.target).finish()
    }
}

impl<T: ComponentKind> fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ref_string())
    }
}

impl<T: ComponentKind> Serialize for Reference<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_ref_string())
    }
}

impl<'de, T: ComponentKind> Deserialize<'de> for Reference<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Reference::parse(&text).map_err(|e| DeError::custom(e.to_string()))
    }
}

/// A value written inline or as a reference to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum RefOr<T> {
    /// A `$ref` object.
    Ref(Reference<T>),
    /// An inline value.
    T(T),
}

impl<T> RefOr<T> {
    /// The inline value, if any.
    pub fn as_inline(&self) -> Option<&T> {
        match self {
            RefOr::T(value) => Some(value),
            RefOr::Ref(_) => None,
        }
    }

    /// The reference, if any.
    pub fn as_reference(&self) -> Option<&Reference<T>> {
        match self {
            RefOr::Ref(reference) => Some(reference),
            RefOr::T(_) => None,
        }
    }
}

impl<T> From<Reference<T>> for RefOr<T> {
    fn from(reference: Reference<T>) -> Self {
        RefOr::Ref(reference)
    }
}

impl<T: ComponentKind + Serialize> Serialize for RefOr<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RefOr::Ref(reference) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", &reference.to_ref_string())?;
                map.end()
            }
            RefOr::T(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: ComponentKind + DeserializeOwned> Deserialize<'de> for RefOr<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        if let Some(text) = raw.get("$ref").and_then(Value::as_str) {
            let reference = Reference::parse(text).map_err(|e| DeError::custom(e.to_string()))?;
            return Ok(RefOr::Ref(reference));
        }
        serde_json::from_value::<T>(raw)
            .map(RefOr::T)
            .map_err(|e| DeError::custom(e.to_string()))
    }
}

/// Decodes a JSON Pointer segment taken from a URI fragment.
///
/// Percent-escapes are decoded first, then `~1` and `~0`.
pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .replace("~1", "/")
        .replace("~0", "~")
}

/// Encodes a JSON Pointer segment (inverse of [`decode_pointer_segment`]).
pub(crate) fn encode_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::model::Parameter;
    use crate::oas::schema::Schema;

    #[test]
    fn test_parse_internal_reference() {
        let reference = Reference::<Schema>::parse("#/components/schemas/User").unwrap();
        assert_eq!(reference.key().map(|k| k.as_str()), Some("User"));
        assert_eq!(reference.group(), ComponentGroup::Schemas);
        assert_eq!(reference.to_ref_string(), "#/components/schemas/User");
    }

    #[test]
    fn test_parse_wrong_group_rejected() {
        let err = Reference::<Parameter>::parse("#/components/schemas/User").unwrap_err();
        assert!(err.to_string().contains("'parameters' reference was expected"));
    }

    #[test]
    fn test_parse_invalid_key_rejected() {
        let err = Reference::<Schema>::parse("#/components/schemas/(bad)").unwrap_err();
        assert!(matches!(err, AppError::ComponentKeyInvalid(_)));
    }

    #[test]
    fn test_parse_unsupported_local_pointer() {
        let err = Reference::<Schema>::parse("#/paths/~1users").unwrap_err();
        assert!(err.to_string().contains("Unsupported local reference"));
    }

    #[test]
    fn test_external_round_trip_exact() {
        let text = "https://example.com/schemas.yaml#/components/schemas/User";
        let reference = Reference::<Schema>::parse(text).unwrap();
        assert_eq!(reference.url(), Some(text));
        assert_eq!(reference.to_ref_string(), text);

        let relative = "./common.yaml#/Pet";
        let reference = Reference::<Schema>::parse(relative).unwrap();
        assert_eq!(reference.to_ref_string(), relative);
    }

    #[test]
    fn test_ref_or_decodes_reference_and_inline() {
        let yaml = r#"
- $ref: '#/components/parameters/Limit'
- name: offset
  in: query
"#;
        let params: Vec<RefOr<Parameter>> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(params[0], RefOr::Ref(_)));
        assert!(matches!(params[1], RefOr::T(_)));

        let encoded = serde_json::to_value(&params[0]).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({"$ref": "#/components/parameters/Limit"})
        );
    }

    #[test]
    fn test_pointer_segment_codec() {
        assert_eq!(decode_pointer_segment("a~1b~0c"), "a/b~c");
        assert_eq!(decode_pointer_segment("User%20Name"), "User Name");
        assert_eq!(encode_pointer_segment("a/b~c"), "a~1b~0c");
    }
}
