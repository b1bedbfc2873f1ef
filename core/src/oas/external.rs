#![deny(missing_docs)]

//! # External Dereferencing
//!
//! Loads external references through an injected [`ExternalLoader`] in
//! waves. Each wave:
//!
//! 1. collects every external reference still present in the document,
//! 2. loads all of them concurrently,
//! 3. merges the loaded values into a copy of the Components Object,
//! 4. rewrites the external references as internal ones.
//!
//! A wave either completes entirely or leaves the document untouched.
//! Values loaded in one wave may themselves contain external references;
//! those are picked up by the next wave.

use crate::error::{AppError, AppResult};
use crate::oas::components::{
    hashed_component_key, ComponentGroup, ComponentKey, ComponentKind, Components,
};
use crate::oas::model::{
    Callbacks, Document, Encoding, Example, Header, HttpMethod, Link, MediaType, Operation,
    Parameter, PathItem, RequestBody, Response, SecurityScheme,
};
use crate::oas::reference::{RefOr, Reference, ReferenceTarget};
use crate::oas::schema::{AdditionalProperties, Schema};
use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A component type that an [`ExternalLoader`] can produce.
pub trait LoadableComponent: ComponentKind + DeserializeOwned + Send + Sync + 'static {}

impl<T> LoadableComponent for T where T: ComponentKind + DeserializeOwned + Send + Sync + 'static {}

/// Fetches and decodes externally referenced documents.
///
/// Implementations decide how URLs are interpreted (filesystem, HTTP, an
/// in-memory fixture) and may emit arbitrary messages per load, which are
/// returned to the caller of [`Document::external_dereference`].
#[async_trait]
pub trait ExternalLoader: Send + Sync {
    /// Informational message produced by a load.
    type Message: Send + 'static;

    /// Loads and decodes the value at `url`.
    async fn load<T>(&self, url: &str) -> AppResult<(T, Vec<Self::Message>)>
    where
        T: LoadableComponent;

    /// Derives the Components key under which the value loaded from `url` is stored.
    fn component_key<T: ComponentKind>(&self, url: &str) -> AppResult<ComponentKey> {
        hashed_component_key(url)
    }
}

/// How many waves of external loading to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalDereferenceDepth {
    /// At most this many waves.
    Iterations(u32),
    /// Until no external references remain.
    Full,
}

impl Default for ExternalDereferenceDepth {
    fn default() -> Self {
        ExternalDereferenceDepth::Iterations(1)
    }
}

/// Receives every reference in a tree, mutably.
pub trait ReferenceVisitor {
    /// Called once per reference.
    fn visit<T: ComponentKind>(&mut self, reference: &mut Reference<T>);
}

/// Receives every reference in a tree, read-only.
pub trait ReferenceInspector {
    /// Called once per reference.
    fn inspect<T: ComponentKind>(&mut self, reference: &Reference<T>);
}

/// Nodes whose references can be enumerated and rewritten.
pub trait WalkReferences {
    /// Calls `visitor` for every reference reachable from `self`.
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V);
}

/// Nodes whose references can be enumerated without mutation.
pub trait InspectReferences {
    /// Calls `inspector` for every reference reachable from `self`.
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I);
}

impl<W: WalkReferences> WalkReferences for Option<W> {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        if let Some(inner) = self {
            inner.walk_references(visitor);
        }
    }
}

impl<W: InspectReferences> InspectReferences for Option<W> {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        if let Some(inner) = self {
            inner.inspect_references(inspector);
        }
    }
}

impl<W: WalkReferences> WalkReferences for Box<W> {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        self.as_mut().walk_references(visitor);
    }
}

impl<W: InspectReferences> InspectReferences for Box<W> {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        self.as_ref().inspect_references(inspector);
    }
}

impl<W: WalkReferences> WalkReferences for Vec<W> {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        for item in self {
            item.walk_references(visitor);
        }
    }
}

impl<W: InspectReferences> InspectReferences for Vec<W> {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        for item in self {
            item.inspect_references(inspector);
        }
    }
}

impl<K, W: WalkReferences> WalkReferences for IndexMap<K, W> {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        for item in self.values_mut() {
            item.walk_references(visitor);
        }
    }
}

impl<K, W: InspectReferences> InspectReferences for IndexMap<K, W> {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        for item in self.values() {
            item.inspect_references(inspector);
        }
    }
}

impl<T: ComponentKind + WalkReferences> WalkReferences for RefOr<T> {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        match self {
            RefOr::Ref(reference) => visitor.visit(reference),
            RefOr::T(value) => value.walk_references(visitor),
        }
    }
}

impl<T: ComponentKind + InspectReferences> InspectReferences for RefOr<T> {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        match self {
            RefOr::Ref(reference) => inspector.inspect(reference),
            RefOr::T(value) => value.inspect_references(inspector),
        }
    }
}

impl WalkReferences for Schema {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        match self {
            Schema::Reference { reference, .. } => visitor.visit(reference),
            Schema::Object { object, .. } => {
                object.properties.walk_references(visitor);
                if let Some(AdditionalProperties::Schema(schema)) = &mut object.additional_properties {
                    schema.walk_references(visitor);
                }
            }
            Schema::Array { array, .. } => array.items.walk_references(visitor),
            Schema::AllOf { of, .. } | Schema::OneOf { of, .. } | Schema::AnyOf { of, .. } => {
                of.walk_references(visitor)
            }
            Schema::Not { not, .. } => not.walk_references(visitor),
            Schema::Boolean { .. }
            | Schema::Number { .. }
            | Schema::Integer { .. }
            | Schema::String { .. }
            | Schema::Fragment { .. } => {}
        }
    }
}

impl InspectReferences for Schema {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        match self {
            Schema::Reference { reference, .. } => inspector.inspect(reference),
            Schema::Object { object, .. } => {
                object.properties.inspect_references(inspector);
                if let Some(AdditionalProperties::Schema(schema)) = &object.additional_properties {
                    schema.inspect_references(inspector);
                }
            }
            Schema::Array { array, .. } => array.items.inspect_references(inspector),
            Schema::AllOf { of, .. } | Schema::OneOf { of, .. } | Schema::AnyOf { of, .. } => {
                of.inspect_references(inspector)
            }
            Schema::Not { not, .. } => not.inspect_references(inspector),
            Schema::Boolean { .. }
            | Schema::Number { .. }
            | Schema::Integer { .. }
            | Schema::String { .. }
            | Schema::Fragment { .. } => {}
        }
    }
}

impl WalkReferences for PathItem {
    fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
        self.parameters.walk_references(visitor);
        for method in HttpMethod::ALL {
            self.operation_slot(method).walk_references(visitor);
        }
    }
}

impl InspectReferences for PathItem {
    fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
        self.parameters.inspect_references(inspector);
        for (_, operation) in self.operations() {
            operation.inspect_references(inspector);
        }
    }
}

macro_rules! leaf_references {
    ($($ty:ty),*) => {
        $(
            impl WalkReferences for $ty {
                fn walk_references<V: ReferenceVisitor>(&mut self, _visitor: &mut V) {}
            }

            impl InspectReferences for $ty {
                fn inspect_references<I: ReferenceInspector>(&self, _inspector: &mut I) {}
            }
        )*
    };
}

leaf_references!(Example, Link, SecurityScheme);

/// Implements both walks for a struct by visiting the listed fields in order.
macro_rules! field_references {
    ($($ty:ty { $($field:tt),+ }),* $(,)?) => {
        $(
            impl WalkReferences for $ty {
                fn walk_references<V: ReferenceVisitor>(&mut self, visitor: &mut V) {
                    $(self.$field.walk_references(visitor);)+
                }
            }

            impl InspectReferences for $ty {
                fn inspect_references<I: ReferenceInspector>(&self, inspector: &mut I) {
                    $(self.$field.inspect_references(inspector);)+
                }
            }
        )*
    };
}

field_references!(
    MediaType { schema, examples, encoding },
    Encoding { headers },
    Header { schema, content },
    Parameter { schema, content, examples },
    RequestBody { content },
    Response { headers, content, links },
    Callbacks { 0 },
    Operation { parameters, request_body, responses, callbacks },
    Components {
        schemas,
        parameters,
        responses,
        examples,
        request_bodies,
        headers,
        links,
        callbacks,
        path_items,
        security_schemes
    },
    Document { paths, webhooks, components },
);

/// Collects the distinct external URLs per group, in discovery order.
#[derive(Default)]
struct ExternalCollector {
    urls: IndexMap<ComponentGroup, IndexSet<String>>,
}

impl ReferenceInspector for ExternalCollector {
    fn inspect<T: ComponentKind>(&mut self, reference: &Reference<T>) {
        if let ReferenceTarget::External(url) = reference.target() {
            self.urls.entry(T::GROUP).or_default().insert(url.clone());
        }
    }
}

impl ExternalCollector {
    fn len(&self) -> usize {
        self.urls.values().map(IndexSet::len).sum()
    }
}

/// Rewrites loaded external references as internal ones.
struct ExternalRewriter {
    keys: HashMap<(ComponentGroup, String), ComponentKey>,
}

impl ReferenceVisitor for ExternalRewriter {
    fn visit<T: ComponentKind>(&mut self, reference: &mut Reference<T>) {
        let replacement = match reference.target() {
            ReferenceTarget::External(url) => self.keys.get(&(T::GROUP, url.clone())).cloned(),
            ReferenceTarget::Internal(_) => None,
        };
        if let Some(key) = replacement {
            *reference = Reference::internal(key);
        }
    }
}

/// Everything one group contributed to a wave.
struct GroupLoad<M> {
    components: Components,
    keys: Vec<(ComponentGroup, String, ComponentKey)>,
    messages: Vec<M>,
}

async fn load_kind<T, L>(loader: &L, urls: Vec<String>) -> AppResult<GroupLoad<L::Message>>
where
    T: LoadableComponent,
    L: ExternalLoader,
{
    let loads = urls.into_iter().map(|url| async move {
        trace!(group = %T::GROUP, url = %url, "loading external reference");
        let (value, messages) = loader.load::<T>(&url).await?;
        let key = loader.component_key::<T>(&url)?;
        Ok::<_, AppError>((url, key, value, messages))
    });
    let loaded = try_join_all(loads).await?;

    let mut group = GroupLoad {
        components: Components::new(),
        keys: Vec::new(),
        messages: Vec::new(),
    };
    for (url, key, value, messages) in loaded {
        group.components.insert_external(key.clone(), value)?;
        group.keys.push((T::GROUP, url, key));
        group.messages.extend(messages);
    }
    Ok(group)
}

fn load_group<'a, L: ExternalLoader>(
    loader: &'a L,
    group: ComponentGroup,
    urls: Vec<String>,
) -> BoxFuture<'a, AppResult<GroupLoad<L::Message>>> {
    match group {
        ComponentGroup::Schemas => load_kind::<Schema, L>(loader, urls).boxed(),
        ComponentGroup::Parameters => load_kind::<Parameter, L>(loader, urls).boxed(),
        ComponentGroup::Responses => load_kind::<Response, L>(loader, urls).boxed(),
        ComponentGroup::Examples => load_kind::<Example, L>(loader, urls).boxed(),
        ComponentGroup::RequestBodies => load_kind::<RequestBody, L>(loader, urls).boxed(),
        ComponentGroup::Headers => load_kind::<Header, L>(loader, urls).boxed(),
        ComponentGroup::Links => load_kind::<Link, L>(loader, urls).boxed(),
        ComponentGroup::Callbacks => load_kind::<Callbacks, L>(loader, urls).boxed(),
        ComponentGroup::PathItems => load_kind::<PathItem, L>(loader, urls).boxed(),
        ComponentGroup::SecuritySchemes => load_kind::<SecurityScheme, L>(loader, urls).boxed(),
    }
}

impl Document {
    /// Number of distinct external references currently in the document.
    pub fn external_reference_count(&self) -> usize {
        let mut collector = ExternalCollector::default();
        self.inspect_references(&mut collector);
        collector.len()
    }

    /// Loads external references in waves and rewrites them as internal ones.
    ///
    /// `messages` is the accumulator from earlier calls; the messages produced
    /// by this call are appended and the whole list is returned. On error the
    /// document keeps the state reached by the last completed wave.
    pub async fn external_dereference<L: ExternalLoader>(
        &mut self,
        loader: &L,
        depth: ExternalDereferenceDepth,
        mut messages: Vec<L::Message>,
    ) -> AppResult<Vec<L::Message>> {
        let mut wave: u32 = 0;
        loop {
            if let ExternalDereferenceDepth::Iterations(limit) = depth {
                if wave >= limit {
                    break;
                }
            }
            wave += 1;
            let loads = self.external_wave(loader, wave, &mut messages).await?;
            if loads == 0 {
                break;
            }
        }
        Ok(messages)
    }

    /// Runs one wave; returns the number of loads performed.
    async fn external_wave<L: ExternalLoader>(
        &mut self,
        loader: &L,
        wave: u32,
        messages: &mut Vec<L::Message>,
    ) -> AppResult<usize> {
        let mut collector = ExternalCollector::default();
        self.inspect_references(&mut collector);

        let loads = collector.len();
        debug!(wave, loads, "starting external dereference wave");
        if loads == 0 {
            return Ok(0);
        }

        let groups = collector
            .urls
            .into_iter()
            .map(|(group, urls)| load_group(loader, group, urls.into_iter().collect()));
        let loaded = try_join_all(groups).await?;

        let mut working = self.clone();
        let mut components = working.components.clone();
        let mut wave_messages = Vec::new();
        let mut keys = HashMap::new();
        for group in loaded {
            components.merge(group.components)?;
            for (kind, url, key) in group.keys {
                keys.insert((kind, url), key);
            }
            wave_messages.extend(group.messages);
        }

        working.components = components;
        working.walk_references(&mut ExternalRewriter { keys });
        *self = working;
        messages.extend(wave_messages);

        debug!(wave, loads, "completed external dereference wave");
        Ok(loads)
    }
}
