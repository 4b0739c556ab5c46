//! `$ref` composition over a whole document.
//!
//! The composer walks the document depth-first and replaces every reference
//! it can with the value it points at, recursively. Circular references are
//! detected with an explicit stack of normalized refs and written back as
//! refs relative to the root document (or absolute, on request). A dry run
//! collects every circular ref up front, so composing a composed document
//! changes nothing.
//!
//! # Traversal order
//!
//! definitions, parameters, responses (and their content), then paths. Within
//! a path item: its `$ref`, its parameters, then each operation (get, head,
//! options, put, post, patch, delete). Within an operation: parameters, the
//! request body, then responses with `default` first.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{cache_or_default, ResolutionCache};
use crate::error::ComposeError;
use crate::loader::{DefaultLoader, PathLoader};
use crate::model::{
    Content, Operation, Parameter, PathItem, Refable, RequestBody, Response, Swagger,
};
use crate::normalize::{denormalize_ref, document_part, normalize_base, normalize_ref, ROOT_BASE};
use crate::resolver::Resolver;
use crate::schema::Schema;
use crate::types::ComposeOptions;

/// Outcome of a composition.
///
/// Only populated when `continue_on_error` is set; otherwise the first error
/// aborts the composition.
#[derive(Debug, Default)]
pub struct ComposeReport {
    pub errors: Vec<ComposeError>,
}

impl ComposeReport {
    /// True when every reference was composed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A container that may carry a `$ref` of its own and embed a schema.
pub enum RefSite<'a> {
    Parameter(&'a mut Parameter),
    Response(&'a mut Response),
    Content(&'a mut Content),
    RequestBody(&'a mut RequestBody),
    PathItem(&'a mut PathItem),
}

impl RefSite<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            RefSite::Parameter(_) => Parameter::KIND,
            RefSite::Response(_) => Response::KIND,
            RefSite::Content(_) => Content::KIND,
            RefSite::RequestBody(_) => RequestBody::KIND,
            RefSite::PathItem(_) => PathItem::KIND,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            RefSite::Parameter(node) => node.reference(),
            RefSite::Response(node) => node.reference(),
            RefSite::Content(node) => node.reference(),
            RefSite::RequestBody(node) => node.reference(),
            RefSite::PathItem(node) => node.reference(),
        }
    }

    pub fn schema_mut(&mut self) -> Option<&mut Schema> {
        match self {
            RefSite::Parameter(node) => node.schema_mut(),
            RefSite::Response(node) => node.schema_mut(),
            RefSite::Content(node) => node.schema_mut(),
            RefSite::RequestBody(node) => node.schema_mut(),
            RefSite::PathItem(node) => node.schema_mut(),
        }
    }
}

/// Compose `spec` in place using the process-wide base cache and the default
/// loader.
///
/// # Example
///
/// ```
/// use oapi_compose::{compose_spec, ComposeOptions, Swagger};
/// use serde_json::json;
///
/// let mut spec: Swagger = serde_json::from_value(json!({
///     "swagger": "2.0",
///     "definitions": {
///         "Pet": { "properties": { "owner": { "$ref": "#/definitions/Pet" } } }
///     }
/// }))
/// .unwrap();
///
/// compose_spec(&mut spec, &ComposeOptions::default()).unwrap();
/// let owner = &spec.definitions["Pet"].properties["owner"];
/// assert_eq!(owner.ref_str(), Some("#/definitions/Pet"));
/// ```
pub fn compose_spec(
    spec: &mut Swagger,
    options: &ComposeOptions,
) -> Result<ComposeReport, ComposeError> {
    compose_spec_with(spec, options, None, &DefaultLoader)
}

/// Compose `spec` in place.
///
/// The composition works on an overlay of `cache` (or of the base cache when
/// `None`); the supplied cache itself is never written to. Documents missing
/// from the cache are fetched with `loader`.
///
/// # Errors
///
/// The first resolution failure, unless `options.continue_on_error` is set,
/// in which case failures are collected in the returned report.
pub fn compose_spec_with(
    spec: &mut Swagger,
    options: &ComposeOptions,
    cache: Option<&ResolutionCache>,
    loader: &dyn PathLoader,
) -> Result<ComposeReport, ComposeError> {
    let cache = cache_or_default(cache);
    let base = normalize_base(options.relative_base.as_deref().unwrap_or(ROOT_BASE));

    let root = Arc::new(serde_json::to_value(&*spec).map_err(|source| ComposeError::Encode { source })?);
    cache.set(base.clone(), Arc::clone(&root));

    let root_id = match spec.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            let id = normalize_ref(id, &base)?;
            cache.set(document_part(&id), Arc::clone(&root));
            Some(id)
        }
        None => None,
    };

    tracing::debug!(base = %base, root_id = ?root_id, "composing document");

    let mut composer = Composer {
        options,
        resolver: Resolver::new(&cache, loader),
        aliases: definition_aliases(spec, &base, root_id.as_deref()),
        base_path: base.clone(),
        root_id,
        circulars: HashSet::new(),
        errors: Vec::new(),
        dry_run: true,
    };

    // A dry run over a copy collects every circular ref first, so a ref that
    // closes a cycle anywhere is kept as a ref everywhere.
    composer.compose_document(&mut spec.clone(), &base)?;
    tracing::trace!(circulars = composer.circulars.len(), "circular references found");
    composer.dry_run = false;
    composer.compose_document(spec, &base)?;

    let with_refs = spec
        .definitions
        .values()
        .filter(|schema| schema.has_refs())
        .count();
    tracing::debug!(
        with_refs,
        errors = composer.errors.len(),
        "composition finished"
    );
    Ok(ComposeReport {
        errors: composer.errors,
    })
}

/// Normalized `#/definitions/<name>` pointer of each definition that is a
/// bare `$ref` to another document, keyed by its normalized target.
fn definition_aliases(spec: &Swagger, base: &str, root_id: Option<&str>) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for (name, schema) in &spec.definitions {
        if schema.id_str().is_some() {
            continue;
        }
        let Some(reference) = schema.ref_str() else {
            continue;
        };
        let (Ok(target), Ok(own)) = (
            normalize_ref(reference, base),
            normalize_ref(&definition_pointer(name), base),
        ) else {
            continue;
        };
        let document = document_part(&target);
        if document == base || root_id.is_some_and(|id| document_part(id) == document) {
            continue;
        }
        aliases.entry(target).or_insert(own);
    }
    aliases
}

fn definition_pointer(name: &str) -> String {
    format!(
        "#/definitions/{}",
        name.replace('~', "~0").replace('/', "~1")
    )
}

struct Composer<'a> {
    options: &'a ComposeOptions,
    resolver: Resolver<'a>,
    /// Cycles closing on an external definition target are written as the
    /// local definition.
    aliases: HashMap<String, String>,
    /// Normalized base of the root document.
    base_path: String,
    /// Normalized `id` of the root document.
    root_id: Option<String>,
    /// Refs already found to close a cycle; they are never expanded again.
    circulars: HashSet<String>,
    errors: Vec<ComposeError>,
    /// Discards errors and only collects `circulars`.
    dry_run: bool,
}

impl Composer<'_> {
    fn compose_document(&mut self, spec: &mut Swagger, base: &str) -> Result<(), ComposeError> {
        if !self.options.skip_schemas {
            for (name, schema) in spec.definitions.iter_mut() {
                let result = self.compose_definition(name, schema, base);
                self.recover(result)?;
            }
        }

        for parameter in spec.parameters.values_mut() {
            let result = self.compose_site(RefSite::Parameter(parameter), base);
            self.recover(result)?;
        }

        for response in spec.responses.values_mut() {
            let result = self.compose_site(RefSite::Response(response), base);
            self.recover(result)?;
        }

        for (path, item) in spec.paths.paths.iter_mut() {
            tracing::trace!(path = %path, "composing path item");
            let result = self.compose_site(RefSite::PathItem(item), base);
            self.recover(result)?;
        }
        Ok(())
    }

    /// A definition starts with its own pointer on the stack so a
    /// self-reference stops at the first re-entry.
    fn compose_definition(
        &mut self,
        name: &str,
        schema: &mut Schema,
        base: &str,
    ) -> Result<(), ComposeError> {
        let mut stack = vec![normalize_ref(&definition_pointer(name), base)?];
        self.compose_schema_from(schema, &mut stack, base, true)
    }

    fn compose_schema(
        &mut self,
        schema: &mut Schema,
        stack: &mut Vec<String>,
        base: &str,
    ) -> Result<(), ComposeError> {
        self.compose_schema_from(schema, stack, base, false)
    }

    /// With `at_root` set, the ref chain a definition starts with is expanded
    /// even when its targets are known to be circular, so the definition is
    /// never left as a bare ref to itself.
    fn compose_schema_from(
        &mut self,
        schema: &mut Schema,
        stack: &mut Vec<String>,
        base: &str,
        at_root: bool,
    ) -> Result<(), ComposeError> {
        let mut base = base.to_string();
        if let Some(id) = schema.id_str() {
            base = self.register_schema_id(id, schema, &base)?;
        }

        if let Some(reference) = schema.ref_str() {
            let normalized = normalize_ref(reference, &base)?;
            let known = !at_root && self.circulars.contains(&normalized);
            if known || stack.contains(&normalized) {
                tracing::trace!(reference = %normalized, "circular reference");
                *schema = Schema::new_ref(self.mark_circular(normalized));
                return Ok(());
            }

            tracing::debug!(reference = %normalized, "resolving schema");
            let mut target: Schema = self.resolver.resolve(&normalized, &base)?;
            let target_base = document_part(&normalized).to_string();
            stack.push(normalized);
            let result = self.compose_schema_from(&mut target, stack, &target_base, at_root);
            stack.pop();
            result?;
            *schema = target;
            return Ok(());
        }

        for child in schema.children_mut() {
            let result = self.compose_schema(child, stack, &base);
            self.recover(result)?;
        }
        Ok(())
    }

    /// Make the schema reachable under its `id` and return the new scope.
    /// An id ending in `/` names a folder, so a file name is appended to keep
    /// relative refs resolving inside it. A fragment-only id keeps the current
    /// scope, and an id naming a document already in the cache only switches
    /// to it.
    fn register_schema_id(
        &self,
        id: &str,
        schema: &Schema,
        base: &str,
    ) -> Result<String, ComposeError> {
        let id = if id.ends_with('/') {
            format!("{}placeholder.json", id)
        } else {
            id.to_string()
        };
        let scope = document_part(&normalize_ref(&id, base)?).to_string();
        if scope == base {
            return Ok(scope);
        }

        let cache = self.resolver.cache();
        if cache.get(&scope).is_none() {
            let value =
                serde_json::to_value(schema).map_err(|source| ComposeError::Encode { source })?;
            cache.set_if_absent(scope.clone(), value);
        }
        tracing::debug!(scope = %scope, "schema id changes resolution scope");
        Ok(scope)
    }

    /// Nested content of a resolved container resolves against the document
    /// the container came from.
    fn compose_site(&mut self, site: RefSite<'_>, base: &str) -> Result<(), ComposeError> {
        if let Some(reference) = site.reference() {
            tracing::trace!(kind = site.kind(), reference, "reference site");
        }
        match site {
            RefSite::Parameter(node) => self.compose_node(node, base).map(drop),
            RefSite::Content(node) => self.compose_node(node, base).map(drop),
            RefSite::Response(node) => match self.compose_node(node, base)? {
                Some(base) => self.compose_content(&mut node.content, &base),
                None => Ok(()),
            },
            RefSite::RequestBody(node) => match self.compose_node(node, base)? {
                Some(base) => self.compose_content(&mut node.content, &base),
                None => Ok(()),
            },
            RefSite::PathItem(node) => match self.compose_node(node, base)? {
                Some(base) => self.compose_path_item(node, &base),
                None => Ok(()),
            },
        }
    }

    /// Replace the container with its target and compose its embedded
    /// schema. Returns the base of the document the container came from, or
    /// `None` when its own ref chain turned out to be circular.
    fn compose_node<T>(&mut self, node: &mut T, base: &str) -> Result<Option<String>, ComposeError>
    where
        T: Refable + Default,
    {
        let Some(base) = self.deref_container(node, base)? else {
            return Ok(None);
        };

        let result = match node.schema_mut() {
            Some(schema) => self.compose_embedded(schema, &base),
            None => Ok(()),
        };
        self.recover(result)?;
        Ok(Some(base))
    }

    /// Follow the container's `$ref` chain. The node is only replaced once
    /// the whole chain resolved, so a failure leaves the original ref.
    fn deref_container<T>(&mut self, node: &mut T, base: &str) -> Result<Option<String>, ComposeError>
    where
        T: Refable + Default,
    {
        let Some(first) = node.reference() else {
            return Ok(Some(base.to_string()));
        };

        let mut reference = first.to_string();
        let mut base = base.to_string();
        let mut chain: Vec<String> = Vec::new();
        loop {
            let normalized = normalize_ref(&reference, &base)?;
            if chain.contains(&normalized) {
                tracing::trace!(kind = T::KIND, reference = %normalized, "circular reference");
                let mut circular = T::default();
                *circular.reference_mut() = Some(self.circular_form(&normalized));
                *node = circular;
                return Ok(None);
            }

            tracing::debug!(kind = T::KIND, reference = %normalized, "resolving");
            let target: T = self.resolver.resolve(&normalized, &base)?;
            base = document_part(&normalized).to_string();
            chain.push(normalized);

            match target.reference() {
                Some(next) => reference = next.to_string(),
                None => {
                    *node = target;
                    return Ok(Some(base));
                }
            }
        }
    }

    fn compose_embedded(&mut self, schema: &mut Schema, base: &str) -> Result<(), ComposeError> {
        if !self.options.skip_schemas {
            return self.compose_schema(schema, &mut Vec::new(), base);
        }
        if let Some(reference) = schema.ref_str() {
            let normalized = normalize_ref(reference, base)?;
            schema.reference = Some(denormalize_ref(
                &normalized,
                &self.base_path,
                self.root_id.as_deref(),
            ));
        }
        Ok(())
    }

    fn compose_content(
        &mut self,
        content: &mut BTreeMap<String, Content>,
        base: &str,
    ) -> Result<(), ComposeError> {
        for media in content.values_mut() {
            let result = self.compose_site(RefSite::Content(media), base);
            self.recover(result)?;
        }
        Ok(())
    }

    fn compose_path_item(&mut self, item: &mut PathItem, base: &str) -> Result<(), ComposeError> {
        for parameter in item.parameters.iter_mut() {
            let result = self.compose_site(RefSite::Parameter(parameter), base);
            self.recover(result)?;
        }
        for (method, operation) in item.operations_mut() {
            tracing::trace!(method, "composing operation");
            let result = self.compose_operation(operation, base);
            self.recover(result)?;
        }
        Ok(())
    }

    fn compose_operation(&mut self, operation: &mut Operation, base: &str) -> Result<(), ComposeError> {
        if let Some(reference) = operation.reference.as_deref().filter(|r| !r.is_empty()) {
            return Err(ComposeError::UnsupportedConstruct {
                kind: "operation",
                reference: reference.to_string(),
            });
        }

        for parameter in operation.parameters.iter_mut() {
            let result = self.compose_site(RefSite::Parameter(parameter), base);
            self.recover(result)?;
        }
        if let Some(body) = operation.request_body.as_mut() {
            let result = self.compose_site(RefSite::RequestBody(body), base);
            self.recover(result)?;
        }
        if let Some(responses) = operation.responses.as_mut() {
            for response in responses.iter_mut() {
                let result = self.compose_site(RefSite::Response(response), base);
                self.recover(result)?;
            }
        }
        Ok(())
    }

    /// Record a cycle on `normalized` and return the ref written in its place.
    fn mark_circular(&mut self, normalized: String) -> String {
        let shown = match self.aliases.get(&normalized) {
            Some(alias) => {
                let alias = alias.clone();
                self.circulars.insert(alias.clone());
                alias
            }
            None => normalized.clone(),
        };
        self.circulars.insert(normalized);
        self.circular_form(&shown)
    }

    fn circular_form(&self, normalized: &str) -> String {
        if self.options.absolute_circular_ref {
            normalized.to_string()
        } else {
            denormalize_ref(normalized, &self.base_path, self.root_id.as_deref())
        }
    }

    /// Swallow `result`'s error under continue-on-error.
    fn recover(&mut self, result: Result<(), ComposeError>) -> Result<(), ComposeError> {
        match result {
            Err(_) if self.dry_run => Ok(()),
            Err(err) if self.options.continue_on_error => {
                tracing::warn!(error = %err, "skipping unresolved reference");
                self.errors.push(err);
                Ok(())
            }
            other => other,
        }
    }
}
