//! Reference resolution: turns a `$ref` into a typed value.
//!
//! The ref is normalized against the current base, its document is taken
//! from the cache (or fetched through the loader and cached), and the
//! fragment is walked as a JSON pointer. Cycle detection is the composer's
//! job; the resolver only ever looks one ref ahead.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{cache_or_default, ResolutionCache};
use crate::error::ComposeError;
use crate::loader::{decode_document, DefaultLoader, PathLoader};
use crate::model::{Parameter, PathItem, Refable, Response};
use crate::normalize::{document_part, fragment_part, normalize_base, normalize_ref, ROOT_BASE};
use crate::schema::Schema;
use crate::types::{json_type_name, ComposeOptions};

/// Resolves refs against a cache, fetching missing documents with a loader.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    cache: &'a ResolutionCache,
    loader: &'a dyn PathLoader,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a ResolutionCache, loader: &'a dyn PathLoader) -> Self {
        Self { cache, loader }
    }

    pub fn cache(&self) -> &'a ResolutionCache {
        self.cache
    }

    /// Resolve `reference` relative to `base` into a `T`.
    ///
    /// # Errors
    ///
    /// `InvalidRef` for malformed refs, `Load`/`Decode` when the target
    /// document can't be fetched, `PointerNotFound` when the fragment does
    /// not exist and `TypeMismatch` when the value isn't a `T`.
    pub fn resolve<T: Refable>(&self, reference: &str, base: &str) -> Result<T, ComposeError> {
        let normalized = normalize_ref(reference, base)?;
        let value = self.resolve_normalized(&normalized)?;
        coerce(&normalized, value)
    }

    /// Resolve an already normalized ref to its raw JSON value.
    pub fn resolve_normalized(&self, normalized: &str) -> Result<Value, ComposeError> {
        let document = self.document(document_part(normalized))?;
        walk(&document, fragment_part(normalized))
            .cloned()
            .map_err(|token| ComposeError::PointerNotFound {
                reference: normalized.to_string(),
                token,
            })
    }

    /// The decoded document at `uri`, loading and caching it on a miss.
    pub fn document(&self, uri: &str) -> Result<Arc<Value>, ComposeError> {
        if let Some(document) = self.cache.get(uri) {
            return Ok(document);
        }

        tracing::debug!(uri, "loading referenced document");
        let bytes = self
            .loader
            .load(uri)
            .map_err(|source| ComposeError::Load {
                uri: uri.to_string(),
                source,
            })?;
        let document = Arc::new(decode_document(&bytes).map_err(|source| {
            ComposeError::Decode {
                uri: uri.to_string(),
                source,
            }
        })?);
        self.cache.set(uri, Arc::clone(&document));
        Ok(document)
    }
}

/// Look up a JSON pointer (optionally prefixed with `#`) inside `document`.
///
/// Tokens are percent-decoded and unescaped (`~1` = `/`, `~0` = `~`);
/// mappings are indexed by key, sequences by position.
pub fn walk_pointer<'v>(document: &'v Value, pointer: &str) -> Result<&'v Value, ComposeError> {
    walk(document, pointer.trim_start_matches('#')).map_err(|token| {
        ComposeError::PointerNotFound {
            reference: pointer.to_string(),
            token,
        }
    })
}

/// Walk `fragment`, returning the first token that failed.
fn walk<'v>(document: &'v Value, fragment: &str) -> Result<&'v Value, String> {
    if fragment.is_empty() {
        return Ok(document);
    }
    let Some(path) = fragment.strip_prefix('/') else {
        return Err(fragment.to_string());
    };

    let mut current = document;
    for raw in path.split('/') {
        let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |d| d.into_owned());
        let token = decoded.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Object(map) => map.get(&token),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or(token)?;
    }
    Ok(current)
}

fn coerce<T: Refable>(reference: &str, value: Value) -> Result<T, ComposeError> {
    if !value.is_object() {
        return Err(ComposeError::TypeMismatch {
            reference: reference.to_string(),
            expected: T::KIND,
            message: format!("expected object, got {}", json_type_name(&value)),
        });
    }
    serde_json::from_value(value).map_err(|e| ComposeError::TypeMismatch {
        reference: reference.to_string(),
        expected: T::KIND,
        message: e.to_string(),
    })
}

/// Resolve `reference` against an arbitrary JSON `root`.
///
/// The root stands in for the document at `options.relative_base` (or the
/// in-memory pseudo root); other documents are fetched with [`DefaultLoader`].
pub fn resolve_with_base<T: Refable>(
    root: &Value,
    reference: &str,
    options: &ComposeOptions,
) -> Result<T, ComposeError> {
    let cache = cache_or_default(None);
    let base = normalize_base(options.relative_base.as_deref().unwrap_or(ROOT_BASE));
    cache.set(base.clone(), root.clone());
    Resolver::new(&cache, &DefaultLoader).resolve(reference, &base)
}

/// Resolve a schema ref against `root`.
pub fn resolve_ref_with_base(
    root: &Value,
    reference: &str,
    options: &ComposeOptions,
) -> Result<Schema, ComposeError> {
    resolve_with_base(root, reference, options)
}

/// Resolve a parameter ref against `root`.
pub fn resolve_parameter_with_base(
    root: &Value,
    reference: &str,
    options: &ComposeOptions,
) -> Result<Parameter, ComposeError> {
    resolve_with_base(root, reference, options)
}

/// Resolve a response ref against `root`.
pub fn resolve_response_with_base(
    root: &Value,
    reference: &str,
    options: &ComposeOptions,
) -> Result<Response, ComposeError> {
    resolve_with_base(root, reference, options)
}

/// Resolve a path item ref against `root`.
pub fn resolve_path_item_with_base(
    root: &Value,
    reference: &str,
    options: &ComposeOptions,
) -> Result<PathItem, ComposeError> {
    resolve_with_base(root, reference, options)
}
