//! OpenAPI `$ref` composition.
//!
//! Takes an API description (Swagger 2.0, JSON or YAML) whose schemas,
//! parameters, responses and path items point at each other through `$ref`,
//! and inlines every reference it can: local pointers, sibling files and
//! remote URLs alike. Circular references are kept as refs, rewritten
//! relative to the root document.
//!
//! # Example
//!
//! ```
//! use oapi_compose::{compose_spec, ComposeOptions, Swagger};
//! use serde_json::json;
//!
//! let mut spec: Swagger = serde_json::from_value(json!({
//!     "swagger": "2.0",
//!     "parameters": {
//!         "limit": { "name": "limit", "in": "query", "type": "integer" }
//!     },
//!     "paths": {
//!         "/pets": {
//!             "get": { "parameters": [{ "$ref": "#/parameters/limit" }] }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let report = compose_spec(&mut spec, &ComposeOptions::default()).unwrap();
//! assert!(report.is_clean());
//!
//! let get = spec.paths.paths["/pets"].get.as_ref().unwrap();
//! assert_eq!(get.parameters[0].name.as_deref(), Some("limit"));
//! ```
//!
//! # Options
//!
//! | Option | Effect |
//! |--------|--------|
//! | `relative_base` | Path or URL relative refs of the root resolve against |
//! | `skip_schemas` | Inline parameters, responses and path items only |
//! | `absolute_circular_ref` | Write circular refs as absolute URIs |
//! | `continue_on_error` | Record failures in the report and keep going |
//!
//! External documents are fetched through a [`PathLoader`]; the
//! [`DefaultLoader`] reads local files and, with the `remote` feature,
//! HTTP(S) URLs.

mod cache;
mod compose;
mod document;
mod error;
mod loader;
mod model;
mod normalize;
mod resolver;
mod schema;
mod types;

pub use cache::{base_cache, ResolutionCache};
pub use compose::{compose_spec, compose_spec_with, ComposeReport, RefSite};
pub use document::Document;
pub use error::{ComposeError, DecodeError, LoadError};
pub use loader::{decode_document, is_url, load_file, load_url, DefaultLoader, PathLoader};
pub use model::{
    Content, Operation, Parameter, PathItem, Paths, Refable, RequestBody, Response, Responses,
    Server, ServerVariable, Swagger,
};
pub use normalize::{
    denormalize_ref, document_part, fragment_part, normalize_base, normalize_ref, ROOT_BASE,
};
pub use resolver::{
    resolve_parameter_with_base, resolve_path_item_with_base, resolve_ref_with_base,
    resolve_response_with_base, resolve_with_base, walk_pointer, Resolver,
};
pub use schema::{Schema, SchemaOrArray, SchemaOrBool, SchemaOrStringArray};
pub use types::{json_type_name, ComposeOptions, SUPPORTED_VERSION};
