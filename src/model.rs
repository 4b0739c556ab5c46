//! Document model: the top-level object and the containers that carry `$ref`s.
//!
//! Fields the composer never looks at are kept verbatim in an `extra` map so a
//! composed document serializes back with all of its metadata.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::Schema;

/// Root document object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swagger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(rename = "basePath", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub paths: Paths,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, Response>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerVariable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// The paths table. Only keys starting with `/` are endpoints; `x-` keys are
/// extensions; anything else is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paths {
    pub paths: BTreeMap<String, PathItem>,
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operations cannot be shared by reference; a `$ref` here is rejected by
    /// the composer.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<Responses>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<Schema>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Responses of an operation: `default`, status codes and `x-` extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Responses {
    pub default: Option<Response>,
    pub status_codes: BTreeMap<String, Response>,
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<Schema>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, Content>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A media-type entry of a response or request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<Schema>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, Content>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A construct that may be defined elsewhere through `$ref`.
///
/// `KIND` names the construct in type-mismatch errors.
pub trait Refable: DeserializeOwned {
    const KIND: &'static str;

    /// The `$ref` slot.
    fn reference_mut(&mut self) -> &mut Option<String>;

    /// The `$ref`, if set and non-empty.
    fn reference(&self) -> Option<&str>;

    /// The schema embedded directly in this construct, if any.
    fn schema_mut(&mut self) -> Option<&mut Schema> {
        None
    }
}

macro_rules! refable {
    (@impl $ty:ty, $kind:literal, |$this:ident| $schema:expr) => {
        impl Refable for $ty {
            const KIND: &'static str = $kind;

            fn reference_mut(&mut self) -> &mut Option<String> {
                &mut self.reference
            }

            fn reference(&self) -> Option<&str> {
                self.reference.as_deref().filter(|r| !r.is_empty())
            }

            #[allow(unused_variables)]
            fn schema_mut(&mut self) -> Option<&mut Schema> {
                let $this = self;
                $schema
            }
        }
    };
    ($ty:ty, $kind:literal) => {
        refable!(@impl $ty, $kind, |_this| None);
    };
    ($ty:ty, $kind:literal, schema) => {
        refable!(@impl $ty, $kind, |this| this.schema.as_deref_mut());
    };
}

refable!(Schema, "schema");
refable!(Parameter, "parameter", schema);
refable!(Response, "response", schema);
refable!(Content, "content", schema);
refable!(RequestBody, "request body");
refable!(PathItem, "path item");

impl PathItem {
    /// Operations in traversal order: get, head, options, put, post, patch, delete.
    pub fn operations_mut(&mut self) -> Vec<(&'static str, &mut Operation)> {
        [
            ("get", &mut self.get),
            ("head", &mut self.head),
            ("options", &mut self.options),
            ("put", &mut self.put),
            ("post", &mut self.post),
            ("patch", &mut self.patch),
            ("delete", &mut self.delete),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_mut().map(|op| (method, op)))
        .collect()
    }
}

impl Responses {
    /// All responses, `default` first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Response> {
        self.default
            .iter_mut()
            .chain(self.status_codes.values_mut())
    }
}

fn is_extension(key: &str) -> bool {
    key.get(..2)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("x-"))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<'de> Deserialize<'de> for Paths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut paths = Paths::default();
        for (key, value) in raw {
            if is_extension(&key) {
                paths.extensions.insert(key, value);
            } else if key.starts_with('/') {
                let item: PathItem = serde_json::from_value(value)
                    .map_err(|e| D::Error::custom(format!("path {}: {}", key, e)))?;
                paths.paths.insert(key, item);
            }
        }
        Ok(paths)
    }
}

impl Serialize for Paths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.paths.len() + self.extensions.len()))?;
        for (path, item) in &self.paths {
            map.serialize_entry(path, item)?;
        }
        for (key, value) in &self.extensions {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Responses {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut responses = Responses::default();
        for (key, value) in raw {
            if is_extension(&key) {
                responses.extensions.insert(key, value);
                continue;
            }
            let response: Response = serde_json::from_value(value)
                .map_err(|e| D::Error::custom(format!("response {}: {}", key, e)))?;
            if key == "default" {
                responses.default = Some(response);
            } else {
                responses.status_codes.insert(key, response);
            }
        }
        Ok(responses)
    }
}

impl Serialize for Responses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = usize::from(self.default.is_some())
            + self.status_codes.len()
            + self.extensions.len();
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(default) = &self.default {
            map.serialize_entry("default", default)?;
        }
        for (code, response) in &self.status_codes {
            map.serialize_entry(code, response)?;
        }
        for (key, value) in &self.extensions {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_split_endpoints_and_extensions() {
        let paths: Paths = serde_json::from_value(json!({
            "/pets": { "get": { "operationId": "listPets" } },
            "x-internal": true,
            "not-a-path": {}
        }))
        .unwrap();
        assert_eq!(paths.paths.len(), 1);
        assert_eq!(paths.extensions["x-internal"], true);

        let back = serde_json::to_value(&paths).unwrap();
        assert_eq!(
            back,
            json!({
                "/pets": { "get": { "operationId": "listPets" } },
                "x-internal": true
            })
        );
    }

    #[test]
    fn missing_or_null_paths_are_empty() {
        let doc: Swagger = serde_json::from_value(json!({"swagger": "2.0"})).unwrap();
        assert!(doc.paths.paths.is_empty());

        let doc: Swagger =
            serde_json::from_value(json!({"swagger": "2.0", "paths": null})).unwrap();
        assert!(doc.paths.paths.is_empty());

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["paths"], json!({}));
    }

    #[test]
    fn responses_default_and_codes() {
        let responses: Responses = serde_json::from_value(json!({
            "default": { "description": "error" },
            "200": { "description": "ok", "schema": { "$ref": "#/definitions/Pet" } },
            "x-rate-limited": { "retry": true }
        }))
        .unwrap();
        assert_eq!(
            responses.default.as_ref().and_then(|r| r.description.as_deref()),
            Some("error")
        );
        assert_eq!(responses.status_codes.len(), 1);
        assert_eq!(responses.extensions.len(), 1);

        let mut responses = responses;
        let descriptions: Vec<_> = responses
            .iter_mut()
            .filter_map(|r| r.description.clone())
            .collect();
        assert_eq!(descriptions, vec!["error", "ok"]);
    }

    #[test]
    fn operations_in_traversal_order() {
        let mut item: PathItem = serde_json::from_value(json!({
            "delete": {}, "get": {}, "post": {}
        }))
        .unwrap();
        let methods: Vec<_> = item.operations_mut().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec!["get", "post", "delete"]);
    }

    #[test]
    fn refable_accessors() {
        let mut param: Parameter = serde_json::from_value(json!({
            "name": "limit",
            "in": "query",
            "schema": { "$ref": "#/definitions/Limit" }
        }))
        .unwrap();
        assert_eq!(Parameter::KIND, "parameter");
        assert_eq!(param.reference(), None);
        assert_eq!(
            param.schema_mut().and_then(|s| s.reference.clone()),
            Some("#/definitions/Limit".to_string())
        );

        let mut body = RequestBody {
            reference: Some("#/x-bodies/Pet".into()),
            ..RequestBody::default()
        };
        assert_eq!(body.reference(), Some("#/x-bodies/Pet"));
        assert!(body.schema_mut().is_none());
    }

    #[test]
    fn top_level_metadata_roundtrips() {
        let value = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1.0.0" },
            "basePath": "/v1",
            "paths": {},
            "securityDefinitions": { "key": { "type": "apiKey", "in": "header", "name": "X-Key" } },
            "tags": [{ "name": "pets" }]
        });
        let doc: Swagger = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(doc.base_path.as_deref(), Some("/v1"));
        assert!(doc.extra.contains_key("securityDefinitions"));
        assert_eq!(serde_json::to_value(&doc).unwrap(), value);
    }
}
