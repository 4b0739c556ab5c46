//! Loaded API documents.
//!
//! A [`Document`] keeps the raw source (as JSON, YAML is transcoded on the
//! way in) next to the parsed model, so a fresh, untouched copy can always be
//! rebuilt and composition never mutates what was loaded.

use std::fmt;
use std::sync::Arc;

use crate::compose::{compose_spec_with, ComposeReport};
use crate::error::{ComposeError, DecodeError};
use crate::loader::{decode_document, DefaultLoader, PathLoader};
use crate::model::Swagger;
use crate::types::{ComposeOptions, SUPPORTED_VERSION};

pub struct Document {
    raw: Vec<u8>,
    spec: Swagger,
    path: Option<String>,
    loader: Option<Arc<dyn PathLoader>>,
    report: Option<ComposeReport>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("spec", &self.spec)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Load a document from a path or URL with the default loader.
    pub fn load(path: &str) -> Result<Self, ComposeError> {
        Self::load_from(path, None)
    }

    /// Load a document with a custom loader. The loader is kept and used for
    /// every external ref when the document is composed.
    pub fn load_with(path: &str, loader: Arc<dyn PathLoader>) -> Result<Self, ComposeError> {
        Self::load_from(path, Some(loader))
    }

    fn load_from(path: &str, loader: Option<Arc<dyn PathLoader>>) -> Result<Self, ComposeError> {
        let bytes = match &loader {
            Some(loader) => loader.load(path),
            None => DefaultLoader.load(path),
        }
        .map_err(|source| ComposeError::Load {
            uri: path.to_string(),
            source,
        })?;

        let mut document = Self::analyzed(&bytes, "").map_err(|source| ComposeError::Decode {
            uri: path.to_string(),
            source,
        })?;
        tracing::debug!(path, "loaded document");
        document.path = Some(path.to_string());
        document.loader = loader;
        Ok(document)
    }

    /// Build a document from JSON or YAML bytes.
    ///
    /// `version` is the version the caller expects; empty means the
    /// supported default. A `swagger` field naming another version is
    /// rejected as well.
    pub fn analyzed(bytes: &[u8], version: &str) -> Result<Self, DecodeError> {
        let version = if version.is_empty() {
            SUPPORTED_VERSION
        } else {
            version
        };
        if version != SUPPORTED_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                version: version.to_string(),
            });
        }

        let value = decode_document(bytes)?;
        let raw = serde_json::to_vec(&value).map_err(|source| DecodeError::Model { source })?;
        let spec: Swagger =
            serde_json::from_value(value).map_err(|source| DecodeError::Model { source })?;

        if let Some(declared) = spec.swagger.as_deref() {
            if declared != SUPPORTED_VERSION {
                return Err(DecodeError::UnsupportedVersion {
                    version: declared.to_string(),
                });
            }
        }

        Ok(Self {
            raw,
            spec,
            path: None,
            loader: None,
            report: None,
        })
    }

    /// A fresh copy rebuilt from the raw source.
    pub fn pristine(&self) -> Result<Self, DecodeError> {
        let spec: Swagger =
            serde_json::from_slice(&self.raw).map_err(|source| DecodeError::Model { source })?;
        Ok(Self {
            raw: self.raw.clone(),
            spec,
            path: self.path.clone(),
            loader: self.loader.clone(),
            report: None,
        })
    }

    /// Compose a pristine copy of this document.
    ///
    /// Relative refs resolve against the document's own path unless
    /// `options.relative_base` says otherwise. The returned document keeps
    /// the original raw source and carries the composition report.
    pub fn compose(&self, options: &ComposeOptions) -> Result<Self, ComposeError> {
        let mut composed = self.pristine().map_err(|source| ComposeError::Decode {
            uri: self.path.clone().unwrap_or_default(),
            source,
        })?;

        let mut options = options.clone();
        if options.relative_base.is_none() {
            options.relative_base = self.path.clone();
        }

        let loader: &dyn PathLoader = match &self.loader {
            Some(loader) => loader.as_ref(),
            None => &DefaultLoader,
        };
        let report = compose_spec_with(&mut composed.spec, &options, None, loader)?;
        composed.report = Some(report);
        Ok(composed)
    }

    pub fn spec(&self) -> &Swagger {
        &self.spec
    }

    pub fn into_spec(self) -> Swagger {
        self.spec
    }

    /// The source document as JSON bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Report of the composition that produced this document, if any.
    pub fn report(&self) -> Option<&ComposeReport> {
        self.report.as_ref()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, ComposeError> {
        let encoded = if pretty {
            serde_json::to_string_pretty(&self.spec)
        } else {
            serde_json::to_string(&self.spec)
        };
        encoded.map_err(|source| ComposeError::Encode { source })
    }

    pub fn to_yaml(&self) -> Result<String, ComposeError> {
        serde_yaml_ng::to_string(&self.spec).map_err(|source| ComposeError::EncodeYaml { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    const PETSTORE_YAML: &str = r##"swagger: "2.0"
info:
  title: Pets
  version: 1.0.0
paths:
  /pets:
    get:
      responses:
        200:
          description: ok
          schema:
            $ref: "#/definitions/Pet"
definitions:
  Pet:
    type: object
    properties:
      tag:
        $ref: "models.yaml#/Tag"
"##;

    #[test]
    fn analyzed_transcodes_yaml_to_json() {
        let document = Document::analyzed(PETSTORE_YAML.as_bytes(), "").unwrap();
        let raw: Value = serde_json::from_slice(document.raw()).unwrap();
        assert_eq!(raw["swagger"], "2.0");
        assert_eq!(
            raw["paths"]["/pets"]["get"]["responses"]["200"]["description"],
            "ok"
        );
        assert!(document.spec().paths.paths.contains_key("/pets"));
    }

    #[test]
    fn analyzed_rejects_other_versions() {
        let result = Document::analyzed(br#"{"swagger":"2.0"}"#, "3.0");
        assert!(matches!(
            result,
            Err(DecodeError::UnsupportedVersion { version }) if version == "3.0"
        ));

        let result = Document::analyzed(br#"{"swagger":"1.2"}"#, "");
        assert!(matches!(
            result,
            Err(DecodeError::UnsupportedVersion { version }) if version == "1.2"
        ));
    }

    #[test]
    fn analyzed_rejects_misshaped_documents() {
        let result = Document::analyzed(br#"{"swagger":"2.0","definitions":[]}"#, "");
        assert!(matches!(result, Err(DecodeError::Model { .. })));
    }

    #[test]
    fn compose_resolves_relative_to_document_path() {
        let dir = TempDir::new().unwrap();
        let api = dir.path().join("api.yaml");
        fs::write(&api, PETSTORE_YAML).unwrap();
        fs::write(dir.path().join("models.yaml"), "Tag:\n  type: string\n").unwrap();

        let document = Document::load(api.to_str().unwrap()).unwrap();
        let composed = document.compose(&ComposeOptions::default()).unwrap();

        let out = serde_json::to_value(composed.spec()).unwrap();
        assert_eq!(
            out["paths"]["/pets"]["get"]["responses"]["200"]["schema"],
            json!({ "type": "object", "properties": { "tag": { "type": "string" } } })
        );
        assert!(composed.report().map_or(false, ComposeReport::is_clean));
        assert_eq!(composed.path(), document.path());
    }

    #[test]
    fn compose_leaves_original_untouched() {
        let dir = TempDir::new().unwrap();
        let api = dir.path().join("api.yaml");
        fs::write(&api, PETSTORE_YAML).unwrap();
        fs::write(dir.path().join("models.yaml"), "Tag:\n  type: string\n").unwrap();

        let document = Document::load(api.to_str().unwrap()).unwrap();
        let before = serde_json::to_value(document.spec()).unwrap();
        let composed = document.compose(&ComposeOptions::default()).unwrap();

        assert_eq!(serde_json::to_value(document.spec()).unwrap(), before);
        assert!(document.report().is_none());
        let pristine = composed.pristine().unwrap();
        assert_eq!(serde_json::to_value(pristine.spec()).unwrap(), before);
    }

    #[test]
    fn compose_uses_the_document_loader() {
        let loader = |uri: &str| -> Result<Vec<u8>, LoadError> {
            if uri == "https://api.example.com/spec.json" {
                return Ok(serde_json::to_vec(&json!({
                    "swagger": "2.0",
                    "definitions": { "Pet": { "$ref": "models.json#/Pet" } }
                }))
                .unwrap());
            }
            if uri == "https://api.example.com/models.json" {
                return Ok(br#"{"Pet":{"type":"object"}}"#.to_vec());
            }
            Err(LoadError::Custom {
                uri: uri.to_string(),
                message: "unknown".to_string(),
            })
        };

        let document = Document::load_with("https://api.example.com/spec.json", Arc::new(loader))
            .unwrap();
        let composed = document.compose(&ComposeOptions::default()).unwrap();
        assert_eq!(
            composed.spec().definitions["Pet"].extra["type"],
            "object"
        );
    }

    #[test]
    fn load_missing_file() {
        let err = Document::load("/nonexistent/api.yaml").unwrap_err();
        assert!(matches!(err, ComposeError::Load { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn serializes_to_json_and_yaml() {
        let document = Document::analyzed(PETSTORE_YAML.as_bytes(), "").unwrap();

        let compact = document.to_json(false).unwrap();
        assert!(!compact.contains('\n'));
        let pretty = document.to_json(true).unwrap();
        assert!(pretty.contains("\n  \"swagger\": \"2.0\""));

        let yaml = document.to_yaml().unwrap();
        let back = Document::analyzed(yaml.as_bytes(), "").unwrap();
        assert_eq!(
            serde_json::to_value(back.spec()).unwrap(),
            serde_json::to_value(document.spec()).unwrap()
        );
    }
}
