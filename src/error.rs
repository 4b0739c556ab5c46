//! Error types for document loading, decoding and `$ref` composition.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fetching raw document bytes.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unsupported URI scheme for {uri}")]
    UnsupportedUri { uri: String },

    /// Failure reported by a caller-supplied loader.
    #[error("failed to load {uri}: {message}")]
    Custom { uri: String, message: String },
}

/// Errors raised while turning bytes into a document.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("YAML value at {path} cannot be represented as JSON: {message}")]
    NotJsonCompatible { path: String, message: String },

    #[error("document does not match the expected model: {source}")]
    Model {
        #[source]
        source: serde_json::Error,
    },

    #[error("spec version \"{version}\" is not supported")]
    UnsupportedVersion { version: String },
}

/// Errors during `$ref` resolution and composition.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },

    #[error("cannot decode {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: DecodeError,
    },

    #[error("invalid $ref \"{reference}\": {source}")]
    InvalidRef {
        reference: String,
        #[source]
        source: url::ParseError,
    },

    #[error("pointer not found: {reference} (no value at token \"{token}\")")]
    PointerNotFound { reference: String, token: String },

    #[error("{reference} does not resolve to a {expected}: {message}")]
    TypeMismatch {
        reference: String,
        expected: &'static str,
        message: String,
    },

    #[error("$ref on {kind} is not supported: {reference}")]
    UnsupportedConstruct {
        kind: &'static str,
        reference: String,
    },

    #[error("cannot encode document: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode document as YAML: {source}")]
    EncodeYaml {
        #[source]
        source: serde_yaml_ng::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        3
    }
}

impl DecodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl ComposeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ComposeError::Load { source, .. } => source.exit_code(),
            ComposeError::Decode { source, .. } => source.exit_code(),
            ComposeError::Encode { .. } | ComposeError::EncodeYaml { .. } => 2,
            _ => 1,
        }
    }
}
