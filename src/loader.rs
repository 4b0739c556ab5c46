//! Document loading from various sources.
//!
//! The composer only sees the [`PathLoader`] contract; [`DefaultLoader`]
//! handles local files and HTTP URLs.

use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use url::Url;

use crate::error::{DecodeError, LoadError};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the raw bytes of a document.
///
/// `uri` is a normalized absolute URI (`file:///...`, `https://...`) or, for
/// top-level loads, whatever path the caller passed in.
pub trait PathLoader: Send + Sync {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError>;
}

impl<F> PathLoader for F
where
    F: Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync,
{
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        self(uri)
    }
}

/// Loads local files, `file://` URLs and (with the `remote` feature) HTTP URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoader;

impl PathLoader for DefaultLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        if is_url(uri) {
            return load_url(uri);
        }
        if uri.starts_with("file:") {
            let path = Url::parse(uri)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| LoadError::UnsupportedUri {
                    uri: uri.to_string(),
                })?;
            return load_file(&path);
        }
        if Url::parse(uri).map_or(false, |url| url.scheme().len() > 1) {
            return Err(LoadError::UnsupportedUri {
                uri: uri.to_string(),
            });
        }
        load_file(Path::new(uri))
    }
}

/// Read a local file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::ReadError` if it can't be read.
pub fn load_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(path = %path.display(), "reading document");
    std::fs::read(path).map_err(|source| LoadError::ReadError {
        path: PathBuf::from(path),
        source,
    })
}

/// Fetch a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status.
#[cfg(feature = "remote")]
pub fn load_url(url: &str) -> Result<Vec<u8>, LoadError> {
    let network_error = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    tracing::debug!(url, "fetching document");
    let response = client.get(url).send().map_err(network_error)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network_error)?;

    response
        .bytes()
        .map(|body| body.to_vec())
        .map_err(network_error)
}

#[cfg(not(feature = "remote"))]
pub fn load_url(url: &str) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::UnsupportedUri {
        uri: url.to_string(),
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Decode document bytes into JSON.
///
/// Content starting with `{` or `[` is JSON; anything else is parsed as YAML
/// and transcoded.
pub fn decode_document(bytes: &[u8]) -> Result<Value, DecodeError> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let trimmed = &bytes[start..];
    match trimmed.first() {
        Some(b'{') | Some(b'[') => {
            serde_json::from_slice(trimmed).map_err(|source| DecodeError::InvalidJson { source })
        }
        _ => {
            let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_slice(trimmed)
                .map_err(|source| DecodeError::InvalidYaml { source })?;
            yaml_to_json(yaml, "")
        }
    }
}

/// Convert a YAML value to JSON. Scalar mapping keys are stringified; tags
/// are dropped.
fn yaml_to_json(value: serde_yaml_ng::Value, path: &str) -> Result<Value, DecodeError> {
    use serde_yaml_ng::Value as Yaml;

    match value {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Bool(b)),
        Yaml::Number(n) => yaml_number(&n, path),
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Sequence(seq) => seq
            .into_iter()
            .enumerate()
            .map(|(i, item)| yaml_to_json(item, &format!("{}/{}", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, item) in mapping {
                let key = yaml_key(key, path)?;
                let child_path = format!("{}/{}", path, key);
                object.insert(key, yaml_to_json(item, &child_path)?);
            }
            Ok(Value::Object(object))
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value, path),
    }
}

fn yaml_key(key: serde_yaml_ng::Value, path: &str) -> Result<String, DecodeError> {
    use serde_yaml_ng::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value, path),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(DecodeError::NotJsonCompatible {
            path: path.to_string(),
            message: "mapping keys must be scalars".to_string(),
        }),
    }
}

fn yaml_number(n: &serde_yaml_ng::Number, path: &str) -> Result<Value, DecodeError> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Number(i.into()));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::Number(u.into()));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DecodeError::NotJsonCompatible {
            path: path.to_string(),
            message: format!("{} is not a finite number", n),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_file_valid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"swagger": "2.0"}}"#).unwrap();

        let bytes = load_file(file.path()).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("swagger"));
    }

    #[test]
    fn load_file_not_found() {
        let result = load_file(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn default_loader_accepts_file_urls() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "swagger: '2.0'").unwrap();

        let url = Url::from_file_path(file.path()).unwrap();
        let bytes = DefaultLoader.load(url.as_str()).unwrap();
        assert_eq!(decode_document(&bytes).unwrap()["swagger"], "2.0");
    }

    #[test]
    fn default_loader_rejects_unknown_scheme() {
        let result = DefaultLoader.load("ftp://example.com/api.json");
        assert!(matches!(result, Err(LoadError::UnsupportedUri { .. })));
    }

    #[test]
    fn closures_are_loaders() {
        let loader = |uri: &str| -> Result<Vec<u8>, LoadError> {
            if uri.ends_with("pet.json") {
                Ok(br#"{"type":"object"}"#.to_vec())
            } else {
                Err(LoadError::Custom {
                    uri: uri.to_string(),
                    message: "not here".to_string(),
                })
            }
        };
        assert!(loader.load("mem://pet.json").is_ok());
        assert!(matches!(
            loader.load("mem://tag.json"),
            Err(LoadError::Custom { .. })
        ));
    }

    #[test]
    fn decode_json_with_leading_whitespace() {
        let value = decode_document(b"  \n {\"definitions\": {}}").unwrap();
        assert!(value["definitions"].is_object());
    }

    #[test]
    fn decode_invalid_json() {
        let result = decode_document(b"{ not json");
        assert!(matches!(result, Err(DecodeError::InvalidJson { .. })));
    }

    #[test]
    fn decode_yaml_stringifies_keys() {
        let yaml = b"responses:\n  200:\n    description: ok\n  default:\n    description: error\nflag: true\nratio: 0.5\n";
        let value = decode_document(yaml).unwrap();
        assert_eq!(value["responses"]["200"]["description"], "ok");
        assert_eq!(value["flag"], true);
        assert_eq!(value["ratio"], 0.5);
    }

    #[test]
    fn decode_yaml_keeps_ref_strings() {
        let yaml = b"definitions:\n  Pet:\n    $ref: 'models.yaml#/Pet'\n";
        let value = decode_document(yaml).unwrap();
        assert_eq!(value["definitions"]["Pet"]["$ref"], "models.yaml#/Pet");
    }

    #[test]
    fn decode_invalid_yaml() {
        let result = decode_document(b"key: [unclosed");
        assert!(matches!(result, Err(DecodeError::InvalidYaml { .. })));
    }

    #[test]
    fn decode_yaml_rejects_complex_keys() {
        let result = decode_document(b"? [a, b]\n: value\n");
        assert!(matches!(
            result,
            Err(DecodeError::NotJsonCompatible { .. })
        ));
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/api.json"));
        assert!(is_url("http://example.com/api.json"));
        assert!(!is_url("/path/to/api.json"));
        assert!(!is_url("file:///path/to/api.json"));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_url_valid() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/models.json")
                .with_status(200)
                .with_body(r#"{"definitions":{"Pet":{"type":"object"}}}"#)
                .create();

            let bytes = load_url(&format!("{}/models.json", server.url())).unwrap();
            let value = decode_document(&bytes).unwrap();
            assert_eq!(value["definitions"]["Pet"]["type"], "object");
            mock.assert();
        }

        #[test]
        fn load_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let result = load_url(&format!("{}/missing.json", server.url()));
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }
    }
}
