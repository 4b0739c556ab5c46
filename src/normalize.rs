//! Canonical forms for base paths and `$ref`s.
//!
//! Every ref is compared, cached and resolved in its absolute URL form. File
//! paths become `file://` URLs; refs are resolved against their base with
//! RFC 3986 rules. Denormalization turns an absolute ref back into something
//! readable relative to the document being written out.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::ComposeError;

/// Pseudo base path standing for an in-memory root document.
pub const ROOT_BASE: &str = ".root";

/// Canonical absolute form of a base path or URI, without fragment.
///
/// Idempotent: normalizing an already-normalized base returns it unchanged.
pub fn normalize_base(path: &str) -> String {
    if let Some(mut url) = parse_absolute(path) {
        url.set_fragment(None);
        return url.into();
    }

    let file_part = document_part(path);
    let absolute = clean_path(&absolute_path(Path::new(file_part)));
    match Url::from_file_path(&absolute) {
        Ok(mut url) => {
            if (file_part.ends_with('/') || file_part.ends_with('\\')) && !url.path().ends_with('/')
            {
                let dir = format!("{}/", url.path());
                url.set_path(&dir);
            }
            url.into()
        }
        Err(()) => path.to_string(),
    }
}

/// Resolve `reference` against `base` into an absolute ref.
pub fn normalize_ref(reference: &str, base: &str) -> Result<String, ComposeError> {
    if let Some(url) = parse_absolute(reference) {
        return Ok(url.into());
    }

    let base_url = Url::parse(&normalize_base(base)).map_err(|source| ComposeError::InvalidRef {
        reference: base.to_string(),
        source,
    })?;

    base_url
        .join(reference)
        .map(String::from)
        .map_err(|source| ComposeError::InvalidRef {
            reference: reference.to_string(),
            source,
        })
}

/// Express an absolute ref relative to the root document.
///
/// The root document's id wins when the ref lives under it (a ref to the id
/// document itself keeps its fragment rather than becoming empty); otherwise
/// the ref is made relative to `original_base`. Refs on another scheme or
/// host are returned unchanged.
pub fn denormalize_ref(absolute: &str, original_base: &str, root_id: Option<&str>) -> String {
    if absolute.is_empty() || absolute.starts_with('#') {
        return absolute.to_string();
    }
    let Ok(target) = Url::parse(absolute) else {
        return absolute.to_string();
    };

    if let Some(id) = root_id.and_then(|id| Url::parse(id).ok()) {
        if let Some(rebased) = rebase(&target, &id, true) {
            return rebased;
        }
    }

    Url::parse(&normalize_base(original_base))
        .ok()
        .and_then(|base| rebase(&target, &base, false))
        .unwrap_or_else(|| absolute.to_string())
}

/// The document part of a ref (everything before `#`).
pub fn document_part(reference: &str) -> &str {
    reference
        .split_once('#')
        .map_or(reference, |(document, _)| document)
}

/// The fragment of a ref, without `#`. Empty when there is none.
pub fn fragment_part(reference: &str) -> &str {
    reference
        .split_once('#')
        .map_or("", |(_, fragment)| fragment)
}

fn rebase(target: &Url, base: &Url, skip_document_root: bool) -> Option<String> {
    if target.scheme() != base.scheme()
        || target.host_str() != base.host_str()
        || target.port() != base.port()
    {
        return None;
    }

    let doc_path = base.path();
    let dir = doc_path.rfind('/').map_or("", |i| &doc_path[..=i]);
    let path = target.path();

    let relative = if path == doc_path {
        ""
    } else if let Some(rest) = path.strip_prefix(dir).filter(|_| !dir.is_empty()) {
        rest
    } else {
        return Some(target.to_string());
    };

    match target.fragment() {
        Some(fragment) if !fragment.is_empty() => Some(format!("{}#{}", relative, fragment)),
        _ if !relative.is_empty() => Some(relative.to_string()),
        _ if skip_document_root => None,
        _ => Some("#".to_string()),
    }
}

/// Parse `input` as an absolute URL. Single-letter schemes are drive letters.
fn parse_absolute(input: &str) -> Option<Url> {
    Url::parse(input).ok().filter(|url| url.scheme().len() > 1)
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
