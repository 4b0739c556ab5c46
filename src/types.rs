//! Core types shared by the resolver and the composer.

use serde_json::Value;

/// Document version accepted by the loader.
pub const SUPPORTED_VERSION: &str = "2.0";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for `$ref` composition.
///
/// Options are immutable for the duration of a composition and are passed by
/// reference through the whole traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Path or URI the root document's relative refs resolve against.
    /// When unset, the root is treated as an in-memory document.
    pub relative_base: Option<String>,
    /// Only resolve parameter/response/path indirection; schema `$ref`s are
    /// rebased but never inlined.
    pub skip_schemas: bool,
    /// Emit circular refs as absolute URIs instead of relative to the base.
    pub absolute_circular_ref: bool,
    /// Record resolution failures and keep going instead of aborting.
    pub continue_on_error: bool,
}

impl ComposeOptions {
    /// Create options resolving relative refs against `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            relative_base: Some(base.into()),
            ..Self::default()
        }
    }

    /// Set the base path or URI.
    pub fn relative_base(mut self, base: impl Into<String>) -> Self {
        self.relative_base = Some(base.into());
        self
    }

    /// Set schema skipping.
    pub fn skip_schemas(mut self, skip: bool) -> Self {
        self.skip_schemas = skip;
        self
    }

    /// Set absolute rendering of circular refs.
    pub fn absolute_circular_ref(mut self, absolute: bool) -> Self {
        self.absolute_circular_ref = absolute;
        self
    }

    /// Set continue-on-error.
    pub fn continue_on_error(mut self, keep_going: bool) -> Self {
        self.continue_on_error = keep_going;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!("x")), "string");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn default_options_are_in_memory_and_strict() {
        let opts = ComposeOptions::default();
        assert_eq!(opts.relative_base, None);
        assert!(!opts.skip_schemas);
        assert!(!opts.absolute_circular_ref);
        assert!(!opts.continue_on_error);
    }

    #[test]
    fn builder_sets_flags() {
        let opts = ComposeOptions::new("api/openapi.yaml")
            .skip_schemas(true)
            .absolute_circular_ref(true)
            .continue_on_error(true);
        assert_eq!(opts.relative_base.as_deref(), Some("api/openapi.yaml"));
        assert!(opts.skip_schemas);
        assert!(opts.absolute_circular_ref);
        assert!(opts.continue_on_error);
    }
}
