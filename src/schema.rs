//! Recursive JSON Schema model.
//!
//! Only the keywords that can hold sub-schemas are typed; everything else
//! (`type`, `format`, `required`, `enum`, vendor extensions, ...) is carried
//! through untouched in [`Schema::extra`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schema node.
///
/// A node carrying `$ref` is a reference site: its structural children are
/// ignored until the reference has been composed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<SchemaOrArray>,

    #[serde(rename = "allOf", default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,

    #[serde(rename = "anyOf", default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,

    #[serde(rename = "oneOf", default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Schema>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<SchemaOrBool>,

    #[serde(
        rename = "patternProperties",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub pattern_properties: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, SchemaOrStringArray>,

    #[serde(
        rename = "additionalItems",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_items: Option<SchemaOrBool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `items`: one schema for every element, or a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrArray {
    Array(Vec<Schema>),
    Schema(Box<Schema>),
}

/// `additionalProperties` / `additionalItems`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrBool {
    Bool(bool),
    Schema(Box<Schema>),
}

/// A `dependencies` entry: property names, or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrStringArray {
    Properties(Vec<String>),
    Schema(Box<Schema>),
}

impl Schema {
    /// Create a schema that only holds a `$ref`.
    pub fn new_ref(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// The `$ref`, if set and non-empty.
    pub fn ref_str(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.is_empty())
    }

    /// The `id`, if set and non-empty.
    pub fn id_str(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// True when this node or any descendant still carries a `$ref`.
    pub fn has_refs(&self) -> bool {
        if self.ref_str().is_some() {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child: &Schema| found = found || child.has_refs());
        found
    }

    /// Visit direct sub-schemas in composition order.
    pub fn for_each_child(&self, visit: &mut dyn FnMut(&Schema)) {
        self.definitions.values().for_each(&mut *visit);
        match &self.items {
            Some(SchemaOrArray::Schema(item)) => visit(item),
            Some(SchemaOrArray::Array(tuple)) => tuple.iter().for_each(&mut *visit),
            None => {}
        }
        self.all_of.iter().for_each(&mut *visit);
        self.any_of.iter().for_each(&mut *visit);
        self.one_of.iter().for_each(&mut *visit);
        if let Some(not) = &self.not {
            visit(not);
        }
        self.properties.values().for_each(&mut *visit);
        if let Some(SchemaOrBool::Schema(additional)) = &self.additional_properties {
            visit(additional);
        }
        self.pattern_properties.values().for_each(&mut *visit);
        for dependency in self.dependencies.values() {
            if let SchemaOrStringArray::Schema(schema) = dependency {
                visit(schema);
            }
        }
        if let Some(SchemaOrBool::Schema(additional)) = &self.additional_items {
            visit(additional);
        }
    }

    /// Direct sub-schemas in composition order, mutably.
    pub fn children_mut(&mut self) -> Vec<&mut Schema> {
        let mut children: Vec<&mut Schema> = self.definitions.values_mut().collect();
        match &mut self.items {
            Some(SchemaOrArray::Schema(item)) => children.push(&mut **item),
            Some(SchemaOrArray::Array(tuple)) => children.extend(tuple.iter_mut()),
            None => {}
        }
        children.extend(self.all_of.iter_mut());
        children.extend(self.any_of.iter_mut());
        children.extend(self.one_of.iter_mut());
        if let Some(not) = &mut self.not {
            children.push(&mut **not);
        }
        children.extend(self.properties.values_mut());
        if let Some(SchemaOrBool::Schema(additional)) = &mut self.additional_properties {
            children.push(&mut **additional);
        }
        children.extend(self.pattern_properties.values_mut());
        for dependency in self.dependencies.values_mut() {
            if let SchemaOrStringArray::Schema(schema) = dependency {
                children.push(&mut **schema);
            }
        }
        if let Some(SchemaOrBool::Schema(additional)) = &mut self.additional_items {
            children.push(&mut **additional);
        }
        children
    }
}
