//! A2UI Binding Resolver
//!
//! Turns [`PropValue`]s into plain JSON against a surface's data model.

use serde_json::{Map, Value};

use super::error::{A2uiError, BINDING_RESOLUTION_ERROR, Diagnostics, Result};
use super::pointer;
use super::value::PropValue;

/// Resolves prop values against one data document.
///
/// Inside a template instance the resolver carries a scope such as
/// `/products/2`; paths without a leading `/` are then taken relative to it.
/// Outside a template a relative path is invalid.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    data: &'a Value,
    scope: Option<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(data: &'a Value) -> Self {
        Resolver { data, scope: None }
    }

    pub fn scoped(data: &'a Value, scope: Option<&'a str>) -> Self {
        Resolver { data, scope }
    }

    pub fn scope(&self) -> Option<&'a str> {
        self.scope
    }

    /// Expand a possibly relative path into an absolute pointer.
    pub fn absolute_path(&self, path: &str) -> String {
        match self.scope {
            Some(scope) if !path.is_empty() && !path.starts_with('/') => {
                format!("{}/{}", scope.trim_end_matches('/'), path)
            }
            _ => path.to_string(),
        }
    }

    /// Dereference a path, validating the pointer first.
    pub fn lookup(&self, path: &str) -> Result<&'a Value> {
        pointer::get(self.data, &self.absolute_path(path))
    }

    /// Resolve a prop value. Failures are reported and resolve to `null`.
    pub fn resolve(&self, value: &PropValue, diagnostics: &mut Diagnostics) -> Value {
        match value {
            PropValue::Primitive(v) => v.clone(),
            PropValue::Object(map) => Value::Object(map.clone()),
            PropValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, diagnostics))
                    .collect(),
            ),
            PropValue::Literal(literal) => literal.value(),
            PropValue::Path(path) => match self.lookup(path) {
                Ok(v) => v.clone(),
                Err(err) => {
                    report_unresolved(diagnostics, path, &err);
                    Value::Null
                }
            },
            PropValue::Combined { path, literal } => match self.lookup(path) {
                Ok(v) => v.clone(),
                Err(err) => {
                    ::log::debug!("[A2UI binding] {} falls back to literal: {}", path, err);
                    literal.value()
                }
            },
        }
    }

    /// Resolve every entry of a prop map, keeping key order.
    pub fn resolve_map<'v, I>(&self, entries: I, diagnostics: &mut Diagnostics) -> Map<String, Value>
    where
        I: IntoIterator<Item = (&'v String, &'v PropValue)>,
    {
        entries
            .into_iter()
            .map(|(key, value)| (key.clone(), self.resolve(value, diagnostics)))
            .collect()
    }
}

/// Resolve `value` against `data` with no template scope.
pub fn resolve(value: &PropValue, data: &Value, diagnostics: &mut Diagnostics) -> Value {
    Resolver::new(data).resolve(value, diagnostics)
}

fn report_unresolved(diagnostics: &mut Diagnostics, path: &str, err: &A2uiError) {
    let mut context = Map::new();
    context.insert("path".into(), Value::String(path.to_string()));
    diagnostics.report(
        BINDING_RESOLUTION_ERROR,
        format!("Failed to resolve path {path}: {err}"),
        None,
        Some(context),
    );
}
