//! A2UI Value Types
//!
//! Represents the prop values used in the A2UI protocol for data binding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Literal fields of a bound value.
///
/// When several fields are present the first one in the order string,
/// boolean, number wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiteralValue {
    pub literal_string: Option<String>,
    pub literal_boolean: Option<bool>,
    /// Kept as the JSON number it arrived as, so `3` stays an integer
    pub literal_number: Option<Number>,
}

impl LiteralValue {
    pub fn string(s: impl Into<String>) -> Self {
        LiteralValue {
            literal_string: Some(s.into()),
            ..Default::default()
        }
    }

    pub fn boolean(b: bool) -> Self {
        LiteralValue {
            literal_boolean: Some(b),
            ..Default::default()
        }
    }

    pub fn number(n: impl Into<Number>) -> Self {
        LiteralValue {
            literal_number: Some(n.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literal_string.is_none()
            && self.literal_boolean.is_none()
            && self.literal_number.is_none()
    }

    /// The literal in priority order, or `null` when no field is set.
    pub fn value(&self) -> Value {
        if let Some(s) = &self.literal_string {
            return Value::String(s.clone());
        }
        if let Some(b) = self.literal_boolean {
            return Value::Bool(b);
        }
        self.literal_number
            .clone()
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn take_from(map: &mut Map<String, Value>) -> Self {
        LiteralValue {
            literal_string: map
                .remove("literalString")
                .and_then(|v| v.as_str().map(str::to_string)),
            literal_boolean: map.remove("literalBoolean").and_then(|v| v.as_bool()),
            literal_number: match map.remove("literalNumber") {
                Some(Value::Number(n)) => Some(n),
                _ => None,
            },
        }
    }

    fn write_into(&self, map: &mut Map<String, Value>) {
        if let Some(s) = &self.literal_string {
            map.insert("literalString".into(), Value::String(s.clone()));
        }
        if let Some(b) = self.literal_boolean {
            map.insert("literalBoolean".into(), Value::Bool(b));
        }
        if let Some(n) = &self.literal_number {
            map.insert("literalNumber".into(), Value::Number(n.clone()));
        }
    }
}

/// A component prop value.
///
/// # Examples
///
/// ```json
/// "plain text"
/// {"literalString": "Hello World"}
/// {"path": "/user/name"}
/// {"path": "/user/name", "literalString": "Anonymous"}
/// ```
///
/// Objects that carry neither `path` nor any `literal*` field are kept as
/// [`PropValue::Object`] and pass through resolution untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// String, number, boolean or null
    Primitive(Value),
    /// Array whose elements are resolved one by one
    List(Vec<PropValue>),
    /// A literal value
    Literal(LiteralValue),
    /// A path reference to the data model
    Path(String),
    /// A path reference with a literal fallback
    Combined { path: String, literal: LiteralValue },
    /// Any other object
    Object(Map<String, Value>),
}

impl PropValue {
    /// Create a new literal string value
    pub fn literal(s: impl Into<String>) -> Self {
        PropValue::Literal(LiteralValue::string(s))
    }

    /// Create a new path reference
    pub fn path(p: impl Into<String>) -> Self {
        PropValue::Path(p.into())
    }

    /// Classify a raw JSON value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => PropValue::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(mut map) => {
                let is_binding = matches!(map.get("path"), Some(Value::String(_)))
                    || map.contains_key("literalString")
                    || map.contains_key("literalBoolean")
                    || map.contains_key("literalNumber");
                if !is_binding {
                    return PropValue::Object(map);
                }

                let path = match map.remove("path") {
                    Some(Value::String(p)) => Some(p),
                    _ => None,
                };
                let literal = LiteralValue::take_from(&mut map);
                match path {
                    Some(path) if literal.is_empty() => PropValue::Path(path),
                    Some(path) => PropValue::Combined { path, literal },
                    None => PropValue::Literal(literal),
                }
            }
            primitive => PropValue::Primitive(primitive),
        }
    }

    /// Back to the wire shape.
    pub fn to_json(&self) -> Value {
        match self {
            PropValue::Primitive(v) => v.clone(),
            PropValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            PropValue::Literal(literal) => {
                let mut map = Map::new();
                literal.write_into(&mut map);
                Value::Object(map)
            }
            PropValue::Path(path) => {
                let mut map = Map::new();
                map.insert("path".into(), Value::String(path.clone()));
                Value::Object(map)
            }
            PropValue::Combined { path, literal } => {
                let mut map = Map::new();
                literal.write_into(&mut map);
                map.insert("path".into(), Value::String(path.clone()));
                Value::Object(map)
            }
            PropValue::Object(map) => Value::Object(map.clone()),
        }
    }

    /// Get the path if this value is bound to one
    pub fn as_path(&self) -> Option<&str> {
        match self {
            PropValue::Path(path) | PropValue::Combined { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Plain string content, for literals and primitive strings
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Primitive(Value::String(s)) => Some(s),
            PropValue::Literal(literal) => literal.literal_string.as_deref(),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.as_path().is_some()
    }
}

impl Default for PropValue {
    fn default() -> Self {
        PropValue::Primitive(Value::Null)
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}
