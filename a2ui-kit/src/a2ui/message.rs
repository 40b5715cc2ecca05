//! A2UI Protocol Message Types
//!
//! This module defines the Rust types for all A2UI protocol messages.
//! Messages are serialized/deserialized using serde_json, with a `type`
//! discriminator next to the payload fields:
//!
//! ```text
//! {"type": "beginRendering", "surfaceId": "main", "root": "root"}
//! ```
//!
//! The wrapped form `{"beginRendering": {...}}` is accepted on input through
//! [`A2uiMessage::from_value`].

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::error::A2uiError;
use super::value::PropValue;

/// Component ids are restricted to this alphabet.
static COMPONENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid component id regex"));

/// Top-level A2UI message enum.
///
/// Each variant corresponds to one of the A2UI protocol message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum A2uiMessage {
    /// Add or update components in the tree
    SurfaceUpdate(SurfaceUpdate),

    /// Update the data model
    DataModelUpdate(DataModelUpdate),

    /// Mark a surface renderable
    BeginRendering(BeginRendering),

    /// Clear a surface
    DeleteSurface(DeleteSurface),

    /// User action event (sent from client to server)
    UserAction(UserActionMessage),

    /// Client-side failure report (sent from client to server)
    Error(ErrorMessage),
}

impl A2uiMessage {
    /// Wire names of every message type, in application priority order.
    pub const TYPE_NAMES: [&'static str; 6] = [
        "surfaceUpdate",
        "dataModelUpdate",
        "beginRendering",
        "deleteSurface",
        "userAction",
        "error",
    ];

    /// Get the surface ID this message applies to
    pub fn surface_id(&self) -> &str {
        match self {
            A2uiMessage::SurfaceUpdate(m) => &m.surface_id,
            A2uiMessage::DataModelUpdate(m) => &m.surface_id,
            A2uiMessage::BeginRendering(m) => &m.surface_id,
            A2uiMessage::DeleteSurface(m) => &m.surface_id,
            A2uiMessage::UserAction(m) => &m.surface_id,
            A2uiMessage::Error(m) => &m.surface_id,
        }
    }

    /// The `type` discriminator
    pub fn type_name(&self) -> &'static str {
        match self {
            A2uiMessage::SurfaceUpdate(_) => "surfaceUpdate",
            A2uiMessage::DataModelUpdate(_) => "dataModelUpdate",
            A2uiMessage::BeginRendering(_) => "beginRendering",
            A2uiMessage::DeleteSurface(_) => "deleteSurface",
            A2uiMessage::UserAction(_) => "userAction",
            A2uiMessage::Error(_) => "error",
        }
    }

    /// Application order within one batch for one surface.
    ///
    /// Outbound message types sort after everything else.
    pub fn priority(&self) -> u8 {
        match self {
            A2uiMessage::SurfaceUpdate(_) => 0,
            A2uiMessage::DataModelUpdate(_) => 1,
            A2uiMessage::BeginRendering(_) => 2,
            A2uiMessage::DeleteSurface(_) => 3,
            A2uiMessage::UserAction(_) | A2uiMessage::Error(_) => 99,
        }
    }

    /// Whether the message travels from the agent to the client.
    pub fn is_inbound(&self) -> bool {
        self.priority() < 99
    }

    /// Parse either the tagged or the wrapped wire form.
    pub fn from_value(value: Value) -> Result<Self, A2uiError> {
        let Value::Object(mut map) = value else {
            return Err(A2uiError::InvalidEnvelope(
                "message must be a JSON object".into(),
            ));
        };

        if !map.contains_key("type") && map.len() == 1 {
            let key = map.keys().next().cloned().unwrap_or_default();
            if Self::TYPE_NAMES.contains(&key.as_str()) {
                if let Some(Value::Object(mut inner)) = map.remove(&key) {
                    inner.insert("type".into(), Value::String(key));
                    map = inner;
                }
            }
        }

        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Sort a batch into application order. The sort is stable, so messages
    /// of the same type keep their arrival order.
    pub fn sort_by_priority(messages: &mut [A2uiMessage]) {
        messages.sort_by_key(A2uiMessage::priority);
    }
}

/// Mark a surface as renderable.
///
/// # Example JSON
///
/// ```text
/// {"type": "beginRendering", "surfaceId": "main", "root": "root-column"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginRendering {
    /// Target surface ID
    pub surface_id: String,

    /// ID of the root component; falls back to the stored root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// Add or update components in the surface.
///
/// # Example JSON
///
/// ```text
/// {
///   "type": "surfaceUpdate",
///   "surfaceId": "main",
///   "root": "root",
///   "components": [
///     {"id": "root", "component": {"Column": {"explicitList": ["header"]}}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceUpdate {
    /// Target surface ID
    pub surface_id: String,

    /// Components to add or update. Malformed entries are skipped.
    #[serde(default, deserialize_with = "lenient_components")]
    pub components: Vec<ComponentDefinition>,

    /// Optional new root component ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// Keep every well-formed component definition, drop and log the rest.
fn lenient_components<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Vec<ComponentDefinition>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    let mut components = Vec::with_capacity(raw.len());
    for (i, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<ComponentDefinition>(value) {
            Ok(def) => components.push(def),
            Err(e) => ::log::warn!("[A2UI message] Skipping component[{}]: {}", i, e),
        }
    }
    Ok(components)
}

/// Shallow-merge new values into the data model.
///
/// # Example JSON
///
/// ```text
/// {"type": "dataModelUpdate", "surfaceId": "main", "dataModel": {"user": {"name": "Ada"}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelUpdate {
    /// Target surface ID
    pub surface_id: String,

    /// Top-level keys to replace
    #[serde(default)]
    pub data_model: Map<String, Value>,
}

/// Clear a surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSurface {
    /// Surface ID to clear
    pub surface_id: String,
}

/// User action event (sent from client to server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActionMessage {
    /// Action name
    pub name: String,

    /// Source surface ID
    pub surface_id: String,

    /// Component that triggered the action
    pub source_component_id: String,

    /// ISO-8601 timestamp
    pub timestamp: String,

    /// Context values, already resolved against the data model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Failure report (sent from client to server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    /// Surface the failure happened on
    pub surface_id: String,

    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

// ============================================================================
// Components
// ============================================================================

/// A single component definition in the adjacency list.
///
/// Wire shape: `{id, component: {<TypeName>: {...props}}, template?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawComponentDefinition", into = "RawComponentDefinition")]
pub struct ComponentDefinition {
    /// Unique component ID within the surface
    pub id: String,

    /// The component type and properties
    pub component: ComponentType,

    /// Repeated children driven by the data model
    pub template: Option<TemplateDefinition>,
}

impl ComponentDefinition {
    pub fn new(id: impl Into<String>, kind: ComponentKind, props: ComponentProps) -> Self {
        ComponentDefinition {
            id: id.into(),
            component: ComponentType { kind, props },
            template: None,
        }
    }

    pub fn with_template(mut self, template: TemplateDefinition) -> Self {
        self.template = Some(template);
        self
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.component.kind
    }

    pub fn props(&self) -> &ComponentProps {
        &self.component.props
    }

    /// Parse and validate one definition from raw JSON.
    pub fn from_value(value: Value) -> Result<Self, A2uiError> {
        let raw: RawComponentDefinition = serde_json::from_value(value)?;
        Self::try_from(raw)
    }
}

/// Repeat `children` once per element of the array at `data_path`,
/// or exactly once when no path is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    #[serde(default)]
    pub children: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
}

/// Component type together with its props.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentType {
    pub kind: ComponentKind,
    pub props: ComponentProps,
}

/// Component type identifier.
///
/// Types outside the standard catalog are kept as [`ComponentKind::Unknown`]
/// so the tree can render a placeholder for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    // Layout
    Column,
    Row,
    List,
    Card,

    // Display
    Text,
    Image,
    Link,
    Badge,
    Divider,

    // Interactive
    Button,
    TextField,
    TextArea,
    Checkbox,
    Select,

    Unknown(String),
}

impl ComponentKind {
    /// Get the A2UI component type name
    pub fn name(&self) -> &str {
        match self {
            ComponentKind::Column => "Column",
            ComponentKind::Row => "Row",
            ComponentKind::List => "List",
            ComponentKind::Card => "Card",
            ComponentKind::Text => "Text",
            ComponentKind::Image => "Image",
            ComponentKind::Link => "Link",
            ComponentKind::Badge => "Badge",
            ComponentKind::Divider => "Divider",
            ComponentKind::Button => "Button",
            ComponentKind::TextField => "TextField",
            ComponentKind::TextArea => "TextArea",
            ComponentKind::Checkbox => "Checkbox",
            ComponentKind::Select => "Select",
            ComponentKind::Unknown(name) => name,
        }
    }

    /// Parse from a type name. Never fails.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Column" => ComponentKind::Column,
            "Row" => ComponentKind::Row,
            "List" => ComponentKind::List,
            "Card" => ComponentKind::Card,
            "Text" => ComponentKind::Text,
            "Image" => ComponentKind::Image,
            "Link" => ComponentKind::Link,
            "Badge" => ComponentKind::Badge,
            "Divider" => ComponentKind::Divider,
            "Button" => ComponentKind::Button,
            "TextField" => ComponentKind::TextField,
            "TextArea" => ComponentKind::TextArea,
            "Checkbox" => ComponentKind::Checkbox,
            "Select" => ComponentKind::Select,
            other => ComponentKind::Unknown(other.to_string()),
        }
    }

    /// All standard component types
    pub fn all() -> &'static [ComponentKind] {
        &[
            ComponentKind::Column,
            ComponentKind::Row,
            ComponentKind::List,
            ComponentKind::Card,
            ComponentKind::Text,
            ComponentKind::Image,
            ComponentKind::Link,
            ComponentKind::Badge,
            ComponentKind::Divider,
            ComponentKind::Button,
            ComponentKind::TextField,
            ComponentKind::TextArea,
            ComponentKind::Checkbox,
            ComponentKind::Select,
        ]
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ComponentKind::Unknown(_))
    }

    /// The prop carrying the two-way binding of a form component.
    pub fn value_prop(&self) -> Option<&'static str> {
        match self {
            ComponentKind::TextField | ComponentKind::TextArea | ComponentKind::Select => {
                Some("value")
            }
            ComponentKind::Checkbox => Some("checked"),
            _ => None,
        }
    }
}

/// Properties of a component.
///
/// Structural keys get their own fields; everything else is kept, in wire
/// order, in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentProps {
    /// Static child component IDs
    pub explicit_list: Option<Vec<String>>,

    /// A single child component ID
    pub child: Option<String>,

    /// Action fired by interactive components
    pub action: Option<ActionDefinition>,

    /// Remaining props
    pub extra: IndexMap<String, PropValue>,
}

impl ComponentProps {
    pub fn with_prop(mut self, key: impl Into<String>, value: PropValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.explicit_list = Some(children.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.extra.get(key)
    }

    /// Whether any child reference is declared
    pub fn has_children(&self) -> bool {
        self.child.is_some() || self.explicit_list.as_ref().is_some_and(|l| !l.is_empty())
    }

    fn from_map(map: Map<String, Value>) -> Result<(Self, Option<TemplateDefinition>), A2uiError> {
        let mut props = ComponentProps::default();
        let mut template = None;

        for (key, value) in map {
            match key.as_str() {
                "explicitList" => {
                    let ids: Vec<String> = serde_json::from_value(value).map_err(|e| {
                        A2uiError::InvalidComponent(format!("explicitList must list ids: {e}"))
                    })?;
                    props.explicit_list = Some(ids);
                }
                "child" => match value {
                    Value::String(id) => props.child = Some(id),
                    Value::Null => {}
                    _ => {
                        return Err(A2uiError::InvalidComponent(
                            "child must be a component id".into(),
                        ));
                    }
                },
                "action" => {
                    let action: ActionDefinition = serde_json::from_value(value).map_err(|e| {
                        A2uiError::InvalidComponent(format!("invalid action: {e}"))
                    })?;
                    props.action = Some(action);
                }
                "template" => {
                    template = Some(serde_json::from_value(value).map_err(|e| {
                        A2uiError::InvalidComponent(format!("invalid template: {e}"))
                    })?);
                }
                _ => {
                    props.extra.insert(key, PropValue::from_json(value));
                }
            }
        }

        Ok((props, template))
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(list) = &self.explicit_list {
            map.insert(
                "explicitList".into(),
                Value::Array(list.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(child) = &self.child {
            map.insert("child".into(), Value::String(child.clone()));
        }
        if let Some(action) = &self.action {
            map.insert("action".into(), action.to_value());
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.to_json());
        }
        map
    }
}

/// Wire shape used for (de)serializing [`ComponentDefinition`].
#[derive(Serialize, Deserialize)]
struct RawComponentDefinition {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    component: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<TemplateDefinition>,
}

impl TryFrom<RawComponentDefinition> for ComponentDefinition {
    type Error = A2uiError;

    fn try_from(raw: RawComponentDefinition) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .ok_or_else(|| A2uiError::InvalidComponent("missing id".into()))?;
        if !COMPONENT_ID.is_match(&id) {
            return Err(A2uiError::InvalidComponent(format!(
                "invalid component id {id:?}"
            )));
        }

        let Some(Value::Object(component)) = raw.component else {
            return Err(A2uiError::InvalidComponent(format!(
                "component {id} has no type object"
            )));
        };
        if component.len() != 1 {
            return Err(A2uiError::InvalidComponent(format!(
                "component {id} must have exactly one type key, found {}",
                component.len()
            )));
        }

        let Some((type_name, props)) = component.into_iter().next() else {
            return Err(A2uiError::InvalidComponent(format!("component {id} is empty")));
        };
        let props = match props {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(A2uiError::InvalidComponent(format!(
                    "props of component {id} must be an object"
                )));
            }
        };

        let (props, nested_template) = ComponentProps::from_map(props)?;

        Ok(ComponentDefinition {
            id,
            component: ComponentType {
                kind: ComponentKind::from_name(&type_name),
                props,
            },
            template: raw.template.or(nested_template),
        })
    }
}

impl From<ComponentDefinition> for RawComponentDefinition {
    fn from(def: ComponentDefinition) -> Self {
        let mut component = Map::new();
        component.insert(
            def.component.kind.name().to_string(),
            Value::Object(def.component.props.to_map()),
        );
        RawComponentDefinition {
            id: Some(def.id),
            component: Some(Value::Object(component)),
            template: def.template,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Action definition for interactive components.
///
/// `context` is usually an object of prop values. The list form
/// `[{"key": "k", "value": {...}}]` is accepted as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    /// Action name (e.g., "addToCart", "submit")
    pub name: String,

    /// Context values to include with the action
    #[serde(default, deserialize_with = "lenient_context", skip_serializing_if = "Option::is_none")]
    pub context: Option<IndexMap<String, PropValue>>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ActionDefinition {
            name: name.into(),
            context: None,
        }
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn lenient_context<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<IndexMap<String, PropValue>>, D::Error> {
    let context = match Option::<Value>::deserialize(d)? {
        Some(Value::Object(map)) => Some(
            map.into_iter()
                .map(|(k, v)| (k, PropValue::from_json(v)))
                .collect(),
        ),
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| {
                    let key = item.get("key")?.as_str()?.to_string();
                    let value = item.get("value").cloned().unwrap_or(Value::Null);
                    Some((key, PropValue::from_json(value)))
                })
                .collect(),
        ),
        _ => None,
    };
    Ok(context)
}
