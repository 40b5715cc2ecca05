//! A2UI Action/Error Codec
//!
//! Builds and validates the outbound `userAction` and `error` envelopes, and
//! frames them as user turns for the transport.

use std::sync::LazyLock;

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value, json};

use super::binding::Resolver;
use super::error::{A2uiError, Diagnostics, Result};
use super::message::{
    A2uiMessage, ActionDefinition, ComponentDefinition, ComponentKind, ErrorDetail, ErrorMessage,
    UserActionMessage,
};
use super::value::PropValue;

/// Prefix every accepted timestamp must match.
static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("valid timestamp regex")
});

/// Label words that turn a default button action into `submit`.
const SUBMIT_WORDS: [&str; 3] = ["submit", "login", "send"];

/// Content type tag of a framed user turn.
pub const USER_TURN_TYPE: &str = "a2ui";

/// Current time as ISO-8601 with millisecond precision, e.g.
/// `2024-01-01T12:00:00.000Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build a `userAction` stamped with the current time.
///
/// Every context value goes through the binding resolver, so the agent
/// receives plain values rather than path descriptors.
pub fn build_user_action(
    name: &str,
    surface_id: &str,
    source_component_id: &str,
    context: Option<&IndexMap<String, PropValue>>,
    resolver: &Resolver<'_>,
    diagnostics: &mut Diagnostics,
) -> UserActionMessage {
    let context = context.map(|entries| Value::Object(resolver.resolve_map(entries, diagnostics)));

    UserActionMessage {
        name: name.to_string(),
        surface_id: surface_id.to_string(),
        source_component_id: source_component_id.to_string(),
        timestamp: now_timestamp(),
        context,
    }
}

/// Check a `userAction` before it is handed to the transport.
pub fn validate_user_action(action: &UserActionMessage) -> Result<()> {
    if action.name.is_empty() {
        return Err(invalid("userAction name is empty"));
    }
    if action.surface_id.is_empty() {
        return Err(invalid("userAction surfaceId is empty"));
    }
    if action.source_component_id.is_empty() {
        return Err(invalid("userAction sourceComponentId is empty"));
    }
    if !ISO_TIMESTAMP.is_match(&action.timestamp) {
        return Err(invalid(format!(
            "userAction timestamp {:?} is not ISO-8601",
            action.timestamp
        )));
    }
    match &action.context {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(invalid("userAction context must be an object")),
    }
}

/// Check an `error` envelope before it is handed to the transport.
pub fn validate_error_message(message: &ErrorMessage) -> Result<()> {
    if message.surface_id.is_empty() {
        return Err(invalid("error surfaceId is empty"));
    }
    if message.error.message.is_empty() {
        return Err(invalid("error message is empty"));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> A2uiError {
    let reason = reason.into();
    ::log::warn!("[A2UI codec] Rejected outbound message: {}", reason);
    A2uiError::InvalidEnvelope(reason)
}

/// The action fired by a `Button` that declares none.
///
/// The label is the resolved `text` (or `label`) prop. Labels mentioning
/// submit, login or send produce `submit` and carry the whole data model as
/// `formData`; everything else is a `buttonClick`.
pub fn default_button_action(
    def: &ComponentDefinition,
    resolver: &Resolver<'_>,
    data: &Value,
    diagnostics: &mut Diagnostics,
) -> Option<ActionDefinition> {
    if *def.kind() != ComponentKind::Button {
        return None;
    }

    let label = ["text", "label"]
        .iter()
        .filter_map(|key| def.props().get(key))
        .map(|value| resolver.resolve(value, diagnostics))
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| "Button".to_string());

    let lower = label.to_lowercase();
    let is_submit = SUBMIT_WORDS.iter().any(|word| lower.contains(word));

    let mut context = IndexMap::new();
    context.insert("buttonId".to_string(), PropValue::literal(def.id.clone()));
    context.insert("label".to_string(), PropValue::literal(label));
    if is_submit {
        let form_data = match data {
            Value::Object(map) => PropValue::Object(map.clone()),
            other => PropValue::Primitive(other.clone()),
        };
        context.insert("formData".to_string(), form_data);
    }

    Some(ActionDefinition {
        name: if is_submit { "submit" } else { "buttonClick" }.to_string(),
        context: Some(context),
    })
}

/// Frame an outbound envelope as the content of a user turn.
pub fn encode_user_turn(message: &A2uiMessage) -> Result<String> {
    let framed = json!({"type": USER_TURN_TYPE, "message": message});
    Ok(serde_json::to_string(&framed)?)
}

/// Parse a framed user turn back into its envelope.
pub fn decode_user_turn(content: &str) -> Result<A2uiMessage> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Object(mut framed) = value else {
        return Err(A2uiError::InvalidEnvelope("user turn is not an object".into()));
    };

    if framed.get("type").and_then(Value::as_str) != Some(USER_TURN_TYPE) {
        return Err(A2uiError::InvalidEnvelope(format!(
            "user turn type must be {USER_TURN_TYPE:?}"
        )));
    }

    let message = framed
        .remove("message")
        .ok_or_else(|| A2uiError::InvalidEnvelope("user turn has no message".into()))?;
    let message = A2uiMessage::from_value(message)?;
    if message.is_inbound() {
        return Err(A2uiError::InvalidEnvelope(format!(
            "user turn carries inbound {}",
            message.type_name()
        )));
    }
    Ok(message)
}

/// Shorthand for an error envelope with a code.
pub fn error_message(
    surface_id: &str,
    code: &str,
    message: impl Into<String>,
    context: Option<Map<String, Value>>,
) -> ErrorMessage {
    ErrorMessage {
        surface_id: surface_id.to_string(),
        error: ErrorDetail {
            message: message.into(),
            code: Some(code.to_string()),
            component_id: None,
            context,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(name: &str, timestamp: &str) -> UserActionMessage {
        UserActionMessage {
            name: name.into(),
            surface_id: "s1".into(),
            source_component_id: "x".into(),
            timestamp: timestamp.into(),
            context: None,
        }
    }

    #[test]
    fn test_timestamp_is_iso() {
        assert!(ISO_TIMESTAMP.is_match(&now_timestamp()));
        assert!(now_timestamp().ends_with('Z'));
    }

    #[test]
    fn test_validate_user_action() {
        assert!(validate_user_action(&action("submit", "2024-01-01T00:00:00Z")).is_ok());

        assert!(matches!(
            validate_user_action(&action("", "2024-01-01T00:00:00Z")),
            Err(A2uiError::InvalidEnvelope(_))
        ));
        assert!(validate_user_action(&action("submit", "yesterday")).is_err());

        let mut with_array = action("submit", "2024-01-01T00:00:00Z");
        with_array.context = Some(json!([1, 2]));
        assert!(validate_user_action(&with_array).is_err());

        let mut with_null = action("submit", "2024-01-01T00:00:00Z");
        with_null.context = Some(Value::Null);
        assert!(validate_user_action(&with_null).is_err());
    }

    #[test]
    fn test_build_user_action_resolves_context() {
        let data = json!({"form": {"email": "ada@example.com"}});
        let resolver = Resolver::new(&data);
        let mut diagnostics = Diagnostics::new();

        let mut context = IndexMap::new();
        context.insert("email".to_string(), PropValue::path("/form/email"));
        context.insert("source".to_string(), PropValue::literal("form"));

        let action = build_user_action("submit", "s1", "btn", Some(&context), &resolver, &mut diagnostics);
        assert_eq!(action.context, Some(json!({"email": "ada@example.com", "source": "form"})));
        assert!(validate_user_action(&action).is_ok());
    }

    #[test]
    fn test_default_button_action() {
        let data = json!({"email": "a@b.c"});
        let resolver = Resolver::new(&data);
        let mut diagnostics = Diagnostics::new();

        let send = ComponentDefinition::from_value(json!({
            "id": "go", "component": {"Button": {"text": {"literalString": "Send message"}}}
        }))
        .unwrap();
        let action = default_button_action(&send, &resolver, &data, &mut diagnostics).unwrap();
        assert_eq!(action.name, "submit");
        let context = action.context.unwrap();
        assert_eq!(resolver.resolve(&context["formData"], &mut diagnostics), data);

        let plain = ComponentDefinition::from_value(json!({
            "id": "more", "component": {"Button": {}}
        }))
        .unwrap();
        let action = default_button_action(&plain, &resolver, &data, &mut diagnostics).unwrap();
        assert_eq!(action.name, "buttonClick");
        let context = action.context.unwrap();
        assert_eq!(context["label"], PropValue::literal("Button"));
        assert!(!context.contains_key("formData"));
    }

    #[test]
    fn test_user_turn_framing() {
        let message = A2uiMessage::UserAction(action("submit", "2024-01-01T00:00:00Z"));
        let content = encode_user_turn(&message).unwrap();

        let framed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(framed["type"], "a2ui");
        assert_eq!(framed["message"]["type"], "userAction");

        assert_eq!(decode_user_turn(&content).unwrap(), message);
        assert!(decode_user_turn(r#"{"type": "text", "message": {}}"#).is_err());
        assert!(decode_user_turn(r#"{"type": "a2ui", "message": {"type": "deleteSurface", "surfaceId": "s"}}"#).is_err());
    }

    #[test]
    fn test_validate_error_message() {
        let ok = error_message("s1", "TEMPLATE_RENDER_ERROR", "boom", None);
        assert!(validate_error_message(&ok).is_ok());

        let empty = ErrorMessage {
            surface_id: "s1".into(),
            error: ErrorDetail { message: String::new(), code: None, component_id: None, context: None },
        };
        assert!(validate_error_message(&empty).is_err());
    }
}
