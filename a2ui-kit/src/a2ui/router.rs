//! A2UI Message Router
//!
//! Associates inbound protocol messages with conversational turns. The
//! session state every handler needs (turn history, per-turn messages, the
//! turn currently receiving messages) lives in an explicit
//! [`ConversationContext`].

use std::sync::LazyLock;

use chrono::Utc;
use indexmap::IndexMap;
use regex::Regex;

use super::message::A2uiMessage;

/// Surface ids generated for a turn embed the turn id.
static SURFACE_TURN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^surface-(msg-\d+-\d+)$").expect("valid surface id regex"));

/// Extract the turn id embedded in a generated surface id.
pub fn turn_id_from_surface_id(surface_id: &str) -> Option<&str> {
    SURFACE_TURN_ID
        .captures(surface_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The surface id generated for a turn.
pub fn surface_id_for_turn(turn_id: &str) -> String {
    format!("surface-{turn_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversational exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    /// Streamed text, empty for a turn created to hold UI
    pub content: String,
}

/// Session-scoped routing state.
///
/// # Example
///
/// ```rust,ignore
/// let mut context = ConversationContext::new();
/// context.push_user_turn("Show me a login form");
///
/// if let Some(turn_id) = context.receive(message) {
///     for (surface_id, batch) in context.surface_batches(&turn_id) {
///         // apply batch to surface_id
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct ConversationContext {
    turns: Vec<Turn>,

    /// Protocol messages recorded per turn, in arrival order
    messages_by_turn: IndexMap<String, Vec<A2uiMessage>>,

    /// Turn receiving messages of the current response
    current_turn: Option<String>,

    counter: u64,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn(&self, turn_id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == turn_id)
    }

    pub fn current_turn(&self) -> Option<&str> {
        self.current_turn.as_deref()
    }

    /// A fresh `msg-<unix-millis>-<counter>` id.
    pub fn next_turn_id(&mut self) -> String {
        let id = format!("msg-{}-{}", Utc::now().timestamp_millis(), self.counter);
        self.counter += 1;
        id
    }

    /// Record a user request. The next inbound message starts a new turn.
    pub fn push_user_turn(&mut self, content: impl Into<String>) -> String {
        let id = self.next_turn_id();
        self.turns.push(Turn {
            id: id.clone(),
            role: Role::User,
            content: content.into(),
        });
        self.current_turn = None;
        id
    }

    /// Open an empty assistant turn and make it current.
    pub fn push_assistant_turn(&mut self) -> String {
        let id = self.next_turn_id();
        self.turns.push(Turn {
            id: id.clone(),
            role: Role::Assistant,
            content: String::new(),
        });
        self.current_turn = Some(id.clone());
        id
    }

    /// Append streamed text to the current turn, opening one if needed.
    pub fn append_text(&mut self, delta: &str) -> String {
        self.edit_text(|content| content.push_str(delta))
    }

    /// Replace the text of the current turn, opening one if needed.
    pub fn set_text(&mut self, text: &str) -> String {
        self.edit_text(|content| {
            content.clear();
            content.push_str(text);
        })
    }

    fn edit_text(&mut self, edit: impl FnOnce(&mut String)) -> String {
        let turn_id = match self.current_turn.clone() {
            Some(id) if self.turn(&id).is_some() => id,
            _ => self.push_assistant_turn(),
        };
        if let Some(turn) = self.turns.iter_mut().find(|t| t.id == turn_id) {
            edit(&mut turn.content);
        }
        turn_id
    }

    /// Pick the turn an inbound message belongs to.
    ///
    /// `deleteSurface` goes to the turn that created the surface, or to the
    /// turn embedded in a generated surface id; otherwise it is dropped.
    /// Everything else goes to `target` if given, then the current turn, then
    /// the last turn when it is an empty assistant turn, and finally a newly
    /// created turn.
    pub fn route_inbound(&mut self, message: &A2uiMessage, target: Option<&str>) -> Option<String> {
        if !message.is_inbound() {
            ::log::debug!("[A2UI router] Not routing outbound {}", message.type_name());
            return None;
        }

        if let A2uiMessage::DeleteSurface(delete) = message {
            let routed = self.route_delete(&delete.surface_id);
            self.current_turn = None;
            return routed;
        }

        if let Some(target) = target {
            self.current_turn = Some(target.to_string());
            return Some(target.to_string());
        }

        if let Some(current) = &self.current_turn {
            return Some(current.clone());
        }

        match self.turns.last() {
            Some(last) if last.role == Role::Assistant && last.content.is_empty() => {
                let id = last.id.clone();
                self.current_turn = Some(id.clone());
                Some(id)
            }
            _ => Some(self.push_assistant_turn()),
        }
    }

    fn route_delete(&self, surface_id: &str) -> Option<String> {
        let owner = self.messages_by_turn.iter().find(|(_, messages)| {
            messages.iter().any(|m| {
                matches!(m, A2uiMessage::SurfaceUpdate(update) if update.surface_id == surface_id)
            })
        });
        if let Some((turn_id, _)) = owner {
            ::log::debug!("[A2UI router] deleteSurface {} -> {}", surface_id, turn_id);
            return Some(turn_id.clone());
        }

        if let Some(turn_id) = turn_id_from_surface_id(surface_id) {
            if self.turn(turn_id).is_some() {
                ::log::debug!("[A2UI router] deleteSurface {} -> {} (from id)", surface_id, turn_id);
                return Some(turn_id.to_string());
            }
        }

        ::log::warn!(
            "[A2UI router] deleteSurface targets {} but no turn holds that surface",
            surface_id
        );
        None
    }

    /// Record `message` under `turn_id` unless an identical one is there.
    ///
    /// Returns whether the message was new.
    pub fn record(&mut self, turn_id: &str, message: A2uiMessage) -> bool {
        let messages = self.messages_by_turn.entry(turn_id.to_string()).or_default();
        if messages.contains(&message) {
            ::log::debug!(
                "[A2UI router] Dropping duplicate {} for {}",
                message.type_name(),
                turn_id
            );
            return false;
        }
        messages.push(message);
        true
    }

    /// Route and record. Returns the turn for a message that should be
    /// applied, `None` for dropped or duplicate messages.
    pub fn receive(&mut self, message: A2uiMessage) -> Option<String> {
        let turn_id = self.route_inbound(&message, None)?;
        self.record(&turn_id, message).then_some(turn_id)
    }

    pub fn messages_for_turn(&self, turn_id: &str) -> &[A2uiMessage] {
        self.messages_by_turn
            .get(turn_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// A turn's messages grouped by surface, each group in priority order.
    pub fn surface_batches(&self, turn_id: &str) -> Vec<(String, Vec<A2uiMessage>)> {
        let mut groups: IndexMap<String, Vec<A2uiMessage>> = IndexMap::new();
        for message in self.messages_for_turn(turn_id) {
            groups
                .entry(message.surface_id().to_string())
                .or_default()
                .push(message.clone());
        }

        groups
            .into_iter()
            .map(|(surface_id, mut batch)| {
                A2uiMessage::sort_by_priority(&mut batch);
                (surface_id, batch)
            })
            .collect()
    }

    /// Surface ids a turn created with `surfaceUpdate`.
    pub fn surfaces_for_turn(&self, turn_id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for message in self.messages_for_turn(turn_id) {
            if let A2uiMessage::SurfaceUpdate(update) = message {
                if !ids.contains(&update.surface_id.as_str()) {
                    ids.push(&update.surface_id);
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn message(value: Value) -> A2uiMessage {
        A2uiMessage::from_value(value).unwrap()
    }

    fn update(surface_id: &str) -> A2uiMessage {
        message(json!({"type": "surfaceUpdate", "surfaceId": surface_id, "components": []}))
    }

    fn delete(surface_id: &str) -> A2uiMessage {
        message(json!({"type": "deleteSurface", "surfaceId": surface_id}))
    }

    #[test]
    fn test_turn_ids() {
        let mut context = ConversationContext::new();
        let a = context.next_turn_id();
        let b = context.next_turn_id();
        assert_ne!(a, b);

        let surface_id = surface_id_for_turn(&a);
        assert_eq!(turn_id_from_surface_id(&surface_id), Some(a.as_str()));
        assert_eq!(turn_id_from_surface_id("surface-main"), None);
        assert_eq!(turn_id_from_surface_id("main"), None);
    }

    #[test]
    fn test_messages_share_the_created_turn() {
        let mut context = ConversationContext::new();
        context.push_user_turn("hello");

        let first = context.receive(update("a")).unwrap();
        let second = context.receive(update("b")).unwrap();
        assert_eq!(first, second);
        assert_eq!(context.turns().len(), 2);
        assert_eq!(context.turn(&first).unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_user_turn_clears_current() {
        let mut context = ConversationContext::new();
        let first = context.receive(update("a")).unwrap();

        context.push_user_turn("again");
        let second = context.receive(update("b")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_reuses_last_empty_assistant_turn() {
        let mut context = ConversationContext::new();
        let open = context.push_assistant_turn();
        context.current_turn = None;

        assert_eq!(context.receive(update("a")), Some(open.clone()));
        assert_eq!(context.current_turn(), Some(open.as_str()));
    }

    #[test]
    fn test_text_turn_is_not_reused() {
        let mut context = ConversationContext::new();
        let text = context.append_text("Here you go");
        context.current_turn = None;

        let routed = context.receive(update("a")).unwrap();
        assert_ne!(routed, text);
    }

    #[test]
    fn test_delete_routes_to_owner_and_clears_current() {
        let mut context = ConversationContext::new();
        let owner = context.receive(update("form")).unwrap();
        context.push_user_turn("submit");
        let other = context.receive(update("other")).unwrap();
        assert_ne!(owner, other);
        context.append_text("Thanks!");

        assert_eq!(context.receive(delete("form")), Some(owner.clone()));
        assert_eq!(context.current_turn(), None);

        // The next message opens a fresh turn.
        let next = context.receive(update("success")).unwrap();
        assert_ne!(next, owner);
        assert_ne!(next, other);
    }

    #[test]
    fn test_delete_falls_back_to_surface_id() {
        let mut context = ConversationContext::new();
        let turn = context.push_assistant_turn();

        let surface_id = surface_id_for_turn(&turn);
        assert_eq!(context.route_inbound(&delete(&surface_id), None), Some(turn));

        assert_eq!(context.route_inbound(&delete("surface-msg-1-999"), None), None);
        assert_eq!(context.route_inbound(&delete("unknown"), None), None);
    }

    #[test]
    fn test_duplicates_are_suppressed() {
        let mut context = ConversationContext::new();
        let turn = context.receive(update("a")).unwrap();

        assert_eq!(context.receive(update("a")), None);
        assert_eq!(context.messages_for_turn(&turn).len(), 1);

        let changed = message(json!({"type": "surfaceUpdate", "surfaceId": "a", "root": "r", "components": []}));
        assert!(context.receive(changed).is_some());
        assert_eq!(context.messages_for_turn(&turn).len(), 2);
    }

    #[test]
    fn test_explicit_target_becomes_current() {
        let mut context = ConversationContext::new();
        let turn = context.push_user_turn("hi");

        assert_eq!(context.route_inbound(&update("a"), Some(&turn)), Some(turn.clone()));
        assert_eq!(context.current_turn(), Some(turn.as_str()));
    }

    #[test]
    fn test_surface_batches_are_sorted() {
        let mut context = ConversationContext::new();
        let turn = context.receive(message(json!({"type": "beginRendering", "surfaceId": "a"}))).unwrap();
        context.receive(message(json!({"type": "dataModelUpdate", "surfaceId": "b", "dataModel": {}})));
        context.receive(update("a"));

        let batches = context.surface_batches(&turn);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "a");
        let order: Vec<_> = batches[0].1.iter().map(A2uiMessage::type_name).collect();
        assert_eq!(order, ["surfaceUpdate", "beginRendering"]);
        assert_eq!(context.surfaces_for_turn(&turn), vec!["a"]);
    }
}
