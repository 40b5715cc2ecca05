//! A2UI Surface State Machine
//!
//! A surface owns one component map, one data model and a root pointer, and
//! moves between [`SurfaceState::Empty`], [`SurfaceState::Populated`] and
//! [`SurfaceState::Ready`] as protocol messages arrive.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::data_model::DataModel;
use super::error::{Diagnostics, Result};
use super::message::*;
use super::processor::*;
use super::registry::Catalog;
use super::tree::{RenderNode, TreeRenderer};

/// Lifecycle of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Nothing received yet, or cleared by `deleteSurface`
    Empty,
    /// Has components or data but no rendering permission
    Populated,
    /// Root designated and present
    Ready,
}

/// Represents a UI surface with its component tree and data model.
///
/// `is_ready` implies `root` is set and names a defined component.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Surface ID
    pub id: String,

    /// Root component ID
    root: Option<String>,

    /// Component definitions by ID, in arrival order
    components: Arc<IndexMap<String, ComponentDefinition>>,

    /// Binding source
    data_model: DataModel,

    is_ready: bool,
}

impl Surface {
    /// Create a new empty surface
    pub fn new(id: impl Into<String>) -> Self {
        Surface {
            id: id.into(),
            root: None,
            components: Arc::new(IndexMap::new()),
            data_model: DataModel::new(),
            is_ready: false,
        }
    }

    pub fn state(&self) -> SurfaceState {
        if self.is_ready {
            SurfaceState::Ready
        } else if self.components.is_empty() && self.data_model.is_empty() && self.root.is_none() {
            SurfaceState::Empty
        } else {
            SurfaceState::Populated
        }
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Get a component by ID
    pub fn get_component(&self, id: &str) -> Option<&ComponentDefinition> {
        self.components.get(id)
    }

    pub fn components(&self) -> &IndexMap<String, ComponentDefinition> {
        &self.components
    }

    /// A shared handle on the current component map.
    pub fn components_snapshot(&self) -> Arc<IndexMap<String, ComponentDefinition>> {
        Arc::clone(&self.components)
    }

    pub fn data_model(&self) -> &DataModel {
        &self.data_model
    }

    /// Apply one protocol message.
    ///
    /// Messages for another surface and outbound message types are ignored.
    pub fn apply(&mut self, message: &A2uiMessage) -> Vec<ProcessorEvent> {
        if message.surface_id() != self.id {
            ::log::debug!(
                "[A2UI surface] {} ignores {} for {}",
                self.id,
                message.type_name(),
                message.surface_id()
            );
            return vec![];
        }

        match message {
            A2uiMessage::SurfaceUpdate(msg) => self.apply_surface_update(msg),
            A2uiMessage::DataModelUpdate(msg) => self.apply_data_model_update(msg),
            A2uiMessage::BeginRendering(msg) => self.apply_begin_rendering(msg),
            A2uiMessage::DeleteSurface(_) => self.clear(),
            A2uiMessage::UserAction(_) | A2uiMessage::Error(_) => {
                ::log::debug!("[A2UI surface] Ignoring outbound {} message", message.type_name());
                vec![]
            }
        }
    }

    /// Write a value from a local input.
    ///
    /// The previous data model is left untouched; the write stays pending
    /// until a `dataModelUpdate` covering it arrives.
    pub fn update_data_model(&mut self, path: &str, value: Value) -> Result<ProcessorEvent> {
        self.data_model.set_local(path, value)?;

        Ok(ProcessorEvent::DataModelUpdated(DataModelUpdatedEvent {
            surface_id: self.id.clone(),
            updated_paths: vec![path.to_string()],
        }))
    }

    /// Render the tree below the root. `None` until the surface is ready.
    pub fn render_tree<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        diagnostics: &mut Diagnostics,
    ) -> Option<RenderNode> {
        if !self.is_ready {
            return None;
        }
        let root = self.root.as_deref()?;
        TreeRenderer::new(&self.components, self.data_model.as_value(), catalog)
            .render(root, diagnostics)
    }

    /// Drop components, data and root.
    pub fn clear(&mut self) -> Vec<ProcessorEvent> {
        self.components = Arc::new(IndexMap::new());
        self.data_model.clear();
        self.root = None;
        self.is_ready = false;

        ::log::info!("[A2UI surface] Cleared {}", self.id);
        vec![ProcessorEvent::SurfaceDeleted(SurfaceDeletedEvent {
            surface_id: self.id.clone(),
        })]
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn apply_surface_update(&mut self, msg: &SurfaceUpdate) -> Vec<ProcessorEvent> {
        let components = Arc::make_mut(&mut self.components);
        let mut updated_ids = Vec::with_capacity(msg.components.len());

        for component in &msg.components {
            updated_ids.push(component.id.clone());
            components.insert(component.id.clone(), component.clone());
        }

        if let Some(root) = &msg.root {
            self.root = Some(root.clone());
        }

        // A root switched to an undefined id revokes readiness.
        if self.is_ready && !self.root_is_defined() {
            ::log::warn!(
                "[A2UI surface] {} root {:?} is no longer defined, surface not ready",
                self.id,
                self.root
            );
            self.is_ready = false;
        }

        vec![ProcessorEvent::SurfaceUpdated(SurfaceUpdatedEvent {
            surface_id: self.id.clone(),
            updated_components: updated_ids,
        })]
    }

    fn apply_data_model_update(&mut self, msg: &DataModelUpdate) -> Vec<ProcessorEvent> {
        let updated_paths = self.data_model.merge(&msg.data_model);

        vec![ProcessorEvent::DataModelUpdated(DataModelUpdatedEvent {
            surface_id: self.id.clone(),
            updated_paths,
        })]
    }

    fn apply_begin_rendering(&mut self, msg: &BeginRendering) -> Vec<ProcessorEvent> {
        let root = msg.root.as_ref().or(self.root.as_ref());

        match root {
            Some(root) if self.components.contains_key(root) => {
                let root = root.clone();
                self.root = Some(root.clone());
                self.is_ready = true;

                ::log::info!("[A2UI surface] {} ready at root {}", self.id, root);
                vec![ProcessorEvent::RenderingBegan(RenderingBeganEvent {
                    surface_id: self.id.clone(),
                    root,
                })]
            }
            _ => {
                let root = root.cloned();
                ::log::warn!(
                    "[A2UI surface] Rejected beginRendering for {}: root {:?} is not defined yet",
                    self.id,
                    root
                );
                vec![ProcessorEvent::RenderingRejected(RenderingRejectedEvent {
                    surface_id: self.id.clone(),
                    root,
                })]
            }
        }
    }

    fn root_is_defined(&self) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| self.components.contains_key(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: Value) -> A2uiMessage {
        A2uiMessage::from_value(value).unwrap()
    }

    fn s1_update() -> A2uiMessage {
        message(json!({
            "type": "surfaceUpdate",
            "surfaceId": "s1",
            "root": "root",
            "components": [
                {"id": "root", "component": {"Column": {"explicitList": ["t"]}}},
                {"id": "t", "component": {"Text": {"text": {"literalString": "Hi"}}}}
            ]
        }))
    }

    #[test]
    fn test_surface_update_never_sets_ready() {
        let mut surface = Surface::new("s1");
        assert_eq!(surface.state(), SurfaceState::Empty);

        surface.apply(&s1_update());
        assert_eq!(surface.state(), SurfaceState::Populated);
        assert_eq!(surface.root(), Some("root"));
        assert!(!surface.is_ready());
    }

    #[test]
    fn test_begin_rendering_requires_root() {
        let mut surface = Surface::new("s1");

        let events = surface.apply(&message(json!({"type": "beginRendering", "surfaceId": "s1", "root": "root"})));
        assert!(matches!(events[0], ProcessorEvent::RenderingRejected(_)));
        assert_eq!(surface.state(), SurfaceState::Empty);
        assert_eq!(surface.root(), None);

        surface.apply(&s1_update());
        let events = surface.apply(&message(json!({"type": "beginRendering", "surfaceId": "s1"})));
        assert!(matches!(&events[0], ProcessorEvent::RenderingBegan(e) if e.root == "root"));
        assert_eq!(surface.state(), SurfaceState::Ready);
    }

    #[test]
    fn test_surface_update_is_idempotent() {
        let mut once = Surface::new("s1");
        once.apply(&s1_update());

        let mut twice = Surface::new("s1");
        twice.apply(&s1_update());
        twice.apply(&s1_update());

        assert_eq!(once.components(), twice.components());
    }

    #[test]
    fn test_mismatched_surface_is_ignored() {
        let mut surface = Surface::new("other");
        let events = surface.apply(&s1_update());

        assert!(events.is_empty());
        assert_eq!(surface.state(), SurfaceState::Empty);
    }

    #[test]
    fn test_data_model_update_is_shallow() {
        let mut surface = Surface::new("s1");
        surface.apply(&message(json!({"type": "dataModelUpdate", "surfaceId": "s1", "dataModel": {"user": {"name": "Ada", "age": 36}}})));
        surface.apply(&message(json!({"type": "dataModelUpdate", "surfaceId": "s1", "dataModel": {"user": {"name": "Grace"}}})));

        assert_eq!(surface.data_model().as_value(), &json!({"user": {"name": "Grace"}}));
        assert_eq!(surface.state(), SurfaceState::Populated);
    }

    #[test]
    fn test_delete_resets_to_empty() {
        let mut surface = Surface::new("s1");
        surface.apply(&s1_update());
        surface.apply(&message(json!({"type": "beginRendering", "surfaceId": "s1"})));
        surface.update_data_model("/user/name", json!("Ada")).unwrap();

        surface.apply(&message(json!({"type": "deleteSurface", "surfaceId": "s1"})));
        assert_eq!(surface.state(), SurfaceState::Empty);
        assert!(surface.components().is_empty());
        assert!(!surface.data_model().has_pending());
    }

    #[test]
    fn test_root_switch_to_undefined_revokes_ready() {
        let mut surface = Surface::new("s1");
        surface.apply(&s1_update());
        surface.apply(&message(json!({"type": "beginRendering", "surfaceId": "s1"})));

        surface.apply(&message(json!({"type": "surfaceUpdate", "surfaceId": "s1", "root": "later", "components": []})));
        assert!(!surface.is_ready());
        assert_eq!(surface.state(), SurfaceState::Populated);
    }

    #[test]
    fn test_update_data_model_is_copy_on_write() {
        let mut surface = Surface::new("s1");
        let before = surface.data_model().snapshot();

        surface.update_data_model("/user/name", json!("Ada")).unwrap();
        assert_eq!(before.as_ref(), &json!({}));
        assert_eq!(surface.data_model().get_string("/user/name"), Some("Ada"));
        assert!(surface.data_model().is_pending("/user/name"));
    }
}
