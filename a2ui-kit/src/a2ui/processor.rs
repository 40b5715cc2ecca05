//! A2UI Engine
//!
//! Keeps the surface index, applies incoming A2UI messages in protocol order
//! and hands out render trees and user actions.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use super::binding::Resolver;
use super::codec;
use super::error::{A2uiError, Diagnostics, Result};
use super::message::*;
use super::registry::{Catalog, ComponentCatalog};
use super::surface::{Surface, SurfaceState};
use super::tree::RenderNode;

/// Event emitted when a surface is created
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCreatedEvent {
    pub surface_id: String,
}

/// Event emitted when a surface is updated
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceUpdatedEvent {
    pub surface_id: String,
    pub updated_components: Vec<String>,
}

/// Event emitted when a surface is cleared
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDeletedEvent {
    pub surface_id: String,
}

/// Event emitted when a cleared surface leaves the index
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePrunedEvent {
    pub surface_id: String,
}

/// Event emitted when data model is updated
#[derive(Debug, Clone, PartialEq)]
pub struct DataModelUpdatedEvent {
    pub surface_id: String,
    pub updated_paths: Vec<String>,
}

/// Event emitted when a surface becomes ready
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingBeganEvent {
    pub surface_id: String,
    pub root: String,
}

/// Event emitted when `beginRendering` arrives before its root is defined
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingRejectedEvent {
    pub surface_id: String,
    pub root: Option<String>,
}

/// Events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorEvent {
    SurfaceCreated(SurfaceCreatedEvent),
    SurfaceUpdated(SurfaceUpdatedEvent),
    SurfaceDeleted(SurfaceDeletedEvent),
    SurfacePruned(SurfacePrunedEvent),
    DataModelUpdated(DataModelUpdatedEvent),
    RenderingBegan(RenderingBeganEvent),
    RenderingRejected(RenderingRejectedEvent),
}

/// The A2UI engine.
///
/// Manages surfaces, component trees, and data models.
/// Processes incoming A2UI messages and emits events for UI updates.
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = A2uiEngine::with_standard_catalog();
///
/// let json = r#"[
///   {"type": "surfaceUpdate", "surfaceId": "main", "root": "t",
///    "components": [{"id": "t", "component": {"Text": {"text": "Hi"}}}]},
///   {"type": "beginRendering", "surfaceId": "main"}
/// ]"#;
/// engine.process_json(json)?;
///
/// let (tree, diagnostics) = engine.renderable_tree("main");
/// ```
#[derive(Debug)]
pub struct A2uiEngine<C: Catalog = ComponentCatalog> {
    /// Component catalog
    catalog: C,

    /// Surfaces by ID
    surfaces: HashMap<String, Surface>,

    /// Remove surfaces from the index once deleted
    prune_deleted: bool,
}

impl A2uiEngine<ComponentCatalog> {
    /// Create a new engine with the standard component catalog
    pub fn with_standard_catalog() -> Self {
        Self::new(ComponentCatalog::with_standard_catalog())
    }
}

impl<C: Catalog> A2uiEngine<C> {
    /// Create a new engine with the given component catalog
    pub fn new(catalog: C) -> Self {
        A2uiEngine {
            catalog,
            surfaces: HashMap::new(),
            prune_deleted: false,
        }
    }

    /// Drop surfaces from the index as soon as they are deleted.
    pub fn with_pruning(mut self, prune_deleted: bool) -> Self {
        self.prune_deleted = prune_deleted;
        self
    }

    /// Get the component catalog
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Get a surface by ID
    pub fn surface(&self, surface_id: &str) -> Option<&Surface> {
        self.surfaces.get(surface_id)
    }

    /// Get all surface IDs, sorted
    pub fn surface_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.surfaces.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn surface_state(&self, surface_id: &str) -> SurfaceState {
        self.surfaces
            .get(surface_id)
            .map_or(SurfaceState::Empty, Surface::state)
    }

    /// Apply one message to `surface_id`.
    ///
    /// A message addressed to a different surface is ignored. Surfaces are
    /// created on the first `surfaceUpdate` or `dataModelUpdate` naming them.
    pub fn apply_message(&mut self, surface_id: &str, message: &A2uiMessage) -> Vec<ProcessorEvent> {
        if message.surface_id() != surface_id {
            ::log::debug!(
                "[A2UI engine] Ignoring {} for {} while driving {}",
                message.type_name(),
                message.surface_id(),
                surface_id
            );
            return vec![];
        }

        let mut events = Vec::new();

        if !self.surfaces.contains_key(surface_id) {
            match message {
                A2uiMessage::SurfaceUpdate(_) | A2uiMessage::DataModelUpdate(_) => {
                    ::log::info!("[A2UI engine] Creating surface {}", surface_id);
                    self.surfaces
                        .insert(surface_id.to_string(), Surface::new(surface_id));
                    events.push(ProcessorEvent::SurfaceCreated(SurfaceCreatedEvent {
                        surface_id: surface_id.to_string(),
                    }));
                }
                A2uiMessage::BeginRendering(msg) => {
                    ::log::warn!(
                        "[A2UI engine] Rejected beginRendering for unseen surface {}",
                        surface_id
                    );
                    return vec![ProcessorEvent::RenderingRejected(RenderingRejectedEvent {
                        surface_id: surface_id.to_string(),
                        root: msg.root.clone(),
                    })];
                }
                _ => {
                    ::log::debug!(
                        "[A2UI engine] Ignoring {} for unseen surface {}",
                        message.type_name(),
                        surface_id
                    );
                    return vec![];
                }
            }
        }

        let Some(surface) = self.surfaces.get_mut(surface_id) else {
            return events;
        };
        events.extend(surface.apply(message));

        if self.prune_deleted && matches!(message, A2uiMessage::DeleteSurface(_)) {
            events.extend(self.prune_empty_surfaces());
        }

        events
    }

    /// Process a single A2UI message against the surface it names
    pub fn process_message(&mut self, message: &A2uiMessage) -> Vec<ProcessorEvent> {
        self.apply_message(message.surface_id(), message)
    }

    /// Process a batch of messages.
    ///
    /// Messages are grouped by surface and each group is applied in priority
    /// order, so a reordered burst still applies in protocol-legal order.
    pub fn process_messages(&mut self, messages: Vec<A2uiMessage>) -> Vec<ProcessorEvent> {
        let mut groups: IndexMap<String, Vec<A2uiMessage>> = IndexMap::new();
        for message in messages {
            groups
                .entry(message.surface_id().to_string())
                .or_default()
                .push(message);
        }

        let mut events = Vec::new();
        for (surface_id, mut batch) in groups {
            A2uiMessage::sort_by_priority(&mut batch);
            for message in &batch {
                events.extend(self.apply_message(&surface_id, message));
            }
        }
        events
    }

    /// Parse and process text holding A2UI messages.
    ///
    /// See [`parse_messages`] for the accepted shapes.
    pub fn process_json(&mut self, json: &str) -> Result<Vec<ProcessorEvent>> {
        let messages = parse_messages(json)?;
        Ok(self.process_messages(messages))
    }

    /// Render a ready surface.
    ///
    /// Returns `None` for unknown or not-ready surfaces. Recoverable failures
    /// met while rendering are returned alongside the tree.
    pub fn renderable_tree(&self, surface_id: &str) -> (Option<RenderNode>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tree = self
            .surfaces
            .get(surface_id)
            .and_then(|surface| surface.render_tree(&self.catalog, &mut diagnostics));
        (tree, diagnostics)
    }

    /// Write a value from a local input into a surface's data model.
    pub fn update_data_model(
        &mut self,
        surface_id: &str,
        path: &str,
        value: Value,
    ) -> Result<ProcessorEvent> {
        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or_else(|| A2uiError::UnknownSurface(surface_id.to_string()))?;
        surface.update_data_model(path, value)
    }

    /// Build the `userAction` for activating `component_id`.
    ///
    /// `scope` is the template instance the component was rendered in
    /// (e.g. `/products/0`), used for relative context paths. Buttons without
    /// an explicit action fall back to [`codec::default_button_action`].
    pub fn trigger_action(
        &self,
        surface_id: &str,
        component_id: &str,
        scope: Option<&str>,
    ) -> Result<UserActionMessage> {
        let surface = self
            .surfaces
            .get(surface_id)
            .ok_or_else(|| A2uiError::UnknownSurface(surface_id.to_string()))?;
        let def = surface.get_component(component_id).ok_or_else(|| {
            A2uiError::InvalidComponent(format!("{component_id} is not defined on {surface_id}"))
        })?;

        if !self.catalog.has(def.kind().name()) {
            return Err(A2uiError::UnknownComponentType(def.kind().name().to_string()));
        }

        let data = surface.data_model().as_value();
        let resolver = Resolver::scoped(data, scope);
        let mut diagnostics = Diagnostics::new();

        let action = match &def.props().action {
            Some(action) => action.clone(),
            None => codec::default_button_action(def, &resolver, data, &mut diagnostics)
                .ok_or_else(|| {
                    A2uiError::InvalidComponent(format!("{component_id} has no action"))
                })?,
        };

        let message = codec::build_user_action(
            &action.name,
            surface_id,
            component_id,
            action.context.as_ref(),
            &resolver,
            &mut diagnostics,
        );
        codec::validate_user_action(&message)?;
        Ok(message)
    }

    /// Remove every empty surface from the index.
    pub fn prune_empty_surfaces(&mut self) -> Vec<ProcessorEvent> {
        let empty: Vec<String> = self
            .surfaces
            .iter()
            .filter(|(_, surface)| surface.state() == SurfaceState::Empty)
            .map(|(id, _)| id.clone())
            .collect();

        empty
            .into_iter()
            .map(|surface_id| {
                self.surfaces.remove(&surface_id);
                ::log::debug!("[A2UI engine] Pruned surface {}", surface_id);
                ProcessorEvent::SurfacePruned(SurfacePrunedEvent { surface_id })
            })
            .collect()
    }
}

/// Parse text holding A2UI messages.
///
/// Accepts a JSON array, a single message object, or JSON lines. Elements of
/// an array and lines that fail to parse are skipped with a warning; a single
/// object that fails to parse is an error.
pub fn parse_messages(text: &str) -> Result<Vec<A2uiMessage>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(values)) => Ok(lenient(values.into_iter().enumerate())),
        Ok(value) => Ok(vec![A2uiMessage::from_value(value)?]),
        Err(err) => {
            let mut values = Vec::new();
            for (i, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(value) => values.push((i, value)),
                    Err(e) => ::log::warn!("[A2UI engine] Skipping line {}: {}", i + 1, e),
                }
            }
            if values.is_empty() {
                return Err(err.into());
            }
            Ok(lenient(values.into_iter()))
        }
    }
}

fn lenient(values: impl Iterator<Item = (usize, Value)>) -> Vec<A2uiMessage> {
    values
        .filter_map(|(i, value)| match A2uiMessage::from_value(value) {
            Ok(message) => Some(message),
            Err(e) => {
                ::log::warn!("[A2UI engine] Skipping message[{}]: {}", i, e);
                None
            }
        })
        .collect()
}
