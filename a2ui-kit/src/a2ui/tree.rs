//! A2UI Tree Expander
//!
//! Walks a surface's component adjacency list from its root and produces a
//! resolved render tree. Children come from `explicitList`, a single `child`,
//! and the component's `template`, in that order.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::binding::Resolver;
use super::error::{COMPONENT_CYCLE, Diagnostics, TEMPLATE_RENDER_ERROR, UNKNOWN_COMPONENT_TYPE};
use super::message::{ActionDefinition, ComponentDefinition, ComponentKind};
use super::registry::{Catalog, ComponentCatalog};

/// One child to render, as produced by [`expand_children`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSlot<'a> {
    /// Child component ID
    pub id: &'a str,

    /// Binding scope of the template instance (e.g. `/products/2`)
    pub scope: Option<String>,

    /// Index of the template instance
    pub instance: Option<usize>,
}

/// A resolved node of the render tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum RenderNode {
    Component(RenderedComponent),

    /// Placeholder for a type the catalog cannot render
    #[serde(rename_all = "camelCase")]
    Unknown { id: String, type_name: String },
}

impl RenderNode {
    pub fn id(&self) -> &str {
        match self {
            RenderNode::Component(c) => &c.id,
            RenderNode::Unknown { id, .. } => id,
        }
    }

    pub fn children(&self) -> &[RenderNode] {
        match self {
            RenderNode::Component(c) => &c.children,
            RenderNode::Unknown { .. } => &[],
        }
    }

    pub fn as_component(&self) -> Option<&RenderedComponent> {
        match self {
            RenderNode::Component(c) => Some(c),
            RenderNode::Unknown { .. } => None,
        }
    }

    /// Depth-first search by component ID.
    pub fn find(&self, id: &str) -> Option<&RenderNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }
}

/// A component with its props resolved against the data model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedComponent {
    pub id: String,

    pub type_name: String,

    /// Resolved props, structural keys excluded
    pub props: Map<String, Value>,

    /// Absolute pointer written back by form inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDefinition>,

    /// Template scope this node was rendered in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<usize>,

    pub children: Vec<RenderNode>,
}

/// Expand the children of `def` in render order.
///
/// `render_one` is called per child slot and may return `None` to skip it,
/// which is how ids that are not (yet) defined drop out. A template whose
/// `dataPath` does not resolve to an array is skipped and reported.
pub fn expand_children<'d, F>(
    def: &'d ComponentDefinition,
    resolver: &Resolver<'_>,
    diagnostics: &mut Diagnostics,
    mut render_one: F,
) -> Vec<RenderNode>
where
    F: FnMut(ChildSlot<'d>, &mut Diagnostics) -> Option<RenderNode>,
{
    let mut children = Vec::new();
    let props = def.props();
    let inherited = || resolver.scope().map(str::to_string);

    let explicit = props.explicit_list.as_deref().unwrap_or_default();
    for id in explicit {
        let slot = ChildSlot { id, scope: inherited(), instance: None };
        children.extend(render_one(slot, diagnostics));
    }

    if explicit.is_empty() {
        if let Some(id) = &props.child {
            let slot = ChildSlot { id, scope: inherited(), instance: None };
            children.extend(render_one(slot, diagnostics));
        }
    }

    let Some(template) = &def.template else {
        return children;
    };

    let Some(data_path) = &template.data_path else {
        for id in &template.children {
            let slot = ChildSlot { id, scope: inherited(), instance: None };
            children.extend(render_one(slot, diagnostics));
        }
        return children;
    };

    let base = resolver.absolute_path(data_path);
    let items = match resolver.lookup(data_path) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            report_template(diagnostics, def, data_path, format!("expected an array, found {}", type_name(other)));
            return children;
        }
        Err(err) => {
            report_template(diagnostics, def, data_path, err.to_string());
            return children;
        }
    };

    for index in 0..items.len() {
        let scope = format!("{}/{}", base.trim_end_matches('/'), index);
        for id in &template.children {
            let slot = ChildSlot { id, scope: Some(scope.clone()), instance: Some(index) };
            children.extend(render_one(slot, diagnostics));
        }
    }

    children
}

fn report_template(diagnostics: &mut Diagnostics, def: &ComponentDefinition, data_path: &str, reason: String) {
    let mut context = Map::new();
    context.insert("dataPath".into(), Value::String(data_path.to_string()));
    diagnostics.report(
        TEMPLATE_RENDER_ERROR,
        format!("Failed to render template: {reason}"),
        Some(&def.id),
        Some(context),
    );
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a component map into a [`RenderNode`] tree.
pub struct TreeRenderer<'a, C: Catalog + ?Sized = ComponentCatalog> {
    components: &'a IndexMap<String, ComponentDefinition>,
    data: &'a Value,
    catalog: &'a C,
}

impl<'a, C: Catalog + ?Sized> TreeRenderer<'a, C> {
    pub fn new(
        components: &'a IndexMap<String, ComponentDefinition>,
        data: &'a Value,
        catalog: &'a C,
    ) -> Self {
        TreeRenderer { components, data, catalog }
    }

    /// Render from `root`. Returns `None` when `root` is not defined.
    pub fn render(&self, root: &str, diagnostics: &mut Diagnostics) -> Option<RenderNode> {
        let mut ancestors = Vec::new();
        self.render_node(ChildSlot { id: root, scope: None, instance: None }, &mut ancestors, diagnostics)
    }

    fn render_node(
        &self,
        slot: ChildSlot<'_>,
        ancestors: &mut Vec<String>,
        diagnostics: &mut Diagnostics,
    ) -> Option<RenderNode> {
        let Some(def) = self.components.get(slot.id) else {
            ::log::debug!("[A2UI tree] Skipping undefined component {}", slot.id);
            return None;
        };

        if ancestors.iter().any(|a| a == &def.id) {
            diagnostics.report(
                COMPONENT_CYCLE,
                format!("Component {} is its own ancestor", def.id),
                Some(&def.id),
                None,
            );
            return None;
        }

        let type_name = def.kind().name();
        if !self.catalog.has(type_name) {
            let mut context = Map::new();
            context.insert("type".into(), Value::String(type_name.to_string()));
            diagnostics.report(
                UNKNOWN_COMPONENT_TYPE,
                format!("Unknown component type: {type_name}"),
                Some(&def.id),
                Some(context),
            );
            return Some(RenderNode::Unknown {
                id: def.id.clone(),
                type_name: type_name.to_string(),
            });
        }

        self.catalog.validate(def, diagnostics);

        let resolver = Resolver::scoped(self.data, slot.scope.as_deref());
        let props = def.props();

        let skip_text = *def.kind() == ComponentKind::Button && props.has_children();
        let resolved = resolver.resolve_map(
            props.extra.iter().filter(|(key, _)| !(skip_text && key.as_str() == "text")),
            diagnostics,
        );

        let value_path = def
            .kind()
            .value_prop()
            .and_then(|key| props.get(key))
            .and_then(|value| value.as_path())
            .map(|path| resolver.absolute_path(path));

        ancestors.push(def.id.clone());
        let children = expand_children(def, &resolver, diagnostics, |child, diagnostics| {
            self.render_node(child, ancestors, diagnostics)
        });
        ancestors.pop();

        Some(RenderNode::Component(RenderedComponent {
            id: def.id.clone(),
            type_name: type_name.to_string(),
            props: resolved,
            value_path,
            action: props.action.clone(),
            scope: slot.scope,
            instance: slot.instance,
            children,
        }))
    }
}
