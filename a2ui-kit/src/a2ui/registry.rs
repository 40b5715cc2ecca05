//! A2UI Component Catalog
//!
//! Describes which component types a renderer supports, how many children
//! each accepts and which props they declare.

use std::collections::HashMap;

use super::error::{Diagnostics, INVALID_COMPONENT, MISSING_REQUIRED_PROP};
use super::message::{ComponentDefinition, ComponentKind};

/// How many children a component type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    None,
    Single,
    Multiple,
}

/// Declared shape of a prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Literal or path-bound
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropSpec {
    pub name: &'static str,
    pub kind: PropKind,
    pub required: bool,
}

impl PropSpec {
    const fn optional(name: &'static str, kind: PropKind) -> Self {
        PropSpec { name, kind, required: false }
    }

    const fn required(name: &'static str, kind: PropKind) -> Self {
        PropSpec { name, kind, required: true }
    }
}

/// Catalog information for a component type
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The component type
    pub kind: ComponentKind,

    /// Accepted children
    pub children: ChildPolicy,

    /// Declared props
    pub props: Vec<PropSpec>,

    /// Description of the component
    pub description: &'static str,
}

/// Capability lookup by component type name.
///
/// The engine only needs to know whether a type can be rendered. Hosts with
/// their own renderer set implement this to plug it in.
pub trait Catalog {
    fn has(&self, type_name: &str) -> bool;

    fn get(&self, type_name: &str) -> Option<&CatalogEntry>;

    /// Check a definition against its catalog entry.
    ///
    /// Missing required props and children on a childless type are reported
    /// but never block rendering. Returns whether the definition was clean.
    fn validate(&self, def: &ComponentDefinition, diagnostics: &mut Diagnostics) -> bool {
        let Some(entry) = self.get(def.kind().name()) else {
            return false;
        };

        let mut clean = true;
        for spec in entry.props.iter().filter(|p| p.required) {
            if def.props().get(spec.name).is_none() {
                clean = false;
                diagnostics.report(
                    MISSING_REQUIRED_PROP,
                    format!("{} {} is missing required prop {}", entry.kind.name(), def.id, spec.name),
                    Some(&def.id),
                    None,
                );
            }
        }

        let declared_children = def.props().has_children() || def.template.is_some();
        if entry.children == ChildPolicy::None && declared_children {
            clean = false;
            diagnostics.report(
                INVALID_COMPONENT,
                format!("{} {} does not accept children", entry.kind.name(), def.id),
                Some(&def.id),
                None,
            );
        }

        clean
    }
}

/// Registry of supported component types.
///
/// # Example
///
/// ```rust,ignore
/// let catalog = ComponentCatalog::with_standard_catalog();
///
/// if let Some(entry) = catalog.get("Button") {
///     println!("Button accepts {:?} children", entry.children);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl ComponentCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the standard A2UI component set
    pub fn with_standard_catalog() -> Self {
        use PropKind::*;

        let mut catalog = Self::new();

        // Layout components
        catalog.register(CatalogEntry {
            kind: ComponentKind::Column,
            children: ChildPolicy::Multiple,
            props: vec![PropSpec::optional("gap", Dynamic)],
            description: "Vertical layout container",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Row,
            children: ChildPolicy::Multiple,
            props: vec![PropSpec::optional("gap", Dynamic)],
            description: "Horizontal layout container",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::List,
            children: ChildPolicy::Multiple,
            props: vec![],
            description: "List of static or templated rows",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Card,
            children: ChildPolicy::Multiple,
            props: vec![PropSpec::optional("title", Dynamic)],
            description: "Card container",
        });

        // Display components
        catalog.register(CatalogEntry {
            kind: ComponentKind::Text,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::required("text", Dynamic),
                PropSpec::optional("usageHint", String),
            ],
            description: "Text display with usage hints",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Image,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("url", Dynamic),
                PropSpec::optional("alt", Dynamic),
                PropSpec::optional("width", Number),
                PropSpec::optional("height", Number),
            ],
            description: "Image display",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Link,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("text", Dynamic),
                PropSpec::optional("href", Dynamic),
                PropSpec::optional("target", String),
            ],
            description: "Hyperlink",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Badge,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("text", Dynamic),
                PropSpec::optional("variant", String),
            ],
            description: "Small status label",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Divider,
            children: ChildPolicy::None,
            props: vec![PropSpec::optional("orientation", String)],
            description: "Visual separator",
        });

        // Interactive components
        catalog.register(CatalogEntry {
            kind: ComponentKind::Button,
            children: ChildPolicy::Multiple,
            props: vec![
                PropSpec::optional("text", Dynamic),
                PropSpec::optional("action", Object),
            ],
            description: "Clickable button with action",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::TextField,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("value", Dynamic),
                PropSpec::optional("label", Dynamic),
                PropSpec::optional("placeholder", Dynamic),
                PropSpec::optional("name", String),
            ],
            description: "Single-line text input with two-way binding",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::TextArea,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("value", Dynamic),
                PropSpec::optional("label", Dynamic),
                PropSpec::optional("placeholder", Dynamic),
                PropSpec::optional("rows", Number),
            ],
            description: "Multi-line text input with two-way binding",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Checkbox,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("checked", Dynamic),
                PropSpec::optional("label", Dynamic),
            ],
            description: "Boolean toggle",
        });
        catalog.register(CatalogEntry {
            kind: ComponentKind::Select,
            children: ChildPolicy::None,
            props: vec![
                PropSpec::optional("value", Dynamic),
                PropSpec::optional("label", Dynamic),
                PropSpec::required("options", Array),
            ],
            description: "Selection from a list of options",
        });

        catalog
    }

    /// Register a component type
    pub fn register(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.kind.name().to_string(), entry);
    }

    /// Get all registered entries
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

impl Catalog for ComponentCatalog {
    fn has(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    fn get(&self, type_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2ui::message::ComponentProps;
    use crate::a2ui::value::PropValue;

    #[test]
    fn test_standard_catalog() {
        let catalog = ComponentCatalog::with_standard_catalog();

        for kind in ComponentKind::all() {
            assert!(catalog.has(kind.name()), "Missing entry for {:?}", kind);
        }
        assert!(!catalog.has("Carousel"));
    }

    #[test]
    fn test_get_entry() {
        let catalog = ComponentCatalog::with_standard_catalog();

        let entry = catalog.get("Text").unwrap();
        assert_eq!(entry.kind, ComponentKind::Text);
        assert_eq!(entry.children, ChildPolicy::None);
    }

    #[test]
    fn test_validate_required_prop() {
        let catalog = ComponentCatalog::with_standard_catalog();
        let mut diagnostics = Diagnostics::new();

        let bare = ComponentDefinition::new("t", ComponentKind::Text, ComponentProps::default());
        assert!(!catalog.validate(&bare, &mut diagnostics));
        assert!(diagnostics.has_code(MISSING_REQUIRED_PROP));

        let mut diagnostics = Diagnostics::new();
        let ok = ComponentDefinition::new(
            "t",
            ComponentKind::Text,
            ComponentProps::default().with_prop("text", PropValue::literal("Hi")),
        );
        assert!(catalog.validate(&ok, &mut diagnostics));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_child_policy() {
        let catalog = ComponentCatalog::with_standard_catalog();
        let mut diagnostics = Diagnostics::new();

        let divider = ComponentDefinition::new(
            "d",
            ComponentKind::Divider,
            ComponentProps::default().with_children(["x"]),
        );
        assert!(!catalog.validate(&divider, &mut diagnostics));
        assert!(diagnostics.has_code(INVALID_COMPONENT));
    }
}
