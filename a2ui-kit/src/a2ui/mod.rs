//! A2UI Protocol Engine
//!
//! A2UI (Agent-to-UI) is a declarative JSON protocol for AI agents to generate
//! rich, interactive UIs. This module keeps the client side of the protocol:
//! surfaces, their data models and the trees renderers draw from them.
//!
//! # Architecture
//!
//! ```text
//! Agent (AG-UI over SSE)
//!        ↓
//! ResilientSender ── retry / pending queue
//!        ↓
//! ConversationContext ── routes messages to turns
//!        ↓
//! A2uiEngine
//!        ↓
//! ┌──────┴──────┐
//! │             │
//! DataModel  Components
//!    │             │
//!    └──────┬──────┘
//!           ↓
//!     TreeRenderer → RenderNode
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use a2ui_kit::a2ui::*;
//!
//! let mut engine = A2uiEngine::with_standard_catalog();
//! engine.process_json(r#"[
//!     {"type": "surfaceUpdate", "surfaceId": "main", "root": "root",
//!      "components": [{"id": "root", "component": {"Text": {"text": {"literalString": "Hi"}}}}]},
//!     {"type": "beginRendering", "surfaceId": "main"}
//! ]"#)?;
//!
//! let (tree, diagnostics) = engine.renderable_tree("main");
//! ```

mod agui;
mod binding;
pub mod codec;
mod config;
mod data_model;
mod error;
mod host;
mod message;
pub mod pointer;
mod processor;
mod registry;
mod router;
mod sse;
mod surface;
mod transport;
mod tree;
mod value;

pub use agui::*;
pub use binding::*;
pub use config::*;
pub use data_model::*;
pub use error::*;
pub use host::*;
pub use message::*;
pub use processor::*;
pub use registry::*;
pub use router::*;
pub use sse::*;
pub use surface::*;
pub use transport::*;
pub use tree::*;
pub use value::*;
