//! # Description
//!
//! A2UI Kit is a Rust crate implementing the client side of the A2UI
//! (Agent-to-UI) surface protocol: agents stream declarative component
//! trees and data, the kit keeps per-surface state and produces render trees
//! for any renderer to draw.
//!
//! # Features
//!
//! - Surface state machine driven by `surfaceUpdate`, `dataModelUpdate`,
//!   `beginRendering` and `deleteSurface`.
//! - JSON Pointer bindings with template expansion over data arrays.
//! - Validated `userAction` and `error` envelopes back to the agent.
//! - Conversation routing of protocol messages to turns.
//! - AG-UI transport over SSE with retry and a pending queue.

pub mod a2ui;
