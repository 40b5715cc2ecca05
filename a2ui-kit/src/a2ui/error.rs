//! A2UI Errors
//!
//! Typed failures for the engine boundary, plus the diagnostics collector
//! used on the render path where failures are reported instead of returned.

use serde_json::{Map, Value};
use thiserror::Error;

use super::message::{ErrorDetail, ErrorMessage};

/// Reported when a component names a type the catalog does not know.
pub const UNKNOWN_COMPONENT_TYPE: &str = "UNKNOWN_COMPONENT_TYPE";
/// Reported when a template's `dataPath` does not yield an array.
pub const TEMPLATE_RENDER_ERROR: &str = "TEMPLATE_RENDER_ERROR";
/// Reported when a path binding cannot be dereferenced.
pub const BINDING_RESOLUTION_ERROR: &str = "BINDING_RESOLUTION_ERROR";
/// Reported for a structurally invalid component definition.
pub const INVALID_COMPONENT: &str = "INVALID_COMPONENT";
/// Reported when a catalog-declared required prop is absent.
pub const MISSING_REQUIRED_PROP: &str = "MISSING_REQUIRED_PROP";
/// Reported when a component is reachable from itself.
pub const COMPONENT_CYCLE: &str = "COMPONENT_CYCLE";

#[derive(Debug, Error)]
pub enum A2uiError {
    #[error("Invalid JSON pointer {pointer:?}: {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("Path {0:?} does not resolve")]
    Unresolved(String),

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Unknown surface: {0}")]
    UnknownSurface(String),

    #[error("Unknown component type: {0}")]
    UnknownComponentType(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Turn {turn_id} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        turn_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Turn {0} is already in flight")]
    AlreadyInFlight(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, A2uiError>;

impl A2uiError {
    pub(crate) fn pointer(pointer: &str, reason: impl Into<String>) -> Self {
        A2uiError::InvalidPointer {
            pointer: pointer.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a retry of the same delivery could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            A2uiError::Transport(_) | A2uiError::Http(_) | A2uiError::Io(_)
        )
    }
}

/// Collects recoverable failures raised while resolving and expanding a tree.
///
/// Nothing on the render path returns an error: the offending prop or child is
/// defaulted or skipped and a structured report lands here instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    reports: Vec<ErrorDetail>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure with a stable error code.
    pub fn report(
        &mut self,
        code: &str,
        message: impl Into<String>,
        component_id: Option<&str>,
        context: Option<Map<String, Value>>,
    ) {
        let message = message.into();
        ::log::warn!("[A2UI] {}: {}", code, message);
        self.reports.push(ErrorDetail {
            message,
            code: Some(code.to_string()),
            component_id: component_id.map(str::to_string),
            context,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn reports(&self) -> &[ErrorDetail] {
        &self.reports
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.reports.iter().any(|r| r.code.as_deref() == Some(code))
    }

    /// Merge another collector's reports into this one.
    pub fn extend(&mut self, other: Diagnostics) {
        self.reports.extend(other.reports);
    }

    /// Turn every report into an outbound `error` envelope for `surface_id`.
    pub fn into_error_messages(self, surface_id: &str) -> Vec<ErrorMessage> {
        self.reports
            .into_iter()
            .map(|error| ErrorMessage {
                surface_id: surface_id.to_string(),
                error,
            })
            .collect()
    }
}
