//! AG-UI HTTP Transport
//!
//! Runs an agent over the AG-UI protocol: every turn is POSTed as a
//! `RunAgentInput` and the agent answers with an SSE stream of AG-UI events.
//! A2UI messages travel inside `TOOL_CALL_RESULT` events as
//! `{"message": <A2UI message>}`.

use std::sync::{Mutex, PoisonError};

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;

use super::error::{A2uiError, Result};
use super::message::{A2uiMessage, BeginRendering};
use super::sse::sse_data_stream;
use super::transport::{DuplexTransport, OutboundTurn, TransportEvent};

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunAgentInput {
    thread_id: String,
    run_id: String,
    state: Value,
    messages: Vec<AguiMessage>,
    tools: Vec<Value>,
    context: Vec<Value>,
    forwarded_props: Value,
}

#[derive(Debug, Clone, Serialize)]
struct AguiMessage {
    id: String,
    role: String,
    content: String,
}

// ============================================================================
// Event decoding
// ============================================================================

/// Turns AG-UI event payloads of one run into [`TransportEvent`]s.
#[derive(Debug, Clone)]
pub struct AguiDecoder {
    /// Follow every `surfaceUpdate` with a `beginRendering` for its root
    auto_begin_rendering: bool,
    default_surface_id: String,
    text: String,
}

impl AguiDecoder {
    pub fn new(auto_begin_rendering: bool, default_surface_id: impl Into<String>) -> Self {
        AguiDecoder {
            auto_begin_rendering,
            default_surface_id: default_surface_id.into(),
            text: String::new(),
        }
    }

    /// Decode one SSE `data:` payload.
    ///
    /// Payloads that are not JSON, and tool results without an A2UI message,
    /// are logged and skipped. `RUN_ERROR` becomes an `Err`.
    pub fn decode(&mut self, payload: &str) -> Vec<Result<TransportEvent>> {
        let event: Value = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                ::log::warn!("[A2UI AG-UI] Skipping malformed event: {}", e);
                return vec![];
            }
        };
        self.decode_event(&event)
    }

    pub fn decode_event(&mut self, event: &Value) -> Vec<Result<TransportEvent>> {
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
        ::log::debug!("[A2UI AG-UI] Event {}", event_type);

        match event_type {
            "RUN_STARTED" => {
                self.text.clear();
                vec![]
            }
            "TEXT_MESSAGE_CONTENT" | "TEXT_MESSAGE_CHUNK" => {
                match event.get("delta").and_then(Value::as_str) {
                    Some(delta) if !delta.is_empty() => {
                        self.text.push_str(delta);
                        vec![Ok(TransportEvent::TextDelta(self.text.clone()))]
                    }
                    _ => vec![],
                }
            }
            "TOOL_CALL_RESULT" => self.decode_tool_result(event),
            "RUN_ERROR" => {
                let message = event
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("agent run failed");
                vec![Err(A2uiError::Transport(message.to_string()))]
            }
            "RUN_FINISHED" => vec![Ok(TransportEvent::Completed)],
            _ => vec![],
        }
    }

    fn decode_tool_result(&self, event: &Value) -> Vec<Result<TransportEvent>> {
        let content = match event.get("content") {
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(content) => content,
                Err(e) => {
                    ::log::warn!("[A2UI AG-UI] Tool result is not JSON: {}", e);
                    return vec![];
                }
            },
            Some(content) => content.clone(),
            None => Value::Null,
        };

        let Some(raw) = content.get("message") else {
            ::log::warn!("[A2UI AG-UI] Tool result does not carry an A2UI message");
            return vec![];
        };

        let message = match A2uiMessage::from_value(raw.clone()) {
            Ok(message) => message,
            Err(e) => {
                ::log::warn!("[A2UI AG-UI] Dropping invalid A2UI message: {}", e);
                return vec![];
            }
        };

        let begin = match &message {
            A2uiMessage::SurfaceUpdate(update) if self.auto_begin_rendering => {
                let surface_id = if update.surface_id.is_empty() {
                    self.default_surface_id.clone()
                } else {
                    update.surface_id.clone()
                };
                Some(A2uiMessage::BeginRendering(BeginRendering {
                    surface_id,
                    root: update.root.clone(),
                }))
            }
            _ => None,
        };

        let mut events = vec![Ok(TransportEvent::Message(message))];
        if let Some(begin) = begin {
            events.push(Ok(TransportEvent::Message(begin)));
        }
        events
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

/// AG-UI agent reached over HTTP.
///
/// The transport keeps one thread id and the history of user turns, which is
/// sent with every run.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    thread_id: String,
    auto_begin_rendering: bool,
    default_surface_id: String,
    history: Mutex<Vec<AguiMessage>>,
}

impl HttpTransport {
    pub fn new(endpoint: Url) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            endpoint,
            thread_id: Uuid::new_v4().to_string(),
            auto_begin_rendering: true,
            default_surface_id: "main".to_string(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Endpoint of a named agent below a server base URL, e.g.
    /// `http://localhost:4111/agents/a2uiAgent/run`.
    pub fn for_agent(base: &Url, agent_id: &str) -> Result<Self> {
        let endpoint = base
            .join(&format!("agents/{}/run", agent_id))
            .map_err(|e| A2uiError::Config(format!("invalid agent endpoint: {}", e)))?;
        Ok(Self::new(endpoint))
    }

    pub fn with_auto_begin_rendering(mut self, enabled: bool) -> Self {
        self.auto_begin_rendering = enabled;
        self
    }

    pub fn with_default_surface_id(mut self, surface_id: impl Into<String>) -> Self {
        self.default_surface_id = surface_id.into();
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn run_input(&self, turn: &OutboundTurn) -> RunAgentInput {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        // A retried turn is already part of the history.
        if !history.iter().any(|m| m.id == turn.id) {
            history.push(AguiMessage {
                id: turn.id.clone(),
                role: "user".to_string(),
                content: turn.content.clone(),
            });
        }

        RunAgentInput {
            thread_id: self.thread_id.clone(),
            run_id: Uuid::new_v4().to_string(),
            state: json!({}),
            messages: history.clone(),
            tools: vec![],
            context: vec![],
            forwarded_props: json!({}),
        }
    }
}

impl DuplexTransport for HttpTransport {
    fn send_turn(&self, turn: &OutboundTurn) -> BoxStream<'static, Result<TransportEvent>> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .header("Accept", "text/event-stream")
            .json(&self.run_input(turn));
        let mut decoder = AguiDecoder::new(self.auto_begin_rendering, self.default_surface_id.clone());

        ::log::info!("[A2UI AG-UI] POST {} (turn {})", self.endpoint, turn.id);

        Box::pin(async_stream::stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(A2uiError::from(e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                yield Err(A2uiError::Transport(format!("agent returned status {}: {}", status, body)));
                return;
            }

            let mut payloads = sse_data_stream(response.bytes_stream());
            while let Some(payload) = payloads.next().await {
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for event in decoder.decode(&payload) {
                    let failed = event.is_err();
                    yield event;
                    if failed {
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_result(content: Value) -> Value {
        json!({"type": "TOOL_CALL_RESULT", "toolCallId": "call-1", "content": content})
    }

    fn ok_events(events: Vec<Result<TransportEvent>>) -> Vec<TransportEvent> {
        events.into_iter().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn test_text_deltas_accumulate_per_run() {
        let mut decoder = AguiDecoder::new(true, "main");

        decoder.decode_event(&json!({"type": "TEXT_MESSAGE_CONTENT", "delta": "Hel"}));
        let events = ok_events(decoder.decode_event(&json!({"type": "TEXT_MESSAGE_CHUNK", "delta": "lo"})));
        assert_eq!(events, vec![TransportEvent::TextDelta("Hello".into())]);

        decoder.decode_event(&json!({"type": "RUN_STARTED"}));
        let events = ok_events(decoder.decode_event(&json!({"type": "TEXT_MESSAGE_CONTENT", "delta": "Hi"})));
        assert_eq!(events, vec![TransportEvent::TextDelta("Hi".into())]);
    }

    #[test]
    fn test_tool_result_string_and_object_content() {
        let mut decoder = AguiDecoder::new(false, "main");
        let message = json!({"type": "deleteSurface", "surfaceId": "s1"});

        let from_string = ok_events(decoder.decode_event(&tool_result(json!(json!({"message": message}).to_string()))));
        let from_object = ok_events(decoder.decode_event(&tool_result(json!({"message": message}))));

        assert_eq!(from_string, from_object);
        assert!(matches!(&from_string[0], TransportEvent::Message(A2uiMessage::DeleteSurface(d)) if d.surface_id == "s1"));
    }

    #[test]
    fn test_surface_update_triggers_begin_rendering() {
        let mut decoder = AguiDecoder::new(true, "main");
        let update = json!({
            "type": "surfaceUpdate",
            "surfaceId": "s1",
            "root": "root",
            "components": [{"id": "root", "component": {"Text": {"text": {"literalString": "Hi"}}}}]
        });

        let events = ok_events(decoder.decode_event(&tool_result(json!({"message": update}))));
        assert_eq!(events.len(), 2);
        match &events[1] {
            TransportEvent::Message(A2uiMessage::BeginRendering(begin)) => {
                assert_eq!(begin.surface_id, "s1");
                assert_eq!(begin.root.as_deref(), Some("root"));
            }
            other => panic!("expected beginRendering, got {:?}", other),
        }
    }

    #[test]
    fn test_run_error_and_malformed_payloads() {
        let mut decoder = AguiDecoder::new(true, "main");

        assert!(decoder.decode("not json").is_empty());
        assert!(decoder.decode_event(&tool_result(json!({"other": 1}))).is_empty());
        assert!(decoder.decode_event(&json!({"type": "STATE_SNAPSHOT", "snapshot": {}})).is_empty());

        let events = decoder.decode_event(&json!({"type": "RUN_ERROR", "message": "model overloaded"}));
        assert!(matches!(&events[0], Err(A2uiError::Transport(m)) if m == "model overloaded"));

        let events = ok_events(decoder.decode(r#"{"type":"RUN_FINISHED"}"#));
        assert_eq!(events, vec![TransportEvent::Completed]);
    }

    #[test]
    fn test_run_input_keeps_history_without_duplicates() {
        let base = Url::parse("http://localhost:4111/").unwrap();
        let transport = HttpTransport::for_agent(&base, "a2uiAgent").unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://localhost:4111/agents/a2uiAgent/run");

        let first = OutboundTurn::from_prompt("hello");
        transport.run_input(&first);
        transport.run_input(&first);
        let input = transport.run_input(&OutboundTurn::from_prompt("again"));

        assert_eq!(input.messages.len(), 2);
        let body = serde_json::to_value(&input).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("forwardedProps").is_some());
        assert_eq!(body["threadId"], transport.thread_id);
    }
}
