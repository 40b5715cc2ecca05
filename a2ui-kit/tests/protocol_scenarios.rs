use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use a2ui_kit::a2ui::*;
use futures::stream::BoxStream;
use serde_json::{Value, json};

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

fn s1_begin() -> A2uiMessage {
    message(json!({"type": "beginRendering", "surfaceId": "s1", "root": "root"}))
}

fn s1_delete() -> A2uiMessage {
    message(json!({"type": "deleteSurface", "surfaceId": "s1"}))
}

#[test]
fn test_column_with_text_renders_after_begin() {
    let mut engine = A2uiEngine::with_standard_catalog();
    engine.process_message(&s1_update());
    engine.process_message(&s1_begin());

    assert_eq!(engine.surface_state("s1"), SurfaceState::Ready);

    let (tree, diagnostics) = engine.renderable_tree("s1");
    let tree = tree.unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(tree.id(), "root");
    assert_eq!(tree.children().len(), 1);

    let text = tree.children()[0].as_component().unwrap();
    assert_eq!(text.id, "t");
    assert_eq!(text.props["text"], json!("Hi"));
}

#[test]
fn test_delete_after_render_empties_surface() {
    let mut engine = A2uiEngine::with_standard_catalog();
    engine.process_messages(vec![s1_update(), s1_begin()]);
    engine.process_message(&s1_delete());

    let surface = engine.surface("s1").unwrap();
    assert!(!surface.is_ready());
    assert!(surface.components().is_empty());
    assert_eq!(engine.renderable_tree("s1").0, None);
}

#[test]
fn test_scrambled_burst_applies_delete_last() {
    let mut context = ConversationContext::new();
    context.push_user_turn("build it");

    let turn = context.receive(s1_update()).unwrap();
    for msg in [s1_begin(), s1_delete()] {
        context.receive(msg);
    }

    // The scrambled arrival order is restored by the per-surface batches.
    let mut scrambled = ConversationContext::new();
    scrambled.push_user_turn("build it");
    let scrambled_turn = scrambled.receive(s1_update()).unwrap();
    scrambled.record(&scrambled_turn, s1_delete());
    scrambled.record(&scrambled_turn, s1_begin());

    let mut sorted_engine = A2uiEngine::with_standard_catalog();
    for (_, batch) in context.surface_batches(&turn) {
        sorted_engine.process_messages(batch);
    }

    let mut scrambled_engine = A2uiEngine::with_standard_catalog();
    for (_, batch) in scrambled.surface_batches(&scrambled_turn) {
        scrambled_engine.process_messages(batch);
    }

    assert_eq!(sorted_engine.surface_state("s1"), SurfaceState::Empty);
    assert_eq!(scrambled_engine.surface_state("s1"), SurfaceState::Empty);

    let mut direct = A2uiEngine::with_standard_catalog();
    direct.process_messages(vec![s1_delete(), s1_update(), s1_begin()]);
    assert_eq!(direct.surface_state("s1"), SurfaceState::Empty);
}

#[test]
fn test_begin_before_root_is_defined_never_readies() {
    let mut engine = A2uiEngine::with_standard_catalog();

    engine.process_message(&s1_begin());
    assert_eq!(engine.surface_state("s1"), SurfaceState::Empty);

    engine.process_message(&message(json!({
        "type": "surfaceUpdate",
        "surfaceId": "s1",
        "components": [{"id": "other", "component": {"Text": {"text": {"literalString": "x"}}}}]
    })));
    let events = engine.process_message(&s1_begin());
    assert!(matches!(events[0], ProcessorEvent::RenderingRejected(_)));
    assert_eq!(engine.surface_state("s1"), SurfaceState::Populated);
}

#[test]
fn test_local_write_resolves_through_binding() {
    let mut engine = A2uiEngine::with_standard_catalog();
    engine.process_message(&s1_update());

    engine.update_data_model("s1", "/user/name", json!("Ada")).unwrap();

    let data = engine.surface("s1").unwrap().data_model().as_value();
    let mut diagnostics = Diagnostics::new();
    assert_eq!(
        resolve(&PropValue::path("/user/name"), data, &mut diagnostics),
        json!("Ada")
    );
    assert!(diagnostics.is_empty());

    assert!(matches!(
        engine.update_data_model("missing", "/x", json!(1)),
        Err(A2uiError::UnknownSurface(_))
    ));
}

#[test]
fn test_template_renders_one_row_per_item() {
    let mut engine = A2uiEngine::with_standard_catalog();
    engine.process_messages(vec![
        message(json!({
            "type": "surfaceUpdate",
            "surfaceId": "shop",
            "root": "list",
            "components": [
                {"id": "list", "component": {"List": {}}, "template": {"children": ["row"], "dataPath": "/products"}},
                {"id": "row", "component": {"Text": {"text": {"path": "name"}}}}
            ]
        })),
        message(json!({
            "type": "dataModelUpdate",
            "surfaceId": "shop",
            "dataModel": {"products": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}
        })),
        message(json!({"type": "beginRendering", "surfaceId": "shop"})),
    ]);

    let (tree, diagnostics) = engine.renderable_tree("shop");
    let tree = tree.unwrap();
    assert!(diagnostics.is_empty());

    let rows: Vec<&RenderedComponent> = tree
        .children()
        .iter()
        .filter_map(RenderNode::as_component)
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.id == "row"));
    assert_eq!(rows[2].props["text"], json!("C"));
    assert_eq!(rows[2].scope.as_deref(), Some("/products/2"));
}

/// Counts deliveries; every delivery succeeds immediately.
struct CountingTransport {
    calls: AtomicU32,
}

impl DuplexTransport for CountingTransport {
    fn send_turn(&self, _turn: &OutboundTurn) -> BoxStream<'static, a2ui_kit::a2ui::Result<TransportEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::stream::iter(vec![Ok(TransportEvent::Completed)]))
    }
}

fn action(name: &str) -> A2uiMessage {
    A2uiMessage::UserAction(UserActionMessage {
        name: name.into(),
        surface_id: "s1".into(),
        source_component_id: "x".into(),
        timestamp: "2024-01-01T00:00:00Z".into(),
        context: None,
    })
}

#[tokio::test]
async fn test_invalid_action_never_reaches_transport() {
    let transport = Arc::new(CountingTransport {
        calls: AtomicU32::new(0),
    });
    let sender = ResilientSender::new(transport.clone(), RetryOptions::default());

    let result = OutboundTurn::from_message(&action(""));
    assert!(matches!(result, Err(A2uiError::InvalidEnvelope(_))));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

    let turn = OutboundTurn::from_message(&action("submit")).unwrap();
    sender.send(turn, |_| {}).await.unwrap();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delete_routes_to_turn_in_generated_surface_id() {
    let mut context = ConversationContext::new();
    context.push_user_turn("show cards");
    let owner = context.push_assistant_turn();
    context.append_text("Here you go");
    context.push_user_turn("thanks");

    let surface_id = surface_id_for_turn(&owner);
    let delete = message(json!({"type": "deleteSurface", "surfaceId": surface_id}));
    assert_eq!(context.receive(delete), Some(owner));
    assert_eq!(context.current_turn(), None);

    let stray = message(json!({"type": "deleteSurface", "surfaceId": "surface-msg-1-99"}));
    assert_eq!(context.receive(stray), None);
}

#[test]
fn test_agent_events_drive_engine() {
    let mut decoder = AguiDecoder::new(true, "main");
    let mut context = ConversationContext::new();
    let mut engine = A2uiEngine::with_standard_catalog();
    context.push_user_turn("hello");

    let payloads = [
        r#"{"type":"RUN_STARTED","threadId":"t","runId":"r"}"#.to_string(),
        r#"{"type":"TEXT_MESSAGE_CONTENT","messageId":"m","delta":"Hi"}"#.to_string(),
        json!({
            "type": "TOOL_CALL_RESULT",
            "toolCallId": "c",
            "content": json!({"message": {
                "type": "surfaceUpdate",
                "surfaceId": "s1",
                "root": "root",
                "components": [{"id": "root", "component": {"Text": {"text": {"literalString": "Hi"}}}}]
            }}).to_string()
        })
        .to_string(),
        r#"{"type":"RUN_FINISHED","threadId":"t","runId":"r"}"#.to_string(),
    ];

    for payload in &payloads {
        for event in decoder.decode(payload) {
            match event.unwrap() {
                TransportEvent::Message(msg) => {
                    if context.receive(msg.clone()).is_some() {
                        engine.process_message(&msg);
                    }
                }
                TransportEvent::TextDelta(text) => {
                    context.set_text(&text);
                }
                TransportEvent::Completed => {}
            }
        }
    }

    assert_eq!(engine.surface_state("s1"), SurfaceState::Ready);
    let turn = context.turns().last().unwrap();
    assert_eq!(turn.content, "Hi");
    assert_eq!(context.surfaces_for_turn(&turn.id), vec!["s1"]);
}
