//! A2UI Host
//!
//! Drives one conversation with an agent: sends user turns through the
//! resilient sender, routes every returned message to its turn and applies
//! it to the engine.
//!
//! Messages of one run are held until the run completes, then routed and
//! applied in priority order, so a run that delivers `beginRendering` ahead
//! of its `surfaceUpdate` still renders.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::agui::HttpTransport;
use super::codec;
use super::config::EngineConfig;
use super::error::{A2uiError, Diagnostics, Result};
use super::message::A2uiMessage;
use super::processor::{A2uiEngine, ProcessorEvent};
use super::registry::{Catalog, ComponentCatalog};
use super::router::ConversationContext;
use super::transport::{DuplexTransport, OutboundTurn, ResilientSender, RetryOptions, TransportEvent};

/// A2UI Host owns the conversation, the engine and the sender.
///
/// # Example
///
/// ```rust,ignore
/// let config = EngineConfig::from_path(Path::new("a2ui.json"))?;
/// let mut host = A2uiHost::from_config(config)?;
///
/// host.send_prompt("Show me a login form").await?;
/// let (tree, diagnostics) = host.engine().renderable_tree("main");
/// ```
pub struct A2uiHost<C: Catalog = ComponentCatalog> {
    config: EngineConfig,
    context: ConversationContext,
    engine: A2uiEngine<C>,
    sender: ResilientSender,
}

impl A2uiHost<ComponentCatalog> {
    /// Host over `transport` with the standard catalog.
    pub fn new(config: EngineConfig, transport: Arc<dyn DuplexTransport>) -> Self {
        let options = config.retry_options();
        Self::with_engine(config, A2uiEngine::with_standard_catalog(), transport, options)
    }

    /// Host talking AG-UI to the configured endpoint.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let endpoint = config
            .transport
            .endpoint
            .clone()
            .ok_or_else(|| A2uiError::Config("no agent endpoint configured".into()))?;

        let transport = HttpTransport::for_agent(&endpoint, &config.transport.agent_id)?
            .with_auto_begin_rendering(config.transport.auto_begin_rendering)
            .with_default_surface_id(config.default_surface_id.clone());

        Ok(Self::new(config, Arc::new(transport)))
    }
}

impl<C: Catalog> A2uiHost<C> {
    pub fn with_engine(
        config: EngineConfig,
        engine: A2uiEngine<C>,
        transport: Arc<dyn DuplexTransport>,
        options: RetryOptions,
    ) -> Self {
        let engine = engine.with_pruning(config.prune_deleted_surfaces);
        A2uiHost {
            config,
            context: ConversationContext::new(),
            engine,
            sender: ResilientSender::new(transport, options),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn engine(&self) -> &A2uiEngine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut A2uiEngine<C> {
        &mut self.engine
    }

    pub fn pending_len(&self) -> usize {
        self.sender.pending_len()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Send a free-text request and apply the response.
    pub async fn send_prompt(&mut self, text: &str) -> Result<Vec<ProcessorEvent>> {
        self.context.push_user_turn(text);
        self.deliver(OutboundTurn::from_prompt(text)).await
    }

    /// Activate a component and send the resulting `userAction`.
    pub async fn send_action(
        &mut self,
        surface_id: &str,
        component_id: &str,
        scope: Option<&str>,
    ) -> Result<Vec<ProcessorEvent>> {
        let action = self.engine.trigger_action(surface_id, component_id, scope)?;
        ::log::info!(
            "[A2UI host] Sending action {} from {}/{}",
            action.name,
            surface_id,
            component_id
        );
        self.send_message(&A2uiMessage::UserAction(action)).await
    }

    /// Report a client-side failure to the agent.
    pub async fn report_error(
        &mut self,
        surface_id: &str,
        code: &str,
        message: &str,
        context: Option<Map<String, Value>>,
    ) -> Result<Vec<ProcessorEvent>> {
        let error = codec::error_message(surface_id, code, message, context);
        self.send_message(&A2uiMessage::Error(error)).await
    }

    /// Send one `error` envelope per render diagnostic.
    pub async fn report_diagnostics(
        &mut self,
        surface_id: &str,
        diagnostics: Diagnostics,
    ) -> Result<Vec<ProcessorEvent>> {
        let mut events = Vec::new();
        for error in diagnostics.into_error_messages(surface_id) {
            events.extend(self.send_message(&A2uiMessage::Error(error)).await?);
        }
        Ok(events)
    }

    async fn send_message(&mut self, message: &A2uiMessage) -> Result<Vec<ProcessorEvent>> {
        let turn = OutboundTurn::from_message(message)?;
        self.context.push_user_turn(turn.content.clone());
        self.deliver(turn).await
    }

    async fn deliver(&mut self, turn: OutboundTurn) -> Result<Vec<ProcessorEvent>> {
        let A2uiHost {
            context,
            engine,
            sender,
            ..
        } = self;

        let mut run = RunBatch::default();
        let result = sender
            .send(turn, |event| run.accept(context, engine, event))
            .await;
        let events = run.finish(context, engine);
        result.map(|()| events)
    }

    /// Feed one transport event in as if it came from the agent.
    pub fn receive(&mut self, event: TransportEvent) -> Vec<ProcessorEvent> {
        let mut run = RunBatch::default();
        run.accept(&mut self.context, &mut self.engine, event);
        run.finish(&mut self.context, &mut self.engine)
    }

    /// Send every queued turn again. Returns how many were delivered and the
    /// events their responses produced.
    pub async fn retry_pending(&mut self) -> (usize, Vec<ProcessorEvent>) {
        let A2uiHost {
            context,
            engine,
            sender,
            ..
        } = self;

        let mut run = RunBatch::default();
        let delivered = sender
            .retry_pending(|event| run.accept(context, engine, event))
            .await;
        (delivered, run.finish(context, engine))
    }
}

/// Messages of the run in progress and the events already applied.
#[derive(Default)]
struct RunBatch {
    messages: Vec<A2uiMessage>,
    events: Vec<ProcessorEvent>,
}

impl RunBatch {
    fn accept<C: Catalog>(
        &mut self,
        context: &mut ConversationContext,
        engine: &mut A2uiEngine<C>,
        event: TransportEvent,
    ) {
        match event {
            TransportEvent::Message(message) => self.messages.push(message),
            TransportEvent::TextDelta(text) => {
                context.set_text(&text);
            }
            TransportEvent::Completed => {
                ::log::debug!("[A2UI host] Run completed");
                self.flush(context, engine);
            }
        }
    }

    /// Route the held messages in priority order and apply the new ones.
    ///
    /// Redelivered copies from a retried attempt are dropped by the router.
    fn flush<C: Catalog>(&mut self, context: &mut ConversationContext, engine: &mut A2uiEngine<C>) {
        let mut held = std::mem::take(&mut self.messages);
        if held.is_empty() {
            return;
        }
        A2uiMessage::sort_by_priority(&mut held);

        let fresh: Vec<A2uiMessage> = held
            .into_iter()
            .filter(|message| context.receive(message.clone()).is_some())
            .collect();
        self.events.extend(engine.process_messages(fresh));
    }

    fn finish<C: Catalog>(
        mut self,
        context: &mut ConversationContext,
        engine: &mut A2uiEngine<C>,
    ) -> Vec<ProcessorEvent> {
        self.flush(context, engine);
        self.events
    }
}
