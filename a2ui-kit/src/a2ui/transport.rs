//! Transport Resilience Layer
//!
//! Delivers outbound turns over a [`DuplexTransport`] with linear backoff,
//! keeps undeliverable turns for a later manual retry and refuses to send a
//! turn that is already in flight.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use uuid::Uuid;

use super::codec;
use super::error::{A2uiError, Result};
use super::message::A2uiMessage;

/// Something a running agent sent back while handling a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An A2UI protocol message
    Message(A2uiMessage),
    /// Assistant text accumulated so far in this run
    TextDelta(String),
    /// The run finished
    Completed,
}

/// A user turn on its way to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundTurn {
    pub id: String,
    pub content: String,
}

impl OutboundTurn {
    /// A free-text user request
    pub fn from_prompt(text: impl Into<String>) -> Self {
        OutboundTurn {
            id: Uuid::new_v4().to_string(),
            content: text.into(),
        }
    }

    /// A framed `userAction` or `error` envelope.
    ///
    /// The envelope is validated first; an invalid one never becomes a turn.
    pub fn from_message(message: &A2uiMessage) -> Result<Self> {
        match message {
            A2uiMessage::UserAction(action) => codec::validate_user_action(action)?,
            A2uiMessage::Error(error) => codec::validate_error_message(error)?,
            other => {
                return Err(A2uiError::InvalidEnvelope(format!(
                    "{} is not an outbound message",
                    other.type_name()
                )));
            }
        }

        Ok(OutboundTurn {
            id: Uuid::new_v4().to_string(),
            content: codec::encode_user_turn(message)?,
        })
    }
}

/// A bidirectional channel to an agent.
///
/// Every call opens a fresh stream that delivers `turn` and yields the
/// agent's response until the run ends. An `Err` item means the delivery
/// failed.
pub trait DuplexTransport: Send + Sync {
    fn send_turn(&self, turn: &OutboundTurn) -> BoxStream<'static, Result<TransportEvent>>;
}

/// Retry policy of a [`ResilientSender`].
#[derive(Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base delay, multiplied by the attempt number
    pub retry_delay: Duration,

    /// Called with the attempt number before each retry
    pub on_retry: Option<Arc<dyn Fn(u32) + Send + Sync>>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn with_on_retry(mut self, on_retry: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }
}

/// Delivers turns with retry and keeps the ones that could not be delivered.
///
/// # Example
///
/// ```rust,ignore
/// let sender = ResilientSender::new(Arc::new(transport), RetryOptions::default());
///
/// let turn = OutboundTurn::from_prompt("Show me a login form");
/// sender.send(turn, |event| println!("{event:?}")).await?;
///
/// // Later, e.g. after reconnecting
/// sender.retry_pending(|event| println!("{event:?}")).await;
/// ```
pub struct ResilientSender {
    transport: Arc<dyn DuplexTransport>,
    options: RetryOptions,
    pending: Mutex<Vec<OutboundTurn>>,
    in_flight: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResilientSender {
    pub fn new(transport: Arc<dyn DuplexTransport>, options: RetryOptions) -> Self {
        ResilientSender {
            transport,
            options,
            pending: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Deliver `turn`, feeding every received event to `on_event`.
    ///
    /// A failed attempt is retried on a fresh stream after
    /// `retry_delay * attempt`. Events of a failed attempt have already been
    /// passed on, so receivers should tolerate redelivery. Once retries are
    /// exhausted the turn is queued for [`ResilientSender::retry_pending`].
    pub async fn send<F>(&self, turn: OutboundTurn, mut on_event: F) -> Result<()>
    where
        F: FnMut(TransportEvent),
    {
        if !lock(&self.in_flight).insert(turn.id.clone()) {
            ::log::warn!("[A2UI transport] Turn {} is already in flight", turn.id);
            return Err(A2uiError::AlreadyInFlight(turn.id));
        }

        let result = self.deliver(&turn, &mut on_event).await;
        lock(&self.in_flight).remove(&turn.id);

        if let Err(err) = &result {
            ::log::error!("[A2UI transport] Giving up on turn {}: {}", turn.id, err);
            lock(&self.pending).push(turn);
        }
        result
    }

    async fn deliver(
        &self,
        turn: &OutboundTurn,
        on_event: &mut impl FnMut(TransportEvent),
    ) -> Result<()> {
        let attempts = self.options.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                if let Some(on_retry) = &self.options.on_retry {
                    on_retry(attempt);
                }
                tokio::time::sleep(self.options.retry_delay * attempt).await;
            }

            match self.attempt(turn, on_event).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    ::log::warn!(
                        "[A2UI transport] Turn {} failed (attempt {}/{}): {}",
                        turn.id,
                        attempt + 1,
                        attempts,
                        err
                    );
                    last_error = err.to_string();
                    if !err.is_retryable() {
                        return Err(err);
                    }
                }
            }
        }

        Err(A2uiError::RetriesExhausted {
            turn_id: turn.id.clone(),
            attempts,
            last_error,
        })
    }

    async fn attempt(
        &self,
        turn: &OutboundTurn,
        on_event: &mut impl FnMut(TransportEvent),
    ) -> Result<()> {
        let mut stream = self.transport.send_turn(turn);
        while let Some(event) = stream.next().await {
            on_event(event?);
        }
        Ok(())
    }

    /// Send every queued turn again, oldest first.
    ///
    /// Turns that fail again go back to the queue. Returns how many were
    /// delivered.
    pub async fn retry_pending<F>(&self, mut on_event: F) -> usize
    where
        F: FnMut(TransportEvent),
    {
        let queued = std::mem::take(&mut *lock(&self.pending));
        if queued.is_empty() {
            return 0;
        }

        ::log::info!("[A2UI transport] Retrying {} pending turns", queued.len());
        let mut delivered = 0;
        for turn in queued {
            if self.send(turn, &mut on_event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn pending_turns(&self) -> Vec<OutboundTurn> {
        lock(&self.pending).clone()
    }

    pub fn is_in_flight(&self, turn_id: &str) -> bool {
        lock(&self.in_flight).contains(turn_id)
    }

    /// Whether any delivery is running
    pub fn is_connected(&self) -> bool {
        !lock(&self.in_flight).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2ui::message::UserActionMessage;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails the first `failures` deliveries, then answers with one message.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        started: Mutex<Vec<Instant>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            FlakyTransport {
                failures,
                calls: AtomicU32::new(0),
                started: Mutex::new(Vec::new()),
            }
        }
    }

    impl DuplexTransport for FlakyTransport {
        fn send_turn(&self, _turn: &OutboundTurn) -> BoxStream<'static, Result<TransportEvent>> {
            lock(&self.started).push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = call < self.failures;

            let message = A2uiMessage::from_value(json!({"type": "deleteSurface", "surfaceId": "s"})).unwrap();
            Box::pin(async_stream::stream! {
                yield Ok(TransportEvent::Message(message));
                if fail {
                    yield Err(A2uiError::Transport("connection reset".into()));
                } else {
                    yield Ok(TransportEvent::Completed);
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_until_success() {
        let transport = Arc::new(FlakyTransport::new(2));
        let retries = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&retries);
        let options = RetryOptions::default().with_on_retry(move |attempt| lock(&seen).push(attempt));
        let sender = ResilientSender::new(transport.clone(), options);

        let mut events = Vec::new();
        sender
            .send(OutboundTurn::from_prompt("hi"), |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(*lock(&retries), vec![1, 2]);
        let started = lock(&transport.started).clone();
        assert_eq!(started.len(), 3);
        assert_eq!(started[1] - started[0], Duration::from_millis(1000));
        assert_eq!(started[2] - started[1], Duration::from_millis(2000));

        // Each attempt redelivers its events before failing.
        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&TransportEvent::Completed));
        assert_eq!(sender.pending_len(), 0);
        assert!(!sender.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_turn_is_queued_and_retried() {
        let transport = Arc::new(FlakyTransport::new(4));
        let sender = ResilientSender::new(transport.clone(), RetryOptions::default());

        let turn = OutboundTurn::from_prompt("hi");
        let err = sender.send(turn.clone(), |_| {}).await.unwrap_err();
        assert!(matches!(err, A2uiError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
        assert_eq!(sender.pending_turns(), vec![turn]);

        assert_eq!(sender.retry_pending(|_| {}).await, 1);
        assert_eq!(sender.pending_len(), 0);
        assert_eq!(sender.retry_pending(|_| {}).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_turn_is_not_resent() {
        let transport = Arc::new(FlakyTransport::new(1));
        let sender = ResilientSender::new(transport.clone(), RetryOptions::default());
        let turn = OutboundTurn::from_prompt("hi");

        let first = sender.send(turn.clone(), |_| {});
        let second = async {
            tokio::task::yield_now().await;
            assert!(sender.is_in_flight(&turn.id));
            sender.send(turn.clone(), |_| {}).await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(A2uiError::AlreadyInFlight(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_action_never_becomes_a_turn() {
        let action = A2uiMessage::UserAction(UserActionMessage {
            name: String::new(),
            surface_id: "s1".into(),
            source_component_id: "x".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            context: None,
        });
        assert!(matches!(
            OutboundTurn::from_message(&action),
            Err(A2uiError::InvalidEnvelope(_))
        ));

        let delete = A2uiMessage::from_value(json!({"type": "deleteSurface", "surfaceId": "s"})).unwrap();
        assert!(OutboundTurn::from_message(&delete).is_err());
    }
}
