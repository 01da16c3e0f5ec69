//! Multi-agent message bus — bounded per-peer mailboxes, broadcast, topic
//! pub/sub, session tracking, and a first-match-wins message router.
//!
//! `Effect::Signal`/`Delegate`/`Handoff` give agents a vocabulary for
//! talking *about* each other; this crate is where agents talk *to* each
//! other. `agentkit-dispatch::LocalDispatcher` accepts signals and discards
//! them — the bus gives that traffic a real, queryable backing store.

use agentkit_core::{AgentError, AgentId, DurationMs, ErrorKind, MessageId, RunContext, SessionId};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

/// Default bound for a peer mailbox or topic subscriber channel. Matches
/// `agentkit_core::DEFAULT_STREAM_BUFFER`'s backpressure-over-drop default
/// for point-to-point delivery; broadcast and publish deliberately diverge
/// (non-blocking, drop on full) so one stalled peer can't stall a fan-out.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

fn bus_error(operation: &str, message: impl Into<String>) -> AgentError {
    AgentError::new(ErrorKind::MultiagentMessage, "bus", operation, message)
}

/// A message moving through the bus — between two peers, or tagged with a
/// topic for pub/sub fan-out.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Unique id for this message.
    pub id: MessageId,
    /// The sending agent.
    pub from: AgentId,
    /// Topic this message was published under, if any.
    pub topic: Option<String>,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// When the message was created.
    pub sent_at: DurationMs,
}

impl Message {
    /// Create a new message from `from` carrying `payload`.
    pub fn new(from: AgentId, payload: serde_json::Value) -> Self {
        let sent_at = DurationMs::now();
        let id = MessageId::new(format!("{from}-{}", sent_at.as_millis()));
        Self { id, from, topic: None, payload, sent_at }
    }

    /// Tag this message with a pub/sub topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

struct Mailbox {
    tx: mpsc::Sender<Message>,
    rx: AsyncMutex<mpsc::Receiver<Message>>,
}

enum RecvOutcome {
    Message(Option<Message>),
    Closed,
}

/// A pub/sub subscription. Dropping it stops delivery but leaves the
/// registration in place until the next `publish` prunes it, or until
/// [`Bus::unsubscribe`] removes it immediately.
pub struct Subscription {
    id: u64,
    topic: String,
    /// Receiving half — `rx.recv().await` yields the next message on this topic.
    pub rx: mpsc::Receiver<Message>,
}

/// In-process multi-agent message bus: point-to-point mailboxes plus topic
/// pub/sub, both bounded.
pub struct Bus {
    mailboxes: Mutex<HashMap<AgentId, Arc<Mailbox>>>,
    topics: Mutex<HashMap<String, Vec<(u64, mpsc::Sender<Message>)>>>,
    next_subscriber_id: AtomicU64,
    closed: AtomicBool,
    closed_notify: Arc<Notify>,
    capacity: usize,
}

impl Bus {
    /// Create a bus with [`DEFAULT_MAILBOX_CAPACITY`]-bounded channels.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a bus whose mailboxes and subscriber channels hold at most
    /// `capacity` undelivered messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            closed_notify: Arc::new(Notify::new()),
            capacity,
        }
    }

    /// Whether [`Bus::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn mailbox_for(&self, agent: &AgentId) -> Arc<Mailbox> {
        let mut mailboxes = self.mailboxes.lock().unwrap();
        mailboxes
            .entry(agent.clone())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.capacity);
                Arc::new(Mailbox { tx, rx: AsyncMutex::new(rx) })
            })
            .clone()
    }

    /// Enqueue `msg` in `to`'s mailbox, honoring `ctx` cancellation/deadline.
    /// A full mailbox backpressures the sender rather than dropping the
    /// message — the same choice `Runnable::stream`'s default buffer makes.
    pub async fn send(&self, ctx: &RunContext, to: &AgentId, msg: Message) -> Result<(), AgentError> {
        if self.is_closed() {
            return Err(bus_error("send", "bus is closed"));
        }
        let mailbox = self.mailbox_for(to);
        match ctx.race("bus", "send", mailbox.tx.send(msg)).await {
            Err(e) => Err(e),
            Ok(Err(_)) => Err(bus_error("send", format!("mailbox for {to} is closed"))),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Dequeue the next message from `agent`'s own mailbox. Blocks until a
    /// message arrives, `ctx` is canceled/expires, or the bus is closed.
    pub async fn receive(&self, ctx: &RunContext, agent: &AgentId) -> Result<Message, AgentError> {
        if self.is_closed() {
            return Err(bus_error("receive", "bus is closed"));
        }
        let mailbox = self.mailbox_for(agent);
        let mut rx = mailbox.rx.lock().await;
        let closed_notify = self.closed_notify.clone();
        let outcome = ctx.race("bus", "receive", async {
            tokio::select! {
                msg = rx.recv() => RecvOutcome::Message(msg),
                _ = closed_notify.notified() => RecvOutcome::Closed,
            }
        });
        match outcome.await {
            Err(e) => Err(e),
            Ok(RecvOutcome::Closed) => Err(bus_error("receive", "bus is closed")),
            Ok(RecvOutcome::Message(None)) => Err(bus_error("receive", "mailbox closed")),
            Ok(RecvOutcome::Message(Some(msg))) => Ok(msg),
        }
    }

    /// Send `msg` to every known peer except `from`. Non-blocking: a peer
    /// whose mailbox is full or closed is silently skipped rather than
    /// stalling the broadcast.
    pub fn broadcast(&self, from: &AgentId, msg: Message) -> Result<(), AgentError> {
        if self.is_closed() {
            return Err(bus_error("broadcast", "bus is closed"));
        }
        let mailboxes = self.mailboxes.lock().unwrap();
        for (peer, mailbox) in mailboxes.iter() {
            if peer == from {
                continue;
            }
            if let Err(err) = mailbox.tx.try_send(msg.clone()) {
                tracing::debug!(peer = %peer, error = %err, "bus.broadcast dropped message for overflowing/closed peer");
            }
        }
        Ok(())
    }

    /// Subscribe to `topic`, returning a channel that yields every message
    /// subsequently published to it.
    pub fn subscribe(&self, topic: impl Into<String>) -> Result<Subscription, AgentError> {
        if self.is_closed() {
            return Err(bus_error("subscribe", "bus is closed"));
        }
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.topics.lock().unwrap().entry(topic.clone()).or_default().push((id, tx));
        Ok(Subscription { id, topic, rx })
    }

    /// Unsubscribe, closing the subscriber's channel immediately rather
    /// than waiting for the next `publish` to notice it's gone.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(subs) = self.topics.lock().unwrap().get_mut(&subscription.topic) {
            subs.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Fan `msg` out to every subscriber of `topic`. Non-blocking per
    /// subscriber; a subscriber whose channel is full is skipped for this
    /// message but stays registered, a closed one is pruned.
    pub fn publish(&self, topic: &str, msg: Message) -> Result<(), AgentError> {
        if self.is_closed() {
            return Err(bus_error("publish", "bus is closed"));
        }
        let mut topics = self.topics.lock().unwrap();
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|(id, tx)| match tx.try_send(msg.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = id, topic, "bus.publish pruned closed subscriber");
                    false
                }
            });
        }
        Ok(())
    }

    /// Release every mailbox and subscriber channel. Subsequent `send`,
    /// `receive`, `broadcast`, `subscribe`, and `publish` calls fail with a
    /// closed-bus error; any `receive` blocked at the time of the call
    /// wakes up with the same error.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.mailboxes.lock().unwrap().clear();
        self.topics.lock().unwrap().clear();
        self.closed_notify.notify_waiters();
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// A tracked multi-agent conversation: participants plus an ordered
/// message history. Closed sessions reject further writes.
#[derive(Debug, Clone)]
pub struct Session {
    /// This session's id.
    pub id: SessionId,
    /// Agents participating in this session.
    pub participants: Vec<AgentId>,
    /// Messages recorded so far, in arrival order.
    pub messages: Vec<Message>,
    /// Whether the session has been closed.
    pub closed: bool,
}

/// Tracks multi-agent conversation sessions: who's in them and what's been
/// said.
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_id: AtomicU64,
}

impl SessionManager {
    /// Create an empty session manager.
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) }
    }

    /// Create a new session with the given participants, returning its id.
    pub fn create(&self, participants: Vec<AgentId>) -> SessionId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = SessionId::new(format!("session-{n}"));
        let session = Session { id: id.clone(), participants, messages: Vec::new(), closed: false };
        self.sessions.lock().unwrap().insert(id.clone(), session);
        id
    }

    /// Append `msg` to `session_id`'s history. Fails if the session is
    /// unknown or closed.
    pub fn add_message(&self, session_id: &SessionId, msg: Message) -> Result<(), AgentError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| bus_error("add_message", format!("unknown session: {session_id}")))?;
        if session.closed {
            return Err(bus_error("add_message", format!("session {session_id} is closed")));
        }
        session.messages.push(msg);
        Ok(())
    }

    /// Snapshot a session's current state.
    pub fn get(&self, session_id: &SessionId) -> Result<Session, AgentError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| bus_error("get", format!("unknown session: {session_id}")))
    }

    /// Close a session, rejecting further `add_message` calls.
    pub fn close(&self, session_id: &SessionId) -> Result<(), AgentError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| bus_error("close", format!("unknown session: {session_id}")))?;
        session.closed = true;
        Ok(())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Routes an incoming message to the first handler whose topic matches:
/// exact-topic handlers are checked before regex-topic handlers, and
/// within each group the first match (registration order) wins. An
/// unmatched message is a routing failure, not a silent no-op — a message
/// nobody claims usually means a typo'd topic, not an intentional drop.
#[derive(Default)]
pub struct MessageRouter {
    exact: HashMap<String, Handler>,
    patterns: Vec<(Regex, Handler)>,
}

impl MessageRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self { exact: HashMap::new(), patterns: Vec::new() }
    }

    /// Register a handler for an exact topic match.
    pub fn on_topic(&mut self, topic: impl Into<String>, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.exact.insert(topic.into(), Arc::new(handler));
    }

    /// Register a handler for any topic matching `pattern`. Checked after
    /// every exact-topic handler, in registration order.
    pub fn on_pattern(&mut self, pattern: Regex, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.patterns.push((pattern, Arc::new(handler)));
    }

    /// Route `msg` to its matching handler and run it.
    pub fn route(&self, msg: &Message) -> Result<(), AgentError> {
        let topic = msg.topic.as_deref().unwrap_or("");
        if let Some(handler) = self.exact.get(topic) {
            handler(msg);
            return Ok(());
        }
        for (pattern, handler) in &self.patterns {
            if pattern.is_match(topic) {
                handler(msg);
                return Ok(());
            }
        }
        Err(bus_error("route", format!("no route for topic: {topic}")))
    }
}
