//! Connection owner, channel registry and event loop
//!
//! # Architecture
//!
//! All mutable protocol state (connection, send buffer, channels, their
//! pushes and every timer) sits behind one mutex. Anything that happens
//! asynchronously (transport callbacks, timer fires) is turned into an
//! [`Event`] and queued; a single Tokio task drains the queue and applies
//! each event under the lock.
//!
//! ```text
//!  Transport ──┐
//!  Timers    ──┼──> event queue ──> event loop ──> SocketState (locked)
//!  (sink/cb)   │                                        │
//!              │                          user callbacks run after unlock
//! ```
//!
//! User callbacks are collected while the lock is held and invoked after it
//! is released, so they are free to call back into the socket or a channel.

use crate::core::binding::{dispatch, Invocation};
use crate::core::builder::{NoEndpoint, SocketBuilder};
use crate::core::channel::{Channel, ChannelCore, ChannelId};
use crate::core::config::SocketConfig;
use crate::core::connection_state::ConnectionState;
use crate::core::message::{Message, PHX_ERROR};
use crate::core::push::PushCore;
use crate::core::timer::{Timer, TimerTick};
use crate::traits::backoff::Backoff;
use crate::traits::error::{PhoenixError, Result};
use crate::traits::transport::{
    Connection, TransportEvent, TransportSink, CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Work item for the event loop
pub(crate) enum Event {
    /// Something the connection of `generation` reported
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    Heartbeat(TimerTick),
    Reconnect(TimerTick),
    Rejoin(ChannelId, TimerTick),
    PushTimeout(Weak<Mutex<PushCore>>, TimerTick),
}

pub(crate) type EventQueue = mpsc::UnboundedSender<Event>;

/// Socket events kept for the owner before the oldest are dropped
pub const SOCKET_EVENT_CAPACITY: usize = 256;

/// Connection lifecycle notifications for the socket's owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The transport opened
    Open,
    /// The transport closed with this code
    Close(u16),
    /// The transport reported an error
    Error(String),
}

/// Why the socket itself asked the connection to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseIntent {
    Requested,
    HeartbeatTimeout,
}

/// The part of the socket that channels and pushes talk to
pub(crate) struct Link {
    config: Arc<SocketConfig>,
    url: String,
    connection: Option<Box<dyn Connection>>,
    state: ConnectionState,
    generation: u64,
    send_buffer: VecDeque<String>,
    ref_counter: u64,
    queue: EventQueue,
    runtime: Handle,
}

impl Link {
    pub(crate) fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    pub(crate) fn runtime(&self) -> Handle {
        self.runtime.clone()
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub(crate) fn rejoin_after(&self) -> Arc<dyn Backoff> {
        Arc::clone(&self.config.rejoin_after)
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.is_some() && self.state == ConnectionState::Open
    }

    /// Next message ref; unique for the lifetime of the socket
    pub(crate) fn make_ref(&mut self) -> String {
        self.ref_counter = self.ref_counter.wrapping_add(1);
        self.ref_counter.to_string()
    }

    /// Send `frame` now if connected, otherwise buffer it until the next open
    pub(crate) fn push(&mut self, frame: String) {
        if !self.is_connected() {
            trace!(buffered = self.send_buffer.len() + 1, "Buffering frame until connected");
            self.send_buffer.push_back(frame);
            return;
        }
        if let Some(connection) = &self.connection {
            if let Err(e) = connection.send(frame.clone()) {
                warn!("Send failed, buffering frame: {}", e);
                self.send_buffer.push_back(frame);
            }
        }
    }

    fn flush_send_buffer(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        if !self.send_buffer.is_empty() {
            debug!(frames = self.send_buffer.len(), "Flushing send buffer");
        }
        while let Some(frame) = self.send_buffer.pop_front() {
            if let Err(e) = connection.send(frame.clone()) {
                warn!("Flush interrupted: {}", e);
                self.send_buffer.push_front(frame);
                break;
            }
        }
    }

    /// Report one trace entry to tracing and to the configured logger
    pub(crate) fn log(&self, category: &str, message: &str, data: Option<&str>) {
        debug!(category, data, "{}", message);
        if let Some(logger) = &self.config.logger {
            logger.log(category, message, data);
        }
    }
}

pub(crate) struct SocketState {
    link: Link,
    channels: Vec<ChannelCore>,
    next_channel_id: ChannelId,
    heartbeat_timer: Timer,
    pending_heartbeat: Option<String>,
    reconnect_timer: Timer,
    close_intent: Option<CloseIntent>,
    events: Sender<SocketEvent>,
    backlog: Receiver<SocketEvent>,
}

impl SocketState {
    fn new(
        config: Arc<SocketConfig>,
        queue: EventQueue,
        events: Sender<SocketEvent>,
        backlog: Receiver<SocketEvent>,
        runtime: Handle,
    ) -> Self {
        let heartbeat_queue = queue.clone();
        let heartbeat_timer = Timer::fixed(
            "heartbeat",
            config.heartbeat_interval,
            true,
            runtime.clone(),
            move |tick| {
                let _ = heartbeat_queue.send(Event::Heartbeat(tick));
            },
        );
        let reconnect_queue = queue.clone();
        let reconnect_timer = Timer::backoff(
            "reconnect",
            Arc::clone(&config.reconnect_after),
            runtime.clone(),
            move |tick| {
                let _ = reconnect_queue.send(Event::Reconnect(tick));
            },
        );

        Self {
            link: Link {
                url: config.endpoint_url(),
                config,
                connection: None,
                state: ConnectionState::Closed,
                generation: 0,
                send_buffer: VecDeque::new(),
                ref_counter: 0,
                queue,
                runtime,
            },
            channels: Vec::new(),
            next_channel_id: 0,
            heartbeat_timer,
            pending_heartbeat: None,
            reconnect_timer,
            close_intent: None,
            events,
            backlog,
        }
    }

    fn connect(&mut self) {
        if self.link.connection.is_some() {
            return;
        }
        self.link.generation += 1;
        let generation = self.link.generation;
        let queue = self.link.queue();
        let sink = TransportSink::new(move |event| {
            let _ = queue.send(Event::Transport { generation, event });
        });

        info!(url = %self.link.url, "Connecting");
        self.link.log("socket", "connect", Some(&self.link.url));
        self.link.state = ConnectionState::Connecting;
        self.close_intent = None;

        // Transports spawn their I/O onto the socket's runtime
        let _guard = self.link.runtime.enter();
        let connection = self.link.config.transport.connect(&self.link.url, sink);
        self.link.connection = Some(connection);
    }

    fn disconnect(&mut self, code: Option<u16>, reason: Option<&str>) {
        if let Some(connection) = self.link.connection.take() {
            debug!(state = %connection.state(), "Closing connection");
            self.link.log("socket", "disconnect", reason);
            self.close_intent = Some(CloseIntent::Requested);
            connection.close(code, reason);
        }
        self.link.state = ConnectionState::Closed;
    }

    fn cleanup(&mut self, out: &mut Vec<Invocation>) {
        let timeout = self.link.timeout();
        for channel in self.channels.iter_mut() {
            if !channel.is_closed_or_leaving() {
                channel.leave(timeout, &mut self.link, out);
            }
        }
        self.disconnect(None, None);
        self.reconnect_timer.reset();
    }

    /// Id of the live channel for `topic`, created on first use
    fn add_channel(&mut self, topic: &str, params: Value) -> ChannelId {
        if let Some(existing) = self
            .channels
            .iter()
            .find(|channel| channel.topic() == topic && !channel.is_removed())
        {
            return existing.id();
        }
        let id = self.next_channel_id;
        self.next_channel_id += 1;
        self.link.log("socket", "channel", Some(topic));
        self.channels
            .push(ChannelCore::new(id, topic.to_string(), params, &self.link));
        id
    }

    fn remove_channel(&mut self, id: ChannelId) {
        self.channels.retain(|channel| channel.id() != id);
    }

    /// Drop channels that reached Closed while handling the last operation
    fn sweep(&mut self) {
        self.channels.retain(|channel| !channel.is_removed());
    }

    fn handle(&mut self, event: Event, out: &mut Vec<Invocation>) {
        match event {
            Event::Transport { generation, event } => {
                if generation != self.link.generation {
                    trace!(
                        generation,
                        current = self.link.generation,
                        "Ignoring event from a replaced connection"
                    );
                    return;
                }
                match event {
                    TransportEvent::Open => self.on_conn_open(),
                    TransportEvent::Close(code) => self.on_conn_close(code, out),
                    TransportEvent::Error(message) => self.on_conn_error(message, out),
                    TransportEvent::Message(text) => self.on_conn_message(&text, out),
                }
            }
            Event::Heartbeat(tick) => self.on_heartbeat(tick),
            Event::Reconnect(tick) => self.on_reconnect(tick),
            Event::Rejoin(id, tick) => {
                let Self { link, channels, .. } = self;
                if let Some(channel) = channels.iter_mut().find(|c| c.id() == id) {
                    channel.on_rejoin_tick(tick, link);
                }
            }
            Event::PushTimeout(push, tick) => self.on_push_timeout(push, tick, out),
        }
        self.sweep();
    }

    fn on_conn_open(&mut self) {
        if self.link.connection.is_none() {
            return;
        }
        info!(url = %self.link.url, "Connected");
        self.link.log("socket", "open", Some(&self.link.url));
        self.link.state = ConnectionState::Open;
        self.close_intent = None;

        self.link.flush_send_buffer();
        self.reconnect_timer.reset();
        self.pending_heartbeat = None;
        self.heartbeat_timer.reset();
        self.heartbeat_timer.schedule_timeout();

        let Self { link, channels, .. } = self;
        for channel in channels.iter_mut() {
            channel.rejoin_errored(link);
        }
        self.emit(SocketEvent::Open);
    }

    /// Hand `event` to the owner, dropping the oldest one when nobody drains
    fn emit(&self, event: SocketEvent) {
        let mut event = event;
        loop {
            match self.events.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(dropped) = self.backlog.try_recv() {
                        trace!(?dropped, "Socket event backlog full, dropping oldest");
                    }
                    event = rejected;
                }
            }
        }
    }

    fn on_conn_close(&mut self, code: u16, out: &mut Vec<Invocation>) {
        info!(code, "Connection closed");
        self.link.log("socket", "close", Some(&code.to_string()));
        self.link.connection = None;
        self.link.state = ConnectionState::Closed;
        self.heartbeat_timer.reset();

        self.trigger_channel_error(out);

        let reconnect = match self.close_intent.take() {
            Some(CloseIntent::Requested) => false,
            Some(CloseIntent::HeartbeatTimeout) => true,
            None => !matches!(code, CLOSE_NORMAL | CLOSE_PROTOCOL_ERROR),
        };
        if reconnect {
            self.reconnect_timer.schedule_timeout();
            debug!(tries = self.reconnect_timer.tries(), "Reconnect scheduled");
        } else {
            self.reconnect_timer.reset();
        }
        self.emit(SocketEvent::Close(code));
    }

    fn on_conn_error(&mut self, message: String, out: &mut Vec<Invocation>) {
        warn!("Transport error: {}", message);
        self.link.log("socket", "error", Some(&message));
        self.trigger_channel_error(out);
        self.emit(SocketEvent::Error(message));
    }

    fn on_conn_message(&mut self, text: &str, out: &mut Vec<Invocation>) {
        if self.link.connection.is_none() {
            return;
        }
        self.link.log("socket", "receive", Some(text));
        let message = match Message::decode(text) {
            Ok(message) => Arc::new(message),
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                return;
            }
        };

        if message.reference.is_some() && message.reference == self.pending_heartbeat {
            trace!("Heartbeat acknowledged");
            self.pending_heartbeat = None;
            return;
        }

        let Self { link, channels, .. } = self;
        let mut routed = false;
        for channel in channels.iter_mut() {
            if channel.is_member(&message) {
                routed = true;
                channel.trigger(&message.event, Arc::clone(&message), link, out);
            }
        }
        if !routed {
            trace!(topic = %message.topic, event = %message.event, "No channel for message");
        }
    }

    fn trigger_channel_error(&mut self, out: &mut Vec<Invocation>) {
        let Self { link, channels, .. } = self;
        for channel in channels.iter_mut() {
            let error = Message::lifecycle(
                channel.topic().to_string(),
                PHX_ERROR,
                channel.join_ref().map(str::to_string),
            );
            channel.trigger(PHX_ERROR, Arc::new(error), link, out);
        }
    }

    fn on_heartbeat(&mut self, tick: TimerTick) {
        if !self.heartbeat_timer.fire(tick) || !self.link.is_connected() {
            return;
        }
        if self.pending_heartbeat.take().is_some() {
            warn!("Heartbeat timeout, closing connection");
            self.link.log("socket", "heartbeat timeout", None);
            self.close_intent = Some(CloseIntent::HeartbeatTimeout);
            self.link.state = ConnectionState::Closing;
            if let Some(connection) = &self.link.connection {
                connection.close(Some(CLOSE_NORMAL), Some("heartbeat timeout"));
            }
            return;
        }

        let reference = self.link.make_ref();
        match Message::heartbeat(reference.clone()).encode() {
            Ok(frame) => {
                self.pending_heartbeat = Some(reference);
                self.link.push(frame);
            }
            Err(e) => error!("Failed to encode heartbeat: {}", e),
        }
    }

    fn on_reconnect(&mut self, tick: TimerTick) {
        if !self.reconnect_timer.fire(tick) {
            return;
        }
        info!(tries = self.reconnect_timer.tries(), "Reconnecting");
        if let Some(connection) = self.link.connection.take() {
            connection.close(None, None);
        }
        self.connect();
    }

    fn on_push_timeout(
        &mut self,
        push: Weak<Mutex<PushCore>>,
        tick: TimerTick,
        out: &mut Vec<Invocation>,
    ) {
        let Some(push) = push.upgrade() else {
            return;
        };
        let (channel_id, reply) = {
            let mut core = push.lock();
            let Some(reply) = core.take_timeout(tick) else {
                return;
            };
            (core.channel(), Arc::new(reply))
        };

        let Self { link, channels, .. } = self;
        match channels.iter_mut().find(|c| c.id() == channel_id) {
            Some(channel) => {
                let event = reply.event.clone();
                channel.trigger(&event, reply, link, out);
            }
            // The channel is gone; resolve the orphan so its callbacks still run
            None => {
                push.lock().settle(reply, out);
            }
        }
    }
}

impl fmt::Debug for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketState")
            .field("url", &self.link.url)
            .field("state", &self.link.state)
            .field("buffered", &self.link.send_buffer.len())
            .field("channels", &self.channels)
            .finish()
    }
}

struct SocketInner {
    state: Mutex<SocketState>,
    events: Receiver<SocketEvent>,
    config: Arc<SocketConfig>,
    url: String,
}

/// Multiplexed connection to a Phoenix endpoint
///
/// Cheap to clone; every clone refers to the same connection. Must be
/// created inside a Tokio runtime, after which its methods may be called
/// from any thread.
///
/// # Example
///
/// ```no_run
/// use phoenix_socket::Socket;
/// use serde_json::json;
///
/// # async fn run() -> phoenix_socket::Result<()> {
/// let socket = Socket::builder()
///     .endpoint("ws://localhost:4000/socket")
///     .param("token", "abc")
///     .build()?;
/// socket.connect();
///
/// let channel = socket.channel("room:lobby");
/// channel.on("new_msg", |payload| println!("{payload}"))?;
/// channel
///     .join()?
///     .receive_ok(|_| println!("joined"))
///     .receive_error(|reason| println!("rejected: {reason}"));
/// channel.push("new_msg", json!({"body": "hi"}))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

impl Socket {
    pub fn builder() -> SocketBuilder<NoEndpoint> {
        SocketBuilder::new()
    }

    /// Create a socket from a validated configuration
    pub fn new(config: SocketConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            PhoenixError::Configuration("Socket must be created inside a Tokio runtime".to_string())
        })?;
        config.validate()?;

        let config = Arc::new(config);
        let url = config.endpoint_url();
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = bounded(SOCKET_EVENT_CAPACITY);
        let state = SocketState::new(
            Arc::clone(&config),
            queue,
            events_tx,
            events_rx.clone(),
            runtime.clone(),
        );

        let inner = Arc::new(SocketInner {
            state: Mutex::new(state),
            events: events_rx,
            config,
            url,
        });
        runtime.spawn(run_event_loop(Arc::downgrade(&inner), queue_rx));

        Ok(Self { inner })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SocketState, &mut Vec<Invocation>) -> T) -> T {
        let mut out = Vec::new();
        let result = {
            let mut state = self.inner.state.lock();
            let result = f(&mut state, &mut out);
            state.sweep();
            result
        };
        dispatch(out);
        result
    }

    /// Run `f` against a live channel; `None` once it was dropped
    pub(crate) fn with_channel<T>(
        &self,
        id: ChannelId,
        f: impl FnOnce(&mut ChannelCore, &mut Link) -> T,
    ) -> Option<T> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let result = state
            .channels
            .iter_mut()
            .find(|channel| channel.id() == id)
            .map(|channel| f(channel, &mut state.link));
        state.sweep();
        result
    }

    /// Open the transport; no-op while a connection exists
    pub fn connect(&self) {
        self.with_state(|state, _| state.connect());
    }

    /// Close the transport; the socket will not reconnect on its own
    pub fn disconnect(&self) {
        self.with_state(|state, _| state.disconnect(None, None));
    }

    pub fn disconnect_with(&self, code: u16, reason: &str) {
        self.with_state(|state, _| state.disconnect(Some(code), Some(reason)));
    }

    /// Leave every active channel, disconnect and stop reconnecting
    pub fn cleanup(&self) {
        self.with_state(|state, out| state.cleanup(out));
    }

    /// Channel for `topic`, joined with an empty params object
    ///
    /// A topic maps to one live channel; asking again returns a handle to it.
    pub fn channel(&self, topic: &str) -> Channel {
        self.channel_with_params(topic, json!({}))
    }

    /// Channel for `topic`; `params` are sent with every join
    ///
    /// `params` only apply when the channel is created by this call.
    pub fn channel_with_params(&self, topic: &str, params: Value) -> Channel {
        let id = self.with_state(|state, _| state.add_channel(topic, params));
        Channel::new(id, topic.to_string(), self.clone())
    }

    /// Forget `channel` without leaving it
    pub fn remove(&self, channel: &Channel) {
        self.with_state(|state, _| state.remove_channel(channel.id()));
    }

    /// Send one encoded frame, or buffer it until the next open
    pub fn push(&self, frame: String) {
        self.with_state(|state, _| state.link.push(frame));
    }

    pub fn make_ref(&self) -> String {
        self.with_state(|state, _| state.link.make_ref())
    }

    pub fn state(&self) -> ConnectionState {
        self.with_state(|state, _| state.link.state)
    }

    pub fn is_connected(&self) -> bool {
        self.with_state(|state, _| state.link.is_connected())
    }

    /// Topics of the channels currently registered, in creation order
    pub fn channels(&self) -> Vec<String> {
        self.with_state(|state, _| {
            state
                .channels
                .iter()
                .map(|channel| channel.topic().to_string())
                .collect()
        })
    }

    /// Frames waiting for the next open
    pub fn buffered(&self) -> usize {
        self.with_state(|state, _| state.link.send_buffer.len())
    }

    /// Full connect URL: endpoint, protocol version and params
    pub fn endpoint_url(&self) -> &str {
        &self.inner.url
    }

    pub fn timeout(&self) -> Duration {
        self.inner.config.timeout
    }

    pub fn config(&self) -> &SocketConfig {
        &self.inner.config
    }

    /// Next lifecycle event, if one is waiting
    pub fn try_recv_event(&self) -> Option<SocketEvent> {
        self.inner.events.try_recv().ok()
    }

    /// Block until the next lifecycle event
    pub fn recv_event(&self) -> Option<SocketEvent> {
        self.inner.events.recv().ok()
    }

    /// Lifecycle event receiver, for `select!`-style consumers
    ///
    /// Holds at most [`SOCKET_EVENT_CAPACITY`] events; once full, the oldest
    /// undrained event is dropped to make room.
    pub fn events(&self) -> Receiver<SocketEvent> {
        self.inner.events.clone()
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket").field("url", &self.inner.url).finish()
    }
}

async fn run_event_loop(socket: Weak<SocketInner>, mut queue: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = queue.recv().await {
        let Some(inner) = socket.upgrade() else {
            break;
        };
        let mut out = Vec::new();
        inner.state.lock().handle(event, &mut out);
        dispatch(out);
    }
    debug!("Socket event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection_state::AtomicConnectionState;
    use crate::traits::transport::Transport;

    struct NullConnection(AtomicConnectionState);

    impl Connection for NullConnection {
        fn send(&self, _text: String) -> Result<()> {
            Ok(())
        }

        fn close(&self, _code: Option<u16>, _reason: Option<&str>) {
            self.0.set(ConnectionState::Closed);
        }

        fn state(&self) -> ConnectionState {
            self.0.get()
        }
    }

    struct NullTransport;

    impl Transport for NullTransport {
        fn connect(&self, _url: &str, _sink: TransportSink) -> Box<dyn Connection> {
            Box::new(NullConnection(AtomicConnectionState::new(
                ConnectionState::Connecting,
            )))
        }
    }

    fn socket() -> Socket {
        Socket::builder()
            .endpoint("ws://localhost:4000/socket")
            .transport(NullTransport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_make_ref_increments() {
        let socket = socket();
        assert_eq!(socket.make_ref(), "1");
        assert_eq!(socket.make_ref(), "2");
        assert_eq!(socket.make_ref(), "3");
    }

    #[tokio::test]
    async fn test_push_buffers_while_disconnected() {
        let socket = socket();
        socket.push("[null,\"1\",\"t\",\"e\",{}]".to_string());
        socket.push("[null,\"2\",\"t\",\"e\",{}]".to_string());
        assert_eq!(socket.buffered(), 2);
        assert!(!socket.is_connected());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_until_open() {
        let socket = socket();
        socket.connect();
        socket.connect();
        assert_eq!(socket.state(), ConnectionState::Connecting);
        assert!(!socket.is_connected());

        socket.disconnect();
        assert_eq!(socket.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_channel_registry() {
        let socket = socket();
        let lobby = socket.channel("room:lobby");
        let _other = socket.channel("room:other");
        assert_eq!(socket.channels(), vec!["room:lobby", "room:other"]);

        socket.remove(&lobby);
        assert_eq!(socket.channels(), vec!["room:other"]);
    }

    #[tokio::test]
    async fn test_channel_is_unique_per_topic() {
        let socket = socket();
        let first = socket.channel("room:lobby");
        let second = socket.channel_with_params("room:lobby", json!({"user": "ana"}));
        assert_eq!(socket.channels(), vec!["room:lobby"]);

        first.join().unwrap();
        assert!(matches!(
            second.join(),
            Err(PhoenixError::AlreadyJoined { .. })
        ));
        assert_eq!(first.join_ref(), second.join_ref());

        socket.remove(&first);
        let _fresh = socket.channel("room:lobby");
        assert_eq!(socket.channels(), vec!["room:lobby"]);
    }

    #[tokio::test]
    async fn test_undrained_events_drop_oldest() {
        let socket = socket();
        for i in 0..SOCKET_EVENT_CAPACITY + 10 {
            socket.with_state(|state, _| state.emit(SocketEvent::Error(i.to_string())));
        }

        let events: Vec<_> = socket.events().try_iter().collect();
        assert_eq!(events.len(), SOCKET_EVENT_CAPACITY);
        assert_eq!(events.first(), Some(&SocketEvent::Error("10".to_string())));
        assert_eq!(
            events.last(),
            Some(&SocketEvent::Error((SOCKET_EVENT_CAPACITY + 9).to_string()))
        );
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Socket::builder()
            .endpoint("ws://localhost:4000/socket")
            .transport(NullTransport)
            .build();
        assert!(matches!(result, Err(PhoenixError::Configuration(_))));
    }
}
