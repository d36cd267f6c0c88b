//! Per-topic conversation state machine
//!
//! ```text
//!            join()              ok reply
//!  Closed ─────────────> Joining ─────────> Joined
//!    ^                    │  ^                │
//!    │ phx_close          │  │ rejoin timer   │ phx_error / socket error
//!    │                    v  │                v
//!  Leaving <────────── Errored <──────────────┘
//!         leave()          error reply / join timeout
//! ```
//!
//! The core lives inside the socket's state so that a channel, its pushes
//! and the socket always change together under one lock. [`Channel`] is a
//! cheap handle that looks the core up by id.

use crate::core::binding::{dispatch, BindingRef, Bindings, Callback, Invocation, Projection};
use crate::core::message::{
    is_lifecycle_event, reply_event_name, Message, ReplyStatus, PHX_CLOSE, PHX_ERROR, PHX_JOIN,
    PHX_LEAVE, PHX_REPLY,
};
use crate::core::push::{self, Push, PushCore, PushKind, SharedPush};
use crate::core::socket::{Event, Link, Socket};
use crate::core::timer::{Timer, TimerTick};
use crate::traits::error::{PhoenixError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Socket-unique channel identifier
pub type ChannelId = u64;

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Errored,
    Joined,
    Joining,
    Leaving,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Closed => "closed",
            ChannelState::Errored => "errored",
            ChannelState::Joined => "joined",
            ChannelState::Joining => "joining",
            ChannelState::Leaving => "leaving",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct ChannelCore {
    id: ChannelId,
    topic: String,
    state: ChannelState,
    joined_once: bool,
    timeout: Duration,
    join_ref: Option<String>,
    join_push: SharedPush,
    leave_push: Option<SharedPush>,
    rejoin_timer: Timer,
    push_buffer: Vec<SharedPush>,
    bindings: Bindings,
    replies: HashMap<String, SharedPush>,
    removed: bool,
}

impl ChannelCore {
    pub(crate) fn new(id: ChannelId, topic: String, params: Value, link: &Link) -> Self {
        let queue = link.queue();
        let rejoin_timer =
            Timer::backoff("rejoin", link.rejoin_after(), link.runtime(), move |tick| {
                let _ = queue.send(Event::Rejoin(id, tick));
            });
        let timeout = link.timeout();
        let params = if params.is_null() { json!({}) } else { params };
        let join_push =
            PushCore::create(id, &topic, PushKind::Join, PHX_JOIN, params, timeout, link);

        Self {
            id,
            topic,
            state: ChannelState::Closed,
            joined_once: false,
            timeout,
            join_ref: None,
            join_push,
            leave_push: None,
            rejoin_timer,
            push_buffer: Vec::new(),
            bindings: Bindings::new(Projection::Payload),
            replies: HashMap::new(),
            removed: false,
        }
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    pub(crate) fn join_ref(&self) -> Option<&str> {
        self.join_ref.as_deref()
    }

    pub(crate) fn set_join_ref(&mut self, join_ref: Option<String>) {
        self.join_ref = join_ref;
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn subscribe_reply(&mut self, ref_event: String, push: SharedPush) {
        self.replies.insert(ref_event, push);
    }

    pub(crate) fn unsubscribe_reply(&mut self, ref_event: &str) {
        self.replies.remove(ref_event);
    }

    pub(crate) fn can_push(&self, link: &Link) -> bool {
        link.is_connected() && self.state == ChannelState::Joined
    }

    pub(crate) fn is_closed_or_leaving(&self) -> bool {
        matches!(self.state, ChannelState::Closed | ChannelState::Leaving)
    }

    /// Is `message` addressed to this channel instance
    ///
    /// Lifecycle events stamped with a join ref from an earlier join of the
    /// same topic are outdated and rejected.
    pub(crate) fn is_member(&self, message: &Message) -> bool {
        if message.topic != self.topic {
            return false;
        }
        if let Some(join_ref) = message.join_ref.as_deref() {
            if is_lifecycle_event(&message.event) && Some(join_ref) != self.join_ref() {
                debug!(
                    topic = %self.topic,
                    event = %message.event,
                    join_ref,
                    "Dropping outdated message"
                );
                return false;
            }
        }
        true
    }

    pub(crate) fn join(&mut self, timeout: Duration, link: &mut Link) -> Result<SharedPush> {
        if self.joined_once {
            return Err(PhoenixError::AlreadyJoined {
                topic: self.topic.clone(),
            });
        }
        self.joined_once = true;
        self.timeout = timeout;
        self.rejoin(timeout, link);
        Ok(Arc::clone(&self.join_push))
    }

    pub(crate) fn push(
        &mut self,
        event: &str,
        payload: Value,
        timeout: Duration,
        link: &mut Link,
    ) -> Result<SharedPush> {
        if !self.joined_once {
            return Err(PhoenixError::PushBeforeJoin {
                topic: self.topic.clone(),
                event: event.to_string(),
            });
        }
        let pushed = PushCore::create(
            self.id,
            &self.topic,
            PushKind::Regular,
            event,
            payload,
            timeout,
            link,
        );
        if self.can_push(link) {
            push::send(&pushed, self, link);
        } else {
            push::arm(&pushed, self, link);
            self.push_buffer.push(Arc::clone(&pushed));
        }
        Ok(pushed)
    }

    /// Start leaving; the channel closes once the leave push resolves
    ///
    /// When the leave cannot reach the server the push is resolved as a
    /// timeout right away, which closes the channel locally. Leaving again
    /// returns the pending leave push.
    pub(crate) fn leave(
        &mut self,
        timeout: Duration,
        link: &mut Link,
        out: &mut Vec<Invocation>,
    ) -> SharedPush {
        if let Some(pending) = self.leave_push.as_ref().filter(|_| self.is_closed_or_leaving()) {
            return Arc::clone(pending);
        }
        let could_push = self.can_push(link);
        self.state = ChannelState::Leaving;
        self.rejoin_timer.reset();
        info!(topic = %self.topic, "Leaving channel");
        link.log("channel", "leave", Some(&self.topic));

        let leave = PushCore::create(
            self.id,
            &self.topic,
            PushKind::Leave,
            PHX_LEAVE,
            json!({}),
            timeout,
            link,
        );
        self.leave_push = Some(Arc::clone(&leave));
        push::send(&leave, self, link);
        if !could_push {
            let expired = leave.lock().ref_event().map(|ref_event| {
                Message::timeout_reply(self.topic.clone(), ref_event, None)
            });
            if let Some(reply) = expired {
                let event = reply.event.clone();
                self.trigger(&event, Arc::new(reply), link, out);
            }
        }
        leave
    }

    /// Route one event through internal reactions, then user bindings
    pub(crate) fn trigger(
        &mut self,
        event: &str,
        message: Arc<Message>,
        link: &mut Link,
        out: &mut Vec<Invocation>,
    ) {
        match event {
            PHX_CLOSE => self.on_close(link),
            PHX_ERROR => self.on_error(link),
            PHX_REPLY => {
                if let Some(reference) = message.reference.as_deref() {
                    self.trigger(&reply_event_name(reference), Arc::clone(&message), link, out);
                }
            }
            _ => {}
        }

        if let Some(pushed) = self.replies.remove(event) {
            self.resolve(&pushed, Arc::clone(&message), link, out);
        }
        self.bindings.collect(event, &message, out);
    }

    fn resolve(
        &mut self,
        pushed: &SharedPush,
        reply: Arc<Message>,
        link: &mut Link,
        out: &mut Vec<Invocation>,
    ) {
        let outcome = pushed.lock().settle(reply, out);
        match outcome {
            Some((PushKind::Join, ReplyStatus::Ok)) => self.on_join_ok(link),
            Some((PushKind::Join, ReplyStatus::Error)) => self.on_join_error(link),
            Some((PushKind::Join, ReplyStatus::Timeout)) => self.on_join_timeout(link),
            Some((PushKind::Leave, ReplyStatus::Ok | ReplyStatus::Timeout)) => {
                let close =
                    Message::lifecycle(self.topic.clone(), PHX_CLOSE, self.join_ref.clone());
                self.trigger(PHX_CLOSE, Arc::new(close), link, out);
            }
            _ => {}
        }
    }

    fn on_join_ok(&mut self, link: &mut Link) {
        self.state = ChannelState::Joined;
        self.rejoin_timer.reset();
        info!(topic = %self.topic, "Joined channel");
        link.log("channel", "joined", Some(&self.topic));

        for buffered in std::mem::take(&mut self.push_buffer) {
            push::send(&buffered, self, link);
        }
    }

    fn on_join_error(&mut self, link: &mut Link) {
        warn!(topic = %self.topic, "Join rejected");
        self.state = ChannelState::Errored;
        if link.is_connected() {
            self.rejoin_timer.schedule_timeout();
        }
    }

    fn on_join_timeout(&mut self, link: &mut Link) {
        if self.state != ChannelState::Joining {
            return;
        }
        warn!(topic = %self.topic, timeout = ?self.timeout, "Join timed out");
        link.log("channel", "join timeout", Some(&self.topic));

        let leave = PushCore::create(
            self.id,
            &self.topic,
            PushKind::Regular,
            PHX_LEAVE,
            json!({}),
            self.timeout,
            link,
        );
        push::send(&leave, self, link);

        self.state = ChannelState::Errored;
        let join_push = Arc::clone(&self.join_push);
        join_push.lock().reset(self);
        self.rejoin_timer.schedule_timeout();
    }

    fn on_close(&mut self, link: &mut Link) {
        self.rejoin_timer.reset();
        self.state = ChannelState::Closed;
        self.removed = true;
        info!(topic = %self.topic, "Channel closed");
        link.log("channel", "close", Some(&self.topic));
    }

    fn on_error(&mut self, link: &mut Link) {
        if self.is_closed_or_leaving() {
            return;
        }
        warn!(topic = %self.topic, "Channel errored");
        link.log("channel", "error", Some(&self.topic));
        self.state = ChannelState::Errored;
        if link.is_connected() {
            self.rejoin_timer.schedule_timeout();
        }
    }

    fn rejoin(&mut self, timeout: Duration, link: &mut Link) {
        if self.state == ChannelState::Leaving {
            return;
        }
        self.state = ChannelState::Joining;
        let join_push = Arc::clone(&self.join_push);
        push::resend(&join_push, timeout, self, link);
    }

    /// Rejoin now if connected and keep the backoff timer armed meanwhile
    pub(crate) fn rejoin_until_connected(&mut self, link: &mut Link) {
        self.rejoin_timer.schedule_timeout();
        if link.is_connected() {
            self.rejoin(self.timeout, link);
        }
    }

    pub(crate) fn on_rejoin_tick(&mut self, tick: TimerTick, link: &mut Link) {
        if self.rejoin_timer.fire(tick) {
            debug!(topic = %self.topic, tries = self.rejoin_timer.tries(), "Rejoin timer fired");
            self.rejoin_until_connected(link);
        }
    }

    /// Rejoin right away after the socket reopened
    pub(crate) fn rejoin_errored(&mut self, link: &mut Link) {
        if self.state == ChannelState::Errored {
            self.rejoin_timer.reset();
            self.rejoin(self.timeout, link);
        }
    }
}

impl fmt::Debug for ChannelCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCore")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("state", &self.state)
            .field("join_ref", &self.join_ref)
            .field("buffered", &self.push_buffer.len())
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Handle to one topic conversation on a [`Socket`]
///
/// Obtained from [`Socket::channel`]. Cloning the handle does not create a
/// new channel. Once the channel reached `Closed` and was dropped by its
/// socket, operations that need it return [`PhoenixError::ChannelClosed`].
#[derive(Clone)]
pub struct Channel {
    id: ChannelId,
    topic: String,
    socket: Socket,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, topic: String, socket: Socket) -> Self {
        Self { id, topic, socket }
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    fn with_core<T>(
        &self,
        f: impl FnOnce(&mut ChannelCore, &mut Link, &mut Vec<Invocation>) -> Result<T>,
    ) -> Result<T> {
        let mut out = Vec::new();
        let result = self
            .socket
            .with_channel(self.id, |core, link| f(core, link, &mut out))
            .unwrap_or_else(|| Err(PhoenixError::ChannelClosed(self.topic.clone())));
        dispatch(out);
        result
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Join with the socket's default timeout
    pub fn join(&self) -> Result<Push> {
        self.join_with_timeout(self.socket.timeout())
    }

    /// Join the topic; allowed once per channel instance
    pub fn join_with_timeout(&self, timeout: Duration) -> Result<Push> {
        self.with_core(|core, link, _| core.join(timeout, link))
            .map(Push::new)
    }

    /// Push `event` with the socket's default timeout
    pub fn push(&self, event: &str, payload: Value) -> Result<Push> {
        self.push_with_timeout(event, payload, self.socket.timeout())
    }

    /// Send `event` now, or buffer it until the channel is joined
    pub fn push_with_timeout(
        &self,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Push> {
        self.with_core(|core, link, _| core.push(event, payload, timeout, link))
            .map(Push::new)
    }

    pub fn leave(&self) -> Result<Push> {
        self.leave_with_timeout(self.socket.timeout())
    }

    pub fn leave_with_timeout(&self, timeout: Duration) -> Result<Push> {
        self.with_core(|core, link, out| Ok(core.leave(timeout, link, out)))
            .map(Push::new)
    }

    /// Register a callback receiving the payload of every `event`
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> Result<BindingRef>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.bind(event, Callback::payload(callback))
    }

    /// Register a callback of any shape
    pub fn bind(&self, event: impl Into<String>, callback: Callback) -> Result<BindingRef> {
        let event = event.into();
        self.with_core(move |core, _, _| Ok(core.bindings.on(event, callback)))
    }

    pub fn on_close<F>(&self, callback: F) -> Result<BindingRef>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on(PHX_CLOSE, callback)
    }

    pub fn on_error<F>(&self, callback: F) -> Result<BindingRef>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on(PHX_ERROR, callback)
    }

    /// Remove all bindings for `event`, or just the one with `reference`
    pub fn off(&self, event: &str, reference: Option<BindingRef>) -> Result<()> {
        self.with_core(|core, _, _| {
            core.bindings.off(event, reference);
            Ok(())
        })
    }

    /// Dispatch `message` as if it had arrived for this channel
    pub fn trigger(&self, message: Message) -> Result<()> {
        self.with_core(|core, link, out| {
            let event = message.event.clone();
            core.trigger(&event, Arc::new(message), link, out);
            Ok(())
        })
    }

    /// Current state; `Closed` once the socket dropped the channel
    pub fn state(&self) -> ChannelState {
        self.with_core(|core, _, _| Ok(core.state()))
            .unwrap_or(ChannelState::Closed)
    }

    pub fn join_ref(&self) -> Option<String> {
        self.with_core(|core, _, _| Ok(core.join_ref().map(str::to_string)))
            .ok()
            .flatten()
    }

    pub fn is_member(&self, message: &Message) -> bool {
        self.with_core(|core, _, _| Ok(core.is_member(message)))
            .unwrap_or(false)
    }

    pub fn can_push(&self) -> bool {
        self.with_core(|core, link, _| Ok(core.can_push(link)))
            .unwrap_or(false)
    }

    pub fn is_joined(&self) -> bool {
        self.state() == ChannelState::Joined
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}
