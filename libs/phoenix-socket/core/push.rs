//! One outbound request and its reply lifecycle
//!
//! A push is sent at most once per arming. Arming draws a fresh ref from the
//! socket, subscribes the channel's `chan_reply_<ref>` slot to this push and
//! starts the timeout timer. Whatever arrives first (the server's reply or
//! the synthesized timeout) resolves the push; everything after is ignored.

use crate::core::binding::{Bindings, Callback, Invocation, Projection};
use crate::core::channel::{ChannelCore, ChannelId};
use crate::core::message::{reply_event_name, Message, ReplyStatus};
use crate::core::socket::{Event, Link};
use crate::core::timer::{Interval, Timer, TimerTick};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{error, trace, warn};

pub(crate) type SharedPush = Arc<Mutex<PushCore>>;

/// What the owning channel does once the push resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushKind {
    Join,
    Leave,
    Regular,
}

pub(crate) struct PushCore {
    channel: ChannelId,
    topic: String,
    kind: PushKind,
    event: String,
    payload: Value,
    timeout: Duration,
    reference: Option<String>,
    ref_event: Option<String>,
    received: Option<Arc<Message>>,
    status: Option<ReplyStatus>,
    timer: Timer,
    bindings: Bindings,
}

impl PushCore {
    pub(crate) fn create(
        channel: ChannelId,
        topic: &str,
        kind: PushKind,
        event: impl Into<String>,
        payload: Value,
        timeout: Duration,
        link: &Link,
    ) -> SharedPush {
        let topic = topic.to_string();
        let event = event.into();
        Arc::new_cyclic(|weak: &Weak<Mutex<PushCore>>| {
            let weak = weak.clone();
            let queue = link.queue();
            let timer = Timer::fixed(
                "push_timeout",
                timeout,
                false,
                link.runtime(),
                move |tick| {
                    let _ = queue.send(Event::PushTimeout(weak.clone(), tick));
                },
            );
            Mutex::new(PushCore {
                channel,
                topic,
                kind,
                event,
                payload,
                timeout,
                reference: None,
                ref_event: None,
                received: None,
                status: None,
                timer,
                bindings: Bindings::new(Projection::Response),
            })
        })
    }

    pub(crate) fn channel(&self) -> ChannelId {
        self.channel
    }

    pub(crate) fn ref_event(&self) -> Option<&str> {
        self.ref_event.as_deref()
    }

    pub(crate) fn has_received(&self, status: ReplyStatus) -> bool {
        self.status == Some(status)
    }

    /// Accept a timeout tick and build the reply it stands for
    ///
    /// `None` when the tick is stale or the push is no longer subscribed.
    pub(crate) fn take_timeout(&mut self, tick: TimerTick) -> Option<Message> {
        if !self.timer.fire(tick) {
            return None;
        }
        let ref_event = self.ref_event.clone()?;
        Some(Message::timeout_reply(
            self.topic.clone(),
            ref_event,
            self.reference.clone(),
        ))
    }

    /// Arm: fresh ref, reply subscription on the channel, timeout timer
    fn start_timeout(&mut self, this: &SharedPush, channel: &mut ChannelCore, link: &mut Link) {
        self.cancel_ref_event(channel);

        let reference = link.make_ref();
        let ref_event = reply_event_name(&reference);
        channel.subscribe_reply(ref_event.clone(), Arc::clone(this));
        if self.kind == PushKind::Join {
            channel.set_join_ref(Some(reference.clone()));
        }
        self.reference = Some(reference);
        self.ref_event = Some(ref_event);
        self.timer.schedule_timeout();
    }

    fn cancel_ref_event(&mut self, channel: &mut ChannelCore) {
        if let Some(ref_event) = self.ref_event.take() {
            channel.unsubscribe_reply(&ref_event);
        }
    }

    /// Clear ref, subscription and received reply together
    pub(crate) fn reset(&mut self, channel: &mut ChannelCore) {
        self.cancel_ref_event(channel);
        self.timer.reset();
        self.reference = None;
        self.received = None;
        self.status = None;
        if self.kind == PushKind::Join {
            channel.set_join_ref(None);
        }
    }

    /// Record the reply and queue the matching status callbacks
    ///
    /// The caller has already removed the reply subscription. A reply
    /// without a recognised status resolves as `error`. Returns what the
    /// owning channel needs to react to, or `None` if the push had already
    /// been resolved.
    pub(crate) fn settle(
        &mut self,
        reply: Arc<Message>,
        out: &mut Vec<Invocation>,
    ) -> Option<(PushKind, ReplyStatus)> {
        if self.received.is_some() {
            return None;
        }
        self.ref_event = None;
        self.timer.reset();
        self.received = Some(Arc::clone(&reply));

        let status = reply.status().unwrap_or_else(|| {
            warn!(topic = %self.topic, event = %self.event, "Reply without a known status");
            ReplyStatus::Error
        });
        self.status = Some(status);
        trace!(topic = %self.topic, event = %self.event, %status, "Push resolved");
        self.bindings.collect(status.as_str(), &reply, out);
        Some((self.kind, status))
    }

    fn frame(&self, join_ref: Option<String>) -> Message {
        let payload = if self.payload.is_null() {
            Value::Object(Default::default())
        } else {
            self.payload.clone()
        };
        Message::new(self.topic.clone(), self.event.clone(), payload)
            .with_refs(join_ref, self.reference.clone())
    }
}

/// Arm `push` and hand its frame to the socket
///
/// A push that already timed out is never sent again.
pub(crate) fn send(push: &SharedPush, channel: &mut ChannelCore, link: &mut Link) {
    let mut core = push.lock();
    if core.has_received(ReplyStatus::Timeout) {
        return;
    }
    core.start_timeout(push, channel, link);

    let frame = core.frame(channel.join_ref().map(str::to_string));
    match frame.encode() {
        Ok(text) => {
            link.log("push", "sending", Some(&text));
            link.push(text);
        }
        Err(e) => {
            error!(topic = %frame.topic, event = %frame.event, "Failed to encode push: {}", e)
        }
    }
}

/// Arm `push` without sending; used for pushes buffered on a channel
pub(crate) fn arm(push: &SharedPush, channel: &mut ChannelCore, link: &mut Link) {
    push.lock().start_timeout(push, channel, link);
}

/// Reset and send again with a new timeout
pub(crate) fn resend(
    push: &SharedPush,
    timeout: Duration,
    channel: &mut ChannelCore,
    link: &mut Link,
) {
    {
        let mut core = push.lock();
        core.timeout = timeout;
        core.timer.set_interval(Interval::Fixed(timeout));
        core.reset(channel);
    }
    send(push, channel, link);
}

impl fmt::Debug for PushCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushCore")
            .field("topic", &self.topic)
            .field("event", &self.event)
            .field("kind", &self.kind)
            .field("reference", &self.reference)
            .field("timeout", &self.timeout)
            .field("status", &self.status)
            .finish()
    }
}

/// Handle to a push returned by [`Channel::push`](crate::Channel::push),
/// [`Channel::join`](crate::Channel::join) and
/// [`Channel::leave`](crate::Channel::leave)
///
/// Status callbacks receive the reply's `response` field. Registering a
/// callback for a status that was already received invokes it immediately
/// and keeps it registered.
#[derive(Clone)]
pub struct Push {
    core: SharedPush,
}

impl Push {
    pub(crate) fn new(core: SharedPush) -> Self {
        Self { core }
    }

    /// Register `callback` for replies with `status`
    pub fn receive(&self, status: ReplyStatus, callback: Callback) -> &Self {
        let replay = {
            let mut core = self.core.lock();
            core.bindings.on(status.as_str(), callback.clone());
            let replay = core.status == Some(status);
            core.received.clone().filter(|_| replay)
        };
        if let Some(reply) = replay {
            callback.invoke(&reply, reply.response());
        }
        self
    }

    pub fn receive_ok<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.receive(ReplyStatus::Ok, Callback::payload(callback))
    }

    pub fn receive_error<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.receive(ReplyStatus::Error, Callback::payload(callback))
    }

    pub fn receive_timeout<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.receive(ReplyStatus::Timeout, Callback::none(callback))
    }

    /// Ref of the current arming, if armed
    pub fn reference(&self) -> Option<String> {
        self.core.lock().reference.clone()
    }

    pub fn event(&self) -> String {
        self.core.lock().event.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.core.lock().timeout
    }

    /// Status of the reply received so far
    pub fn status(&self) -> Option<ReplyStatus> {
        self.core.lock().status
    }

    /// The full reply received so far
    pub fn reply(&self) -> Option<Message> {
        self.core.lock().received.as_ref().map(|r| (**r).clone())
    }

    pub fn has_received(&self, status: ReplyStatus) -> bool {
        self.core.lock().has_received(status)
    }
}

impl fmt::Debug for Push {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.lock().fmt(f)
    }
}
