//! Ordered event-name → callback registry
//!
//! A binding is registered under an event name and holds one of three
//! callback shapes. Triggering an event invokes every binding with that
//! name, in registration order, handing each callback the projection it
//! asked for.

use crate::core::message::Message;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handle returned by [`Bindings::on`], used to remove one binding
pub type BindingRef = u64;

/// Callback shapes accepted by a binding registry
#[derive(Clone)]
pub enum Callback {
    /// Invoked without arguments
    None(Arc<dyn Fn() + Send + Sync>),
    /// Invoked with the payload projection of the message
    Payload(Arc<dyn Fn(&Value) + Send + Sync>),
    /// Invoked with the whole message
    Message(Arc<dyn Fn(&Message) + Send + Sync>),
}

impl Callback {
    pub fn none<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Callback::None(Arc::new(f))
    }

    pub fn payload<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Callback::Payload(Arc::new(f))
    }

    pub fn message<F>(f: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Callback::Message(Arc::new(f))
    }

    /// Invoke with the projection matching this callback's shape
    pub fn invoke(&self, message: &Message, payload: &Value) {
        match self {
            Callback::None(f) => f(),
            Callback::Payload(f) => f(payload),
            Callback::Message(f) => f(message),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::None(_) => f.write_str("Callback::None"),
            Callback::Payload(_) => f.write_str("Callback::Payload"),
            Callback::Message(_) => f.write_str("Callback::Message"),
        }
    }
}

/// Which part of a message payload callbacks receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The frame payload as-is (channel events)
    Payload,
    /// The reply envelope's `response` field (push status callbacks)
    Response,
}

impl Projection {
    pub fn select<'a>(&self, message: &'a Message) -> &'a Value {
        match self {
            Projection::Payload => &message.payload,
            Projection::Response => message.response(),
        }
    }
}

struct Binding {
    name: String,
    reference: BindingRef,
    callback: Callback,
}

/// Ordered multimap from event name to callback
pub struct Bindings {
    bindings: Vec<Binding>,
    next_ref: BindingRef,
    projection: Projection,
}

impl Bindings {
    pub fn new(projection: Projection) -> Self {
        Self {
            bindings: Vec::new(),
            next_ref: 0,
            projection,
        }
    }

    /// Append a binding and return its handle
    pub fn on(&mut self, name: impl Into<String>, callback: Callback) -> BindingRef {
        let reference = self.next_ref;
        self.next_ref += 1;
        self.bindings.push(Binding {
            name: name.into(),
            reference,
            callback,
        });
        reference
    }

    /// Remove every binding named `name`, or only the one with `reference`
    pub fn off(&mut self, name: &str, reference: Option<BindingRef>) {
        self.bindings.retain(|binding| {
            binding.name != name || reference.is_some_and(|r| r != binding.reference)
        });
    }

    /// Invoke every binding named `name`, in registration order
    pub fn trigger(&self, name: &str, message: &Message) {
        let payload = self.projection.select(message);
        for binding in self.bindings.iter().filter(|b| b.name == name) {
            binding.callback.invoke(message, payload);
        }
    }

    /// Queue every binding named `name` for invocation once locks are released
    pub(crate) fn collect(&self, name: &str, message: &Arc<Message>, out: &mut Vec<Invocation>) {
        out.extend(
            self.bindings
                .iter()
                .filter(|b| b.name == name)
                .map(|b| Invocation {
                    callback: b.callback.clone(),
                    message: Arc::clone(message),
                    projection: self.projection,
                }),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| (&b.name, b.reference, &b.callback)))
            .finish()
    }
}

/// A callback invocation deferred until the owner's lock is released
pub(crate) struct Invocation {
    callback: Callback,
    message: Arc<Message>,
    projection: Projection,
}

impl Invocation {
    pub(crate) fn run(self) {
        let payload = self.projection.select(&self.message);
        self.callback.invoke(&self.message, payload);
    }
}

/// Run deferred invocations in order
pub(crate) fn dispatch(invocations: Vec<Invocation>) {
    for invocation in invocations {
        invocation.run();
    }
}
