//! The hook bus.
//!
//! A [`HookBus`] is a table of `(subscriber, event, callback)` registrations.
//! Registering appends to the table; sending scans it and invokes every
//! callback registered for the event, in registration order, on the caller's
//! thread.
//!
//! ```text
//! handler(A, "pre_action", f)   ─┐
//! handler(B, "pre_action", g)    ├─ table (append-only)
//! handler(A, "post_action", h)  ─┘
//!
//! send(X, "pre_action")  →  f(signal), then g(signal)
//! ```
//!
//! The bus is single-threaded by construction (`Rc`/`RefCell`). Share it
//! between components with `Rc<HookBus>`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, trace};

use crate::HookError;

/// Identity of a component that registers or sends hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocates a process-unique identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identity.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a callback receives when an event is sent.
#[derive(Debug, Clone, Copy)]
pub struct Signal<'a> {
    /// Identity of the sender
    pub sender: SubscriberId,
    /// The event name
    pub event: &'a str,
    /// Extra arguments passed through from `send`
    pub args: &'a [Value],
}

/// A callback's answer to a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Keep invoking the remaining callbacks.
    Continue(Value),
    /// Skip the remaining callbacks for this send.
    Stop(Value),
}

impl Reply {
    /// Continue with no value. What most callbacks return.
    pub fn done() -> Self {
        Reply::Continue(Value::Null)
    }

    /// Stop with no value.
    pub fn stop() -> Self {
        Reply::Stop(Value::Null)
    }

    /// Returns true if this reply halts the send.
    pub fn is_stop(&self) -> bool {
        matches!(self, Reply::Stop(_))
    }

    /// Returns the carried value.
    pub fn value(&self) -> &Value {
        match self {
            Reply::Continue(value) | Reply::Stop(value) => value,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Reply::Continue(value) | Reply::Stop(value) => value,
        }
    }
}

/// Type alias for hook callbacks.
pub type HandlerFn = Rc<dyn Fn(&Signal<'_>) -> Result<Reply, HookError>>;

struct Registration {
    subscriber: SubscriberId,
    event: String,
    callback: HandlerFn,
}

/// One callback's reply value, tagged with who produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub subscriber: SubscriberId,
    pub value: Value,
}

/// Everything a send produced, in invocation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Responses {
    entries: Vec<Response>,
    stopped: bool,
}

impl Responses {
    /// Number of callbacks that ran.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no callback ran.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a callback replied [`Reply::Stop`].
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Iterates over the responses in invocation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Response> {
        self.entries.iter()
    }

    /// The last response, typically the one that stopped the send.
    pub fn last(&self) -> Option<&Response> {
        self.entries.last()
    }

    /// Collects the reply values in invocation order.
    pub fn values(&self) -> Vec<&Value> {
        self.entries.iter().map(|r| &r.value).collect()
    }
}

impl IntoIterator for Responses {
    type Item = Response;
    type IntoIter = std::vec::IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Responses {
    type Item = &'a Response;
    type IntoIter = std::slice::Iter<'a, Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Named-event dispatcher with ordered synchronous invocation.
#[derive(Default)]
pub struct HookBus {
    registrations: RefCell<Vec<Registration>>,
}

impl HookBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to run whenever `event` is sent.
    ///
    /// There is no uniqueness constraint: the same subscriber may register
    /// several callbacks for one event and all of them run.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cadence_signal::{HookBus, Reply, SubscriberId};
    ///
    /// let bus = HookBus::new();
    /// let me = SubscriberId::next();
    /// bus.handler(me, "pre_action", |signal| {
    ///     println!("{} from {}", signal.event, signal.sender);
    ///     Ok(Reply::done())
    /// });
    /// assert_eq!(bus.handler_count("pre_action"), 1);
    /// ```
    pub fn handler<F>(&self, subscriber: SubscriberId, event: impl Into<String>, callback: F)
    where
        F: Fn(&Signal<'_>) -> Result<Reply, HookError> + 'static,
    {
        let event = event.into();
        trace!(%subscriber, event = %event, "registering hook");
        self.registrations.borrow_mut().push(Registration {
            subscriber,
            event,
            callback: Rc::new(callback),
        });
    }

    /// Invokes every callback registered for `event`, in registration order.
    ///
    /// A callback error aborts the send and is returned as-is. A
    /// [`Reply::Stop`] skips the remaining callbacks. Callbacks registered
    /// while the send is running are picked up by the next send.
    pub fn send(
        &self,
        sender: SubscriberId,
        event: &str,
        args: &[Value],
    ) -> Result<Responses, HookError> {
        let matching: Vec<(SubscriberId, HandlerFn)> = self
            .registrations
            .borrow()
            .iter()
            .filter(|r| r.event == event)
            .map(|r| (r.subscriber, Rc::clone(&r.callback)))
            .collect();

        debug!(%sender, event, handlers = matching.len(), "sending signal");

        let signal = Signal {
            sender,
            event,
            args,
        };
        let mut responses = Responses::default();

        for (subscriber, callback) in matching {
            trace!(%subscriber, event, "invoking hook");
            let reply = callback(&signal).map_err(|err| {
                if err.subscriber.is_some() {
                    err
                } else {
                    err.with_subscriber(subscriber)
                }
            })?;
            let stop = reply.is_stop();
            responses.entries.push(Response {
                subscriber,
                value: reply.into_value(),
            });
            if stop {
                debug!(%subscriber, event, "hook stopped signal");
                responses.stopped = true;
                break;
            }
        }

        Ok(responses)
    }

    /// Number of callbacks registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Number of callbacks registered by `subscriber`, across all events.
    pub fn subscriber_count(&self, subscriber: SubscriberId) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| r.subscriber == subscriber)
            .count()
    }

    /// Distinct event names, in order of first registration.
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = Vec::new();
        for r in self.registrations.borrow().iter() {
            if !events.contains(&r.event) {
                events.push(r.event.clone());
            }
        }
        events
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.borrow().is_empty()
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus")
            .field("registrations", &self.registrations.borrow().len())
            .field("events", &self.events())
            .finish()
    }
}
