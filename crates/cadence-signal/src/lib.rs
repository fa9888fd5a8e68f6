//! Named-event hook bus for command lifecycles.
//!
//! `cadence-signal` lets code attach behavior to named extension points
//! without modifying the component that fires them. Any number of callbacks
//! may register for an event; sending the event runs them synchronously, in
//! registration order, on the sender's thread.
//!
//! # Features
//!
//! - **Append-only registration**: `(subscriber, event, callback)` tuples
//! - **Ordered dispatch**: registration order, never subscriber order
//! - **Inspectable replies**: each callback returns a [`Reply`]; senders get
//!   them back as [`Responses`] and a [`Reply::Stop`] halts the send
//! - **No isolation**: a failing callback aborts the send with its [`HookError`]
//!
//! # Example
//!
//! ```rust
//! use cadence_signal::{HookBus, Reply, SubscriberId, PRE_ACTION};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let bus = HookBus::new();
//! let calls = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&calls);
//!
//! bus.handler(SubscriberId::next(), PRE_ACTION, move |_signal| {
//!     counter.set(counter.get() + 1);
//!     Ok(Reply::done())
//! });
//!
//! bus.send(SubscriberId::next(), PRE_ACTION, &[])?;
//! assert_eq!(calls.get(), 1);
//! # Ok::<(), cadence_signal::HookError>(())
//! ```

mod bus;
mod error;

pub use bus::{HandlerFn, HookBus, Reply, Response, Responses, Signal, SubscriberId};
pub use error::HookError;

/// Event sent before a command's action runs.
pub const PRE_ACTION: &str = "pre_action";

/// Event sent after a command's action completes.
pub const POST_ACTION: &str = "post_action";
