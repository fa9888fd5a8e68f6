//! Hook error type.

use thiserror::Error;

use crate::SubscriberId;

/// Error returned by a hook callback.
///
/// The bus performs no recovery: the first failing callback aborts the send
/// and this error is returned to the sender unchanged.
#[derive(Debug, Error)]
#[error("hook error ({event}): {message}")]
pub struct HookError {
    /// Human-readable error message
    pub message: String,
    /// The event being sent when the error occurred
    pub event: String,
    /// The subscriber whose callback failed, once known
    pub subscriber: Option<SubscriberId>,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HookError {
    /// Creates a new hook error for `event`.
    pub fn new(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event: event.into(),
            subscriber: None,
            source: None,
        }
    }

    /// Wraps an arbitrary error raised inside a callback.
    pub fn from_source<E>(event: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        let source = source.into();
        Self {
            message: source.to_string(),
            event: event.into(),
            subscriber: None,
            source: Some(source),
        }
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }

    /// Records which subscriber's callback failed.
    pub fn with_subscriber(mut self, subscriber: SubscriberId) -> Self {
        self.subscriber = Some(subscriber);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_hook_error_display() {
        let err = HookError::new("pre_action", "not authorized");
        assert_eq!(err.to_string(), "hook error (pre_action): not authorized");
        assert!(err.source().is_none());
        assert!(err.subscriber.is_none());
    }

    #[test]
    fn test_hook_error_from_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = HookError::from_source("post_action", io);
        assert_eq!(err.message, "disk full");
        assert_eq!(err.event, "post_action");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_hook_error_with_subscriber() {
        let id = SubscriberId::next();
        let err = HookError::new("pre_action", "boom").with_subscriber(id);
        assert_eq!(err.subscriber, Some(id));
    }
}
