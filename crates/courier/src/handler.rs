//! The handler capability: what runs when a message matches a rule.

use courier_wire::Message;

/// A message handler attached to a rule.
///
/// Implemented by plain closures through the blanket impl below, or by
/// user-defined types that carry state across invocations.
///
/// The return value only matters for request-flagged messages: the server
/// writes it back as the reply body (an empty reply when `None`). For
/// everything else it is discarded.
///
/// Handlers run as detached tasks. The dispatcher does not wait for them
/// and never observes their outcome; a panicking handler takes down only
/// its own task.
pub trait Handler: Send + Sync + 'static {
    fn invoke(&self, msg: &Message) -> Option<Vec<u8>>;
}

impl<F> Handler for F
where
    F: Fn(&Message) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    fn invoke(&self, msg: &Message) -> Option<Vec<u8>> {
        self(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_implements_handler() {
        let handler = |msg: &Message| -> Option<Vec<u8>> {
            Some(msg.name.clone().into_bytes())
        };
        let msg = Message {
            name: "ping".into(),
            ..Message::default()
        };
        assert_eq!(handler.invoke(&msg), Some(b"ping".to_vec()));
    }

    #[test]
    fn test_stateful_type_implements_handler() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize);

        impl Handler for Counter {
            fn invoke(&self, _msg: &Message) -> Option<Vec<u8>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                None
            }
        }

        let counter = Counter(AtomicUsize::new(0));
        counter.invoke(&Message::default());
        counter.invoke(&Message::default());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
