//! In-process, per-context publish/subscribe of lifecycle events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use easydep_types::LifecycleEvent;

pub type Handler = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Default priority for subscribers that don't care about ordering
/// relative to others; lower values run earlier.
pub const DEFAULT_PRIORITY: i32 = i32::MAX / 2;

struct Subscription {
    kind: Option<&'static str>,
    priority: i32,
    seq: u64,
    handler: Handler,
}

/// Dispatches lifecycle events to subscribers in ascending priority
/// order (ties broken by subscription order), swallowing and logging
/// any subscriber panic so one bad handler can't break delivery to the
/// rest or abort the publishing stage.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_seq: Mutex<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `kind`, when set, restricts delivery to events whose
    /// [`LifecycleEvent::kind`] matches exactly; `None` subscribes to
    /// every event (a catch-all, e.g. the lifecycle-script bridge).
    pub fn subscribe(&self, kind: Option<&'static str>, priority: i32, handler: Handler) {
        let seq = {
            let mut next = self.next_seq.lock().expect("event bus lock poisoned");
            let seq = *next;
            *next += 1;
            seq
        };
        let mut subs = self.subscriptions.lock().expect("event bus lock poisoned");
        subs.push(Subscription {
            kind,
            priority,
            seq,
            handler,
        });
        subs.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.seq.cmp(&b.seq)));
    }

    /// Dispatch is synchronous on the publisher's thread, holding the
    /// subscription lock for the whole pass; handlers must not
    /// subscribe or publish reentrantly.
    pub fn publish(&self, event: LifecycleEvent) {
        let subs = self.subscriptions.lock().expect("event bus lock poisoned");
        for sub in subs.iter() {
            if sub.kind.is_some_and(|k| k != event.kind()) {
                continue;
            }
            let handler = &sub.handler;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if let Err(panic) = outcome {
                let message = panic_message(&panic);
                tracing::warn!(event = event.kind(), %message, "event subscriber panicked");
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delivers_in_priority_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        bus.subscribe(None, 10, Box::new(move |_| o1.lock().unwrap().push("second")));
        let o2 = Arc::clone(&order);
        bus.subscribe(None, 0, Box::new(move |_| o2.lock().unwrap().push("first")));

        bus.publish(LifecycleEvent::ChainStarted { release_id: 1 });
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn kind_filter_restricts_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.subscribe(
            Some("chain_finished"),
            DEFAULT_PRIORITY,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(LifecycleEvent::ChainStarted { release_id: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.publish(LifecycleEvent::ChainFinished { release_id: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(None, 0, Box::new(|_| panic!("boom")));
        let c = Arc::clone(&count);
        bus.subscribe(
            None,
            1,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(LifecycleEvent::ChainStarted { release_id: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
