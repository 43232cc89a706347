//! Observer list for lifecycle events.
//!
//! Subscribers are either callbacks or channel senders. Having no
//! subscribers is simply the empty list; [`EventNotifier::notify`] is
//! then a no-op.
//!
//! Delivery runs outside the list lock: the list is swapped out,
//! delivered to, and merged back. A callback may therefore subscribe,
//! unsubscribe (itself included) or notify on the same notifier.

use std::fmt;
use std::mem;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tether_core::LifecycleEvent;

/// Identifies a subscription for [`EventNotifier::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Subscriber {
    Callback(Box<dyn FnMut(&LifecycleEvent) + Send>),
    Channel(Sender<LifecycleEvent>),
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(SubscriptionId, Subscriber)>,
    /// Swapped out by a `notify` in progress.
    in_flight: Vec<SubscriptionId>,
    /// In-flight subscriptions unsubscribed during delivery.
    cancelled: Vec<SubscriptionId>,
}

/// Multicasts lifecycle events to every current subscriber.
///
/// Events are delivered synchronously, in subscription order, on the
/// thread that calls [`notify`](Self::notify). Channel subscribers whose
/// receiver has been dropped are pruned on the next delivery.
#[derive(Default)]
pub struct EventNotifier {
    subscribers: Mutex<Subscribers>,
}

impl EventNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    ///
    /// A callback registered during delivery first receives the next event.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&LifecycleEvent) + Send + 'static,
    {
        self.push(Subscriber::Callback(Box::new(callback)))
    }

    /// Register an unbounded channel and return its receiving end.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<LifecycleEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (self.push(Subscriber::Channel(tx)), rx)
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.list.len();
        subs.list.retain(|(sid, _)| *sid != id);
        if subs.list.len() != before {
            return true;
        }
        if subs.in_flight.contains(&id) && !subs.cancelled.contains(&id) {
            subs.cancelled.push(id);
            return true;
        }
        false
    }

    /// Deliver one event to every subscriber.
    pub fn notify(&self, event: &LifecycleEvent) {
        let mut taken = {
            let mut subs = self.subscribers.lock();
            let taken = mem::take(&mut subs.list);
            subs.in_flight.extend(taken.iter().map(|(id, _)| *id));
            taken
        };
        let ids: Vec<SubscriptionId> = taken.iter().map(|(id, _)| *id).collect();

        taken.retain_mut(|(_, sub)| match sub {
            Subscriber::Callback(f) => {
                f(event);
                true
            }
            Subscriber::Channel(tx) => tx.send(*event).is_ok(),
        });

        let mut subs = self.subscribers.lock();
        let Subscribers {
            list,
            in_flight,
            cancelled,
            ..
        } = &mut *subs;
        taken.retain(|(id, _)| !cancelled.contains(id));
        in_flight.retain(|id| !ids.contains(id));
        cancelled.retain(|id| !ids.contains(id));
        // Swapped-out subscriptions are older than any added meanwhile.
        taken.append(list);
        *list = taken;
    }

    /// Number of live subscriptions.
    ///
    /// Subscriptions swapped out by a delivery in progress are counted.
    pub fn subscriber_count(&self) -> usize {
        let subs = self.subscribers.lock();
        subs.list.len() + subs.in_flight.len() - subs.cancelled.len()
    }

    fn push(&self, subscriber: Subscriber) -> SubscriptionId {
        let mut subs = self.subscribers.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.list.push((id, subscriber));
        id
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
