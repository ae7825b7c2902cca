use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::UserId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

/// Follow-state change of the current user towards `user_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStateChanged {
    pub user_id: UserId,
    pub is_following: bool,
    pub action: FollowAction,
}

impl FollowStateChanged {
    pub fn followed(user_id: UserId) -> Self {
        Self {
            user_id,
            is_following: true,
            action: FollowAction::Follow,
        }
    }

    pub fn unfollowed(user_id: UserId) -> Self {
        Self {
            user_id,
            is_following: false,
            action: FollowAction::Unfollow,
        }
    }
}

type Deliver = Box<dyn Fn(&FollowStateChanged) -> bool + Send>;

struct Subscriber {
    id: u64,
    deliver: Deliver,
}

#[derive(Default)]
struct Subscribers {
    list: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Cheap to clone fan-out point for follow-state changes.  Components
/// subscribe with a channel sender and keep the returned `Subscription` for as
/// long as they want to receive changes.
#[derive(Clone, Default)]
pub struct FollowBus {
    subscribers: Arc<Subscribers>,
}

impl FollowBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E, F>(&self, sender: Sender<E>, wrap: F) -> Subscription
    where
        E: Send + 'static,
        F: Fn(FollowStateChanged) -> E + Send + 'static,
    {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        let deliver: Deliver = Box::new(move |change| sender.send(wrap(change.clone())).is_ok());
        self.subscribers.list.lock().push(Subscriber { id, deliver });
        Subscription {
            subscribers: Arc::downgrade(&self.subscribers),
            id,
        }
    }

    /// Deliver `change` to every live subscriber, returning how many received
    /// it.  Subscribers whose channel is closed are dropped.
    pub fn publish(&self, change: FollowStateChanged) -> usize {
        let mut list = self.subscribers.list.lock();
        list.retain(|subscriber| (subscriber.deliver)(&change));
        log::debug!(
            "follow change for {} delivered to {} subscribers",
            change.user_id,
            list.len()
        );
        list.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.list.lock().len()
    }
}

/// Unsubscribes from the bus when dropped.
pub struct Subscription {
    subscribers: Weak<Subscribers>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.list.lock().retain(|s| s.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn payload_uses_camel_case() {
        let change: FollowStateChanged =
            serde_json::from_str(r#"{"userId": 7, "isFollowing": false, "action": "unfollow"}"#)
                .unwrap();
        assert_eq!(change, FollowStateChanged::unfollowed(UserId(7)));
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = FollowBus::new();
        let (send, recv) = unbounded();
        let subscription = bus.subscribe(send, |change| change.user_id);
        assert_eq!(bus.publish(FollowStateChanged::followed(UserId(3))), 1);
        assert_eq!(recv.try_recv(), Ok(UserId(3)));

        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(FollowStateChanged::followed(UserId(4))), 0);
        assert!(recv.try_recv().is_err());
    }

    #[test]
    fn closed_channels_are_pruned() {
        let bus = FollowBus::new();
        let (send, recv) = unbounded::<UserId>();
        let _subscription = bus.subscribe(send, |change| change.user_id);
        drop(recv);
        assert_eq!(bus.publish(FollowStateChanged::unfollowed(UserId(1))), 0);
    }
}
