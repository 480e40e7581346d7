use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics::counter;
use tokio::sync::mpsc;

use crate::event::EventId;

/// A cache-invalidation hint, not data: receivers re-fetch event state
/// through the normal read endpoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Refresh;

/// Per-event broadcast groups. Connections join the group for the event
/// they watch; a successful contribution write broadcasts a refresh to the
/// members joined at that moment. Delivery is best-effort, at most once
/// per currently-connected member, with no buffering or replay.
#[derive(Default)]
pub struct RealtimeHub {
    groups: Mutex<HashMap<EventId, HashMap<u64, mpsc::UnboundedSender<Refresh>>>>,
    next_member: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> RealtimeHub {
        RealtimeHub::default()
    }

    /// Join an event's group. Membership lasts until the returned
    /// subscription is dropped.
    pub fn join(self: &Arc<Self>, event_id: EventId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let member_id = self.next_member.fetch_add(1, Ordering::Relaxed);

        self.groups
            .lock()
            .unwrap()
            .entry(event_id)
            .or_default()
            .insert(member_id, tx);

        Subscription {
            hub: Arc::clone(self),
            event_id,
            member_id,
            rx,
        }
    }

    /// Signal every current member of this event's group. Members of other
    /// events never see it. Returns the number of members reached.
    pub fn broadcast(&self, event_id: EventId) -> usize {
        let mut groups = self.groups.lock().unwrap();
        let Some(group) = groups.get_mut(&event_id) else {
            return 0;
        };

        // A closed channel means the connection is gone; prune as we go.
        group.retain(|_, tx| tx.send(Refresh).is_ok());
        let delivered = group.len();
        if group.is_empty() {
            groups.remove(&event_id);
        }

        counter!("coordination_refresh_signals_total").increment(delivered as u64);
        delivered
    }

    pub fn group_size(&self, event_id: EventId) -> usize {
        self.groups
            .lock()
            .unwrap()
            .get(&event_id)
            .map_or(0, HashMap::len)
    }

    fn leave(&self, event_id: EventId, member_id: u64) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(group) = groups.get_mut(&event_id) {
            group.remove(&member_id);
            if group.is_empty() {
                groups.remove(&event_id);
            }
        }
    }
}

/// Membership in one event's broadcast group. Dropping it leaves the
/// group, which is how a disconnect ends membership without an explicit
/// leave message.
pub struct Subscription {
    hub: Arc<RealtimeHub>,
    event_id: EventId,
    member_id: u64,
    rx: mpsc::UnboundedReceiver<Refresh>,
}

impl Subscription {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub async fn recv(&mut self) -> Option<Refresh> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Refresh> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.leave(self.event_id, self.member_id);
    }
}
