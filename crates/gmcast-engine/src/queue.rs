//! Received queue: orders messages by `(timestamp, id)` and gates
//! delivery at the head.
//!
//! A message leaves the queue in exactly one of two ways: it reaches
//! the head while final (state `S3`), or generic delivery clears it
//! against everything ahead of it. Either way its id enters the
//! delivered watermark and later arrivals for that id are refused.

use gmcast_core::{ConflictRelation, Message, MessageState, Uid};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Delivery callback: `(message, is_generic_delivered)`. Invoked
/// synchronously while the queue holds its lock, so the callback must
/// not call back into the queue.
pub type DeliveryFn = Box<dyn Fn(Message, bool) + Send + Sync>;

#[derive(Default)]
struct QueueInner {
    /// Messages ordered by `(timestamp, id)`.
    ordered: BTreeMap<(u64, Uid), Message>,

    /// Current ordered key per message id.
    index: HashMap<Uid, (u64, Uid)>,

    /// Ids that already left the queue.
    delivered: HashSet<Uid>,
}

/// Priority queue over the protocol ordering key with head-delivery.
pub struct ReceivedQueue {
    inner: Mutex<QueueInner>,
    conflict: Arc<dyn ConflictRelation>,
    on_deliver: DeliveryFn,
}

impl ReceivedQueue {
    pub fn new(conflict: Arc<dyn ConflictRelation>, on_deliver: DeliveryFn) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            conflict,
            on_deliver,
        }
    }

    /// False once the message id already left the queue; duplicate
    /// arrivals are dropped by the caller.
    pub fn is_eligible(&self, message: &Message) -> bool {
        !self.inner.lock().delivered.contains(&message.id)
    }

    /// Insert or update the message, returning whether the queue state
    /// advanced.
    ///
    /// An existing entry is replaced only when the incoming copy is at
    /// least as advanced in state or strictly advances the timestamp.
    /// After any mutation the head is re-examined and delivered while
    /// final.
    pub fn enqueue(&self, message: Message) -> bool {
        let mut inner = self.inner.lock();
        if inner.delivered.contains(&message.id) {
            return false;
        }

        if let Some(existing_key) = inner.index.get(&message.id).cloned() {
            let existing = &inner.ordered[&existing_key];
            let advances =
                message.state > existing.state || message.timestamp > existing.timestamp;
            if !advances {
                return false;
            }
            inner.ordered.remove(&existing_key);
        }

        let key = (message.timestamp, message.id.clone());
        inner.index.insert(message.id.clone(), key.clone());
        inner.ordered.insert(key, message);

        self.deliver_head(&mut inner);
        true
    }

    /// Deliver the message ahead of the head when it is final and the
    /// conflict relation clears it against every message before it.
    pub fn generic_deliver(&self, message: &Message) {
        let mut inner = self.inner.lock();
        let Some(key) = inner.index.get(&message.id).cloned() else {
            return;
        };
        let current = inner.ordered[&key].clone();
        if current.state != MessageState::S3 {
            return;
        }

        let ahead: Vec<Message> = inner
            .ordered
            .range(..key.clone())
            .map(|(_, queued)| queued.clone())
            .collect();
        if ahead.is_empty() {
            // Already at the head; ordinary head delivery owns it.
            self.deliver_head(&mut inner);
            return;
        }
        if self.conflict.conflict(&current, &ahead) {
            return;
        }

        inner.ordered.remove(&key);
        inner.index.remove(&current.id);
        inner.delivered.insert(current.id.clone());
        (self.on_deliver)(current, true);
    }

    /// Current copy of the message, if still queued.
    pub fn get(&self, id: &Uid) -> Option<Message> {
        let inner = self.inner.lock();
        let key = inner.index.get(id)?;
        inner.ordered.get(key).cloned()
    }

    /// Drop the message without committing it and tombstone its id so
    /// stragglers cannot revive it. Used when an exchange expires.
    pub fn discard(&self, id: &Uid) -> Option<Message> {
        let mut inner = self.inner.lock();
        let key = inner.index.remove(id)?;
        let message = inner.ordered.remove(&key);
        inner.delivered.insert(id.clone());
        message
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ordered.is_empty()
    }

    /// Pop and deliver from the head for as long as the head is final.
    fn deliver_head(&self, inner: &mut QueueInner) {
        loop {
            let ready = match inner.ordered.iter().next() {
                Some((key, head)) if head.state == MessageState::S3 => key.clone(),
                _ => break,
            };
            let message = inner.ordered.remove(&ready).expect("head exists");
            inner.index.remove(&message.id);
            inner.delivered.insert(message.id.clone());
            (self.on_deliver)(message, false);
        }
    }
}
