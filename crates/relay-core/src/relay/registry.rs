//! Stream session registry.
//!
//! Maps a thread id to the bounded channel carrying that thread's deltas
//! and the cancellation token of the task producing them. At most one
//! producer is live per thread: opening a session cancels the previous
//! producer and installs a fresh channel in the same critical section.
//!
//! A slot goes through these states:
//!
//! - idle: a client subscribed before any request arrived. The registry
//!   keeps the sender until the next producer of the same user adopts it.
//! - producing: a producer holds the sender and a live cancellation token.
//! - drained: the producer finished while the attached subscriber was still
//!   reading a superseded generation. The buffered deltas are kept until it
//!   follows, and dropped as soon as it goes away instead.
//!
//! Each slot records its owner and the generation of the channel held by
//! the thread's attached subscriber, if one is attached. Only that
//! subscriber may follow a superseding session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use relay_types::relay::CancelOutcome;

/// Producer side of a freshly opened session.
#[derive(Debug)]
pub struct SessionHandle {
    pub thread_id: Uuid,
    pub generation: u64,
    pub sender: mpsc::Sender<String>,
    pub cancel: CancellationToken,
}

/// Receiving end handed to a subscriber.
#[derive(Debug)]
pub struct ChannelLease {
    pub generation: u64,
    pub receiver: mpsc::Receiver<String>,
}

/// Errors from [`SessionRegistry::subscribe`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("thread already has a live subscriber")]
    Busy,

    #[error("thread session belongs to another user")]
    Forbidden,
}

struct Slot {
    generation: u64,
    owner: Uuid,
    /// Held only while the slot is idle.
    sender: Option<mpsc::Sender<String>>,
    /// Held until a subscriber takes it.
    receiver: Option<mpsc::Receiver<String>>,
    /// Set while a producer owns the channel.
    cancel: Option<CancellationToken>,
    /// Generation of the channel the attached subscriber is reading.
    subscriber: Option<u64>,
    created_at: DateTime<Utc>,
}

impl Slot {
    fn new(generation: u64, owner: Uuid) -> Self {
        Self {
            generation,
            owner,
            sender: None,
            receiver: None,
            cancel: None,
            subscriber: None,
            created_at: Utc::now(),
        }
    }

    fn is_producing(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    fn is_drained(&self) -> bool {
        self.sender.is_none() && self.cancel.is_none()
    }

    /// The attached subscriber is still on an older generation.
    fn awaits_follower(&self) -> bool {
        self.receiver.is_some() && self.subscriber.is_some_and(|g| g < self.generation)
    }
}

#[derive(Default)]
struct Inner {
    slots: HashMap<Uuid, Slot>,
    next_generation: u64,
}

impl Inner {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Hand the slot's receiver to its subscriber. A drained slot is
    /// dropped once its channel is out.
    fn lease(&mut self, thread_id: &Uuid) -> Option<ChannelLease> {
        let slot = self.slots.get_mut(thread_id)?;
        let receiver = slot.receiver.take()?;
        let generation = slot.generation;
        slot.subscriber = Some(generation);
        if slot.is_drained() {
            self.slots.remove(thread_id);
        }
        Some(ChannelLease {
            generation,
            receiver,
        })
    }
}

/// Process-wide table of per-thread stream sessions.
///
/// All operations take one short critical section with no I/O and no
/// `.await` inside it.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl SessionRegistry {
    /// `capacity` bounds every per-thread channel (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a producer for `thread_id` on behalf of `user_id`,
    /// superseding any current one.
    ///
    /// An idle slot opened by the same user is adopted as-is so the waiting
    /// subscriber receives this producer's deltas. Another user's idle slot
    /// is replaced and its subscriber is cut off.
    pub fn open_session(&self, thread_id: Uuid, user_id: Uuid) -> SessionHandle {
        let mut inner = self.lock();
        let cancel = CancellationToken::new();

        if let Some(slot) = inner.slots.get_mut(&thread_id) {
            if slot.owner == user_id {
                if let Some(sender) = slot.sender.take() {
                    slot.cancel = Some(cancel.clone());
                    debug!(%thread_id, generation = slot.generation, "adopted idle session channel");
                    return SessionHandle {
                        thread_id,
                        generation: slot.generation,
                        sender,
                        cancel,
                    };
                }
            }
        }

        let generation = inner.next_generation();
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut slot = Slot::new(generation, user_id);
        slot.receiver = Some(receiver);
        slot.cancel = Some(cancel.clone());

        if let Some(previous) = inner.slots.remove(&thread_id) {
            if previous.owner == user_id {
                slot.subscriber = previous.subscriber;
            } else {
                debug!(%thread_id, generation, "dropped another user's session slot");
            }
            if let Some(token) = previous.cancel {
                token.cancel();
                debug!(
                    %thread_id,
                    superseded = previous.generation,
                    generation,
                    "superseded running session"
                );
            }
        }
        inner.slots.insert(thread_id, slot);

        SessionHandle {
            thread_id,
            generation,
            sender,
            cancel,
        }
    }

    /// Cancel the live producer of a thread, if any.
    pub fn cancel(&self, thread_id: &Uuid) -> CancelOutcome {
        let inner = self.lock();
        match inner.slots.get(thread_id) {
            Some(slot) if slot.is_producing() => {
                if let Some(token) = &slot.cancel {
                    token.cancel();
                }
                CancelOutcome::Cancelled
            }
            _ => CancelOutcome::NotFound,
        }
    }

    /// Whether a producer is currently live for the thread.
    pub fn has_session(&self, thread_id: &Uuid) -> bool {
        self.lock()
            .slots
            .get(thread_id)
            .is_some_and(Slot::is_producing)
    }

    /// The producer of `generation` has finished.
    ///
    /// Removes the slot, unless the attached subscriber is still reading a
    /// superseded generation and will come for the buffered deltas. A newer
    /// session installed in the meantime is left untouched.
    pub fn retire(&self, thread_id: &Uuid, generation: u64) {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(thread_id) else {
            return;
        };
        if slot.generation != generation {
            return;
        }
        if slot.awaits_follower() {
            slot.cancel = None;
            debug!(%thread_id, generation, "session drained, awaiting subscriber handoff");
        } else {
            inner.slots.remove(thread_id);
            debug!(%thread_id, generation, "retired session");
        }
    }

    /// Take the receiving end of the thread's current channel for `user_id`.
    ///
    /// Creates an idle channel when the thread has no slot yet, or when the
    /// only slot is another user's idle one. Only one subscriber may be
    /// attached to a thread at a time, and never to another user's session.
    pub fn subscribe(&self, thread_id: Uuid, user_id: Uuid) -> Result<ChannelLease, SubscribeError> {
        let mut inner = self.lock();

        if let Some(slot) = inner.slots.get(&thread_id) {
            if slot.owner == user_id {
                if slot.subscriber.is_some() {
                    return Err(SubscribeError::Busy);
                }
                return inner.lease(&thread_id).ok_or(SubscribeError::Busy);
            }
            // Nobody has claimed an idle thread yet; the newcomer replaces it.
            if slot.sender.is_none() {
                return Err(SubscribeError::Forbidden);
            }
            inner.slots.remove(&thread_id);
            debug!(%thread_id, "replaced another user's idle session channel");
        }

        let generation = inner.next_generation();
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut slot = Slot::new(generation, user_id);
        slot.sender = Some(sender);
        slot.subscriber = Some(generation);
        inner.slots.insert(thread_id, slot);
        debug!(%thread_id, generation, "opened idle session channel");
        Ok(ChannelLease {
            generation,
            receiver,
        })
    }

    /// Hand the subscriber reading `generation` the channel of the session
    /// that superseded it.
    ///
    /// Returns `None` when no newer session exists or the caller is not the
    /// thread's attached subscriber.
    pub fn take_successor(&self, thread_id: &Uuid, generation: u64) -> Option<ChannelLease> {
        let mut inner = self.lock();
        let slot = inner.slots.get(thread_id)?;
        if slot.generation <= generation || slot.subscriber != Some(generation) {
            return None;
        }
        inner.lease(thread_id)
    }

    /// The subscriber reading `generation` went away.
    ///
    /// Cancels that generation's producer, or drops the slot if no producer
    /// owns it. When the subscriber had already been superseded, only a
    /// drained slot kept for it is dropped.
    pub fn release(&self, thread_id: &Uuid, generation: u64) {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(thread_id) else {
            return;
        };
        if slot.subscriber == Some(generation) {
            slot.subscriber = None;
        }

        if slot.generation != generation {
            if slot.is_drained() {
                inner.slots.remove(thread_id);
                debug!(%thread_id, generation, "subscriber left, dropped drained session");
            }
            return;
        }
        match &slot.cancel {
            Some(token) => {
                if !token.is_cancelled() {
                    token.cancel();
                    debug!(%thread_id, generation, "subscriber left, cancelling producer");
                }
            }
            None => {
                inner.slots.remove(thread_id);
            }
        }
    }

    /// Number of threads with a live producer.
    pub fn active_sessions(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|slot| slot.is_producing())
            .count()
    }

    /// Creation time of the thread's current slot.
    pub fn session_started_at(&self, thread_id: &Uuid) -> Option<DateTime<Utc>> {
        self.lock().slots.get(thread_id).map(|slot| slot.created_at)
    }
}
