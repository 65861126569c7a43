//! Client dispatcher: the consumer side of a thread's delta channel.
//!
//! A [`DeltaSubscription`] is a `Stream` of [`DeltaEnvelope`]s that a
//! transport (SSE, WebSocket) writes to the wire as they arrive. When the
//! channel it reads from closes because a newer request superseded the
//! producer, it moves on to the successor's channel; otherwise it ends.
//!
//! Dropping the subscription (client disconnect) releases the registry
//! slot, which cancels the producer it was attached to.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use relay_types::relay::DeltaEnvelope;

use super::registry::{SessionRegistry, SubscribeError};

pub struct DeltaSubscription {
    registry: Arc<SessionRegistry>,
    thread_id: Uuid,
    generation: u64,
    receiver: mpsc::Receiver<String>,
}

impl DeltaSubscription {
    /// Attach `user_id` to the thread's current channel, or to an idle one
    /// if no producer is running yet.
    pub fn attach(
        registry: Arc<SessionRegistry>,
        thread_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, SubscribeError> {
        let lease = registry.subscribe(thread_id, user_id)?;
        debug!(%thread_id, generation = lease.generation, "subscriber attached");
        Ok(Self {
            registry,
            thread_id,
            generation: lease.generation,
            receiver: lease.receiver,
        })
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    /// Generation of the channel currently being drained.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Stream for DeltaSubscription {
    type Item = DeltaEnvelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.receiver.poll_recv(cx)) {
                Some(text) => return Poll::Ready(Some(DeltaEnvelope::assistant(text))),
                None => match this.registry.take_successor(&this.thread_id, this.generation) {
                    Some(lease) => {
                        debug!(
                            thread_id = %this.thread_id,
                            from = this.generation,
                            to = lease.generation,
                            "subscriber following superseding session"
                        );
                        this.generation = lease.generation;
                        this.receiver = lease.receiver;
                    }
                    None => return Poll::Ready(None),
                },
            }
        }
    }
}

impl Drop for DeltaSubscription {
    fn drop(&mut self) {
        self.registry.release(&self.thread_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    const USER: Uuid = Uuid::from_u128(0x0199_0000_0000_7000_8000_0000_0000_0002);

    #[tokio::test]
    async fn test_delivers_deltas_in_order_then_ends() {
        let registry = Arc::new(SessionRegistry::new(8));
        let thread = Uuid::now_v7();

        let handle = registry.open_session(thread, USER);
        let mut sub = DeltaSubscription::attach(registry.clone(), thread, USER).unwrap();

        for piece in ["a", "b", "c"] {
            handle.sender.try_send(piece.to_string()).unwrap();
        }
        registry.retire(&thread, handle.generation);
        drop(handle);

        let got: Vec<String> = (&mut sub).map(|env| env.content).collect().await;
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_follows_superseding_session() {
        let registry = Arc::new(SessionRegistry::new(8));
        let thread = Uuid::now_v7();

        let first = registry.open_session(thread, USER);
        let mut sub = DeltaSubscription::attach(registry.clone(), thread, USER).unwrap();
        first.sender.try_send("old".into()).unwrap();

        let second = registry.open_session(thread, USER);
        assert!(first.cancel.is_cancelled());
        drop(first);
        second.sender.try_send("new".into()).unwrap();

        assert_eq!(sub.next().await.unwrap().content, "old");
        assert_eq!(sub.next().await.unwrap().content, "new");
        assert_eq!(sub.generation(), second.generation);
    }

    #[tokio::test]
    async fn test_drop_cancels_attached_producer() {
        let registry = Arc::new(SessionRegistry::new(8));
        let thread = Uuid::now_v7();

        let handle = registry.open_session(thread, USER);
        let sub = DeltaSubscription::attach(registry.clone(), thread, USER).unwrap();
        assert!(!handle.cancel.is_cancelled());

        drop(sub);
        assert!(handle.cancel.is_cancelled());
        assert!(!registry.has_session(&thread));
    }

    #[tokio::test]
    async fn test_idle_subscription_receives_later_producer() {
        let registry = Arc::new(SessionRegistry::new(8));
        let thread = Uuid::now_v7();

        let mut sub = DeltaSubscription::attach(registry.clone(), thread, USER).unwrap();
        let handle = registry.open_session(thread, USER);
        handle.sender.try_send("Hel".into()).unwrap();

        let env = sub.next().await.unwrap();
        assert_eq!(env.content, "Hel");
        assert_eq!(serde_json::to_value(&env).unwrap()["role"], "assistant");
    }

    #[tokio::test]
    async fn test_second_attach_is_busy() {
        let registry = Arc::new(SessionRegistry::new(8));
        let thread = Uuid::now_v7();

        let _sub = DeltaSubscription::attach(registry.clone(), thread, USER).unwrap();
        assert!(matches!(
            DeltaSubscription::attach(registry.clone(), thread, USER),
            Err(SubscribeError::Busy)
        ));
    }
}
