//! Relay pump: the producer side of a relay cycle.
//!
//! One cycle per inbound chat request:
//! 1. validate the request and resolve the model's provider
//! 2. persist the user message (creating the thread on first use)
//! 3. open a session in the registry, superseding any running producer
//! 4. open the gateway's delta stream
//! 5. spawn the drive loop, which forwards deltas into the session
//!    channel until the upstream ends, fails, times out or is cancelled,
//!    then persists the accumulated reply exactly once and retires the
//!    session
//!
//! Errors before step 5 are returned to the caller and no stream is
//! opened. After that nothing fails: upstream errors end the cycle early
//! and reply persistence errors are only logged.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use relay_types::chat::{NewMessage, thread_title};
use relay_types::config::RelaySettings;
use relay_types::error::RelayError;
use relay_types::llm::{CompletionRequest, LlmError, Message, ProviderKind};
use relay_types::relay::{CancelOutcome, EndReason};

use crate::chat::repository::TranscriptStore;
use crate::llm::gateway::{DeltaStream, ModelGateway};

use super::registry::{SessionHandle, SessionRegistry};
use super::stats::RelayStats;

/// Inbound chat request for one thread.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub model: String,
    /// Full ordered history; the last entry is the new user message.
    pub messages: Vec<Message>,
}

/// Returned once a cycle is streaming.
#[derive(Debug)]
pub struct RelayTicket {
    pub thread_id: Uuid,
    pub user_message_id: Uuid,
    pub generation: u64,
    pub provider: ProviderKind,
    pub handle: JoinHandle<RelayOutcome>,
}

/// What a finished cycle produced.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub thread_id: Uuid,
    pub generation: u64,
    pub content: String,
    pub end_reason: EndReason,
    pub deltas_sent: u64,
    pub deltas_dropped: u64,
    /// `None` when persisting the reply failed.
    pub assistant_message_id: Option<Uuid>,
}

/// Tunables taken from `[relay]` configuration.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    pub max_tokens: u32,
    /// `None` waits for the upstream indefinitely.
    pub idle_timeout: Option<Duration>,
}

impl From<&RelaySettings> for PumpSettings {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            idle_timeout: (settings.upstream_idle_timeout_secs > 0)
                .then(|| Duration::from_secs(settings.upstream_idle_timeout_secs)),
        }
    }
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

/// Drives relay cycles against a transcript store and the model gateway.
pub struct RelayPump<S: TranscriptStore> {
    store: Arc<S>,
    gateway: Arc<ModelGateway>,
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
    settings: PumpSettings,
}

impl<S: TranscriptStore + 'static> RelayPump<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<ModelGateway>,
        registry: Arc<SessionRegistry>,
        stats: Arc<RelayStats>,
        settings: PumpSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            registry,
            stats,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start a relay cycle. Returns once the producer task is running.
    pub async fn start(&self, request: RelayRequest) -> Result<RelayTicket, RelayError> {
        let provider = self.validate(&request)?;
        let RelayRequest {
            thread_id,
            user_id,
            model,
            messages,
        } = request;

        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.store
            .ensure_thread(&thread_id, &user_id, &thread_title(&prompt))
            .await?;
        let user_message = self
            .store
            .append_message(&NewMessage::user(thread_id, user_id, prompt))
            .await?;

        let session = self.registry.open_session(thread_id, user_id);
        let deltas = match self.gateway.stream(CompletionRequest {
            model: model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
        }) {
            Ok(deltas) => deltas,
            Err(e) => {
                session.cancel.cancel();
                self.registry.retire(&thread_id, session.generation);
                return Err(e.into());
            }
        };

        self.stats.cycle_started();
        let generation = session.generation;
        info!(%thread_id, generation, %model, %provider, "relay cycle started");

        let cycle = Cycle {
            store: self.store.clone(),
            registry: self.registry.clone(),
            stats: self.stats.clone(),
            session,
            user_id,
            model: model.clone(),
            idle_timeout: self.settings.idle_timeout,
        };
        let span = info_span!("relay_cycle", %thread_id, generation, %model);
        let handle = tokio::spawn(cycle.drive(deltas).instrument(span));

        Ok(RelayTicket {
            thread_id,
            user_message_id: user_message.id,
            generation,
            provider,
            handle,
        })
    }

    /// Stop the thread's running cycle, if any.
    pub fn stop(&self, thread_id: &Uuid) -> CancelOutcome {
        let outcome = self.registry.cancel(thread_id);
        debug!(%thread_id, ?outcome, "stop requested");
        outcome
    }

    fn validate(&self, request: &RelayRequest) -> Result<ProviderKind, RelayError> {
        if request.model.trim().is_empty() {
            return Err(RelayError::InvalidRequest("model must not be empty".into()));
        }
        let Some(last) = request.messages.last() else {
            return Err(RelayError::InvalidRequest(
                "at least one message is required".into(),
            ));
        };
        if last.content.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "last message must not be empty".into(),
            ));
        }
        match self.gateway.resolve(&request.model) {
            Ok(provider) => Ok(provider.kind()),
            Err(LlmError::Unavailable(msg)) => Err(RelayError::InvalidRequest(msg)),
            Err(e) => Err(e.into()),
        }
    }
}

/// State owned by one spawned producer task.
struct Cycle<S> {
    store: Arc<S>,
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
    session: SessionHandle,
    user_id: Uuid,
    model: String,
    idle_timeout: Option<Duration>,
}

enum Next {
    Delta(String),
    End,
    Failed(LlmError),
    Idle,
}

impl<S: TranscriptStore> Cycle<S> {
    async fn drive(self, mut deltas: DeltaStream) -> RelayOutcome {
        let thread_id = self.session.thread_id;
        let generation = self.session.generation;
        let mut content = String::new();
        let mut deltas_sent = 0u64;
        let mut deltas_dropped = 0u64;

        let end_reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.session.cancel.cancelled() => break EndReason::Cancelled,
                next = next_delta(&mut deltas, self.idle_timeout) => next,
            };

            match next {
                Next::Delta(text) => {
                    content.push_str(&text);
                    match self.session.sender.try_send(text) {
                        Ok(()) => {
                            deltas_sent += 1;
                            self.stats.delta_relayed();
                        }
                        Err(TrySendError::Full(_)) => {
                            deltas_dropped += 1;
                            self.stats.delta_dropped();
                            warn!(%thread_id, generation, "delta channel full, dropping delta");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(%thread_id, generation, "delta channel closed, accumulating only");
                        }
                    }
                }
                Next::End => break EndReason::Completed,
                Next::Failed(e) => {
                    warn!(%thread_id, generation, error = %e, "upstream stream failed, committing partial reply");
                    break EndReason::UpstreamFailed;
                }
                Next::Idle => {
                    warn!(%thread_id, generation, "upstream idle deadline exceeded");
                    break EndReason::IdleTimeout;
                }
            }
        };
        drop(deltas);

        let reply = NewMessage::assistant(
            thread_id,
            self.user_id,
            self.model.as_str(),
            content.as_str(),
            end_reason.is_truncated(),
        );
        let assistant_message_id = match self.store.append_message(&reply).await {
            Ok(stored) => Some(stored.id),
            Err(e) => {
                error!(%thread_id, generation, error = %e, "failed to persist assistant reply");
                None
            }
        };

        self.registry.retire(&thread_id, generation);
        self.stats.cycle_ended(end_reason);
        info!(
            %thread_id,
            generation,
            ?end_reason,
            chars = content.chars().count(),
            deltas_sent,
            deltas_dropped,
            "relay cycle finished"
        );

        // Dropping the session sender here closes the channel for subscribers.
        RelayOutcome {
            thread_id,
            generation,
            content,
            end_reason,
            deltas_sent,
            deltas_dropped,
            assistant_message_id,
        }
    }
}

async fn next_delta(deltas: &mut DeltaStream, idle_timeout: Option<Duration>) -> Next {
    let item = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, deltas.next()).await {
            Ok(item) => item,
            Err(_) => return Next::Idle,
        },
        None => deltas.next().await,
    };
    match item {
        Some(Ok(text)) => Next::Delta(text),
        Some(Err(e)) => Next::Failed(e),
        None => Next::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::relay::dispatcher::DeltaSubscription;
    use crate::testing::{MemoryStore, ScriptStep, ScriptedProvider};
    use futures_util::StreamExt;
    use relay_types::chat::MessageRole;

    struct Harness {
        pump: RelayPump<MemoryStore>,
        store: Arc<MemoryStore>,
        registry: Arc<SessionRegistry>,
    }

    fn harness_with(
        local: ScriptedProvider,
        cloud: Option<ScriptedProvider>,
        capacity: usize,
        settings: PumpSettings,
    ) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let registry = Arc::new(SessionRegistry::new(capacity));
        let gateway = Arc::new(ModelGateway::new(
            BoxLlmProvider::new(local),
            cloud.map(BoxLlmProvider::new),
            vec!["gpt".to_string()],
        ));
        let pump = RelayPump::new(
            store.clone(),
            gateway,
            registry.clone(),
            Arc::new(RelayStats::new()),
            settings,
        );
        Harness {
            pump,
            store,
            registry,
        }
    }

    fn harness(local: ScriptedProvider) -> Harness {
        harness_with(local, None, 100, PumpSettings::default())
    }

    fn ask(thread_id: Uuid, user_id: Uuid, model: &str, text: &str) -> RelayRequest {
        RelayRequest {
            thread_id,
            user_id,
            model: model.to_string(),
            messages: vec![Message::user(text)],
        }
    }

    #[tokio::test]
    async fn test_completed_cycle_relays_and_persists_full_reply() {
        let h = harness(ScriptedProvider::texts(&["Hel", "lo", " world"]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());
        let mut sub = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        assert_eq!(ticket.provider, ProviderKind::Local);

        let received: Vec<String> = (&mut sub).map(|e| e.content).collect().await;
        assert_eq!(received, vec!["Hel", "lo", " world"]);

        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::Completed);
        assert_eq!(outcome.content, "Hello world");
        assert_eq!(outcome.content, received.concat());

        let messages = h.store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[0].id, ticket.user_message_id);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hello world");
        assert_eq!(messages[1].model, "llama3");
        assert!(!messages[1].truncated);
        assert_eq!(outcome.assistant_message_id, Some(messages[1].id));
        assert!(!h.registry.has_session(&thread));
    }

    #[tokio::test]
    async fn test_explicit_stop_persists_prefix_as_truncated() {
        let h = harness(ScriptedProvider::local(vec![
            ScriptStep::Text("Hel".into()),
            ScriptStep::Hang,
        ]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());
        let mut sub = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().content, "Hel");
        assert!(h.registry.has_session(&thread));

        assert_eq!(h.pump.stop(&thread), CancelOutcome::Cancelled);
        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::Cancelled);
        assert_eq!(outcome.content, "Hel");

        let replies = h.store.assistant_messages(&thread);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "Hel");
        assert!(replies[0].truncated);

        assert!(sub.next().await.is_none());
        assert_eq!(h.pump.stop(&thread), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_new_request_supersedes_running_cycle() {
        let h = harness_with(
            ScriptedProvider::local(vec![ScriptStep::Text("a".into()), ScriptStep::Hang]),
            Some(ScriptedProvider::cloud(vec![
                ScriptStep::Text("b".into()),
                ScriptStep::Text("c".into()),
                ScriptStep::Done,
            ])),
            100,
            PumpSettings::default(),
        );
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());
        let mut sub = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();

        let first = h.pump.start(ask(thread, user, "llama3", "one")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().content, "a");

        let second = h.pump.start(ask(thread, user, "gpt-4o", "two")).await.unwrap();
        assert!(second.generation > first.generation);

        let first_outcome = first.handle.await.unwrap();
        assert_eq!(first_outcome.end_reason, EndReason::Cancelled);
        assert_eq!(first_outcome.content, "a");

        let rest: Vec<String> = (&mut sub).map(|e| e.content).collect().await;
        assert_eq!(rest, vec!["b", "c"]);

        let second_outcome = second.handle.await.unwrap();
        assert_eq!(second_outcome.end_reason, EndReason::Completed);
        assert_eq!(second_outcome.content, "bc");

        let replies = h.store.assistant_messages(&thread);
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().any(|m| m.content == "a" && m.truncated));
        assert!(replies.iter().any(|m| m.content == "bc" && !m.truncated));
        assert_eq!(h.registry.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_disconnect_cancels_producer() {
        let h = harness(ScriptedProvider::local(vec![
            ScriptStep::Text("Hel".into()),
            ScriptStep::Hang,
        ]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());
        let mut sub = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().content, "Hel");
        drop(sub);

        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::Cancelled);
        assert_eq!(h.store.assistant_messages(&thread)[0].content, "Hel");
    }

    #[tokio::test]
    async fn test_full_channel_drops_deltas_but_keeps_content() {
        let h = harness_with(
            ScriptedProvider::texts(&["1", "2", "3", "4", "5"]),
            None,
            2,
            PumpSettings::default(),
        );
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let ticket = h.pump.start(ask(thread, user, "llama3", "count")).await.unwrap();
        let outcome = ticket.handle.await.unwrap();

        assert_eq!(outcome.end_reason, EndReason::Completed);
        assert_eq!(outcome.content, "12345");
        assert_eq!(outcome.deltas_sent, 2);
        assert_eq!(outcome.deltas_dropped, 3);
        assert_eq!(h.pump.stats().snapshot(0).deltas_dropped, 3);
        assert_eq!(h.store.assistant_messages(&thread)[0].content, "12345");
    }

    #[tokio::test]
    async fn test_upstream_failure_commits_partial_reply() {
        let h = harness(ScriptedProvider::local(vec![
            ScriptStep::Text("par".into()),
            ScriptStep::Fail("reset by peer".into()),
        ]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        let outcome = ticket.handle.await.unwrap();

        assert_eq!(outcome.end_reason, EndReason::UpstreamFailed);
        let replies = h.store.assistant_messages(&thread);
        assert_eq!(replies[0].content, "par");
        assert!(replies[0].truncated);
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_cycle() {
        let h = harness_with(
            ScriptedProvider::local(vec![ScriptStep::Text("x".into()), ScriptStep::Hang]),
            None,
            100,
            PumpSettings {
                max_tokens: 1000,
                idle_timeout: Some(Duration::from_millis(50)),
            },
        );
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::IdleTimeout);
        assert_eq!(outcome.content, "x");
    }

    #[tokio::test]
    async fn test_empty_upstream_still_persists_empty_reply() {
        let h = harness(ScriptedProvider::texts(&[]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.content, "");

        let replies = h.store.assistant_messages(&thread);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "");
        assert!(!replies[0].truncated);
    }

    #[tokio::test]
    async fn test_invalid_requests_have_no_side_effects() {
        let h = harness(ScriptedProvider::texts(&["x"]));
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let cases = vec![
            ask(thread, user, "  ", "hi"),
            ask(thread, user, "llama3", "   "),
            RelayRequest {
                thread_id: thread,
                user_id: user,
                model: "llama3".into(),
                messages: vec![],
            },
            ask(thread, user, "gpt-4o", "cloud without key"),
        ];
        for request in cases {
            let err = h.pump.start(request).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidRequest(_)), "got {err:?}");
        }
        assert!(h.store.messages().is_empty());
        assert!(!h.registry.has_session(&thread));
    }

    #[tokio::test]
    async fn test_user_message_persistence_failure_aborts() {
        let h = harness(ScriptedProvider::texts(&["x"]));
        h.store.fail_appends(MessageRole::User);
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let err = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::Persistence(_)));
        assert!(!h.registry.has_session(&thread));
        assert_eq!(h.pump.stats().snapshot(0).cycles_started, 0);
    }

    #[tokio::test]
    async fn test_assistant_persistence_failure_is_swallowed() {
        let h = harness(ScriptedProvider::texts(&["ok"]));
        h.store.fail_appends(MessageRole::Assistant);
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let ticket = h.pump.start(ask(thread, user, "llama3", "hi")).await.unwrap();
        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::Completed);
        assert!(outcome.assistant_message_id.is_none());
        assert!(!h.registry.has_session(&thread));
    }

    #[tokio::test]
    async fn test_foreign_thread_is_forbidden() {
        let h = harness(ScriptedProvider::texts(&["x"]));
        let thread = Uuid::now_v7();
        let owner = Uuid::now_v7();

        let ticket = h.pump.start(ask(thread, owner, "llama3", "mine")).await.unwrap();
        ticket.handle.await.unwrap();

        let err = h
            .pump
            .start(ask(thread, Uuid::now_v7(), "llama3", "theirs"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Forbidden));
    }

    #[tokio::test]
    async fn test_request_carries_history_and_token_budget() {
        let provider = ScriptedProvider::texts(&["x"]);
        let requests = provider.requests.clone();
        let h = harness_with(
            provider,
            None,
            100,
            PumpSettings {
                max_tokens: 321,
                idle_timeout: None,
            },
        );
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());

        let request = RelayRequest {
            thread_id: thread,
            user_id: user,
            model: "llama3".into(),
            messages: vec![
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
        };
        let ticket = h.pump.start(request).await.unwrap();
        ticket.handle.await.unwrap();

        let sent = requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].max_tokens, 321);
        assert_eq!(sent[0].messages.len(), 3);

        let users: Vec<_> = h
            .store
            .messages()
            .into_iter()
            .filter(|m| m.role == MessageRole::User)
            .collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].content, "second");
    }

    #[test]
    fn test_pump_settings_from_config() {
        let mut settings = RelaySettings::default();
        assert!(PumpSettings::from(&settings).idle_timeout.is_none());

        settings.upstream_idle_timeout_secs = 7;
        settings.max_tokens = 42;
        let pump = PumpSettings::from(&settings);
        assert_eq!(pump.idle_timeout, Some(Duration::from_secs(7)));
        assert_eq!(pump.max_tokens, 42);
    }

    #[tokio::test]
    async fn test_finished_reply_is_not_replayed_after_superseded_subscriber_leaves() {
        let h = harness_with(
            ScriptedProvider::local(vec![ScriptStep::Text("a".into()), ScriptStep::Hang]),
            Some(ScriptedProvider::cloud(vec![
                ScriptStep::Text("x".into()),
                ScriptStep::Text("y".into()),
                ScriptStep::Done,
            ])),
            100,
            PumpSettings::default(),
        );
        let (thread, user) = (Uuid::now_v7(), Uuid::now_v7());
        let mut sub = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();

        let first = h.pump.start(ask(thread, user, "llama3", "one")).await.unwrap();
        assert_eq!(sub.next().await.unwrap().content, "a");
        let second = h.pump.start(ask(thread, user, "gpt-4o", "two")).await.unwrap();
        drop(sub);

        first.handle.await.unwrap();
        assert_eq!(second.handle.await.unwrap().content, "xy");
        assert!(h.registry.session_started_at(&thread).is_none());

        let mut fresh = DeltaSubscription::attach(h.registry.clone(), thread, user).unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(200), fresh.next()).await;
        assert!(pending.is_err(), "fresh subscriber got {pending:?}");
    }

    #[tokio::test]
    async fn test_reply_is_not_streamed_to_another_users_idle_subscriber() {
        let h = harness(ScriptedProvider::texts(&["secret reply"]));
        let (thread, owner, intruder) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut eavesdrop = DeltaSubscription::attach(h.registry.clone(), thread, intruder).unwrap();

        let ticket = h.pump.start(ask(thread, owner, "llama3", "hi")).await.unwrap();
        assert!(eavesdrop.next().await.is_none());

        let outcome = ticket.handle.await.unwrap();
        assert_eq!(outcome.content, "secret reply");
    }
}
