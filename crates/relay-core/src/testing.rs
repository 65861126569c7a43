//! In-memory fakes shared by the relay tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use relay_types::chat::{ChatMessage, ChatThread, MessageRole, NewMessage, UsageSummary};
use relay_types::error::RepositoryError;
use relay_types::llm::{CompletionRequest, LlmError, ProviderKind, StopReason, StreamEvent};

use crate::chat::repository::TranscriptStore;
use crate::llm::provider::{EventStream, LlmProvider};

/// One scripted upstream action.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Text(String),
    Sleep(Duration),
    /// Never yields again.
    Hang,
    Fail(String),
    Done,
}

pub struct ScriptedProvider {
    name: String,
    kind: ProviderKind,
    script: Vec<ScriptStep>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn local(script: Vec<ScriptStep>) -> Self {
        Self {
            name: "scripted-local".to_string(),
            kind: ProviderKind::Local,
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn cloud(script: Vec<ScriptStep>) -> Self {
        Self {
            name: "scripted-cloud".to_string(),
            kind: ProviderKind::Cloud,
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script that streams each piece then ends normally.
    pub fn texts(pieces: &[&str]) -> Self {
        Self::paced(pieces, Duration::ZERO)
    }

    /// Like [`ScriptedProvider::texts`], sleeping `delay` before each piece.
    pub fn paced(pieces: &[&str], delay: Duration) -> Self {
        let mut script = Vec::with_capacity(pieces.len() * 2 + 1);
        for piece in pieces {
            if !delay.is_zero() {
                script.push(ScriptStep::Sleep(delay));
            }
            script.push(ScriptStep::Text(piece.to_string()));
        }
        script.push(ScriptStep::Done);
        Self::local(script)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        self.requests.lock().unwrap().push(request);
        let script = self.script.clone();

        Box::pin(async_stream::try_stream! {
            yield StreamEvent::Connected;
            for step in script {
                match step {
                    ScriptStep::Text(text) => yield StreamEvent::TextDelta { text },
                    ScriptStep::Sleep(d) => tokio::time::sleep(d).await,
                    ScriptStep::Hang => std::future::pending::<()>().await,
                    ScriptStep::Fail(msg) => Err(LlmError::Stream(msg))?,
                    ScriptStep::Done => {
                        yield StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn };
                        yield StreamEvent::Done;
                    }
                }
            }
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    threads: HashMap<Uuid, ChatThread>,
    messages: Vec<ChatMessage>,
}

/// Transcript store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Appends of this role fail with a query error.
    pub fail_role: Mutex<Option<MessageRole>>,
}

impl MemoryStore {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn assistant_messages(&self, thread_id: &Uuid) -> Vec<ChatMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.thread_id == *thread_id && m.role == MessageRole::Assistant)
            .collect()
    }

    pub fn fail_appends(&self, role: MessageRole) {
        *self.fail_role.lock().unwrap() = Some(role);
    }
}

impl TranscriptStore for MemoryStore {
    async fn ensure_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
        title: &str,
    ) -> Result<ChatThread, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let thread = state.threads.entry(*thread_id).or_insert_with(|| ChatThread {
            id: *thread_id,
            user_id: *user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        });
        if thread.user_id != *user_id {
            return Err(RepositoryError::Forbidden);
        }
        Ok(thread.clone())
    }

    async fn authorize_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ChatThread, RepositoryError> {
        let state = self.state.lock().unwrap();
        match state.threads.get(thread_id) {
            None => Err(RepositoryError::NotFound),
            Some(t) if t.user_id != *user_id => Err(RepositoryError::Forbidden),
            Some(t) => Ok(t.clone()),
        }
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        if *self.fail_role.lock().unwrap() == Some(message.role) {
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        let stored = ChatMessage {
            id: Uuid::now_v7(),
            thread_id: message.thread_id,
            user_id: message.user_id,
            role: message.role,
            model: message.model.clone(),
            content: message.content.clone(),
            truncated: message.truncated,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().messages.push(stored.clone());
        Ok(stored)
    }

    async fn get_message(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        Ok(self
            .messages()
            .into_iter()
            .find(|m| m.id == *message_id && m.user_id == *user_id))
    }

    async fn list_messages(
        &self,
        thread_id: &Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self
            .messages()
            .into_iter()
            .filter(|m| m.thread_id == *thread_id)
            .skip(offset.unwrap_or(0) as usize)
            .take(limit.unwrap_or(i64::MAX) as usize)
            .collect())
    }

    async fn list_threads(&self, user_id: &Uuid) -> Result<Vec<ChatThread>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .threads
            .values()
            .filter(|t| t.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn delete_thread(&self, thread_id: &Uuid) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.threads.remove(thread_id);
        state.messages.retain(|m| m.thread_id != *thread_id);
        Ok(())
    }

    async fn usage_summary(&self, user_id: &Uuid) -> Result<UsageSummary, RepositoryError> {
        let messages: Vec<ChatMessage> = self
            .messages()
            .into_iter()
            .filter(|m| m.user_id == *user_id)
            .collect();
        Ok(UsageSummary {
            message_count: messages.len() as u64,
            total_length: messages.iter().map(|m| m.content.chars().count() as u64).sum(),
        })
    }
}
