//! TranscriptStore trait definition.
//!
//! Thread ownership and message persistence as the relay needs them.
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use relay_types::chat::{ChatMessage, ChatThread, NewMessage, UsageSummary};
use relay_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation threads and their messages.
///
/// Implementations live in relay-infra (e.g., `SqliteTranscriptStore`).
pub trait TranscriptStore: Send + Sync {
    /// Return the thread, creating it for `user_id` if it does not exist yet.
    ///
    /// Fails with [`RepositoryError::Forbidden`] when the thread exists and
    /// belongs to someone else.
    fn ensure_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<ChatThread, RepositoryError>> + Send;

    /// Check that `user_id` owns the thread.
    ///
    /// [`RepositoryError::NotFound`] for unknown threads,
    /// [`RepositoryError::Forbidden`] for threads owned by another user.
    fn authorize_thread(
        &self,
        thread_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<ChatThread, RepositoryError>> + Send;

    /// Persist a message and bump the thread's `updated_at`.
    fn append_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Get a message by id, only if it belongs to `user_id`.
    fn get_message(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Messages of a thread, ordered by created_at ASC.
    fn list_messages(
        &self,
        thread_id: &Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Threads owned by a user, most recently updated first.
    fn list_threads(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatThread>, RepositoryError>> + Send;

    /// Hard-delete a thread and all of its messages.
    fn delete_thread(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Message count and total content length across a user's threads.
    fn usage_summary(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<UsageSummary, RepositoryError>> + Send;
}
