//! Attempt-history persistence.
//!
//! `HistoryStore` is the seam a managed document database plugs into; the
//! shipped implementation is an in-memory store with the same semantics:
//! append-only records, store-assigned ids and timestamps, filterable
//! newest-first reads.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{ChallengeHistoryEntry, HistoryFilter, NewHistoryEntry};
use crate::error::AppError;

pub trait HistoryStore {
    /// Persist one attempt. The store assigns `id` and `created_at` at
    /// write time; the caller's clock is never trusted.
    fn append(
        &self,
        entry: NewHistoryEntry,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// All of one user's attempts matching the filter, newest first.
    fn query(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> impl Future<Output = Result<Vec<ChallengeHistoryEntry>, AppError>> + Send;
}

/// In-memory challengeHistory collection.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Arc<RwLock<Vec<ChallengeHistoryEntry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    #[instrument(level = "debug", skip(self, entry), fields(user_id = %entry.user_id))]
    async fn append(&self, entry: NewHistoryEntry) -> Result<String, AppError> {
        // Unowned records are unreadable later; refuse them at the door.
        if entry.user_id.trim().is_empty() {
            return Err(AppError::PermissionDenied);
        }
        let id = Uuid::new_v4().to_string();
        let record = ChallengeHistoryEntry {
            id: id.clone(),
            user_id: entry.user_id,
            topic: entry.topic,
            difficulty: entry.difficulty,
            question_type: entry.question_type,
            question: entry.question,
            user_solution: entry.user_solution,
            grading_result: entry.grading_result,
            generated_solution: entry.generated_solution,
            created_at: Utc::now(),
        };
        self.entries.write().await.push(record);
        debug!(target: "challenge", %id, "History entry appended");
        Ok(id)
    }

    #[instrument(level = "debug", skip(self, filter), fields(%user_id))]
    async fn query(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<ChallengeHistoryEntry>, AppError> {
        let entries = self.entries.read().await;
        // Insertion order tracks created_at; reverse for newest-first.
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActiveDisplayType, Difficulty, GradingResult};

    fn attempt(user: &str, topic: &str, difficulty: Difficulty, passed: bool) -> NewHistoryEntry {
        NewHistoryEntry {
            user_id: user.into(),
            topic: topic.into(),
            difficulty,
            question_type: ActiveDisplayType::Coding,
            question: "q".into(),
            user_solution: "fn x() {}".into(),
            grading_result: GradingResult {
                score: if passed { 80 } else { 40 },
                feedback: "f".into(),
                passed,
            },
            generated_solution: None,
        }
    }

    #[tokio::test]
    async fn unowned_writes_are_refused() {
        let store = MemoryHistoryStore::new();
        let err = store
            .append(attempt("", "Closures", Difficulty::Beginner, true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
    }

    #[tokio::test]
    async fn append_assigns_id_and_timestamp() {
        let store = MemoryHistoryStore::new();
        let id = store
            .append(attempt("u1", "Closures", Difficulty::Beginner, true))
            .await
            .unwrap();
        assert!(!id.is_empty());
        let entries = store.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }

    #[tokio::test]
    async fn query_is_newest_first_and_scoped_to_user() {
        let store = MemoryHistoryStore::new();
        store
            .append(attempt("u1", "First", Difficulty::Beginner, true))
            .await
            .unwrap();
        store
            .append(attempt("u1", "Second", Difficulty::Beginner, false))
            .await
            .unwrap();
        store
            .append(attempt("u2", "Other", Difficulty::Advanced, true))
            .await
            .unwrap();

        let entries = store.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].topic, "Second");
        assert_eq!(entries[1].topic, "First");
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let store = MemoryHistoryStore::new();
        store
            .append(attempt("u1", "Closures", Difficulty::Beginner, true))
            .await
            .unwrap();
        store
            .append(attempt("u1", "Closures", Difficulty::Beginner, false))
            .await
            .unwrap();
        store
            .append(attempt("u1", "Borrowing", Difficulty::Beginner, true))
            .await
            .unwrap();

        let filter = HistoryFilter {
            topic: Some("Closures".into()),
            passed: Some(true),
            ..Default::default()
        };
        let entries = store.query("u1", &filter).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].grading_result.passed);
        assert_eq!(entries[0].topic, "Closures");
    }
}
