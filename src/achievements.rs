//! Badge catalog and the award evaluator.
//!
//! Badges are awarded at most once per user. The evaluator runs only after
//! a passing attempt has been persisted, re-reads the user's history, and
//! applies each rule independently; "already awarded" is normal control
//! flow, not an error. The duplicate check is read-then-write with no
//! transaction, so two passing submissions from the same user at nearly
//! the same instant can double-award.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::domain::{ChallengeHistoryEntry, Difficulty, HistoryFilter};
use crate::error::AppError;
use crate::history::HistoryStore;

/// One catalog entry. `icon_name` is a string identifier the frontend maps
/// to an icon component; the backend never interprets it.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_difficulty: Option<Difficulty>,
}

pub const FIRST_PASS_ID: &str = "initiate_programmer";

/// Static catalog; not user-specific.
pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: FIRST_PASS_ID,
        name: "Initiate Programmer",
        description: "Successfully passed your first challenge!",
        icon_name: "Award",
        criteria_count: None,
        criteria_difficulty: None,
    },
    Achievement {
        id: "beginner_challenger_3",
        name: "Beginner Challenger",
        description: "Passed 3 challenges at Beginner difficulty.",
        icon_name: "Star",
        criteria_count: Some(3),
        criteria_difficulty: Some(Difficulty::Beginner),
    },
    Achievement {
        id: "intermediate_adept_3",
        name: "Intermediate Adept",
        description: "Passed 3 challenges at Intermediate difficulty.",
        icon_name: "ShieldCheck",
        criteria_count: Some(3),
        criteria_difficulty: Some(Difficulty::Intermediate),
    },
    Achievement {
        id: "advanced_virtuoso_3",
        name: "Advanced Virtuoso",
        description: "Passed 3 challenges at Advanced difficulty.",
        icon_name: "Gem",
        criteria_count: Some(3),
        criteria_difficulty: Some(Difficulty::Advanced),
    },
];

pub fn achievement_by_id(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// One badge earned by one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_id: String,
    pub name: String,
    pub description: String,
    pub icon_name: String,
    pub earned_at: DateTime<Utc>,
}

/// The userAchievements collection.
pub trait AchievementStore {
    fn has(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn record(&self, award: UserAchievement) -> impl Future<Output = Result<(), AppError>> + Send;

    fn earned_by(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<UserAchievement>, AppError>> + Send;
}

#[derive(Clone, Default)]
pub struct MemoryAchievementStore {
    records: Arc<RwLock<Vec<UserAchievement>>>,
}

impl MemoryAchievementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AchievementStore for MemoryAchievementStore {
    async fn has(&self, user_id: &str, achievement_id: &str) -> Result<bool, AppError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .any(|r| r.user_id == user_id && r.achievement_id == achievement_id))
    }

    async fn record(&self, award: UserAchievement) -> Result<(), AppError> {
        self.records.write().await.push(award);
        Ok(())
    }

    async fn earned_by(&self, user_id: &str) -> Result<Vec<UserAchievement>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

async fn try_award<A: AchievementStore>(
    store: &A,
    user_id: &str,
    achievement: &Achievement,
    awarded: &mut Vec<UserAchievement>,
) -> Result<(), AppError> {
    // Read-then-write duplicate check; see the module docs for the race.
    if store.has(user_id, achievement.id).await? {
        return Ok(());
    }
    let award = UserAchievement {
        user_id: user_id.to_string(),
        achievement_id: achievement.id.to_string(),
        name: achievement.name.to_string(),
        description: achievement.description.to_string(),
        icon_name: achievement.icon_name.to_string(),
        earned_at: Utc::now(),
    };
    store.record(award.clone()).await?;
    info!(target: "challenge", %user_id, achievement = achievement.id, "Badge awarded");
    awarded.push(award);
    Ok(())
}

/// Evaluate all award rules for a user after a passing attempt has been
/// persisted. Returns newly awarded badges in rule order; the caller emits
/// one notification per badge.
#[instrument(level = "info", skip(history, store, entry), fields(%user_id, entry_id = %entry.id))]
pub async fn check_and_award<H: HistoryStore, A: AchievementStore>(
    history: &H,
    store: &A,
    user_id: &str,
    entry: &ChallengeHistoryEntry,
) -> Result<Vec<UserAchievement>, AppError> {
    // Failed attempts never unlock badges.
    if !entry.grading_result.passed {
        return Ok(vec![]);
    }

    let mut awarded = Vec::new();

    // 1. First passed challenge overall (the just-saved one included).
    let passed_total = history
        .query(user_id, &HistoryFilter::passed_only())
        .await?
        .len();
    if passed_total == 1 {
        if let Some(first_pass) = achievement_by_id(FIRST_PASS_ID) {
            try_award(store, user_id, first_pass, &mut awarded).await?;
        }
    }

    // 2. Exact-count rules per difficulty. Exact match only: a badge
    //    earned at count 3 is not re-evaluated at count 4.
    for achievement in CATALOG {
        let (Some(count), Some(difficulty)) =
            (achievement.criteria_count, achievement.criteria_difficulty)
        else {
            continue;
        };
        if difficulty != entry.difficulty {
            continue;
        }
        let filter = HistoryFilter {
            difficulty: Some(difficulty),
            passed: Some(true),
            ..Default::default()
        };
        let passed_at_difficulty = history.query(user_id, &filter).await?.len();
        if passed_at_difficulty == count {
            try_award(store, user_id, achievement, &mut awarded).await?;
        }
    }

    Ok(awarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActiveDisplayType, GradingResult, NewHistoryEntry};
    use crate::history::MemoryHistoryStore;

    async fn save_attempt(
        history: &MemoryHistoryStore,
        user: &str,
        difficulty: Difficulty,
        passed: bool,
    ) -> ChallengeHistoryEntry {
        let id = history
            .append(NewHistoryEntry {
                user_id: user.into(),
                topic: "Closures".into(),
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
            })
            .await
            .unwrap();
        history
            .query(user, &HistoryFilter::default())
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn first_pass_awards_exactly_once() {
        let history = MemoryHistoryStore::new();
        let store = MemoryAchievementStore::new();

        let entry = save_attempt(&history, "u1", Difficulty::Intermediate, true).await;
        let awarded = check_and_award(&history, &store, "u1", &entry).await.unwrap();
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].achievement_id, FIRST_PASS_ID);

        // A second passing attempt must not re-award.
        let entry = save_attempt(&history, "u1", Difficulty::Intermediate, true).await;
        let awarded = check_and_award(&history, &store, "u1", &entry).await.unwrap();
        assert!(awarded.is_empty());
        assert_eq!(store.earned_by("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn difficulty_badge_fires_on_exact_count_only() {
        let history = MemoryHistoryStore::new();
        let store = MemoryAchievementStore::new();

        for i in 0..4 {
            let entry = save_attempt(&history, "u1", Difficulty::Beginner, true).await;
            let awarded = check_and_award(&history, &store, "u1", &entry).await.unwrap();
            let ids: Vec<_> = awarded.iter().map(|a| a.achievement_id.as_str()).collect();
            match i {
                0 => assert_eq!(ids, vec![FIRST_PASS_ID]),
                2 => assert_eq!(ids, vec!["beginner_challenger_3"]),
                _ => assert!(ids.is_empty(), "unexpected awards on pass #{}: {ids:?}", i + 1),
            }
        }
        assert_eq!(store.earned_by("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_attempts_award_nothing() {
        let history = MemoryHistoryStore::new();
        let store = MemoryAchievementStore::new();
        let entry = save_attempt(&history, "u1", Difficulty::Beginner, false).await;
        let awarded = check_and_award(&history, &store, "u1", &entry).await.unwrap();
        assert!(awarded.is_empty());
        assert!(store.earned_by("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_attempts_do_not_count_toward_criteria() {
        let history = MemoryHistoryStore::new();
        let store = MemoryAchievementStore::new();

        save_attempt(&history, "u1", Difficulty::Beginner, false).await;
        save_attempt(&history, "u1", Difficulty::Beginner, false).await;
        let entry = save_attempt(&history, "u1", Difficulty::Beginner, true).await;
        // One passed, two failed: first-pass badge only, no count badge.
        let awarded = check_and_award(&history, &store, "u1", &entry).await.unwrap();
        let ids: Vec<_> = awarded.iter().map(|a| a.achievement_id.as_str()).collect();
        assert_eq!(ids, vec![FIRST_PASS_ID]);
    }
}
