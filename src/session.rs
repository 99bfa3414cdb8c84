//! One user's practice session, modeled as an explicit state machine.
//!
//! A session sequences question-fetch → answer-submit → grade →
//! conditional-solution-fetch → persist → achievement-check. The phase is a
//! single enum, so impossible combinations ("solution loading with no
//! grading result") cannot be represented. All collaborators are passed in
//! explicitly; the session owns no network or store handles of its own.

use std::future::Future;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::achievements::{self, AchievementStore, UserAchievement};
use crate::contracts::{
    AnswerGradingInput, GradeCodeInput, QuestionGenerationInput, SolutionGenerationInput,
};
use crate::domain::{
    ActiveDisplayType, ChallengeHistoryEntry, ChallengeParameters, GeneratedQuestion,
    GeneratedSolution, GradingResult, NewHistoryEntry,
};
use crate::error::AppError;
use crate::history::HistoryStore;

/// The AI operations a challenge session drives.
pub trait ChallengeGateway {
    fn generate_question(
        &self,
        input: &QuestionGenerationInput,
    ) -> impl Future<Output = Result<GeneratedQuestion, AppError>> + Send;

    fn grade_code(
        &self,
        input: &GradeCodeInput,
    ) -> impl Future<Output = Result<GradingResult, AppError>> + Send;

    fn grade_answer(
        &self,
        input: &AnswerGradingInput,
    ) -> impl Future<Output = Result<GradingResult, AppError>> + Send;

    fn generate_solution(
        &self,
        input: &SolutionGenerationInput,
    ) -> impl Future<Output = Result<GeneratedSolution, AppError>> + Send;
}

/// Where the session currently is. `Graded { passed: true }` is terminal
/// for the solution sub-flow; a failed grade continues into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    QuestionLoading,
    QuestionReady,
    Submitting,
    Graded { passed: bool },
    SolutionLoading,
    SolutionReady,
    SolutionFailed,
}

impl SessionPhase {
    /// Phases in which the user can act on the current question (submit or
    /// switch the displayed half). In-flight phases reject new actions.
    fn accepts_user_action(self) -> bool {
        matches!(
            self,
            SessionPhase::QuestionReady
                | SessionPhase::Graded { .. }
                | SessionPhase::SolutionReady
                | SessionPhase::SolutionFailed
        )
    }
}

/// Everything one submission produced. Grading is the only mandatory part;
/// solution, persistence, and achievements report their own outcomes
/// without masking it.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub grading: GradingResult,
    pub solution: Option<GeneratedSolution>,
    pub solution_error: Option<AppError>,
    pub entry_id: Option<String>,
    pub persist_error: Option<AppError>,
    pub new_achievements: Vec<UserAchievement>,
    pub achievement_error: Option<AppError>,
}

pub struct ChallengeSession {
    user_id: String,
    phase: SessionPhase,
    params: Option<ChallengeParameters>,
    question: Option<GeneratedQuestion>,
    active_display_type: Option<ActiveDisplayType>,
    grading: Option<GradingResult>,
    solution: Option<GeneratedSolution>,
}

impl ChallengeSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        ChallengeSession {
            user_id: user_id.into(),
            phase: SessionPhase::Idle,
            params: None,
            question: None,
            active_display_type: None,
            grading: None,
            solution: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn question(&self) -> Option<&GeneratedQuestion> {
        self.question.as_ref()
    }

    pub fn active_display_type(&self) -> Option<ActiveDisplayType> {
        self.active_display_type
    }

    pub fn grading(&self) -> Option<&GradingResult> {
        self.grading.as_ref()
    }

    fn clear_results(&mut self) {
        self.grading = None;
        self.solution = None;
    }

    /// Fetch a fresh question for the given parameters. Also serves as the
    /// entry point for a restart with identical parameters.
    ///
    /// Parameter validation happens synchronously before any transition or
    /// gateway call; a failed fetch lands back in Idle with the parameters
    /// retained so the user can retry.
    #[instrument(level = "info", skip(self, gateway, params), fields(user_id = %self.user_id, topic = %params.topic, difficulty = %params.difficulty))]
    pub async fn fetch_question<G: ChallengeGateway>(
        &mut self,
        gateway: &G,
        params: ChallengeParameters,
    ) -> Result<GeneratedQuestion, AppError> {
        params.validate()?;

        self.phase = SessionPhase::QuestionLoading;
        self.question = None;
        self.active_display_type = None;
        self.clear_results();

        let input = QuestionGenerationInput {
            topic: params.topic.clone(),
            difficulty: params.difficulty,
            preferred_question_type: params.question_type_preference,
        };
        self.params = Some(params);

        match gateway.generate_question(&input).await {
            Ok(question) => {
                self.active_display_type = Some(question.default_display_type());
                info!(target: "challenge", generated = ?question.question_type_generated, "Question ready");
                self.question = Some(question.clone());
                self.phase = SessionPhase::QuestionReady;
                Ok(question)
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(target: "challenge", error = %e, "Question generation failed (transient)");
                } else {
                    error!(target: "challenge", error = %e, "Question generation failed");
                }
                self.phase = SessionPhase::Idle;
                Err(e)
            }
        }
    }

    /// Generate a fresh question with the same parameters. Not a retry of
    /// the same question.
    pub async fn restart<G: ChallengeGateway>(
        &mut self,
        gateway: &G,
    ) -> Result<GeneratedQuestion, AppError> {
        let params = self.params.clone().ok_or_else(|| {
            AppError::MissingParameters("no challenge parameters to restart with".into())
        })?;
        self.fetch_question(gateway, params).await
    }

    /// Show the other half of a `both` question. Resets draft, grading,
    /// and solution state on both sides (the reference behavior; drafts
    /// are not retained per-tab).
    #[instrument(level = "info", skip(self), fields(user_id = %self.user_id, ?new_type))]
    pub fn switch_display_type(&mut self, new_type: ActiveDisplayType) -> Result<(), AppError> {
        if !self.phase.accepts_user_action() {
            return Err(AppError::MissingParameters(
                "cannot switch question type while a request is in flight".into(),
            ));
        }
        let question = self.question.as_ref().ok_or_else(|| {
            AppError::MissingParameters("no question loaded".into())
        })?;
        if !question.supports_switching() {
            return Err(AppError::MissingParameters(
                "switching is only available when both question types were generated".into(),
            ));
        }
        self.active_display_type = Some(new_type);
        self.clear_results();
        self.phase = SessionPhase::QuestionReady;
        Ok(())
    }

    /// Submit a solution for the active question type: grade, fetch the
    /// reference solution on a fail, persist the attempt exactly once, and
    /// evaluate achievements after a persisted pass.
    ///
    /// A grading failure aborts the attempt without persisting anything;
    /// the session drops back to QuestionReady and the user may retry.
    #[instrument(level = "info", skip_all, fields(user_id = %self.user_id, solution_len = solution_text.len()))]
    pub async fn submit<G, H, A>(
        &mut self,
        gateway: &G,
        history: &H,
        achievements_store: &A,
        solution_text: &str,
    ) -> Result<SubmissionOutcome, AppError>
    where
        G: ChallengeGateway,
        H: HistoryStore,
        A: AchievementStore,
    {
        if !self.phase.accepts_user_action() {
            return Err(AppError::MissingParameters(
                "no question is ready for submission".into(),
            ));
        }
        if solution_text.trim().is_empty() {
            // No transition and no gateway call for a blank submission.
            return Err(AppError::MissingParameters(
                "solution is empty; write your answer before submitting".into(),
            ));
        }

        let params = self
            .params
            .clone()
            .ok_or_else(|| AppError::MissingParameters("no active challenge parameters".into()))?;
        let active = self.active_display_type.ok_or_else(|| {
            AppError::MissingParameters("no active question type".into())
        })?;
        let question_text = self
            .question
            .as_ref()
            .and_then(|q| q.question_for(active))
            .ok_or_else(|| AppError::MissingParameters("no question loaded".into()))?
            .to_string();

        self.phase = SessionPhase::Submitting;
        self.clear_results();

        let graded = match active {
            ActiveDisplayType::Coding => {
                let input = GradeCodeInput {
                    code: solution_text.to_string(),
                    topic: params.topic.clone(),
                    difficulty: params.difficulty,
                    expected_output: None,
                };
                gateway.grade_code(&input).await
            }
            ActiveDisplayType::Conceptual => {
                let input = AnswerGradingInput {
                    question: question_text.clone(),
                    user_answer: solution_text.to_string(),
                    topic: params.topic.clone(),
                    difficulty: params.difficulty,
                };
                gateway.grade_answer(&input).await
            }
        };

        let grading = match graded {
            Ok(g) => g,
            Err(e) => {
                // Terminal for the attempt, not for the session.
                error!(target: "challenge", error = %e, "Grading failed; attempt aborted");
                self.phase = SessionPhase::QuestionReady;
                return Err(e);
            }
        };
        info!(target: "challenge", score = grading.score, passed = grading.passed, "Attempt graded");
        self.grading = Some(grading.clone());
        self.phase = SessionPhase::Graded {
            passed: grading.passed,
        };

        // Solution sub-flow: only ever entered on a failed grade, and its
        // outcome never touches the grading result.
        let mut solution = None;
        let mut solution_error = None;
        if !grading.passed {
            self.phase = SessionPhase::SolutionLoading;
            let input = SolutionGenerationInput {
                topic: params.topic.clone(),
                difficulty: params.difficulty,
                question: question_text.clone(),
                question_type: active,
            };
            match gateway.generate_solution(&input).await {
                Ok(s) => {
                    self.solution = Some(s.clone());
                    solution = Some(s);
                    self.phase = SessionPhase::SolutionReady;
                }
                Err(e) => {
                    warn!(target: "challenge", error = %e, "Solution generation failed");
                    solution_error = Some(e);
                    self.phase = SessionPhase::SolutionFailed;
                }
            }
        }

        // Persist exactly once per graded submission, pass or fail.
        // A store failure is reported alongside the grading result, never
        // instead of it.
        let new_entry = NewHistoryEntry {
            user_id: self.user_id.clone(),
            topic: params.topic.clone(),
            difficulty: params.difficulty,
            question_type: active,
            question: question_text.clone(),
            user_solution: solution_text.to_string(),
            grading_result: grading.clone(),
            generated_solution: solution.clone(),
        };
        let (entry_id, persist_error) = match history.append(new_entry).await {
            Ok(id) => (Some(id), None),
            Err(e) => {
                error!(target: "challenge", error = %e, "History append failed");
                (None, Some(e))
            }
        };

        // Achievements only run once a passing attempt is actually saved.
        let mut new_achievements = Vec::new();
        let mut achievement_error = None;
        if grading.passed {
            if let Some(id) = &entry_id {
                let saved = ChallengeHistoryEntry {
                    id: id.clone(),
                    user_id: self.user_id.clone(),
                    topic: params.topic.clone(),
                    difficulty: params.difficulty,
                    question_type: active,
                    question: question_text,
                    user_solution: solution_text.to_string(),
                    grading_result: grading.clone(),
                    generated_solution: None,
                    created_at: Utc::now(),
                };
                match achievements::check_and_award(
                    history,
                    achievements_store,
                    &self.user_id,
                    &saved,
                )
                .await
                {
                    Ok(awarded) => new_achievements = awarded,
                    Err(e) => {
                        error!(target: "challenge", error = %e, "Achievement evaluation failed");
                        achievement_error = Some(e);
                    }
                }
            }
        }

        Ok(SubmissionOutcome {
            grading,
            solution,
            solution_error,
            entry_id,
            persist_error,
            new_achievements,
            achievement_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::{MemoryAchievementStore, FIRST_PASS_ID};
    use crate::domain::{
        Difficulty, HistoryFilter, QuestionTypeGenerated, QuestionTypePreference,
    };
    use crate::history::MemoryHistoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockGateway {
        question: Option<GeneratedQuestion>,
        question_error: Option<AppError>,
        grade: Option<GradingResult>,
        grade_error: Option<AppError>,
        solution: Option<GeneratedSolution>,
        solution_error: Option<AppError>,
        generate_calls: AtomicUsize,
        grade_calls: AtomicUsize,
        solution_calls: AtomicUsize,
        last_grade_op: Mutex<Option<&'static str>>,
    }

    impl ChallengeGateway for MockGateway {
        async fn generate_question(
            &self,
            _input: &QuestionGenerationInput,
        ) -> Result<GeneratedQuestion, AppError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = &self.question_error {
                return Err(e.clone());
            }
            Ok(self.question.clone().unwrap())
        }

        async fn grade_code(&self, _input: &GradeCodeInput) -> Result<GradingResult, AppError> {
            self.grade_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_grade_op.lock().unwrap() = Some("grade_code");
            if let Some(e) = &self.grade_error {
                return Err(e.clone());
            }
            Ok(self.grade.clone().unwrap())
        }

        async fn grade_answer(
            &self,
            _input: &AnswerGradingInput,
        ) -> Result<GradingResult, AppError> {
            self.grade_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_grade_op.lock().unwrap() = Some("grade_answer");
            if let Some(e) = &self.grade_error {
                return Err(e.clone());
            }
            Ok(self.grade.clone().unwrap())
        }

        async fn generate_solution(
            &self,
            _input: &SolutionGenerationInput,
        ) -> Result<GeneratedSolution, AppError> {
            self.solution_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = &self.solution_error {
                return Err(e.clone());
            }
            Ok(self.solution.clone().unwrap())
        }
    }

    fn coding_question() -> GeneratedQuestion {
        GeneratedQuestion {
            coding_question: Some("Write a debounce function.".into()),
            coding_hints: Some(vec!["Think about timers.".into()]),
            conceptual_question: None,
            conceptual_hints: None,
            question_type_generated: QuestionTypeGenerated::Coding,
        }
    }

    fn both_question() -> GeneratedQuestion {
        GeneratedQuestion {
            coding_question: Some("Write a debounce function.".into()),
            coding_hints: Some(vec!["Think about timers.".into()]),
            conceptual_question: Some("What is a closure?".into()),
            conceptual_hints: Some(vec!["Captured environment.".into()]),
            question_type_generated: QuestionTypeGenerated::Both,
        }
    }

    fn params(preference: QuestionTypePreference) -> ChallengeParameters {
        ChallengeParameters {
            topic: "JavaScript Closures".into(),
            difficulty: Difficulty::Beginner,
            question_type_preference: preference,
        }
    }

    fn grading(score: u8) -> GradingResult {
        GradingResult {
            score,
            feedback: "Some feedback.".into(),
            passed: score >= 60,
        }
    }

    fn solution() -> GeneratedSolution {
        GeneratedSolution {
            solution: "const debounce = ...".into(),
            explanation: "Delays invocation.".into(),
        }
    }

    #[tokio::test]
    async fn blank_topic_never_reaches_the_gateway() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            ..Default::default()
        };
        let mut session = ChallengeSession::new("u1");
        let mut bad = params(QuestionTypePreference::Coding);
        bad.topic = "  ".into();

        let err = session.fetch_question(&gateway, bad).await.unwrap_err();
        assert!(matches!(err, AppError::MissingParameters(_)));
        assert_eq!(gateway.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn successful_fetch_defaults_to_coding_display() {
        let gateway = MockGateway {
            question: Some(both_question()),
            ..Default::default()
        };
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Both))
            .await
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
        assert_eq!(session.active_display_type(), Some(ActiveDisplayType::Coding));
        let q = session.question().unwrap();
        assert!(q.coding_question.is_some() && q.conceptual_question.is_some());
    }

    #[tokio::test]
    async fn failed_fetch_returns_to_idle_but_keeps_params() {
        let gateway = MockGateway {
            question_error: Some(AppError::UpstreamUnavailable("503".into())),
            ..Default::default()
        };
        let mut session = ChallengeSession::new("u1");
        let err = session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.phase(), SessionPhase::Idle);

        // Retrying via restart reuses the stored parameters.
        let gateway = MockGateway {
            question: Some(coding_question()),
            ..Default::default()
        };
        session.restart(&gateway).await.unwrap();
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
    }

    #[tokio::test]
    async fn switching_requires_a_both_question() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            ..Default::default()
        };
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();
        assert!(session
            .switch_display_type(ActiveDisplayType::Conceptual)
            .is_err());
    }

    #[tokio::test]
    async fn switching_resets_grading_and_solution_state() {
        let gateway = MockGateway {
            question: Some(both_question()),
            grade: Some(grading(45)),
            solution: Some(solution()),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Both))
            .await
            .unwrap();
        session
            .submit(&gateway, &history, &achievements, "function x() {}")
            .await
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::SolutionReady);

        session
            .switch_display_type(ActiveDisplayType::Conceptual)
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
        assert!(session.grading().is_none());
        assert_eq!(
            session.active_display_type(),
            Some(ActiveDisplayType::Conceptual)
        );
        // The parent question survives the switch.
        assert!(session.question().unwrap().coding_question.is_some());
    }

    #[tokio::test]
    async fn empty_submission_never_triggers_grading() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade: Some(grading(80)),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let err = session
            .submit(&gateway, &history, &achievements, "   \n")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingParameters(_)));
        assert_eq!(gateway.grade_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
    }

    #[tokio::test]
    async fn failed_grade_fetches_solution_and_persists_with_it() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade: Some(grading(45)),
            solution: Some(solution()),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let outcome = session
            .submit(&gateway, &history, &achievements, "function x() {}")
            .await
            .unwrap();
        assert!(!outcome.grading.passed);
        assert!(outcome.solution.is_some());
        assert_eq!(gateway.solution_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.phase(), SessionPhase::SolutionReady);

        let entries = history.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].generated_solution.is_some());
        // Failed attempts never unlock badges.
        assert!(outcome.new_achievements.is_empty());
    }

    #[tokio::test]
    async fn passing_grade_skips_solution_and_awards_first_pass() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade: Some(grading(80)),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let outcome = session
            .submit(&gateway, &history, &achievements, "function x() {}")
            .await
            .unwrap();
        assert!(outcome.grading.passed);
        assert!(outcome.solution.is_none());
        assert_eq!(gateway.solution_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::Graded { passed: true });

        let entries = history.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].generated_solution.is_none());
        assert_eq!(outcome.new_achievements.len(), 1);
        assert_eq!(outcome.new_achievements[0].achievement_id, FIRST_PASS_ID);
    }

    #[tokio::test]
    async fn grading_failure_persists_nothing() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade_error: Some(AppError::UpstreamError("timeout".into())),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let err = session
            .submit(&gateway, &history, &achievements, "function x() {}")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamError(_)));
        assert!(history
            .query("u1", &HistoryFilter::default())
            .await
            .unwrap()
            .is_empty());
        // The session survives the failed attempt.
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
    }

    #[tokio::test]
    async fn solution_failure_keeps_grading_and_persists_once() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade: Some(grading(45)),
            solution_error: Some(AppError::UpstreamError("timeout".into())),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let outcome = session
            .submit(&gateway, &history, &achievements, "function x() {}")
            .await
            .unwrap();
        assert!(!outcome.grading.passed);
        assert!(outcome.solution.is_none());
        assert!(outcome.solution_error.is_some());
        assert_eq!(session.phase(), SessionPhase::SolutionFailed);
        assert!(session.grading().is_some());

        let entries = history.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].generated_solution.is_none());
    }

    #[tokio::test]
    async fn conceptual_submissions_use_the_answer_grader() {
        let gateway = MockGateway {
            question: Some(both_question()),
            grade: Some(grading(80)),
            ..Default::default()
        };
        let history = MemoryHistoryStore::new();
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Both))
            .await
            .unwrap();
        session
            .switch_display_type(ActiveDisplayType::Conceptual)
            .unwrap();
        session
            .submit(&gateway, &history, &achievements, "A closure captures scope.")
            .await
            .unwrap();
        assert_eq!(*gateway.last_grade_op.lock().unwrap(), Some("grade_answer"));

        let entries = history.query("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(entries[0].question_type, ActiveDisplayType::Conceptual);
    }

    #[tokio::test]
    async fn restart_generates_a_fresh_question() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            ..Default::default()
        };
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();
        session.restart(&gateway).await.unwrap();
        assert_eq!(gateway.generate_calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.phase(), SessionPhase::QuestionReady);
    }

    struct FailingHistoryStore;

    impl HistoryStore for FailingHistoryStore {
        async fn append(&self, _entry: NewHistoryEntry) -> Result<String, AppError> {
            Err(AppError::StoreUnavailable("write refused".into()))
        }

        async fn query(
            &self,
            _user_id: &str,
            _filter: &HistoryFilter,
        ) -> Result<Vec<ChallengeHistoryEntry>, AppError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn persist_failure_is_non_blocking() {
        let gateway = MockGateway {
            question: Some(coding_question()),
            grade: Some(grading(80)),
            ..Default::default()
        };
        let achievements = MemoryAchievementStore::new();
        let mut session = ChallengeSession::new("u1");
        session
            .fetch_question(&gateway, params(QuestionTypePreference::Coding))
            .await
            .unwrap();

        let outcome = session
            .submit(&gateway, &FailingHistoryStore, &achievements, "function x() {}")
            .await
            .unwrap();
        // Grading stands; the store failure is reported separately and no
        // achievements are evaluated for an unsaved attempt.
        assert!(outcome.grading.passed);
        assert!(outcome.entry_id.is_none());
        assert!(matches!(
            outcome.persist_error,
            Some(AppError::StoreUnavailable(_))
        ));
        assert!(outcome.new_achievements.is_empty());
        assert!(achievements.earned_by("u1").await.unwrap().is_empty());
    }
}
