//! Session registry and lifecycle management for the multiplayer quiz
//!
//! This module owns every live `GameSession`, including:
//! - Session lifecycle (create, join, leave, start, close, idle eviction)
//! - Answer scoring and explicit question advancement
//! - Capacity and state-machine enforcement with domain error reporting
//!
//! The coordinator holds no ambient global state; callers own an instance
//! and serialize mutations through it (the network layer wraps it in one
//! RwLock, so racing joins cannot both win the last roster slot).

use crate::question::QuestionSource;
use crate::session::{GameSession, SessionError};
use log::info;
use shared::{Question, SessionConfig, SessionStatus};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Outcome of a scored answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub score: u32,
}

/// Owns all game sessions and the question source feeding them.
///
/// Every operation validates against the session state machine before
/// mutating anything; a rejected operation leaves the registry exactly
/// as it was.
pub struct SessionCoordinator {
    sessions: HashMap<String, GameSession>,
    question_source: Box<dyn QuestionSource>,
}

impl SessionCoordinator {
    pub fn new(question_source: Box<dyn QuestionSource>) -> Self {
        Self {
            sessions: HashMap::new(),
            question_source,
        }
    }

    /// Creates a new session in Waiting and returns its opaque id.
    ///
    /// Fails with `InvalidConfig` unless `1 <= min_players <= max_players`.
    pub fn create_session(&mut self, config: SessionConfig) -> Result<String, SessionError> {
        if !config.is_valid() {
            return Err(SessionError::InvalidConfig);
        }

        let session_id = Uuid::new_v4().to_string();
        let session = GameSession::new(session_id.clone(), config);
        info!(
            "Created session {} (min {}, max {})",
            session_id, config.min_players, config.max_players
        );
        self.sessions.insert(session_id.clone(), session);

        Ok(session_id)
    }

    /// Appends a player to a session's roster.
    ///
    /// Reaching the minimum player count promotes the session to Ready.
    /// Returns the roster after the join.
    pub fn join_session(
        &mut self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        let session = self.session_mut(session_id)?;
        session.join(player_id)?;
        info!("Player {} joined session {}", player_id, session_id);
        Ok(session.roster())
    }

    /// Removes a player from a session that has not yet started.
    /// Returns the roster after the departure.
    pub fn leave_session(
        &mut self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        let session = self.session_mut(session_id)?;
        session.leave(player_id)?;
        info!("Player {} left session {}", player_id, session_id);
        Ok(session.roster())
    }

    /// Starts a Ready session and installs its first question.
    ///
    /// With an exhausted question source the session still starts and then
    /// immediately finishes; the returned question is `None` in that case.
    pub fn start_session(&mut self, session_id: &str) -> Result<Option<Question>, SessionError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        session.start()?;

        match self.question_source.next_question(session_id) {
            Some(spec) => {
                let question = session.install_question(spec).clone();
                Ok(Some(question))
            }
            None => {
                session.finish();
                Ok(None)
            }
        }
    }

    /// Scores an answer against the session's current question.
    ///
    /// Never advances the question; progression is the caller's policy,
    /// via `advance_question` or the deadline sweep.
    pub fn submit_answer(
        &mut self,
        session_id: &str,
        player_id: &str,
        answer_index: usize,
    ) -> Result<AnswerOutcome, SessionError> {
        let session = self.session_mut(session_id)?;
        let (correct, score) = session.submit_answer(player_id, answer_index)?;
        Ok(AnswerOutcome { correct, score })
    }

    /// Replaces an Active session's question with the next one, or
    /// finishes the session when the source is exhausted (returns `None`).
    pub fn advance_question(
        &mut self,
        session_id: &str,
    ) -> Result<Option<Question>, SessionError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if session.status() != SessionStatus::Active {
            return Err(SessionError::InvalidState(session.status()));
        }

        match self.question_source.next_question(session_id) {
            Some(spec) => {
                let question = session.install_question(spec).clone();
                Ok(Some(question))
            }
            None => {
                session.finish();
                Ok(None)
            }
        }
    }

    /// Forces a session into Finished from any state. A no-op, not an
    /// error, when it is already Finished.
    pub fn close_session(&mut self, session_id: &str) -> Result<(), SessionError> {
        let session = self.session_mut(session_id)?;
        session.finish();
        Ok(())
    }

    /// Closes and removes sessions idle longer than `max_idle`.
    ///
    /// Runs under the same exclusive access as every other mutation, so
    /// it never contends with an in-flight operation on the same session.
    /// Returns the evicted session ids.
    pub fn sweep_idle(&mut self, max_idle: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_idle(max_idle))
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            if let Some(mut session) = self.sessions.remove(session_id) {
                session.finish();
                self.question_source.forget_session(session_id);
                info!("Evicted idle session {}", session_id);
            }
        }

        stale
    }

    /// Active sessions whose current question deadline has passed, in no
    /// particular order. The caller advances them.
    pub fn sessions_with_expired_questions(&self, now: Instant) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|(_, session)| {
                session.status() == SessionStatus::Active && session.question_expired(now)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Read-only view of a session.
    pub fn session(&self, session_id: &str) -> Result<&GameSession, SessionError> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    pub fn session_status(&self, session_id: &str) -> Result<SessionStatus, SessionError> {
        self.session(session_id).map(|s| s.status())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut GameSession, SessionError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::{QuestionBank, QuestionSpec};
    use shared::POINTS_PER_CORRECT;

    fn coordinator() -> SessionCoordinator {
        SessionCoordinator::new(Box::new(QuestionBank::with_default_questions()))
    }

    fn coordinator_with(bank: QuestionBank) -> SessionCoordinator {
        SessionCoordinator::new(Box::new(bank))
    }

    fn one_question_bank() -> QuestionBank {
        QuestionBank::new(vec![QuestionSpec {
            prompt: "only".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_index: 0,
            time_limit_ms: 30_000,
        }])
    }

    #[test]
    fn test_create_session_valid_config() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();

        assert_eq!(coord.len(), 1);
        assert_eq!(
            coord.session_status(&id).unwrap(),
            SessionStatus::Waiting
        );
    }

    #[test]
    fn test_create_session_invalid_config() {
        let mut coord = coordinator();

        assert_eq!(
            coord.create_session(SessionConfig::new(0, 4)),
            Err(SessionError::InvalidConfig)
        );
        assert_eq!(
            coord.create_session(SessionConfig::new(5, 4)),
            Err(SessionError::InvalidConfig)
        );
        assert!(coord.is_empty());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let mut coord = coordinator();
        let a = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        let b = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_join_unknown_session() {
        let mut coord = coordinator();
        assert_eq!(
            coord.join_session("nope", "alice"),
            Err(SessionError::SessionNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_full_game_flow() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();

        coord.join_session(&id, "alice").unwrap();
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Waiting);

        coord.join_session(&id, "bob").unwrap();
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Ready);

        let question = coord.start_session(&id).unwrap().unwrap();
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Active);

        let alice = coord
            .submit_answer(&id, "alice", question.correct_index)
            .unwrap();
        assert!(alice.correct);
        assert_eq!(alice.score, POINTS_PER_CORRECT);

        let wrong_index = (question.correct_index + 1) % question.options.len();
        let bob = coord.submit_answer(&id, "bob", wrong_index).unwrap();
        assert!(!bob.correct);
        assert_eq!(bob.score, 0);
    }

    #[test]
    fn test_start_requires_ready() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();
        coord.join_session(&id, "alice").unwrap();

        assert_eq!(
            coord.start_session(&id),
            Err(SessionError::InvalidState(SessionStatus::Waiting))
        );
    }

    #[test]
    fn test_advance_walks_bank_then_finishes() {
        let mut coord = coordinator_with(one_question_bank());
        let id = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        coord.join_session(&id, "alice").unwrap();

        let first = coord.start_session(&id).unwrap();
        assert!(first.is_some());

        let next = coord.advance_question(&id).unwrap();
        assert!(next.is_none());
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Finished);
    }

    #[test]
    fn test_advance_requires_active() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();

        assert_eq!(
            coord.advance_question(&id),
            Err(SessionError::InvalidState(SessionStatus::Waiting))
        );
    }

    #[test]
    fn test_submit_does_not_advance() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        coord.join_session(&id, "alice").unwrap();
        let question = coord.start_session(&id).unwrap().unwrap();

        coord
            .submit_answer(&id, "alice", question.correct_index)
            .unwrap();

        let current = coord.session(&id).unwrap().current_question().unwrap().clone();
        assert_eq!(current.id, question.id);
    }

    #[test]
    fn test_start_with_empty_bank_finishes_immediately() {
        let mut coord = coordinator_with(QuestionBank::new(Vec::new()));
        let id = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        coord.join_session(&id, "alice").unwrap();

        let question = coord.start_session(&id).unwrap();
        assert!(question.is_none());
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Finished);
    }

    #[test]
    fn test_close_session_is_idempotent() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();

        coord.close_session(&id).unwrap();
        assert_eq!(coord.session_status(&id).unwrap(), SessionStatus::Finished);

        // Closing again is a no-op, not an error
        coord.close_session(&id).unwrap();
    }

    #[test]
    fn test_join_after_close_rejected() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();
        coord.close_session(&id).unwrap();

        assert_eq!(
            coord.join_session(&id, "alice"),
            Err(SessionError::InvalidState(SessionStatus::Finished))
        );
    }

    #[test]
    fn test_sweep_evicts_only_stale_sessions() {
        let mut coord = coordinator();
        let id = coord.create_session(SessionConfig::new(2, 4)).unwrap();

        let evicted = coord.sweep_idle(Duration::from_secs(3600));
        assert!(evicted.is_empty());
        assert_eq!(coord.len(), 1);

        let evicted = coord.sweep_idle(Duration::from_secs(0));
        assert_eq!(evicted, vec![id]);
        assert!(coord.is_empty());
    }

    #[test]
    fn test_expired_question_detection() {
        let bank = QuestionBank::new(vec![QuestionSpec {
            prompt: "fast".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_index: 0,
            time_limit_ms: 10,
        }]);

        let mut coord = coordinator_with(bank);
        let id = coord.create_session(SessionConfig::new(1, 2)).unwrap();
        coord.join_session(&id, "alice").unwrap();
        coord.start_session(&id).unwrap();

        let soon = Instant::now() + Duration::from_millis(50);
        assert_eq!(coord.sessions_with_expired_questions(soon), vec![id]);
    }
}
