//! Per-session quiz state machine
//!
//! A session moves forward only: Waiting -> Ready -> Active -> Finished.
//! The roster is ordered by join time and never exceeds the configured
//! maximum; the score table holds exactly one entry per joined player.
//! All mutation goes through the `SessionCoordinator`, which owns every
//! session instance.

use crate::question::QuestionSpec;
use log::info;
use shared::{ErrorKind, Question, SessionConfig, SessionStatus, POINTS_PER_CORRECT};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rejections produced by session and coordinator operations.
///
/// Every variant is a local validation failure with no side effect; the
/// operation either fully applies or leaves the session untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session config: min_players must be >= 1 and <= max_players")]
    InvalidConfig,
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("session has no free slots")]
    SessionFull,
    #[error("player {0} already joined")]
    AlreadyJoined(String),
    #[error("operation not allowed while session is {0:?}")]
    InvalidState(SessionStatus),
    #[error("player {0} is not in this session")]
    PlayerNotInSession(String),
    #[error("session has no active question")]
    NoActiveQuestion,
}

impl SessionError {
    /// Wire-level error kind for this rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidConfig => ErrorKind::InvalidConfig,
            SessionError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            SessionError::SessionFull => ErrorKind::SessionFull,
            SessionError::AlreadyJoined(_) => ErrorKind::AlreadyJoined,
            SessionError::InvalidState(_) => ErrorKind::InvalidState,
            SessionError::PlayerNotInSession(_) => ErrorKind::PlayerNotInSession,
            SessionError::NoActiveQuestion => ErrorKind::NoActiveQuestion,
        }
    }
}

/// One multiplayer quiz session and all state owned by it.
#[derive(Debug)]
pub struct GameSession {
    id: String,
    status: SessionStatus,
    config: SessionConfig,
    /// Ordered by join time; the order is the display tie-break.
    roster: Vec<String>,
    scores: HashMap<String, u32>,
    current_question: Option<Question>,
    /// When the current question was installed, for deadline enforcement.
    question_set_at: Option<Instant>,
    next_question_id: u64,
    started_at: Option<Instant>,
    last_activity: Instant,
}

impl GameSession {
    pub(crate) fn new(id: String, config: SessionConfig) -> Self {
        Self {
            id,
            status: SessionStatus::Waiting,
            config,
            roster: Vec::new(),
            scores: HashMap::new(),
            current_question: None,
            question_set_at: None,
            next_question_id: 0,
            started_at: None,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Roster snapshot in join order.
    pub fn roster(&self) -> Vec<String> {
        self.roster.clone()
    }

    /// Score table snapshot; one entry per joined player.
    pub fn scores(&self) -> HashMap<String, u32> {
        self.scores.clone()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn contains_player(&self, player_id: &str) -> bool {
        self.roster.iter().any(|p| p == player_id)
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// True when nothing has happened to this session for `max_idle`.
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        self.last_activity.elapsed() > max_idle
    }

    /// True when the current question's answer window has elapsed.
    pub fn question_expired(&self, now: Instant) -> bool {
        match (&self.current_question, self.question_set_at) {
            (Some(question), Some(set_at)) => {
                now.duration_since(set_at) > Duration::from_millis(question.time_limit_ms)
            }
            _ => false,
        }
    }

    /// Adds a player to the roster and gives them a zero score.
    ///
    /// Reaching the minimum player count promotes Waiting to Ready as a
    /// side effect. Joining is only possible before the session starts.
    pub(crate) fn join(&mut self, player_id: &str) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Waiting | SessionStatus::Ready => {}
            other => return Err(SessionError::InvalidState(other)),
        }
        if self.roster.len() >= self.config.max_players {
            return Err(SessionError::SessionFull);
        }
        if self.contains_player(player_id) {
            return Err(SessionError::AlreadyJoined(player_id.to_string()));
        }

        self.roster.push(player_id.to_string());
        self.scores.insert(player_id.to_string(), 0);
        self.touch();

        if self.status == SessionStatus::Waiting && self.roster.len() >= self.config.min_players {
            info!("Session {} is ready with {} players", self.id, self.roster.len());
            self.status = SessionStatus::Ready;
        }

        Ok(())
    }

    /// Removes a player before the session starts.
    ///
    /// Readiness is sticky: dropping below the minimum player count after
    /// the session became Ready does not revert it to Waiting.
    pub(crate) fn leave(&mut self, player_id: &str) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Waiting | SessionStatus::Ready => {}
            other => return Err(SessionError::InvalidState(other)),
        }

        let position = self
            .roster
            .iter()
            .position(|p| p == player_id)
            .ok_or_else(|| SessionError::PlayerNotInSession(player_id.to_string()))?;

        self.roster.remove(position);
        self.scores.remove(player_id);
        self.touch();
        Ok(())
    }

    /// Transitions Ready -> Active and records the start timestamp.
    /// The caller installs the first question immediately afterwards.
    pub(crate) fn start(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Ready {
            return Err(SessionError::InvalidState(self.status));
        }

        self.status = SessionStatus::Active;
        self.started_at = Some(Instant::now());
        self.touch();
        info!("Session {} started with {} players", self.id, self.roster.len());
        Ok(())
    }

    /// Replaces the current question with a freshly stamped one.
    pub(crate) fn install_question(&mut self, spec: QuestionSpec) -> &Question {
        let id = self.next_question_id;
        self.next_question_id += 1;

        self.question_set_at = Some(Instant::now());
        self.touch();

        self.current_question.insert(Question {
            id,
            prompt: spec.prompt,
            options: spec.options,
            correct_index: spec.correct_index,
            time_limit_ms: spec.time_limit_ms,
        })
    }

    /// Scores an answer against the current question.
    ///
    /// A correct answer awards a fixed 100 points; a wrong one changes
    /// nothing. Returns the correctness flag and the player's score after
    /// the submission. Never advances the question.
    pub(crate) fn submit_answer(
        &mut self,
        player_id: &str,
        answer_index: usize,
    ) -> Result<(bool, u32), SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(self.status));
        }
        if !self.contains_player(player_id) {
            return Err(SessionError::PlayerNotInSession(player_id.to_string()));
        }
        let question = self
            .current_question
            .as_ref()
            .ok_or(SessionError::NoActiveQuestion)?;

        let correct = answer_index == question.correct_index;
        if correct {
            *self.scores.entry(player_id.to_string()).or_insert(0) += POINTS_PER_CORRECT;
        }
        self.touch();

        let score = self.scores.get(player_id).copied().unwrap_or(0);
        Ok((correct, score))
    }

    /// Forces the session into its terminal state. Idempotent.
    pub(crate) fn finish(&mut self) {
        if self.status != SessionStatus::Finished {
            info!("Session {} finished", self.id);
            self.status = SessionStatus::Finished;
            self.current_question = None;
            self.question_set_at = None;
            self.touch();
        }
    }
}
