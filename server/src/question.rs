//! Pluggable question sourcing for quiz sessions
//!
//! Sessions pull questions one at a time through the `QuestionSource`
//! trait; a source that returns `None` ends the session. The coordinator
//! stamps per-session monotonic ids onto the specs it receives, so sources
//! only describe content.

use shared::DEFAULT_QUESTION_TIME_LIMIT_MS;
use std::collections::HashMap;

/// Question content as produced by a source, before the owning session
/// assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSpec {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub time_limit_ms: u64,
}

/// Supplies the next question for a session, or `None` when the sequence
/// is exhausted.
pub trait QuestionSource: Send + Sync {
    fn next_question(&mut self, session_id: &str) -> Option<QuestionSpec>;

    /// Notifies the source that a session is gone and any per-session
    /// bookkeeping can be dropped. Sources without state ignore this.
    fn forget_session(&mut self, _session_id: &str) {}
}

/// An ordered bank of questions with an independent cursor per session.
///
/// Every session walks the same list from the beginning; exhausting the
/// list finishes the session. Cursors for closed sessions are dropped via
/// `forget_session`.
pub struct QuestionBank {
    questions: Vec<QuestionSpec>,
    cursors: HashMap<String, usize>,
}

impl QuestionBank {
    pub fn new(questions: Vec<QuestionSpec>) -> Self {
        Self {
            questions,
            cursors: HashMap::new(),
        }
    }

    /// A small built-in algebra bank, first entry matching the classic
    /// warm-up question.
    pub fn with_default_questions() -> Self {
        let questions = vec![
            QuestionSpec {
                prompt: "Solve: 2x + 5 = 13".to_string(),
                options: vec![
                    "x = 4".to_string(),
                    "x = 6".to_string(),
                    "x = 8".to_string(),
                    "x = 9".to_string(),
                ],
                correct_index: 0,
                time_limit_ms: DEFAULT_QUESTION_TIME_LIMIT_MS,
            },
            QuestionSpec {
                prompt: "What is the derivative of x^2?".to_string(),
                options: vec![
                    "x".to_string(),
                    "2x".to_string(),
                    "x^2".to_string(),
                    "2".to_string(),
                ],
                correct_index: 1,
                time_limit_ms: DEFAULT_QUESTION_TIME_LIMIT_MS,
            },
            QuestionSpec {
                prompt: "What is the determinant of the 2x2 identity matrix?".to_string(),
                options: vec![
                    "0".to_string(),
                    "1".to_string(),
                    "2".to_string(),
                    "-1".to_string(),
                ],
                correct_index: 1,
                time_limit_ms: DEFAULT_QUESTION_TIME_LIMIT_MS,
            },
        ];

        Self::new(questions)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionSource for QuestionBank {
    fn next_question(&mut self, session_id: &str) -> Option<QuestionSpec> {
        let cursor = self.cursors.entry(session_id.to_string()).or_insert(0);
        let question = self.questions.get(*cursor).cloned();
        if question.is_some() {
            *cursor += 1;
        }
        question
    }

    fn forget_session(&mut self, session_id: &str) {
        self.cursors.remove(session_id);
    }
}
