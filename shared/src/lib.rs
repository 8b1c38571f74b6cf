use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const POINTS_PER_CORRECT: u32 = 100;
pub const DEFAULT_QUESTION_TIME_LIMIT_MS: u64 = 30_000;
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 5;

/// Domain error kinds carried over the wire.
///
/// Every rejected operation maps to exactly one of these; the transport
/// reports them synchronously in an `Error` packet. `BackendUnavailable`
/// is reserved for the calling layer's translation of external store
/// failures and is never produced by the core itself.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    SessionNotFound,
    SessionFull,
    AlreadyJoined,
    InvalidState,
    PlayerNotInSession,
    NoActiveQuestion,
    DimensionMismatch,
    DuplicateId,
    NotFound,
    BackendUnavailable,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    Ready,
    Active,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// Per-question answer window in milliseconds.
    pub question_time_limit_ms: u64,
}

impl SessionConfig {
    pub fn new(min_players: usize, max_players: usize) -> Self {
        Self {
            min_players,
            max_players,
            question_time_limit_ms: DEFAULT_QUESTION_TIME_LIMIT_MS,
        }
    }

    /// A config is usable when at least one player fits and the bounds
    /// are ordered.
    pub fn is_valid(&self) -> bool {
        self.min_players >= 1 && self.max_players >= self.min_players
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Question {
    /// Monotonically distinct per session, stamped by the session.
    pub id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub time_limit_ms: u64,
}

/// Descriptive metadata attached to an indexed concept embedding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConceptMetadata {
    pub name: String,
    pub category: String,
    pub difficulty: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// One scored match from a similarity query, best first.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimilarityHit {
    pub id: String,
    pub score: f32,
    pub metadata: ConceptMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Prerequisite,
    Related,
    Application,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConceptLink {
    pub target: String,
    pub weight: f32,
    pub kind: LinkKind,
}

/// A node in the knowledge graph.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Concept {
    pub uid: String,
    pub name: String,
    pub category: String,
    pub difficulty: String,
    pub description: String,
    pub tags: Vec<String>,
    pub connections: Vec<ConceptLink>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client -> server
    CreateSession {
        client_version: u32,
        config: SessionConfig,
    },
    JoinSession {
        session_id: String,
        player_id: String,
    },
    LeaveSession {
        session_id: String,
        player_id: String,
    },
    StartSession {
        session_id: String,
    },
    SubmitAnswer {
        session_id: String,
        player_id: String,
        answer_index: usize,
    },
    AdvanceQuestion {
        session_id: String,
    },
    CloseSession {
        session_id: String,
    },
    IndexConcept {
        id: String,
        metadata: ConceptMetadata,
    },
    SemanticSearch {
        query: String,
        top_k: usize,
    },
    Recommend {
        concept_id: String,
        top_k: usize,
    },

    // Server -> client
    SessionCreated {
        session_id: String,
    },
    SessionJoined {
        session_id: String,
        status: SessionStatus,
        roster: Vec<String>,
    },
    SessionLeft {
        session_id: String,
        roster: Vec<String>,
    },
    SessionStarted {
        session_id: String,
        question: Question,
    },
    AnswerResult {
        correct: bool,
        score: u32,
    },
    /// `question: None` means the source is exhausted and the session
    /// has finished.
    QuestionAdvanced {
        session_id: String,
        question: Option<Question>,
    },
    SessionClosed {
        session_id: String,
    },
    ConceptIndexed {
        id: String,
    },
    SearchResults {
        hits: Vec<SimilarityHit>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_validity() {
        assert!(SessionConfig::new(1, 1).is_valid());
        assert!(SessionConfig::new(2, 4).is_valid());
        assert!(!SessionConfig::new(0, 4).is_valid());
        assert!(!SessionConfig::new(3, 2).is_valid());
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::new(2, 4);
        assert_eq!(config.question_time_limit_ms, DEFAULT_QUESTION_TIME_LIMIT_MS);
    }

    #[test]
    fn test_packet_serialization_create_session() {
        let packet = Packet::CreateSession {
            client_version: PROTOCOL_VERSION,
            config: SessionConfig::new(2, 4),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::CreateSession {
                client_version,
                config,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(config.min_players, 2);
                assert_eq!(config.max_players, 4);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_submit_answer() {
        let packet = Packet::SubmitAnswer {
            session_id: "s-1".to_string(),
            player_id: "alice".to_string(),
            answer_index: 2,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::SubmitAnswer {
                session_id,
                player_id,
                answer_index,
            } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(player_id, "alice");
                assert_eq!(answer_index, 2);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_question_advanced() {
        let question = Question {
            id: 3,
            prompt: "Solve: 2x + 5 = 13".to_string(),
            options: vec![
                "x = 4".to_string(),
                "x = 6".to_string(),
                "x = 8".to_string(),
                "x = 9".to_string(),
            ],
            correct_index: 0,
            time_limit_ms: 30_000,
        };

        let packet = Packet::QuestionAdvanced {
            session_id: "s-1".to_string(),
            question: Some(question),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::QuestionAdvanced {
                session_id,
                question: Some(q),
            } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(q.id, 3);
                assert_eq!(q.options.len(), 4);
                assert_eq!(q.correct_index, 0);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_search_results() {
        let hits = vec![SimilarityHit {
            id: "concept_1".to_string(),
            score: 0.97,
            metadata: ConceptMetadata {
                name: "Linear Algebra".to_string(),
                category: "Algebra".to_string(),
                difficulty: "Advanced".to_string(),
                description: "Study of linear equations and vector spaces".to_string(),
                tags: vec!["vectors".to_string(), "matrices".to_string()],
            },
        }];

        let packet = Packet::SearchResults { hits };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::SearchResults { hits } => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].id, "concept_1");
                assert_eq!(hits[0].metadata.tags.len(), 2);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_error() {
        let packet = Packet::Error {
            kind: ErrorKind::SessionFull,
            message: "session has no free slots".to_string(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::SessionFull);
                assert!(message.contains("free slots"));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_concept_serialization() {
        let concept = Concept {
            uid: "0x1".to_string(),
            name: "Linear Algebra".to_string(),
            category: "Algebra".to_string(),
            difficulty: "Advanced".to_string(),
            description: "Study of linear equations, vector spaces, and linear transformations"
                .to_string(),
            tags: vec!["vectors".to_string()],
            connections: vec![ConceptLink {
                target: "0x2".to_string(),
                weight: 0.8,
                kind: LinkKind::Prerequisite,
            }],
        };

        let serialized = bincode::serialize(&concept).unwrap();
        let deserialized: Concept = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, concept);
    }
}
